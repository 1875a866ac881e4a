use serde::{Deserialize, Serialize};

use super::domain::{Application, UserProfile};
use super::repository::EmailMessage;

/// Transactional e-mails the portal sends to applicants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    ApplicationReceived,
    Shortlisted,
    Approved,
    Rejected,
}

impl EmailTemplate {
    pub const fn key(self) -> &'static str {
        match self {
            EmailTemplate::ApplicationReceived => "application_received",
            EmailTemplate::Shortlisted => "application_shortlisted",
            EmailTemplate::Approved => "application_approved",
            EmailTemplate::Rejected => "application_rejected",
        }
    }

    fn subject(self, application: &Application) -> String {
        let business = &application.business.business_name;
        match self {
            EmailTemplate::ApplicationReceived => {
                format!("We received the application for {business}")
            }
            EmailTemplate::Shortlisted => format!("{business} has been shortlisted"),
            EmailTemplate::Approved => format!("Congratulations, {business} has been accepted"),
            EmailTemplate::Rejected => format!("Update on the application for {business}"),
        }
    }

    fn body(self, recipient: &UserProfile, application: &Application) -> String {
        let greeting = format!("Dear {},", recipient.name);
        let track = application.track.label();
        let reference = &application.id.0;
        let message = match self {
            EmailTemplate::ApplicationReceived => format!(
                "Thank you for applying. Your application {reference} has been received and \
                 screened into the {track} track. Reviewers will be in touch."
            ),
            EmailTemplate::Shortlisted => format!(
                "Your application {reference} passed the first review and has been shortlisted \
                 for final assessment."
            ),
            EmailTemplate::Approved => format!(
                "Your application {reference} has been approved for the {track} track. \
                 Programme onboarding details will follow."
            ),
            EmailTemplate::Rejected => format!(
                "After careful review, application {reference} was not selected for this \
                 cohort. Thank you for your interest."
            ),
        };
        format!("{greeting}\n\n{message}\n\nThe Grants Team")
    }

    pub fn render(
        self,
        from: &str,
        recipient: &UserProfile,
        application: &Application,
    ) -> EmailMessage {
        EmailMessage {
            template: self.key().to_string(),
            from: from.to_string(),
            to: recipient.email.clone(),
            subject: self.subject(application),
            body: self.body(recipient, application),
            application_id: application.id.clone(),
        }
    }
}
