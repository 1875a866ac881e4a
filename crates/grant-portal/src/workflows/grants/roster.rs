use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::domain::{Role, UserId, UserProfile};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    UnknownRole { line: u64, role: String },
    MissingField { line: u64, field: &'static str },
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read user roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid user roster CSV: {}", err),
            RosterImportError::UnknownRole { line, role } => {
                write!(f, "line {}: unknown role '{}'", line, role)
            }
            RosterImportError::MissingField { line, field } => {
                write!(f, "line {}: {} must not be empty", line, field)
            }
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
            RosterImportError::UnknownRole { .. } | RosterImportError::MissingField { .. } => None,
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    id: String,
    name: String,
    email: String,
    role: String,
}

/// Loads staff and applicant accounts from an `id,name,email,role` CSV export.
pub struct UserRosterImporter;

impl UserRosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<UserProfile>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<UserProfile>, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut profiles = Vec::new();

        for (index, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
            let row = record?;
            // header occupies line 1
            let line = index as u64 + 2;

            if row.id.is_empty() {
                return Err(RosterImportError::MissingField { line, field: "id" });
            }
            if row.email.is_empty() {
                return Err(RosterImportError::MissingField {
                    line,
                    field: "email",
                });
            }

            let role = Role::parse(&row.role).ok_or_else(|| RosterImportError::UnknownRole {
                line,
                role: row.role.clone(),
            })?;

            profiles.push(UserProfile {
                id: UserId(row.id),
                name: row.name,
                email: row.email,
                role: role.label().to_string(),
            });
        }

        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn imports_rows_and_normalizes_roles() {
        let csv = "id,name,email,role\n\
u-1, Amina Otieno ,amina@example.org,Applicant\n\
u-2,Brian Kip,brian@example.org,reviewer_1\n";

        let profiles = UserRosterImporter::from_reader(csv.as_bytes()).expect("roster parses");
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].name, "Amina Otieno");
        assert_eq!(profiles[0].role, "applicant");
        assert_eq!(profiles[1].role(), Some(Role::Reviewer1));
    }

    #[test]
    fn unknown_roles_report_their_line() {
        let csv = "id,name,email,role\nu-1,Amina,amina@example.org,applicant\nu-2,Eve,eve@example.org,owner\n";
        let err = UserRosterImporter::from_reader(csv.as_bytes()).expect_err("bad role");
        assert_eq!(err.to_string(), "line 3: unknown role 'owner'");
    }

    #[test]
    fn empty_email_is_rejected() {
        let csv = "id,name,email,role\nu-1,Amina,,applicant\n";
        let err = UserRosterImporter::from_reader(csv.as_bytes()).expect_err("no email");
        assert!(matches!(
            err,
            RosterImportError::MissingField { field: "email", .. }
        ));
    }
}
