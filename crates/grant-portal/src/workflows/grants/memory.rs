//! Process-local adapters used by the API binary and the test suites.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;

use super::domain::{
    Application, ApplicationId, ApplicationScore, EligibilityResult, EligibilityResultId,
    ScoreItem, UserId, UserProfile,
};
use super::repository::{
    ApplicationFilter, EmailMessage, MailError, Mailer, PageCache, PortalRepository,
    RepositoryError,
};
use super::scoring;

#[derive(Default)]
struct Tables {
    applications: BTreeMap<ApplicationId, Application>,
    results: HashMap<ApplicationId, EligibilityResult>,
    scores: HashMap<EligibilityResultId, BTreeMap<String, ApplicationScore>>,
    users: BTreeMap<UserId, UserProfile>,
    next_result: u64,
}

impl Tables {
    /// The stored result for an application, or a fresh unsaved one carrying the next id.
    fn result_or_new(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EligibilityResult, RepositoryError> {
        if !self.applications.contains_key(application_id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(match self.results.get(application_id) {
            Some(existing) => existing.clone(),
            None => EligibilityResult::new(
                EligibilityResultId(format!("er-{:06}", self.next_result + 1)),
                application_id.clone(),
            ),
        })
    }

    fn store_result(&mut self, result: EligibilityResult) {
        if !self.results.contains_key(&result.application_id) {
            self.next_result += 1;
        }
        self.results.insert(result.application_id.clone(), result);
    }

    fn score_rows(&self, result_id: &EligibilityResultId) -> Vec<ApplicationScore> {
        self.scores
            .get(result_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }
}

/// All portal tables behind a single mutex, so lock checks and writes are atomic.
#[derive(Default, Clone)]
pub struct InMemoryPortalRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryPortalRepository {
    fn tables(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    /// Total number of score rows, used to assert upsert semantics.
    pub fn score_row_count(&self) -> usize {
        self.tables()
            .map(|tables| tables.scores.values().map(BTreeMap::len).sum())
            .unwrap_or(0)
    }
}

impl PortalRepository for InMemoryPortalRepository {
    fn insert_application(
        &self,
        application: Application,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.tables()?;
        if tables.applications.contains_key(&application.id) {
            return Err(RepositoryError::Conflict);
        }
        tables
            .applications
            .insert(application.id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self.tables()?.applications.get(id).cloned())
    }

    fn list_applications(
        &self,
        filter: &ApplicationFilter,
    ) -> Result<Vec<Application>, RepositoryError> {
        Ok(self
            .tables()?
            .applications
            .values()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect())
    }

    fn update_application_with<F, E>(&self, id: &ApplicationId, edit: F) -> Result<Application, E>
    where
        F: FnOnce(&mut Application, Option<&EligibilityResult>) -> Result<(), E>,
        E: From<RepositoryError>,
    {
        let mut tables = self.tables()?;
        let mut application = tables
            .applications
            .get(id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        edit(&mut application, tables.results.get(id))?;
        tables.applications.insert(id.clone(), application.clone());
        Ok(application)
    }

    fn fetch_result(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Option<EligibilityResult>, RepositoryError> {
        Ok(self.tables()?.results.get(application_id).cloned())
    }

    fn update_result_with<F, E>(
        &self,
        application_id: &ApplicationId,
        edit: F,
    ) -> Result<EligibilityResult, E>
    where
        F: FnOnce(&mut EligibilityResult, &[ApplicationScore]) -> Result<(), E>,
        E: From<RepositoryError>,
    {
        let mut tables = self.tables()?;
        let mut result = tables.result_or_new(application_id)?;
        if result.is_locked {
            return Err(RepositoryError::Locked.into());
        }

        let scores = tables.score_rows(&result.id);
        edit(&mut result, &scores)?;
        tables.store_result(result.clone());
        Ok(result)
    }

    fn unlock_result(
        &self,
        application_id: &ApplicationId,
    ) -> Result<EligibilityResult, RepositoryError> {
        let mut tables = self.tables()?;
        let slot = tables
            .results
            .get_mut(application_id)
            .ok_or(RepositoryError::NotFound)?;
        if !slot.is_locked {
            return Err(RepositoryError::NotLocked);
        }
        slot.is_locked = false;
        slot.locked_by = None;
        slot.locked_at = None;
        Ok(slot.clone())
    }

    fn list_results(&self) -> Result<Vec<EligibilityResult>, RepositoryError> {
        let tables = self.tables()?;
        let mut results: Vec<EligibilityResult> = tables.results.values().cloned().collect();
        results.sort_by(|a, b| a.application_id.cmp(&b.application_id));
        Ok(results)
    }

    fn upsert_scores(
        &self,
        application_id: &ApplicationId,
        scored_by: &UserId,
        items: &[ScoreItem],
    ) -> Result<(EligibilityResult, Vec<ApplicationScore>), RepositoryError> {
        let mut tables = self.tables()?;
        let mut result = tables.result_or_new(application_id)?;
        if result.is_locked {
            return Err(RepositoryError::Locked);
        }

        let now = Utc::now();
        let rows = tables.scores.entry(result.id.clone()).or_default();
        for item in items {
            rows.insert(
                item.criteria_id.clone(),
                ApplicationScore {
                    eligibility_result_id: result.id.clone(),
                    criteria_id: item.criteria_id.clone(),
                    score: item.score,
                    comment: item.comment.clone(),
                    scored_by: scored_by.clone(),
                    updated_at: now,
                },
            );
        }
        let scores: Vec<ApplicationScore> = rows.values().cloned().collect();

        result.total_score = Some(scoring::total_score(&scores));
        result.reviewed_by = Some(scored_by.clone());
        result.reviewed_at = Some(now);
        tables.store_result(result.clone());
        Ok((result, scores))
    }

    fn scores_for(
        &self,
        result_id: &EligibilityResultId,
    ) -> Result<Vec<ApplicationScore>, RepositoryError> {
        Ok(self.tables()?.score_rows(result_id))
    }

    fn fetch_user(&self, id: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.tables()?.users.get(id).cloned())
    }

    fn upsert_user(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut tables = self.tables()?;
        tables.users.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn list_users(&self) -> Result<Vec<UserProfile>, RepositoryError> {
        Ok(self.tables()?.users.values().cloned().collect())
    }
}

/// Captures outbound e-mail instead of delivering it.
#[derive(Default, Clone)]
pub struct InMemoryMailer {
    outbox: Arc<Mutex<Vec<EmailMessage>>>,
}

impl InMemoryMailer {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.outbox
            .lock()
            .map(|outbox| outbox.clone())
            .unwrap_or_default()
    }
}

impl Mailer for InMemoryMailer {
    fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| MailError::Transport("outbox mutex poisoned".to_string()))?;
        outbox.push(message);
        Ok(())
    }
}

/// Records revalidated paths; a real deployment would purge its render cache here.
#[derive(Default, Clone)]
pub struct InMemoryPageCache {
    revalidated: Arc<Mutex<Vec<String>>>,
}

impl InMemoryPageCache {
    pub fn revalidated(&self) -> Vec<String> {
        self.revalidated
            .lock()
            .map(|paths| paths.clone())
            .unwrap_or_default()
    }
}

impl PageCache for InMemoryPageCache {
    fn revalidate(&self, path: &str) {
        if let Ok(mut paths) = self.revalidated.lock() {
            paths.push(path.to_string());
        }
    }
}
