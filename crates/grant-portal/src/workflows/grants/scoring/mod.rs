mod rubric;

pub use rubric::{Criterion, ScoringRubric};

use std::collections::HashSet;

use super::domain::{ApplicationScore, EligibilityResult, ScoreItem};

/// Reasons a scoring form is refused before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoreValidationError {
    #[error("no scores were provided")]
    Empty,
    #[error("unknown scoring criterion '{0}'")]
    UnknownCriterion(String),
    #[error("score {score} for '{criteria_id}' exceeds maximum {max}")]
    OutOfRange {
        criteria_id: String,
        score: u16,
        max: u16,
    },
    #[error("criterion '{0}' appears more than once")]
    DuplicateCriterion(String),
}

/// Checks a batch against the rubric so a save is all-or-nothing.
pub fn validate_items(
    rubric: &ScoringRubric,
    items: &[ScoreItem],
) -> Result<(), ScoreValidationError> {
    if items.is_empty() {
        return Err(ScoreValidationError::Empty);
    }

    let mut seen = HashSet::new();
    for item in items {
        let criterion = rubric
            .criterion(&item.criteria_id)
            .ok_or_else(|| ScoreValidationError::UnknownCriterion(item.criteria_id.clone()))?;

        if item.score > criterion.max_score {
            return Err(ScoreValidationError::OutOfRange {
                criteria_id: item.criteria_id.clone(),
                score: item.score,
                max: criterion.max_score,
            });
        }

        if !seen.insert(item.criteria_id.as_str()) {
            return Err(ScoreValidationError::DuplicateCriterion(
                item.criteria_id.clone(),
            ));
        }
    }

    Ok(())
}

pub fn total_score(scores: &[ApplicationScore]) -> u32 {
    scores.iter().map(|score| u32::from(score.score)).sum()
}

/// Applies the final tally to a result about to be locked.
pub fn finalize(result: &mut EligibilityResult, scores: &[ApplicationScore], pass_mark: u32) {
    let total = total_score(scores);
    result.total_score = Some(total);
    result.is_eligible = result.flags.all_met() && total >= pass_mark;
}
