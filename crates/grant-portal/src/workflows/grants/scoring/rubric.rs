use serde::{Deserialize, Serialize};

/// Single scored criterion on the reviewer form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: String,
    pub label: String,
    pub max_score: u16,
}

impl Criterion {
    fn new(id: &str, label: &str, max_score: u16) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            max_score,
        }
    }
}

/// Ordered list of criteria reviewers score against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRubric {
    pub criteria: Vec<Criterion>,
}

impl ScoringRubric {
    pub fn standard() -> Self {
        Self {
            criteria: vec![
                Criterion::new("business_viability", "Business viability", 25),
                Criterion::new("market_opportunity", "Market opportunity", 20),
                Criterion::new("innovation", "Innovation", 15),
                Criterion::new("team_capacity", "Team capacity", 15),
                Criterion::new("financial_management", "Financial management", 15),
                Criterion::new("social_impact", "Social impact", 10),
            ],
        }
    }

    pub fn criterion(&self, criteria_id: &str) -> Option<&Criterion> {
        self.criteria
            .iter()
            .find(|criterion| criterion.id == criteria_id)
    }

    pub fn max_total(&self) -> u32 {
        self.criteria
            .iter()
            .map(|criterion| u32::from(criterion.max_score))
            .sum()
    }
}

impl Default for ScoringRubric {
    fn default() -> Self {
        Self::standard()
    }
}
