use serde::{Deserialize, Serialize};

use super::domain::{RegistrationStatus, ScreeningAnswers, Track};
use crate::config::PortalConfig;

/// Revenue at or above this amount leaves the Foundation-only band.
pub const FOUNDATION_REVENUE_CEILING: u64 = 500_000;
/// Revenue strictly above this amount always places a business in Acceleration.
pub const ACCELERATION_REVENUE_FLOOR: u64 = 3_000_000;
/// Years of trading that promote a middle-band business to Acceleration.
pub const ACCELERATION_MIN_YEARS: f32 = 2.0;

/// Limits applied by the screening that are not hard-coded programme bands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningRules {
    pub min_founder_age: u8,
    pub max_founder_age: u8,
    pub max_employees: u32,
}

impl ScreeningRules {
    pub fn from_config(config: &PortalConfig) -> Self {
        Self {
            min_founder_age: config.min_founder_age,
            max_founder_age: config.max_founder_age,
            max_employees: config.max_employees,
        }
    }
}

impl Default for ScreeningRules {
    fn default() -> Self {
        Self::from_config(&PortalConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevenueBand {
    #[serde(rename = "under_500k")]
    Under500k,
    #[serde(rename = "500k_to_3m")]
    Between500kAnd3m,
    #[serde(rename = "over_3m")]
    Over3m,
}

impl RevenueBand {
    pub fn from_amount(annual_revenue: u64) -> Self {
        if annual_revenue < FOUNDATION_REVENUE_CEILING {
            RevenueBand::Under500k
        } else if annual_revenue > ACCELERATION_REVENUE_FLOOR {
            RevenueBand::Over3m
        } else {
            RevenueBand::Between500kAnd3m
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DisqualificationReason {
    NotRegistered,
    NoFinancialRecords,
    FounderAgeOutOfRange { age: u8, min: u8, max: u8 },
    TooManyEmployees { count: u32, max: u32 },
}

impl DisqualificationReason {
    pub fn summary(&self) -> String {
        match self {
            DisqualificationReason::NotRegistered => {
                "business must be registered or have registration in progress".to_string()
            }
            DisqualificationReason::NoFinancialRecords => {
                "business must keep financial records".to_string()
            }
            DisqualificationReason::FounderAgeOutOfRange { age, min, max } => {
                format!("founder age {age} outside eligible range {min}-{max}")
            }
            DisqualificationReason::TooManyEmployees { count, max } => {
                format!("{count} employees exceeds programme limit of {max}")
            }
        }
    }
}

/// Result of screening a set of answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScreeningOutcome {
    Eligible {
        track: Track,
        revenue_band: RevenueBand,
    },
    Disqualified {
        revenue_band: RevenueBand,
        reasons: Vec<DisqualificationReason>,
    },
}

impl ScreeningOutcome {
    pub fn track(&self) -> Option<Track> {
        match self {
            ScreeningOutcome::Eligible { track, .. } => Some(*track),
            ScreeningOutcome::Disqualified { .. } => None,
        }
    }

    pub fn summary(&self) -> String {
        match self {
            ScreeningOutcome::Eligible { track, .. } => {
                format!("eligible for the {} track", track.label())
            }
            ScreeningOutcome::Disqualified { reasons, .. } => {
                let details: Vec<String> = reasons.iter().map(|reason| reason.summary()).collect();
                format!("not eligible: {}", details.join("; "))
            }
        }
    }
}

/// Classify an applicant. Every disqualifier is reported, not only the first.
pub fn screen(answers: &ScreeningAnswers, rules: &ScreeningRules) -> ScreeningOutcome {
    let revenue_band = RevenueBand::from_amount(answers.annual_revenue);
    let mut reasons = Vec::new();

    if answers.registration_status == RegistrationStatus::NotRegistered {
        reasons.push(DisqualificationReason::NotRegistered);
    }

    if !answers.keeps_financial_records {
        reasons.push(DisqualificationReason::NoFinancialRecords);
    }

    if answers.founder_age < rules.min_founder_age || answers.founder_age > rules.max_founder_age {
        reasons.push(DisqualificationReason::FounderAgeOutOfRange {
            age: answers.founder_age,
            min: rules.min_founder_age,
            max: rules.max_founder_age,
        });
    }

    if answers.employee_count > rules.max_employees {
        reasons.push(DisqualificationReason::TooManyEmployees {
            count: answers.employee_count,
            max: rules.max_employees,
        });
    }

    if !reasons.is_empty() {
        return ScreeningOutcome::Disqualified {
            revenue_band,
            reasons,
        };
    }

    let track = match revenue_band {
        RevenueBand::Under500k => Track::Foundation,
        RevenueBand::Over3m => Track::Acceleration,
        RevenueBand::Between500kAnd3m if answers.years_operating >= ACCELERATION_MIN_YEARS => {
            Track::Acceleration
        }
        RevenueBand::Between500kAnd3m => Track::Foundation,
    };

    ScreeningOutcome::Eligible {
        track,
        revenue_band,
    }
}
