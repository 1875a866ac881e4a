use std::collections::HashMap;

use chrono::NaiveDate;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::domain::{Application, ApplicationId, ApplicationStatus, Role, Track};
use super::repository::{ApplicationFilter, PortalRepository, RepositoryError};

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportKind {
    Applications,
    Applicants,
    Eligibility,
}

impl ExportKind {
    pub fn parse(raw: &str) -> Result<Self, ExportError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "applications" => Ok(ExportKind::Applications),
            "applicants" => Ok(ExportKind::Applicants),
            "eligibility" => Ok(ExportKind::Eligibility),
            _ => Err(ExportError::UnsupportedType(raw.to_string())),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ExportKind::Applications => "applications",
            ExportKind::Applicants => "applicants",
            ExportKind::Eligibility => "eligibility",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Json,
    Xlsx,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Result<Self, ExportError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "xlsx" => Ok(ExportFormat::Xlsx),
            _ => Err(ExportError::UnsupportedFormat(raw.to_string())),
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> String {
        match self {
            ExportFormat::Csv => mime::TEXT_CSV_UTF_8.to_string(),
            ExportFormat::Json => mime::APPLICATION_JSON.to_string(),
            ExportFormat::Xlsx => XLSX_CONTENT_TYPE.to_string(),
        }
    }
}

/// Body of `POST /api/export`. Type and format stay raw so unsupported values map to 400.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportRequest {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub filters: ExportFilters,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportFilters {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub track: Option<String>,
}

impl ExportFilters {
    fn to_filter(&self) -> Result<ApplicationFilter, ExportError> {
        let status = match self.status.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(ApplicationStatus::parse(raw).ok_or_else(|| {
                ExportError::InvalidFilter {
                    field: "status",
                    value: raw.to_string(),
                }
            })?),
            None => None,
        };
        let track = match self.track.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(Track::parse(raw).ok_or_else(|| ExportError::InvalidFilter {
                field: "track",
                value: raw.to_string(),
            })?),
            None => None,
        };

        Ok(ApplicationFilter {
            status,
            track,
            applicant_id: None,
        })
    }

    fn is_empty(&self) -> bool {
        self.status.is_none() && self.track.is_none()
    }
}

/// A validated export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub kind: ExportKind,
    pub format: ExportFormat,
    pub filter: ApplicationFilter,
    pub filtered: bool,
}

impl ExportPlan {
    pub fn from_request(request: &ExportRequest) -> Result<Self, ExportError> {
        Ok(Self {
            kind: ExportKind::parse(&request.kind)?,
            format: ExportFormat::parse(&request.format)?,
            filter: request.filters.to_filter()?,
            filtered: !request.filters.is_empty(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("unsupported export type '{0}' (expected applications, applicants, or eligibility)")]
    UnsupportedType(String),
    #[error("unsupported export format '{0}' (expected csv, json, or xlsx)")]
    UnsupportedFormat(String),
    #[error("invalid {field} filter '{value}'")]
    InvalidFilter { field: &'static str, value: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("failed to write CSV export: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush CSV export: {0}")]
    Buffer(String),
    #[error("failed to write JSON export: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write spreadsheet export: {0}")]
    Xlsx(#[from] XlsxError),
}

impl ExportError {
    /// Request-shape problems the caller can fix, as opposed to write failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExportError::UnsupportedType(_)
                | ExportError::UnsupportedFormat(_)
                | ExportError::InvalidFilter { .. }
        )
    }
}

/// Format-neutral rows collected for an export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<String>>,
}

/// Encoded file ready to be served as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

pub fn collect_table<R: PortalRepository + ?Sized>(
    repository: &R,
    plan: &ExportPlan,
) -> Result<ExportTable, ExportError> {
    let applications = repository.list_applications(&plan.filter)?;

    let table = match plan.kind {
        ExportKind::Applications => applications_table(&applications),
        ExportKind::Applicants => {
            let by_applicant: HashMap<_, _> = applications
                .iter()
                .map(|application| (application.applicant_id.clone(), application))
                .collect();
            let mut rows = Vec::new();
            for user in repository.list_users()? {
                if user.role() != Some(Role::Applicant) {
                    continue;
                }
                let application = by_applicant.get(&user.id);
                if plan.filtered && application.is_none() {
                    continue;
                }
                rows.push(vec![
                    user.id.0.clone(),
                    user.name.clone(),
                    user.email.clone(),
                    application.map(|app| app.id.0.clone()).unwrap_or_default(),
                    application
                        .map(|app| app.status.label().to_string())
                        .unwrap_or_default(),
                    application
                        .map(|app| app.track.label().to_string())
                        .unwrap_or_default(),
                ]);
            }
            ExportTable {
                headers: vec![
                    "user_id",
                    "name",
                    "email",
                    "application_id",
                    "status",
                    "track",
                ],
                rows,
            }
        }
        ExportKind::Eligibility => {
            let names: HashMap<&ApplicationId, &str> = applications
                .iter()
                .map(|application| (&application.id, application.business.business_name.as_str()))
                .collect();
            let mut rows = Vec::new();
            for result in repository.list_results()? {
                let Some(business_name) = names.get(&result.application_id) else {
                    continue;
                };
                rows.push(vec![
                    result.application_id.0.clone(),
                    business_name.to_string(),
                    result.flags.age.to_string(),
                    result.flags.registration.to_string(),
                    result.flags.revenue.to_string(),
                    result.flags.business_plan.to_string(),
                    result.flags.impact.to_string(),
                    result
                        .total_score
                        .map(|total| total.to_string())
                        .unwrap_or_default(),
                    result.is_eligible.to_string(),
                    result.is_locked.to_string(),
                ]);
            }
            ExportTable {
                headers: vec![
                    "application_id",
                    "business_name",
                    "age",
                    "registration",
                    "revenue",
                    "business_plan",
                    "impact",
                    "total_score",
                    "is_eligible",
                    "is_locked",
                ],
                rows,
            }
        }
    };

    Ok(table)
}

fn applications_table(applications: &[Application]) -> ExportTable {
    let rows = applications
        .iter()
        .map(|application| {
            vec![
                application.id.0.clone(),
                application.applicant_id.0.clone(),
                application.business.business_name.clone(),
                application.business.sector.clone(),
                application.business.county.clone(),
                application.track.label().to_string(),
                application.status.label().to_string(),
                application.screening.annual_revenue.to_string(),
                application.submitted_at.to_rfc3339(),
            ]
        })
        .collect();

    ExportTable {
        headers: vec![
            "application_id",
            "applicant_id",
            "business_name",
            "sector",
            "county",
            "track",
            "status",
            "annual_revenue",
            "submitted_at",
        ],
        rows,
    }
}

pub fn encode(
    table: &ExportTable,
    plan: &ExportPlan,
    generated_on: NaiveDate,
) -> Result<ExportFile, ExportError> {
    let bytes = match plan.format {
        ExportFormat::Csv => encode_csv(table)?,
        ExportFormat::Json => encode_json(table)?,
        ExportFormat::Xlsx => encode_xlsx(table, plan.kind.label())?,
    };

    Ok(ExportFile {
        filename: format!(
            "{}-{}.{}",
            plan.kind.label(),
            generated_on.format("%Y%m%d"),
            plan.format.extension()
        ),
        content_type: plan.format.content_type(),
        bytes,
    })
}

fn encode_csv(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|err| ExportError::Buffer(err.to_string()))
}

fn encode_json(table: &ExportTable) -> Result<Vec<u8>, ExportError> {
    let records: Vec<Value> = table
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .headers
                .iter()
                .zip(row)
                .map(|(header, value)| (header.to_string(), Value::String(value.clone())))
                .collect();
            Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_vec_pretty(&records)?)
}

fn encode_xlsx(table: &ExportTable, sheet_name: &str) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (index, row) in table.rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            worksheet.write_string(index as u32 + 1, col as u16, value.as_str())?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
