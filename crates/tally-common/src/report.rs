//! Vendor report JSON and the [`ReportDescriptor`] built from it.

use crate::catalog::ReportStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Base of the ERP application on the production portal.
pub const DEFAULT_ERP_BASE: &str = "https://etivity.comops.biz/ERP";

/// Message the portal returns once a report request has been queued.
pub const REQUEST_ACCEPTED_MESSAGE: &str = "Your request is being processed";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Malformed report response: {0}")]
    Malformed(String),

    #[error("Report record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Report index {index} out of range ({len} reports listed)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unknown report status: {0}")]
    UnknownStatus(String),
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Malformed(err.to_string())
    }
}

/// Body of the request-preview list response.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportListResponse {
    #[serde(rename = "Data", default)]
    pub data: Option<Vec<ReportRecord>>,
}

/// One entry of the request-preview list, as the vendor sends it.
///
/// Every key is optional at this layer; [`ReportDescriptor::from_record`]
/// decides which ones are required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReportRecord {
    #[serde(rename = "Id", default)]
    pub id: Option<Value>,
    #[serde(rename = "ReportFileName", default)]
    pub report_file_name: Option<String>,
    #[serde(rename = "ReportName", default)]
    pub report_name: Option<String>,
    #[serde(rename = "ReportStatus", default)]
    pub report_status: Option<String>,
    #[serde(rename = "ReportDate", default)]
    pub report_date: Option<Value>,
    #[serde(rename = "ReportDateStr", default)]
    pub report_date_str: Option<String>,
    #[serde(rename = "ErrorMessage", default)]
    pub error_message: Option<String>,
}

/// Body of the report-request response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestReportResponse {
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// Extracts the `Message` of a report-request response body.
pub fn parse_request_message(body: &str) -> Result<Option<String>, ReportError> {
    let response: RequestReportResponse = serde_json::from_str(body)?;
    Ok(response.message)
}

/// Metadata and download location of one generated report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportDescriptor {
    pub id: String,
    /// Windows-style path of the file on the portal's server.
    pub server_filepath: String,
    /// Lower-cased file name with extension, e.g. `report.csv`.
    pub filename_ext: String,
    /// Extension without the dot, e.g. `csv`.
    pub filetype: String,
    /// File name without the extension, e.g. `report`.
    pub filename: String,
    /// Human label of the report type, e.g. `Total Hours Worked`.
    pub report_type: Option<String>,
    pub status: ReportStatus,
    pub download_url: String,
    pub report_date: Option<String>,
    pub report_date_str: Option<String>,
    pub error_message: Option<String>,
}

impl ReportDescriptor {
    pub fn from_record(record: &ReportRecord, base_url: &str) -> Result<Self, ReportError> {
        let id = match &record.id {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(ReportError::MissingField("Id")),
        };
        let server_filepath = record
            .report_file_name
            .clone()
            .ok_or(ReportError::MissingField("ReportFileName"))?;
        let status_raw = record
            .report_status
            .as_deref()
            .ok_or(ReportError::MissingField("ReportStatus"))?;
        let status: ReportStatus = status_raw
            .parse()
            .map_err(|_| ReportError::UnknownStatus(status_raw.to_string()))?;

        let (filename_ext, filetype, filename) = split_server_filename(&server_filepath);
        let download_url = download_url(base_url, &id, &server_filepath, status);

        Ok(Self {
            id,
            server_filepath,
            filename_ext,
            filetype,
            filename,
            report_type: record.report_name.clone(),
            status,
            download_url,
            report_date: record.report_date.as_ref().and_then(value_to_string),
            report_date_str: record.report_date_str.clone(),
            error_message: record.error_message.clone(),
        })
    }

    /// A report is ready once the portal stops reporting it as processing.
    pub fn is_ready(&self) -> bool {
        self.status != ReportStatus::Processing
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Splits a server path into `(filename_ext, filetype, filename)`.
///
/// The last `\`-separated component is lower-cased; the extension is whatever
/// follows its last `.`. A name without a dot is its own extension and keeps
/// its full name as the base name.
pub fn split_server_filename(server_filepath: &str) -> (String, String, String) {
    let filename_ext = server_filepath
        .rsplit('\\')
        .next()
        .unwrap_or(server_filepath)
        .to_lowercase();
    let filetype = filename_ext
        .rsplit('.')
        .next()
        .unwrap_or(&filename_ext)
        .to_string();
    let filename = filename_ext
        .strip_suffix(&format!(".{}", filetype))
        .unwrap_or(&filename_ext)
        .to_string();
    (filename_ext, filetype, filename)
}

pub fn download_url(base_url: &str, id: &str, server_filepath: &str, status: ReportStatus) -> String {
    format!(
        "{}/RequestPreview/PrintPreview?reportRequestId={}&reportName=\\{}&reportStatus={}",
        base_url.trim_end_matches('/'),
        id,
        server_filepath,
        status
    )
}

/// Parses a request-preview list body into its records.
pub fn parse_report_list(body: &str) -> Result<Vec<ReportRecord>, ReportError> {
    let response: ReportListResponse = serde_json::from_str(body)?;
    response.data.ok_or(ReportError::MissingField("Data"))
}

/// Parses a list body and builds the descriptor at `index` (0 is the most recent).
pub fn select_report(body: &str, index: usize, base_url: &str) -> Result<ReportDescriptor, ReportError> {
    let records = parse_report_list(body)?;
    let record = records.get(index).ok_or(ReportError::IndexOutOfRange {
        index,
        len: records.len(),
    })?;
    ReportDescriptor::from_record(record, base_url)
}
