//! JSON rendering of a report.

use crate::models::Report;

/// Serialize a [`Report`] as pretty-printed JSON.
pub fn report_to_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
