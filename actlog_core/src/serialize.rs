//! Textual export formats for the filtered activity view.
//!
//! Both formats start with a header row naming the columns, followed by one
//! row per activity in the order they appear in the view.

use crate::{Activity, Error, ExportFormat, Result};
use std::borrow::Cow;

/// Column names, in output order
pub const COLUMNS: [&str; 8] = [
    "id",
    "date",
    "description",
    "duration",
    "resourceDetail",
    "category",
    "difficulty",
    "status",
];

/// A serialized export ready for delivery
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportPayload {
    pub format: ExportFormat,
    pub content: Vec<u8>,
}

impl ExportPayload {
    /// File name used when the payload is saved locally
    pub fn file_name(&self) -> String {
        format!("activities.{}", self.format)
    }

    /// Content as text (payloads are always UTF-8)
    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.content)
    }
}

/// A row in the export output
#[derive(Debug, serde::Serialize)]
struct ExportRow<'a> {
    id: u64,
    date: Option<String>,
    description: Cow<'a, str>,
    duration: Cow<'a, str>,
    #[serde(rename = "resourceDetail")]
    resource_detail: Cow<'a, str>,
    category: Cow<'a, str>,
    difficulty: Cow<'a, str>,
    status: Cow<'a, str>,
}

impl<'a> ExportRow<'a> {
    /// Build a row, passing every text field through `field`
    fn new(activity: &'a Activity, field: fn(&'a str) -> Cow<'a, str>) -> Self {
        ExportRow {
            id: activity.id,
            date: activity.date.map(|d| d.format("%Y-%m-%d").to_string()),
            description: field(&activity.description),
            duration: field(&activity.duration),
            resource_detail: field(&activity.resource_detail),
            category: field(&activity.category),
            difficulty: field(&activity.difficulty),
            status: field(&activity.status),
        }
    }
}

/// Replace tabs and line breaks so a field cannot split a txt row
fn single_line(value: &str) -> Cow<'_, str> {
    if value.contains(['\t', '\r', '\n']) {
        Cow::Owned(value.replace(['\t', '\r', '\n'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

/// Serialize activities for a download format
///
/// Email is not a file format; asking for it is a caller error.
pub fn serialize(format: ExportFormat, activities: &[Activity]) -> Result<ExportPayload> {
    let content = match format {
        ExportFormat::Csv => to_csv(activities)?,
        ExportFormat::Txt => to_txt(activities)?,
        ExportFormat::Email => {
            return Err(Error::Other(
                "email exports are dispatched, not serialized to a file".into(),
            ))
        }
    };

    tracing::debug!(
        "Serialized {} activities as {} ({} bytes)",
        activities.len(),
        format,
        content.len()
    );

    Ok(ExportPayload { format, content })
}

/// Comma-separated with RFC 4180 quoting
pub fn to_csv(activities: &[Activity]) -> Result<Vec<u8>> {
    let rows = activities.iter().map(|a| ExportRow::new(a, Cow::Borrowed));
    write_delimited(rows, b',', csv::QuoteStyle::Necessary)
}

/// Tab-separated plain text, one line per activity
///
/// Fields are never quoted; embedded tabs and line breaks become spaces.
pub fn to_txt(activities: &[Activity]) -> Result<Vec<u8>> {
    let rows = activities.iter().map(|a| ExportRow::new(a, single_line));
    write_delimited(rows, b'\t', csv::QuoteStyle::Never)
}

fn write_delimited<'a>(
    rows: impl Iterator<Item = ExportRow<'a>>,
    delimiter: u8,
    quote_style: csv::QuoteStyle,
) -> Result<Vec<u8>> {
    // Header row is written explicitly so an empty view still names its columns
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(quote_style)
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }

    writer.flush()?;
    writer
        .into_inner()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}
