//! JSON and CSV renderings of recorded change sets and ledger history.

use std::io::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{domain::ChangeSet, storage::ledger::LedgerEntry};

const CSV_HEADER: [&str; 10] = [
    "id",
    "apiId",
    "fromVersion",
    "toVersion",
    "changeType",
    "severity",
    "impactScore",
    "changeCount",
    "detectedAt",
    "summary",
];

/// Writes change sets as a pretty-printed JSON array.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_json<W: Write>(writer: W, change_sets: &[ChangeSet]) -> io::Result<()> {
    write_pretty(writer, change_sets)
}

/// Writes one CSV row per change set, preceded by a header row.
///
/// Fields are quoted when they contain a comma, a quote or a line break.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_csv<W: Write>(mut writer: W, change_sets: &[ChangeSet]) -> io::Result<()> {
    write_record(&mut writer, CSV_HEADER)?;
    for change_set in change_sets {
        let id = change_set.id.to_string();
        let impact_score = change_set.impact_score.to_string();
        let change_count = change_set.changes.len().to_string();
        let detected_at = timestamp(change_set.detected_at);
        write_record(
            &mut writer,
            [
                id.as_str(),
                change_set.api_id.as_str(),
                change_set.from_version.as_str(),
                change_set.to_version.as_str(),
                change_set.aggregate_change_type.as_str(),
                change_set.severity.as_str(),
                impact_score.as_str(),
                change_count.as_str(),
                detected_at.as_str(),
                change_set.summary.as_str(),
            ],
        )?;
    }
    writer.flush()
}

/// Snapshot metadata, without the document body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EntrySummary<'a> {
    version: &'a str,
    checksum: &'a str,
    observed_at: DateTime<Utc>,
}

/// Writes ledger history as a JSON array of snapshot metadata.
///
/// Document bodies are omitted.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_history_json<W: Write>(writer: W, entries: &[LedgerEntry]) -> io::Result<()> {
    let summaries: Vec<EntrySummary<'_>> = entries
        .iter()
        .map(|entry| EntrySummary {
            version: &entry.version,
            checksum: &entry.checksum,
            observed_at: entry.observed_at,
        })
        .collect();
    write_pretty(writer, &summaries)
}

fn write_pretty<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_record<'a, W: Write>(
    writer: &mut W,
    fields: impl IntoIterator<Item = &'a str>,
) -> io::Result<()> {
    let line: Vec<String> = fields.into_iter().map(escape).collect();
    write!(writer, "{}\r\n", line.join(","))
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::{ApiId, ChangeType, Impact, SpecDocument, Severity};

    fn change_set(summary: &str) -> ChangeSet {
        ChangeSet::new(
            ApiId::new("weather").unwrap(),
            "1.0".to_string(),
            "1.1".to_string(),
            Vec::new(),
            Impact {
                change_type: ChangeType::Breaking,
                severity: Severity::Critical,
                impact_score: 40,
            },
            summary.to_string(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn plain_fields_are_not_quoted() {
        assert_eq!(escape("weather"), "weather");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn special_fields_are_quoted() {
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn csv_has_header_and_one_row_per_change_set() {
        let change_set = change_set("weather v1.0 → v1.1 (breaking): 1 critical, 1 low changes detected");
        let mut out = Vec::new();
        write_csv(&mut out, std::slice::from_ref(&change_set)).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "id,apiId,fromVersion,toVersion,changeType,severity,impactScore,changeCount,detectedAt,summary"
        );
        assert_eq!(
            lines[1],
            format!(
                "{},weather,1.0,1.1,breaking,critical,40,0,2024-05-01T12:00:00Z,\"weather v1.0 → \
                 v1.1 (breaking): 1 critical, 1 low changes detected\"",
                change_set.id
            )
        );
    }

    #[test]
    fn json_uses_camel_case() {
        let mut out = Vec::new();
        write_json(&mut out, &[change_set("s")]).unwrap();

        let value: Value = serde_json::from_slice(&out).unwrap();
        let first = &value[0];
        assert_eq!(first["apiId"], "weather");
        assert_eq!(first["aggregateChangeType"], "breaking");
        assert_eq!(first["impactScore"], 40);
    }

    #[test]
    fn history_omits_documents() {
        let entry = LedgerEntry {
            version: "1.0".to_string(),
            checksum: "abc".to_string(),
            document: SpecDocument::new(json!({"openapi": "3.0.0"})),
            observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        };
        let mut out = Vec::new();
        write_history_json(&mut out, &[entry]).unwrap();

        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(
            value,
            json!([{
                "version": "1.0",
                "checksum": "abc",
                "observedAt": "2024-05-01T12:00:00Z"
            }])
        );
    }
}
