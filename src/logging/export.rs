use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;

use super::DecisionLog;

#[derive(Debug, Serialize)]
struct LogEntry<'a> {
    id: i64,
    timestamp: &'a str,
    method: &'a str,
    url: &'a str,
    scheme: &'a str,
    verdict: &'a str,
    reason: &'a str,
}

impl<'a> From<&'a DecisionLog> for LogEntry<'a> {
    fn from(log: &'a DecisionLog) -> Self {
        LogEntry {
            id: log.id.unwrap_or(0),
            timestamp: &log.timestamp,
            method: &log.method,
            url: &log.url,
            scheme: &log.scheme,
            verdict: &log.verdict,
            reason: &log.reason,
        }
    }
}

/// Export all decisions as a pretty-printed JSON array.
pub fn export_json(conn: &Connection) -> Result<String> {
    let logs = super::query_recent(conn, usize::MAX)?;
    let entries: Vec<LogEntry> = logs.iter().map(LogEntry::from).collect();
    Ok(serde_json::to_string_pretty(&entries)?)
}

/// Export all decisions as CSV. Fields containing separators or quotes are quoted.
pub fn export_csv(conn: &Connection) -> Result<String> {
    let logs = super::query_recent(conn, usize::MAX)?;
    let mut output = String::from("id,timestamp,method,url,scheme,verdict,reason\n");
    for log in &logs {
        let fields = [
            log.id.unwrap_or(0).to_string(),
            csv_field(&log.timestamp),
            csv_field(&log.method),
            csv_field(&log.url),
            csv_field(&log.scheme),
            csv_field(&log.verdict),
            csv_field(&log.reason),
        ];
        output.push_str(&fields.join(","));
        output.push('\n');
    }
    Ok(output)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
