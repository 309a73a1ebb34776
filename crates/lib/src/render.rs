//! Plain-text rendering of messages and timestamps for terminal output.

use crate::models::{Message, Role, Row};
use chrono::{DateTime, NaiveDateTime};

/// Column names of a result table, taken from the first row in its key order.
pub fn columns(rows: &[Row]) -> Vec<String> {
    rows.first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default()
}

/// Display form of one cell: strings unquoted, null empty, everything else as JSON.
pub fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a result table with padded columns and a header rule.
pub fn render_table(rows: &[Row]) -> String {
    let cols = columns(rows);
    if cols.is_empty() {
        return String::new();
    }
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            cols.iter()
                .map(|c| r.get(c).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = cols
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let mut out = String::new();
    out.push_str(&line(&cols));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &cells {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}

/// Full text of a message: the answer (or content), then the SQL, the table, and the row count.
pub fn render_message(message: &Message) -> String {
    if message.role == Role::User {
        return message.content.clone();
    }
    let mut parts = vec![message.display_text().trim().to_string()];
    if let Some(sql) = message.sql_query.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("SQL Query:\n{}", sql.trim()));
    }
    let rows = message.rows();
    if !rows.is_empty() {
        parts.push(render_table(rows));
    }
    if let Some(n) = message.rowcount.filter(|n| *n > 0) {
        parts.push(format!("Returned {} rows", n));
    }
    parts.retain(|p| !p.is_empty());
    parts.join("\n\n")
}

/// `YYYY-MM-DD HH:MM` for RFC 3339 or naive ISO timestamps; anything else verbatim.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return t.format("%Y-%m-%d %H:%M").to_string();
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(raw, fmt) {
            return t.format("%Y-%m-%d %H:%M").to_string();
        }
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        serde_json::from_value(json!([
            {"site": "Boston", "patients": 12, "note": null},
            {"site": "Lyon", "patients": 7, "note": "paused"}
        ]))
        .unwrap()
    }

    #[test]
    fn table_uses_first_row_key_order() {
        assert_eq!(columns(&rows()), ["site", "patients", "note"]);
        let t = render_table(&rows());
        let lines: Vec<&str> = t.lines().collect();
        assert_eq!(lines[0], "site   | patients | note");
        assert_eq!(lines[1], "-------+----------+-------");
        assert_eq!(lines[2], "Boston | 12       |");
        assert_eq!(lines[3], "Lyon   | 7        | paused");
    }

    #[test]
    fn assistant_message_sections() {
        let mut m = Message::assistant("Sites with patients");
        m.sql_query = Some("SELECT site, count(*) FROM dm GROUP BY site".to_string());
        m.data = Some(rows());
        m.rowcount = Some(2);
        let text = render_message(&m);
        assert!(text.starts_with("Sites with patients\n\nSQL Query:\nSELECT site"));
        assert!(text.contains("Boston | 12"));
        assert!(text.ends_with("Returned 2 rows"));
    }

    #[test]
    fn zero_rowcount_is_not_shown() {
        let mut m = Message::assistant("Nothing found");
        m.rowcount = Some(0);
        assert_eq!(render_message(&m), "Nothing found");
        m.rowcount = Some(-1);
        assert_eq!(render_message(&m), "Nothing found");
    }

    #[test]
    fn timestamps() {
        assert_eq!(format_timestamp("2025-03-01T10:15:00Z"), "2025-03-01 10:15");
        assert_eq!(format_timestamp("2025-03-01T10:15:42.123456"), "2025-03-01 10:15");
        assert_eq!(format_timestamp("yesterday"), "yesterday");
    }
}
