//! Plain-text listing output shared by fleet and info commands.

/// Tab-separated rows, an optional totals line, or an empty-state
/// message when there is nothing to list. Always newline-terminated.
pub fn format_listing(
    title: Option<&str>,
    rows: &[Vec<String>],
    totals: Option<&[(&'static str, usize)]>,
    empty_message: &str,
) -> String {
    let mut lines = Vec::new();
    if let Some(title) = title {
        lines.push(title.to_string());
    }
    if rows.is_empty() {
        lines.push(empty_message.to_string());
    } else {
        for row in rows {
            lines.push(row.join("\t"));
        }
        if let Some(totals) = totals {
            lines.push(
                totals
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .collect::<Vec<_>>()
                    .join("\t"),
            );
        }
    }
    lines.join("\n") + "\n"
}

/// `key: value` lines for single-item detail views.
pub fn format_vertical(fields: &[(&'static str, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}: {value}"))
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_listing_shows_message() {
        let out = format_listing(Some("STATUS:"), &[], None, "No PID file(s) found.");
        assert_eq!(out, "STATUS:\nNo PID file(s) found.\n");
    }

    #[test]
    fn rows_and_totals_are_tab_separated() {
        let rows = vec![vec!["Sleep".to_string(), "ALIVE".to_string()]];
        let out = format_listing(None, &rows, Some(&[("TOTAL", 1), ("ALIVE", 1)]), "-");
        assert_eq!(out, "Sleep\tALIVE\nTOTAL: 1\tALIVE: 1\n");
    }
}
