//! Flat tabular export of a user's leave history
use super::leave::LeaveRequest;

const HEADER: &str = "ID,Purpose,From,To,Type,Status,SubmittedAt";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Serialize leave records to delimited, quoted text for download. Column
/// order matches the record's display fields; no schema beyond that.
pub fn leave_history_csv(leaves: &[LeaveRequest]) -> String {
    let mut lines = vec![HEADER.to_string()];
    for leave in leaves {
        let id_prefix: String = leave.id.chars().take(8).collect();
        let submitted = leave
            .submitted_at
            .to_datetime_utc()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let fields = [
            id_prefix,
            leave.purpose.to_string(),
            leave.from_date.to_string(),
            leave.to_date.to_string(),
            leave.day_type.to_string(),
            leave.status.to_string(),
            submitted,
        ];
        let row: Vec<String> = fields.iter().map(|f| quote(f)).collect();
        lines.push(row.join(","));
    }
    lines.join("\n")
}
