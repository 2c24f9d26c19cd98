//! Tab-separated serialization of a transaction list.
//!
//! The output is shaped for pasting into a spreadsheet: one header row, one
//! row per transaction, exactly four tab-separated columns, `\n` between rows
//! and no trailing newline. Free-text fields are sanitized so an embedded tab
//! or line break can never shift a column or split a row.

use crate::transaction::Transaction;
use once_cell::sync::Lazy;
use regex::Regex;

/// Header row. Column order is fixed.
pub const HEADER: &str = "Date\tDescription\tCategory\tAmount";

/// Runs of tabs/line breaks inside a field.
static RE_FIELD_BREAKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\t\r\n]+").unwrap());

/// Serialize `transactions` in the given order.
///
/// An empty list yields an empty string, not a lone header.
pub fn serialize(transactions: &[Transaction]) -> String {
    if transactions.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(HEADER.len() + transactions.len() * 48);
    out.push_str(HEADER);
    for tx in transactions {
        out.push('\n');
        out.push_str(&format_row(tx));
    }
    out
}

fn format_row(tx: &Transaction) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        tx.date.format("%Y-%m-%d"),
        sanitize_field(&tx.description),
        sanitize_field(&tx.category),
        tx.amount.normalize()
    )
}

/// Replace every run of tab/CR/LF characters with one space, then trim.
pub fn sanitize_field(value: &str) -> String {
    RE_FIELD_BREAKS.replace_all(value, " ").trim().to_string()
}
