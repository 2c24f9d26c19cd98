//! System prompts for VLM-based transaction extraction.
//!
//! Callers can override the rule text via
//! [`crate::config::ExtractionConfig::system_prompt`]; the response schema is
//! always appended, since the response gate depends on it.

use crate::pipeline::schema::response_schema;

/// Default extraction rules. `{current_year}` is replaced at call time.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert bookkeeper. Your task is to read a scanned financial document (bank statement, credit card statement, receipt or invoice) and extract every financial transaction it contains.

Follow these rules precisely:

1. WHAT TO EXTRACT
   - One entry per transaction line, in the order they appear on the document
   - date: the transaction (booking) date formatted as YYYY-MM-DD
   - description: the merchant, payee or memo text as printed
   - category: a short label you infer from the description
   - amount: a plain number, no currency symbol, no thousands separator

2. SIGN CONVENTION
   - Credits, deposits, refunds and income are POSITIVE
   - Debits, purchases, withdrawals, fees and expenses are NEGATIVE
   - Use the document's debit/credit columns or DR/CR markers to decide the sign

3. CATEGORIES
   - Infer the category from the description text
   - Use short free-form labels such as Groceries, Dining, Transport, Salary,
     Bills, Transfer, Shopping, Health, Entertainment, Fees
   - Pick the closest label; invent a new short label if none fits

4. WHAT TO SKIP
   - Column headers, page headers and footers
   - Opening balance, closing balance and balance brought/carried forward lines
   - Subtotals, totals and summary boxes
   - Anything that is not an individual transaction

5. DATES
   - If a date has no year, infer it from the statement period or other dates
     on the document; if there is no context, use {current_year}

6. OUTPUT FORMAT
   - Output ONLY a JSON object matching the schema below
   - Do NOT wrap it in ```json fences
   - Do NOT add commentary or explanations
   - If the document contains no transactions, return {"transactions": []}"#;

/// User-turn text sent with the document attachment.
pub const USER_INSTRUCTION: &str =
    "Extract all transactions from this document as JSON.";

/// Build the full system message: rules (default or override) plus the schema.
pub fn extraction_instructions(custom_rules: Option<&str>, current_year: i32) -> String {
    let rules = custom_rules
        .unwrap_or(DEFAULT_SYSTEM_PROMPT)
        .replace("{current_year}", &current_year.to_string());
    format!(
        "{rules}\n\nRESPONSE SCHEMA (JSON Schema):\n{:#}",
        response_schema()
    )
}
