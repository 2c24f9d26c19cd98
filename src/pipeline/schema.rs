//! Response schema and validation gate.
//!
//! The schema is sent to the model as part of the instructions, but the model
//! treats it as advice. Everything the model returns is re-validated here
//! before a [`Transaction`] is built:
//!
//! 1. Strip an outer ```` ```json ```` fence (models sometimes disobey the prompt)
//! 2. Parse JSON; require an object with a `transactions` array
//! 3. Validate each item: `date` (strict `YYYY-MM-DD`), `description`,
//!    `category` (strings) and `amount` (number, or numeric string)
//!
//! An item that fails step 3 is rejected whole and logged; the rest of the
//! document is kept. Steps 1–2 failing reject the whole response.

use crate::error::ExtractionError;
use crate::transaction::Transaction;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use tracing::{debug, warn};

/// The JSON Schema the model is asked to follow.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "transactions": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "date": { "type": "string", "description": "Transaction date, YYYY-MM-DD" },
                        "description": { "type": "string" },
                        "category": { "type": "string" },
                        "amount": { "type": "number", "description": "Positive for credits, negative for debits" }
                    },
                    "required": ["date", "description", "category", "amount"]
                }
            }
        },
        "required": ["transactions"]
    })
}

/// Outcome of validating one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub transactions: Vec<Transaction>,
    /// Items dropped by the gate, with the reason.
    pub rejected: Vec<String>,
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

fn strip_json_fences(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => trimmed,
    }
}

/// Validate the raw model output for the document `file`.
pub fn parse_response(file: &str, content: &str) -> Result<ParsedResponse, ExtractionError> {
    let body = strip_json_fences(content);
    if body.is_empty() {
        return Err(ExtractionError::EmptyResponse { file: file.to_string() });
    }

    let value: Value = serde_json::from_str(body).map_err(|e| ExtractionError::MalformedResponse {
        file: file.to_string(),
        detail: format!("not valid JSON: {e}"),
    })?;

    let items = value
        .as_object()
        .and_then(|o| o.get("transactions"))
        .and_then(Value::as_array)
        .ok_or_else(|| ExtractionError::MalformedResponse {
            file: file.to_string(),
            detail: "expected an object with a 'transactions' array".into(),
        })?;

    let mut parsed = ParsedResponse::default();
    for (idx, item) in items.iter().enumerate() {
        match validate_item(item) {
            Ok(tx) => parsed.transactions.push(tx),
            Err(reason) => {
                warn!("{}: rejecting transaction #{}: {}", file, idx + 1, reason);
                parsed.rejected.push(reason);
            }
        }
    }

    debug!(
        "{}: {} transactions accepted, {} rejected",
        file,
        parsed.transactions.len(),
        parsed.rejected.len()
    );
    Ok(parsed)
}

fn validate_item(item: &Value) -> Result<Transaction, String> {
    let obj = item
        .as_object()
        .ok_or_else(|| format!("expected an object, got {item}"))?;

    let date_str = required_str(obj, "date")?;
    let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
        .map_err(|_| format!("date '{date_str}' is not a valid YYYY-MM-DD date"))?;
    let description = required_str(obj, "description")?;
    let category = required_str(obj, "category")?;
    let amount = parse_amount(obj.get("amount"))?;

    Ok(Transaction::new(date, description, category, amount))
}

fn required_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a str, String> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(Value::Null) | None => Err(format!("missing '{field}'")),
        Some(other) => Err(format!("'{field}' must be a string, got {other}")),
    }
}

fn parse_amount(value: Option<&Value>) -> Result<Decimal, String> {
    let text = match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => return Err("missing 'amount'".into()),
        Some(other) => return Err(format!("'amount' must be a number, got {other}")),
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| format!("amount '{text}' is not a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(content: &str) -> ParsedResponse {
        parse_response("test.pdf", content).expect("should parse")
    }

    #[test]
    fn parses_valid_response() {
        let r = ok(r#"{"transactions":[
            {"date":"2024-03-05","description":"Coffee Shop","category":"Dining","amount":-4.50},
            {"date":"2024-01-10","description":"Employer Inc","category":"Salary","amount":2500.00}
        ]}"#);
        assert_eq!(r.transactions.len(), 2);
        assert!(r.rejected.is_empty());
        assert_eq!(r.transactions[0].amount.to_string(), "-4.5");
        assert_eq!(r.transactions[1].amount.to_string(), "2500");
        // document order is kept; sorting happens after the merge
        assert_eq!(r.transactions[0].description, "Coffee Shop");
    }

    #[test]
    fn explicit_empty_list_is_success() {
        let r = ok(r#"{"transactions": []}"#);
        assert!(r.transactions.is_empty());
    }

    #[test]
    fn strips_json_fences() {
        let r = ok("```json\n{\"transactions\":[{\"date\":\"2024-02-29\",\"description\":\"Rent\",\"category\":\"Bills\",\"amount\":-1200}]}\n```");
        assert_eq!(r.transactions.len(), 1);
    }

    #[test]
    fn empty_response_is_error() {
        assert!(matches!(
            parse_response("a.png", "   \n"),
            Err(ExtractionError::EmptyResponse { .. })
        ));
        assert!(matches!(
            parse_response("a.png", "```json\n\n```"),
            Err(ExtractionError::EmptyResponse { .. }) | Err(ExtractionError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn non_json_is_error() {
        let err = parse_response("a.png", "I could not read this image.").unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedResponse { .. }));
        assert!(err.to_string().contains("a.png"));
    }

    #[test]
    fn missing_transactions_array_is_error() {
        assert!(parse_response("a.png", r#"{"items": []}"#).is_err());
        assert!(parse_response("a.png", r#"[]"#).is_err());
        assert!(parse_response("a.png", r#"{"transactions": null}"#).is_err());
    }

    #[test]
    fn record_missing_a_field_is_rejected_whole() {
        let r = ok(r#"{"transactions":[
            {"date":"2024-01-02","description":"Bakery","amount":-3},
            {"date":"2024-01-03","description":"Bakery","category":null,"amount":-3},
            {"date":"2024-01-04","description":"Bakery","category":"Groceries","amount":-3}
        ]}"#);
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.rejected.len(), 2);
        assert!(r.rejected[0].contains("category"));
    }

    #[test]
    fn invalid_dates_are_rejected() {
        let r = ok(r#"{"transactions":[
            {"date":"2024-02-30","description":"x","category":"y","amount":1},
            {"date":"05/03/2024","description":"x","category":"y","amount":1},
            {"date":20240305,"description":"x","category":"y","amount":1}
        ]}"#);
        assert!(r.transactions.is_empty());
        assert_eq!(r.rejected.len(), 3);
    }

    #[test]
    fn numeric_string_amounts_accepted() {
        let r = ok(r#"{"transactions":[
            {"date":"2024-01-02","description":"Refund","category":"Shopping","amount":"19.90"},
            {"date":"2024-01-02","description":"Fee","category":"Fees","amount":"$5"}
        ]}"#);
        assert_eq!(r.transactions.len(), 1);
        assert_eq!(r.transactions[0].amount.to_string(), "19.9");
    }

    #[test]
    fn schema_requires_all_four_fields() {
        let schema = response_schema();
        let required = &schema["properties"]["transactions"]["items"]["required"];
        let fields: Vec<_> = required.as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert_eq!(fields, ["date", "description", "category", "amount"]);
    }
}
