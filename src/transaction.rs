//! The transaction record produced by extraction.
//!
//! A [`Transaction`] is an immutable value: it is built once by the response
//! gate in [`crate::pipeline::schema`] and afterwards only reordered and
//! concatenated. Identity is structural equality.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One financial event read from a statement or receipt.
///
/// Deserialising goes through [`Transaction::new`], so the amount is
/// normalised however the input was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TransactionRecord")]
pub struct Transaction {
    /// Booking date (`YYYY-MM-DD`).
    pub date: NaiveDate,
    /// Merchant, payee or memo text as printed on the document.
    pub description: String,
    /// Free-form label inferred by the model (Groceries, Dining, Salary, …).
    pub category: String,
    /// Signed amount: positive for credits/income, negative for debits/expenses.
    pub amount: Decimal,
}

impl Transaction {
    /// Build a record, normalising the amount (`2500.00` → `2500`, `-0` → `0`).
    pub fn new(
        date: NaiveDate,
        description: impl Into<String>,
        category: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            category: category.into(),
            amount: amount.normalize(),
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

#[derive(Deserialize)]
struct TransactionRecord {
    date: NaiveDate,
    description: String,
    category: String,
    amount: Decimal,
}

impl From<TransactionRecord> for Transaction {
    fn from(r: TransactionRecord) -> Self {
        Transaction::new(r.date, r.description, r.category, r.amount)
    }
}

/// Stable in-place sort by calendar date; equal dates keep their relative order.
pub fn sort_by_date(transactions: &mut [Transaction]) {
    transactions.sort_by_key(|t| t.date);
}
