//! End-to-end tests against a live vision model.
//!
//! These tests read sample statements from `./test_cases/` and make real LLM
//! API calls. They are gated behind the `E2E_ENABLED` environment variable so
//! they do not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 cargo test --test e2e -- --nocapture

use edgequake_statement2tsv::{
    extract_to_file, extract_transactions, table, ExtractionConfig, RunError,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir() -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases/output");
    std::fs::create_dir_all(&d).ok();
    d
}

/// Skip this test if E2E_ENABLED is not set *or* no document at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Assert the table is well-formed: header, 4 columns per row, no trailing newline.
fn assert_table_shape(tsv: &str, context: &str) {
    assert!(!tsv.is_empty(), "[{context}] table is empty");
    assert!(!tsv.ends_with('\n'), "[{context}] table ends with a newline");

    let mut lines = tsv.split('\n');
    assert_eq!(lines.next(), Some(table::HEADER), "[{context}] bad header");
    for (i, row) in lines.enumerate() {
        let cols: Vec<&str> = row.split('\t').collect();
        assert_eq!(cols.len(), 4, "[{context}] row {} has {} columns", i + 1, cols.len());
        assert!(
            chrono::NaiveDate::parse_from_str(cols[0], "%Y-%m-%d").is_ok(),
            "[{context}] row {} has a bad date {:?}",
            i + 1,
            cols[0]
        );
        assert!(
            cols[3].parse::<rust_decimal::Decimal>().is_ok(),
            "[{context}] row {} has a bad amount {:?}",
            i + 1,
            cols[3]
        );
    }

    println!("[{context}] ✓  {} rows, shape checks passed", tsv.lines().count() - 1);
}

// ── Live extraction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_bank_statement() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("bank_statement.pdf"));

    let txs = extract_transactions(&[path.to_str().unwrap()], &ExtractionConfig::default())
        .await
        .expect("extraction should succeed");

    assert!(!txs.is_empty(), "a bank statement should contain transactions");
    assert!(txs.windows(2).all(|w| w[0].date <= w[1].date));
    assert!(txs.iter().any(|t| t.is_debit()), "expected at least one debit");
    assert_table_shape(&table::serialize(&txs), "bank_statement");
}

#[tokio::test]
async fn test_extract_receipt_photo() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("receipt.jpg"));

    let txs = extract_transactions(&[path.to_str().unwrap()], &ExtractionConfig::default())
        .await
        .expect("extraction should succeed");

    assert!(!txs.is_empty());
    assert!(txs.iter().all(|t| !t.is_credit()), "a receipt holds only expenses");
}

#[tokio::test]
async fn test_merge_two_documents_to_file() {
    let a = e2e_skip_unless_ready!(test_cases_dir().join("bank_statement.pdf"));
    let b = e2e_skip_unless_ready!(test_cases_dir().join("receipt.jpg"));
    let out = output_dir().join("merged.tsv");

    let config = ExtractionConfig::builder().concurrency(2).build().unwrap();
    let n = extract_to_file(&[a.to_str().unwrap(), b.to_str().unwrap()], &out, &config)
        .await
        .expect("extraction should succeed");

    let tsv = std::fs::read_to_string(&out).unwrap();
    assert_eq!(tsv.lines().count(), n + 1);
    assert_table_shape(&tsv, "merged");
}

#[tokio::test]
async fn test_missing_document_fails_whole_run() {
    let a = e2e_skip_unless_ready!(test_cases_dir().join("bank_statement.pdf"));

    let result = extract_transactions(
        &[a.to_str().unwrap(), "/definitely/not/a/real/file.pdf"],
        &ExtractionConfig::default(),
    )
    .await;
    assert!(matches!(result, Err(RunError::Read(_))));
}
