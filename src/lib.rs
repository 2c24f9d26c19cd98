//! # edgequake-statement2tsv
//!
//! Turn scanned bank statements and receipts into one chronologically ordered,
//! spreadsheet-ready transaction table, using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Statements arrive as PDFs, phone photos and screenshots, one per month or
//! per account. Copying rows by hand is slow and error-prone. This crate sends
//! each document to a VLM with a strict JSON response schema, validates every
//! record it gets back, merges the documents, sorts by date, and renders a
//! tab-separated table that pastes cleanly into any spreadsheet.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paths / URLs / data URLs
//!  │
//!  ├─ 1. Input    resolve, type by extension or magic bytes, drop unsupported
//!  ├─ 2. Dedup    SubmissionSet keyed by (name, size)
//!  ├─ 3. Encode   bytes → base64 ImageData
//!  ├─ 4. Render   PDF pages → PNG via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 5. VLM      concurrent calls to gpt-4.1-mini / claude / gemini / …
//!  ├─ 6. Gate     parse + validate JSON, reject malformed records
//!  ├─ 7. Merge    input order, then stable sort by date
//!  └─ 8. Output   TSV to stdout / file / clipboard
//! ```
//!
//! PDFs need the pdfium shared library at runtime: installed system-wide,
//! placed next to the binary, or pointed to by `PDFIUM_LIB_PATH`. HEIC photos
//! are sent as-is and only Gemini reads them; other providers refuse them
//! with [`ExtractionError::UnsupportedAttachment`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_statement2tsv::{extract_transactions, table, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ExtractionConfig::default();
//!     let txs = extract_transactions(&["january.pdf", "receipt.jpg"], &config).await?;
//!     println!("{}", table::serialize(&txs));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature     | Default | Description |
//! |-------------|---------|-------------|
//! | `cli`       | on      | Enables the `stmt2tsv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `clipboard` | on      | Enables [`clipboard::SystemClipboard`] via `arboard` |
//!
//! Disable both when using only the library:
//! ```toml
//! edgequake-statement2tsv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod clipboard;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod run;
pub mod submission;
pub mod table;
pub mod transaction;

// ── Re-exports ───────────────────────────────────────────────────────────

#[cfg(feature = "clipboard")]
pub use clipboard::SystemClipboard;
pub use clipboard::{ClipboardSink, MemoryClipboard};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_MODEL};
pub use document::{DocumentFile, DocumentSource, MediaType};
pub use error::{ExtractionError, ReadError, RunError};
pub use extract::{extract_sync, extract_to_file, extract_transactions};
pub use pipeline::encode::{encode_document, EncodedDocument};
pub use pipeline::llm::{LlmExtractor, TransactionExtractor};
pub use progress::{NoopProgressCallback, ProgressCallback, RunProgressCallback};
pub use run::{Pipeline, RunState};
pub use submission::SubmissionSet;
pub use transaction::Transaction;
