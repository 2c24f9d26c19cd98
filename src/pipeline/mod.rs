//! Per-document pipeline stages.
//!
//! Each submodule implements exactly one transformation step; the
//! orchestrator in [`crate::run`] chains them per document.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ render ──▶ llm ──▶ schema
//! (path/URL)  (base64)  (PDF only)  (VLM)   (validate)
//! ```
//!
//! 1. [`input`]  — resolve a path, URL or data URL to a typed document handle
//! 2. [`encode`] — read the bytes, base64-wrap them, and build the image
//!    attachments the provider accepts
//! 3. [`render`] — rasterise PDF pages via pdfium (CPU-bound, `spawn_blocking`)
//! 4. [`llm`]    — the extractor seam and its VLM-backed implementation; the
//!    only stage with provider I/O
//! 5. [`schema`] — the JSON response schema and the validation gate that turns
//!    model output into [`crate::Transaction`] values

pub mod encode;
pub mod input;
pub mod llm;
pub mod render;
pub mod schema;
