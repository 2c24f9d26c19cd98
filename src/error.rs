//! Error types for the edgequake-statement2tsv library.
//!
//! Three error types follow the three places a run can go wrong:
//!
//! * [`ReadError`] — a document's bytes could not be obtained (missing file,
//!   revoked permission, failed download, malformed data URL).
//!
//! * [`ExtractionError`] — one document could not be turned into transactions:
//!   it could not be attached (unrenderable PDF, a type the provider refuses)
//!   or the model returned nothing usable.
//!
//! * [`RunError`] — the aggregate error of a whole run. A run is all-or-nothing:
//!   the first per-file failure becomes the run's error and its message is
//!   surfaced unchanged (`#[error(transparent)]`).
//!
//! Clipboard failures have no variant: [`crate::clipboard::ClipboardSink`]
//! reports them as `false` instead of an error.

use std::path::PathBuf;
use thiserror::Error;

/// A document's bytes could not be read.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The file does not exist (or vanished between selection and the run).
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    NotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Any other I/O failure while reading the file.
    #[error("Failed to read '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// In-memory data URL without a `data:<mime>;base64,` header or with an
    /// undecodable payload.
    #[error("Invalid data URL for '{name}': {reason}")]
    InvalidDataUrl { name: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },
}

/// One document could not be turned into transactions.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The provider call itself failed (HTTP error, auth, rate limit, …).
    #[error("Extraction failed for '{file}': {message}")]
    Provider { file: String, message: String },

    /// The provider call did not finish within `api_timeout_secs`.
    #[error("Extraction timed out after {secs}s for '{file}'")]
    Timeout { file: String, secs: u64 },

    /// The provider answered with an empty body.
    #[error("Extraction returned an empty response for '{file}'")]
    EmptyResponse { file: String },

    /// The body is not JSON or lacks the `transactions` array.
    #[error("Extraction returned a malformed response for '{file}': {detail}")]
    MalformedResponse { file: String, detail: String },

    /// The selected provider cannot take this media type as an image.
    #[error(
        "'{file}' is {mime}, which provider '{provider}' does not accept as an image.\n\
Convert it to JPEG or PNG, or use --provider gemini."
    )]
    UnsupportedAttachment {
        file: String,
        mime: String,
        provider: String,
    },

    /// pdfium could not open or render the PDF.
    #[error("Failed to render PDF '{file}': {detail}")]
    Rasterisation { file: String, detail: String },

    /// No pdfium library could be loaded, so PDFs cannot be rendered.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
  • Install pdfium system-wide, or place it next to the binary.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumUnavailable(String),
}

/// The error of a whole extraction run.
#[derive(Debug, Error)]
pub enum RunError {
    /// A document could not be read.
    #[error(transparent)]
    Read(#[from] ReadError),

    /// A document could not be extracted.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// `run` was called while another run on the same pipeline is processing.
    #[error("An extraction run is already in progress")]
    Busy,

    /// The pipeline was reset while this run was in flight; its results were discarded.
    #[error("The extraction run was reset before it finished; results discarded")]
    Superseded,

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create or write the output TSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_error_surfaces_extraction_message_verbatim() {
        let inner = ExtractionError::EmptyResponse {
            file: "march.pdf".into(),
        };
        let expected = inner.to_string();
        let e: RunError = inner.into();
        assert_eq!(e.to_string(), expected);
        assert!(expected.contains("march.pdf"));
    }

    #[test]
    fn run_error_surfaces_read_message_verbatim() {
        let e: RunError = ReadError::NotFound {
            path: PathBuf::from("/nope/receipt.jpg"),
        }
        .into();
        assert!(e.to_string().starts_with("Document not found"), "got: {e}");
    }

    #[test]
    fn timeout_display() {
        let e = ExtractionError::Timeout {
            file: "scan.png".into(),
            secs: 90,
        };
        assert!(e.to_string().contains("90s"));
        assert!(e.to_string().contains("scan.png"));
    }

    #[test]
    fn download_timeout_display() {
        let e = ReadError::DownloadTimeout {
            url: "https://bank.example/stmt.pdf".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn pdfium_hint_names_env_var() {
        let e = ExtractionError::PdfiumUnavailable("not found".into());
        assert!(e.to_string().contains("PDFIUM_LIB_PATH"));
    }

    #[test]
    fn unsupported_attachment_names_file_and_provider() {
        let e = ExtractionError::UnsupportedAttachment {
            file: "IMG_0042.heic".into(),
            mime: "image/heic".into(),
            provider: "openai".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("IMG_0042.heic") && msg.contains("openai"), "got: {msg}");
    }

    #[test]
    fn busy_display() {
        assert!(RunError::Busy.to_string().contains("already in progress"));
    }
}
