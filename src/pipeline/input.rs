//! Input resolution: turn a user-supplied path, URL or data URL into a
//! [`DocumentFile`].
//!
//! Local files are not read here, only stat'ed: the bytes are read later by
//! [`super::encode::encode_document`], concurrently with the other documents.
//! URLs are downloaded into memory. Documents whose type is outside the
//! allow-list resolve to `Ok(None)` and are dropped by the caller without an
//! error.

use crate::document::{DocumentFile, MediaType};
use crate::error::ReadError;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Check if the input string is an inline `data:` URL.
pub fn is_data_url(input: &str) -> bool {
    input.trim_start().starts_with("data:")
}

/// Resolve the input string to a document handle.
///
/// Returns `Ok(None)` for documents of an unsupported type.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<Option<DocumentFile>, ReadError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else if is_data_url(input) {
        Ok(resolve_data_url(input))
    } else {
        resolve_local(input)
    }
}

/// Inline documents are named after their type; the payload is decoded
/// (and validated) by the encoder.
fn resolve_data_url(input: &str) -> Option<DocumentFile> {
    let doc = DocumentFile::from_data_url("inline", input.trim());
    match doc {
        Some(mut doc) => {
            doc.name = format!("inline-{}.{}", doc.size, doc.media_type.extension());
            Some(doc)
        }
        None => {
            debug!("Dropping unsupported data URL");
            None
        }
    }
}

/// Resolve a local file: stat it, then type it by extension or magic bytes.
fn resolve_local(path_str: &str) -> Result<Option<DocumentFile>, ReadError> {
    let path = PathBuf::from(path_str);

    let size = match std::fs::metadata(&path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(ReadError::NotFound { path }),
        Err(e) if e.kind() == ErrorKind::PermissionDenied => {
            return Err(ReadError::PermissionDenied { path })
        }
        Err(e) => {
            return Err(ReadError::Io {
                name: path_str.to_string(),
                source: e,
            })
        }
    };

    let media_type = match MediaType::from_path(&path) {
        Some(mt) => Some(mt),
        None => sniff_file(&path)?,
    };

    match media_type {
        Some(mt) => {
            debug!("Resolved local document: {} ({})", path.display(), mt);
            Ok(Some(DocumentFile::from_path(path, size, mt)))
        }
        None => {
            debug!("Dropping unsupported document: {}", path.display());
            Ok(None)
        }
    }
}

fn sniff_file(path: &Path) -> Result<Option<MediaType>, ReadError> {
    let mut head = [0u8; 16];
    let n = std::fs::File::open(path)
        .and_then(|mut f| f.read(&mut head))
        .map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => ReadError::PermissionDenied { path: path.to_path_buf() },
            _ => ReadError::Io {
                name: path.display().to_string(),
                source: e,
            },
        })?;
    Ok(MediaType::sniff(&head[..n]))
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<Option<DocumentFile>, ReadError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ReadError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            ReadError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            ReadError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(ReadError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let declared = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(MediaType::from_mime);
    let filename = extract_filename(url);

    let bytes = response.bytes().await.map_err(|e| ReadError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    // Servers often answer `application/octet-stream`; fall back to the
    // URL's extension, then to the bytes themselves.
    let media_type = declared
        .or_else(|| MediaType::from_path(Path::new(&filename)))
        .or_else(|| MediaType::sniff(&bytes));

    let Some(media_type) = media_type else {
        debug!("Dropping unsupported download: {}", url);
        return Ok(None);
    };

    info!("Downloaded {} bytes ({}) from {}", bytes.len(), media_type, url);
    let bytes: Arc<[u8]> = Arc::from(bytes.as_ref());
    Ok(Some(DocumentFile::from_bytes(filename, media_type, bytes)))
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-document".to_string()
}
