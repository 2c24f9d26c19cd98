//! Document handles and the media-type allow-list.
//!
//! A [`DocumentFile`] is what the user selected: a name, a byte size, a media
//! type and a [`DocumentSource`] to read the bytes from. Only the five media
//! types in [`MediaType`] are accepted; everything else is dropped at the
//! boundary by the constructors that return `Option` and by
//! [`crate::pipeline::input::resolve_input`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Media types the vision model is asked to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Heic,
    Pdf,
}

impl MediaType {
    pub const ALL: [MediaType; 5] = [
        MediaType::Jpeg,
        MediaType::Png,
        MediaType::Webp,
        MediaType::Heic,
        MediaType::Pdf,
    ];

    /// The MIME string sent alongside the payload.
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
            MediaType::Heic => "image/heic",
            MediaType::Pdf => "application/pdf",
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "jpg",
            MediaType::Png => "png",
            MediaType::Webp => "webp",
            MediaType::Heic => "heic",
            MediaType::Pdf => "pdf",
        }
    }

    /// Parse a declared MIME type. Parameters (`; charset=…`) are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::Webp),
            "image/heic" | "image/heif" => Some(MediaType::Heic),
            "application/pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" | "jpe" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "webp" => Some(MediaType::Webp),
            "heic" | "heif" => Some(MediaType::Heic),
            "pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Identify a document by its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF") {
            Some(MediaType::Pdf)
        } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(MediaType::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(MediaType::Jpeg)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(MediaType::Webp)
        } else if bytes.len() >= 12
            && &bytes[4..8] == b"ftyp"
            && matches!(&bytes[8..12], b"heic" | b"heix" | b"heim" | b"heis" | b"mif1" | b"msf1")
        {
            Some(MediaType::Heic)
        } else {
            None
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Where a document's bytes come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A local file, read asynchronously when the run reaches it.
    Path(PathBuf),
    /// Bytes already in memory (downloaded, pasted, received over IPC).
    Bytes(Arc<[u8]>),
    /// A `data:<mime>;base64,<payload>` string, as produced by browser file readers.
    DataUrl(String),
}

/// One user-selected document.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub name: String,
    pub size: u64,
    pub media_type: MediaType,
    pub source: DocumentSource,
}

impl DocumentFile {
    /// Wrap in-memory bytes; the size is the byte length.
    pub fn from_bytes(name: impl Into<String>, media_type: MediaType, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            media_type,
            source: DocumentSource::Bytes(bytes),
        }
    }

    /// Wrap in-memory bytes with a declared MIME type. Returns `None` when the
    /// type is outside the allow-list, so callers can drop the file silently.
    pub fn with_mime(name: impl Into<String>, mime: &str, bytes: impl Into<Arc<[u8]>>) -> Option<Self> {
        let media_type = MediaType::from_mime(mime)?;
        Some(Self::from_bytes(name, media_type, bytes))
    }

    /// Wrap a `data:<mime>;base64,<payload>` string. Returns `None` when the
    /// declared type is missing or outside the allow-list.
    ///
    /// The size is the decoded length implied by the payload.
    pub fn from_data_url(name: impl Into<String>, url: impl Into<String>) -> Option<Self> {
        let url = url.into();
        let (header, payload) = url.trim().strip_prefix("data:")?.split_once(',')?;
        let media_type = MediaType::from_mime(header.split(';').next()?)?;
        let payload = payload.trim_end();
        let padding = payload.bytes().rev().take_while(|&b| b == b'=').count();
        let size = (payload.len() / 4 * 3).saturating_sub(padding) as u64;
        Some(Self {
            name: name.into(),
            size,
            media_type,
            source: DocumentSource::DataUrl(url),
        })
    }

    pub fn from_path(path: impl Into<PathBuf>, size: u64, media_type: MediaType) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            size,
            media_type,
            source: DocumentSource::Path(path),
        }
    }

    /// Deduplication key of the submission set.
    pub fn key(&self) -> (&str, u64) {
        (&self.name, self.size)
    }
}
