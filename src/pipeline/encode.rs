//! Document encoding: raw bytes → base64 payload → provider attachments.
//!
//! VLM APIs (OpenAI, Anthropic, Gemini) accept images as base64 embedded in
//! the JSON request body. The payload produced here is *pure* base64: any
//! `data:<mime>;base64,` envelope is stripped, because providers add their own
//! envelope when they build the request.
//!
//! Image slots only take raster formats. [`attachments`] turns a PDF into one
//! PNG per page and refuses HEIC for providers that cannot read it, so what
//! reaches the provider is always something it accepts.

use crate::document::{DocumentFile, DocumentSource, MediaType};
use crate::error::{ExtractionError, ReadError};
use crate::pipeline::render::render_pages;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::{Cursor, ErrorKind};
use tracing::debug;

/// Providers whose image slot reads HEIC natively.
const HEIC_PROVIDERS: &[&str] = &["gemini", "vertex-ai"];

/// A document ready to send to the vision model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedDocument {
    /// Original file name, carried for error messages and progress events.
    pub name: String,
    pub media_type: MediaType,
    /// Standard-alphabet base64 of the document bytes, without any header.
    pub payload: String,
}

impl EncodedDocument {
    /// The payload as-is, for media types the provider takes directly.
    fn passthrough(&self) -> ImageData {
        ImageData::new(self.payload.clone(), self.media_type.mime()).with_detail("high")
    }
}

/// Images to attach to the provider request for `doc`.
///
/// - JPEG, PNG, WEBP: the payload unchanged.
/// - PDF: every page rendered to PNG, in page order, capped at `max_pixels`.
/// - HEIC: unchanged for providers in [`HEIC_PROVIDERS`], refused otherwise.
///
/// `detail: "high"` asks GPT-4-class models for the full tile budget;
/// statements are dense and small print carries the amounts.
pub async fn attachments(
    doc: &EncodedDocument,
    provider: &str,
    max_pixels: u32,
) -> Result<Vec<ImageData>, ExtractionError> {
    match doc.media_type {
        MediaType::Jpeg | MediaType::Png | MediaType::Webp => Ok(vec![doc.passthrough()]),
        MediaType::Heic if HEIC_PROVIDERS.contains(&provider) => Ok(vec![doc.passthrough()]),
        MediaType::Heic => Err(ExtractionError::UnsupportedAttachment {
            file: doc.name.clone(),
            mime: doc.media_type.mime().to_string(),
            provider: provider.to_string(),
        }),
        MediaType::Pdf => {
            let fail = |detail: String| ExtractionError::Rasterisation {
                file: doc.name.clone(),
                detail,
            };
            let bytes = STANDARD
                .decode(&doc.payload)
                .map_err(|e| fail(format!("payload is not base64: {e}")))?;
            let pages = render_pages(&doc.name, bytes, max_pixels).await?;
            let images = pages
                .iter()
                .map(encode_page)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| fail(format!("PNG encoding failed: {e}")))?;
            debug!("{}: attached {} rendered pages", doc.name, images.len());
            Ok(images)
        }
    }
}

/// Encode a rendered page as a base64 PNG.
///
/// PNG is lossless; JPEG artefacts on rendered text degrade OCR accuracy.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(ImageData::new(STANDARD.encode(&buf), "image/png").with_detail("high"))
}

/// Read a document's bytes and encode them for transport.
///
/// Suspends while the bytes are read from disk. Fails with [`ReadError`] when
/// the file is gone, unreadable, or a data URL is malformed.
pub async fn encode_document(file: &DocumentFile) -> Result<EncodedDocument, ReadError> {
    let payload = match &file.source {
        DocumentSource::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
                ErrorKind::NotFound => ReadError::NotFound { path: path.clone() },
                ErrorKind::PermissionDenied => ReadError::PermissionDenied { path: path.clone() },
                _ => ReadError::Io {
                    name: file.name.clone(),
                    source: e,
                },
            })?;
            STANDARD.encode(&bytes)
        }
        DocumentSource::Bytes(bytes) => STANDARD.encode(bytes),
        DocumentSource::DataUrl(url) => {
            let payload = strip_data_url_prefix(url).ok_or_else(|| ReadError::InvalidDataUrl {
                name: file.name.clone(),
                reason: "missing 'data:<mime>;base64,' header".into(),
            })?;
            // Re-validate: a truncated upload must fail here, not at the provider.
            STANDARD
                .decode(payload)
                .map_err(|e| ReadError::InvalidDataUrl {
                    name: file.name.clone(),
                    reason: e.to_string(),
                })?;
            payload.to_string()
        }
    };

    debug!("Encoded '{}' ({}) → {} bytes base64", file.name, file.media_type, payload.len());

    Ok(EncodedDocument {
        name: file.name.clone(),
        media_type: file.media_type,
        payload,
    })
}

/// Strip a base64 data-URL header, returning the bare payload.
///
/// Plain payloads (no `data:` scheme) pass through unchanged. Returns `None`
/// for a `data:` URL that is not base64-encoded.
pub fn strip_data_url_prefix(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    match trimmed.strip_prefix("data:") {
        None => Some(trimmed),
        Some(rest) => {
            let (header, payload) = rest.split_once(',')?;
            header
                .split(';')
                .any(|p| p.eq_ignore_ascii_case("base64"))
                .then_some(payload)
        }
    }
}
