//! PDF rasterisation: every page of a statement → `DynamicImage` via pdfium.
//!
//! Vision endpoints take raster images only, so a PDF is rendered page by
//! page before it is attached. pdfium keeps thread-local state and is not
//! async-safe; rendering runs inside `spawn_blocking`.
//!
//! The longest edge of each page is capped at `max_pixels` regardless of the
//! physical page size, keeping memory bounded on oversized scans.

use crate::error::ExtractionError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// Render all pages of an in-memory PDF, in page order.
pub async fn render_pages(
    name: &str,
    bytes: Vec<u8>,
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, ExtractionError> {
    let file = name.to_string();
    tokio::task::spawn_blocking(move || render_pages_blocking(&file, &bytes, max_pixels))
        .await
        .map_err(|e| ExtractionError::Rasterisation {
            file: name.to_string(),
            detail: format!("render task panicked: {e}"),
        })?
}

fn render_pages_blocking(
    file: &str,
    bytes: &[u8],
    max_pixels: u32,
) -> Result<Vec<DynamicImage>, ExtractionError> {
    let pdfium = bind_pdfium()?;
    let fail = |detail: String| ExtractionError::Rasterisation {
        file: file.to_string(),
        detail,
    };

    let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.to_ascii_lowercase().contains("password") {
            fail("password-protected PDFs are not supported; export an unlocked copy".into())
        } else {
            fail(err_str)
        }
    })?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(fail("PDF has no pages".into()));
    }

    let mut images = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| fail(format!("page {}: {e:?}", idx + 1)))?;
        let image = bitmap.as_image();
        debug!(
            "{}: rendered page {} → {}x{} px",
            file,
            idx + 1,
            image.width(),
            image.height()
        );
        images.push(image);
    }
    Ok(images)
}

/// Bind to `PDFIUM_LIB_PATH`, then a library next to the binary, then the system one.
pub fn bind_pdfium() -> Result<Pdfium, ExtractionError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExtractionError::PdfiumUnavailable(format!("{e:?}")))?;
    Ok(Pdfium::new(bindings))
}

/// One blank 200×100 pt page. pdfium rebuilds the missing xref table.
#[cfg(test)]
pub(crate) const ONE_PAGE_PDF: &[u8] = b"%PDF-1.4
1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj
2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj
3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 200 100]>>endobj
trailer<</Root 1 0 R>>
%%EOF
";

#[cfg(test)]
mod tests {
    use super::*;

    /// pdfium is a runtime library; skip when this machine has none.
    macro_rules! skip_without_pdfium {
        () => {
            if let Err(e) = bind_pdfium() {
                println!("SKIP — pdfium not available: {e}");
                return;
            }
        };
    }

    #[tokio::test]
    async fn renders_every_page_within_pixel_cap() {
        skip_without_pdfium!();
        let pages = render_pages("blank.pdf", ONE_PAGE_PDF.to_vec(), 400)
            .await
            .unwrap();
        assert_eq!(pages.len(), 1);
        assert!(pages[0].width() <= 400 && pages[0].height() <= 400);
        assert!(pages[0].width() > pages[0].height());
    }

    #[tokio::test]
    async fn garbage_is_rasterisation_error() {
        skip_without_pdfium!();
        let err = render_pages("torn.pdf", b"%PDF-1.4 not really".to_vec(), 400)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ExtractionError::Rasterisation { ref file, .. } if file == "torn.pdf"),
            "got: {err:?}"
        );
    }
}
