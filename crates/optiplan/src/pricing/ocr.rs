//! OCR collaborator seam. The engine itself lives outside this crate; the
//! optional `tesseract` feature wires in leptess.

use std::sync::Arc;

use crate::error::IngestError;

pub const DEFAULT_LANGUAGES: &str = "tur+eng";
pub const MIN_DPI: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrInput {
    /// Preprocessed PNG.
    Image,
    /// A PDF whose text layer was unusable.
    Pdf,
}

#[derive(Debug, Clone, Copy)]
pub struct OcrRequest<'a> {
    pub bytes: &'a [u8],
    pub input: OcrInput,
    pub languages: &'a str,
    pub dpi: u32,
}

pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(&self, request: &OcrRequest<'_>) -> Result<String, IngestError>;
}

/// Language string and resolution handed to every OCR call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrSettings {
    languages: String,
    dpi: u32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            dpi: MIN_DPI,
        }
    }
}

impl OcrSettings {
    /// Languages are joined with `+`; the DPI is raised to [`MIN_DPI`].
    pub fn new(languages: &[String], dpi: u32) -> Self {
        let languages = if languages.is_empty() {
            DEFAULT_LANGUAGES.to_string()
        } else {
            languages.join("+")
        };
        Self {
            languages,
            dpi: dpi.max(MIN_DPI),
        }
    }

    pub fn languages(&self) -> &str {
        &self.languages
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }

    pub fn request<'a>(&'a self, bytes: &'a [u8], input: OcrInput) -> OcrRequest<'a> {
        OcrRequest {
            bytes,
            input,
            languages: &self.languages,
            dpi: self.dpi,
        }
    }
}

/// Used when OCR is switched off; every call fails with `OcrUnavailable`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledOcr;

impl OcrBackend for DisabledOcr {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn recognize(&self, _request: &OcrRequest<'_>) -> Result<String, IngestError> {
        Err(IngestError::OcrUnavailable)
    }
}

/// The best backend compiled in, or [`DisabledOcr`] when `enabled` is false.
pub fn default_backend(enabled: bool) -> Arc<dyn OcrBackend> {
    if !enabled {
        return Arc::new(DisabledOcr);
    }
    #[cfg(feature = "tesseract")]
    {
        Arc::new(tesseract::TesseractOcr)
    }
    #[cfg(not(feature = "tesseract"))]
    {
        tracing::warn!("OCR enabled but built without the `tesseract` feature");
        Arc::new(DisabledOcr)
    }
}

#[cfg(feature = "tesseract")]
pub mod tesseract {
    use std::process::Command;

    use super::{OcrBackend, OcrInput, OcrRequest};
    use crate::error::IngestError;

    /// Tesseract through leptess. PDFs are rasterized page by page with
    /// `pdftoppm` (poppler-utils).
    #[derive(Debug, Default, Clone, Copy)]
    pub struct TesseractOcr;

    impl OcrBackend for TesseractOcr {
        fn name(&self) -> &'static str {
            "tesseract"
        }

        fn recognize(&self, request: &OcrRequest<'_>) -> Result<String, IngestError> {
            let _span = tracing::info_span!("pricing.ocr", backend = "tesseract").entered();
            match request.input {
                OcrInput::Image => recognize_png(request.bytes, request.languages),
                OcrInput::Pdf => {
                    let mut text = String::new();
                    for page in render_pdf_pages(request.bytes, request.dpi)? {
                        text.push_str(&recognize_png(&page, request.languages)?);
                        text.push('\n');
                    }
                    Ok(text)
                }
            }
        }
    }

    fn recognize_png(png: &[u8], languages: &str) -> Result<String, IngestError> {
        let mut lt = leptess::LepTess::new(None, languages).map_err(|e| {
            IngestError::OcrFailed(format!("Failed to initialize Tesseract: {}", e))
        })?;
        lt.set_image_from_mem(png)
            .map_err(|e| IngestError::OcrFailed(format!("Failed to set image for OCR: {}", e)))?;
        lt.get_utf8_text()
            .map_err(|e| IngestError::OcrFailed(format!("OCR failed: {}", e)))
    }

    fn render_pdf_pages(pdf_bytes: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>, IngestError> {
        let dir = std::env::temp_dir().join(format!("optiplan_ocr_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir)
            .map_err(|e| IngestError::PdfProcessing(format!("Failed to create temp dir: {}", e)))?;
        let result = render_into(&dir, pdf_bytes, dpi);
        let _ = std::fs::remove_dir_all(&dir);
        result
    }

    fn render_into(
        dir: &std::path::Path,
        pdf_bytes: &[u8],
        dpi: u32,
    ) -> Result<Vec<Vec<u8>>, IngestError> {
        let pdf_path = dir.join("input.pdf");
        std::fs::write(&pdf_path, pdf_bytes)
            .map_err(|e| IngestError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;

        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(&pdf_path)
            .arg(dir.join("page"))
            .output()
            .map_err(|e| {
                IngestError::PdfProcessing(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(IngestError::PdfProcessing(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let mut pages: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| IngestError::PdfProcessing(e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .collect();
        // pdftoppm zero-pads page numbers, so names sort in page order.
        pages.sort();

        pages
            .iter()
            .map(|p| {
                std::fs::read(p).map_err(|e| {
                    IngestError::PdfProcessing(format!("Failed to read rendered page: {}", e))
                })
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns canned text and remembers what it was asked.
    #[derive(Default)]
    pub(crate) struct ScriptedOcr {
        pub text: String,
        pub calls: Mutex<Vec<(OcrInput, String, u32)>>,
    }

    impl ScriptedOcr {
        pub(crate) fn returning(text: &str) -> Self {
            Self {
                text: text.to_string(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrBackend for ScriptedOcr {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn recognize(&self, request: &OcrRequest<'_>) -> Result<String, IngestError> {
            self.calls.lock().unwrap().push((
                request.input,
                request.languages.to_string(),
                request.dpi,
            ));
            Ok(self.text.clone())
        }
    }

    #[test]
    fn test_settings_defaults() {
        let settings = OcrSettings::default();
        assert_eq!(settings.languages(), "tur+eng");
        assert_eq!(settings.dpi(), 300);
    }

    #[test]
    fn test_settings_join_languages_and_floor_dpi() {
        let settings = OcrSettings::new(&["tur".to_string(), "eng".to_string()], 150);
        assert_eq!(settings.languages(), "tur+eng");
        assert_eq!(settings.dpi(), MIN_DPI);

        let settings = OcrSettings::new(&[], 400);
        assert_eq!(settings.languages(), DEFAULT_LANGUAGES);
        assert_eq!(settings.dpi(), 400);
    }

    #[test]
    fn test_disabled_backend() {
        let settings = OcrSettings::default();
        let result = DisabledOcr.recognize(&settings.request(b"x", OcrInput::Image));
        assert!(matches!(result, Err(IngestError::OcrUnavailable)));
        assert_eq!(default_backend(false).name(), "disabled");
    }
}
