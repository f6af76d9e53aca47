//! Embedded-text extraction with a quality gate deciding when OCR is needed.

/// Outcome of reading a PDF's own text layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfText {
    Embedded(String),
    NeedsOcr(OcrReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrReason {
    /// lopdf could not parse the file.
    ParseFailed,
    /// Empty, encoding markers only, or mostly non-alphanumeric.
    TextQuality,
}

impl OcrReason {
    pub fn as_str(self) -> &'static str {
        match self {
            OcrReason::ParseFailed => "parse_failed",
            OcrReason::TextQuality => "text_quality",
        }
    }
}

pub fn extract_text(pdf_bytes: &[u8]) -> PdfText {
    let _span = tracing::info_span!("pricing.pdf").entered();

    let doc = match lopdf::Document::load_mem(pdf_bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!("lopdf failed to parse price list: {}. Falling back to OCR.", e);
            return PdfText::NeedsOcr(OcrReason::ParseFailed);
        }
    };

    let mut text = String::new();
    for (page_num, _) in doc.get_pages() {
        if let Ok(page_text) = doc.extract_text(&[page_num]) {
            text.push_str(&page_text);
            text.push('\n');
        }
    }

    if should_use_ocr(&text) {
        PdfText::NeedsOcr(OcrReason::TextQuality)
    } else {
        PdfText::Embedded(text)
    }
}

/// Marker lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Below this length the alphanumeric ratio is not checked.
const MIN_TOTAL_CHARS: usize = 50;

const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// True when the text layer is empty, only decoding markers, or garbled.
pub fn should_use_ocr(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return true;
    }

    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT
}
