//! Document ingestion — uploaded bytes to normalized text.
//!
//! PDFs go through `pdf-extract`; everything else is decoded as UTF-8 (BOM
//! stripped) with a Windows-1252 fallback. Line endings are normalized to `\n`
//! in both paths so character offsets are stable across platforms.

use std::path::Path;

use tracing::debug;

use crate::errors::AppError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const PDF_MAGIC: &[u8] = b"%PDF";

/// A decoded document ready for entity recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    pub display_name: String,
    pub text: String,
    /// Human-readable label of the decoding that succeeded.
    pub encoding: &'static str,
}

/// Decodes an uploaded file. `description` names the document in errors
/// (e.g. "resume").
pub fn load_document(
    file_name: &str,
    bytes: &[u8],
    description: &str,
) -> Result<LoadedDocument, AppError> {
    let display_name = display_name(file_name);

    let (text, encoding) = if is_pdf(file_name, bytes) {
        (extract_pdf_text(bytes, description, &display_name)?, "PDF text")
    } else {
        decode_text(bytes)
    };

    if text.trim().is_empty() {
        return Err(AppError::Ingestion(format!(
            "The {description} file {display_name} is empty"
        )));
    }

    debug!(
        "Loaded {description} {display_name} as {encoding} ({} characters)",
        text.chars().count()
    );
    Ok(LoadedDocument {
        display_name,
        text,
        encoding,
    })
}

/// File name only, never the directories; quoted when it contains spaces.
pub fn display_name(file_name: &str) -> String {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or(file_name);
    if name.contains(' ') {
        format!("\"{name}\"")
    } else {
        name.to_string()
    }
}

/// UTF-8 (BOM stripped) first, then Windows-1252, which accepts any byte sequence.
pub fn decode_text(bytes: &[u8]) -> (String, &'static str) {
    if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        if let Ok(text) = std::str::from_utf8(rest) {
            return (normalize_newlines(text), "UTF-8 (with BOM)");
        }
    }
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (normalize_newlines(text), "UTF-8");
    }
    let (text, _had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
    (normalize_newlines(&text), "Windows-1252")
}

/// `\r\r\n`, `\r\n` and lone `\r` all become `\n`.
pub fn normalize_newlines(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\r\n", "\n")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

fn is_pdf(file_name: &str, bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
        || Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn extract_pdf_text(bytes: &[u8], description: &str, display_name: &str) -> Result<String, AppError> {
    let unreadable = |detail: String| {
        AppError::Ingestion(format!(
            "The {description} file {display_name} is not a readable PDF: {detail}"
        ))
    };

    // pdf-extract panics on some malformed documents instead of returning an error.
    let raw = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| unreadable("the document structure is corrupt".to_string()))?
        .map_err(|e| unreadable(e.to_string()))?;

    require_pdf_text(&raw, description, display_name)
}

/// Normalizes extracted text; a PDF without any text layer is rejected.
fn require_pdf_text(raw: &str, description: &str, display_name: &str) -> Result<String, AppError> {
    let text = normalize_pdf_text(raw);
    if text.is_empty() {
        return Err(AppError::Ingestion(format!(
            "The {description} file {display_name} appears to be image-only; run OCR and retry"
        )));
    }
    Ok(text)
}

/// Trims every line, collapses runs of spaces and blank lines, and replaces
/// non-breaking spaces.
fn normalize_pdf_text(raw: &str) -> String {
    let normalized = normalize_newlines(&raw.replace('\u{a0}', " "));

    let mut lines: Vec<String> = Vec::new();
    let mut previous_blank = false;
    for line in normalized.split('\n') {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(collapsed);
            previous_blank = false;
        }
    }

    lines.join("\n").trim().to_string()
}
