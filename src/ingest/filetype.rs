/// Closed set of document types the pipeline knows how to handle. The
/// variant label travels in chunk metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Pdf,
    Image,
    Docs,
    Sheets,
    Csv,
    Slides,
    Text,
    Unknown,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "pdf",
            DocumentType::Image => "image",
            DocumentType::Docs => "docs",
            DocumentType::Sheets => "sheets",
            DocumentType::Csv => "csv",
            DocumentType::Slides => "slides",
            DocumentType::Text => "text",
            DocumentType::Unknown => "unknown",
        }
    }
}

/// Classifies by lowercased extension. Anything unrecognized (including a
/// missing extension) is `Unknown` and gets treated as plain text downstream.
pub fn classify(filename: &str) -> DocumentType {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => DocumentType::Pdf,
        "png" | "jpg" | "jpeg" | "gif" | "webp" => DocumentType::Image,
        "doc" | "docx" => DocumentType::Docs,
        "xls" | "xlsx" => DocumentType::Sheets,
        "csv" => DocumentType::Csv,
        "ppt" | "pptx" => DocumentType::Slides,
        "txt" | "rtf" | "md" | "py" | "js" | "json" | "xml" | "html" | "css" => DocumentType::Text,
        _ => DocumentType::Unknown,
    }
}

/// MIME type for the vision data URL; extensions outside the image set fall
/// back to PNG.
pub fn mime_for_image(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "image/png",
    }
}
