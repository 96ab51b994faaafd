//! Document ingestion: filename classification, per-format text extraction,
//! normalization, and provenance-preserving chunking.

pub mod chunker;
pub mod extract;
pub mod filetype;
pub mod normalize;

pub use chunker::{parse_page_marker, Chunker};
pub use extract::{Extractor, Segment};
pub use filetype::{classify, DocumentType};
pub use normalize::{normalize_text, sanitize_filename};
