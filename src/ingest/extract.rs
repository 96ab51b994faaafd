use std::collections::HashMap;
use std::io::{Cursor, Read, Seek};
use std::sync::Arc;

use base64::Engine as _;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::filetype::{mime_for_image, DocumentType};
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, ChatRequest, ContentPart, LlmProvider};

/// Extraction output. `page` is 1-based; formats without page structure
/// report page 1.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub page: u32,
}

impl Segment {
    pub fn new(text: impl Into<String>, page: u32) -> Self {
        Self {
            text: text.into(),
            page,
        }
    }
}

/// Cap on bytes read from a single archive entry, so a malformed OOXML file
/// cannot expand without bound.
const MAX_ZIP_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

const IMAGE_PROMPT: &str =
    "Describe this image in detail. Extract any text, charts, or key data points you see.";

/// Per-format text extraction. Image files go through the vision-capable
/// chat model; everything else is decoded locally.
pub struct Extractor {
    provider: Arc<dyn LlmProvider>,
    vision_model: String,
}

impl Extractor {
    pub fn new(provider: Arc<dyn LlmProvider>, vision_model: String) -> Self {
        Self {
            provider,
            vision_model,
        }
    }

    /// Errors are per-file: the caller logs them and lets the file
    /// contribute zero segments instead of aborting the batch.
    pub async fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
        doc_type: DocumentType,
        credential: &str,
    ) -> Result<Vec<Segment>, ApiError> {
        match doc_type {
            DocumentType::Pdf => extract_pdf(bytes, filename).await,
            DocumentType::Image => self.describe_image(bytes, filename, credential).await,
            DocumentType::Docs => extract_docx(bytes),
            DocumentType::Sheets => extract_xlsx(bytes),
            DocumentType::Csv => Ok(extract_csv(bytes)),
            DocumentType::Slides => extract_pptx(bytes),
            DocumentType::Text | DocumentType::Unknown => Ok(extract_plain(bytes)),
        }
    }

    async fn describe_image(
        &self,
        bytes: &[u8],
        filename: &str,
        credential: &str,
    ) -> Result<Vec<Segment>, ApiError> {
        let mime = mime_for_image(filename);
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let data_url = format!("data:{};base64,{}", mime, encoded);

        let request = ChatRequest::new(vec![ChatMessage::user_parts(vec![
            ContentPart::text(IMAGE_PROMPT),
            ContentPart::image(data_url),
        ])]);

        let description = self
            .provider
            .chat(request, &self.vision_model, credential)
            .await?;
        let description = description.trim();
        if description.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Segment::new(description, 1)])
    }
}

async fn extract_pdf(bytes: &[u8], filename: &str) -> Result<Vec<Segment>, ApiError> {
    let data = bytes.to_vec();
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
        .await
        .map_err(ApiError::internal)?
        .map_err(|err| ApiError::Internal(format!("PDF extraction failed: {}", err)))?;

    Ok(pdf_segments(&text, filename))
}

/// Splits extracted PDF text on form feeds into per-page segments. Pages
/// without text are skipped; a document where no page has text gets a single
/// sentinel segment instead of the vision path.
fn pdf_segments(text: &str, filename: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for (index, page_text) in text.split('\u{c}').enumerate() {
        let trimmed = page_text.trim();
        if trimmed.is_empty() {
            continue;
        }
        segments.push(Segment::new(trimmed, (index + 1) as u32));
    }

    if segments.is_empty() {
        segments.push(Segment::new(
            format!(
                "[PDF: {} - no extractable text (scanned or protected)]",
                filename
            ),
            1,
        ));
    }

    segments
}

fn extract_docx(bytes: &[u8]) -> Result<Vec<Segment>, ApiError> {
    let mut archive = open_archive(bytes)?;
    let Some(xml) = read_entry(&mut archive, "word/document.xml")? else {
        return Err(ApiError::Internal(
            "DOCX is missing word/document.xml".to_string(),
        ));
    };

    let mut paragraphs: Vec<String> = Vec::new();
    let mut rows: Vec<String> = Vec::new();

    let mut table_depth = 0usize;
    let mut in_text = false;
    let mut paragraph = String::new();
    let mut cell = String::new();
    let mut row: Vec<String> = Vec::new();

    let mut reader = Reader::from_str(&xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:tr" if table_depth > 0 => row.clear(),
                b"w:tc" if table_depth > 0 => cell.clear(),
                b"w:p" if table_depth == 0 => paragraph.clear(),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:tbl" => table_depth = table_depth.saturating_sub(1),
                b"w:tr" if table_depth > 0 => {
                    let line = row.join("\t");
                    if !line.trim().is_empty() {
                        rows.push(line);
                    }
                }
                b"w:tc" if table_depth > 0 => row.push(cell.trim().to_string()),
                b"w:p" => {
                    if table_depth == 0 {
                        let trimmed = paragraph.trim();
                        if !trimmed.is_empty() {
                            paragraphs.push(trimmed.to_string());
                        }
                    } else if !cell.is_empty() && !cell.ends_with(' ') {
                        // paragraph break inside a table cell
                        cell.push(' ');
                    }
                }
                b"w:t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                if let Ok(text) = t.unescape() {
                    if table_depth > 0 {
                        cell.push_str(&text);
                    } else {
                        paragraph.push_str(&text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ApiError::Internal(format!("DOCX parse error: {}", err))),
            _ => {}
        }
    }

    let mut parts = paragraphs;
    parts.extend(rows);
    if parts.is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Segment::new(parts.join("\n"), 1)])
}

fn extract_xlsx(bytes: &[u8]) -> Result<Vec<Segment>, ApiError> {
    let mut archive = open_archive(bytes)?;

    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let Some(workbook) = read_entry(&mut archive, "xl/workbook.xml")? else {
        return Err(ApiError::Internal(
            "XLSX is missing xl/workbook.xml".to_string(),
        ));
    };
    let sheets = parse_workbook_sheets(&workbook)?;

    let rels = read_entry(&mut archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();
    let targets = parse_relationship_targets(&rels)?;

    let mut segments = Vec::new();
    for (name, rid) in sheets {
        let Some(target) = targets.get(&rid) else {
            continue;
        };
        let path = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("xl/{}", target),
        };
        let Some(xml) = read_entry(&mut archive, &path)? else {
            continue;
        };

        let rows = parse_sheet_rows(&xml, &shared)?;
        if rows.is_empty() {
            continue;
        }

        let mut lines = vec![format!("--- {} ---", name)];
        lines.extend(rows);
        segments.push(Segment::new(lines.join("\n"), 1));
    }

    Ok(segments)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>, ApiError> {
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"si" => strings.push(current.clone()),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                if let Ok(text) = t.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ApiError::Internal(format!(
                    "XLSX shared strings parse error: {}",
                    err
                )))
            }
            _ => {}
        }
    }

    Ok(strings)
}

/// Sheet (name, relationship id) pairs in workbook order.
fn parse_workbook_sheets(xml: &str) -> Result<Vec<(String, String)>, ApiError> {
    let mut sheets = Vec::new();

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"sheet" => {
                let mut name = None;
                let mut rid = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"name" => name = attr.unescape_value().ok().map(|v| v.into_owned()),
                        b"r:id" => rid = attr.unescape_value().ok().map(|v| v.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(name), Some(rid)) = (name, rid) {
                    sheets.push((name, rid));
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ApiError::Internal(format!(
                    "XLSX workbook parse error: {}",
                    err
                )))
            }
            _ => {}
        }
    }

    Ok(sheets)
}

fn parse_relationship_targets(xml: &str) -> Result<HashMap<String, String>, ApiError> {
    let mut targets = HashMap::new();

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"Relationship" => {
                let mut id = None;
                let mut target = None;
                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = attr.unescape_value().ok().map(|v| v.into_owned()),
                        b"Target" => target = attr.unescape_value().ok().map(|v| v.into_owned()),
                        _ => {}
                    }
                }
                if let (Some(id), Some(target)) = (id, target) {
                    targets.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ApiError::Internal(format!(
                    "XLSX relationships parse error: {}",
                    err
                )))
            }
            _ => {}
        }
    }

    Ok(targets)
}

/// Tab-joined lines for rows with at least one non-blank cell. Shared-string
/// cells (`t="s"`) resolve through the shared table; everything else keeps
/// its literal value.
fn parse_sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<String>, ApiError> {
    let mut rows = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut cell_type = String::new();
    let mut value = String::new();
    let mut in_value = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"row" => cells.clear(),
                b"c" => {
                    cell_type.clear();
                    value.clear();
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"t" {
                            if let Ok(t) = attr.unescape_value() {
                                cell_type = t.into_owned();
                            }
                        }
                    }
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"c" => cells.push(String::new()),
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"row" => {
                    let line = cells.join("\t");
                    if !line.trim().is_empty() {
                        rows.push(line);
                    }
                }
                b"c" => {
                    let resolved = if cell_type == "s" {
                        value
                            .trim()
                            .parse::<usize>()
                            .ok()
                            .and_then(|index| shared.get(index))
                            .cloned()
                            .unwrap_or_default()
                    } else {
                        value.clone()
                    };
                    cells.push(resolved);
                }
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                if let Ok(text) = t.unescape() {
                    value.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ApiError::Internal(format!(
                    "XLSX sheet parse error: {}",
                    err
                )))
            }
            _ => {}
        }
    }

    Ok(rows)
}

fn extract_pptx(bytes: &[u8]) -> Result<Vec<Segment>, ApiError> {
    let mut archive = open_archive(bytes)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|number| (number, name.to_string())))
        .collect();
    slides.sort();

    let mut segments = Vec::new();
    for (number, name) in slides {
        let Some(xml) = read_entry(&mut archive, &name)? else {
            continue;
        };
        let text = parse_slide_text(&xml)?;
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        // Slide number survives even when earlier slides were empty.
        segments.push(Segment::new(text, number));
    }

    Ok(segments)
}

fn slide_number(path: &str) -> Option<u32> {
    path.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

fn parse_slide_text(xml: &str) -> Result<String, ApiError> {
    let mut text = String::new();
    let mut in_text = false;

    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"a:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"a:t" => in_text = false,
                b"a:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                if let Ok(run) = t.unescape() {
                    text.push_str(&run);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ApiError::Internal(format!(
                    "PPTX slide parse error: {}",
                    err
                )))
            }
            _ => {}
        }
    }

    Ok(text)
}

fn extract_csv(bytes: &[u8]) -> Vec<Segment> {
    let decoded = String::from_utf8_lossy(bytes);

    let mut lines = Vec::new();
    for record in parse_csv_records(&decoded) {
        if record.iter().any(|field| !field.trim().is_empty()) {
            lines.push(record.join("\t"));
        }
    }

    if lines.is_empty() {
        return Vec::new();
    }
    vec![Segment::new(lines.join("\n"), 1)]
}

/// Minimal CSV reader: double-quoted fields (with doubled-quote escapes) and
/// newlines inside quotes are honored; everything else splits on commas.
fn parse_csv_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(ch);
            }
            continue;
        }

        match ch {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

fn extract_plain(bytes: &[u8]) -> Vec<Segment> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    vec![Segment::new(text, 1)]
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<Cursor<&[u8]>>, ApiError> {
    zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ApiError::Internal(format!("Invalid archive: {}", err)))
}

fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ApiError> {
    let Ok(entry) = archive.by_name(name) else {
        return Ok(None);
    };

    let mut content = String::new();
    entry
        .take(MAX_ZIP_ENTRY_BYTES)
        .read_to_string(&mut content)
        .map_err(|err| ApiError::Internal(format!("Failed reading {}: {}", name, err)))?;
    Ok(Some(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::StubProvider;
    use std::io::Write as _;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            for (name, content) in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn docx_yields_paragraphs_then_table_rows() {
        let document = r#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>First paragraph</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">Second </w:t></w:r><w:r><w:t>paragraph</w:t></w:r></w:p>
<w:tbl><w:tr>
<w:tc><w:p><w:r><w:t>A1</w:t></w:r></w:p></w:tc>
<w:tc><w:p><w:r><w:t>B1</w:t></w:r></w:p></w:tc>
</w:tr></w:tbl>
<w:p><w:r><w:t>After table</w:t></w:r></w:p>
</w:body></w:document>"#;
        let bytes = build_zip(&[("word/document.xml", document)]);

        let segments = extract_docx(&bytes).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].page, 1);
        assert_eq!(
            segments[0].text,
            "First paragraph\nSecond paragraph\nAfter table\nA1\tB1"
        );
    }

    #[test]
    fn xlsx_skips_blank_sheets_but_keeps_the_rest() {
        let shared = r#"<sst><si><t>Name</t></si><si><t>Alice</t></si><si><t>Revenue</t></si></sst>"#;
        let workbook = r#"<workbook><sheets>
<sheet name="People" sheetId="1" r:id="rId1"/>
<sheet name="Empty" sheetId="2" r:id="rId2"/>
<sheet name="Numbers" sheetId="3" r:id="rId3"/>
</sheets></workbook>"#;
        let rels = r#"<Relationships>
<Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Target="worksheets/sheet3.xml"/>
</Relationships>"#;
        let sheet1 = r#"<worksheet><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>2</v></c></row>
<row r="2"><c r="A2" t="s"><v>1</v></c><c r="B2"><v>1200</v></c></row>
</sheetData></worksheet>"#;
        let sheet2 = r#"<worksheet><sheetData><row r="1"><c r="A1"/><c r="B1"/></row></sheetData></worksheet>"#;
        let sheet3 = r#"<worksheet><sheetData><row r="1"><c r="A1"><v>42</v></c></row></sheetData></worksheet>"#;
        let bytes = build_zip(&[
            ("xl/sharedStrings.xml", shared),
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", sheet1),
            ("xl/worksheets/sheet2.xml", sheet2),
            ("xl/worksheets/sheet3.xml", sheet3),
        ]);

        let segments = extract_xlsx(&bytes).unwrap();

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "--- People ---\nName\tRevenue\nAlice\t1200");
        assert_eq!(segments[1].text, "--- Numbers ---\n42");
    }

    #[test]
    fn pptx_keeps_slide_numbers_and_numeric_order() {
        let slide = |text: &str| {
            format!(
                r#"<p:sld><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sld>"#,
                text
            )
        };
        let bytes = build_zip(&[
            ("ppt/slides/slide10.xml", slide("Tenth slide").as_str()),
            ("ppt/slides/slide1.xml", slide("Title slide").as_str()),
            ("ppt/slides/slide2.xml", r#"<p:sld><p:txBody><a:p></a:p></p:txBody></p:sld>"#),
            ("ppt/slides/slide3.xml", slide("Third slide").as_str()),
        ]);

        let segments = extract_pptx(&bytes).unwrap();

        let pages: Vec<u32> = segments.iter().map(|segment| segment.page).collect();
        assert_eq!(pages, vec![1, 3, 10]);
        assert_eq!(segments[0].text, "Title slide");
        assert_eq!(segments[2].text, "Tenth slide");
    }

    #[test]
    fn csv_honors_quotes_and_drops_blank_rows() {
        let bytes = b"name,amount\n\"Smith, John\",100\n,,\n\"line\nbreak\",5\n";

        let segments = extract_csv(bytes);

        assert_eq!(segments.len(), 1);
        assert_eq!(
            segments[0].text,
            "name\tamount\nSmith, John\t100\nline\nbreak\t5"
        );
    }

    #[test]
    fn plain_text_decodes_lossily() {
        assert_eq!(extract_plain(b"hello world")[0].text, "hello world");
        assert!(extract_plain(b"   ").is_empty());
        assert!(extract_plain(b"").is_empty());

        let segments = extract_plain(&[0x68, 0x69, 0xFF]);
        assert!(segments[0].text.starts_with("hi"));
    }

    #[test]
    fn pdf_pages_split_on_form_feeds_with_sentinel_fallback() {
        let segments = pdf_segments("page one\u{c}page two\u{c}", "doc.pdf");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], Segment::new("page one", 1));
        assert_eq!(segments[1], Segment::new("page two", 2));

        let blank = pdf_segments("\u{c}  \u{c}", "scan.pdf");
        assert_eq!(blank.len(), 1);
        assert_eq!(blank[0].page, 1);
        assert!(blank[0].text.contains("scan.pdf"));
        assert!(blank[0].text.contains("no extractable text"));
    }

    #[test]
    fn pdf_pages_skip_blank_pages_but_keep_numbering() {
        let segments = pdf_segments("first\u{c}\u{c}third", "doc.pdf");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1], Segment::new("third", 3));
    }

    #[tokio::test]
    async fn garbage_pdf_bytes_fail_extraction() {
        let result = extract_pdf(b"definitely not a pdf", "bad.pdf").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn image_extraction_goes_through_the_vision_model() {
        let provider = StubProvider::with_reply("A chart showing Q3 revenue.");
        let extractor = Extractor::new(provider.clone(), "vision-model".to_string());

        let segments = extractor
            .extract(&[1, 2, 3], "chart.png", DocumentType::Image, "sk-test")
            .await
            .unwrap();

        assert_eq!(segments, vec![Segment::new("A chart showing Q3 revenue.", 1)]);
        assert_eq!(provider.chat_call_count(), 1);
        let prompts = provider.prompts();
        assert!(prompts[0].contains("Describe this image"));
    }

    #[tokio::test]
    async fn text_extraction_never_touches_the_model() {
        let provider = StubProvider::new();
        let extractor = Extractor::new(provider.clone(), "vision-model".to_string());

        let segments = extractor
            .extract(b"plain notes", "notes.txt", DocumentType::Text, "sk-test")
            .await
            .unwrap();

        assert_eq!(segments, vec![Segment::new("plain notes", 1)]);
        assert_eq!(provider.chat_call_count(), 0);
    }
}
