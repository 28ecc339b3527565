//! DOCX extraction implementation.

use deck_core::normalize::{collapse_whitespace, sanitize_file_stem};
use deck_core::{ContentBlock, DocumentFormat, Error, Result, SourceDocument};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use std::sync::LazyLock;
use zip::ZipArchive;

/// Figure label such as `Fig. 3` or `Figure 12`.
static FIGURE_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(fig(?:ure)?\.?\s*\d+)").unwrap());

/// Caption text after a `Figure N.` label.
static CAPTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)fig(?:ure)?\.?\s*\d+\.\s*(.*)").unwrap());

const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_RELS: &str = "word/_rels/document.xml.rels";

/// Caption words carried into an image file name.
const CAPTION_WORDS: usize = 6;

/// Extractor for DOCX (Office Open XML) files.
pub struct DocxExtractor<R> {
    archive: ZipArchive<R>,
    filename: String,
}

impl DocxExtractor<BufReader<File>> {
    /// Open a DOCX file on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        Self::from_reader(BufReader::new(file), filename)
    }
}

impl DocxExtractor<Cursor<Vec<u8>>> {
    /// Use an in-memory DOCX file.
    pub fn from_bytes(data: Vec<u8>, filename: &str) -> Result<Self> {
        if DocumentFormat::from_magic(&data) == Some(DocumentFormat::Doc) {
            return Err(Error::UnsupportedFormat(format!(
                "{} is a legacy .doc file; only .docx is supported",
                filename
            )));
        }
        Self::from_reader(Cursor::new(data), filename)
    }
}

impl<R: Read + Seek> DocxExtractor<R> {
    pub fn from_reader(reader: R, filename: &str) -> Result<Self> {
        let archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;
        Ok(Self {
            archive,
            filename: filename.to_string(),
        })
    }

    /// Extract the document body in reading order.
    ///
    /// Embedded images are written into `image_dir`, which is emptied of
    /// files first. Each relationship id is written once, however often the
    /// document shows it.
    pub fn extract(&mut self, image_dir: &Path) -> Result<SourceDocument> {
        let relationships = match self.read_text(DOCUMENT_RELS) {
            Ok(xml) => parse_relationships(&xml)?,
            Err(e) => {
                log::warn!("No document relationships ({}); images will be skipped", e);
                HashMap::new()
            }
        };
        let xml = self.read_text(DOCUMENT_PART)?;
        let items = parse_body(&xml)?;
        prepare_image_dir(image_dir)?;

        let mut document = SourceDocument::new(&self.filename, DocumentFormat::Docx);
        let mut written: HashSet<&str> = HashSet::new();
        let mut image_count = 0;

        for (idx, item) in items.iter().enumerate() {
            match item {
                BodyItem::Table(rows) => document.add_block(ContentBlock::Table { rows: rows.clone() }),
                BodyItem::Paragraph { text, embeds } => {
                    if !text.is_empty() {
                        document.add_block(ContentBlock::Paragraph { text: text.clone() });
                    }

                    for embed in embeds {
                        if !written.insert(embed.as_str()) {
                            log::debug!("Image {} already extracted", embed);
                            continue;
                        }
                        let Some(part) = relationships.get(embed) else {
                            log::warn!("Image relationship {} not found", embed);
                            continue;
                        };

                        let context = image_context(&items, idx);
                        match self.write_image(part, image_dir, image_count + 1, context.as_deref()) {
                            Ok(path) => {
                                image_count += 1;
                                document.add_block(ContentBlock::Image { path, context });
                            }
                            Err(e) => log::warn!("Skipping image {}: {}", part, e),
                        }
                    }
                }
            }
        }

        log::info!(
            "Extracted {} blocks ({} images) from {}",
            document.blocks.len(),
            image_count,
            self.filename
        );
        Ok(document)
    }

    fn write_image(
        &mut self,
        part: &str,
        image_dir: &Path,
        number: usize,
        context: Option<&str>,
    ) -> Result<String> {
        let data = self.read_binary(part)?;
        let ext = Path::new(part)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_else(|| "png".to_string());

        let path = image_dir.join(format!("img_{}_{}.{}", number, image_label(context), ext));
        fs::write(&path, data)?;
        log::debug!("Wrote {}", path.display());
        Ok(path.to_string_lossy().into_owned())
    }

    fn read_text(&mut self, path: &str) -> Result<String> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;
        Ok(content)
    }

    fn read_binary(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut file = self
            .archive
            .by_name(path)
            .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;
        Ok(data)
    }
}

/// A top-level element of the document body.
#[derive(Debug, Clone, PartialEq)]
enum BodyItem {
    Paragraph { text: String, embeds: Vec<String> },
    Table(Vec<Vec<String>>),
}

#[derive(Debug, Default)]
struct ParagraphBuf {
    text: String,
    embeds: Vec<String>,
}

/// Streaming walk over `w:body`.
#[derive(Debug, Default)]
struct BodyWalker {
    items: Vec<BodyItem>,
    in_body: bool,
    in_text: bool,
    paragraph: Option<ParagraphBuf>,
    /// `w:p` elements open inside the current paragraph (text boxes).
    nested_paragraphs: u32,
    table_depth: u32,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
}

impl BodyWalker {
    /// Where run text currently goes.
    fn sink(&mut self) -> Option<&mut String> {
        if self.table_depth > 0 {
            Some(&mut self.cell)
        } else {
            self.paragraph.as_mut().map(|p| &mut p.text)
        }
    }

    fn start(&mut self, e: &BytesStart<'_>) {
        match local_name(e.name().as_ref()) {
            b"body" => self.in_body = true,
            b"tbl" if self.in_body && self.paragraph.is_none() => {
                self.table_depth += 1;
                if self.table_depth == 1 {
                    self.rows.clear();
                }
            }
            b"tr" if self.table_depth == 1 => self.row.clear(),
            b"tc" if self.table_depth == 1 => self.cell.clear(),
            b"p" if self.table_depth > 0 => {
                if !self.cell.is_empty() {
                    self.cell.push(' ');
                }
            }
            b"p" if self.in_body => {
                if self.paragraph.is_some() {
                    self.nested_paragraphs += 1;
                    self.push_space();
                } else {
                    self.paragraph = Some(ParagraphBuf::default());
                }
            }
            b"t" => self.in_text = true,
            b"blip" => self.blip(e),
            _ => {}
        }
    }

    fn empty(&mut self, e: &BytesStart<'_>) {
        match local_name(e.name().as_ref()) {
            b"tab" | b"br" | b"cr" => self.push_space(),
            b"blip" => self.blip(e),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text {
            if let Some(sink) = self.sink() {
                sink.push_str(text);
            }
        }
    }

    fn end(&mut self, name: &[u8]) {
        match local_name(name) {
            b"body" => self.in_body = false,
            b"t" => self.in_text = false,
            b"tc" if self.table_depth == 1 => {
                let cell = collapse_whitespace(&self.cell);
                self.row.push(cell);
            }
            b"tr" if self.table_depth == 1 => {
                if !self.row.is_empty() {
                    self.rows.push(std::mem::take(&mut self.row));
                }
            }
            b"tbl" if self.table_depth > 0 => {
                self.table_depth -= 1;
                if self.table_depth == 0 && !self.rows.is_empty() {
                    self.items.push(BodyItem::Table(std::mem::take(&mut self.rows)));
                }
            }
            b"p" if self.table_depth == 0 => {
                if self.nested_paragraphs > 0 {
                    self.nested_paragraphs -= 1;
                } else if let Some(paragraph) = self.paragraph.take() {
                    self.items.push(BodyItem::Paragraph {
                        text: collapse_whitespace(&paragraph.text),
                        embeds: paragraph.embeds,
                    });
                }
            }
            _ => {}
        }
    }

    fn push_space(&mut self) {
        if let Some(sink) = self.sink() {
            sink.push(' ');
        }
    }

    fn blip(&mut self, e: &BytesStart<'_>) {
        let embed = e
            .attributes()
            .flatten()
            .find(|attr| local_name(attr.key.as_ref()) == b"embed")
            .map(|attr| String::from_utf8_lossy(&attr.value).to_string());
        let Some(embed) = embed else {
            return;
        };

        match self.paragraph.as_mut() {
            Some(paragraph) if self.table_depth == 0 => paragraph.embeds.push(embed),
            _ => log::debug!("Ignoring image {} outside a body paragraph", embed),
        }
    }
}

/// Parse `word/document.xml` into top-level paragraphs and tables.
fn parse_body(xml: &str) -> Result<Vec<BodyItem>> {
    // Run text keeps its surrounding spaces, so no trimming here.
    let mut reader = Reader::from_str(xml);
    let mut walker = BodyWalker::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => walker.start(e),
            Ok(Event::Empty(ref e)) => walker.empty(e),
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default();
                walker.text(&text);
            }
            Ok(Event::End(ref e)) => walker.end(e.name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::DocxParseError(format!(
                    "Error parsing {}: {}",
                    DOCUMENT_PART, e
                )));
            }
            _ => {}
        }
    }

    Ok(walker.items)
}

/// Map relationship ids to archive paths of internal targets.
fn parse_relationships(xml: &str) -> Result<HashMap<String, String>> {
    let mut relationships = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut id = String::new();
                let mut target = String::new();
                let mut external = false;

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"TargetMode" => {
                            external = attr.value.eq_ignore_ascii_case(b"external");
                        }
                        _ => {}
                    }
                }

                if !id.is_empty() && !external {
                    relationships.insert(id, resolve_path(DOCUMENT_PART, &target));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(relationships)
}

/// Resolve a relationship target against the part that owns it.
fn resolve_path(base: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base.split('/').collect();
    parts.pop();
    for component in target.split('/') {
        match component {
            ".." => {
                parts.pop();
            }
            "." | "" => {}
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Text describing the image held by paragraph `idx`.
///
/// The paragraph's own text wins; otherwise a figure caption right after
/// it; otherwise the nearest non-empty paragraph before it.
fn image_context(items: &[BodyItem], idx: usize) -> Option<String> {
    let paragraph_text = |item: &BodyItem| match item {
        BodyItem::Paragraph { text, .. } if !text.is_empty() => Some(text.clone()),
        _ => None,
    };

    if let Some(own) = items.get(idx).and_then(paragraph_text) {
        return Some(own);
    }
    if let Some(next) = items.get(idx + 1).and_then(paragraph_text) {
        if FIGURE_LABEL_REGEX.is_match(&next) {
            return Some(next);
        }
    }
    items[..idx].iter().rev().find_map(paragraph_text)
}

/// File-name label for an image: the figure label plus up to six caption
/// words, or `image` when the context has neither.
fn image_label(context: Option<&str>) -> String {
    let context = context.unwrap_or_default();
    let mut parts = Vec::new();

    if let Some(caps) = FIGURE_LABEL_REGEX.captures(context) {
        parts.push(sanitize_file_stem(&caps[1]).to_uppercase());
    }
    if let Some(caps) = CAPTION_REGEX.captures(context) {
        let words: Vec<&str> = caps[1].split_whitespace().take(CAPTION_WORDS).collect();
        if !words.is_empty() {
            parts.push(words.join("_"));
        }
    }

    let label = sanitize_file_stem(&parts.join("_"));
    if label.is_empty() {
        "image".to_string()
    } else {
        label
    }
}

/// Create `dir` and remove the files a previous run left in it.
fn prepare_image_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)?;
        }
    }
    Ok(())
}

/// Extract the local name from a potentially namespaced XML name.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().position(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
