//! Presentation template loading.
//!
//! A template is any PPTX. Everything but its slides is carried into the deck;
//! the slides are discarded when a deck is composed.

use crate::layout::{Rect, SlideGeometry};
use crate::package::{
    extract_slide_number, local_name, parse_relationships, rels_path_for, resolve_target,
    PRESENTATION_PART, PRESENTATION_RELS, REL_TYPE_SLIDE, REL_TYPE_SLIDE_LAYOUT,
    REL_TYPE_SLIDE_MASTER,
};
use deck_core::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use zip::ZipArchive;

/// 10in x 7.5in, used when `p:sldSz` is absent.
const DEFAULT_SLIDE_SIZE: (i64, i64) = (9_144_000, 6_858_000);

/// A placeholder declared on a slide layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// `type` attribute; `None` means the default (`obj`).
    pub ph_type: Option<String>,
    pub idx: Option<u32>,
    /// Explicit position, when the layout overrides the master's.
    pub frame: Option<Rect>,
}

impl Placeholder {
    fn is_title(&self) -> bool {
        matches!(self.ph_type.as_deref(), Some("title") | Some("ctrTitle"))
    }

    fn is_body(&self) -> bool {
        matches!(
            self.ph_type.as_deref(),
            None | Some("body") | Some("obj") | Some("subTitle")
        )
    }

    /// The `p:ph` element a slide uses to bind to this placeholder.
    pub fn reference_xml(&self) -> String {
        let mut xml = String::from("<p:ph");
        if let Some(ref ph_type) = self.ph_type {
            xml.push_str(&format!(r#" type="{}""#, ph_type));
        }
        if let Some(idx) = self.idx {
            xml.push_str(&format!(r#" idx="{}""#, idx));
        }
        xml.push_str("/>");
        xml
    }
}

/// A slide layout with the placeholders content is written into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideLayout {
    /// Archive path, e.g. `ppt/slideLayouts/slideLayout2.xml`.
    pub part: String,
    pub name: Option<String>,
    pub title: Option<Placeholder>,
    pub body: Option<Placeholder>,
}

impl SlideLayout {
    /// Relationship target from a slide part in `ppt/slides/`.
    pub fn target_from_slide(&self) -> String {
        match self.part.strip_prefix("ppt/") {
            Some(rest) => format!("../{}", rest),
            None => format!("/{}", self.part),
        }
    }
}

/// A loaded PPTX template.
#[derive(Debug, Clone)]
pub struct Template {
    parts: Vec<(String, Vec<u8>)>,
    slide_size: (i64, i64),
    layouts: Vec<SlideLayout>,
    slides: Vec<String>,
}

impl Template {
    /// Load a template from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::TemplateError(format!("Cannot open template {}: {}", path.display(), e))
        })?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a template from an in-memory PPTX.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(bytes))
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open template ZIP: {}", e)))?;

        let mut parts = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut file = archive
                .by_index(i)
                .map_err(|e| Error::ZipError(format!("Failed to read entry {}: {}", i, e)))?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", name, e)))?;
            parts.push((name, data));
        }

        let mut template = Self {
            parts,
            slide_size: DEFAULT_SLIDE_SIZE,
            layouts: Vec::new(),
            slides: Vec::new(),
        };

        let presentation = template.part_text(PRESENTATION_PART).map_err(|_| {
            Error::TemplateError(format!("Template has no {}", PRESENTATION_PART))
        })?;
        if let Some(size) = parse_slide_size(&presentation)? {
            template.slide_size = size;
        }

        let pres_rels = match template.part_text(PRESENTATION_RELS) {
            Ok(xml) => parse_relationships(&xml)?,
            Err(_) => {
                return Err(Error::TemplateError(format!(
                    "Template has no {}",
                    PRESENTATION_RELS
                )))
            }
        };

        let mut slides: Vec<(String, Option<usize>)> = pres_rels
            .iter()
            .filter(|r| r.rel_type == REL_TYPE_SLIDE)
            .map(|r| {
                let order = extract_slide_number(&r.id).or_else(|| extract_slide_number(&r.target));
                (resolve_target(PRESENTATION_PART, &r.target), order)
            })
            .collect();
        slides.sort_by(|a, b| match (a.1, b.1) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.0.cmp(&b.0),
        });
        template.slides = slides.into_iter().map(|(path, _)| path).collect();

        let master = pres_rels
            .iter()
            .find(|r| r.rel_type == REL_TYPE_SLIDE_MASTER)
            .map(|r| resolve_target(PRESENTATION_PART, &r.target));

        let mut layout_parts = match master {
            Some(ref master) => template.master_layout_order(master)?,
            None => Vec::new(),
        };
        if layout_parts.is_empty() {
            layout_parts = template.layout_parts_by_name();
        }

        for part in layout_parts {
            let xml = template.part_text(&part)?;
            let layout = parse_layout(&part, &xml)?;
            log::debug!(
                "Layout {}: {:?} (title: {}, body: {})",
                part,
                layout.name,
                layout.title.is_some(),
                layout.body.is_some()
            );
            template.layouts.push(layout);
        }

        if template.layouts.is_empty() {
            return Err(Error::TemplateError(
                "Template has no slide layouts".to_string(),
            ));
        }

        log::info!(
            "Loaded template: {} layouts, {} existing slides",
            template.layouts.len(),
            template.slides.len()
        );
        Ok(template)
    }

    pub fn slide_size(&self) -> SlideGeometry {
        SlideGeometry::new(self.slide_size.0, self.slide_size.1)
    }

    pub fn layouts(&self) -> &[SlideLayout] {
        &self.layouts
    }

    pub fn layout(&self, index: usize) -> Option<&SlideLayout> {
        self.layouts.get(index)
    }

    /// Archive paths of the slides the template ships with, in deck order.
    pub fn slide_parts(&self) -> &[String] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    /// Raw bytes of a part.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// A part decoded as UTF-8 text.
    pub fn part_text(&self, name: &str) -> Result<String> {
        let data = self
            .part(name)
            .ok_or_else(|| Error::ZipError(format!("File not found in archive '{}'", name)))?;
        String::from_utf8(data.to_vec())
            .map_err(|e| Error::XmlError(format!("'{}' is not UTF-8: {}", name, e)))
    }

    /// All parts in archive order.
    pub(crate) fn parts(&self) -> &[(String, Vec<u8>)] {
        &self.parts
    }

    /// Layouts in the order the master lists them (`p:sldLayoutIdLst`).
    fn master_layout_order(&self, master: &str) -> Result<Vec<String>> {
        let rels = match self.part_text(&rels_path_for(master)) {
            Ok(xml) => parse_relationships(&xml)?,
            Err(_) => return Ok(Vec::new()),
        };
        let targets: HashMap<&str, String> = rels
            .iter()
            .filter(|r| r.rel_type == REL_TYPE_SLIDE_LAYOUT)
            .map(|r| (r.id.as_str(), resolve_target(master, &r.target)))
            .collect();

        let xml = self.part_text(master)?;
        let mut reader = Reader::from_str(&xml);
        reader.trim_text(true);
        let mut order = Vec::new();

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                    if local_name(e.name().as_ref()) == b"sldLayoutId" =>
                {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"r:id" {
                            let id = String::from_utf8_lossy(&attr.value).to_string();
                            match targets.get(id.as_str()) {
                                Some(part) if self.part(part).is_some() => order.push(part.clone()),
                                _ => log::warn!("Master {} lists unknown layout {}", master, id),
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!("Error parsing {}: {}", master, e)));
                }
                _ => {}
            }
        }

        Ok(order)
    }

    /// `ppt/slideLayouts/slideLayoutN.xml` parts sorted by N.
    fn layout_parts_by_name(&self) -> Vec<String> {
        let mut layouts: Vec<(usize, String)> = self
            .parts
            .iter()
            .map(|(name, _)| name)
            .filter(|name| name.starts_with("ppt/slideLayouts/") && name.ends_with(".xml"))
            .map(|name| (extract_slide_number(name).unwrap_or(usize::MAX), name.clone()))
            .collect();
        layouts.sort();
        layouts.into_iter().map(|(_, name)| name).collect()
    }
}

fn parse_slide_size(xml: &str) -> Result<Option<(i64, i64)>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldSz" =>
            {
                let cx = attr_i64(e, b"cx");
                let cy = attr_i64(e, b"cy");
                return Ok(cx.zip(cy));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(e) => {
                return Err(Error::XmlError(format!(
                    "Error parsing {}: {}",
                    PRESENTATION_PART, e
                )));
            }
            _ => {}
        }
    }
}

/// Read the layout name and its title/body placeholders.
fn parse_layout(part: &str, xml: &str) -> Result<SlideLayout> {
    let mut layout = SlideLayout {
        part: part.to_string(),
        name: None,
        title: None,
        body: None,
    };

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut in_shape = false;
    let mut in_sp_pr = false;
    let mut current: Option<Placeholder> = None;
    let mut offset: Option<(i64, i64)> = None;
    let mut extent: Option<(i64, i64)> = None;

    loop {
        let event = reader.read_event();
        let (e, is_empty) = match event {
            Ok(Event::Start(ref e)) => (Some(e.clone()), false),
            Ok(Event::Empty(ref e)) => (Some(e.clone()), true),
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"sp" => {
                        if let Some(mut ph) = current.take() {
                            ph.frame = match (offset, extent) {
                                (Some((x, y)), Some((cx, cy))) => Some(Rect::new(x, y, cx, cy)),
                                _ => None,
                            };
                            if ph.is_title() && layout.title.is_none() {
                                layout.title = Some(ph);
                            } else if ph.is_body() && layout.body.is_none() {
                                layout.body = Some(ph);
                            }
                        }
                        in_shape = false;
                        offset = None;
                        extent = None;
                    }
                    b"spPr" => in_sp_pr = false,
                    _ => {}
                }
                (None, false)
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::XmlError(format!("Error parsing {}: {}", part, e)));
            }
            _ => (None, false),
        };

        let Some(e) = e else { continue };
        let name = e.name();
        match local_name(name.as_ref()) {
            b"cSld" => {
                layout.name = attr_string(&e, b"name");
            }
            b"sp" if !is_empty => {
                in_shape = true;
                current = None;
            }
            b"spPr" if in_shape && !is_empty => in_sp_pr = true,
            b"ph" if in_shape => {
                current = Some(Placeholder {
                    ph_type: attr_string(&e, b"type"),
                    idx: attr_string(&e, b"idx").and_then(|v| v.parse().ok()),
                    frame: None,
                });
            }
            b"off" if in_sp_pr => {
                offset = attr_i64(&e, b"x").zip(attr_i64(&e, b"y")).or(offset);
            }
            // extLst entries are also named `ext` but carry no size
            b"ext" if in_sp_pr => {
                extent = attr_i64(&e, b"cx").zip(attr_i64(&e, b"cy")).or(extent);
            }
            _ => {}
        }
    }

    Ok(layout)
}

fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn attr_i64(e: &BytesStart, key: &[u8]) -> Option<i64> {
    attr_string(e, key).and_then(|v| v.parse().ok())
}
