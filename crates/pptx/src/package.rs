//! OPC package plumbing: relationships, content types and part paths.

use deck_core::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Write as FmtWrite;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub const REL_TYPE_SLIDE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub const REL_TYPE_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_TYPE_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub const REL_TYPE_IMAGE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

pub const SLIDE_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub const PRESENTATION_PART: &str = "ppt/presentation.xml";
pub const PRESENTATION_RELS: &str = "ppt/_rels/presentation.xml.rels";

/// One `Relationship` element of a `.rels` part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    pub external: bool,
}

impl Relationship {
    pub fn new(id: impl Into<String>, rel_type: &str, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.to_string(),
            target: target.into(),
            external: false,
        }
    }
}

/// Parse a `.rels` part.
pub fn parse_relationships(xml: &str) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel = Relationship::new(String::new(), "", String::new());

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Id" => rel.id = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Type" => rel.rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => rel.target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"TargetMode" => rel.external = attr.value.eq_ignore_ascii_case(b"external"),
                        _ => {}
                    }
                }

                if !rel.id.is_empty() {
                    relationships.push(rel);
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

/// Serialize relationships into a `.rels` part.
pub fn write_relationships(relationships: &[Relationship]) -> Result<String> {
    let mut xml = String::with_capacity(256 + relationships.len() * 160);
    xml.push_str(XML_DECLARATION);
    write!(xml, r#"<Relationships xmlns="{}">"#, REL_NS).map_err(fmt_error)?;
    for rel in relationships {
        write!(
            xml,
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            escape(&rel.id),
            escape(&rel.rel_type),
            escape(&rel.target)
        )
        .map_err(fmt_error)?;
        if rel.external {
            xml.push_str(r#" TargetMode="External""#);
        }
        xml.push_str("/>");
    }
    xml.push_str("</Relationships>");
    Ok(xml)
}

/// First `rIdN` not used by `relationships`, counting up from `rId1`.
pub fn next_relationship_id(relationships: &[Relationship]) -> String {
    let highest = relationships
        .iter()
        .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", highest + 1)
}

/// `[Content_Types].xml` as its Default and Override entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentTypes {
    /// (extension, content type)
    defaults: Vec<(String, String)>,
    /// (part name with leading slash, content type)
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut types = Self::default();
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        loop {
            match reader.read_event() {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    let kind = local_name(name.as_ref());
                    if kind != b"Default" && kind != b"Override" {
                        continue;
                    }

                    let mut key = String::new();
                    let mut content_type = String::new();
                    for attr in e.attributes().flatten() {
                        match attr.key.as_ref() {
                            b"Extension" | b"PartName" => {
                                key = String::from_utf8_lossy(&attr.value).to_string()
                            }
                            b"ContentType" => {
                                content_type = String::from_utf8_lossy(&attr.value).to_string()
                            }
                            _ => {}
                        }
                    }

                    if kind == b"Default" {
                        types.defaults.push((key, content_type));
                    } else {
                        types.overrides.push((key, content_type));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing {}: {}",
                        CONTENT_TYPES_PART, e
                    )));
                }
                _ => {}
            }
        }

        Ok(types)
    }

    /// Add a Default entry unless the extension already has one.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) {
        let exists = self
            .defaults
            .iter()
            .any(|(ext, _)| ext.eq_ignore_ascii_case(extension));
        if !exists {
            self.defaults.push((extension.to_string(), content_type.to_string()));
        }
    }

    /// Add or replace the Override for `part` (archive path, no leading slash).
    pub fn set_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part);
        self.overrides.retain(|(name, _)| *name != part_name);
        self.overrides.push((part_name, content_type.to_string()));
    }

    /// Drop every Override whose part matches `predicate`.
    pub fn remove_overrides(&mut self, predicate: impl Fn(&str) -> bool) {
        self.overrides
            .retain(|(name, _)| !predicate(name.trim_start_matches('/')));
    }

    pub fn to_xml(&self) -> Result<String> {
        let mut xml = String::with_capacity(2048);
        xml.push_str(XML_DECLARATION);
        write!(xml, r#"<Types xmlns="{}">"#, CONTENT_TYPES_NS).map_err(fmt_error)?;
        for (ext, content_type) in &self.defaults {
            write!(
                xml,
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape(ext),
                escape(content_type)
            )
            .map_err(fmt_error)?;
        }
        for (part, content_type) in &self.overrides {
            write!(
                xml,
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape(part),
                escape(content_type)
            )
            .map_err(fmt_error)?;
        }
        xml.push_str("</Types>");
        Ok(xml)
    }
}

/// `p:sldId/@id` of the first slide; lower values are reserved.
pub const FIRST_SLIDE_ID: u32 = 256;

/// Replace the slide list of `presentation.xml` with one entry per
/// relationship id, in order. The list is inserted after the master lists
/// when the template has none, and omitted when there are no slides.
pub fn set_slide_id_list(presentation_xml: &str, rel_ids: &[String]) -> Result<String> {
    let mut list = String::new();
    if !rel_ids.is_empty() {
        list.push_str("<p:sldIdLst>");
        for (i, rel_id) in rel_ids.iter().enumerate() {
            write!(
                list,
                r#"<p:sldId id="{}" r:id="{}"/>"#,
                FIRST_SLIDE_ID + i as u32,
                escape(rel_id)
            )
            .map_err(fmt_error)?;
        }
        list.push_str("</p:sldIdLst>");
    }

    let mut xml = presentation_xml.to_string();
    if let Some(start) = xml.find("<p:sldIdLst") {
        let open_end = xml[start..]
            .find('>')
            .map(|i| start + i)
            .ok_or_else(|| Error::XmlError("Unterminated p:sldIdLst".to_string()))?;
        let end = if xml[..open_end].ends_with('/') {
            open_end + 1
        } else {
            let close = "</p:sldIdLst>";
            xml[start..]
                .find(close)
                .map(|i| start + i + close.len())
                .ok_or_else(|| Error::XmlError("Unterminated p:sldIdLst".to_string()))?
        };
        xml.replace_range(start..end, &list);
        return Ok(xml);
    }

    let insert_at = ["</p:handoutMasterIdLst>", "</p:notesMasterIdLst>", "</p:sldMasterIdLst>"]
        .iter()
        .find_map(|tag| xml.find(tag).map(|i| i + tag.len()))
        .ok_or_else(|| {
            Error::TemplateError(format!("{} has no p:sldMasterIdLst", PRESENTATION_PART))
        })?;
    xml.insert_str(insert_at, &list);
    Ok(xml)
}

/// Content type for an image file extension the package can carry.
pub fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// The `.rels` part belonging to `part` (`ppt/slides/slide1.xml` →
/// `ppt/slides/_rels/slide1.xml.rels`).
pub fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns it.
pub fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_part.split('/').collect();
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

/// Extract the local name from a potentially namespaced XML element name.
pub fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slide3.xml".
pub fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

pub(crate) fn fmt_error(e: std::fmt::Error) -> Error {
    Error::XmlError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;

    #[test]
    fn test_parse_and_write_relationships() {
        let rels = parse_relationships(RELS).unwrap();
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[1].rel_type, REL_TYPE_SLIDE);
        assert!(rels[2].external);
        assert_eq!(next_relationship_id(&rels), "rId8");

        let written = write_relationships(&rels).unwrap();
        assert!(written.contains(r#"Target="https://example.com/?a=1&amp;b=2" TargetMode="External""#));
        assert_eq!(parse_relationships(&written).unwrap().len(), 3);
    }

    #[test]
    fn test_next_relationship_id_empty() {
        assert_eq!(next_relationship_id(&[]), "rId1");
    }

    #[test]
    fn test_content_types_edit() {
        let xml = r#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Default Extension="PNG" ContentType="image/png"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/></Types>"#;
        let mut types = ContentTypes::parse(xml).unwrap();

        types.remove_overrides(|part| part.starts_with("ppt/slides/"));
        let trimmed = types.to_xml().unwrap();
        assert!(!trimmed.contains(r#"PartName="/ppt/slides/slide1.xml""#));
        assert!(trimmed.contains(r#"PartName="/ppt/presentation.xml""#));

        types.ensure_default("png", "image/png");
        types.ensure_default("jpeg", "image/jpeg");
        types.set_override("ppt/slides/slide2.xml", SLIDE_CONTENT_TYPE);

        let out = types.to_xml().unwrap();
        assert_eq!(out.matches("Extension=\"PNG\"").count(), 1);
        assert!(!out.contains("Extension=\"png\""));
        assert!(out.contains(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#));
        assert!(out.contains(r#"PartName="/ppt/slides/slide2.xml""#));
    }

    #[test]
    fn test_set_slide_id_list_replaces_existing() {
        let xml = r#"<p:presentation><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/></p:sldIdLst><p:sldSz cx="1" cy="1"/></p:presentation>"#;
        let out = set_slide_id_list(xml, &["rId9".to_string(), "rId10".to_string()]).unwrap();
        assert!(out.contains(r#"<p:sldIdLst><p:sldId id="256" r:id="rId9"/><p:sldId id="257" r:id="rId10"/></p:sldIdLst><p:sldSz"#));
        assert!(!out.contains("rId2"));

        let cleared = set_slide_id_list(xml, &[]).unwrap();
        assert!(!cleared.contains("sldIdLst"));
    }

    #[test]
    fn test_set_slide_id_list_inserts_after_masters() {
        let xml = r#"<p:presentation><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:notesMasterIdLst><p:notesMasterId r:id="rId4"/></p:notesMasterIdLst><p:sldSz cx="1" cy="1"/></p:presentation>"#;
        let out = set_slide_id_list(xml, &["rId5".to_string()]).unwrap();
        assert!(out.contains(r#"</p:notesMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId5"/></p:sldIdLst><p:sldSz"#));

        let empty_list = r#"<p:presentation><p:sldMasterIdLst/><p:sldIdLst/></p:presentation>"#;
        let out = set_slide_id_list(empty_list, &["rId2".to_string()]).unwrap();
        assert_eq!(out, r#"<p:presentation><p:sldMasterIdLst/><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#);

        assert!(matches!(
            set_slide_id_list("<p:presentation/>", &["rId1".to_string()]),
            Err(Error::TemplateError(_))
        ));
    }

    #[test]
    fn test_paths() {
        assert_eq!(rels_path_for("ppt/slides/slide3.xml"), "ppt/slides/_rels/slide3.xml.rels");
        assert_eq!(resolve_target("ppt/presentation.xml", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(
            resolve_target("ppt/slideMasters/slideMaster1.xml", "../slideLayouts/slideLayout2.xml"),
            "ppt/slideLayouts/slideLayout2.xml"
        );
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "/ppt/media/a.png"), "ppt/media/a.png");
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(image_content_type("JPG"), Some("image/jpeg"));
        assert_eq!(image_content_type("png"), Some("image/png"));
        assert_eq!(image_content_type("emf"), None);
    }

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slides/slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }
}
