//! Deck composition: writes slide records into a copy of a template.

use crate::layout::{bullet_font_size, Rect, SlideGeometry, TABLE_FONT_PT};
use crate::package::{
    fmt_error, image_content_type, next_relationship_id, parse_relationships, rels_path_for,
    set_slide_id_list, write_relationships, ContentTypes, Relationship, CONTENT_TYPES_PART,
    PRESENTATION_PART, PRESENTATION_RELS, REL_TYPE_IMAGE, REL_TYPE_SLIDE, REL_TYPE_SLIDE_LAYOUT,
    SLIDE_CONTENT_TYPE, XML_DECLARATION,
};
use crate::template::{Placeholder, SlideLayout, Template};
use deck_core::{Error, Result, SlideRecord};
use quick_xml::escape::escape;
use std::collections::HashSet;
use std::fmt::Write as FmtWrite;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const CLOSING_TITLE: &str = "Thank You!";
pub const CLOSING_SUBTITLE: &str =
    "We appreciate your attention. Looking forward to your questions!";

const TABLE_GRAPHIC_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/table";

/// Which layouts to use and whether to finish with a closing slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeOptions {
    pub closing_slide: bool,
    /// Index into the template's layouts for content slides.
    pub content_layout: usize,
    /// Index into the template's layouts for the closing slide.
    pub title_layout: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            closing_slide: true,
            content_layout: 1,
            title_layout: 0,
        }
    }
}

/// What a compose run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposeReport {
    pub slides_written: usize,
    pub images_placed: usize,
    pub tables_placed: usize,
    /// Image paths that could not be read and were left off their slide.
    pub images_skipped: Vec<String>,
    pub template_slides_dropped: usize,
}

/// Writes a deck from slide records, reusing a template's masters and layouts.
#[derive(Debug, Clone, Default)]
pub struct DeckComposer {
    options: ComposeOptions,
}

impl DeckComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: ComposeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_closing_slide(mut self, closing_slide: bool) -> Self {
        self.options.closing_slide = closing_slide;
        self
    }

    /// Compose the deck and write it to `out_path`, creating parent
    /// directories as needed. An existing file is overwritten.
    pub fn compose(
        &self,
        template: &Template,
        slides: &[SlideRecord],
        out_path: impl AsRef<Path>,
    ) -> Result<ComposeReport> {
        let out_path = out_path.as_ref();
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = File::create(out_path)?;
        let report = self.compose_to_writer(template, slides, BufWriter::new(file))?;
        log::info!(
            "Wrote {} slides to {}",
            report.slides_written,
            out_path.display()
        );
        Ok(report)
    }

    /// Compose the deck into any seekable writer.
    pub fn compose_to_writer<W: Write + Seek>(
        &self,
        template: &Template,
        slides: &[SlideRecord],
        writer: W,
    ) -> Result<ComposeReport> {
        let content_layout = self.pick_layout(template, self.options.content_layout)?;
        let geometry = template.slide_size();

        let mut report = ComposeReport {
            template_slides_dropped: template.slide_count(),
            ..ComposeReport::default()
        };
        let mut media = MediaNamer::new(template);
        let mut parts: Vec<SlidePart> = Vec::with_capacity(slides.len() + 1);

        for record in slides {
            parts.push(build_content_slide(
                record,
                content_layout,
                geometry,
                &mut media,
                &mut report,
            )?);
        }

        if self.options.closing_slide {
            let title_layout = self.pick_layout(template, self.options.title_layout)?;
            parts.push(build_closing_slide(title_layout)?);
        }
        report.slides_written = parts.len();

        let dropped = dropped_parts(template);

        let mut pres_rels = parse_relationships(&template.part_text(PRESENTATION_RELS)?)?;
        pres_rels.retain(|r| r.rel_type != REL_TYPE_SLIDE);
        let mut slide_rel_ids = Vec::with_capacity(parts.len());
        for n in 1..=parts.len() {
            let id = next_relationship_id(&pres_rels);
            pres_rels.push(Relationship::new(
                id.clone(),
                REL_TYPE_SLIDE,
                format!("slides/slide{}.xml", n),
            ));
            slide_rel_ids.push(id);
        }

        let presentation =
            set_slide_id_list(&template.part_text(PRESENTATION_PART)?, &slide_rel_ids)?;

        let mut content_types = match template.part_text(CONTENT_TYPES_PART) {
            Ok(xml) => ContentTypes::parse(&xml)?,
            Err(_) => {
                return Err(Error::TemplateError(format!(
                    "Template has no {}",
                    CONTENT_TYPES_PART
                )))
            }
        };
        content_types.remove_overrides(|part| dropped.contains(part) || is_slide_family(part));
        for n in 1..=parts.len() {
            content_types.set_override(&format!("ppt/slides/slide{}.xml", n), SLIDE_CONTENT_TYPE);
        }
        for part in &parts {
            if let Some(ref image) = part.image {
                content_types.ensure_default(&image.extension, image.content_type);
            }
        }

        let mut zip = ZipWriter::new(writer);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        write_entry(&mut zip, options, CONTENT_TYPES_PART, content_types.to_xml()?.as_bytes())?;
        for (name, data) in template.parts() {
            if name == CONTENT_TYPES_PART || dropped.contains(name.as_str()) || is_slide_family(name) {
                continue;
            }
            match name.as_str() {
                PRESENTATION_PART => write_entry(&mut zip, options, name, presentation.as_bytes())?,
                PRESENTATION_RELS => write_entry(
                    &mut zip,
                    options,
                    name,
                    write_relationships(&pres_rels)?.as_bytes(),
                )?,
                _ => write_entry(&mut zip, options, name, data)?,
            }
        }

        for (i, part) in parts.iter().enumerate() {
            let slide_name = format!("ppt/slides/slide{}.xml", i + 1);
            write_entry(&mut zip, options, &rels_path_for(&slide_name), write_relationships(&part.rels)?.as_bytes())?;
            write_entry(&mut zip, options, &slide_name, part.xml.as_bytes())?;
            if let Some(ref image) = part.image {
                write_entry(&mut zip, options, &image.part, &image.data)?;
            }
        }

        let mut writer = zip
            .finish()
            .map_err(|e| Error::ZipError(format!("Failed to finish package: {}", e)))?;
        writer.flush()?;

        if !report.images_skipped.is_empty() {
            log::warn!("{} image(s) could not be placed", report.images_skipped.len());
        }
        Ok(report)
    }

    fn pick_layout<'t>(&self, template: &'t Template, index: usize) -> Result<&'t SlideLayout> {
        template
            .layout(index)
            .or_else(|| {
                log::debug!("Template has no layout {}, using the first", index);
                template.layout(0)
            })
            .ok_or_else(|| Error::TemplateError("Template has no slide layouts".to_string()))
    }
}

/// A generated slide part with its relationships and media.
struct SlidePart {
    xml: String,
    rels: Vec<Relationship>,
    image: Option<MediaPart>,
}

struct MediaPart {
    part: String,
    extension: String,
    content_type: &'static str,
    data: Vec<u8>,
}

/// Hands out `ppt/media/deck_imageN.ext` names not taken by the template.
struct MediaNamer {
    taken: HashSet<String>,
    next: usize,
}

impl MediaNamer {
    fn new(template: &Template) -> Self {
        Self {
            taken: template.parts().iter().map(|(name, _)| name.clone()).collect(),
            next: 1,
        }
    }

    fn next_name(&mut self, extension: &str) -> String {
        loop {
            let name = format!("ppt/media/deck_image{}.{}", self.next, extension);
            self.next += 1;
            if self.taken.insert(name.clone()) {
                return name;
            }
        }
    }
}

/// Image bytes plus what layout needs to know about them.
struct LoadedImage {
    data: Vec<u8>,
    extension: String,
    content_type: &'static str,
    width: u32,
    height: u32,
}

fn load_image(path: &str) -> Result<LoadedImage> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let content_type = image_content_type(&extension)
        .ok_or_else(|| Error::ImageError(format!("Unsupported image type '{}'", extension)))?;
    let (width, height) = image::image_dimensions(path)
        .map_err(|e| Error::ImageError(format!("{}: {}", path, e)))?;
    if width == 0 || height == 0 {
        return Err(Error::ImageError(format!("{}: empty image", path)));
    }
    let data = fs::read(path)?;

    Ok(LoadedImage {
        data,
        extension,
        content_type,
        width,
        height,
    })
}

fn build_content_slide(
    record: &SlideRecord,
    layout: &SlideLayout,
    geometry: SlideGeometry,
    media: &mut MediaNamer,
    report: &mut ComposeReport,
) -> Result<SlidePart> {
    let mut rels = vec![Relationship::new(
        "rId1",
        REL_TYPE_SLIDE_LAYOUT,
        layout.target_from_slide(),
    )];
    let has_bullets = !record.bullets.is_empty();

    // Body frame stays `None` while the layout's own placement applies.
    let mut body_frame: Option<Rect> = None;
    let mut picture: Option<(Rect, String)> = None;
    let mut image_part = None;

    if let Some(ref path) = record.image_path {
        match load_image(path) {
            Ok(image) => {
                let placement = geometry.fit_image(image.width, image.height);
                let part = media.next_name(&image.extension);
                let target = format!("../media/{}", part.trim_start_matches("ppt/media/"));
                rels.push(Relationship::new("rId2", REL_TYPE_IMAGE, target));

                let descr = Path::new(path)
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(path)
                    .to_string();
                picture = Some((placement.picture, descr));
                body_frame = Some(placement.body);
                image_part = Some(MediaPart {
                    part,
                    extension: image.extension,
                    content_type: image.content_type,
                    data: image.data,
                });
                report.images_placed += 1;
            }
            Err(e) => {
                log::warn!("Skipping image on slide '{}': {}", record.title, e);
                report.images_skipped.push(path.clone());
            }
        }
    }

    let table = match record.table {
        Some(ref rows) if table_columns(rows) > 0 => {
            let frame = geometry.table_frame(has_bullets);
            if has_bullets {
                let body = body_frame
                    .or_else(|| layout.body.as_ref().and_then(|ph| ph.frame))
                    .unwrap_or_else(|| geometry.default_body());
                body_frame = Some(geometry.body_above(body, frame));
            }
            report.tables_placed += 1;
            Some((rows.as_slice(), frame))
        }
        Some(_) => {
            log::warn!("Skipping empty table on slide '{}'", record.title);
            None
        }
        None => None,
    };

    let mut slide = SlideXml::new();
    slide.title(&record.title, layout.title.as_ref())?;
    if has_bullets {
        let frame = match layout.body {
            Some(_) => body_frame,
            None => Some(body_frame.unwrap_or_else(|| geometry.default_body())),
        };
        slide.body(
            &record.bullets,
            layout.body.as_ref(),
            frame,
            Some(bullet_font_size(record.bullets.len())),
        )?;
    }
    if let Some((rect, ref descr)) = picture {
        slide.picture("rId2", rect, descr)?;
    }
    if let Some((rows, frame)) = table {
        slide.table(rows, frame)?;
    }

    Ok(SlidePart {
        xml: slide.finish(),
        rels,
        image: image_part,
    })
}

fn build_closing_slide(layout: &SlideLayout) -> Result<SlidePart> {
    let mut slide = SlideXml::new();
    slide.title(CLOSING_TITLE, layout.title.as_ref())?;
    if layout.body.is_some() {
        slide.body(&[CLOSING_SUBTITLE.to_string()], layout.body.as_ref(), None, None)?;
    }

    Ok(SlidePart {
        xml: slide.finish(),
        rels: vec![Relationship::new(
            "rId1",
            REL_TYPE_SLIDE_LAYOUT,
            layout.target_from_slide(),
        )],
        image: None,
    })
}

/// Template parts that do not survive composition.
fn dropped_parts(template: &Template) -> HashSet<String> {
    let mut dropped = HashSet::new();
    for slide in template.slide_parts() {
        dropped.insert(rels_path_for(slide));
        dropped.insert(slide.clone());
    }
    dropped
}

/// Slide and notes-slide parts, including their `_rels`.
fn is_slide_family(part: &str) -> bool {
    part.starts_with("ppt/slides/") || part.starts_with("ppt/notesSlides/")
}

fn table_columns(rows: &[Vec<String>]) -> usize {
    rows.iter().map(Vec::len).max().unwrap_or(0)
}

fn write_entry<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    options: FileOptions,
    name: &str,
    data: &[u8],
) -> Result<()> {
    zip.start_file(name, options)
        .map_err(|e| Error::ZipError(format!("Failed to add '{}': {}", name, e)))?;
    zip.write_all(data)?;
    Ok(())
}

/// Builds one `p:sld` part shape by shape.
struct SlideXml {
    xml: String,
    next_id: u32,
}

impl SlideXml {
    fn new() -> Self {
        let mut xml = String::with_capacity(4096);
        xml.push_str(XML_DECLARATION);
        xml.push_str(
            r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
        );
        xml.push_str(
            r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
        );
        xml.push_str(r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#);
        xml.push_str("<p:cSld>");
        xml.push_str("<p:spTree>");

        xml.push_str("<p:nvGrpSpPr>");
        xml.push_str(r#"<p:cNvPr id="1" name=""/>"#);
        xml.push_str("<p:cNvGrpSpPr/>");
        xml.push_str("<p:nvPr/>");
        xml.push_str("</p:nvGrpSpPr>");
        xml.push_str("<p:grpSpPr>");
        xml.push_str("<a:xfrm>");
        xml.push_str(r#"<a:off x="0" y="0"/>"#);
        xml.push_str(r#"<a:ext cx="0" cy="0"/>"#);
        xml.push_str(r#"<a:chOff x="0" y="0"/>"#);
        xml.push_str(r#"<a:chExt cx="0" cy="0"/>"#);
        xml.push_str("</a:xfrm>");
        xml.push_str("</p:grpSpPr>");

        Self { xml, next_id: 2 }
    }

    fn shape_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn title(&mut self, text: &str, placeholder: Option<&Placeholder>) -> Result<()> {
        let id = self.shape_id();
        let ph = placeholder
            .map(Placeholder::reference_xml)
            .unwrap_or_else(|| r#"<p:ph type="title"/>"#.to_string());

        let xml = &mut self.xml;
        xml.push_str("<p:sp>");
        xml.push_str("<p:nvSpPr>");
        write!(xml, r#"<p:cNvPr id="{}" name="Title {}"/>"#, id, id - 1).map_err(fmt_error)?;
        xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
        write!(xml, "<p:nvPr>{}</p:nvPr>", ph).map_err(fmt_error)?;
        xml.push_str("</p:nvSpPr>");
        xml.push_str("<p:spPr/>");
        xml.push_str("<p:txBody>");
        xml.push_str("<a:bodyPr/>");
        xml.push_str("<a:lstStyle/>");
        xml.push_str("<a:p>");
        xml.push_str("<a:r>");
        xml.push_str(r#"<a:rPr lang="en-US" dirty="0"/>"#);
        write!(xml, "<a:t>{}</a:t>", escape(text)).map_err(fmt_error)?;
        xml.push_str("</a:r>");
        xml.push_str("</a:p>");
        xml.push_str("</p:txBody>");
        xml.push_str("</p:sp>");
        Ok(())
    }

    /// One paragraph per line. Without a placeholder the text goes into a
    /// plain text box, which then needs an explicit `frame`.
    fn body(
        &mut self,
        lines: &[String],
        placeholder: Option<&Placeholder>,
        frame: Option<Rect>,
        font_size: Option<u32>,
    ) -> Result<()> {
        let id = self.shape_id();
        let xml = &mut self.xml;

        xml.push_str("<p:sp>");
        xml.push_str("<p:nvSpPr>");
        match placeholder {
            Some(ph) => {
                write!(xml, r#"<p:cNvPr id="{}" name="Content Placeholder {}"/>"#, id, id - 1)
                    .map_err(fmt_error)?;
                xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
                write!(xml, "<p:nvPr>{}</p:nvPr>", ph.reference_xml()).map_err(fmt_error)?;
            }
            None => {
                write!(xml, r#"<p:cNvPr id="{}" name="TextBox {}"/>"#, id, id - 1)
                    .map_err(fmt_error)?;
                xml.push_str(r#"<p:cNvSpPr txBox="1"/>"#);
                xml.push_str("<p:nvPr/>");
            }
        }
        xml.push_str("</p:nvSpPr>");

        match frame {
            Some(rect) => {
                xml.push_str("<p:spPr>");
                write_xfrm(xml, "a", rect)?;
                if placeholder.is_none() {
                    xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
                }
                xml.push_str("</p:spPr>");
            }
            None => xml.push_str("<p:spPr/>"),
        }

        xml.push_str("<p:txBody>");
        if placeholder.is_some() {
            xml.push_str("<a:bodyPr><a:normAutofit/></a:bodyPr>");
        } else {
            xml.push_str(r#"<a:bodyPr wrap="square" rtlCol="0"><a:normAutofit/></a:bodyPr>"#);
        }
        xml.push_str("<a:lstStyle/>");
        for line in lines {
            xml.push_str("<a:p>");
            if placeholder.is_none() {
                xml.push_str(r#"<a:pPr marL="285750" indent="-285750"><a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:pPr>"#);
            }
            xml.push_str("<a:r>");
            match font_size {
                Some(sz) => write!(xml, r#"<a:rPr lang="en-US" sz="{}" dirty="0"/>"#, sz)
                    .map_err(fmt_error)?,
                None => xml.push_str(r#"<a:rPr lang="en-US" dirty="0"/>"#),
            }
            write!(xml, "<a:t>{}</a:t>", escape(line)).map_err(fmt_error)?;
            xml.push_str("</a:r>");
            xml.push_str("</a:p>");
        }
        xml.push_str("</p:txBody>");
        xml.push_str("</p:sp>");
        Ok(())
    }

    fn picture(&mut self, rel_id: &str, rect: Rect, description: &str) -> Result<()> {
        let id = self.shape_id();
        let xml = &mut self.xml;

        xml.push_str("<p:pic>");
        xml.push_str("<p:nvPicPr>");
        write!(
            xml,
            r#"<p:cNvPr id="{}" name="Picture {}" descr="{}"/>"#,
            id,
            id - 1,
            escape(description)
        )
        .map_err(fmt_error)?;
        xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr>"#);
        xml.push_str("<p:nvPr/>");
        xml.push_str("</p:nvPicPr>");

        xml.push_str("<p:blipFill>");
        write!(xml, r#"<a:blip r:embed="{}"/>"#, rel_id).map_err(fmt_error)?;
        xml.push_str("<a:stretch><a:fillRect/></a:stretch>");
        xml.push_str("</p:blipFill>");

        xml.push_str("<p:spPr>");
        write_xfrm(xml, "a", rect)?;
        xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
        xml.push_str("</p:spPr>");
        xml.push_str("</p:pic>");
        Ok(())
    }

    /// A table frame with even columns. The first row is the bold header;
    /// short rows are padded with empty cells.
    fn table(&mut self, rows: &[Vec<String>], frame: Rect) -> Result<()> {
        let id = self.shape_id();
        let columns = table_columns(rows);
        let column_width = frame.cx / columns as i64;
        let row_height = frame.cy / rows.len().max(1) as i64;
        let font_size = TABLE_FONT_PT * 100;
        let xml = &mut self.xml;

        xml.push_str("<p:graphicFrame>");
        xml.push_str("<p:nvGraphicFramePr>");
        write!(xml, r#"<p:cNvPr id="{}" name="Table {}"/>"#, id, id - 1).map_err(fmt_error)?;
        xml.push_str(r#"<p:cNvGraphicFramePr><a:graphicFrameLocks noGrp="1"/></p:cNvGraphicFramePr>"#);
        xml.push_str("<p:nvPr/>");
        xml.push_str("</p:nvGraphicFramePr>");
        write_xfrm(xml, "p", frame)?;

        xml.push_str("<a:graphic>");
        write!(xml, r#"<a:graphicData uri="{}">"#, TABLE_GRAPHIC_URI).map_err(fmt_error)?;
        xml.push_str("<a:tbl>");
        xml.push_str(r#"<a:tblPr firstRow="1" bandRow="1"/>"#);
        xml.push_str("<a:tblGrid>");
        for col in 0..columns {
            // Last column absorbs the rounding remainder.
            let width = if col + 1 == columns {
                frame.cx - column_width * (columns as i64 - 1)
            } else {
                column_width
            };
            write!(xml, r#"<a:gridCol w="{}"/>"#, width).map_err(fmt_error)?;
        }
        xml.push_str("</a:tblGrid>");

        for (r, row) in rows.iter().enumerate() {
            let bold = if r == 0 { r#" b="1""# } else { "" };
            write!(xml, r#"<a:tr h="{}">"#, row_height).map_err(fmt_error)?;
            for col in 0..columns {
                let text = row.get(col).map(String::as_str).unwrap_or("");
                xml.push_str("<a:tc>");
                xml.push_str("<a:txBody>");
                xml.push_str("<a:bodyPr/>");
                xml.push_str("<a:lstStyle/>");
                xml.push_str("<a:p>");
                if text.is_empty() {
                    write!(xml, r#"<a:endParaRPr lang="en-US" sz="{}"{}/>"#, font_size, bold)
                        .map_err(fmt_error)?;
                } else {
                    xml.push_str("<a:r>");
                    write!(xml, r#"<a:rPr lang="en-US" sz="{}"{} dirty="0"/>"#, font_size, bold)
                        .map_err(fmt_error)?;
                    write!(xml, "<a:t>{}</a:t>", escape(text)).map_err(fmt_error)?;
                    xml.push_str("</a:r>");
                }
                xml.push_str("</a:p>");
                xml.push_str("</a:txBody>");
                xml.push_str("<a:tcPr/>");
                xml.push_str("</a:tc>");
            }
            xml.push_str("</a:tr>");
        }

        xml.push_str("</a:tbl>");
        xml.push_str("</a:graphicData>");
        xml.push_str("</a:graphic>");
        xml.push_str("</p:graphicFrame>");
        Ok(())
    }

    fn finish(mut self) -> String {
        self.xml.push_str("</p:spTree>");
        self.xml.push_str("</p:cSld>");
        self.xml
            .push_str(r#"<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>"#);
        self.xml.push_str("</p:sld>");
        self.xml
    }
}

/// `<{prefix}:xfrm>` with offset and extent.
fn write_xfrm(xml: &mut String, prefix: &str, rect: Rect) -> Result<()> {
    write!(
        xml,
        r#"<{p}:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></{p}:xfrm>"#,
        rect.x,
        rect.y,
        rect.cx,
        rect.cy,
        p = prefix
    )
    .map_err(fmt_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::inches;
    use crate::template::tests::sample_template_bytes;
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn compose_in_memory(
        composer: &DeckComposer,
        slides: &[SlideRecord],
    ) -> (ComposeReport, Vec<u8>) {
        let template = Template::from_bytes(sample_template_bytes()).unwrap();
        let mut out = Cursor::new(Vec::new());
        let report = composer
            .compose_to_writer(&template, slides, &mut out)
            .unwrap();
        (report, out.into_inner())
    }

    fn read_part(bytes: &[u8], name: &str) -> Option<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).ok()?;
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        Some(content)
    }

    fn part_names(bytes: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> String {
        let path = dir.join(name);
        image::RgbImage::new(width, height).save(&path).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn test_replaces_template_slides() {
        let slides = vec![
            SlideRecord::new("Introduction").with_bullets(["First point", "Second point"]),
            SlideRecord::new("Details").with_bullets(["Only point"]),
        ];
        let (report, bytes) = compose_in_memory(&DeckComposer::new(), &slides);

        assert_eq!(report.slides_written, 3);
        assert_eq!(report.template_slides_dropped, 1);

        let names = part_names(&bytes);
        assert_eq!(names[0], CONTENT_TYPES_PART);
        assert!(!names.iter().any(|n| n.starts_with("ppt/notesSlides/")));
        let slide_parts: Vec<_> = names
            .iter()
            .filter(|n| n.starts_with("ppt/slides/slide"))
            .collect();
        assert_eq!(slide_parts.len(), 3);
        assert!(names.contains(&"ppt/notesMasters/notesMaster1.xml".to_string()));

        for name in &names {
            if let Some(text) = read_part(&bytes, name) {
                assert!(!text.contains("Template sample slide"), "{name}");
            }
        }

        let presentation = read_part(&bytes, PRESENTATION_PART).unwrap();
        assert_eq!(presentation.matches("<p:sldId ").count(), 3);
        assert!(presentation.contains(r#"<p:sldId id="256" r:id="rId4"/>"#));

        let types = read_part(&bytes, CONTENT_TYPES_PART).unwrap();
        assert_eq!(types.matches(SLIDE_CONTENT_TYPE).count(), 3);
        assert!(!types.contains("notesSlide+xml"));

        let reloaded = Template::from_bytes(bytes).unwrap();
        assert_eq!(reloaded.slide_count(), 3);
    }

    #[test]
    fn test_content_slide_uses_layout_placeholders() {
        let slides = vec![SlideRecord::new("R&D <Plans>").with_bullets(["Ship it", "Measure it"])];
        let (_, bytes) = compose_in_memory(&DeckComposer::new().with_closing_slide(false), &slides);

        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert!(slide.contains(r#"<p:ph type="title"/>"#));
        assert!(slide.contains(r#"<p:ph idx="1"/>"#));
        assert!(slide.contains("<a:t>R&amp;D &lt;Plans&gt;</a:t>"));
        assert_eq!(slide.matches(r#"sz="1800""#).count(), 2);
        assert!(!slide.contains("<p:pic>"));

        let rels = read_part(&bytes, "ppt/slides/_rels/slide1.xml.rels").unwrap();
        assert!(rels.contains(r#"Target="../slideLayouts/slideLayout1.xml""#));
        assert!(read_part(&bytes, "ppt/slides/slide2.xml").is_none());
    }

    #[test]
    fn test_empty_bullets_gives_title_only() {
        let slides = vec![SlideRecord::new("Section Break")];
        let (_, bytes) = compose_in_memory(&DeckComposer::new().with_closing_slide(false), &slides);

        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert_eq!(slide.matches("<p:sp>").count(), 1);
        assert!(slide.contains("Section Break"));
    }

    #[test]
    fn test_image_is_embedded_and_body_shrinks() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "img_1_FIG_1.png", 192, 96);

        let mut record = SlideRecord::new("Architecture").with_bullets(["Layered design"]);
        record.image_path = Some(path);
        let (report, bytes) = compose_in_memory(&DeckComposer::new().with_closing_slide(false), &[record]);

        assert_eq!(report.images_placed, 1);
        assert!(report.images_skipped.is_empty());

        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert!(slide.contains(r#"<a:blip r:embed="rId2"/>"#));
        assert!(slide.contains(r#"descr="img_1_FIG_1.png""#));
        let width = 12_192_000 - inches(2.0);
        assert!(slide.contains(&format!(
            r#"<a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/>"#,
            width - inches(0.5),
            (6_858_000 - inches(1.0)) / 2,
            inches(2.0),
            inches(1.0)
        )));
        assert!(slide.contains(&format!(
            r#"<a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/>"#,
            inches(0.5),
            inches(1.5),
            12_192_000 - inches(2.0) - inches(1.5),
            6_858_000 - inches(2.0)
        )));

        let rels = read_part(&bytes, "ppt/slides/_rels/slide1.xml.rels").unwrap();
        assert!(rels.contains(r#"Target="../media/deck_image1.png""#));
        assert!(part_names(&bytes).contains(&"ppt/media/deck_image1.png".to_string()));

        let types = read_part(&bytes, CONTENT_TYPES_PART).unwrap();
        assert!(types.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
    }

    #[test]
    fn test_missing_image_is_skipped() {
        let mut record = SlideRecord::new("Results").with_bullets(["Up and to the right"]);
        record.image_path = Some("/nonexistent/chart.png".to_string());
        let (report, bytes) = compose_in_memory(&DeckComposer::new(), &[record]);

        assert_eq!(report.images_placed, 0);
        assert_eq!(report.images_skipped, vec!["/nonexistent/chart.png".to_string()]);
        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert!(!slide.contains("<p:pic>"));
        assert!(slide.contains("Up and to the right"));
    }

    #[test]
    fn test_table_with_header_and_padding() {
        let mut record = SlideRecord::new("Summary Table");
        record.table = Some(vec![
            vec!["Name".into(), "Value".into(), "Unit".into()],
            vec!["Speed".into(), "42".into()],
        ]);
        let (report, bytes) = compose_in_memory(&DeckComposer::new().with_closing_slide(false), &[record]);

        assert_eq!(report.tables_placed, 1);
        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        assert_eq!(slide.matches("<a:gridCol ").count(), 3);
        assert_eq!(slide.matches("<a:tc>").count(), 6);
        assert!(slide.contains(r#"<a:rPr lang="en-US" sz="1200" b="1" dirty="0"/><a:t>Name</a:t>"#));
        assert!(slide.contains(r#"<a:rPr lang="en-US" sz="1200" dirty="0"/><a:t>Speed</a:t>"#));
        assert!(slide.contains(&format!(
            r#"<p:xfrm><a:off x="{}" y="{}"/>"#,
            inches(1.0),
            inches(2.0)
        )));
    }

    #[test]
    fn test_table_below_bullets() {
        let mut record = SlideRecord::new("Comparison").with_bullets(["A beats B"]);
        record.table = Some(vec![vec!["A".into(), "B".into()], vec!["1".into(), "2".into()]]);
        let (_, bytes) = compose_in_memory(&DeckComposer::new().with_closing_slide(false), &[record]);

        let slide = read_part(&bytes, "ppt/slides/slide1.xml").unwrap();
        let table_top = 6_858_000 - inches(2.5) - inches(0.5);
        assert!(slide.contains(&format!(r#"<p:xfrm><a:off x="{}" y="{}"/>"#, inches(1.0), table_top)));
        // Body ends just above the table.
        assert!(slide.contains(&format!(
            r#"<a:ext cx="{}" cy="{}"/>"#,
            12_192_000 - inches(1.0),
            table_top - inches(0.1) - inches(1.5)
        )));
    }

    #[test]
    fn test_closing_slide_on_title_layout() {
        let slides = vec![SlideRecord::new("Only").with_bullets(["one", "two"])];
        let (_, bytes) = compose_in_memory(&DeckComposer::new(), &slides);

        let closing = read_part(&bytes, "ppt/slides/slide2.xml").unwrap();
        assert!(closing.contains(CLOSING_TITLE));
        assert!(closing.contains(CLOSING_SUBTITLE));
        assert!(closing.contains(r#"<p:ph type="ctrTitle"/>"#));
        assert!(closing.contains(r#"<p:ph type="subTitle" idx="1"/>"#));

        let rels = read_part(&bytes, "ppt/slides/_rels/slide2.xml.rels").unwrap();
        assert!(rels.contains(r#"Target="../slideLayouts/slideLayout2.xml""#));
    }

    #[test]
    fn test_layout_index_falls_back_to_first() {
        let options = ComposeOptions {
            closing_slide: false,
            content_layout: 9,
            title_layout: 0,
        };
        let slides = vec![SlideRecord::new("Fallback").with_bullets(["x", "y"])];
        let (_, bytes) = compose_in_memory(&DeckComposer::new().with_options(options), &slides);

        let rels = read_part(&bytes, "ppt/slides/_rels/slide1.xml.rels").unwrap();
        assert!(rels.contains(r#"Target="../slideLayouts/slideLayout2.xml""#));
    }

    #[test]
    fn test_compose_to_path_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output").join("deck.pptx");
        let template = Template::from_bytes(sample_template_bytes()).unwrap();

        let report = DeckComposer::new()
            .compose(&template, &[SlideRecord::new("Hello").with_bullets(["a", "b"])], &out)
            .unwrap();

        assert_eq!(report.slides_written, 2);
        assert!(out.exists());
        assert_eq!(Template::open(&out).unwrap().slide_count(), 2);
    }
}
