//! Minimal OOXML presentation reader.
//!
//! A `.pptx` is a zip of XML parts. Only what the extractor needs is read:
//!
//! * `ppt/presentation.xml` + its rels → slide parts in presentation order
//! * `ppt/slides/slideN.xml` + its rels → pictures and tables in document order
//! * `ppt/media/*` → embedded image bytes
//! * `docProps/core.xml` → title and author for [`crate::inspect`]
//!
//! Slide order comes from `p:sldIdLst`, never from part names: decks that
//! were reordered in PowerPoint keep their original `slideN.xml` names.

use crate::pipeline::table::TableShape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use thiserror::Error;
use tracing::debug;
use zip::result::ZipError;
use zip::ZipArchive;

const PRESENTATION_PART: &str = "ppt/presentation.xml";
const CORE_PROPS_PART: &str = "docProps/core.xml";

/// Package-level failure. Any of these makes the whole document unreadable.
#[derive(Debug, Error)]
pub enum PptxError {
    #[error("not a valid zip package: {0}")]
    Zip(String),

    #[error("missing part '{0}'")]
    MissingPart(String),

    #[error("malformed XML in '{part}': {detail}")]
    Xml { part: String, detail: String },
}

/// A shape the extractor cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum SlideShape {
    /// An embedded picture. `media_path` is `None` when its relationship is
    /// missing from the slide rels.
    Picture {
        name: Option<String>,
        media_path: Option<String>,
    },
    /// A table, or the reason its markup could not be read.
    Table(Result<TableShape, String>),
}

/// Title and author from the package core properties.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeckMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub slide_count: usize,
}

/// An opened `.pptx` package.
pub struct PptxPackage<R: Read + Seek> {
    archive: ZipArchive<R>,
    slide_parts: Vec<String>,
}

impl<R: Read + Seek> PptxPackage<R> {
    /// Open a package and resolve its slide order.
    pub fn open(reader: R) -> Result<Self, PptxError> {
        let archive = ZipArchive::new(reader).map_err(|e| PptxError::Zip(e.to_string()))?;
        let mut package = Self {
            archive,
            slide_parts: Vec::new(),
        };
        package.slide_parts = package.resolve_slide_order()?;
        debug!("Package has {} slides", package.slide_parts.len());
        Ok(package)
    }

    pub fn slide_count(&self) -> usize {
        self.slide_parts.len()
    }

    /// Part names of the slides, in presentation order.
    pub fn slide_parts(&self) -> &[String] {
        &self.slide_parts
    }

    /// Pictures and tables of slide `index` (0-based), in document order.
    pub fn slide_shapes(&mut self, index: usize) -> Result<Vec<SlideShape>, PptxError> {
        let part = self
            .slide_parts
            .get(index)
            .cloned()
            .ok_or_else(|| PptxError::MissingPart(format!("slide #{}", index + 1)))?;

        let xml = self.read_xml(&part)?;
        let rels = self.part_relationships(&part)?;
        let images: HashMap<String, String> = rels
            .into_iter()
            .filter(|r| !r.external && r.rel_type.ends_with("/image"))
            .map(|r| (r.id, resolve_target(part_dir(&part), &r.target)))
            .collect();

        parse_slide_shapes(&xml, &part, &images)
    }

    /// Raw bytes of a package part.
    pub fn read_part(&mut self, path: &str) -> Result<Vec<u8>, PptxError> {
        let mut file = self.archive.by_name(path).map_err(|e| match e {
            ZipError::FileNotFound => PptxError::MissingPart(path.to_string()),
            other => PptxError::Zip(format!("{path}: {other}")),
        })?;
        let mut buf = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut buf)
            .map_err(|e| PptxError::Zip(format!("{path}: {e}")))?;
        Ok(buf)
    }

    /// Title and author, if the package declares them.
    pub fn metadata(&mut self) -> DeckMetadata {
        let mut meta = DeckMetadata {
            slide_count: self.slide_count(),
            ..DeckMetadata::default()
        };
        let Ok(xml) = self.read_xml(CORE_PROPS_PART) else {
            return meta;
        };

        let mut reader = Reader::from_str(&xml);
        let mut current: Option<&'static str> = None;
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    current = match e.name().local_name().as_ref() {
                        b"title" => Some("title"),
                        b"creator" => Some("creator"),
                        _ => None,
                    };
                }
                Ok(Event::Text(ref e)) => {
                    let value = e.unescape().map(|s| s.trim().to_string()).unwrap_or_default();
                    match current {
                        Some("title") if !value.is_empty() => meta.title = Some(value),
                        Some("creator") if !value.is_empty() => meta.author = Some(value),
                        _ => {}
                    }
                }
                Ok(Event::End(_)) => current = None,
                Ok(Event::Eof) | Err(_) => break,
                _ => {}
            }
        }
        meta
    }

    fn read_xml(&mut self, path: &str) -> Result<String, PptxError> {
        let bytes = self.read_part(path)?;
        String::from_utf8(bytes).map_err(|e| PptxError::Xml {
            part: path.to_string(),
            detail: e.to_string(),
        })
    }

    /// Relationships of `part`; a part without a rels file has none.
    fn part_relationships(&mut self, part: &str) -> Result<Vec<Relationship>, PptxError> {
        let rels_path = rels_path_for(part);
        match self.read_xml(&rels_path) {
            Ok(xml) => parse_relationships(&xml, &rels_path),
            Err(PptxError::MissingPart(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    fn resolve_slide_order(&mut self) -> Result<Vec<String>, PptxError> {
        let xml = self.read_xml(PRESENTATION_PART)?;
        let rels: HashMap<String, String> = self
            .part_relationships(PRESENTATION_PART)?
            .into_iter()
            .map(|r| (r.id, r.target))
            .collect();

        let mut reader = Reader::from_str(&xml);
        let mut slides = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                    if e.name().local_name().as_ref() == b"sldId" =>
                {
                    let Some(rel_id) = prefixed_attr(e, b"id") else {
                        continue;
                    };
                    let target = rels.get(&rel_id).ok_or_else(|| PptxError::Xml {
                        part: PRESENTATION_PART.to_string(),
                        detail: format!("slide relationship '{rel_id}' not found"),
                    })?;
                    slides.push(resolve_target(part_dir(PRESENTATION_PART), target));
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(PptxError::Xml {
                        part: PRESENTATION_PART.to_string(),
                        detail: e.to_string(),
                    })
                }
                _ => {}
            }
        }
        Ok(slides)
    }
}

// ── Relationships ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Relationship {
    id: String,
    rel_type: String,
    target: String,
    external: bool,
}

fn parse_relationships(xml: &str, part: &str) -> Result<Vec<Relationship>, PptxError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.name().local_name().as_ref() == b"Relationship" =>
            {
                let mut rel = Relationship {
                    id: String::new(),
                    rel_type: String::new(),
                    target: String::new(),
                    external: false,
                };
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).to_string();
                    match attr.key.as_ref() {
                        b"Id" => rel.id = value,
                        b"Type" => rel.rel_type = value,
                        b"Target" => rel.target = value,
                        b"TargetMode" => rel.external = value == "External",
                        _ => {}
                    }
                }
                if !rel.id.is_empty() && !rel.target.is_empty() {
                    rels.push(rel);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PptxError::Xml {
                    part: part.to_string(),
                    detail: e.to_string(),
                })
            }
            _ => {}
        }
    }

    Ok(rels)
}

/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`
fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Resolve a relationship target against the directory of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

/// Value of a namespaced attribute such as `r:id` or `r:embed`.
fn prefixed_attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        (attr.key.prefix().is_some() && attr.key.local_name().as_ref() == local)
            .then(|| String::from_utf8_lossy(&attr.value).to_string())
    })
}

fn plain_attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

// ── Slide shapes ─────────────────────────────────────────────────────────

#[derive(Default)]
struct PictureState {
    name: Option<String>,
    embed: Option<String>,
}

#[derive(Default)]
struct TableState {
    rows: Vec<Vec<String>>,
    /// Paragraphs of the cell being read.
    cell: Option<Vec<String>>,
    in_text: bool,
    error: Option<String>,
}

impl TableState {
    fn push_text(&mut self, text: &str) {
        if let Some(last) = self.cell.as_mut().and_then(|paras| paras.last_mut()) {
            last.push_str(text);
        }
    }

    fn finish_cell(&mut self) {
        let text = self.cell.take().unwrap_or_default().join("\n");
        match self.rows.last_mut() {
            Some(row) => row.push(text),
            None => {
                self.error.get_or_insert_with(|| "table cell outside of a row".to_string());
            }
        }
    }
}

/// Walk slide XML and collect pictures and tables in document order.
///
/// Shapes inside group shapes are included. Pictures that are only linked
/// (no embedded blip) are skipped, as is every `mc:Fallback` subtree, since it
/// repeats the content of its `mc:Choice`.
fn parse_slide_shapes(
    xml: &str,
    part: &str,
    images: &HashMap<String, String>,
) -> Result<Vec<SlideShape>, PptxError> {
    let xml_err = |e: quick_xml::Error| PptxError::Xml {
        part: part.to_string(),
        detail: e.to_string(),
    };
    let mut reader = Reader::from_str(xml);
    let mut shapes = Vec::new();
    let mut picture: Option<PictureState> = None;
    let mut table: Option<TableState> = None;

    loop {
        let event = reader.read_event().map_err(xml_err)?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.name().local_name().as_ref() {
                    b"Fallback" if !is_empty => {
                        reader.read_to_end(e.name()).map_err(xml_err)?;
                    }
                    b"pic" if !is_empty => picture = Some(PictureState::default()),
                    b"cNvPr" => {
                        if let Some(p) = picture.as_mut().filter(|p| p.name.is_none()) {
                            p.name = plain_attr(e, b"name");
                        }
                    }
                    b"blip" => {
                        if let Some(p) = picture.as_mut() {
                            p.embed = prefixed_attr(e, b"embed");
                        }
                    }
                    b"tbl" if !is_empty => table = Some(TableState::default()),
                    b"tr" => {
                        if let Some(t) = table.as_mut() {
                            t.rows.push(Vec::new());
                        }
                    }
                    b"tc" => {
                        if let Some(t) = table.as_mut() {
                            t.cell = Some(Vec::new());
                            if is_empty {
                                t.finish_cell();
                            }
                        }
                    }
                    b"p" => {
                        if let Some(paras) = table.as_mut().and_then(|t| t.cell.as_mut()) {
                            paras.push(String::new());
                        }
                    }
                    b"t" if !is_empty => {
                        if let Some(t) = table.as_mut() {
                            t.in_text = t.cell.is_some();
                        }
                    }
                    b"br" => {
                        if let Some(t) = table.as_mut() {
                            t.push_text("\n");
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) => {
                if let Some(t) = table.as_mut().filter(|t| t.in_text) {
                    match e.unescape() {
                        Ok(text) => t.push_text(&text),
                        Err(err) => {
                            t.error.get_or_insert_with(|| err.to_string());
                        }
                    }
                }
            }
            Event::End(ref e) => match e.name().local_name().as_ref() {
                b"t" => {
                    if let Some(t) = table.as_mut() {
                        t.in_text = false;
                    }
                }
                b"tc" => {
                    if let Some(t) = table.as_mut() {
                        t.finish_cell();
                    }
                }
                b"tbl" => {
                    if let Some(t) = table.take() {
                        shapes.push(SlideShape::Table(match t.error {
                            Some(err) => Err(err),
                            None => Ok(TableShape::new(t.rows)),
                        }));
                    }
                }
                b"pic" => {
                    if let Some(p) = picture.take() {
                        if let Some(rel_id) = p.embed {
                            shapes.push(SlideShape::Picture {
                                name: p.name,
                                media_path: images.get(&rel_id).cloned(),
                            });
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{DeckBuilder, ShapeSpec};
    use std::io::Cursor;

    fn open(bytes: &[u8]) -> PptxPackage<Cursor<&[u8]>> {
        PptxPackage::open(Cursor::new(bytes)).expect("package opens")
    }

    #[test]
    fn resolves_relative_and_absolute_targets() {
        assert_eq!(resolve_target("ppt/slides", "../media/image1.png"), "ppt/media/image1.png");
        assert_eq!(resolve_target("ppt", "slides/slide3.xml"), "ppt/slides/slide3.xml");
        assert_eq!(resolve_target("ppt/slides", "/ppt/media/x.jpeg"), "ppt/media/x.jpeg");
        assert_eq!(rels_path_for("ppt/slides/slide1.xml"), "ppt/slides/_rels/slide1.xml.rels");
    }

    #[test]
    fn slides_follow_presentation_order() {
        let bytes = DeckBuilder::new()
            .slide(vec![ShapeSpec::Text("first".into())])
            .slide(vec![ShapeSpec::Text("second".into())])
            .slide(vec![ShapeSpec::Text("third".into())])
            .reverse_part_names()
            .build();
        let pkg = open(&bytes);
        assert_eq!(
            pkg.slide_parts(),
            &["ppt/slides/slide3.xml", "ppt/slides/slide2.xml", "ppt/slides/slide1.xml"]
        );
    }

    #[test]
    fn shapes_come_back_in_document_order() {
        let bytes = DeckBuilder::new()
            .slide(vec![
                ShapeSpec::Table(vec![vec!["a".into(), "b".into()]]),
                ShapeSpec::Text("caption".into()),
                ShapeSpec::Picture(DeckBuilder::tiny_png()),
            ])
            .build();
        let mut pkg = open(&bytes);
        let shapes = pkg.slide_shapes(0).unwrap();

        assert_eq!(shapes.len(), 2);
        assert!(matches!(shapes[0], SlideShape::Table(Ok(_))));
        match &shapes[1] {
            SlideShape::Picture { media_path, name } => {
                assert_eq!(media_path.as_deref(), Some("ppt/media/image1.png"));
                assert!(name.as_deref().unwrap_or("").starts_with("Picture"));
            }
            other => panic!("expected picture, got {other:?}"),
        }
    }

    #[test]
    fn table_cells_keep_paragraphs_and_escapes() {
        let bytes = DeckBuilder::new()
            .slide(vec![ShapeSpec::Table(vec![
                vec!["Dimension".into(), "Score".into()],
                vec!["R&D\nLeadership".into(), "<71>".into()],
            ])])
            .build();
        let mut pkg = open(&bytes);
        let shapes = pkg.slide_shapes(0).unwrap();

        let SlideShape::Table(Ok(table)) = &shapes[0] else {
            panic!("expected a table, got {shapes:?}");
        };
        assert_eq!(table.rows[0], vec!["Dimension", "Score"]);
        assert_eq!(table.rows[1], vec!["R&D\nLeadership", "<71>"]);
    }

    #[test]
    fn grouped_pictures_are_found() {
        let bytes = DeckBuilder::new()
            .slide(vec![ShapeSpec::Group(vec![ShapeSpec::Picture(
                DeckBuilder::tiny_png(),
            )])])
            .build();
        let mut pkg = open(&bytes);
        let shapes = pkg.slide_shapes(0).unwrap();
        assert_eq!(shapes.len(), 1);
        assert!(matches!(shapes[0], SlideShape::Picture { .. }));
    }

    #[test]
    fn bad_entity_in_table_fails_only_that_table() {
        let bytes = DeckBuilder::new()
            .slide(vec![
                ShapeSpec::RawTableCell("&bogus;".into()),
                ShapeSpec::Table(vec![vec!["ok".into()]]),
            ])
            .build();
        let mut pkg = open(&bytes);
        let shapes = pkg.slide_shapes(0).unwrap();
        assert!(matches!(shapes[0], SlideShape::Table(Err(_))));
        assert!(matches!(shapes[1], SlideShape::Table(Ok(_))));
    }

    #[test]
    fn alternate_content_fallback_is_not_counted_twice() {
        let xml = r#"<p:sld xmlns:p="p" xmlns:a="a" xmlns:r="r" xmlns:mc="mc"><p:cSld><p:spTree>
            <mc:AlternateContent>
              <mc:Choice Requires="p14">
                <p:pic><p:nvPicPr><p:cNvPr id="2" name="Chart"/></p:nvPicPr>
                  <p:blipFill><a:blip r:embed="rId2"/></p:blipFill></p:pic>
              </mc:Choice>
              <mc:Fallback>
                <p:pic><p:nvPicPr><p:cNvPr id="2" name="Chart"/></p:nvPicPr>
                  <p:blipFill><a:blip r:embed="rId2"/></p:blipFill></p:pic>
              </mc:Fallback>
            </mc:AlternateContent>
            <p:pic><p:nvPicPr><p:cNvPr id="3" name="Logo"/></p:nvPicPr>
              <p:blipFill><a:blip r:embed="rId3"/></p:blipFill></p:pic>
          </p:spTree></p:cSld></p:sld>"#;
        let images: HashMap<String, String> = [
            ("rId2".to_string(), "ppt/media/image1.png".to_string()),
            ("rId3".to_string(), "ppt/media/image2.png".to_string()),
        ]
        .into_iter()
        .collect();

        let shapes = parse_slide_shapes(xml, "ppt/slides/slide1.xml", &images).unwrap();

        let names: Vec<Option<String>> = shapes
            .into_iter()
            .map(|s| match s {
                SlideShape::Picture { name, .. } => name,
                SlideShape::Table(_) => None,
            })
            .collect();
        assert_eq!(
            names,
            vec![Some("Chart".to_string()), Some("Logo".to_string())]
        );
    }

    #[test]
    fn picture_with_dangling_relationship_has_no_media_path() {
        let bytes = DeckBuilder::new()
            .slide(vec![ShapeSpec::DanglingPicture])
            .build();
        let mut pkg = open(&bytes);
        let shapes = pkg.slide_shapes(0).unwrap();
        assert_eq!(
            shapes,
            vec![SlideShape::Picture {
                name: Some("Picture 2".into()),
                media_path: None
            }]
        );
    }

    #[test]
    fn non_zip_bytes_are_rejected() {
        let err = PptxPackage::open(Cursor::new(&b"not a zip"[..])).err().unwrap();
        assert!(matches!(err, PptxError::Zip(_)));
    }

    #[test]
    fn zip_without_presentation_part_is_rejected() {
        let bytes = DeckBuilder::zip_with(&[("hello.txt", b"hi".as_slice())]);
        let err = PptxPackage::open(Cursor::new(bytes.as_slice())).err().unwrap();
        assert!(matches!(err, PptxError::MissingPart(p) if p == "ppt/presentation.xml"));
    }

    #[test]
    fn core_properties_are_read() {
        let bytes = DeckBuilder::new()
            .title("OHI Survey 2024")
            .slide(vec![])
            .build();
        let mut pkg = open(&bytes);
        let meta = pkg.metadata();
        assert_eq!(meta.title.as_deref(), Some("OHI Survey 2024"));
        assert_eq!(meta.slide_count, 1);
    }
}
