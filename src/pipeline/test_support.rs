//! In-memory `.pptx` fixtures.
//!
//! Builds the smallest package the reader accepts: presentation part, slide
//! parts with their rels, and media. Depends only on `zip` and `image` so the
//! integration tests can include it with `#[path]`.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

const NS: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// One shape on a fixture slide.
#[derive(Debug, Clone)]
pub enum ShapeSpec {
    /// Embedded picture with these raw bytes.
    Picture(Vec<u8>),
    /// Table; cell text is escaped, `\n` becomes a paragraph break.
    Table(Vec<Vec<String>>),
    /// Text box, ignored by the extractor.
    Text(String),
    /// Group shape wrapping other shapes.
    Group(Vec<ShapeSpec>),
    /// One-cell table whose `a:t` content is written verbatim.
    RawTableCell(String),
    /// Picture whose relationship id is absent from the slide rels.
    DanglingPicture,
    /// Picture whose relationship points at a media part that does not exist.
    MissingMedia,
}

#[derive(Debug, Default)]
pub struct DeckBuilder {
    slides: Vec<Vec<ShapeSpec>>,
    reverse_names: bool,
    title: Option<String>,
}

struct SlideParts {
    body: String,
    rels: String,
    next_shape_id: usize,
    next_rel_id: usize,
    media: Vec<(String, Vec<u8>)>,
}

impl DeckBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slide(mut self, shapes: Vec<ShapeSpec>) -> Self {
        self.slides.push(shapes);
        self
    }

    /// Name slide parts in reverse so part-name order disagrees with
    /// presentation order.
    pub fn reverse_part_names(mut self) -> Self {
        self.reverse_names = true;
        self
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let count = self.slides.len();
        let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
        let mut sld_ids = String::new();
        let mut pres_rels = relationship(
            "rId1",
            "slideMaster",
            "slideMasters/slideMaster1.xml",
        );
        let mut media_counter = 0usize;

        for (i, shapes) in self.slides.iter().enumerate() {
            let file_no = if self.reverse_names { count - i } else { i + 1 };
            let rid = format!("rId{}", i + 2);
            sld_ids.push_str(&format!(r#"<p:sldId id="{}" r:id="{}"/>"#, 256 + i, rid));
            pres_rels.push_str(&relationship(&rid, "slide", &format!("slides/slide{file_no}.xml")));

            let mut slide = SlideParts {
                body: String::new(),
                rels: relationship("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                next_shape_id: 2,
                next_rel_id: 2,
                media: Vec::new(),
            };
            for shape in shapes {
                write_shape(shape, &mut slide, &mut media_counter);
            }

            let xml = format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<p:sld {}><p:cSld><p:spTree>"#,
                    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#,
                    r#"<p:grpSpPr/>{}</p:spTree></p:cSld></p:sld>"#
                ),
                NS, slide.body
            );
            parts.push((format!("ppt/slides/slide{file_no}.xml"), xml.into_bytes()));
            parts.push((
                format!("ppt/slides/_rels/slide{file_no}.xml.rels"),
                relationships(&slide.rels).into_bytes(),
            ));
            parts.extend(slide.media);
        }

        let presentation = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<p:presentation {}><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/>"#,
                r#"</p:sldMasterIdLst><p:sldIdLst>{}</p:sldIdLst>"#,
                r#"<p:sldSz cx="12192000" cy="6858000"/></p:presentation>"#
            ),
            NS, sld_ids
        );
        parts.push(("ppt/presentation.xml".into(), presentation.into_bytes()));
        parts.push((
            "ppt/_rels/presentation.xml.rels".into(),
            relationships(&pres_rels).into_bytes(),
        ));
        parts.push((
            "[Content_Types].xml".into(),
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
                r#"<Default Extension="png" ContentType="image/png"/>"#,
                r#"<Default Extension="xml" ContentType="application/xml"/></Types>"#
            )
            .as_bytes()
            .to_vec(),
        ));
        if let Some(title) = &self.title {
            let core = format!(
                concat!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                    r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
                    r#"xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>{}</dc:title>"#,
                    r#"<dc:creator>Fixture</dc:creator></cp:coreProperties>"#
                ),
                escape(title)
            );
            parts.push(("docProps/core.xml".into(), core.into_bytes()));
        }

        let entries: Vec<(&str, &[u8])> = parts
            .iter()
            .map(|(name, data)| (name.as_str(), data.as_slice()))
            .collect();
        Self::zip_with(&entries)
    }

    /// A small opaque PNG.
    pub fn tiny_png() -> Vec<u8> {
        Self::png(32, 24)
    }

    /// A PNG with a semi-transparent gradient, `width` × `height` px.
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 160, 200])
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("png encode");
        buf
    }

    /// A zip with exactly these entries.
    pub fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).expect("start zip entry");
            zip.write_all(data).expect("write zip entry");
        }
        zip.finish().expect("finish zip").into_inner()
    }
}

fn write_shape(shape: &ShapeSpec, slide: &mut SlideParts, media_counter: &mut usize) {
    let id = slide.next_shape_id;
    slide.next_shape_id += 1;

    match shape {
        ShapeSpec::Picture(bytes) => {
            *media_counter += 1;
            let media = format!("image{}.png", media_counter);
            let rid = next_rel(slide);
            slide.rels.push_str(&relationship(&rid, "image", &format!("../media/{media}")));
            slide.media.push((format!("ppt/media/{media}"), bytes.clone()));
            slide.body.push_str(&picture_xml(id, &rid));
        }
        ShapeSpec::MissingMedia => {
            let rid = next_rel(slide);
            slide.rels.push_str(&relationship(&rid, "image", "../media/gone.png"));
            slide.body.push_str(&picture_xml(id, &rid));
        }
        ShapeSpec::DanglingPicture => slide.body.push_str(&picture_xml(id, "rId99")),
        ShapeSpec::Table(rows) => {
            let rows_xml: String = rows
                .iter()
                .map(|row| {
                    let cells: String = row
                        .iter()
                        .map(|cell| {
                            let paras: String = cell
                                .split('\n')
                                .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", escape(p)))
                                .collect();
                            format!("<a:tc><a:txBody><a:bodyPr/>{paras}</a:txBody><a:tcPr/></a:tc>")
                        })
                        .collect();
                    format!(r#"<a:tr h="370840">{cells}</a:tr>"#)
                })
                .collect();
            slide.body.push_str(&table_xml(id, &rows_xml));
        }
        ShapeSpec::RawTableCell(raw) => {
            let rows_xml = format!(
                r#"<a:tr h="370840"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>{raw}</a:t></a:r></a:p></a:txBody></a:tc></a:tr>"#
            );
            slide.body.push_str(&table_xml(id, &rows_xml));
        }
        ShapeSpec::Text(text) => slide.body.push_str(&format!(
            concat!(
                r#"<p:sp><p:nvSpPr><p:cNvPr id="{}" name="TextBox {}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#,
                r#"<p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp>"#
            ),
            id,
            id,
            escape(text)
        )),
        ShapeSpec::Group(inner) => {
            slide.body.push_str(&format!(
                r#"<p:grpSp><p:nvGrpSpPr><p:cNvPr id="{id}" name="Group {id}"/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>"#
            ));
            for s in inner {
                write_shape(s, slide, media_counter);
            }
            slide.body.push_str("</p:grpSp>");
        }
    }
}

fn next_rel(slide: &mut SlideParts) -> String {
    let rid = format!("rId{}", slide.next_rel_id);
    slide.next_rel_id += 1;
    rid
}

fn picture_xml(id: usize, rid: &str) -> String {
    format!(
        concat!(
            r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}"/><p:cNvPicPr/><p:nvPr/></p:nvPicPr>"#,
            r#"<p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
            r#"<p:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="914400" cy="914400"/></a:xfrm></p:spPr></p:pic>"#
        ),
        id = id,
        rid = rid
    )
}

fn table_xml(id: usize, rows_xml: &str) -> String {
    format!(
        concat!(
            r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="{id}" name="Table {id}"/>"#,
            r#"<p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr>"#,
            r#"<p:xfrm><a:off x="0" y="0"/><a:ext cx="914400" cy="914400"/></p:xfrm>"#,
            r#"<a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table">"#,
            r#"<a:tbl><a:tblPr firstRow="1"/><a:tblGrid><a:gridCol w="914400"/></a:tblGrid>{rows}</a:tbl>"#,
            r#"</a:graphicData></a:graphic></p:graphicFrame>"#
        ),
        id = id,
        rows = rows_xml
    )
}

fn relationship(id: &str, kind: &str, target: &str) -> String {
    format!(r#"<Relationship Id="{id}" Type="{REL_BASE}/{kind}" Target="{target}"/>"#)
}

fn relationships(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{RELS_NS}">{body}</Relationships>"#
    )
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
