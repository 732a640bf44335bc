//! Content extraction: presentation or image files → ordered items.
//!
//! Slides are walked in presentation order and shapes in document order.
//! Pictures go through the image normaliser, tables through the table
//! serialiser. A single item that fails is dropped with an [`ItemError`]
//! warning; a package or slide part that cannot be parsed fails the whole
//! document and nothing partial is returned.
//!
//! Which pictures are kept depends on [`ExtractionPolicy`]:
//!
//! * `PerSlide` scans the first `max_slides` slides and keeps the first
//!   picture per slide that normalises within the ceiling, plus every table.
//! * `GlobalCap` scans every slide and keeps pictures until `max_images` is
//!   reached, at which point the scan stops.

use crate::config::{ExtractionLimits, ExtractionPolicy, ImageLimits};
use crate::error::{DeckReportError, ItemError};
use crate::pipeline::normalize::{normalize_image, NormalizeError, NormalizedImage};
use crate::pipeline::pptx::{PptxError, PptxPackage, SlideShape};
use crate::pipeline::table::serialize_table;
use serde::Serialize;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// A normalised picture taken from a slide or an image file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedImage {
    /// 1-indexed slide, or file position for standalone images.
    pub slide: usize,
    /// Base64 JPEG. Not serialised.
    #[serde(skip_serializing)]
    pub data: String,
    pub mime_type: String,
    pub size_kb: f64,
    pub width: u32,
    pub height: u32,
}

/// A serialised table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedTable {
    pub slide: usize,
    pub text: String,
}

/// One unit of extracted content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractedItem {
    Image(ExtractedImage),
    Table(ExtractedTable),
}

impl ExtractedItem {
    pub fn slide(&self) -> usize {
        match self {
            ExtractedItem::Image(img) => img.slide,
            ExtractedItem::Table(t) => t.slide,
        }
    }
}

/// Everything pulled out of one input.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Extraction {
    /// Name of the input, for messages.
    pub source_name: String,
    /// Images and tables in document order.
    pub items: Vec<ExtractedItem>,
    /// Number of image items in `items`.
    pub image_count: usize,
    /// Items that were dropped.
    pub warnings: Vec<ItemError>,
    /// Slides in the deck (files, for image input).
    pub slide_count: usize,
    /// Slides actually walked.
    pub slides_scanned: usize,
}

impl Extraction {
    pub fn images(&self) -> Vec<&ExtractedImage> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ExtractedItem::Image(img) => Some(img),
                ExtractedItem::Table(_) => None,
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<&ExtractedTable> {
        self.items
            .iter()
            .filter_map(|item| match item {
                ExtractedItem::Table(t) => Some(t),
                ExtractedItem::Image(_) => None,
            })
            .collect()
    }

    pub fn table_count(&self) -> usize {
        self.items.len() - self.image_count
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All table texts, each labelled with its slide, separated by a blank line.
    pub fn table_text(&self) -> String {
        self.tables()
            .iter()
            .map(|t| format!("[slide {}]\n{}", t.slide, t.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn push_image(&mut self, slide: usize, img: NormalizedImage) {
        self.image_count += 1;
        self.items.push(ExtractedItem::Image(ExtractedImage {
            slide,
            data: img.data,
            mime_type: img.mime_type,
            size_kb: img.size_kb,
            width: img.width,
            height: img.height,
        }));
    }

    fn warn(&mut self, warning: ItemError) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Extract images and tables from `.pptx` bytes.
///
/// Runs synchronously; callers on an async runtime should wrap it in
/// `spawn_blocking`.
pub fn extract_presentation(
    bytes: &[u8],
    source_name: &str,
    limits: &ExtractionLimits,
) -> Result<Extraction, DeckReportError> {
    let corrupt = |e: PptxError| DeckReportError::CorruptPresentation {
        source_name: source_name.to_string(),
        detail: e.to_string(),
    };

    let mut package = PptxPackage::open(Cursor::new(bytes)).map_err(corrupt)?;
    let slide_count = package.slide_count();
    let mut out = Extraction {
        source_name: source_name.to_string(),
        slide_count,
        ..Extraction::default()
    };

    let slide_limit = match limits.policy {
        ExtractionPolicy::PerSlide => slide_count.min(limits.max_slides),
        ExtractionPolicy::GlobalCap => slide_count,
    };
    info!(
        "Extracting from '{}': {} slides, scanning {} ({:?})",
        source_name, slide_count, slide_limit, limits.policy
    );

    'slides: for index in 0..slide_limit {
        let slide = index + 1;
        let shapes = package.slide_shapes(index).map_err(corrupt)?;
        out.slides_scanned = slide;
        let mut slide_has_image = false;

        for shape in shapes {
            match shape {
                SlideShape::Picture { name, media_path } => {
                    if limits.policy == ExtractionPolicy::PerSlide && slide_has_image {
                        debug!("Slide {}: skipping extra picture {:?}", slide, name);
                        continue;
                    }
                    let Some(path) = media_path else {
                        out.warn(ItemError::ImageMissing {
                            slide,
                            target: name.unwrap_or_else(|| "<unnamed picture>".into()),
                        });
                        continue;
                    };
                    let raw = match package.read_part(&path) {
                        Ok(raw) => raw,
                        Err(PptxError::MissingPart(target)) => {
                            out.warn(ItemError::ImageMissing { slide, target });
                            continue;
                        }
                        Err(e) => {
                            out.warn(ItemError::ImageFailed {
                                slide,
                                detail: e.to_string(),
                            });
                            continue;
                        }
                    };
                    if let Some(img) = normalize_or_warn(&raw, slide, &limits.image, &mut out) {
                        debug!("Slide {}: kept {} ({:.1} KB)", slide, path, img.size_kb);
                        out.push_image(slide, img);
                        slide_has_image = true;
                    }
                    if limits.policy == ExtractionPolicy::GlobalCap
                        && out.image_count >= limits.max_images
                    {
                        info!("Image cap of {} reached on slide {}", limits.max_images, slide);
                        break 'slides;
                    }
                }
                SlideShape::Table(Ok(table)) => {
                    if table.is_empty() {
                        debug!("Slide {}: skipping empty table", slide);
                        continue;
                    }
                    out.items.push(ExtractedItem::Table(ExtractedTable {
                        slide,
                        text: serialize_table(&table, limits.table_char_ceiling),
                    }));
                }
                SlideShape::Table(Err(detail)) => {
                    out.warn(ItemError::TableFailed { slide, detail });
                }
            }
        }
    }

    info!(
        "Extraction done: {} images, {} tables, {} warnings",
        out.image_count,
        out.table_count(),
        out.warnings.len()
    );
    Ok(out)
}

/// Normalise standalone image files, in the order given.
///
/// Each file's position (1-indexed) stands in for the slide number.
pub fn extract_images(files: &[(String, Vec<u8>)], limits: &ExtractionLimits) -> Extraction {
    let mut out = Extraction {
        source_name: match files {
            [(name, _)] => name.clone(),
            _ => format!("{} images", files.len()),
        },
        slide_count: files.len(),
        slides_scanned: files.len(),
        ..Extraction::default()
    };

    for (i, (name, bytes)) in files.iter().enumerate() {
        let position = i + 1;
        if let Some(img) = normalize_or_warn(bytes, position, &limits.image, &mut out) {
            debug!("Image {} ('{}'): {}x{}", position, name, img.width, img.height);
            out.push_image(position, img);
        }
    }

    info!(
        "Normalised {}/{} image files",
        out.image_count,
        files.len()
    );
    out
}

fn normalize_or_warn(
    raw: &[u8],
    slide: usize,
    limits: &ImageLimits,
    out: &mut Extraction,
) -> Option<NormalizedImage> {
    match normalize_image(raw, limits) {
        Ok(img) => Some(img),
        Err(NormalizeError::Oversized { size_kb, ceiling_kb }) => {
            out.warn(ItemError::ImageOversized {
                slide,
                size_kb,
                ceiling_kb,
            });
            None
        }
        Err(e) => {
            out.warn(ItemError::ImageFailed {
                slide,
                detail: e.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::{DeckBuilder, ShapeSpec};

    fn table(rows: &[&[&str]]) -> ShapeSpec {
        ShapeSpec::Table(
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    fn opaque_png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(w, h, |x, _| {
            if (x / 100) % 2 == 0 {
                image::Rgb([37, 99, 235])
            } else {
                image::Rgb([250, 250, 250])
            }
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn limits(policy: ExtractionPolicy) -> ExtractionLimits {
        ExtractionLimits {
            policy,
            ..ExtractionLimits::default()
        }
    }

    #[test]
    fn chart_table_and_blank_slide() {
        let deck = DeckBuilder::new()
            .slide(vec![ShapeSpec::Picture(opaque_png(2000, 2000))])
            .slide(vec![table(&[&["Dimension", "Score"], &["Direction", "64"]])])
            .slide(vec![])
            .build();

        let ex = extract_presentation(&deck, "ohi.pptx", &ExtractionLimits::default()).unwrap();

        assert_eq!(ex.slide_count, 3);
        assert_eq!(ex.image_count, 1);
        assert_eq!(ex.items.len(), 2);
        match &ex.items[0] {
            ExtractedItem::Image(img) => {
                assert_eq!(img.slide, 1);
                assert!(img.size_kb <= 500.0);
                assert_eq!((img.width, img.height), (1024, 1024));
            }
            other => panic!("expected image first, got {other:?}"),
        }
        assert_eq!(
            ex.items[1],
            ExtractedItem::Table(ExtractedTable {
                slide: 2,
                text: "Dimension | Score\nDirection | 64".into()
            })
        );
        assert!(ex.warnings.is_empty());
    }

    #[test]
    fn per_slide_keeps_one_picture_and_all_tables() {
        let deck = DeckBuilder::new()
            .slide(vec![
                ShapeSpec::Picture(DeckBuilder::tiny_png()),
                table(&[&["a"]]),
                ShapeSpec::Picture(DeckBuilder::tiny_png()),
                table(&[&["b"]]),
            ])
            .build();

        let ex = extract_presentation(&deck, "d", &limits(ExtractionPolicy::PerSlide)).unwrap();
        assert_eq!(ex.image_count, 1);
        assert_eq!(ex.tables().len(), 2);
    }

    #[test]
    fn per_slide_falls_through_to_next_picture_when_first_fails() {
        let deck = DeckBuilder::new()
            .slide(vec![
                ShapeSpec::Picture(b"not an image".to_vec()),
                ShapeSpec::Picture(DeckBuilder::tiny_png()),
            ])
            .build();

        let ex = extract_presentation(&deck, "d", &ExtractionLimits::default()).unwrap();
        assert_eq!(ex.image_count, 1);
        assert_eq!(ex.warnings.len(), 1);
        assert!(matches!(ex.warnings[0], ItemError::ImageFailed { slide: 1, .. }));
    }

    #[test]
    fn per_slide_stops_at_slide_cap() {
        let mut builder = DeckBuilder::new();
        for _ in 0..20 {
            builder = builder.slide(vec![ShapeSpec::Picture(DeckBuilder::tiny_png())]);
        }
        let ex = extract_presentation(&builder.build(), "d", &ExtractionLimits::default()).unwrap();
        assert_eq!(ex.slide_count, 20);
        assert_eq!(ex.slides_scanned, 13);
        assert_eq!(ex.image_count, 13);
    }

    #[test]
    fn global_cap_collects_every_picture_until_cap() {
        let pics = |n| (0..n).map(|_| ShapeSpec::Picture(DeckBuilder::tiny_png())).collect();
        let deck = DeckBuilder::new()
            .slide(pics(3))
            .slide(pics(2))
            .slide(vec![table(&[&["after cap"]])])
            .build();

        let capped = ExtractionLimits {
            max_images: 4,
            ..limits(ExtractionPolicy::GlobalCap)
        };
        let ex = extract_presentation(&deck, "d", &capped).unwrap();
        assert_eq!(ex.image_count, 4);
        assert_eq!(ex.slides_scanned, 2);
        assert!(ex.tables().is_empty());
        let slides: Vec<usize> = ex.images().iter().map(|i| i.slide).collect();
        assert_eq!(slides, vec![1, 1, 1, 2]);
    }

    #[test]
    fn oversized_picture_is_dropped_with_warning() {
        let deck = DeckBuilder::new()
            .slide(vec![ShapeSpec::Picture(DeckBuilder::png(400, 400))])
            .build();
        let tight = ExtractionLimits {
            image: ImageLimits {
                ceiling_kb: 0.1,
                ..ImageLimits::default()
            },
            ..ExtractionLimits::default()
        };

        let ex = extract_presentation(&deck, "d", &tight).unwrap();
        assert_eq!(ex.image_count, 0);
        assert!(matches!(
            ex.warnings[0],
            ItemError::ImageOversized { slide: 1, .. }
        ));
    }

    #[test]
    fn broken_items_become_warnings() {
        let deck = DeckBuilder::new()
            .slide(vec![ShapeSpec::MissingMedia])
            .slide(vec![ShapeSpec::RawTableCell("&nope;".into())])
            .slide(vec![ShapeSpec::DanglingPicture])
            .build();

        let ex = extract_presentation(&deck, "d", &ExtractionLimits::default()).unwrap();
        assert!(ex.is_empty());
        let slides: Vec<usize> = ex.warnings.iter().map(ItemError::slide).collect();
        assert_eq!(slides, vec![1, 2, 3]);
        assert!(matches!(
            &ex.warnings[0],
            ItemError::ImageMissing { target, .. } if target == "ppt/media/gone.png"
        ));
        assert!(matches!(ex.warnings[1], ItemError::TableFailed { .. }));
    }

    #[test]
    fn long_tables_are_truncated() {
        let cell = "x".repeat(10);
        let rows: Vec<Vec<String>> = (0..50).map(|_| vec![cell.clone(); 10]).collect();
        let deck = DeckBuilder::new().slide(vec![ShapeSpec::Table(rows)]).build();

        let ex = extract_presentation(&deck, "d", &ExtractionLimits::default()).unwrap();
        let text = &ex.tables()[0].text;
        assert_eq!(text.chars().count(), 2003);
        assert!(text.ends_with("..."));
    }

    #[test]
    fn corrupt_package_is_document_error() {
        let err = extract_presentation(b"PK\x03\x04garbage", "bad.pptx", &ExtractionLimits::default())
            .unwrap_err();
        match err {
            DeckReportError::CorruptPresentation { source_name, .. } => {
                assert_eq!(source_name, "bad.pptx")
            }
            other => panic!("expected CorruptPresentation, got {other:?}"),
        }
    }

    #[test]
    fn malformed_slide_xml_fails_the_document() {
        let deck = DeckBuilder::new().slide(vec![]).build();
        let mut entries = unzip(&deck);
        for (name, data) in entries.iter_mut() {
            if name == "ppt/slides/slide1.xml" {
                *data = b"<p:sld><p:cSld></p:wrong></p:sld>".to_vec();
            }
        }
        let refs: Vec<(&str, &[u8])> = entries.iter().map(|(n, d)| (n.as_str(), d.as_slice())).collect();
        let broken = DeckBuilder::zip_with(&refs);

        let err = extract_presentation(&broken, "d", &ExtractionLimits::default()).unwrap_err();
        assert!(matches!(err, DeckReportError::CorruptPresentation { .. }));
    }

    #[test]
    fn table_text_labels_slides() {
        let deck = DeckBuilder::new()
            .slide(vec![table(&[&["a", "1"]])])
            .slide(vec![])
            .slide(vec![table(&[&["b", "2"]])])
            .build();
        let ex = extract_presentation(&deck, "d", &ExtractionLimits::default()).unwrap();
        assert_eq!(ex.table_text(), "[slide 1]\na | 1\n\n[slide 3]\nb | 2");
    }

    #[test]
    fn image_files_use_their_position() {
        let files = vec![
            ("a.png".to_string(), DeckBuilder::tiny_png()),
            ("b.txt".to_string(), b"plain text".to_vec()),
            ("c.png".to_string(), DeckBuilder::tiny_png()),
        ];
        let ex = extract_images(&files, &ExtractionLimits::default());
        assert_eq!(ex.source_name, "3 images");
        let positions: Vec<usize> = ex.images().iter().map(|i| i.slide).collect();
        assert_eq!(positions, vec![1, 3]);
        assert_eq!(ex.warnings.len(), 1);
        assert_eq!(ex.warnings[0].slide(), 2);
    }

    fn unzip(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        use std::io::Read;
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut f = archive.by_index(i).unwrap();
                let mut data = Vec::new();
                f.read_to_end(&mut data).unwrap();
                (f.name().to_string(), data)
            })
            .collect()
    }
}
