use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::{Result, SignError};
use crate::features::compositor::{scaled_height, signature_width, SignatureImages};
use crate::features::placement::PlacedSignature;

/// Visible page area in PDF user space (bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

// A4 portrait, used when a page carries no usable MediaBox anywhere up its tree.
const FALLBACK_BOX: PageBox = PageBox {
    left: 0.0,
    bottom: 0.0,
    width: 595.0,
    height: 842.0,
};

pub fn load_document(bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| SignError::DocumentParse(e.to_string()))
}

pub fn page_count(bytes: &[u8]) -> Result<u32> {
    Ok(load_document(bytes)?.get_pages().len() as u32)
}

pub fn page_size(bytes: &[u8], page: u32) -> Result<(f64, f64)> {
    let doc = load_document(bytes)?;
    let page_id = *doc
        .get_pages()
        .get(&page)
        .ok_or(SignError::PageOutOfRange(page))?;
    let b = page_box(&doc, page_id)?;
    Ok((b.width, b.height))
}

/// Bottom-left corner for a stamp of `width` x `height` whose centre sits at the
/// stored top-left-origin percentages.
pub fn stamp_origin(
    page: &PageBox,
    x_percent: f64,
    y_percent: f64,
    width: f64,
    height: f64,
) -> (f64, f64) {
    let cx = page.left + x_percent / 100.0 * page.width;
    let cy = page.bottom + page.height - y_percent / 100.0 * page.height;
    (cx - width / 2.0, cy - height / 2.0)
}

/// Embeds each placement as an image XObject on its page and re-serializes.
///
/// Existing page content is wrapped in `q`/`Q` first so its graphics state
/// cannot leak into the stamps; the original content streams are not modified.
pub fn composite_paged(
    original: &[u8],
    placements: &[PlacedSignature],
    images: &SignatureImages,
) -> Result<Vec<u8>> {
    let mut doc = load_document(original)?;
    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();
    if let Some(p) = placements.iter().find(|p| !pages.contains_key(&p.page)) {
        return Err(SignError::PageOutOfRange(p.page));
    }

    let mut embedded: HashMap<&str, (String, ObjectId)> = HashMap::new();
    let mut isolated: Vec<ObjectId> = Vec::new();

    for placement in placements {
        let page_id = pages[&placement.page];
        let img = images.get(&placement.signature_id)?;

        let (name, image_id) = match embedded.get(placement.signature_id.as_str()) {
            Some(entry) => entry.clone(),
            None => {
                let entry = (format!("SdSig{}", embedded.len()), embed_image(&mut doc, img)?);
                embedded.insert(placement.signature_id.as_str(), entry.clone());
                entry
            }
        };

        if !isolated.contains(&page_id) {
            isolate_existing_content(&mut doc, page_id)?;
            isolated.push(page_id);
        }
        register_xobject(&mut doc, page_id, &name, image_id)?;

        let page = page_box(&doc, page_id)?;
        let width = signature_width(placement.size_px, page.width);
        let height = scaled_height(img, width);
        let (x, y) = stamp_origin(&page, placement.x_percent, placement.y_percent, width, height);
        let content = format!("\nq {width:.3} 0 0 {height:.3} {x:.3} {y:.3} cm /{name} Do Q\n");
        doc.add_page_contents(page_id, content.into_bytes())
            .map_err(|e| SignError::DocumentParse(format!("add_content:{e}")))?;
    }

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| SignError::Encode(e.to_string()))?;
    Ok(out)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// RGB image XObject with the alpha channel as a soft mask.
fn embed_image(doc: &mut Document, img: &RgbaImage) -> Result<ObjectId> {
    let (img_w, img_h) = img.dimensions();
    let mut rgb = Vec::with_capacity((img_w * img_h * 3) as usize);
    let mut alpha = Vec::with_capacity((img_w * img_h) as usize);
    for pixel in img.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img_w as i64,
            "Height" => img_h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha)?,
    ));
    Ok(doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img_w as i64,
            "Height" => img_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
            "SMask" => smask_id,
        },
        deflate(&rgb)?,
    )))
}

fn isolate_existing_content(doc: &mut Document, page_id: ObjectId) -> Result<()> {
    let existing = doc.get_page_contents(page_id);
    if existing.is_empty() {
        return Ok(());
    }
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(dictionary! {}, b"\nQ\n".to_vec()));
    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing.into_iter().map(Object::Reference));
    contents.push(Object::Reference(close_id));
    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

/// Adds `name -> image_id` to the page's XObject resources.
///
/// Inherited or shared resource dictionaries are copied onto the page so other
/// pages never see this page's stamps.
fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    image_id: ObjectId,
) -> Result<()> {
    let mut resources = page_resources(doc, page_id);
    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve_dict(doc, obj))
        .unwrap_or_else(Dictionary::new);
    xobjects.set(name, image_id);
    resources.set("XObject", xobjects);
    page_dict_mut(doc, page_id)?.set("Resources", resources);
    Ok(())
}

fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if let Some(resources) = dict
            .get(b"Resources")
            .ok()
            .and_then(|obj| resolve_dict(doc, obj))
        {
            return resources;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Dictionary::new()
}

fn resolve_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).and_then(Object::as_dict).ok().cloned(),
        Object::Dictionary(dict) => Some(dict.clone()),
        _ => None,
    }
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|_| SignError::DocumentParse("page_missing_dict".into()))
}

pub fn page_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = doc
            .get_object(id)
            .and_then(Object::as_dict)
            .map_err(|_| SignError::DocumentParse("page_missing_dict".into()))?;
        if let Some(b) = extract_media_box(doc, dict) {
            return Ok(b);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    Ok(FALLBACK_BOX)
}

fn extract_media_box(doc: &Document, dict: &Dictionary) -> Option<PageBox> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = obj_to_f64(&arr[0])?;
    let lly = obj_to_f64(&arr[1])?;
    let urx = obj_to_f64(&arr[2])?;
    let ury = obj_to_f64(&arr[3])?;
    let (width, height) = (urx - llx, ury - lly);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(PageBox {
        left: llx,
        bottom: lly,
        width,
        height,
    })
}

pub(crate) fn obj_to_f64(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some((*f).into()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fixtures::{sample_pdf, solid};
    use crate::features::placement::Placements;
    use crate::features::transform::Point;
    use lopdf::content::Content;

    struct Stamp {
        name: String,
        width: f64,
        height: f64,
        x: f64,
        y: f64,
    }

    fn stamps_on(doc: &Document, page_id: ObjectId) -> Vec<Stamp> {
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let mut stamps = Vec::new();
        let mut last_cm: Option<Vec<f64>> = None;
        for op in content.operations {
            match op.operator.as_str() {
                "cm" => last_cm = Some(op.operands.iter().filter_map(obj_to_f64).collect()),
                "Do" => {
                    let name =
                        String::from_utf8(op.operands[0].as_name().unwrap().to_vec()).unwrap();
                    let cm = last_cm.take().unwrap();
                    stamps.push(Stamp {
                        name,
                        width: cm[0],
                        height: cm[3],
                        x: cm[4],
                        y: cm[5],
                    });
                }
                _ => {}
            }
        }
        stamps
    }

    fn images() -> SignatureImages {
        let mut images = SignatureImages::new();
        // 4:1 ink with a white margin that must become transparent.
        let mut ink = solid(40, 10, [20, 20, 90, 255]);
        ink.put_pixel(0, 0, image::Rgba([255, 255, 255, 255]));
        images.insert("ink", ink);
        images.insert("stamp", solid(10, 10, [200, 0, 0, 255]));
        images
    }

    #[test]
    fn top_left_percentages_flip_to_pdf_space() {
        let page = PageBox {
            left: 0.0,
            bottom: 0.0,
            width: 612.0,
            height: 792.0,
        };
        let (x, y) = stamp_origin(&page, 50.0, 10.0, 100.0, 40.0);
        assert!((x + 50.0 - 306.0).abs() < 1e-9);
        assert!((y + 20.0 - (792.0 - 0.10 * 792.0)).abs() < 1e-9);
    }

    #[test]
    fn offset_media_box_is_respected() {
        let page = PageBox {
            left: 10.0,
            bottom: 20.0,
            width: 100.0,
            height: 200.0,
        };
        let (x, y) = stamp_origin(&page, 5.0, 95.0, 0.0, 0.0);
        assert!((x - 15.0).abs() < 1e-9);
        assert!((y - 30.0).abs() < 1e-9);
    }

    #[test]
    fn two_page_document_gets_one_stamp_per_page() {
        let original = sample_pdf(2);
        let mut list = Placements::new();
        list.add("ink", Point::new(50.0, 50.0), 1, 100.0);
        list.add("ink", Point::new(20.0, 80.0), 2, 100.0);

        let signed = composite_paged(&original, list.as_slice(), &images()).unwrap();
        let doc = Document::load_mem(&signed).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let first = stamps_on(&doc, pages[&1]);
        assert_eq!(first.len(), 1);
        let s = &first[0];
        // 612pt page, size 100 -> 244.8pt wide; 4:1 ink -> 61.2pt high.
        assert!((s.width - 244.8).abs() < 1e-2);
        assert!((s.height - 61.2).abs() < 1e-2);
        assert!((s.x + s.width / 2.0 - 306.0).abs() < 1e-2);
        assert!((s.y + s.height / 2.0 - 396.0).abs() < 1e-2);

        let second = stamps_on(&doc, pages[&2]);
        assert_eq!(second.len(), 1);
        let s = &second[0];
        assert!((s.x + s.width / 2.0 - 122.4).abs() < 1e-2);
        assert!((s.y + s.height / 2.0 - 158.4).abs() < 1e-2);
        // The same signature is embedded once and shared by both pages.
        assert_eq!(first[0].name, second[0].name);
    }

    #[test]
    fn original_page_content_is_preserved() {
        let original = sample_pdf(2);
        let source = Document::load_mem(&original).unwrap();
        let source_pages = source.get_pages();

        let mut list = Placements::new();
        list.add("ink", Point::new(50.0, 50.0), 1, 100.0);
        list.add("stamp", Point::new(20.0, 80.0), 2, 60.0);
        let signed = composite_paged(&original, list.as_slice(), &images()).unwrap();
        let doc = Document::load_mem(&signed).unwrap();
        let pages = doc.get_pages();

        for page in [1u32, 2] {
            let before = source.get_page_content(source_pages[&page]).unwrap();
            let after = doc.get_page_content(pages[&page]).unwrap();
            assert!(
                after.windows(before.len()).any(|w| w == before.as_slice()),
                "page {page} lost its original content"
            );
            assert!(after.starts_with(b"q\n"));
        }
    }

    #[test]
    fn stamps_do_not_leak_into_shared_resources() {
        let original = sample_pdf(2);
        let mut list = Placements::new();
        list.add("stamp", Point::new(50.0, 50.0), 1, 100.0);
        let signed = composite_paged(&original, list.as_slice(), &images()).unwrap();
        let doc = Document::load_mem(&signed).unwrap();
        let pages = doc.get_pages();

        let xobjects_on = |page_id: ObjectId| -> usize {
            let resources = page_resources(&doc, page_id);
            resources
                .get(b"XObject")
                .ok()
                .and_then(|o| resolve_dict(&doc, o))
                .map(|d| d.len())
                .unwrap_or(0)
        };
        assert_eq!(xobjects_on(pages[&1]), 1);
        assert_eq!(xobjects_on(pages[&2]), 0);
        assert!(stamps_on(&doc, pages[&2]).is_empty());
        // Fonts from the shared dictionary are still visible on the stamped page.
        assert!(page_resources(&doc, pages[&1]).get(b"Font").is_ok());
    }

    #[test]
    fn missing_page_fails_before_any_output() {
        let original = sample_pdf(1);
        let mut list = Placements::new();
        list.add("ink", Point::new(50.0, 50.0), 1, 100.0);
        list.add("ink", Point::new(50.0, 50.0), 3, 100.0);
        assert!(matches!(
            composite_paged(&original, list.as_slice(), &images()),
            Err(SignError::PageOutOfRange(3))
        ));
    }

    #[test]
    fn page_geometry_helpers_read_inherited_media_box() {
        let original = sample_pdf(3);
        assert_eq!(page_count(&original).unwrap(), 3);
        assert_eq!(page_size(&original, 2).unwrap(), (612.0, 792.0));
        assert!(matches!(page_size(&original, 4), Err(SignError::PageOutOfRange(4))));
    }
}
