//! Form flattening
//!
//! Rasterizers ignore interactive form state, so filled values only show up
//! in rendered images once they are part of the static page content. Each
//! widget's normal appearance stream is registered as a page XObject and
//! drawn at the widget rectangle, then the widget is dropped. The AcroForm
//! goes too unless some widget had no appearance to draw.
//!
//! Flattening never fails a request: `flatten_or_original` falls back to the
//! untouched document on any error.

use std::collections::BTreeSet;
use std::time::Duration;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use thiserror::Error;

use super::split::{catalog_id, number, resolve};
use super::PdfDocument;

/// Bound on page tree depth when looking up inherited resources
const MAX_TREE_DEPTH: usize = 64;

/// Annotation flag bit 2: the annotation is hidden
const HIDDEN_FLAG: i64 = 1 << 1;

#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Malformed widget: {0}")]
    Malformed(String),

    #[error("Flattening task failed: {0}")]
    Join(String),

    #[error("Flattening timed out after {0} seconds")]
    Timeout(u64),
}

/// What flattening one page did
#[derive(Default)]
struct PageFlattening {
    /// Widgets taken off the page, drawn or hidden
    removed: usize,
    removed_ids: Vec<ObjectId>,
    drawn: usize,
    /// Visible widgets left on the page for lack of an appearance stream
    unresolved: usize,
}

/// A widget appearance placed on a page
struct Placement {
    name: String,
    xobject_id: ObjectId,
    matrix: [f32; 6],
}

/// Flatten `doc` in place of its form, or return `None` when it has no form
pub async fn flatten(
    doc: &PdfDocument,
    timeout: Duration,
) -> Result<Option<PdfDocument>, FlattenError> {
    let bytes = doc.shared();
    let task = tokio::task::spawn_blocking(move || flatten_form(&bytes));

    let flattened = match tokio::time::timeout(timeout, task).await {
        Ok(joined) => joined.map_err(|e| FlattenError::Join(e.to_string()))??,
        Err(_) => return Err(FlattenError::Timeout(timeout.as_secs())),
    };

    Ok(flattened.map(|bytes| PdfDocument::new("flattened", bytes)))
}

/// Flatten if possible, otherwise hand back the original document
pub async fn flatten_or_original(doc: PdfDocument, timeout: Duration) -> PdfDocument {
    match flatten(&doc, timeout).await {
        Ok(Some(flattened)) => {
            tracing::debug!(
                "Flattened form fields ({} -> {} bytes)",
                doc.len(),
                flattened.len()
            );
            flattened
        }
        Ok(None) => doc,
        Err(e) => {
            tracing::warn!("Form flattening failed, rendering original document: {}", e);
            doc
        }
    }
}

/// Bake widget appearances into page content
///
/// Returns `Ok(None)` if the document has no AcroForm, or no widget could be
/// taken off its page. Widgets without a usable appearance stream stay
/// interactive: the AcroForm is kept for them with `NeedAppearances` set,
/// so the renderer generates their appearance from the field value.
pub fn flatten_form(bytes: &[u8]) -> Result<Option<Vec<u8>>, FlattenError> {
    let mut doc = Document::load_mem(bytes)?;
    let catalog_id = catalog_id(&doc).map_err(|e| FlattenError::Malformed(e.to_string()))?;

    if !doc.get_dictionary(catalog_id)?.has(b"AcroForm") {
        return Ok(None);
    }
    let default_resources = form_dictionary(&doc, catalog_id)
        .and_then(|form| form.get(b"DR").ok())
        .and_then(|dr| resolve(&doc, dr).as_dict().ok())
        .cloned();

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let mut drawn = 0;
    let mut removed = 0;
    let mut unresolved = 0;
    let mut removed_ids = BTreeSet::new();
    for page_id in page_ids {
        let page = flatten_page(&mut doc, page_id, default_resources.as_ref())?;
        drawn += page.drawn;
        removed += page.removed;
        unresolved += page.unresolved;
        removed_ids.extend(page.removed_ids);
    }

    if removed == 0 {
        return Ok(None);
    }

    if unresolved == 0 {
        doc.get_object_mut(catalog_id)?
            .as_dict_mut()?
            .remove(b"AcroForm");
    } else {
        keep_unresolved_fields(&mut doc, catalog_id, &removed_ids)?;
    }
    doc.prune_objects();

    tracing::debug!(
        "Drew {} widget appearances into page content, left {} widgets to the renderer",
        drawn,
        unresolved
    );

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| FlattenError::Malformed(e.to_string()))?;
    Ok(Some(out))
}

fn flatten_page(
    doc: &mut Document,
    page_id: ObjectId,
    default_resources: Option<&Dictionary>,
) -> Result<PageFlattening, FlattenError> {
    let page = doc.get_dictionary(page_id)?.clone();
    let mut result = PageFlattening::default();

    let annots: Vec<Object> = match page.get(b"Annots").map(|o| resolve(doc, o)) {
        Ok(Object::Array(items)) => items.clone(),
        _ => return Ok(result),
    };

    let mut kept = Vec::new();
    let mut placements = Vec::new();

    for annot in &annots {
        let widget = match resolve(doc, annot) {
            Object::Dictionary(dict) => dict,
            _ => {
                kept.push(annot.clone());
                continue;
            }
        };

        if !is_widget(widget) {
            kept.push(annot.clone());
            continue;
        }

        let hidden = widget
            .get(b"F")
            .and_then(Object::as_i64)
            .map(|flags| flags & HIDDEN_FLAG != 0)
            .unwrap_or(false);
        if !hidden {
            let Some(xobject_id) = normal_appearance(doc, widget) else {
                result.unresolved += 1;
                kept.push(annot.clone());
                continue;
            };
            let matrix = placement_matrix(doc, widget, xobject_id)?;
            placements.push(Placement {
                name: format!("FlatW{}_{}", xobject_id.0, xobject_id.1),
                xobject_id,
                matrix,
            });
        }

        result.removed += 1;
        if let Object::Reference(id) = annot {
            result.removed_ids.push(*id);
        }
    }

    if result.removed == 0 {
        return Ok(result);
    }

    if !placements.is_empty() {
        for placement in &placements {
            let stream = doc.get_object_mut(placement.xobject_id)?.as_stream_mut()?;
            if !stream.dict.has(b"Type") {
                stream.dict.set("Type", "XObject");
            }
            if !stream.dict.has(b"Subtype") {
                stream.dict.set("Subtype", "Form");
            }
            if !stream.dict.has(b"Resources") {
                if let Some(resources) = default_resources {
                    stream.dict.set("Resources", Object::Dictionary(resources.clone()));
                }
            }
        }

        let mut resources = page_resources(doc, page_id);
        let mut xobjects = resources
            .get(b"XObject")
            .map(|o| resolve(doc, o))
            .and_then(Object::as_dict)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new());
        for placement in &placements {
            xobjects.set(placement.name.clone(), Object::Reference(placement.xobject_id));
        }
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut contents = existing_contents(doc, &page);
        let head_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let tail_id = doc.add_object(Stream::new(Dictionary::new(), placement_content(&placements)));
        contents.insert(0, Object::Reference(head_id));
        contents.push(Object::Reference(tail_id));

        let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Array(contents));
    }

    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    if kept.is_empty() {
        page_dict.remove(b"Annots");
    } else {
        page_dict.set("Annots", Object::Array(kept));
    }

    result.drawn = placements.len();
    Ok(result)
}

/// Point the AcroForm at the widgets still on their pages and ask the
/// renderer to build their appearances
fn keep_unresolved_fields(
    doc: &mut Document,
    catalog_id: ObjectId,
    removed: &BTreeSet<ObjectId>,
) -> Result<(), FlattenError> {
    let fields = form_dictionary(doc, catalog_id)
        .and_then(|form| form.get(b"Fields").ok())
        .and_then(|fields| resolve(doc, fields).as_array().ok())
        .cloned()
        .unwrap_or_default();
    let fields = remaining_fields(doc, fields, removed, 0);

    let form = form_dictionary_mut(doc, catalog_id)?;
    form.set("Fields", Object::Array(fields));
    form.set("NeedAppearances", Object::Boolean(true));
    Ok(())
}

/// Field tree entries minus flattened widgets; fields left without kids go too
fn remaining_fields(
    doc: &mut Document,
    fields: Vec<Object>,
    removed: &BTreeSet<ObjectId>,
    depth: usize,
) -> Vec<Object> {
    let mut kept = Vec::with_capacity(fields.len());
    for field in fields {
        if let Object::Reference(id) = field {
            if removed.contains(&id) {
                continue;
            }
            let kids = doc
                .get_dictionary(id)
                .ok()
                .and_then(|dict| dict.get(b"Kids").ok())
                .and_then(|kids| resolve(doc, kids).as_array().ok())
                .filter(|_| depth < MAX_TREE_DEPTH)
                .cloned();
            if let Some(kids) = kids {
                let remaining = remaining_fields(doc, kids, removed, depth + 1);
                if remaining.is_empty() {
                    continue;
                }
                if let Ok(dict) = doc.get_object_mut(id).and_then(Object::as_dict_mut) {
                    dict.set("Kids", Object::Array(remaining));
                }
            }
        }
        kept.push(field);
    }
    kept
}

fn form_dictionary(doc: &Document, catalog_id: ObjectId) -> Option<&Dictionary> {
    let form = doc.get_dictionary(catalog_id).ok()?.get(b"AcroForm").ok()?;
    resolve(doc, form).as_dict().ok()
}

fn form_dictionary_mut(
    doc: &mut Document,
    catalog_id: ObjectId,
) -> Result<&mut Dictionary, FlattenError> {
    let form_id = doc
        .get_dictionary(catalog_id)?
        .get(b"AcroForm")?
        .as_reference()
        .ok();
    let form = match form_id {
        Some(id) => doc.get_object_mut(id)?,
        None => doc
            .get_object_mut(catalog_id)?
            .as_dict_mut()?
            .get_mut(b"AcroForm")?,
    };
    Ok(form.as_dict_mut()?)
}

fn is_widget(annot: &Dictionary) -> bool {
    matches!(annot.get(b"Subtype").and_then(Object::as_name), Ok(b"Widget"))
}

/// The normal appearance stream, picking the active state for
/// checkboxes and radio buttons
fn normal_appearance(doc: &Document, widget: &Dictionary) -> Option<ObjectId> {
    let ap = resolve(doc, widget.get(b"AP").ok()?).as_dict().ok()?;
    let normal = ap.get(b"N").ok()?;

    let states = match normal {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => return Some(*id),
            Object::Dictionary(states) => states,
            _ => return None,
        },
        Object::Dictionary(states) => states,
        _ => return None,
    };

    let state = widget.get(b"AS").and_then(Object::as_name).ok()?;
    states.get(state).and_then(Object::as_reference).ok()
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Map the appearance BBox onto the widget Rect
///
/// `Do` applies the form's own /Matrix, so the BBox is transformed by it
/// first and the result's bounding box is what gets fitted to the Rect.
fn placement_matrix(
    doc: &Document,
    widget: &Dictionary,
    xobject_id: ObjectId,
) -> Result<[f32; 6], FlattenError> {
    let rect = widget
        .get(b"Rect")
        .ok()
        .and_then(|o| rectangle(doc, o))
        .ok_or_else(|| FlattenError::Malformed("widget without a usable Rect".to_string()))?;

    let appearance = &doc.get_object(xobject_id)?.as_stream()?.dict;
    let bbox = appearance
        .get(b"BBox")
        .ok()
        .and_then(|o| rectangle(doc, o))
        .unwrap_or([0.0, 0.0, rect[2] - rect[0], rect[3] - rect[1]]);
    let form_matrix = appearance
        .get(b"Matrix")
        .ok()
        .and_then(|o| matrix(doc, o))
        .unwrap_or(IDENTITY);
    let bbox = transformed_bounds(bbox, form_matrix);

    let bbox_width = bbox[2] - bbox[0];
    let bbox_height = bbox[3] - bbox[1];
    let sx = if bbox_width > 0.0 { (rect[2] - rect[0]) / bbox_width } else { 1.0 };
    let sy = if bbox_height > 0.0 { (rect[3] - rect[1]) / bbox_height } else { 1.0 };

    Ok([sx, 0.0, 0.0, sy, rect[0] - bbox[0] * sx, rect[1] - bbox[1] * sy])
}

fn matrix(doc: &Document, object: &Object) -> Option<[f32; 6]> {
    let values: Vec<f32> = resolve(doc, object)
        .as_array()
        .ok()?
        .iter()
        .filter_map(number)
        .collect();
    values.try_into().ok()
}

/// Bounding box of `rect` after mapping its corners through `m`
fn transformed_bounds(rect: [f32; 4], m: [f32; 6]) -> [f32; 4] {
    let corners = [
        (rect[0], rect[1]),
        (rect[2], rect[1]),
        (rect[0], rect[3]),
        (rect[2], rect[3]),
    ];
    let mut bounds = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
    for (x, y) in corners {
        let tx = m[0] * x + m[2] * y + m[4];
        let ty = m[1] * x + m[3] * y + m[5];
        bounds = [
            bounds[0].min(tx),
            bounds[1].min(ty),
            bounds[2].max(tx),
            bounds[3].max(ty),
        ];
    }
    bounds
}

/// Normalized `[llx, lly, urx, ury]`
fn rectangle(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let values: Vec<f32> = resolve(doc, object)
        .as_array()
        .ok()?
        .iter()
        .filter_map(number)
        .collect();
    if values.len() != 4 {
        return None;
    }
    Some([
        values[0].min(values[2]),
        values[1].min(values[3]),
        values[0].max(values[2]),
        values[1].max(values[3]),
    ])
}

/// Resolved copy of the page's own or inherited resources
fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let Ok(node) = doc.get_dictionary(node_id) else {
            break;
        };
        if let Ok(resources) = node.get(b"Resources") {
            return resolve(doc, resources)
                .as_dict()
                .cloned()
                .unwrap_or_else(|_| Dictionary::new());
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node_id = parent,
            Err(_) => break,
        }
    }
    Dictionary::new()
}

fn existing_contents(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

fn placement_content(placements: &[Placement]) -> Vec<u8> {
    let mut content = String::from("\nQ\n");
    for placement in placements {
        let m = placement.matrix;
        content.push_str(&format!(
            "q {:.4} {:.4} {:.4} {:.4} {:.4} {:.4} cm /{} Do Q\n",
            m[0], m[1], m[2], m[3], m[4], m[5], placement.name
        ));
    }
    content.into_bytes()
}
