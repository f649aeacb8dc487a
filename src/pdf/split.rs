//! Single-page extraction with lopdf
//!
//! A page is cut out by re-rooting the page tree at that page alone and
//! pruning everything no longer reachable. Inheritable attributes are copied
//! onto the page first so its size and resources survive the re-rooting.

use std::collections::BTreeSet;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::backend::{BackendError, BackendResult};

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// Catalog entries that point at pages which no longer exist after a split
const DETACHED_CATALOG_KEYS: [&[u8]; 7] = [
    b"AcroForm",
    b"Outlines",
    b"Dests",
    b"OpenAction",
    b"PageLabels",
    b"StructTreeRoot",
    b"Names",
];

/// Field attributes a widget may inherit from its parent fields
const INHERITABLE_FIELD_KEYS: [&[u8]; 6] = [b"FT", b"V", b"DV", b"DA", b"Ff", b"Q"];

/// Bound on page tree depth, guards against cyclic `Parent` chains
const MAX_TREE_DEPTH: usize = 64;

pub fn load(bytes: &[u8]) -> BackendResult<Document> {
    Ok(Document::load_mem(bytes)?)
}

pub fn page_count(doc: &Document) -> u32 {
    doc.get_pages().len() as u32
}

/// Count the pages of an encoded PDF
pub fn count_pages(bytes: &[u8]) -> BackendResult<u32> {
    Ok(page_count(&load(bytes)?))
}

/// Extract one 1-based page of `source` into a new single-page PDF
pub fn extract_page(source: &Document, page: u32) -> BackendResult<Vec<u8>> {
    let pages = source.get_pages();
    let total = pages.len() as u32;
    let page_id = *pages
        .get(&page)
        .ok_or(BackendError::PageOutOfRange { page, total })?;

    let mut doc = source.clone();
    let inherited = inherited_attributes(&doc, page_id)?;
    let catalog_id = catalog_id(&doc)?;
    let pages_root_id = doc
        .get_dictionary(catalog_id)?
        .get(b"Pages")
        .and_then(Object::as_reference)?;

    {
        let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
        for (key, value) in inherited {
            page_dict.set(key, value);
        }
        page_dict.set("Parent", Object::Reference(pages_root_id));
        // Article beads chain to other pages
        page_dict.remove(b"B");
    }

    let other_pages: BTreeSet<ObjectId> = pages
        .values()
        .copied()
        .filter(|&id| id != page_id)
        .collect();
    detach_annotations(&mut doc, page_id, &other_pages)?;

    {
        let root = doc.get_object_mut(pages_root_id)?.as_dict_mut()?;
        root.set("Kids", vec![Object::Reference(page_id)]);
        root.set("Count", Object::Integer(1));
    }

    {
        let catalog = doc.get_object_mut(catalog_id)?.as_dict_mut()?;
        for key in DETACHED_CATALOG_KEYS {
            catalog.remove(key);
        }
    }

    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

/// Cut the links from a page's annotations to other pages
///
/// Destinations and GoTo actions aimed at another page are dropped, `/P`
/// is pointed back at the page, and widgets are detached from their field
/// tree after taking over its inheritable attributes. Otherwise pruning
/// would keep every page reachable through them.
fn detach_annotations(
    doc: &mut Document,
    page_id: ObjectId,
    other_pages: &BTreeSet<ObjectId>,
) -> BackendResult<()> {
    let annots = match doc.get_dictionary(page_id)?.get(b"Annots") {
        Ok(annots) => match resolve(doc, annots) {
            Object::Array(items) => items.clone(),
            _ => return Ok(()),
        },
        Err(_) => return Ok(()),
    };

    let mut detached = Vec::with_capacity(annots.len());
    for annot in annots {
        match annot {
            Object::Reference(id) => {
                let dict = match doc.get_object(id) {
                    Ok(Object::Dictionary(dict)) => detached_annotation(doc, dict, page_id, other_pages),
                    _ => continue,
                };
                doc.objects.insert(id, Object::Dictionary(dict));
                detached.push(Object::Reference(id));
            }
            Object::Dictionary(dict) => {
                detached.push(Object::Dictionary(detached_annotation(doc, &dict, page_id, other_pages)));
            }
            _ => {}
        }
    }

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Annots", Object::Array(detached));
    Ok(())
}

fn detached_annotation(
    doc: &Document,
    annot: &Dictionary,
    page_id: ObjectId,
    other_pages: &BTreeSet<ObjectId>,
) -> Dictionary {
    let mut detached = annot.clone();

    if annot.has(b"P") {
        detached.set("P", Object::Reference(page_id));
    }

    let dest_elsewhere = annot
        .get(b"Dest")
        .map(|dest| leaves_page(doc, dest, other_pages))
        .unwrap_or(false);
    if dest_elsewhere {
        detached.remove(b"Dest");
    }

    let action_elsewhere = annot
        .get(b"A")
        .and_then(|action| resolve(doc, action).as_dict())
        .map(|action| {
            matches!(action.get(b"S").and_then(Object::as_name), Ok(b"GoTo"))
                && action
                    .get(b"D")
                    .map(|dest| leaves_page(doc, dest, other_pages))
                    .unwrap_or(false)
        })
        .unwrap_or(false);
    if action_elsewhere {
        detached.remove(b"A");
    }

    if annot.has(b"Parent") {
        for (key, value) in inherited_field_attributes(doc, annot) {
            detached.set(key, value);
        }
        detached.remove(b"Parent");
    }
    detached.remove(b"Kids");

    detached
}

/// Whether a destination targets another page, or a named destination
/// that no longer resolves once the catalog's name trees are gone
fn leaves_page(doc: &Document, dest: &Object, other_pages: &BTreeSet<ObjectId>) -> bool {
    match resolve(doc, dest) {
        Object::Array(items) => {
            matches!(items.first(), Some(Object::Reference(id)) if other_pages.contains(id))
        }
        Object::Name(_) | Object::String(..) => true,
        _ => false,
    }
}

/// Field attributes a widget lacks itself but inherits from its parent fields
fn inherited_field_attributes(doc: &Document, widget: &Dictionary) -> Vec<(Vec<u8>, Object)> {
    let mut missing: Vec<&[u8]> = INHERITABLE_FIELD_KEYS
        .iter()
        .copied()
        .filter(|key| !widget.has(key))
        .collect();

    let mut found = Vec::new();
    let mut parent = parent_of(widget);
    for _ in 0..MAX_TREE_DEPTH {
        let Some(node) = parent.and_then(|id| doc.get_dictionary(id).ok()) else {
            break;
        };
        if missing.is_empty() {
            break;
        }
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = parent_of(node);
    }

    found
}

/// Extract several pages, parsing the source once
pub fn extract_pages(bytes: &[u8], pages: &[u32]) -> BackendResult<Vec<Vec<u8>>> {
    let source = load(bytes)?;
    pages.iter().map(|&page| extract_page(&source, page)).collect()
}

pub(crate) fn catalog_id(doc: &Document) -> BackendResult<ObjectId> {
    Ok(doc.trailer.get(b"Root").and_then(Object::as_reference)?)
}

/// Attributes the page lacks itself but inherits from the page tree
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> BackendResult<Vec<(Vec<u8>, Object)>> {
    let page = doc.get_dictionary(page_id)?;
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();

    let mut found = Vec::new();
    let mut parent = parent_of(page);
    let mut depth = 0;

    while let Some(node_id) = parent {
        if missing.is_empty() || depth >= MAX_TREE_DEPTH {
            break;
        }
        let node = doc.get_dictionary(node_id)?;
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        parent = parent_of(node);
        depth += 1;
    }

    Ok(found)
}

fn parent_of(node: &Dictionary) -> Option<ObjectId> {
    node.get(b"Parent").and_then(Object::as_reference).ok()
}

/// Width and height of a page's MediaBox in points
pub fn media_box_size(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(media_box) = node.get(b"MediaBox") {
            let values = resolve(doc, media_box).as_array().ok()?;
            let nums: Vec<f32> = values.iter().filter_map(number).collect();
            if nums.len() != 4 {
                return None;
            }
            return Some(((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs()));
        }
        node_id = parent_of(node)?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}
