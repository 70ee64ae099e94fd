use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeSet;

use crate::error::Result;

/// Page tree depth beyond which inherited attributes are not searched
const MAX_TREE_DEPTH: usize = 32;

/// A4 in points, used when a template page declares no MediaBox
const FALLBACK_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 595.28, 841.89];

fn resolved_dict(doc: &Document, obj: &Object) -> Option<Dictionary> {
    match obj {
        Object::Reference(id) => doc.get_dictionary(*id).ok().cloned(),
        Object::Dictionary(dict) => Some(dict.clone()),
        _ => None,
    }
}

/// Look up a page attribute, following the Parent chain for inheritable keys
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Page MediaBox as [x0, y0, x1, y1]
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let values = inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| match obj {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|obj| obj.as_array().ok())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_float().ok().map(f64::from))
                .collect::<Vec<_>>()
        });

    match values.as_deref() {
        Some([x0, y0, x1, y1]) => [*x0, *y0, *x1, *y1],
        _ => {
            log::warn!("Template page has no usable MediaBox, assuming A4");
            FALLBACK_MEDIA_BOX
        }
    }
}

/// Names already defined in one resource category (`Font`, `XObject`) of a page
pub fn resource_names(doc: &Document, page_id: ObjectId, category: &[u8]) -> BTreeSet<Vec<u8>> {
    inherited(doc, page_id, b"Resources")
        .and_then(|obj| resolved_dict(doc, obj))
        .and_then(|resources| {
            resources
                .get(category)
                .ok()
                .and_then(|obj| resolved_dict(doc, obj))
        })
        .map(|dict| dict.iter().map(|(name, _)| name.clone()).collect())
        .unwrap_or_default()
}

/// First `{prefix}{n}` not in `taken`. The returned name is added to `taken`.
pub fn claim_resource_name(prefix: &str, taken: &mut BTreeSet<Vec<u8>>) -> String {
    (0usize..)
        .map(|index| format!("{}{}", prefix, index))
        .find(|name| taken.insert(name.as_bytes().to_vec()))
        .unwrap_or_else(|| prefix.to_string())
}

fn merge_category(doc: &Document, resources: &mut Dictionary, key: &[u8], additions: &Dictionary) {
    if additions.is_empty() {
        return;
    }
    let mut merged = resources
        .get(key)
        .ok()
        .and_then(|obj| resolved_dict(doc, obj))
        .unwrap_or_else(Dictionary::new);
    for (name, value) in additions.iter() {
        if merged.has(name) {
            log::warn!(
                "Resource /{} already defined on the template page, keeping it",
                String::from_utf8_lossy(name)
            );
            continue;
        }
        merged.set(name.clone(), value.clone());
    }
    resources.set(key.to_vec(), Object::Dictionary(merged));
}

/// Merge overlay fonts and XObjects into a page's resources dictionary
///
/// Resources may live in a referenced object, inline on the page, or be
/// inherited from the page tree; inherited resources are copied onto the
/// page before merging so sibling pages are not affected.
pub fn update_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    fonts: &Dictionary,
    xobjects: &Dictionary,
) -> Result<()> {
    let page = doc.get_dictionary(page_id)?;
    let (resources_id, mut resources) = match page.get(b"Resources") {
        Ok(Object::Reference(id)) => (Some(*id), doc.get_dictionary(*id)?.clone()),
        Ok(Object::Dictionary(dict)) => (None, dict.clone()),
        _ => (
            None,
            inherited(doc, page_id, b"Resources")
                .and_then(|obj| resolved_dict(doc, obj))
                .unwrap_or_else(Dictionary::new),
        ),
    };

    merge_category(doc, &mut resources, b"Font", fonts);
    merge_category(doc, &mut resources, b"XObject", xobjects);

    match resources_id {
        Some(id) => *doc.get_dictionary_mut(id)? = resources,
        None => doc.get_dictionary_mut(page_id)?.set("Resources", resources),
    }
    Ok(())
}

/// Append overlay operations after the page's existing content
///
/// The existing streams are bracketed by `q`/`Q` so any graphics state they
/// leave behind does not leak into the overlay. They are not rewritten.
pub fn append_overlay_content(doc: &mut Document, page_id: ObjectId, overlay: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let mut overlay_bytes = b"\nQ\n".to_vec();
    overlay_bytes.extend(overlay);
    let overlay_id = doc.add_object(Stream::new(Dictionary::new(), overlay_bytes));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(open_id));
    contents.extend(existing);
    contents.push(Object::Reference(overlay_id));

    doc.get_dictionary_mut(page_id)?.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    /// Pages node with one page; the caller decides where resources live
    fn doc_with_page(page_extra: Dictionary, pages_extra: Dictionary) -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        };
        for (k, v) in page_extra.iter() {
            page.set(k.clone(), v.clone());
        }
        let page_id = doc.add_object(page);
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        };
        for (k, v) in pages_extra.iter() {
            pages.set(k.clone(), v.clone());
        }
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        (doc, page_id)
    }

    fn font_additions() -> Dictionary {
        dictionary! { "MemoF0" => Object::Reference((99, 0)) }
    }

    #[test]
    fn test_media_box_inherited_from_pages() {
        let (doc, page_id) = doc_with_page(
            Dictionary::new(),
            dictionary! { "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()] },
        );
        assert_eq!(page_media_box(&doc, page_id), [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_missing_media_box_falls_back_to_a4() {
        let (doc, page_id) = doc_with_page(Dictionary::new(), Dictionary::new());
        assert_eq!(page_media_box(&doc, page_id), FALLBACK_MEDIA_BOX);
    }

    #[test]
    fn test_inline_resources_keep_existing_fonts() {
        let (mut doc, page_id) = doc_with_page(
            dictionary! {
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => Object::Reference((50, 0)) } },
            },
            Dictionary::new(),
        );

        update_page_resources(&mut doc, page_id, &font_additions(), &Dictionary::new()).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let fonts = page
            .get(b"Resources").unwrap().as_dict().unwrap()
            .get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"MemoF0"));
    }

    #[test]
    fn test_referenced_resources_are_updated_in_place() {
        let mut doc = Document::with_version("1.5");
        let resources_id = doc.add_object(Dictionary::new());
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Resources" => resources_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1 }),
        );

        update_page_resources(&mut doc, page_id, &font_additions(), &Dictionary::new()).unwrap();

        let resources = doc.get_dictionary(resources_id).unwrap();
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().has(b"MemoF0"));
    }

    #[test]
    fn test_inherited_resources_copied_onto_page() {
        let (mut doc, page_id) = doc_with_page(
            Dictionary::new(),
            dictionary! {
                "Resources" => dictionary! { "Font" => dictionary! { "F1" => Object::Reference((50, 0)) } },
            },
        );

        update_page_resources(&mut doc, page_id, &font_additions(), &Dictionary::new()).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let fonts = page
            .get(b"Resources").unwrap().as_dict().unwrap()
            .get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(b"MemoF0"));
    }

    #[test]
    fn test_resource_names_follow_references_and_inheritance() {
        let mut doc = Document::with_version("1.5");
        let fonts_id = doc.add_object(dictionary! {
            "F1" => Object::Reference((50, 0)),
            "MemoF0" => Object::Reference((51, 0)),
        });
        let resources_id = doc.add_object(dictionary! { "Font" => fonts_id });
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! { "Type" => "Page", "Parent" => pages_id });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => resources_id,
            }),
        );

        let names = resource_names(&doc, page_id, b"Font");
        assert_eq!(names, BTreeSet::from([b"F1".to_vec(), b"MemoF0".to_vec()]));
        assert!(resource_names(&doc, page_id, b"XObject").is_empty());
    }

    #[test]
    fn test_claim_resource_name_skips_taken() {
        let mut taken = BTreeSet::from([b"MemoF0".to_vec(), b"MemoF2".to_vec()]);
        assert_eq!(claim_resource_name("MemoF", &mut taken), "MemoF1");
        assert_eq!(claim_resource_name("MemoF", &mut taken), "MemoF3");
        assert_eq!(claim_resource_name("MemoIm", &mut taken), "MemoIm0");
    }

    #[test]
    fn test_merge_never_replaces_existing_entry() {
        let (mut doc, page_id) = doc_with_page(
            dictionary! {
                "Resources" => dictionary! { "Font" => dictionary! { "MemoF0" => Object::Reference((50, 0)) } },
            },
            Dictionary::new(),
        );

        update_page_resources(&mut doc, page_id, &font_additions(), &Dictionary::new()).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let fonts = page
            .get(b"Resources").unwrap().as_dict().unwrap()
            .get(b"Font").unwrap().as_dict().unwrap();
        assert_eq!(fonts.get(b"MemoF0").unwrap().as_reference().unwrap(), (50, 0));
    }

    #[test]
    fn test_overlay_content_brackets_existing_stream() {
        let mut doc = Document::with_version("1.5");
        let original_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => original_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! { "Type" => "Pages", "Kids" => vec![page_id.into()], "Count" => 1 }),
        );

        append_overlay_content(&mut doc, page_id, b"0 0 1 1 re f\n".to_vec()).unwrap();

        let contents = doc
            .get_dictionary(page_id).unwrap()
            .get(b"Contents").unwrap().as_array().unwrap().clone();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].as_reference().unwrap(), original_id);

        let content = doc.get_page_content(page_id).unwrap();
        assert_eq!(content, b"q\nBT ET\nQ\n0 0 1 1 re f\n".to_vec());
    }
}
