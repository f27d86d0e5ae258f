//! PDF outline entries for report sections, injected after rendering with `lopdf`.

use std::collections::BTreeMap;
use std::io;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::model::Section;

#[derive(Debug, thiserror::Error)]
pub enum BookmarkError {
    #[error("Failed to parse rendered PDF: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("Failed to serialise bookmarked PDF: {0}")]
    Io(#[from] io::Error),

    #[error("PDF catalog entry is missing")]
    MissingCatalog,

    #[error("PDF catalog entry is not a dictionary")]
    InvalidCatalog,

    #[error("Section '{title}' refers to missing page {page_number}")]
    MissingPage { title: String, page_number: usize },
}

struct OutlineEntry {
    object_id: ObjectId,
    page_ref: ObjectId,
    title: String,
    name: Option<String>,
}

/// Adds a flat `/Outlines` tree with one `/Dest [page /Fit]` entry per placed section.
///
/// `section_pages` holds the 1-based start page of each section; sections without a page are
/// skipped. The input is returned unchanged when no section has a page.
pub fn apply_section_bookmarks(
    pdf_bytes: &[u8],
    sections: &[Section],
    section_pages: &[Option<usize>],
) -> Result<Vec<u8>, BookmarkError> {
    let mut document = Document::load_mem(pdf_bytes)?;
    let pages = document.get_pages();

    let entries = collect_entries(&mut document, sections, section_pages, &pages)?;
    if entries.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let outlines_id = document.new_object_id();
    for (index, entry) in entries.iter().enumerate() {
        let previous = index.checked_sub(1).map(|i| entries[i].object_id);
        let next = entries.get(index + 1).map(|e| e.object_id);
        document.objects.insert(
            entry.object_id,
            Object::Dictionary(outline_item(entry, outlines_id, previous, next)),
        );
    }

    let mut outlines = Dictionary::new();
    outlines.set("Type", Object::Name(b"Outlines".to_vec()));
    outlines.set("Count", Object::Integer(entries.len() as i64));
    if let (Some(first), Some(last)) = (entries.first(), entries.last()) {
        outlines.set("First", Object::Reference(first.object_id));
        outlines.set("Last", Object::Reference(last.object_id));
    }
    document
        .objects
        .insert(outlines_id, Object::Dictionary(outlines));

    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| BookmarkError::MissingCatalog)?;
    let catalog = document
        .objects
        .get_mut(&catalog_id)
        .ok_or(BookmarkError::MissingCatalog)?
        .as_dict_mut()
        .map_err(|_| BookmarkError::InvalidCatalog)?;
    catalog.set("Outlines", Object::Reference(outlines_id));
    catalog.set("PageMode", Object::Name(b"UseOutlines".to_vec()));

    let mut buffer = Vec::new();
    document.save_to(&mut buffer)?;
    Ok(buffer)
}

fn collect_entries(
    document: &mut Document,
    sections: &[Section],
    section_pages: &[Option<usize>],
    pages: &BTreeMap<u32, ObjectId>,
) -> Result<Vec<OutlineEntry>, BookmarkError> {
    let mut entries = Vec::new();
    for (section, page) in sections.iter().zip(section_pages) {
        let Some(page_number) = *page else {
            continue;
        };
        let page_ref = u32::try_from(page_number)
            .ok()
            .and_then(|number| pages.get(&number).copied())
            .ok_or_else(|| BookmarkError::MissingPage {
                title: section.title().to_string(),
                page_number,
            })?;

        entries.push(OutlineEntry {
            object_id: document.new_object_id(),
            page_ref,
            title: section.title().to_string(),
            name: section.identifier().map(str::to_string),
        });
    }
    Ok(entries)
}

fn outline_item(
    entry: &OutlineEntry,
    parent: ObjectId,
    previous: Option<ObjectId>,
    next: Option<ObjectId>,
) -> Dictionary {
    let mut item = Dictionary::new();
    item.set("Title", Object::string_literal(entry.title.as_str()));
    item.set(
        "Dest",
        Object::Array(vec![
            Object::Reference(entry.page_ref),
            Object::Name(b"Fit".to_vec()),
        ]),
    );
    item.set("Parent", Object::Reference(parent));
    if let Some(name) = &entry.name {
        item.set("NM", Object::string_literal(name.as_str()));
    }
    if let Some(previous) = previous {
        item.set("Prev", Object::Reference(previous));
    }
    if let Some(next) = next {
        item.set("Next", Object::Reference(next));
    }
    item
}
