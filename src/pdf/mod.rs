//! Overlay strategy: cover default content on a template PDF and redraw it.

mod content;
mod fit;
mod fonts;
mod resources;

use lopdf::{Dictionary, Document, Object};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use crate::config::{read_required, FieldSpec, OverlayConfig, OverlaySettings};
use crate::error::{FillError, Result};
use crate::fields::{AssetBundle, Field, FieldMap};
use crate::money::normalize_amount;

pub use content::Rect;
pub use fit::fit_font_size;
pub use fonts::{FontProgram, FontSet, StandardFont, TrueTypeFont};

use content::{add_image_xobject, ContentBuilder};
use resources::{
    append_overlay_content, claim_resource_name, page_media_box, resource_names, update_page_resources,
};

/// Share of the font size taken by capitals; used to centre text vertically
const CAP_HEIGHT_RATIO: f64 = 0.7;

const FONT_RESOURCE_PREFIX: &str = "MemoF";
const IMAGE_RESOURCE_PREFIX: &str = "MemoIm";

/// Fills a PDF template by painting over configured boxes
#[derive(Debug, Clone)]
pub struct OverlayFiller {
    root: PathBuf,
    config: OverlayConfig,
}

impl OverlayFiller {
    pub fn new(root: impl Into<PathBuf>, config: OverlayConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    /// Read the template and fonts, fill them, and return the PDF bytes
    pub fn fill(&self, fields: &FieldMap, assets: &AssetBundle) -> Result<Vec<u8>> {
        let fonts = FontSet::load(&self.root, &self.config.fonts)?;

        let template_path = self.root.join(&self.config.template);
        let template_bytes = read_required(&template_path)?;
        let base_doc = Document::load_mem(&template_bytes)?;
        log::info!("Loaded template {:?}", template_path);

        let mut output_doc = fill_document(base_doc, fields, assets, &self.config, &fonts)?;

        let mut output = Vec::new();
        output_doc
            .save_to(&mut output)
            .map_err(|e| FillError::Write(e.to_string()))?;
        log::info!("Generated overlay PDF ({} bytes)", output.len());
        Ok(output)
    }
}

/// Page geometry for converting top-left config coordinates into PDF space
#[derive(Debug, Clone, Copy)]
struct PageFrame {
    left: f64,
    top: f64,
}

impl PageFrame {
    fn rect(&self, x: f64, y: f64, w: f64, h: f64) -> Rect {
        Rect {
            x: self.left + x,
            y: self.top - y - h,
            w,
            h,
        }
    }
}

/// A text field ready to be drawn
struct TextPlacement<'a> {
    field: Field,
    font_key: &'a str,
    program: &'a FontProgram,
    text: String,
    font_size: f64,
    x: f64,
    baseline: f64,
    cover: Rect,
}

/// Text actually drawn for a field value
pub fn overlay_text(field: Field, value: &str) -> String {
    let value = value.trim();
    match field {
        Field::ReferenceNumber => with_label("Our Reference Number: ", value),
        Field::DateText => with_label("Date: ", value),
        Field::LoanAmount => normalize_amount(value),
        _ => value.to_string(),
    }
}

/// Prefix `label` unless the value already starts with it, ignoring case
fn with_label(label: &str, value: &str) -> String {
    let label_key = label.trim_end().to_lowercase();
    if value.to_lowercase().starts_with(&label_key) {
        value.to_string()
    } else {
        format!("{}{}", label, value)
    }
}

fn place_text<'a>(
    field: Field,
    value: &str,
    spec: &FieldSpec,
    settings: &OverlaySettings,
    fonts: &'a FontSet,
    frame: PageFrame,
) -> Result<TextPlacement<'a>> {
    let font_name = spec.font.as_deref().unwrap_or(&settings.font);
    let (font_key, program) = fonts.get(font_name).ok_or_else(|| FillError::InvalidPosition {
        field,
        reason: format!("unknown font '{}'", font_name),
    })?;

    let text = overlay_text(field, value);
    let (w, h) = (spec.w.as_points(), spec.h.as_points());
    let base_size = spec.font_size.unwrap_or(settings.font_size).as_points();
    let font_size = fit_font_size(
        |size| program.text_width(&text, size),
        base_size,
        w,
        settings.min_font_size.as_points(),
        settings.shrink_step.as_points(),
    );

    let bbox = frame.rect(spec.x.as_points(), spec.y.as_points(), w, h);
    let padding = spec.padding.unwrap_or(settings.padding).as_points();
    let baseline = bbox.y + (h - font_size * CAP_HEIGHT_RATIO) / 2.0;

    log::debug!(
        "Placing '{}' with {} at {:.1}pt (base {:.1}pt)",
        field,
        font_key,
        font_size,
        base_size
    );

    Ok(TextPlacement {
        field,
        font_key,
        program,
        text,
        font_size,
        x: bbox.x,
        baseline,
        cover: bbox.expand(padding),
    })
}

/// Fill the first page of `base_doc` with the supplied fields and assets.
///
/// Covers are painted for every supplied field before any replacement is
/// drawn, so neighbouring boxes cannot erase each other's text. When nothing
/// is supplied the document is returned untouched.
pub fn fill_document(
    mut doc: Document,
    fields: &FieldMap,
    assets: &AssetBundle,
    config: &OverlayConfig,
    fonts: &FontSet,
) -> Result<Document> {
    let page_id = *doc
        .get_pages()
        .values()
        .next()
        .ok_or(FillError::EmptyTemplate)?;
    let [left, _, _, top] = page_media_box(&doc, page_id);
    let frame = PageFrame { left, top };
    let settings = &config.settings;

    let mut placements = Vec::new();
    for (field, value) in fields.iter() {
        let Some(spec) = config.field_spec(field)? else {
            log::debug!("No position for '{}', leaving template content", field);
            continue;
        };
        placements.push(place_text(field, value, &spec, settings, fonts, frame)?);
    }

    // Overlay resources take names the template page does not already use
    let mut taken_fonts = resource_names(&doc, page_id, b"Font");
    let mut taken_xobjects = resource_names(&doc, page_id, b"XObject");

    let mut builder = ContentBuilder::new();
    let mut images = Vec::new();
    for (slot, spec) in &config.images {
        let Some(asset) = assets.get(*slot) else {
            continue;
        };
        let (image_id, width, height) = add_image_xobject(&mut doc, *slot, &asset.bytes)?;
        let frame_rect = frame.rect(
            spec.x.as_points(),
            spec.y.as_points(),
            spec.w.as_points(),
            spec.h.as_points(),
        );
        let padding = spec.padding.unwrap_or(settings.padding).as_points();
        builder.add_cover(frame_rect.expand(padding), settings.cover_color);
        images.push((
            claim_resource_name(IMAGE_RESOURCE_PREFIX, &mut taken_xobjects),
            image_id,
            frame_rect.fit_centered(f64::from(width), f64::from(height)),
        ));
        log::debug!("Placing uploaded '{}' ({}x{})", slot, width, height);
    }

    if placements.is_empty() && builder.is_empty() {
        log::info!("No supplied field has a position; template left unchanged");
        return Ok(doc);
    }

    // Embed each font once, with the characters drawn in it
    let mut used: BTreeMap<&str, (&FontProgram, BTreeSet<char>)> = BTreeMap::new();
    for placement in &placements {
        used.entry(placement.font_key)
            .or_insert_with(|| (placement.program, BTreeSet::new()))
            .1
            .extend(placement.text.chars());
    }
    let mut font_resources = Dictionary::new();
    let mut font_names: BTreeMap<&str, String> = BTreeMap::new();
    for (font_key, (program, chars)) in &used {
        let font_id = program.embed(&mut doc, chars)?;
        let name = claim_resource_name(FONT_RESOURCE_PREFIX, &mut taken_fonts);
        font_resources.set(name.clone(), Object::Reference(font_id));
        font_names.insert(*font_key, name);
    }

    for placement in &placements {
        builder.add_cover(placement.cover, settings.cover_color);
    }
    for (name, image_id, rect) in &images {
        builder.add_image(name, *image_id, *rect);
    }
    for placement in &placements {
        let resource = &font_names[placement.font_key];
        builder.add_text(
            resource,
            &placement.program.encode_text(&placement.text),
            placement.font_size,
            placement.x,
            placement.baseline,
            settings.text_color,
        );
        log::debug!("Drew '{}' as {:?}", placement.field, placement.text);
    }

    update_page_resources(&mut doc, page_id, &font_resources, &builder.xobjects)?;
    append_overlay_content(&mut doc, page_id, builder.build_content_bytes())?;

    Ok(doc)
}
