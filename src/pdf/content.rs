//! PDF content stream generation for overlay fields.
//!
//! This module provides:
//! - Opaque cover rectangles over template default content
//! - Text drawing with an already-encoded string operand
//! - Image XObjects built from uploaded assets
//! - String escaping and stream compression

use image::GenericImageView;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

use crate::config::Color;
use crate::error::{FillError, Result};
use crate::fields::AssetSlot;

/// Rectangle in PDF user space (bottom-left origin)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    /// Grow the rectangle by `padding` on every side
    pub fn expand(&self, padding: f64) -> Rect {
        Rect {
            x: self.x - padding,
            y: self.y - padding,
            w: self.w + 2.0 * padding,
            h: self.h + 2.0 * padding,
        }
    }

    /// Largest rectangle of the given aspect centred inside this one
    pub fn fit_centered(&self, width: f64, height: f64) -> Rect {
        if width <= 0.0 || height <= 0.0 {
            return *self;
        }
        let scale = (self.w / width).min(self.h / height);
        let (w, h) = (width * scale, height * scale);
        Rect {
            x: self.x + (self.w - w) / 2.0,
            y: self.y + (self.h - h) / 2.0,
            w,
            h,
        }
    }
}

/// Builder for the overlay content stream and the XObjects it draws
pub struct ContentBuilder {
    content_parts: Vec<String>,
    pub xobjects: Dictionary,
}

impl ContentBuilder {
    pub fn new() -> Self {
        Self {
            content_parts: Vec::new(),
            xobjects: Dictionary::new(),
        }
    }

    /// Paint an opaque rectangle
    pub fn add_cover(&mut self, rect: Rect, color: Color) {
        self.content_parts.push(format!(
            "q {} rg {} {} {} {} re f Q\n",
            color_operands(color),
            num(rect.x),
            num(rect.y),
            num(rect.w),
            num(rect.h)
        ));
    }

    /// Draw an encoded string operand with its baseline starting at (x, y)
    pub fn add_text(
        &mut self,
        font_resource: &str,
        operand: &str,
        font_size: f64,
        x: f64,
        y: f64,
        color: Color,
    ) {
        self.content_parts.push(format!(
            "q BT {} rg 0 Tr /{} {} Tf {} {} Td {} Tj ET Q\n",
            color_operands(color),
            font_resource,
            num(font_size),
            num(x),
            num(y),
            operand
        ));
    }

    /// Draw an image XObject stretched over `rect`
    pub fn add_image(&mut self, name: &str, image_id: ObjectId, rect: Rect) {
        self.xobjects.set(name, Object::Reference(image_id));
        self.content_parts.push(format!(
            "q {} 0 0 {} {} {} cm /{} Do Q\n",
            num(rect.w),
            num(rect.h),
            num(rect.x),
            num(rect.y),
            name
        ));
    }

    pub fn is_empty(&self) -> bool {
        self.content_parts.is_empty()
    }

    /// Build the final content bytes
    pub fn build_content_bytes(&self) -> Vec<u8> {
        self.content_parts.concat().into_bytes()
    }
}

impl Default for ContentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn color_operands(color: Color) -> String {
    format!("{} {} {}", num(color.r.into()), num(color.g.into()), num(color.b.into()))
}

/// Format a number for a content stream: at most three decimals, no trailing zeros
pub fn num(value: f64) -> String {
    let text = format!("{:.3}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "" | "-0" => "0".to_string(),
        _ => text.to_string(),
    }
}

/// Escape bytes for a PDF literal string. Bytes outside printable ASCII
/// are written as octal escapes.
pub fn escape_pdf_string(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'(' => result.push_str(r"\("),
            b')' => result.push_str(r"\)"),
            b'\\' => result.push_str(r"\\"),
            b'\n' => result.push_str(r"\n"),
            b'\r' => result.push_str(r"\r"),
            b'\t' => result.push_str(r"\t"),
            0x20..=0x7E => result.push(b as char),
            _ => result.push_str(&format!("\\{:03o}", b)),
        }
    }
    result
}

/// Compress data using zlib/flate2
pub fn compress_data(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn flate_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    let compressed = compress_data(data).map_err(|source| FillError::Io {
        path: "<image stream>".into(),
        source,
    })?;
    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, compressed))
}

/// Decode an uploaded image into an RGB image XObject, with a soft mask
/// when the source carries alpha. Returns the object and pixel size.
pub fn add_image_xobject(
    doc: &mut Document,
    slot: AssetSlot,
    bytes: &[u8],
) -> Result<(ObjectId, u32, u32)> {
    let img = image::load_from_memory(bytes).map_err(|source| FillError::Image { slot, source })?;
    let (width, height) = img.dimensions();

    let mut img_dict = Dictionary::new();
    img_dict.set("Type", "XObject");
    img_dict.set("Subtype", "Image");
    img_dict.set("Width", width as i64);
    img_dict.set("Height", height as i64);
    img_dict.set("ColorSpace", "DeviceRGB");
    img_dict.set("BitsPerComponent", 8_i64);

    if img.color().has_alpha() {
        let alpha: Vec<u8> = img.to_rgba8().pixels().map(|pixel| pixel[3]).collect();
        let mut mask_dict = Dictionary::new();
        mask_dict.set("Type", "XObject");
        mask_dict.set("Subtype", "Image");
        mask_dict.set("Width", width as i64);
        mask_dict.set("Height", height as i64);
        mask_dict.set("ColorSpace", "DeviceGray");
        mask_dict.set("BitsPerComponent", 8_i64);
        let mask_id = doc.add_object(flate_stream(mask_dict, &alpha)?);
        img_dict.set("SMask", Object::Reference(mask_id));
    }

    let rgb = img.to_rgb8().into_raw();
    let img_id = doc.add_object(flate_stream(img_dict, &rgb)?);

    Ok((img_id, width, height))
}
