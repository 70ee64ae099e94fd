use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use ttf_parser::Face;

use super::content::{compress_data, escape_pdf_string};
use crate::config::read_required;
use crate::error::{FillError, Result};

/// Standard PDF Type1 fonts with built-in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
}

/// Helvetica advance widths for 0x20..=0x7E, in 1/1000 em
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advance widths for 0x20..=0x7E, in 1/1000 em
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Helvetica advance widths for 0x80..=0xFF, in 1/1000 em. Bytes WinAnsi
/// leaves undefined are zero; they are never drawn.
const HELVETICA_HIGH_WIDTHS: [u16; 128] = [
    556, 0, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,
    0, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 0, 500, 667,
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Helvetica-Bold advance widths for 0x80..=0xFF, in 1/1000 em
const HELVETICA_BOLD_HIGH_WIDTHS: [u16; 128] = [
    556, 0, 278, 556, 500, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,
    0, 278, 278, 500, 500, 350, 556, 1000, 333, 1000, 556, 333, 944, 0, 500, 667,
    278, 333, 556, 556, 556, 556, 280, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 611, 556, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    722, 722, 722, 722, 722, 722, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 556, 556, 556, 556, 556, 278, 278, 278, 278,
    611, 611, 611, 611, 611, 611, 611, 584, 611, 611, 611, 611, 611, 556, 611, 556,
];

const COURIER_WIDTH: u16 = 600;

impl StandardFont {
    pub const ALL: [StandardFont; 4] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::Courier,
        StandardFont::CourierBold,
    ];

    /// Get the PDF BaseFont name for this font
    pub fn base_font_name(&self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
        }
    }

    /// Parse a font name into a StandardFont
    pub fn from_name(name: &str) -> Option<StandardFont> {
        match name.to_lowercase().as_str() {
            "helvetica" => Some(StandardFont::Helvetica),
            "helvetica-bold" => Some(StandardFont::HelveticaBold),
            "courier" => Some(StandardFont::Courier),
            "courier-bold" => Some(StandardFont::CourierBold),
            _ => None,
        }
    }

    /// Advance width of a WinAnsi byte, in 1/1000 em
    fn byte_width(&self, byte: u8) -> u16 {
        let (low, high) = match self {
            StandardFont::Courier | StandardFont::CourierBold => return COURIER_WIDTH,
            StandardFont::Helvetica => (&HELVETICA_WIDTHS, &HELVETICA_HIGH_WIDTHS),
            StandardFont::HelveticaBold => (&HELVETICA_BOLD_WIDTHS, &HELVETICA_BOLD_HIGH_WIDTHS),
        };
        match byte {
            0x20..=0x7E => low[(byte - 0x20) as usize],
            0x80..=0xFF => high[(byte - 0x80) as usize],
            _ => 0,
        }
    }
}

/// Map a char onto the WinAnsi byte drawn for it. Printable Latin-1 maps to
/// itself and WinAnsi's typographic marks map into 0x80..=0x9F. Anything
/// else is drawn as '?'.
fn win_ansi_byte(ch: char) -> u8 {
    match ch {
        ' '..='~' | '\u{A0}'..='\u{FF}' => ch as u8,
        '\u{20AC}' => 0x80,
        '\u{201A}' => 0x82,
        '\u{0192}' => 0x83,
        '\u{201E}' => 0x84,
        '\u{2026}' => 0x85,
        '\u{2020}' => 0x86,
        '\u{2021}' => 0x87,
        '\u{02C6}' => 0x88,
        '\u{2030}' => 0x89,
        '\u{0160}' => 0x8A,
        '\u{2039}' => 0x8B,
        '\u{0152}' => 0x8C,
        '\u{017D}' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '\u{2022}' => 0x95,
        '\u{2013}' => 0x96,
        '\u{2014}' => 0x97,
        '\u{02DC}' => 0x98,
        '\u{2122}' => 0x99,
        '\u{0161}' => 0x9A,
        '\u{203A}' => 0x9B,
        '\u{0153}' => 0x9C,
        '\u{017E}' => 0x9E,
        '\u{0178}' => 0x9F,
        _ => b'?',
    }
}

/// CID drawn for a char under Identity-H. Only the BMP is addressable.
fn cid_for(ch: char) -> u16 {
    u16::try_from(ch as u32).unwrap_or(b'?' as u16)
}

/// TrueType program loaded from the template directory
#[derive(Debug, Clone)]
pub struct TrueTypeFont {
    data: Vec<u8>,
    postscript_name: String,
    units_per_em: f64,
}

impl TrueTypeFont {
    pub fn parse(data: Vec<u8>, fallback_name: &str) -> Result<Self> {
        let face = Face::parse(&data, 0)
            .map_err(|e| FillError::Font(format!("{}: {}", fallback_name, e)))?;

        let postscript_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == ttf_parser::name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .unwrap_or_else(|| fallback_name.to_string())
            .replace(' ', "-");
        let units_per_em = f64::from(face.units_per_em());

        Ok(Self {
            data,
            postscript_name,
            units_per_em,
        })
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }

    /// Advance width of a char, in 1/1000 em
    fn advance(face: &Face<'_>, ch: char, units_per_em: f64) -> f64 {
        let ch = char::from_u32(u32::from(cid_for(ch))).unwrap_or('?');
        let gid = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
        let units = face.glyph_hor_advance(gid).unwrap_or(0);
        f64::from(units) * 1000.0 / units_per_em
    }
}

/// A font that can measure, encode and embed overlay text
#[derive(Debug, Clone)]
pub enum FontProgram {
    Standard(StandardFont),
    TrueType(TrueTypeFont),
}

impl FontProgram {
    /// Rendered width of `text` at `size`, in points
    pub fn text_width(&self, text: &str, size: f64) -> f64 {
        let em_units: f64 = match self {
            FontProgram::Standard(font) => text
                .chars()
                .map(|ch| f64::from(font.byte_width(win_ansi_byte(ch))))
                .sum(),
            FontProgram::TrueType(font) => match font.face() {
                Some(face) => text
                    .chars()
                    .map(|ch| TrueTypeFont::advance(&face, ch, font.units_per_em))
                    .sum(),
                None => 0.0,
            },
        };
        em_units * size / 1000.0
    }

    /// Encode text as a content stream string operand
    pub fn encode_text(&self, text: &str) -> String {
        match self {
            FontProgram::Standard(_) => {
                let bytes: Vec<u8> = text.chars().map(win_ansi_byte).collect();
                format!("({})", escape_pdf_string(&bytes))
            }
            FontProgram::TrueType(_) => format!("<{}>", encode_cid_text(text)),
        }
    }

    /// Add the font objects to the document, returning the font dictionary
    pub fn embed(&self, doc: &mut Document, used: &BTreeSet<char>) -> Result<ObjectId> {
        match self {
            FontProgram::Standard(font) => Ok(embed_standard_font(doc, *font)),
            FontProgram::TrueType(font) => embed_cid_font(doc, font, used),
        }
    }
}

/// Fonts available to an overlay fill, keyed by alias or standard name
#[derive(Debug, Clone)]
pub struct FontSet {
    fonts: BTreeMap<String, FontProgram>,
}

impl FontSet {
    /// Load every declared font. A declared TrueType file that is missing
    /// fails the load even if no field uses it.
    pub fn load(root: &Path, declared: &BTreeMap<String, String>) -> Result<Self> {
        let mut fonts: BTreeMap<String, FontProgram> = StandardFont::ALL
            .iter()
            .map(|font| (font.base_font_name().to_string(), FontProgram::Standard(*font)))
            .collect();

        for (alias, source) in declared {
            let program = match StandardFont::from_name(source) {
                Some(font) => FontProgram::Standard(font),
                None => {
                    let path = root.join(source);
                    let data = read_required(&path)?;
                    log::debug!("Loaded font '{}' from {:?}", alias, path);
                    FontProgram::TrueType(TrueTypeFont::parse(data, alias)?)
                }
            };
            fonts.insert(alias.clone(), program);
        }

        Ok(Self { fonts })
    }

    /// Resolve an alias, falling back to standard font names case-insensitively.
    /// Returns the canonical key together with the program.
    pub fn get(&self, name: &str) -> Option<(&str, &FontProgram)> {
        if let Some((key, program)) = self.fonts.get_key_value(name) {
            return Some((key.as_str(), program));
        }
        let standard = StandardFont::from_name(name)?;
        self.fonts
            .get_key_value(standard.base_font_name())
            .map(|(key, program)| (key.as_str(), program))
    }
}

fn embed_standard_font(doc: &mut Document, font: StandardFont) -> ObjectId {
    let mut font_dict = Dictionary::new();
    font_dict.set("Type", "Font");
    font_dict.set("Subtype", "Type1");
    font_dict.set("BaseFont", font.base_font_name());
    font_dict.set("Encoding", "WinAnsiEncoding");
    doc.add_object(Object::Dictionary(font_dict))
}

/// Build a CIDToGIDMap stream from font's cmap table
///
/// CIDs are Unicode BMP codepoints under Identity-H; the map only needs to
/// reach the highest CID actually drawn.
fn build_cidtogid_map(face: &Face<'_>, max_cid: u16) -> Vec<u8> {
    let mut gid_map: Vec<u8> = Vec::with_capacity((max_cid as usize + 1) * 2);

    for cid in 0..=max_cid {
        // Surrogate code units are not chars; they map to .notdef
        let gid = char::from_u32(u32::from(cid))
            .and_then(|ch| face.glyph_index(ch))
            .map(|g| g.0)
            .unwrap_or(0);
        gid_map.extend_from_slice(&gid.to_be_bytes());
    }

    gid_map
}

const TO_UNICODE_HEADER: &str = "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
";

const TO_UNICODE_FOOTER: &str = "endcmap
CMapName currentdict /CMap defineresource pop
end
end
";

/// A CMap block holds at most 100 mappings
const BFCHAR_BLOCK: usize = 100;

/// Build a ToUnicode CMap with one bfchar entry per drawn CID
///
/// CIDs are BMP code units, so each maps to the same UTF-16BE value.
fn to_unicode_cmap(cids: &BTreeSet<u16>) -> String {
    let cids: Vec<u16> = cids.iter().copied().collect();
    let mut cmap = String::from(TO_UNICODE_HEADER);
    for block in cids.chunks(BFCHAR_BLOCK) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for cid in block {
            cmap.push_str(&format!("<{:04X}> <{:04X}>\n", cid, cid));
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str(TO_UNICODE_FOOTER);
    cmap
}

fn compressed_stream(mut dict: Dictionary, data: &[u8]) -> Result<Stream> {
    let compressed = compress_data(data)
        .map_err(|e| FillError::Font(format!("failed to compress font data: {}", e)))?;
    dict.set("Filter", "FlateDecode");
    Ok(Stream::new(dict, compressed))
}

/// Embed a CID-keyed TrueType font
///
/// This creates a Type0 font with a CIDFontType2 descendant, widths for the
/// characters in `used`, and a ToUnicode map so the text stays extractable.
fn embed_cid_font(doc: &mut Document, font: &TrueTypeFont, used: &BTreeSet<char>) -> Result<ObjectId> {
    let face = Face::parse(&font.data, 0)
        .map_err(|e| FillError::Font(format!("{}: {}", font.postscript_name, e)))?;
    let scale = 1000.0 / font.units_per_em;
    let font_name = font.postscript_name.as_str();

    let mut cid_font = Dictionary::new();
    cid_font.set("Type", "Font");
    cid_font.set("Subtype", "CIDFontType2");
    cid_font.set("BaseFont", font_name);
    cid_font.set("CIDSystemInfo", {
        let mut cid_system = Dictionary::new();
        cid_system.set("Registry", Object::String("Adobe".into(), StringFormat::Literal));
        cid_system.set("Ordering", Object::String("Identity".into(), StringFormat::Literal));
        cid_system.set("Supplement", 0i64);
        Object::Dictionary(cid_system)
    });

    let cids: BTreeSet<u16> = used.iter().map(|ch| cid_for(*ch)).collect();
    let max_cid = cids.iter().next_back().copied().unwrap_or(0);
    let cidtogid_stream = compressed_stream(Dictionary::new(), &build_cidtogid_map(&face, max_cid))?;
    let cidtogid_id = doc.add_object(cidtogid_stream);
    cid_font.set("CIDToGIDMap", Object::Reference(cidtogid_id));

    let mut widths = Vec::with_capacity(cids.len() * 2);
    for cid in &cids {
        let ch = char::from_u32(u32::from(*cid)).unwrap_or('?');
        let width = TrueTypeFont::advance(&face, ch, font.units_per_em).round() as i64;
        widths.push(Object::Integer(i64::from(*cid)));
        widths.push(Object::Array(vec![Object::Integer(width)]));
    }
    cid_font.set("DW", 1000i64);
    cid_font.set("W", Object::Array(widths));

    let bbox = face.global_bounding_box();
    let scaled = |v: i16| Object::Integer((f64::from(v) * scale).round() as i64);
    let mut font_descriptor = Dictionary::new();
    font_descriptor.set("Type", "FontDescriptor");
    font_descriptor.set("FontName", font_name);
    font_descriptor.set("Flags", 4i64); // Symbolic
    font_descriptor.set(
        "FontBBox",
        vec![scaled(bbox.x_min), scaled(bbox.y_min), scaled(bbox.x_max), scaled(bbox.y_max)],
    );
    font_descriptor.set("ItalicAngle", 0i64);
    font_descriptor.set("Ascent", scaled(face.ascender()));
    font_descriptor.set("Descent", scaled(face.descender()));
    font_descriptor.set("CapHeight", scaled(face.capital_height().unwrap_or(face.ascender())));
    font_descriptor.set("StemV", 80i64);

    let mut font_stream_dict = Dictionary::new();
    font_stream_dict.set("Length1", font.data.len() as i64);
    let font_stream_id = doc.add_object(compressed_stream(font_stream_dict, &font.data)?);
    font_descriptor.set("FontFile2", Object::Reference(font_stream_id));

    let descriptor_id = doc.add_object(Object::Dictionary(font_descriptor));
    cid_font.set("FontDescriptor", Object::Reference(descriptor_id));
    let cid_font_id = doc.add_object(Object::Dictionary(cid_font));

    let to_unicode_id = doc.add_object(Stream::new(
        Dictionary::new(),
        to_unicode_cmap(&cids).into_bytes(),
    ));

    let mut type0_font = Dictionary::new();
    type0_font.set("Type", "Font");
    type0_font.set("Subtype", "Type0");
    type0_font.set("BaseFont", font_name);
    type0_font.set("Encoding", "Identity-H");
    type0_font.set("DescendantFonts", vec![Object::Reference(cid_font_id)]);
    type0_font.set("ToUnicode", Object::Reference(to_unicode_id));

    Ok(doc.add_object(Object::Dictionary(type0_font)))
}

/// Encode text for CID font (Identity-H encoding)
///
/// Each char becomes its BMP code unit as four hex digits.
pub fn encode_cid_text(s: &str) -> String {
    s.chars().map(|c| format!("{:04X}", cid_for(c))).collect()
}
