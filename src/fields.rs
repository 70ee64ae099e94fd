//! Request data model: the memorandum field vocabulary and uploaded assets.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

/// Fields a memorandum template can be filled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    MainTitle,
    Headline,
    CompanyName,
    ProjectName,
    LoanAmount,
    ReferenceNumber,
    DateText,
    WebsiteLine,
    FooterLine1,
    FooterLine2,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::MainTitle,
        Field::Headline,
        Field::CompanyName,
        Field::ProjectName,
        Field::LoanAmount,
        Field::ReferenceNumber,
        Field::DateText,
        Field::WebsiteLine,
        Field::FooterLine1,
        Field::FooterLine2,
    ];

    /// Key used in field maps, position configs and markup placeholders
    pub fn key(&self) -> &'static str {
        match self {
            Field::MainTitle => "mainTitle",
            Field::Headline => "headline",
            Field::CompanyName => "companyName",
            Field::ProjectName => "projectName",
            Field::LoanAmount => "loanAmount",
            Field::ReferenceNumber => "referenceNumber",
            Field::DateText => "dateText",
            Field::WebsiteLine => "websiteLine",
            Field::FooterLine1 => "footerLine1",
            Field::FooterLine2 => "footerLine2",
        }
    }

    /// Value used when the request does not supply one
    pub fn default_value(&self) -> &'static str {
        match self {
            Field::MainTitle => "PROPOSAL",
            Field::Headline => "Construction Finance",
            Field::CompanyName => "Connect FG",
            Field::ProjectName => "Project Name Here",
            Field::LoanAmount => "$0",
            Field::ReferenceNumber => "REF-0001",
            Field::DateText => "13 January 2026",
            Field::WebsiteLine => "www.connectfa.com",
            Field::FooterLine1 => "Connect FG Commercial Pty Ltd",
            Field::FooterLine2 => "ABN 00 000 000 000",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.key() == s)
            .ok_or_else(|| format!("unknown field '{}'", s))
    }
}

/// Supplied field values. Empty or whitespace-only values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    values: BTreeMap<Field, String>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loosely typed key/value pairs, ignoring keys outside the vocabulary
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut map = Self::new();
        for (key, value) in pairs {
            match key.as_ref().parse::<Field>() {
                Ok(field) => map.insert(field, value),
                Err(_) => log::warn!("Ignoring unknown field '{}'", key.as_ref()),
            }
        }
        map
    }

    /// Parse a JSON object of field values. Numbers and booleans are taken
    /// as their literal text, nulls as absent.
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let pairs = raw.into_iter().filter_map(|(key, value)| {
            let text = match value {
                serde_json::Value::Null => return None,
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, text))
        });
        Ok(Self::from_pairs(pairs))
    }

    pub fn insert(&mut self, field: Field, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    /// Overlay `other` on top of this map; supplied values in `other` win.
    pub fn merge(&mut self, other: FieldMap) {
        for (field, value) in other.values {
            if !value.trim().is_empty() {
                self.values.insert(field, value);
            }
        }
    }

    /// Supplied, non-empty value for a field
    pub fn get(&self, field: Field) -> Option<&str> {
        self.values
            .get(&field)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    pub fn value_or_default(&self, field: Field) -> &str {
        self.get(field).unwrap_or_else(|| field.default_value())
    }

    /// Supplied, non-empty values in vocabulary order
    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        Field::ALL
            .iter()
            .filter_map(move |field| self.get(*field).map(|value| (*field, value)))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Upload slots a request may fill with binary content
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetSlot {
    CoverImage,
    FooterLogo,
}

impl AssetSlot {
    pub const ALL: [AssetSlot; 2] = [AssetSlot::CoverImage, AssetSlot::FooterLogo];

    pub fn key(&self) -> &'static str {
        match self {
            AssetSlot::CoverImage => "coverImage",
            AssetSlot::FooterLogo => "footerLogo",
        }
    }
}

impl fmt::Display for AssetSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for AssetSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AssetSlot::ALL
            .iter()
            .copied()
            .find(|slot| slot.key() == s)
            .ok_or_else(|| format!("unknown asset slot '{}'", s))
    }
}

/// A binary file together with its MIME type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl Asset {
    /// Wrap uploaded bytes, sniffing the MIME type from their content
    pub fn new(bytes: Vec<u8>) -> Self {
        let mime = detect_mime(&bytes, None).to_string();
        Self { bytes, mime }
    }

    pub fn with_mime(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }
}

/// Uploaded assets keyed by slot
#[derive(Debug, Clone, Default)]
pub struct AssetBundle {
    assets: BTreeMap<AssetSlot, Asset>,
}

impl AssetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: AssetSlot, asset: Asset) {
        self.assets.insert(slot, asset);
    }

    pub fn get(&self, slot: AssetSlot) -> Option<&Asset> {
        self.assets.get(&slot)
    }

    /// Upload registered under a slot whose key equals `key`
    pub fn get_by_key(&self, key: &str) -> Option<&Asset> {
        key.parse::<AssetSlot>().ok().and_then(|slot| self.get(slot))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssetSlot, &Asset)> {
        self.assets.iter().map(|(slot, asset)| (*slot, asset))
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Determine a MIME type from the content, falling back to the file extension
pub fn detect_mime(bytes: &[u8], path: Option<&Path>) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }

    let extension = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::new(2, 2);
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_field_keys_match_serde_names() {
        for field in Field::ALL {
            let parsed: Field = serde_json::from_value(json!(field.key())).unwrap();
            assert_eq!(parsed, field);
            assert_eq!(field.key().parse::<Field>().unwrap(), field);
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!("companyLine".parse::<Field>().is_err());
    }

    #[test]
    fn test_from_pairs_ignores_unknown_keys() {
        let map = FieldMap::from_pairs([
            ("projectName", "Dubai Harbour Residences"),
            ("favouriteColour", "teal"),
        ]);
        assert_eq!(map.get(Field::ProjectName), Some("Dubai Harbour Residences"));
        assert_eq!(map.iter().count(), 1);
    }

    #[test]
    fn test_empty_values_are_absent() {
        let map = FieldMap::from_pairs([("projectName", "   "), ("dateText", "")]);
        assert_eq!(map.get(Field::ProjectName), None);
        assert_eq!(map.get(Field::DateText), None);
        assert!(map.is_empty());
        assert_eq!(map.value_or_default(Field::DateText), "13 January 2026");
    }

    #[test]
    fn test_iter_follows_vocabulary_order() {
        let map = FieldMap::from_pairs([
            ("footerLine2", "ABN 11"),
            ("mainTitle", "OFFER"),
            ("loanAmount", "100"),
        ]);
        let keys: Vec<_> = map.iter().map(|(field, _)| field).collect();
        assert_eq!(keys, vec![Field::MainTitle, Field::LoanAmount, Field::FooterLine2]);
    }

    #[test]
    fn test_from_json_str_stringifies_numbers() {
        let map = FieldMap::from_json_str(
            r#"{"loanAmount": 2500000, "projectName": "Harbour", "dateText": null}"#,
        )
        .unwrap();
        assert_eq!(map.get(Field::LoanAmount), Some("2500000"));
        assert_eq!(map.get(Field::ProjectName), Some("Harbour"));
        assert_eq!(map.get(Field::DateText), None);
    }

    #[test]
    fn test_merge_prefers_supplied_values() {
        let mut base = FieldMap::from_pairs([("projectName", "A"), ("companyName", "Acme")]);
        let overrides = FieldMap::from_pairs([("projectName", "B"), ("companyName", "")]);
        base.merge(overrides);
        assert_eq!(base.get(Field::ProjectName), Some("B"));
        assert_eq!(base.get(Field::CompanyName), Some("Acme"));
    }

    #[test]
    fn test_asset_slot_lookup_by_key() {
        let mut bundle = AssetBundle::new();
        bundle.insert(AssetSlot::FooterLogo, Asset::with_mime(vec![1, 2], "image/png"));
        assert!(bundle.get_by_key("footerLogo").is_some());
        assert!(bundle.get_by_key("coverImage").is_none());
        assert!(bundle.get_by_key("fontRaleway").is_none());
    }

    #[test]
    fn test_asset_new_sniffs_png() {
        let asset = Asset::new(png_bytes());
        assert_eq!(asset.mime, "image/png");
    }

    #[test]
    fn test_detect_mime_by_extension() {
        let path = Path::new("fonts/Raleway-Regular.ttf");
        assert_eq!(detect_mime(b"\0\x01\0\0", Some(path)), "font/ttf");
        assert_eq!(detect_mime(b"<svg/>", Some(Path::new("cover.SVG"))), "image/svg+xml");
        assert_eq!(detect_mime(b"???", None), "application/octet-stream");
    }
}
