//! Template configuration loading and parsing.
//!
//! This module handles:
//! - Loading template.json, tagged by template kind (overlay or markup)
//! - Field positions, fonts and image boxes for PDF overlays
//! - Asset manifest, page size and renderer options for markup templates
//! - Dimension type with flexible deserialization (pt, mm, cm, in)
//! - Reading required static files with missing-file reporting

use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{FillError, Result};
use crate::fields::{AssetSlot, Field};

/// Dimension value that can be specified as:
/// - A number (interpreted as points)
/// - A string with unit: e.g., "100 mm", "10 cm", "1 in" (inches)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimension(pub f64);

impl Dimension {
    /// Convert to points (internal PDF unit)
    pub fn as_points(&self) -> f64 {
        self.0
    }

    pub fn as_inches(&self) -> f64 {
        self.0 / 72.0
    }
}

/// Parse "<number> <unit>" into points. A bare number is taken as points.
pub fn parse_dimension(value: &str) -> std::result::Result<f64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(value.len());
    let (num_str, unit) = value.split_at(split);

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("invalid number in dimension: '{}'", value))?;

    // 1 inch = 72 points (PDF default unit)
    let points = match unit.trim().to_lowercase().as_str() {
        "" | "pt" | "point" | "points" => num,
        "mm" => num * 72.0 / 25.4,
        "cm" => num * 72.0 / 2.54,
        "in" | "inch" | "inches" => num * 72.0,
        other => {
            return Err(format!(
                "unknown unit '{}'. Supported: mm, cm, in, pt",
                other
            ));
        }
    };

    Ok(points)
}

impl<'de> Deserialize<'de> for Dimension {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(points) => Ok(Dimension(points)),
            Raw::Text(text) => parse_dimension(&text)
                .map(Dimension)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// RGB colour with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 3]")]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };
}

impl From<[f32; 3]> for Color {
    fn from([r, g, b]: [f32; 3]) -> Self {
        Color { r, g, b }
    }
}

/// Template configuration, selected by its `kind`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TemplateConfig {
    Overlay(OverlayConfig),
    Markup(MarkupConfig),
}

/// Placement of a text field on the template page.
///
/// Coordinates are measured from the top-left corner of the page.
#[derive(Debug, Deserialize, Clone)]
pub struct FieldSpec {
    pub x: Dimension,
    pub y: Dimension,
    pub w: Dimension,
    pub h: Dimension,
    /// Font alias declared in `fonts`, or a standard font name
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub font_size: Option<Dimension>,
    /// Cover rectangle padding; overrides `settings.padding`
    #[serde(default)]
    pub padding: Option<Dimension>,
}

/// Box an uploaded image is painted into
#[derive(Debug, Deserialize, Clone)]
pub struct ImageSpec {
    pub x: Dimension,
    pub y: Dimension,
    pub w: Dimension,
    pub h: Dimension,
    #[serde(default)]
    pub padding: Option<Dimension>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlaySettings {
    /// Font used by fields that do not name one
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_font_size")]
    pub font_size: Dimension,
    #[serde(default = "default_min_font_size")]
    pub min_font_size: Dimension,
    #[serde(default = "default_shrink_step")]
    pub shrink_step: Dimension,
    #[serde(default = "default_padding")]
    pub padding: Dimension,
    #[serde(default = "default_text_color")]
    pub text_color: Color,
    #[serde(default = "default_cover_color")]
    pub cover_color: Color,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            font: default_font(),
            font_size: default_font_size(),
            min_font_size: default_min_font_size(),
            shrink_step: default_shrink_step(),
            padding: default_padding(),
            text_color: default_text_color(),
            cover_color: default_cover_color(),
        }
    }
}

fn default_font() -> String {
    "Helvetica".to_string()
}

fn default_font_size() -> Dimension {
    Dimension(12.0)
}

fn default_min_font_size() -> Dimension {
    Dimension(6.0)
}

fn default_shrink_step() -> Dimension {
    Dimension(0.5)
}

fn default_padding() -> Dimension {
    Dimension(2.0)
}

fn default_text_color() -> Color {
    Color::BLACK
}

fn default_cover_color() -> Color {
    Color::WHITE
}

#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    /// Base PDF, relative to the configuration directory
    pub template: PathBuf,
    /// Font alias -> standard font name or TrueType file path
    #[serde(default)]
    pub fonts: BTreeMap<String, String>,
    /// Field key -> position entry. Entries are parsed when their field is
    /// supplied, so a malformed entry only fails the fills that use it.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub images: BTreeMap<AssetSlot, ImageSpec>,
    #[serde(default)]
    pub settings: OverlaySettings,
}

impl OverlayConfig {
    /// Parsed and validated position for `field`, or `None` when the
    /// template has no entry for it
    pub fn field_spec(&self, field: Field) -> Result<Option<FieldSpec>> {
        let Some(raw) = self.fields.get(field.key()) else {
            return Ok(None);
        };

        let spec: FieldSpec = serde_json::from_value(raw.clone()).map_err(|e| {
            FillError::InvalidPosition {
                field,
                reason: e.to_string(),
            }
        })?;

        if spec.w.as_points() <= 0.0 || spec.h.as_points() <= 0.0 {
            return Err(FillError::InvalidPosition {
                field,
                reason: format!(
                    "box must have a positive size, got {}x{}",
                    spec.w.as_points(),
                    spec.h.as_points()
                ),
            });
        }

        Ok(Some(spec))
    }
}

/// Paper size handed to the headless renderer
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PageSettings {
    #[serde(default = "default_page_width")]
    pub width: Dimension,
    #[serde(default = "default_page_height")]
    pub height: Dimension,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            width: default_page_width(),
            height: default_page_height(),
        }
    }
}

// A4
fn default_page_width() -> Dimension {
    Dimension(210.0 * 72.0 / 25.4)
}

fn default_page_height() -> Dimension {
    Dimension(297.0 * 72.0 / 25.4)
}

#[derive(Debug, Deserialize, Clone)]
pub struct RendererSettings {
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_no_sandbox")]
    pub no_sandbox: bool,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            no_sandbox: default_no_sandbox(),
            args: Vec::new(),
        }
    }
}

fn default_no_sandbox() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarkupConfig {
    /// HTML template, relative to the configuration directory
    pub template: PathBuf,
    /// SVG fragment template inserted at `{{fragment}}`
    #[serde(default)]
    pub fragment: Option<PathBuf>,
    /// Placeholder name -> static asset embedded as a data URL
    #[serde(default)]
    pub assets: BTreeMap<String, PathBuf>,
    #[serde(default)]
    pub page: PageSettings,
    #[serde(default)]
    pub renderer: RendererSettings,
}

/// Configuration together with the directory its relative paths resolve against
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub root: PathBuf,
    pub config: TemplateConfig,
}

pub fn load_template_config(path: &Path) -> Result<LoadedConfig> {
    let bytes = read_required(path)?;
    let config: TemplateConfig =
        serde_json::from_slice(&bytes).map_err(|source| FillError::Config {
            path: path.to_path_buf(),
            source,
        })?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    Ok(LoadedConfig { root, config })
}

/// Read a static file, reporting a missing file as `MissingAsset`
pub fn read_required(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => FillError::MissingAsset(path.to_path_buf()),
        _ => FillError::Io {
            path: path.to_path_buf(),
            source,
        },
    })
}

pub fn read_required_string(path: &Path) -> Result<String> {
    let bytes = read_required(path)?;
    String::from_utf8(bytes).map_err(|e| FillError::Io {
        path: path.to_path_buf(),
        source: std::io::Error::new(ErrorKind::InvalidData, e),
    })
}
