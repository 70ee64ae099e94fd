//! Error types for memorandum generation

use std::path::PathBuf;

use thiserror::Error;

use crate::fields::{AssetSlot, Field};

/// Result type for fill operations
pub type Result<T> = std::result::Result<T, FillError>;

/// Errors that abort a fill. No partial document is produced for any of them.
#[derive(Error, Debug)]
pub enum FillError {
    /// A required static file (template, font, config, asset) does not exist
    #[error("required file missing: {}", .0.display())]
    MissingAsset(PathBuf),

    /// A static file exists but could not be read
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template configuration is not valid JSON for its kind
    #[error("invalid configuration in {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Position entry for a supplied field is malformed
    #[error("invalid position entry for field `{field}`: {reason}")]
    InvalidPosition { field: Field, reason: String },

    /// Font program could not be parsed
    #[error("font error: {0}")]
    Font(String),

    /// Uploaded image could not be decoded
    #[error("image error for `{slot}`: {source}")]
    Image {
        slot: AssetSlot,
        #[source]
        source: image::ImageError,
    },

    /// Template PDF could not be parsed or written
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// Filled PDF could not be serialized
    #[error("failed to write PDF: {0}")]
    Write(String),

    /// Template PDF has no pages
    #[error("template PDF has no pages")]
    EmptyTemplate,

    /// Markup placeholder with no value mapped to it
    #[error("unknown placeholder `{{{{{0}}}}}` in markup template")]
    UnknownPlaceholder(String),

    /// Headless renderer failed to launch, load or export
    #[error("PDF generation failed: {0}")]
    Generation(String),
}
