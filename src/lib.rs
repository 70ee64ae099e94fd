//! Fill finance memorandum templates with request values and produce a PDF.
//!
//! Two template kinds are supported, selected by the `kind` of the template
//! configuration:
//! - `overlay`: a reference PDF whose default text is painted over and redrawn
//! - `markup`: an HTML template (with an optional SVG fragment) printed by
//!   headless Chromium

pub mod config;
pub mod error;
pub mod fields;
pub mod generator;
pub mod markup;
pub mod money;
pub mod pdf;

pub use error::{FillError, Result};
pub use fields::{Asset, AssetBundle, AssetSlot, Field, FieldMap};
pub use generator::{FillRequest, Generator};
