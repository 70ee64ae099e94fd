//! `{{name}}` placeholder substitution for HTML and SVG templates.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::{FillError, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Value bound to a placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Plain text, escaped on insertion
    Text(String),
    /// Already-formed markup (data URLs, rendered fragments), inserted as is
    Markup(String),
}

impl Replacement {
    fn render(&self) -> String {
        match self {
            Replacement::Text(text) => escape_markup(text),
            Replacement::Markup(markup) => markup.clone(),
        }
    }
}

/// Placeholder name -> replacement
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    values: BTreeMap<String, Replacement>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), Replacement::Text(value.into()));
    }

    pub fn markup(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), Replacement::Markup(value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&Replacement> {
        self.values.get(name)
    }
}

/// Escape text for use in HTML/SVG element content and quoted attributes
pub fn escape_markup(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Replace every placeholder in `template`.
///
/// A placeholder with no bound value fails the whole substitution; nothing
/// is left half-filled.
pub fn substitute(template: &str, subs: &Substitutions) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let replacement = subs
            .get(name.as_str())
            .ok_or_else(|| FillError::UnknownPlaceholder(name.as_str().to_string()))?;
        output.push_str(&template[last..whole.start()]);
        output.push_str(&replacement.render());
        last = whole.end();
    }
    output.push_str(&template[last..]);
    Ok(output)
}
