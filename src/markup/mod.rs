//! Markup strategy: substitute values into HTML/SVG and print it to PDF.

mod assets;
mod renderer;
mod template;

use std::path::PathBuf;

use crate::config::{read_required_string, MarkupConfig};
use crate::error::Result;
use crate::fields::{AssetBundle, Field, FieldMap};
use crate::money::normalize_amount;

pub use assets::{data_url, load_static_asset, resolve_asset_urls};
pub use renderer::{print_params, ChromiumRenderer, PdfRenderer};
pub use template::{escape_markup, substitute, Replacement, Substitutions};

/// Placeholder the rendered SVG fragment is inserted at
const FRAGMENT_TOKEN: &str = "fragment";

/// Text inserted for a field in markup
pub fn markup_value(field: Field, fields: &FieldMap) -> String {
    let value = fields.value_or_default(field).trim();
    match field {
        Field::LoanAmount => normalize_amount(value),
        _ => value.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct MarkupFiller<R> {
    root: PathBuf,
    config: MarkupConfig,
    renderer: R,
}

impl<R: PdfRenderer> MarkupFiller<R> {
    pub fn new(root: impl Into<PathBuf>, config: MarkupConfig, renderer: R) -> Self {
        Self {
            root: root.into(),
            config,
            renderer,
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Build the substitution table for one request
    fn substitutions(&self, fields: &FieldMap, assets: &AssetBundle) -> Result<Substitutions> {
        let mut subs = Substitutions::new();
        for field in Field::ALL {
            subs.text(field.key(), markup_value(field, fields));
        }
        for (token, url) in resolve_asset_urls(&self.root, &self.config.assets, assets)? {
            subs.markup(token, url);
        }
        Ok(subs)
    }

    /// Produce the complete markup document for a request
    pub fn assemble(&self, fields: &FieldMap, assets: &AssetBundle) -> Result<String> {
        let mut subs = self.substitutions(fields, assets)?;

        if let Some(fragment) = &self.config.fragment {
            let fragment_template = read_required_string(&self.root.join(fragment))?;
            let rendered = substitute(&fragment_template, &subs)?;
            log::debug!("Rendered fragment {:?} ({} bytes)", fragment, rendered.len());
            subs.markup(FRAGMENT_TOKEN, rendered);
        }

        let template_path = self.root.join(&self.config.template);
        let html_template = read_required_string(&template_path)?;
        log::info!("Loaded markup template {:?}", template_path);
        substitute(&html_template, &subs)
    }

    /// Assemble the markup and render it to PDF bytes
    pub async fn fill(&self, fields: &FieldMap, assets: &AssetBundle) -> Result<Vec<u8>> {
        let html = self.assemble(fields, assets)?;
        self.renderer.render(&html, &self.config.page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageSettings;
    use crate::error::FillError;
    use crate::fields::{Asset, AssetSlot};
    use serde_json::json;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records the markup it is asked to render
    #[derive(Default)]
    struct RecordingRenderer {
        seen: Mutex<Vec<String>>,
    }

    impl PdfRenderer for RecordingRenderer {
        async fn render(&self, html: &str, _page: &PageSettings) -> Result<Vec<u8>> {
            self.seen.lock().unwrap().push(html.to_string());
            Ok(b"%PDF-1.7 fake".to_vec())
        }
    }

    struct FailingRenderer;

    impl PdfRenderer for FailingRenderer {
        async fn render(&self, _html: &str, _page: &PageSettings) -> Result<Vec<u8>> {
            Err(FillError::Generation("failed to launch browser: no chrome".to_string()))
        }
    }

    const HTML: &str = r#"<html><body>
<h1>{{ mainTitle }}</h1>
<h2>{{projectName}}</h2>
<p class="amount">{{loanAmount}}</p>
<img src="{{coverImage}}">
{{fragment}}
</body></html>"#;

    const SVG: &str = r#"<svg><text>{{companyName}}</text><text>{{dateText}}</text></svg>"#;

    fn write(dir: &Path, name: &str, contents: &[u8]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    fn markup_config(value: serde_json::Value) -> MarkupConfig {
        serde_json::from_value(value).unwrap()
    }

    fn standard_filler<R: PdfRenderer>(dir: &Path, renderer: R) -> MarkupFiller<R> {
        write(dir, "memo.html", HTML.as_bytes());
        write(dir, "cover.svg", SVG.as_bytes());
        let config = markup_config(json!({
            "template": "memo.html",
            "fragment": "cover.svg",
            "assets": { "coverImage": "img/cover.jpg" }
        }));
        MarkupFiller::new(dir, config, renderer)
    }

    fn cover_upload() -> AssetBundle {
        let mut assets = AssetBundle::new();
        assets.insert(AssetSlot::CoverImage, Asset::with_mime(b"jpeg".to_vec(), "image/jpeg"));
        assets
    }

    #[test]
    fn test_markup_value_normalizes_amount_and_defaults() {
        let fields = FieldMap::from_pairs([("loanAmount", "2500000")]);
        assert_eq!(markup_value(Field::LoanAmount, &fields), "$2,500,000");
        assert_eq!(markup_value(Field::ProjectName, &fields), "Project Name Here");
        assert_eq!(markup_value(Field::DateText, &fields), "13 January 2026");
    }

    #[test]
    fn test_assemble_fills_fields_fragment_and_upload() {
        let dir = tempfile::tempdir().unwrap();
        let filler = standard_filler(dir.path(), RecordingRenderer::default());
        let fields = FieldMap::from_pairs([
            ("projectName", "Dubai Harbour Residences"),
            ("loanAmount", "2500000"),
            ("companyName", "Smith & Sons"),
        ]);

        let html = filler.assemble(&fields, &cover_upload()).unwrap();
        assert!(html.contains("<h1>PROPOSAL</h1>"));
        assert!(html.contains("<h2>Dubai Harbour Residences</h2>"));
        assert!(html.contains(r#"<p class="amount">$2,500,000</p>"#));
        assert!(html.contains(&format!(r#"<img src="{}">"#, data_url(b"jpeg", "image/jpeg"))));
        assert!(html.contains("<svg><text>Smith &amp; Sons</text><text>13 January 2026</text></svg>"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_missing_static_asset_without_upload() {
        let dir = tempfile::tempdir().unwrap();
        let filler = standard_filler(dir.path(), RecordingRenderer::default());

        match filler.assemble(&FieldMap::new(), &AssetBundle::new()) {
            Err(FillError::MissingAsset(path)) => assert_eq!(path, dir.path().join("img/cover.jpg")),
            other => panic!("expected MissingAsset, got {:?}", other),
        }
    }

    #[test]
    fn test_static_asset_used_without_upload() {
        let dir = tempfile::tempdir().unwrap();
        let filler = standard_filler(dir.path(), RecordingRenderer::default());
        write(dir.path(), "img/cover.jpg", b"static");

        let html = filler.assemble(&FieldMap::new(), &AssetBundle::new()).unwrap();
        assert!(html.contains(&data_url(b"static", "image/jpeg")));
    }

    #[test]
    fn test_unknown_placeholder_aborts() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "memo.html", b"<p>{{projectName}} {{clientName}}</p>");
        let config = markup_config(json!({ "template": "memo.html" }));
        let filler = MarkupFiller::new(dir.path(), config, RecordingRenderer::default());

        assert!(matches!(
            filler.assemble(&FieldMap::new(), &AssetBundle::new()),
            Err(FillError::UnknownPlaceholder(name)) if name == "clientName"
        ));
    }

    #[test]
    fn test_missing_template_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = markup_config(json!({ "template": "memo.html" }));
        let filler = MarkupFiller::new(dir.path(), config, RecordingRenderer::default());

        match filler.assemble(&FieldMap::new(), &AssetBundle::new()) {
            Err(FillError::MissingAsset(path)) => assert_eq!(path, dir.path().join("memo.html")),
            other => panic!("expected MissingAsset, got {:?}", other),
        }
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let filler = standard_filler(dir.path(), RecordingRenderer::default());
        let fields = FieldMap::from_pairs([("projectName", "Harbour")]);

        let first = filler.assemble(&fields, &cover_upload()).unwrap();
        let second = filler.assemble(&fields, &cover_upload()).unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fill_hands_markup_to_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let filler = standard_filler(dir.path(), RecordingRenderer::default());
        let fields = FieldMap::from_pairs([("projectName", "Dubai Harbour Residences")]);

        let pdf = filler.fill(&fields, &cover_upload()).await.unwrap();
        assert_eq!(pdf, b"%PDF-1.7 fake".to_vec());

        let seen = filler.renderer().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].contains("<h2>Dubai Harbour Residences</h2>"));
    }

    #[tokio::test]
    async fn test_renderer_failure_is_returned() {
        let dir = tempfile::tempdir().unwrap();
        let filler = standard_filler(dir.path(), FailingRenderer);

        let result = filler.fill(&FieldMap::new(), &cover_upload()).await;
        assert!(matches!(result, Err(FillError::Generation(_))));
    }
}
