//! Single entry point over both template strategies.

use std::path::{Path, PathBuf};

use crate::config::{load_template_config, LoadedConfig, TemplateConfig};
use crate::error::Result;
use crate::fields::{AssetBundle, FieldMap};
use crate::markup::{ChromiumRenderer, MarkupFiller};
use crate::pdf::OverlayFiller;

/// Values and uploads for one memorandum
#[derive(Debug, Clone, Default)]
pub struct FillRequest {
    pub fields: FieldMap,
    pub assets: AssetBundle,
}

impl FillRequest {
    pub fn new(fields: FieldMap, assets: AssetBundle) -> Self {
        Self { fields, assets }
    }
}

/// Template filler chosen by the configuration's `kind`
#[derive(Debug, Clone)]
pub enum Generator {
    Overlay(OverlayFiller),
    Markup(MarkupFiller<ChromiumRenderer>),
}

impl Generator {
    /// Load a template configuration file
    pub fn open(config_path: &Path) -> Result<Self> {
        let loaded = load_template_config(config_path)?;
        log::info!("Loaded template configuration {:?}", config_path);
        Ok(Self::from_config(loaded))
    }

    pub fn from_config(loaded: LoadedConfig) -> Self {
        let LoadedConfig { root, config } = loaded;
        match config {
            TemplateConfig::Overlay(overlay) => Generator::Overlay(OverlayFiller::new(root, overlay)),
            TemplateConfig::Markup(markup) => {
                let renderer = ChromiumRenderer::new(markup.renderer.clone());
                Generator::Markup(MarkupFiller::new(root, markup, renderer))
            }
        }
    }

    /// Override the browser binary. Has no effect on overlay templates.
    pub fn with_chrome_executable(mut self, path: PathBuf) -> Self {
        if let Generator::Markup(filler) = &mut self {
            filler.renderer_mut().set_executable(path);
        }
        self
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Generator::Overlay(_) => "overlay",
            Generator::Markup(_) => "markup",
        }
    }

    /// Produce the filled PDF. Fails as a whole; no partial output.
    pub async fn generate(&self, request: &FillRequest) -> Result<Vec<u8>> {
        log::info!("Generating {} memorandum", self.kind());
        match self {
            Generator::Overlay(filler) => filler.fill(&request.fields, &request.assets),
            Generator::Markup(filler) => filler.fill(&request.fields, &request.assets).await,
        }
    }
}
