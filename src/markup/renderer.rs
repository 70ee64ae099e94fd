//! Markup to PDF rendering through headless Chromium.

use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;

use crate::config::{PageSettings, RendererSettings};
use crate::error::{FillError, Result};

/// Turns a complete markup document into PDF bytes
#[allow(async_fn_in_trait)]
pub trait PdfRenderer {
    async fn render(&self, html: &str, page: &PageSettings) -> Result<Vec<u8>>;
}

/// Launches a fresh headless browser for every render
#[derive(Debug, Clone, Default)]
pub struct ChromiumRenderer {
    settings: RendererSettings,
}

impl ChromiumRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    /// Use a specific browser binary instead of the configured or detected one
    pub fn set_executable(&mut self, path: PathBuf) {
        self.settings.chrome_executable = Some(path);
    }
}

impl PdfRenderer for ChromiumRenderer {
    async fn render(&self, html: &str, page: &PageSettings) -> Result<Vec<u8>> {
        let session = BrowserSession::launch(&self.settings).await?;
        let result = session.print(html, page).await;
        session.close().await;
        result
    }
}

fn generation_error(stage: &str, err: impl std::fmt::Display) -> FillError {
    FillError::Generation(format!("{}: {}", stage, err))
}

/// A running browser and the task driving its event handler.
///
/// `close` shuts the browser down; dropping the session without closing
/// still stops the handler task.
struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    async fn launch(settings: &RendererSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if let Some(executable) = &settings.chrome_executable {
            builder = builder.chrome_executable(executable);
        }
        if settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        for arg in &settings.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder
            .build()
            .map_err(|e| generation_error("invalid browser configuration", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| generation_error("failed to launch browser", e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler event error: {}", e);
                }
            }
        });
        log::info!("Launched headless browser");

        Ok(Self { browser, handler })
    }

    async fn print(&self, html: &str, page: &PageSettings) -> Result<Vec<u8>> {
        let tab = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| generation_error("failed to open page", e))?;

        tab.set_content(html)
            .await
            .map_err(|e| generation_error("failed to load markup", e))?;

        let fonts_ready = EvaluateParams::builder()
            .expression("document.fonts.ready.then(() => true)")
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| generation_error("invalid font wait script", e))?;
        tab.evaluate_expression(fonts_ready)
            .await
            .map_err(|e| generation_error("failed waiting for fonts", e))?;

        let pdf = tab
            .pdf(print_params(page))
            .await
            .map_err(|e| generation_error("failed to export PDF", e))?;
        log::info!("Rendered markup to PDF ({} bytes)", pdf.len());
        Ok(pdf)
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            log::warn!("Failed to wait for browser exit: {}", e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Print options: configured paper size, zero margins, backgrounds on
pub fn print_params(page: &PageSettings) -> PrintToPdfParams {
    PrintToPdfParams {
        paper_width: Some(page.width.as_inches()),
        paper_height: Some(page.height.as_inches()),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        print_background: Some(true),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Dimension;

    #[test]
    fn test_print_params_default_a4() {
        let params = print_params(&PageSettings::default());
        assert!((params.paper_width.unwrap() - 8.27).abs() < 0.01);
        assert!((params.paper_height.unwrap() - 11.69).abs() < 0.01);
        assert_eq!(params.margin_top, Some(0.0));
        assert_eq!(params.margin_left, Some(0.0));
        assert_eq!(params.print_background, Some(true));
    }

    #[test]
    fn test_print_params_letter() {
        let page = PageSettings {
            width: Dimension(612.0),
            height: Dimension(792.0),
        };
        let params = print_params(&page);
        assert_eq!(params.paper_width, Some(8.5));
        assert_eq!(params.paper_height, Some(11.0));
    }
}
