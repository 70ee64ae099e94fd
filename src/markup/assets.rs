//! Binary assets embedded into markup as data URLs.

use base64::Engine;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::read_required;
use crate::error::Result;
use crate::fields::{detect_mime, Asset, AssetBundle};

/// `data:<mime>;base64,<payload>`
pub fn data_url(bytes: &[u8], mime: &str) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    format!("data:{};base64,{}", mime, engine.encode(bytes))
}

/// Read a static asset, taking the MIME type from its content or extension
pub fn load_static_asset(path: &Path) -> Result<Asset> {
    let bytes = read_required(path)?;
    let mime = detect_mime(&bytes, Some(path));
    Ok(Asset::with_mime(bytes, mime))
}

/// Data URL for every asset token.
///
/// Uploads win over static files of the same name, and the static file is
/// then never read. Uploads with no static entry are exposed under their
/// slot key.
pub fn resolve_asset_urls(
    root: &Path,
    declared: &BTreeMap<String, PathBuf>,
    uploads: &AssetBundle,
) -> Result<BTreeMap<String, String>> {
    let mut urls = BTreeMap::new();

    for (token, relative) in declared {
        let url = match uploads.get_by_key(token) {
            Some(upload) => {
                log::debug!("Using uploaded '{}' instead of {:?}", token, relative);
                data_url(&upload.bytes, &upload.mime)
            }
            None => {
                let asset = load_static_asset(&root.join(relative))?;
                data_url(&asset.bytes, &asset.mime)
            }
        };
        urls.insert(token.clone(), url);
    }

    for (slot, upload) in uploads.iter() {
        urls.entry(slot.key().to_string())
            .or_insert_with(|| data_url(&upload.bytes, &upload.mime));
    }

    Ok(urls)
}
