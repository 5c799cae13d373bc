//! Static asset manifest and the generation id derived from it

use crate::utils::error::{Result, VideoLiteError};
use reqwest::Url;
use sha2::{Digest, Sha256};

/// Application shell and static assets seeded on install
pub const DEFAULT_ASSETS: &[&str] = &[
    "/",
    "/index.html",
    "/css/styles.css",
    "/js/app.js",
    "/icons/icon-192.png",
    "/icons/icon-512.png",
];

/// Shell candidates served when the network is gone, in preference order
const SHELL_PATHS: &[&str] = &["/index.html", "/"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifest {
    origin: Url,
    revision: String,
    assets: Vec<String>,
}

impl AssetManifest {
    pub fn new(origin: &str, revision: &str, assets: Vec<String>) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| VideoLiteError::InvalidUrl(format!("{}: {}", origin, e)))?;
        if origin.cannot_be_a_base() {
            return Err(VideoLiteError::InvalidUrl(origin.to_string()));
        }

        Ok(Self {
            origin,
            revision: revision.to_string(),
            assets,
        })
    }

    pub fn with_default_assets(origin: &str, revision: &str) -> Result<Self> {
        Self::new(
            origin,
            revision,
            DEFAULT_ASSETS.iter().map(|a| a.to_string()).collect(),
        )
    }

    /// Content-derived generation id: same manifest, same generation
    pub fn generation(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.origin.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(self.revision.as_bytes());
        for asset in &self.assets {
            hasher.update(b"\n");
            hasher.update(asset.as_bytes());
        }
        let digest = hasher.finalize();
        hex::encode(&digest[..16])
    }

    pub fn asset_urls(&self) -> Result<Vec<Url>> {
        self.assets.iter().map(|asset| self.resolve(asset)).collect()
    }

    /// The asset that doubles as the offline fallback page, if listed
    pub fn shell_url(&self) -> Option<Url> {
        SHELL_PATHS
            .iter()
            .find(|path| self.assets.iter().any(|a| a == *path))
            .and_then(|path| self.resolve(path).ok())
    }

    fn resolve(&self, asset: &str) -> Result<Url> {
        self.origin
            .join(asset)
            .map_err(|e| VideoLiteError::InvalidUrl(format!("{}: {}", asset, e)))
    }
}
