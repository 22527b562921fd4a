use crate::domain::model::Manifest;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Byte storage rooted at an image directory.
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn remove_file(&self, path: &str) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> bool;
}

pub struct InstallRequest<'a> {
    /// Manifest copy inside the working directory.
    pub manifest_path: &'a Path,
    pub manifest: &'a Manifest,
    /// Dependency layer the installer writes into.
    pub layer: &'a Path,
    pub workdir: &'a Path,
}

#[async_trait]
pub trait Installer: Send + Sync {
    /// Stable description of the installer, part of the layer cache key.
    fn fingerprint(&self) -> String;

    async fn install(&self, request: &InstallRequest<'_>) -> Result<()>;
}
