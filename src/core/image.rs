use crate::domain::model::ImageConfig;
use crate::domain::ports::Storage;
use crate::utils::error::{BootstrapError, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const IMAGE_METADATA: &str = "image.json";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = fs::read(full_path)?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // 先寫暫存檔再改名，避免中斷時留下半個檔案
        let tmp_path = full_path.with_extension("tmp");
        fs::write(&tmp_path, data)?;
        fs::rename(&tmp_path, &full_path)?;
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.base_path.join(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.base_path.join(path).exists()
    }
}

/// On-disk layout of an image directory.
#[derive(Debug, Clone)]
pub struct ImageLayout {
    root: PathBuf,
}

impl ImageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rootfs(&self) -> PathBuf {
        self.root.join("rootfs")
    }

    /// 容器內的絕對工作目錄對應到 rootfs 底下
    pub fn workdir(&self, workdir: &str) -> PathBuf {
        self.rootfs().join(workdir.trim_start_matches('/'))
    }

    pub fn deps_layer(&self) -> PathBuf {
        self.root.join(crate::core::layer_cache::DEPS_LAYER)
    }

    pub fn metadata(&self) -> PathBuf {
        self.root.join(IMAGE_METADATA)
    }

    pub fn storage(&self) -> LocalStorage {
        LocalStorage::new(&self.root)
    }
}

pub async fn save_image<S: Storage>(storage: &S, image: &ImageConfig) -> Result<()> {
    let json = serde_json::to_vec_pretty(image)?;
    storage.write_file(IMAGE_METADATA, &json).await
}

/// Loads `image.json`; a missing file means the image was never built.
pub async fn load_image(layout: &ImageLayout) -> Result<ImageConfig> {
    if !layout.metadata().is_file() {
        return Err(BootstrapError::ImageNotBuilt {
            path: layout.root().to_path_buf(),
        });
    }
    let data = layout.storage().read_file(IMAGE_METADATA).await?;
    Ok(serde_json::from_slice(&data)?)
}
