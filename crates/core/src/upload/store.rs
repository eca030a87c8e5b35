//! Filesystem-backed upload store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::item::{Item, ItemId, ItemRegistry};
use crate::metrics::UPLOADS_TOTAL;

use super::error::UploadError;

/// Length of generated item ids, in hex characters.
pub const ID_LEN: usize = 20;

/// Stores uploaded files and registers them as pending items.
pub struct UploadStore {
    config: UploadConfig,
    registry: Arc<dyn ItemRegistry>,
    paths: RwLock<HashMap<ItemId, PathBuf>>,
}

impl UploadStore {
    pub fn new(config: UploadConfig, registry: Arc<dyn ItemRegistry>) -> Self {
        Self {
            config,
            registry,
            paths: RwLock::new(HashMap::new()),
        }
    }

    /// Directory uploads are written to.
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Validate, store and register an uploaded file.
    ///
    /// The returned item is `Uploaded` with no artifacts. Its display name is
    /// the final component of `file_name`.
    pub async fn accept(&self, file_name: &str, bytes: &[u8]) -> Result<Item, UploadError> {
        let result = self.store(file_name, bytes).await;
        let label = if result.is_ok() { "accepted" } else { "rejected" };
        UPLOADS_TOTAL.with_label_values(&[label]).inc();
        result
    }

    async fn store(&self, file_name: &str, bytes: &[u8]) -> Result<Item, UploadError> {
        let display_name = Path::new(file_name.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(UploadError::EmptyFileName)?
            .to_string();

        let extension = self.check_extension(&display_name)?;

        let size = bytes.len() as u64;
        if size > self.config.max_size_bytes {
            return Err(UploadError::TooLarge {
                size,
                max: self.config.max_size_bytes,
            });
        }

        let id = generate_id();
        let path = self.config.dir.join(format!("{}.{}", id, extension));

        fs::create_dir_all(&self.config.dir)
            .await
            .map_err(|e| UploadError::Storage {
                path: self.config.dir.clone(),
                source: e,
            })?;
        fs::write(&path, bytes)
            .await
            .map_err(|e| UploadError::Storage {
                path: path.clone(),
                source: e,
            })?;

        let item = match self.registry.register(id.clone(), &display_name) {
            Ok(item) => item,
            Err(e) => {
                if let Err(rm) = fs::remove_file(&path).await {
                    warn!("Failed to clean up {}: {}", path.display(), rm);
                }
                return Err(e.into());
            }
        };

        self.paths.write().await.insert(id.clone(), path);
        info!("Accepted upload {} as item {} ({} bytes)", display_name, id, size);
        Ok(item)
    }

    fn check_extension(&self, name: &str) -> Result<String, UploadError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let allowed = self
            .config
            .allowed_extensions
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&extension));

        if extension.is_empty() || !allowed {
            return Err(UploadError::ExtensionNotAllowed { extension });
        }
        Ok(extension)
    }

    /// Remove an item and delete its stored file.
    ///
    /// Fails while the item is processing; the file is kept in that case.
    pub async fn remove(&self, id: &ItemId) -> Result<Item, UploadError> {
        let item = self.registry.remove(id)?;

        if let Some(path) = self.paths.write().await.remove(id) {
            match fs::remove_file(&path).await {
                Ok(()) => debug!("Deleted {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(UploadError::Storage { path, source: e });
                }
            }
        }

        info!("Removed item {}", id);
        Ok(item)
    }

    /// Register files left in the upload directory by a previous run.
    ///
    /// Only `<id>.<ext>` files with a generated id and an allowed extension
    /// are picked up, oldest first, as `Uploaded` items named after the
    /// stored file. Ids already known are left alone. A missing directory
    /// restores nothing.
    pub async fn restore(&self) -> Result<Vec<Item>, UploadError> {
        let dir = &self.config.dir;
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(UploadError::Storage {
                    path: dir.clone(),
                    source: e,
                })
            }
        };

        let mut found = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    return Err(UploadError::Storage {
                        path: dir.clone(),
                        source: e,
                    })
                }
            };
            let path = entry.path();
            let Some(id) = self.stored_id(&path) else {
                debug!("Ignoring {} in upload directory", path.display());
                continue;
            };
            let metadata = match entry.metadata().await {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, id, path));
        }
        found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut restored = Vec::new();
        for (_, id, path) in found {
            if self.registry.get(&id)?.is_some() {
                continue;
            }
            let display_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| id.to_string());
            let item = self.registry.register(id.clone(), &display_name)?;
            self.paths.write().await.insert(id, path);
            restored.push(item);
        }

        if !restored.is_empty() {
            info!("Restored {} uploads from {}", restored.len(), dir.display());
        }
        Ok(restored)
    }

    /// Item id of a stored upload, if `path` looks like one.
    fn stored_id(&self, path: &Path) -> Option<ItemId> {
        let stem = path.file_stem()?.to_str()?;
        if stem.len() != ID_LEN || !stem.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        self.check_extension(name).ok()?;
        Some(ItemId::new(stem))
    }

    /// Path of the stored file for `id`.
    pub async fn path(&self, id: &ItemId) -> Option<PathBuf> {
        self.paths.read().await.get(id).cloned()
    }
}

fn generate_id() -> ItemId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    ItemId::new(&hex[..ID_LEN])
}
