//! JSON persistence for reference libraries, one file per target and kind.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::reference::ReferenceLibrary;
use pocketforge_common::{FingerprintKind, PeriodicTable, PocketForgeError, Result};

/// Directory of `<target>_<KIND>.json` library files.
pub struct LibraryStore {
    dir: PathBuf,
}

impl LibraryStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Target names become file names, so they may not contain path
    /// separators or be `.`/`..`.
    pub fn path_for(&self, target_name: &str, kind: FingerprintKind) -> Result<PathBuf> {
        let name = target_name.trim();
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(PocketForgeError::InvalidInput(format!(
                "target name {target_name:?} is not usable as a file name"
            )));
        }
        Ok(self.dir.join(format!("{}_{}.json", target_name, kind.tag())))
    }

    pub async fn save(&self, library: &ReferenceLibrary) -> Result<PathBuf> {
        let path = self.path_for(&library.target_name, library.fp_kind)?;
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(library)?;
        fs::write(&path, json).await?;
        debug!("Saved reference library to {:?}", path);
        Ok(path)
    }

    /// `None` when no library was saved for this target and kind.
    pub async fn load(&self, target_name: &str, kind: FingerprintKind) -> Result<Option<ReferenceLibrary>> {
        let path = self.path_for(target_name, kind)?;
        if !fs::try_exists(&path).await? {
            debug!("No {} library for {} at {:?}", kind, target_name, path);
            return Ok(None);
        }
        let json = fs::read_to_string(&path).await?;
        let library: ReferenceLibrary = serde_json::from_str(&json)?;
        if library.fp_kind != kind {
            return Err(PocketForgeError::InvalidInput(format!(
                "{:?} holds a {} library, expected {}",
                path, library.fp_kind, kind
            )));
        }
        if let Err(e) = library.validate() {
            warn!("Rejecting stored library {:?}: {}", path, e);
            return Err(e);
        }
        Ok(Some(library))
    }

    /// Add actives to a stored library, generating a fresh one at the
    /// default length when none exists. The result is saved.
    pub async fn update<S: AsRef<str>>(
        &self,
        target_name: &str,
        kind: FingerprintKind,
        notations: &[S],
        table: &PeriodicTable,
    ) -> Result<ReferenceLibrary> {
        let library = match self.load(target_name, kind).await? {
            Some(mut existing) => {
                existing.update(notations, table);
                existing
            }
            None => {
                info!(target = %target_name, "No stored library, generating a new one");
                ReferenceLibrary::generate(
                    target_name,
                    notations,
                    kind,
                    crate::fingerprint::DEFAULT_FP_LENGTH,
                    table,
                )?
            }
        };
        self.save(&library).await?;
        Ok(library)
    }
}
