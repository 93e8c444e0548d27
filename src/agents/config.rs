//! Watcher over `ci-operator/config`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{files_under, AgentOptions, Watched};
use crate::error::Result;

/// Every pipeline configuration file found under the config root.
#[derive(Debug, Clone, Default)]
pub struct ConfigIndex {
    files: Vec<PathBuf>,
}

impl ConfigIndex {
    fn load(root: &Path, recursive: bool) -> std::result::Result<Self, walkdir::Error> {
        let files = files_under(root, recursive)?
            .into_iter()
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml")
                )
            })
            .collect();
        Ok(Self { files })
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

pub struct ConfigAgent {
    inner: Watched<ConfigIndex>,
}

impl ConfigAgent {
    pub fn new(root: &Path, options: AgentOptions) -> Result<Self> {
        let inner = Watched::start("config", root, true, options.error_rate, ConfigIndex::load)?;
        Ok(Self { inner })
    }

    pub fn index(&self) -> Arc<ConfigIndex> {
        self.inner.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }
}

impl std::fmt::Debug for ConfigAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigAgent")
            .field("root", &self.root())
            .field("generation", &self.generation())
            .finish()
    }
}
