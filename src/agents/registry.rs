//! Watcher over `ci-operator/step-registry`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{files_under, AgentOptions, Watched};
use crate::error::Result;
use crate::resolve::ReferenceKey;

/// Registry elements by kind and name.
///
/// `ipi-install-install-commands.sh` is indexed as
/// `(Commands, "ipi-install-install")`, `e2e-aws-ref.yaml` as `(Ref, "e2e-aws")`.
#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    elements: BTreeMap<(ReferenceKey, String), PathBuf>,
}

impl RegistryIndex {
    fn load(root: &Path, recursive: bool) -> std::result::Result<Self, walkdir::Error> {
        let elements = files_under(root, recursive)?
            .into_iter()
            .filter_map(|path| {
                let element = path.file_name()?.to_str().and_then(parse_element_name)?;
                Some((element, path))
            })
            .collect();
        Ok(Self { elements })
    }

    pub fn lookup(&self, key: ReferenceKey, name: &str) -> Option<&Path> {
        self.elements
            .get(&(key, name.to_string()))
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Split `<name>-<kind><ext>` into its kind and name.
fn parse_element_name(file_name: &str) -> Option<(ReferenceKey, String)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let (name, kind) = stem.rsplit_once('-')?;
    let key: ReferenceKey = kind.parse().ok()?;
    if key.extension() != format!(".{ext}") || name.is_empty() {
        return None;
    }
    Some((key, name.to_string()))
}

pub struct RegistryAgent {
    inner: Watched<RegistryIndex>,
}

impl RegistryAgent {
    pub fn new(root: &Path, options: AgentOptions) -> Result<Self> {
        let inner = Watched::start(
            "registry",
            root,
            !options.flat,
            options.error_rate,
            RegistryIndex::load,
        )?;
        Ok(Self { inner })
    }

    pub fn index(&self) -> Arc<RegistryIndex> {
        self.inner.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation()
    }

    pub fn root(&self) -> &Path {
        self.inner.root()
    }
}

impl std::fmt::Debug for RegistryAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryAgent")
            .field("root", &self.root())
            .field("generation", &self.generation())
            .finish()
    }
}
