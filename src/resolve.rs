//! Mapping a line of pipeline configuration to the registry file it names.
//!
//! The step registry lays files out by splitting an element name on hyphens:
//! `ref: ipi-install` lives at `<registry>/ipi/install/ipi-install-ref.yaml`.
//! Lines are matched as flat `key: value` text rather than parsed as YAML, so
//! quoted values, multi-line scalars and flow mappings are not understood.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Mapping keys that name a registry element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReferenceKey {
    Workflow,
    Chain,
    Ref,
    Commands,
}

impl ReferenceKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKey::Workflow => "workflow",
            ReferenceKey::Chain => "chain",
            ReferenceKey::Ref => "ref",
            ReferenceKey::Commands => "commands",
        }
    }

    /// File extension of the element this key points at.
    pub fn extension(&self) -> &'static str {
        match self {
            ReferenceKey::Commands => ".sh",
            _ => ".yaml",
        }
    }
}

impl FromStr for ReferenceKey {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "workflow" => Ok(ReferenceKey::Workflow),
            "chain" => Ok(ReferenceKey::Chain),
            "ref" => Ok(ReferenceKey::Ref),
            "commands" => Ok(ReferenceKey::Commands),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ReferenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registry reference found on a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub key: ReferenceKey,
    /// Name components, already stripped of the script suffix for `commands`.
    pub components: Vec<String>,
}

impl Reference {
    /// Parse a `key: value` line.
    ///
    /// Returns `None` when the line has no colon or its key is not one of
    /// `workflow`, `chain`, `ref`, `commands`. A leading list-item hyphen is
    /// ignored, so `- ref: foo` matches.
    pub fn parse_line(line: &str) -> Option<Reference> {
        let (key, value) = line.split_once(':')?;
        let key = key.trim().trim_start_matches('-').trim();
        let key: ReferenceKey = key.parse().ok()?;

        let mut components: Vec<String> = value.trim().split('-').map(str::to_string).collect();
        if key == ReferenceKey::Commands {
            // `commands: foo-bar-commands.sh` names the script by its owning ref
            components.pop();
        }
        Some(Reference { key, components })
    }

    /// Directory holding the element, relative to the registry root.
    pub fn directory(&self, registry_root: &Path) -> PathBuf {
        let mut dir = registry_root.to_path_buf();
        for component in self.components.iter().filter(|c| !c.is_empty()) {
            dir.push(component);
        }
        dir
    }

    /// File name: `<components joined by '-'>-<key><ext>`.
    pub fn file_name(&self) -> String {
        let mut parts: Vec<&str> = self.components.iter().map(String::as_str).collect();
        parts.push(self.key.as_str());
        format!("{}{}", parts.join("-"), self.key.extension())
    }

    pub fn target(&self, registry_root: &Path) -> PathBuf {
        self.directory(registry_root).join(self.file_name())
    }
}

/// Resolves the definition target for a cursor line.
///
/// `Ok(None)` means there is nothing to jump to on that line; errors are
/// reserved for requests that cannot be answered at all.
pub trait DefinitionResolver: Send + Sync {
    fn resolve(&self, lines: &[String], line: usize, registry_root: &Path)
        -> Result<Option<PathBuf>>;
}

/// The `key: value` line heuristic.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineResolver;

impl DefinitionResolver for LineResolver {
    fn resolve(
        &self,
        lines: &[String],
        line: usize,
        registry_root: &Path,
    ) -> Result<Option<PathBuf>> {
        let text = lines.get(line).ok_or(Error::LineOutOfRange {
            line,
            len: lines.len(),
        })?;
        Ok(Reference::parse_line(text).map(|reference| reference.target(registry_root)))
    }
}
