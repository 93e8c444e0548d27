//! Session bootstrap: one workspace root, two watcher agents.
//!
//! A session starts uninitialized. The initialize handshake validates the
//! single workspace root offered by the editor, starts the config and
//! registry agents under it and publishes the result exactly once. Nothing
//! is published when any step fails, so a failed handshake leaves the
//! session uninitialized.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tower_lsp::lsp_types::WorkspaceFolder;
use tracing::info;

use crate::agents::{AgentOptions, ConfigAgent, ErrorRate, RegistryAgent};
use crate::error::{Error, Result};

/// Pipeline configuration, relative to the workspace root.
pub const CONFIG_DIR: &str = "ci-operator/config";
/// Step registry, relative to the workspace root.
pub const REGISTRY_DIR: &str = "ci-operator/step-registry";

/// State of an initialized session.
#[derive(Debug)]
pub struct Session {
    config_agent: ConfigAgent,
    registry_agent: RegistryAgent,
    registry_root: PathBuf,
}

impl Session {
    /// Start both agents under `workspace_root`.
    ///
    /// The derived directories are not required to exist.
    pub fn open(workspace_root: &Path, error_rate: &ErrorRate) -> Result<Self> {
        let config_root = workspace_root.join(CONFIG_DIR);
        let registry_root = workspace_root.join(REGISTRY_DIR);

        let config_agent = ConfigAgent::new(
            &config_root,
            AgentOptions::default().with_error_rate(error_rate.clone()),
        )?;
        let registry_agent = RegistryAgent::new(
            &registry_root,
            AgentOptions::default()
                .with_error_rate(error_rate.clone())
                .with_flat(false),
        )?;

        Ok(Self {
            config_agent,
            registry_agent,
            registry_root,
        })
    }

    pub fn config_agent(&self) -> &ConfigAgent {
        &self.config_agent
    }

    pub fn registry_agent(&self) -> &RegistryAgent {
        &self.registry_agent
    }

    pub fn registry_root(&self) -> &Path {
        &self.registry_root
    }
}

/// Validate the workspace folders offered by the editor and return the root.
///
/// Exactly one `file://` folder naming an existing path is accepted.
pub fn workspace_root(folders: Option<&[WorkspaceFolder]>) -> Result<PathBuf> {
    let folders = folders.ok_or(Error::MissingWorkspaceFolders)?;
    let [folder] = folders else {
        return Err(Error::WorkspaceFolderCount(folders.len()));
    };

    let uri = &folder.uri;
    if uri.scheme() != "file" {
        return Err(Error::WorkspaceUri(uri.to_string()));
    }
    let path = uri
        .to_file_path()
        .map_err(|_| Error::WorkspaceUri(uri.to_string()))?;

    if let Err(source) = std::fs::metadata(&path) {
        return Err(Error::WorkspaceRoot { path, source });
    }
    Ok(path)
}

/// Process-wide session slot, written once by a successful handshake.
#[derive(Default)]
pub struct SessionState {
    session: OnceLock<Session>,
    error_rate: ErrorRate,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the handshake and publish the session.
    ///
    /// Rejected once a session has been published.
    pub fn initialize(&self, folders: Option<&[WorkspaceFolder]>) -> Result<&Session> {
        if self.session.get().is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let root = workspace_root(folders)?;
        let session = Session::open(&root, &self.error_rate)?;
        // Two racing handshakes both get here; only the first publish wins.
        self.session
            .set(session)
            .map_err(|_| Error::AlreadyInitialized)?;

        info!(root = %root.display(), "session initialized");
        self.ready()
    }

    pub fn get(&self) -> Option<&Session> {
        self.session.get()
    }

    pub fn ready(&self) -> Result<&Session> {
        self.session.get().ok_or(Error::NotInitialized)
    }

    pub fn is_ready(&self) -> bool {
        self.session.get().is_some()
    }

    /// Load and watch errors across both agents.
    pub fn error_rate(&self) -> &ErrorRate {
        &self.error_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower_lsp::lsp_types::Url;

    fn folder(path: &Path) -> WorkspaceFolder {
        WorkspaceFolder {
            uri: Url::from_file_path(path).unwrap(),
            name: "release".to_string(),
        }
    }

    #[test]
    fn derives_data_directories() {
        let dir = tempfile::tempdir().unwrap();
        let state = SessionState::new();

        let session = state.initialize(Some(&[folder(dir.path())])).unwrap();
        assert_eq!(
            session.registry_root(),
            dir.path().join("ci-operator").join("step-registry")
        );
        assert_eq!(
            session.config_agent().root(),
            dir.path().join("ci-operator").join("config")
        );
        assert_eq!(session.registry_agent().root(), session.registry_root());
        assert!(state.is_ready());
    }

    #[test]
    fn missing_folder_list_is_rejected() {
        let state = SessionState::new();
        assert!(matches!(
            state.initialize(None),
            Err(Error::MissingWorkspaceFolders)
        ));
        assert!(!state.is_ready());
    }

    #[test]
    fn folder_count_must_be_one() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let state = SessionState::new();

        assert!(matches!(
            state.initialize(Some(&[])),
            Err(Error::WorkspaceFolderCount(0))
        ));
        assert!(matches!(
            state.initialize(Some(&[folder(a.path()), folder(b.path())])),
            Err(Error::WorkspaceFolderCount(2))
        ));
        assert!(state.get().is_none());
    }

    #[test]
    fn nonexistent_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = SessionState::new();
        let result = state.initialize(Some(&[folder(&dir.path().join("gone"))]));
        assert!(matches!(result, Err(Error::WorkspaceRoot { .. })));
        assert!(matches!(state.ready(), Err(Error::NotInitialized)));
    }

    #[test]
    fn non_file_uri_is_rejected() {
        let state = SessionState::new();
        let remote = WorkspaceFolder {
            uri: Url::parse("https://example.com/release").unwrap(),
            name: "release".to_string(),
        };
        assert!(matches!(
            state.initialize(Some(&[remote])),
            Err(Error::WorkspaceUri(_))
        ));
        assert!(!state.is_ready());
    }

    #[test]
    fn second_handshake_is_rejected() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let state = SessionState::new();

        state.initialize(Some(&[folder(first.path())])).unwrap();
        assert!(matches!(
            state.initialize(Some(&[folder(second.path())])),
            Err(Error::AlreadyInitialized)
        ));
        assert!(state
            .ready()
            .unwrap()
            .registry_root()
            .starts_with(first.path()));
    }

    #[test]
    fn populated_workspace_is_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let step = dir
            .path()
            .join(REGISTRY_DIR)
            .join("e2e")
            .join("aws");
        std::fs::create_dir_all(&step).unwrap();
        std::fs::write(step.join("e2e-aws-ref.yaml"), "ref:\n  as: e2e-aws\n").unwrap();
        let config = dir.path().join(CONFIG_DIR).join("org").join("repo");
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(config.join("org-repo-main.yaml"), "tests: []\n").unwrap();

        let state = SessionState::new();
        let session = state.initialize(Some(&[folder(dir.path())])).unwrap();
        assert_eq!(session.config_agent().index().len(), 1);
        assert!(session
            .registry_agent()
            .index()
            .lookup(crate::resolve::ReferenceKey::Ref, "e2e-aws")
            .is_some());
        assert_eq!(state.error_rate().count(), 0);
    }
}
