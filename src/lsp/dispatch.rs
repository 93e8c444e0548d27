//! Request handlers, independent of the transport.

use tower_lsp::lsp_types::*;
use tracing::{debug, info};

use super::placeholder;
use crate::document;
use crate::error::{Error, Result};
use crate::resolve::{DefinitionResolver, LineResolver};
use crate::session::SessionState;

/// Capabilities advertised in reply to `initialize`.
pub fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        definition_provider: Some(OneOf::Left(true)),
        hover_provider: Some(HoverProviderCapability::Options(HoverOptions::default())),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec!["-".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub struct Dispatcher {
    state: SessionState,
    resolver: Box<dyn DefinitionResolver>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_resolver(LineResolver)
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: impl DefinitionResolver + 'static) -> Self {
        Self {
            state: SessionState::new(),
            resolver: Box::new(resolver),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn initialize(&self, params: &InitializeParams) -> Result<InitializeResult> {
        self.state
            .initialize(params.workspace_folders.as_deref())?;
        Ok(InitializeResult {
            capabilities: server_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    /// Jump from a registry reference to the file defining it.
    ///
    /// Only the cursor line matters; the column is ignored.
    pub fn definition(
        &self,
        params: &GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let session = self.state.ready()?;
        let position = &params.text_document_position_params;
        let lines = document::read_lines(&position.text_document.uri)?;

        let target = self.resolver.resolve(
            &lines,
            position.position.line as usize,
            session.registry_root(),
        )?;
        let Some(target) = target else {
            debug!(
                uri = %position.text_document.uri,
                line = position.position.line,
                "no registry reference on line"
            );
            return Ok(None);
        };

        let uri = Url::from_file_path(&target).map_err(|_| Error::TargetPath(target.clone()))?;
        info!(
            uri = %position.text_document.uri,
            line = position.position.line,
            target = %target.display(),
            "resolved definition"
        );
        Ok(Some(GotoDefinitionResponse::Array(vec![Location {
            uri,
            range: Range::default(),
        }])))
    }

    pub fn hover(&self, params: &HoverParams) -> Hover {
        let position = &params.text_document_position_params;
        match self.state.get() {
            Some(session) => debug!(
                uri = %position.text_document.uri,
                line = position.position.line,
                character = position.position.character,
                config_generation = session.config_agent().generation(),
                registry_generation = session.registry_agent().generation(),
                "hover"
            ),
            None => debug!(uri = %position.text_document.uri, "hover before initialize"),
        }
        placeholder::hover()
    }

    pub fn completion(&self, params: &CompletionParams) -> CompletionResponse {
        debug!(
            uri = %params.text_document_position.text_document.uri,
            line = params.text_document_position.position.line,
            "completion"
        );
        placeholder::completion()
    }

    /// Check the document is readable; never edits it.
    pub fn formatting(&self, params: &DocumentFormattingParams) -> Result<Vec<TextEdit>> {
        debug!(uri = %params.text_document.uri, "formatting");
        document::read_lines(&params.text_document.uri)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;

    struct Workspace {
        dir: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn path(&self) -> &Path {
            self.dir.path()
        }

        fn write(&self, relative: &str, content: &str) -> Url {
            let path = self.path().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            Url::from_file_path(path).unwrap()
        }

        fn initialize_params(&self) -> InitializeParams {
            InitializeParams {
                workspace_folders: Some(vec![WorkspaceFolder {
                    uri: Url::from_file_path(self.path()).unwrap(),
                    name: "release".to_string(),
                }]),
                ..Default::default()
            }
        }
    }

    fn position(uri: &Url, line: u32, character: u32) -> TextDocumentPositionParams {
        TextDocumentPositionParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            position: Position { line, character },
        }
    }

    fn definition_params(uri: &Url, line: u32) -> GotoDefinitionParams {
        GotoDefinitionParams {
            text_document_position_params: position(uri, line, 4),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        }
    }

    fn ready_dispatcher(workspace: &Workspace) -> Dispatcher {
        let dispatcher = Dispatcher::new();
        dispatcher
            .initialize(&workspace.initialize_params())
            .unwrap();
        dispatcher
    }

    fn target_path(response: Option<GotoDefinitionResponse>) -> PathBuf {
        match response {
            Some(GotoDefinitionResponse::Array(locations)) => {
                assert_eq!(locations.len(), 1);
                locations[0].uri.to_file_path().unwrap()
            }
            other => panic!("unexpected definition response: {other:?}"),
        }
    }

    #[test]
    fn advertises_fixed_capabilities() {
        let workspace = Workspace::new();
        let result = Dispatcher::new()
            .initialize(&workspace.initialize_params())
            .unwrap();
        let caps = serde_json::to_value(&result.capabilities).unwrap();
        assert_eq!(caps["definitionProvider"], serde_json::json!(true));
        assert_eq!(caps["hoverProvider"], serde_json::json!({}));
        assert_eq!(
            caps["completionProvider"]["triggerCharacters"],
            serde_json::json!(["-"])
        );
        assert_eq!(result.server_info.unwrap().name, "step-registry-lsp");
    }

    #[test]
    fn failed_initialize_leaves_session_empty() {
        let dispatcher = Dispatcher::new();
        let err = dispatcher
            .initialize(&InitializeParams::default())
            .unwrap_err();
        assert!(err.is_fatal_initialization());
        assert!(!dispatcher.state().is_ready());
    }

    #[test]
    fn definition_resolves_ref() {
        let workspace = Workspace::new();
        let doc = workspace.write(
            "ci-operator/config/org/repo/org-repo-main.yaml",
            "tests:\n- as: e2e\n  steps:\n    test:\n    - ref: e2e-aws\n",
        );
        let dispatcher = ready_dispatcher(&workspace);

        let response = dispatcher.definition(&definition_params(&doc, 4)).unwrap();
        assert_eq!(
            target_path(response),
            workspace
                .path()
                .join("ci-operator/step-registry/e2e/aws/e2e-aws-ref.yaml")
        );
    }

    #[test]
    fn definition_resolves_commands_script() {
        let workspace = Workspace::new();
        let doc = workspace.write(
            "ci-operator/step-registry/ipi/deprovision/deprovision/ipi-deprovision-deprovision-ref.yaml",
            "ref:\n  as: ipi-deprovision-deprovision\n  commands: ipi-deprovision-deprovision-commands.sh\n",
        );
        let dispatcher = ready_dispatcher(&workspace);

        let response = dispatcher.definition(&definition_params(&doc, 2)).unwrap();
        assert_eq!(
            target_path(response),
            workspace.path().join(
                "ci-operator/step-registry/ipi/deprovision/deprovision/ipi-deprovision-deprovision-commands.sh"
            )
        );
    }

    #[test]
    fn definition_tolerates_non_utf8_documents() {
        let workspace = Workspace::new();
        let path = workspace.path().join("latin1.yaml");
        std::fs::write(&path, b"# caf\xe9\n- ref: e2e-aws\n").unwrap();
        let doc = Url::from_file_path(&path).unwrap();
        let dispatcher = ready_dispatcher(&workspace);

        let response = dispatcher.definition(&definition_params(&doc, 1)).unwrap();
        assert_eq!(
            target_path(response),
            workspace
                .path()
                .join("ci-operator/step-registry/e2e/aws/e2e-aws-ref.yaml")
        );
    }

    #[test]
    fn definition_without_reference_is_empty() {
        let workspace = Workspace::new();
        let doc = workspace.write("config.yaml", "tests:\n- as: e2e\n");
        let dispatcher = ready_dispatcher(&workspace);

        assert!(dispatcher
            .definition(&definition_params(&doc, 1))
            .unwrap()
            .is_none());
    }

    #[test]
    fn definition_before_initialize_is_rejected() {
        let workspace = Workspace::new();
        let doc = workspace.write("config.yaml", "- ref: e2e-aws\n");
        let err = Dispatcher::new()
            .definition(&definition_params(&doc, 0))
            .unwrap_err();
        assert!(matches!(err, Error::NotInitialized));
    }

    #[test]
    fn definition_propagates_read_failures() {
        let workspace = Workspace::new();
        let dispatcher = ready_dispatcher(&workspace);
        let missing = Url::from_file_path(workspace.path().join("missing.yaml")).unwrap();

        let err = dispatcher
            .definition(&definition_params(&missing, 0))
            .unwrap_err();
        assert!(matches!(err, Error::ReadDocument { .. }));
        assert!(dispatcher.state().is_ready());
    }

    #[test]
    fn custom_resolver_is_used() {
        struct Fixed;
        impl DefinitionResolver for Fixed {
            fn resolve(
                &self,
                _lines: &[String],
                _line: usize,
                registry_root: &Path,
            ) -> Result<Option<PathBuf>> {
                Ok(Some(registry_root.join("fixed.yaml")))
            }
        }

        let workspace = Workspace::new();
        let doc = workspace.write("config.yaml", "anything\n");
        let dispatcher = Dispatcher::with_resolver(Fixed);
        dispatcher
            .initialize(&workspace.initialize_params())
            .unwrap();

        let response = dispatcher.definition(&definition_params(&doc, 0)).unwrap();
        assert_eq!(
            target_path(response),
            workspace.path().join("ci-operator/step-registry/fixed.yaml")
        );
    }

    #[test]
    fn hover_and_completion_are_placeholders() {
        let workspace = Workspace::new();
        let doc = workspace.write("config.yaml", "- ref: e2e-aws\n");
        let dispatcher = Dispatcher::new();

        let hover = dispatcher.hover(&HoverParams {
            text_document_position_params: position(&doc, 0, 3),
            work_done_progress_params: Default::default(),
        });
        assert_eq!(hover, placeholder::hover());

        let completion = dispatcher.completion(&CompletionParams {
            text_document_position: position(&doc, 0, 7),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        });
        assert_eq!(completion, placeholder::completion());
    }

    #[test]
    fn formatting_reads_but_never_edits() {
        let workspace = Workspace::new();
        let doc = workspace.write("config.yaml", "- ref:   e2e-aws\n");
        let dispatcher = Dispatcher::new();

        let params = |uri: Url| DocumentFormattingParams {
            text_document: TextDocumentIdentifier { uri },
            options: FormattingOptions {
                tab_size: 2,
                insert_spaces: true,
                properties: Default::default(),
                trim_trailing_whitespace: None,
                insert_final_newline: None,
                trim_final_newlines: None,
            },
            work_done_progress_params: Default::default(),
        };
        assert!(dispatcher.formatting(&params(doc)).unwrap().is_empty());

        let missing = Url::from_file_path(workspace.path().join("missing.yaml")).unwrap();
        assert!(matches!(
            dispatcher.formatting(&params(missing)),
            Err(Error::ReadDocument { .. })
        ));
    }
}
