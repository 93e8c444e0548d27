//! tower-lsp based Language Server implementation.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{error, info, warn};

use super::dispatch::Dispatcher;

pub struct Backend {
    client: Client,
    dispatcher: Dispatcher,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            dispatcher: Dispatcher::new(),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.dispatcher.initialize(&params).map_err(|err| {
            error!(%err, "initialize failed");
            err.into()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        info!("client initialized");
        self.client
            .log_message(MessageType::INFO, "step registry server ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        info!("shutdown requested");
        Ok(())
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        self.dispatcher.definition(&params).map_err(|err| {
            warn!(%err, "definition failed");
            err.into()
        })
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        Ok(Some(self.dispatcher.hover(&params)))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(Some(self.dispatcher.completion(&params)))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        self.dispatcher
            .formatting(&params)
            .map(Some)
            .map_err(|err| {
                warn!(%err, "formatting failed");
                err.into()
            })
    }
}

async fn serve<I, O>(input: I, output: O)
where
    I: AsyncRead + Unpin,
    O: AsyncWrite,
{
    let (service, socket) = LspService::new(Backend::new);
    Server::new(input, output, socket).serve(service).await;
}

/// Start the LSP server on stdio.
pub async fn serve_stdio() {
    info!("serving on stdio");
    serve(tokio::io::stdin(), tokio::io::stdout()).await;
}

/// Accept a single editor connection on `addr` and serve it.
pub async fn serve_tcp(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "waiting for editor connection");
    let (stream, peer) = listener.accept().await?;
    info!(%peer, "editor connected");

    let (read, write) = tokio::io::split(stream);
    serve(read, write).await;
    Ok(())
}
