use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};
use tracing::{debug, error, info, warn};

use crate::config::{CHECK_DELAY_MS, HOVER_DELAY_MS, Settings, WorkspaceSettings};
use crate::ghcmod::error::SessionError;
use crate::ghcmod::session::{GhcModSession, SessionOptions};
use crate::provider::GhcModProvider;
use crate::throttle::{DelayerRegistry, ThrottledDelayer};

pub struct Backend {
    client: Client,
    settings: std::sync::Mutex<Settings>,
    /// Full text of every open document, unsaved edits included.
    documents: std::sync::Mutex<HashMap<Url, String>>,
    /// Built at `initialize` once the analysis root is known.
    provider: tokio::sync::RwLock<Option<Arc<GhcModProvider>>>,
    /// One delayer per document URI; every keystroke burst coalesces into a
    /// single check.
    check_delayers: DelayerRegistry<()>,
    /// A single delayer shared by all hover requests; only the latest hover
    /// matters.
    hover_delayer: ThrottledDelayer<Option<Hover>>,
    /// A missing executable is reported to the user once, not per command.
    spawn_failure_reported: Arc<AtomicBool>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::build(client, Settings::default())
    }

    pub fn build(client: Client, settings: Settings) -> Self {
        Self {
            client,
            settings: std::sync::Mutex::new(settings),
            documents: std::sync::Mutex::new(HashMap::new()),
            provider: tokio::sync::RwLock::new(None),
            check_delayers: DelayerRegistry::new(Duration::from_millis(CHECK_DELAY_MS)),
            hover_delayer: ThrottledDelayer::new(Duration::from_millis(HOVER_DELAY_MS)),
            spawn_failure_reported: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn server_capabilities() -> ServerCapabilities {
        ServerCapabilities {
            text_document_sync: Some(TextDocumentSyncCapability::Kind(
                TextDocumentSyncKind::FULL,
            )),
            hover_provider: Some(HoverProviderCapability::Simple(true)),
            definition_provider: Some(OneOf::Left(true)),
            ..Default::default()
        }
    }

    fn current_settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    fn document_text(&self, uri: &Url) -> Option<String> {
        self.documents.lock().unwrap().get(uri).cloned()
    }

    async fn current_provider(&self) -> Option<Arc<GhcModProvider>> {
        self.provider.read().await.clone()
    }

    /// Debounced re-check of one document; the latest buffered text at
    /// trigger time wins.
    async fn schedule_check(&self, uri: Url) {
        let Some(provider) = self.current_provider().await else {
            warn!("Check requested before initialize; ignoring");
            return;
        };
        let Some(text) = self.document_text(&uri) else {
            return;
        };
        let client = self.client.clone();
        let reported = Arc::clone(&self.spawn_failure_reported);
        let max_problems = self.current_settings().max_number_of_problems;

        let delayer = self.check_delayers.delayer(uri.as_str());
        let check = delayer.trigger(move || async move {
            match provider.do_check(&text, &uri, true).await {
                Ok(mut diagnostics) => {
                    diagnostics.truncate(max_problems);
                    debug!(
                        "Publishing {} diagnostics for {}",
                        diagnostics.len(),
                        uri
                    );
                    client.publish_diagnostics(uri, diagnostics, None).await;
                }
                Err(e) => report_session_error(&client, &reported, &e).await,
            }
        });
        drop(check);
    }

    async fn info_or_type_tooltip(
        provider: Arc<GhcModProvider>,
        client: Client,
        reported: Arc<AtomicBool>,
        text: String,
        uri: Url,
        position: Position,
    ) -> Option<Hover> {
        let info = provider.get_info(&text, &uri, position, true).await;
        let tooltip = match info {
            Ok(tooltip) if !tooltip.is_empty() => tooltip,
            Ok(_) => match provider.get_type(&text, &uri, position, true).await {
                Ok(tooltip) => tooltip,
                Err(e) => {
                    report_session_error(&client, &reported, &e).await;
                    return None;
                }
            },
            Err(e) => {
                report_session_error(&client, &reported, &e).await;
                return None;
            }
        };

        if tooltip.is_empty() {
            return None;
        }
        Some(Hover {
            contents: HoverContents::Scalar(MarkedString::String(tooltip)),
            range: None,
        })
    }
}

/// Logs a session failure; a spawn failure is additionally surfaced to the
/// user, once.
async fn report_session_error(client: &Client, reported: &AtomicBool, e: &SessionError) {
    error!("ghc-mod command failed: {}", e);
    if matches!(e, SessionError::Spawn { .. }) && !reported.swap(true, Ordering::SeqCst) {
        client
            .show_message(
                MessageType::ERROR,
                format!("ghc-mod could not be started: {e}"),
            )
            .await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.client
            .log_message(MessageType::INFO, "ghcmod-lsp initializing")
            .await;

        if let Some(options) = params.initialization_options {
            match serde_json::from_value::<Settings>(options) {
                Ok(settings) => *self.settings.lock().unwrap() = settings,
                Err(e) => warn!("Ignoring malformed initialization options: {}", e),
            }
        }

        #[allow(deprecated)]
        let root = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri.to_file_path().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let settings = self.current_settings();
        let session = GhcModSession::new(SessionOptions {
            executable: settings.executable_path.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        });
        let provider = Arc::new(GhcModProvider::new(Arc::new(session), root));
        *self.provider.write().await = Some(provider);

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(),
            server_info: Some(ServerInfo {
                name: "ghcmod-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "ghcmod-lsp initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.client
            .log_message(MessageType::INFO, "ghcmod-lsp shutting down")
            .await;
        if let Some(provider) = self.current_provider().await {
            provider.shutdown().await;
        }
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("Document opened: {}", uri);
        self.documents
            .lock()
            .unwrap()
            .insert(uri.clone(), params.text_document.text);
        self.schedule_check(uri).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        // Full sync: the last change carries the entire document.
        let Some(change) = params.content_changes.into_iter().next_back() else {
            return;
        };
        self.documents
            .lock()
            .unwrap()
            .insert(uri.clone(), change.text);
        self.schedule_check(uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        debug!("Document closed: {}", uri);
        self.documents.lock().unwrap().remove(&uri);
        self.check_delayers.remove(uri.as_str());
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        match serde_json::from_value::<WorkspaceSettings>(params.settings) {
            Ok(workspace) => {
                info!("Settings updated");
                *self.settings.lock().unwrap() = workspace.ghc_mod;
            }
            Err(e) => {
                warn!("Ignoring malformed configuration: {}", e);
                return;
            }
        }

        // Revalidate every open document under the new settings.
        let uris: Vec<Url> = self.documents.lock().unwrap().keys().cloned().collect();
        for uri in uris {
            self.schedule_check(uri).await;
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(provider) = self.current_provider().await else {
            return Ok(None);
        };
        let Some(text) = self.document_text(&uri) else {
            return Ok(None);
        };
        let client = self.client.clone();
        let reported = Arc::clone(&self.spawn_failure_reported);

        let hover = self
            .hover_delayer
            .trigger(move || {
                Self::info_or_type_tooltip(provider, client, reported, text, uri, position)
            })
            .await;
        Ok(hover.flatten())
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(provider) = self.current_provider().await else {
            return Ok(None);
        };
        let Some(text) = self.document_text(&uri) else {
            return Ok(None);
        };

        match provider.get_definition_location(&text, &uri, position).await {
            Ok(locations) if locations.is_empty() => Ok(None),
            Ok(locations) => Ok(Some(GotoDefinitionResponse::Array(locations))),
            Err(e) => {
                report_session_error(&self.client, &self.spawn_failure_reported, &e).await;
                Ok(None)
            }
        }
    }
}
