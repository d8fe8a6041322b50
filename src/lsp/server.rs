use tower_lsp::{LspService, Server};
use tracing::info;

use crate::config::Settings;
use crate::log::init;
use crate::lsp::backend::Backend;

pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    init()?;

    info!("Starting ghcmod-lsp server");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(|client| Backend::build(client, settings));
    Server::new(stdin, stdout, socket).serve(service).await;

    info!("ghcmod-lsp server stopped");
    Ok(())
}
