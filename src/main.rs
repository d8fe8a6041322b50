use std::path::PathBuf;

use clap::Parser;

use ghcmod_lsp::config::Settings;
use ghcmod_lsp::lsp::server::run_server;

/// A Language Server Protocol implementation for Haskell powered by ghc-mod.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the ghc-mod executable (also configurable via LSP settings).
    #[arg(long, value_name = "PATH")]
    ghc_mod: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::default();
    if let Some(executable) = cli.ghc_mod {
        settings.executable_path = executable;
    }

    run_server(settings).await
}
