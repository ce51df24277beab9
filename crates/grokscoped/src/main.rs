use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use grokscope_config::{database_path, ensure_config, validate_config};
use grokscope_search::SearchBackend;
use grokscope_session::Session;
use grokscope_store::SqliteAnnotationStore;
use grokscoped::cli::{Cli, Commands, parse_cli};
use grokscoped::commands::{
    build_backend, run_annotate_command, run_notes_command, run_ping_command,
    run_search_command,
};
use grokscoped::logging::init_tracing;
use grokscoped::serve::{Server, run_stdio};

fn main() -> Result<()> {
    let cli = parse_cli();
    init_tracing(cli.log_format);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("failed to resolve root path {}", cli.root.display()))?;

    let config = ensure_config(&root).with_context(|| {
        format!(
            "failed to load or create config at {}",
            root.join(".grokscope/config.toml").display()
        )
    })?;
    for warning in validate_config(&config) {
        tracing::warn!(code = warning.code, "config warning: {}", warning.message);
    }

    let open_store = || {
        let path = database_path(&root, &config);
        SqliteAnnotationStore::open(&path)
            .with_context(|| format!("failed to open annotation store {}", path.display()))
    };

    let mut out = std::io::stdout();
    match cli.command {
        Commands::Search(args) => run_search_command(&config.server, args, &mut out).await,
        Commands::Annotate(args) => run_annotate_command(&open_store()?, args, &mut out),
        Commands::Notes(args) => run_notes_command(&open_store()?, args, &mut out),
        Commands::Ping => run_ping_command(&config.server, &mut out).await,
        Commands::Serve => {
            let backend = match build_backend(&config.server).await {
                Ok(Some(client)) => Some(Arc::new(client) as Arc<dyn SearchBackend>),
                Ok(None) => {
                    tracing::warn!("server.address is not configured; queries will fail");
                    None
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    tracing::error!(error = %message, "search server unavailable");
                    None
                }
            };

            let session = Session::from_config(open_store()?, &config);
            let keepalive = Duration::from_secs(config.server.keepalive_interval_secs);
            run_stdio(Server::new(session, backend), keepalive)
                .await
                .context("serve loop exited with error")
        }
    }
}
