use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;

/// Logs go to stderr; stdout carries command output and the serve protocol.
pub fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Human => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if let Err(err) = installed {
        eprintln!("GROKSCOPE: tracing already initialized: {err}");
    }
}
