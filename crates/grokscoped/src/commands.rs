use std::io::Write;

use anyhow::{Context, Result, anyhow};
use grokscope_config::ServerConfig;
use grokscope_core::QueryType;
use grokscope_search::{
    ClientSettings, OpenGrokClient, SearchBackend, SearchRequest, flatten_results,
};
use grokscope_store::{AnnotationStore, SqliteAnnotationStore, canonical_path};
use serde_json::json;

use crate::cli::{AnnotateArgs, NotesArgs, SearchArgs};

/// Client for the configured server, or `None` when no address is set.
pub async fn build_backend(config: &ServerConfig) -> Result<Option<OpenGrokClient>> {
    let Some(address) = config.address.as_deref() else {
        return Ok(None);
    };

    let client = OpenGrokClient::connect(
        address,
        ClientSettings::from_config(config),
        config.verify_on_connect,
    )
    .await
    .with_context(|| format!("failed to init search client for {address}"))?;
    Ok(Some(client))
}

async fn require_backend(config: &ServerConfig) -> Result<OpenGrokClient> {
    build_backend(config)
        .await?
        .ok_or_else(|| anyhow!("server.address is not configured in .grokscope/config.toml"))
}

pub async fn run_search_command(
    config: &ServerConfig,
    args: SearchArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let client = require_backend(config).await?;
    let request = SearchRequest {
        query_type: args.query_type,
        term: args.term,
        fuzzy: args.fuzzy,
        project: args.project,
    };

    let results = client.search(&request).await.context("search failed")?;
    let locations = flatten_results(results);
    if locations.is_empty() {
        writeln!(out, "No results.")?;
        return Ok(());
    }

    for location in &locations {
        if request.query_type == QueryType::Path {
            writeln!(out, "{}:{}", location.path, location.line_number)?;
        } else {
            writeln!(out, "{}", location.truncated_display())?;
        }
    }
    Ok(())
}

pub fn run_annotate_command(
    store: &SqliteAnnotationStore,
    args: AnnotateArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let outcome = store
        .upsert(&args.file, args.line, &args.note, &args.tags)
        .with_context(|| format!("failed to annotate {}:{}", args.file.display(), args.line))?;

    let response = json!({
        "file": canonical_path(&args.file)?,
        "line": args.line,
        "outcome": outcome.as_str(),
    });
    write_json(out, &response)
}

pub fn run_notes_command(
    store: &SqliteAnnotationStore,
    args: NotesArgs,
    out: &mut dyn Write,
) -> Result<()> {
    let annotations = store
        .get(&args.file)
        .with_context(|| format!("failed to read annotations for {}", args.file.display()))?;
    write_json(out, &json!({ "annotations": annotations }))
}

pub async fn run_ping_command(config: &ServerConfig, out: &mut dyn Write) -> Result<()> {
    let client = require_backend(config).await?;
    client
        .verify()
        .await
        .with_context(|| format!("{} did not answer", client.api_base()))?;
    writeln!(out, "OK {}", client.api_base())?;
    Ok(())
}

fn write_json(out: &mut dyn Write, value: &serde_json::Value) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
