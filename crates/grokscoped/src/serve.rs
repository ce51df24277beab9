use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use grokscope_core::{Annotation, NavEntry, QueryType, ViewportId};
use grokscope_search::{SearchBackend, SearchRequest, spawn_keepalive};
use grokscope_session::{HostIntent, Session, SessionError};
use grokscope_store::AnnotationStore;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// One editor command, read as a single JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Query {
        query_type: String,
        term: String,
        #[serde(default)]
        fuzzy: bool,
        #[serde(default)]
        project: Option<String>,
        #[serde(default)]
        origin: Option<NavEntry>,
    },
    Goto {
        viewport: ViewportId,
        index: usize,
    },
    GotoRow {
        viewport: ViewportId,
        lines: Vec<String>,
        row: usize,
    },
    Cancel,
    JumpBack {
        viewport: ViewportId,
    },
    OpenFile {
        file: PathBuf,
    },
    EditAnnotation {
        file: PathBuf,
        line: usize,
        #[serde(default)]
        note: String,
        #[serde(default)]
        tags: Vec<String>,
    },
    AnnotationAt {
        file: PathBuf,
        line: usize,
    },
    NextAnnotation {
        viewport: ViewportId,
        path: String,
        line: usize,
        #[serde(default)]
        column: usize,
    },
    RegisterStyle {
        tag: String,
        glyph: String,
        highlight: String,
    },
    SetBasePath {
        path: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub intents: Vec<HostIntent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn intents(intents: Vec<HostIntent>) -> Self {
        Self {
            ok: true,
            intents,
            annotation: None,
            error: None,
        }
    }

    /// Failures are reported twice: in `error` for the glue, and as a message
    /// intent for the user.
    fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            ok: false,
            intents: vec![HostIntent::error(message.clone())],
            annotation: None,
            error: Some(message),
        }
    }
}

pub struct Server<S> {
    session: Session<S>,
    backend: Option<Arc<dyn SearchBackend>>,
}

impl<S: AnnotationStore> Server<S> {
    pub fn new(session: Session<S>, backend: Option<Arc<dyn SearchBackend>>) -> Self {
        Self { session, backend }
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    /// Parses and answers one protocol line. Malformed input yields an error
    /// response rather than ending the loop.
    pub async fn handle_line(&mut self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request).await,
            Err(err) => {
                tracing::debug!(error = %err, "malformed request line");
                Response::failed(format!("invalid request: {err}"))
            }
        }
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "request failed");
                Response::failed(err.to_string())
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Response, SessionError> {
        let intents = match request {
            Request::Query {
                query_type,
                term,
                fuzzy,
                project,
                origin,
            } => {
                let query_type = match query_type.parse::<QueryType>() {
                    Ok(query_type) => query_type,
                    Err(err) => return Ok(Response::failed(err)),
                };
                let Some(backend) = self.backend.clone() else {
                    return Err(SessionError::NotConfigured("server.address"));
                };
                let request = SearchRequest {
                    query_type,
                    term,
                    fuzzy,
                    project,
                };
                self.session
                    .run_query(backend.as_ref(), &request, origin)
                    .await?
            }
            Request::Goto { viewport, index } => self.session.goto_result(viewport, index)?,
            Request::GotoRow {
                viewport,
                lines,
                row,
            } => self.session.goto_row(viewport, &lines, row)?,
            Request::Cancel => self.session.cancel_query(),
            Request::JumpBack { viewport } => self.session.jump_back(viewport)?,
            Request::OpenFile { file } => self.session.open_file(&file)?,
            Request::EditAnnotation {
                file,
                line,
                note,
                tags,
            } => self.session.edit_annotation(&file, line, &note, &tags)?,
            Request::AnnotationAt { file, line } => {
                let mut response = Response::intents(Vec::new());
                response.annotation = self.session.annotation_at(&file, line)?;
                return Ok(response);
            }
            Request::NextAnnotation {
                viewport,
                path,
                line,
                column,
            } => self
                .session
                .next_annotation(viewport, NavEntry::new(path, line, column))?,
            Request::RegisterStyle {
                tag,
                glyph,
                highlight,
            } => {
                self.session.register_style(&tag, &glyph, &highlight)?;
                Vec::new()
            }
            Request::SetBasePath { path } => {
                self.session.set_base_path(path);
                Vec::new()
            }
        };

        Ok(Response::intents(intents))
    }
}

/// Answers requests from stdin until it closes, one JSON response line each.
pub async fn run_stdio<S: AnnotationStore>(
    mut server: Server<S>,
    keepalive_interval: Duration,
) -> Result<()> {
    let keepalive = match (&server.backend, keepalive_interval.is_zero()) {
        (Some(backend), false) => Some(spawn_keepalive(backend.clone(), keepalive_interval)),
        _ => None,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!("serving requests on stdio");

    let result: Result<()> = async {
        while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
            if line.trim().is_empty() {
                continue;
            }

            let response = server.handle_line(&line).await;
            let mut encoded =
                serde_json::to_vec(&response).context("failed to encode response")?;
            encoded.push(b'\n');
            stdout
                .write_all(&encoded)
                .await
                .context("failed to write stdout")?;
            stdout.flush().await.context("failed to flush stdout")?;
        }
        Ok(())
    }
    .await;

    if let Some(handle) = keepalive {
        handle.abort();
    }
    tracing::info!("stdin closed, shutting down");
    result
}
