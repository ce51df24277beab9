use std::ffi::OsStr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use grokscope_core::QueryType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid log format '{other}', expected one of: human, json"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SearchArgs {
    #[arg(
        value_parser = parse_query_type,
        help = "Query type: def (g, d), file (f, path) or sym (s)"
    )]
    pub query_type: QueryType,

    #[arg(help = "Term to search for")]
    pub term: String,

    #[arg(long, help = "Match the term anywhere inside a token")]
    pub fuzzy: bool,

    #[arg(long, help = "Restrict the search to one project")]
    pub project: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AnnotateArgs {
    #[arg(help = "File to annotate")]
    pub file: PathBuf,

    #[arg(help = "1-based line number")]
    pub line: usize,

    #[arg(long, default_value = "", help = "Note text; empty together with no tags deletes")]
    pub note: String,

    #[arg(
        long,
        value_delimiter = ',',
        value_name = "TAG",
        help = "Optional comma-separated tags"
    )]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct NotesArgs {
    #[arg(help = "File whose annotations are listed")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Serve editor requests as JSON lines on stdin/stdout
    Serve,
    /// Run one search against the configured server
    Search(SearchArgs),
    /// Create, update or delete the annotation on one line
    Annotate(AnnotateArgs),
    /// List the annotations of a file as JSON
    Notes(NotesArgs),
    /// Check that the configured server answers
    Ping,
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about = "Source search navigation and line annotations")]
pub struct Cli {
    #[arg(
        long,
        global = true,
        default_value = ".",
        help = "Directory holding .grokscope/config.toml and the annotation database"
    )]
    pub root: PathBuf,

    #[arg(
        long,
        global = true,
        default_value = "human",
        value_parser = parse_log_format,
        help = "Log format: human or json"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

pub fn parse_cli() -> Cli {
    let mut args: Vec<_> = std::env::args_os().collect();
    if args.get(1).is_some_and(|arg| arg == OsStr::new("--")) {
        args.remove(1);
    }

    Cli::parse_from(args)
}

fn parse_query_type(value: &str) -> Result<QueryType, String> {
    value.parse()
}

fn parse_log_format(value: &str) -> Result<LogFormat, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn search_accepts_query_type_aliases() {
        let cli = Cli::try_parse_from(["grokscoped", "search", "g", "schedule", "--fuzzy"])
            .expect("search should parse");

        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.query_type, QueryType::Definition);
        assert_eq!(args.term, "schedule");
        assert!(args.fuzzy);
        assert_eq!(args.project, None);
    }

    #[test]
    fn search_rejects_unknown_query_type() {
        assert!(Cli::try_parse_from(["grokscoped", "search", "grep", "x"]).is_err());
    }

    #[test]
    fn annotate_splits_tags_and_defaults_note() {
        let cli = Cli::try_parse_from([
            "grokscoped",
            "--root",
            "/tmp/work",
            "annotate",
            "src/main.c",
            "12",
            "--tags",
            "bug,todo",
        ])
        .expect("annotate should parse");

        assert_eq!(cli.root, PathBuf::from("/tmp/work"));
        let Commands::Annotate(args) = cli.command else {
            panic!("expected annotate command");
        };
        assert_eq!(args.line, 12);
        assert_eq!(args.note, "");
        assert_eq!(args.tags, vec!["bug".to_owned(), "todo".to_owned()]);
    }

    #[test]
    fn log_format_is_global() {
        let cli = Cli::try_parse_from(["grokscoped", "ping", "--log-format", "json"])
            .expect("ping should parse");
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.command, Commands::Ping);
    }
}
