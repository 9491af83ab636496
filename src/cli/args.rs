//! Command line argument parsing for the neural-highlight CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// neural-highlight - inspect the semantic highlighting pipeline offline
#[derive(Parser, Debug, Clone)]
#[command(name = "neural-highlight")]
#[command(about = "Inspect how search requests and responses flow through semantic highlighting")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct NeuralHighlightArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Highlight settings file (JSON)
    #[arg(
        short,
        long,
        value_name = "SETTINGS_FILE",
        env = "NEURAL_HIGHLIGHT_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl NeuralHighlightArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the request the search engine would execute
    Split(RequestArgs),

    /// Print the resolved semantic highlight configs of a request
    Resolve(RequestArgs),

    /// Print the query text recovered from a request's query tree
    Extract(ExtractArgs),

    /// Merge highlight results into a search response
    Merge(MergeArgs),
}

/// Arguments for commands reading a single request
#[derive(Parser, Debug, Clone)]
pub struct RequestArgs {
    /// Search request file (JSON)
    #[arg(value_name = "REQUEST_FILE")]
    pub request_file: PathBuf,
}

/// Arguments for query text extraction
#[derive(Parser, Debug, Clone)]
pub struct ExtractArgs {
    /// Search request file (JSON)
    #[arg(value_name = "REQUEST_FILE")]
    pub request_file: PathBuf,

    /// Field the query text is extracted for
    #[arg(long)]
    pub field: String,
}

/// Arguments for merging results into a response
#[derive(Parser, Debug, Clone)]
pub struct MergeArgs {
    /// Plain search response file (JSON)
    #[arg(long, value_name = "RESPONSE_FILE")]
    pub response: PathBuf,

    /// Highlight results file (JSON array)
    #[arg(long, value_name = "RESULTS_FILE")]
    pub results: PathBuf,

    /// Took time to report; defaults to the response's own
    #[arg(long)]
    pub took_ms: Option<u64>,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_extract_command() {
        let args = NeuralHighlightArgs::try_parse_from([
            "neural-highlight",
            "extract",
            "request.json",
            "--field",
            "content",
        ])
        .unwrap();

        if let Command::Extract(extract_args) = args.command {
            assert_eq!(extract_args.request_file, PathBuf::from("request.json"));
            assert_eq!(extract_args.field, "content");
        } else {
            panic!("Expected Extract command");
        }
    }

    #[test]
    fn test_merge_command() {
        let args = NeuralHighlightArgs::try_parse_from([
            "neural-highlight",
            "merge",
            "--response",
            "response.json",
            "--results",
            "results.json",
            "--took-ms",
            "120",
        ])
        .unwrap();

        if let Command::Merge(merge_args) = args.command {
            assert_eq!(merge_args.response, PathBuf::from("response.json"));
            assert_eq!(merge_args.results, PathBuf::from("results.json"));
            assert_eq!(merge_args.took_ms, Some(120));
        } else {
            panic!("Expected Merge command");
        }
    }

    #[test]
    fn test_global_options() {
        let args = NeuralHighlightArgs::try_parse_from([
            "neural-highlight",
            "resolve",
            "request.json",
            "--format",
            "json",
            "--pretty",
            "-vv",
            "--config",
            "settings.json",
        ])
        .unwrap();

        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.pretty);
        assert_eq!(args.verbosity(), 2);
        assert_eq!(args.config, Some(PathBuf::from("settings.json")));
        assert!(matches!(args.command, Command::Resolve(_)));
    }

    #[test]
    fn test_verbosity_levels() {
        let args = NeuralHighlightArgs::try_parse_from(["neural-highlight", "split", "r.json"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args =
            NeuralHighlightArgs::try_parse_from(["neural-highlight", "-q", "-vvv", "split", "r.json"])
                .unwrap();
        assert_eq!(args.verbosity(), 0);
    }
}
