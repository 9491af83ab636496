//! Command implementations for the neural-highlight CLI.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use serde_json::Value;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{HighlightError, Result};
use crate::highlight::extractor::QueryTextExtractorRegistry;
use crate::highlight::merger::ResponseMerger;
use crate::highlight::resolver::HighlightConfigResolver;
use crate::highlight::result::HighlightResult;
use crate::highlight::settings::HighlightSettings;
use crate::highlight::splitter::{RequestSplitter, has_semantic_highlight};
use crate::query::QueryParser;
use crate::search::request::SearchRequest;
use crate::search::response::SearchResponse;

/// Execute a CLI command.
pub fn execute_command(args: NeuralHighlightArgs) -> Result<()> {
    match &args.command {
        Command::Split(request_args) => split_request(request_args, &args),
        Command::Resolve(request_args) => resolve_configs(request_args, &args),
        Command::Extract(extract_args) => extract_query_text(extract_args, &args),
        Command::Merge(merge_args) => merge_results(merge_args, &args),
    }
}

/// Print the plain request.
fn split_request(args: &RequestArgs, cli_args: &NeuralHighlightArgs) -> Result<()> {
    let request = load_request(&args.request_file)?;
    let had_semantic_highlight = has_semantic_highlight(&request);
    let plain = RequestSplitter::new().split(&request);

    output_result(
        "Plain request",
        &SplitResult {
            had_semantic_highlight,
            request: plain.to_json()?,
        },
        cli_args,
    )
}

/// Print the semantic highlight configs a request resolves to.
fn resolve_configs(args: &RequestArgs, cli_args: &NeuralHighlightArgs) -> Result<()> {
    let settings = load_settings(cli_args)?;
    let request = load_request(&args.request_file)?;
    let resolver =
        HighlightConfigResolver::from_settings(Arc::new(QueryTextExtractorRegistry::new()), &settings);

    let configs = resolver.resolve(&request).unwrap_or_default();
    debug!("resolved {} semantic highlight config(s)", configs.len());

    output_result("Resolved configs", &ResolveResult { configs }, cli_args)
}

/// Print the query text recovered for a field.
fn extract_query_text(args: &ExtractArgs, cli_args: &NeuralHighlightArgs) -> Result<()> {
    let request = load_request(&args.request_file)?;
    let query = request
        .query()
        .ok_or_else(|| HighlightError::query("request has no query"))?;
    let registry = QueryTextExtractorRegistry::new();

    output_result(
        "Extracted query text",
        &ExtractionResult {
            field: args.field.clone(),
            query_kind: query.description(),
            query_text: registry.extract(query, &args.field),
        },
        cli_args,
    )
}

/// Print a response with highlight results merged in.
fn merge_results(args: &MergeArgs, cli_args: &NeuralHighlightArgs) -> Result<()> {
    let response: SearchResponse = read_json(&args.response)?;
    let results: Vec<HighlightResult> = read_json(&args.results)?;

    let hit_count = response.hits.len();
    let applied = results
        .iter()
        .filter(|r| r.is_applicable() && r.hit_index < hit_count)
        .count();
    let took = args.took_ms.unwrap_or(response.took);
    let merged = ResponseMerger::new().merge(&response, &results, took);

    output_result(
        "Merged response",
        &MergeResult {
            applied,
            ignored: results.len() - applied,
            response: serde_json::to_value(&merged)?,
        },
        cli_args,
    )
}

fn load_settings(cli_args: &NeuralHighlightArgs) -> Result<HighlightSettings> {
    match &cli_args.config {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            HighlightSettings::from_json_file(path)
        }
        None => Ok(HighlightSettings::default()),
    }
}

fn load_request(path: &Path) -> Result<SearchRequest> {
    info!("Loading request from: {}", path.display());
    let value: Value = read_json(path)?;
    SearchRequest::from_json(&value, &QueryParser::new())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
