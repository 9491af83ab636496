//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cli::args::{NeuralHighlightArgs, OutputFormat};
use crate::error::Result;
use crate::highlight::resolver::SemanticHighlightConfig;

/// Result structure for request splitting.
#[derive(Debug, Serialize, Deserialize)]
pub struct SplitResult {
    pub had_semantic_highlight: bool,
    pub request: Value,
}

/// Result structure for config resolution.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResult {
    pub configs: Vec<SemanticHighlightConfig>,
}

/// Result structure for query text extraction.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub field: String,
    pub query_kind: String,
    pub query_text: Option<String>,
}

/// Result structure for merging.
#[derive(Debug, Serialize, Deserialize)]
pub struct MergeResult {
    pub applied: usize,
    pub ignored: usize,
    pub response: Value,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(
    message: &str,
    result: &T,
    args: &NeuralHighlightArgs,
) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &NeuralHighlightArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
        println!();
    }

    let value = serde_json::to_value(result)?;

    match result {
        _ if std::any::type_name::<T>().ends_with("SplitResult") => output_split_human(&value),
        _ if std::any::type_name::<T>().ends_with("ResolveResult") => {
            output_configs_human(&value)
        }
        _ if std::any::type_name::<T>().ends_with("MergeResult") => output_merge_human(&value),
        _ => output_generic_human(&value),
    }
}

/// Output a plain request in human format.
fn output_split_human(value: &Value) -> Result<()> {
    let stripped = value
        .get("had_semantic_highlight")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if stripped {
        println!("Semantic highlight directives removed.");
    } else {
        println!("No semantic highlight directives; request unchanged.");
    }
    println!();

    if let Some(request) = value.get("request") {
        println!("{}", serde_json::to_string_pretty(request)?);
    }
    Ok(())
}

/// Output resolved configs in human format.
fn output_configs_human(value: &Value) -> Result<()> {
    let configs = value
        .get("configs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if configs.is_empty() {
        println!("No semantic highlighting applies to this request.");
        return Ok(());
    }

    println!("Semantic Highlight Configs:");
    println!("═══════════════════════════");
    for config in configs {
        println!();
        println!("{}", field_str(config, "field_name"));
        println!("─────────────");
        println!("model:      {}", field_str(config, "model_id"));
        println!("query text: {:?}", field_str(config, "query_text"));
        println!(
            "tags:       {} … {}",
            field_str(config, "pre_tag"),
            field_str(config, "post_tag")
        );
        if let Some(use_batch) = config.get("use_batch").and_then(Value::as_bool) {
            println!("use_batch:  {use_batch}");
        }
    }
    Ok(())
}

/// Output a merged response in human format.
fn output_merge_human(value: &Value) -> Result<()> {
    let hits = value
        .pointer("/response/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    println!("Merged Hits:");
    println!("════════════");
    for (i, hit) in hits.iter().enumerate() {
        println!();
        println!(
            "Hit {}: {}/{} (Score: {:.3})",
            i,
            field_str(hit, "_index"),
            field_str(hit, "_id"),
            hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0)
        );
        println!("─────────────");

        if let Some(fields) = hit.get("highlight").and_then(Value::as_object) {
            for (field_name, fragments) in fields {
                println!("{field_name}: {}", format_value(fragments));
            }
        }
    }

    println!();
    if let Some(applied) = value.get("applied").and_then(Value::as_u64) {
        println!("Highlights applied: {applied}");
    }
    if let Some(ignored) = value.get("ignored").and_then(Value::as_u64) {
        println!("Results ignored: {ignored}");
    }
    if let Some(took) = value.pointer("/response/took").and_then(Value::as_u64) {
        println!("Took: {took}ms");
    }
    Ok(())
}

/// Output generic data in human format.
fn output_generic_human(value: &Value) -> Result<()> {
    match value {
        Value::Object(obj) => {
            for (key, val) in obj {
                let formatted_val = format_value(val);
                println!("{key}: {formatted_val}");
            }
        }
        _ => {
            let formatted_value = format_value(value);
            println!("{formatted_value}");
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &NeuralHighlightArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

fn field_str<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Format a JSON value for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(arr) => {
            let formatted_values = arr.iter().map(format_value).collect::<Vec<_>>().join(", ");
            format!("[{formatted_values}]")
        }
        Value::Object(_) => "[object]".to_string(),
        Value::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("text")), "text");
        assert_eq!(format_value(&json!(3)), "3");
        assert_eq!(format_value(&json!(["<em>a</em>", "b"])), "[<em>a</em>, b]");
        assert_eq!(format_value(&json!({ "k": 1 })), "[object]");
        assert_eq!(format_value(&Value::Null), "null");
    }

    #[test]
    fn test_field_str() {
        let value = json!({ "model_id": "m1", "score": 1.0 });
        assert_eq!(field_str(&value, "model_id"), "m1");
        assert_eq!(field_str(&value, "score"), "");
        assert_eq!(field_str(&value, "missing"), "");
    }
}
