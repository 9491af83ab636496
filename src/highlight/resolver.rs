//! Resolution of semantic highlight directives into per-field configs.

use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::highlight::extractor::QueryTextExtractorRegistry;
use crate::highlight::settings::{DEFAULT_POST_TAG, DEFAULT_PRE_TAG, HighlightSettings};
use crate::search::highlight::{HighlightFieldSpec, HighlightSpec, USE_BATCH_OPTION};
use crate::search::request::SearchRequest;

/// Everything needed to highlight one field semantically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticHighlightConfig {
    pub field_name: String,
    pub model_id: String,
    /// May be empty when no text could be recovered from the query.
    pub query_text: String,
    pub pre_tag: String,
    pub post_tag: String,
    /// Reserved for cross-document batching at the inference boundary.
    pub use_batch: bool,
}

/// Turns a request's highlight block into [`SemanticHighlightConfig`]s.
#[derive(Debug, Clone)]
pub struct HighlightConfigResolver {
    registry: Arc<QueryTextExtractorRegistry>,
    default_pre_tag: String,
    default_post_tag: String,
}

impl HighlightConfigResolver {
    /// Create a resolver using `<em>`/`</em>` as fallback tags.
    pub fn new(registry: Arc<QueryTextExtractorRegistry>) -> Self {
        HighlightConfigResolver {
            registry,
            default_pre_tag: DEFAULT_PRE_TAG.to_string(),
            default_post_tag: DEFAULT_POST_TAG.to_string(),
        }
    }

    /// Create a resolver taking its fallback tags from `settings`.
    pub fn from_settings(
        registry: Arc<QueryTextExtractorRegistry>,
        settings: &HighlightSettings,
    ) -> Self {
        HighlightConfigResolver {
            registry,
            default_pre_tag: settings.default_pre_tag.clone(),
            default_post_tag: settings.default_post_tag.clone(),
        }
    }

    /// The extractor table used for query text.
    pub fn registry(&self) -> &Arc<QueryTextExtractorRegistry> {
        &self.registry
    }

    /// Resolve every semantic directive of `request`, in field order.
    ///
    /// Returns `None` when the request has no highlight block, no semantic
    /// directive, or no semantic directive with a usable model identifier.
    /// Directives without one are skipped with a warning.
    pub fn resolve(&self, request: &SearchRequest) -> Option<Vec<SemanticHighlightConfig>> {
        let spec = request.highlight()?;

        let configs: Vec<SemanticHighlightConfig> = spec
            .semantic_fields()
            .filter_map(|field| self.resolve_field(request, spec, field))
            .collect();

        if configs.is_empty() {
            debug!("[semantic-hl] no semantic highlight config resolved");
            None
        } else {
            Some(configs)
        }
    }

    fn resolve_field(
        &self,
        request: &SearchRequest,
        spec: &HighlightSpec,
        field: &HighlightFieldSpec,
    ) -> Option<SemanticHighlightConfig> {
        let model_id = match field.model_id().or_else(|| spec.model_id()) {
            Some(Value::String(model_id)) if !model_id.is_empty() => model_id.clone(),
            Some(other) => {
                warn!(
                    "[semantic-hl] skipping field '{}': model_id must be a non-empty string, got {other}",
                    field.name
                );
                return None;
            }
            None => {
                warn!(
                    "[semantic-hl] skipping field '{}': no model_id in field or request options",
                    field.name
                );
                return None;
            }
        };

        let query_text = request
            .query()
            .and_then(|query| self.registry.extract(query, &field.name))
            .unwrap_or_default();
        if query_text.is_empty() {
            warn!(
                "[semantic-hl] no query text recovered for field '{}'",
                field.name
            );
        }

        let pre_tag = first_tag(&field.pre_tags)
            .or_else(|| first_tag(&spec.pre_tags))
            .unwrap_or(&self.default_pre_tag)
            .to_string();
        let post_tag = first_tag(&field.post_tags)
            .or_else(|| first_tag(&spec.post_tags))
            .unwrap_or(&self.default_post_tag)
            .to_string();

        let use_batch = field
            .options
            .get(USE_BATCH_OPTION)
            .or_else(|| spec.options.get(USE_BATCH_OPTION))
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Some(SemanticHighlightConfig {
            field_name: field.name.clone(),
            model_id,
            query_text,
            pre_tag,
            post_tag,
            use_batch,
        })
    }
}

fn first_tag(tags: &Option<Vec<String>>) -> Option<&String> {
    tags.as_ref()?.first()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::query::{BooleanQueryBuilder, KnnVectorQuery, NeuralKnnQuery, TermQuery};
    use crate::search::highlight::{MODEL_ID_OPTION, SEMANTIC_HIGHLIGHTER};
    use crate::search::request::SearchSource;

    fn resolver() -> HighlightConfigResolver {
        HighlightConfigResolver::new(Arc::new(QueryTextExtractorRegistry::new()))
    }

    fn request(highlight: HighlightSpec) -> SearchRequest {
        let query = NeuralKnnQuery::new(
            Box::new(KnnVectorQuery::new("embedding", vec![0.5], 5)),
            "brain regions",
        );
        SearchRequest::new(["docs"]).with_source(
            SearchSource::new()
                .with_query(Box::new(query))
                .with_highlight(highlight),
        )
    }

    #[test]
    fn test_resolves_field_model_id() {
        let configs = resolver()
            .resolve(&request(HighlightSpec::new().field(
                HighlightFieldSpec::new("content").with_option(MODEL_ID_OPTION, json!("m1")),
            )))
            .unwrap();

        assert_eq!(
            configs,
            vec![SemanticHighlightConfig {
                field_name: "content".to_string(),
                model_id: "m1".to_string(),
                query_text: "brain regions".to_string(),
                pre_tag: "<em>".to_string(),
                post_tag: "</em>".to_string(),
                use_batch: false,
            }]
        );
    }

    #[test]
    fn test_field_model_id_overrides_request_level() {
        let configs = resolver()
            .resolve(&request(
                HighlightSpec::new()
                    .with_option(MODEL_ID_OPTION, json!("fallback"))
                    .field(HighlightFieldSpec::new("title"))
                    .field(
                        HighlightFieldSpec::new("content").with_option(MODEL_ID_OPTION, json!("m1")),
                    ),
            ))
            .unwrap();

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].field_name, "title");
        assert_eq!(configs[0].model_id, "fallback");
        assert_eq!(configs[1].model_id, "m1");
    }

    #[test]
    fn test_type_semantic_without_model_id_resolves_to_none() {
        let result = resolver().resolve(&request(
            HighlightSpec::new().field(HighlightFieldSpec::new("content").with_type(SEMANTIC_HIGHLIGHTER)),
        ));
        assert!(result.is_none());
    }

    #[test]
    fn test_non_string_model_id_is_skipped() {
        let result = resolver().resolve(&request(
            HighlightSpec::new()
                .field(HighlightFieldSpec::new("content").with_option(MODEL_ID_OPTION, json!(42))),
        ));
        assert!(result.is_none());
    }

    #[test]
    fn test_lexical_only_resolves_to_none() {
        let result = resolver().resolve(&request(
            HighlightSpec::new().field(HighlightFieldSpec::new("content").with_type("unified")),
        ));
        assert!(result.is_none());
        assert!(resolver().resolve(&SearchRequest::new(["docs"])).is_none());
    }

    #[test]
    fn test_tag_fallback_chain() {
        let resolver = HighlightConfigResolver::from_settings(
            Arc::new(QueryTextExtractorRegistry::new()),
            &HighlightSettings::default().with_default_tags("<mark>", "</mark>"),
        );
        let configs = resolver
            .resolve(&request(
                HighlightSpec::new()
                    .with_option(MODEL_ID_OPTION, json!("m1"))
                    .field(HighlightFieldSpec::new("a").with_tags(
                        vec!["<b>".to_string(), "<i>".to_string()],
                        vec!["</b>".to_string(), "</i>".to_string()],
                    ))
                    .field(HighlightFieldSpec::new("b")),
            ))
            .unwrap();
        assert_eq!((configs[0].pre_tag.as_str(), configs[0].post_tag.as_str()), ("<b>", "</b>"));
        assert_eq!(
            (configs[1].pre_tag.as_str(), configs[1].post_tag.as_str()),
            ("<mark>", "</mark>")
        );

        let configs = resolver
            .resolve(&request(
                HighlightSpec::new()
                    .with_option(MODEL_ID_OPTION, json!("m1"))
                    .with_tags(vec!["<u>".to_string()], vec!["</u>".to_string()])
                    .field(HighlightFieldSpec::new("a")),
            ))
            .unwrap();
        assert_eq!(configs[0].pre_tag, "<u>");
    }

    #[test]
    fn test_unextractable_query_gives_empty_text() {
        let request = SearchRequest::new(["docs"]).with_source(
            SearchSource::new()
                .with_query(Box::new(KnnVectorQuery::new("embedding", vec![1.0], 3)))
                .with_highlight(
                    HighlightSpec::new().field(
                        HighlightFieldSpec::new("content")
                            .with_option(MODEL_ID_OPTION, json!("m1"))
                            .with_option(USE_BATCH_OPTION, json!(true)),
                    ),
                ),
        );

        let configs = resolver().resolve(&request).unwrap();
        assert_eq!(configs[0].query_text, "");
        assert!(configs[0].use_batch);
    }

    #[test]
    fn test_boolean_query_text() {
        let query = BooleanQueryBuilder::new()
            .must(Box::new(NeuralKnnQuery::new(
                Box::new(KnnVectorQuery::new("embedding", vec![0.5], 5)),
                "find regions",
            )))
            .must(Box::new(TermQuery::new("content", "brain")))
            .build();
        let request = SearchRequest::new(["docs"]).with_source(
            SearchSource::new().with_query(Box::new(query)).with_highlight(
                HighlightSpec::new()
                    .field(HighlightFieldSpec::new("content").with_option(MODEL_ID_OPTION, json!("m1"))),
            ),
        );

        let configs = resolver().resolve(&request).unwrap();
        assert_eq!(configs[0].query_text, "find regions");
    }
}
