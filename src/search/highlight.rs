//! Highlight directives carried by a search request.
//!
//! The JSON shape follows the host engine's `highlight` block:
//!
//! ```json
//! {
//!   "pre_tags": ["<em>"], "post_tags": ["</em>"],
//!   "options": { "model_id": "m1" },
//!   "fields": {
//!     "content": { "type": "semantic", "options": { "model_id": "m1", "use_batch": false } },
//!     "title": {}
//!   }
//! }
//! ```
//!
//! Field order is significant and preserved through (de)serialization; the
//! array-of-single-key-objects form of `fields` is accepted as well.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Highlighter kind that marks a field for semantic highlighting.
pub const SEMANTIC_HIGHLIGHTER: &str = "semantic";

/// Option key holding the model identifier.
pub const MODEL_ID_OPTION: &str = "model_id";

/// Option key that can also mark a field as semantic.
pub const TYPE_OPTION: &str = "type";

/// Option key reserved for cross-document batching at the inference boundary.
pub const USE_BATCH_OPTION: &str = "use_batch";

/// Request-wide highlight specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighlightSpec {
    /// Request-level pre tags; fields without their own tags inherit these.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_tags: Option<Vec<String>>,

    /// Request-level post tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_tags: Option<Vec<String>>,

    /// Request-level highlighter kind; fields without their own kind inherit it.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub highlighter_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_fragments: Option<usize>,

    /// Request-level options (`model_id` here is the fallback for every field).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,

    /// Per-field directives, in request order.
    #[serde(default, with = "field_map")]
    pub fields: Vec<HighlightFieldSpec>,
}

impl HighlightSpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field directive.
    pub fn field(mut self, field: HighlightFieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Set a request-level option.
    pub fn with_option<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Set request-level tags.
    pub fn with_tags(mut self, pre_tags: Vec<String>, post_tags: Vec<String>) -> Self {
        self.pre_tags = Some(pre_tags);
        self.post_tags = Some(post_tags);
        self
    }

    /// Set the request-level highlighter kind.
    pub fn with_type<T: Into<String>>(mut self, highlighter_type: T) -> Self {
        self.highlighter_type = Some(highlighter_type.into());
        self
    }

    /// Request-level model identifier, if any.
    pub fn model_id(&self) -> Option<&Value> {
        self.options.get(MODEL_ID_OPTION)
    }

    /// Highlighter kind of a field after inheriting the request-level kind.
    pub fn effective_type<'a>(&'a self, field: &'a HighlightFieldSpec) -> Option<&'a str> {
        field
            .highlighter_type
            .as_deref()
            .or(self.highlighter_type.as_deref())
    }

    /// Whether a field directive asks for semantic highlighting.
    ///
    /// A directive is semantic if its own options carry a model identifier,
    /// the request-level options carry one, its options say
    /// `"type": "semantic"`, or its (inherited) highlighter kind is `semantic`.
    pub fn is_semantic(&self, field: &HighlightFieldSpec) -> bool {
        field.options.contains_key(MODEL_ID_OPTION)
            || self.options.contains_key(MODEL_ID_OPTION)
            || field.options.get(TYPE_OPTION).and_then(Value::as_str) == Some(SEMANTIC_HIGHLIGHTER)
            || self.effective_type(field) == Some(SEMANTIC_HIGHLIGHTER)
    }

    /// Whether any field directive is semantic.
    pub fn has_semantic_fields(&self) -> bool {
        self.fields.iter().any(|field| self.is_semantic(field))
    }

    /// Field directives the host engine should run itself.
    pub fn lexical_fields(&self) -> impl Iterator<Item = &HighlightFieldSpec> {
        self.fields.iter().filter(|field| !self.is_semantic(field))
    }

    /// Field directives handled by the semantic highlighting phase.
    pub fn semantic_fields(&self) -> impl Iterator<Item = &HighlightFieldSpec> {
        self.fields.iter().filter(|field| self.is_semantic(field))
    }
}

/// Highlight directive for a single field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighlightFieldSpec {
    /// Field name (the key of the `fields` object).
    #[serde(skip)]
    pub name: String,

    /// Highlighter kind (`unified`, `plain`, `semantic`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub highlighter_type: Option<String>,

    /// Pre tags; multiple entries support nested highlight levels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_tags: Option<Vec<String>>,

    /// Post tags, paired with `pre_tags`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_size: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_fragments: Option<usize>,

    /// Opaque highlighter options (`model_id`, `type`, `use_batch`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,
}

impl HighlightFieldSpec {
    /// Create a directive for `name` with no options.
    pub fn new<S: Into<String>>(name: S) -> Self {
        HighlightFieldSpec {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the highlighter kind.
    pub fn with_type<T: Into<String>>(mut self, highlighter_type: T) -> Self {
        self.highlighter_type = Some(highlighter_type.into());
        self
    }

    /// Set an option.
    pub fn with_option<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Set the tag pairs.
    pub fn with_tags(mut self, pre_tags: Vec<String>, post_tags: Vec<String>) -> Self {
        self.pre_tags = Some(pre_tags);
        self.post_tags = Some(post_tags);
        self
    }

    /// Field-level model identifier, if any.
    pub fn model_id(&self) -> Option<&Value> {
        self.options.get(MODEL_ID_OPTION)
    }
}

/// Serde adapter keeping `fields` ordered while rendering it as a JSON object.
mod field_map {
    use super::*;

    pub fn serialize<S: Serializer>(
        fields: &[HighlightFieldSpec],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(fields.iter().map(|field| (&field.name, field)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<HighlightFieldSpec>, D::Error> {
        deserializer.deserialize_any(FieldsVisitor)
    }

    struct FieldsVisitor;

    impl<'de> Visitor<'de> for FieldsVisitor {
        type Value = Vec<HighlightFieldSpec>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("an object of field directives or an array of single-field objects")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut fields = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, mut field)) = map.next_entry::<String, HighlightFieldSpec>()? {
                field.name = name;
                fields.push(field);
            }
            Ok(fields)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut fields = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(entry) = seq.next_element::<BTreeMap<String, HighlightFieldSpec>>()? {
                for (name, mut field) in entry {
                    field.name = name;
                    fields.push(field);
                }
            }
            Ok(fields)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_field_order_survives_round_trip() {
        let spec: HighlightSpec = serde_json::from_value(json!({
            "fields": {
                "title": {},
                "content": { "type": "semantic", "options": { "model_id": "m1" } },
                "abstract": { "type": "plain" }
            }
        }))
        .unwrap();

        let names: Vec<&str> = spec.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["title", "content", "abstract"]);

        let rendered = serde_json::to_string(&spec).unwrap();
        assert!(rendered.find("\"title\"").unwrap() < rendered.find("\"content\"").unwrap());
        assert!(rendered.find("\"content\"").unwrap() < rendered.find("\"abstract\"").unwrap());
    }

    #[test]
    fn test_array_form_of_fields() {
        let spec: HighlightSpec = serde_json::from_value(json!({
            "fields": [ { "body": {} }, { "content": { "options": { "model_id": "m1" } } } ]
        }))
        .unwrap();

        assert_eq!(spec.fields.len(), 2);
        assert_eq!(spec.fields[1].name, "content");
        assert_eq!(spec.fields[1].model_id(), Some(&json!("m1")));
    }

    #[test]
    fn test_semantic_classification() {
        let spec = HighlightSpec::new()
            .field(HighlightFieldSpec::new("title"))
            .field(HighlightFieldSpec::new("a").with_type(SEMANTIC_HIGHLIGHTER))
            .field(HighlightFieldSpec::new("b").with_option(MODEL_ID_OPTION, json!("m1")))
            .field(HighlightFieldSpec::new("c").with_option(TYPE_OPTION, json!("semantic")));

        let semantic: Vec<&str> = spec.semantic_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(semantic, vec!["a", "b", "c"]);
        let lexical: Vec<&str> = spec.lexical_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(lexical, vec!["title"]);
    }

    #[test]
    fn test_request_level_model_id_makes_every_field_semantic() {
        let spec = HighlightSpec::new()
            .with_option(MODEL_ID_OPTION, json!("m1"))
            .field(HighlightFieldSpec::new("title"))
            .field(HighlightFieldSpec::new("content"));

        assert!(spec.has_semantic_fields());
        assert_eq!(spec.lexical_fields().count(), 0);
    }

    #[test]
    fn test_inherited_type() {
        let spec = HighlightSpec::new()
            .with_type(SEMANTIC_HIGHLIGHTER)
            .field(HighlightFieldSpec::new("content"))
            .field(HighlightFieldSpec::new("title").with_type("plain"));

        assert!(spec.is_semantic(&spec.fields[0]));
        assert!(!spec.is_semantic(&spec.fields[1]));
    }

    #[test]
    fn test_no_fields_means_nothing_semantic() {
        let spec = HighlightSpec::new().with_type(SEMANTIC_HIGHLIGHTER);
        assert!(!spec.has_semantic_fields());
    }
}
