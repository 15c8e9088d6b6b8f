//! Pipeline messages: query requests, responses, and their property bag.
//!
//! Requests carry the live query plus a string-keyed property bag that the
//! rewriting stages use to smuggle state across resubmission round trips.
//! Properties are typed loosely (the bag outlives any one stage), so reads
//! go through shape-checked accessors that return `None` on mismatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::query::node::QueryNode;

/// Query language of the request text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLanguage {
    Simple,
    Advanced,
}

impl QueryLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryLanguage::Simple => "simple",
            QueryLanguage::Advanced => "advanced",
        }
    }

    /// Lenient parse; engine-generated queries default to advanced.
    pub fn parse(s: &str) -> Self {
        match s {
            "simple" => QueryLanguage::Simple,
            _ => QueryLanguage::Advanced,
        }
    }
}

impl fmt::Display for QueryLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value in the request property bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Text(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(v: Vec<String>) -> Self {
        PropertyValue::List(v)
    }
}

/// Facet selection filter as the front end submits it: a field plus the raw
/// selection payload, rendered in the platform's list-item form with a
/// trailing delimiter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetFilter {
    pub field: String,
    pub value: String,
}

impl FacetFilter {
    pub fn new(field: &str, value: &str) -> Self {
        FacetFilter {
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl fmt::Display for FacetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:FACET({}),", self.field, self.value)
    }
}

/// Search request flowing toward the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: QueryNode,
    pub language: QueryLanguage,
    #[serde(default)]
    pub filters: Vec<QueryNode>,
    #[serde(default)]
    pub facet_filters: Vec<FacetFilter>,
    #[serde(default)]
    pub resubmits: u32,
    #[serde(default = "default_max_resubmits")]
    pub max_resubmits: u32,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

fn default_max_resubmits() -> u32 {
    1
}

impl QueryRequest {
    pub fn new(query: &str, language: QueryLanguage) -> Self {
        QueryRequest {
            query: QueryNode::term(query),
            language,
            filters: Vec::new(),
            facet_filters: Vec::new(),
            resubmits: 0,
            max_resubmits: default_max_resubmits(),
            properties: BTreeMap::new(),
        }
    }

    /// Canonical text of the current query.
    pub fn query_string(&self) -> String {
        self.query.to_string()
    }

    /// Replace the query with raw text in the given language.
    pub fn set_query_str(&mut self, query: &str, language: QueryLanguage) {
        self.query = QueryNode::term(query);
        self.language = language;
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn set_property(&mut self, key: &str, value: impl Into<PropertyValue>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Boolean property, or `default` when absent or not a boolean.
    pub fn property_bool(&self, key: &str, default: bool) -> bool {
        match self.properties.get(key) {
            Some(PropertyValue::Bool(v)) => *v,
            _ => default,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        match self.properties.get(key) {
            Some(PropertyValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn property_str_list(&self, key: &str) -> Option<&[String]> {
        match self.properties.get(key) {
            Some(PropertyValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn increment_resubmits(&mut self) {
        self.resubmits += 1;
    }
}

/// Advisory record a stage attaches to the request it transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFeedback {
    pub component: String,
    pub name: String,
    pub message: String,
}

impl QueryFeedback {
    pub fn new(component: &str, name: &str, message: &str) -> Self {
        QueryFeedback {
            component: component.to_string(),
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for QueryFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.component, self.name, self.message)
    }
}

/// Feedback collector for one transformation pass.
///
/// Diagnostic messages are gated on the configured flag; signals that
/// downstream stages depend on are always recorded.
#[derive(Debug)]
pub struct FeedbackLog {
    component: String,
    enabled: bool,
    entries: Vec<QueryFeedback>,
}

impl FeedbackLog {
    pub fn new(component: &str, enabled: bool) -> Self {
        FeedbackLog {
            component: component.to_string(),
            enabled,
            entries: Vec::new(),
        }
    }

    /// Diagnostic message, dropped when feedback is disabled.
    pub fn trace(&mut self, name: &str, message: &str) {
        if self.enabled {
            self.entries
                .push(QueryFeedback::new(&self.component, name, message));
        }
    }

    /// Contract message recorded regardless of the feedback flag.
    pub fn signal(&mut self, name: &str, message: &str) {
        self.entries
            .push(QueryFeedback::new(&self.component, name, message));
    }

    pub fn into_entries(self) -> Vec<QueryFeedback> {
        self.entries
    }
}

/// Engine result document. Only identity matters to the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
}

/// Engine response, carrying the request it answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub request: QueryRequest,
    #[serde(default)]
    pub documents: Vec<SearchDocument>,
}

/// Message seen by response-side routers. Routers only act on responses but
/// receive whatever flows through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    Request(QueryRequest),
    Response(QueryResponse),
}
