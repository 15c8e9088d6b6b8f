//! Join-building stage: strategy selection, query preservation, feedback.
//!
//! The joiner rewrites an inbound request's query into a federated join
//! tree. Which tree shape is built depends on configuration and, for strict
//! matching, on state the previous pass left in the request's property bag.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

use crate::facet::FilterExtractor;
use crate::join::composite::CompositeStrategy;
use crate::join::config::{JoinConfig, PropertyKeys};
use crate::join::multi_field::MultiFieldStrategy;
use crate::join::strict::StrictStrategy;
use crate::query::{FeedbackLog, QueryFeedback, QueryLanguage, QueryNode, QueryRequest};

/// Feedback component name for the join stage.
pub const JOINER_COMPONENT: &str = "Joiner";
/// Feedback event for advanced-language queries left untouched.
pub const ADVANCED_SKIP_EVENT: &str = "advancedQuerySkipped";
/// Feedback event tracing join construction.
pub const JOIN_EVENT: &str = "joinConstruction";
/// Feedback signal telling downstream stages the match is in child
/// documents. Emitted regardless of the feedback flag.
pub const CHILD_DOC_MATCH_EVENT: &str = "matchInChildDocument";

/// Query-side pipeline stage.
pub trait QueryTransformer {
    /// Transform the request in place, returning the feedback trail.
    fn process_query(&self, request: &mut QueryRequest) -> Result<Vec<QueryFeedback>>;
}

/// One join tree shape.
pub(crate) trait JoinStrategy {
    fn build(
        &self,
        config: &JoinConfig,
        keys: &PropertyKeys,
        extracted: &BTreeMap<String, Vec<QueryNode>>,
        request: &mut QueryRequest,
        log: &mut FeedbackLog,
    ) -> Result<QueryNode>;
}

/// Rewrites requests into federated join queries.
pub struct Joiner {
    config: JoinConfig,
    keys: PropertyKeys,
    extractor: FilterExtractor,
}

impl Joiner {
    pub fn new(config: JoinConfig) -> Result<Self> {
        config.validate()?;
        let keys = config.property_keys();
        let extractor = FilterExtractor::new(&config)?;
        Ok(Joiner {
            config,
            keys,
            extractor,
        })
    }

    /// Strict matching only applies to queries with something to match;
    /// match-all queries fall back to the composite shape.
    fn select_strategy(&self, query: &QueryNode) -> &'static dyn JoinStrategy {
        static COMPOSITE: CompositeStrategy = CompositeStrategy;
        static STRICT: StrictStrategy = StrictStrategy;
        static MULTI_FIELD: MultiFieldStrategy = MultiFieldStrategy;
        if self.config.multi_field {
            &MULTI_FIELD
        } else if self.config.strict_child_matching && !query.is_match_all() {
            &STRICT
        } else {
            &COMPOSITE
        }
    }
}

impl QueryTransformer for Joiner {
    fn process_query(&self, request: &mut QueryRequest) -> Result<Vec<QueryFeedback>> {
        let mut log = FeedbackLog::new(JOINER_COMPONENT, self.config.provide_feedback);

        if request.language == QueryLanguage::Advanced && self.config.ignore_advanced_queries {
            log.trace(
                ADVANCED_SKIP_EVENT,
                "Advanced query language in use, leaving query untouched.",
            );
            return Ok(log.into_entries());
        }

        let extracted = self.extractor.extract(&self.keys, request, &mut log);

        // A resubmitted request still carries the join built on the previous
        // pass; restore the query it was built from so it is never joined
        // twice. First passes snapshot instead.
        if request.resubmits > 0 && request.has_property(&self.keys.original_query) {
            let original = request
                .property_str(&self.keys.original_query)
                .unwrap_or("*:*")
                .to_string();
            let language = request
                .property_str(&self.keys.original_language)
                .map(QueryLanguage::parse)
                .unwrap_or(QueryLanguage::Advanced);
            request.set_query_str(&original, language);
        } else {
            let snapshot = request.query_string();
            request.set_property(&self.keys.original_query, snapshot);
            request.set_property(&self.keys.original_language, request.language.as_str());
        }

        let strategy = self.select_strategy(&request.query);
        let join_query = strategy.build(&self.config, &self.keys, &extracted, request, &mut log)?;
        log.trace(JOIN_EVENT, &format!("Final join query: {}", join_query));
        request.query = join_query;
        Ok(log.into_entries())
    }
}

/// Predicate selecting the parent rows: a disjunction of the primary tables'
/// collection predicates, or the negated disjunction of the non-primary
/// tables'.
pub(crate) fn from_query(config: &JoinConfig) -> Result<QueryNode> {
    if !config.primary_tables.is_empty() {
        let clauses = config
            .primary_tables
            .iter()
            .map(|t| table_query(config, t))
            .collect();
        Ok(QueryNode::or(clauses))
    } else if !config.non_primary_tables.is_empty() {
        let clauses = config
            .non_primary_tables
            .iter()
            .map(|t| table_query(config, t))
            .collect();
        Ok(QueryNode::not(QueryNode::or(clauses)))
    } else {
        bail!("either primary or non-primary tables must be configured")
    }
}

/// Collection-membership predicate for one table.
pub(crate) fn table_query(config: &JoinConfig, table: &str) -> QueryNode {
    QueryNode::phrase(&config.collection_field, table)
}

/// Boost and rollup attributes for a table's clause. An unconfigured rollup
/// defaults to 10; a negative value means unlimited and omits the attribute.
pub(crate) fn clause_limits(config: &JoinConfig, table: &str) -> (i32, Option<i64>) {
    let boost = config.table_boosts.get(table).copied().unwrap_or(0);
    let rollup = match config.max_child_docs.get(table).copied() {
        Some(limit) if limit < 0 => None,
        Some(limit) => Some(limit),
        None => Some(10),
    };
    (boost, rollup)
}

/// Join field for a table: its configured override or the shared default.
pub(crate) fn resolve_join_field<'a>(config: &'a JoinConfig, table: &str) -> &'a str {
    config
        .join_fields
        .get(table)
        .map(String::as_str)
        .unwrap_or(&config.join_field)
}

/// A table's extracted sub-queries, when any exist.
pub(crate) fn table_filters<'a>(
    extracted: &'a BTreeMap<String, Vec<QueryNode>>,
    table: &str,
) -> Option<&'a [QueryNode]> {
    match extracted.get(table) {
        Some(filters) if !filters.is_empty() => Some(filters.as_slice()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::JoinMode;

    fn base_config() -> JoinConfig {
        JoinConfig {
            primary_tables: vec!["dataTable".to_string()],
            child_tables: BTreeMap::from([
                ("metadata".to_string(), JoinMode::Inner),
                ("other".to_string(), JoinMode::Outer),
            ]),
            join_field: "metadataLink".to_string(),
            ..JoinConfig::default()
        }
        .facet_fields("metadata", "topic, company")
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = base_config();
        config.primary_tables.clear();
        assert!(Joiner::new(config).is_err());
    }

    #[test]
    fn test_from_query_single_primary_renders_disjunction() {
        let query = from_query(&base_config()).unwrap();
        assert_eq!(query.to_string(), "OR(table:dataTable)");
    }

    #[test]
    fn test_from_query_multiple_primaries() {
        let mut config = base_config();
        config.primary_tables.push("archive".to_string());
        let query = from_query(&config).unwrap();
        assert_eq!(query.to_string(), "OR(table:dataTable, table:archive)");
    }

    #[test]
    fn test_from_query_non_primary_negates() {
        let mut config = base_config();
        config.primary_tables.clear();
        config.non_primary_tables = vec!["metadata".to_string(), "other".to_string()];
        let query = from_query(&config).unwrap();
        assert_eq!(query.to_string(), "NOT(OR(table:metadata, table:other))");
    }

    #[test]
    fn test_from_query_requires_tables() {
        let mut config = base_config();
        config.primary_tables.clear();
        assert!(from_query(&config).is_err());
    }

    #[test]
    fn test_clause_limits_defaults() {
        let config = base_config();
        assert_eq!(clause_limits(&config, "metadata"), (0, Some(10)));
    }

    #[test]
    fn test_clause_limits_configured_values() {
        let mut config = base_config();
        config.max_child_docs.insert("metadata".to_string(), 25);
        config.max_child_docs.insert("other".to_string(), -1);
        config.table_boosts.insert("metadata".to_string(), 3);
        assert_eq!(clause_limits(&config, "metadata"), (3, Some(25)));
        assert_eq!(clause_limits(&config, "other"), (0, None));
    }

    #[test]
    fn test_clause_limits_zero_rollup_is_kept() {
        let mut config = base_config();
        config.max_child_docs.insert("metadata".to_string(), 0);
        assert_eq!(clause_limits(&config, "metadata"), (0, Some(0)));
    }

    #[test]
    fn test_resolve_join_field_override() {
        let mut config = base_config();
        config
            .join_fields
            .insert("other".to_string(), "parentId".to_string());
        assert_eq!(resolve_join_field(&config, "metadata"), "metadataLink");
        assert_eq!(resolve_join_field(&config, "other"), "parentId");
    }

    #[test]
    fn test_table_filters_skips_empty_lists() {
        let extracted = BTreeMap::from([
            ("metadata".to_string(), vec![QueryNode::term("topic:x")]),
            ("other".to_string(), Vec::new()),
        ]);
        assert!(table_filters(&extracted, "metadata").is_some());
        assert!(table_filters(&extracted, "other").is_none());
        assert!(table_filters(&extracted, "absent").is_none());
    }

    #[test]
    fn test_advanced_query_skipped_when_configured() {
        let mut config = base_config();
        config.ignore_advanced_queries = true;
        config.provide_feedback = true;
        let joiner = Joiner::new(config).unwrap();
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Advanced);
        let feedback = joiner.process_query(&mut request).unwrap();
        assert_eq!(request.query_string(), "content:electronic");
        assert!(!request.has_property("original_query"));
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].name, ADVANCED_SKIP_EVENT);
    }

    #[test]
    fn test_advanced_query_processed_without_skip_flag() {
        let joiner = Joiner::new(base_config()).unwrap();
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Advanced);
        joiner.process_query(&mut request).unwrap();
        assert!(request.query_string().starts_with("COMPOSITE("));
    }

    #[test]
    fn test_first_pass_snapshots_query_and_language() {
        let joiner = Joiner::new(base_config()).unwrap();
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        joiner.process_query(&mut request).unwrap();
        assert_eq!(request.property_str("original_query"), Some("content:electronic"));
        assert_eq!(request.property_str("original_language"), Some("simple"));
    }

    #[test]
    fn test_resubmitted_pass_builds_from_original_query() {
        let joiner = Joiner::new(base_config()).unwrap();
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        joiner.process_query(&mut request).unwrap();
        let first_join = request.query_string();

        request.resubmits = 1;
        joiner.process_query(&mut request).unwrap();
        let second_join = request.query_string();
        assert_eq!(first_join, second_join);
        assert!(!second_join.contains("COMPOSITE(COMPOSITE"));
    }

    #[test]
    fn test_build_is_pure_given_identical_inputs() {
        let joiner = Joiner::new(base_config()).unwrap();
        let mut first = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        let mut second = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        joiner.process_query(&mut first).unwrap();
        joiner.process_query(&mut second).unwrap();
        assert_eq!(first.query, second.query);
    }

    #[test]
    fn test_match_all_query_uses_composite_despite_strict_flag() {
        let mut config = base_config();
        config.strict_child_matching = true;
        let joiner = Joiner::new(config).unwrap();
        let mut request = QueryRequest::new("*:*", QueryLanguage::Simple);
        joiner.process_query(&mut request).unwrap();
        assert!(request.query_string().starts_with("COMPOSITE("));
    }

    #[test]
    fn test_final_query_feedback_emitted() {
        let mut config = base_config();
        config.provide_feedback = true;
        let joiner = Joiner::new(config).unwrap();
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        let feedback = joiner.process_query(&mut request).unwrap();
        let last = feedback.last().unwrap();
        assert_eq!(last.name, JOIN_EVENT);
        assert!(last.message.contains("COMPOSITE("));
    }
}
