//! Strict child-matching join construction.
//!
//! Models "the search term itself must match somewhere in the qualifying
//! tables": a disjunction with one full join per child table under search,
//! plus one parent-only join. A handshake over the `wasStrictJoin` property
//! lets the first pass search only the parent table and a resubmitted pass
//! search only the children.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::join::config::{JoinConfig, PropertyKeys};
use crate::join::joiner::{
    clause_limits, from_query, table_filters, table_query, JoinStrategy, CHILD_DOC_MATCH_EVENT,
    JOIN_EVENT,
};
use crate::query::{FeedbackLog, JoinClause, JoinMode, QueryNode, QueryRequest, USER_QUERY_PARAM};

pub(crate) struct StrictStrategy;

impl JoinStrategy for StrictStrategy {
    fn build(
        &self,
        config: &JoinConfig,
        keys: &PropertyKeys,
        extracted: &BTreeMap<String, Vec<QueryNode>>,
        request: &mut QueryRequest,
        log: &mut FeedbackLog,
    ) -> Result<QueryNode> {
        let first_pass = !request.property_bool(&keys.was_strict_join, false);
        let parent_only = first_pass && config.allow_child_only_search;
        let children_only = !first_pass && config.allow_child_only_search;

        if parent_only {
            let join = parent_table_join(config, extracted, &request.query)?;
            request.set_property(&keys.was_strict_join, true);
            return Ok(join);
        }

        let base = from_query(config)?;
        let mut joins = Vec::with_capacity(config.child_tables.len() + 1);
        for search_table in config.child_tables.keys() {
            let mut clauses = Vec::with_capacity(config.child_tables.len());
            for (table, mode) in &config.child_tables {
                let clause = if table == search_table {
                    let mut parts = vec![
                        table_query(config, table),
                        QueryNode::sub_with(request.query.clone(), USER_QUERY_PARAM, "true"),
                    ];
                    if let Some(filters) = table_filters(extracted, table) {
                        parts.extend(filters.iter().cloned());
                    }
                    attributed_clause(config, table, QueryNode::and(parts), JoinMode::Inner)
                } else {
                    child_clause(config, extracted, table, *mode)
                };
                clauses.push(clause);
            }
            let join = QueryNode::Join {
                query: Box::new(base.clone()),
                clauses,
            };
            log.trace(
                JOIN_EVENT,
                &format!(
                    "Adding join searching {} to the strict disjunction: {}",
                    search_table, join
                ),
            );
            joins.push(join);
        }

        if children_only {
            log.signal(CHILD_DOC_MATCH_EVENT, "The match is in the child documents");
        } else {
            joins.push(parent_table_join(config, extracted, &request.query)?);
        }
        request.set_property(&keys.was_strict_join, false);
        Ok(QueryNode::or(joins))
    }
}

/// Join returning parent rows matching the user query, with child clauses
/// carrying only their extracted filters.
fn parent_table_join(
    config: &JoinConfig,
    extracted: &BTreeMap<String, Vec<QueryNode>>,
    user_query: &QueryNode,
) -> Result<QueryNode> {
    let base = QueryNode::and(vec![
        from_query(config)?,
        QueryNode::sub_with(user_query.clone(), USER_QUERY_PARAM, "true"),
    ]);
    let clauses = config
        .child_tables
        .iter()
        .map(|(table, mode)| child_clause(config, extracted, table, *mode))
        .collect();
    Ok(QueryNode::Join {
        query: Box::new(base),
        clauses,
    })
}

/// Clause for a table not under search: membership plus its extracted
/// filters, forced INNER when filters exist.
fn child_clause(
    config: &JoinConfig,
    extracted: &BTreeMap<String, Vec<QueryNode>>,
    table: &str,
    mode: JoinMode,
) -> JoinClause {
    let (query, mode) = match table_filters(extracted, table) {
        Some(filters) => {
            let mut parts = vec![table_query(config, table)];
            parts.extend(filters.iter().cloned());
            (QueryNode::and(parts), JoinMode::Inner)
        }
        None => (table_query(config, table), mode),
    };
    attributed_clause(config, table, query, mode)
}

/// Clause at the shared join field carrying the table's boost and rollup.
fn attributed_clause(
    config: &JoinConfig,
    table: &str,
    query: QueryNode,
    mode: JoinMode,
) -> JoinClause {
    let mut clause = JoinClause::new(query, mode, &config.join_field, &config.join_field);
    let (boost, rollup) = clause_limits(config, table);
    clause.boost = boost;
    clause.rollup_limit = rollup;
    clause
}

#[cfg(test)]
mod tests {
    use crate::join::config::JoinConfig;
    use crate::join::joiner::{Joiner, QueryTransformer, CHILD_DOC_MATCH_EVENT};
    use crate::query::{FacetFilter, JoinMode, QueryLanguage, QueryRequest};
    use std::collections::BTreeMap;

    fn config() -> JoinConfig {
        JoinConfig {
            primary_tables: vec!["dataTable".to_string()],
            child_tables: BTreeMap::from([
                ("metadata".to_string(), JoinMode::Inner),
                ("other".to_string(), JoinMode::Outer),
            ]),
            join_field: "metadataLink".to_string(),
            strict_child_matching: true,
            allow_child_only_search: true,
            ..JoinConfig::default()
        }
        .facet_fields("metadata", "topic, company")
    }

    fn process(config: JoinConfig, request: &mut QueryRequest) {
        Joiner::new(config).unwrap().process_query(request).unwrap();
    }

    #[test]
    fn test_first_pass_searches_parent_table_only() {
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        process(config(), &mut request);
        assert_eq!(
            request.query_string(),
            "JOIN(AND(OR(table:dataTable), SUB(content:electronic)), \
             INNER(table:metadata, on=metadataLink:metadataLink, rollup=10), \
             OUTER(table:other, on=metadataLink:metadataLink, rollup=10))"
        );
        assert!(request.property_bool("wasStrictJoin", false));
    }

    #[test]
    fn test_second_pass_searches_children_only() {
        let mut request = QueryRequest::new("placeholder", QueryLanguage::Simple);
        request.resubmits = 1;
        request.set_property("wasStrictJoin", true);
        request.set_property("original_query", "content:electronic");
        request.set_property("original_language", "simple");
        let feedback = Joiner::new(config())
            .unwrap()
            .process_query(&mut request)
            .unwrap();

        let text = request.query_string();
        assert!(text.starts_with("OR(JOIN("));
        assert_eq!(text.matches("JOIN(").count(), 2);
        assert!(text.contains("INNER(AND(table:metadata, SUB(content:electronic))"));
        assert!(text.contains("INNER(AND(table:other, SUB(content:electronic))"));
        assert!(!text.contains("placeholder"));
        // No parent-only join: every join base is the plain from-query.
        assert!(!text.contains("AND(OR(table:dataTable)"));
        assert!(!request.property_bool("wasStrictJoin", false));
        assert!(feedback
            .iter()
            .any(|f| f.name == CHILD_DOC_MATCH_EVENT));
    }

    #[test]
    fn test_child_doc_match_signal_emitted_without_feedback_flag() {
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        request.set_property("wasStrictJoin", true);
        let feedback = Joiner::new(config())
            .unwrap()
            .process_query(&mut request)
            .unwrap();
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback[0].name, CHILD_DOC_MATCH_EVENT);
    }

    #[test]
    fn test_without_child_only_search_builds_full_disjunction() {
        let mut cfg = config();
        cfg.allow_child_only_search = false;
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        process(cfg, &mut request);

        let text = request.query_string();
        assert!(text.starts_with("OR(JOIN("));
        assert_eq!(text.matches("JOIN(").count(), 3);
        // The last join is the parent-only one.
        assert!(text.contains("JOIN(AND(OR(table:dataTable), SUB(content:electronic))"));
        assert!(!request.property_bool("wasStrictJoin", false));
    }

    #[test]
    fn test_under_search_clause_carries_user_query_and_filters() {
        let mut cfg = config();
        cfg.allow_child_only_search = false;
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        request.facet_filters.push(FacetFilter::new("topic", "management"));
        process(cfg, &mut request);

        let text = request.query_string();
        assert!(text.contains(
            "INNER(AND(table:metadata, SUB(content:electronic), SUB(topic:management)), \
             on=metadataLink:metadataLink, rollup=10)"
        ));
        // Not under search, metadata still keeps its filters and goes INNER.
        assert!(text.contains(
            "INNER(AND(table:metadata, SUB(topic:management)), \
             on=metadataLink:metadataLink, rollup=10)"
        ));
    }

    #[test]
    fn test_strict_clauses_keep_facet_aggregation() {
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        process(config(), &mut request);
        assert!(!request.query_string().contains("facet=false"));
    }

    #[test]
    fn test_strict_clause_boost_and_rollup() {
        let mut cfg = config();
        cfg.table_boosts.insert("metadata".to_string(), 2);
        cfg.max_child_docs.insert("other".to_string(), -1);
        let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
        process(cfg, &mut request);
        let text = request.query_string();
        assert!(text.contains("INNER(table:metadata, on=metadataLink:metadataLink, boost=2, rollup=10)"));
        assert!(text.contains("OUTER(table:other, on=metadataLink:metadataLink)"));
    }
}
