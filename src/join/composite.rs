//! Composite join construction, the default tree shape.
//!
//! One `CompositeJoin` node: the user query as base, the from-query
//! selecting parent rows, and one clause per child table. Any parent row
//! matching the base query comes back with its child rows of every clause
//! that matches.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::join::config::{JoinConfig, PropertyKeys};
use crate::join::joiner::{
    clause_limits, from_query, table_filters, table_query, JoinStrategy, JOIN_EVENT,
};
use crate::query::{CompositeClause, FeedbackLog, JoinMode, QueryNode, QueryRequest};

pub(crate) struct CompositeStrategy;

impl JoinStrategy for CompositeStrategy {
    fn build(
        &self,
        config: &JoinConfig,
        _keys: &PropertyKeys,
        extracted: &BTreeMap<String, Vec<QueryNode>>,
        request: &mut QueryRequest,
        log: &mut FeedbackLog,
    ) -> Result<QueryNode> {
        let mut clauses = Vec::with_capacity(config.child_tables.len());
        for (table, mode) in &config.child_tables {
            let membership = table_query(config, table);
            // An extracted filter implies the child row is required, so the
            // clause cannot stay OUTER.
            let mut clause = match table_filters(extracted, table) {
                Some(filters) => {
                    let mut parts = vec![membership];
                    parts.extend(filters.iter().cloned());
                    CompositeClause::new(QueryNode::and(parts), JoinMode::Inner)
                }
                None => CompositeClause::new(membership, *mode),
            };
            let (boost, rollup) = clause_limits(config, table);
            clause.boost = boost;
            clause.rollup_limit = rollup;
            clause.facet = config.facet_count_tables.iter().any(|t| t == table);
            log.trace(
                JOIN_EVENT,
                &format!("Adding composite clause for {}: {}", table, clause),
            );
            clauses.push(clause);
        }

        Ok(QueryNode::CompositeJoin {
            query: Box::new(request.query.clone()),
            from_query: Box::new(from_query(config)?),
            field: config.join_field.clone(),
            clauses,
        })
    }
}
