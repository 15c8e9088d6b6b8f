//! Multi-field join construction.
//!
//! Child tables may join on different key fields, which a composite join
//! cannot express. The shape is always a field-level join: an initial join
//! for matches in the parent rows and, when mimicking composite behavior,
//! one further join per child table for matches in that table's content.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::join::config::{JoinConfig, PropertyKeys};
use crate::join::joiner::{
    clause_limits, from_query, resolve_join_field, table_filters, table_query, JoinStrategy,
    JOIN_EVENT,
};
use crate::query::{FeedbackLog, JoinClause, JoinMode, QueryNode, QueryRequest};

pub(crate) struct MultiFieldStrategy;

impl JoinStrategy for MultiFieldStrategy {
    fn build(
        &self,
        config: &JoinConfig,
        _keys: &PropertyKeys,
        extracted: &BTreeMap<String, Vec<QueryNode>>,
        request: &mut QueryRequest,
        log: &mut FeedbackLog,
    ) -> Result<QueryNode> {
        let user_query = request.query.clone();
        let initial = initial_join(config, extracted, &user_query)?;
        log.trace(JOIN_EVENT, &format!("Adding initial join: {}", initial));
        if !config.mimic_composite {
            return Ok(initial);
        }

        let mut joins = vec![initial];
        for table in config.child_tables.keys() {
            let join = child_search_join(config, extracted, &user_query, table)?;
            log.trace(
                JOIN_EVENT,
                &format!("Adding join searching {}: {}", table, join),
            );
            joins.push(join);
        }
        Ok(QueryNode::or(joins))
    }
}

/// Join for matches in the parent rows, every child table attached as an
/// ordinary clause at its resolved field.
fn initial_join(
    config: &JoinConfig,
    extracted: &BTreeMap<String, Vec<QueryNode>>,
    user_query: &QueryNode,
) -> Result<QueryNode> {
    let base = QueryNode::and(vec![user_query.clone(), from_query(config)?]);
    let clauses = config
        .child_tables
        .iter()
        .map(|(table, mode)| generic_clause(config, extracted, table, *mode))
        .collect();
    Ok(QueryNode::Join {
        query: Box::new(base),
        clauses,
    })
}

/// Join for a match inside one child table's content.
fn child_search_join(
    config: &JoinConfig,
    extracted: &BTreeMap<String, Vec<QueryNode>>,
    user_query: &QueryNode,
    search_table: &str,
) -> Result<QueryNode> {
    let field = resolve_join_field(config, search_table);
    let mut parts = vec![table_query(config, search_table), user_query.clone()];
    if let Some(filters) = table_filters(extracted, search_table) {
        parts.extend(filters.iter().cloned());
    }
    let mut clauses = vec![attributed_clause(
        config,
        search_table,
        QueryNode::and(parts),
        JoinMode::Inner,
        field,
    )];
    for (table, mode) in &config.child_tables {
        if table == search_table {
            continue;
        }
        clauses.push(generic_clause(config, extracted, table, *mode));
    }
    Ok(QueryNode::Join {
        query: Box::new(from_query(config)?),
        clauses,
    })
}

/// Ordinary clause for a table at its own resolved join field, forced INNER
/// when extracted filters exist.
fn generic_clause(
    config: &JoinConfig,
    extracted: &BTreeMap<String, Vec<QueryNode>>,
    table: &str,
    mode: JoinMode,
) -> JoinClause {
    let field = resolve_join_field(config, table);
    let (query, mode) = match table_filters(extracted, table) {
        Some(filters) => {
            let mut parts = vec![table_query(config, table)];
            parts.extend(filters.iter().cloned());
            (QueryNode::and(parts), JoinMode::Inner)
        }
        None => (table_query(config, table), mode),
    };
    attributed_clause(config, table, query, mode, field)
}

fn attributed_clause(
    config: &JoinConfig,
    table: &str,
    query: QueryNode,
    mode: JoinMode,
    field: &str,
) -> JoinClause {
    let mut clause = JoinClause::new(query, mode, field, field);
    let (boost, rollup) = clause_limits(config, table);
    clause.boost = boost;
    clause.rollup_limit = rollup;
    clause
}
