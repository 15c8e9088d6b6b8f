//! Query tree model shared by every rewriting stage.
//!
//! The engine never executes these trees; it only builds them, renders them
//! to the platform's canonical text form, and inspects their shape. Raw
//! query-language text travels as a `Term` node and is carried verbatim,
//! which is how a query restored from a stored string round-trips without a
//! parser for the advanced language.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter marking a synthesized sub-query as (not) the user's own query,
/// so downstream analytics can tell them apart.
pub const USER_QUERY_PARAM: &str = "analytics.userquery";

/// Join semantics for a single clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinMode {
    Inner,
    Outer,
}

impl JoinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinMode::Inner => "INNER",
            JoinMode::Outer => "OUTER",
        }
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clause of a field-level join: a child query attached at a pair of join
/// key fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub query: QueryNode,
    pub mode: JoinMode,
    pub from_field: String,
    pub to_field: String,
    #[serde(default)]
    pub boost: i32,
    #[serde(default)]
    pub rollup_limit: Option<i64>,
    #[serde(default = "default_facet")]
    pub facet: bool,
}

impl JoinClause {
    pub fn new(query: QueryNode, mode: JoinMode, from_field: &str, to_field: &str) -> Self {
        JoinClause {
            query,
            mode,
            from_field: from_field.to_string(),
            to_field: to_field.to_string(),
            boost: 0,
            rollup_limit: None,
            facet: true,
        }
    }
}

impl fmt::Display for JoinClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, on={}:{}",
            self.mode, self.query, self.from_field, self.to_field
        )?;
        write_clause_attrs(f, self.boost, self.rollup_limit, self.facet)?;
        write!(f, ")")
    }
}

/// Clause of a composite join. The join key lives on the composite node, so
/// clauses carry only their predicate and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeClause {
    pub query: QueryNode,
    pub mode: JoinMode,
    #[serde(default)]
    pub boost: i32,
    #[serde(default)]
    pub rollup_limit: Option<i64>,
    #[serde(default = "default_facet")]
    pub facet: bool,
}

impl CompositeClause {
    pub fn new(query: QueryNode, mode: JoinMode) -> Self {
        CompositeClause {
            query,
            mode,
            boost: 0,
            rollup_limit: None,
            facet: true,
        }
    }
}

impl fmt::Display for CompositeClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.mode, self.query)?;
        write_clause_attrs(f, self.boost, self.rollup_limit, self.facet)?;
        write!(f, ")")
    }
}

fn default_facet() -> bool {
    true
}

/// Non-default clause attributes, appended to an open clause rendering.
fn write_clause_attrs(
    f: &mut fmt::Formatter<'_>,
    boost: i32,
    rollup_limit: Option<i64>,
    facet: bool,
) -> fmt::Result {
    if boost != 0 {
        write!(f, ", boost={}", boost)?;
    }
    if let Some(limit) = rollup_limit {
        write!(f, ", rollup={}", limit)?;
    }
    if !facet {
        write!(f, ", facet=false")?;
    }
    Ok(())
}

/// Wrapper layers that upstream stages may put between the pipeline and the
/// query they wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    AccessControl,
    Boost,
    CompositeJoin,
    Join,
}

/// One node of a query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum QueryNode {
    /// Raw query-language text, carried without interpretation.
    Term { text: String },
    /// Single field:value predicate.
    Phrase { field: String, value: String },
    And { clauses: Vec<QueryNode> },
    Or { clauses: Vec<QueryNode> },
    Not { clause: Box<QueryNode> },
    /// Nested query carrying engine-directed parameters.
    Sub {
        query: Box<QueryNode>,
        params: Vec<(String, String)>,
    },
    /// Security trimming applied by an upstream stage.
    AccessControl { query: Box<QueryNode> },
    Boost { query: Box<QueryNode>, boost: i32 },
    Join {
        query: Box<QueryNode>,
        clauses: Vec<JoinClause>,
    },
    CompositeJoin {
        query: Box<QueryNode>,
        from_query: Box<QueryNode>,
        field: String,
        clauses: Vec<CompositeClause>,
    },
}

impl QueryNode {
    pub fn term(text: &str) -> Self {
        QueryNode::Term {
            text: text.to_string(),
        }
    }

    pub fn phrase(field: &str, value: &str) -> Self {
        QueryNode::Phrase {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn and(clauses: Vec<QueryNode>) -> Self {
        QueryNode::And { clauses }
    }

    pub fn or(clauses: Vec<QueryNode>) -> Self {
        QueryNode::Or { clauses }
    }

    pub fn not(clause: QueryNode) -> Self {
        QueryNode::Not {
            clause: Box::new(clause),
        }
    }

    pub fn sub(query: QueryNode) -> Self {
        QueryNode::Sub {
            query: Box::new(query),
            params: Vec::new(),
        }
    }

    /// Sub-query carrying a single parameter.
    pub fn sub_with(query: QueryNode, key: &str, value: &str) -> Self {
        QueryNode::Sub {
            query: Box::new(query),
            params: vec![(key.to_string(), value.to_string())],
        }
    }

    /// Whether the rendered query is (or contains) the match-everything form.
    ///
    /// The substring check is deliberate: a query merely containing `*:*`
    /// somewhere has nothing for a strict join to match on either.
    pub fn is_match_all(&self) -> bool {
        let text = self.to_string();
        text.contains("*:*") || text == "*"
    }

    /// Peel a single wrapper layer, exposing the query it was applied to.
    ///
    /// Join layers expose their base query. Boolean and leaf nodes are not
    /// wrappers and return `None`.
    pub fn unwrap_layer(&self) -> Option<(&QueryNode, WrapperKind)> {
        match self {
            QueryNode::AccessControl { query } => Some((query, WrapperKind::AccessControl)),
            QueryNode::Boost { query, .. } => Some((query, WrapperKind::Boost)),
            QueryNode::CompositeJoin { query, .. } => Some((query, WrapperKind::CompositeJoin)),
            QueryNode::Join { query, .. } => Some((query, WrapperKind::Join)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Term { text } => f.write_str(text),
            QueryNode::Phrase { field, value } => {
                if needs_quoting(value) {
                    write!(f, "{}:\"{}\"", field, value)
                } else {
                    write!(f, "{}:{}", field, value)
                }
            }
            QueryNode::And { clauses } => write_operator(f, "AND", clauses),
            QueryNode::Or { clauses } => write_operator(f, "OR", clauses),
            QueryNode::Not { clause } => write!(f, "NOT({})", clause),
            QueryNode::Sub { query, .. } => write!(f, "SUB({})", query),
            QueryNode::AccessControl { query } => write!(f, "ACL({})", query),
            QueryNode::Boost { query, boost } => write!(f, "BOOST({}, {})", query, boost),
            QueryNode::Join { query, clauses } => {
                write!(f, "JOIN({}", query)?;
                for clause in clauses {
                    write!(f, ", {}", clause)?;
                }
                write!(f, ")")
            }
            QueryNode::CompositeJoin {
                query,
                from_query,
                field,
                clauses,
            } => {
                write!(f, "COMPOSITE({}, FROM({}), on={}", query, from_query, field)?;
                for clause in clauses {
                    write!(f, ", {}", clause)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_operator(f: &mut fmt::Formatter<'_>, name: &str, clauses: &[QueryNode]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", clause)?;
    }
    write!(f, ")")
}

fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '(' | ')' | ','))
}
