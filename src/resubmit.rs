//! Response-side routing: decide whether a zero-hit response warrants
//! resubmitting a transformed request.
//!
//! Both routers are pure decision functions over one response. They mutate
//! only the request carried inside it, and only on the resubmit path: the
//! relaxed router widens the query, the strict router leaves the query alone
//! and lets the join stage's phase logic build the fallback shape.

use crate::join::config::{prefixed, WAS_STRICT_JOIN_PROP};
use crate::query::{PipelineMessage, QueryLanguage, QueryNode, WrapperKind};

/// Response-side pipeline stage: names the workflow to resubmit to, or
/// nothing when the response should stand.
pub trait ResponseRouter {
    fn routing_key(&self, message: &mut PipelineMessage) -> Option<String>;
}

/// Wrapper layers peeled off before inspecting the query shape. Wrappers
/// can reappear around the query a join layer exposes, so the join kinds
/// are followed by a second wrapper pass.
const UNWRAP_ORDER: [WrapperKind; 6] = [
    WrapperKind::AccessControl,
    WrapperKind::Boost,
    WrapperKind::CompositeJoin,
    WrapperKind::Join,
    WrapperKind::AccessControl,
    WrapperKind::Boost,
];

/// Resubmits a zero-hit query with its strict conjunction widened into a
/// disjunction.
pub struct RelaxedResubmitter {
    workflow: String,
}

impl RelaxedResubmitter {
    pub fn new(workflow: &str) -> Self {
        RelaxedResubmitter {
            workflow: workflow.to_string(),
        }
    }
}

impl ResponseRouter for RelaxedResubmitter {
    fn routing_key(&self, message: &mut PipelineMessage) -> Option<String> {
        let PipelineMessage::Response(response) = message else {
            return None;
        };
        if !response.documents.is_empty() {
            return None;
        }
        let request = &mut response.request;
        if request.resubmits >= request.max_resubmits {
            return None;
        }
        let relaxed = relax(&request.query)?;
        request.increment_resubmits();
        let text = relaxed.to_string();
        request.set_query_str(&text, QueryLanguage::Advanced);
        Some(self.workflow.clone())
    }
}

/// Widen a conjunction into a disjunction, peeling wrapper layers first.
/// `None` means the shape is not relaxable.
fn relax(query: &QueryNode) -> Option<QueryNode> {
    let mut current = query;
    for kind in UNWRAP_ORDER {
        if let Some((inner, found)) = current.unwrap_layer() {
            if found == kind {
                current = inner;
            }
        }
    }
    match current {
        QueryNode::And { clauses } => Some(QueryNode::or(clauses.clone())),
        QueryNode::Sub { query, .. } => match query.as_ref() {
            QueryNode::And { clauses } => Some(QueryNode::or(clauses.clone())),
            // Already maximally relaxed; the empty disjunction is still a
            // successful outcome.
            QueryNode::Or { .. } => Some(QueryNode::or(Vec::new())),
            _ => None,
        },
        QueryNode::Term { text } => {
            if text.contains('"') {
                Some(QueryNode::or(Vec::new()))
            } else {
                let tokens = text.split_whitespace().map(QueryNode::term).collect();
                Some(QueryNode::or(tokens))
            }
        }
        _ => None,
    }
}

/// Resubmits a zero-hit query whose previous pass used a strict join, so
/// the join stage can fall back to the wider shape.
pub struct StrictResubmitter {
    workflow: String,
    was_strict_key: String,
}

impl StrictResubmitter {
    pub fn new(workflow: &str) -> Self {
        Self::with_property_prefix(workflow, None)
    }

    /// Pairs with a joiner configured with the same property prefix.
    pub fn with_property_prefix(workflow: &str, property_prefix: Option<&str>) -> Self {
        StrictResubmitter {
            workflow: workflow.to_string(),
            was_strict_key: prefixed(property_prefix, WAS_STRICT_JOIN_PROP),
        }
    }
}

impl ResponseRouter for StrictResubmitter {
    fn routing_key(&self, message: &mut PipelineMessage) -> Option<String> {
        let PipelineMessage::Response(response) = message else {
            return None;
        };
        let request = &mut response.request;
        if request.resubmits >= request.max_resubmits {
            return None;
        }
        if response.documents.is_empty() && request.property_bool(&self.was_strict_key, false) {
            request.increment_resubmits();
            return Some(self.workflow.clone());
        }
        None
    }
}
