//! Facet-filter extraction.
//!
//! Splits the request's filter-query and facet-filter lists into filters
//! kept on the primary request and per-child-table sub-queries to be scoped
//! into join clauses. Classification is textual: a filter belongs to a table
//! when its rendered form mentions one of the table's configured facet
//! fields.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::BTreeMap;

use crate::facet::range;
use crate::join::{JoinConfig, PropertyKeys};
use crate::query::{FeedbackLog, QueryNode, QueryRequest, USER_QUERY_PARAM};

const EXTRACTION_EVENT: &str = "facetFilterExtraction";

struct FieldMatcher {
    table: String,
    field: String,
    pattern: Regex,
}

/// Classifies request filters against the configured child-table facet
/// fields. Patterns are compiled once per configured field.
pub struct FilterExtractor {
    matchers: Vec<FieldMatcher>,
    tables: Vec<String>,
}

impl FilterExtractor {
    pub fn new(config: &JoinConfig) -> Result<Self> {
        let mut matchers = Vec::new();
        for (table, fields) in &config.child_table_facet_fields {
            for field in fields {
                let pattern = format!("{}:FACET.(.*).,?", regex::escape(field));
                let pattern = Regex::new(&pattern)
                    .with_context(|| format!("bad facet pattern for field '{}'", field))?;
                matchers.push(FieldMatcher {
                    table: table.clone(),
                    field: field.clone(),
                    pattern,
                });
            }
        }
        let tables = config.child_table_facet_fields.keys().cloned().collect();
        Ok(FilterExtractor { matchers, tables })
    }

    /// Split the request's filters into kept and extracted sets.
    ///
    /// Returns one entry per configured facet table, holding the sub-queries
    /// claimed for it. The request's filter and facet-filter lists are
    /// replaced with the kept subsets. On the first pass the original lists
    /// are snapshotted into properties; a resubmitted request scans the
    /// snapshotted filters instead of the already-stripped live list. Facet
    /// filters are always scanned live.
    pub fn extract(
        &self,
        keys: &PropertyKeys,
        request: &mut QueryRequest,
        log: &mut FeedbackLog,
    ) -> BTreeMap<String, Vec<QueryNode>> {
        let mut extracted: BTreeMap<String, Vec<QueryNode>> = self
            .tables
            .iter()
            .map(|t| (t.clone(), Vec::new()))
            .collect();

        let first_pass = request.resubmits == 0 || !request.has_property(&keys.filters);
        let scan_filters: Vec<QueryNode> = if first_pass {
            let filter_strings: Vec<String> =
                request.filters.iter().map(|f| f.to_string()).collect();
            request.set_property(&keys.filters, filter_strings);
            let facet_strings: Vec<String> =
                request.facet_filters.iter().map(|f| f.to_string()).collect();
            request.set_property(&keys.facet_filters, facet_strings);
            std::mem::take(&mut request.filters)
        } else {
            request
                .property_str_list(&keys.filters)
                .map(|list| list.iter().map(|s| QueryNode::term(s)).collect())
                .unwrap_or_default()
        };

        let mut kept_filters = Vec::new();
        for filter in scan_filters {
            let text = filter.to_string();
            match self.claiming_table(&text) {
                Some(table) => {
                    log.trace(
                        EXTRACTION_EVENT,
                        &format!("Moving filter into the {} join clause: {}", table, text),
                    );
                    extracted.entry(table.to_string()).or_default().push(filter);
                }
                None => {
                    log.trace(
                        EXTRACTION_EVENT,
                        &format!("Filter matches no child table field, keeping: {}", text),
                    );
                    kept_filters.push(filter);
                }
            }
        }
        request.filters = kept_filters;

        let mut kept_facets = Vec::new();
        for facet in std::mem::take(&mut request.facet_filters) {
            let text = facet.to_string();
            match self.extract_facet(&text) {
                Some((table, Some(scoped))) => {
                    log.trace(
                        EXTRACTION_EVENT,
                        &format!("Scoping facet filter to the {} join clause: {}", table, scoped),
                    );
                    extracted.entry(table.to_string()).or_default().push(scoped);
                }
                Some((table, None)) => {
                    log.trace(
                        EXTRACTION_EVENT,
                        &format!("Facet filter for {} carried no value, removing: {}", table, text),
                    );
                }
                None => {
                    log.trace(
                        EXTRACTION_EVENT,
                        &format!("Filter matches no child table field, keeping: {}", text),
                    );
                    kept_facets.push(facet);
                }
            }
        }
        request.facet_filters = kept_facets;

        extracted
    }

    /// Table whose facet fields claim a rendered filter query, if any.
    fn claiming_table(&self, text: &str) -> Option<&str> {
        self.matchers
            .iter()
            .find(|m| text.contains(&m.field))
            .map(|m| m.table.as_str())
    }

    /// Classify one rendered facet filter. `Some` means it was claimed and
    /// must be removed; the inner option is the scoped sub-query, absent when
    /// the pattern matched without capturing a value.
    fn extract_facet(&self, text: &str) -> Option<(&str, Option<QueryNode>)> {
        for m in &self.matchers {
            if !text.contains(&m.field) {
                continue;
            }
            let Some(caps) = m.pattern.captures(text) else {
                continue;
            };
            let mut value = caps[1].to_string();
            if value.is_empty() {
                return Some((m.table.as_str(), None));
            }
            // The greedy capture swallows the close delimiter.
            value.pop();
            let value = range::rewrite(&value);
            let scoped = QueryNode::sub_with(
                QueryNode::term(&format!("{}:{}", m.field, value)),
                USER_QUERY_PARAM,
                "false",
            );
            return Some((m.table.as_str(), Some(scoped)));
        }
        None
    }
}
