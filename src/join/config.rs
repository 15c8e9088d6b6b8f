//! Joiner configuration and the property keys it persists state under.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::query::JoinMode;

/// Property key holding the query text active before join construction.
pub const ORIGINAL_QUERY_PROP: &str = "original_query";
/// Property key holding the pre-join query language tag.
pub const ORIGINAL_LANGUAGE_PROP: &str = "original_language";
/// Property key holding the first-pass filter snapshot.
pub const FILTERS_PROP: &str = "filters";
/// Property key holding the first-pass facet-filter snapshot.
pub const FACET_FILTERS_PROP: &str = "facetFilters";
/// Property key flagging that the previous pass built a strict join.
pub const WAS_STRICT_JOIN_PROP: &str = "wasStrictJoin";

/// Property keys resolved for one joiner instance.
///
/// Pipelines running several joiners can give each instance a prefix so
/// their persisted state does not collide on the shared request.
#[derive(Debug, Clone)]
pub struct PropertyKeys {
    pub original_query: String,
    pub original_language: String,
    pub filters: String,
    pub facet_filters: String,
    pub was_strict_join: String,
}

impl PropertyKeys {
    pub fn new(prefix: Option<&str>) -> Self {
        PropertyKeys {
            original_query: prefixed(prefix, ORIGINAL_QUERY_PROP),
            original_language: prefixed(prefix, ORIGINAL_LANGUAGE_PROP),
            filters: prefixed(prefix, FILTERS_PROP),
            facet_filters: prefixed(prefix, FACET_FILTERS_PROP),
            was_strict_join: prefixed(prefix, WAS_STRICT_JOIN_PROP),
        }
    }
}

pub(crate) fn prefixed(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(p) => format!("{}.{}", p, name),
        None => name.to_string(),
    }
}

/// Settings for one join-building stage.
///
/// Constructed once, read-only afterwards. Table maps are ordered so clause
/// order is stable across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Tables whose records the join ultimately returns.
    pub primary_tables: Vec<String>,
    /// Alternative to `primary_tables`: every table except these is primary.
    pub non_primary_tables: Vec<String>,
    /// Child tables joined onto primary records, with their join mode.
    pub child_tables: BTreeMap<String, JoinMode>,
    /// Field shared between primary and child records.
    pub join_field: String,
    /// Per-table join field overrides, used in multi-field mode.
    pub join_fields: BTreeMap<String, String>,
    /// Max child rows attached per parent row. Absent means 10, negative
    /// means unlimited.
    pub max_child_docs: BTreeMap<String, i64>,
    pub table_boosts: BTreeMap<String, i32>,
    /// Fields whose filters belong to a child table, per table. Drives
    /// extraction.
    pub child_table_facet_fields: BTreeMap<String, Vec<String>>,
    /// Tables whose clause keeps facet aggregation enabled.
    pub facet_count_tables: Vec<String>,
    /// Field carrying collection membership on every record.
    pub collection_field: String,
    pub strict_child_matching: bool,
    pub allow_child_only_search: bool,
    /// Build per-table-field joins instead of a composite join.
    pub multi_field: bool,
    /// In multi-field mode, add per-table joins searching child content.
    pub mimic_composite: bool,
    /// Leave advanced-language queries untouched.
    pub ignore_advanced_queries: bool,
    pub provide_feedback: bool,
    /// Namespace for persisted property keys.
    pub property_prefix: Option<String>,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            primary_tables: Vec::new(),
            non_primary_tables: Vec::new(),
            child_tables: BTreeMap::new(),
            join_field: String::new(),
            join_fields: BTreeMap::new(),
            max_child_docs: BTreeMap::new(),
            table_boosts: BTreeMap::new(),
            child_table_facet_fields: BTreeMap::new(),
            facet_count_tables: Vec::new(),
            collection_field: "table".to_string(),
            strict_child_matching: false,
            allow_child_only_search: false,
            multi_field: false,
            mimic_composite: false,
            ignore_advanced_queries: false,
            provide_feedback: false,
            property_prefix: None,
        }
    }
}

impl JoinConfig {
    /// Reject configurations that would produce an undefined join.
    pub fn validate(&self) -> Result<()> {
        if self.primary_tables.is_empty() && self.non_primary_tables.is_empty() {
            bail!("either primary or non-primary tables must be configured");
        }
        if !self.primary_tables.is_empty() && !self.non_primary_tables.is_empty() {
            bail!("primary and non-primary tables are mutually exclusive");
        }
        if self.join_field.is_empty() {
            bail!("a join field must be configured");
        }
        if self.child_tables.is_empty() {
            bail!("at least one child table must be configured");
        }
        Ok(())
    }

    /// Declare a table's facet fields from a comma-separated list.
    pub fn facet_fields(mut self, table: &str, fields: &str) -> Self {
        let parsed = fields
            .split(',')
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        self.child_table_facet_fields.insert(table.to_string(), parsed);
        self
    }

    pub fn property_keys(&self) -> PropertyKeys {
        PropertyKeys::new(self.property_prefix.as_deref())
    }
}
