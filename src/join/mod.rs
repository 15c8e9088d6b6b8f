pub mod composite;
pub mod config;
pub mod joiner;
pub mod multi_field;
pub mod strict;

pub use config::{JoinConfig, PropertyKeys};
pub use joiner::{Joiner, QueryTransformer};
// Re-exports for public API
#[allow(unused_imports)]
pub use config::{
    FACET_FILTERS_PROP, FILTERS_PROP, ORIGINAL_LANGUAGE_PROP, ORIGINAL_QUERY_PROP,
    WAS_STRICT_JOIN_PROP,
};
#[allow(unused_imports)]
pub use joiner::{ADVANCED_SKIP_EVENT, CHILD_DOC_MATCH_EVENT, JOINER_COMPONENT, JOIN_EVENT};
