pub mod node;
pub mod request;

pub use node::QueryNode;
// Re-exports for public API
#[allow(unused_imports)]
pub use node::{CompositeClause, JoinClause, JoinMode, WrapperKind, USER_QUERY_PARAM};
#[allow(unused_imports)]
pub use request::{
    FacetFilter, FeedbackLog, PipelineMessage, PropertyValue, QueryFeedback, QueryLanguage,
    QueryRequest, QueryResponse, SearchDocument,
};
