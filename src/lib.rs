//! # qjoin - Federated Join-Query Rewriting
//!
//! qjoin rewrites flat search requests into federated join queries so that
//! a logical record split across a primary table and several child tables
//! can be searched, filtered, and faceted as one document.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`query`] - Query trees, requests, responses, and the property bag
//! - [`facet`] - Facet-filter extraction and range rewriting
//! - [`join`] - Join construction strategies (composite, strict, multi-field)
//! - [`resubmit`] - Response-side routers for zero-hit fallbacks
//! - [`output`] - Query tree and feedback formatting
//!
//! ## Quick Start
//!
//! ```ignore
//! use qjoin::join::{JoinConfig, Joiner, QueryTransformer};
//! use qjoin::query::{QueryLanguage, QueryRequest};
//!
//! // Configure the join stage and build the transformer
//! let config: JoinConfig = serde_json::from_str(config_json)?;
//! let joiner = Joiner::new(config)?;
//!
//! // Rewrite an incoming request in place
//! let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
//! let feedback = joiner.process_query(&mut request)?;
//!
//! println!("{}", request.query_string());
//! ```
//!
//! ## Resubmission
//!
//! A transformed query can come back with zero hits. The [`resubmit`]
//! routers inspect such responses and name the workflow to try again on:
//! the strict router replays a request whose first pass used strict child
//! matching, the relaxed router widens a conjunction into a disjunction.
//! Requests carry a resubmit budget, so the round trip always terminates.

pub mod facet;
pub mod join;
pub mod output;
pub mod query;
pub mod resubmit;
