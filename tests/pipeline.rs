//! Integration tests driving the full request/response round trip.
//!
//! These tests run the join stage and the response routers together the way
//! a pipeline would: transform the request, observe a zero-hit response,
//! resubmit, and transform again on the same request object.

use std::collections::BTreeMap;

use qjoin::join::{JoinConfig, Joiner, QueryTransformer, CHILD_DOC_MATCH_EVENT};
use qjoin::query::{
    FacetFilter, JoinMode, PipelineMessage, QueryLanguage, QueryNode, QueryRequest, QueryResponse,
};
use qjoin::resubmit::{RelaxedResubmitter, ResponseRouter, StrictResubmitter};

fn composite_config() -> JoinConfig {
    JoinConfig {
        primary_tables: vec!["dataTable".to_string()],
        child_tables: BTreeMap::from([
            ("metadata".to_string(), JoinMode::Inner),
            ("other".to_string(), JoinMode::Outer),
        ]),
        join_field: "metadataLink".to_string(),
        ..JoinConfig::default()
    }
    .facet_fields("metadata", "topic, company")
    .facet_fields("other", "transaction_amount")
}

fn strict_config() -> JoinConfig {
    let mut config = composite_config();
    config.strict_child_matching = true;
    config.allow_child_only_search = true;
    config
}

fn multi_field_config() -> JoinConfig {
    let mut config = composite_config();
    config.multi_field = true;
    config
        .join_fields
        .insert("other".to_string(), "parentId".to_string());
    config
}

fn zero_hit_response(request: QueryRequest) -> PipelineMessage {
    PipelineMessage::Response(QueryResponse {
        request,
        documents: Vec::new(),
    })
}

fn take_request(message: PipelineMessage) -> QueryRequest {
    match message {
        PipelineMessage::Response(response) => response.request,
        PipelineMessage::Request(request) => request,
    }
}

#[test]
fn test_strict_join_two_pass_round_trip() {
    let joiner = Joiner::new(strict_config()).unwrap();
    let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);

    // First pass searches the parent table only and arms the handshake.
    joiner.process_query(&mut request).unwrap();
    assert_eq!(
        request.query_string(),
        "JOIN(AND(OR(table:dataTable), SUB(content:electronic)), \
         INNER(table:metadata, on=metadataLink:metadataLink, rollup=10), \
         OUTER(table:other, on=metadataLink:metadataLink, rollup=10))"
    );
    assert!(request.property_bool("wasStrictJoin", false));

    // Zero hits: the strict router asks for a resubmission without touching
    // the query.
    let router = StrictResubmitter::new("searchFlow");
    let mut message = zero_hit_response(request);
    assert_eq!(router.routing_key(&mut message), Some("searchFlow".to_string()));
    let mut request = take_request(message);
    assert_eq!(request.resubmits, 1);

    // Second pass restores the original query and searches the children.
    let feedback = joiner.process_query(&mut request).unwrap();
    let text = request.query_string();
    assert!(text.starts_with("OR(JOIN("));
    assert_eq!(text.matches("JOIN(").count(), 2);
    assert!(text.contains(
        "INNER(AND(table:metadata, SUB(content:electronic)), \
         on=metadataLink:metadataLink, rollup=10)"
    ));
    assert!(text.contains(
        "INNER(AND(table:other, SUB(content:electronic)), \
         on=metadataLink:metadataLink, rollup=10)"
    ));
    assert!(!request.property_bool("wasStrictJoin", false));
    assert!(feedback.iter().any(|f| f.name == CHILD_DOC_MATCH_EVENT));

    // Budget spent: another zero-hit response is terminal for both routers.
    let relaxed = RelaxedResubmitter::new("relaxFlow");
    let mut message = zero_hit_response(request);
    assert_eq!(router.routing_key(&mut message), None);
    assert_eq!(relaxed.routing_key(&mut message), None);
    assert_eq!(take_request(message).resubmits, 1);
}

#[test]
fn test_relaxed_round_trip_widens_then_rebuilds_from_original() {
    let joiner = Joiner::new(composite_config()).unwrap();
    let mut request = QueryRequest::new("placeholder", QueryLanguage::Simple);
    request.query = QueryNode::and(vec![
        QueryNode::phrase("color", "red"),
        QueryNode::phrase("size", "large"),
    ]);
    joiner.process_query(&mut request).unwrap();
    let first = request.query_string();
    assert!(first.starts_with("COMPOSITE(AND(color:red, size:large), FROM(OR(table:dataTable))"));

    let router = RelaxedResubmitter::new("relaxFlow");
    let mut message = zero_hit_response(request);
    assert_eq!(router.routing_key(&mut message), Some("relaxFlow".to_string()));
    let mut request = take_request(message);
    assert_eq!(request.query_string(), "OR(color:red, size:large)");
    assert_eq!(request.language, QueryLanguage::Advanced);
    assert_eq!(request.resubmits, 1);

    // If the resubmission flows through the join stage again, the original
    // conjunction is restored from the snapshot and the same join is rebuilt.
    joiner.process_query(&mut request).unwrap();
    assert_eq!(request.query_string(), first);
}

#[test]
fn test_router_chain_falls_through_strict_to_relaxed() {
    // Multi-field mode never arms wasStrictJoin, so the strict router
    // declines and the relaxed router handles the zero-hit response.
    let joiner = Joiner::new(multi_field_config()).unwrap();
    let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
    joiner.process_query(&mut request).unwrap();

    let strict = StrictResubmitter::new("strictFlow");
    let relaxed = RelaxedResubmitter::new("relaxFlow");
    let mut message = zero_hit_response(request);
    let decision = strict
        .routing_key(&mut message)
        .or_else(|| relaxed.routing_key(&mut message));
    assert_eq!(decision, Some("relaxFlow".to_string()));

    let request = take_request(message);
    assert_eq!(
        request.query_string(),
        "OR(content:electronic, OR(table:dataTable))"
    );
    assert_eq!(request.resubmits, 1);
}

#[test]
fn test_filter_snapshot_survives_resubmission_but_facets_read_live() {
    let joiner = Joiner::new(composite_config()).unwrap();
    let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
    request.filters.push(QueryNode::term("topic:management"));
    request.filters.push(QueryNode::term("year:2020"));
    request.facet_filters.push(FacetFilter::new("company", "acme"));
    joiner.process_query(&mut request).unwrap();

    let first = request.query_string();
    assert!(first.contains(
        "INNER(AND(table:metadata, topic:management, SUB(company:acme)), \
         rollup=10, facet=false)"
    ));
    assert_eq!(request.filters.len(), 1);
    assert_eq!(request.filters[0].to_string(), "year:2020");
    assert!(request.facet_filters.is_empty());
    assert!(request.has_property("filters"));
    assert!(request.has_property("facetFilters"));

    // The second pass re-extracts filters from the snapshot; facet filters
    // were consumed on the first pass and are gone.
    request.resubmits = 1;
    joiner.process_query(&mut request).unwrap();
    let second = request.query_string();
    assert!(second.contains(
        "INNER(AND(table:metadata, topic:management), rollup=10, facet=false)"
    ));
    assert!(!second.contains("company:acme"));
    assert_eq!(request.filters.len(), 1);
}
