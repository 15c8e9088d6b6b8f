#![no_main]

use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use qjoin::facet::FilterExtractor;
use qjoin::join::{JoinConfig, PropertyKeys};
use qjoin::query::{FacetFilter, FeedbackLog, JoinMode, QueryLanguage, QueryNode, QueryRequest};

static EXTRACTOR: OnceLock<(FilterExtractor, PropertyKeys)> = OnceLock::new();

fuzz_target!(|data: &str| {
    // Fuzz extraction with arbitrary filter and facet payloads
    // This should not panic, whatever the captured value contains
    let (extractor, keys) = EXTRACTOR.get_or_init(|| {
        let config = JoinConfig {
            primary_tables: vec!["dataTable".to_string()],
            child_tables: BTreeMap::from([("metadata".to_string(), JoinMode::Inner)]),
            join_field: "metadataLink".to_string(),
            ..JoinConfig::default()
        }
        .facet_fields("metadata", "topic, company");
        let extractor = FilterExtractor::new(&config).unwrap();
        let keys = config.property_keys();
        (extractor, keys)
    });

    let mut request = QueryRequest::new("content:electronic", QueryLanguage::Simple);
    request.filters.push(QueryNode::term(data));
    request.facet_filters.push(FacetFilter::new("topic", data));
    let mut log = FeedbackLog::new("Joiner", false);
    let _ = extractor.extract(keys, &mut request, &mut log);
});
