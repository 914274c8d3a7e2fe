//! Identifier encoding, B3 extraction and baggage over the wire.

mod common;

use common::{context, fields};
use pretty_assertions::assert_eq;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use urpo_propagation::baggage::{BaggageField, BaggagePropagation, SingleBaggageField};
use urpo_propagation::propagation::{b3, hex, B3Propagation, Extracted};
use urpo_propagation::{SamplingFlags, TraceContext, TraceContextOrSamplingFlags};

fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect()
}

fn hash_of(context: &TraceContext) -> u64 {
    let mut hasher = DefaultHasher::new();
    context.hash(&mut hasher);
    hasher.finish()
}

#[test]
fn test_ids_survive_render_and_parse() {
    for (high, low) in [(0, 1), (0, u64::MAX), (0x463a_c35c_9f64_13ad, 0x4801_9e3f_86ec_d8a1)] {
        let rendered = hex::trace_id_string(high, low);
        assert_eq!(rendered.len(), if high == 0 { 16 } else { 32 });
        assert_eq!(hex::parse_trace_id(&rendered), Some((high, low)));
    }
    for span_id in [1, 0xe457_b5a2_e4d8_6bd1, u64::MAX] {
        assert_eq!(hex::parse_span_id(&hex::to_lower_hex(span_id)), Some(span_id));
    }
    assert_eq!(hex::parse_span_id("0000000000000000"), None);
}

#[test]
fn test_equal_identity_means_equal_hash() {
    let plain = context(7, 9);
    let decorated = plain
        .to_builder()
        .parent_id(3)
        .add_extra(Arc::new("ignored".to_string()))
        .build()
        .unwrap();

    assert_eq!(plain, decorated);
    assert_eq!(hash_of(&plain), hash_of(&decorated));

    let shared = plain.to_builder().shared(true).build().unwrap();
    assert_ne!(plain, shared);
}

#[test]
fn test_malformed_b3_is_empty() {
    let cases = [
        headers(&[(b3::SINGLE, "not-hex-at-all")]),
        headers(&[(b3::SINGLE, "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-x")]),
        headers(&[(b3::TRACE_ID, "463ac35c9f6413ad"), (b3::SPAN_ID, "zz")]),
        headers(&[(b3::TRACE_ID, "00000000000000000000000000000000"), (b3::SPAN_ID, "1")]),
    ];
    for carrier in cases {
        assert_eq!(B3Propagation.extract(&carrier), TraceContextOrSamplingFlags::EMPTY, "{carrier:?}");
    }
}

#[test]
fn test_single_header_wins() {
    let carrier = headers(&[
        (b3::SINGLE, "80f198ee56343ba864fe8b2a57d3eff7-e457b5a2e4d86bd1-d-05e3ac9a4f6e3b90"),
        (b3::TRACE_ID, "463ac35c9f6413ad"),
        (b3::SPAN_ID, "463ac35c9f6413ad"),
    ]);
    let extracted = B3Propagation.extract(&carrier);
    let context = extracted.context().unwrap();
    assert_eq!(context.trace_id_string(), "80f198ee56343ba864fe8b2a57d3eff7");
    assert_eq!(context.span_id_string(), "e457b5a2e4d86bd1");
    assert_eq!(context.parent_id_string(), Some("05e3ac9a4f6e3b90"));
    assert!(context.debug());
    assert_eq!(context.sampled(), Some(true));
}

#[test]
fn test_sampling_only_header() {
    let extracted = B3Propagation.extract(&headers(&[(b3::SINGLE, "0")]));
    assert!(matches!(extracted.value(), Extracted::SamplingFlags(flags) if *flags == SamplingFlags::NOT_SAMPLED));
}

#[test]
fn test_baggage_round_trip_over_headers() {
    let fields = fields(&["country-code", "session"]);
    let propagation = BaggagePropagation::builder()
        .add(SingleBaggageField::remote(fields[0].clone()).add_key_name("baggage-country-code").unwrap().build())
        .unwrap()
        .add(SingleBaggageField::local(fields[1].clone()))
        .unwrap()
        .build();

    let inbound = headers(&[
        (b3::TRACE_ID, "463ac35c9f6413ad"),
        (b3::SPAN_ID, "a2fb4a1d1a96d312"),
        (b3::SAMPLED, "1"),
        ("baggage-country-code", "FO"),
        ("session", "not propagated"),
    ]);
    let extracted = propagation.extract(&inbound);
    assert_eq!(fields[0].get_value(&extracted).as_deref(), Some("FO"));
    assert_eq!(fields[1].get_value(&extracted), None);

    let context = propagation.decorate(extracted.context().unwrap().clone());
    fields[1].update_value(&context, Some("abc"));
    assert_eq!(
        BaggageField::get_all_values(&context),
        vec![
            ("country-code".to_string(), "FO".to_string()),
            ("session".to_string(), "abc".to_string()),
        ]
    );

    let mut outbound = HashMap::new();
    propagation.inject(&context, &mut outbound);
    assert_eq!(outbound.get("country-code").map(String::as_str), Some("FO"));
    assert_eq!(outbound.get(b3::SAMPLED).map(String::as_str), Some("1"));
    assert!(!outbound.contains_key("session"));
}
