use call_analysis::response::{
    decode, normalize_body, parse_response, scan, strip_response, strip_tags, BodyDecoder,
    Captures, ResponseParser,
};
use serde_json::{json, Value};

const TOP: &str = "response";

// ── scan ──────────────────────────────────────────────────────────────────────

#[test]
fn scan_captures_child_text_only() {
    let text = "noise <response><response_body>{\"a\":1}</response_body></response> trailing";
    let captures = scan(text, TOP);
    let expected: Captures = [("response_body", "{\"a\":1}")].into_iter().collect();
    assert_eq!(captures, expected);
}

#[test]
fn scan_without_top_level_tag_is_empty() {
    assert!(scan("just some prose, no envelope", TOP).is_empty());
    assert!(scan("<response_body>{}</response_body>", TOP).is_empty());
    assert!(scan("", TOP).is_empty());
}

#[test]
fn scan_top_level_direct_text_goes_under_its_own_name() {
    let captures = scan("<response>intro<a>x</a></response>", TOP);
    assert_eq!(captures.get("response"), Some("intro"));
    assert_eq!(captures.get("a"), Some("x"));
}

#[test]
fn scan_repeated_tags_concatenate_in_order() {
    let captures = scan("<response><x>a</x><x>b</x></response>", TOP);
    assert_eq!(captures.get("x"), Some("ab"));
    assert_eq!(captures.len(), 1);
}

#[test]
fn scan_drops_text_between_children() {
    let captures = scan("<response><a>1</a> lost <b>2</b> also lost</response>", TOP);
    assert_eq!(captures.get("a"), Some("1"));
    assert_eq!(captures.get("b"), Some("2"));
    assert_eq!(captures.get("response"), None);
}

#[test]
fn scan_deep_nesting_collapses_onto_latest_tag() {
    let captures = scan("<response><a>x<b>y</b>z<c>w</c></a></response>", TOP);
    assert_eq!(captures.get("a"), Some("x"));
    assert_eq!(captures.get("b"), Some("y"));
    assert_eq!(captures.get("c"), Some("w"));
}

#[test]
fn scan_top_level_tag_is_case_sensitive() {
    assert!(scan("<Response><a>x</a></Response>", TOP).is_empty());
    // A mismatched close does not end the envelope.
    let captures = scan("<response><a>x</a></RESPONSE><b>y</b>", TOP);
    assert_eq!(captures.get("b"), Some("y"));
}

#[test]
fn scan_unterminated_envelope_keeps_partial_capture() {
    let captures = scan("<response><response_body>{\"a\": 1", TOP);
    assert_eq!(captures.get("response_body"), Some("{\"a\": 1"));
}

#[test]
fn scan_ignores_tags_outside_envelope() {
    let text = "<x>before</x><response><y>in</y></response><x>after</x>";
    let captures = scan(text, TOP);
    assert_eq!(captures.get("x"), None);
    assert_eq!(captures.get("y"), Some("in"));
}

#[test]
fn scan_second_envelope_keeps_accumulating() {
    let captures = scan("<response><a>1</a></response> mid <response><a>2</a></response>", TOP);
    assert_eq!(captures.get("a"), Some("12"));
}

#[test]
fn scan_custom_top_level_tag() {
    let captures = scan("<answer><body>42</body></answer>", "answer");
    assert_eq!(captures.get("body"), Some("42"));
}

#[test]
fn scan_is_deterministic() {
    let text = "pre <response><a>1</a><b>2</b><a>3</a></response>";
    let captures = scan(text, TOP);
    assert_eq!(captures, scan(text, TOP));
    let order: Vec<&str> = captures.iter().map(|(k, _)| k).collect();
    assert_eq!(order, vec!["a", "b"]);
    assert_eq!(captures.get("a"), Some("13"));
}

// ── streaming ─────────────────────────────────────────────────────────────────

#[test]
fn chunked_feed_matches_whole_scan_at_every_split() {
    let text = "Here you go: <response>\n<response_body>\n{\"k\": \"v < w\"}\n</response_body>\n<!-- c --></response> bye";
    let whole = scan(text, TOP);
    for (split, _) in text.char_indices() {
        let mut parser = ResponseParser::new();
        parser.feed(&text[..split]);
        parser.feed(&text[split..]);
        assert_eq!(parser.into_captures(), whole, "split at {split}");
    }
}

#[test]
fn char_by_char_feed_matches_whole_scan() {
    let text = "x <response><a>é</a><b/>tail<c>z</c></response>";
    let mut parser = ResponseParser::new();
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        parser.feed(ch.encode_utf8(&mut buf));
    }
    assert_eq!(parser.into_captures(), scan(text, TOP));
}

#[test]
fn has_values_reflects_progress() {
    let mut parser = ResponseParser::new();
    assert!(!parser.has_values());
    parser.feed("<response><a>");
    assert!(!parser.has_values());
    parser.feed("x");
    assert!(parser.has_values());
}

// ── decode ────────────────────────────────────────────────────────────────────

#[test]
fn decode_end_to_end_example() {
    let text = "noise <response><response_body>{\"a\":1}</response_body></response> trailing";
    let record = decode(scan(text, TOP)).unwrap();
    assert_eq!(record.body(), Some(&json!({"a": 1})));
    assert!(record.body_is_structured());
    assert_eq!(record.get("prompt"), Some(&Value::Null));
}

#[test]
fn decode_missing_body_is_null_not_error() {
    let record = parse_response("The model refused to answer.").unwrap();
    assert_eq!(record.get("response_body"), Some(&Value::Null));
    assert_eq!(record.body(), None);
    assert!(!record.body_is_structured());
    assert_eq!(record.get("prompt"), Some(&Value::Null));
}

#[test]
fn decode_tolerates_wrapped_json() {
    let wrapped = "<response>\n<response_body>\n  {\n    \"title\": \"Call\",\n    \"items\": [1,\n 2]\n}  \n\n</response_body>\n</response>";
    let flat = "<response><response_body>{\"title\": \"Call\", \"items\": [1, 2]}</response_body></response>";
    let a = parse_response(wrapped).unwrap();
    let b = parse_response(flat).unwrap();
    assert_eq!(a.body(), b.body());
    assert_eq!(a.body(), Some(&json!({"title": "Call", "items": [1, 2]})));
}

#[test]
fn normalize_is_idempotent() {
    let raw = "\n  {\"a\":\n 1}\n \n";
    let once = normalize_body(raw);
    assert_eq!(once, "{\"a\": 1}");
    assert_eq!(normalize_body(&once), once);
}

#[test]
fn decode_invalid_json_is_an_error() {
    let err = parse_response("<response><response_body>{\"a\": </response_body></response>")
        .unwrap_err();
    assert_eq!(err.field, "response_body");
    assert_eq!(err.text, "{\"a\":");
    assert!(err.to_string().contains("response_body"));
}

#[test]
fn decode_truncated_reply_is_an_error() {
    assert!(parse_response("<response><response_body>{\"a\": [1, 2").is_err());
}

#[test]
fn decode_control_character_in_string_is_an_error() {
    let reply = "<response><response_body>{\"a\": \"tab\there\"}</response_body></response>";
    assert!(parse_response(reply).is_err());
}

#[test]
fn decode_keeps_other_fields_as_text() {
    let reply = "<response><thinking>hmm</thinking><response_body>[1, \"two\"]</response_body><prompt>p</prompt></response>";
    let record = parse_response(reply).unwrap();
    assert_eq!(record.get("thinking"), Some(&json!("hmm")));
    assert_eq!(record.body(), Some(&json!([1, "two"])));
    assert_eq!(record.get("prompt"), Some(&json!("p")));
    let keys: Vec<&str> = record.fields().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["thinking", "response_body", "prompt"]);
    assert_eq!(record.len(), 3);
}

#[test]
fn decode_scalar_body() {
    let record = parse_response("<response><response_body> 42 </response_body></response>").unwrap();
    assert_eq!(record.body(), Some(&json!(42)));
}

#[test]
fn decode_with_custom_field_names() {
    let mut parser = ResponseParser::new()
        .with_top_level_tag("out")
        .with_decoder(BodyDecoder::new("json", "context"));
    parser.feed("<out><json>{\"ok\": true}</json></out>");
    let record = parser.into_record().unwrap();
    assert_eq!(record.body(), Some(&json!({"ok": true})));
    assert_eq!(record.get("context"), Some(&Value::Null));
    assert_eq!(record.get("prompt"), None);
}

#[test]
fn record_serializes_in_capture_order() {
    let record = parse_response("<response><z>last?</z><response_body>{}</response_body></response>")
        .unwrap();
    let json = serde_json::to_string(&record).unwrap();
    assert_eq!(json, r#"{"z":"last?","response_body":{},"prompt":null}"#);
    assert_eq!(record.to_value(), json!({"z": "last?", "response_body": {}, "prompt": null}));
}

// ── strip_tags ────────────────────────────────────────────────────────────────

#[test]
fn strip_end_to_end_example() {
    let text = "noise <response><response_body>{\"a\":1}</response_body></response> trailing";
    assert_eq!(strip_tags(text, "response"), "noise  trailing");
    assert_eq!(strip_response(text), "noise  trailing");
}

#[test]
fn strip_without_occurrence_is_unchanged() {
    let text = "nothing to see <here>";
    assert_eq!(strip_tags(text, "response"), text);
}

#[test]
fn strip_is_idempotent() {
    let text = "a<response>x</response>b";
    let once = strip_tags(text, "response").into_owned();
    assert_eq!(once, "ab");
    assert_eq!(strip_tags(&once, "response"), once);
}

#[test]
fn strip_spans_newlines_and_is_non_greedy() {
    let text = "1<response>\nx\n</response>2<response>y</response>3";
    assert_eq!(strip_tags(text, "response"), "123");
}

#[test]
fn strip_leaves_unclosed_tag() {
    let text = "keep <response> no close";
    assert_eq!(strip_tags(text, "response"), text);
}

#[test]
fn strip_escapes_tag_name() {
    let text = "a<t.x>1</t.x>b<tax>2</tax>c";
    assert_eq!(strip_tags(text, "t.x"), "ab<tax>2</tax>c");
}
