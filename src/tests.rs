#![allow(clippy::ignored_unit_patterns)]

use crate::{ParsedJson, parse, parse_nd, tape_tag, tape_value};

// Stage 1 needs AVX2+CLMUL; on hosts without them the public API returns
// UnsupportedCpu and there is nothing further to exercise.
macro_rules! require_simd {
    () => {
        if !crate::supported_cpu() {
            return;
        }
    };
}

/// Tag bytes of the tape in order, skipping the raw payload words that
/// follow `l` and `d`.
fn tags(pj: &ParsedJson) -> Vec<u8> {
    let mut out = Vec::with_capacity(pj.tape.len());
    let mut i = 0;
    while i < pj.tape.len() {
        let tag = tape_tag(pj.tape[i]);
        out.push(tag);
        i += if tag == b'l' || tag == b'd' { 2 } else { 1 };
    }
    out
}

/// Checks every open/close pair points at its partner and that containers
/// balance per kind.
fn assert_cross_linked(pj: &ParsedJson) {
    let mut opens: Vec<usize> = Vec::new();
    let mut objects = 0i64;
    let mut arrays = 0i64;
    let mut i = 0;
    while i < pj.tape.len() {
        let word = pj.tape[i];
        match tape_tag(word) {
            b'{' | b'[' => {
                if tape_tag(word) == b'{' {
                    objects += 1;
                } else {
                    arrays += 1;
                }
                opens.push(i);
                i += 1;
            }
            b'}' | b']' => {
                if tape_tag(word) == b'}' {
                    objects -= 1;
                } else {
                    arrays -= 1;
                }
                let open = opens.pop().expect("close without open");
                assert_eq!(tape_value(word) as usize, open, "close must point at open");
                assert_eq!(
                    tape_value(pj.tape[open]) as usize,
                    i,
                    "open must point at close"
                );
                i += 1;
            }
            b'l' | b'd' => i += 2,
            _ => i += 1,
        }
    }
    assert!(opens.is_empty(), "every open must close");
    assert_eq!(objects, 0);
    assert_eq!(arrays, 0);
}

fn string_payload<'a>(pj: &'a ParsedJson, tape_index: usize) -> &'a [u8] {
    assert_eq!(tape_tag(pj.tape[tape_index]), b'"');
    pj.string_at(tape_value(pj.tape[tape_index]))
        .expect("string payload must be in the arena")
}

#[test]
fn tape_object_with_int_and_double() {
    require_simd!();
    let parsed = parse(br#"{"a":1,"b":-2.5e3}"#, None).expect("valid document");
    assert!(parsed.is_valid());
    assert_eq!(tags(&parsed), b"r{\"l\"d}r".to_vec());
    assert_eq!(string_payload(&parsed, 2), b"a");
    assert_eq!(string_payload(&parsed, 5), b"b");
    assert_eq!(parsed.tape[4] as i64, 1);
    assert_eq!(f64::from_bits(parsed.tape[7]), -2500.0);
    assert_cross_linked(&parsed);
    // root header jumps one past the footer, footer points back
    assert_eq!(tape_value(parsed.tape[0]), 10);
    assert_eq!(tape_value(parsed.tape[9]), 0);
}

#[test]
fn tape_array_of_atoms_and_nested_empty() {
    require_simd!();
    let parsed = parse(b"[true,false,null,[]]", None).expect("valid document");
    assert_eq!(tags(&parsed), b"r[tfn[]]r".to_vec());
    // outer [ at 1 pairs with ] at 7, inner [ at 5 with ] at 6
    assert_eq!(tape_value(parsed.tape[1]), 7);
    assert_eq!(tape_value(parsed.tape[7]), 1);
    assert_eq!(tape_value(parsed.tape[5]), 6);
    assert_eq!(tape_value(parsed.tape[6]), 5);
    assert_cross_linked(&parsed);
}

#[test]
fn tape_empty_object() {
    require_simd!();
    let parsed = parse(b"{}", None).expect("valid document");
    assert_eq!(tags(&parsed), b"r{}r".to_vec());
    assert_eq!(tape_value(parsed.tape[1]), 2);
    assert_eq!(tape_value(parsed.tape[2]), 1);
    assert!(parsed.strings.is_empty());
}

#[test]
fn tape_escaped_string_value() {
    require_simd!();
    let parsed = parse(br#"{"x": "a\nb"}"#, None).expect("valid document");
    assert_eq!(tags(&parsed), b"r{\"\"}r".to_vec());
    assert_eq!(string_payload(&parsed, 2), b"x");
    assert_eq!(string_payload(&parsed, 3), b"a\nb");
}

#[test]
fn ndjson_chains_documents() {
    require_simd!();
    let parsed = parse_nd(b"{\"a\":1}\n{\"a\":2}", None).expect("valid stream");
    assert_eq!(tags(&parsed), b"r{\"l}rr{\"l}r".to_vec());
    assert_cross_linked(&parsed);
    // first root: header 0 jumps one past its footer at 6
    assert_eq!(tape_value(parsed.tape[0]), 7);
    assert_eq!(tape_value(parsed.tape[6]), 0);
    // second root: header 7, footer 13
    assert_eq!(tape_value(parsed.tape[7]), 14);
    assert_eq!(tape_value(parsed.tape[13]), 7);
    assert_eq!(parsed.tape[4] as i64, 1);
    assert_eq!(parsed.tape[11] as i64, 2);
}

#[test]
fn ndjson_tolerates_trailing_and_blank_lines() {
    require_simd!();
    let parsed = parse_nd(b"{\"a\":1}\n\n{\"a\":2}\n", None).expect("valid stream");
    assert_eq!(tags(&parsed), b"r{\"l}rr{\"l}r".to_vec());
}

#[test]
fn ndjson_newlines_inside_documents_are_whitespace() {
    require_simd!();
    let parsed = parse_nd(b"{\n  \"a\": [1,\n 2]\n}\n{\"b\":2}", None).expect("valid stream");
    assert_eq!(tags(&parsed), b"r{\"[ll]}rr{\"l}r".to_vec());
    assert_cross_linked(&parsed);
}

#[test]
fn ndjson_back_to_back_roots() {
    require_simd!();
    let parsed = parse_nd(b"{\"a\":1}{\"a\":2}", None).expect("valid stream");
    assert_eq!(tags(&parsed), b"r{\"l}rr{\"l}r".to_vec());
}

#[test]
fn rejects_missing_value() {
    require_simd!();
    assert!(parse(br#"{"a":}"#, None).is_err());
}

#[test]
fn rejects_trailing_garbage_in_single_document_mode() {
    require_simd!();
    assert!(parse(b"{} x", None).is_err());
    assert!(parse(b"{}{}", None).is_err());
    assert!(parse(b"[1] 2", None).is_err());
    // trailing whitespace is fine
    assert!(parse(b"{}  \t ", None).is_ok());
}

#[test]
fn rejects_truncated_documents() {
    require_simd!();
    for doc in [
        &b"{"[..],
        b"[",
        b"[1,",
        b"{\"a\"",
        b"{\"a\":",
        b"{\"a\":1",
        b"[[1]",
    ] {
        assert!(parse(doc, None).is_err(), "{:?}", std::str::from_utf8(doc));
    }
}

#[test]
fn rejects_malformed_structure() {
    require_simd!();
    for doc in [
        &b"{]"[..],
        b"[}",
        b"{\"a\" 1}",
        b"{\"a\":1,}",
        b"[1,]",
        b"[1 2]",
        b"{1:2}",
        b"{\"a\":1 \"b\":2}",
        b"]",
        b"}",
        b"x",
    ] {
        assert!(parse(doc, None).is_err(), "{:?}", std::str::from_utf8(doc));
    }
}

#[test]
fn rejects_bad_scalars() {
    require_simd!();
    for doc in [
        &br#"{"a":tru}"#[..],
        br#"{"a":truth}"#,
        br#"[falsey]"#,
        br#"[nul]"#,
        br#"[01]"#,
        br#"[1.]"#,
        br#"[-]"#,
        br#"[1e]"#,
        br#"["\q"]"#,
        br#"["unterminated]"#,
    ] {
        assert!(parse(doc, None).is_err(), "{:?}", std::str::from_utf8(doc));
    }
}

#[test]
fn rejects_invalid_utf8() {
    require_simd!();
    let err = parse(b"[\"\xff\xfe\"]", None).unwrap_err();
    assert_eq!(*err.error_type(), crate::ErrorType::InvalidUtf8);
}

#[test]
fn rejects_raw_control_character_in_string() {
    require_simd!();
    assert!(parse(b"[\"a\x01b\"]", None).is_err());
}

#[test]
fn rejects_empty_and_whitespace_input() {
    require_simd!();
    assert!(parse(b"", None).is_err());
    assert!(parse(b"   \n ", None).is_err());
    assert!(parse_nd(b"\n\n", None).is_err());
}

#[test]
fn deep_nesting_round_trips() {
    require_simd!();
    let mut doc = String::new();
    for _ in 0..64 {
        doc.push_str("[{\"k\":");
    }
    doc.push_str("null");
    for _ in 0..64 {
        doc.push_str("}]");
    }
    let parsed = parse(doc.as_bytes(), None).expect("deeply nested document");
    assert_cross_linked(&parsed);
    let dumped = parsed.dump_json().expect("dumpable tape");
    let reparsed = parse(dumped.as_bytes(), None).expect("dump must reparse");
    assert_eq!(tags(&parsed), tags(&reparsed));
}

#[test]
fn multi_batch_documents() {
    require_simd!();
    // enough structurals to roll over several index batches
    let mut doc = String::from("[0");
    for i in 1..20_000 {
        doc.push(',');
        doc.push_str(&i.to_string());
    }
    doc.push(']');
    let parsed = parse(doc.as_bytes(), None).expect("large array");
    assert_cross_linked(&parsed);
    // first element: `l` tag word at 2, raw value at 3
    assert_eq!(parsed.tape[3] as i64, 0);
    let last_raw = parsed.tape[parsed.tape.len() - 3];
    assert_eq!(last_raw as i64, 19_999);
}

#[test]
fn buffer_reuse_resets_lengths() {
    require_simd!();
    let first = parse(br#"{"key":"value","n":[1,2,3]}"#, None).expect("valid document");
    let tape_cap = first.tape.capacity();
    let parsed = parse(b"{}", Some(first)).expect("valid document");
    assert_eq!(tags(&parsed), b"r{}r".to_vec());
    assert!(parsed.strings.is_empty());
    // capacity survives the reuse, lengths do not
    assert!(parsed.tape.capacity() >= tape_cap);
}

#[test]
fn duplicate_keys_are_preserved_in_order() {
    require_simd!();
    let parsed = parse(br#"{"a":1,"a":2}"#, None).expect("valid document");
    assert_eq!(tags(&parsed), b"r{\"l\"l}r".to_vec());
    assert_eq!(parsed.tape[4] as i64, 1);
    assert_eq!(parsed.tape[7] as i64, 2);
}

#[test]
fn long_strings_cross_block_boundaries() {
    require_simd!();
    let inner = "x".repeat(200);
    let doc = format!("{{\"long\":\"{inner}\",\"esc\":\"{inner}\\\"{inner}\"}}");
    let parsed = parse(doc.as_bytes(), None).expect("valid document");
    assert_eq!(string_payload(&parsed, 3), inner.as_bytes());
    let expected = format!("{inner}\"{inner}");
    assert_eq!(string_payload(&parsed, 5), expected.as_bytes());
}

#[test]
fn dump_json_round_trip_matches_serde() {
    require_simd!();
    let doc: &[u8] = b"{\"id\":-12,\"pi\":3.25,\"name\":\"sn\xc3\xb6\",\"tags\":[\"a\",\"b\",true,null],\"nested\":{\"empty\":{},\"arr\":[[],[0.5]]}}";
    let parsed = parse(doc, None).expect("valid document");
    let dumped = parsed.dump_json().expect("dumpable tape");

    let ours: serde_json::Value = serde_json::from_str(&dumped).expect("dump must be valid JSON");
    let reference: serde_json::Value =
        serde_json::from_slice(doc).expect("fixture must be valid JSON");
    assert_eq!(ours, reference);

    // reparsing the dump yields the same tape shape
    let reparsed = parse(dumped.as_bytes(), None).expect("dump must reparse");
    assert_eq!(tags(&parsed), tags(&reparsed));
}

#[test]
fn ndjson_dump_keeps_document_boundaries() {
    require_simd!();
    let parsed = parse_nd(b"{\"a\":1}\n[2,3]", None).expect("valid stream");
    let dumped = parsed.dump_json().expect("dumpable tape");
    assert_eq!(dumped, "{\"a\":1}\n[2,3]");
}

#[test]
fn unsupported_cpu_reported() {
    if crate::supported_cpu() {
        return;
    }
    let err = parse(b"{}", None).unwrap_err();
    assert_eq!(*err.error_type(), crate::ErrorType::UnsupportedCpu);
}
