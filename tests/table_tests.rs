use std::path::Path;

use formtable::{
    AcceptAll, FAILURE_PAGE, ParamError, ParamKind, ParameterTable, RenderError, RequestConfig,
    RequestContext, Rule, RuleSet, TableLimits, Transform, Utf8Check, Verdict, format_debug,
    format_json, render_page, to_xml, validated_table,
};

// =========================================================================
// Scalar fields
// =========================================================================

#[test]
fn add_then_lookup() {
    let mut table = ParameterTable::new();
    table.add("hostname", "router");
    assert_eq!(table.value("hostname"), Some(&b"router"[..]));
    assert_eq!(table.value_str("hostname"), Some("router"));
    assert_eq!(table.value_size("hostname"), Some(6));
    assert_eq!(table.len(), 1);
}

#[test]
fn empty_value_is_present_not_absent() {
    let mut table = ParameterTable::new();
    table.add("comment", "");
    assert_eq!(table.value("comment"), Some(&b""[..]));
    assert_eq!(table.value_size("comment"), Some(0));
}

#[test]
fn unknown_name_yields_absent_everywhere() {
    let table = ParameterTable::new();
    assert!(table.get("nope").is_none());
    assert_eq!(table.value("nope"), None);
    assert_eq!(table.value_size("nope"), None);
    assert_eq!(table.original_value("nope"), None);
    assert_eq!(table.filename("nope"), None);
    assert!(table.children("nope").is_none());
    assert_eq!(table.is_valid("nope"), None);
    assert!(!table.value_as_bool("nope"));
}

#[test]
fn known_name_accessors_are_distinct_from_absent() {
    let mut table = ParameterTable::new();
    table.add("x", "1");
    assert_eq!(table.original_value("x"), Some(None));
    assert_eq!(table.filename("x"), Some(None));
    assert!(matches!(table.children("x"), Some(None)));
    assert_eq!(table.is_valid("x"), Some(Verdict::Unvalidated));
    assert_eq!(table.is_valid_utf8("x"), Some(Verdict::Unvalidated));
}

#[test]
fn value_as_bool_is_false_only_for_zero() {
    let mut table = ParameterTable::new();
    table.add("off", "0");
    table.add("on", "1");
    table.add("empty", "");
    table.add("zeros", "00");
    table.add("word", "false");
    assert!(!table.value_as_bool("off"));
    assert!(table.value_as_bool("on"));
    assert!(table.value_as_bool("empty"));
    assert!(table.value_as_bool("zeros"));
    assert!(table.value_as_bool("word"));
    assert!(!table.value_as_bool("missing"));
}

#[test]
fn embedded_zero_bytes_are_kept() {
    let mut table = ParameterTable::new();
    table.add("bin", b"a\0b\0".as_slice());
    assert_eq!(table.value_size("bin"), Some(4));
    assert_eq!(table.value("bin"), Some(&b"a\0b\0"[..]));
}

#[test]
fn re_add_resets_record() {
    let mut table = ParameterTable::new();
    table.add("f", "bad");
    table.set_filename("f", "a.txt");
    let rules = |_: &str, _: &[u8]| false;
    table.validate(&rules, &Utf8Check);
    assert_eq!(table.is_valid("f"), Some(Verdict::Invalid));
    assert_eq!(table.original_value("f"), Some(Some(&b"bad"[..])));

    table.add("f", "good");
    assert_eq!(table.value("f"), Some(&b"good"[..]));
    assert_eq!(table.is_valid("f"), Some(Verdict::Unvalidated));
    assert_eq!(table.is_valid_utf8("f"), Some(Verdict::Unvalidated));
    assert_eq!(table.original_value("f"), Some(None));
    assert_eq!(table.filename("f"), Some(None));
    assert_eq!(table.len(), 1);
}

#[test]
fn re_add_replaces_array_with_scalar() {
    let mut table = ParameterTable::new();
    table.add_multi("dns").add("0", "1.1.1.1");
    table.add("dns", "8.8.8.8");
    assert!(matches!(table.children("dns"), Some(None)));
    assert_eq!(table.value("dns"), Some(&b"8.8.8.8"[..]));
}

#[test]
fn get_mut_contains_and_clear() {
    let mut table = ParameterTable::new();
    table.add("upload", "data");
    assert!(table.contains("upload"));
    assert!(!table.contains("other"));

    table.get_mut("upload").unwrap().set_filename("a.bin");
    assert_eq!(table.filename("upload"), Some(Some("a.bin")));
    assert!(table.get_mut("other").is_none());

    table.add_multi("list").add("0", "x");
    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.value("upload"), None);
}

#[test]
fn set_filename_on_unknown_name_is_refused() {
    let mut table = ParameterTable::new();
    assert!(!table.set_filename("upload", "x.bin"));
    table.add("upload", "data");
    assert!(table.set_filename("upload", "x.bin"));
    assert_eq!(table.filename("upload"), Some(Some("x.bin")));
}

#[test]
fn iterate_visits_every_field_once() {
    let mut table = ParameterTable::new();
    for name in ["a", "b", "c", "d"] {
        table.add(name, name);
    }
    let mut seen: Vec<_> = table.iter().map(|(n, p)| (n, p.value())).collect();
    seen.sort();
    assert_eq!(
        seen,
        [("a", &b"a"[..]), ("b", &b"b"[..]), ("c", &b"c"[..]), ("d", &b"d"[..])]
    );
    assert_eq!((&table).into_iter().count(), 4);
    assert_eq!(table.iter().len(), 4);
}

// =========================================================================
// Multi-valued fields
// =========================================================================

#[test]
fn multi_field_holds_children() {
    let mut table = ParameterTable::new();
    let children = table.add_multi("ports");
    children.add("0", "80");
    children.add("1", "443");

    let param = table.get("ports").expect("present");
    assert!(param.is_multi());
    assert_eq!(param.array_len(), 2);
    assert_eq!(table.value("ports"), Some(&b""[..]));

    let children = table.children("ports").flatten().expect("children");
    assert_eq!(children.value("1"), Some(&b"443"[..]));
}

#[test]
fn nested_tables_drop_cleanly() {
    let mut table = ParameterTable::new();
    {
        let level1 = table.add_multi("outer");
        level1.add("a", "1");
        let level2 = level1.add_multi("inner");
        level2.add("b", "2");
        level2.append_chunk("c", b"xyz", 0).unwrap();
    }
    table.add("outer", "replaced");
    table.add_multi("again").add_multi("deeper").add("z", "0");
    drop(table);
}

// =========================================================================
// Chunk reassembly
// =========================================================================

#[test]
fn two_chunks_concatenate() {
    let mut table = ParameterTable::new();
    table.append_chunk("upload", b"AB", 0).unwrap();
    table.append_chunk("upload", b"CD", 2).unwrap();
    assert_eq!(table.value("upload"), Some(&b"ABCD"[..]));
    assert_eq!(table.value_size("upload"), Some(4));
}

#[test]
fn reassembled_value_is_terminated() {
    let mut table = ParameterTable::new();
    table.append_chunk("f", b"hello ", 0).unwrap();
    table.append_chunk("f", b"world", 6).unwrap();

    let ParamKind::Scalar(buf) = table.get("f").unwrap().kind() else {
        panic!("expected scalar");
    };
    assert_eq!(buf.as_bytes(), b"hello world");
    assert_eq!(buf.padded()[buf.len()], 0);
}

#[test]
fn first_chunk_at_offset_sets_length_to_chunk_size() {
    // The first chunk fixes the length to its own size, even when it does
    // not start at zero.
    let mut table = ParameterTable::new();
    table.append_chunk("late", b"CD", 2).unwrap();
    assert_eq!(table.value_size("late"), Some(2));
    assert_eq!(table.value("late"), Some(&b"\0\0"[..]));

    table.append_chunk("late", b"EF", 4).unwrap();
    assert_eq!(table.value_size("late"), Some(4));
    assert_eq!(table.value("late"), Some(&b"\0\0CD"[..]));
}

#[test]
fn out_of_order_chunk_does_not_corrupt_memory() {
    let mut table = ParameterTable::new();
    table.append_chunk("f", b"0123456789", 10).unwrap();
    table.append_chunk("f", b"ab", 0).unwrap();
    assert_eq!(table.value_size("f"), Some(12));
    assert_eq!(&table.value("f").unwrap()[..2], b"ab");
}

#[test]
fn embedded_zero_bytes_survive_chunking() {
    let mut table = ParameterTable::new();
    table.append_chunk("bin", b"\0\x01", 0).unwrap();
    table.append_chunk("bin", b"\0\x02", 2).unwrap();
    assert_eq!(table.value("bin"), Some(&b"\0\x01\0\x02"[..]));
}

#[test]
fn growth_failure_leaves_field_untouched() {
    let mut table = ParameterTable::with_limits(TableLimits { max_value_size: 4 });
    table.append_chunk("f", b"ABC", 0).unwrap();

    let err = table.append_chunk("f", b"DE", 3).unwrap_err();
    assert_eq!(
        err,
        ParamError::GrowthFailure {
            name: "f".into(),
            requested: 6
        }
    );
    assert_eq!(table.value("f"), Some(&b"ABC"[..]));
    assert_eq!(table.value_size("f"), Some(3));
}

#[test]
fn growth_failure_on_first_chunk_creates_nothing() {
    let mut table = ParameterTable::with_limits(TableLimits { max_value_size: 2 });
    assert!(table.append_chunk("f", b"ABC", 0).is_err());
    assert!(table.get("f").is_none());
}

#[test]
fn partially_built_table_drops_cleanly() {
    let mut table = ParameterTable::with_limits(TableLimits { max_value_size: 8 });
    table.add("a", "1");
    table.append_chunk("big", b"12345678", 0).unwrap();
    assert!(table.append_chunk("big", b"9", 8).is_err());
    drop(table);
}

// =========================================================================
// Validation
// =========================================================================

#[test]
fn original_value_absent_before_validation() {
    let mut table = ParameterTable::new();
    table.add("port", "abc");
    assert_eq!(table.original_value("port"), Some(None));
}

#[test]
fn validation_marks_and_preserves_invalid_input() {
    let mut rules = RuleSet::new();
    rules.add("port", Rule::Integer { min: 1, max: 65535 });
    rules.add("name", Rule::NonEmpty);

    let mut table = ParameterTable::new();
    table.add("port", "70000");
    table.add("name", "gw");
    table.add("free", "anything");

    let report = table.validate(&rules, &Utf8Check);
    assert_eq!(report.checked, 3);
    assert_eq!(report.invalid, ["port"]);

    assert_eq!(table.is_valid("port"), Some(Verdict::Invalid));
    assert_eq!(table.original_value("port"), Some(Some(&b"70000"[..])));
    assert_eq!(table.is_valid("name"), Some(Verdict::Valid));
    assert_eq!(table.original_value("name"), Some(None));
    assert_eq!(table.is_valid("free"), Some(Verdict::Valid));
}

#[test]
fn validation_checks_encoding() {
    let mut table = ParameterTable::new();
    table.add("text", [0xC3u8, 0x28].as_slice());
    table.add("ok", "grüß");

    let report = table.validate(&AcceptAll, &Utf8Check);
    assert_eq!(report.invalid, ["text"]);
    assert_eq!(table.is_valid("text"), Some(Verdict::Valid));
    assert_eq!(table.is_valid_utf8("text"), Some(Verdict::Invalid));
    assert_eq!(table.original_value("text"), Some(Some(&[0xC3u8, 0x28][..])));
    assert_eq!(table.is_valid_utf8("ok"), Some(Verdict::Valid));
}

#[test]
fn validation_recurses_into_children() {
    let mut rules = RuleSet::new();
    rules.add("list/1", Rule::MaxLen(3));

    let mut table = ParameterTable::new();
    let children = table.add_multi("list");
    children.add("0", "abc");
    children.add("1", "abcd");
    table.add_multi("empty");

    let report = table.validate(&rules, &Utf8Check);
    assert_eq!(report.checked, 4);
    assert_eq!(report.invalid, ["list", "list/1"]);

    assert_eq!(table.is_valid("list"), Some(Verdict::Invalid));
    assert_eq!(table.is_valid("empty"), Some(Verdict::Valid));
    let children = table.children("list").flatten().unwrap();
    assert_eq!(children.is_valid("0"), Some(Verdict::Valid));
    assert_eq!(children.original_value("1"), Some(Some(&b"abcd"[..])));
}

#[test]
fn rules_target_one_array_by_path() {
    let mut rules = RuleSet::new();
    rules.add_spec("list/1:max-len=3").unwrap();
    rules.add_spec("other/1:non-empty").unwrap();

    let mut table = ParameterTable::new();
    table.add_multi("list").add("1", "abcd");
    table.add_multi("other").add("1", "abcd");
    table.add("1", "abcd");

    let report = table.validate(&rules, &Utf8Check);
    assert_eq!(report.invalid, ["list", "list/1"]);
    assert_eq!(table.is_valid("other"), Some(Verdict::Valid));
    assert_eq!(table.is_valid("1"), Some(Verdict::Valid));
}

#[test]
fn closure_rules_see_nested_paths() {
    let mut table = ParameterTable::new();
    table.add_multi("dns").add("0", "x");
    table.add("name", "x");

    let report = table.validate(&|path: &str, _: &[u8]| path != "dns/0", &Utf8Check);
    assert_eq!(report.invalid, ["dns", "dns/0"]);
}

#[test]
fn replace_value_keeps_verdict_and_original() {
    let mut table = ParameterTable::new();
    table.add("mtu", "99999");
    table.validate(&|_: &str, v: &[u8]| v.len() < 5, &Utf8Check);

    assert_eq!(table.replace_value("mtu", "1500"), Ok(true));
    assert_eq!(table.value("mtu"), Some(&b"1500"[..]));
    assert_eq!(table.is_valid("mtu"), Some(Verdict::Invalid));
    assert_eq!(table.original_value("mtu"), Some(Some(&b"99999"[..])));
    assert_eq!(table.replace_value("missing", "x"), Ok(false));
}

#[test]
fn validated_table_convenience() {
    let pairs: [(&str, &[u8]); 2] = [("a", b"1"), ("b", b"\xFF")];
    let (table, report) = validated_table(pairs, &AcceptAll, &Utf8Check);
    assert_eq!(table.len(), 2);
    assert_eq!(report.invalid, ["b"]);
}

// =========================================================================
// Request lifecycle
// =========================================================================

#[test]
fn context_seals_after_validation() {
    let mut ctx = RequestContext::new(RequestConfig::default());
    ctx.add("a", "1").unwrap();
    assert!(!ctx.is_validated());

    ctx.validate(&AcceptAll, &Utf8Check).unwrap();
    assert!(ctx.is_validated());
    assert_eq!(ctx.report().map(|r| r.checked), Some(1));

    assert_eq!(ctx.add("b", "2").unwrap_err(), ParamError::Sealed);
    assert_eq!(ctx.append_chunk("c", b"x", 0).unwrap_err(), ParamError::Sealed);
    assert_eq!(ctx.set_filename("a", "f").unwrap_err(), ParamError::Sealed);
    assert!(ctx.add_multi("d").is_err());
    assert_eq!(
        ctx.validate(&AcceptAll, &Utf8Check).unwrap_err(),
        ParamError::AlreadyValidated
    );
}

#[test]
fn context_hands_off_table() {
    let mut ctx = RequestContext::new(RequestConfig::default());
    ctx.append_chunk("upload", b"data", 0).unwrap();
    ctx.set_filename("upload", "fw.bin").unwrap();
    let table = ctx.into_table();
    assert_eq!(table.filename("upload"), Some(Some("fw.bin")));
}

// =========================================================================
// Output
// =========================================================================

fn sample_context() -> RequestContext {
    let config = RequestConfig {
        chroot: true,
        https: true,
        language: "de".into(),
    };
    let mut ctx = RequestContext::new(config);
    ctx.add("port", "<bad>").unwrap();
    ctx.add("name", "gw").unwrap();
    ctx.append_chunk("upload", b"AB", 0).unwrap();
    ctx.set_filename("upload", "a&b.bin").unwrap();
    ctx.add_multi("dns").unwrap().add("0", "1.1.1.1");

    let mut rules = RuleSet::new();
    rules.add("port", Rule::Integer { min: 1, max: 65535 });
    ctx.validate(&rules, &Utf8Check).unwrap();
    ctx.replace_value("port", "80").unwrap();
    ctx
}

#[test]
fn xml_document_describes_parameters() {
    let xml = to_xml(&sample_context());
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
    assert!(xml.contains("<parameters lang=\"de\" https=\"true\" chroot=\"true\">"));
    assert!(xml.contains("<parameter name=\"port\" valid=\"false\" utf8=\"true\">"));
    assert!(xml.contains("<value>80</value>"));
    assert!(xml.contains("<original>&lt;bad&gt;</original>"));
    assert!(xml.contains("filename=\"a&amp;b.bin\""));
    assert!(xml.contains("<parameter name=\"dns\" valid=\"true\" utf8=\"true\" length=\"1\">"));
    assert!(xml.contains("    <parameter name=\"0\" valid=\"true\" utf8=\"true\">"));
    assert!(xml.ends_with("</parameters>\n"));

    let dns = xml.find("name=\"dns\"").unwrap();
    let name = xml.find("name=\"name\"").unwrap();
    let port = xml.find("name=\"port\"").unwrap();
    assert!(dns < name && name < port);
}

#[test]
fn json_output() {
    let ctx = sample_context();
    let json: serde_json::Value = serde_json::from_str(&format_json(ctx.table(), false)).unwrap();
    assert_eq!(json["port"]["value"], "80");
    assert_eq!(json["port"]["original_value"], "<bad>");
    assert_eq!(json["port"]["valid"], "false");
    assert_eq!(json["port"]["valid_utf8"], "true");
    assert_eq!(json["name"]["original_value"], serde_json::Value::Null);
    assert_eq!(json["upload"]["filename"], "a&b.bin");
    assert_eq!(json["dns"]["value"], serde_json::Value::Null);
    assert_eq!(json["dns"]["children"]["0"]["value"], "1.1.1.1");

    let pretty = format_json(ctx.table(), true);
    assert!(pretty.contains('\n'));
}

#[test]
fn debug_output() {
    let out = format_debug(sample_context().table());
    assert!(out.starts_with("=== Parameters ===\n"));
    assert!(out.contains("port [valid=false utf8=true] = \"80\"\n"));
    assert!(out.contains("  original: \"<bad>\"\n"));
    assert!(out.contains("dns [valid=true utf8=true] (1 items)\n"));
    assert!(out.contains("upload [valid=true utf8=true] file=a&b.bin = \"AB\"\n"));
}

struct Echo;

impl Transform for Echo {
    fn transform(&self, xml: &str, stylesheet: &Path) -> Result<String, RenderError> {
        Ok(format!("<html><!-- {} -->{}</html>", stylesheet.display(), xml.len()))
    }
}

struct Broken;

impl Transform for Broken {
    fn transform(&self, _xml: &str, stylesheet: &Path) -> Result<String, RenderError> {
        Err(RenderError(format!("cannot load {}", stylesheet.display())))
    }
}

#[test]
fn render_success() {
    let page = render_page(&Echo, &sample_context(), Path::new("status.xsl"));
    assert_eq!(page.status, 200);
    assert!(page.body.starts_with("<html><!-- status.xsl -->"));
}

#[test]
fn render_failure_yields_fixed_page() {
    let page = render_page(&Broken, &sample_context(), Path::new("missing.xsl"));
    assert_eq!(page.status, 500);
    assert_eq!(page.body, FAILURE_PAGE);
}
