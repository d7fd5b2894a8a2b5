use pbixproj::escaping::{escape_path_segment, escape_relative_path, unescape_path_segment};

const RESERVED: &[char] = &['"', '<', '>', '|', ':', '*', '?', '/', '\\'];

fn samples() -> Vec<String> {
    let mut out: Vec<String> = [
        "",
        "Sales",
        "Avg/Region",
        "a\"b<c>d|e:f*g?h/i\\j",
        "100% done",
        "%3A",
        "%%",
        "trailing %",
        "Umsatz € (Δ)",
        "tab\there",
        "名前",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for c in RESERVED {
        out.push(c.to_string());
        out.push(format!("x{c}{c}y"));
    }
    out
}

#[test]
fn unescape_reverses_escape() {
    for s in samples() {
        assert_eq!(unescape_path_segment(&escape_path_segment(&s)), s, "{s:?}");
    }
}

#[test]
fn escaped_segments_hold_no_reserved_characters() {
    for s in samples() {
        let escaped = escape_path_segment(&s);
        assert!(!escaped.contains(RESERVED), "{escaped:?}");
    }
}

#[test]
fn escaped_text_never_collides_with_an_escape_sequence() {
    assert_ne!(escape_path_segment(":"), escape_path_segment("%3A"));
    assert_eq!(escape_path_segment("%3A"), "%253A");
    assert_eq!(escape_path_segment(":"), "%3A");
}

#[test]
fn relative_paths_keep_their_separators() {
    assert_eq!(escape_relative_path("Formulas/Section1.m"), "Formulas/Section1.m");
    assert_eq!(escape_relative_path("a:b/c?d"), "a%3Ab/c%3Fd");
}
