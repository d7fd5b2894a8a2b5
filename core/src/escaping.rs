//! Reversible escaping of names used as folder or file names.
//!
//! Table, measure, section and Mashup item names can contain characters that
//! are illegal in file names on at least one platform. Each of `"<>|:*?/\`
//! and `%` itself is replaced by `%XX` (uppercase hex), as is a leading `.`
//! so that no escaped name is hidden or a `..` segment; everything else is
//! kept. [`unescape_path_segment`] is plain percent-decoding, so
//! `unescape_path_segment(&escape_path_segment(s)) == s` for every `s`.

const ESCAPED_CHARS: &[char] = &['"', '<', '>', '|', ':', '*', '?', '/', '\\', '%'];

pub fn escape_path_segment(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (idx, ch) in name.chars().enumerate() {
        if ESCAPED_CHARS.contains(&ch) || ch.is_control() || (idx == 0 && ch == '.') {
            let mut buf = [0u8; 4];
            for b in ch.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Percent-decodes `name`. Malformed escapes are kept literally.
pub fn unescape_path_segment(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b == b'%'
            && idx + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2]))
        {
            decoded.push(hi << 4 | lo);
            idx += 3;
            continue;
        }
        decoded.push(b);
        idx += 1;
    }
    match String::from_utf8(decoded) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Decodes a Mashup `ItemPath` segment (`%20`-style URL encoding).
pub fn url_decode(text: &str) -> String {
    unescape_path_segment(text)
}

/// Escapes every `/`-separated segment of a relative path.
pub fn escape_relative_path(path: &str) -> String {
    path.split('/')
        .map(escape_path_segment)
        .collect::<Vec<_>>()
        .join("/")
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(10 + b - b'a'),
        b'A'..=b'F' => Some(10 + b - b'A'),
        _ => None,
    }
}
