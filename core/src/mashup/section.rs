//! Splitting an M section document into its shared members and putting it
//! back together.
//!
//! Only documents that reassemble to exactly the same text are split; the
//! caller stores anything else verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error_codes;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SectionParseError {
    #[error("missing section header")]
    MissingSectionHeader,
    #[error("invalid section header")]
    InvalidHeader,
    #[error("invalid member syntax at byte {0}")]
    InvalidMemberSyntax(usize),
    #[error("unterminated member '{0}'")]
    UnterminatedMember(String),
    #[error("section text does not reassemble exactly")]
    NotCanonical,
}

impl SectionParseError {
    pub fn code(&self) -> &'static str {
        error_codes::SECTION_PARSE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Crlf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionMember {
    pub name: String,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionDocument {
    pub name: String,
    pub members: Vec<SectionMember>,
    pub line_ending: LineEnding,
    pub trailing_line_ending: bool,
}

/// Layout stored next to the exploded member files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLayout {
    pub name: String,
    pub members: Vec<String>,
    #[serde(default)]
    pub line_ending: LineEnding,
    #[serde(default)]
    pub trailing_line_ending: bool,
}

impl SectionDocument {
    pub fn layout(&self) -> SectionLayout {
        SectionLayout {
            name: self.name.clone(),
            members: self.members.iter().map(|m| m.name.clone()).collect(),
            line_ending: self.line_ending,
            trailing_line_ending: self.trailing_line_ending,
        }
    }

    pub fn to_text(&self) -> String {
        let nl = self.line_ending.as_str();
        let mut out = format!("section {};", format_identifier(&self.name));
        for member in &self.members {
            out.push_str(nl);
            out.push_str(nl);
            out.push_str("shared ");
            out.push_str(&format_identifier(&member.name));
            out.push_str(" = ");
            out.push_str(&member.expression);
            out.push(';');
        }
        if self.trailing_line_ending {
            out.push_str(nl);
        }
        out
    }
}

pub fn parse_section_document(source: &str) -> Result<SectionDocument, SectionParseError> {
    let text = source.strip_prefix('\u{FEFF}').unwrap_or(source);
    let bytes = text.as_bytes();
    let mut pos = skip_whitespace(bytes, 0);

    let rest = text
        .get(pos..)
        .and_then(|r| r.strip_prefix("section"))
        .ok_or(SectionParseError::MissingSectionHeader)?;
    pos = text.len() - rest.len();
    if !rest.starts_with(char::is_whitespace) {
        return Err(SectionParseError::InvalidHeader);
    }
    pos = skip_whitespace(bytes, pos);
    let (name, after) =
        parse_identifier(text, pos).ok_or(SectionParseError::InvalidHeader)?;
    pos = skip_whitespace(bytes, after);
    if bytes.get(pos) != Some(&b';') {
        return Err(SectionParseError::InvalidHeader);
    }
    pos += 1;

    let mut members = Vec::new();
    loop {
        pos = skip_whitespace(bytes, pos);
        if pos >= bytes.len() {
            break;
        }
        let Some(rest) = text[pos..].strip_prefix("shared") else {
            return Err(SectionParseError::InvalidMemberSyntax(pos));
        };
        if !rest.starts_with(char::is_whitespace) {
            return Err(SectionParseError::InvalidMemberSyntax(pos));
        }
        pos = skip_whitespace(bytes, pos + "shared".len());
        let (member_name, after) =
            parse_identifier(text, pos).ok_or(SectionParseError::InvalidMemberSyntax(pos))?;
        pos = skip_whitespace(bytes, after);
        if bytes.get(pos) != Some(&b'=') {
            return Err(SectionParseError::InvalidMemberSyntax(pos));
        }
        pos += 1;
        if bytes.get(pos) == Some(&b' ') {
            pos += 1;
        }
        let end = find_member_end(bytes, pos)
            .ok_or_else(|| SectionParseError::UnterminatedMember(member_name.clone()))?;
        members.push(SectionMember {
            name: member_name,
            expression: text[pos..end].to_string(),
        });
        pos = end + 1;
    }

    let line_ending = if text.contains("\r\n") {
        LineEnding::Crlf
    } else {
        LineEnding::Lf
    };
    let doc = SectionDocument {
        name,
        members,
        line_ending,
        trailing_line_ending: text.ends_with(line_ending.as_str()),
    };
    if doc.to_text() != text {
        return Err(SectionParseError::NotCanonical);
    }
    Ok(doc)
}

/// Finds the `;` ending a member expression, skipping strings, quoted
/// identifiers and comments.
fn find_member_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b';' => return Some(i),
            b'"' => i = skip_string(bytes, i + 1)?,
            b'#' if bytes.get(i + 1) == Some(&b'"') => i = skip_string(bytes, i + 2)?,
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let close = find_subslice(&bytes[i + 2..], b"*/")?;
                i += 2 + close + 2;
            }
            _ => i += 1,
        }
    }
    None
}

/// Returns the index just past the closing quote; `""` is an escaped quote.
fn skip_string(bytes: &[u8], mut i: usize) -> Option<usize> {
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return Some(i + 1);
        }
        i += 1;
    }
    None
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

fn parse_identifier(text: &str, pos: usize) -> Option<(String, usize)> {
    let rest = text.get(pos..)?;
    if let Some(quoted) = rest.strip_prefix("#\"") {
        let mut name = String::new();
        let mut chars = quoted.char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch == '"' {
                if let Some((_, '"')) = chars.peek() {
                    name.push('"');
                    chars.next();
                    continue;
                }
                return Some((name, pos + 2 + idx + 1));
            }
            name.push(ch);
        }
        return None;
    }

    let end = rest
        .char_indices()
        .find(|(_, c)| !is_identifier_char(*c))
        .map(|(idx, _)| idx)
        .unwrap_or(rest.len());
    let name = &rest[..end];
    if !is_plain_identifier(name) {
        return None;
    }
    Some((name.to_string(), pos + end))
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(is_identifier_char) && !name.ends_with('.')
}

/// Writes `name` as a plain identifier where possible, else as `#"..."`.
pub fn format_identifier(name: &str) -> String {
    if is_plain_identifier(name) && !is_keyword(name) {
        name.to_string()
    } else {
        format!("#\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_keyword(name: &str) -> bool {
    matches!(
        name,
        "and"
            | "as"
            | "each"
            | "else"
            | "error"
            | "false"
            | "if"
            | "in"
            | "is"
            | "let"
            | "meta"
            | "not"
            | "null"
            | "or"
            | "otherwise"
            | "section"
            | "shared"
            | "then"
            | "true"
            | "try"
            | "type"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = "section Section1;\r\n\r\nshared Sales = let\r\n    Source = Csv.Document(\"a;b\")\r\nin\r\n    Source;\r\n\r\nshared #\"Fact Table\" = 1 /* ; */ + 2;";

    #[test]
    fn members_are_split_on_top_level_semicolons() {
        let doc = parse_section_document(SECTION).expect("parse");
        assert_eq!(doc.name, "Section1");
        assert_eq!(doc.members.len(), 2);
        assert_eq!(doc.members[0].name, "Sales");
        assert!(doc.members[0].expression.contains("Csv.Document(\"a;b\")"));
        assert!(doc.members[0].expression.ends_with("Source"));
        assert_eq!(doc.members[1].name, "Fact Table");
        assert_eq!(doc.members[1].expression, "1 /* ; */ + 2");
        assert_eq!(doc.line_ending, LineEnding::Crlf);
        assert!(!doc.trailing_line_ending);
    }

    #[test]
    fn reassembly_reproduces_the_source() {
        let doc = parse_section_document(SECTION).expect("parse");
        assert_eq!(doc.to_text(), SECTION);

        let lf = "section Section1;\n\nshared A = 1;\n";
        let doc = parse_section_document(lf).expect("parse");
        assert_eq!(doc.line_ending, LineEnding::Lf);
        assert!(doc.trailing_line_ending);
        assert_eq!(doc.to_text(), lf);
    }

    #[test]
    fn non_canonical_layout_is_rejected() {
        let err = parse_section_document("section Section1;\r\nshared A = 1;")
            .expect_err("single newline between header and member");
        assert_eq!(err, SectionParseError::NotCanonical);
    }

    #[test]
    fn unsupported_constructs_are_rejected() {
        assert!(matches!(
            parse_section_document("section Section1;\r\n\r\n// comment\r\nshared A = 1;"),
            Err(SectionParseError::InvalidMemberSyntax(_))
        ));
        assert!(matches!(
            parse_section_document("section Section1;\r\n\r\nshared A = \"open;"),
            Err(SectionParseError::UnterminatedMember(_))
        ));
        assert_eq!(
            parse_section_document("let x = 1 in x"),
            Err(SectionParseError::MissingSectionHeader)
        );
    }

    #[test]
    fn identifiers_are_quoted_when_needed() {
        assert_eq!(format_identifier("Query1"), "Query1");
        assert_eq!(format_identifier("My Query"), "#\"My Query\"");
        assert_eq!(format_identifier("say \"hi\""), "#\"say \"\"hi\"\"\"");
        assert_eq!(format_identifier("let"), "#\"let\"");
    }

    #[test]
    fn empty_section_round_trips() {
        let doc = parse_section_document("section Section1;").expect("parse");
        assert!(doc.members.is_empty());
        assert_eq!(doc.to_text(), "section Section1;");
    }
}
