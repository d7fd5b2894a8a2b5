use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::Event;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct XmlError {
    pub message: String,
}

impl XmlError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A well-formed XML document held as text.
///
/// Construction validates the document; the text itself is kept as-is so
/// that converting a part to an `XmlDocument` and back does not reformat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    text: String,
}

impl XmlDocument {
    pub fn parse(text: impl Into<String>) -> Result<Self, XmlError> {
        let text = text.into();
        let text = match text.strip_prefix('\u{FEFF}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        };
        validate(&text)?;
        Ok(Self { text })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Re-emits the document with two-space indentation and trimmed text
    /// nodes, the canonical form for XML files in a project folder.
    pub fn to_pretty_string(&self) -> Result<String, XmlError> {
        pretty_print(&self.text)
    }
}

fn validate(text: &str) -> Result<(), XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);
    let mut depth: usize = 0;
    let mut roots: usize = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) => {
                if depth == 0 {
                    roots += 1;
                }
                depth += 1;
            }
            Ok(Event::Empty(_)) if depth == 0 => roots += 1,
            Ok(Event::End(_)) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| XmlError::new("unexpected closing tag"))?;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(XmlError::new(format!(
                    "XML error at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(XmlError::new("unexpected end of document"));
    }
    if roots != 1 {
        return Err(XmlError::new(format!(
            "expected exactly one root element, found {roots}"
        )));
    }
    Ok(())
}

fn pretty_print(text: &str) -> Result<String, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    loop {
        match reader.read_event() {
            Ok(Event::Eof) => break,
            Ok(Event::Text(t)) if t.is_empty() => {}
            Ok(event) => writer
                .write_event(event)
                .map_err(|e| XmlError::new(e.to_string()))?,
            Err(e) => return Err(XmlError::new(e.to_string())),
        }
    }
    let mut out = String::from_utf8(writer.into_inner())
        .map_err(|_| XmlError::new("formatted XML is not valid UTF-8"))?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}
