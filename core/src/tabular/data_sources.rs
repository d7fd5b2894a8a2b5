//! Connection strings and the global-pipe data source convention.
//!
//! Legacy Power BI models embed the whole Mashup package in a data source:
//! `Provider=Microsoft.PowerBI.OleDb;Global Pipe=...;Mashup=<base64>;Location=<query>`.

/// Splits `key=value;...` into pairs, in order. Values may be quoted with
/// `"` or `'`; a doubled quote inside a quoted value is a literal quote.
pub fn parse_connection_string(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut chars = text.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| *c == ';' || c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        for c in chars.by_ref() {
            if c == '=' {
                break;
            }
            key.push(c);
        }
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let mut value = String::new();
        match chars.peek().copied() {
            Some(quote @ ('"' | '\'')) => {
                chars.next();
                while let Some(c) = chars.next() {
                    if c == quote {
                        if chars.peek() == Some(&quote) {
                            value.push(quote);
                            chars.next();
                            continue;
                        }
                        break;
                    }
                    value.push(c);
                }
                while chars.peek().is_some_and(|c| *c != ';') {
                    chars.next();
                }
            }
            _ => {
                while let Some(c) = chars.next_if(|c| *c != ';') {
                    value.push(c);
                }
                value = value.trim_end().to_string();
            }
        }
        pairs.push((key.trim().to_string(), value));
    }
    pairs
}

/// Case-insensitive key lookup.
pub fn connection_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.as_str())
}

fn format_value(value: &str) -> String {
    if value.contains([';', '"', '\'', '=']) || value.trim() != value {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// A data source carrying an embedded Mashup package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalPipeSource {
    pub provider: Option<String>,
    pub location: String,
    pub mashup_base64: String,
}

impl GlobalPipeSource {
    pub fn detect(connection_string: &str) -> Option<Self> {
        let pairs = parse_connection_string(connection_string);
        let mashup = connection_value(&pairs, "Mashup")?;
        let location = connection_value(&pairs, "Location")?;
        Some(GlobalPipeSource {
            provider: connection_value(&pairs, "Provider").map(str::to_string),
            location: location.to_string(),
            mashup_base64: mashup.to_string(),
        })
    }

    /// The connection string with the pipe handle and the blob removed.
    pub fn reduced_connection_string(&self) -> String {
        let mut out = String::new();
        if let Some(provider) = &self.provider {
            out.push_str("Provider=");
            out.push_str(&format_value(provider));
            out.push(';');
        }
        out.push_str("Location=");
        out.push_str(&format_value(&self.location));
        out
    }
}
