//! The metadata segment: `version (u32) | xml length (u32) | xml |
//! content length (u32) | content`, where the XML is a
//! `LocalPackageMetadataFile` listing property bags per item and the
//! content is usually a ZIP of cached data.

use std::borrow::Cow;

use log::warn;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::escape::escape;
use serde_json::{Map, Number, Value};

use super::DataMashupError;
use super::framing::{FrameReader, FrameWriter, decode_xml_text};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageMetadata {
    pub version: u32,
    pub items: Vec<MetadataItem>,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataItem {
    pub item_type: String,
    /// As stored: URL-encoded, e.g. `Section1/My%20Query`.
    pub item_path: String,
    pub entries: Vec<MetadataEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub entry_type: String,
    /// Type-prefixed value, e.g. `l1`, `sText`, `d2020-01-01T00:00:00Z`.
    pub value: String,
}

pub fn parse_metadata(bytes: &[u8]) -> Result<PackageMetadata, DataMashupError> {
    if bytes.is_empty() {
        return Ok(PackageMetadata::default());
    }
    let mut frame = FrameReader::new(bytes);
    let version = frame.u32("metadata version")?;
    let xml = frame.segment("metadata xml")?;
    let content = if frame.is_at_end() {
        Vec::new()
    } else {
        frame.segment("metadata content")?.to_vec()
    };
    frame.finish("metadata trailing bytes")?;
    let items = if xml.is_empty() {
        Vec::new()
    } else {
        parse_metadata_xml(&decode_xml_text(xml)?)?
    };
    Ok(PackageMetadata {
        version,
        items,
        content,
    })
}

pub fn build_metadata(metadata: &PackageMetadata) -> Result<Vec<u8>, DataMashupError> {
    let xml = metadata_xml(&metadata.items);
    let mut frame = FrameWriter::new(metadata.version);
    frame.segment(xml.as_bytes())?;
    frame.segment(&metadata.content)?;
    Ok(frame.into_bytes())
}

pub fn parse_metadata_xml(text: &str) -> Result<Vec<MetadataItem>, DataMashupError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut element_stack: Vec<String> = Vec::new();
    let mut items = Vec::new();
    let mut current: Option<MetadataItem> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(local_name(e.name().as_ref())).into_owned();
                open_element(&name, &e, &mut current)?;
                element_stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(local_name(e.name().as_ref())).into_owned();
                open_element(&name, &e, &mut current)?;
                if name == "Item"
                    && let Some(item) = current.take()
                {
                    items.push(item);
                }
            }
            Ok(Event::Text(t)) => {
                let value = t
                    .unescape()
                    .map_err(|e| DataMashupError::XmlError(e.to_string()))?;
                set_location_text(element_stack.last(), &value, &mut current);
            }
            Ok(Event::CData(t)) => {
                let value = String::from_utf8_lossy(&t.into_inner()).into_owned();
                set_location_text(element_stack.last(), &value, &mut current);
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == b"Item"
                    && let Some(item) = current.take()
                {
                    items.push(item);
                }
                element_stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(DataMashupError::XmlError(format!(
                    "metadata XML at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }
    Ok(items)
}

fn open_element(
    name: &str,
    e: &BytesStart<'_>,
    current: &mut Option<MetadataItem>,
) -> Result<(), DataMashupError> {
    match name {
        "Item" => *current = Some(MetadataItem::default()),
        "Entry" => {
            if let Some(item) = current.as_mut()
                && let Some(entry) = parse_entry_attributes(e)?
            {
                item.entries.push(entry);
            }
        }
        _ => {}
    }
    Ok(())
}

fn set_location_text(tag: Option<&String>, value: &str, current: &mut Option<MetadataItem>) {
    let Some(item) = current.as_mut() else {
        return;
    };
    match tag.map(String::as_str) {
        Some("ItemType") => item.item_type = value.trim().to_string(),
        Some("ItemPath") => item.item_path = value.trim().to_string(),
        _ => {}
    }
}

fn parse_entry_attributes(e: &BytesStart<'_>) -> Result<Option<MetadataEntry>, DataMashupError> {
    let mut entry_type: Option<String> = None;
    let mut value: Option<String> = None;

    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|e| DataMashupError::XmlError(e.to_string()))?;
        let unescaped = attr
            .unescape_value()
            .map_err(|e| DataMashupError::XmlError(e.to_string()))?
            .into_owned();
        match local_name(attr.key.as_ref()) {
            b"Type" => entry_type = Some(unescaped),
            b"Value" => value = Some(unescaped),
            _ => {}
        }
    }

    Ok(entry_type.map(|entry_type| MetadataEntry {
        entry_type,
        value: value.unwrap_or_default(),
    }))
}

fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(idx) => name.get(idx + 1..).unwrap_or(name),
        None => name,
    }
}

pub fn metadata_xml(items: &[MetadataItem]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="utf-8"?><LocalPackageMetadataFile xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema"><Items>"#,
    );
    for item in items {
        xml.push_str("<Item><ItemLocation><ItemType>");
        xml.push_str(&escape(item.item_type.as_str()));
        xml.push_str("</ItemType>");
        if item.item_path.is_empty() {
            xml.push_str("<ItemPath />");
        } else {
            xml.push_str("<ItemPath>");
            xml.push_str(&escape(item.item_path.as_str()));
            xml.push_str("</ItemPath>");
        }
        xml.push_str("</ItemLocation>");
        if item.entries.is_empty() {
            xml.push_str("<StableEntries />");
        } else {
            xml.push_str("<StableEntries>");
            for entry in &item.entries {
                xml.push_str(r#"<Entry Type=""#);
                xml.push_str(&escape_attribute(&entry.entry_type));
                xml.push_str(r#"" Value=""#);
                xml.push_str(&escape_attribute(&entry.value));
                xml.push_str(r#"" />"#);
            }
            xml.push_str("</StableEntries>");
        }
        xml.push_str("</Item>");
    }
    xml.push_str("</Items></LocalPackageMetadataFile>");
    xml
}

/// Attribute values keep line breaks and tabs as character references.
fn escape_attribute(value: &str) -> String {
    let escaped: Cow<'_, str> = escape(value);
    escaped
        .replace('\r', "&#xD;")
        .replace('\n', "&#xA;")
        .replace('\t', "&#x9;")
}

/// Converts a type-prefixed entry value to JSON.
///
/// `l` and `f` become numbers, `d` and `g` become `{Value, isDateTime}` /
/// `{Value, isContentID}` objects, `s` stays a string unless it holds a JSON
/// array or object. Other prefixes are kept as `{Value, typeCode}`.
pub fn entry_value_to_json(entry_type: &str, value: &str) -> Value {
    let mut chars = value.chars();
    let Some(prefix) = chars.next() else {
        return Value::Null;
    };
    let body = chars.as_str();
    match prefix {
        's' => {
            if body.starts_with('[') || body.starts_with('{') {
                match serde_json::from_str::<Value>(body) {
                    Ok(parsed) => return parsed,
                    Err(e) => warn!("metadata entry '{entry_type}' looks like JSON but does not parse: {e}"),
                }
            }
            Value::String(body.to_string())
        }
        'l' => match body.parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => typed_object(body, "typeCode", Value::String("l".into())),
        },
        'f' => match body.parse::<f64>().ok().and_then(Number::from_f64) {
            Some(n) => Value::Number(n),
            None => typed_object(body, "typeCode", Value::String("f".into())),
        },
        'd' => typed_object(body, "isDateTime", Value::Bool(true)),
        'g' => typed_object(body, "isContentID", Value::Bool(true)),
        other => typed_object(body, "typeCode", Value::String(other.to_string())),
    }
}

fn typed_object(body: &str, flag: &str, flag_value: Value) -> Value {
    let mut map = Map::new();
    map.insert("Value".to_string(), Value::String(body.to_string()));
    map.insert(flag.to_string(), flag_value);
    Value::Object(map)
}

/// Inverse of [`entry_value_to_json`] up to formatting. A JSON array or
/// object held in an `s` value is written back compactly with its keys
/// sorted, and an `f` value is written the way `f64` displays (`f1.50`
/// becomes `f1.5`). The content is equivalent; the bytes may differ.
pub fn json_to_entry_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => if *b { "l1" } else { "l0" }.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                format!("l{i}")
            } else if let Some(u) = n.as_u64() {
                format!("l{u}")
            } else {
                format!("f{}", n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => format!("s{s}"),
        Value::Array(_) => format!("s{value}"),
        Value::Object(map) => {
            let body = map.get("Value").and_then(Value::as_str);
            match body {
                Some(body) if map.get("isDateTime") == Some(&Value::Bool(true)) => {
                    format!("d{body}")
                }
                Some(body) if map.get("isContentID") == Some(&Value::Bool(true)) => {
                    format!("g{body}")
                }
                Some(body) if map.len() == 2 => match map.get("typeCode").and_then(Value::as_str) {
                    Some(code) => format!("{code}{body}"),
                    None => format!("s{value}"),
                },
                _ => format!("s{value}"),
            }
        }
    }
}
