use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use super::DataMashupError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Permissions {
    pub can_evaluate_future_packages: bool,
    pub firewall_enabled: bool,
    pub workbook_group_type: Option<String>,
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions {
            can_evaluate_future_packages: false,
            firewall_enabled: true,
            workbook_group_type: None,
        }
    }
}

/// Reads a `PermissionList` document. Empty input yields the defaults; a
/// document that does not parse, or a flag that is not a boolean, is an error
/// so the caller can keep the original bytes instead.
pub fn parse_permissions(xml_bytes: &[u8]) -> Result<Permissions, DataMashupError> {
    if xml_bytes.is_empty() {
        return Ok(Permissions::default());
    }
    let text = super::framing::decode_xml_text(xml_bytes)?;
    let leaves = leaf_elements(&text).map_err(DataMashupError::XmlError)?;

    let mut permissions = Permissions::default();
    for (tag, value) in leaves {
        let value = value.trim();
        match tag.as_str() {
            "CanEvaluateFuturePackages" => {
                permissions.can_evaluate_future_packages = parse_bool(&tag, value)?;
            }
            "FirewallEnabled" => {
                permissions.firewall_enabled = parse_bool(&tag, value)?;
            }
            "WorkbookGroupType" if !value.is_empty() => {
                permissions.workbook_group_type = Some(value.to_string());
            }
            _ => {}
        }
    }
    Ok(permissions)
}

/// `(local name, text)` for every element that directly holds text.
fn leaf_elements(text: &str) -> Result<Vec<(String, String)>, String> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);
    let mut open: Option<String> = None;
    let mut leaves = Vec::new();
    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let name = e.name();
                let local = name.local_name();
                open = Some(String::from_utf8_lossy(local.as_ref()).into_owned());
            }
            Event::Text(t) => {
                if let Some(tag) = &open {
                    let value = t.unescape().map_err(|e| e.to_string())?;
                    leaves.push((tag.clone(), value.into_owned()));
                }
            }
            Event::CData(t) => {
                if let Some(tag) = &open {
                    leaves.push((tag.clone(), String::from_utf8_lossy(&t).into_owned()));
                }
            }
            Event::End(_) => open = None,
            Event::Eof => return Ok(leaves),
            _ => {}
        }
    }
}

pub fn permissions_xml(permissions: &Permissions) -> String {
    let group = match &permissions.workbook_group_type {
        Some(group) => format!("<WorkbookGroupType>{}</WorkbookGroupType>", escape(group.as_str())),
        None => r#"<WorkbookGroupType xsi:nil="true" />"#.to_string(),
    };
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<PermissionList xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">"#,
            "<CanEvaluateFuturePackages>{}</CanEvaluateFuturePackages>",
            "<FirewallEnabled>{}</FirewallEnabled>",
            "{}</PermissionList>"
        ),
        permissions.can_evaluate_future_packages, permissions.firewall_enabled, group
    )
}

fn parse_bool(tag: &str, text: &str) -> Result<bool, DataMashupError> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(DataMashupError::XmlError(format!("{tag} is not a boolean: '{text}'"))),
    }
}
