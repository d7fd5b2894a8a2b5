//! Folder names for report sections and visual containers.
//!
//! Names only depend on the layout, so re-extracting an unchanged report
//! gives the same tree.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::escaping::escape_path_segment;

pub const DEFAULT_ORDINAL: i64 = 999;
pub const DEFAULT_TAB_ORDER: i64 = 99999;
const SHORT_ID_LEN: usize = 5;

/// `{ordinal:03}_{displayName or name}`.
pub fn section_folder_name(section: &Value) -> String {
    let ordinal = section
        .get("ordinal")
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_ORDINAL);
    let label = section
        .get("displayName")
        .and_then(Value::as_str)
        .or_else(|| section.get("name").and_then(Value::as_str))
        .unwrap_or_default();
    format!("{ordinal:03}_{}", escape_path_segment(label))
}

/// Hands out unique sibling folder names. Comparison ignores case so the
/// tree also works on case-insensitive file systems.
#[derive(Debug, Default)]
pub struct FolderNamer {
    used: BTreeSet<String>,
}

impl FolderNamer {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str) -> bool {
        self.used.insert(name.to_lowercase())
    }

    fn is_used(&self, name: &str) -> bool {
        self.used.contains(&name.to_lowercase())
    }

    /// Returns `base`, or `base (2)`, `base (3)`... when taken.
    pub fn unique(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 2;
        while self.is_used(&candidate) {
            candidate = format!("{base} ({n})");
            n += 1;
        }
        self.register(&candidate);
        candidate
    }

    /// `{tabOrder:05}_{label}` for a visual container whose parsed config is
    /// `config`. A name already handed out gets the full config name (or id)
    /// appended.
    pub fn visual_folder_name(&mut self, container: &Value, config: Option<&Value>) -> String {
        let id = visual_id(container, config);
        let base = format!(
            "{:05}_{}",
            tab_order(container, config),
            escape_path_segment(&visual_label(config, &id))
        );
        if !self.is_used(&base) {
            self.register(&base);
            return base;
        }
        let qualified = format!("{base} ({})", escape_path_segment(&id));
        self.register(&base);
        self.unique(&qualified)
    }
}

/// Sibling folders in the order their items are rebuilt. Case-insensitive
/// like [`FolderNamer`], so a name always comes before the variants
/// disambiguated from it and the same item keeps the plain name on the next
/// extraction.
pub fn rebuild_order(mut names: Vec<String>) -> Vec<String> {
    names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
    names
}

fn visual_id(container: &Value, config: Option<&Value>) -> String {
    if let Some(name) = config.and_then(|c| c.get("name")).and_then(Value::as_str) {
        return name.to_string();
    }
    match container.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    }
}

/// Container `tabOrder`, else the first layout's, else [`DEFAULT_TAB_ORDER`].
pub fn tab_order(container: &Value, config: Option<&Value>) -> i64 {
    container
        .get("tabOrder")
        .and_then(Value::as_i64)
        .or_else(|| {
            config?
                .get("layouts")?
                .get(0)?
                .get("position")?
                .get("tabOrder")?
                .as_i64()
        })
        .unwrap_or(DEFAULT_TAB_ORDER)
}

fn visual_label(config: Option<&Value>, id: &str) -> String {
    if let Some(title) = config.and_then(title_literal) {
        return title;
    }
    if let Some(group) = config
        .and_then(|c| c.get("singleVisualGroup"))
        .and_then(|g| g.get("displayName"))
        .and_then(Value::as_str)
    {
        return group.to_string();
    }
    let visual_type = config
        .and_then(|c| c.get("singleVisual"))
        .and_then(|v| v.get("visualType"))
        .and_then(Value::as_str)
        .unwrap_or("visual");
    let short: String = id.chars().take(SHORT_ID_LEN).collect();
    format!("{visual_type} ({short})")
}

/// `singleVisual.vcObjects.title[0].properties.text.expr.Literal.Value`
/// when it is a single-quoted string literal.
fn title_literal(config: &Value) -> Option<String> {
    let literal = config
        .get("singleVisual")?
        .get("vcObjects")?
        .get("title")?
        .get(0)?
        .get("properties")?
        .get("text")?
        .get("expr")?
        .get("Literal")?
        .get("Value")?
        .as_str()?;
    let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}
