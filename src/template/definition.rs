//! Serialized template definition (JSON).
//!
//! ```json
//! {
//!   "name": "sales",
//!   "children": [
//!     { "type": "group", "name": "customer", "keys": ["cust_id"],
//!       "fields": ["cust_name", {"name": "credit", "type": "bigdecimal"}],
//!       "children": [
//!         { "type": "field", "value": "#cust_name", "trace": "customer" }
//!       ] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateDef {
    #[serde(default = "default_root_name")]
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDeclDef>,
    #[serde(default)]
    pub children: Vec<ElementDef>,
}

fn default_root_name() -> String {
    "report".to_string()
}

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementDef {
    Group(GroupDef),
    Band(BandDef),
    Text(TextDef),
    Field(FieldDef),
    PageBreak(PageBreakDef),
    Subreport(SubreportDef),
}

/// `"*"`, `"a, b"` or `["a", "b"]`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeysDef {
    Text(String),
    List(Vec<String>),
}

/// `"name"` or `{"name": "...", "type": "..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldDeclDef {
    Name(String),
    Typed {
        name: String,
        #[serde(rename = "type")]
        field_type: String,
    },
}

impl FieldDeclDef {
    pub fn name(&self) -> &str {
        match self {
            FieldDeclDef::Name(name) | FieldDeclDef::Typed { name, .. } => name,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            FieldDeclDef::Name(_) => None,
            FieldDeclDef::Typed { field_type, .. } => Some(field_type),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupDef {
    pub name: String,
    pub keys: KeysDef,
    /// Only merge rows into the instance created last
    #[serde(default)]
    pub control_break: bool,
    #[serde(default)]
    pub fields: Vec<FieldDeclDef>,
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub order_by_key: bool,
    #[serde(default)]
    pub descending: bool,
    pub case_sensitive: Option<bool>,
    pub filter: Option<String>,
    pub visible: Option<String>,
    #[serde(default)]
    pub children: Vec<ElementDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BandDef {
    pub name: Option<String>,
    pub visible: Option<String>,
    pub text: Option<String>,
    #[serde(default)]
    pub children: Vec<ElementDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextDef {
    pub name: Option<String>,
    pub visible: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    /// Element name; also the field the value is written back to
    pub name: Option<String>,
    pub visible: Option<String>,
    pub value: String,
    /// Declare `name` as a lazily computed field of the enclosing group
    #[serde(default)]
    pub auto: bool,
    pub trace: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageBreakDef {
    pub name: Option<String>,
    pub visible: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubreportDef {
    pub name: String,
    pub source: String,
    /// Column name to expression evaluated in the host group
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    /// Whether descendant scans from the host may enter this subreport
    #[serde(default = "yes")]
    pub searchable: bool,
    #[serde(default)]
    pub fields: Vec<FieldDeclDef>,
    pub visible: Option<String>,
    #[serde(default)]
    pub children: Vec<ElementDef>,
}
