//! Template element tree.
//!
//! A [`Template`] is an arena of [`Element`]s in document order, compiled
//! from a [`TemplateDef`]. Compiling parses every expression attribute and
//! builds the group [`Schema`]; every failure is a [`ValidationError`]
//! raised before any output is produced.

mod compile;
pub mod definition;

use std::rc::Rc;

use crate::ast::Symbol;
use crate::error::ValidationError;
use crate::group::{GroupOrder, GroupTree, ModelId, Schema};

pub use definition::TemplateDef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(pub(crate) u32);

impl ElementId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct Element {
    pub id: ElementId,
    /// Declared name, or a generated one such as `text3`
    pub name: String,
    pub visible: Option<Rc<Symbol>>,
    pub kind: ElementKind,
    pub children: Vec<ElementId>,
    /// Nesting depth, 0 for the root
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub enum ElementKind {
    Root { model: ModelId },
    Group(GroupSpec),
    Band { text: Option<TextTemplate> },
    Text(TextTemplate),
    Field(FieldSpec),
    PageBreak,
    Subreport(SubreportSpec),
}

impl ElementKind {
    /// Elements that iterate group instances.
    pub fn is_group_bearing(&self) -> bool {
        matches!(
            self,
            ElementKind::Root { .. } | ElementKind::Group(_) | ElementKind::Subreport(_)
        )
    }
}

#[derive(Debug, Clone)]
pub struct GroupSpec {
    pub model: ModelId,
    pub order: GroupOrder,
    /// `None` follows the engine configuration
    pub case_sensitive: Option<bool>,
    pub filter: Option<Rc<Symbol>>,
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub value: Rc<Symbol>,
    /// Field the value is written back to
    pub target: Option<String>,
    pub trace: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubreportSpec {
    pub model: ModelId,
    pub source: String,
    pub params: Vec<(String, Rc<Symbol>)>,
}

/// Literal text with `{expr}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTemplate {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextPart {
    Literal(String),
    Expr(Rc<Symbol>),
}

#[derive(Debug, Clone)]
pub struct Template {
    elements: Vec<Element>,
    schema: Schema,
}

impl Template {
    /// Load and compile a JSON template definition.
    pub fn from_json_str(text: &str) -> Result<Self, ValidationError> {
        let def: TemplateDef = serde_json::from_str(text)
            .map_err(|e| ValidationError::Definition(e.to_string()))?;
        Self::compile(&def)
    }

    pub fn compile(def: &TemplateDef) -> Result<Self, ValidationError> {
        compile::compile(def)
    }

    pub fn root(&self) -> ElementId {
        ElementId(0)
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.index()]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn find(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name == name)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// A fresh group tree for one run.
    pub fn new_tree(&self) -> GroupTree {
        GroupTree::new(self.schema.clone())
    }
}
