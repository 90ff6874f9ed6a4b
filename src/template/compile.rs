use std::collections::HashSet;
use std::rc::Rc;

use regex::Regex;

use crate::ast::{FieldRef, Symbol};
use crate::error::ValidationError;
use crate::group::{FieldType, GroupOrder, KeySpec, ModelId, OrderBy, Schema};
use crate::parser::parse_expression;
use crate::template::definition::{ElementDef, FieldDeclDef, KeysDef, TemplateDef};
use crate::template::{
    Element, ElementId, ElementKind, FieldSpec, GroupSpec, SubreportSpec, Template, TextPart,
    TextTemplate,
};

struct Compiler {
    elements: Vec<Element>,
    schema: Schema,
    names: HashSet<String>,
    placeholder: Regex,
}

pub(super) fn compile(def: &TemplateDef) -> Result<Template, ValidationError> {
    let placeholder = Regex::new(r"\{([^{}]*)\}")
        .map_err(|e| ValidationError::Definition(e.to_string()))?;
    let mut compiler = Compiler {
        elements: Vec::new(),
        schema: Schema::new(&def.name),
        names: HashSet::new(),
        placeholder,
    };

    let root_model = compiler.schema.root();
    compiler.register_name(&def.name)?;
    compiler.declare_fields(root_model, &def.name, &def.fields)?;
    let root = compiler.push(def.name.clone(), None, ElementKind::Root { model: root_model }, 0);
    compiler.compile_children(root, root_model, &def.children, 1)?;
    compiler.check_order_fields()?;

    Ok(Template {
        elements: compiler.elements,
        schema: compiler.schema,
    })
}

fn parse(node: &str, attribute: &'static str, text: &str) -> Result<Rc<Symbol>, ValidationError> {
    parse_expression(text)
        .map(Rc::new)
        .map_err(|source| ValidationError::Expression {
            node: node.to_string(),
            attribute,
            source,
        })
}

fn parse_opt(
    node: &str,
    attribute: &'static str,
    text: &Option<String>,
) -> Result<Option<Rc<Symbol>>, ValidationError> {
    text.as_deref().map(|t| parse(node, attribute, t)).transpose()
}

impl Compiler {
    fn push(
        &mut self,
        name: String,
        visible: Option<Rc<Symbol>>,
        kind: ElementKind,
        depth: usize,
    ) -> ElementId {
        let id = ElementId(self.elements.len() as u32);
        self.elements.push(Element {
            id,
            name,
            visible,
            kind,
            children: Vec::new(),
            depth,
        });
        id
    }

    fn register_name(&mut self, name: &str) -> Result<(), ValidationError> {
        if !self.names.insert(name.to_string()) {
            return Err(ValidationError::DuplicateElement(name.to_string()));
        }
        Ok(())
    }

    /// Declared name (registered for uniqueness) or a generated one.
    fn element_name(&mut self, name: &Option<String>, kind: &str) -> Result<String, ValidationError> {
        match name {
            Some(name) => {
                self.register_name(name)?;
                Ok(name.clone())
            }
            None => Ok(format!("{}{}", kind, self.elements.len())),
        }
    }

    fn declare_fields(
        &mut self,
        model: ModelId,
        group: &str,
        fields: &[FieldDeclDef],
    ) -> Result<(), ValidationError> {
        for decl in fields {
            let field_type = match decl.type_name() {
                None => FieldType::Unknown,
                Some(type_name) => FieldType::from_name(type_name).ok_or_else(|| {
                    ValidationError::UnknownFieldType {
                        group: group.to_string(),
                        field: decl.name().to_string(),
                        type_name: type_name.to_string(),
                    }
                })?,
            };
            self.schema.declare_field(model, decl.name(), field_type);
        }
        Ok(())
    }

    fn text(&self, node: &str, attribute: &'static str, text: &str) -> Result<TextTemplate, ValidationError> {
        let mut parts = Vec::new();
        let mut last = 0;
        for caps in self.placeholder.captures_iter(text) {
            let (Some(whole), Some(expr)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > last {
                parts.push(TextPart::Literal(text[last..whole.start()].to_string()));
            }
            parts.push(TextPart::Expr(parse(node, attribute, expr.as_str())?));
            last = whole.end();
        }
        if last < text.len() {
            parts.push(TextPart::Literal(text[last..].to_string()));
        }
        Ok(TextTemplate { parts })
    }

    fn compile_children(
        &mut self,
        parent: ElementId,
        model: ModelId,
        defs: &[ElementDef],
        depth: usize,
    ) -> Result<(), ValidationError> {
        for def in defs {
            let id = self.compile_element(def, model, depth)?;
            self.elements[parent.index()].children.push(id);
        }
        Ok(())
    }

    fn compile_element(
        &mut self,
        def: &ElementDef,
        model: ModelId,
        depth: usize,
    ) -> Result<ElementId, ValidationError> {
        match def {
            ElementDef::Group(g) => {
                let keys = match &g.keys {
                    KeysDef::Text(text) => KeySpec::parse(&g.name, text)?,
                    KeysDef::List(list) => KeySpec::parse(&g.name, &list.join(","))?,
                };
                let group_model = self.schema.add_group(model, &g.name, keys)?;
                self.schema.set_control_break(group_model, g.control_break);
                self.register_name(&g.name)?;
                self.declare_fields(group_model, &g.name, &g.fields)?;

                if g.order_by_key && !g.order.is_empty() {
                    return Err(ValidationError::Attribute {
                        node: g.name.clone(),
                        message: "'order' and 'order_by_key' are mutually exclusive".into(),
                    });
                }
                let by = if g.order_by_key {
                    OrderBy::Key
                } else if g.order.is_empty() {
                    OrderBy::Natural
                } else {
                    OrderBy::Fields(g.order.clone())
                };
                let spec = GroupSpec {
                    model: group_model,
                    order: GroupOrder {
                        by,
                        descending: g.descending,
                        case_sensitive: g.case_sensitive.unwrap_or(true),
                    },
                    case_sensitive: g.case_sensitive,
                    filter: parse_opt(&g.name, "filter", &g.filter)?,
                };
                let visible = parse_opt(&g.name, "visible", &g.visible)?;
                let id = self.push(g.name.clone(), visible, ElementKind::Group(spec), depth);
                self.compile_children(id, group_model, &g.children, depth + 1)?;
                Ok(id)
            }
            ElementDef::Band(b) => {
                let name = self.element_name(&b.name, "band")?;
                let text = match &b.text {
                    Some(t) => Some(self.text(&name, "text", t)?),
                    None => None,
                };
                let visible = parse_opt(&name, "visible", &b.visible)?;
                let id = self.push(name, visible, ElementKind::Band { text }, depth);
                self.compile_children(id, model, &b.children, depth + 1)?;
                Ok(id)
            }
            ElementDef::Text(t) => {
                let name = self.element_name(&t.name, "text")?;
                let text = self.text(&name, "text", &t.text)?;
                let visible = parse_opt(&name, "visible", &t.visible)?;
                Ok(self.push(name, visible, ElementKind::Text(text), depth))
            }
            ElementDef::Field(f) => {
                let name = self.element_name(&f.name, "field")?;
                let value = parse(&name, "value", &f.value)?;
                let visible = parse_opt(&name, "visible", &f.visible)?;
                let spec = if f.auto {
                    let Some(field) = &f.name else {
                        return Err(ValidationError::Attribute {
                            node: name,
                            message: "an auto field needs a name".into(),
                        });
                    };
                    self.schema.declare_auto_field(model, field, value);
                    FieldSpec {
                        value: Rc::new(Symbol::Field(FieldRef::new(None, field))),
                        target: None,
                        trace: f.trace.clone(),
                        label: f.label.clone(),
                    }
                } else {
                    FieldSpec {
                        value,
                        target: f.name.clone(),
                        trace: f.trace.clone(),
                        label: f.label.clone(),
                    }
                };
                Ok(self.push(name, visible, ElementKind::Field(spec), depth))
            }
            ElementDef::PageBreak(p) => {
                let name = self.element_name(&p.name, "page_break")?;
                let visible = parse_opt(&name, "visible", &p.visible)?;
                Ok(self.push(name, visible, ElementKind::PageBreak, depth))
            }
            ElementDef::Subreport(s) => {
                let sub_model = self.schema.add_subreport(model, &s.name, s.searchable)?;
                self.register_name(&s.name)?;
                self.declare_fields(sub_model, &s.name, &s.fields)?;
                let params = s
                    .params
                    .iter()
                    .map(|(column, expr)| {
                        parse(&s.name, "params", expr).map(|symbol| (column.clone(), symbol))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let spec = SubreportSpec {
                    model: sub_model,
                    source: s.source.clone(),
                    params,
                };
                let visible = parse_opt(&s.name, "visible", &s.visible)?;
                let id = self.push(s.name.clone(), visible, ElementKind::Subreport(spec), depth);
                self.compile_children(id, sub_model, &s.children, depth + 1)?;
                Ok(id)
            }
        }
    }

    fn check_order_fields(&self) -> Result<(), ValidationError> {
        for element in &self.elements {
            if let ElementKind::Group(spec) = &element.kind
                && let OrderBy::Fields(fields) = &spec.order.by
            {
                let model = self.schema.model(spec.model);
                if let Some(missing) = fields.iter().find(|f| !model.declares(f)) {
                    return Err(ValidationError::UnknownOrderField {
                        group: model.name.clone(),
                        field: missing.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
