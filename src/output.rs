//! Output backends.
//!
//! The traversal never inspects fragments: it hands each visible element
//! instance to [`OutputBackend::generate`] together with a [`Scope`] and
//! appends whatever the backend pushes. [`TextBackend`] is the reference
//! implementation, producing one indented text line per element.
//!
//! # Examples
//!
//! ```
//! use banded_report::{ReportRun, Template, TextBackend};
//!
//! let template = Template::from_json_str(r#"{
//!     "children": [
//!         {"type": "text", "text": "header"},
//!         {"type": "page_break"},
//!         {"type": "text", "text": "page {pagenum()}"}
//!     ]
//! }"#).unwrap();
//!
//! let mut run = ReportRun::new(&template, &[], TextBackend::new(40));
//! let pages = run.run_to_end().unwrap();
//! assert_eq!(pages.len(), 2);
//! assert_eq!(pages[1].fragments[0].text, "page 2");
//! ```

use std::fmt;

use crate::{
    error::GenerateError,
    template::{Element, ElementKind},
    traverse::Scope,
    value::Value,
};

/// Produces fragments for one element instance.
pub trait OutputBackend {
    type Fragment;

    /// Called before the first element of every page.
    fn start_page(&mut self, _page: u32) {}

    /// Append the fragments of `element` for the scope's current group.
    /// Call [`Scope::request_page_break`] to end the page after this
    /// element.
    fn generate(
        &mut self,
        element: &Element,
        scope: &mut Scope<'_, '_>,
        out: &mut Vec<Self::Fragment>,
    ) -> Result<(), GenerateError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub id: u64,
    pub depth: usize,
    pub text: String,
}

impl fmt::Display for TextLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let indent = self.depth.saturating_sub(1) * 2;
        write!(f, "{:indent$}{}", "", self.text, indent = indent)
    }
}

/// Plain text pages of a fixed height.
#[derive(Debug, Clone)]
pub struct TextBackend {
    lines_per_page: usize,
    lines_on_page: usize,
}

impl TextBackend {
    pub fn new(lines_per_page: usize) -> Self {
        TextBackend {
            lines_per_page: lines_per_page.max(1),
            lines_on_page: 0,
        }
    }

    fn push(&mut self, scope: &mut Scope<'_, '_>, text: String, out: &mut Vec<TextLine>) {
        out.push(TextLine {
            id: scope.next_output_id(),
            depth: scope.depth(),
            text,
        });
        self.lines_on_page += 1;
        if self.lines_on_page >= self.lines_per_page {
            scope.request_page_break();
        }
    }
}

impl OutputBackend for TextBackend {
    type Fragment = TextLine;

    fn start_page(&mut self, _page: u32) {
        self.lines_on_page = 0;
    }

    fn generate(
        &mut self,
        element: &Element,
        scope: &mut Scope<'_, '_>,
        out: &mut Vec<TextLine>,
    ) -> Result<(), GenerateError> {
        match &element.kind {
            ElementKind::Root { .. }
            | ElementKind::Group(_)
            | ElementKind::Subreport(_)
            | ElementKind::Band { text: None } => {}
            ElementKind::Band { text: Some(text) } | ElementKind::Text(text) => {
                let line = scope.render_text(text)?;
                self.push(scope, line, out);
            }
            ElementKind::Field(spec) => {
                let value = scope.field_value(spec)?;
                let shown = match value {
                    Value::Null => String::new(),
                    v => v.to_string(),
                };
                if let Some(tag) = &spec.trace {
                    scope.record_trace(tag, &shown);
                }
                let line = match &spec.label {
                    Some(label) => format!("{}: {}", label, shown),
                    None => shown,
                };
                self.push(scope, line, out);
            }
            ElementKind::PageBreak => scope.request_page_break(),
        }
        Ok(())
    }
}
