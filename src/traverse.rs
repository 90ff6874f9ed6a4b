//! Resumable traversal of the template element tree.
//!
//! A [`ReportRun`] walks the template depth first, one page per call to
//! [`ReportRun::next_page`]. Any element may ask for a new page through
//! [`Scope::request_page_break`]; the walk then unwinds to the root leaving
//! a [`Cursor`] on every group-bearing element and band, and the next call
//! resumes exactly where the previous page stopped.
//!
//! Status transitions within one page:
//!
//! ```text
//! Running --leaf asks for a break--> MetNewpage
//! MetNewpage --enclosing composite--> GotoNextPage --unwind--> (next page)
//! Running --root completes--> EndOfGeneration
//! ```

use tracing::{debug, trace};

use crate::{
    ast::Symbol,
    config::EngineConfig,
    error::{GenerateError, ResolveError},
    evaluator::{Environment, Evaluator},
    group::{GroupId, GroupTree, Row},
    output::OutputBackend,
    resolve::{
        DataProvider, MethodResolver, NoData, NoMethods, NoParameters, PageTrace,
        ParameterResolver, TraceTracker,
    },
    template::{Element, ElementId, ElementKind, FieldSpec, GroupSpec, SubreportSpec, Template, TextPart, TextTemplate},
    value::Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStatus {
    Running,
    /// An element just asked for a page break
    MetNewpage,
    /// Unwinding to the root so the next page can start
    GotoNextPage,
    /// The walk completed
    EndOfGeneration,
}

/// Resumption point of one composite element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    /// Instance being iterated when the walk was interrupted
    group_index: usize,
    /// Template child being generated when the walk was interrupted
    child_index: usize,
    /// The current instance's own fragment has been emitted
    opened: bool,
    /// The instance list has been ordered for this entry
    entered: bool,
}

/// Everything one run owns: the group tree, collaborators, the generation
/// status, the page number and the output id counter.
pub(crate) struct RunState<'a> {
    tree: GroupTree,
    params: &'a dyn ParameterResolver,
    methods: &'a dyn MethodResolver,
    data: &'a dyn DataProvider,
    tracker: Box<dyn TraceTracker + 'a>,
    config: EngineConfig,
    status: GenerationStatus,
    page: u32,
    next_output_id: u64,
}

impl<'a> RunState<'a> {
    fn evaluator<'s>(&'s mut self, node: &'s str) -> Evaluator<'s> {
        let env = Environment {
            params: self.params,
            methods: self.methods,
            tracker: &*self.tracker,
            config: &self.config,
            page: self.page,
        };
        Evaluator::new(&mut self.tree, env).with_node(node)
    }

    fn reorder(&mut self, parent: GroupId, spec: &GroupSpec, node: &str) -> Result<(), ResolveError> {
        let mut order = spec.order.clone();
        order.case_sensitive = spec
            .case_sensitive
            .unwrap_or(self.config.case_sensitive_order);
        let env = Environment {
            params: self.params,
            methods: self.methods,
            tracker: &*self.tracker,
            config: &self.config,
            page: self.page,
        };
        self.tree.reorder(parent, spec.model, &order, |tree, group, field| {
            Evaluator::new(tree, env).with_node(node).field_value(group, field)
        })
    }
}

/// The view of a run handed to an [`OutputBackend`] for one element and
/// one current group.
pub struct Scope<'s, 'a> {
    state: &'s mut RunState<'a>,
    group: GroupId,
    node: &'s str,
    depth: usize,
}

impl<'s, 'a> Scope<'s, 'a> {
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Name of the element being generated.
    pub fn node(&self) -> &str {
        self.node
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn page(&self) -> u32 {
        self.state.page
    }

    pub fn status(&self) -> GenerationStatus {
        self.state.status
    }

    pub fn tree(&self) -> &GroupTree {
        &self.state.tree
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    pub fn evaluate(&mut self, symbol: &Symbol) -> Result<Value, ResolveError> {
        let group = self.group;
        self.state.evaluator(self.node).evaluate(symbol, group)
    }

    pub fn evaluate_condition(&mut self, symbol: &Symbol) -> Result<bool, ResolveError> {
        let group = self.group;
        self.state.evaluator(self.node).evaluate_condition(symbol, group)
    }

    /// Interpolate every placeholder of `text`. Null renders as nothing.
    pub fn render_text(&mut self, text: &TextTemplate) -> Result<String, ResolveError> {
        let mut rendered = String::new();
        for part in &text.parts {
            match part {
                TextPart::Literal(s) => rendered.push_str(s),
                TextPart::Expr(symbol) => match self.evaluate(symbol)? {
                    Value::Null => {}
                    value => rendered.push_str(&value.to_string()),
                },
            }
        }
        Ok(rendered)
    }

    /// Evaluate a field element and write the value back into the current
    /// group when the element is named.
    pub fn field_value(&mut self, spec: &FieldSpec) -> Result<Value, ResolveError> {
        let value = self.evaluate(&spec.value)?;
        if let Some(target) = &spec.target {
            self.write_back(target, value.clone());
        }
        Ok(value)
    }

    pub fn write_back(&mut self, field: &str, value: Value) {
        let group = self.group;
        self.state.evaluator(self.node).write_back(group, field, value);
    }

    /// Report an emitted value to the page tracker under `tag`.
    pub fn record_trace(&mut self, tag: &str, text: &str) {
        self.state.tracker.record(tag, text);
    }

    /// Ask for a new page after the current element.
    pub fn request_page_break(&mut self) {
        debug!(node = self.node, page = self.state.page, "page break requested");
        self.state.status = GenerationStatus::MetNewpage;
    }

    /// Fresh output identity, unique within the run.
    pub fn next_output_id(&mut self) -> u64 {
        self.state.next_output_id += 1;
        self.state.next_output_id
    }
}

/// One generated page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<F> {
    pub number: u32,
    pub fragments: Vec<F>,
}

/// One report run: a template, its data and an output backend.
///
/// # Examples
///
/// ```
/// use banded_report::{ReportRun, Row, Template, TextBackend, Value};
///
/// let template = Template::from_json_str(r#"{
///     "children": [
///         {"type": "group", "name": "customer", "keys": ["name"], "children": [
///             {"type": "text", "text": "{#name}"}
///         ]}
///     ]
/// }"#).unwrap();
/// let rows: Vec<Row> = vec![
///     [("name".to_string(), Value::from("Alpha"))].into_iter().collect(),
///     [("name".to_string(), Value::from("Beta"))].into_iter().collect(),
/// ];
///
/// let mut run = ReportRun::new(&template, &rows, TextBackend::new(10));
/// let pages = run.run_to_end().unwrap();
/// let lines: Vec<_> = pages[0].fragments.iter().map(|l| l.text.as_str()).collect();
/// assert_eq!(lines, ["Alpha", "Beta"]);
/// ```
pub struct ReportRun<'a, B: OutputBackend> {
    template: &'a Template,
    state: RunState<'a>,
    backend: B,
    cursors: Vec<Cursor>,
    finished: bool,
    partial: Vec<B::Fragment>,
}

impl<'a, B: OutputBackend> ReportRun<'a, B> {
    /// Group `rows` under the template's root and prepare the first page.
    pub fn new(template: &'a Template, rows: &[Row], backend: B) -> Self {
        let mut tree = template.new_tree();
        let root = tree.root();
        tree.load_rows(root, rows);
        debug!(groups = tree.len(), rows = rows.len(), "group tree loaded");

        ReportRun {
            template,
            state: RunState {
                tree,
                params: &NoParameters,
                methods: &NoMethods,
                data: &NoData,
                tracker: Box::new(PageTrace::default()),
                config: EngineConfig::default(),
                status: GenerationStatus::Running,
                page: 0,
                next_output_id: 0,
            },
            backend,
            cursors: vec![Cursor::default(); template.elements().len()],
            finished: false,
            partial: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: &'a dyn ParameterResolver) -> Self {
        self.state.params = params;
        self
    }

    pub fn with_methods(mut self, methods: &'a dyn MethodResolver) -> Self {
        self.state.methods = methods;
        self
    }

    pub fn with_data(mut self, data: &'a dyn DataProvider) -> Self {
        self.state.data = data;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.state.config = config;
        self
    }

    pub fn with_tracker(mut self, tracker: impl TraceTracker + 'a) -> Self {
        self.state.tracker = Box::new(tracker);
        self
    }

    pub fn status(&self) -> GenerationStatus {
        self.state.status
    }

    pub fn tree(&self) -> &GroupTree {
        &self.state.tree
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fragments produced on the page that failed, in order.
    pub fn take_partial(&mut self) -> Vec<B::Fragment> {
        std::mem::take(&mut self.partial)
    }

    /// Generate the next page, or `None` once the walk has completed.
    ///
    /// An error ends the run; the fragments produced before it stay
    /// available through [`ReportRun::take_partial`].
    pub fn next_page(&mut self) -> Result<Option<Page<B::Fragment>>, GenerateError> {
        if self.finished {
            return Ok(None);
        }
        self.state.page += 1;
        self.state.status = GenerationStatus::Running;
        self.state.tracker.reset_page();
        self.backend.start_page(self.state.page);
        debug!(page = self.state.page, "starting page");

        let mut fragments = Vec::new();
        let root = self.template.root();
        let root_group = self.state.tree.root();
        if let Err(e) = self.generate(root, root_group, &mut fragments) {
            debug!(page = self.state.page, error = %e, "generation failed");
            self.finished = true;
            self.partial = fragments;
            return Err(e);
        }

        if self.state.status != GenerationStatus::GotoNextPage {
            self.finished = true;
            if fragments.is_empty() && self.state.page > 1 && self.state.config.drop_trailing_empty_page {
                debug!(page = self.state.page, "dropping trailing empty page");
                return Ok(None);
            }
        }
        Ok(Some(Page {
            number: self.state.page,
            fragments,
        }))
    }

    /// Generate every remaining page.
    pub fn run_to_end(&mut self) -> Result<Vec<Page<B::Fragment>>, GenerateError> {
        let mut pages = Vec::new();
        while let Some(page) = self.next_page()? {
            pages.push(page);
        }
        Ok(pages)
    }

    fn generate(
        &mut self,
        id: ElementId,
        group: GroupId,
        out: &mut Vec<B::Fragment>,
    ) -> Result<(), GenerateError> {
        let template = self.template;
        let element = template.element(id);
        match &element.kind {
            kind if kind.is_group_bearing() => self.generate_instances(element, group, out),
            ElementKind::Band { .. } => self.generate_band(element, group, out),
            _ => {
                if self.visible(element, group)? {
                    self.emit(element, group, out)?;
                }
                Ok(())
            }
        }
    }

    /// Group-bearing elements: iterate instances, then the template
    /// children for each instance, honoring and recording cursors.
    fn generate_instances(
        &mut self,
        element: &'a Element,
        parent: GroupId,
        out: &mut Vec<B::Fragment>,
    ) -> Result<(), GenerateError> {
        let slot = element.id.index();
        let mut cursor = self.cursors[slot];
        if !cursor.entered {
            if let ElementKind::Group(spec) = &element.kind {
                self.state.reorder(parent, spec, &element.name)?;
            }
            cursor.entered = true;
        } else {
            debug!(
                node = %element.name,
                group_index = cursor.group_index,
                child_index = cursor.child_index,
                "resuming"
            );
        }

        let instances = self.instances(element, parent)?;
        while let Some(&instance) = instances.get(cursor.group_index) {
            if !cursor.opened {
                if !self.accepts(element, instance)? {
                    trace!(node = %element.name, index = cursor.group_index, "instance skipped");
                    cursor.group_index += 1;
                    continue;
                }
                self.emit(element, instance, out)?;
                cursor.opened = true;
                if self.state.status == GenerationStatus::MetNewpage {
                    self.state.status = GenerationStatus::GotoNextPage;
                    self.cursors[slot] = cursor;
                    return Ok(());
                }
            }

            if self.generate_children(element, instance, &mut cursor, out)? {
                self.cursors[slot] = cursor;
                return Ok(());
            }
            cursor.child_index = 0;
            cursor.opened = false;
            cursor.group_index += 1;
        }

        self.cursors[slot] = Cursor::default();
        self.state.status = GenerationStatus::EndOfGeneration;
        Ok(())
    }

    /// Bands carry no instances but keep a child cursor and emit their own
    /// fragment once.
    fn generate_band(
        &mut self,
        element: &'a Element,
        group: GroupId,
        out: &mut Vec<B::Fragment>,
    ) -> Result<(), GenerateError> {
        let slot = element.id.index();
        let mut cursor = self.cursors[slot];
        if !cursor.opened {
            if !self.visible(element, group)? {
                return Ok(());
            }
            self.emit(element, group, out)?;
            cursor.opened = true;
            if self.state.status == GenerationStatus::MetNewpage {
                self.state.status = GenerationStatus::GotoNextPage;
                self.cursors[slot] = cursor;
                return Ok(());
            }
        }

        if self.generate_children(element, group, &mut cursor, out)? {
            self.cursors[slot] = cursor;
            return Ok(());
        }
        self.cursors[slot] = Cursor::default();
        Ok(())
    }

    /// Generate template children from the cursor on. Returns true when a
    /// page break interrupted the walk.
    fn generate_children(
        &mut self,
        element: &'a Element,
        group: GroupId,
        cursor: &mut Cursor,
        out: &mut Vec<B::Fragment>,
    ) -> Result<bool, GenerateError> {
        for (c, &child) in element.children.iter().enumerate().skip(cursor.child_index) {
            self.generate(child, group, out)?;
            match self.state.status {
                GenerationStatus::MetNewpage => {
                    cursor.child_index = c + 1;
                    self.state.status = GenerationStatus::GotoNextPage;
                    debug!(node = %element.name, child_index = c + 1, "unwinding after page break");
                    return Ok(true);
                }
                GenerationStatus::GotoNextPage => {
                    cursor.child_index = c;
                    return Ok(true);
                }
                GenerationStatus::Running | GenerationStatus::EndOfGeneration => {}
            }
        }
        Ok(false)
    }

    /// Instances a group-bearing element iterates under `parent`.
    fn instances(&mut self, element: &'a Element, parent: GroupId) -> Result<Vec<GroupId>, GenerateError> {
        match &element.kind {
            ElementKind::Group(spec) => Ok(self.state.tree.children(parent, spec.model).to_vec()),
            ElementKind::Subreport(spec) => {
                let root = match self.state.tree.subreport_root(parent, spec.model) {
                    Some(root) => root,
                    None => self.load_subreport(element, spec, parent)?,
                };
                Ok(vec![root])
            }
            _ => Ok(vec![parent]),
        }
    }

    /// Fetch a subreport's rows on first traversal and attach them to the
    /// host group.
    fn load_subreport(
        &mut self,
        element: &'a Element,
        spec: &'a SubreportSpec,
        host: GroupId,
    ) -> Result<GroupId, GenerateError> {
        let mut params = Row::new();
        for (column, symbol) in &spec.params {
            let value = self.state.evaluator(&element.name).evaluate(symbol, host)?;
            params.insert(column.clone(), value);
        }
        let rows = self
            .state
            .data
            .fetch(&spec.source, &params)
            .map_err(|e| GenerateError::Data {
                subreport: element.name.clone(),
                source_name: spec.source.clone(),
                message: e.to_string(),
            })?;
        debug!(subreport = %element.name, source = %spec.source, rows = rows.len(), "subreport loaded");

        let root = self.state.tree.attach_subreport(host, spec.model);
        self.state.tree.load_rows(root, &rows);
        Ok(root)
    }

    /// Group filter and element visibility, checked once per instance.
    fn accepts(&mut self, element: &'a Element, instance: GroupId) -> Result<bool, ResolveError> {
        if let ElementKind::Group(spec) = &element.kind
            && let Some(filter) = &spec.filter
            && !self
                .state
                .evaluator(&element.name)
                .evaluate_condition(filter, instance)?
        {
            return Ok(false);
        }
        self.visible(element, instance)
    }

    fn visible(&mut self, element: &'a Element, group: GroupId) -> Result<bool, ResolveError> {
        match &element.visible {
            None => Ok(true),
            Some(condition) => self
                .state
                .evaluator(&element.name)
                .evaluate_condition(condition, group),
        }
    }

    fn emit(
        &mut self,
        element: &'a Element,
        group: GroupId,
        out: &mut Vec<B::Fragment>,
    ) -> Result<(), GenerateError> {
        let mut scope = Scope {
            state: &mut self.state,
            group,
            node: &element.name,
            depth: element.depth,
        };
        self.backend.generate(element, &mut scope, out)
    }
}
