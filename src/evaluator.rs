use tracing::{trace, warn};

use crate::{
    ast::{FieldRef, Function, MethodCall, MethodTag, Operator, Symbol},
    config::{EngineConfig, MAX_EVAL_DEPTH},
    error::ResolveError,
    group::{FieldLookup, GroupId, GroupTree},
    resolve::{MethodResolver, ParameterResolver, TraceTracker},
    value::Value,
};

/// Everything an evaluation reads besides the group tree.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub params: &'a dyn ParameterResolver,
    pub methods: &'a dyn MethodResolver,
    pub tracker: &'a dyn TraceTracker,
    pub config: &'a EngineConfig,
    /// Page being produced, answered by `pagenum()`
    pub page: u32,
}

/// Evaluates symbols against group instances.
///
/// The current group is an explicit argument of every call; the evaluator
/// itself only carries the tree, the environment, the originating template
/// node (for diagnostics) and the recursion depth.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use banded_report::{
///     EngineConfig, Environment, Evaluator, GroupTree, NoMethods, PageTrace, Schema, Value,
///     parse_expression,
/// };
///
/// let mut tree = GroupTree::new(Schema::new("report"));
/// let params: HashMap<String, Value> = HashMap::from([("VAT".to_string(), Value::Long(22))]);
/// let config = EngineConfig::default();
/// let env = Environment {
///     params: &params,
///     methods: &NoMethods,
///     tracker: &PageTrace::default(),
///     config: &config,
///     page: 1,
/// };
///
/// let root = tree.root();
/// let symbol = parse_expression("$VAT * 2").unwrap();
/// let value = Evaluator::new(&mut tree, env).evaluate(&symbol, root).unwrap();
/// assert_eq!(value, Value::Long(44));
/// ```
pub struct Evaluator<'a> {
    pub(crate) tree: &'a mut GroupTree,
    pub(crate) env: Environment<'a>,
    node: &'a str,
    depth: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(tree: &'a mut GroupTree, env: Environment<'a>) -> Self {
        Evaluator {
            tree,
            env,
            node: "",
            depth: 0,
        }
    }

    /// Attach the template node errors are reported against.
    pub fn with_node(mut self, node: &'a str) -> Self {
        self.node = node;
        self
    }

    pub fn tree(&self) -> &GroupTree {
        &*self.tree
    }

    /// Evaluate `symbol` with `group` as the current group.
    pub fn evaluate(&mut self, symbol: &Symbol, group: GroupId) -> Result<Value, ResolveError> {
        self.eval(symbol, group).map_err(|e| self.in_context(e))
    }

    /// Evaluate a visibility or filter condition. Null counts as false.
    pub fn evaluate_condition(&mut self, symbol: &Symbol, group: GroupId) -> Result<bool, ResolveError> {
        self.eval_bool(symbol, group).map_err(|e| self.in_context(e))
    }

    /// Value of `field` on `group`, realizing lazy fields. Empty reads as null.
    pub fn field_value(&mut self, group: GroupId, field: &str) -> Result<Value, ResolveError> {
        self.read_field(group, field).map_err(|e| self.in_context(e))
    }

    /// Store a named element's value in the group's field cache.
    pub fn write_back(&mut self, group: GroupId, field: &str, value: Value) {
        trace!(group = %self.tree.name_of(group), field, "write back");
        self.tree.store_computed(group, field, value);
    }

    fn in_context(&self, e: ResolveError) -> ResolveError {
        if self.node.is_empty() {
            e
        } else {
            e.in_node(self.node)
        }
    }

    pub(crate) fn eval(&mut self, symbol: &Symbol, group: GroupId) -> Result<Value, ResolveError> {
        let limit = self.env.config.max_eval_depth.min(MAX_EVAL_DEPTH);
        if self.depth >= limit {
            return Err(ResolveError::RecursionLimit(limit));
        }
        self.depth += 1;
        let result = self.dispatch(symbol, group);
        self.depth -= 1;
        result
    }

    fn dispatch(&mut self, symbol: &Symbol, group: GroupId) -> Result<Value, ResolveError> {
        match symbol {
            Symbol::Literal(v) => Ok(v.clone()),
            Symbol::Identifier(name) => Ok(Value::String(name.clone())),
            Symbol::Constant { name } => self
                .env
                .params
                .resolve(name)
                .ok_or_else(|| ResolveError::UnknownParameter(name.clone())),
            Symbol::Field(field_ref) => self.eval_field(field_ref, group),
            Symbol::Function { func, args } => self.eval_function(*func, args, group),
            Symbol::MethodCall(call) => self.eval_method(call, group),
            Symbol::Operation { op, operands } => self.eval_operation(*op, operands, group),
        }
    }

    pub(crate) fn eval_bool(&mut self, symbol: &Symbol, group: GroupId) -> Result<bool, ResolveError> {
        match self.eval(symbol, group)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            other => Err(ResolveError::TypeError(format!(
                "expected a boolean, got {} '{}'",
                other.type_name(),
                other
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Fields
    // ------------------------------------------------------------------

    fn eval_field(&mut self, field_ref: &FieldRef, group: GroupId) -> Result<Value, ResolveError> {
        let field = field_ref.field.as_deref().ok_or_else(|| {
            ResolveError::TypeError(format!(
                "wildcard reference '{}' is only valid as an aggregate argument",
                field_ref
            ))
        })?;
        let target = self.target_group(field_ref, group)?;
        self.read_field(target, field)
    }

    /// The instance a field reference points at.
    pub(crate) fn target_group(
        &mut self,
        field_ref: &FieldRef,
        group: GroupId,
    ) -> Result<GroupId, ResolveError> {
        match &field_ref.qualifier {
            Some(qualifier) => self.locate_indexed(field_ref.group.as_deref(), qualifier, group),
            None => self.locate_named(field_ref.group.as_deref(), group),
        }
    }

    /// `#f` is the current group; `g#f` is the nearest ancestor called `g`,
    /// otherwise the first instance of `g` below the current group or one
    /// of its ancestors (subreports included).
    pub(crate) fn locate_named(
        &self,
        name: Option<&str>,
        group: GroupId,
    ) -> Result<GroupId, ResolveError> {
        let Some(name) = name else {
            return Ok(group);
        };
        if let Some(ancestor) = self.tree.ancestor_or_self(group, name) {
            return Ok(ancestor);
        }
        if self.tree.schema().find(name).is_none() {
            return Err(ResolveError::GroupNotFound(name.to_string()));
        }
        let mut cursor = Some(group);
        while let Some(g) = cursor {
            if let Some(&first) = self.tree.descendants(g, name).first() {
                return Ok(first);
            }
            cursor = self.tree.outer(g);
        }
        Err(ResolveError::GroupNotFound(name.to_string()))
    }

    fn locate_indexed(
        &mut self,
        name: Option<&str>,
        qualifier: &Symbol,
        group: GroupId,
    ) -> Result<GroupId, ResolveError> {
        let name = match name {
            Some(n) => n.to_string(),
            None => self.tree.name_of(group).to_string(),
        };
        let index = match self.eval(qualifier, group)? {
            v if v.is_numeric() => v.as_i64().ok_or_else(|| {
                ResolveError::TypeError(format!("index '{}' of '{}' is not an integer", v, name))
            })?,
            other => {
                return Err(ResolveError::TypeError(format!(
                    "index of '{}' must be a number, got {}",
                    name,
                    other.type_name()
                )));
            }
        };

        let list = self.instance_list(&name, group)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| list.get(i).copied())
            .ok_or(ResolveError::IndexOutOfRange {
                group: name,
                index,
                len: list.len(),
            })
    }

    /// The ancestor's sibling list if `name` is an ancestor, otherwise every
    /// instance of `name` below the current group.
    fn instance_list(&self, name: &str, group: GroupId) -> Result<Vec<GroupId>, ResolveError> {
        if let Some(ancestor) = self.tree.ancestor_or_self(group, name) {
            return Ok(self.tree.siblings(ancestor).to_vec());
        }
        if self.tree.schema().find(name).is_none() {
            return Err(ResolveError::GroupNotFound(name.to_string()));
        }
        Ok(self.tree.descendants(group, name))
    }

    /// Field read distinguishing empty (`None`) from a present value.
    pub(crate) fn field_slot(
        &mut self,
        group: GroupId,
        field: &str,
    ) -> Result<Option<Value>, ResolveError> {
        match self.tree.lookup(group, field) {
            FieldLookup::Ready(v) => Ok(Some(v)),
            FieldLookup::Empty => Ok(None),
            FieldLookup::Pending(symbol) => {
                trace!(group = %self.tree.name_of(group), field, "computing auto field");
                let value = self.eval(&symbol, group)?;
                self.tree.store_computed(group, field, value.clone());
                Ok(Some(value))
            }
            FieldLookup::Undeclared => self.undeclared(group, field).map(Some),
        }
    }

    pub(crate) fn read_field(&mut self, group: GroupId, field: &str) -> Result<Value, ResolveError> {
        Ok(self.field_slot(group, field)?.unwrap_or(Value::Null))
    }

    fn undeclared(&self, group: GroupId, field: &str) -> Result<Value, ResolveError> {
        let name = self.tree.name_of(group);
        if self.env.config.lenient_fields {
            warn!(group = %name, field, node = self.node, "undeclared field rendered as sentinel");
            return Ok(Value::String(format!("?? {}#{} non trovato ??", name, field)));
        }
        Err(ResolveError::FieldNotFound {
            group: name.to_string(),
            field: field.to_string(),
        })
    }

    // ------------------------------------------------------------------
    // Methods and operators
    // ------------------------------------------------------------------

    fn eval_method(&mut self, call: &MethodCall, group: GroupId) -> Result<Value, ResolveError> {
        let value = self.env.methods.invoke(call, &*self.tree, group, self.node)?;
        match call.tag {
            MethodTag::Value => Ok(value),
            MethodTag::Text => Ok(Value::String(value.to_string())),
            MethodTag::Boolean => match value {
                Value::Boolean(_) => Ok(value),
                other => Err(ResolveError::Method {
                    class: call.class.clone(),
                    method: call.method.clone(),
                    message: format!("expected a boolean result, got {}", other.type_name()),
                }),
            },
        }
    }

    fn eval_operation(
        &mut self,
        op: Operator,
        operands: &[Symbol],
        group: GroupId,
    ) -> Result<Value, ResolveError> {
        match (op, operands) {
            (Operator::And, _) => {
                for operand in operands {
                    if !self.eval_bool(operand, group)? {
                        return Ok(Value::Boolean(false));
                    }
                }
                Ok(Value::Boolean(true))
            }
            (Operator::Or, _) => {
                for operand in operands {
                    if self.eval_bool(operand, group)? {
                        return Ok(Value::Boolean(true));
                    }
                }
                Ok(Value::Boolean(false))
            }
            (Operator::Not, [operand]) => Ok(Value::Boolean(!self.eval_bool(operand, group)?)),
            (Operator::Negate, [operand]) => negate(self.eval(operand, group)?),
            (op, [left, right]) if !op.is_unary() => {
                let left = self.eval(left, group)?;
                let right = self.eval(right, group)?;
                apply_binop(op, &left, &right)
            }
            (op, operands) => Err(ResolveError::TypeError(format!(
                "operator '{}' applied to {} operand(s)",
                op,
                operands.len()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn eval_function(
        &mut self,
        func: Function,
        args: &[Symbol],
        group: GroupId,
    ) -> Result<Value, ResolveError> {
        let (min, max) = func.arity();
        if args.len() < min || args.len() > max {
            return Err(ResolveError::Arity {
                function: func.name().to_string(),
                expected: if min == max {
                    min.to_string()
                } else {
                    format!("{} to {}", min, max)
                },
                got: args.len(),
            });
        }

        match func {
            f if f.is_aggregate() => self.aggregate(f, args, group),
            Function::Prev | Function::Next | Function::First | Function::Last => {
                self.positional(func, args, group)
            }
            Function::Current | Function::CurrentStart => self.traced(func, args, group),
            Function::Exist => self.exist(&args[0], group),
            Function::RecNum => Ok(Value::Long(self.tree.group(group).index as i64 + 1)),
            Function::PageNum => Ok(Value::Long(i64::from(self.env.page))),
            _ => Err(ResolveError::InvalidArgument {
                function: func.name().to_string(),
                message: "not callable here".into(),
            }),
        }
    }

    /// `prev`, `next`, `first`, `last`: index arithmetic in the list of the
    /// referenced group. Out of range reads as null.
    fn positional(
        &mut self,
        func: Function,
        args: &[Symbol],
        group: GroupId,
    ) -> Result<Value, ResolveError> {
        let Some(arg) = args.first() else {
            // nullary first()/last(): is the current group at that end?
            let len = self.tree.siblings(group).len();
            let index = self.tree.group(group).index;
            let at_end = match func {
                Function::First => index == 0,
                _ => index + 1 == len,
            };
            return Ok(Value::Boolean(at_end));
        };

        let field_ref = field_arg(func, arg)?;
        let field = field_ref.field.as_deref().ok_or_else(|| invalid(func, "needs a field, not a wildcard"))?;
        if field_ref.qualifier.is_some() {
            return Err(invalid(func, "a qualified reference is not allowed here"));
        }
        let target = match field_ref.group.as_deref() {
            None => group,
            Some(name) => self
                .tree
                .ancestor_or_self(group, name)
                .ok_or_else(|| ResolveError::GroupNotFound(name.to_string()))?,
        };

        let siblings = self.tree.siblings(target);
        let index = self.tree.group(target).index;
        let wanted = match func {
            Function::Prev => index.checked_sub(1),
            Function::Next => Some(index + 1),
            Function::First => Some(0),
            _ => siblings.len().checked_sub(1),
        };
        match wanted.and_then(|i| siblings.get(i).copied()) {
            Some(sibling) => self.read_field(sibling, field),
            None => Ok(Value::Null),
        }
    }

    /// `current`/`currentStart`: values emitted on the current page, by
    /// trace tag.
    fn traced(&mut self, func: Function, args: &[Symbol], group: GroupId) -> Result<Value, ResolveError> {
        let tag = match args {
            [] => self.node.to_string(),
            [Symbol::Field(r)] => r
                .field
                .clone()
                .ok_or_else(|| invalid(func, "needs a field, not a wildcard"))?,
            [Symbol::Identifier(tag)] => tag.clone(),
            [_, tag] => self.eval(tag, group)?.to_string(),
            _ => return Err(invalid(func, "expects a field and an optional trace tag")),
        };
        let found = match func {
            Function::CurrentStart => self.env.tracker.current_start_value(&tag),
            _ => self.env.tracker.current_value(&tag),
        };
        Ok(found.map_or(Value::Null, Value::String))
    }

    /// `exist(ref)`: true when the referenced group exists and the field is
    /// present on it.
    fn exist(&mut self, arg: &Symbol, group: GroupId) -> Result<Value, ResolveError> {
        let field_ref = field_arg(Function::Exist, arg)?;
        let target = match self.target_group(field_ref, group) {
            Ok(target) => target,
            Err(ResolveError::GroupNotFound(_) | ResolveError::IndexOutOfRange { .. }) => {
                return Ok(Value::Boolean(false));
            }
            Err(e) => return Err(e),
        };
        let Some(field) = field_ref.field.as_deref() else {
            return Ok(Value::Boolean(true));
        };
        let present = match self.tree.lookup(target, field) {
            FieldLookup::Ready(_) => true,
            FieldLookup::Pending(_) => self.field_slot(target, field)?.is_some(),
            FieldLookup::Empty | FieldLookup::Undeclared => false,
        };
        Ok(Value::Boolean(present))
    }
}

pub(crate) fn field_arg(func: Function, arg: &Symbol) -> Result<&FieldRef, ResolveError> {
    match arg {
        Symbol::Field(field_ref) => Ok(field_ref),
        other => Err(invalid(func, &format!("expects a field reference, got '{}'", other))),
    }
}

pub(crate) fn invalid(func: Function, message: &str) -> ResolveError {
    ResolveError::InvalidArgument {
        function: func.name().to_string(),
        message: message.to_string(),
    }
}

fn negate(value: Value) -> Result<Value, ResolveError> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Long(n) => Ok(n
            .checked_neg()
            .map_or_else(|| Value::Decimal(-rust_decimal::Decimal::from(n)), Value::Long)),
        Value::Double(n) => Ok(Value::Double(-n)),
        Value::Decimal(d) => Ok(Value::Decimal(-d)),
        other => Err(ResolveError::TypeError(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

fn apply_binop(op: Operator, left: &Value, right: &Value) -> Result<Value, ResolveError> {
    let ordered = |pred: fn(std::cmp::Ordering) -> bool| -> Result<Value, ResolveError> {
        if left.is_null() || right.is_null() {
            return Ok(Value::Boolean(false));
        }
        match left.partial_compare(right) {
            Some(ordering) => Ok(Value::Boolean(pred(ordering))),
            None => Err(ResolveError::TypeError(format!(
                "cannot compare {} with {}",
                left.type_name(),
                right.type_name()
            ))),
        }
    };

    match op {
        Operator::Add => Ok(left.add(right)?),
        Operator::Subtract => Ok(left.sub(right)?),
        Operator::Multiply => Ok(left.mul(right)?),
        Operator::Divide => Ok(left.div(right)?),
        Operator::Modulo => Ok(left.rem(right)?),
        Operator::Equal => Ok(Value::Boolean(left.loose_eq(right))),
        Operator::NotEqual => Ok(Value::Boolean(!left.loose_eq(right))),
        Operator::LessThan => ordered(|o| o.is_lt()),
        Operator::GreaterThan => ordered(|o| o.is_gt()),
        Operator::LessEqual => ordered(|o| o.is_le()),
        Operator::GreaterEqual => ordered(|o| o.is_ge()),
        Operator::And | Operator::Or | Operator::Not | Operator::Negate => Err(
            ResolveError::TypeError(format!("'{}' is not a binary operator", op)),
        ),
    }
}
