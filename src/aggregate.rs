//! Aggregate resolution: locating the candidate instances of an aggregate
//! and reducing their field values.
//!
//! - [`Accumulator`] - stateful reduction fed one present value at a time
//! - the start-group rule lives in `Evaluator::aggregate_candidates`

use std::collections::HashSet;

use rust_decimal::{Decimal, prelude::ToPrimitive};
use tracing::{trace, warn};

use crate::{
    ast::{FieldRef, Function, Symbol},
    error::ResolveError,
    evaluator::{Evaluator, field_arg, invalid},
    group::GroupId,
    value::{DistinctKey, Value},
};

/// Stateful aggregate computation: creation, feed, finish.
///
/// Empty slots never reach an accumulator; nulls do, and each accumulator
/// decides whether they count.
pub trait Accumulator {
    fn feed(&mut self, value: &Value) -> Result<(), ResolveError>;
    fn finish(&self) -> Value;
}

fn accumulator_for(func: Function) -> Box<dyn Accumulator> {
    match func {
        Function::Sum | Function::SumAll => Box::new(SumAccumulator::default()),
        Function::Count | Function::CountAll => Box::new(CountAccumulator { count: 0 }),
        Function::CountDistinct | Function::CountDistinctAll => {
            Box::new(DistinctAccumulator { seen: HashSet::new() })
        }
        Function::MinValue | Function::MinValueAll => Box::new(ExtremeAccumulator::new(true)),
        _ => Box::new(ExtremeAccumulator::new(false)),
    }
}

/// Result of an aggregate whose start group could not be found.
fn logical_zero(func: Function) -> Value {
    match func {
        Function::MinValue | Function::MinValueAll | Function::MaxValue | Function::MaxValueAll => {
            Value::Null
        }
        _ => Value::Long(0),
    }
}

/// Counts instances with a present field.
struct CountAccumulator {
    count: i64,
}

impl Accumulator for CountAccumulator {
    fn feed(&mut self, _value: &Value) -> Result<(), ResolveError> {
        self.count += 1;
        Ok(())
    }

    fn finish(&self) -> Value {
        Value::Long(self.count)
    }
}

/// Sum over numeric values, widening long -> double -> decimal.
///
/// The running total is kept exact in decimal; the result type is the
/// widest input type, except that a long total too large for i64 stays
/// decimal.
#[derive(Default)]
struct SumAccumulator {
    total: Decimal,
    float_total: f64,
    widest: u8,
    inexact: bool,
}

impl Accumulator for SumAccumulator {
    fn feed(&mut self, value: &Value) -> Result<(), ResolveError> {
        let rank = match value {
            Value::Null => return Ok(()),
            Value::Long(_) => 0,
            Value::Double(_) => 1,
            Value::Decimal(_) => 2,
            other => {
                return Err(ResolveError::TypeError(format!(
                    "sum() requires numeric values, got {} '{}'",
                    other.type_name(),
                    other
                )));
            }
        };
        self.widest = self.widest.max(rank);
        if let Some(f) = value.as_f64() {
            self.float_total += f;
        }
        match value.as_decimal().and_then(|d| self.total.checked_add(d)) {
            Some(total) => self.total = total,
            None => self.inexact = true,
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        if self.inexact {
            return Value::Double(self.float_total);
        }
        match self.widest {
            0 => self
                .total
                .to_i64()
                .map_or(Value::Decimal(self.total), Value::Long),
            1 => self
                .total
                .to_f64()
                .map_or(Value::Double(self.float_total), Value::Double),
            _ => Value::Decimal(self.total),
        }
    }
}

/// Distinct non-null values.
struct DistinctAccumulator {
    seen: HashSet<DistinctKey>,
}

impl Accumulator for DistinctAccumulator {
    fn feed(&mut self, value: &Value) -> Result<(), ResolveError> {
        if !value.is_null() {
            self.seen.insert(DistinctKey::from(value));
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        Value::Long(self.seen.len() as i64)
    }
}

/// Minimum or maximum. Null and zero count as absent.
struct ExtremeAccumulator {
    min: bool,
    best: Option<Value>,
    widest: u8,
}

impl ExtremeAccumulator {
    fn new(min: bool) -> Self {
        ExtremeAccumulator {
            min,
            best: None,
            widest: 0,
        }
    }
}

impl Accumulator for ExtremeAccumulator {
    fn feed(&mut self, value: &Value) -> Result<(), ResolveError> {
        if value.is_null() || value.is_zero() {
            return Ok(());
        }
        match value {
            Value::Long(_) => {}
            Value::Double(_) => self.widest = self.widest.max(1),
            Value::Decimal(_) => self.widest = self.widest.max(2),
            Value::Date(_) | Value::String(_) => {}
            Value::Boolean(_) | Value::Null => {
                return Err(ResolveError::TypeError(format!(
                    "{} cannot be ordered",
                    value.type_name()
                )));
            }
        }
        let replace = match &self.best {
            None => true,
            Some(best) => match value.partial_compare(best) {
                Some(ordering) => {
                    if self.min {
                        ordering.is_lt()
                    } else {
                        ordering.is_gt()
                    }
                }
                None => {
                    return Err(ResolveError::TypeError(format!(
                        "cannot compare {} with {}",
                        value.type_name(),
                        best.type_name()
                    )));
                }
            },
        };
        if replace {
            self.best = Some(value.clone());
        }
        Ok(())
    }

    fn finish(&self) -> Value {
        match (&self.best, self.widest) {
            (None, _) => Value::Null,
            (Some(v), 2) => v.as_decimal().map_or_else(|| v.clone(), Value::Decimal),
            (Some(Value::Long(n)), 1) => Value::Double(*n as f64),
            (Some(v), _) => v.clone(),
        }
    }
}

impl Evaluator<'_> {
    /// `sum`, `count`, `countDistinct`, `minvalue`, `maxvalue` and their
    /// report-wide variants.
    pub(crate) fn aggregate(
        &mut self,
        func: Function,
        args: &[Symbol],
        group: GroupId,
    ) -> Result<Value, ResolveError> {
        let Some(arg) = args.first() else {
            // nullary count(): size of the current group's list
            return Ok(Value::Long(self.tree.siblings(group).len() as i64));
        };
        let field_ref = field_arg(func, arg)?;
        let counting = matches!(func, Function::Count | Function::CountAll);
        if field_ref.field.is_none() && !counting {
            return Err(invalid(func, "needs a field, not a wildcard"));
        }

        let Some(candidates) = self.aggregate_candidates(func, field_ref, group)? else {
            return Ok(logical_zero(func));
        };
        trace!(function = %func, candidates = candidates.len(), "aggregate");

        let mut acc = accumulator_for(func);
        for candidate in candidates {
            if let Some(filter) = &field_ref.qualifier
                && !self.filter_accepts(func, filter, candidate)?
            {
                continue;
            }
            match field_ref.field.as_deref() {
                None => acc.feed(&Value::Null)?,
                Some(field) => {
                    if let Some(value) = self.field_slot(candidate, field)? {
                        acc.feed(&value)?;
                    }
                }
            }
        }
        Ok(acc.finish())
    }

    /// Inside aggregate arguments the qualifier filters candidates.
    fn filter_accepts(
        &mut self,
        func: Function,
        filter: &Symbol,
        candidate: GroupId,
    ) -> Result<bool, ResolveError> {
        match self.eval(filter, candidate)? {
            Value::Boolean(b) => Ok(b),
            Value::Null => Ok(false),
            _ => Err(ResolveError::AmbiguousGroupFilter {
                function: func.name().to_string(),
            }),
        }
    }

    /// Instances an aggregate reduces over, or `None` when the start group
    /// cannot be found (an unloaded subreport, or a level unreachable from
    /// here).
    ///
    /// - own name or no name: the current group's siblings (report-wide
    ///   variants: every instance in the report tree)
    /// - a descendant level: instances below the current group
    /// - an ancestor level: that ancestor's siblings
    /// - otherwise: subreports declared here, then ancestors that have such a
    ///   descendant level
    fn aggregate_candidates(
        &mut self,
        func: Function,
        field_ref: &FieldRef,
        group: GroupId,
    ) -> Result<Option<Vec<GroupId>>, ResolveError> {
        let tree = &*self.tree;
        let schema = tree.schema();
        let current_name = tree.name_of(group);
        let name = field_ref.group.as_deref().unwrap_or(current_name);
        if schema.find(name).is_none() {
            return Err(ResolveError::GroupNotFound(name.to_string()));
        }
        let spans = func.spans_report();
        let model = tree.group(group).model;

        // Instances called `name` at or below `start`.
        let below = |start: GroupId| -> Vec<GroupId> {
            if tree.name_of(start) == name {
                vec![start]
            } else {
                tree.descendants(start, name)
            }
        };
        let from_sibling_level = |anchor: GroupId| -> Vec<GroupId> {
            match tree.group(anchor).parent {
                _ if spans => below(tree.report_root(anchor)),
                Some(parent) => tree.descendants(parent, name),
                None => vec![anchor],
            }
        };

        if name == current_name {
            return Ok(Some(from_sibling_level(group)));
        }
        if schema.has_descendant(model, name) {
            let start = if spans { tree.report_root(group) } else { group };
            return Ok(Some(below(start)));
        }
        if let Some(ancestor) = tree.ancestor_or_self(group, name) {
            return Ok(Some(from_sibling_level(ancestor)));
        }

        let mut cursor = Some(group);
        while let Some(g) = cursor {
            let g_model = tree.group(g).model;
            if let Some(sub_model) = schema.subreport_containing(g_model, name) {
                return Ok(match tree.subreport_root(g, sub_model) {
                    Some(sub_root) => Some(below(sub_root)),
                    None => {
                        warn!(group = name, function = %func, "subreport not loaded, using logical zero");
                        None
                    }
                });
            }
            if g != group && schema.has_descendant(g_model, name) {
                let start = if spans { tree.report_root(g) } else { g };
                return Ok(Some(below(start)));
            }
            cursor = tree.outer(g);
        }

        warn!(group = name, function = %func, "no start group, using logical zero");
        Ok(None)
    }
}
