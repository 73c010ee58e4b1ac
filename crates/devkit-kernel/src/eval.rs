//! The streaming evaluator.
//!
//! [`Execute`] parses a source block eagerly, then runs it one statement
//! at a time as the caller pulls items. Output interleaves in program
//! order: `print(...)` text surfaces before the value of the statement
//! that produced it, and only the trailing run of bare expression
//! statements yields values. On an error the item stream ends with that
//! error and the scope is left untouched; on clean completion the
//! block's assignments and deletions are merged back into the scope.

use std::collections::{HashMap, VecDeque};

use devkit_types::{DevError, ResultItem, Value};

use crate::ast::{BinaryOp, Expr, Stmt, UnaryOp};
use crate::parser::parse;
use crate::scope::Scope;

/// A lazily-evaluated source block.
///
/// Implements `Iterator<Item = Result<ResultItem, DevError>>`. The
/// stream is fused: after the first `Err` (or after exhaustion) it
/// yields `None` forever.
#[derive(Debug)]
pub struct Execute<'a> {
    scope: &'a mut Scope,
    stmts: Vec<Stmt>,
    index: usize,
    /// Working bindings, isolated from the scope until merge-back.
    env: HashMap<String, Value>,
    assigned: Vec<String>,
    deleted: Vec<String>,
    /// Index of the first statement in the trailing run of bare
    /// expressions; only statements at or past it yield values.
    capture_from: usize,
    pending: VecDeque<Result<ResultItem, DevError>>,
    finished: bool,
}

impl<'a> Execute<'a> {
    /// Parse `source` and prepare it to run against `scope`.
    ///
    /// `extra` bindings shadow scope bindings for the duration of the
    /// block but are not persisted unless reassigned inside it.
    pub fn new(
        source: &str,
        scope: &'a mut Scope,
        extra: Option<HashMap<String, Value>>,
    ) -> Result<Self, DevError> {
        let program = parse(source)?;

        let capture_from = {
            let mut start = program.stmts.len();
            while start > 0 && matches!(program.stmts[start - 1], Stmt::Expr(_)) {
                start -= 1;
            }
            start
        };

        // Locals first so that globals win on a shared name, then the
        // caller's extras shadow both.
        let mut env = scope.locals.clone();
        env.extend(scope.globals.clone());
        if let Some(extra) = extra {
            env.extend(extra);
        }

        Ok(Self {
            scope,
            stmts: program.stmts,
            index: 0,
            env,
            assigned: Vec::new(),
            deleted: Vec::new(),
            capture_from,
            pending: VecDeque::new(),
            finished: false,
        })
    }

    /// Run every remaining statement, discarding printed output and
    /// intermediate values, and return the final captured value.
    pub fn last_value(mut self) -> Result<Option<Value>, DevError> {
        let mut last = None;
        for item in &mut self {
            match item? {
                ResultItem::Value(value) => last = Some(value),
                ResultItem::Printed(_) => {}
            }
        }
        Ok(last)
    }

    /// Execute the next statement, queueing its printed output first
    /// and then its value or error.
    fn step(&mut self) {
        let stmt = self.stmts[self.index].clone();
        let capture = self.index >= self.capture_from;
        self.index += 1;

        let mut printed = Vec::new();
        let outcome = self.exec_stmt(&stmt, &mut printed);

        for line in printed {
            self.pending.push_back(Ok(ResultItem::Printed(line)));
        }
        match outcome {
            Ok(Some(value)) => {
                // Null values from captured expressions are suppressed;
                // `print(...)` alone should not echo a null.
                if capture && value != Value::Null {
                    self.pending.push_back(Ok(ResultItem::Value(value)));
                }
            }
            Ok(None) => {}
            Err(err) => self.pending.push_back(Err(err)),
        }
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        printed: &mut Vec<String>,
    ) -> Result<Option<Value>, DevError> {
        match stmt {
            Stmt::Assign { name, expr } => {
                let value = eval_expr(expr, &self.env, printed)?;
                self.env.insert(name.clone(), value);
                self.assigned.push(name.clone());
                Ok(None)
            }
            Stmt::Delete { name } => {
                if self.env.remove(name).is_none() {
                    return Err(DevError::Reference(name.clone()));
                }
                self.deleted.push(name.clone());
                Ok(None)
            }
            Stmt::Expr(expr) => {
                let value = eval_expr(expr, &self.env, printed)?;
                Ok(Some(value))
            }
        }
    }

    /// Persist the block's effects now that it finished cleanly.
    ///
    /// Reassigned names land back in the tier they came from; new names
    /// become globals. Deletions clear both tiers, but only for names
    /// still unbound at block end: what counts is the final state of
    /// the environment, not the order of operations inside the block.
    fn merge_back(&mut self) {
        for name in std::mem::take(&mut self.assigned) {
            let Some(value) = self.env.get(&name).cloned() else {
                continue; // assigned then deleted in the same block
            };
            if !self.scope.globals.contains_key(&name) && self.scope.locals.contains_key(&name) {
                self.scope.set_local(name, value);
            } else {
                self.scope.set_global(name, value);
            }
        }
        for name in std::mem::take(&mut self.deleted) {
            if self.env.contains_key(&name) {
                continue; // deleted then reassigned in the same block
            }
            let _ = self.scope.remove(&name);
        }
    }
}

impl Iterator for Execute<'_> {
    type Item = Result<ResultItem, DevError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.finished = true;
                }
                return Some(item);
            }
            if self.finished {
                return None;
            }
            if self.index >= self.stmts.len() {
                self.finished = true;
                self.merge_back();
                return None;
            }
            self.step();
        }
    }
}

fn eval_expr(
    expr: &Expr,
    env: &HashMap<String, Value>,
    printed: &mut Vec<String>,
) -> Result<Value, DevError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::List(items) => {
            let values = items
                .iter()
                .map(|item| eval_expr(item, env, printed))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List(values))
        }
        Expr::Var(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| DevError::Reference(name.clone())),
        Expr::Unary { op, operand } => {
            let value = eval_expr(operand, env, printed)?;
            eval_unary(*op, value)
        }
        Expr::Binary { op, lhs, rhs } => match op {
            // Short-circuit operators return an operand, not a bool.
            BinaryOp::And => {
                let left = eval_expr(lhs, env, printed)?;
                if left.truthy() {
                    eval_expr(rhs, env, printed)
                } else {
                    Ok(left)
                }
            }
            BinaryOp::Or => {
                let left = eval_expr(lhs, env, printed)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    eval_expr(rhs, env, printed)
                }
            }
            _ => {
                let left = eval_expr(lhs, env, printed)?;
                let right = eval_expr(rhs, env, printed)?;
                eval_binary(*op, left, right)
            }
        },
        Expr::Index { target, index } => {
            let target = eval_expr(target, env, printed)?;
            let index = eval_expr(index, env, printed)?;
            eval_index(target, index)
        }
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|arg| eval_expr(arg, env, printed))
                .collect::<Result<Vec<_>, _>>()?;
            call_builtin(name, values, printed)
        }
    }
}

/// Cap on the byte length of a `string * int` result.
const MAX_REPEAT_BYTES: usize = 1 << 26;

fn eval_unary(op: UnaryOp, value: Value) -> Result<Value, DevError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Neg => match value {
            Value::Int(i) => int_result(i.checked_neg()),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(DevError::Runtime(format!(
                "cannot negate {}",
                other.type_name()
            ))),
        },
    }
}

/// Surface a failed checked integer operation as an arithmetic error.
fn int_result(value: Option<i64>) -> Result<Value, DevError> {
    value
        .map(Value::Int)
        .ok_or_else(|| DevError::Arithmetic("integer overflow".into()))
}

fn eval_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, DevError> {
    use BinaryOp::*;
    match op {
        Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        Lt | Le | Gt | Ge => compare(op, lhs, rhs),
        Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_result(a.checked_add(b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (a, b) => numeric_op(op, a, b, |x, y| x + y),
        },
        Sub => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_result(a.checked_sub(b)),
            (a, b) => numeric_op(op, a, b, |x, y| x - y),
        },
        Mul => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => int_result(a.checked_mul(b)),
            (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => {
                if n <= 0 {
                    return Ok(Value::String(String::new()));
                }
                let fits = s
                    .len()
                    .checked_mul(n as usize)
                    .is_some_and(|len| len <= MAX_REPEAT_BYTES);
                if !fits {
                    return Err(DevError::Arithmetic("repeated string is too large".into()));
                }
                Ok(Value::String(s.repeat(n as usize)))
            }
            (a, b) => numeric_op(op, a, b, |x, y| x * y),
        },
        Div => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if b == 0 {
                    Err(DevError::Arithmetic("division by zero".into()))
                } else {
                    int_result(a.checked_div(b))
                }
            }
            (a, b) => {
                if as_f64(&b) == Some(0.0) {
                    return Err(DevError::Arithmetic("division by zero".into()));
                }
                numeric_op(op, a, b, |x, y| x / y)
            }
        },
        Mod => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => {
                if b == 0 {
                    Err(DevError::Arithmetic("modulo by zero".into()))
                } else {
                    int_result(a.checked_rem(b))
                }
            }
            (a, b) => {
                if as_f64(&b) == Some(0.0) {
                    return Err(DevError::Arithmetic("modulo by zero".into()));
                }
                numeric_op(op, a, b, |x, y| x % y)
            }
        },
        And | Or => unreachable!("short-circuit operators are handled before evaluation"),
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (as_f64(lhs), as_f64(rhs)) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn compare(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, DevError> {
    let ordering = match (&lhs, &rhs) {
        (Value::String(a), Value::String(b)) => a.partial_cmp(b),
        _ => match (as_f64(&lhs), as_f64(&rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return Err(type_mismatch(op, &lhs, &rhs));
    };
    let result = match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Bool(result))
}

fn numeric_op(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Value, DevError> {
    match (as_f64(&lhs), as_f64(&rhs)) {
        (Some(a), Some(b)) => Ok(Value::Float(f(a, b))),
        _ => Err(type_mismatch(op, &lhs, &rhs)),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn type_mismatch(op: BinaryOp, lhs: &Value, rhs: &Value) -> DevError {
    DevError::Runtime(format!(
        "unsupported operand types for {}: {} and {}",
        op.symbol(),
        lhs.type_name(),
        rhs.type_name()
    ))
}

fn eval_index(target: Value, index: Value) -> Result<Value, DevError> {
    let Value::Int(raw) = index else {
        return Err(DevError::Runtime(format!(
            "indices must be int, not {}",
            index.type_name()
        )));
    };
    match target {
        Value::List(items) => resolve_index(raw, items.len())
            .map(|i| items[i].clone())
            .ok_or_else(|| DevError::Runtime("list index out of range".into())),
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(raw, chars.len())
                .map(|i| Value::String(chars[i].to_string()))
                .ok_or_else(|| DevError::Runtime("string index out of range".into()))
        }
        other => Err(DevError::Runtime(format!(
            "{} is not indexable",
            other.type_name()
        ))),
    }
}

/// Negative indices count from the end.
fn resolve_index(raw: i64, len: usize) -> Option<usize> {
    let idx = if raw < 0 { raw + len as i64 } else { raw };
    if idx < 0 || idx as usize >= len {
        None
    } else {
        Some(idx as usize)
    }
}

fn call_builtin(
    name: &str,
    args: Vec<Value>,
    printed: &mut Vec<String>,
) -> Result<Value, DevError> {
    match name {
        "print" => {
            let line = args
                .iter()
                .map(Value::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            printed.push(line);
            Ok(Value::Null)
        }
        "len" => {
            let [arg] = one_arg(name, args)?;
            match arg {
                Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
                Value::List(items) => Ok(Value::Int(items.len() as i64)),
                other => Err(DevError::Runtime(format!(
                    "{} has no length",
                    other.type_name()
                ))),
            }
        }
        "str" => {
            let [arg] = one_arg(name, args)?;
            Ok(Value::String(arg.to_string()))
        }
        "int" => {
            let [arg] = one_arg(name, args)?;
            match arg {
                Value::Int(i) => Ok(Value::Int(i)),
                Value::Float(f) => Ok(Value::Int(f.trunc() as i64)),
                Value::Bool(b) => Ok(Value::Int(i64::from(b))),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::Int)
                    .map_err(|_| DevError::Runtime(format!("invalid int literal: {s:?}"))),
                other => Err(DevError::Runtime(format!(
                    "cannot convert {} to int",
                    other.type_name()
                ))),
            }
        }
        "type" => {
            let [arg] = one_arg(name, args)?;
            Ok(Value::String(arg.type_name().to_string()))
        }
        _ => Err(DevError::Reference(name.to_string())),
    }
}

fn one_arg(name: &str, args: Vec<Value>) -> Result<[Value; 1], DevError> {
    <[Value; 1]>::try_from(args)
        .map_err(|args| DevError::Runtime(format!("{name}() takes 1 argument, got {}", args.len())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, scope: &mut Scope) -> Vec<Result<ResultItem, DevError>> {
        Execute::new(source, scope, None).unwrap().collect()
    }

    fn values(items: Vec<Result<ResultItem, DevError>>) -> Vec<ResultItem> {
        items.into_iter().map(Result::unwrap).collect()
    }

    #[test]
    fn captures_the_trailing_expression_run() {
        let mut scope = Scope::new();
        let items = values(run("x = 2\nx + 1\nx * 10", &mut scope));
        assert_eq!(
            items,
            vec![
                ResultItem::Value(Value::Int(3)),
                ResultItem::Value(Value::Int(20)),
            ]
        );
    }

    #[test]
    fn interior_expressions_are_not_captured() {
        let mut scope = Scope::new();
        let items = values(run("1 + 1\nx = 5\nx", &mut scope));
        assert_eq!(items, vec![ResultItem::Value(Value::Int(5))]);
    }

    #[test]
    fn printed_output_precedes_values() {
        let mut scope = Scope::new();
        let items = values(run("print(\"a\", 1)\n2 + 2", &mut scope));
        assert_eq!(
            items,
            vec![
                ResultItem::Printed("a 1".into()),
                ResultItem::Value(Value::Int(4)),
            ]
        );
    }

    #[test]
    fn print_alone_yields_no_value() {
        let mut scope = Scope::new();
        let items = values(run("print(\"only\")", &mut scope));
        assert_eq!(items, vec![ResultItem::Printed("only".into())]);
    }

    #[test]
    fn assignments_persist_after_clean_completion() {
        let mut scope = Scope::new();
        let _ = run("x = 1\ny = x + 1", &mut scope);
        assert_eq!(scope.get("x"), Some(&Value::Int(1)));
        assert_eq!(scope.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn reassignment_stays_in_its_tier() {
        let mut scope = Scope::new();
        scope.set_local("x", Value::Int(1));
        let _ = run("x = 9", &mut scope);
        assert_eq!(scope.locals.get("x"), Some(&Value::Int(9)));
        assert!(!scope.globals.contains_key("x"));
    }

    #[test]
    fn scope_is_untouched_after_an_error() {
        let mut scope = Scope::new();
        let items = run("x = 1\nmissing\ny = 2", &mut scope);
        assert!(items.last().unwrap().is_err());
        assert!(scope.is_empty());
    }

    #[test]
    fn stream_is_fused_after_an_error() {
        let mut scope = Scope::new();
        let mut exec = Execute::new("missing", &mut scope, None).unwrap();
        assert!(exec.next().unwrap().is_err());
        assert!(exec.next().is_none());
        assert!(exec.next().is_none());
    }

    #[test]
    fn extra_bindings_shadow_but_do_not_persist() {
        let mut scope = Scope::new();
        scope.set_global("x", Value::Int(1));
        let mut extra = HashMap::new();
        extra.insert("x".to_string(), Value::Int(100));
        let items: Vec<_> = Execute::new("x", &mut scope, Some(extra))
            .unwrap()
            .collect();
        assert_eq!(
            items[0].as_ref().unwrap(),
            &ResultItem::Value(Value::Int(100))
        );
        assert_eq!(scope.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn del_removes_from_scope() {
        let mut scope = Scope::new();
        scope.set_global("x", Value::Int(1));
        let _ = run("del x", &mut scope);
        assert!(scope.get("x").is_none());
    }

    #[test]
    fn del_then_reassign_keeps_the_final_binding() {
        let mut scope = Scope::new();
        scope.set_global("x", Value::Int(1));
        let items = run("del x\nx = 7", &mut scope);
        assert!(items.iter().all(Result::is_ok));
        assert_eq!(scope.get("x"), Some(&Value::Int(7)));
    }

    #[test]
    fn assign_then_del_leaves_the_name_unbound() {
        let mut scope = Scope::new();
        scope.set_global("x", Value::Int(1));
        let _ = run("x = 2\ndel x", &mut scope);
        assert!(scope.get("x").is_none());
    }

    #[test]
    fn del_of_missing_name_is_a_reference_error() {
        let mut scope = Scope::new();
        let items = run("del nothing", &mut scope);
        assert!(matches!(items[0], Err(DevError::Reference(_))));
    }

    #[test]
    fn syntax_errors_surface_before_iteration() {
        let mut scope = Scope::new();
        let err = Execute::new("x = ", &mut scope, None).unwrap_err();
        assert!(matches!(err, DevError::Syntax(_)));
    }

    #[test]
    fn division_by_zero_is_arithmetic() {
        let mut scope = Scope::new();
        let items = run("1 / 0", &mut scope);
        assert!(matches!(items[0], Err(DevError::Arithmetic(_))));
    }

    #[test]
    fn integer_overflow_is_an_arithmetic_error() {
        let mut scope = Scope::new();
        for source in [
            "9223372036854775807 + 1",
            "0 - 9223372036854775807 - 2",
            "9223372036854775807 * 2",
            "-(0 - 9223372036854775807 - 1)",
            "(0 - 9223372036854775807 - 1) / (0 - 1)",
        ] {
            let items = run(source, &mut scope);
            assert!(
                matches!(items[0], Err(DevError::Arithmetic(_))),
                "expected arithmetic error for {source}: {items:?}"
            );
        }
    }

    #[test]
    fn huge_string_repeats_are_an_arithmetic_error() {
        let mut scope = Scope::new();
        let items = run("\"x\" * 100000000000", &mut scope);
        assert!(matches!(items[0], Err(DevError::Arithmetic(_))));
    }

    #[test]
    fn integer_division_truncates() {
        let mut scope = Scope::new();
        let items = values(run("7 / 2", &mut scope));
        assert_eq!(items, vec![ResultItem::Value(Value::Int(3))]);
    }

    #[test]
    fn short_circuit_returns_operands() {
        let mut scope = Scope::new();
        let items = values(run("0 || \"fallback\"", &mut scope));
        assert_eq!(
            items,
            vec![ResultItem::Value(Value::String("fallback".into()))]
        );

        let items = values(run("null && missing", &mut scope));
        assert_eq!(items, vec![]);
    }

    #[test]
    fn negative_indexing() {
        let mut scope = Scope::new();
        let items = values(run("[1, 2, 3][-1]", &mut scope));
        assert_eq!(items, vec![ResultItem::Value(Value::Int(3))]);
    }

    #[test]
    fn builtins_compose() {
        let mut scope = Scope::new();
        let items = values(run("len(str(1234)) + int(\"6\")", &mut scope));
        assert_eq!(items, vec![ResultItem::Value(Value::Int(10))]);
    }

    #[test]
    fn last_value_skips_printed_output() {
        let mut scope = Scope::new();
        let exec = Execute::new("print(\"x\")\n1 + 1", &mut scope, None).unwrap();
        assert_eq!(exec.last_value().unwrap(), Some(Value::Int(2)));
    }
}
