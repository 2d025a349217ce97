//! Template renderer that executes a parsed template with a data context.
//!
//! Evaluates pre-compiled expressions against the staged data map. Missing
//! keys evaluate to null rather than erroring, so templates can probe for
//! optional data with `<% if ... %>`.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::TemplateError;
use crate::template::parser::{CompareOp, Expr, TemplateNode};

/// Loop-local variable bindings layered over the data map. Lookups scan the
/// innermost bindings first.
pub(crate) type Locals = Vec<(String, Value)>;

/// Render a template AST with the given data context.
///
/// `yield` is not available here; layouts go through
/// [`crate::template::layout`].
pub fn render_nodes(
    nodes: &[TemplateNode],
    data: &IndexMap<String, Value>,
) -> Result<String, TemplateError> {
    let mut output = String::new();
    let mut locals = Locals::new();
    render_inner(nodes, data, &mut locals, None, &mut output)?;
    Ok(output)
}

/// Shared walk used for both views and layouts. When `yield_slot` is set,
/// `Yield` nodes splice it in raw; otherwise they are an error.
pub(crate) fn render_inner(
    nodes: &[TemplateNode],
    data: &IndexMap<String, Value>,
    locals: &mut Locals,
    yield_slot: Option<&str>,
    output: &mut String,
) -> Result<(), TemplateError> {
    for node in nodes {
        match node {
            TemplateNode::Literal(s) => output.push_str(s),

            TemplateNode::Output {
                expr,
                escaped,
                line,
            } => {
                let value = evaluate_expr(expr, data, locals, *line)?;
                let s = value_to_string(&value);
                if *escaped {
                    output.push_str(&html_escape(&s));
                } else {
                    output.push_str(&s);
                }
            }

            TemplateNode::If {
                condition,
                body,
                else_body,
                line,
            } => {
                let cond = evaluate_expr(condition, data, locals, *line)?;
                if is_truthy(&cond) {
                    render_inner(body, data, locals, yield_slot, output)?;
                } else if let Some(else_nodes) = else_body {
                    render_inner(else_nodes, data, locals, yield_slot, output)?;
                }
            }

            TemplateNode::For {
                var,
                index_var,
                iterable,
                body,
                line,
            } => {
                let value = evaluate_expr(iterable, data, locals, *line)?;
                let depth = locals.len();
                match value {
                    Value::Array(items) => {
                        for (i, item) in items.into_iter().enumerate() {
                            locals.truncate(depth);
                            locals.push((var.clone(), item));
                            if let Some(idx) = index_var {
                                locals.push((idx.clone(), Value::from(i)));
                            }
                            render_inner(body, data, locals, yield_slot, output)?;
                        }
                    }
                    // Objects iterate as [key, value] pairs
                    Value::Object(map) => {
                        for (key, item) in map {
                            locals.truncate(depth);
                            let pair = Value::Array(vec![Value::String(key), item]);
                            locals.push((var.clone(), pair));
                            render_inner(body, data, locals, yield_slot, output)?;
                        }
                    }
                    other => {
                        return Err(TemplateError::eval(
                            format!(
                                "Cannot iterate over {}: expected array or object",
                                type_name(&other)
                            ),
                            *line,
                        ));
                    }
                }
                locals.truncate(depth);
            }

            TemplateNode::Yield => match yield_slot {
                Some(content) => output.push_str(content),
                None => return Err(TemplateError::StrayYield),
            },
        }
    }

    Ok(())
}

/// Evaluate a pre-compiled expression against the data map and loop locals.
fn evaluate_expr(
    expr: &Expr,
    data: &IndexMap<String, Value>,
    locals: &Locals,
    line: usize,
) -> Result<Value, TemplateError> {
    match expr {
        Expr::StringLit(s) => Ok(Value::String(s.clone())),
        Expr::IntLit(n) => Ok(Value::from(*n)),
        Expr::FloatLit(n) => Ok(Value::from(*n)),
        Expr::BoolLit(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),

        Expr::Var(name) => Ok(lookup_var(name, data, locals)),

        Expr::Field(base, field) => {
            let base_value = evaluate_expr(base, data, locals, line)?;
            get_field(&base_value, field, line)
        }

        Expr::Compare(left, op, right) => {
            let left_val = evaluate_expr(left, data, locals, line)?;
            let right_val = evaluate_expr(right, data, locals, line)?;
            evaluate_compare(&left_val, *op, &right_val, line)
        }

        Expr::Not(inner) => {
            let value = evaluate_expr(inner, data, locals, line)?;
            Ok(Value::Bool(!is_truthy(&value)))
        }
    }
}

fn lookup_var(name: &str, data: &IndexMap<String, Value>, locals: &Locals) -> Value {
    for (n, v) in locals.iter().rev() {
        if n == name {
            return v.clone();
        }
    }
    // Missing keys are null, not an error
    data.get(name).cloned().unwrap_or(Value::Null)
}

fn get_field(value: &Value, field: &str, line: usize) -> Result<Value, TemplateError> {
    match value {
        Value::Object(map) => Ok(map.get(field).cloned().unwrap_or(Value::Null)),
        Value::Null => Ok(Value::Null),
        other => Err(TemplateError::eval(
            format!(
                "Cannot access '{field}' on {}: expected object",
                type_name(other)
            ),
            line,
        )),
    }
}

fn evaluate_compare(
    left: &Value,
    op: CompareOp,
    right: &Value,
    line: usize,
) -> Result<Value, TemplateError> {
    let result = match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let Some(ordering) = partial_ordering(left, right) else {
                return Err(TemplateError::eval(
                    format!("Cannot order {} and {}", type_name(left), type_name(right)),
                    line,
                ));
            };
            match op {
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::Le => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }
        }
    };
    Ok(Value::Bool(result))
}

/// Check if two values are equal. Numbers compare numerically across
/// int/float; mismatched types are never equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Null, Value::Null) => true,
        _ => false,
    }
}

fn partial_ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Check if a value is truthy
#[inline]
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(value_to_string).collect();
            parts.join(", ")
        }
        Value::Object(_) => "[Object]".to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}
