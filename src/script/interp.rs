//! Tree-walking evaluator. The namespace is a flat name → value map; there
//! are no user-defined functions or scopes, matching the snippet contract.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::table::Table;

use super::ast::{BinOp, Constant, Expr, Program, Stmt, UnaryOp};
use super::value::Value;
use super::ScriptError;

pub type Env = HashMap<String, Value>;

pub fn exec(program: &Program, env: &mut Env) -> Result<(), ScriptError> {
    for stmt in &program.statements {
        exec_stmt(stmt, env)?;
    }
    Ok(())
}

fn exec_stmt(stmt: &Stmt, env: &mut Env) -> Result<(), ScriptError> {
    match stmt {
        Stmt::Assign { target, value, .. } => {
            let v = eval(value, env)?;
            env.insert(target.clone(), v);
            Ok(())
        }
        Stmt::Expr { value, .. } => {
            eval(value, env)?;
            Ok(())
        }
        Stmt::For { var, iter, body, .. } => {
            let iterable = eval(iter, env)?;
            let Value::List(items) = iterable else {
                return Err(ScriptError::Type(format!(
                    "cannot iterate over `{}`",
                    iterable.kind()
                )));
            };
            for item in items {
                env.insert(var.clone(), item);
                for stmt in body {
                    exec_stmt(stmt, env)?;
                }
            }
            Ok(())
        }
    }
}

pub fn eval(expr: &Expr, env: &Env) -> Result<Value, ScriptError> {
    match expr {
        Expr::Constant(c) => Ok(constant_value(c)),
        Expr::Name(name) => env
            .get(name)
            .cloned()
            .ok_or_else(|| ScriptError::Undefined(name.clone())),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, env)?);
            }
            Ok(Value::List(out))
        }
        Expr::Dict(pairs) => {
            let mut map = BTreeMap::new();
            for (key, value) in pairs {
                let key = match eval(key, env)? {
                    Value::Str(s) => s,
                    other => {
                        return Err(ScriptError::Type(format!(
                            "dict keys must be strings, got `{}`",
                            other.kind()
                        )))
                    }
                };
                map.insert(key, eval(value, env)?);
            }
            Ok(Value::Dict(map))
        }
        Expr::Subscript { base, index } => {
            let base = eval(base, env)?;
            let index = eval(index, env)?;
            subscript(&base, &index)
        }
        Expr::Call { func, args } => {
            let argv = eval_args(args, env)?;
            match env.get(func) {
                Some(Value::Callable { func: f, .. }) => f(&argv),
                Some(other) => Err(ScriptError::Type(format!(
                    "`{func}` is a `{}`, not callable",
                    other.kind()
                ))),
                None => builtin(func, &argv),
            }
        }
        Expr::MethodCall { base, method, args } => {
            let recv = eval(base, env)?;
            let argv = eval_args(args, env)?;
            method_call(&recv, method, &argv)
        }
        Expr::Unary { op: UnaryOp::Neg, operand } => match eval(operand, env)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(ScriptError::Type(format!("cannot negate `{}`", other.kind()))),
        },
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, env)?;
            let r = eval(rhs, env)?;
            binary(*op, &l, &r)
        }
    }
}

fn eval_args(args: &[Expr], env: &Env) -> Result<Vec<Value>, ScriptError> {
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        out.push(eval(arg, env)?);
    }
    Ok(out)
}

fn constant_value(c: &Constant) -> Value {
    match c {
        Constant::None => Value::Null,
        Constant::Bool(b) => Value::Bool(*b),
        Constant::Int(i) => Value::Int(*i),
        Constant::Float(f) => Value::Float(*f),
        Constant::Str(s) => Value::Str(s.clone()),
    }
}

fn subscript(base: &Value, index: &Value) -> Result<Value, ScriptError> {
    match (base, index) {
        (Value::List(items), Value::Int(i)) => {
            let len = items.len();
            let idx = if *i < 0 { *i + len as i64 } else { *i };
            if idx < 0 || idx as usize >= len {
                return Err(ScriptError::IndexOutOfBounds { index: *i, len });
            }
            Ok(items[idx as usize].clone())
        }
        (Value::Dict(map), Value::Str(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| ScriptError::Runtime(format!("key `{key}` not found"))),
        (b, i) => Err(ScriptError::Type(format!(
            "cannot subscript `{}` with `{}`",
            b.kind(),
            i.kind()
        ))),
    }
}

/// Interpreter-level builtins, consulted after the namespace.
fn builtin(name: &str, args: &[Value]) -> Result<Value, ScriptError> {
    match name {
        "len" => match args {
            [Value::List(items)] => Ok(Value::Int(items.len() as i64)),
            [Value::Str(s)] => Ok(Value::Int(s.chars().count() as i64)),
            [Value::Dict(map)] => Ok(Value::Int(map.len() as i64)),
            [Value::Table(t)] => Ok(Value::Int(t.row_count() as i64)),
            _ => Err(ScriptError::Type("len() takes one sized argument".to_string())),
        },
        "str" => match args {
            [v] => Ok(Value::Str(v.render())),
            _ => Err(ScriptError::Type("str() takes one argument".to_string())),
        },
        "round" => match args {
            [v] => {
                let x = v
                    .as_f64()
                    .ok_or_else(|| ScriptError::Type("round() needs a number".to_string()))?;
                Ok(Value::Int(x.round() as i64))
            }
            [v, Value::Int(digits)] => {
                let x = v
                    .as_f64()
                    .ok_or_else(|| ScriptError::Type("round() needs a number".to_string()))?;
                let scale = 10f64.powi(*digits as i32);
                Ok(Value::Float((x * scale).round() / scale))
            }
            _ => Err(ScriptError::Type("round() takes a number and optional digits".to_string())),
        },
        _ => Err(ScriptError::Undefined(name.to_string())),
    }
}

fn method_call(recv: &Value, method: &str, args: &[Value]) -> Result<Value, ScriptError> {
    match recv {
        Value::Table(t) => table_method(t, method, args),
        Value::List(items) => match (method, args) {
            ("len", []) => Ok(Value::Int(items.len() as i64)),
            _ => Err(no_such_method(recv, method)),
        },
        Value::Str(s) => match (method, args) {
            ("len", []) => Ok(Value::Int(s.chars().count() as i64)),
            ("upper", []) => Ok(Value::Str(s.to_uppercase())),
            ("lower", []) => Ok(Value::Str(s.to_lowercase())),
            _ => Err(no_such_method(recv, method)),
        },
        _ => Err(no_such_method(recv, method)),
    }
}

fn no_such_method(recv: &Value, method: &str) -> ScriptError {
    ScriptError::NoSuchMethod { kind: recv.kind(), method: method.to_string() }
}

fn table_method(t: &Arc<Table>, method: &str, args: &[Value]) -> Result<Value, ScriptError> {
    let column_arg = |args: &[Value]| -> Result<String, ScriptError> {
        match args {
            [Value::Str(name)] => Ok(name.clone()),
            _ => Err(ScriptError::Type(format!("{method}() takes a column name"))),
        }
    };
    match method {
        "sum" => {
            let name = column_arg(args)?;
            let col = t.column(&name).ok_or(ScriptError::UnknownColumn(name))?;
            let total: f64 = col.numeric().sum();
            if col.all_integer() {
                Ok(Value::Int(total as i64))
            } else {
                Ok(Value::Float(total))
            }
        }
        "mean" => {
            let name = column_arg(args)?;
            let col = t.column(&name).ok_or(ScriptError::UnknownColumn(name))?;
            let (mut total, mut n) = (0.0, 0usize);
            for x in col.numeric() {
                total += x;
                n += 1;
            }
            if n == 0 {
                return Err(ScriptError::Runtime(format!(
                    "mean of column `{}` is undefined: no numeric values",
                    col.name
                )));
            }
            Ok(Value::Float(total / n as f64))
        }
        "min" | "max" => {
            let name = column_arg(args)?;
            let col = t.column(&name).ok_or(ScriptError::UnknownColumn(name))?;
            let folded = col.numeric().fold(None, |acc: Option<f64>, x| {
                Some(match acc {
                    None => x,
                    Some(a) if method == "min" => a.min(x),
                    Some(a) => a.max(x),
                })
            });
            let x = folded.ok_or_else(|| {
                ScriptError::Runtime(format!("{method} of column `{}` is undefined", col.name))
            })?;
            if col.all_integer() {
                Ok(Value::Int(x as i64))
            } else {
                Ok(Value::Float(x))
            }
        }
        "count" => match args {
            [] => Ok(Value::Int(t.row_count() as i64)),
            _ => Err(ScriptError::Type("count() takes no arguments".to_string())),
        },
        "head" => {
            let n = match args {
                [] => 5,
                [Value::Int(n)] if *n >= 0 => *n as usize,
                _ => return Err(ScriptError::Type("head() takes a non-negative count".to_string())),
            };
            Ok(Value::Table(Arc::new(t.head(n))))
        }
        "columns" => match args {
            [] => Ok(Value::List(
                t.column_names().into_iter().map(Value::Str).collect(),
            )),
            _ => Err(ScriptError::Type("columns() takes no arguments".to_string())),
        },
        "sort_values" => {
            let (name, ascending) = match args {
                [Value::Str(name)] => (name.clone(), true),
                [Value::Str(name), Value::Bool(asc)] => (name.clone(), *asc),
                _ => {
                    return Err(ScriptError::Type(
                        "sort_values() takes a column name and optional ascending flag".to_string(),
                    ))
                }
            };
            let sorted = t
                .sort_by(&name, ascending)
                .ok_or(ScriptError::UnknownColumn(name))?;
            Ok(Value::Table(Arc::new(sorted)))
        }
        "to_string" => match args {
            [] => Ok(Value::Str(t.render())),
            _ => Err(ScriptError::Type("to_string() takes no arguments".to_string())),
        },
        _ => Err(ScriptError::NoSuchMethod { kind: "dataframe", method: method.to_string() }),
    }
}

fn binary(op: BinOp, l: &Value, r: &Value) -> Result<Value, ScriptError> {
    use BinOp::*;
    match op {
        Eq => return Ok(Value::Bool(l == r)),
        Ne => return Ok(Value::Bool(l != r)),
        _ => {}
    }
    if let (Value::Str(a), Value::Str(b)) = (l, r) {
        return match op {
            Add => Ok(Value::Str(format!("{a}{b}"))),
            Lt => Ok(Value::Bool(a < b)),
            Le => Ok(Value::Bool(a <= b)),
            Gt => Ok(Value::Bool(a > b)),
            Ge => Ok(Value::Bool(a >= b)),
            _ => Err(ScriptError::Type("unsupported string operation".to_string())),
        };
    }
    // Integer arithmetic stays exact in i64; overflow falls back to the
    // float path below. Division always produces a float.
    if let (Value::Int(a), Value::Int(b)) = (l, r) {
        match op {
            Lt => return Ok(Value::Bool(a < b)),
            Le => return Ok(Value::Bool(a <= b)),
            Gt => return Ok(Value::Bool(a > b)),
            Ge => return Ok(Value::Bool(a >= b)),
            _ => {}
        }
        let exact = match op {
            Add => a.checked_add(*b),
            Sub => a.checked_sub(*b),
            Mul => a.checked_mul(*b),
            _ => None,
        };
        if let Some(i) = exact {
            return Ok(Value::Int(i));
        }
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(ScriptError::Type(format!(
            "unsupported operands `{}` and `{}`",
            l.kind(),
            r.kind()
        )));
    };
    Ok(match op {
        Add => Value::Float(a + b),
        Sub => Value::Float(a - b),
        Mul => Value::Float(a * b),
        Div => {
            if b == 0.0 {
                return Err(ScriptError::Runtime("division by zero".to_string()));
            }
            Value::Float(a / b)
        }
        Lt => Value::Bool(a < b),
        Le => Value::Bool(a <= b),
        Gt => Value::Bool(a > b),
        Ge => Value::Bool(a >= b),
        Eq | Ne => unreachable!("handled above"),
    })
}
