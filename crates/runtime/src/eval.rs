//! Expression evaluation over compiled artifacts.
//!
//! The compiler's type analysis makes faults here unreachable for
//! artifacts it produced; hand-edited artifacts still fail with errors
//! instead of panics.

use banter_artifact::{CompiledExpr, Value};

use crate::env::Environment;
use crate::error::{Error, Result};

/// Evaluate an expression against the environment.
pub fn eval(expr: &CompiledExpr, env: &Environment) -> Result<Value> {
    match expr {
        CompiledExpr::LiteralBool { value } => Ok(Value::Bool(*value)),
        CompiledExpr::LiteralInt { value } => Ok(Value::Int(*value)),
        CompiledExpr::LiteralFloat { value } => Ok(Value::Float(*value)),
        CompiledExpr::LiteralString { value } => Ok(Value::String(value.clone())),
        CompiledExpr::Variable { name } => env.get(name).cloned(),

        CompiledExpr::UnaryNot { rhs } => {
            let value = eval(rhs, env)?;
            match value.as_bool() {
                Some(b) => Ok(Value::Bool(!b)),
                None => Err(Error::Eval(format!(
                    "'not' needs a bool, got {}",
                    value.value_type()
                ))),
            }
        }

        CompiledExpr::BinaryOr { lhs, rhs } => short_circuit(lhs, rhs, env, true),
        CompiledExpr::BinaryAnd { lhs, rhs } => short_circuit(lhs, rhs, env, false),

        CompiledExpr::BinaryEq { lhs, rhs } => {
            let a = eval(lhs, env)?;
            let b = eval(rhs, env)?;
            Ok(Value::Bool(values_equal(&a, &b)?))
        }
        CompiledExpr::BinaryNe { lhs, rhs } => {
            let a = eval(lhs, env)?;
            let b = eval(rhs, env)?;
            Ok(Value::Bool(!values_equal(&a, &b)?))
        }

        CompiledExpr::BinaryLt { lhs, rhs } => {
            let (a, b) = numeric_pair(lhs, rhs, env)?;
            Ok(Value::Bool(a < b))
        }
        CompiledExpr::BinaryLe { lhs, rhs } => {
            let (a, b) = numeric_pair(lhs, rhs, env)?;
            Ok(Value::Bool(a <= b))
        }
        CompiledExpr::BinaryGt { lhs, rhs } => {
            let (a, b) = numeric_pair(lhs, rhs, env)?;
            Ok(Value::Bool(a > b))
        }
        CompiledExpr::BinaryGe { lhs, rhs } => {
            let (a, b) = numeric_pair(lhs, rhs, env)?;
            Ok(Value::Bool(a >= b))
        }

        CompiledExpr::BinaryAdd { lhs, rhs } => arith(lhs, rhs, env, i64::wrapping_add, |a, b| a + b),
        CompiledExpr::BinarySub { lhs, rhs } => arith(lhs, rhs, env, i64::wrapping_sub, |a, b| a - b),
        CompiledExpr::BinaryMul { lhs, rhs } => arith(lhs, rhs, env, i64::wrapping_mul, |a, b| a * b),

        CompiledExpr::BinaryDiv { lhs, rhs } => {
            let a = eval(lhs, env)?;
            let b = eval(rhs, env)?;
            match (&a, &b) {
                // Integer division truncates; the type checker promised
                // int for int/int, so no silent float here.
                (Value::Int(x), Value::Int(y)) => {
                    if *y == 0 {
                        return Err(Error::DivisionByZero);
                    }
                    Ok(Value::Int(x.wrapping_div(*y)))
                }
                _ => match (a.as_float(), b.as_float()) {
                    (Some(x), Some(y)) => {
                        if y == 0.0 {
                            return Err(Error::DivisionByZero);
                        }
                        Ok(Value::Float(x / y))
                    }
                    _ => Err(mismatch("div", &a, &b)),
                },
            }
        }

        CompiledExpr::Assign { .. } => {
            Err(Error::Eval("assignment outside a run node".to_string()))
        }
    }
}

/// Execute a run node's assignment. Returns the assigned name.
pub fn eval_assign(expr: &CompiledExpr, env: &mut Environment) -> Result<String> {
    match expr {
        CompiledExpr::Assign { name, value } => {
            let value = eval(value, env)?;
            env.set(name, value)?;
            Ok(name.clone())
        }
        _ => Err(Error::Eval("run code must be an assignment".to_string())),
    }
}

fn short_circuit(
    lhs: &CompiledExpr,
    rhs: &CompiledExpr,
    env: &Environment,
    is_or: bool,
) -> Result<Value> {
    let op = if is_or { "or" } else { "and" };
    let a = eval(lhs, env)?;
    let a = a
        .as_bool()
        .ok_or_else(|| Error::Eval(format!("'{op}' needs bool operands, got {}", a.value_type())))?;
    if a == is_or {
        return Ok(Value::Bool(is_or));
    }
    let b = eval(rhs, env)?;
    b.as_bool().map(Value::Bool).ok_or_else(|| {
        Error::Eval(format!("'{op}' needs bool operands, got {}", b.value_type()))
    })
}

fn values_equal(a: &Value, b: &Value) -> Result<bool> {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => Ok(x == y),
        (Value::String(x), Value::String(y)) => Ok(x == y),
        (Value::Int(x), Value::Int(y)) => Ok(x == y),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(x == y),
            _ => Err(mismatch("compare", a, b)),
        },
    }
}

fn numeric_pair(lhs: &CompiledExpr, rhs: &CompiledExpr, env: &Environment) -> Result<(f64, f64)> {
    let a = eval(lhs, env)?;
    let b = eval(rhs, env)?;
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(mismatch("order", &a, &b)),
    }
}

fn arith(
    lhs: &CompiledExpr,
    rhs: &CompiledExpr,
    env: &Environment,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let a = eval(lhs, env)?;
    let b = eval(rhs, env)?;
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(int_op(*x, *y))),
        _ => match (a.as_float(), b.as_float()) {
            (Some(x), Some(y)) => Ok(Value::Float(float_op(x, y))),
            _ => Err(mismatch("arith", &a, &b)),
        },
    }
}

fn mismatch(op: &str, a: &Value, b: &Value) -> Error {
    Error::Eval(format!(
        "cannot {op} {} and {}",
        a.value_type(),
        b.value_type()
    ))
}
