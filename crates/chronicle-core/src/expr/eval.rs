//! AST evaluation against a scope of bindings and a random source

use crate::error::EvalError;
use crate::expr::parser::{Ast, BinaryOp, UnaryOp};
use crate::identity::ThingId;
use crate::rng::SimRng;
use crate::thing::Thing;
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;

/// Context for evaluating compiled expressions
///
/// Name resolution order for identifiers: block locals, then the per-step
/// globals, then the named thing bindings; an unresolvable name evaluates
/// to null rather than erroring, so optional roles stay optional.
pub struct EvalScope<'a> {
    /// Random source; draws consume the owning entity's stream
    pub rng: &'a mut SimRng,
    /// The step effective attributes are read at
    step: u64,
    globals: &'a ValueMap,
    bindings: IndexMap<String, Option<&'a Thing>>,
    locals: ValueMap,
}

impl<'a> EvalScope<'a> {
    /// Create a scope with no thing bindings
    pub fn new(rng: &'a mut SimRng, step: u64, globals: &'a ValueMap) -> Self {
        Self {
            rng,
            step,
            globals,
            bindings: IndexMap::new(),
            locals: ValueMap::new(),
        }
    }

    /// Bind a thing under a role name
    pub fn bind(mut self, name: impl Into<String>, thing: &'a Thing) -> Self {
        self.bindings.insert(name.into(), Some(thing));
        self
    }

    /// Bind a role name that may be unresolved
    pub fn bind_optional(mut self, name: impl Into<String>, thing: Option<&'a Thing>) -> Self {
        self.bindings.insert(name.into(), thing);
        self
    }

    /// The step this scope reads effective attributes at
    pub fn step(&self) -> u64 {
        self.step
    }

    pub(crate) fn clear_locals(&mut self) {
        self.locals.clear();
    }

    pub(crate) fn set_local(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }

    fn lookup_thing(&self, id: ThingId) -> Option<&'a Thing> {
        self.bindings
            .values()
            .flatten()
            .find(|t| t.id == id)
            .copied()
    }

    fn resolve(&self, name: &str) -> Value {
        if let Some(v) = self.locals.get(name) {
            return v.clone();
        }
        if let Some(v) = self.globals.get(name) {
            return v.clone();
        }
        match self.bindings.get(name) {
            Some(Some(thing)) => Value::Thing(thing.id),
            // declared but unresolved roles and unknown names both bind null
            _ => Value::Null,
        }
    }
}

pub(crate) fn eval(ast: &Ast, scope: &mut EvalScope) -> Result<Value, EvalError> {
    match ast {
        Ast::Literal(v) => Ok(v.clone()),
        Ast::Var(name) => Ok(scope.resolve(name)),
        Ast::Unary(op, inner) => {
            let v = eval(inner, scope)?;
            match op {
                UnaryOp::Neg => match v {
                    Value::Int(i) => Ok(Value::Int(-i)),
                    Value::Float(f) => Ok(Value::Float(-f)),
                    other => Err(EvalError::type_error("number", other.type_name())),
                },
                UnaryOp::Not => Ok(Value::Bool(!v.is_truthy())),
            }
        }
        Ast::Binary(op, left, right) => eval_binary(*op, left, right, scope),
        Ast::Ternary(condition, then_branch, else_branch) => {
            if eval(condition, scope)?.is_truthy() {
                eval(then_branch, scope)
            } else {
                eval(else_branch, scope)
            }
        }
        Ast::Call(name, args) => eval_call(name, args, scope),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Ast,
    right: &Ast,
    scope: &mut EvalScope,
) -> Result<Value, EvalError> {
    // short-circuit logic first
    match op {
        BinaryOp::And => {
            if !eval(left, scope)?.is_truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(eval(right, scope)?.is_truthy()));
        }
        BinaryOp::Or => {
            if eval(left, scope)?.is_truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(eval(right, scope)?.is_truthy()));
        }
        _ => {}
    }

    let a = eval(left, scope)?;
    let b = eval(right, scope)?;
    match op {
        BinaryOp::Add => {
            // string concatenation if either side is a string
            if matches!(a, Value::Str(_)) || matches!(b, Value::Str(_)) {
                return Ok(Value::Str(format!("{}{}", a, b)));
            }
            numeric_binary(&a, &b, |x, y| x.wrapping_add(y), |x, y| x + y)
        }
        BinaryOp::Sub => numeric_binary(&a, &b, |x, y| x.wrapping_sub(y), |x, y| x - y),
        BinaryOp::Mul => numeric_binary(&a, &b, |x, y| x.wrapping_mul(y), |x, y| x * y),
        BinaryOp::Div => match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(Value::Int(x / y))
                }
            }
            _ => {
                let x = as_number(&a)?;
                let y = as_number(&b)?;
                if y == 0.0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(Value::Float(x / y))
                }
            }
        },
        BinaryOp::Mod => match (&a, &b) {
            (Value::Int(x), Value::Int(y)) => {
                if *y == 0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(Value::Int(x % y))
                }
            }
            _ => {
                let x = as_number(&a)?;
                let y = as_number(&b)?;
                if y == 0.0 {
                    Err(EvalError::DivisionByZero)
                } else {
                    Ok(Value::Float(x % y))
                }
            }
        },
        BinaryOp::Lt => compare(&a, &b, |o| o == std::cmp::Ordering::Less),
        BinaryOp::Le => compare(&a, &b, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Gt => compare(&a, &b, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::Ge => compare(&a, &b, |o| o != std::cmp::Ordering::Less),
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&a, &b))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&a, &b))),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn eval_call(name: &str, args: &[Ast], scope: &mut EvalScope) -> Result<Value, EvalError> {
    let arity = |expected: usize, function: &'static str| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(EvalError::Arity {
                function,
                expected,
                got: args.len(),
            })
        }
    };
    match name {
        "attr" => {
            arity(2, "attr")?;
            let owner = eval(&args[0], scope)?;
            let attribute = eval(&args[1], scope)?;
            let attribute = attribute
                .as_str()
                .ok_or_else(|| EvalError::type_error("string", attribute.type_name()))?
                .to_string();
            match owner {
                // an unresolved optional role reads as null, not an error
                Value::Null => Ok(Value::Null),
                Value::Thing(id) => match scope.lookup_thing(id) {
                    Some(thing) => Ok(Value::Int(thing.effective_attribute(&attribute, scope.step))),
                    None => Ok(Value::Null),
                },
                _ => Err(EvalError::NotAThing),
            }
        }
        "min" => {
            arity(2, "min")?;
            let a = eval(&args[0], scope)?;
            let b = eval(&args[1], scope)?;
            numeric_binary(&a, &b, |x, y| x.min(y), |x, y| x.min(y))
        }
        "max" => {
            arity(2, "max")?;
            let a = eval(&args[0], scope)?;
            let b = eval(&args[1], scope)?;
            numeric_binary(&a, &b, |x, y| x.max(y), |x, y| x.max(y))
        }
        "clamp" => {
            arity(3, "clamp")?;
            let v = as_number(&eval(&args[0], scope)?)?;
            let lo = as_number(&eval(&args[1], scope)?)?;
            let hi = as_number(&eval(&args[2], scope)?)?;
            Ok(Value::Float(v.clamp(lo, hi)))
        }
        "abs" => {
            arity(1, "abs")?;
            match eval(&args[0], scope)? {
                Value::Int(i) => Ok(Value::Int(i.abs())),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                other => Err(EvalError::type_error("number", other.type_name())),
            }
        }
        "floor" => {
            arity(1, "floor")?;
            Ok(Value::Int(as_number(&eval(&args[0], scope)?)?.floor() as i64))
        }
        "ceil" => {
            arity(1, "ceil")?;
            Ok(Value::Int(as_number(&eval(&args[0], scope)?)?.ceil() as i64))
        }
        "round" => {
            arity(1, "round")?;
            Ok(Value::Int(as_number(&eval(&args[0], scope)?)?.round() as i64))
        }
        "pow" => {
            arity(2, "pow")?;
            let base = as_number(&eval(&args[0], scope)?)?;
            let exp = as_number(&eval(&args[1], scope)?)?;
            Ok(Value::Float(base.powf(exp)))
        }
        "rand" => {
            arity(2, "rand")?;
            let lo = eval(&args[0], scope)?;
            let hi = eval(&args[1], scope)?;
            let lo = lo
                .as_int()
                .ok_or_else(|| EvalError::type_error("int", lo.type_name()))?;
            let hi = hi
                .as_int()
                .ok_or_else(|| EvalError::type_error("int", hi.type_name()))?;
            Ok(Value::Int(scope.rng.range_i64(lo, hi)))
        }
        "randf" => {
            arity(0, "randf")?;
            Ok(Value::Float(scope.rng.next_f64()))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn as_number(v: &Value) -> Result<f64, EvalError> {
    v.as_float()
        .ok_or_else(|| EvalError::type_error("number", v.type_name()))
}

fn numeric_binary(
    a: &Value,
    b: &Value,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvalError> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(Value::Int(int_op(*x, *y))),
        _ => Ok(Value::Float(float_op(as_number(a)?, as_number(b)?))),
    }
}

fn compare(a: &Value, b: &Value, test: fn(std::cmp::Ordering) -> bool) -> Result<Value, EvalError> {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        return Ok(Value::Bool(test(x.cmp(y))));
    }
    let x = as_number(a)?;
    let y = as_number(b)?;
    Ok(Value::Bool(test(
        x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
    )))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => (x - y).abs() < f64::EPSILON,
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
            (*x as f64 - y).abs() < f64::EPSILON
        }
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Thing(x), Value::Thing(y)) => x == y,
        _ => false,
    }
}
