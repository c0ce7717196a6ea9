//! Tree-walking evaluator.
//!
//! One handler per node kind; sub-evaluations propagate errors immediately
//! through `Result` and `?`. A `return` travels upward as the internal
//! [`Value::Return`] wrapper until the enclosing call (or the program root)
//! unwraps it.

use crate::ast::{ArithOp, Block, CompareOp, Expr, HeaderPair, LogicOp, Program, Statement};
use crate::value::{Environment, Function, Reply, Value};
use crate::{http, json, server};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

/// A runtime error carried up through every evaluator recursion.
///
/// The variants are categories, not a type system; each carries the full
/// user-facing message except for the fixed ones.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    /// Unbound variable or function name
    Undefined(String),
    /// Operand or arity mismatch
    Type(String),
    /// Integer division with a zero divisor
    DivisionByZero,
    /// 1-based index outside `1..=length`
    IndexOutOfBounds(String),
    /// Reading input failed
    Io(String),
    /// Client verb transport failure
    Http(String),
    /// JSON decode or encode failure
    Json(String),
    /// Server lifecycle failure (port in use, not running)
    Server(String),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Undefined(msg) => write!(f, "{}", msg),
            EvalError::Type(msg) => write!(f, "{}", msg),
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::IndexOutOfBounds(msg) => write!(f, "{}", msg),
            EvalError::Io(msg) => write!(f, "{}", msg),
            EvalError::Http(msg) => write!(f, "{}", msg),
            EvalError::Json(msg) => write!(f, "{}", msg),
            EvalError::Server(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

/// Evaluates a whole program. A top-level `return` unwraps to its payload.
pub fn eval_program(program: &Program, env: &Arc<Environment>) -> Result<Value, EvalError> {
    let mut result = Value::Null;

    for stmt in &program.statements {
        match eval_statement(stmt, env)? {
            Value::Return(value) => return Ok(*value),
            other => result = other,
        }
    }

    Ok(result)
}

/// Evaluates a block in the given environment. Blocks do not open a scope;
/// a `Return` value passes through untouched for the caller to unwrap.
pub fn eval_block(block: &Block, env: &Arc<Environment>) -> Result<Value, EvalError> {
    let mut result = Value::Null;

    for stmt in &block.statements {
        result = eval_statement(stmt, env)?;
        if matches!(result, Value::Return(_)) {
            return Ok(result);
        }
    }

    Ok(result)
}

fn eval_statement(stmt: &Statement, env: &Arc<Environment>) -> Result<Value, EvalError> {
    match stmt {
        Statement::Set { name, value } => {
            let value = eval_expression(value, env)?;
            env.set(name, value.clone());
            Ok(value)
        }
        Statement::Increase { target, amount } => eval_adjust(target, amount, env, 1, "increase"),
        Statement::Decrease { target, amount } => eval_adjust(target, amount, env, -1, "decrease"),
        Statement::If {
            condition,
            consequence,
            alternative,
        } => {
            let condition = eval_expression(condition, env)?;
            if condition.is_truthy() {
                eval_block(consequence, env)
            } else if let Some(alternative) = alternative {
                eval_block(alternative, env)
            } else {
                Ok(Value::Null)
            }
        }
        Statement::While { condition, body } => {
            let mut result = Value::Null;
            loop {
                let condition = eval_expression(condition, env)?;
                if !condition.is_truthy() {
                    break;
                }
                result = eval_block(body, env)?;
                if matches!(result, Value::Return(_)) {
                    return Ok(result);
                }
            }
            Ok(result)
        }
        Statement::ForEach {
            variable,
            iterable,
            body,
        } => {
            let iterable = eval_expression(iterable, env)?;
            let elements = match &iterable {
                Value::List(elements) => elements.lock().unwrap().clone(),
                other => {
                    return Err(EvalError::Type(format!(
                        "for each requires a list, got {}",
                        other.type_name()
                    )))
                }
            };

            let mut result = Value::Null;
            for element in elements {
                env.set(variable, element);
                result = eval_block(body, env)?;
                if matches!(result, Value::Return(_)) {
                    return Ok(result);
                }
            }
            Ok(result)
        }
        Statement::FunctionDef {
            name,
            parameters,
            body,
        } => {
            let function = Value::Function(Arc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                env: Arc::clone(env),
            }));
            env.set(name, function.clone());
            Ok(function)
        }
        Statement::Return(value) => {
            let value = match value {
                Some(value) => eval_expression(value, env)?,
                None => Value::Null,
            };
            Ok(Value::Return(Box::new(value)))
        }
        Statement::Say(value) => {
            let value = eval_expression(value, env)?;
            println!("{}", value);
            Ok(Value::Null)
        }
        Statement::Ask { target } => {
            let mut input = String::new();
            io::stdin()
                .read_line(&mut input)
                .map_err(|e| EvalError::Io(format!("error reading input: {}", e)))?;
            if input.ends_with('\n') {
                input.pop();
            }
            if input.ends_with('\r') {
                input.pop();
            }
            let value = Value::String(input);
            env.set(target, value.clone());
            Ok(value)
        }
        Statement::Append { value, list } => {
            let value = eval_expression(value, env)?;
            let bound = env
                .get(list)
                .ok_or_else(|| EvalError::Undefined(format!("undefined variable: {}", list)))?;
            match bound {
                Value::List(elements) => {
                    elements.lock().unwrap().push(value);
                    Ok(Value::Null)
                }
                other => Err(EvalError::Type(format!(
                    "append requires a list, got {}",
                    other.type_name()
                ))),
            }
        }

        // HTTP client verbs
        Statement::Fetch {
            url,
            headers,
            target,
        } => eval_http_verb("fetch", "GET", None, url, headers.as_ref(), target, env),
        Statement::Send {
            body,
            url,
            headers,
            target,
        } => eval_http_verb("send", "POST", Some(body), url, headers.as_ref(), target, env),
        Statement::Put {
            body,
            url,
            headers,
            target,
        } => eval_http_verb("put", "PUT", Some(body), url, headers.as_ref(), target, env),
        Statement::Delete {
            url,
            headers,
            target,
        } => eval_http_verb("delete", "DELETE", None, url, headers.as_ref(), target, env),

        // JSON
        Statement::ParseJson { source, target } => {
            let source = eval_expression(source, env)?;
            let text = match &source {
                Value::String(s) => s,
                other => {
                    return Err(EvalError::Type(format!(
                        "parse json requires a string, got {}",
                        other.type_name()
                    )))
                }
            };
            let parsed: serde_json::Value = serde_json::from_str(text)
                .map_err(|e| EvalError::Json(format!("invalid JSON: {}", e)))?;
            let value = Value::Json(Arc::new(parsed));
            env.set(target, value.clone());
            Ok(value)
        }
        Statement::EncodeJson { source, target } => {
            let source = eval_expression(source, env)?;
            match &source {
                Value::Json(_)
                | Value::String(_)
                | Value::Integer(_)
                | Value::Boolean(_)
                | Value::Null
                | Value::List(_) => {}
                other => {
                    return Err(EvalError::Type(format!(
                        "cannot encode {} as json",
                        other.type_name()
                    )))
                }
            }
            let encoded = serde_json::to_string(&json::value_to_json(&source))
                .map_err(|e| EvalError::Json(format!("json encoding failed: {}", e)))?;
            let value = Value::String(encoded);
            env.set(target, value.clone());
            Ok(value)
        }

        // Web server
        Statement::Serve { port, background } => {
            let port = eval_port(port, env, "serve")?;
            server::serve(port, *background)
        }
        Statement::WhenRoute {
            method,
            path,
            request_var,
            body,
        } => {
            let path = eval_route_path(path, env)?;
            server::register_block_route(
                method.clone(),
                path,
                body.clone(),
                request_var.clone(),
                Arc::clone(env),
            );
            Ok(Value::Null)
        }
        Statement::RouteTo { path, handler } => {
            let path = eval_route_path(path, env)?;
            let bound = env.get(handler).ok_or_else(|| {
                EvalError::Undefined(format!("handler function not defined: {}", handler))
            })?;
            match bound {
                Value::Function(function) => {
                    server::register_function_route(path, function);
                    Ok(Value::Null)
                }
                _ => Err(EvalError::Type(format!("{} is not a function", handler))),
            }
        }
        Statement::Reply {
            body,
            as_json,
            status,
            headers,
        } => eval_reply(body, *as_json, status.as_ref(), headers, env),
        Statement::StopServer { port } => {
            let port = match port {
                Some(port) => Some(eval_port(port, env, "stop server")?),
                None => None,
            };
            server::stop(port)
        }
    }
}

/// `increase`/`decrease` share everything but the sign.
fn eval_adjust(
    target: &str,
    amount: &Expr,
    env: &Arc<Environment>,
    sign: i64,
    verb: &str,
) -> Result<Value, EvalError> {
    let current = env
        .get(target)
        .ok_or_else(|| EvalError::Undefined(format!("undefined variable: {}", target)))?;
    let current = match current {
        Value::Integer(n) => n,
        other => {
            return Err(EvalError::Type(format!(
                "{} requires an integer variable, got {}",
                verb,
                other.type_name()
            )))
        }
    };

    let amount = eval_expression(amount, env)?;
    let amount = match amount {
        Value::Integer(n) => n,
        other => {
            return Err(EvalError::Type(format!(
                "{} amount must be an integer, got {}",
                verb,
                other.type_name()
            )))
        }
    };

    let result = Value::Integer(current.wrapping_add(sign.wrapping_mul(amount)));
    env.set(target, result.clone());
    Ok(result)
}

fn eval_http_verb(
    verb: &str,
    method: &str,
    body: Option<&Expr>,
    url: &Expr,
    headers: Option<&Expr>,
    target: &str,
    env: &Arc<Environment>,
) -> Result<Value, EvalError> {
    let body = match body {
        Some(body) => {
            let body = eval_expression(body, env)?;
            match body {
                Value::String(s) => Some(s),
                other => {
                    return Err(EvalError::Type(format!(
                        "{} body must be a string, got {}",
                        verb,
                        other.type_name()
                    )))
                }
            }
        }
        None => None,
    };

    let url = eval_expression(url, env)?;
    let url = match url {
        Value::String(s) => s,
        other => {
            return Err(EvalError::Type(format!(
                "{} URL must be a string, got {}",
                verb,
                other.type_name()
            )))
        }
    };

    let header_lines = match headers {
        Some(headers) => {
            let headers = eval_expression(headers, env)?;
            match &headers {
                Value::List(elements) => elements
                    .lock()
                    .unwrap()
                    .iter()
                    .filter_map(|e| match e {
                        Value::String(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect(),
                other => {
                    return Err(EvalError::Type(format!(
                        "headers must be a list, got {}",
                        other.type_name()
                    )))
                }
            }
        }
        None => Vec::new(),
    };

    let response = http::http_exchange(method, &url, body, &header_lines)
        .map_err(|e| EvalError::Http(format!("{} failed: {}", verb, e)))?;

    let value = Value::Response(Arc::new(response));
    env.set(target, value.clone());
    Ok(value)
}

fn eval_reply(
    body: &Expr,
    as_json: bool,
    status: Option<&Expr>,
    headers: &[HeaderPair],
    env: &Arc<Environment>,
) -> Result<Value, EvalError> {
    let body = eval_expression(body, env)?;

    let mut header_map = HashMap::new();
    let body_text = if as_json {
        header_map.insert("Content-Type".to_string(), "application/json".to_string());
        serde_json::to_string(&json::value_to_json(&body))
            .map_err(|e| EvalError::Json(format!("failed to encode as JSON: {}", e)))?
    } else {
        match &body {
            Value::String(s) => s.clone(),
            Value::Json(json) => serde_json::to_string(json.as_ref()).unwrap_or_default(),
            other => other.to_string(),
        }
    };

    let mut status_code = 200;
    if let Some(status) = status {
        if let Value::Integer(n) = eval_expression(status, env)? {
            status_code = n;
        }
    }

    for pair in headers {
        let name = eval_expression(&pair.name, env)?;
        let value = eval_expression(&pair.value, env)?;
        if let (Value::String(name), Value::String(value)) = (name, value) {
            header_map.insert(name, value);
        }
    }

    Ok(Value::Reply(Arc::new(Reply {
        status: status_code,
        body: body_text,
        headers: header_map,
    })))
}

fn eval_port(expr: &Expr, env: &Arc<Environment>, context: &str) -> Result<u16, EvalError> {
    let value = eval_expression(expr, env)?;
    match value {
        Value::Integer(n) => {
            u16::try_from(n).map_err(|_| EvalError::Server(format!("invalid port: {}", n)))
        }
        other => Err(EvalError::Type(format!(
            "{} port must be an integer, got {}",
            context,
            other.type_name()
        ))),
    }
}

fn eval_route_path(expr: &Expr, env: &Arc<Environment>) -> Result<String, EvalError> {
    let value = eval_expression(expr, env)?;
    match value {
        Value::String(s) => Ok(s),
        other => Err(EvalError::Type(format!(
            "route path must be a string, got {}",
            other.type_name()
        ))),
    }
}

pub fn eval_expression(expr: &Expr, env: &Arc<Environment>) -> Result<Value, EvalError> {
    match expr {
        Expr::Integer(n) => Ok(Value::Integer(*n)),
        Expr::String(s) => Ok(Value::String(s.clone())),
        Expr::Boolean(b) => Ok(Value::Boolean(*b)),
        Expr::Identifier(name) => eval_identifier(name, env),
        Expr::List(elements) => {
            let mut values = Vec::with_capacity(elements.len());
            for element in elements {
                values.push(eval_expression(element, env)?);
            }
            Ok(Value::list(values))
        }
        Expr::Negative(value) => match eval_expression(value, env)? {
            Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
            other => Err(EvalError::Type(format!(
                "minus requires an integer, got {}",
                other.type_name()
            ))),
        },
        Expr::Arithmetic { op, left, right } => {
            let left = eval_expression(left, env)?;
            let right = eval_expression(right, env)?;
            eval_arithmetic(*op, left, right)
        }
        Expr::Comparison { op, left, right } => {
            let left = eval_expression(left, env)?;
            let right = eval_expression(right, env)?;
            eval_comparison(*op, left, right)
        }
        Expr::Logical { op, left, right } => eval_logical(*op, left.as_deref(), right, env),
        Expr::Call {
            function,
            arguments,
        } => eval_call(function, arguments, env),
        Expr::Length(list) => match eval_expression(list, env)? {
            Value::List(elements) => Ok(Value::Integer(elements.lock().unwrap().len() as i64)),
            Value::String(s) => Ok(Value::Integer(s.len() as i64)),
            other => Err(EvalError::Type(format!(
                "length requires a list or string, got {}",
                other.type_name()
            ))),
        },
        Expr::Index { index, list } => eval_index(index, list, env),
        Expr::BodyOf(source) => match eval_expression(source, env)? {
            Value::Response(response) => Ok(Value::String(response.body.clone())),
            Value::Request(request) => Ok(Value::String(request.body.clone())),
            other => Err(EvalError::Type(format!(
                "body of requires a response or request, got {}",
                other.type_name()
            ))),
        },
        Expr::StatusOf(source) => match eval_expression(source, env)? {
            Value::Response(response) => Ok(Value::Integer(response.status as i64)),
            other => Err(EvalError::Type(format!(
                "status of requires a response, got {}",
                other.type_name()
            ))),
        },
        Expr::HeaderFrom { name, source } => {
            let name = match eval_expression(name, env)? {
                Value::String(s) => s,
                other => {
                    return Err(EvalError::Type(format!(
                        "header name must be a string, got {}",
                        other.type_name()
                    )))
                }
            };
            let headers = match eval_expression(source, env)? {
                Value::Response(response) => response.headers.clone(),
                Value::Request(request) => request.headers.clone(),
                other => {
                    return Err(EvalError::Type(format!(
                        "header from requires a response or request, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(headers
                .get(&name)
                .map(|v| Value::String(v.clone()))
                .unwrap_or(Value::Null))
        }
        Expr::FieldFrom { name, source } => {
            let name = match eval_expression(name, env)? {
                Value::String(s) => s,
                other => {
                    return Err(EvalError::Type(format!(
                        "field name must be a string, got {}",
                        other.type_name()
                    )))
                }
            };
            match eval_expression(source, env)? {
                Value::Json(json) => Ok(json::get_json_field(&json, &name)),
                other => Err(EvalError::Type(format!(
                    "field from requires a json object, got {}",
                    other.type_name()
                ))),
            }
        }
        Expr::MethodOf(source) => match eval_expression(source, env)? {
            Value::Request(request) => Ok(Value::String(request.method.clone())),
            other => Err(EvalError::Type(format!(
                "method of requires a request, got {}",
                other.type_name()
            ))),
        },
        Expr::PathOf(source) => match eval_expression(source, env)? {
            Value::Request(request) => Ok(Value::String(request.path.clone())),
            other => Err(EvalError::Type(format!(
                "path of requires a request, got {}",
                other.type_name()
            ))),
        },
        Expr::QueryFrom { name, request } => {
            let name = match eval_expression(name, env)? {
                Value::String(s) => s,
                other => {
                    return Err(EvalError::Type(format!(
                        "query name must be a string, got {}",
                        other.type_name()
                    )))
                }
            };
            match eval_expression(request, env)? {
                Value::Request(request) => Ok(request
                    .query
                    .get(&name)
                    .map(|v| Value::String(v.clone()))
                    .unwrap_or(Value::Null)),
                other => Err(EvalError::Type(format!(
                    "query from requires a request, got {}",
                    other.type_name()
                ))),
            }
        }
    }
}

/// `null`, `true`, and `false` always resolve to their built-in values,
/// regardless of environment contents.
fn eval_identifier(name: &str, env: &Arc<Environment>) -> Result<Value, EvalError> {
    match name {
        "null" => Ok(Value::Null),
        "true" => Ok(Value::Boolean(true)),
        "false" => Ok(Value::Boolean(false)),
        _ => env
            .get(name)
            .ok_or_else(|| EvalError::Undefined(format!("undefined variable: {}", name))),
    }
}

fn eval_arithmetic(op: ArithOp, left: Value, right: Value) -> Result<Value, EvalError> {
    // `plus` with a string on either side concatenates textual forms
    if op == ArithOp::Plus
        && (matches!(left, Value::String(_)) || matches!(right, Value::String(_)))
    {
        return Ok(Value::String(format!("{}{}", left, right)));
    }

    let a = match left {
        Value::Integer(n) => n,
        other => {
            return Err(EvalError::Type(format!(
                "arithmetic operations require integers, got {}",
                other.type_name()
            )))
        }
    };
    let b = match right {
        Value::Integer(n) => n,
        other => {
            return Err(EvalError::Type(format!(
                "arithmetic operations require integers, got {}",
                other.type_name()
            )))
        }
    };

    let result = match op {
        ArithOp::Plus => a.wrapping_add(b),
        ArithOp::Minus => a.wrapping_sub(b),
        ArithOp::Times => a.wrapping_mul(b),
        ArithOp::Divided => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            a.wrapping_div(b)
        }
    };

    Ok(Value::Integer(result))
}

fn eval_comparison(op: CompareOp, left: Value, right: Value) -> Result<Value, EvalError> {
    match op {
        CompareOp::Equals => Ok(Value::Boolean(values_equal(&left, &right))),
        CompareOp::Greater | CompareOp::Less => {
            let a = match left {
                Value::Integer(n) => n,
                other => {
                    return Err(EvalError::Type(format!(
                        "comparison requires integers, got {}",
                        other.type_name()
                    )))
                }
            };
            let b = match right {
                Value::Integer(n) => n,
                other => {
                    return Err(EvalError::Type(format!(
                        "comparison requires integers, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Boolean(if op == CompareOp::Greater {
                a > b
            } else {
                a < b
            }))
        }
    }
}

/// `equals` semantics: Null only equals Null, same-type values compare by
/// value, every mixed pairing is false.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Integer(a), Value::Integer(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        _ => false,
    }
}

fn eval_logical(
    op: LogicOp,
    left: Option<&Expr>,
    right: &Expr,
    env: &Arc<Environment>,
) -> Result<Value, EvalError> {
    match op {
        LogicOp::Not => {
            let right = eval_expression(right, env)?;
            Ok(Value::Boolean(!right.is_truthy()))
        }
        LogicOp::And => {
            let left = match left {
                Some(left) => eval_expression(left, env)?,
                None => Value::Null,
            };
            if !left.is_truthy() {
                return Ok(Value::Boolean(false));
            }
            let right = eval_expression(right, env)?;
            Ok(Value::Boolean(right.is_truthy()))
        }
        LogicOp::Or => {
            let left = match left {
                Some(left) => eval_expression(left, env)?,
                None => Value::Null,
            };
            if left.is_truthy() {
                return Ok(Value::Boolean(true));
            }
            let right = eval_expression(right, env)?;
            Ok(Value::Boolean(right.is_truthy()))
        }
    }
}

/// Calls bind arguments positionally: extras are ignored, missing
/// parameters stay unbound and error at first use.
fn eval_call(name: &str, arguments: &[Expr], env: &Arc<Environment>) -> Result<Value, EvalError> {
    let bound = env
        .get(name)
        .ok_or_else(|| EvalError::Undefined(format!("function not defined: {}", name)))?;
    let function = match bound {
        Value::Function(function) => function,
        _ => return Err(EvalError::Type(format!("{} is not a function", name))),
    };

    let mut args = Vec::with_capacity(arguments.len());
    for argument in arguments {
        args.push(eval_expression(argument, env)?);
    }

    let scope = Environment::enclosed(&function.env);
    for (param, arg) in function.parameters.iter().zip(args) {
        scope.set(param, arg);
    }

    let result = eval_block(&function.body, &scope)?;
    Ok(match result {
        Value::Return(value) => *value,
        other => other,
    })
}

fn eval_index(index: &Expr, list: &Expr, env: &Arc<Environment>) -> Result<Value, EvalError> {
    let index = eval_expression(index, env)?;
    let target = eval_expression(list, env)?;

    let idx = match index {
        Value::Integer(n) => n,
        other => {
            return Err(EvalError::Type(format!(
                "index must be an integer, got {}",
                other.type_name()
            )))
        }
    };

    match target {
        Value::List(elements) => {
            let elements = elements.lock().unwrap();
            if idx < 1 || idx > elements.len() as i64 {
                return Err(EvalError::IndexOutOfBounds(format!(
                    "index out of bounds: {} (list has {} elements)",
                    idx,
                    elements.len()
                )));
            }
            Ok(elements[(idx - 1) as usize].clone())
        }
        Value::String(s) => {
            let bytes = s.as_bytes();
            if idx < 1 || idx > bytes.len() as i64 {
                return Err(EvalError::IndexOutOfBounds(format!(
                    "index out of bounds: {} (string has {} characters)",
                    idx,
                    bytes.len()
                )));
            }
            Ok(Value::String((bytes[(idx - 1) as usize] as char).to_string()))
        }
        other => Err(EvalError::Type(format!(
            "indexing requires a list or string, got {}",
            other.type_name()
        ))),
    }
}
