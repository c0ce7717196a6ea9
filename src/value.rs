use crate::ast::Block;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// A runtime value in the ABC language.
///
/// All arithmetic is 64-bit signed integer; there are no floats. Lists are
/// shared and mutable: `append` writes through every binding of the same
/// list. Values are cheap to clone (shared payloads sit behind `Arc`) and
/// safe to move across threads, which route handlers rely on.
///
/// # Examples
///
/// ```
/// use abc_lang::Value;
///
/// let n = Value::Integer(42);
/// let s = Value::String("hello".to_string());
/// let items = Value::list(vec![Value::Integer(1), Value::Integer(2)]);
///
/// assert!(n.is_truthy());
/// assert_eq!(items.to_string(), "[1, 2]");
/// assert_eq!(s.to_string(), "hello");
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// 64-bit signed integer
    Integer(i64),

    /// UTF-8 string
    String(String),

    /// Boolean
    Boolean(bool),

    /// The absent value; also what `if` without `otherwise` yields
    Null,

    /// Ordered sequence, mutable through `append`, 1-indexed by `item`
    List(Arc<Mutex<Vec<Value>>>),

    /// User-defined function with its captured environment
    Function(Arc<Function>),

    /// Outcome of a client verb (`fetch`, `send`, `put`, `delete`)
    Response(Arc<Response>),

    /// An incoming HTTP request, visible inside route handlers
    Request(Arc<Request>),

    /// Parsed JSON held as an opaque document; `field ... from` reaches in
    Json(Arc<serde_json::Value>),

    /// Metadata for a server started by `serve`
    Server { port: u16, running: bool },

    /// A fully-specified HTTP response produced by `reply`
    Reply(Arc<Reply>),

    /// Internal wrapper unwinding a `return` to the enclosing call; never
    /// user-visible
    Return(Box<Value>),
}

/// A user-defined function: positional parameters, a body block, and the
/// environment captured at the definition site.
#[derive(Debug)]
pub struct Function {
    pub parameters: Vec<String>,
    pub body: Block,
    pub env: Arc<Environment>,
}

/// An HTTP response as seen by user code: status, body text, and one
/// representative value per header name.
#[derive(Debug, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
}

/// An incoming HTTP request handed to a route handler.
#[derive(Debug, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
}

/// The response a handler asks the server to send.
#[derive(Debug, PartialEq)]
pub struct Reply {
    pub status: i64,
    pub body: String,
    pub headers: HashMap<String, String>,
}

impl Value {
    /// Wraps a vector into a shared list value.
    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(Arc::new(Mutex::new(elements)))
    }

    /// Null is false, booleans are themselves, integers are true when
    /// nonzero, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            _ => true,
        }
    }

    /// The type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::String(_) => "STRING",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::List(_) => "LIST",
            Value::Function(_) => "FUNCTION",
            Value::Response(_) => "RESPONSE",
            Value::Request(_) => "REQUEST",
            Value::Json(_) => "JSON",
            Value::Server { .. } => "SERVER",
            Value::Reply(_) => "REPLY_VALUE",
            Value::Return(_) => "RETURN_VALUE",
        }
    }
}

impl fmt::Display for Value {
    /// The textual form shown by `say` and by string concatenation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::List(elements) => {
                let elements = elements.lock().unwrap();
                let parts: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Function(function) => {
                write!(f, "to function")?;
                if !function.parameters.is_empty() {
                    write!(f, " with {}", function.parameters.join(" and "))?;
                }
                write!(f, " {}", function.body)
            }
            Value::Response(response) => write!(
                f,
                "Response{{status: {}, body: {:?}}}",
                response.status, response.body
            ),
            Value::Request(request) => write!(
                f,
                "Request{{method: {}, path: {}}}",
                request.method, request.path
            ),
            Value::Json(json) => match serde_json::to_string(json.as_ref()) {
                Ok(text) => write!(f, "{}", text),
                Err(_) => write!(f, "invalid json"),
            },
            Value::Server { port, running } => {
                write!(f, "Server{{port: {}, running: {}}}", port, running)
            }
            Value::Reply(reply) => {
                write!(f, "Reply{{status: {}, body: {:?}}}", reply.status, reply.body)
            }
            Value::Return(value) => write!(f, "{}", value),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let a = a.lock().unwrap();
                let b = b.lock().unwrap();
                *a == *b
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Response(a), Value::Response(b)) => a == b,
            (Value::Request(a), Value::Request(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (
                Value::Server { port: a, running: ar },
                Value::Server { port: b, running: br },
            ) => a == b && ar == br,
            (Value::Reply(a), Value::Reply(b)) => a == b,
            (Value::Return(a), Value::Return(b)) => a == b,
            _ => false,
        }
    }
}

/// One frame of lexical scope: a name-to-value map with an optional link to
/// the enclosing frame.
///
/// Lookup walks outward until the name is found; assignment always writes
/// the innermost frame. Frames are created per function call and per route
/// handler invocation - plain blocks share the enclosing frame. The map is
/// behind a mutex because route handlers may read and write a captured
/// frame from server worker threads.
#[derive(Debug, Default)]
pub struct Environment {
    store: Mutex<HashMap<String, Value>>,
    outer: Option<Arc<Environment>>,
}

impl Environment {
    /// A fresh top-level environment.
    pub fn new() -> Arc<Environment> {
        Arc::new(Environment::default())
    }

    /// A child frame enclosing `outer`.
    pub fn enclosed(outer: &Arc<Environment>) -> Arc<Environment> {
        Arc::new(Environment {
            store: Mutex::new(HashMap::new()),
            outer: Some(Arc::clone(outer)),
        })
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.store.lock().unwrap().get(name) {
            return Some(value.clone());
        }
        match &self.outer {
            Some(outer) => outer.get(name),
            None => None,
        }
    }

    pub fn set(&self, name: &str, value: Value) {
        self.store.lock().unwrap().insert(name.to_string(), value);
    }
}
