//! Embedded HTTP server: per-port listeners, ordered route tables, and
//! request dispatch into the evaluator.
//!
//! The registry is process-wide: `serve` binds a listener, `when`/`route`
//! append handlers against the current default port (the port most recently
//! passed to `serve`), and incoming requests walk the port's table in
//! declaration order. Registrations and lifecycle changes take the write
//! lock; dispatch takes a short read lock to snapshot the matching route,
//! then evaluates the handler on a blocking worker so user code stays
//! synchronous.

use crate::ast::Block;
use crate::evaluator::{self, EvalError};
use crate::http::canonical_header_name;
use crate::value::{Environment, Function, Request, Value};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::Router;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Routes declared before the first `serve` register against this port.
const DEFAULT_PORT: u16 = 8080;

/// Bound on how long `stop server` waits for a listener to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// One registered route. Method is empty for match-any; paths compare by
/// exact string equality.
#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub path: String,
    pub target: RouteTarget,
}

/// What runs when a route matches: an inline `when ... do` block with its
/// declaration environment, or a named function registered via `route`.
#[derive(Clone)]
pub enum RouteTarget {
    Block {
        body: Arc<Block>,
        request_var: Option<String>,
        env: Arc<Environment>,
    },
    Function(Arc<Function>),
}

impl Route {
    pub fn matches(&self, method: &str, path: &str) -> bool {
        if !self.method.is_empty() && self.method != method {
            return false;
        }
        self.path == path
    }
}

struct ServerEntry {
    shutdown: oneshot::Sender<()>,
    join: Option<JoinHandle<()>>,
}

struct Registry {
    servers: HashMap<u16, ServerEntry>,
    routes: HashMap<u16, Vec<Route>>,
    default_port: u16,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| {
    RwLock::new(Registry {
        servers: HashMap::new(),
        routes: HashMap::new(),
        default_port: DEFAULT_PORT,
    })
});

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start server runtime")
});

/// Registers an inline `when ... do` handler against the default port.
pub fn register_block_route(
    method: String,
    path: String,
    body: Block,
    request_var: Option<String>,
    env: Arc<Environment>,
) {
    let route = Route {
        method,
        path,
        target: RouteTarget::Block {
            body: Arc::new(body),
            request_var,
            env,
        },
    };
    let mut registry = REGISTRY.write().unwrap();
    let port = registry.default_port;
    registry.routes.entry(port).or_default().push(route);
}

/// Registers a function handler (`route "/path" to handler`) against the
/// default port. Function routes match any method.
pub fn register_function_route(path: String, function: Arc<Function>) {
    let route = Route {
        method: String::new(),
        path,
        target: RouteTarget::Function(function),
    };
    let mut registry = REGISTRY.write().unwrap();
    let port = registry.default_port;
    registry.routes.entry(port).or_default().push(route);
}

/// Starts a listener on `port`. Foreground blocks until the listener stops;
/// background spawns it and returns a Server value immediately.
pub fn serve(port: u16, background: bool) -> Result<Value, EvalError> {
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    {
        let mut registry = REGISTRY.write().unwrap();
        if registry.servers.contains_key(&port) {
            return Err(EvalError::Server(format!(
                "server already running on port {}",
                port
            )));
        }

        // Routes declared against the previous default port carry over once.
        if port != registry.default_port {
            let carried = registry
                .routes
                .get(&registry.default_port)
                .cloned()
                .unwrap_or_default();
            if !carried.is_empty() {
                registry.routes.entry(port).or_default().extend(carried);
            }
        }
        registry.default_port = port;
        registry.servers.insert(
            port,
            ServerEntry {
                shutdown: shutdown_tx,
                join: None,
            },
        );
    }

    let app = Router::new().fallback(dispatch).with_state(port);

    let serve_future = async move {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    };

    if background {
        let join = RUNTIME.spawn(async move {
            log::info!("server started in background on port {}", port);
            if let Err(e) = serve_future.await {
                log::error!("server error on port {}: {}", port, e);
            }
        });
        if let Some(entry) = REGISTRY.write().unwrap().servers.get_mut(&port) {
            entry.join = Some(join);
        }
        Ok(Value::Server {
            port,
            running: true,
        })
    } else {
        log::info!("server starting on port {} (foreground)", port);
        match RUNTIME.block_on(serve_future) {
            Ok(()) => Ok(Value::Null),
            Err(e) => {
                REGISTRY.write().unwrap().servers.remove(&port);
                Err(EvalError::Server(format!("server error: {}", e)))
            }
        }
    }
}

/// Stops one listener, or every registered listener when `port` is None.
pub fn stop(port: Option<u16>) -> Result<Value, EvalError> {
    let stopping: Vec<(u16, ServerEntry)> = {
        let mut registry = REGISTRY.write().unwrap();
        match port {
            Some(port) => {
                let entry = registry.servers.remove(&port).ok_or_else(|| {
                    EvalError::Server(format!("no server running on port {}", port))
                })?;
                registry.routes.remove(&port);
                vec![(port, entry)]
            }
            None => {
                let ports: Vec<u16> = registry.servers.keys().copied().collect();
                let mut entries = Vec::new();
                for port in ports {
                    if let Some(entry) = registry.servers.remove(&port) {
                        registry.routes.remove(&port);
                        entries.push((port, entry));
                    }
                }
                entries
            }
        }
    };

    for (port, entry) in stopping {
        let _ = entry.shutdown.send(());
        if let Some(join) = entry.join {
            // Handle::block_on also works from a handler's blocking worker
            let _ = RUNTIME
                .handle()
                .block_on(async { tokio::time::timeout(SHUTDOWN_GRACE, join).await });
        }
        log::info!("server on port {} stopped", port);
    }

    Ok(Value::Null)
}

/// Catch-all handler: snapshot the first matching route under the read
/// lock, build the Request value, and run the handler on a blocking worker.
async fn dispatch(
    State(port): State<u16>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, HeaderMap, String) {
    let route = {
        let registry = REGISTRY.read().unwrap();
        registry.routes.get(&port).and_then(|routes| {
            routes
                .iter()
                .find(|r| r.matches(method.as_str(), uri.path()))
                .cloned()
        })
    };

    let route = match route {
        Some(route) => route,
        None => {
            return (
                StatusCode::NOT_FOUND,
                HeaderMap::new(),
                "Not Found".to_string(),
            )
        }
    };

    let mut header_map = HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            header_map.insert(canonical_header_name(name.as_str()), value.to_string());
        }
    }

    let request = Request {
        method: method.to_string(),
        path: uri.path().to_string(),
        body,
        headers: header_map,
        query,
    };

    let result = match tokio::task::spawn_blocking(move || invoke_handler(&route, request)).await {
        Ok(result) => result,
        Err(e) => Err(EvalError::Server(format!("handler failed: {}", e))),
    };

    match result {
        Ok(Value::Reply(reply)) => {
            let mut headers = HeaderMap::new();
            for (name, value) in &reply.headers {
                if let (Ok(name), Ok(value)) = (
                    HeaderName::from_bytes(name.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    headers.insert(name, value);
                }
            }
            let status = u16::try_from(reply.status)
                .ok()
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::OK);
            (status, headers, reply.body.clone())
        }
        Ok(Value::Null) => (StatusCode::OK, HeaderMap::new(), String::new()),
        Ok(value) => (StatusCode::OK, HeaderMap::new(), value.to_string()),
        Err(e) => (StatusCode::OK, HeaderMap::new(), format!("ERROR: {}", e)),
    }
}

/// Evaluates the matched handler in a fresh child environment, binding the
/// request variable (or the function's first parameter) to the Request.
fn invoke_handler(route: &Route, request: Request) -> Result<Value, EvalError> {
    let request_value = Value::Request(Arc::new(request));

    let result = match &route.target {
        RouteTarget::Function(function) => {
            let scope = Environment::enclosed(&function.env);
            if let Some(param) = function.parameters.first() {
                scope.set(param, request_value);
            }
            evaluator::eval_block(&function.body, &scope)?
        }
        RouteTarget::Block {
            body,
            request_var,
            env,
        } => {
            let scope = Environment::enclosed(env);
            if let Some(var) = request_var {
                scope.set(var, request_value);
            }
            evaluator::eval_block(body, &scope)?
        }
    };

    Ok(match result {
        Value::Return(value) => *value,
        other => other,
    })
}
