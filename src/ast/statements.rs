use crate::ast::Expr;
use std::fmt;

/// The root node of every parsed source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Statement>,
}

/// A sequence of statements terminated by `done` in source.
///
/// Blocks do not open a new scope; only function calls and route handler
/// invocations create environment frames.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

/// One `with header NAME as VALUE` modifier on a `reply` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPair {
    pub name: Expr,
    pub value: Expr,
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `set x to 5`
    Set { name: String, value: Expr },

    /// `increase x by 5`
    Increase { target: String, amount: Expr },

    /// `decrease x by 5`
    Decrease { target: String, amount: Expr },

    /// `if x equals y then ... done otherwise ... done`
    If {
        condition: Expr,
        consequence: Block,
        alternative: Option<Block>,
    },

    /// `while x is less than 100 do ... done`
    While { condition: Expr, body: Block },

    /// `for each item in items do ... done`
    ForEach {
        variable: String,
        iterable: Expr,
        body: Block,
    },

    /// `to greet with name ... done`
    FunctionDef {
        name: String,
        parameters: Vec<String>,
        body: Block,
    },

    /// `return x`
    Return(Option<Expr>),

    /// `say x`
    Say(Expr),

    /// `ask into answer`
    Ask { target: String },

    /// `append value to items`
    Append { value: Expr, list: String },

    /// `fetch from "URL" [with headers] into response`
    Fetch {
        url: Expr,
        headers: Option<Expr>,
        target: String,
    },

    /// `send "body" to "URL" [with headers] into response` (POST)
    Send {
        body: Expr,
        url: Expr,
        headers: Option<Expr>,
        target: String,
    },

    /// `put "body" to "URL" [with headers] into response`
    Put {
        body: Expr,
        url: Expr,
        headers: Option<Expr>,
        target: String,
    },

    /// `delete from "URL" [with headers] into response`
    Delete {
        url: Expr,
        headers: Option<Expr>,
        target: String,
    },

    /// `parse x as json into data`
    ParseJson { source: Expr, target: String },

    /// `encode x as json into text`
    EncodeJson { source: Expr, target: String },

    /// `serve on 8080` or `serve on 8080 in background`
    Serve { port: Expr, background: bool },

    /// `when get at "/path" using req do ... done`
    ///
    /// An empty method matches any request method.
    WhenRoute {
        method: String,
        path: Expr,
        request_var: Option<String>,
        body: Block,
    },

    /// `route "/path" to handler`
    RouteTo { path: Expr, handler: String },

    /// `reply with body [as json] [with status N] [with header X as Y]...`
    Reply {
        body: Expr,
        as_json: bool,
        status: Option<Expr>,
        headers: Vec<HeaderPair>,
    },

    /// `stop server` or `stop server on 8080`
    StopServer { port: Option<Expr> },
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{}", stmt)?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for stmt in &self.statements {
            write!(f, "{} ", stmt)?;
        }
        write!(f, "done")
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Set { name, value } => write!(f, "set {} to {}", name, value),
            Statement::Increase { target, amount } => {
                write!(f, "increase {} by {}", target, amount)
            }
            Statement::Decrease { target, amount } => {
                write!(f, "decrease {} by {}", target, amount)
            }
            Statement::If {
                condition,
                consequence,
                alternative,
            } => {
                write!(f, "if {} then {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " otherwise {}", alt)?;
                }
                Ok(())
            }
            Statement::While { condition, body } => write!(f, "while {} do {}", condition, body),
            Statement::ForEach {
                variable,
                iterable,
                body,
            } => write!(f, "for each {} in {} do {}", variable, iterable, body),
            Statement::FunctionDef {
                name,
                parameters,
                body,
            } => {
                write!(f, "to {}", name)?;
                if !parameters.is_empty() {
                    write!(f, " with {}", parameters.join(" and "))?;
                }
                write!(f, " {}", body)
            }
            Statement::Return(value) => match value {
                Some(value) => write!(f, "return {}", value),
                None => write!(f, "return"),
            },
            Statement::Say(value) => write!(f, "say {}", value),
            Statement::Ask { target } => write!(f, "ask into {}", target),
            Statement::Append { value, list } => write!(f, "append {} to {}", value, list),
            Statement::Fetch {
                url,
                headers,
                target,
            } => {
                write!(f, "fetch from {}", url)?;
                if let Some(headers) = headers {
                    write!(f, " with {}", headers)?;
                }
                write!(f, " into {}", target)
            }
            Statement::Send {
                body,
                url,
                headers,
                target,
            } => {
                write!(f, "send {} to {}", body, url)?;
                if let Some(headers) = headers {
                    write!(f, " with {}", headers)?;
                }
                write!(f, " into {}", target)
            }
            Statement::Put {
                body,
                url,
                headers,
                target,
            } => {
                write!(f, "put {} to {}", body, url)?;
                if let Some(headers) = headers {
                    write!(f, " with {}", headers)?;
                }
                write!(f, " into {}", target)
            }
            Statement::Delete {
                url,
                headers,
                target,
            } => {
                write!(f, "delete from {}", url)?;
                if let Some(headers) = headers {
                    write!(f, " with {}", headers)?;
                }
                write!(f, " into {}", target)
            }
            Statement::ParseJson { source, target } => {
                write!(f, "parse {} as json into {}", source, target)
            }
            Statement::EncodeJson { source, target } => {
                write!(f, "encode {} as json into {}", source, target)
            }
            Statement::Serve { port, background } => {
                write!(f, "serve on {}", port)?;
                if *background {
                    write!(f, " in background")?;
                }
                Ok(())
            }
            Statement::WhenRoute {
                method,
                path,
                request_var,
                body,
            } => {
                if method.is_empty() {
                    write!(f, "when request at {}", path)?;
                } else {
                    write!(f, "when {} at {}", method.to_lowercase(), path)?;
                }
                if let Some(var) = request_var {
                    write!(f, " using {}", var)?;
                }
                write!(f, " do {}", body)
            }
            Statement::RouteTo { path, handler } => write!(f, "route {} to {}", path, handler),
            Statement::Reply {
                body,
                as_json,
                status,
                headers,
            } => {
                write!(f, "reply with {}", body)?;
                if *as_json {
                    write!(f, " as json")?;
                }
                if let Some(status) = status {
                    write!(f, " with status {}", status)?;
                }
                for pair in headers {
                    write!(f, " with header {} as {}", pair.name, pair.value)?;
                }
                Ok(())
            }
            Statement::StopServer { port } => {
                write!(f, "stop server")?;
                if let Some(port) = port {
                    write!(f, " on {}", port)?;
                }
                Ok(())
            }
        }
    }
}
