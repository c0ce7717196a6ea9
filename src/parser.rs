use crate::{
    ast::{ArithOp, Block, CompareOp, Expr, HeaderPair, LogicOp, Program, Statement, Token, TokenKind},
    lexer::Lexer,
};
use std::mem;

/// Recursive-descent parser with two-token lookahead.
///
/// The parser never aborts: a production that cannot complete records a
/// diagnostic, yields nothing, and the statement loop resumes at the next
/// token. Diagnostics are plain strings of the form
/// `line N: expected next token to be X, got Y instead`.
pub struct Parser {
    lexer: Lexer,
    cur: Token,
    peek: Token,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Self {
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Parser {
            lexer,
            cur,
            peek,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn advance(&mut self) {
        self.cur = mem::replace(&mut self.peek, self.lexer.next_token());
    }

    fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    /// Advances over the peek token when it matches, records a diagnostic
    /// and leaves the position untouched otherwise.
    fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.advance();
            true
        } else {
            self.errors.push(format!(
                "line {}: expected next token to be {}, got {} instead",
                self.peek.line, kind, self.peek.kind
            ));
            false
        }
    }

    pub fn parse_program(&mut self) -> Program {
        let mut program = Program::default();

        while !self.cur_is(TokenKind::Eof) {
            if let Some(stmt) = self.parse_statement() {
                program.statements.push(stmt);
            }
            self.advance();
        }

        program
    }

    /// Statement dispatch keyed on the leading keyword. Anything else is
    /// skipped silently; the program loop advances past it.
    fn parse_statement(&mut self) -> Option<Statement> {
        match self.cur.kind {
            TokenKind::Set => self.parse_set(),
            TokenKind::Increase => self.parse_increase(),
            TokenKind::Decrease => self.parse_decrease(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for_each(),
            TokenKind::To => self.parse_function_def(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Say => self.parse_say(),
            TokenKind::Ask => self.parse_ask(),
            TokenKind::Append => self.parse_append(),
            TokenKind::Fetch => self.parse_fetch(),
            TokenKind::Send => self.parse_send(),
            TokenKind::Put => self.parse_put(),
            TokenKind::Delete => self.parse_delete(),
            TokenKind::Parse => self.parse_parse_json(),
            TokenKind::Encode => self.parse_encode_json(),
            TokenKind::Serve => self.parse_serve(),
            TokenKind::When => self.parse_when_route(),
            TokenKind::Route => self.parse_route_to(),
            TokenKind::Reply => self.parse_reply(),
            TokenKind::Stop => self.parse_stop_server(),
            _ => None,
        }
    }

    // === Core statements ===

    /// `set x to 5`
    fn parse_set(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur.literal.clone();

        if !self.expect_peek(TokenKind::To) {
            return None;
        }
        self.advance();
        let value = self.parse_expression()?;

        Some(Statement::Set { name, value })
    }

    /// `increase x by 5`
    fn parse_increase(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let target = self.cur.literal.clone();

        if !self.expect_peek(TokenKind::By) {
            return None;
        }
        self.advance();
        let amount = self.parse_expression()?;

        Some(Statement::Increase { target, amount })
    }

    /// `decrease x by 5`
    fn parse_decrease(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let target = self.cur.literal.clone();

        if !self.expect_peek(TokenKind::By) {
            return None;
        }
        self.advance();
        let amount = self.parse_expression()?;

        Some(Statement::Decrease { target, amount })
    }

    /// `if CONDITION then ... done otherwise ... done`
    fn parse_if(&mut self) -> Option<Statement> {
        self.advance();
        let condition = self.parse_expression()?;

        if !self.expect_peek(TokenKind::Then) {
            return None;
        }

        self.advance();
        let consequence = self.parse_block();

        let mut alternative = None;
        if self.peek_is(TokenKind::Otherwise) {
            self.advance();
            self.advance();
            alternative = Some(self.parse_block());
        }

        Some(Statement::If {
            condition,
            consequence,
            alternative,
        })
    }

    /// `while CONDITION do ... done`
    fn parse_while(&mut self) -> Option<Statement> {
        self.advance();
        let condition = self.parse_expression()?;

        if !self.expect_peek(TokenKind::Do) {
            return None;
        }

        self.advance();
        let body = self.parse_block();

        Some(Statement::While { condition, body })
    }

    /// `for each item in items do ... done`
    fn parse_for_each(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Each) {
            return None;
        }
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let variable = self.cur.literal.clone();

        if !self.expect_peek(TokenKind::In) {
            return None;
        }
        self.advance();
        let iterable = self.parse_primary()?;

        if !self.expect_peek(TokenKind::Do) {
            return None;
        }
        self.advance();
        let body = self.parse_block();

        Some(Statement::ForEach {
            variable,
            iterable,
            body,
        })
    }

    /// Consumes statements until `done`, `otherwise`, or EOF. The caller is
    /// positioned on the first statement of the block; on return the current
    /// token is the terminator.
    fn parse_block(&mut self) -> Block {
        let mut block = Block::default();

        while !self.cur_is(TokenKind::Done)
            && !self.cur_is(TokenKind::Otherwise)
            && !self.cur_is(TokenKind::Eof)
        {
            if let Some(stmt) = self.parse_statement() {
                block.statements.push(stmt);
            }
            self.advance();
        }

        block
    }

    /// `to greet with name and greeting ... done`
    fn parse_function_def(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur.literal.clone();
        let mut parameters = Vec::new();

        if self.peek_is(TokenKind::With) {
            self.advance();
            self.advance();
            parameters.push(self.cur.literal.clone());

            while self.peek_is(TokenKind::And) {
                self.advance();
                self.advance();
                parameters.push(self.cur.literal.clone());
            }
        }

        self.advance();
        let body = self.parse_block();

        Some(Statement::FunctionDef {
            name,
            parameters,
            body,
        })
    }

    /// `return` or `return EXPR`
    fn parse_return(&mut self) -> Option<Statement> {
        self.advance();

        if self.cur_is(TokenKind::Done) || self.cur_is(TokenKind::Eof) {
            return Some(Statement::Return(None));
        }

        let value = self.parse_expression()?;
        Some(Statement::Return(Some(value)))
    }

    fn parse_say(&mut self) -> Option<Statement> {
        self.advance();
        let value = self.parse_expression()?;
        Some(Statement::Say(value))
    }

    /// `ask into answer`
    fn parse_ask(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Into) {
            return None;
        }
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        Some(Statement::Ask {
            target: self.cur.literal.clone(),
        })
    }

    /// `append value to items`
    fn parse_append(&mut self) -> Option<Statement> {
        self.advance();
        let value = self.parse_expression()?;

        if !self.expect_peek(TokenKind::To) {
            return None;
        }
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        Some(Statement::Append {
            value,
            list: self.cur.literal.clone(),
        })
    }

    // === HTTP client statements ===

    /// `fetch from "URL" [with headers] into response`
    fn parse_fetch(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::From) {
            return None;
        }
        self.advance();
        let url = self.parse_expression()?;

        let headers = self.parse_optional_headers()?;
        let target = self.parse_into_target()?;

        Some(Statement::Fetch {
            url,
            headers,
            target,
        })
    }

    /// `send "body" to "URL" [with headers] into response`
    fn parse_send(&mut self) -> Option<Statement> {
        self.advance();
        let body = self.parse_expression()?;

        if !self.expect_peek(TokenKind::To) {
            return None;
        }
        self.advance();
        let url = self.parse_expression()?;

        let headers = self.parse_optional_headers()?;
        let target = self.parse_into_target()?;

        Some(Statement::Send {
            body,
            url,
            headers,
            target,
        })
    }

    /// `put "body" to "URL" [with headers] into response`
    fn parse_put(&mut self) -> Option<Statement> {
        self.advance();
        let body = self.parse_expression()?;

        if !self.expect_peek(TokenKind::To) {
            return None;
        }
        self.advance();
        let url = self.parse_expression()?;

        let headers = self.parse_optional_headers()?;
        let target = self.parse_into_target()?;

        Some(Statement::Put {
            body,
            url,
            headers,
            target,
        })
    }

    /// `delete from "URL" [with headers] into response`
    fn parse_delete(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::From) {
            return None;
        }
        self.advance();
        let url = self.parse_expression()?;

        let headers = self.parse_optional_headers()?;
        let target = self.parse_into_target()?;

        Some(Statement::Delete {
            url,
            headers,
            target,
        })
    }

    /// The optional `with HEADERS` clause shared by the client verbs.
    fn parse_optional_headers(&mut self) -> Option<Option<Expr>> {
        if self.peek_is(TokenKind::With) {
            self.advance();
            self.advance();
            let headers = self.parse_expression()?;
            Some(Some(headers))
        } else {
            Some(None)
        }
    }

    /// The trailing `into IDENT` clause shared by the client verbs.
    fn parse_into_target(&mut self) -> Option<String> {
        if !self.expect_peek(TokenKind::Into) {
            return None;
        }
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        Some(self.cur.literal.clone())
    }

    // === JSON statements ===

    /// `parse X as json into Y`
    fn parse_parse_json(&mut self) -> Option<Statement> {
        self.advance();
        let source = self.parse_expression()?;

        if !self.expect_peek(TokenKind::As) {
            return None;
        }
        if !self.expect_peek(TokenKind::Json) {
            return None;
        }
        let target = self.parse_into_target()?;

        Some(Statement::ParseJson { source, target })
    }

    /// `encode X as json into Y`
    fn parse_encode_json(&mut self) -> Option<Statement> {
        self.advance();
        let source = self.parse_expression()?;

        if !self.expect_peek(TokenKind::As) {
            return None;
        }
        if !self.expect_peek(TokenKind::Json) {
            return None;
        }
        let target = self.parse_into_target()?;

        Some(Statement::EncodeJson { source, target })
    }

    // === Web server statements ===

    /// `serve on 8080` or `serve on 8080 in background`
    fn parse_serve(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::On) {
            return None;
        }
        self.advance();
        let port = self.parse_expression()?;

        let mut background = false;
        if self.peek_is(TokenKind::In) {
            self.advance();
            if self.peek_is(TokenKind::Background) {
                self.advance();
                background = true;
            }
        }

        Some(Statement::Serve { port, background })
    }

    /// `when request at "/path" using req do ... done`, or with a method
    /// alias: `fetch`/`get` for GET, `send` for POST, `put`, `delete`.
    fn parse_when_route(&mut self) -> Option<Statement> {
        self.advance();

        let method = match self.cur.kind {
            TokenKind::Request => "",
            TokenKind::Get | TokenKind::Fetch => "GET",
            TokenKind::Send => "POST",
            TokenKind::Put => "PUT",
            TokenKind::Delete => "DELETE",
            _ => {
                self.errors.push(format!(
                    "line {}: expected request or HTTP method after 'when', got {}",
                    self.cur.line, self.cur.kind
                ));
                return None;
            }
        }
        .to_string();
        self.advance();

        if !self.cur_is(TokenKind::At) {
            self.errors.push(format!(
                "line {}: expected 'at', got {}",
                self.cur.line, self.cur.kind
            ));
            return None;
        }

        self.advance();
        let path = self.parse_expression()?;

        let mut request_var = None;
        if self.peek_is(TokenKind::Using) {
            self.advance();
            if !self.expect_peek(TokenKind::Ident) {
                return None;
            }
            request_var = Some(self.cur.literal.clone());
        }

        if !self.expect_peek(TokenKind::Do) {
            return None;
        }
        self.advance();
        let body = self.parse_block();

        Some(Statement::WhenRoute {
            method,
            path,
            request_var,
            body,
        })
    }

    /// `route "/path" to handler`
    fn parse_route_to(&mut self) -> Option<Statement> {
        self.advance();
        let path = self.parse_expression()?;

        if !self.expect_peek(TokenKind::To) {
            return None;
        }
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        Some(Statement::RouteTo {
            path,
            handler: self.cur.literal.clone(),
        })
    }

    /// `reply with BODY [as json] [with status N] [with header X as Y]...`
    fn parse_reply(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::With) {
            return None;
        }
        self.advance();
        let body = self.parse_expression()?;

        let mut as_json = false;
        if self.peek_is(TokenKind::As) {
            self.advance();
            if self.peek_is(TokenKind::Json) {
                self.advance();
                as_json = true;
            }
        }

        let mut status = None;
        let mut headers = Vec::new();
        while self.peek_is(TokenKind::With) {
            self.advance();
            self.advance();

            if self.cur_is(TokenKind::Status) {
                self.advance();
                status = Some(self.parse_expression()?);
            } else if self.cur_is(TokenKind::Header) {
                self.advance();
                let name = self.parse_expression()?;
                if !self.expect_peek(TokenKind::As) {
                    return None;
                }
                self.advance();
                let value = self.parse_expression()?;
                headers.push(HeaderPair { name, value });
            }
        }

        Some(Statement::Reply {
            body,
            as_json,
            status,
            headers,
        })
    }

    /// `stop server` or `stop server on 8080`
    fn parse_stop_server(&mut self) -> Option<Statement> {
        if !self.expect_peek(TokenKind::Server) {
            return None;
        }

        let mut port = None;
        if self.peek_is(TokenKind::On) {
            self.advance();
            self.advance();
            port = Some(self.parse_expression()?);
        }

        Some(Statement::StopServer { port })
    }

    // === Expressions ===

    pub fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_logical_or()
    }

    fn parse_logical_or(&mut self) -> Option<Expr> {
        let mut left = self.parse_logical_and()?;

        while self.peek_is(TokenKind::Or) {
            self.advance();
            self.advance();
            let right = self.parse_logical_and()?;
            left = Expr::Logical {
                op: LogicOp::Or,
                left: Some(Box::new(left)),
                right: Box::new(right),
            };
        }

        Some(left)
    }

    fn parse_logical_and(&mut self) -> Option<Expr> {
        let mut left = self.parse_logical_not()?;

        while self.peek_is(TokenKind::And) {
            self.advance();
            self.advance();
            let right = self.parse_logical_not()?;
            left = Expr::Logical {
                op: LogicOp::And,
                left: Some(Box::new(left)),
                right: Box::new(right),
            };
        }

        Some(left)
    }

    fn parse_logical_not(&mut self) -> Option<Expr> {
        if self.cur_is(TokenKind::Not) {
            self.advance();
            let right = self.parse_logical_not()?;
            return Some(Expr::Logical {
                op: LogicOp::Not,
                left: None,
                right: Box::new(right),
            });
        }

        self.parse_comparison()
    }

    /// At most one comparison per expression; comparison is non-associative.
    fn parse_comparison(&mut self) -> Option<Expr> {
        let left = self.parse_additive()?;

        if self.peek_is(TokenKind::Equals) {
            self.advance();
            self.advance();
            let right = self.parse_additive()?;
            return Some(Expr::Comparison {
                op: CompareOp::Equals,
                left: Box::new(left),
                right: Box::new(right),
            });
        }

        if self.peek_is(TokenKind::Is) {
            self.advance();

            if self.peek_is(TokenKind::Greater) {
                self.advance();
                if !self.expect_peek(TokenKind::Than) {
                    return None;
                }
                self.advance();
                let right = self.parse_additive()?;
                return Some(Expr::Comparison {
                    op: CompareOp::Greater,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }

            if self.peek_is(TokenKind::Less) {
                self.advance();
                if !self.expect_peek(TokenKind::Than) {
                    return None;
                }
                self.advance();
                let right = self.parse_additive()?;
                return Some(Expr::Comparison {
                    op: CompareOp::Less,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
        }

        Some(left)
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut left = self.parse_multiplicative()?;

        while self.peek_is(TokenKind::Plus) || self.peek_is(TokenKind::Minus) {
            self.advance();
            let op = if self.cur_is(TokenKind::Plus) {
                ArithOp::Plus
            } else {
                ArithOp::Minus
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Some(left)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut left = self.parse_primary()?;

        while self.peek_is(TokenKind::Times) || self.peek_is(TokenKind::Divided) {
            self.advance();
            let op = if self.cur_is(TokenKind::Times) {
                ArithOp::Times
            } else {
                // `divided` must be followed by `by`
                if !self.expect_peek(TokenKind::By) {
                    return None;
                }
                ArithOp::Divided
            };
            self.advance();
            let right = self.parse_primary()?;
            left = Expr::Arithmetic {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Some(left)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        // Unary negation binds tighter than any binary operator
        if self.cur_is(TokenKind::Minus) {
            self.advance();
            let value = self.parse_primary()?;
            return Some(Expr::Negative(Box::new(value)));
        }

        if self.cur_is(TokenKind::String) {
            return Some(Expr::String(self.cur.literal.clone()));
        }

        if self.cur_is(TokenKind::A) && self.peek_is(TokenKind::List) {
            return self.parse_list_literal();
        }

        if self.cur_is(TokenKind::Length) && self.peek_is(TokenKind::Of) {
            self.advance();
            self.advance();
            let list = self.parse_primary()?;
            return Some(Expr::Length(Box::new(list)));
        }

        if self.cur_is(TokenKind::Item) {
            return self.parse_index();
        }

        if self.cur_is(TokenKind::Body) && self.peek_is(TokenKind::Of) {
            self.advance();
            self.advance();
            let response = self.parse_primary()?;
            return Some(Expr::BodyOf(Box::new(response)));
        }

        if self.cur_is(TokenKind::Status) && self.peek_is(TokenKind::Of) {
            self.advance();
            self.advance();
            let response = self.parse_primary()?;
            return Some(Expr::StatusOf(Box::new(response)));
        }

        if self.cur_is(TokenKind::Header) {
            self.advance();
            let name = self.parse_primary()?;
            if !self.expect_peek(TokenKind::From) {
                return None;
            }
            self.advance();
            let source = self.parse_primary()?;
            return Some(Expr::HeaderFrom {
                name: Box::new(name),
                source: Box::new(source),
            });
        }

        if self.cur_is(TokenKind::Field) {
            self.advance();
            let name = self.parse_primary()?;
            if !self.expect_peek(TokenKind::From) {
                return None;
            }
            self.advance();
            let source = self.parse_primary()?;
            return Some(Expr::FieldFrom {
                name: Box::new(name),
                source: Box::new(source),
            });
        }

        if self.cur_is(TokenKind::Method) && self.peek_is(TokenKind::Of) {
            self.advance();
            self.advance();
            let request = self.parse_primary()?;
            return Some(Expr::MethodOf(Box::new(request)));
        }

        if self.cur_is(TokenKind::Path) && self.peek_is(TokenKind::Of) {
            self.advance();
            self.advance();
            let request = self.parse_primary()?;
            return Some(Expr::PathOf(Box::new(request)));
        }

        if self.cur_is(TokenKind::Query) {
            self.advance();
            let name = self.parse_primary()?;
            if !self.expect_peek(TokenKind::From) {
                return None;
            }
            self.advance();
            let request = self.parse_primary()?;
            return Some(Expr::QueryFrom {
                name: Box::new(name),
                request: Box::new(request),
            });
        }

        if self.cur.kind.is_number_word() {
            return Some(Expr::Integer(self.parse_compound_number()));
        }

        if self.cur_is(TokenKind::Number) {
            return match self.cur.literal.parse::<i64>() {
                Ok(value) => Some(Expr::Integer(value)),
                Err(_) => {
                    self.errors.push(format!(
                        "could not parse {:?} as integer",
                        self.cur.literal
                    ));
                    None
                }
            };
        }

        if self.cur_is(TokenKind::Ident) {
            if self.peek_is(TokenKind::With) {
                return self.parse_call();
            }
            return Some(Expr::Identifier(self.cur.literal.clone()));
        }

        self.errors.push(format!(
            "line {}: expected expression, got {}",
            self.cur.line, self.cur.kind
        ));
        None
    }

    /// `funcname with arg1 and arg2`. Arguments parse at additive precedence
    /// so `fact with n minus 1` passes `n - 1`; `and` separates arguments.
    fn parse_call(&mut self) -> Option<Expr> {
        let function = self.cur.literal.clone();
        self.advance();
        self.advance();

        let mut arguments = Vec::new();
        arguments.push(self.parse_additive()?);

        while self.peek_is(TokenKind::And) {
            self.advance();
            self.advance();
            arguments.push(self.parse_additive()?);
        }

        Some(Expr::Call {
            function,
            arguments,
        })
    }

    /// `a list of 1 and 2 and 3`
    fn parse_list_literal(&mut self) -> Option<Expr> {
        if !self.expect_peek(TokenKind::List) {
            return None;
        }
        if !self.expect_peek(TokenKind::Of) {
            return None;
        }

        self.advance();
        let mut elements = Vec::new();
        elements.push(self.parse_primary()?);

        while self.peek_is(TokenKind::And) {
            self.advance();
            self.advance();
            elements.push(self.parse_primary()?);
        }

        Some(Expr::List(elements))
    }

    /// `item N from list`
    fn parse_index(&mut self) -> Option<Expr> {
        self.advance();
        let index = self.parse_primary()?;

        if !self.expect_peek(TokenKind::From) {
            return None;
        }
        self.advance();
        let list = self.parse_primary()?;

        Some(Expr::Index {
            index: Box::new(index),
            list: Box::new(list),
        })
    }

    /// Folds a run of number words into one integer with two accumulators:
    /// `hundred` scales the running group, `thousand`/`million` flush it
    /// into the total. "one hundred twenty three" => 123, "one million one"
    /// => 1000001.
    fn parse_compound_number(&mut self) -> i64 {
        let mut total: i64 = 0;
        let mut current: i64 = 0;

        while let Some(word_value) = self.cur.kind.number_word_value() {
            if self.cur.kind.is_multiplier() {
                if current == 0 {
                    current = 1;
                }
                if self.cur.kind == TokenKind::Hundred {
                    current = current.wrapping_mul(word_value);
                } else {
                    total = total.wrapping_add(current.wrapping_mul(word_value));
                    current = 0;
                }
            } else {
                current = current.wrapping_add(word_value);
            }

            if !self.peek.kind.is_number_word() {
                break;
            }
            self.advance();
        }

        total.wrapping_add(current)
    }
}
