use crate::ast::{lookup_keyword, Token, TokenKind};

/// A lazy tokenizer over a single source string.
///
/// One token per call to [`next_token`](Lexer::next_token); the sentinel
/// `EOF` token repeats once the input is exhausted. The lexer never fails:
/// unrecognized characters and unterminated strings become `ILLEGAL` tokens
/// and scanning continues.
pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                self.line += 1;
                self.advance();
            } else if ch.is_whitespace() {
                self.advance();
            } else if ch == '#' {
                // comment runs to end of line
                while let Some(c) = self.current_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    fn read_word(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_number(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    /// Reads a `"`-delimited string with the usual escape sequences. An
    /// unrecognized escape keeps its backslash; an unterminated string
    /// yields an `ILLEGAL` token holding the partial content.
    fn read_string(&mut self) -> Token {
        let line = self.line;
        self.advance(); // consume opening quote

        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            match ch {
                '"' => {
                    self.advance();
                    return Token::new(TokenKind::String, result, line);
                }
                '\\' => {
                    self.advance();
                    match self.current_char() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('"') => result.push('"'),
                        Some('\\') => result.push('\\'),
                        Some(other) => {
                            result.push('\\');
                            result.push(other);
                        }
                        None => break,
                    }
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    result.push(ch);
                    self.advance();
                }
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Token::new(TokenKind::Illegal, result, line)
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let line = self.line;
        match self.current_char() {
            None => Token::new(TokenKind::Eof, "", line),
            Some('"') => self.read_string(),
            Some(ch) if ch.is_ascii_digit() => {
                let literal = self.read_number();
                Token::new(TokenKind::Number, literal, line)
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let word = self.read_word();
                match lookup_keyword(&word) {
                    Some(kind) => Token::new(kind, word, line),
                    None => Token::new(TokenKind::Ident, word, line),
                }
            }
            Some(ch) => {
                self.advance();
                Token::new(TokenKind::Illegal, ch.to_string(), line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token();
            let kind = tok.kind;
            out.push(kind);
            if kind == TokenKind::Eof {
                break;
            }
        }
        out
    }

    #[test]
    fn test_set_statement() {
        let mut lexer = Lexer::new("set x to 5");
        assert_eq!(lexer.next_token().kind, TokenKind::Set);
        let ident = lexer.next_token();
        assert_eq!(ident.kind, TokenKind::Ident);
        assert_eq!(ident.literal, "x");
        assert_eq!(lexer.next_token().kind, TokenKind::To);
        let number = lexer.next_token();
        assert_eq!(number.kind, TokenKind::Number);
        assert_eq!(number.literal, "5");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }

    #[test]
    fn test_keywords_are_lowercase_only() {
        assert_eq!(
            kinds("SET x"),
            vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn test_number_words() {
        assert_eq!(
            kinds("forty two"),
            vec![TokenKind::Forty, TokenKind::Two, TokenKind::Eof]
        );
    }

    #[test]
    fn test_string_literal() {
        let mut lexer = Lexer::new("say \"hello world\"");
        assert_eq!(lexer.next_token().kind, TokenKind::Say);
        let s = lexer.next_token();
        assert_eq!(s.kind, TokenKind::String);
        assert_eq!(s.literal, "hello world");
    }

    #[test]
    fn test_string_escapes() {
        let mut lexer = Lexer::new(r#""{\"a\":1}\n""#);
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.literal, "{\"a\":1}\n");
    }

    #[test]
    fn test_unterminated_string() {
        let mut lexer = Lexer::new("\"oops");
        let tok = lexer.next_token();
        assert_eq!(tok.kind, TokenKind::Illegal);
        assert_eq!(tok.literal, "oops");
    }

    #[test]
    fn test_comment_and_line_tracking() {
        let mut lexer = Lexer::new("set x to 1\n# a comment\nsay x");
        assert_eq!(lexer.next_token().line, 1);
        lexer.next_token();
        lexer.next_token();
        lexer.next_token();
        let say = lexer.next_token();
        assert_eq!(say.kind, TokenKind::Say);
        assert_eq!(say.line, 3);
    }

    #[test]
    fn test_illegal_character() {
        assert_eq!(
            kinds("set ? x"),
            vec![
                TokenKind::Set,
                TokenKind::Illegal,
                TokenKind::Ident,
                TokenKind::Eof
            ]
        );
    }
}
