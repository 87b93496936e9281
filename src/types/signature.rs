//! Lexer and recursive-descent parser for the signature notation of the
//! operator tables.

use super::ty::{ParseTypeError, Type};

#[lachs::token]
pub enum SigToken {
    #[terminal("->")]
    Arrow,
    #[terminal("<")]
    LAngle,
    #[terminal(">")]
    RAngle,
    #[terminal(",")]
    Comma,
    #[terminal("(")]
    LParen,
    #[terminal(")")]
    RParen,
    #[literal("[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl SigToken {
    /// Returns a human-readable description of the token
    pub fn describe(&self) -> String {
        match self {
            SigToken::Arrow(_) => "'->'".to_string(),
            SigToken::LAngle(_) => "'<'".to_string(),
            SigToken::RAngle(_) => "'>'".to_string(),
            SigToken::Comma(_) => "','".to_string(),
            SigToken::LParen(_) => "'('".to_string(),
            SigToken::RParen(_) => "')'".to_string(),
            SigToken::Ident(inner) => format!("identifier '{}'", inner.value),
        }
    }
}

pub fn parse_signature(source: &str) -> Result<Type, ParseTypeError> {
    let tokens = SigToken::lex(source).map_err(|err| ParseTypeError {
        signature: source.to_string(),
        reason: err.to_string(),
    })?;
    let mut parser = SignatureParser {
        source,
        tokens,
        pos: 0,
    };
    let ty = parser.parse_type()?;
    match parser.peek() {
        None => Ok(ty),
        Some(tok) => Err(parser.error(format!("unexpected {}", tok.describe()))),
    }
}

struct SignatureParser<'a> {
    source: &'a str,
    tokens: Vec<SigToken>,
    pos: usize,
}

impl SignatureParser<'_> {
    fn peek(&self) -> Option<&SigToken> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&SigToken> {
        let tok = self.tokens.get(self.pos);
        self.pos += 1;
        tok
    }

    fn error(&self, reason: String) -> ParseTypeError {
        ParseTypeError {
            signature: self.source.to_string(),
            reason,
        }
    }

    fn at_arrow(&self) -> bool {
        matches!(self.peek(), Some(SigToken::Arrow(_)))
    }

    fn at_langle(&self) -> bool {
        matches!(self.peek(), Some(SigToken::LAngle(_)))
    }

    fn parse_type(&mut self) -> Result<Type, ParseTypeError> {
        let arg = self.parse_atom()?;
        if self.at_arrow() {
            self.pos += 1;
            let result = self.parse_type()?;
            Ok(Type::func(arg, result))
        } else {
            Ok(arg)
        }
    }

    fn parse_atom(&mut self) -> Result<Type, ParseTypeError> {
        let name = match self.advance() {
            Some(SigToken::LParen(_)) => {
                let inner = self.parse_type()?;
                return match self.advance() {
                    Some(SigToken::RParen(_)) => Ok(inner),
                    Some(tok) => {
                        let found = tok.describe();
                        Err(self.error(format!("expected ')', found {}", found)))
                    }
                    None => Err(self.error("expected ')', found end of input".to_string())),
                };
            }
            Some(SigToken::Ident(inner)) => inner.value.clone(),
            Some(tok) => {
                let found = tok.describe();
                return Err(self.error(format!("unexpected {}", found)));
            }
            None => return Err(self.error("unexpected end of input".to_string())),
        };

        if name.starts_with(|c: char| c.is_lowercase()) && !self.at_langle() {
            return Ok(Type::var(name));
        }
        let mut children = Vec::new();
        if self.at_langle() {
            self.pos += 1;
            loop {
                children.push(self.parse_type()?);
                match self.advance() {
                    Some(SigToken::Comma(_)) => continue,
                    Some(SigToken::RAngle(_)) => break,
                    Some(tok) => {
                        let found = tok.describe();
                        return Err(self.error(format!("expected ',' or '>', found {}", found)));
                    }
                    None => return Err(self.error("unclosed '<'".to_string())),
                }
            }
        }
        Ok(Type::Lit(name, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexes_arrow_before_angle() {
        let tokens = SigToken::lex("list<a> -> b").unwrap();
        let described: Vec<String> = tokens.iter().map(SigToken::describe).collect();
        assert_eq!(
            described,
            vec!["identifier 'list'", "'<'", "identifier 'a'", "'>'", "'->'", "identifier 'b'"]
        );
    }

    #[test]
    fn test_stray_minus_is_a_lex_error() {
        let err = parse_signature("a - b").unwrap_err();
        assert_eq!(err.signature, "a - b");
    }

    #[test]
    fn test_trailing_token_is_reported() {
        let err = parse_signature("a b").unwrap_err();
        assert_eq!(err.reason, "unexpected identifier 'b'");
    }
}
