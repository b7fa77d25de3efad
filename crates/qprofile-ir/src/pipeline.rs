//! Textual pass-pipeline grammar.
//!
//! Pipelines are comma-separated elements. An element is a name with
//! optional `<...>` parameters (separated by `;`) and an optional
//! parenthesized nested pipeline:
//!
//! ```text
//! pipeline := element (',' element)*
//! element  := WORD ('<' WORD (';' WORD)* '>')? ('(' pipeline? ')')?
//! ```
//!
//! ```
//! use qprofile_ir::pipeline::parse;
//!
//! let elements = parse("qubit-allocation,module(verify,resource-annotation<strict>)").unwrap();
//! assert_eq!(elements.len(), 2);
//! assert_eq!(elements[1].nested.len(), 2);
//! assert_eq!(elements[1].nested[1].params, vec!["strict".to_string()]);
//! ```
//!
//! This module only checks syntax. Whether a name refers to a known pass
//! is decided by whoever consumes the parsed elements.

use logos::Logos;
use std::fmt;
use thiserror::Error;

/// Tokens of the pipeline grammar.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    /// Pass name or parameter.
    #[regex(r"[A-Za-z0-9_][A-Za-z0-9_\-\.=]*", |lex| lex.slice().to_string())]
    Word(String),

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("<")]
    LAngle,

    #[token(">")]
    RAngle,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{w}'"),
            Token::Comma => write!(f, "','"),
            Token::Semicolon => write!(f, "';'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LAngle => write!(f, "'<'"),
            Token::RAngle => write!(f, "'>'"),
        }
    }
}

/// Errors produced while parsing pipeline text.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum PipelineError {
    /// Invalid character sequence.
    #[error("Invalid pipeline text at position {position}: '{text}'")]
    LexerError {
        /// Byte offset of the bad token.
        position: usize,
        /// The offending slice.
        text: String,
    },

    /// A token appeared where another was expected.
    #[error("Unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken {
        /// Byte offset of the token.
        position: usize,
        /// What the parser wanted.
        expected: String,
        /// What it got.
        found: String,
    },

    /// Input ended too early.
    #[error("Unexpected end of pipeline, expected {0}")]
    UnexpectedEof(String),
}

/// One parsed pipeline element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineElement {
    /// Element name.
    pub name: String,
    /// Parameters from `<...>`.
    pub params: Vec<String>,
    /// Nested pipeline from `(...)`.
    pub nested: Vec<PipelineElement>,
}

impl PipelineElement {
    /// Create an element with no parameters and no nesting.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: vec![],
            nested: vec![],
        }
    }
}

impl fmt::Display for PipelineElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.params.is_empty() {
            write!(f, "<{}>", self.params.join(";"))?;
        }
        if !self.nested.is_empty() {
            write!(f, "({})", format_pipeline(&self.nested))?;
        }
        Ok(())
    }
}

/// Render elements back to pipeline text.
pub fn format_pipeline(elements: &[PipelineElement]) -> String {
    elements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse pipeline text. Blank text yields an empty pipeline.
pub fn parse(text: &str) -> Result<Vec<PipelineElement>, PipelineError> {
    let mut tokens = vec![];
    let mut lexer = Token::lexer(text);
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span.start)),
            Err(()) => {
                return Err(PipelineError::LexerError {
                    position: span.start,
                    text: text[span].to_string(),
                });
            }
        }
    }

    if tokens.is_empty() {
        return Ok(vec![]);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let elements = parser.pipeline()?;
    if let Some((token, position)) = parser.tokens.get(parser.pos) {
        return Err(PipelineError::UnexpectedToken {
            position: *position,
            expected: "',' or end of pipeline".into(),
            found: token.to_string(),
        });
    }
    Ok(elements)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next_token(&mut self, expected: &str) -> Result<(Token, usize), PipelineError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| PipelineError::UnexpectedEof(expected.to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, want: &Token) -> Result<(), PipelineError> {
        let (token, position) = self.next_token(&want.to_string())?;
        if &token == want {
            Ok(())
        } else {
            Err(PipelineError::UnexpectedToken {
                position,
                expected: want.to_string(),
                found: token.to_string(),
            })
        }
    }

    fn word(&mut self, expected: &str) -> Result<String, PipelineError> {
        match self.next_token(expected)? {
            (Token::Word(w), _) => Ok(w),
            (token, position) => Err(PipelineError::UnexpectedToken {
                position,
                expected: expected.to_string(),
                found: token.to_string(),
            }),
        }
    }

    fn pipeline(&mut self) -> Result<Vec<PipelineElement>, PipelineError> {
        let mut elements = vec![self.element()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            elements.push(self.element()?);
        }
        Ok(elements)
    }

    fn element(&mut self) -> Result<PipelineElement, PipelineError> {
        let mut element = PipelineElement::new(self.word("pass name")?);

        if self.peek() == Some(&Token::LAngle) {
            self.pos += 1;
            element.params.push(self.word("parameter")?);
            while self.peek() == Some(&Token::Semicolon) {
                self.pos += 1;
                element.params.push(self.word("parameter")?);
            }
            self.expect(&Token::RAngle)?;
        }

        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            if self.peek() != Some(&Token::RParen) {
                element.nested = self.pipeline()?;
            }
            self.expect(&Token::RParen)?;
        }

        Ok(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_blank_is_empty() {
        assert_eq!(parse("").unwrap(), vec![]);
        assert_eq!(parse("  \n").unwrap(), vec![]);
    }

    #[test]
    fn test_flat_pipeline() {
        let elements = parse("verify, qubit-allocation").unwrap();
        assert_eq!(
            elements,
            vec![
                PipelineElement::new("verify"),
                PipelineElement::new("qubit-allocation")
            ]
        );
    }

    #[test]
    fn test_params_and_nesting() {
        let elements = parse("function(simplify<max=3;aggressive>,verify)").unwrap();
        assert_eq!(elements.len(), 1);
        let nested = &elements[0].nested;
        assert_eq!(nested[0].name, "simplify");
        assert_eq!(nested[0].params, vec!["max=3", "aggressive"]);
        assert_eq!(format_pipeline(&elements), "function(simplify<max=3;aggressive>,verify)");
    }

    #[test]
    fn test_trailing_comma_is_rejected() {
        assert!(matches!(
            parse("verify,"),
            Err(PipelineError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(parse("module(verify").is_err());
        assert!(matches!(
            parse("verify)"),
            Err(PipelineError::UnexpectedToken { position: 6, .. })
        ));
    }

    proptest! {
        #[test]
        fn test_flat_lists_keep_every_name(names in prop::collection::vec("[a-z][a-z0-9-]{0,12}", 1..8)) {
            let elements = parse(&names.join(",")).unwrap();
            let parsed: Vec<String> = elements.into_iter().map(|e| e.name).collect();
            prop_assert_eq!(parsed, names);
        }
    }

    #[test]
    fn test_invalid_character() {
        assert!(matches!(
            parse("verify|inline"),
            Err(PipelineError::LexerError { position: 6, .. })
        ));
    }
}
