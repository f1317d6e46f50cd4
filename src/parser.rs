//! Text to parse tree.
//!
//! Parsing is a collaborator contract: anything implementing [`AdlParser`]
//! can feed the validator and interpreter. [`TextParser`] is the built-in
//! implementation, a logos lexer plus recursive descent.

use logos::Logos;
use thiserror::Error;
use tracing::debug;

use crate::tree::{Child, Node, NodeKind, Token, TokenKind, ValueShape};

/// A positioned syntax error. Fatal for the text being parsed.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Syntax error at line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Turns architecture text into a concrete parse tree rooted at `ann`
pub trait AdlParser {
    fn parse(&self, text: &str) -> Result<Node, SyntaxError>;
}

/// Recursive-descent parser for the architecture language
#[derive(Debug, Clone, Copy, Default)]
pub struct TextParser;

impl TextParser {
    pub fn new() -> Self {
        TextParser
    }
}

impl AdlParser for TextParser {
    fn parse(&self, text: &str) -> Result<Node, SyntaxError> {
        let tokens = tokenize(text)?;
        debug!(tokens = tokens.len(), "lexed architecture text");
        let mut cursor = Cursor {
            tokens,
            pos: 0,
            end: end_position(text),
        };
        let tree = cursor.ann()?;
        if let Some(extra) = cursor.peek() {
            return Err(unexpected(extra, "end of input"));
        }
        Ok(tree)
    }
}

/// Lex `text` into positioned tokens
pub fn tokenize(text: &str) -> Result<Vec<Token>, SyntaxError> {
    let lines = LineIndex::new(text);
    let mut lexer = TokenKind::lexer(text);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let (line, column) = lines.position(lexer.span().start);
        match result {
            Ok(kind) => tokens.push(Token::new(kind, lexer.slice(), line, column)),
            Err(()) => {
                return Err(SyntaxError {
                    message: format!("unrecognized input '{}'", lexer.slice()),
                    line,
                    column,
                });
            }
        }
    }
    Ok(tokens)
}

struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { starts }
    }

    fn position(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts[line - 1];
        (line, offset - start + 1)
    }
}

fn end_position(text: &str) -> (usize, usize) {
    LineIndex::new(text).position(text.len())
}

fn unexpected(token: &Token, expected: &str) -> SyntaxError {
    SyntaxError {
        message: format!("expected {}, found '{}'", expected, token.value),
        line: token.line,
        column: token.column,
    }
}

struct Cursor {
    tokens: Vec<Token>,
    pos: usize,
    end: (usize, usize),
}

impl Cursor {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn eof(&self, expected: &str) -> SyntaxError {
        SyntaxError {
            message: format!("expected {}, found end of input", expected),
            line: self.end.0,
            column: self.end.1,
        }
    }

    /// Take the next token if `accept` allows it
    fn expect_with(
        &mut self,
        accept: impl Fn(TokenKind) -> bool,
        expected: &str,
    ) -> Result<Token, SyntaxError> {
        match self.peek() {
            Some(token) if accept(token.kind) => {}
            Some(token) => return Err(unexpected(token, expected)),
            None => return Err(self.eof(expected)),
        }
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Child, SyntaxError> {
        self.expect_with(|k| k == kind, expected).map(Child::Token)
    }

    fn ann(&mut self) -> Result<Node, SyntaxError> {
        let mut children = vec![
            self.expect(TokenKind::Neuralnet, "'neuralnet'")?,
            self.expect(TokenKind::Lbrace, "'{'")?,
            Child::Node(self.io_layer(
                TokenKind::Input,
                NodeKind::InputLayer,
                NodeKind::InputParam,
            )?),
        ];
        while self.peek_kind().is_some_and(TokenKind::is_layer_type) {
            children.push(Child::Node(self.hidden_layer()?));
        }
        children.push(Child::Node(self.io_layer(
            TokenKind::Output,
            NodeKind::OutputLayer,
            NodeKind::OutputParam,
        )?));
        children.push(self.expect(TokenKind::Rbrace, "'}'")?);
        Ok(Node::new(NodeKind::Ann, children))
    }

    fn io_layer(
        &mut self,
        keyword: TokenKind,
        kind: NodeKind,
        param_kind: NodeKind,
    ) -> Result<Node, SyntaxError> {
        let expected = if keyword == TokenKind::Input {
            "'input'"
        } else {
            "'output' or a layer type"
        };
        let mut children = vec![
            self.expect(keyword, expected)?,
            self.expect(TokenKind::Lbrace, "'{'")?,
        ];
        let allowed: fn(TokenKind) -> bool = if param_kind == NodeKind::InputParam {
            |k| matches!(k, TokenKind::Features | TokenKind::SequenceLength)
        } else {
            |k| matches!(k, TokenKind::Units | TokenKind::Activation | TokenKind::Dropout)
        };
        while self.peek_kind().is_some_and(TokenKind::is_param_name) {
            children.push(Child::Node(self.param(param_kind, allowed)?));
        }
        children.push(self.expect(TokenKind::Rbrace, "parameter or '}'")?);
        Ok(Node::new(kind, children))
    }

    fn hidden_layer(&mut self) -> Result<Node, SyntaxError> {
        let layer = self.expect_with(TokenKind::is_layer_type, "layer type")?;
        let mut children = vec![
            Child::Node(Node::new(NodeKind::LayerType, vec![Child::Token(layer)])),
            self.expect(TokenKind::Lbrace, "'{'")?,
        ];
        while self.peek_kind().is_some_and(TokenKind::is_param_name) {
            children.push(Child::Node(
                self.param(NodeKind::LayerParam, TokenKind::is_param_name)?,
            ));
        }
        children.push(self.expect(TokenKind::Rbrace, "parameter or '}'")?);
        Ok(Node::new(NodeKind::HiddenLayer, children))
    }

    /// `name = value ;`
    fn param(
        &mut self,
        kind: NodeKind,
        allowed: fn(TokenKind) -> bool,
    ) -> Result<Node, SyntaxError> {
        let name = self.expect_with(allowed, &format!("{} name", kind.name()))?;
        let shape = name.kind.value_shape().unwrap_or(ValueShape::Number);
        let equal = self.expect(TokenKind::Equal, "'='")?;
        let value = self.value(shape)?;
        let semicolon = self.expect(TokenKind::Semicolon, "';'")?;
        Ok(Node::new(
            kind,
            vec![Child::Token(name), equal, value, semicolon],
        ))
    }

    fn value(&mut self, shape: ValueShape) -> Result<Child, SyntaxError> {
        let child = match shape {
            ValueShape::Number => Child::Token(self.expect_with(TokenKind::is_number, "number")?),
            ValueShape::Padding => {
                Child::Token(self.expect_with(TokenKind::is_padding, "padding mode")?)
            }
            ValueShape::PoolType => {
                Child::Token(self.expect_with(TokenKind::is_pool_type, "pool type")?)
            }
            ValueShape::Activation => {
                let token = self.expect_with(TokenKind::is_activation, "activation function")?;
                Child::Node(Node::new(NodeKind::ActivationFn, vec![Child::Token(token)]))
            }
            ValueShape::Initializer => {
                let token = self.expect_with(TokenKind::is_initializer, "kernel initializer")?;
                Child::Node(Node::new(
                    NodeKind::KernelInitializer,
                    vec![Child::Token(token)],
                ))
            }
            ValueShape::DilationList => Child::Node(self.dilation_list()?),
        };
        Ok(child)
    }

    /// `[ INT (, INT)* ]`
    fn dilation_list(&mut self) -> Result<Node, SyntaxError> {
        let mut children = vec![
            self.expect(TokenKind::Lsqb, "'['")?,
            self.expect(TokenKind::Int, "integer")?,
        ];
        while self.peek_kind() == Some(TokenKind::Comma) {
            children.push(self.expect(TokenKind::Comma, "','")?);
            children.push(self.expect(TokenKind::Int, "integer")?);
        }
        children.push(self.expect(TokenKind::Rsqb, "',' or ']'")?);
        Ok(Node::new(NodeKind::DilationList, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = "neuralnet {\n    input { features = 10; sequence_length = 30; }\n    dense { units = 64; activation = relu; }\n    output { units = 1; activation = linear; }\n}";

    #[test]
    fn test_parse_tree_shape() {
        let tree = TextParser.parse(SMALL).unwrap();
        assert_eq!(tree.kind, NodeKind::Ann);
        assert_eq!(tree.children.len(), 6);
        assert_eq!(tree.nodes_of(NodeKind::HiddenLayer).count(), 1);

        let hidden = tree.find(NodeKind::HiddenLayer).unwrap();
        let params: Vec<_> = hidden.nodes_of(NodeKind::LayerParam).collect();
        assert_eq!(params.len(), 2);
        let name = params[0].children[0].as_token().unwrap();
        assert_eq!(name.kind, TokenKind::Units);
        assert_eq!((name.line, name.column), (3, 13));
        let activation = params[1].children[2].as_node().unwrap();
        assert_eq!(activation.kind, NodeKind::ActivationFn);
    }

    #[test]
    fn test_dilation_list_and_keyword_values() {
        let text = "neuralnet { input { features = 4; } tcn { dilations = [1, 2, 4]; padding = causal; } max_pooling { pool_size = 2; } output { units = 1; } }";
        let tree = TextParser.parse(text).unwrap();
        let list = tree.find(NodeKind::DilationList).unwrap();
        assert_eq!(list.children.len(), 7);
        assert_eq!(tree.nodes_of(NodeKind::HiddenLayer).count(), 2);
    }

    #[test]
    fn test_hidden_layers_are_optional_and_params_may_be_empty() {
        let tree = TextParser
            .parse("neuralnet { input { } output { units = 3; } }")
            .unwrap();
        assert_eq!(tree.nodes_of(NodeKind::HiddenLayer).count(), 0);
    }

    #[test]
    fn test_syntax_error_position() {
        let err = TextParser
            .parse("neuralnet {\n  input { features 10; }")
            .unwrap_err();
        assert_eq!((err.line, err.column), (2, 20));
        assert!(err.message.contains("'='"), "{}", err.message);
    }

    #[test]
    fn test_output_params_are_restricted() {
        let err = TextParser
            .parse("neuralnet { input { features = 1; } output { strides = 2; } }")
            .unwrap_err();
        assert!(err.message.contains("output_param name"), "{}", err.message);
    }

    #[test]
    fn test_unknown_word_and_trailing_input() {
        let err = TextParser.parse("neuralnet { foo }").unwrap_err();
        assert!(err.message.contains("unrecognized"));

        let err = TextParser
            .parse("neuralnet { input { } output { } } }")
            .unwrap_err();
        assert!(err.message.contains("end of input"));
    }

    #[test]
    fn test_truncated_input() {
        let err = TextParser.parse("neuralnet { input {").unwrap_err();
        assert!(err.message.ends_with("found end of input"));
        assert_eq!(err.line, 1);
    }
}
