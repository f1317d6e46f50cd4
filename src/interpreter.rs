//! Bottom-up reduction of a parse tree into the architecture IR.
//!
//! Every child is reduced before its parent, and each node kind has exactly
//! one reduction. A shape no reduction accepts is an [`InterpretError`]: it
//! means the tree did not come from a conformant parser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tree::{Child, Node, NodeKind, Token, TokenKind};

/// A native parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<i64>),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Parameter name (lower case) to value
pub type ParamMap = BTreeMap<String, ParamValue>;

/// One hidden layer: its type plus its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerIr {
    #[serde(rename = "type")]
    pub layer_type: String,
    #[serde(flatten)]
    pub params: ParamMap,
}

/// Canonical form handed to the model builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureIr {
    pub input_layer: ParamMap,
    pub hidden_layers: Vec<LayerIr>,
    pub output_layer: ParamMap,
}

impl ArchitectureIr {
    /// `(sequence_length, features)` as declared by the input layer
    pub fn input_shape(&self) -> Option<(Option<i64>, i64)> {
        let features = self.input_layer.get("features")?.as_int()?;
        let sequence_length = self
            .input_layer
            .get("sequence_length")
            .and_then(ParamValue::as_int);
        Some((sequence_length, features))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpretError {
    #[error("unexpected shape for {kind} at line {line}, column {column}: {detail}")]
    UnexpectedShape {
        kind: &'static str,
        detail: String,
        line: usize,
        column: usize,
    },
    #[error("invalid number '{value}' at line {line}, column {column}")]
    BadNumber {
        value: String,
        line: usize,
        column: usize,
    },
}

/// Result of reducing one child
#[derive(Debug, Clone, PartialEq)]
enum Reduced<'t> {
    /// Punctuation, structure keywords and parameter names pass through
    Token(&'t Token),
    Value(ParamValue),
    Param(String, ParamValue),
    Input(ParamMap),
    Output(ParamMap),
    Hidden(LayerIr),
    Architecture(ArchitectureIr),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter;

impl Interpreter {
    pub fn new() -> Self {
        Interpreter
    }

    pub fn interpret(&self, tree: &Node) -> Result<ArchitectureIr, InterpretError> {
        match reduce_node(tree)? {
            Reduced::Architecture(ir) => Ok(ir),
            _ => Err(shape(tree, "expected an 'ann' root")),
        }
    }
}

fn shape(node: &Node, detail: &str) -> InterpretError {
    let (line, column) = node
        .first_token()
        .map_or((0, 0), |token| (token.line, token.column));
    InterpretError::UnexpectedShape {
        kind: node.kind.name(),
        detail: detail.to_string(),
        line,
        column,
    }
}

fn reduce_token(token: &Token) -> Result<Reduced<'_>, InterpretError> {
    let bad_number = || InterpretError::BadNumber {
        value: token.value.clone(),
        line: token.line,
        column: token.column,
    };
    let reduced = match token.kind {
        TokenKind::Int => Reduced::Value(ParamValue::Int(
            token.value.parse().map_err(|_| bad_number())?,
        )),
        TokenKind::Float => Reduced::Value(ParamValue::Float(
            token.value.parse().map_err(|_| bad_number())?,
        )),
        kind if kind.is_keyword_value() => {
            Reduced::Value(ParamValue::Str(kind.name().to_ascii_lowercase()))
        }
        _ => Reduced::Token(token),
    };
    Ok(reduced)
}

fn reduce_node(node: &Node) -> Result<Reduced<'_>, InterpretError> {
    let items = node
        .children
        .iter()
        .map(|child| match child {
            Child::Node(inner) => reduce_node(inner),
            Child::Token(token) => reduce_token(token),
        })
        .collect::<Result<Vec<_>, _>>()?;

    match node.kind {
        NodeKind::LayerType | NodeKind::ActivationFn | NodeKind::KernelInitializer => {
            match items.as_slice() {
                [Reduced::Value(value @ ParamValue::Str(_))] => Ok(Reduced::Value(value.clone())),
                _ => Err(shape(node, "expected a single keyword")),
            }
        }
        NodeKind::DilationList => {
            let mut values = Vec::new();
            for item in items {
                match item {
                    Reduced::Value(ParamValue::Int(v)) => values.push(v),
                    Reduced::Token(_) => {}
                    _ => return Err(shape(node, "expected integers")),
                }
            }
            Ok(Reduced::Value(ParamValue::List(values)))
        }
        NodeKind::LayerParam | NodeKind::InputParam | NodeKind::OutputParam => {
            match items.as_slice() {
                [Reduced::Token(name), _, Reduced::Value(value), ..]
                    if name.kind.is_param_name() =>
                {
                    Ok(Reduced::Param(
                        name.kind.name().to_ascii_lowercase(),
                        value.clone(),
                    ))
                }
                _ => Err(shape(node, "expected 'name = value;'")),
            }
        }
        NodeKind::InputLayer => Ok(Reduced::Input(collect_params(items))),
        NodeKind::OutputLayer => Ok(Reduced::Output(collect_params(items))),
        NodeKind::HiddenLayer => {
            let mut items = items.into_iter();
            match items.next() {
                Some(Reduced::Value(ParamValue::Str(layer_type))) => Ok(Reduced::Hidden(LayerIr {
                    layer_type,
                    params: collect_params(items),
                })),
                _ => Err(shape(node, "expected a layer type first")),
            }
        }
        NodeKind::Ann => reduce_ann(node, items),
    }
}

fn collect_params<'t>(items: impl IntoIterator<Item = Reduced<'t>>) -> ParamMap {
    items
        .into_iter()
        .filter_map(|item| match item {
            Reduced::Param(name, value) => Some((name, value)),
            _ => None,
        })
        .collect()
}

fn reduce_ann<'t>(node: &Node, items: Vec<Reduced<'t>>) -> Result<Reduced<'t>, InterpretError> {
    let mut input_layer = None;
    let mut output_layer = None;
    let mut hidden_layers = Vec::new();

    for item in items {
        match item {
            Reduced::Token(_) => {}
            Reduced::Input(map) if input_layer.is_none() && hidden_layers.is_empty() => {
                input_layer = Some(map)
            }
            Reduced::Hidden(layer) if input_layer.is_some() && output_layer.is_none() => {
                hidden_layers.push(layer)
            }
            Reduced::Output(map) if input_layer.is_some() && output_layer.is_none() => {
                output_layer = Some(map)
            }
            _ => return Err(shape(node, "expected input, hidden layers, output")),
        }
    }

    match (input_layer, output_layer) {
        (Some(input_layer), Some(output_layer)) => Ok(Reduced::Architecture(ArchitectureIr {
            input_layer,
            hidden_layers,
            output_layer,
        })),
        _ => Err(shape(node, "missing input or output layer")),
    }
}
