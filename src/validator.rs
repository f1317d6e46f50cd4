//! Semantic checks over a parse tree.
//!
//! The validator never stops at the first problem. It walks the whole tree
//! and collects positioned diagnostics; an empty list means the
//! architecture is valid.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::rules::{ParamRange, RuleTable};
use crate::tree::{Child, Node, NodeKind, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    /// Parameter not permitted for its layer type
    Structural,
    /// Numeric value outside its declared range
    Value,
    /// Layer type missing from the allowed-parameter table
    Configuration,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Structural => "structural error",
            DiagnosticKind::Value => "value error",
            DiagnosticKind::Configuration => "configuration error",
        };
        f.write_str(name)
    }
}

/// A positioned semantic rule violation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (L{}:C{}): {}",
            self.kind, self.line, self.column, self.message
        )
    }
}

/// Checks parameter whitelists and numeric ranges against a [`RuleTable`]
#[derive(Debug, Clone, Default)]
pub struct SemanticValidator {
    rules: RuleTable,
}

impl SemanticValidator {
    pub fn new(rules: RuleTable) -> Self {
        SemanticValidator { rules }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Visit the whole tree and return every diagnostic found, in tree order
    pub fn validate(&self, tree: &Node) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        self.visit(tree, None, &mut diagnostics);
        debug!(count = diagnostics.len(), "semantic validation finished");
        diagnostics
    }

    pub fn is_valid(&self, tree: &Node) -> bool {
        self.validate(tree).is_empty()
    }

    fn visit(&self, node: &Node, layer_type: Option<&str>, out: &mut Vec<Diagnostic>) {
        match node.kind {
            NodeKind::HiddenLayer => {
                let Some(layer) = node.find(NodeKind::LayerType).and_then(Node::first_token)
                else {
                    self.visit_children(node, None, out);
                    return;
                };
                let layer_type = layer.value.as_str();
                if self.rules.allowed_params(layer_type).is_none() {
                    warn!(layer_type, "layer type has no parameter whitelist");
                    out.push(diagnostic(
                        DiagnosticKind::Configuration,
                        format!("layer type '{}' has no allowed-parameter entry", layer_type),
                        layer,
                    ));
                    return;
                }
                self.visit_children(node, Some(layer_type), out);
            }
            NodeKind::LayerParam => {
                if let Some(layer_type) = layer_type {
                    self.check_layer_param(node, layer_type, out);
                }
            }
            NodeKind::InputParam | NodeKind::OutputParam => {
                if let Some((name, Some(value))) = param_parts(node) {
                    self.check_range(name, value, out);
                }
            }
            _ => self.visit_children(node, layer_type, out),
        }
    }

    fn visit_children(&self, node: &Node, layer_type: Option<&str>, out: &mut Vec<Diagnostic>) {
        for child in &node.children {
            if let Child::Node(child) = child {
                self.visit(child, layer_type, out);
            }
        }
    }

    fn check_layer_param(&self, node: &Node, layer_type: &str, out: &mut Vec<Diagnostic>) {
        let Some((name, value)) = param_parts(node) else {
            return;
        };

        let Some(allowed) = self.rules.allowed_params(layer_type) else {
            return;
        };

        if !allowed.contains(name.value.as_str()) {
            out.push(diagnostic(
                DiagnosticKind::Structural,
                format!(
                    "parameter '{}' is not valid for layer '{}'",
                    name.value, layer_type
                ),
                name,
            ));
        } else if let Some(value) = value {
            self.check_range(name, value, out);
        }
    }

    fn check_range(&self, name: &Token, value: &Token, out: &mut Vec<Diagnostic>) {
        let param = name.value.as_str();
        let Some(range) = self.rules.range(param) else {
            return;
        };

        let problem = match *range {
            ParamRange::Float { min, .. } => match value.value.parse::<f64>() {
                Ok(v) if min <= v && v < range.upper() => None,
                Ok(v) => Some(format!(
                    "value of '{}' ({}) is outside the range [{:?}, {:?})",
                    param,
                    v,
                    min,
                    range.upper()
                )),
                Err(_) => Some(format!(
                    "value of '{}' ({}) is not a number",
                    param, value.value
                )),
            },
            ParamRange::Int { min } => match value.value.parse::<i64>() {
                Ok(v) if v >= min => None,
                Ok(v) => Some(format!(
                    "value of '{}' ({}) cannot be less than {}",
                    param, v, min
                )),
                Err(_) => Some(format!(
                    "value of '{}' ({}) must be an integer",
                    param, value.value
                )),
            },
        };

        if let Some(message) = problem {
            out.push(diagnostic(DiagnosticKind::Value, message, name));
        }
    }
}

fn diagnostic(kind: DiagnosticKind, message: String, at: &Token) -> Diagnostic {
    Diagnostic {
        kind,
        message,
        line: at.line,
        column: at.column,
    }
}

/// Name token and, when the value is a number, the value token of a parameter node
fn param_parts(node: &Node) -> Option<(&Token, Option<&Token>)> {
    let name = node.children.first()?.as_token()?;
    let value = node
        .children
        .get(2)
        .and_then(Child::as_token)
        .filter(|token| token.kind.is_number());
    Some((name, value))
}
