//! Generate, validate and interpret neural-network architecture descriptions.
//!
//! An architecture is written in a small block language:
//!
//! ```text
//! neuralnet {
//!     input { features = 10; sequence_length = 30; }
//!     dense { units = 64; activation = relu; }
//!     output { units = 1; activation = linear; }
//! }
//! ```
//!
//! A [`Generator`] expands a BNF-style [`Grammar`] into random but sensible
//! architectures for a search loop. A parser turns text into a tree, the
//! [`SemanticValidator`] checks it against a [`RuleTable`], and the
//! [`Interpreter`] reduces it to an [`ArchitectureIr`] for a model builder.
//!
//! # Example
//!
//! ```rust
//! use adl_gen::{Generator, Pipeline, DEFAULT_MAX_DEPTH};
//!
//! let generator = Generator::adl();
//! let text = generator.generate_seeded(7, DEFAULT_MAX_DEPTH).unwrap();
//!
//! let ir = Pipeline::new().compile(&text).unwrap();
//! assert!(!ir.hidden_layers.is_empty());
//! ```

pub mod generator;
pub mod grammar;
pub mod interpreter;
pub mod parser;
pub mod pipeline;
pub mod rules;
pub mod sampling;
pub mod tree;
pub mod utils;
pub mod validator;

pub use generator::{
    DEFAULT_MAX_DEPTH, Expansion, GenerationStats, Generator, GeneratorConfig, ListStrategy,
};
pub use grammar::{Element, Grammar, GrammarBuilder, Production, Rule};
pub use interpreter::{ArchitectureIr, InterpretError, Interpreter, LayerIr, ParamValue};
pub use parser::{AdlParser, SyntaxError, TextParser};
pub use pipeline::Pipeline;
pub use rules::{ParamRange, RuleTable};
pub use sampling::{SamplingTable, ValueSampler};
pub use tree::{Child, Node, NodeKind, Token, TokenKind};
pub use utils::{AdlError, Result};
pub use validator::{Diagnostic, DiagnosticKind, SemanticValidator};
