use tracing::{debug, info};

use crate::interpreter::{ArchitectureIr, Interpreter};
use crate::parser::{AdlParser, TextParser};
use crate::rules::RuleTable;
use crate::utils::{AdlError, Result};
use crate::validator::{Diagnostic, SemanticValidator};

/// Parse, validate and interpret architecture text in one place
#[derive(Debug, Clone, Default)]
pub struct Pipeline<P = TextParser> {
    parser: P,
    validator: SemanticValidator,
    interpreter: Interpreter,
}

impl Pipeline<TextParser> {
    pub fn new() -> Self {
        Pipeline::default()
    }
}

impl<P: AdlParser> Pipeline<P> {
    /// Use another parser that honours the same tree contract
    pub fn with_parser(parser: P) -> Self {
        Pipeline {
            parser,
            validator: SemanticValidator::default(),
            interpreter: Interpreter,
        }
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.validator = SemanticValidator::new(rules);
        self
    }

    /// Semantic diagnostics for `text`, ordered by position.
    /// A syntax error is returned as `Err`.
    pub fn check(&self, text: &str) -> Result<Vec<Diagnostic>> {
        let tree = self.parser.parse(text)?;
        debug!("syntax ok");
        let mut diagnostics = self.validator.validate(&tree);
        diagnostics.sort_by_key(|d| (d.line, d.column));
        Ok(diagnostics)
    }

    /// Validate and, if there is nothing to report, interpret `text`
    pub fn compile(&self, text: &str) -> Result<ArchitectureIr> {
        let tree = self.parser.parse(text)?;
        let mut diagnostics = self.validator.validate(&tree);
        if !diagnostics.is_empty() {
            diagnostics.sort_by_key(|d| (d.line, d.column));
            info!(errors = diagnostics.len(), "architecture rejected");
            return Err(AdlError::Invalid(diagnostics));
        }
        let ir = self.interpreter.interpret(&tree)?;
        info!(hidden_layers = ir.hidden_layers.len(), "architecture interpreted");
        Ok(ir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::SyntaxError;
    use crate::tree::Node;
    use crate::validator::DiagnosticKind;

    #[test]
    fn test_compile_rejects_invalid() {
        let err = Pipeline::new()
            .compile("neuralnet { input { } dense { strides = 2; } output { } }")
            .unwrap_err();
        match err {
            AdlError::Invalid(found) => assert_eq!(found[0].kind, DiagnosticKind::Structural),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = Pipeline::new().check("neuralnet {").unwrap_err();
        assert!(matches!(err, AdlError::Syntax(_)));
    }

    #[test]
    fn test_check_sorts_by_position() {
        let text = "neuralnet {\n input { features = 0; }\n dense { units = 0; dropout = 9.0; }\n output { }\n}";
        let found = Pipeline::new().check(text).unwrap();
        let lines: Vec<_> = found.iter().map(|d| (d.line, d.column)).collect();
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert_eq!(found.len(), 3);
    }

    struct Fails;

    impl AdlParser for Fails {
        fn parse(&self, _text: &str) -> std::result::Result<Node, SyntaxError> {
            Err(SyntaxError {
                message: "no".to_string(),
                line: 4,
                column: 2,
            })
        }
    }

    #[test]
    fn test_custom_parser() {
        let err = Pipeline::with_parser(Fails).compile("anything").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error at line 4, column 2: no"
        );
    }
}
