use std::collections::HashMap;
use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::utils::{AdlError, Result};

/// Grammar text for the architecture description language, shipped with the crate.
pub const ADL_GRAMMAR: &str = include_str!("../grammars/adl.bnf");

/// Token that marks an explicitly empty alternative.
pub const EMPTY_MARKER: &str = "<<empty>>";

static RULE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([^<>\s]+)>\s*::=").expect("rule header pattern is valid")
});

/// Represents an element in a production
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    /// A quoted literal, stored without its quotes
    Literal(String),
    /// A bare terminal name such as `INT`
    Terminal(String),
    /// A reference to another rule, stored without angle brackets
    NonTerminal(String),
}

impl Element {
    fn from_token(token: &str) -> Self {
        if token.len() >= 2 && token.starts_with('<') && token.ends_with('>') {
            return Element::NonTerminal(token[1..token.len() - 1].to_string());
        }
        for quote in ['"', '\''] {
            if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
                return Element::Literal(token[1..token.len() - 1].to_string());
            }
        }
        Element::Terminal(token.to_string())
    }

    /// Whether this element names the given rule
    pub fn refers_to(&self, symbol: &str) -> bool {
        matches!(self, Element::NonTerminal(name) if name == symbol)
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Element::Literal(text) => Some(text),
            _ => None,
        }
    }
}

/// One alternative of a rule
#[derive(Debug, Clone, PartialEq)]
pub struct Production {
    /// The sequence of elements in this production; empty for `<<empty>>`
    pub elements: Vec<Element>,
    /// Whether the production references its own rule
    pub self_recursive: bool,
}

impl Production {
    fn new(symbol: &str, elements: Vec<Element>) -> Self {
        let self_recursive = elements.iter().any(|e| e.refers_to(symbol));
        Production {
            elements,
            self_recursive,
        }
    }

    /// True for the explicit empty alternative
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The parameter named by a `"name" "=" value ";"` production.
    pub fn param_name(&self) -> Option<&str> {
        match self.elements.as_slice() {
            [Element::Literal(name), Element::Literal(eq), ..] if eq == "=" => Some(name),
            _ => None,
        }
    }
}

/// All alternatives of one non-terminal, with the recursion partition computed up front.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    productions: Vec<Production>,
    non_recursive: Vec<usize>,
}

impl Rule {
    fn new() -> Self {
        Rule {
            productions: Vec::new(),
            non_recursive: Vec::new(),
        }
    }

    fn push(&mut self, production: Production) {
        if !production.self_recursive {
            self.non_recursive.push(self.productions.len());
        }
        self.productions.push(production);
    }

    pub fn productions(&self) -> &[Production] {
        &self.productions
    }

    /// Whether any alternative references the rule itself
    pub fn is_recursive(&self) -> bool {
        self.non_recursive.len() != self.productions.len()
    }

    /// Indices of the alternatives that do not reference the rule itself
    pub fn non_recursive(&self) -> &[usize] {
        &self.non_recursive
    }
}

/// Symbol to productions mapping, built once from grammar text
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    rules: HashMap<String, Rule>,
    /// The first rule defined in the source text
    start_symbol: Option<String>,
}

impl Grammar {
    /// Create a new empty grammar
    pub fn new() -> Self {
        Grammar::default()
    }

    /// The grammar of the architecture description language
    pub fn adl() -> Self {
        Grammar::parse(ADL_GRAMMAR)
    }

    /// Parse a grammar from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(AdlError::Io)?;
        Ok(Grammar::parse(&text))
    }

    /// Parse grammar text of the form `<name> ::= alt1 | alt2 | ...`.
    ///
    /// Comment lines start with `#`. A rule body may span several lines and
    /// runs until the next rule header. Rules without any non-empty
    /// alternative are left out. When a header repeats, the later
    /// definition replaces the earlier one; use [`Grammar::add_rule`] to
    /// extend a rule instead.
    pub fn parse(text: &str) -> Self {
        let mut content = String::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') {
                continue;
            }
            content.push_str(trimmed);
            content.push(' ');
        }

        let headers: Vec<_> = RULE_HEADER.captures_iter(&content).collect();
        let mut grammar = Grammar::new();

        for (idx, captures) in headers.iter().enumerate() {
            let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            let body_end = headers
                .get(idx + 1)
                .and_then(|next| next.get(0))
                .map_or(content.len(), |m| m.start());
            let body = &content[whole.end()..body_end];

            let alternatives: Vec<Vec<&str>> = body
                .split('|')
                .map(|alt| alt.split_whitespace().collect::<Vec<_>>())
                .filter(|tokens| !tokens.is_empty())
                .collect();

            if alternatives.is_empty() {
                debug!(symbol = name.as_str(), "dropping rule without alternatives");
                continue;
            }
            if grammar.rules.remove(name.as_str()).is_some() {
                debug!(symbol = name.as_str(), "rule redefined, keeping the later one");
            }
            for tokens in alternatives {
                grammar.push_tokens(name.as_str(), &tokens);
            }
        }

        grammar
    }

    fn push_tokens(&mut self, symbol: &str, tokens: &[&str]) {
        let elements = tokens
            .iter()
            .filter(|t| **t != EMPTY_MARKER)
            .map(|t| Element::from_token(t))
            .collect();
        let production = Production::new(symbol, elements);

        if self.start_symbol.is_none() {
            self.start_symbol = Some(symbol.to_string());
        }
        self.rules
            .entry(symbol.to_string())
            .or_insert_with(Rule::new)
            .push(production);
    }

    /// Add a rule alternative from grammar tokens (`<name>`, `"literal"`, `NAME`)
    pub fn add_rule(&mut self, non_terminal: &str, tokens: &[&str]) -> Result<&mut Self> {
        if tokens.is_empty() {
            return Err(AdlError::EmptyProduction(non_terminal.to_string()));
        }
        self.push_tokens(non_terminal, tokens);
        Ok(self)
    }

    /// Check if the grammar contains a specific non-terminal
    pub fn has_non_terminal(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Get a reference to the grammar's rules
    pub fn rules(&self) -> &HashMap<String, Rule> {
        &self.rules
    }

    /// The root symbol, if any rule has been defined
    pub fn start_symbol(&self) -> Option<&str> {
        self.start_symbol.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Builder for constructing Grammar instances
#[derive(Debug, Default)]
pub struct GrammarBuilder {
    grammar: Grammar,
}

impl GrammarBuilder {
    pub fn new() -> Self {
        GrammarBuilder::default()
    }

    /// Add a rule alternative; an empty token list is ignored
    pub fn add_rule(mut self, non_terminal: &str, tokens: &[&str]) -> Self {
        let _ = self.grammar.add_rule(non_terminal, tokens);
        self
    }

    pub fn build(self) -> Grammar {
        self.grammar
    }
}
