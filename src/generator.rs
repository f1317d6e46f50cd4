//! Depth-bounded random expansion of a grammar into architecture text.
//!
//! Expansion picks alternatives uniformly, except that a self-recursive
//! rule stops recursing once its recursion depth reaches the bound. Parameter
//! lists are handled by [`ListStrategy`] entries instead of plain recursion,
//! since uniform sampling almost never yields a usable layer.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::grammar::{Element, Grammar, Production};
use crate::rules::RuleTable;
use crate::sampling::SamplingTable;
use crate::utils::{OptionExt, Result};

/// Recursion bound used when the caller has no preference
pub const DEFAULT_MAX_DEPTH: usize = 15;

static SPACE_BEFORE_CLOSER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([;,\]])").expect("closer pattern is valid"));
static SPACE_AFTER_BRACKET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[ \t]+").expect("bracket pattern is valid"));
static SPACE_BEFORE_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S)[ \t]*\{").expect("brace pattern is valid"));

/// Dedicated sampling for a parameter-list non-terminal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ListStrategy {
    /// Emit every alternative of `item`, in grammar order
    AllRequired { item: String },
    /// Always emit the `required` parameters; each `optional` one with `probability`
    Output {
        item: String,
        required: Vec<String>,
        optional: Vec<String>,
        probability: f64,
    },
    /// Emit between `min` and `max` distinct alternatives of `item`
    Subset { item: String, min: usize, max: usize },
}

/// Configuration options for generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Spaces per indent level
    pub indent_width: usize,
    /// Rule whose expansion names the current hidden layer's type
    pub layer_type_symbol: String,
    /// Bare terminals that are filled in from the sampling table
    pub placeholders: Vec<String>,
    /// Parameter-list rules that bypass ordinary expansion
    pub strategies: BTreeMap<String, ListStrategy>,
    /// Parameter always included for a given layer type, when allowed
    pub anchors: BTreeMap<String, String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let strategies = [
            (
                "input_params",
                ListStrategy::AllRequired {
                    item: "input_param".to_string(),
                },
            ),
            (
                "output_params",
                ListStrategy::Output {
                    item: "output_param".to_string(),
                    required: vec!["units".to_string(), "activation".to_string()],
                    optional: vec!["dropout".to_string()],
                    probability: 0.5,
                },
            ),
            (
                "layer_params",
                ListStrategy::Subset {
                    item: "layer_param".to_string(),
                    min: 2,
                    max: 5,
                },
            ),
        ]
        .into_iter()
        .map(|(name, strategy)| (name.to_string(), strategy))
        .collect();

        let anchors = [
            ("dense", "units"),
            ("lstm", "units"),
            ("gru", "units"),
            ("esn", "units"),
            ("conv1d", "filters"),
            ("tcn", "filters"),
        ]
        .into_iter()
        .map(|(layer, param)| (layer.to_string(), param.to_string()))
        .collect();

        GeneratorConfig {
            indent_width: 4,
            layer_type_symbol: "layer_type".to_string(),
            placeholders: vec!["INT".to_string(), "FLOAT".to_string()],
            strategies,
            anchors,
        }
    }
}

/// Counters collected during one expansion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Expansions of a symbol from inside one of its own productions
    pub self_recursions: usize,
    /// Largest recursion depth handed to any expansion
    pub deepest: usize,
    /// Recursive rules that hit the bound with no non-recursive alternative
    pub truncations: usize,
}

/// Text produced by one expansion, with its counters
#[derive(Debug, Clone, PartialEq)]
pub struct Expansion {
    pub text: String,
    pub stats: GenerationStats,
}

/// Random architecture generator over a grammar.
///
/// The grammar and tables are read-only once built, so a generator can be
/// shared freely; all per-call state lives in the expansion.
#[derive(Debug, Clone)]
pub struct Generator {
    grammar: Grammar,
    config: GeneratorConfig,
    sampling: SamplingTable,
    rules: RuleTable,
}

impl Generator {
    pub fn new(grammar: Grammar) -> Self {
        Generator {
            grammar,
            config: GeneratorConfig::default(),
            sampling: SamplingTable::default(),
            rules: RuleTable::default(),
        }
    }

    /// Generator over the built-in architecture grammar
    pub fn adl() -> Self {
        Generator::new(Grammar::adl())
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_sampling(mut self, sampling: SamplingTable) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_rules(mut self, rules: RuleTable) -> Self {
        self.rules = rules;
        self
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate one architecture from the grammar's root symbol.
    ///
    /// Returns `None` when nothing can be produced (no rules, or the root
    /// expands to empty text). Callers in a search loop simply retry.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, max_depth: usize) -> Option<String> {
        self.generate_with_stats(rng, max_depth)
            .map(|expansion| expansion.text)
    }

    /// Like [`Generator::generate`] but with a fresh `StdRng` seeded from `seed`
    pub fn generate_seeded(&self, seed: u64, max_depth: usize) -> Option<String> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.generate(&mut rng, max_depth)
    }

    pub fn generate_with_stats<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        max_depth: usize,
    ) -> Option<Expansion> {
        let Some(root) = self.grammar.start_symbol() else {
            warn!("grammar has no rules, nothing to generate");
            return None;
        };
        let expansion = self.expand(root, 0, max_depth, rng).ok()?;
        if expansion.text.is_empty() {
            debug!(root, "root expanded to empty text");
            return None;
        }
        trace!(stats = ?expansion.stats, "generated architecture");
        Some(expansion)
    }

    /// Expand `symbol` starting at recursion depth `depth`
    pub fn expand<R: Rng + ?Sized>(
        &self,
        symbol: &str,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> Result<Expansion> {
        self.grammar
            .rule(symbol)
            .ok_or_unknown(|| symbol.to_string())?;

        let mut state = ExpansionState {
            generator: self,
            rng,
            max_depth,
            out: Layout::new(self.config.indent_width),
            stats: GenerationStats::default(),
            layer_type: None,
        };
        state.expand_symbol(symbol, depth, None);

        Ok(Expansion {
            text: normalize_layout(&state.out.text),
            stats: state.stats,
        })
    }
}

/// Tidy raw layout: no blank lines, no trailing spaces, tight separators
pub fn normalize_layout(raw: &str) -> String {
    let text = SPACE_BEFORE_CLOSER.replace_all(raw, "${1}");
    let text = SPACE_AFTER_BRACKET.replace_all(&text, "[");
    let text = SPACE_BEFORE_BRACE.replace_all(&text, "${1} {");
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Output buffer that knows about braces and statement terminators
struct Layout {
    text: String,
    indent: usize,
    width: usize,
    line_start: bool,
}

impl Layout {
    fn new(width: usize) -> Self {
        Layout {
            text: String::new(),
            indent: 0,
            width,
            line_start: true,
        }
    }

    fn pad(&mut self) {
        if self.line_start {
            self.text.push_str(&" ".repeat(self.indent * self.width));
            self.line_start = false;
        } else if !self.text.ends_with(' ') {
            self.text.push(' ');
        }
    }

    fn newline(&mut self) {
        let trimmed = self.text.trim_end_matches(' ').len();
        self.text.truncate(trimmed);
        self.text.push('\n');
        self.line_start = true;
    }

    fn word(&mut self, word: &str) {
        if word.is_empty() {
            return;
        }
        self.pad();
        self.text.push_str(word);
    }

    fn open(&mut self) {
        self.pad();
        self.text.push('{');
        self.indent += 1;
        self.newline();
    }

    fn close(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        if !self.line_start {
            self.newline();
        }
        self.pad();
        self.text.push('}');
        self.newline();
    }

    fn terminate(&mut self) {
        let trimmed = self.text.trim_end().len();
        self.text.truncate(trimmed);
        self.text.push(';');
        self.newline();
    }
}

struct ExpansionState<'a, R: ?Sized> {
    generator: &'a Generator,
    rng: &'a mut R,
    max_depth: usize,
    out: Layout,
    stats: GenerationStats,
    /// Type of the hidden layer currently being written
    layer_type: Option<String>,
}

impl<'a, R: Rng + ?Sized> ExpansionState<'a, R> {
    fn expand_symbol(&mut self, symbol: &str, depth: usize, context: Option<&str>) {
        let generator = self.generator;
        let Some(rule) = generator.grammar.rule(symbol) else {
            warn!(symbol, "reference to undefined rule");
            self.out.word(&format!("<{}>", symbol));
            return;
        };

        if let Some(strategy) = generator.config.strategies.get(symbol) {
            self.expand_list(strategy, depth, context);
            return;
        }

        let productions = rule.productions();
        let index = if rule.is_recursive() && depth >= self.max_depth {
            match rule.non_recursive().choose(&mut *self.rng) {
                Some(&index) => index,
                None => {
                    debug!(symbol, depth, "depth bound reached without a way out");
                    self.stats.truncations += 1;
                    return;
                }
            }
        } else {
            self.rng.gen_range(0..productions.len())
        };

        let production = &productions[index];
        if production.is_empty() {
            return;
        }

        if symbol == generator.config.layer_type_symbol {
            let mark = self.out.text.len();
            self.expand_production(symbol, production, depth, context);
            let written = self.out.text[mark..].trim().to_string();
            self.layer_type = Some(written);
        } else {
            self.expand_production(symbol, production, depth, context);
        }
    }

    fn expand_production(
        &mut self,
        symbol: &str,
        production: &Production,
        depth: usize,
        context: Option<&str>,
    ) {
        let context = production.param_name().or(context);
        for element in &production.elements {
            match element {
                Element::Literal(text) => self.literal(text),
                Element::Terminal(name) => self.terminal(name, context),
                Element::NonTerminal(name) => {
                    let next = if name == symbol {
                        self.stats.self_recursions += 1;
                        self.stats.deepest = self.stats.deepest.max(depth + 1);
                        depth + 1
                    } else {
                        depth
                    };
                    self.expand_symbol(name, next, context);
                }
            }
        }
    }

    fn literal(&mut self, text: &str) {
        match text {
            "{" => self.out.open(),
            "}" => self.out.close(),
            ";" => self.out.terminate(),
            _ => self.out.word(text),
        }
    }

    fn terminal(&mut self, name: &str, context: Option<&str>) {
        let generator = self.generator;
        if generator.config.placeholders.iter().any(|p| p == name) {
            let value = generator.sampling.sample(name, context, &mut *self.rng);
            self.out.word(&value);
        } else {
            self.out.word(name);
        }
    }

    fn expand_list(&mut self, strategy: &ListStrategy, depth: usize, context: Option<&str>) {
        let generator = self.generator;
        let item = match strategy {
            ListStrategy::AllRequired { item }
            | ListStrategy::Output { item, .. }
            | ListStrategy::Subset { item, .. } => item,
        };
        let Some(rule) = generator.grammar.rule(item) else {
            warn!(item = item.as_str(), "parameter list refers to an undefined rule");
            return;
        };
        let productions = rule.productions();

        match strategy {
            ListStrategy::AllRequired { .. } => {
                for production in productions {
                    self.expand_production(item, production, depth, context);
                }
            }
            ListStrategy::Output {
                required,
                optional,
                probability,
                ..
            } => {
                let probability = probability.clamp(0.0, 1.0);
                for production in productions {
                    let Some(name) = production.param_name() else {
                        continue;
                    };
                    let emit = if required.iter().any(|r| r == name) {
                        true
                    } else if optional.iter().any(|o| o == name) {
                        self.rng.gen_bool(probability)
                    } else {
                        false
                    };
                    if emit {
                        self.expand_production(item, production, depth, context);
                    }
                }
            }
            ListStrategy::Subset { min, max, .. } => {
                let chosen = self.choose_subset(productions, *min, *max);
                for index in chosen {
                    self.expand_production(item, &productions[index], depth, context);
                }
            }
        }
    }

    /// Pick distinct parameter alternatives for the current layer, in grammar order
    fn choose_subset(&mut self, productions: &[Production], min: usize, max: usize) -> Vec<usize> {
        let generator = self.generator;
        let allowed = self
            .layer_type
            .as_deref()
            .and_then(|layer| generator.rules.allowed_params(layer));

        let available: Vec<usize> = productions
            .iter()
            .enumerate()
            .filter(|(_, p)| match (allowed, p.param_name()) {
                (Some(set), Some(name)) => set.contains(name),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|(i, _)| i)
            .collect();

        let hi = max.min(available.len());
        let lo = min.min(hi);
        let count = self.rng.gen_range(lo..=hi);
        if count == 0 {
            return Vec::new();
        }

        let anchor = self
            .layer_type
            .as_deref()
            .and_then(|layer| generator.config.anchors.get(layer))
            .and_then(|param| {
                available
                    .iter()
                    .copied()
                    .find(|&i| productions[i].param_name() == Some(param.as_str()))
            });

        let mut chosen = Vec::with_capacity(count);
        let pool: Vec<usize> = match anchor {
            Some(anchor) => {
                chosen.push(anchor);
                available.into_iter().filter(|&i| i != anchor).collect()
            }
            None => available,
        };
        let wanted = (count - chosen.len()).min(pool.len());
        chosen.extend(
            index::sample(&mut *self.rng, pool.len(), wanted)
                .into_iter()
                .map(|i| pool[i]),
        );
        chosen.sort_unstable();
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarBuilder;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    #[test]
    fn test_plain_expansion() {
        let grammar = GrammarBuilder::new()
            .add_rule("greeting", &["\"Hello\"", "<subject>"])
            .add_rule("subject", &["\"world\""])
            .add_rule("subject", &["\"Rust\"", "\"programmers\""])
            .build();
        let generator = Generator::new(grammar);
        let text = generator.generate(&mut rng(1), 5).unwrap();
        assert!(text == "Hello world" || text == "Hello Rust programmers", "{text}");
    }

    #[test]
    fn test_depth_bound_forces_non_recursive_choice() {
        let grammar = Grammar::parse(r#"<list> ::= "x" | "x" <list>"#);
        let generator = Generator::new(grammar);
        for seed in 0..20 {
            let expansion = generator.expand("list", 0, 3, &mut rng(seed)).unwrap();
            assert!(expansion.stats.self_recursions <= 3);
            assert!(expansion.text.split_whitespace().count() <= 4);
        }
    }

    #[test]
    fn test_branching_recursion_depth_is_bounded() {
        let grammar = Grammar::parse(r#"<s> ::= <s> <s> | "a""#);
        let generator = Generator::new(grammar);
        for seed in 0..10 {
            let expansion = generator.expand("s", 0, 4, &mut rng(seed)).unwrap();
            assert!(expansion.stats.deepest <= 4);
            assert!(!expansion.text.is_empty());
        }
    }

    #[test]
    fn test_truncation_without_exit_yields_empty() {
        let grammar = Grammar::parse(r#"<loop> ::= "x" <loop>"#);
        let generator = Generator::new(grammar);
        let expansion = generator.expand("loop", 0, 2, &mut rng(0)).unwrap();
        assert_eq!(expansion.text, "x x");
        assert_eq!(expansion.stats.truncations, 1);

        let grammar = Grammar::parse(r#"<loop> ::= <loop>"#);
        assert_eq!(Generator::new(grammar).generate(&mut rng(0), 0), None);
    }

    #[test]
    fn test_empty_marker_and_empty_grammar() {
        let grammar = Grammar::parse("<nothing> ::= <<empty>>");
        assert_eq!(Generator::new(grammar).generate(&mut rng(0), 3), None);
        assert_eq!(Generator::new(Grammar::new()).generate(&mut rng(0), 3), None);
    }

    #[test]
    fn test_unknown_symbol_is_an_error() {
        let generator = Generator::adl();
        assert!(generator.expand("nope", 0, 3, &mut rng(0)).is_err());
    }

    #[test]
    fn test_layout_of_blocks() {
        let grammar = Grammar::parse(
            r#"<root> ::= "net" "{" <stmt> <stmt> "}"
               <stmt> ::= "a" "=" "[" "1" "," "2" "]" ";""#,
        );
        let text = Generator::new(grammar).generate(&mut rng(0), 3).unwrap();
        assert_eq!(text, "net {\n    a = [1, 2];\n    a = [1, 2];\n}");
    }

    #[test]
    fn test_input_list_emits_every_parameter() {
        let generator = Generator::adl();
        for seed in 0..10 {
            let text = generator.expand("input_layer", 0, 5, &mut rng(seed)).unwrap().text;
            assert!(text.contains("features = "), "{text}");
            assert!(text.contains("sequence_length = "), "{text}");
        }
    }

    #[test]
    fn test_output_list_has_units_and_activation() {
        let generator = Generator::adl();
        let mut with_dropout = 0;
        for seed in 0..40 {
            let text = generator.expand("output_layer", 0, 5, &mut rng(seed)).unwrap().text;
            assert!(text.contains("units = "), "{text}");
            assert!(text.contains("activation = "), "{text}");
            if text.contains("dropout") {
                with_dropout += 1;
            }
        }
        assert!(with_dropout > 0 && with_dropout < 40);
    }

    #[test]
    fn test_hidden_layer_params_respect_whitelist() {
        let generator = Generator::adl();
        let rules = RuleTable::default();
        for seed in 0..50 {
            let text = generator.expand("hidden_layer", 0, 5, &mut rng(seed)).unwrap().text;
            let layer = text.split_whitespace().next().unwrap();
            let allowed = rules.allowed_params(layer).unwrap();
            let params: Vec<&str> = text
                .lines()
                .skip(1)
                .filter_map(|line| line.split_whitespace().next())
                .filter(|word| *word != "}")
                .collect();
            let available = generator
                .grammar()
                .rule("layer_param")
                .unwrap()
                .productions()
                .iter()
                .filter_map(Production::param_name)
                .filter(|name| allowed.contains(*name))
                .count();
            assert!(params.len() >= 2.min(available), "{text}");
            assert!(params.len() <= 5.min(available), "{text}");
            for param in &params {
                assert!(allowed.contains(*param), "{param} in {layer}: {text}");
            }
            if let Some(anchor) = generator.config().anchors.get(layer) {
                assert!(params.contains(&anchor.as_str()), "{text}");
            }
        }
    }

    #[test]
    fn test_generation_is_reproducible() {
        let generator = Generator::adl();
        let a = generator.generate_seeded(42, DEFAULT_MAX_DEPTH);
        let b = generator.generate_seeded(42, DEFAULT_MAX_DEPTH);
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: GeneratorConfig = serde_json::from_str(r#"{ "indent_width": 2 }"#).unwrap();
        assert_eq!(config.indent_width, 2);
        assert_eq!(config.strategies.len(), 3);
    }
}
