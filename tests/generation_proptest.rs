//! Property-based tests for generated architectures
//!
//! Whatever the seed, text from the built-in grammar must parse, pass
//! validation and keep one IR entry per hidden block.

use adl_gen::parser::tokenize;
use adl_gen::{AdlParser, Generator, Grammar, Pipeline, TextParser, DEFAULT_MAX_DEPTH};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_text_parses(seed in any::<u64>(), depth in 1usize..=DEFAULT_MAX_DEPTH) {
        let text = Generator::adl().generate_seeded(seed, depth).unwrap();
        prop_assert!(TextParser.parse(&text).is_ok(), "{}", text);
    }

    #[test]
    fn generated_text_is_valid(seed in any::<u64>()) {
        let text = Generator::adl().generate_seeded(seed, DEFAULT_MAX_DEPTH).unwrap();
        let diagnostics = Pipeline::new().check(&text).unwrap();
        prop_assert!(diagnostics.is_empty(), "{:?}\n{}", diagnostics, text);
    }

    #[test]
    fn one_ir_layer_per_hidden_block(seed in any::<u64>()) {
        let text = Generator::adl().generate_seeded(seed, DEFAULT_MAX_DEPTH).unwrap();
        let blocks = tokenize(&text)
            .unwrap()
            .iter()
            .filter(|token| token.kind.is_layer_type())
            .count();

        let ir = Pipeline::new().compile(&text).unwrap();
        prop_assert!(blocks >= 1);
        prop_assert_eq!(ir.hidden_layers.len(), blocks);
    }

    #[test]
    fn same_seed_same_text(seed in any::<u64>()) {
        let generator = Generator::adl();
        let first = generator.generate(&mut StdRng::seed_from_u64(seed), DEFAULT_MAX_DEPTH);
        let second = generator.generate(&mut StdRng::seed_from_u64(seed), DEFAULT_MAX_DEPTH);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn recursion_never_exceeds_bound(seed in any::<u64>(), depth in 0usize..8) {
        let generator = Generator::new(Grammar::parse(r#"<chain> ::= "x" | "x" <chain>"#));
        let expansion = generator
            .expand("chain", 0, depth, &mut StdRng::seed_from_u64(seed))
            .unwrap();
        prop_assert!(expansion.stats.self_recursions <= depth);
        prop_assert!(expansion.text.split_whitespace().count() <= depth + 1);
    }
}
