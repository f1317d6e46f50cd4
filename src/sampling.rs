//! Sampling rules for numeric terminal values.
//!
//! Uniform sampling over the full numeric domain rarely gives a usable
//! network, so each parameter gets a small set of sensible values or a
//! narrow range. The table is data only: it changes which values come out,
//! never how expansion proceeds.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A zero-argument sampling rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValueSampler {
    /// Pick one of a fixed set of integers
    Choice { values: Vec<i64> },
    /// Uniform in `[min, max]`, printed with a fixed number of decimals
    Uniform { min: f64, max: f64, decimals: usize },
    /// Pick one of a set of constants, printed in scientific notation
    Scientific { values: Vec<f64> },
    /// Uniform integer in `[min, max]`
    IntRange { min: i64, max: i64 },
}

impl ValueSampler {
    fn choice(values: &[i64]) -> Self {
        ValueSampler::Choice {
            values: values.to_vec(),
        }
    }

    fn uniform(min: f64, max: f64, decimals: usize) -> Self {
        ValueSampler::Uniform { min, max, decimals }
    }

    fn scientific(values: &[f64]) -> Self {
        ValueSampler::Scientific {
            values: values.to_vec(),
        }
    }

    /// Draw one value, already formatted as ADL source text
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            ValueSampler::Choice { values } => values
                .choose(rng)
                .map(|v| v.to_string())
                .unwrap_or_else(|| "1".to_string()),
            ValueSampler::Uniform { min, max, decimals } => {
                let value = if min < max { rng.gen_range(*min..=*max) } else { *min };
                format!("{:.*}", (*decimals).max(1), value)
            }
            ValueSampler::Scientific { values } => values
                .choose(rng)
                .map(|v| format!("{:.0e}", v))
                .unwrap_or_else(|| "1e-3".to_string()),
            ValueSampler::IntRange { min, max } => {
                let value = if min < max { rng.gen_range(*min..=*max) } else { *min };
                value.to_string()
            }
        }
    }
}

/// Maps a parameter or terminal name (upper case) to its sampling rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingTable {
    rules: HashMap<String, ValueSampler>,
    /// Used for integer placeholders nothing else matches
    int_fallback: ValueSampler,
    /// Used for float placeholders nothing else matches
    float_fallback: ValueSampler,
}

impl Default for SamplingTable {
    fn default() -> Self {
        let rules = [
            ("UNITS", ValueSampler::choice(&[16, 32, 64, 128, 256, 512])),
            ("FILTERS", ValueSampler::choice(&[16, 32, 64, 128])),
            ("FEATURES", ValueSampler::choice(&[10, 20, 50, 100])),
            ("SEQUENCE_LENGTH", ValueSampler::choice(&[30, 50, 100, 200])),
            ("HEADS", ValueSampler::choice(&[1, 2, 4, 8])),
            ("KERNEL_SIZE", ValueSampler::choice(&[3, 5, 7, 9])),
            ("STRIDES", ValueSampler::choice(&[1, 2])),
            ("POOL_SIZE", ValueSampler::choice(&[2, 3, 4])),
            ("DILATION_RATE", ValueSampler::choice(&[1, 2, 4, 8])),
            ("AXIS", ValueSampler::choice(&[-1, 1])),
            // integers with no parameter of their own, e.g. dilation list items
            ("INT", ValueSampler::choice(&[1, 2, 4, 8])),
            ("DROPOUT", ValueSampler::uniform(0.1, 0.5, 3)),
            ("RECURRENT_DROPOUT", ValueSampler::uniform(0.1, 0.5, 3)),
            ("L1", ValueSampler::scientific(&[1e-2, 1e-3, 1e-4])),
            ("L2", ValueSampler::scientific(&[1e-2, 1e-3, 1e-4])),
            ("LEAK_RATE", ValueSampler::uniform(0.1, 0.3, 2)),
            ("SPECTRAL_RADIUS", ValueSampler::uniform(0.9, 0.99, 2)),
            ("INPUT_SCALING", ValueSampler::uniform(0.5, 1.5, 2)),
            ("MOMENTUM", ValueSampler::uniform(0.9, 0.99, 2)),
            ("EPSILON", ValueSampler::scientific(&[1e-3, 1e-5, 1e-7])),
        ]
        .into_iter()
        .map(|(name, sampler)| (name.to_string(), sampler))
        .collect();

        SamplingTable {
            rules,
            int_fallback: ValueSampler::IntRange { min: 8, max: 256 },
            float_fallback: ValueSampler::uniform(0.01, 0.5, 4),
        }
    }
}

impl SamplingTable {
    /// A table with only the generic fallbacks
    pub fn empty() -> Self {
        SamplingTable {
            rules: HashMap::new(),
            ..SamplingTable::default()
        }
    }

    pub fn insert(&mut self, name: &str, sampler: ValueSampler) -> &mut Self {
        self.rules.insert(name.to_ascii_uppercase(), sampler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ValueSampler> {
        self.rules.get(&name.to_ascii_uppercase())
    }

    /// Sample a value for `placeholder` (`INT` or `FLOAT`) inside the
    /// parameter `context`.
    ///
    /// The context's own rule wins, then a rule keyed by the placeholder,
    /// then the bounded-uniform fallback for the placeholder's kind.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        placeholder: &str,
        context: Option<&str>,
        rng: &mut R,
    ) -> String {
        let sampler = context
            .and_then(|name| self.get(name))
            .or_else(|| self.get(placeholder))
            .unwrap_or(if placeholder.eq_ignore_ascii_case("FLOAT") {
                &self.float_fallback
            } else {
                &self.int_fallback
            });
        sampler.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_choice_stays_in_set() {
        let table = SamplingTable::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let units: i64 = table.sample("INT", Some("units"), &mut rng).parse().unwrap();
            assert!([16, 32, 64, 128, 256, 512].contains(&units));
        }
    }

    #[test]
    fn test_uniform_keeps_decimal_point() {
        let sampler = ValueSampler::uniform(0.5, 1.5, 2);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let text = sampler.sample(&mut rng);
            assert!(text.contains('.'), "{text}");
            let value: f64 = text.parse().unwrap();
            assert!((0.5..=1.5).contains(&value));
        }
    }

    #[test]
    fn test_scientific_format() {
        let sampler = ValueSampler::scientific(&[1e-3]);
        let mut rng = StdRng::seed_from_u64(1);
        let text = sampler.sample(&mut rng);
        assert_eq!(text, "1e-3");
        assert_eq!(text.parse::<f64>().unwrap(), 1e-3);
    }

    #[test]
    fn test_lookup_falls_back_to_placeholder_then_generic() {
        let table = SamplingTable::default();
        let mut rng = StdRng::seed_from_u64(3);
        let item: i64 = table
            .sample("INT", Some("dilations"), &mut rng)
            .parse()
            .unwrap();
        assert!([1, 2, 4, 8].contains(&item));

        let empty = SamplingTable::empty();
        let generic: i64 = empty.sample("INT", Some("units"), &mut rng).parse().unwrap();
        assert!((8..=256).contains(&generic));
        let float: f64 = empty.sample("FLOAT", None, &mut rng).parse().unwrap();
        assert!((0.01..=0.5).contains(&float));
    }
}
