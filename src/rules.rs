use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::{AdlError, Result};

/// Numeric constraint on a parameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParamRange {
    /// Integer with a lower bound only
    Int { min: i64 },
    /// Float in `[min, max)`; no `max` means unbounded
    Float {
        min: f64,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl ParamRange {
    pub fn upper(&self) -> f64 {
        match self {
            ParamRange::Int { .. } => f64::INFINITY,
            ParamRange::Float { max, .. } => max.unwrap_or(f64::INFINITY),
        }
    }
}

/// Allowed parameters per layer type plus numeric ranges per parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTable {
    layer_params: HashMap<String, HashSet<String>>,
    ranges: HashMap<String, ParamRange>,
}

const POOLING: &[&str] = &["pool_size", "strides", "padding"];
const NORM: &[&str] = &["axis", "epsilon"];
const RECURRENT: &[&str] = &[
    "activation",
    "dropout",
    "kernel_init",
    "l1",
    "l2",
    "recurrent_dropout",
    "units",
];

impl Default for RuleTable {
    fn default() -> Self {
        let layers: &[(&str, &[&str])] = &[
            ("avg_pooling", POOLING),
            ("max_pooling", POOLING),
            ("global_pooling", &["pool_type"]),
            ("batch_norm", &["axis", "momentum", "epsilon"]),
            ("instance_norm", NORM),
            ("layer_norm", NORM),
            (
                "conv1d",
                &[
                    "activation",
                    "dilation_rate",
                    "dropout",
                    "filters",
                    "kernel_init",
                    "kernel_size",
                    "l1",
                    "l2",
                    "padding",
                    "strides",
                ],
            ),
            (
                "tcn",
                &[
                    "activation",
                    "dilations",
                    "dropout",
                    "filters",
                    "kernel_init",
                    "kernel_size",
                    "l1",
                    "l2",
                ],
            ),
            ("attention", &["dropout", "heads", "units"]),
            (
                "esn",
                &[
                    "activation",
                    "input_scaling",
                    "leak_rate",
                    "spectral_radius",
                    "units",
                ],
            ),
            ("gru", RECURRENT),
            ("lstm", RECURRENT),
            (
                "dense",
                &["activation", "dropout", "kernel_init", "l1", "l2", "units"],
            ),
        ];

        let mut table = RuleTable::empty();
        for (layer, params) in layers {
            table.allow(layer, params);
        }

        for name in ["dropout", "recurrent_dropout", "leak_rate", "momentum"] {
            table.set_range(name, ParamRange::Float { min: 0.0, max: Some(1.0) });
        }
        for name in ["l1", "l2", "spectral_radius", "input_scaling"] {
            table.set_range(name, ParamRange::Float { min: 0.0, max: None });
        }
        table.set_range("epsilon", ParamRange::Float { min: 1e-7, max: None });
        for name in [
            "units",
            "filters",
            "heads",
            "features",
            "sequence_length",
            "kernel_size",
            "strides",
            "pool_size",
            "dilation_rate",
        ] {
            table.set_range(name, ParamRange::Int { min: 1 });
        }
        table
    }
}

impl RuleTable {
    pub fn empty() -> Self {
        RuleTable {
            layer_params: HashMap::new(),
            ranges: HashMap::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(AdlError::Json)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(AdlError::Json)
    }

    /// Add parameters to a layer type's allowed set
    pub fn allow(&mut self, layer_type: &str, params: &[&str]) -> &mut Self {
        self.layer_params
            .entry(layer_type.to_string())
            .or_default()
            .extend(params.iter().map(|p| p.to_string()));
        self
    }

    pub fn remove_layer(&mut self, layer_type: &str) -> &mut Self {
        self.layer_params.remove(layer_type);
        self
    }

    pub fn set_range(&mut self, param: &str, range: ParamRange) -> &mut Self {
        self.ranges.insert(param.to_string(), range);
        self
    }

    /// Allowed parameters for a layer type; `None` if the type is not modelled
    pub fn allowed_params(&self, layer_type: &str) -> Option<&HashSet<String>> {
        self.layer_params.get(layer_type)
    }

    pub fn is_allowed(&self, layer_type: &str, param: &str) -> Option<bool> {
        self.allowed_params(layer_type).map(|set| set.contains(param))
    }

    pub fn range(&self, param: &str) -> Option<&ParamRange> {
        self.ranges.get(param)
    }
}
