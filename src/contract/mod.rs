//! Output contracts: the per-dataset rules deciding how a stream is laid out and
//! how each of its columns is transformed before encoding.
//!
//! Contracts live in an explicit `ContractRegistry`, built once at startup either
//! from a static table in code or from a JSON document. Nothing is discovered at
//! runtime. A dataset name without an entry resolves to the identity contract
//! (columnar layout, every column passed through).

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::TambakError;
use crate::types::TambakDataType;

//==================================================================================
// I. Contract Vocabulary
//==================================================================================

/// The binary layout a stream is encoded with.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Layout {
    /// **Default:** one contiguous buffer per column (Structure-of-Arrays).
    #[default]
    Columnar,
    /// One buffer of fixed-stride rows (Array-of-Structures).
    #[serde(alias = "row-major-mixed")]
    RowMajor,
}

/// How the quantization scale of a column is obtained.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScaleSpec {
    /// A caller-supplied multiplier: `stored = round(raw * scale)`.
    Static { scale: f64 },
    /// Derived from the column's extremum so it fills the target range.
    Dynamic,
}

/// The transformation applied to one column.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
#[serde(tag = "transform", rename_all = "snake_case")]
pub enum ColumnRule {
    /// Passthrough: the column is written in its own element type.
    #[default]
    None,
    /// Numeric conversion to `to_type`.
    Cast { to_type: TambakDataType },
    /// Scaled narrowing to the integer type `to_type`.
    Quantize {
        to_type: TambakDataType,
        #[serde(rename = "params")]
        scale: ScaleSpec,
    },
}

/// A column's rule plus its optional null sentinel.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnContract {
    #[serde(flatten)]
    pub rule: ColumnRule,
    /// Value written in place of nulls. Overrides the table-level default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_encoding: Option<f64>,
}

impl From<ColumnRule> for ColumnContract {
    fn from(rule: ColumnRule) -> Self {
        Self {
            rule,
            null_encoding: None,
        }
    }
}

/// The declared output rules for one named dataset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct OutputContract {
    #[serde(default)]
    pub layout: Layout,
    /// Per-column rules. Columns without an entry pass through untouched.
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnContract>,
    /// Table-level null sentinel, used when a column declares none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub null_encoding: Option<f64>,
}

impl OutputContract {
    /// The implicit contract for datasets without an entry: columnar, no rules.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_rule(mut self, column: impl Into<String>, rule: impl Into<ColumnContract>) -> Self {
        self.columns.insert(column.into(), rule.into());
        self
    }

    pub fn with_null_encoding(mut self, sentinel: f64) -> Self {
        self.null_encoding = Some(sentinel);
        self
    }

    /// The rule for `column`, or `None` (passthrough) when it has no entry.
    pub fn rule_for(&self, column: &str) -> ColumnRule {
        self.columns.get(column).map(|c| c.rule).unwrap_or_default()
    }

    /// The null sentinel for `column`: column-level first, then table-level.
    pub fn null_encoding_for(&self, column: &str) -> Option<f64> {
        self.columns
            .get(column)
            .and_then(|c| c.null_encoding)
            .or(self.null_encoding)
    }

    /// Checks the contract on its own, without a dataset: target types must be
    /// valid for their rule and sentinels must be finite.
    pub fn validate(&self, dataset_name: &str) -> Result<(), TambakError> {
        for (column, contract) in &self.columns {
            if let ColumnRule::Quantize { to_type, .. } = contract.rule {
                if !to_type.is_integer() {
                    return Err(TambakError::ContractConfig(format!(
                        "'{}.{}': quantize target must be an integer type of width 8/16/32/64, got {}",
                        dataset_name, column, to_type
                    )));
                }
            }
            if let Some(sentinel) = contract.null_encoding {
                check_sentinel(dataset_name, column, sentinel)?;
            }
        }
        if let Some(sentinel) = self.null_encoding {
            check_sentinel(dataset_name, "*", sentinel)?;
        }
        Ok(())
    }

    /// Checks that every column named by the contract exists in `dataset`.
    pub fn validate_against(&self, dataset_name: &str, dataset: &Dataset) -> Result<(), TambakError> {
        self.validate(dataset_name)?;
        for column in self.columns.keys() {
            if dataset.column(column).is_none() {
                return Err(TambakError::ContractConfig(format!(
                    "Contract for '{}' references unknown column '{}'",
                    dataset_name, column
                )));
            }
        }
        Ok(())
    }
}

fn check_sentinel(dataset_name: &str, column: &str, sentinel: f64) -> Result<(), TambakError> {
    if sentinel.is_finite() {
        Ok(())
    } else {
        Err(TambakError::ContractConfig(format!(
            "'{}.{}': null_encoding must be a finite number, got {}",
            dataset_name, column, sentinel
        )))
    }
}

//==================================================================================
// II. The Registry (ContractResolver)
//==================================================================================

/// The statically enumerated table of contracts, keyed by dataset name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct ContractRegistry {
    contracts: BTreeMap<String, OutputContract>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the contract for `dataset_name`.
    pub fn register(mut self, dataset_name: impl Into<String>, contract: OutputContract) -> Self {
        self.contracts.insert(dataset_name.into(), contract);
        self
    }

    /// Parses a registry from a JSON object of `dataset name → contract`.
    /// Malformed documents (unknown layout, unknown dtype, missing `to_type`) and
    /// invalid contracts are reported as `ContractConfig` errors.
    pub fn from_json_str(json: &str) -> Result<Self, TambakError> {
        let registry: Self = serde_json::from_str(json)
            .map_err(|e| TambakError::ContractConfig(format!("Invalid contract document: {}", e)))?;
        registry.validate()?;
        Ok(registry)
    }

    /// Validates every registered contract on its own.
    pub fn validate(&self) -> Result<(), TambakError> {
        self.contracts
            .iter()
            .try_for_each(|(name, contract)| contract.validate(name))
    }

    /// Returns the declared contract for `dataset_name`, or the identity contract.
    pub fn resolve(&self, dataset_name: &str) -> Cow<'_, OutputContract> {
        match self.contracts.get(dataset_name) {
            Some(contract) => Cow::Borrowed(contract),
            None => {
                log::debug!(
                    "No output contract for '{}'; using identity passthrough.",
                    dataset_name
                );
                Cow::Owned(OutputContract::identity())
            }
        }
    }

    /// The declared contract for `dataset_name`, without the identity fallback.
    pub fn get(&self, dataset_name: &str) -> Option<&OutputContract> {
        self.contracts.get(dataset_name)
    }

    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.contracts.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}
