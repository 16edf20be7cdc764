//! `history_params` for `observations`-typed attributes.

use serde::Deserialize;

use crate::duration::{parse_duration, MaybeDuration};
use crate::error::Dp3Error;

/// One of the three aggregation-function slots an attribute's
/// `history_params` selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationFunction {
    Keep,
    Add,
    Avg,
    CsvUnion,
}

impl AggregationFunction {
    fn parse(raw: &str, field: &str) -> Result<Self, Dp3Error> {
        match raw {
            "keep" => Ok(Self::Keep),
            "add" => Ok(Self::Add),
            "avg" => Ok(Self::Avg),
            "csv_union" => Ok(Self::CsvUnion),
            other => Err(Dp3Error::InvalidSpec(format!(
                "{field} must be one of keep/add/avg/csv_union, got {other:?}"
            ))),
        }
    }
}

/// Raw (pre-validation) `history_params` document, as parsed from YAML/JSON.
#[derive(Debug, Deserialize)]
pub struct RawHistoryParams {
    pub max_age: Option<String>,
    pub max_items: Option<i64>,
    #[serde(default = "default_expire_time")]
    pub expire_time: String,
    #[serde(default = "default_zero")]
    pub pre_validity: String,
    #[serde(default = "default_zero")]
    pub post_validity: String,
    pub aggregation_interval: Option<String>,
    #[serde(default = "default_zero")]
    pub aggregation_max_age: String,
    #[serde(default = "default_keep")]
    pub aggregation_function_value: String,
    #[serde(default = "default_avg")]
    pub aggregation_function_confidence: String,
    #[serde(default = "default_csv_union")]
    pub aggregation_function_source: String,
}

fn default_expire_time() -> String {
    "inf".to_string()
}
fn default_zero() -> String {
    "0".to_string()
}
fn default_keep() -> String {
    "keep".to_string()
}
fn default_avg() -> String {
    "avg".to_string()
}
fn default_csv_union() -> String {
    "csv_union".to_string()
}

impl Default for RawHistoryParams {
    /// The platform-wide default `history_params` document, so
    /// `RawHistoryParams::default()` is always a valid document on its own.
    fn default() -> Self {
        Self {
            max_age: None,
            max_items: None,
            expire_time: default_expire_time(),
            pre_validity: default_zero(),
            post_validity: default_zero(),
            aggregation_interval: None,
            aggregation_max_age: default_zero(),
            aggregation_function_value: default_keep(),
            aggregation_function_confidence: default_avg(),
            aggregation_function_source: default_csv_union(),
        }
    }
}

/// Validated, immutable `history_params`.
#[derive(Debug, Clone)]
pub struct HistoryParams {
    pub max_age: MaybeDuration,
    pub max_items: Option<u32>,
    pub expire_time: MaybeDuration,
    pub pre_validity: chrono::Duration,
    pub post_validity: chrono::Duration,
    pub aggregation_interval: chrono::Duration,
    pub aggregation_max_age: chrono::Duration,
    pub aggregation_function_value: AggregationFunction,
    pub aggregation_function_confidence: AggregationFunction,
    pub aggregation_function_source: AggregationFunction,
}

impl HistoryParams {
    pub fn from_raw(raw: RawHistoryParams) -> Result<Self, Dp3Error> {
        let max_age = match raw.max_age {
            Some(s) => parse_duration(&s)?,
            None => None,
        };
        if let Some(items) = raw.max_items {
            if items <= 0 {
                return Err(Dp3Error::InvalidSpec("max_items must be positive".into()));
            }
        }
        let expire_time = parse_duration(&raw.expire_time)?;
        let pre_validity = require_finite(parse_duration(&raw.pre_validity)?, "pre_validity")?;
        let post_validity = require_finite(parse_duration(&raw.post_validity)?, "post_validity")?;
        let aggregation_interval = match raw.aggregation_interval {
            Some(s) => require_finite(parse_duration(&s)?, "aggregation_interval")?,
            None => pre_validity + post_validity,
        };
        let aggregation_max_age =
            require_finite(parse_duration(&raw.aggregation_max_age)?, "aggregation_max_age")?;

        Ok(Self {
            max_age,
            max_items: raw.max_items.map(|i| i as u32),
            expire_time,
            pre_validity,
            post_validity,
            aggregation_interval,
            aggregation_max_age,
            aggregation_function_value: AggregationFunction::parse(
                &raw.aggregation_function_value,
                "aggregation_function_value",
            )?,
            aggregation_function_confidence: AggregationFunction::parse(
                &raw.aggregation_function_confidence,
                "aggregation_function_confidence",
            )?,
            aggregation_function_source: AggregationFunction::parse(
                &raw.aggregation_function_source,
                "aggregation_function_source",
            )?,
        })
    }
}

fn require_finite(d: MaybeDuration, field: &str) -> Result<chrono::Duration, Dp3Error> {
    d.ok_or_else(|| Dp3Error::InvalidSpec(format!("{field} cannot be \"inf\"")))
}
