//! Validated, immutable per-attribute specification.
//!
//! `AttrSpec::new` performs every construction check: field-type checks,
//! the color regex, `type`-discriminated required-field checks,
//! aggregation-function membership checks, default merging for
//! `history_params`/`timeseries_params`, duration parsing, and assembly of
//! the value validator. Once built, an `AttrSpec` is immutable and safe to
//! share read-only across workers (`Arc<AttrSpec>`).

pub mod data_type;
pub mod history_params;
pub mod timeseries_params;

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::Dp3Error;
use crate::value::Value;

pub use data_type::DataType;
pub use history_params::{AggregationFunction, HistoryParams, RawHistoryParams};
pub use timeseries_params::{RawSeriesField, RawTimeseriesParams, TimeseriesSpec, TimeseriesType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Plain,
    Observations,
    Timeseries,
}

/// Deserialization target for the YAML/JSON `AttrSpec` source document.
/// Unknown keys are ignored by `serde`'s default behavior; every field
/// checked by `AttrSpec::new` is named here explicitly.
#[derive(Debug, Default, Deserialize)]
pub struct RawAttrSpec {
    #[serde(rename = "type")]
    pub type_: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub data_type: Option<String>,
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub confidence: bool,
    #[serde(default)]
    pub multi_value: bool,
    pub history_params: Option<RawHistoryParams>,
    #[serde(default)]
    pub probability: bool,
    #[serde(default)]
    pub editable: bool,
    #[serde(default)]
    pub history_force_graph: bool,
    pub timeseries_type: Option<String>,
    pub series: Option<BTreeMap<String, RawSeriesField>>,
    pub time_step: Option<String>,
    pub timeseries_params: Option<RawTimeseriesParams>,
}

#[derive(Debug, Clone)]
pub struct AttrSpec {
    pub id: String,
    pub attr_type: AttrType,
    pub name: String,
    pub description: String,
    pub color: String,

    // plain / observations
    pub data_type: Option<DataType>,
    pub confidence: bool,
    pub multi_value: bool,
    pub probability: bool,
    pub editable: bool,
    pub history_force_graph: bool,
    pub history_params: Option<HistoryParams>,

    // timeseries
    pub timeseries: Option<TimeseriesSpec>,
}

impl AttrSpec {
    /// Construct and fully validate an `AttrSpec` from its id and raw
    /// document. Fails with `InvalidSpec` naming the offending field.
    pub fn new(id: impl Into<String>, spec: RawAttrSpec) -> Result<Self, Dp3Error> {
        let id = id.into();

        let raw_type = spec
            .type_
            .ok_or_else(|| Dp3Error::InvalidSpec("mandatory field 'type' is missing".into()))?;
        let attr_type = match raw_type.as_str() {
            "plain" => AttrType::Plain,
            "observations" => AttrType::Observations,
            "timeseries" => AttrType::Timeseries,
            other => {
                return Err(Dp3Error::InvalidSpec(format!(
                    "type must be plain/observations/timeseries, got {other:?}"
                )))
            }
        };

        let color = spec.color.unwrap_or_else(|| "#000000".to_string());
        validate_color(&color)?;

        let name = spec.name.unwrap_or_else(|| id.clone());
        let description = spec.description.unwrap_or_default();

        match attr_type {
            AttrType::Plain | AttrType::Observations => {
                let raw_data_type = spec
                    .data_type
                    .ok_or_else(|| Dp3Error::InvalidSpec("mandatory field 'data_type' is missing".into()))?;
                let data_type = DataType::parse(&raw_data_type, spec.categories.as_deref())?;

                if spec.probability && !data_type.is_primitive() {
                    return Err(Dp3Error::InvalidSpec(format!(
                        "data type {raw_data_type} is not supported as a probability (primitive types only)"
                    )));
                }

                let (multi_value, history_force_graph, history_params) = if attr_type == AttrType::Observations {
                    let raw_hp = spec.history_params.ok_or_else(|| {
                        Dp3Error::InvalidSpec("mandatory field 'history_params' is missing".into())
                    })?;
                    (spec.multi_value, spec.history_force_graph, Some(HistoryParams::from_raw(raw_hp)?))
                } else {
                    (false, false, None)
                };

                Ok(Self {
                    id,
                    attr_type,
                    name,
                    description,
                    color,
                    data_type: Some(data_type),
                    confidence: spec.confidence,
                    multi_value,
                    probability: spec.probability,
                    editable: spec.editable,
                    history_force_graph,
                    history_params,
                    timeseries: None,
                })
            }
            AttrType::Timeseries => {
                let timeseries_type = spec.timeseries_type.ok_or_else(|| {
                    Dp3Error::InvalidSpec("mandatory field 'timeseries_type' is missing".into())
                })?;
                let series = spec.series.unwrap_or_default();
                let timeseries = TimeseriesSpec::build(
                    &timeseries_type,
                    series,
                    spec.time_step.as_deref(),
                    spec.timeseries_params.unwrap_or_default(),
                )?;

                Ok(Self {
                    id,
                    attr_type,
                    name,
                    description,
                    color,
                    data_type: None,
                    confidence: false,
                    multi_value: false,
                    probability: false,
                    editable: false,
                    history_force_graph: false,
                    history_params: None,
                    timeseries: Some(timeseries),
                })
            }
        }
    }

    /// Whether `type = observations` (history-tracked).
    pub fn has_history(&self) -> bool {
        self.attr_type == AttrType::Observations
    }

    /// Validate a candidate value against this attribute's declared shape.
    pub fn validate_value(&self, v: &Value) -> bool {
        match &self.data_type {
            None => true, // timeseries: validation delegated to series fields
            Some(dt) => {
                if self.probability {
                    dt.validate_probability(v)
                } else {
                    dt.validate(v)
                }
            }
        }
    }
}

/// `color` must match `#RRGGBB`.
fn validate_color(color: &str) -> Result<(), Dp3Error> {
    let bytes = color.as_bytes();
    let ok = bytes.len() == 7 && bytes[0] == b'#' && bytes[1..].iter().all(|b| b.is_ascii_hexdigit());
    if ok {
        Ok(())
    } else {
        Err(Dp3Error::InvalidSpec("format of 'color' is invalid".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs_spec(data_type: &str) -> RawAttrSpec {
        RawAttrSpec {
            type_: Some("observations".to_string()),
            data_type: Some(data_type.to_string()),
            history_params: Some(RawHistoryParams::default()),
            ..Default::default()
        }
    }

    #[test]
    fn color_accepted_and_rejected() {
        assert!(validate_color("#abcdef").is_ok());
        assert!(validate_color("#GGGGGG").is_err());
        assert!(validate_color("abcdef").is_err());
    }

    #[test]
    fn observations_requires_history_params() {
        let mut spec = obs_spec("int");
        spec.history_params = None;
        let err = AttrSpec::new("test", spec).unwrap_err();
        assert!(matches!(err, Dp3Error::InvalidSpec(_)));
    }

    #[test]
    fn plain_ignores_history_force_graph_and_multi_value() {
        let spec = RawAttrSpec {
            type_: Some("plain".to_string()),
            data_type: Some("int".to_string()),
            multi_value: true,
            history_force_graph: true,
            ..Default::default()
        };
        let attr = AttrSpec::new("test", spec).unwrap();
        assert!(!attr.multi_value);
        assert!(!attr.history_force_graph);
        assert!(attr.history_params.is_none());
    }

    #[test]
    fn timeseries_gets_default_series_and_delegated_validator() {
        let spec = RawAttrSpec {
            type_: Some("timeseries".to_string()),
            timeseries_type: Some("irregular".to_string()),
            series: Some(BTreeMap::new()),
            ..Default::default()
        };
        let attr = AttrSpec::new("test", spec).unwrap();
        let ts = attr.timeseries.unwrap();
        assert!(ts.series.contains_key("time"));
        assert!(attr.validate_value(&Value::Null));
    }

    #[test]
    fn regular_timeseries_requires_time_step() {
        let spec = RawAttrSpec {
            type_: Some("timeseries".to_string()),
            timeseries_type: Some("regular".to_string()),
            series: Some(BTreeMap::new()),
            ..Default::default()
        };
        assert!(AttrSpec::new("test", spec).is_err());
    }

    #[test]
    fn probability_requires_primitive_data_type() {
        let mut spec = obs_spec("array<int>");
        spec.probability = true;
        assert!(AttrSpec::new("test", spec).is_err());
    }

    #[test]
    fn aggregation_interval_defaults_to_pre_plus_post() {
        let mut raw = RawHistoryParams::default();
        raw.pre_validity = "1h".to_string();
        raw.post_validity = "2h".to_string();
        let params = HistoryParams::from_raw(raw).unwrap();
        assert_eq!(params.aggregation_interval, chrono::Duration::hours(3));
    }
}
