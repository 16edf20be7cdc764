//! `timeseries_type`, `series` and `timeseries_params` for
//! `timeseries`-typed attributes.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::attrspec::data_type::Primitive;
use crate::duration::{parse_duration, MaybeDuration};
use crate::error::Dp3Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeseriesType {
    Regular,
    Irregular,
    IrregularIntervals,
}

impl TimeseriesType {
    fn parse(raw: &str) -> Result<Self, Dp3Error> {
        match raw {
            "regular" => Ok(Self::Regular),
            "irregular" => Ok(Self::Irregular),
            "irregular_intervals" => Ok(Self::IrregularIntervals),
            other => Err(Dp3Error::InvalidSpec(format!(
                "timeseries_type must be regular/irregular/irregular_intervals, got {other:?}"
            ))),
        }
    }

    /// Series auto-added to every attribute of this timeseries type.
    fn default_series(self) -> Vec<(&'static str, Primitive)> {
        match self {
            Self::Regular => vec![],
            Self::Irregular => vec![("time", Primitive::Time)],
            Self::IrregularIntervals => {
                vec![("time_first", Primitive::Time), ("time_last", Primitive::Time)]
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawSeriesField {
    pub data_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawTimeseriesParams {
    pub max_age: Option<String>,
}

/// Validated `timeseries`-specific configuration.
#[derive(Debug, Clone)]
pub struct TimeseriesSpec {
    pub timeseries_type: TimeseriesType,
    /// All series (user-declared plus auto-added defaults).
    pub series: BTreeMap<String, Primitive>,
    pub time_step: Option<chrono::Duration>,
    pub max_age: MaybeDuration,
}

impl TimeseriesSpec {
    pub fn build(
        timeseries_type: &str,
        series: BTreeMap<String, RawSeriesField>,
        time_step: Option<&str>,
        params: RawTimeseriesParams,
    ) -> Result<Self, Dp3Error> {
        let timeseries_type = TimeseriesType::parse(timeseries_type)?;

        let mut resolved = BTreeMap::new();
        for (id, field) in series {
            let prim = primitive_in_series(&field.data_type)?;
            resolved.insert(id, prim);
        }
        for (id, prim) in timeseries_type.default_series() {
            resolved.entry(id.to_string()).or_insert(prim);
        }

        let time_step = match (timeseries_type, time_step) {
            (TimeseriesType::Regular, Some(raw)) => {
                let d = parse_duration(raw)?;
                Some(d.ok_or_else(|| Dp3Error::InvalidSpec("time_step cannot be \"inf\"".into()))?)
            }
            (TimeseriesType::Regular, None) => {
                return Err(Dp3Error::InvalidSpec(
                    "time_step is mandatory for timeseries_type=regular".into(),
                ))
            }
            _ => None,
        };

        let max_age = match params.max_age {
            Some(s) => parse_duration(&s)?,
            None => None,
        };

        Ok(Self { timeseries_type, series: resolved, time_step, max_age })
    }
}

fn primitive_in_series(raw: &str) -> Result<Primitive, Dp3Error> {
    Primitive::parse(raw)
        .filter(|p| p.allowed_in_series())
        .ok_or_else(|| Dp3Error::InvalidSpec(format!("series data_type must be time/int/float, got {raw:?}")))
}
