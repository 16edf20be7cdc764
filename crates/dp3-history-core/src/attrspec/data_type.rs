//! `data_type` parsing and value validation.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::Dp3Error;
use crate::value::Value;

/// Primitive data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Tag,
    Binary,
    String,
    Int,
    Int64,
    Float,
    Ipv4,
    Ipv6,
    Mac,
    Time,
    Json,
}

impl Primitive {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "tag" => Primitive::Tag,
            "binary" => Primitive::Binary,
            "string" => Primitive::String,
            "int" => Primitive::Int,
            "int64" => Primitive::Int64,
            "float" => Primitive::Float,
            "ipv4" => Primitive::Ipv4,
            "ipv6" => Primitive::Ipv6,
            "mac" => Primitive::Mac,
            "time" => Primitive::Time,
            "json" => Primitive::Json,
            _ => return None,
        })
    }

    /// Data types allowed as series values inside a `timeseries` attribute.
    pub fn allowed_in_series(self) -> bool {
        matches!(self, Primitive::Time | Primitive::Int | Primitive::Float)
    }

    pub fn validate(self, v: &Value) -> bool {
        match self {
            Primitive::Tag | Primitive::Binary => matches!(v, Value::Bool(_)),
            Primitive::String => matches!(v, Value::Str(_)),
            Primitive::Int | Primitive::Int64 => matches!(v, Value::Int(_)),
            Primitive::Float => matches!(v, Value::Float(_)),
            Primitive::Ipv4 => v.as_str().is_some_and(|s| Ipv4Addr::from_str(s).is_ok()),
            Primitive::Ipv6 => v.as_str().is_some_and(|s| Ipv6Addr::from_str(s).is_ok()),
            Primitive::Mac => v.as_str().is_some_and(valid_mac),
            Primitive::Time => v
                .as_str()
                .is_some_and(|s| crate::duration::parse_rfc3339(s).is_ok()),
            Primitive::Json => !v.is_null(),
        }
    }
}

fn valid_mac(s: &str) -> bool {
    let groups: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
    groups.len() == 6
        && groups
            .iter()
            .all(|g| g.len() == 2 && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// The full set of `data_type` shapes an attribute can declare.
#[derive(Debug, Clone)]
pub enum DataType {
    Primitive(Primitive),
    Category(Option<Vec<String>>),
    Array(Primitive),
    Set(Primitive),
    /// Entity-type cross-check is deferred.
    Link(String),
    Dict(Vec<DictField>),
}

#[derive(Debug, Clone)]
pub struct DictField {
    pub key: String,
    pub optional: bool,
    pub data_type: Primitive,
}

impl DataType {
    /// Parse a `data_type` string into its validated shape.
    pub fn parse(raw: &str, categories: Option<&[String]>) -> Result<Self, Dp3Error> {
        if raw == "category" {
            return Ok(DataType::Category(categories.map(|c| c.to_vec())));
        }
        if let Some(inner) = strip_wrapped(raw, "array<", ">") {
            let prim = Primitive::parse(inner).ok_or_else(|| {
                Dp3Error::InvalidSpec(format!("data type {inner} is not supported as an array element"))
            })?;
            return Ok(DataType::Array(prim));
        }
        if let Some(inner) = strip_wrapped(raw, "set<", ">") {
            let prim = Primitive::parse(inner).ok_or_else(|| {
                Dp3Error::InvalidSpec(format!("data type {inner} is not supported as a set element"))
            })?;
            return Ok(DataType::Set(prim));
        }
        if let Some(inner) = strip_wrapped(raw, "link<", ">") {
            return Ok(DataType::Link(inner.to_string()));
        }
        if let Some(inner) = strip_wrapped(raw, "dict<", ">") {
            let mut fields = Vec::new();
            for item in inner.split(',') {
                let (key_part, type_part) = item
                    .split_once(':')
                    .ok_or_else(|| Dp3Error::InvalidSpec(format!("malformed dict field {item:?}")))?;
                let (key, optional) = match key_part.strip_suffix('?') {
                    Some(k) => (k.to_string(), true),
                    None => (key_part.to_string(), false),
                };
                let data_type = Primitive::parse(type_part).ok_or_else(|| {
                    Dp3Error::InvalidSpec(format!("data type {type_part} is not supported as a dict field"))
                })?;
                fields.push(DictField { key, optional, data_type });
            }
            return Ok(DataType::Dict(fields));
        }
        let prim = Primitive::parse(raw)
            .ok_or_else(|| Dp3Error::InvalidSpec(format!("data type '{raw}' is not supported")))?;
        Ok(DataType::Primitive(prim))
    }

    /// True if this data type (used standalone, not wrapped) is a primitive
    /// eligible for `probability: true`.
    pub fn is_primitive(&self) -> bool {
        matches!(self, DataType::Primitive(_))
    }

    pub fn validate(&self, v: &Value) -> bool {
        match self {
            DataType::Primitive(p) => p.validate(v),
            DataType::Category(Some(allowed)) => {
                v.as_str().is_some_and(|s| allowed.iter().any(|a| a == s))
            }
            DataType::Category(None) => matches!(v, Value::Str(_)),
            DataType::Array(elem) => match v {
                Value::Array(items) => items.iter().all(|i| elem.validate(i)),
                _ => false,
            },
            DataType::Set(elem) => match v {
                Value::Array(items) => {
                    items.iter().all(|i| elem.validate(i))
                        && has_no_duplicates(items)
                }
                _ => false,
            },
            DataType::Link(_) => !v.is_null(),
            DataType::Dict(fields) => match v {
                Value::Dict(map) => fields.iter().all(|f| match map.get(&f.key) {
                    Some(val) => f.data_type.validate(val),
                    None => f.optional,
                }),
                _ => false,
            },
        }
    }

    /// Validate probability-repurposed data: the `probability` flag
    /// repurposes the validator to accept a mapping from primitive value
    /// to float.
    pub fn validate_probability(&self, v: &Value) -> bool {
        let DataType::Primitive(_) = self else {
            return false;
        };
        matches!(v, Value::Probability(_))
    }
}

fn strip_wrapped<'a>(raw: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    raw.strip_prefix(prefix).and_then(|rest| rest.strip_suffix(suffix))
}

fn has_no_duplicates(items: &[Value]) -> bool {
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a == b {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_validates_pointwise() {
        let dt = DataType::parse("array<int>", None).unwrap();
        assert!(dt.validate(&Value::Array(vec![Value::Int(1), Value::Int(2)])));
        assert!(!dt.validate(&Value::Array(vec![Value::Int(1), Value::Str("x".into())])));
    }

    #[test]
    fn set_requires_uniqueness() {
        let dt = DataType::parse("set<int>", None).unwrap();
        assert!(dt.validate(&Value::Array(vec![Value::Int(1), Value::Int(2)])));
        assert!(!dt.validate(&Value::Array(vec![Value::Int(1), Value::Int(1)])));
    }

    #[test]
    fn dict_requires_non_optional_keys() {
        let dt = DataType::parse("dict<a:int,b?:string>", None).unwrap();
        let mut present = std::collections::BTreeMap::new();
        present.insert("a".to_string(), Value::Int(1));
        assert!(dt.validate(&Value::Dict(present.clone())));
        let mut missing_required = std::collections::BTreeMap::new();
        missing_required.insert("b".to_string(), Value::Str("x".into()));
        assert!(!dt.validate(&Value::Dict(missing_required)));
    }

    #[test]
    fn category_with_list_is_membership() {
        let dt = DataType::parse("category", Some(&["a".to_string(), "b".to_string()])).unwrap();
        assert!(dt.validate(&Value::Str("a".into())));
        assert!(!dt.validate(&Value::Str("c".into())));
    }

    #[test]
    fn mac_validator() {
        let dt = DataType::parse("mac", None).unwrap();
        assert!(dt.validate(&Value::Str("aa:bb:cc:dd:ee:ff".into())));
        assert!(!dt.validate(&Value::Str("not-a-mac".into())));
    }
}
