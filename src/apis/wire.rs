/// Wire conventions of the backend API
///
/// Responses are wrapped as `{ result, message }`. Request keys are
/// snake_case; sort attribute names given in camelCase are converted at the
/// boundary. Amounts arrive as decimal strings.
use bigdecimal::BigDecimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ActionResult<T> {
    pub result: Option<T>,
    #[serde(default)]
    pub message: String,
}

/// Status codes each endpoint family accepts besides 2xx, so the envelope
/// message can be surfaced
pub const VALID_STATUS: &[u16] = &[400, 409];
pub const VALID_WITH_EXTERNAL_SERVICE: &[u16] = &[400, 409, 502];
pub const VALID_TASK_STATUS: &[u16] = &[404];

/// `blockNumber` -> `block_number`; already snake_case input is unchanged
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn snake_case_attributes(attributes: &[String]) -> Vec<String> {
    attributes.iter().map(|a| to_snake_case(a)).collect()
}

/// Drop null fields and empty strings/arrays from a JSON object
pub fn non_empty_properties(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| match v {
                    Value::Null => false,
                    Value::String(s) => !s.is_empty(),
                    Value::Array(a) => !a.is_empty(),
                    _ => true,
                })
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Flatten a JSON object into query pairs; arrays are comma joined
pub fn query_pairs(value: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = value else {
        return Vec::new();
    };

    map.iter()
        .filter_map(|(key, v)| {
            let rendered = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

/// Merge `async_query` into a serialized payload
pub fn with_async_query<T: Serialize>(payload: &T, async_query: bool) -> serde_json::Result<Value> {
    let mut value = serde_json::to_value(payload)?;
    if let Value::Object(map) = &mut value {
        map.insert("async_query".to_string(), Value::Bool(async_query));
    }
    Ok(value)
}

/// Amount fields accept either a decimal string or a JSON number
///
/// Values are kept at full precision and serialize back as decimal strings.
/// Non-finite input such as `"NaN"` or `"inf"` is rejected.
pub fn amount<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(AmountVisitor)
}

pub fn optional_amount<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "amount")] BigDecimal);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|Wrapper(v)| v))
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = BigDecimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or number")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<BigDecimal, E> {
        BigDecimal::from_str(value.trim())
            .map_err(|e| E::custom(format!("invalid amount '{}': {}", value, e)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<BigDecimal, E> {
        Ok(BigDecimal::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<BigDecimal, E> {
        Ok(BigDecimal::from(value))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<BigDecimal, E> {
        if !value.is_finite() {
            return Err(E::custom(format!("invalid amount {}", value)));
        }
        // shortest round-trip representation, not the binary expansion
        self.visit_str(&value.to_string())
    }
}
