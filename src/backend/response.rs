//! JSON shapes of the Prometheus HTTP API responses this crate consumes.

use std::collections::HashMap;
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// `/api/v1/label/<label>/values`
#[derive(Debug, Clone, Deserialize)]
pub struct ValuesResponse {
    pub status: String,
    #[serde(default)]
    pub data: Vec<String>,
}

/// `/api/v1/query_range`
#[derive(Debug, Clone, Deserialize)]
pub struct MatrixResponse {
    pub status: String,
    pub data: MatrixResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixResult {
    #[serde(rename = "resultType")]
    pub result_type: String,
    #[serde(default)]
    pub result: Vec<MatrixSeries>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatrixSeries {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    #[serde(default)]
    pub values: Vec<MatrixPair>,
}

/// One `[<unix seconds>, "<value>"]` sample. The value arrives as a string
/// on the wire and is parsed here so the rest of the render path only ever
/// sees numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatrixPair {
    pub timestamp: f64,
    pub value: f64,
}

impl<'de> Deserialize<'de> for MatrixPair {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PairVisitor;

        impl<'de> Visitor<'de> for PairVisitor {
            type Value = MatrixPair;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a [timestamp, value] pair")
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let timestamp: f64 = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let raw: String = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(3, &self));
                }
                let value = raw.parse::<f64>().map_err(de::Error::custom)?;
                Ok(MatrixPair { timestamp, value })
            }
        }

        deserializer.deserialize_seq(PairVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_parses() {
        let pair: MatrixPair = serde_json::from_str(r#"[1590249600,"1"]"#).unwrap();
        assert_eq!(pair.timestamp, 1590249600.0);
        assert_eq!(pair.value, 1.0);
    }

    #[test]
    fn pair_rejects_wrong_arity() {
        assert!(serde_json::from_str::<MatrixPair>(r#"[1590249600]"#).is_err());
        assert!(serde_json::from_str::<MatrixPair>(r#"[1,"2",3]"#).is_err());
    }

    #[test]
    fn pair_rejects_non_numeric_value() {
        assert!(serde_json::from_str::<MatrixPair>(r#"[1,"abc"]"#).is_err());
    }

    #[test]
    fn matrix_response_parses() {
        let body = r#"{
            "status": "success",
            "data": {
                "resultType": "matrix",
                "result": [
                    {
                        "metric": {"__name__": "a", "__a_g1__": "b"},
                        "values": [[100, "1"], [120, "2.5"]]
                    }
                ]
            }
        }"#;
        let parsed: MatrixResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.status, "success");
        assert_eq!(parsed.data.result.len(), 1);
        assert_eq!(parsed.data.result[0].values[1].value, 2.5);
    }

    #[test]
    fn values_response_parses() {
        let body = r#"{"status": "success", "data": ["b", "c"]}"#;
        let parsed: ValuesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data, vec!["b", "c"]);
    }
}
