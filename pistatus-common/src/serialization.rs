use serde::Serialize;

use crate::error::{Error, Result};
use crate::metric::{Metric, format_tenth};

/// Payload format for published metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// The bare value as text with one decimal (e.g., `45.7`).
    #[default]
    Plain,

    /// JSON document with name, value, unit and timestamp.
    Json,

    /// CBOR encoding of the same document (compact binary).
    Cbor,
}

/// Encode a metric into a publishable payload.
///
/// The value is always rounded to one decimal place first.
pub fn encode_metric(metric: &Metric, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Plain => Ok(format_tenth(metric.value).into_bytes()),
        Format::Json | Format::Cbor => encode(&metric.rounded(), format),
    }
}

/// Encode a value to bytes using a structured format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
        Format::Plain => Err(Error::Encode(
            "plain format only carries metric values".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_payload_is_rounded() {
        let metric = Metric::new("cpu_temperature", 23.456);
        let payload = encode_metric(&metric, Format::Plain).unwrap();
        assert_eq!(payload, b"23.5");
    }

    #[test]
    fn test_plain_payload_keeps_trailing_zero() {
        let metric = Metric::new("cpu_temperature", 45.0);
        let payload = encode_metric(&metric, Format::Plain).unwrap();
        assert_eq!(payload, b"45.0");
    }

    #[test]
    fn test_json_payload() {
        let metric = Metric::new("disk_usage", 78.94)
            .with_unit("%")
            .at(1_700_000_000_000);
        let payload = encode_metric(&metric, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();

        assert_eq!(value["name"], "disk_usage");
        assert_eq!(value["value"], 78.9);
        assert_eq!(value["unit"], "%");
        assert_eq!(value["timestamp"], 1_700_000_000_000i64);
    }

    #[test]
    fn test_plain_payload_rounds_ties_to_even() {
        let cases = [
            (45.25, "45.2"),
            (2.25, "2.2"),
            (0.15, "0.1"),
            (23.456, "23.5"),
        ];

        for (value, expected) in cases {
            let metric = Metric::new("cpu_temperature", value);
            let payload = encode_metric(&metric, Format::Plain).unwrap();
            assert_eq!(String::from_utf8(payload).unwrap(), expected, "value {}", value);
        }
    }

    #[test]
    fn test_structured_payloads_agree_with_plain() {
        let metric = Metric::new("cpu_temperature", 45.25).with_unit("°C");

        let json = encode_metric(&metric, Format::Json).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["value"], 45.2);

        let cbor = encode_metric(&metric, Format::Cbor).unwrap();
        let decoded: Metric = ciborium::from_reader(cbor.as_slice()).unwrap();
        assert_eq!(decoded.value, 45.2);
        assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");
    }

    #[test]
    fn test_plain_rejects_structured_encode() {
        assert!(matches!(encode(&1.0, Format::Plain), Err(Error::Encode(_))));
    }
}
