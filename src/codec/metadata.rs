//! Metadata segment: time type and descriptive model info as canonical JSON.

use serde::{Deserialize, Serialize};

use crate::canonical::to_canonical_bytes;
use crate::error::UmbError;
use crate::types::{ModelInfo, TimeType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MetadataRecord {
    time: TimeType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    info: Option<ModelInfo>,
}

pub(crate) fn encode(time: TimeType, info: Option<&ModelInfo>) -> Result<(Vec<u8>, u64), UmbError> {
    let record = MetadataRecord {
        time,
        info: info.cloned(),
    };
    let payload = to_canonical_bytes(&record)
        .map_err(|e| UmbError::format(format!("Failed to serialize metadata: {e}")))?;
    Ok((payload, 1))
}

pub(crate) fn decode(payload: &[u8], element_count: u64) -> Result<(TimeType, Option<ModelInfo>), UmbError> {
    if element_count != 1 {
        return Err(UmbError::format(format!(
            "Metadata segment must hold one record, header counts {element_count}"
        )));
    }
    let record: MetadataRecord = serde_json::from_slice(payload)
        .map_err(|e| UmbError::format(format!("Invalid metadata segment: {e}")))?;
    Ok((record.time, record.info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_json() {
        let (payload, _) = encode(TimeType::UrgentStochastic, None).unwrap();
        assert_eq!(payload, br#"{"time":"urgent-stochastic"}"#.to_vec());
    }

    #[test]
    fn test_info_roundtrip() {
        let info = ModelInfo {
            name: Some("brp".to_string()),
            authors: vec!["A. Author".to_string()],
            ..ModelInfo::default()
        };
        let (payload, count) = encode(TimeType::Discrete, Some(&info)).unwrap();
        assert_eq!(decode(&payload, count).unwrap(), (TimeType::Discrete, Some(info)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(decode(b"{\"time\":\"hybrid\"}", 1).is_err());
    }
}
