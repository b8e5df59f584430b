//! Host settings reported to plug-ins

use std::path::Path;

use filter_abi::terms::{padding, sampling};
use filter_abi::four_cc;
use serde::{Deserialize, Serialize};

use crate::error::HostError;

/// Host behavior and the capabilities it advertises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Four-char host signature, `hostSig`
    pub host_signature: String,
    /// Image resolution in pixels per inch
    pub resolution: f64,
    /// Upper bound of the free space reported by the buffer procs
    pub buffer_space_ceiling: u64,
    /// `maxSpace`
    pub max_space: i32,
    /// Padding mode the record starts with
    pub default_padding: i16,
    /// `samplingSupport`
    pub sampling_support: i8,
    /// Value of absent planes when the plug-in requests dummy planes
    pub dummy_plane_value: i16,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            host_signature: "8BIM".to_owned(),
            resolution: 96.0,
            buffer_space_ceiling: 1 << 30,
            max_space: 1_000_000_000,
            default_padding: padding::ERROR_ON_BOUNDS_EXCEPTION,
            sampling_support: sampling::INTEGRAL_SAMPLING,
            dummy_plane_value: -1,
        }
    }
}

impl HostConfig {
    /// Load settings from a JSON file, missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let text = std::fs::read_to_string(path)
            .map_err(|_| HostError::ConfigNotFound(path.to_string_lossy().to_string()))?;
        serde_json::from_str(&text).map_err(|e| HostError::InvalidConfig(e.to_string()))
    }

    /// Host signature as a four-char code, space padded
    pub fn host_sig(&self) -> u32 {
        let mut code = [b' '; 4];
        for (slot, byte) in code.iter_mut().zip(self.host_signature.bytes()) {
            *slot = byte;
        }
        four_cc(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HostConfig = serde_json::from_str(r#"{"resolution": 300.0}"#).unwrap();
        assert_eq!(config.resolution, 300.0);
        assert_eq!(config.default_padding, padding::ERROR_ON_BOUNDS_EXCEPTION);
        assert_eq!(config.host_sig(), four_cc(b"8BIM"));
    }

    #[test]
    fn test_short_signature_is_space_padded() {
        let config = HostConfig {
            host_signature: "FX".into(),
            ..HostConfig::default()
        };
        assert_eq!(config.host_sig(), four_cc(b"FX  "));
    }

    #[test]
    fn test_missing_file() {
        let err = HostConfig::load(Path::new("/nonexistent/host.json")).unwrap_err();
        assert!(matches!(err, HostError::ConfigNotFound(_)));
    }
}
