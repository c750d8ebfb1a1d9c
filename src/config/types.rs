use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::constants::{
    make_step_data_uuid, make_step_service_uuid, CONNECTION_CHECK_INTERVAL, DEVICE_NAME, SCAN_INTERVAL, STEP_GOAL,
};
use crate::device::payload::PayloadEncoding;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Advertised local name of the peripheral to connect to
    pub device_name: String,
    pub service_uuid: Uuid,
    pub step_characteristic_uuid: Uuid,
    pub step_goal: u32,
    pub payload_encoding: PayloadEncoding,
    pub scan_interval_ms: u64,
    pub connection_check_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            device_name: DEVICE_NAME.to_string(),
            service_uuid: make_step_service_uuid(),
            step_characteristic_uuid: make_step_data_uuid(),
            step_goal: STEP_GOAL,
            payload_encoding: PayloadEncoding::Base64,
            scan_interval_ms: SCAN_INTERVAL,
            connection_check_interval_ms: CONNECTION_CHECK_INTERVAL,
        }
    }
}

/// Values given on the command line, these win over the config file for a single run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub device_name: Option<String>,
    pub step_goal: Option<u32>,
    pub payload_encoding: Option<PayloadEncoding>,
}

impl Config {
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Config {
        if let Some(device_name) = &overrides.device_name {
            self.device_name = device_name.clone();
        }
        if let Some(step_goal) = overrides.step_goal {
            self.step_goal = step_goal;
        }
        if let Some(payload_encoding) = overrides.payload_encoding {
            self.payload_encoding = payload_encoding;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_defaults() {
        let config: Config = serde_json::from_str(r#"{ "deviceName": "Hallway", "stepGoal": 5000 }"#).unwrap();

        assert_eq!(config.device_name, "Hallway");
        assert_eq!(config.step_goal, 5000);
        assert_eq!(config.service_uuid, make_step_service_uuid());
        assert_eq!(config.payload_encoding, PayloadEncoding::Base64);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(Config::default()).unwrap();

        assert_eq!(json["deviceName"], "Step-Sense");
        assert_eq!(json["stepCharacteristicUuid"], "beefcafe-36e1-4688-b7f5-00000000000b");
        assert_eq!(json["payloadEncoding"], "base64");
        assert_eq!(json["scanIntervalMs"], 1000);
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let overrides = ConfigOverrides {
            step_goal: Some(250),
            payload_encoding: Some(PayloadEncoding::Raw),
            ..Default::default()
        };

        let config = Config::default().with_overrides(&overrides);

        assert_eq!(config.device_name, "Step-Sense");
        assert_eq!(config.step_goal, 250);
        assert_eq!(config.payload_encoding, PayloadEncoding::Raw);
    }
}
