use std::fmt;

use crate::device::payload::StepCount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Searching,
    SearchFailed { no_permission: bool },
    Connecting,
    Connected { device_id: String },
    ConnectionFailed,
    Disconnected,
    Reconnecting,
    ReconnectionFailed,
}

impl DeviceState {
    pub fn status_label(&self) -> &'static str {
        match self {
            DeviceState::Searching => "Searching...",
            DeviceState::SearchFailed { .. } => "Error searching for devices",
            DeviceState::Connecting => "Connecting...",
            DeviceState::Connected { .. } => "Connected",
            DeviceState::ConnectionFailed => "Error in Connection",
            DeviceState::Disconnected => "Disconnected",
            DeviceState::Reconnecting => "Reconnecting...",
            DeviceState::ReconnectionFailed => "Reconnection failed",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    StateChange(DeviceState),
    Steps(StepCount),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels() {
        assert_eq!(DeviceState::Searching.to_string(), "Searching...");
        assert_eq!(DeviceState::SearchFailed { no_permission: true }.to_string(), "Error searching for devices");
        assert_eq!(DeviceState::Connecting.to_string(), "Connecting...");
        assert_eq!(DeviceState::Connected { device_id: "AA:BB".to_string() }.to_string(), "Connected");
        assert_eq!(DeviceState::ConnectionFailed.to_string(), "Error in Connection");
        assert_eq!(DeviceState::Disconnected.to_string(), "Disconnected");
        assert_eq!(DeviceState::Reconnecting.to_string(), "Reconnecting...");
        assert_eq!(DeviceState::ReconnectionFailed.to_string(), "Reconnection failed");
    }
}
