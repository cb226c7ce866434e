use serde::Serialize;

use crate::device::{Capability, Device, RGB};

/// Serializable view of a [`Device`].
///
/// State fields are only present when the device advertises the matching
/// capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDetails {
    pub name: String,
    pub mac: String,
    pub online: bool,
    pub firmware: String,
    pub capabilities: Vec<Capability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<RGB>,
}

impl From<&Device> for DeviceDetails {
    fn from(device: &Device) -> Self {
        let gated = |capability: Capability| device.supports(capability);
        DeviceDetails {
            name: device.name().to_string(),
            mac: device.mac().to_string(),
            online: device.is_online(),
            firmware: device.firmware_version().to_string(),
            capabilities: device.capabilities().iter().collect(),
            power: gated(Capability::Power).then(|| device.is_powered_on()),
            brightness: gated(Capability::Brightness).then(|| device.brightness()),
            temperature: gated(Capability::Temperature).then(|| device.temperature()),
            color: gated(Capability::Color).then(|| device.color()),
        }
    }
}

impl DeviceDetails {
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::device::tests::record;
    use crate::device::Device;

    #[test]
    fn test_color_light_details() {
        let device = Device::decode(&record([1, 0, 0, 0, 0, 0, 0, 0], 0x0A, true, true, "Lamp")).unwrap();
        let value = device.details().to_json().unwrap();
        assert_eq!(
            value,
            json!({
                "name": "Lamp",
                "mac": "0000000000000001",
                "online": true,
                "firmware": "12267",
                "capabilities": ["COLOR", "TEMPERATURE", "BRIGHTNESS", "POWER"],
                "power": true,
                "brightness": 200,
                "temperature": 2700,
                "color": { "red": 255, "green": 128, "blue": 0 }
            })
        );
    }

    #[test]
    fn test_hardware_node_omits_light_state() {
        let device = Device::decode(&record([0; 8], 0x40, true, false, "Bridge")).unwrap();
        let value = device.details().to_json().unwrap();
        assert_eq!(value["capabilities"], json!(["HARDWARE"]));
        assert!(value.get("power").is_none());
        assert!(value.get("brightness").is_none());
        assert!(value.get("temperature").is_none());
        assert!(value.get("color").is_none());
    }
}
