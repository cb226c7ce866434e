use std::cmp::max;

use log::debug;

use crate::device::{Capability, Device, RECORD_LEN};
use crate::error::{Error, Result};

/// Offset of the device count in a discovery response.
const DEVICE_COUNT_OFFSET: usize = 9;
/// Offset of the first device record in a discovery response.
const FIRST_RECORD_OFFSET: usize = 11;

pub struct Discovery;

impl Discovery {
    /**
    Decodes the gateway's answer to a discovery command.

    Devices are returned in the order the gateway listed them. When `contains`
    is given and not empty, only devices whose name contains it are kept.
     */
    pub fn decode_discovery_response(data: &[u8], contains: Option<&str>) -> Result<Vec<Device>> {
        let count = *data.get(DEVICE_COUNT_OFFSET).ok_or_else(|| {
            Error::MalformedRecord(format!(
                "discovery response is {} bytes, no device count",
                data.len()
            ))
        })? as usize;
        debug!("Gateway reports {} device(s)", count);

        let filter = contains.filter(|pattern| !pattern.is_empty());
        let mut devices = Vec::with_capacity(count);
        for index in 0..count {
            let start = FIRST_RECORD_OFFSET + RECORD_LEN * index;
            let record = data.get(start..start + RECORD_LEN).ok_or_else(|| {
                Error::MalformedRecord(format!(
                    "discovery response is {} bytes, record {} of {} is incomplete",
                    data.len(),
                    index + 1,
                    count
                ))
            })?;
            let device = Device::decode(record)?;
            match filter {
                Some(pattern) if !device.name().contains(pattern) => continue,
                _ => devices.push(device),
            }
        }
        Ok(devices)
    }

    pub fn pretty_print_devices<'a, I>(devices: I)
    where
        I: IntoIterator<Item = &'a Device>,
    {
        let devices: Vec<&Device> = devices.into_iter().collect();
        let max_name_width = devices
            .iter()
            .map(|d| max(d.name().len(), 16))
            .max()
            .unwrap_or(16);
        let max_mac_width = devices.iter().map(|d| d.mac().len()).max().unwrap_or(16);

        println!(
            "{:<name_width$} {:<mac_width$} {:<9} {:<7} {:<6} {:<11} {:<12} {:<18}",
            "Name",
            "MAC Address",
            "Firmware",
            "Online",
            "Power",
            "Brightness",
            "Temperature",
            "Color",
            name_width = max_name_width + 2,
            mac_width = max_mac_width + 2,
        );
        println!(
            "{:<name_width$} {:<mac_width$} {:<9} {:<7} {:<6} {:<11} {:<12} {:<18}",
            "-".repeat(max_name_width),
            "-".repeat(max_mac_width),
            "-".repeat(8),
            "-".repeat(6),
            "-".repeat(5),
            "-".repeat(10),
            "-".repeat(11),
            "-".repeat(17),
            name_width = max_name_width + 2,
            mac_width = max_mac_width + 2,
        );

        // Blank cells for state the device does not report
        let gated = |device: &Device, capability: Capability, value: String| {
            if device.supports(capability) {
                value
            } else {
                String::new()
            }
        };

        for device in devices {
            println!(
                "{:<name_width$} {:<mac_width$} {:<9} {:<7} {:<6} {:<11} {:<12} {:<18}",
                device.name(),
                device.mac(),
                device.firmware_version(),
                device.is_online(),
                gated(device, Capability::Power, device.is_powered_on().to_string()),
                gated(device, Capability::Brightness, device.brightness().to_string()),
                gated(device, Capability::Temperature, device.temperature().to_string()),
                gated(device, Capability::Color, device.color().to_string()),
                name_width = max_name_width + 2,
                mac_width = max_mac_width + 2,
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::device::tests::record;

    /// Wraps device records in a discovery response envelope.
    pub(crate) fn discovery_response(records: &[Vec<u8>]) -> Vec<u8> {
        let mut response = vec![0u8; FIRST_RECORD_OFFSET];
        response[0] = 0x0B;
        response[3] = 0x13;
        response[DEVICE_COUNT_OFFSET] = records.len() as u8;
        for record in records {
            response.extend_from_slice(record);
        }
        response
    }

    fn two_devices() -> Vec<u8> {
        discovery_response(&[
            record([1, 0, 0, 0, 0, 0, 0, 0], 0x0A, true, true, "Kitchen Ceiling"),
            record([2, 0, 0, 0, 0, 0, 0, 0], 0x04, true, false, "Porch"),
        ])
    }

    #[test]
    fn test_decode_in_wire_order() {
        let devices = Discovery::decode_discovery_response(&two_devices(), None).unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name(), "Kitchen Ceiling");
        assert_eq!(devices[0].mac(), "0000000000000001");
        assert_eq!(devices[1].name(), "Porch");
    }

    #[test]
    fn test_decode_with_name_filter() {
        let devices = Discovery::decode_discovery_response(&two_devices(), Some("Kitchen")).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name(), "Kitchen Ceiling");

        let none = Discovery::decode_discovery_response(&two_devices(), Some("kitchen")).unwrap();
        assert!(none.is_empty());

        let all = Discovery::decode_discovery_response(&two_devices(), Some("")).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_decode_empty_gateway() {
        let devices = Discovery::decode_discovery_response(&discovery_response(&[]), None).unwrap();
        assert!(devices.is_empty());
    }

    #[test]
    fn test_decode_truncated_response() {
        let mut data = two_devices();
        data.truncate(data.len() - 1);
        assert!(matches!(
            Discovery::decode_discovery_response(&data, None),
            Err(Error::MalformedRecord(_))
        ));
        assert!(matches!(
            Discovery::decode_discovery_response(&data[..5], None),
            Err(Error::MalformedRecord(_))
        ));
    }
}
