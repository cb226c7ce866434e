use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::mac::{mac_from_wire, MAC_LEN};

pub mod capability;
pub mod details;

pub use capability::{capabilities_for, Capabilities, Capability};
pub use details::DeviceDetails;

/// Size of one device record in a discovery response.
pub const RECORD_LEN: usize = 50;

const MAC_OFFSET: usize = 2;
const CAPABILITY_OFFSET: usize = 10;
const FIRMWARE_OFFSET: usize = 11;
const FIRMWARE_LEN: usize = 4;
const STATUS_OFFSET: usize = 15;
const POWER_OFFSET: usize = 18;
const BRIGHTNESS_OFFSET: usize = 19;
const TEMPERATURE_OFFSET: usize = 20;
const COLOR_OFFSET: usize = 22;
const WHITE_OFFSET: usize = 25;
const NAME_OFFSET: usize = 26;
const NAME_LEN: usize = 16;

/// Status byte value of a device the gateway can reach.
const STATUS_ONLINE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RGB {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGB {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        RGB { red, green, blue }
    }
}

impl From<(u8, u8, u8)> for RGB {
    fn from((red, green, blue): (u8, u8, u8)) -> Self {
        RGB { red, green, blue }
    }
}

impl fmt::Display for RGB {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

/// Named colors accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliColors {
    Red,
    Green,
    Blue,
    Yellow,
    Orange,
    Purple,
    Cyan,
    Magenta,
    Pink,
    WarmWhite,
    White,
}

impl From<CliColors> for RGB {
    fn from(color: CliColors) -> Self {
        let (red, green, blue) = match color {
            CliColors::Red => (255, 0, 0),
            CliColors::Green => (0, 255, 0),
            CliColors::Blue => (0, 0, 255),
            CliColors::Yellow => (255, 255, 0),
            CliColors::Orange => (255, 165, 0),
            CliColors::Purple => (128, 0, 128),
            CliColors::Cyan => (0, 255, 255),
            CliColors::Magenta => (255, 0, 255),
            CliColors::Pink => (255, 192, 203),
            CliColors::WarmWhite => (255, 180, 107),
            CliColors::White => (255, 255, 255),
        };
        RGB { red, green, blue }
    }
}

/**
A light or hardware node attached to the gateway, as last reported by it.

Values are decoded whether or not the device advertises the matching
capability. Check [`Device::supports`] before acting on brightness,
temperature or color.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    mac: String,
    capabilities: Capabilities,
    firmware_version: String,
    online: bool,
    powered_on: bool,
    brightness: u8,
    temperature: u16,
    color: RGB,
    white: u8,
    name: String,
}

impl Device {
    /// Decodes one 50 byte device record. Bytes past the record are ignored.
    pub fn decode(record: &[u8]) -> Result<Self> {
        if record.len() < RECORD_LEN {
            return Err(Error::MalformedRecord(format!(
                "device record is {} bytes, expected {}",
                record.len(),
                RECORD_LEN
            )));
        }

        let mac = mac_from_wire(&record[MAC_OFFSET..MAC_OFFSET + MAC_LEN]);
        let capabilities = Capabilities::from_code(record[CAPABILITY_OFFSET]);
        let firmware_version = record[FIRMWARE_OFFSET..FIRMWARE_OFFSET + FIRMWARE_LEN]
            .iter()
            .map(|digit| digit.to_string())
            .collect();
        let temperature = u16::from_le_bytes([
            record[TEMPERATURE_OFFSET],
            record[TEMPERATURE_OFFSET + 1],
        ]);
        let color = RGB::new(
            record[COLOR_OFFSET],
            record[COLOR_OFFSET + 1],
            record[COLOR_OFFSET + 2],
        );
        let name = String::from_utf8_lossy(&record[NAME_OFFSET..NAME_OFFSET + NAME_LEN])
            .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string();

        Ok(Device {
            mac,
            capabilities,
            firmware_version,
            online: record[STATUS_OFFSET] == STATUS_ONLINE,
            powered_on: record[POWER_OFFSET] == 0x01,
            brightness: record[BRIGHTNESS_OFFSET],
            temperature,
            color,
            white: record[WHITE_OFFSET],
            name,
        })
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn is_powered_on(&self) -> bool {
        self.powered_on
    }

    /// Brightness in 0..=255.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn temperature(&self) -> u16 {
        self.temperature
    }

    pub fn color(&self) -> RGB {
        self.color
    }

    /// White channel in 0..=255.
    pub fn white(&self) -> u8 {
        self.white
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn details(&self) -> DeviceDetails {
        DeviceDetails::from(self)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mac)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a device record the way the gateway lays it out.
    pub(crate) fn record(
        wire_mac: [u8; 8],
        capability_code: u8,
        online: bool,
        powered_on: bool,
        name: &str,
    ) -> Vec<u8> {
        let mut record = vec![0u8; RECORD_LEN];
        record[0] = 0x01;
        record[MAC_OFFSET..MAC_OFFSET + MAC_LEN].copy_from_slice(&wire_mac);
        record[CAPABILITY_OFFSET] = capability_code;
        record[FIRMWARE_OFFSET..FIRMWARE_OFFSET + FIRMWARE_LEN].copy_from_slice(&[1, 2, 0x1A, 7]);
        record[STATUS_OFFSET] = if online { STATUS_ONLINE } else { 0x00 };
        record[POWER_OFFSET] = powered_on as u8;
        record[BRIGHTNESS_OFFSET] = 200;
        record[TEMPERATURE_OFFSET..TEMPERATURE_OFFSET + 2].copy_from_slice(&2700u16.to_le_bytes());
        record[COLOR_OFFSET..COLOR_OFFSET + 3].copy_from_slice(&[255, 128, 0]);
        record[WHITE_OFFSET] = 17;
        let name = name.as_bytes();
        record[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);
        record
    }

    #[test]
    fn test_decode_fields() {
        let wire_mac = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];
        let device = Device::decode(&record(wire_mac, 0x0A, true, true, "Kitchen 1")).unwrap();

        assert_eq!(device.mac(), "8877665544332211");
        assert_eq!(device.firmware_version(), "12267");
        assert!(device.is_online());
        assert!(device.is_powered_on());
        assert_eq!(device.brightness(), 200);
        assert_eq!(device.temperature(), 2700);
        assert_eq!(device.color(), RGB::new(255, 128, 0));
        assert_eq!(device.white(), 17);
        assert_eq!(device.name(), "Kitchen 1");
        assert!(device.supports(Capability::Color));
        assert!(!device.supports(Capability::Hardware));
    }

    #[test]
    fn test_decode_temperature_is_little_endian() {
        let mut data = record([0; 8], 0x02, true, false, "Hall");
        data[TEMPERATURE_OFFSET] = 0x34;
        data[TEMPERATURE_OFFSET + 1] = 0x12;
        let device = Device::decode(&data).unwrap();
        assert_eq!(device.temperature(), 0x1234);
    }

    #[test]
    fn test_decode_keeps_unsupported_values() {
        let device = Device::decode(&record([0; 8], 0x04, false, false, "Plug")).unwrap();
        assert!(!device.supports(Capability::Brightness));
        assert_eq!(device.brightness(), 200);
        assert!(!device.is_online());
    }

    #[test]
    fn test_decode_trims_name_padding() {
        let mut data = record([0; 8], 0x03, true, true, "Desk  ");
        data[NAME_OFFSET + 6] = b' ';
        let device = Device::decode(&data).unwrap();
        assert_eq!(device.name(), "Desk");
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(RGB::from(CliColors::Orange), RGB::new(255, 165, 0));
        assert_eq!(RGB::from(CliColors::WarmWhite).to_string(), "rgb(255, 180, 107)");
    }

    #[test]
    fn test_decode_short_record() {
        let data = record([0; 8], 0x03, true, true, "Desk");
        let result = Device::decode(&data[..RECORD_LEN - 1]);
        assert!(matches!(result, Err(Error::MalformedRecord(_))));
    }
}
