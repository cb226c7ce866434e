//! Binary command frames understood by the gateway.
//!
//! Every frame starts with a four byte header (frame length minus two, zero,
//! zero, opcode) followed by four zero bytes. Device commands carry the target
//! MAC in wire order at offset 8.

use std::ops::RangeInclusive;

use bytes::{BufMut, BytesMut};

use crate::device::{Capability, Device, RGB};
use crate::error::{Error, Result};
use crate::util::mac::mac_to_wire;

/// Fade time sent with brightness, temperature and color changes.
pub const TRANSITION_TIME: u8 = 0x05;

pub const BRIGHTNESS_RANGE: RangeInclusive<i32> = 0..=255;

/// Accepted color temperature in Kelvin.
///
/// Lights are documented for 2200K..6500K, the gateway is sent anything in
/// this wider bound.
pub const TEMPERATURE_RANGE: RangeInclusive<i32> = 1500..=6500;

const DISCOVERY_HEADER: [u8; 4] = [0x0B, 0x00, 0x00, 0x13];
const POWER_HEADER: [u8; 4] = [0x0F, 0x00, 0x00, 0x32];
const BRIGHTNESS_HEADER: [u8; 4] = [0x11, 0x00, 0x00, 0x31];
const TEMPERATURE_HEADER: [u8; 4] = [0x12, 0x00, 0x00, 0x33];
const COLOR_HEADER: [u8; 4] = [0x14, 0x00, 0x00, 0x36];

pub const DISCOVERY_LEN: usize = 13;
pub const POWER_LEN: usize = 17;
pub const BRIGHTNESS_LEN: usize = 19;
pub const TEMPERATURE_LEN: usize = 20;
pub const COLOR_LEN: usize = 22;

/// Builds the "list all devices" request.
pub fn discovery() -> Vec<u8> {
    let mut packet = BytesMut::with_capacity(DISCOVERY_LEN);
    packet.extend_from_slice(&DISCOVERY_HEADER);
    packet.put_u32(0);
    packet.put_u8(0x01);
    packet.put_u32(0);
    packet.to_vec()
}

pub fn set_power(device: &Device, powered_on: bool) -> Result<Vec<u8>> {
    require(device, Capability::Power)?;
    let mut packet = device_frame(POWER_HEADER, device, POWER_LEN)?;
    packet.put_u8(powered_on as u8);
    Ok(finish(packet, POWER_LEN))
}

pub fn set_brightness(device: &Device, brightness: i32) -> Result<Vec<u8>> {
    require(device, Capability::Brightness)?;
    let brightness = in_range("brightness", brightness, BRIGHTNESS_RANGE)?;
    let mut packet = device_frame(BRIGHTNESS_HEADER, device, BRIGHTNESS_LEN)?;
    packet.put_u8(brightness as u8);
    packet.put_u8(TRANSITION_TIME);
    Ok(finish(packet, BRIGHTNESS_LEN))
}

pub fn set_temperature(device: &Device, temperature: i32) -> Result<Vec<u8>> {
    require(device, Capability::Temperature)?;
    let temperature = in_range("temperature", temperature, TEMPERATURE_RANGE)?;
    let mut packet = device_frame(TEMPERATURE_HEADER, device, TEMPERATURE_LEN)?;
    packet.put_u16_le(temperature as u16);
    packet.put_u8(TRANSITION_TIME);
    Ok(finish(packet, TEMPERATURE_LEN))
}

pub fn set_color(device: &Device, color: RGB) -> Result<Vec<u8>> {
    require(device, Capability::Color)?;
    let mut packet = device_frame(COLOR_HEADER, device, COLOR_LEN)?;
    packet.put_u8(color.red);
    packet.put_u8(color.green);
    packet.put_u8(color.blue);
    packet.put_u8(0x00);
    packet.put_u8(TRANSITION_TIME);
    Ok(finish(packet, COLOR_LEN))
}

fn require(device: &Device, capability: Capability) -> Result<()> {
    if device.supports(capability) {
        Ok(())
    } else {
        Err(Error::UnsupportedCapability {
            device: device.name().to_string(),
            capability,
        })
    }
}

fn in_range(parameter: &'static str, value: i32, range: RangeInclusive<i32>) -> Result<i32> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(Error::OutOfRange {
            parameter,
            value: value.into(),
            min: (*range.start()).into(),
            max: (*range.end()).into(),
        })
    }
}

/// Header, four zero bytes and the target MAC.
fn device_frame(header: [u8; 4], device: &Device, len: usize) -> Result<BytesMut> {
    let mac = mac_to_wire(device.mac())?;
    let mut packet = BytesMut::with_capacity(len);
    packet.extend_from_slice(&header);
    packet.put_u32(0);
    packet.extend_from_slice(&mac);
    Ok(packet)
}

/// Zero pads a frame to its fixed length.
fn finish(mut packet: BytesMut, len: usize) -> Vec<u8> {
    packet.resize(len, 0x00);
    packet.to_vec()
}
