//! # Lightify Control Library
//!
//! `lightify-control-lib` is a Rust library for controlling lights attached to an
//! OSRAM Lightify gateway. It speaks the gateway's binary TCP protocol, allowing
//! users to list devices, read their state, and switch power, brightness, color
//! temperature and color.
//!
//! ## Features
//!
//! - Device discovery through the gateway, with optional name filtering
//! - Decoding of device state records and their capabilities
//! - Power, brightness, temperature and color commands, validated before sending
//! - A connection controller with a bounded session pool and a device cache
//!   refreshed in the background
//!
//! ## Example
//!
//! Here is a simple example of how to list the devices a gateway knows about:
//!
//! ```no_run
//! use lightify_control_lib::control_interface::GatewaySession;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = GatewaySession::connect("192.168.1.50", 4000).await?;
//!
//!     for device in session.discover_devices(None).await? {
//!         println!("Found device: {}", device);
//!     }
//!
//!     session.disconnect();
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with OSRAM, LEDVANCE or their affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `control_interface` module holds the gateway session: one TCP connection
// over which commands are sent and answers awaited, plus the encoders for
// those commands.
//
// Example usage:
//
// ```
// use lightify_control_lib::control_interface::GatewaySession;
// use lightify_control_lib::device::RGB;
//
// #[tokio::main]
// async fn main() {
//     let mut session = GatewaySession::connect("192.168.1.50", 4000).await.unwrap();
//     let devices = session.discover_devices(Some("Kitchen")).await.unwrap();
//     session.set_color(&devices[0], RGB::new(255, 0, 0)).await.unwrap();
// }
// ```
pub mod control_interface;

// The `controller` module pools gateway sessions and keeps a snapshot of the
// gateway's devices, refreshed periodically in the background.
//
// Example usage:
//
// ```
// use lightify_control_lib::controller::{ConnectionController, ControllerConfig};
//
// #[tokio::main]
// async fn main() {
//     let controller = ConnectionController::new(ControllerConfig::new("192.168.1.50"));
//     controller.refresh().await;
//     for (name, device) in controller.devices().iter() {
//         println!("{}: {}", name, device.mac());
//     }
//     controller.shutdown();
// }
// ```
pub mod controller;

// The `device` module decodes the device records reported by the gateway and
// derives what each device can do.
pub mod device;

pub mod error;

// The `util` module contains the discovery response decoder, MAC address
// helpers and the connection pool used by the controller.
pub mod util;

pub use error::{Error, Result};
