use std::io;
use std::time::Duration;

use clap::ValueEnum;
use log::{debug, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};

use crate::device::{Capability, Device, RGB};
use crate::error::{Error, Result};
use crate::util::discovery::Discovery;

pub mod command;

/// Port the gateway listens on.
pub const DEFAULT_PORT: u16 = 4000;

const READ_CHUNK: usize = 4096;

/// Power state requested from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PowerState {
    On,
    Off,
}

impl From<PowerState> for bool {
    fn from(state: PowerState) -> Self {
        state == PowerState::On
    }
}

/// Timing of the request/response exchange with the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// How long to wait for the TCP handshake.
    pub connect_timeout: Duration,
    /// How long to wait for the first response bytes after a command.
    pub response_timeout: Duration,
    /// How often to check the socket for response bytes.
    pub poll_interval: Duration,
    /// Quiet period after which a response is considered complete.
    pub settle_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(25),
            settle_interval: Duration::from_millis(25),
        }
    }
}

impl SessionOptions {
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_settle_interval(mut self, settle_interval: Duration) -> Self {
        self.settle_interval = settle_interval;
        self
    }
}

/**
One TCP connection to a Lightify gateway.

Commands are answered in order, so a session only ever has one command in
flight. A session that timed out or hit a socket error is marked unhealthy,
since a late answer would be read as the response to the next command.
 */
#[derive(Debug)]
pub struct GatewaySession {
    host: String,
    port: u16,
    stream: Option<TcpStream>,
    options: SessionOptions,
    healthy: bool,
}

impl GatewaySession {
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        GatewaySession::connect_with_options(host, port, SessionOptions::default()).await
    }

    pub async fn connect_with_options(host: &str, port: u16, options: SessionOptions) -> Result<Self> {
        let address = format!("{}:{}", host, port);
        debug!("Connecting to gateway {}", address);

        let stream = timeout(options.connect_timeout, TcpStream::connect((host, port)))
            .await
            .unwrap_or_else(|_| {
                Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "connection attempt timed out",
                ))
            })
            .map_err(|source| connect_failed(&address, source))?;
        // Commands are tiny, do not let Nagle hold them back.
        stream
            .set_nodelay(true)
            .map_err(|source| connect_failed(&address, source))?;
        info!("Connected to gateway {}", address);

        Ok(GatewaySession {
            host: host.to_string(),
            port,
            stream: Some(stream),
            options,
            healthy: true,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether the connection can be trusted for another command.
    pub fn is_healthy(&self) -> bool {
        self.healthy && self.stream.is_some()
    }

    /**
    Sends a raw command and returns the gateway's answer.

    Fails with [`Error::Timeout`] if nothing arrives within the response
    timeout. The answer is everything received until the socket stays quiet
    for the settle interval.
     */
    pub async fn send_command(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        let options = self.options;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::NotConnected("session is disconnected".to_string()))?;

        debug!("Sending command {}", hex::encode(command));
        let result = exchange(stream, command, &options).await;
        match &result {
            Ok(response) => debug!("Received {} byte response", response.len()),
            Err(err) if err.is_connection_fault() => {
                warn!("Gateway session {} is unusable: {}", self.address(), err);
                self.healthy = false;
            }
            Err(_) => {}
        }
        result
    }

    /// Lists the devices known to the gateway, optionally only those whose
    /// name contains `contains`.
    pub async fn discover_devices(&mut self, contains: Option<&str>) -> Result<Vec<Device>> {
        let response = self.send_command(&command::discovery()).await?;
        Discovery::decode_discovery_response(&response, contains)
    }

    pub async fn set_power(&mut self, device: &Device, powered_on: bool) -> Result<()> {
        let command = command::set_power(device, powered_on)?;
        self.send_device_command(device, &command).await
    }

    /// Sets the brightness, range is 0..=255.
    pub async fn set_brightness(&mut self, device: &Device, brightness: i32) -> Result<()> {
        let command = command::set_brightness(device, brightness)?;
        self.send_device_command(device, &command).await
    }

    /// Sets the color temperature in Kelvin, range is 1500..=6500.
    pub async fn set_temperature(&mut self, device: &Device, temperature: i32) -> Result<()> {
        let command = command::set_temperature(device, temperature)?;
        self.send_device_command(device, &command).await
    }

    pub async fn set_color(&mut self, device: &Device, color: RGB) -> Result<()> {
        let command = command::set_color(device, color)?;
        self.send_device_command(device, &command).await
    }

    // The gateway's answer to a device command is not interpreted.
    async fn send_device_command(&mut self, device: &Device, command: &[u8]) -> Result<()> {
        let response = self.send_command(command).await?;
        debug!("{} answered {}", device, hex::encode(&response));
        Ok(())
    }

    /**
    Turns off every online light that is currently on.

    Failures are logged and skipped. Returns how many devices were switched
    off.
     */
    pub async fn blackout(&mut self) -> usize {
        let devices = match self.discover_devices(None).await {
            Ok(devices) => devices,
            Err(err) => {
                warn!("Blackout failed to list devices: {}", err);
                return 0;
            }
        };

        let mut switched_off = 0;
        for device in devices
            .iter()
            .filter(|d| d.is_online() && d.supports(Capability::Power) && d.is_powered_on())
        {
            match self.set_power(device, false).await {
                Ok(()) => switched_off += 1,
                Err(err) => warn!("Blackout failed to switch off {}: {}", device, err),
            }
        }
        switched_off
    }

    /// Closes the connection. Calling it again does nothing.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("Disconnecting from gateway {}", self.address());
            drop(stream);
        }
    }
}

/// Any failure while setting up a session, whichever step raised it.
fn connect_failed(address: &str, source: io::Error) -> Error {
    Error::ConnectFailed {
        address: address.to_string(),
        source,
    }
}

async fn exchange(stream: &mut TcpStream, command: &[u8], options: &SessionOptions) -> Result<Vec<u8>> {
    stream.write_all(command).await?;
    stream.flush().await?;

    let deadline = Instant::now() + options.response_timeout;
    let mut response = Vec::new();
    let mut buffer = [0u8; READ_CHUNK];

    // Wait for the first bytes, checking once per poll interval.
    while response.is_empty() {
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout(options.response_timeout));
        }
        let wait = options.poll_interval.min(deadline - now);
        if timeout(wait, stream.readable()).await.is_err() {
            continue;
        }
        match stream.try_read(&mut buffer) {
            Ok(0) => {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "gateway closed the connection",
                )))
            }
            Ok(n) => response.extend_from_slice(&buffer[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err.into()),
        }
    }

    // The response has no length prefix, keep reading while more keeps arriving.
    while Instant::now() < deadline {
        if timeout(options.settle_interval, stream.readable()).await.is_err() {
            break;
        }
        match stream.try_read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => response.extend_from_slice(&buffer[..n]),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(response)
}
