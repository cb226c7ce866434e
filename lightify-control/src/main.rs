use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use tokio::time::{interval, MissedTickBehavior};

use lightify_control_lib::control_interface::{
    GatewaySession, PowerState, SessionOptions, DEFAULT_PORT,
};
use lightify_control_lib::controller::{ConnectionController, ControllerConfig};
use lightify_control_lib::device::{CliColors, Device, DeviceDetails, RGB};
use lightify_control_lib::util::discovery::Discovery;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "lightify_control",
    about = "Controls lights behind a Lightify gateway",
    version = "0.1.0"
)]
pub struct Cli {
    /// Host name or IP address of the gateway
    #[clap(long)]
    pub host: String,

    /// TCP port of the gateway
    #[clap(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// How long to wait for a response in milliseconds
    #[clap(long = "timeout-ms", default_value_t = 30_000)]
    pub timeout_ms: u64,

    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` command.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Lists the devices known to the gateway
    #[clap(name = "discover")]
    Discover {
        /// Only list devices whose name contains this text
        #[clap(short, long)]
        filter: Option<String>,

        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Switches off every device that supports power control
    #[clap(name = "blackout")]
    Blackout,
    /// Subcommand for operations on a single device
    #[clap(name = "device-call")]
    DeviceCall {
        /// Name of the device as reported by the gateway
        #[clap(long)]
        name: String,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Keeps the device table refreshed and prints it after every refresh
    #[clap(name = "watch")]
    Watch {
        /// Seconds between refreshes
        #[clap(long, default_value_t = 30)]
        interval_secs: u64,

        /// Stop after this many refreshes, runs until interrupted otherwise
        #[clap(long)]
        cycles: Option<u32>,
    },
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Switches the device on or off.
    #[clap(name = "set-power")]
    SetPower {
        #[clap(value_enum)]
        state: PowerState,
    },
    /// Sets the brightness (0-255).
    #[clap(name = "set-brightness")]
    SetBrightness { brightness: i32 },
    /// Sets the white temperature in Kelvin (1500-6500).
    #[clap(name = "set-temperature")]
    SetTemperature { temperature: i32 },
    /// Sets the color by name or by components.
    #[clap(name = "set-color")]
    SetColor {
        /// The color to display by name
        #[clap(value_enum)]
        color: Option<CliColors>,

        /// Red component of the color (0-255)
        #[clap(short = 'r', long = "red", value_parser = clap::value_parser!(u8))]
        red: Option<u8>,

        /// Green component of the color (0-255)
        #[clap(short = 'g', long = "green", value_parser = clap::value_parser!(u8))]
        green: Option<u8>,

        /// Blue component of the color (0-255)
        #[clap(short = 'b', long = "blue", value_parser = clap::value_parser!(u8))]
        blue: Option<u8>,
    },
}

async fn handle_cli(cli: Cli) -> Result<()> {
    let options =
        SessionOptions::default().with_response_timeout(Duration::from_millis(cli.timeout_ms));

    match cli.command {
        Commands::Discover { filter, output } => {
            let mut session = GatewaySession::connect_with_options(&cli.host, cli.port, options).await?;
            let devices = session.discover_devices(filter.as_deref()).await?;
            session.disconnect();

            match output {
                OutputFormat::Plaintext => {
                    Discovery::pretty_print_devices(&devices);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&details_of(&devices))?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&details_of(&devices))?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::Blackout => {
            let mut session = GatewaySession::connect_with_options(&cli.host, cli.port, options).await?;
            let switched_off = session.blackout().await;
            session.disconnect();
            println!("Switched off {} device(s).", switched_off);
        }
        Commands::DeviceCall { name, action } => {
            let mut session = GatewaySession::connect_with_options(&cli.host, cli.port, options).await?;
            let device = find_device(&mut session, &name).await?;

            match action {
                DeviceAction::SetPower { state } => {
                    session.set_power(&device, state.into()).await?;
                    println!("{} switched {:?}", device, state);
                }
                DeviceAction::SetBrightness { brightness } => {
                    session.set_brightness(&device, brightness).await?;
                    println!("{} brightness set to {}", device, brightness);
                }
                DeviceAction::SetTemperature { temperature } => {
                    session.set_temperature(&device, temperature).await?;
                    println!("{} temperature set to {}K", device, temperature);
                }
                DeviceAction::SetColor {
                    color,
                    red,
                    green,
                    blue,
                } => {
                    let color_to_show: RGB = match (color, red, green, blue) {
                        (Some(color_name), None, None, None) => color_name.into(),
                        (None, Some(r), Some(g), Some(b)) => RGB::new(r, g, b),
                        _ => return Err(anyhow!("Invalid color specification")),
                    };

                    session.set_color(&device, color_to_show).await?;
                    println!("{} color set to {}", device, color_to_show);
                }
            }
            session.disconnect();
        }
        Commands::Watch {
            interval_secs,
            cycles,
        } => {
            let config = ControllerConfig::new(&cli.host)
                .with_port(cli.port)
                .with_refresh_interval(None)
                .with_session(options);
            let controller = ConnectionController::new(config);
            watch(&controller, Duration::from_secs(interval_secs.max(1)), cycles).await;
            controller.shutdown();
        }
    }

    Ok(())
}

async fn find_device(session: &mut GatewaySession, name: &str) -> Result<Device> {
    let devices = session
        .discover_devices(Some(name))
        .await
        .with_context(|| format!("looking up device {}", name))?;
    devices
        .into_iter()
        .find(|device| device.name() == name)
        .ok_or_else(|| anyhow!("No device named {:?} on gateway {}", name, session.address()))
}

fn details_of(devices: &[Device]) -> Vec<DeviceDetails> {
    devices.iter().map(Device::details).collect()
}

async fn watch(controller: &ConnectionController, period: Duration, cycles: Option<u32>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut completed = 0u32;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                return;
            }
        }

        if controller.refresh().await {
            let devices = controller.devices();
            let mut sorted: Vec<&Device> = devices.values().collect();
            sorted.sort_by(|a, b| a.name().cmp(b.name()));
            Discovery::pretty_print_devices(sorted);
        } else {
            println!("Refresh from {} failed, keeping last known devices.", controller.address());
        }

        completed += 1;
        if cycles.is_some_and(|limit| completed >= limit) {
            return;
        }
    }
}
