//! CLI application for controlling LIFX lights.
//!
//! This example demonstrates discovery, event watching, and basic
//! commands from the command line.
//!
//! Run with: cargo run --example lifx_cli -- --help

use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand};
use lifx_lan_rs::{Client, Color, DeviceAddress, Event, Power};

#[derive(Parser)]
#[command(name = "lifx-cli")]
#[command(about = "Control LIFX smart lights from the command line", long_about = None)]
struct Cli {
    /// Device address as hex (e.g. d073d5123456); omit to target every device
    #[arg(short, long, global = true, value_parser = parse_address)]
    address: Option<DeviceAddress>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover all LIFX devices on the network
    Discover {
        /// How long to collect replies, in seconds
        #[arg(short, long, default_value = "3")]
        timeout: u64,
    },

    /// Watch state-change events as replies stream in
    Watch,

    /// Turn the target on
    On,

    /// Turn the target off
    Off,

    /// Set HSBK color in protocol units (0-65535 each, kelvin 2500-9000)
    Color {
        hue: u16,
        saturation: u16,
        brightness: u16,
        #[arg(value_parser = clap::value_parser!(u16).range(2500..=9000))]
        kelvin: u16,
        /// Transition time in milliseconds
        #[arg(short, long, default_value = "1024")]
        duration: u32,
    },

    /// Rename the target device
    Label { label: String },

    /// Print session diagnostics
    Diagnostics,
}

fn parse_address(raw: &str) -> Result<DeviceAddress, String> {
    u64::from_str_radix(raw.trim_start_matches("0x"), 16)
        .map(DeviceAddress::new)
        .map_err(|e| format!("invalid address {raw:?}: {e}"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = Client::open()?;

    match cli.command {
        Commands::Discover { timeout } => {
            println!("Discovering LIFX devices on the network (timeout: {timeout}s)...");
            client.discover();
            thread::sleep(Duration::from_secs(timeout));

            let devices = client.devices();
            if devices.is_empty() {
                println!("No devices found on the network.");
            } else {
                println!("\nFound {} device(s):", devices.len());
                for device in devices {
                    let ip = device
                        .ip_address()
                        .map_or_else(|| String::from("?"), |ip| ip.to_string());
                    println!("  {}  {:15}  {}", device.address(), ip, device.label());
                }
            }
        }

        Commands::Watch => {
            let events = client.subscribe();
            client.discover();
            println!("Watching (ctrl-c to stop)...");
            while let Ok(event) = events.recv() {
                match event {
                    Event::DeviceDiscovered { address } => println!("discovered {address}"),
                    Event::LabelChanged { address, label } => {
                        println!("{address} label -> {label}");
                    }
                    Event::PowerChanged { address, power } => {
                        println!("{address} power -> {power:?}");
                    }
                    Event::ColorChanged { address, color } => println!(
                        "{address} color -> {}% brightness, {}K",
                        color.brightness_percent(),
                        color.kelvin
                    ),
                    other => println!("{other:?}"),
                }
            }
        }

        Commands::On => power(&client, cli.address, Power::On),
        Commands::Off => power(&client, cli.address, Power::Off),

        Commands::Color {
            hue,
            saturation,
            brightness,
            kelvin,
            duration,
        } => {
            let color = Color::new(hue, saturation, brightness, kelvin);
            with_devices(&client, cli.address, |device| {
                if let Some(light) = device.as_light() {
                    light.set_color(color, duration);
                }
            });
        }

        Commands::Label { label } => {
            with_devices(&client, cli.address, |device| device.set_label(&label));
        }

        Commands::Diagnostics => {
            client.discover();
            thread::sleep(Duration::from_secs(2));
            println!("{}", serde_json::to_string_pretty(&client.diagnostics())?);
        }
    }

    Ok(())
}

fn power(client: &Client, address: Option<DeviceAddress>, power: Power) {
    match address {
        Some(_) => with_devices(client, address, |device| device.set_power(power, 1024)),
        None => {
            client.discover();
            thread::sleep(Duration::from_secs(2));
            client.power_all(power);
        }
    }
}

fn with_devices<F: Fn(&lifx_lan_rs::Device)>(
    client: &Client,
    address: Option<DeviceAddress>,
    apply: F,
) {
    client.discover();
    thread::sleep(Duration::from_secs(2));

    let devices = client.devices();
    let selected: Vec<_> = devices
        .iter()
        .filter(|device| address.is_none_or(|target| device.address() == target))
        .collect();

    if selected.is_empty() {
        eprintln!("No matching devices found.");
        return;
    }
    for device in selected {
        apply(device);
    }
}
