use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use serial_device::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use serial_device::discovery::{available_devices, find_device};
use serial_device::port::{Line, SerialPort};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-device",
    version,
    about = "Inspect and configure serial devices.",
    long_about = "Reads and changes the line parameters and modem signals of a serial device. \
                  When DEVICE is omitted the device is found through the configured discovery rules."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial devices the system reports
    List,
    /// Print modem parameters and signals as JSON
    Show {
        /// Device path or alias, e.g. `/dev/ttyUSB0` or `COM3`
        device: Option<String>,
    },
    /// Change modem parameters and print the result
    Set {
        device: Option<String>,
        #[arg(long)]
        baud: Option<i64>,
        #[arg(long)]
        data_bits: Option<i64>,
        #[arg(long)]
        stop_bits: Option<i64>,
        /// 0 none, 1 even, 2 odd, 3 mark, 4 space
        #[arg(long)]
        parity: Option<i64>,
        /// 0 none, 1 hardware, 2 software, 3 both
        #[arg(long)]
        flow_control: Option<i64>,
        /// Milliseconds; -1 blocks, 0 returns immediately
        #[arg(long, allow_negative_numbers = true)]
        read_timeout: Option<i64>,
    },
    /// Drive the DTR and RTS output lines
    Signal {
        device: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
        dtr: Option<u8>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=1))]
        rts: Option<u8>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    init_tracing(&loader.config().logging);
    if let Some(path) = &loader.config_path {
        debug!(path = %path.display(), "configuration loaded");
    }
    let config = loader.into_config();

    match cli.command {
        Command::List => list(),
        Command::Show { device } => {
            let device = resolve_device(&config, device)?;
            let mut port = SerialPort::open_with_params(&device, &config.serial.defaults)?;
            print_json(&describe(&mut port)?)
        }
        Command::Set {
            device,
            baud,
            data_bits,
            stop_bits,
            parity,
            flow_control,
            read_timeout,
        } => {
            let device = resolve_device(&config, device)?;
            let mut changes = Map::new();
            let requested = [
                ("baud", baud),
                ("data_bits", data_bits),
                ("stop_bits", stop_bits),
                ("parity", parity),
                ("flow_control", flow_control),
                ("read_timeout", read_timeout),
            ];
            for (key, value) in requested {
                if let Some(value) = value {
                    changes.insert(key.to_string(), json!(value));
                }
            }

            let mut port = SerialPort::open_with_params(&device, &config.serial.defaults)?;
            port.set_modem_params_map(&changes)?;
            info!(port = %device, changed = changes.len(), "modem parameters updated");
            print_json(&describe(&mut port)?)
        }
        Command::Signal { device, dtr, rts } => {
            let device = resolve_device(&config, device)?;
            let mut port = SerialPort::open_with_params(&device, &config.serial.defaults)?;
            if let Some(level) = dtr {
                port.set_line(Line::Dtr, level == 1)?;
            }
            if let Some(level) = rts {
                port.set_line(Line::Rts, level == 1)?;
            }
            print_json(&Value::Object(port.signals()?.to_map()))
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn resolve_device(config: &Config, device: Option<String>) -> CliResult<String> {
    match device {
        Some(name) => Ok(config.serial.resolve_port(&name)),
        None => find_device(&config.discovery).ok_or_else(|| "could not find a serial device".into()),
    }
}

fn describe(port: &mut SerialPort) -> CliResult<Value> {
    let capabilities = port.capabilities();
    Ok(json!({
        "device": port.name(),
        "modem_params": port.modem_params_map()?,
        "signals": port.signals()?.to_map(),
        "readable_outputs": {
            "dtr": capabilities.read_dtr,
            "rts": capabilities.read_rts,
        },
    }))
}

fn list() -> CliResult<()> {
    let devices = available_devices()?;
    if devices.is_empty() {
        println!("No serial devices found.");
        return Ok(());
    }
    for device in devices {
        match (device.vid, device.pid) {
            (Some(vid), Some(pid)) => println!(
                "{}\t{}\t{:04x}:{:04x}\t{}",
                device.port_name,
                device.transport,
                vid,
                pid,
                device.product.as_deref().unwrap_or("")
            ),
            _ => println!("{}\t{}", device.port_name, device.transport),
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
