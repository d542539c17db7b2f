//! Headless access to a Korad PSU: one-shot queries, set-points, output switching and a readout monitor.

use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, bail, ensure};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::Select;
use korad_psu::{
    config::ConnectionArgs,
    controller::Controller,
    logging,
    poller::PollTimer,
    port::{PortManager, SystemPort, SystemPorts},
    psu::KoradPsu,
    types::{Quantity, State},
};

#[derive(Parser, Debug)]
#[command(version, about = "Command line control of Korad bench power supplies")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the serial ports on this machine
    List,
    /// Print the *IDN? reply
    Identify,
    /// Print set-points and measured output
    Status,
    /// Change the voltage and/or current set-point
    Set {
        /// Volts, 2 decimals are sent
        #[arg(short, long)]
        voltage: Option<f32>,
        /// Amps, 3 decimals are sent
        #[arg(short, long)]
        current: Option<f32>,
    },
    /// Switch the output on or off
    Output {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Print readouts every poll interval
    Monitor {
        /// Stop after this many samples
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for State {
    fn from(value: Switch) -> Self {
        match value {
            Switch::On => State::On,
            Switch::Off => State::Off,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_tracing();

    match cli.command {
        Commands::List => list(),
        Commands::Identify => {
            let mut psu = open_psu(&cli.connection)?;
            let identity = psu.identify().context("reading identification")?;
            println!("{identity}");
            Ok(())
        }
        Commands::Status => status(&mut open_psu(&cli.connection)?),
        Commands::Set { voltage, current } => {
            ensure!(
                voltage.is_some() || current.is_some(),
                "nothing to set, pass --voltage and/or --current"
            );
            let mut psu = open_psu(&cli.connection)?;
            if let Some(volts) = voltage {
                psu.set_voltage(volts)
                    .with_context(|| format!("setting voltage to {volts} V"))?;
            }
            if let Some(amps) = current {
                psu.set_current(amps)
                    .with_context(|| format!("setting current to {amps} A"))?;
            }
            status(&mut psu)
        }
        Commands::Output { state } => {
            let mut psu = open_psu(&cli.connection)?;
            psu.set_output_state(state).context("switching output")?;
            println!("Output {state:?}");
            Ok(())
        }
        Commands::Monitor { count } => monitor(&cli.connection, count),
    }
}

fn list() -> anyhow::Result<()> {
    let mut manager = PortManager::new(SystemPorts, Default::default());
    let ports = manager.refresh()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

fn choose_port(ports: &[String]) -> anyhow::Result<String> {
    if ports.is_empty() {
        bail!("no serial ports found");
    }
    Ok(Select::new("Select a serial port:", ports.to_vec()).prompt()?)
}

fn open_psu(args: &ConnectionArgs) -> anyhow::Result<KoradPsu<SystemPort>> {
    let mut manager = PortManager::new(SystemPorts, args.serial_config());
    if args.autoconnect {
        let detected = manager.autoconnect()?;
        println!("Connected to port {}, device: {}", detected.port, detected.identity);
        return Ok(detected.psu);
    }
    let port = match &args.port {
        Some(port) => port.clone(),
        None => choose_port(manager.refresh()?)?,
    };
    Ok(manager.connect(&port)?)
}

fn status(psu: &mut KoradPsu<SystemPort>) -> anyhow::Result<()> {
    for quantity in [Quantity::Voltage, Quantity::Current] {
        let setpoint = psu
            .get_setpoint(quantity)
            .with_context(|| format!("reading {quantity} set-point"))?;
        let output = psu
            .read_output(quantity)
            .with_context(|| format!("reading output {quantity}"))?;
        println!(
            "{quantity:<8} set {} {unit}  out {} {unit}",
            quantity.format(setpoint),
            quantity.format(output),
            unit = quantity.unit(),
        );
    }
    Ok(())
}

/// Poll through a [`Controller`] so failed reads are logged and skipped rather than fatal.
fn monitor(args: &ConnectionArgs, count: Option<usize>) -> anyhow::Result<()> {
    let mut controller = Controller::new(SystemPorts, args.serial_config());
    if args.autoconnect {
        controller.autoconnect();
    } else {
        controller.refresh_ports();
        let port = match &args.port {
            Some(port) => port.clone(),
            None => choose_port(controller.ports())?,
        };
        controller.connect(&port);
    }
    if !controller.is_connected() {
        bail!(
            "{} ({})",
            controller.status(),
            controller.last_error().unwrap_or("no details")
        );
    }
    println!("{}", controller.status());

    let mut timer = PollTimer::new(args.poll_interval());
    while count.is_none_or(|count| controller.series().len() < count) {
        let now = Instant::now();
        if !timer.tick(now) {
            thread::sleep(timer.remaining(now).max(Duration::from_millis(1)));
            continue;
        }
        if controller.poll()
            && let Some(sample) = controller.series().latest()
        {
            println!(
                "{:>9.1} s  {} V  {} A",
                sample.elapsed_s,
                Quantity::Voltage.format(sample.voltage),
                Quantity::Current.format(sample.current),
            );
        }
    }
    Ok(())
}
