//! Command line options shared by the binaries. Nothing is persisted between runs.

use std::time::Duration;

use clap::Args;

use crate::{
    port::{DEFAULT_BAUD_RATE, DEFAULT_IDENTITY_MATCH, SerialConfig},
    types::{Limits, MAX_CURRENT, MAX_VOLTAGE},
};

#[derive(Debug, Clone, Args)]
pub struct ConnectionArgs {
    /// Serial port to open, e.g. /dev/ttyACM0 or COM3
    #[arg(short, long)]
    pub port: Option<String>,

    /// Probe every serial port for a power supply instead
    #[arg(short, long, conflicts_with = "port")]
    pub autoconnect: bool,

    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// How long to wait for a reply
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,

    /// Output channel, 2 only exists on dual output models
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub channel: u8,

    /// Substring of the *IDN? reply accepted by autoconnect
    #[arg(long, default_value = DEFAULT_IDENTITY_MATCH)]
    pub identity: String,

    /// Highest voltage set-point accepted, in volts
    #[arg(long, default_value_t = MAX_VOLTAGE, value_parser = parse_limit)]
    pub max_voltage: f32,

    /// Highest current set-point accepted, in amps
    #[arg(long, default_value_t = MAX_CURRENT, value_parser = parse_limit)]
    pub max_current: f32,

    /// Readout polling interval
    #[arg(long, default_value_t = 300)]
    pub poll_ms: u64,
}

/// No bench supply goes past this, in volts or amps.
const LIMIT_CEILING: f32 = 1000.0;

fn parse_limit(arg: &str) -> Result<f32, String> {
    let value: f32 = arg.parse().map_err(|e| format!("{e}"))?;
    if value > 0.0 && value <= LIMIT_CEILING {
        Ok(value)
    } else {
        Err(format!("must be above 0 and at most {LIMIT_CEILING}"))
    }
}

impl ConnectionArgs {
    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud,
            timeout: Duration::from_millis(self.timeout_ms),
            channel: self.channel,
            identity_match: self.identity.clone(),
            limits: Limits {
                max_voltage: self.max_voltage,
                max_current: self.max_current,
            },
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }
}
