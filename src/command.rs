//! This module is used to define the ASCII commands understood by the Korad PSUs.
//!
//! Every command is a short line of text. Queries end in `?` and are answered with a
//! single line; set commands and output switching produce no reply.

use core::fmt::Write;

use crate::types::{Quantity, State};

/// Longest rendered command is `ISET1:5.100`, leave headroom for wider channels.
pub const COMMAND_CAPACITY: usize = 24;

/// Line terminator appended to every command on the wire.
pub const TERMINATOR: &str = "\n";

/// A rendered command, without terminator.
pub type CommandString = heapless::String<COMMAND_CAPACITY>;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Command {
    /// __Query__ - `*IDN?`, identification string, e.g. `KORAD KA3005P V5.8 SN:03379314`.
    Identify,
    /// __Query__ - `VSET<ch>?`, voltage set-point in volts.
    GetVoltage { channel: u8 },
    /// __Query__ - `ISET<ch>?`, current set-point in amps.
    GetCurrent { channel: u8 },
    /// __Query__ - `VOUT<ch>?`, measured output voltage in volts.
    ReadVoltage { channel: u8 },
    /// __Query__ - `IOUT<ch>?`, measured output current in amps.
    ReadCurrent { channel: u8 },
    /// __Set__ - `VSET<ch>:<volts>`, two decimals.
    SetVoltage { channel: u8, volts: f32 },
    /// __Set__ - `ISET<ch>:<amps>`, three decimals.
    SetCurrent { channel: u8, amps: f32 },
    /// __Set__ - `OUT1` / `OUT0`. Switches every output of the unit.
    Output(State),
}

impl Command {
    /// Query for the set-point of `quantity`.
    pub const fn get(quantity: Quantity, channel: u8) -> Self {
        match quantity {
            Quantity::Voltage => Command::GetVoltage { channel },
            Quantity::Current => Command::GetCurrent { channel },
        }
    }

    /// Query for the measured value of `quantity`.
    pub const fn read(quantity: Quantity, channel: u8) -> Self {
        match quantity {
            Quantity::Voltage => Command::ReadVoltage { channel },
            Quantity::Current => Command::ReadCurrent { channel },
        }
    }

    /// Command changing the set-point of `quantity`.
    pub const fn set(quantity: Quantity, channel: u8, value: f32) -> Self {
        match quantity {
            Quantity::Voltage => Command::SetVoltage {
                channel,
                volts: value,
            },
            Quantity::Current => Command::SetCurrent {
                channel,
                amps: value,
            },
        }
    }

    /// Whether the PSU answers this command with a line.
    pub const fn expects_reply(&self) -> bool {
        !matches!(
            self,
            Command::SetVoltage { .. } | Command::SetCurrent { .. } | Command::Output(_)
        )
    }

    /// Render the command text, without terminator. `None` if it does not fit in [`COMMAND_CAPACITY`].
    pub fn render(&self) -> Option<CommandString> {
        let mut out = CommandString::new();
        write!(out, "{self}").ok()?;
        Some(out)
    }
}

impl core::fmt::Display for Command {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Command::Identify => f.write_str("*IDN?"),
            Command::GetVoltage { channel } => write!(f, "VSET{channel}?"),
            Command::GetCurrent { channel } => write!(f, "ISET{channel}?"),
            Command::ReadVoltage { channel } => write!(f, "VOUT{channel}?"),
            Command::ReadCurrent { channel } => write!(f, "IOUT{channel}?"),
            Command::SetVoltage { channel, volts } => write!(f, "VSET{channel}:{volts:.2}"),
            Command::SetCurrent { channel, amps } => write!(f, "ISET{channel}:{amps:.3}"),
            Command::Output(State::On) => f.write_str("OUT1"),
            Command::Output(State::Off) => f.write_str("OUT0"),
        }
    }
}

/// Parse a numeric reply such as `12.34` or `05.000`.
///
/// Some firmware pads replies with NUL bytes, those are stripped with the whitespace.
pub fn parse_value(reply: &str) -> Result<f32, core::num::ParseFloatError> {
    reply
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .parse::<f32>()
}
