//! This module contains the value types shared between the driver and the UI state.

use strum_macros::{Display, EnumIter};

/// The highest voltage a Korad KA3005-class supply accepts.
pub const MAX_VOLTAGE: f32 = 31.0;
/// The highest current limit a Korad KA3005-class supply accepts.
pub const MAX_CURRENT: f32 = 5.1;

/// The two regulated quantities of the supply.
#[derive(Debug, Display, EnumIter, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Quantity {
    #[strum(to_string = "voltage")]
    Voltage,
    #[strum(to_string = "current")]
    Current,
}

impl Quantity {
    /// SI unit symbol.
    pub const fn unit(&self) -> &'static str {
        match self {
            Quantity::Voltage => "V",
            Quantity::Current => "A",
        }
    }

    /// Number of decimals the supply accepts and reports.
    pub const fn decimals(&self) -> usize {
        match self {
            Quantity::Voltage => 2,
            Quantity::Current => 3,
        }
    }

    /// Number of fine dial steps per whole unit. 10mV for voltage, 1mA for current.
    pub const fn fine_steps(&self) -> u32 {
        match self {
            Quantity::Voltage => 100,
            Quantity::Current => 1000,
        }
    }

    /// Format a value at the precision used on the wire and on the displays.
    pub fn format(&self, value: f32) -> String {
        format!("{:.*}", self.decimals(), value)
    }
}

/// Device range for both set-points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    pub max_voltage: f32,
    pub max_current: f32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_voltage: MAX_VOLTAGE,
            max_current: MAX_CURRENT,
        }
    }
}

impl Limits {
    pub const fn max(&self, quantity: Quantity) -> f32 {
        match quantity {
            Quantity::Voltage => self.max_voltage,
            Quantity::Current => self.max_current,
        }
    }

    /// Whether `value` lies within `0..=max` for `quantity`. NaN is never in range.
    pub fn contains(&self, quantity: Quantity, value: f32) -> bool {
        (0.0..=self.max(quantity)).contains(&value)
    }
}

/// Used to be less ambiguous about whether something is on or off.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum State {
    /// Disabled.
    #[default]
    Off,
    /// Enabled.
    On,
}

impl From<State> for bool {
    fn from(value: State) -> Self {
        match value {
            State::Off => false,
            State::On => true,
        }
    }
}

impl From<bool> for State {
    fn from(value: bool) -> Self {
        match value {
            true => State::On,
            false => State::Off,
        }
    }
}

/// Voltage and current the supply is commanded to regulate at.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Setpoints {
    pub voltage: f32,
    pub current: f32,
}

impl Setpoints {
    pub const fn get(&self, quantity: Quantity) -> f32 {
        match quantity {
            Quantity::Voltage => self.voltage,
            Quantity::Current => self.current,
        }
    }

    pub fn set(&mut self, quantity: Quantity, value: f32) {
        match quantity {
            Quantity::Voltage => self.voltage = value,
            Quantity::Current => self.current = value,
        }
    }
}

/// Voltage and current measured at the output terminals.
#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Readings {
    pub voltage: f32,
    pub current: f32,
}

/// Increment buttons next to the dials.
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
pub enum Nudge {
    Volts1,
    Volts0_1,
    Volts0_01,
    Amps1,
    Amps0_1,
    Amps0_01,
    Amps0_001,
}

impl Nudge {
    pub const fn quantity(&self) -> Quantity {
        match self {
            Nudge::Volts1 | Nudge::Volts0_1 | Nudge::Volts0_01 => Quantity::Voltage,
            _ => Quantity::Current,
        }
    }

    /// Size of the step in fine dial units (10mV or 1mA).
    pub const fn fine_units(&self) -> i32 {
        match self {
            Nudge::Volts1 => 100,
            Nudge::Volts0_1 => 10,
            Nudge::Volts0_01 => 1,
            Nudge::Amps1 => 1000,
            Nudge::Amps0_1 => 100,
            Nudge::Amps0_01 => 10,
            Nudge::Amps0_001 => 1,
        }
    }

    /// Size of the step in volts or amps.
    pub fn size(&self) -> f32 {
        self.fine_units() as f32 / self.quantity().fine_steps() as f32
    }
}

/// Which unit the current nudge buttons are labelled in.
#[derive(Debug, Default, Display, EnumIter, PartialEq, Eq, Clone, Copy)]
pub enum CurrentUnit {
    #[default]
    #[strum(to_string = "mA")]
    Milliamps,
    #[strum(to_string = "0.001A")]
    Amps,
}

impl CurrentUnit {
    /// Button label for a step, `increase` selecting the sign.
    pub fn nudge_label(&self, nudge: Nudge, increase: bool) -> String {
        let sign = if increase { '+' } else { '-' };
        let quantity = nudge.quantity();
        // The whole amp step keeps its amp label in both modes.
        if quantity == Quantity::Current && *self == CurrentUnit::Milliamps && nudge != Nudge::Amps1 {
            format!("{sign} {} mA", nudge.fine_units())
        } else {
            format!("{sign} {} {}", trim_zeros(nudge.size()), quantity.unit())
        }
    }

    /// Title of the fine current group box.
    pub const fn group_title(&self) -> &'static str {
        match self {
            CurrentUnit::Milliamps => "[mA]",
            CurrentUnit::Amps => "[A]",
        }
    }
}

fn trim_zeros(value: f32) -> String {
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
