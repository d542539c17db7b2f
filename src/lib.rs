//! This crate provides an interface for communicating with and controlling the Korad KA series of programmable
//! bench power supplies, plus the control panel built on it.
//!
//! Example PSU model numbers which this should work with:
//! * KA3005P
//! * KA3003P
//! * KA6003P
//! * KA3005D
//!
//! Rebadged units sharing the protocol (Tenma 72-2540, RND 320-KA3005P, Velleman PS3005D) answer `*IDN?`
//! with their own vendor string, see [`port::SerialConfig::identity_match`].
//!
//! The protocol is plain ASCII, one command per line, see [`command::Command`].
//!
//! The serial port used for PSU comms should be configured like so:
//! * Baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! [`psu::KoradPsu`] works over any [embedded_io] interface, [`port::SystemPorts`] provides real serial
//! ports and [`controller::Controller`] holds the control panel state on top of them.

pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod poller;
pub mod port;
pub mod psu;
pub mod series;
pub mod types;

#[cfg(feature = "gui")]
pub mod gui;

#[cfg(test)]
mod mock_serial;
