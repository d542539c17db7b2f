//! Our error types for the Korad PSUs.

use thiserror::Error;

use crate::types::Quantity;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Korad PSU communications.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Communication timeout")]
    Timeout,
    #[error("Invalid range")]
    InvalidRange,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Response did not fit in the receive buffer")]
    BufferError,
    #[error("Could not parse numeric response: {0}")]
    ParseError(#[from] core::num::ParseFloatError),
}

/// Rejection of a set-point typed in by the user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetpointError {
    #[error("'{input}' is not a number")]
    Parse { input: String },
    #[error("{value} {unit} is outside 0..={max} {unit}", unit = .quantity.unit())]
    OutOfRange {
        quantity: Quantity,
        value: f32,
        max: f32,
    },
}
