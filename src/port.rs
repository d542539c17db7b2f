//! Serial port discovery and connection.
//!
//! [`PortProvider`] is the seam between the controller and the operating system: [`SystemPorts`]
//! talks to real ports through the `serialport` crate, tests substitute scripted ports.

use std::time::Duration;

use serialport::{DataBits, Parity, SerialPort, StopBits};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{psu::KoradPsu, types::Limits};

/// Default baud rate of the Korad PSUs. The front panel offers no other setting.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Korad replies are slow and often unterminated, so reads wait this long.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);
/// Substring of the `*IDN?` reply identifying a Korad unit.
pub const DEFAULT_IDENTITY_MATCH: &str = "KORAD";

/// How to open and address the PSU.
///
/// Framing is always 8 data bits, no parity, 1 stop bit.
#[derive(Debug, Clone, PartialEq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub timeout: Duration,
    pub channel: u8,
    pub identity_match: String,
    pub limits: Limits,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            channel: 1,
            identity_match: DEFAULT_IDENTITY_MATCH.to_owned(),
            limits: Limits::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum PortError {
    #[error("Could not enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
    #[error("Could not open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("No power supply answering '{0}' found")]
    NotFound(String),
}

/// Source of serial ports.
pub trait PortProvider {
    type Port: embedded_io::Read + embedded_io::Write;

    /// Names of the ports currently present, e.g. `/dev/ttyACM0` or `COM3`.
    fn list(&mut self) -> Result<Vec<String>, PortError>;

    fn open(&mut self, name: &str, config: &SerialConfig) -> Result<Self::Port, PortError>;
}

/// The operating system's serial ports.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortProvider for SystemPorts {
    type Port = SystemPort;

    fn list(&mut self) -> Result<Vec<String>, PortError> {
        let ports = serialport::available_ports().map_err(PortError::Enumerate)?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&mut self, name: &str, config: &SerialConfig) -> Result<Self::Port, PortError> {
        let port = serialport::new(name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(config.timeout)
            .open()
            .map_err(|source| PortError::Open {
                port: name.to_owned(),
                source,
            })?;
        Ok(SystemPort(port))
    }
}

/// An open OS serial port exposed through [embedded_io].
pub struct SystemPort(Box<dyn SerialPort>);

#[derive(Debug, Error)]
#[error(transparent)]
pub struct IoError(#[from] std::io::Error);

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use std::io::ErrorKind as Std;
        match self.0.kind() {
            Std::NotFound => embedded_io::ErrorKind::NotFound,
            Std::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            Std::NotConnected => embedded_io::ErrorKind::NotConnected,
            Std::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            Std::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            Std::InvalidData => embedded_io::ErrorKind::InvalidData,
            Std::TimedOut => embedded_io::ErrorKind::TimedOut,
            Std::Interrupted => embedded_io::ErrorKind::Interrupted,
            Std::Unsupported => embedded_io::ErrorKind::Unsupported,
            Std::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for SystemPort {
    type Error = IoError;
}

impl embedded_io::Read for SystemPort {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for SystemPort {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

/// A PSU found by [`PortManager::autoconnect`].
pub struct Detected<S: embedded_io::Read + embedded_io::Write> {
    pub port: String,
    /// The full `*IDN?` reply.
    pub identity: String,
    pub psu: KoradPsu<S>,
}

/// Keeps the list of known ports and opens PSU connections on them.
pub struct PortManager<P: PortProvider> {
    provider: P,
    config: SerialConfig,
    ports: Vec<String>,
}

impl<P: PortProvider> PortManager<P> {
    pub fn new(provider: P, config: SerialConfig) -> Self {
        Self {
            provider,
            config,
            ports: Vec::new(),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Port names found by the last [`Self::refresh`].
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Re-enumerate the available ports.
    pub fn refresh(&mut self) -> Result<&[String], PortError> {
        self.ports = self.provider.list()?;
        debug!(ports = ?self.ports, "enumerated serial ports");
        Ok(&self.ports)
    }

    /// Open `name` and wrap it in a driver. No traffic is exchanged.
    pub fn connect(&mut self, name: &str) -> Result<KoradPsu<P::Port>, PortError> {
        let port = self.provider.open(name, &self.config)?;
        info!(port = name, baud = self.config.baud_rate, "opened serial port");
        Ok(self.wrap(port))
    }

    /// Probe every port with `*IDN?` and keep the first one whose reply contains the identity match.
    ///
    /// Ports that fail to open or answer are logged and skipped. Rejected ports are closed.
    pub fn autoconnect(&mut self) -> Result<Detected<P::Port>, PortError> {
        let names = self.refresh()?.to_vec();
        for name in names {
            let port = match self.provider.open(&name, &self.config) {
                Ok(port) => port,
                Err(e) => {
                    warn!(port = %name, error = %e, "autoconnect: could not open port");
                    continue;
                }
            };
            let mut psu = self.wrap(port);
            match psu.identify() {
                Ok(identity) if identity.contains(self.config.identity_match.as_str()) => {
                    info!(port = %name, identity = %identity, "autoconnect: found power supply");
                    return Ok(Detected {
                        port: name,
                        identity: identity.to_string(),
                        psu,
                    });
                }
                Ok(identity) => {
                    debug!(port = %name, identity = %identity, "autoconnect: not a match");
                }
                Err(e) => {
                    warn!(port = %name, error = %e, "autoconnect: no identification");
                }
            }
        }
        Err(PortError::NotFound(self.config.identity_match.clone()))
    }

    fn wrap(&self, port: P::Port) -> KoradPsu<P::Port> {
        KoradPsu::new(port, self.config.channel).with_limits(self.config.limits)
    }
}
