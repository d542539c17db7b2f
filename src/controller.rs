//! The control panel state.
//!
//! A [`Controller`] owns at most one PSU connection plus the in-memory set-points, readouts
//! and readout history. Every UI control (text entry, nudge buttons, dials) funnels into
//! [`Controller::set_setpoint`], which validates the value, stores it and pushes it to the
//! PSU when one is connected.
//!
//! Serial failures never propagate out of here. They are logged, kept as
//! [`Controller::last_error`], and the previous state is left untouched.

use std::{
    fmt,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
    command::parse_value,
    error::{Result, SetpointError},
    port::{Detected, PortManager, PortProvider, SerialConfig},
    psu::KoradPsu,
    series::{Sample, TimeSeries},
    types::{Limits, Nudge, Quantity, Readings, Setpoints, State},
};

/// Text of the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    NotConnected,
    Connected { port: String },
    Identified { port: String, identity: String },
    ConnectFailed { port: String },
    Disconnected,
    NotFound,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NotConnected => f.write_str("Status: Not connected"),
            Status::Connected { port } => write!(f, "Status: Connected to {port}"),
            Status::Identified { port, identity } => {
                write!(f, "Connected to port {port}, device: {identity}")
            }
            Status::ConnectFailed { port } => write!(f, "Status: Connection error with {port}"),
            Status::Disconnected => f.write_str("Status: Disconnected"),
            Status::NotFound => f.write_str("KORAD power supply not found"),
        }
    }
}

pub struct Controller<P: PortProvider> {
    ports: PortManager<P>,
    psu: Option<KoradPsu<P::Port>>,
    port_name: Option<String>,
    /// Port picked in the port list, not necessarily connected.
    selected_port: Option<String>,
    limits: Limits,
    setpoints: Setpoints,
    readings: Readings,
    /// Last output state successfully sent.
    output: State,
    series: TimeSeries,
    status: Status,
    last_error: Option<String>,
    started: Instant,
}

impl<P: PortProvider> Controller<P> {
    pub fn new(provider: P, config: SerialConfig) -> Self {
        let limits = config.limits;
        Self {
            ports: PortManager::new(provider, config),
            psu: None,
            port_name: None,
            selected_port: None,
            limits,
            setpoints: Setpoints::default(),
            readings: Readings::default(),
            output: State::Off,
            series: TimeSeries::new(),
            status: Status::NotConnected,
            last_error: None,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &SerialConfig {
        self.ports.config()
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn setpoints(&self) -> Setpoints {
        self.setpoints
    }

    pub fn readings(&self) -> Readings {
        self.readings
    }

    pub fn output(&self) -> State {
        self.output
    }

    pub fn series(&self) -> &TimeSeries {
        &self.series
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Message of the most recent failed operation, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.psu.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    pub fn psu(&self) -> Option<&KoradPsu<P::Port>> {
        self.psu.as_ref()
    }

    pub fn psu_mut(&mut self) -> Option<&mut KoradPsu<P::Port>> {
        self.psu.as_mut()
    }

    /// Time since the controller was created; the x axis of the trend plots.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn ports(&self) -> &[String] {
        self.ports.ports()
    }

    pub fn selected_port(&self) -> Option<&str> {
        self.selected_port.as_deref()
    }

    pub fn select_port(&mut self, name: impl Into<String>) {
        self.selected_port = Some(name.into());
    }

    /// Re-enumerate ports. Keeps the selection if the port is still present.
    pub fn refresh_ports(&mut self) {
        match self.ports.refresh() {
            Ok(ports) => {
                let keep = self
                    .selected_port
                    .as_ref()
                    .is_some_and(|name| ports.contains(name));
                if !keep {
                    self.selected_port = ports.first().cloned();
                }
            }
            Err(e) => self.record_failure("listing serial ports", &e),
        }
    }

    /// Connect to the port picked with [`Self::select_port`].
    pub fn connect_selected(&mut self) {
        match self.selected_port.clone() {
            Some(name) => self.connect(&name),
            None => warn!("connect requested with no port selected"),
        }
    }

    /// Open `port` and load the PSU's current set-points.
    pub fn connect(&mut self, port: &str) {
        self.drop_connection();
        match self.ports.connect(port) {
            Ok(psu) => {
                info!(port, "connected");
                self.attach(port.to_owned(), psu);
                self.status = Status::Connected {
                    port: port.to_owned(),
                };
                self.fetch_setpoints();
            }
            Err(e) => {
                self.record_failure("connecting", &e);
                self.status = Status::ConnectFailed {
                    port: port.to_owned(),
                };
            }
        }
    }

    /// Probe all ports for a PSU and connect to the first one found.
    pub fn autoconnect(&mut self) {
        self.drop_connection();
        match self.ports.autoconnect() {
            Ok(Detected {
                port,
                identity,
                psu,
            }) => {
                self.attach(port.clone(), psu);
                self.status = Status::Identified { port, identity };
                self.fetch_setpoints();
            }
            Err(e) => {
                self.record_failure("autoconnect", &e);
                self.status = Status::NotFound;
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.drop_connection() {
            info!("disconnected from power supply");
            self.status = Status::Disconnected;
        }
    }

    /// Load the PSU's set-points into the controller.
    pub fn fetch_setpoints(&mut self) {
        let Some(psu) = self.psu.as_mut() else {
            return;
        };
        match fetch_pair(psu, KoradPsu::get_setpoint) {
            Ok((voltage, current)) => {
                info!(voltage, current, "fetched set-points");
                self.setpoints = Setpoints { voltage, current };
            }
            Err(e) => self.record_failure("fetching set-points", &e),
        }
    }

    /// One poll tick: read voltage and current, update the readouts and append a sample.
    ///
    /// Returns whether new readings arrived.
    pub fn poll(&mut self) -> bool {
        let elapsed = self.elapsed();
        self.poll_at(elapsed)
    }

    /// [`Self::poll`] with an explicit timestamp for the sample.
    pub fn poll_at(&mut self, elapsed: Duration) -> bool {
        let Some(psu) = self.psu.as_mut() else {
            return false;
        };
        match fetch_pair(psu, KoradPsu::read_output) {
            Ok((voltage, current)) => {
                debug!(voltage, current, "readout");
                self.readings = Readings { voltage, current };
                self.series.push(Sample {
                    elapsed_s: elapsed.as_secs_f64(),
                    voltage,
                    current,
                });
                true
            }
            Err(e) => {
                self.record_failure("reading output", &e);
                false
            }
        }
    }

    pub fn set_voltage(&mut self, volts: f32) -> core::result::Result<(), SetpointError> {
        self.set_setpoint(Quantity::Voltage, volts)
    }

    pub fn set_current(&mut self, amps: f32) -> core::result::Result<(), SetpointError> {
        self.set_setpoint(Quantity::Current, amps)
    }

    /// Store a new set-point and send it to the PSU if connected.
    ///
    /// Out of range values are rejected and leave the state unchanged.
    pub fn set_setpoint(
        &mut self,
        quantity: Quantity,
        value: f32,
    ) -> core::result::Result<(), SetpointError> {
        if !self.limits.contains(quantity, value) {
            return Err(SetpointError::OutOfRange {
                quantity,
                value,
                max: self.limits.max(quantity),
            });
        }
        self.setpoints.set(quantity, value);
        self.push_setpoint(quantity);
        Ok(())
    }

    /// Apply a set-point typed in by the user. Either `.` or `,` is accepted as decimal separator.
    pub fn submit(&mut self, quantity: Quantity, input: &str) -> core::result::Result<(), SetpointError> {
        let result = parse_value(&input.replace(',', "."))
            .map_err(|_| SetpointError::Parse {
                input: input.to_owned(),
            })
            .and_then(|value| self.set_setpoint(quantity, value));
        if let Err(e) = &result {
            warn!(%quantity, error = %e, "rejected set-point entry");
            self.last_error = Some(e.to_string());
        }
        result
    }

    pub fn submit_voltage(&mut self, input: &str) -> core::result::Result<(), SetpointError> {
        self.submit(Quantity::Voltage, input)
    }

    pub fn submit_current(&mut self, input: &str) -> core::result::Result<(), SetpointError> {
        self.submit(Quantity::Current, input)
    }

    /// Step a set-point up or down. A step which would leave the device range does nothing.
    ///
    /// Returns whether the set-point changed.
    pub fn nudge(&mut self, nudge: Nudge, increase: bool) -> bool {
        let quantity = nudge.quantity();
        let steps = quantity.fine_steps() as i64;
        let fine = (self.setpoints.get(quantity) * steps as f32).round() as i64;
        let delta = i64::from(nudge.fine_units());
        let target = if increase { fine + delta } else { fine - delta };
        let value = target as f32 / steps as f32;
        self.set_setpoint(quantity, value).is_ok()
    }

    /// Dial positions for a set-point: whole units and fine steps (10mV or 1mA).
    pub fn dials(&self, quantity: Quantity) -> (u32, u32) {
        let steps = quantity.fine_steps();
        let fine = (self.setpoints.get(quantity) * steps as f32).round().max(0.0) as u32;
        (fine / steps, fine % steps)
    }

    pub fn voltage_dials(&self) -> (u32, u32) {
        self.dials(Quantity::Voltage)
    }

    pub fn current_dials(&self) -> (u32, u32) {
        self.dials(Quantity::Current)
    }

    /// Apply new dial positions. Combinations above the device maximum are rejected.
    pub fn set_dials(
        &mut self,
        quantity: Quantity,
        whole: u32,
        fine: u32,
    ) -> core::result::Result<(), SetpointError> {
        let steps = quantity.fine_steps();
        let value = whole
            .checked_mul(steps)
            .and_then(|units| units.checked_add(fine))
            .map_or(f32::INFINITY, |units| units as f32 / steps as f32);
        self.set_setpoint(quantity, value)
    }

    pub fn enable_output(&mut self) {
        self.set_output(State::On);
    }

    pub fn disable_output(&mut self) {
        self.set_output(State::Off);
    }

    pub fn set_output(&mut self, state: State) {
        let Some(psu) = self.psu.as_mut() else {
            return;
        };
        match psu.set_output_state(state) {
            Ok(()) => {
                info!(?state, "output switched");
                self.output = state;
            }
            Err(e) => self.record_failure("switching output", &e),
        }
    }

    fn push_setpoint(&mut self, quantity: Quantity) {
        let value = self.setpoints.get(quantity);
        let Some(psu) = self.psu.as_mut() else {
            return;
        };
        match psu.set_setpoint(quantity, value) {
            Ok(()) => info!(%quantity, value = %quantity.format(value), "set-point sent"),
            Err(e) => self.record_failure("sending set-point", &e),
        }
    }

    fn attach(&mut self, port: String, psu: KoradPsu<P::Port>) {
        self.selected_port = Some(port.clone());
        self.port_name = Some(port);
        self.psu = Some(psu);
    }

    /// Returns whether there was a connection to drop.
    fn drop_connection(&mut self) -> bool {
        self.port_name = None;
        self.psu.take().is_some()
    }

    fn record_failure(&mut self, action: &str, error: &dyn fmt::Display) {
        warn!(error = %error, "{action} failed");
        self.last_error = Some(format!("{action}: {error}"));
    }
}

/// Run the same query for voltage then current.
fn fetch_pair<S, F>(psu: &mut KoradPsu<S>, query: F) -> Result<(f32, f32), S::Error>
where
    S: embedded_io::Read + embedded_io::Write,
    F: Fn(&mut KoradPsu<S>, Quantity) -> Result<f32, S::Error>,
{
    let voltage = query(psu, Quantity::Voltage)?;
    let current = query(psu, Quantity::Current)?;
    Ok((voltage, current))
}
