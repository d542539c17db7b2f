use crate::{
    command::{Command, TERMINATOR, parse_value},
    error::Result,
    types::{Limits, Quantity, State},
};
use embedded_io::Error;
use tracing::debug;

/// You can create a KoradPsu using any interface which implements [embedded_io::Read] & [embedded_io::Write].
///
/// For its methods, we generally use the nomenclature that "set" means to write a configuration and "get" means to read
/// back a configuration value. Whereas "read" means to get a measured value.
///
/// `L` bounds the length of a single reply line.
pub struct KoradPsu<S: embedded_io::Read + embedded_io::Write, const L: usize = 64> {
    interface: S,
    /// Output channel addressed by set-point commands. Single output units only have 1.
    channel: u8,
    limits: Limits,
    /// Bytes received but not yet consumed as a line.
    rx: heapless::Vec<u8, L>,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> KoradPsu<S, L> {
    /// Create a new KoradPsu instance with the given interface and output channel.
    pub fn new(interface: S, channel: u8) -> Self {
        Self {
            interface,
            channel,
            limits: Limits::default(),
            rx: heapless::Vec::new(),
        }
    }

    /// Replace the default 31V / 5.1A range used to validate set-points.
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Return the identification string, e.g. `KORAD KA3005P V5.8 SN:03379314`.
    pub fn identify(&mut self) -> Result<heapless::String<L>, S::Error> {
        self.query(Command::Identify)
    }

    /// Return the voltage set-point in volts.
    pub fn get_voltage_setpoint(&mut self) -> Result<f32, S::Error> {
        self.get_setpoint(Quantity::Voltage)
    }

    /// Return the current limit set-point in amps.
    pub fn get_current_setpoint(&mut self) -> Result<f32, S::Error> {
        self.get_setpoint(Quantity::Current)
    }

    pub fn get_setpoint(&mut self, quantity: Quantity) -> Result<f32, S::Error> {
        self.query_value(Command::get(quantity, self.channel))
    }

    /// Return the measured output voltage in volts.
    pub fn read_output_voltage(&mut self) -> Result<f32, S::Error> {
        self.read_output(Quantity::Voltage)
    }

    /// Return the measured output current in amps.
    pub fn read_output_current(&mut self) -> Result<f32, S::Error> {
        self.read_output(Quantity::Current)
    }

    pub fn read_output(&mut self, quantity: Quantity) -> Result<f32, S::Error> {
        self.query_value(Command::read(quantity, self.channel))
    }

    /// Set the output target voltage in volts.
    pub fn set_voltage(&mut self, volts: f32) -> Result<(), S::Error> {
        self.set_setpoint(Quantity::Voltage, volts)
    }

    /// Set the output current limit in amps.
    pub fn set_current(&mut self, amps: f32) -> Result<(), S::Error> {
        self.set_setpoint(Quantity::Current, amps)
    }

    /// Values outside `0..=max` are refused without touching the interface.
    pub fn set_setpoint(&mut self, quantity: Quantity, value: f32) -> Result<(), S::Error> {
        if !self.limits.contains(quantity, value) {
            return Err(crate::error::Error::InvalidRange);
        }
        self.send(Command::set(quantity, self.channel, value))
    }

    /// Enable/disable the output.
    pub fn set_output_state(&mut self, state: impl Into<State>) -> Result<(), S::Error> {
        self.send(Command::Output(state.into()))
    }

    /// Write a command followed by the line terminator.
    pub fn send(&mut self, command: Command) -> Result<(), S::Error> {
        let text = command.render().ok_or(crate::error::Error::BufferError)?;
        debug!(command = %text, "sending");
        self.interface
            .write_all(text.as_bytes())
            .map_err(crate::error::Error::SerialError)?;
        self.interface
            .write_all(TERMINATOR.as_bytes())
            .map_err(crate::error::Error::SerialError)?;
        self.interface
            .flush()
            .map_err(crate::error::Error::SerialError)?;
        Ok(())
    }

    /// Send a query and return its reply line.
    pub fn query(&mut self, command: Command) -> Result<heapless::String<L>, S::Error> {
        self.send(command)?;
        let reply = self.read_line()?;
        debug!(command = %command, reply = %reply, "received");
        Ok(reply)
    }

    /// Send a query whose reply is a single number.
    pub fn query_value(&mut self, command: Command) -> Result<f32, S::Error> {
        let reply = self.query(command)?;
        Ok(parse_value(&reply)?)
    }

    /// Read one reply line.
    ///
    /// Many Korad firmwares do not terminate their replies, so a read timeout after some
    /// bytes have arrived also ends the line. Anything after a newline is kept for the next call.
    pub fn read_line(&mut self) -> Result<heapless::String<L>, S::Error> {
        let mut temp_buf = [0u8; 16];
        loop {
            if let Some(end) = self.rx.iter().position(|&b| b == b'\n') {
                return self.take_line(end, end + 1);
            }
            match self.interface.read(&mut temp_buf) {
                Ok(0) => {
                    if self.rx.is_empty() {
                        return Err(crate::error::Error::Timeout);
                    }
                    let len = self.rx.len();
                    return self.take_line(len, len);
                }
                Ok(bytes_read) => {
                    if self
                        .rx
                        .extend_from_slice(&temp_buf[..bytes_read])
                        .is_err()
                    {
                        self.rx.clear();
                        return Err(crate::error::Error::BufferError);
                    }
                }
                Err(e) if matches!(e.kind(), embedded_io::ErrorKind::TimedOut) => {
                    if self.rx.is_empty() {
                        return Err(crate::error::Error::Timeout);
                    }
                    let len = self.rx.len();
                    return self.take_line(len, len);
                }
                Err(e) => {
                    // A partial number is not a reading.
                    self.rx.clear();
                    return Err(crate::error::Error::SerialError(e));
                }
            }
        }
    }

    /// Split `rx[..end]` off as a line and drop the first `consumed` bytes.
    fn take_line(&mut self, end: usize, consumed: usize) -> Result<heapless::String<L>, S::Error> {
        let line = core::str::from_utf8(&self.rx[..end])
            .ok()
            .and_then(|text| heapless::String::try_from(text.trim_end_matches('\r')).ok());

        self.rx.rotate_left(consumed);
        self.rx.truncate(self.rx.len() - consumed);

        line.ok_or(crate::error::Error::InvalidResponse)
    }

    pub fn interface(&self) -> &S {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut S {
        &mut self.interface
    }

    /// Release the underlying interface.
    pub fn into_inner(self) -> S {
        self.interface
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mock_serial::{MockSerial, MockSerialError};
    use crate::types::MAX_CURRENT;

    fn psu_with_reply(reply: &[u8]) -> KoradPsu<MockSerial> {
        KoradPsu::new(MockSerial::with_read_data(reply), 1)
    }

    #[test]
    fn test_identify() {
        let mut psu = psu_with_reply(b"KORAD KA3005P V5.8 SN:03379314\n");

        let idn = psu.identify().unwrap();
        assert_eq!(idn.as_str(), "KORAD KA3005P V5.8 SN:03379314");
        assert_eq!(psu.interface.written_data(), b"*IDN?\n");
    }

    #[test]
    fn test_identify_without_terminator() {
        // The reply ends when the port times out.
        let mut psu = psu_with_reply(b"KORADKA3005PV2.0");

        let idn = psu.identify().unwrap();
        assert_eq!(idn.as_str(), "KORADKA3005PV2.0");
    }

    #[test]
    fn test_read_setpoints() {
        let mut psu = psu_with_reply(b"12.00\n1.500\n");

        assert_eq!(psu.get_voltage_setpoint().unwrap(), 12.0);
        assert_eq!(psu.get_current_setpoint().unwrap(), 1.5);
        assert_eq!(psu.interface.written_lines(), vec!["VSET1?", "ISET1?"]);
    }

    #[test]
    fn test_read_outputs_in_small_chunks() {
        let mut psu = psu_with_reply(b"11.98\r\n0.734\r\n");
        psu.interface_mut().set_chunk_size(3);

        assert_eq!(psu.read_output_voltage().unwrap(), 11.98);
        assert_eq!(psu.read_output_current().unwrap(), 0.734);
        assert_eq!(psu.interface.written_lines(), vec!["VOUT1?", "IOUT1?"]);
    }

    #[test]
    fn test_write_output_voltage() {
        let mut psu = KoradPsu::<_, 64>::new(MockSerial::new(), 1);

        psu.set_voltage(24.0).unwrap();
        assert_eq!(psu.interface.written_data(), b"VSET1:24.00\n");

        psu.interface_mut().clear_written_data();
        psu.set_current(0.1).unwrap();
        assert_eq!(psu.interface.written_data(), b"ISET1:0.100\n");
    }

    #[test]
    fn test_setpoint_out_of_range_is_not_sent() {
        let mut psu = KoradPsu::<_, 64>::new(MockSerial::new(), 1);

        assert!(matches!(psu.set_voltage(31.5), Err(Error::InvalidRange)));
        assert!(matches!(psu.set_current(-0.001), Err(Error::InvalidRange)));
        assert!(matches!(psu.set_current(5.2), Err(Error::InvalidRange)));
        assert!(psu.interface.written_data().is_empty());

        psu.set_voltage(31.0).unwrap();
        psu.set_current(5.1).unwrap();
        assert_eq!(psu.interface.written_lines(), vec!["VSET1:31.00", "ISET1:5.100"]);
    }

    #[test]
    fn test_custom_limits() {
        let limits = Limits {
            max_voltage: 30.0,
            max_current: 3.0,
        };
        let mut psu = KoradPsu::<_, 64>::new(MockSerial::new(), 1).with_limits(limits);

        assert!(matches!(psu.set_voltage(30.5), Err(Error::InvalidRange)));
        assert!(matches!(psu.set_current(3.1), Err(Error::InvalidRange)));
        assert_eq!(psu.limits(), limits);
    }

    #[test]
    fn test_output_state() {
        let mut psu = KoradPsu::<_, 64>::new(MockSerial::new(), 1);

        psu.set_output_state(true).unwrap();
        psu.set_output_state(State::Off).unwrap();
        assert_eq!(psu.interface.written_lines(), vec!["OUT1", "OUT0"]);
    }

    #[test]
    fn test_second_channel() {
        let mut psu = KoradPsu::<_, 64>::new(MockSerial::with_read_data(b"3.30\n"), 2);

        assert_eq!(psu.read_output_voltage().unwrap(), 3.3);
        psu.set_current(0.5).unwrap();
        assert_eq!(psu.interface.written_lines(), vec!["VOUT2?", "ISET2:0.500"]);
    }

    #[test]
    fn test_no_reply_times_out() {
        let mut psu = psu_with_reply(b"");

        assert!(matches!(psu.read_output_voltage(), Err(Error::Timeout)));
    }

    #[test]
    fn test_garbage_reply_is_parse_error() {
        let mut psu = psu_with_reply(b"ERR\n");

        assert!(matches!(psu.read_output_current(), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_invalid_utf8_reply() {
        let mut psu = psu_with_reply(b"\xff\xfe\n1.000\n");

        assert!(matches!(psu.identify(), Err(Error::InvalidResponse)));
        // The bad line is consumed, the next reply is intact.
        assert_eq!(psu.read_output_current().unwrap(), 1.0);
    }

    #[test]
    fn test_serial_errors_propagate() {
        let mut psu = psu_with_reply(b"1.00\n");
        psu.interface_mut().set_read_error(true);
        assert!(matches!(
            psu.read_output_voltage(),
            Err(Error::SerialError(MockSerialError::SimulatedError))
        ));

        psu.interface_mut().set_write_error(true);
        assert!(matches!(
            psu.set_output_state(State::On),
            Err(Error::SerialError(MockSerialError::SimulatedError))
        ));
    }

    #[test]
    fn test_port_failure_mid_reply_is_not_a_reading() {
        let mut psu = psu_with_reply(b"12");
        psu.interface_mut().set_error_when_drained(true);

        assert!(matches!(
            psu.read_output_voltage(),
            Err(Error::SerialError(MockSerialError::SimulatedError))
        ));

        // The partial bytes are dropped with the failed reply.
        psu.interface_mut().set_error_when_drained(false);
        psu.interface_mut().push_read_data(b"0.250\n");
        assert_eq!(psu.read_output_current().unwrap(), 0.25);
    }

    #[test]
    fn test_unrenderable_setpoint_is_not_sent() {
        let limits = Limits {
            max_voltage: f32::MAX,
            max_current: MAX_CURRENT,
        };
        let mut psu = KoradPsu::<_, 64>::new(MockSerial::new(), 1).with_limits(limits);

        assert!(matches!(psu.set_voltage(1e30), Err(Error::BufferError)));
        assert!(psu.interface.written_data().is_empty());
    }

    #[test]
    fn test_overlong_reply_is_buffer_error() {
        let mut psu: KoradPsu<MockSerial, 8> =
            KoradPsu::new(MockSerial::with_read_data(b"0123456789ABCDEF\n1.5\n"), 1);

        assert!(matches!(psu.identify(), Err(Error::BufferError)));
    }
}
