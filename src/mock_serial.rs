//! We use this mocking module in unit tests to emulate a serial port wired to a PSU.

use thiserror::Error;

use crate::port::{PortError, PortProvider, SerialConfig};

const CAPACITY: usize = 256;

/// Our mock type used to emulate a serial port.
#[derive(Debug, Default)]
pub struct MockSerial {
    /// Buffer to store data written to the mock serial port
    write_buffer: heapless::Vec<u8, CAPACITY>,
    /// Buffer containing pre-configured response data to be read
    read_buffer: heapless::Vec<u8, CAPACITY>,
    /// Current position in the read buffer
    read_position: usize,
    /// Largest number of bytes handed out per read call, 0 for unlimited
    chunk_size: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
    /// Flag to simulate read errors
    should_error_on_read: bool,
    /// Fail instead of timing out once the read data is used up, like an unplugged adapter
    should_error_when_drained: bool,
}

#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum MockSerialError {
    /// No data arrived within the port timeout
    #[error("simulated timeout")]
    Timeout,
    /// Simulated buffer overflow
    #[error("simulated buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("simulated error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::Timeout => embedded_io::ErrorKind::TimedOut,
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl embedded_io::Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_read {
            return Err(MockSerialError::SimulatedError);
        }

        if self.read_position >= self.read_buffer.len() {
            if self.should_error_when_drained {
                return Err(MockSerialError::SimulatedError);
            }
            return Err(MockSerialError::Timeout);
        }

        let available_bytes = self.read_buffer.len() - self.read_position;
        let mut bytes_to_read = core::cmp::min(buf.len(), available_bytes);
        if self.chunk_size > 0 {
            bytes_to_read = core::cmp::min(bytes_to_read, self.chunk_size);
        }

        buf[..bytes_to_read].copy_from_slice(
            &self.read_buffer[self.read_position..self.read_position + bytes_to_read],
        );
        self.read_position += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with empty buffers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a MockSerial which will answer with `data`.
    pub fn with_read_data(data: &[u8]) -> Self {
        let mut mock = Self::new();
        mock.push_read_data(data);
        mock
    }

    /// Set the data that will be returned when read() is called
    pub fn set_read_data(&mut self, data: &[u8]) -> Result<(), MockSerialError> {
        self.read_buffer.clear();
        self.read_position = 0;
        self.read_buffer
            .extend_from_slice(data)
            .map_err(|_| MockSerialError::BufferOverflow)
    }

    /// Queue more data after whatever is still unread.
    pub fn push_read_data(&mut self, data: &[u8]) {
        assert!(
            self.read_buffer.extend_from_slice(data).is_ok(),
            "mock read buffer full"
        );
    }

    /// Hand out at most `size` bytes per read call, like a slow UART.
    pub fn set_chunk_size(&mut self, size: usize) {
        self.chunk_size = size;
    }

    /// Get a reference to the data that was written to this mock serial port
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Written data split into lines, terminators removed.
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.write_buffer)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    /// Configure whether read operations should fail with an error
    pub fn set_read_error(&mut self, should_error: bool) {
        self.should_error_on_read = should_error;
    }

    /// Configure whether reads past the scripted data fail rather than time out
    pub fn set_error_when_drained(&mut self, should_error: bool) {
        self.should_error_when_drained = should_error;
    }
}

/// A scripted set of ports. Each port answers with its fixed reply data, whatever is written.
#[derive(Debug, Default)]
pub struct MockPorts {
    ports: Vec<(String, Option<Vec<u8>>)>,
    /// Names passed to `open`, in order.
    pub opened: Vec<String>,
}

impl MockPorts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a port which opens and will answer with `replies`.
    pub fn with_port(mut self, name: &str, replies: &[u8]) -> Self {
        self.ports.push((name.to_owned(), Some(replies.to_vec())));
        self
    }

    /// Add a port which is listed but fails to open, e.g. held by another program.
    pub fn with_broken_port(mut self, name: &str) -> Self {
        self.ports.push((name.to_owned(), None));
        self
    }
}

impl PortProvider for MockPorts {
    type Port = MockSerial;

    fn list(&mut self) -> Result<Vec<String>, PortError> {
        Ok(self.ports.iter().map(|(name, _)| name.clone()).collect())
    }

    fn open(&mut self, name: &str, _config: &SerialConfig) -> Result<Self::Port, PortError> {
        self.opened.push(name.to_owned());
        match self.ports.iter().find(|(port, _)| port == name) {
            Some((_, Some(replies))) => Ok(MockSerial::with_read_data(replies)),
            _ => Err(PortError::Open {
                port: name.to_owned(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Read, Write};

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write_all(b"VSET1?\n").unwrap();
        mock.write_all(b"ISET1?\n").unwrap();

        assert_eq!(mock.written_data(), b"VSET1?\nISET1?\n");
        assert_eq!(mock.written_lines(), vec!["VSET1?", "ISET1?"]);
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = vec![0u8; CAPACITY + 1];

        let result = mock.write(&large_data);
        assert_eq!(result.unwrap_err(), MockSerialError::BufferOverflow);
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_read_in_chunks() {
        let mut mock = MockSerial::with_read_data(b"12.34\n");
        mock.set_chunk_size(2);

        let mut buffer = [0u8; 16];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"12");
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b".3");
    }

    #[test]
    fn test_read_times_out_after_data_exhausted() {
        let mut mock = MockSerial::with_read_data(b"Hi");

        let mut buffer = [0u8; 10];
        assert_eq!(mock.read(&mut buffer).unwrap(), 2);

        let err = mock.read(&mut buffer).unwrap_err();
        assert_eq!(err, MockSerialError::Timeout);
        assert_eq!(err.kind(), embedded_io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_push_read_data_appends() {
        let mut mock = MockSerial::new();
        mock.set_read_data(b"first\n").unwrap();
        mock.push_read_data(b"second\n");

        let mut buffer = [0u8; 32];
        let n = mock.read(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"first\nsecond\n");
    }

    #[test]
    fn test_error_flags_toggle() {
        let mut mock = MockSerial::with_read_data(b"data");

        mock.set_write_error(true);
        assert!(mock.write(b"test").is_err());
        assert!(mock.flush().is_err());
        mock.set_write_error(false);
        assert!(mock.write(b"test").is_ok());

        let mut buffer = [0u8; 10];
        mock.set_read_error(true);
        assert_eq!(
            mock.read(&mut buffer).unwrap_err(),
            MockSerialError::SimulatedError
        );
        mock.set_read_error(false);
        assert!(mock.read(&mut buffer).is_ok());
    }
}
