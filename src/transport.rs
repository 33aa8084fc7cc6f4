use std::time::{Duration, Instant};

use embedded_io::{Error as _, ErrorKind};
use fugit::MillisDurationU32;

use crate::{
    error::{Error, Result},
    frame::{self, FrameError, HEADER_LEN},
};

/// The unit can take a while to answer, but never longer than this.
pub const DEFAULT_RESPONSE_TIMEOUT: MillisDurationU32 = MillisDurationU32::from_ticks(300);

/// Request/response exchange with an X10A unit over any interface which implements
/// [embedded_io::Read] & [embedded_io::Write].
///
/// Each call is one complete exchange; nothing is carried over between calls, and a failed
/// exchange is not retried. `L` bounds the size of a response frame.
pub struct X10aTransport<S: embedded_io::Read + embedded_io::Write, const L: usize = 128> {
    interface: S,
    timeout: MillisDurationU32,
}

impl<S: embedded_io::Read + embedded_io::Write, const L: usize> X10aTransport<S, L> {
    pub fn new(interface: S) -> Self {
        Self {
            interface,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> MillisDurationU32 {
        self.timeout
    }

    /// Read the raw bytes of one register.
    pub fn send(
        &mut self,
        registry_id: u8,
        offset: u16,
        data_size: u8,
    ) -> Result<heapless::Vec<u8, L>, S::Error> {
        let payload = self.query_registry(registry_id)?;
        let raw = frame::register_slice(&payload, offset as usize, data_size as usize)?;
        let mut bytes = heapless::Vec::new();
        bytes
            .extend_from_slice(raw)
            .map_err(|_| FrameError::BufferFull)?;
        Ok(bytes)
    }

    /// Query a whole registry and return its validated payload.
    ///
    /// A well-formed frame for another registry is a late answer to an earlier query; it is
    /// dropped and reading goes on until the deadline.
    pub fn query_registry(&mut self, registry_id: u8) -> Result<heapless::Vec<u8, L>, S::Error> {
        let request = frame::encode_request(registry_id);
        self.interface
            .write_all(&request)
            .map_err(Error::SerialError)?;
        self.interface.flush().map_err(Error::SerialError)?;

        let deadline = Instant::now() + Duration::from_millis(self.timeout.to_millis().into());
        loop {
            let response = self.read_response(deadline)?;
            match frame::parse_response(&response, registry_id) {
                Ok(payload) => {
                    tracing::debug!(
                        registry_id,
                        payload_len = payload.len(),
                        "registry query answered"
                    );
                    let mut out = heapless::Vec::new();
                    out.extend_from_slice(payload)
                        .map_err(|_| FrameError::BufferFull)?;
                    return Ok(out);
                }
                Err(FrameError::RegistryMismatch { found, .. }) => {
                    tracing::debug!(registry_id, stale = found, "dropping late response");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Read one response frame, never consuming bytes past its announced end.
    fn read_response(&mut self, deadline: Instant) -> Result<heapless::Vec<u8, L>, S::Error> {
        let mut buff: heapless::Vec<u8, L> = heapless::Vec::new();
        // Until the length byte arrives we only know the header length.
        let mut expected = HEADER_LEN;
        let mut temp_buf = [0u8; 16];

        while buff.len() < expected {
            if Instant::now() >= deadline {
                tracing::debug!(received = buff.len(), expected, "response timed out");
                return Err(Error::Timeout);
            }

            let wanted = (expected - buff.len()).min(temp_buf.len());
            match self.interface.read(&mut temp_buf[..wanted]) {
                Ok(bytes_read) => {
                    buff.extend_from_slice(&temp_buf[..bytes_read])
                        .map_err(|_| FrameError::BufferFull)?;
                }
                // Nothing available yet, keep waiting until the deadline.
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::Other) => {}
                Err(e) => return Err(Error::SerialError(e)),
            }

            if frame::is_nak(&buff) {
                return Err(Error::Nak);
            }
            if expected == HEADER_LEN && buff.len() >= HEADER_LEN {
                expected = frame::expected_len(&buff)?;
                if expected > L {
                    return Err(FrameError::BufferFull.into());
                }
            }
        }
        Ok(buff)
    }

    /// Give the interface back.
    pub fn release(self) -> S {
        self.interface
    }
}
