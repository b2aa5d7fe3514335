//! Abstraction over the underlying byte-oriented link (spec §6). This crate
//! never talks to a real serial port directly — implement [`Link`] for
//! whatever stream type is at hand (a real port, a file, an in-memory
//! buffer for tests).

/// A full-duplex, non-blocking byte stream.
///
/// `serial-proto` is generic over `Link` the same way the reference decoder
/// this crate grew out of is generic over `std::io::Read`: callers plug in
/// whatever concrete stream they have, and the protocol logic never touches
/// hardware directly.
pub trait Link {
    /// The error type this link's I/O operations may fail with.
    type Error: std::error::Error + 'static;

    /// Best-effort write; blocks until the bytes are accepted by the
    /// underlying transport.
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Returns the next buffered byte, or `None` if none is currently
    /// available. Must not block.
    fn read_one(&mut self) -> Result<Option<u8>, Self::Error>;

    /// Returns how many bytes are currently available to read without
    /// blocking.
    fn bytes_available(&mut self) -> Result<usize, Self::Error>;
}

/// An in-memory [`Link`] backed by a pair of byte queues, standing in for a
/// real serial port in tests.
#[derive(Debug, Default)]
pub struct VecLink {
    inbound: std::collections::VecDeque<u8>,
    /// Bytes written via [`Link::write`], in order, for assertions in tests.
    pub outbound: Vec<u8>,
}

impl VecLink {
    /// Creates an empty link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes as if they had just arrived on the wire.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes);
    }
}

impl Link for VecLink {
    type Error = std::convert::Infallible;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn read_one(&mut self) -> Result<Option<u8>, Self::Error> {
        Ok(self.inbound.pop_front())
    }

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        Ok(self.inbound.len())
    }
}
