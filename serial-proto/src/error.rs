//! Errors returned by this crate.

/// A wire byte whose check code did not match its payload. Non-fatal: the
/// receiver resets to `INIT` and discards any partially reassembled item
/// (spec: a corrupt byte never kills the session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("corrupt byte on wire: {byte:#04x}")]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CorruptByte {
    /// The offending wire byte.
    pub byte: u8,
}

/// Errors that can occur while sending a packet.
#[derive(Debug, thiserror::Error)]
pub enum SendError<E> {
    /// An item was outside the representable 32-bit signed range.
    #[error("item {value} is outside the 32-bit signed range")]
    RangeError {
        /// The out-of-range value the caller attempted to send.
        value: i64,
    },

    /// The underlying link failed. The session is no longer usable.
    #[error("link error: {0}")]
    Link(#[from] E),
}
