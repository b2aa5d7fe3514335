//! A framed serial protocol for exchanging variable-width signed integers
//! between a single-board computer and a microcontroller over a
//! byte-oriented link.
//!
//! A packet is a run of items between two [`PACKET_DELIM`] bytes; each item
//! is a run of 5-bit digits, most significant first, terminated by
//! [`ITEM_DELIM`]. Every byte that actually reaches the wire is first passed
//! through [`byte_codec::process`], which packs the 5-bit payload together
//! with a check code so a single bit-flip in transit is detectable rather
//! than silently decoded as a different digit or delimiter.
//!
//! [`Session`] owns one endpoint's receiver state machine and a handle to a
//! [`Link`]; it is generic over `Link` so the protocol logic can be tested
//! without a real serial port, the same way the decoder this crate grew out
//! of is generic over `std::io::Read`.
//!
//! ```
//! use serial_proto::{CorruptPolicy, Session, SessionConfig, SignConvention, VecLink, ReceiveOutcome};
//!
//! let config = SessionConfig {
//!     sign_convention: SignConvention::SignMagnitude,
//!     max_items_per_packet: 8,
//!     corrupt_policy: CorruptPolicy::Surface,
//! };
//!
//! let mut tx = Session::open(VecLink::new(), config);
//! tx.send(&[1, -1, 0]).unwrap();
//!
//! let mut rx = Session::open(VecLink::new(), config);
//! rx.link_mut().feed(&tx.link().outbound);
//!
//! let mut buffer = [0i32; 8];
//! match rx.receive(&mut buffer).unwrap() {
//!     ReceiveOutcome::Complete { count } => assert_eq!(&buffer[..count], &[1, -1, 0]),
//!     other => panic!("unexpected outcome: {other:?}"),
//! }
//! ```

mod byte_codec;
mod error;
mod framer;
mod item;
mod link;

pub use error::{CorruptByte, SendError};
pub use framer::{CorruptPolicy, ReceiveOutcome, Session, SessionConfig};
pub use item::SignConvention;
pub use link::{Link, VecLink};

/// Marks the start and end of a packet. Never appears escaped on the wire.
pub const PACKET_DELIM: u8 = 0x1F;

/// Terminates one item within a packet.
pub const ITEM_DELIM: u8 = 0x1D;

/// Introduces an escaped literal: the following byte, once decoded, is
/// `literal XOR MASK` rather than a delimiter.
pub const ESCAPE: u8 = 0x1E;

/// XOR mask applied to escape and un-escape a reserved payload value.
pub const MASK: u8 = 0x10;

/// The most digits one item can occupy. Two's-complement needs
/// `ceil(32 / 5) = 7`; sign-magnitude needs one more bit for the sign, but
/// `ceil(33 / 5) = 7` too.
pub const MAX_ITEM_DIGITS: usize = 7;
