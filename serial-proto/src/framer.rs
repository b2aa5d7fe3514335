//! Packet framing: the sender algorithm, the receiver state machine, and the
//! `Session` type that ties a [`Link`] to one endpoint's receiver state.
//! (spec §4.3)

use crate::byte_codec::{process, unprocess};
use crate::error::{CorruptByte, SendError};
use crate::item::{decode_digits, encode_digits, SignConvention};
use crate::link::Link;
use crate::{ESCAPE, ITEM_DELIM, MASK, PACKET_DELIM};

/// Whether a corrupt byte is surfaced to the caller as `Corrupt` or silently
/// folded into `Pending` (spec §9 Open Questions; the original source does
/// the latter unconditionally).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CorruptPolicy {
    /// Report `ReceiveOutcome::Corrupt` as soon as a bad byte is seen.
    Surface,
    /// Reset silently and keep waiting, as if nothing happened.
    FoldIntoPending,
}

/// Configuration required to open a [`Session`] (spec §6).
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SessionConfig {
    /// Sign convention both endpoints have agreed to use.
    pub sign_convention: SignConvention,
    /// Documented receive buffer capacity; callers are expected to size
    /// their `receive` buffer to at least this many items.
    pub max_items_per_packet: usize,
    /// Whether a corrupt byte is surfaced or silently absorbed.
    pub corrupt_policy: CorruptPolicy,
}

/// The outcome of one [`Session::receive`] call (spec §4.3, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReceiveOutcome {
    /// A packet was finalized; `buffer[0..count]` holds its items.
    Complete {
        /// Number of items written into the caller's buffer.
        count: usize,
    },
    /// No complete packet yet; receiver state is preserved for the next call.
    Pending,
    /// The packet would have produced more items than the buffer can hold.
    /// The receiver has reset; the in-flight packet is lost.
    Overflow,
    /// A byte failed its check code. The receiver has reset; only reported
    /// when `corrupt_policy` is [`CorruptPolicy::Surface`].
    Corrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    Init,
    Normal,
    Escape,
}

#[derive(Debug, Clone, Copy)]
struct Receiver {
    state: RxState,
    item_accum: u64,
    digits_seen: usize,
    item_count: usize,
}

impl Default for Receiver {
    fn default() -> Self {
        Receiver {
            state: RxState::Init,
            item_accum: 0,
            digits_seen: 0,
            item_count: 0,
        }
    }
}

fn is_reserved(digit: u8) -> bool {
    matches!(digit, PACKET_DELIM | ITEM_DELIM | ESCAPE)
}

/// A live association with one link endpoint: the receiver state machine
/// plus the link handle (spec §4.3, §5; the original source keeps this as
/// class-level/global state, which this type replaces with an explicit,
/// independently-constructible value — spec §9).
pub struct Session<L: Link> {
    link: L,
    config: SessionConfig,
    rx: Receiver,
}

impl<L: Link> Session<L> {
    /// Acquires a session over `link` with the given configuration.
    pub fn open(link: L, config: SessionConfig) -> Self {
        Session {
            link,
            config,
            rx: Receiver::default(),
        }
    }

    /// Returns the receiver state machine to `INIT` and clears all
    /// accumulators, without touching the underlying link (spec §5).
    pub fn reset(&mut self) {
        log::debug!("receiver reset to INIT");
        self.rx = Receiver::default();
    }

    /// Returns a reference to the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Returns a mutable reference to the underlying link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    fn write_payload(&mut self, payload: u8) -> Result<(), L::Error> {
        self.link.write(&[process(payload)])
    }

    fn write_digit(&mut self, digit: u8) -> Result<(), L::Error> {
        if is_reserved(digit) {
            self.write_payload(ESCAPE)?;
            self.write_payload(digit ^ MASK)
        } else {
            self.write_payload(digit)
        }
    }

    /// Writes one complete packet. Atomic from the caller's perspective: all
    /// items are range-checked before anything is written, so a
    /// `RangeError` never leaves a half-written frame on the wire.
    ///
    /// `items` is `i64` rather than `i32` so that a value outside the
    /// representable 32-bit signed range can be rejected with
    /// [`SendError::RangeError`] instead of being impossible to express in
    /// the first place (spec §4.3 sender algorithm step 2a, §7).
    pub fn send(&mut self, items: &[i64]) -> Result<(), SendError<L::Error>> {
        for &value in items {
            if value < i32::MIN as i64 || value > i32::MAX as i64 {
                return Err(SendError::RangeError { value });
            }
        }

        self.write_payload(PACKET_DELIM)?;
        for &value in items {
            let digits = encode_digits(value as i32, self.config.sign_convention);
            for digit in digits {
                self.write_digit(digit)?;
            }
            self.write_payload(ITEM_DELIM)?;
        }
        self.write_payload(PACKET_DELIM)?;
        Ok(())
    }

    /// Drains whatever bytes are currently available on the link and
    /// returns. Never blocks; the caller is expected to poll (spec §4.3,
    /// §5).
    pub fn receive(&mut self, buffer: &mut [i32]) -> Result<ReceiveOutcome, L::Error> {
        while self.link.bytes_available()? > 0 {
            let wire = match self.link.read_one()? {
                Some(b) => b,
                None => break,
            };

            match unprocess(wire) {
                Err(CorruptByte { byte }) => {
                    log::warn!("corrupt byte {:#04x}, resetting receiver", byte);
                    self.reset();
                    if self.config.corrupt_policy == CorruptPolicy::Surface {
                        return Ok(ReceiveOutcome::Corrupt);
                    }
                }
                Ok(payload) => {
                    if let Some(outcome) = self.step(payload, buffer) {
                        return Ok(outcome);
                    }
                }
            }
        }

        Ok(ReceiveOutcome::Pending)
    }

    /// Commits the in-progress item into `buffer`, signalling `Overflow` if
    /// the buffer's capacity would be exceeded (spec §4.3 receiver table,
    /// ITEM_DELIM row).
    fn commit_item(&mut self, buffer: &mut [i32]) -> Option<ReceiveOutcome> {
        if self.rx.item_count >= buffer.len() {
            log::warn!("receive buffer overflow at {} items", buffer.len());
            self.reset();
            return Some(ReceiveOutcome::Overflow);
        }

        let value = decode_digits(self.rx.item_accum, self.rx.digits_seen, self.config.sign_convention);
        buffer[self.rx.item_count] = value;
        self.rx.item_count += 1;
        self.rx.item_accum = 0;
        self.rx.digits_seen = 0;
        None
    }

    /// Advances the receiver state machine by one decoded payload. Returns
    /// `Some(outcome)` when a packet finalizes or overflows, `None` to keep
    /// draining.
    fn step(&mut self, payload: u8, buffer: &mut [i32]) -> Option<ReceiveOutcome> {
        match self.rx.state {
            RxState::Init => {
                if payload == PACKET_DELIM {
                    self.rx.item_accum = 0;
                    self.rx.digits_seen = 0;
                    self.rx.item_count = 0;
                    self.rx.state = RxState::Normal;
                }
                None
            }

            RxState::Escape => {
                self.rx.item_accum = (self.rx.item_accum << 5) | (payload ^ MASK) as u64;
                self.rx.digits_seen += 1;
                self.rx.state = RxState::Normal;
                None
            }

            RxState::Normal => match payload {
                PACKET_DELIM => {
                    // The trailing ITEM_DELIM before a closing PACKET_DELIM
                    // is optional on receive (spec §4.3): commit whatever
                    // digits have accumulated since the last delimiter
                    // before finalizing.
                    if self.rx.digits_seen > 0 {
                        if let Some(outcome) = self.commit_item(buffer) {
                            return Some(outcome);
                        }
                    }
                    let count = self.rx.item_count;
                    self.rx.state = RxState::Init;
                    Some(ReceiveOutcome::Complete { count })
                }
                ITEM_DELIM => self.commit_item(buffer),
                ESCAPE => {
                    self.rx.state = RxState::Escape;
                    None
                }
                digit => {
                    self.rx.item_accum = (self.rx.item_accum << 5) | digit as u64;
                    self.rx.digits_seen += 1;
                    None
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::VecLink;

    fn session(sign_convention: SignConvention) -> Session<VecLink> {
        Session::open(
            VecLink::new(),
            SessionConfig {
                sign_convention,
                max_items_per_packet: 16,
                corrupt_policy: CorruptPolicy::Surface,
            },
        )
    }

    fn loop_back(sender: &Session<VecLink>, receiver: &mut Session<VecLink>) -> ReceiveOutcome {
        receiver.link.feed(&sender.link.outbound);
        let mut buffer = [0i32; 16];
        let outcome = receiver.receive(&mut buffer).unwrap();
        outcome
    }

    #[test]
    fn empty_packet_round_trips() {
        let mut tx = session(SignConvention::SignMagnitude);
        tx.send(&[]).unwrap();
        assert_eq!(
            tx.link.outbound,
            vec![process(PACKET_DELIM), process(PACKET_DELIM)]
        );

        let mut rx = session(SignConvention::SignMagnitude);
        assert_eq!(loop_back(&tx, &mut rx), ReceiveOutcome::Complete { count: 0 });
    }

    #[test]
    fn single_zero_item_round_trips() {
        let mut tx = session(SignConvention::SignMagnitude);
        tx.send(&[0]).unwrap();
        assert_eq!(
            tx.link.outbound,
            vec![
                process(PACKET_DELIM),
                process(0x00),
                process(ITEM_DELIM),
                process(PACKET_DELIM),
            ]
        );

        let mut rx = session(SignConvention::SignMagnitude);
        let mut buffer = [0i32; 16];
        rx.link.feed(&tx.link.outbound);
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 1 }
        );
        assert_eq!(buffer[0], 0);
    }

    #[test]
    fn one_and_minus_one_round_trip() {
        let mut tx = session(SignConvention::SignMagnitude);
        tx.send(&[1, -1]).unwrap();
        assert_eq!(
            tx.link.outbound,
            vec![
                process(PACKET_DELIM),
                process(0x02),
                process(ITEM_DELIM),
                process(0x03),
                process(ITEM_DELIM),
                process(PACKET_DELIM),
            ]
        );

        let mut rx = session(SignConvention::SignMagnitude);
        let mut buffer = [0i32; 16];
        rx.link.feed(&tx.link.outbound);
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 2 }
        );
        assert_eq!(&buffer[..2], &[1, -1]);
    }

    #[test]
    fn escape_transparency_for_reserved_digit_value() {
        // 0x1F shifted = 0x3E -> digits [0x01, 0x1E]; the low digit equals
        // ESCAPE and must be escaped on the wire.
        let mut tx = session(SignConvention::SignMagnitude);
        tx.send(&[0x1F]).unwrap();
        assert_eq!(
            tx.link.outbound,
            vec![
                process(PACKET_DELIM),
                process(0x01),
                process(ESCAPE),
                process(0x1E ^ MASK),
                process(ITEM_DELIM),
                process(PACKET_DELIM),
            ]
        );

        let mut rx = session(SignConvention::SignMagnitude);
        let mut buffer = [0i32; 16];
        rx.link.feed(&tx.link.outbound);
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 1 }
        );
        assert_eq!(buffer[0], 0x1F);
    }

    #[test]
    fn lone_item_delim_after_packet_open_is_zero() {
        let mut rx = session(SignConvention::SignMagnitude);
        rx.link.feed(&[
            process(PACKET_DELIM),
            process(ITEM_DELIM),
            process(PACKET_DELIM),
        ]);
        let mut buffer = [0i32; 16];
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 1 }
        );
        assert_eq!(buffer[0], 0);
    }

    #[test]
    fn missing_trailing_item_delim_still_commits_last_item() {
        let mut rx = session(SignConvention::SignMagnitude);
        rx.link.feed(&[process(PACKET_DELIM), process(0x02), process(PACKET_DELIM)]);
        let mut buffer = [0i32; 16];
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 1 }
        );
        assert_eq!(buffer[0], 1);
    }

    #[test]
    fn overflow_resets_and_reports() {
        let mut rx = Session::open(
            VecLink::new(),
            SessionConfig {
                sign_convention: SignConvention::SignMagnitude,
                max_items_per_packet: 1,
                corrupt_policy: CorruptPolicy::Surface,
            },
        );
        rx.link.feed(&[
            process(PACKET_DELIM),
            process(0x02),
            process(ITEM_DELIM),
            process(0x02),
            process(ITEM_DELIM),
            process(PACKET_DELIM),
        ]);
        let mut buffer = [0i32; 1];
        assert_eq!(rx.receive(&mut buffer).unwrap(), ReceiveOutcome::Overflow);
    }

    #[test]
    fn range_error_leaves_nothing_on_the_wire() {
        let mut tx = session(SignConvention::SignMagnitude);
        let err = tx.send(&[i64::from(i32::MAX) + 1]).unwrap_err();
        assert!(matches!(err, SendError::RangeError { .. }));
        assert!(tx.link.outbound.is_empty());
    }

    #[test]
    fn corrupt_byte_surfaced_then_next_packet_still_decodes() {
        let mut tx = session(SignConvention::SignMagnitude);
        tx.send(&[7]).unwrap();

        let mut rx = session(SignConvention::SignMagnitude);
        // 0xAA (m=21, c=2, CHECK[21]=5) and 0x55 (m=10, c=5, CHECK[10]=3) are
        // both corrupt; under CorruptPolicy::Surface each is reported on its
        // own `receive` call before the well-formed stream behind them is
        // reached.
        rx.link.feed(&[0xAA, 0x55]);
        rx.link.feed(&tx.link.outbound);

        let mut buffer = [0i32; 16];
        assert_eq!(rx.receive(&mut buffer).unwrap(), ReceiveOutcome::Corrupt);
        assert_eq!(rx.receive(&mut buffer).unwrap(), ReceiveOutcome::Corrupt);
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 1 }
        );
        assert_eq!(buffer[0], 7);
    }

    #[test]
    fn fold_into_pending_silently_resets_on_corrupt_byte() {
        let mut rx = Session::open(
            VecLink::new(),
            SessionConfig {
                sign_convention: SignConvention::SignMagnitude,
                max_items_per_packet: 16,
                corrupt_policy: CorruptPolicy::FoldIntoPending,
            },
        );
        // process(0x1F) has a valid check code; flip the low bit to corrupt it.
        let corrupt = process(PACKET_DELIM) ^ 0x01;
        rx.link.feed(&[corrupt]);
        let mut buffer = [0i32; 16];
        assert_eq!(rx.receive(&mut buffer).unwrap(), ReceiveOutcome::Pending);
    }

    #[test]
    fn reset_then_fresh_packet_decodes() {
        let mut rx = session(SignConvention::SignMagnitude);
        rx.link.feed(&[process(PACKET_DELIM), process(0x02)]);
        let mut buffer = [0i32; 16];
        assert_eq!(rx.receive(&mut buffer).unwrap(), ReceiveOutcome::Pending);

        rx.reset();
        rx.link.feed(&[process(PACKET_DELIM), process(0x02), process(ITEM_DELIM), process(PACKET_DELIM)]);
        assert_eq!(
            rx.receive(&mut buffer).unwrap(),
            ReceiveOutcome::Complete { count: 1 }
        );
        assert_eq!(buffer[0], 1);
    }
}
