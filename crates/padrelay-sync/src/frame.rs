//! Wraparound-aware frame counter comparisons.
//!
//! Frame counters are `u32` and wrap. Two counters are compared by the
//! distance between them modulo 2^32: anything less than half the modulus
//! "ahead" counts as newer.

const HALF: u32 = u32::MAX / 2;

/// `true` if `frame` is the same as or newer than `reference`.
pub(crate) fn is_at_or_after(frame: u32, reference: u32) -> bool {
    frame.wrapping_sub(reference) < HALF
}

/// `true` if `frame` is strictly older than `reference`.
pub(crate) fn is_before(frame: u32, reference: u32) -> bool {
    frame.wrapping_sub(reference) > HALF
}

/// How many frames `frame` trails `lead`. Zero if it does not trail at all.
pub(crate) fn lag_behind(lead: u32, frame: u32) -> u32 {
    if is_at_or_after(frame, lead) {
        0
    } else {
        lead.wrapping_sub(frame)
    }
}
