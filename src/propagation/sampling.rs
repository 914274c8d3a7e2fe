//! Bit-encoded sampling state shared by every propagated identity.

use std::fmt;

pub(crate) const FLAG_SAMPLED: u8 = 1 << 1;
pub(crate) const FLAG_SAMPLED_SET: u8 = 1 << 2;
pub(crate) const FLAG_DEBUG: u8 = 1 << 3;
pub(crate) const FLAG_SHARED: u8 = 1 << 4;
pub(crate) const FLAG_SAMPLED_LOCAL: u8 = 1 << 5;
pub(crate) const FLAG_LOCAL_ROOT: u8 = 1 << 6;

const SAMPLING_MASK: u8 = FLAG_SAMPLED | FLAG_SAMPLED_SET | FLAG_DEBUG | FLAG_SAMPLED_LOCAL;

/// Sampling decision propagated with a trace.
///
/// `sampled` is a trace-scoped decision: `Some(true)` reports the trace,
/// `Some(false)` drops it and `None` defers to the next hop. `debug` implies
/// `sampled`. `sampled_local` records locally regardless of the remote decision.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplingFlags(u8);

impl SamplingFlags {
    /// No decision made.
    pub const EMPTY: SamplingFlags = SamplingFlags(0);
    /// Decision made: do not report.
    pub const NOT_SAMPLED: SamplingFlags = SamplingFlags(FLAG_SAMPLED_SET);
    /// Decision made: report.
    pub const SAMPLED: SamplingFlags = SamplingFlags(FLAG_SAMPLED_SET | FLAG_SAMPLED);
    /// Report and override any downstream sampling.
    pub const DEBUG: SamplingFlags = SamplingFlags(FLAG_SAMPLED_SET | FLAG_SAMPLED | FLAG_DEBUG);

    pub(crate) const EMPTY_SAMPLED_LOCAL: SamplingFlags = SamplingFlags(FLAG_SAMPLED_LOCAL);
    pub(crate) const NOT_SAMPLED_SAMPLED_LOCAL: SamplingFlags =
        SamplingFlags(FLAG_SAMPLED_SET | FLAG_SAMPLED_LOCAL);
    pub(crate) const SAMPLED_SAMPLED_LOCAL: SamplingFlags =
        SamplingFlags(FLAG_SAMPLED_SET | FLAG_SAMPLED | FLAG_SAMPLED_LOCAL);
    pub(crate) const DEBUG_SAMPLED_LOCAL: SamplingFlags =
        SamplingFlags(FLAG_SAMPLED_SET | FLAG_SAMPLED | FLAG_DEBUG | FLAG_SAMPLED_LOCAL);

    /// Creates a builder starting from [`SamplingFlags::EMPTY`].
    pub fn builder() -> SamplingFlagsBuilder {
        SamplingFlagsBuilder::default()
    }

    /// Flags for a plain sampling decision.
    pub fn from_sampled(sampled: Option<bool>) -> Self {
        match sampled {
            Some(true) => Self::SAMPLED,
            Some(false) => Self::NOT_SAMPLED,
            None => Self::EMPTY,
        }
    }

    /// Canonicalizes a raw bit pattern.
    ///
    /// Only sampling bits are kept. A pattern outside the eight valid
    /// combinations is still returned, but reported as a programming error.
    pub fn from_bits(bits: u8) -> Self {
        let bits = bits & SAMPLING_MASK;
        let flags = SamplingFlags(bits);
        if !flags.is_canonical() {
            tracing::error!(bits, "unrecognized sampling flags; this is a programming error");
        }
        flags
    }

    fn is_canonical(self) -> bool {
        matches!(
            self,
            Self::EMPTY
                | Self::NOT_SAMPLED
                | Self::SAMPLED
                | Self::DEBUG
                | Self::EMPTY_SAMPLED_LOCAL
                | Self::NOT_SAMPLED_SAMPLED_LOCAL
                | Self::SAMPLED_SAMPLED_LOCAL
                | Self::DEBUG_SAMPLED_LOCAL
        )
    }

    /// The remote sampling decision, or `None` when deferred.
    #[inline]
    pub fn sampled(self) -> Option<bool> {
        sampled_of(self.0)
    }

    /// True records this trace locally even if it is not sampled downstream.
    #[inline]
    pub fn sampled_local(self) -> bool {
        self.0 & FLAG_SAMPLED_LOCAL == FLAG_SAMPLED_LOCAL
    }

    /// True implies [`sampled`](Self::sampled).
    #[inline]
    pub fn debug(self) -> bool {
        self.0 & FLAG_DEBUG == FLAG_DEBUG
    }

    /// Raw bit pattern.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SamplingFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&flags_to_string(self.0))
    }
}

impl fmt::Debug for SamplingFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SamplingFlags({})", flags_to_string(self.0))
    }
}

/// Builder for non-constant flag combinations.
#[derive(Debug, Default, Clone, Copy)]
pub struct SamplingFlagsBuilder {
    bits: u8,
}

impl SamplingFlagsBuilder {
    /// `None` clears the decision so it is deferred downstream.
    pub fn sampled(mut self, sampled: Option<bool>) -> Self {
        self.bits = match sampled {
            Some(sampled) => with_sampled(self.bits, sampled),
            None => self.bits & !(FLAG_SAMPLED_SET | FLAG_SAMPLED | FLAG_DEBUG),
        };
        self
    }

    /// Setting debug to true also sets sampled to true.
    pub fn debug(mut self, debug: bool) -> Self {
        self.bits = with_debug(self.bits, debug);
        self
    }

    /// Finishes the flags.
    pub fn build(self) -> SamplingFlags {
        SamplingFlags::from_bits(self.bits)
    }
}

#[inline]
pub(crate) fn sampled_of(bits: u8) -> Option<bool> {
    if bits & FLAG_SAMPLED_SET == FLAG_SAMPLED_SET {
        Some(bits & FLAG_SAMPLED == FLAG_SAMPLED)
    } else {
        None
    }
}

/// Applies a sampling decision. Declining also drops debug, which implies sampled.
pub(crate) fn with_sampled(bits: u8, sampled: bool) -> u8 {
    if sampled {
        bits | FLAG_SAMPLED | FLAG_SAMPLED_SET
    } else {
        (bits | FLAG_SAMPLED_SET) & !(FLAG_SAMPLED | FLAG_DEBUG)
    }
}

pub(crate) fn with_debug(bits: u8, debug: bool) -> u8 {
    if debug {
        bits | FLAG_DEBUG | FLAG_SAMPLED_SET | FLAG_SAMPLED
    } else {
        bits & !FLAG_DEBUG
    }
}

pub(crate) fn with_bit(bits: u8, flag: u8, set: bool) -> u8 {
    if set {
        bits | flag
    } else {
        bits & !flag
    }
}

pub(crate) fn flags_to_string(bits: u8) -> String {
    let mut result = String::new();
    if bits & FLAG_DEBUG == FLAG_DEBUG {
        result.push_str("DEBUG");
    } else if bits & FLAG_SAMPLED_SET == FLAG_SAMPLED_SET {
        if bits & FLAG_SAMPLED == FLAG_SAMPLED {
            result.push_str("SAMPLED_REMOTE");
        } else {
            result.push_str("NOT_SAMPLED_REMOTE");
        }
    }
    if bits & FLAG_SAMPLED_LOCAL == FLAG_SAMPLED_LOCAL {
        if !result.is_empty() {
            result.push('|');
        }
        result.push_str("SAMPLED_LOCAL");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(SamplingFlags::EMPTY.sampled(), None);
        assert_eq!(SamplingFlags::NOT_SAMPLED.sampled(), Some(false));
        assert_eq!(SamplingFlags::SAMPLED.sampled(), Some(true));
        assert!(SamplingFlags::DEBUG.debug());
        assert_eq!(SamplingFlags::DEBUG.sampled(), Some(true));
    }

    #[test]
    fn test_builder_debug_implies_sampled() {
        let flags = SamplingFlags::builder().debug(true).build();
        assert_eq!(flags, SamplingFlags::DEBUG);
    }

    #[test]
    fn test_builder_none_defers() {
        let flags = SamplingFlags::builder().sampled(Some(true)).sampled(None).build();
        assert_eq!(flags, SamplingFlags::EMPTY);
    }

    #[test]
    fn test_declining_drops_debug() {
        let flags = SamplingFlags::builder().debug(true).sampled(Some(false)).build();
        assert_eq!(flags, SamplingFlags::NOT_SAMPLED);
        assert!(!flags.debug());
    }

    #[test]
    fn test_from_bits_ignores_identity_bits() {
        let flags = SamplingFlags::from_bits(FLAG_SAMPLED_SET | FLAG_SAMPLED | FLAG_SHARED);
        assert_eq!(flags, SamplingFlags::SAMPLED);
    }

    #[test]
    fn test_from_bits_keeps_unrecognized_pattern() {
        let flags = SamplingFlags::from_bits(FLAG_SAMPLED);
        assert_eq!(flags.bits(), FLAG_SAMPLED);
        assert_eq!(flags.sampled(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SamplingFlags::DEBUG.to_string(), "DEBUG");
        assert_eq!(SamplingFlags::NOT_SAMPLED.to_string(), "NOT_SAMPLED_REMOTE");
        assert_eq!(SamplingFlags::SAMPLED_SAMPLED_LOCAL.to_string(), "SAMPLED_REMOTE|SAMPLED_LOCAL");
        assert_eq!(SamplingFlags::EMPTY.to_string(), "");
    }
}
