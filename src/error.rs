//! Error types.

use core::fmt;

/// Errors produced by this crate.
///
/// Arithmetic itself never fails: every variant here originates from
/// either `init`, from parsing/decoding entry points, or from the narrow
/// integer-conversion queries that can overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// `init` was called with a modulus whose bit length exceeds the
    /// compile-time `MaxBits` bound, or the modulus failed a primality
    /// precondition (even, or detected composite on a best-effort basis).
    BadModulus,

    /// An explicitly requested backend mode is not available and no `Auto`
    /// fallback applies.
    ModeUnavailable,

    /// A parsed or supplied value was out of range (≥ p), used an invalid
    /// digit for its base, or a byte buffer had the wrong length for
    /// `Array`/`ArrayRaw` decoding.
    BadValue,

    /// `setMpz` (or the equivalent big-integer constructor) was given a
    /// negative value.
    Negative,

    /// `getUint64`/`getInt64` was asked for a representation that does not
    /// fit in the target integer type.
    Overflow,

    /// Octal (or another unsupported base) was requested for stream I/O.
    BadIoMode,

    /// An operation was attempted on a field tag before `init` was called.
    Uninitialized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::BadModulus => "modulus is invalid for this field (too large, even, or composite)",
            Error::ModeUnavailable => "requested backend mode is unavailable",
            Error::BadValue => "value out of range or malformed for the requested encoding",
            Error::Negative => "expected a nonnegative integer",
            Error::Overflow => "value does not fit in the requested integer type",
            Error::BadIoMode => "unsupported I/O mode for this operation",
            Error::Uninitialized => "field type used before init()",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

/// Result type used throughout this crate.
pub type Result<T> = core::result::Result<T, Error>;
