use core::fmt;

/// Errors reported by table construction, fallible reservation, and cursor
/// misuse.
///
/// Absent keys are never errors; lookups and removals report them as `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// The requested capacity is larger than a table may ever hold.
    CapacityTooLarge {
        /// The capacity that was asked for.
        requested: usize,
        /// The largest capacity the table accepts.
        max: usize,
    },
    /// The load factor was NaN, not positive, or greater than one.
    InvalidLoadFactor(f32),
    /// The maximum table size was not a power of two or exceeded `2^30`.
    InvalidMaxTableSize(usize),
    /// Growing the table would exceed its maximum table size.
    CapacityOverflow,
    /// A cursor was asked to remove an entry it is not positioned on.
    NoCurrentEntry,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CapacityTooLarge { requested, max } => {
                write!(f, "capacity {requested} is too large (maximum {max})")
            }
            Error::InvalidLoadFactor(load_factor) => {
                write!(f, "load factor must be in (0, 1]: {load_factor}")
            }
            Error::InvalidMaxTableSize(size) => {
                write!(
                    f,
                    "max table size must be a power of two no larger than 2^30: {size}"
                )
            }
            Error::CapacityOverflow => f.write_str("capacity overflow"),
            Error::NoCurrentEntry => {
                f.write_str("move_next must yield an entry before remove_current")
            }
        }
    }
}

impl core::error::Error for Error {}
