/// One wire communication error type.
#[derive(Debug, PartialEq, Eq)]
pub enum OneWireError<E> {
    /// Encapsulates the error type from the underlying hardware.
    Other(E),
    /// Indicates that no device answered the reset with a presence pulse.
    NoDevicePresent,
    /// Indicates that a short circuit was detected on the bus.
    ShortCircuit,
    /// Indicates that the operation is not implemented by the bus master.
    Unimplemented,
    /// A ROM code or data frame failed its CRC-8 check.
    InvalidCrc,
    /// A search triplet past the first bit read both the id bit and its complement as 1.
    ///
    /// Happens when devices leave the bus while a search is in progress or
    /// the bus is disturbed. The search state is left untouched, so the
    /// same search may be retried.
    SearchInconsistent,
    /// The ROM code belongs to a different device family.
    WrongFamily(u8),
}

impl<E> From<E> for OneWireError<E> {
    fn from(other: E) -> Self {
        Self::Other(other)
    }
}
