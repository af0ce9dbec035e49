#[derive(Debug, PartialEq, Eq)]
/// DS2482 Hardware Errors
pub enum Ds2482Error<E> {
    /// The I2C transfer failed, e.g. the bridge did not acknowledge its address.
    DeviceUnavailable(E),
    /// The channel does not exist on this bridge variant.
    InvalidChannel(u8),
    /// The 1-Wire busy flag did not clear within the poll limit.
    Timeout,
    /// The bridge reported a short circuit during a 1-Wire reset.
    ShortCircuit,
    /// The configuration register did not read back the value written.
    ConfigMismatch,
    /// The channel selection register did not read back the expected code.
    ChannelSelectMismatch,
}

impl<E> From<E> for Ds2482Error<E> {
    fn from(value: E) -> Self {
        Self::DeviceUnavailable(value)
    }
}
