//! DMAC errors

use core::fmt;

use crate::channel::State;
use crate::ral::Register;

/// A DMAC driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The request doesn't make sense in the current state.
    ///
    /// Try again once the channel or controller reaches a state where the
    /// request is valid.
    Configuration(ConfigurationError),
    /// The write protect lock rejected a write to `register`.
    ///
    /// Unlock the DMAC, then retry.
    WriteProtect { register: Register },
    /// The DMAC latched a transfer error on `channel`.
    ///
    /// Disable the channel, then acknowledge the error.
    Hardware { channel: u8 },
}

/// Reasons for [`Error::Configuration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// There is no channel with this number.
    InvalidChannel(u8),
    /// Someone else holds this channel.
    AlreadyClaimed(u8),
    /// The channel must be disabled for this request.
    NotDisabled { channel: u8, state: State },
    /// The descriptor chain belongs to a channel that's still running.
    ChainArmed,
    /// The descriptor chain has no storage left for another node.
    ChainFull,
    /// A channel can't run an empty descriptor chain.
    ChainEmpty,
    /// Global settings can only change while every channel is stopped.
    ChannelsActive,
    /// The write protect key is wrong.
    InvalidKey,
}

impl From<ConfigurationError> for Error {
    fn from(error: ConfigurationError) -> Self {
        Error::Configuration(error)
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationError::InvalidChannel(channel) => {
                write!(f, "channel {channel} does not exist")
            }
            ConfigurationError::AlreadyClaimed(channel) => {
                write!(f, "channel {channel} is already claimed")
            }
            ConfigurationError::NotDisabled { channel, state } => {
                write!(f, "channel {channel} is {state:?}, not disabled")
            }
            ConfigurationError::ChainArmed => f.write_str("descriptor chain is armed"),
            ConfigurationError::ChainFull => f.write_str("descriptor chain is full"),
            ConfigurationError::ChainEmpty => f.write_str("descriptor chain is empty"),
            ConfigurationError::ChannelsActive => f.write_str("a channel is active"),
            ConfigurationError::InvalidKey => f.write_str("invalid write protect key"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(error) => write!(f, "configuration error: {error}"),
            Error::WriteProtect { register } => {
                write!(f, "write protected: {register:?}")
            }
            Error::Hardware { channel } => write!(f, "transfer error on channel {channel}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let error = Error::from(ConfigurationError::NotDisabled {
            channel: 2,
            state: State::Active,
        });
        assert_eq!(
            error.to_string(),
            "configuration error: channel 2 is Active, not disabled"
        );
        let error = Error::WriteProtect {
            register: Register::CtrlA(1),
        };
        assert_eq!(error.to_string(), "write protected: CtrlA(1)");
    }
}
