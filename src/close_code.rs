//! WebSocket close codes and the reconnect policy attached to them.
//!
//! The session server closes connections with standard RFC 6455 codes. Three
//! of them mean "do not come back": a normal close, the server going away, and
//! a policy violation (session full or unknown). Every other code is treated
//! as a transient failure worth retrying.

use std::fmt;

/// A close code as delivered with a transport close signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: the connection completed its purpose.
    Normal,
    /// 1001: the endpoint is going away.
    Away,
    /// 1002: protocol error.
    Protocol,
    /// 1003: unacceptable data type.
    Unsupported,
    /// 1005: the close frame carried no status code.
    NoStatus,
    /// 1006: the connection dropped without a close frame.
    Abnormal,
    /// 1007: payload inconsistent with the message type.
    Invalid,
    /// 1008: policy violation, e.g. the session is full or unknown.
    Policy,
    /// 1009: message too big.
    TooBig,
    /// 1010: extension negotiation failed.
    Extension,
    /// 1011: unexpected server condition.
    Error,
    /// 1012: the server is restarting.
    Restart,
    /// 1013: try again later.
    Again,
    /// Any other numeric code.
    Other(u16),
}

impl CloseCode {
    /// Convert to the numeric close code.
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::Away => 1001,
            Self::Protocol => 1002,
            Self::Unsupported => 1003,
            Self::NoStatus => 1005,
            Self::Abnormal => 1006,
            Self::Invalid => 1007,
            Self::Policy => 1008,
            Self::TooBig => 1009,
            Self::Extension => 1010,
            Self::Error => 1011,
            Self::Restart => 1012,
            Self::Again => 1013,
            Self::Other(code) => code,
        }
    }

    /// Returns `true` if a close with this code must not be retried.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Normal | Self::Away | Self::Policy)
    }

    /// Short human-readable description for status lines.
    pub fn description(self) -> &'static str {
        match self {
            Self::Normal => "the session connection closed normally",
            Self::Away => "the server is going away",
            Self::Protocol => "the server reported a protocol error",
            Self::Unsupported => "the server refused a frame of an unsupported type",
            Self::NoStatus => "the connection closed without a status code",
            Self::Abnormal => "the connection dropped unexpectedly",
            Self::Invalid => "the server received an invalid payload",
            Self::Policy => "the server refused the session (full or unknown)",
            Self::TooBig => "a frame was too large",
            Self::Extension => "extension negotiation failed",
            Self::Error => "the server hit an internal error",
            Self::Restart => "the server is restarting",
            Self::Again => "the server is busy",
            Self::Other(_) => "the connection closed with an application code",
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::Away,
            1002 => Self::Protocol,
            1003 => Self::Unsupported,
            1005 => Self::NoStatus,
            1006 => Self::Abnormal,
            1007 => Self::Invalid,
            1008 => Self::Policy,
            1009 => Self::TooBig,
            1010 => Self::Extension,
            1011 => Self::Error,
            1012 => Self::Restart,
            1013 => Self::Again,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_u16(), self.description())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn only_normal_away_and_policy_are_terminal() {
        for code in 1000..=1015u16 {
            let expected = matches!(code, 1000 | 1001 | 1008);
            assert_eq!(CloseCode::from(code).is_terminal(), expected, "code {code}");
        }
        assert!(!CloseCode::from(4000).is_terminal());
        assert!(!CloseCode::from(0).is_terminal());
    }

    #[test]
    fn numeric_codes_survive_conversion() {
        for code in [1000u16, 1004, 1006, 1014, 3000, 4999] {
            assert_eq!(u16::from(CloseCode::from(code)), code);
        }
    }

    #[test]
    fn display_includes_number() {
        assert!(CloseCode::Policy.to_string().starts_with("1008"));
    }
}
