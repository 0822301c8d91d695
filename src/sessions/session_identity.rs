use std::fmt;

use crate::error::RtpMidiError;
use crate::packets::control_packets::exchange_packet::NAME_FIELD_SIZE;

/// Longest name that fits the exchange packet's name field next to its NUL terminator.
pub const MAX_NAME_LEN: usize = NAME_FIELD_SIZE - 1;

/// A session name known to fit the fixed-size exchange packet field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionName(String);

impl SessionName {
    pub fn new(name: &str) -> Result<Self, RtpMidiError> {
        if name.contains('\0') {
            return Err(RtpMidiError::NameContainsNul);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(RtpMidiError::NameTooLong {
                len: name.len(),
                max: MAX_NAME_LEN,
            });
        }
        Ok(SessionName(name.to_owned()))
    }

    /// Keeps as much of `name` as fits, cutting at a character boundary and at the first NUL.
    pub fn truncated(name: &str) -> Self {
        let name = name.split('\0').next().unwrap_or_default();
        let mut end = name.len().min(MAX_NAME_LEN);
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        SessionName(name[..end].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for SessionName {
    type Error = RtpMidiError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        SessionName::new(name)
    }
}

/// Who we are for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub ssrc: u32,
    pub name: SessionName,
}

impl SessionIdentity {
    pub fn new(ssrc: u32, name: SessionName) -> Self {
        SessionIdentity { ssrc, name }
    }
}
