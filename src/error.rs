use std::io;

use thiserror::Error;

use crate::packets::control_packets::control_packet::ControlCommand;
use crate::packets::error::PacketParseError;

/// Which part of the session bring-up failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("network interface failed to connect")]
    Network(#[source] io::Error),
    #[error("failed to open control socket on port {port}")]
    ControlSocket {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("failed to open MIDI socket on port {port}")]
    MidiSocket {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("control port {0} leaves no room for the MIDI port")]
    PortOutOfRange(u16),
    #[error("{channel} handshake failed")]
    Handshake {
        channel: &'static str,
        #[source]
        source: io::Error,
    },
}

/// The peer sent a command that does not fit the current protocol state.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected {expected:?} command, got {actual:#06X}")]
pub struct CommandError {
    pub expected: ControlCommand,
    pub actual: u16,
}

/// A synchronization packet arrived with the wrong step counter.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected clock sync count {expected}, got {actual}")]
pub struct SyncError {
    pub expected: u8,
    pub actual: u8,
}

#[derive(Debug, Error)]
pub enum RtpMidiError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("malformed packet: {0}")]
    Packet(#[from] PacketParseError),
    #[error("session name is {len} bytes, at most {max} fit")]
    NameTooLong { len: usize, max: usize },
    #[error("session name contains a NUL byte")]
    NameContainsNul,
    #[error("MIDI command of {len} bytes exceeds the {max} byte limit")]
    CommandTooLarge { len: usize, max: usize },
    #[error("session is not established")]
    NotConnected,
    #[error("peer ended the session")]
    SessionEnded,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RtpMidiError {
    /// Failures a sync round can shrug off: the next round starts from scratch.
    pub fn is_transient(&self) -> bool {
        match self {
            RtpMidiError::Io(e) => matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock),
            RtpMidiError::Command(_) | RtpMidiError::Sync(_) | RtpMidiError::Packet(_) => true,
            _ => false,
        }
    }
}
