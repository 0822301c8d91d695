//! RTP-MIDI (AppleMIDI) session participant for a single peer.
//!
//! This library is designed to be used with the `tokio` async runtime.
//! A participant waits for an initiator (for example macOS Audio MIDI Setup) to invite it, keeps
//! its clock in sync with the initiator and sends MIDI to it over RTP.
//!
//! # Features
//! - **Async**: Built on top of `tokio`, with the network and sockets injected so sessions can be
//!   driven by scripted peers in tests.
//! - **Clock Sync**: Answers the initiator's three-way clock synchronization, with an initial
//!   burst after the handshake and a background round every interval.
//! - **SysEx Support**: Sends System Exclusive messages alongside regular MIDI messages.
//! - **Receiving**: MIDI from the initiator is decoded, running status included, and handed to
//!   every subscriber of [`RtpMidiParticipant::subscribe_midi`].
//! - **mDNS**: With the `mdns` feature the session is advertised as `_apple-midi._udp`.
//!
//! ## Unsupported Features
//! - **Inviting**: The participant only accepts invitations, it never sends them.
//! - **Recovery Journal**: Lost packets cannot be recovered.
pub mod error;
pub mod net;
pub mod packets;
pub mod sessions;

pub use error::{CommandError, ConnectError, RtpMidiError, SyncError};
pub use packets::midi_packets::midi_command::{MidiCommand, RtpMidiMessage};
pub use packets::midi_packets::midi_command_list_header::CommandListLength;
pub use packets::midi_packets::midi_packet::{MidiEvent, MidiPacket};
pub use sessions::config::{DEFAULT_CONTROL_PORT, SessionConfig};
pub use sessions::handshake::SessionState;
pub use sessions::rtp_midi_session::{PeerInfo, RtpMidiParticipant};
pub use sessions::session_identity::{SessionIdentity, SessionName};
