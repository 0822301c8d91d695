use std::time::Duration;

use super::session_identity::SessionName;
use crate::packets::midi_packets::midi_command_list_header::CommandListLength;

/// Control port peers expect by default. The MIDI port is always the next one up.
pub const DEFAULT_CONTROL_PORT: u16 = 5004;
pub const DEFAULT_SESSION_NAME: &str = "rtpmidi-participant";

/// Settings for one participant session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name sent in every acceptance.
    pub name: SessionName,
    /// Synchronization source identifier, stable for the session lifetime.
    pub ssrc: u32,
    /// Sync rounds answered before `connect_and_sync` returns.
    pub initial_sync_rounds: usize,
    /// Time between background sync rounds once established.
    pub sync_interval: Duration,
    /// How long a sync round waits for each packet from the peer.
    pub sync_receive_timeout: Duration,
    /// Bound on each invitation wait. `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    /// What the low bits of the command list header count.
    pub command_list_length: CommandListLength,
    /// Received MIDI packets a slow subscriber can fall behind by before it starts missing them.
    pub inbound_midi_capacity: usize,
}

impl SessionConfig {
    pub fn new(name: SessionName, ssrc: u32) -> Self {
        SessionConfig {
            name,
            ssrc,
            ..Default::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            name: SessionName::truncated(DEFAULT_SESSION_NAME),
            ssrc: rand::random::<u32>(),
            initial_sync_rounds: 6,
            sync_interval: Duration::from_secs(10),
            sync_receive_timeout: Duration::from_secs(1),
            handshake_timeout: None,
            command_list_length: CommandListLength::MessageCount,
            inbound_midi_capacity: 64,
        }
    }
}
