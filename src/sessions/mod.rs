pub mod clock_sync;
pub mod config;
pub mod handshake;
mod host_syncer;
mod mdns;
mod midi_channel;
pub mod midi_transport;
pub mod rtp_midi_session;
pub mod scheduler;
pub mod session_identity;

const MAX_UDP_PACKET_SIZE: usize = 65535;
