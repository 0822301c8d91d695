pub mod clock_sync_packet;
pub mod control_packet;
pub mod exchange_packet;
