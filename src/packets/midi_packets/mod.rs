pub(crate) mod delta_time;
pub mod midi_buffer;
pub mod midi_command;
pub mod midi_command_list_header;
pub mod midi_packet;
pub mod midi_packet_header;
