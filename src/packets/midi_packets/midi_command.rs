use bytes::{BufMut, BytesMut};
use midi_types::{MidiMessage, status};

/// Largest single command the transport buffer accepts.
pub const MAX_COMMAND_SIZE: usize = 256;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// A MIDI command that can be placed in an RTP-MIDI command list.
pub trait MidiCommand {
    /// Encoded length in bytes, status byte included.
    fn command_len(&self) -> usize;
    fn write_command(&self, buffer: &mut BytesMut);
}

impl<T: MidiCommand + ?Sized> MidiCommand for &T {
    fn command_len(&self) -> usize {
        (**self).command_len()
    }

    fn write_command(&self, buffer: &mut BytesMut) {
        (**self).write_command(buffer)
    }
}

fn status(message: &MidiMessage) -> u8 {
    match message {
        MidiMessage::NoteOn(channel, _, _) => status::NOTE_ON | u8::from(*channel),
        MidiMessage::NoteOff(channel, _, _) => status::NOTE_OFF | u8::from(*channel),
        MidiMessage::ChannelPressure(channel, _) => status::CHANNEL_PRESSURE | u8::from(*channel),
        MidiMessage::ControlChange(channel, _, _) => status::CONTROL_CHANGE | u8::from(*channel),
        MidiMessage::ProgramChange(channel, _) => status::PROGRAM_CHANGE | u8::from(*channel),
        MidiMessage::KeyPressure(channel, _, _) => status::KEY_PRESSURE | u8::from(*channel),
        MidiMessage::PitchBendChange(channel, _) => status::PITCH_BEND_CHANGE | u8::from(*channel),
        MidiMessage::QuarterFrame(_) => status::QUARTER_FRAME,
        MidiMessage::SongPositionPointer(_) => status::SONG_POSITION_POINTER,
        MidiMessage::SongSelect(_) => status::SONG_SELECT,
        MidiMessage::TuneRequest => status::TUNE_REQUEST,
        MidiMessage::TimingClock => status::TIMING_CLOCK,
        MidiMessage::Start => status::START,
        MidiMessage::Continue => status::CONTINUE,
        MidiMessage::Stop => status::STOP,
        MidiMessage::ActiveSensing => status::ACTIVE_SENSING,
        MidiMessage::Reset => status::RESET,
    }
}

impl MidiCommand for MidiMessage {
    fn command_len(&self) -> usize {
        match self {
            MidiMessage::NoteOn(..)
            | MidiMessage::NoteOff(..)
            | MidiMessage::KeyPressure(..)
            | MidiMessage::ControlChange(..)
            | MidiMessage::PitchBendChange(..)
            | MidiMessage::SongPositionPointer(..) => 3,
            MidiMessage::ProgramChange(..) | MidiMessage::ChannelPressure(..) | MidiMessage::QuarterFrame(..) | MidiMessage::SongSelect(..) => 2,
            MidiMessage::TuneRequest
            | MidiMessage::TimingClock
            | MidiMessage::Start
            | MidiMessage::Continue
            | MidiMessage::Stop
            | MidiMessage::ActiveSensing
            | MidiMessage::Reset => 1,
        }
    }

    fn write_command(&self, bytes: &mut BytesMut) {
        bytes.put_u8(status(self));

        match self {
            MidiMessage::NoteOn(_channel, key, velocity) | MidiMessage::NoteOff(_channel, key, velocity) => {
                bytes.put_u8(Into::into(*key));
                bytes.put_u8(Into::into(*velocity));
            }
            MidiMessage::KeyPressure(_channel, key, pressure) => {
                bytes.put_u8(Into::into(*key));
                bytes.put_u8(Into::into(*pressure));
            }
            MidiMessage::ControlChange(_channel, controller, value) => {
                bytes.put_u8(Into::into(*controller));
                bytes.put_u8(Into::into(*value));
            }
            MidiMessage::ProgramChange(_channel, program) => {
                bytes.put_u8(Into::into(*program));
            }
            MidiMessage::ChannelPressure(_channel, pressure) => {
                bytes.put_u8(Into::into(*pressure));
            }
            MidiMessage::PitchBendChange(_, value) | MidiMessage::SongPositionPointer(value) => {
                // 14-bit values go out LSB first
                let raw: u16 = Into::into(*value);
                bytes.put_u8((raw & 0x7F) as u8);
                bytes.put_u8((raw >> 7) as u8);
            }
            MidiMessage::QuarterFrame(frame) => {
                bytes.put_u8(Into::into(*frame));
            }
            MidiMessage::SongSelect(song) => {
                bytes.put_u8(Into::into(*song));
            }
            _ => {}
        }
    }
}

/// Either a channel/system message or a borrowed System Exclusive payload (without its F0/F7
/// framing bytes).
#[derive(Debug, Clone, PartialEq)]
pub enum RtpMidiMessage<'a> {
    MidiMessage(MidiMessage),
    SysEx(&'a [u8]),
}

impl From<MidiMessage> for RtpMidiMessage<'_> {
    fn from(msg: MidiMessage) -> Self {
        RtpMidiMessage::MidiMessage(msg)
    }
}

impl MidiCommand for RtpMidiMessage<'_> {
    fn command_len(&self) -> usize {
        match self {
            RtpMidiMessage::MidiMessage(msg) => msg.command_len(),
            RtpMidiMessage::SysEx(data) => data.len() + 2,
        }
    }

    fn write_command(&self, bytes: &mut BytesMut) {
        match self {
            RtpMidiMessage::MidiMessage(msg) => msg.write_command(bytes),
            RtpMidiMessage::SysEx(data) => {
                bytes.put_u8(SYSEX_START);
                bytes.extend_from_slice(data);
                bytes.put_u8(SYSEX_END);
            }
        }
    }
}
