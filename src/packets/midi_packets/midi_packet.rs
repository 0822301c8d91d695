use bytes::Bytes;
use midi_types::{Channel, Control, MidiMessage, Note, Program, QuarterFrame, Value7, Value14, status};

use super::delta_time::read_delta_time;
use super::midi_command::RtpMidiMessage;
use super::midi_command_list_header::{MidiCommandListFlags, MidiCommandListHeader};
use super::midi_packet_header::{MPAYLOAD, MidiPacketHeader, VPXCC};
use crate::packets::codec::WirePacket;
use crate::packets::error::PacketParseError;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

/// A command from a received command list with the delta time that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiEvent<'a> {
    delta_time: u32,
    command: RtpMidiMessage<'a>,
}

impl<'a> MidiEvent<'a> {
    pub fn new(delta_time: u32, command: RtpMidiMessage<'a>) -> Self {
        MidiEvent { delta_time, command }
    }

    pub fn delta_time(&self) -> u32 {
        self.delta_time
    }

    pub fn command(&self) -> &RtpMidiMessage<'a> {
        &self.command
    }
}

/// An RTP-MIDI data packet received from the host.
///
/// [`MidiPacket::parse`] checks the whole command list up front, so [`MidiPacket::commands`]
/// yields every command the packet carries. A recovery journal after the list is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPacket {
    header: MidiPacketHeader,
    flags: MidiCommandListFlags,
    command_list: Bytes,
}

impl MidiPacket {
    pub fn parse(datagram: &[u8]) -> Result<Self, PacketParseError> {
        let header = MidiPacketHeader::from_network_bytes(datagram)?;
        if header.vpxcc & 0xC0 != VPXCC || header.mpayload & 0x7F != MPAYLOAD {
            return Err(PacketParseError::NotMidiPacket {
                vpxcc: header.vpxcc,
                mpayload: header.mpayload,
            });
        }

        let (list_header, body) = MidiCommandListHeader::read(&datagram[MidiPacketHeader::SIZE..])?;
        let length = list_header.length();
        if body.len() < length {
            return Err(PacketParseError::ShortRead {
                expected: length,
                actual: body.len(),
            });
        }

        let mut events = MidiEventReader::new(&body[..length], list_header.flags().z_flag());
        while let Some(event) = events.read_next() {
            event?;
        }

        Ok(MidiPacket {
            header,
            flags: *list_header.flags(),
            command_list: Bytes::copy_from_slice(&body[..length]),
        })
    }

    pub fn sequence_number(&self) -> u16 {
        self.header.sequence_number.get()
    }

    pub fn timestamp(&self) -> u32 {
        self.header.timestamp.get()
    }

    pub fn ssrc(&self) -> u32 {
        self.header.sender_ssrc.get()
    }

    pub fn has_journal(&self) -> bool {
        self.flags.j_flag()
    }

    pub fn commands(&self) -> impl Iterator<Item = MidiEvent<'_>> {
        let mut events = MidiEventReader::new(&self.command_list, self.flags.z_flag());
        std::iter::from_fn(move || events.read_next().and_then(Result::ok))
    }
}

struct MidiEventReader<'a> {
    data: &'a [u8],
    running_status: Option<u8>,
    read_delta_time: bool,
}

impl<'a> MidiEventReader<'a> {
    fn new(data: &'a [u8], z_flag: bool) -> Self {
        MidiEventReader {
            data,
            running_status: None,
            read_delta_time: z_flag,
        }
    }

    /// Stops after the first malformed command.
    fn read_next(&mut self) -> Option<Result<MidiEvent<'a>, PacketParseError>> {
        if self.data.is_empty() {
            return None;
        }

        let event = self.read_event();
        if event.is_err() {
            self.data = &[];
        }
        Some(event)
    }

    fn read_event(&mut self) -> Result<MidiEvent<'a>, PacketParseError> {
        let mut data = self.data;
        let mut delta_time = 0;
        if self.read_delta_time {
            (delta_time, data) = read_delta_time(data)?;
        }

        let (status_byte, data) = match data.first() {
            Some(&byte) if byte & 0x80 != 0 => (byte, &data[1..]),
            Some(_) => (self.running_status.ok_or(PacketParseError::MissingRunningStatus)?, data),
            None => return Err(PacketParseError::ShortRead { expected: 1, actual: 0 }),
        };

        let (command, rest) = read_command(status_byte, data)?;
        match status_byte {
            0x80..=0xEF => self.running_status = Some(status_byte),
            0xF0..=0xF7 => self.running_status = None,
            _ => {}
        }

        self.data = rest;
        self.read_delta_time = true;
        Ok(MidiEvent::new(delta_time, command))
    }
}

fn data_len(status_byte: u8) -> Result<usize, PacketParseError> {
    match status_byte {
        0x80..=0xBF | 0xE0..=0xEF | status::SONG_POSITION_POINTER => Ok(2),
        0xC0..=0xDF | status::QUARTER_FRAME | status::SONG_SELECT => Ok(1),
        status::TUNE_REQUEST
        | status::TIMING_CLOCK
        | status::START
        | status::CONTINUE
        | status::STOP
        | status::ACTIVE_SENSING
        | status::RESET => Ok(0),
        _ => Err(PacketParseError::UnsupportedStatus(status_byte)),
    }
}

fn read_command(status_byte: u8, data: &[u8]) -> Result<(RtpMidiMessage<'_>, &[u8]), PacketParseError> {
    if status_byte == SYSEX_START {
        let end = data.iter().position(|&b| b == SYSEX_END).ok_or(PacketParseError::UnterminatedSysEx)?;
        return Ok((RtpMidiMessage::SysEx(&data[..end]), &data[end + 1..]));
    }

    let len = data_len(status_byte)?;
    if data.len() < len || data[..len].iter().any(|b| b & 0x80 != 0) {
        return Err(PacketParseError::TruncatedCommand(status_byte));
    }
    let (d, rest) = data.split_at(len);

    let channel = Channel::from(status_byte & 0x0F);
    let message = match status_byte {
        0x80..=0x8F => MidiMessage::NoteOff(channel, Note::from(d[0]), Value7::from(d[1])),
        0x90..=0x9F => MidiMessage::NoteOn(channel, Note::from(d[0]), Value7::from(d[1])),
        0xA0..=0xAF => MidiMessage::KeyPressure(channel, Note::from(d[0]), Value7::from(d[1])),
        0xB0..=0xBF => MidiMessage::ControlChange(channel, Control::from(d[0]), Value7::from(d[1])),
        0xC0..=0xCF => MidiMessage::ProgramChange(channel, Program::from(d[0])),
        0xD0..=0xDF => MidiMessage::ChannelPressure(channel, Value7::from(d[0])),
        0xE0..=0xEF => MidiMessage::PitchBendChange(channel, value14(d[0], d[1])),
        status::QUARTER_FRAME => MidiMessage::QuarterFrame(QuarterFrame::from(d[0])),
        status::SONG_POSITION_POINTER => MidiMessage::SongPositionPointer(value14(d[0], d[1])),
        status::SONG_SELECT => MidiMessage::SongSelect(Value7::from(d[0])),
        status::TUNE_REQUEST => MidiMessage::TuneRequest,
        status::TIMING_CLOCK => MidiMessage::TimingClock,
        status::START => MidiMessage::Start,
        status::CONTINUE => MidiMessage::Continue,
        status::STOP => MidiMessage::Stop,
        status::ACTIVE_SENSING => MidiMessage::ActiveSensing,
        _ => MidiMessage::Reset,
    };
    Ok((RtpMidiMessage::MidiMessage(message), rest))
}

// 14-bit values arrive LSB first
fn value14(lsb: u8, msb: u8) -> Value14 {
    Value14::from((u16::from(msb) << 7) | u16::from(lsb))
}
