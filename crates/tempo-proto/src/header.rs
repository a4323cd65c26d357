use bytes::{Buf, BufMut};

use crate::ProtoError;

/// Packet type tag carried in the high nibble of the header byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Create = 0,
    Delete = 1,
    AddPoint = 2,
    MAddPoint = 3,
    Query = 4,
    QueryResponse = 5,
    Ack = 6,
}

impl Opcode {
    pub fn from_raw(raw: u8) -> Result<Self, ProtoError> {
        Ok(match raw {
            0 => Self::Create,
            1 => Self::Delete,
            2 => Self::AddPoint,
            3 => Self::MAddPoint,
            4 => Self::Query,
            5 => Self::QueryResponse,
            6 => Self::Ack,
            other => return Err(ProtoError::UnknownOpcode(other)),
        })
    }
}

/// Result code delivered in ACK replies.
///
/// The wire field is only two bits wide, so `UnknownCmd` (4) aliases `Ok`
/// once packed. Kept as is for compatibility with existing clients.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Accepted = 1,
    TsNotFound = 2,
    TsExists = 3,
    UnknownCmd = 4,
}

impl Status {
    fn from_wire(raw: u8) -> Self {
        match raw & 0x03 {
            0 => Self::Ok,
            1 => Self::Accepted,
            2 => Self::TsNotFound,
            _ => Self::TsExists,
        }
    }
}

/// Fixed frame header: one packed opcode + status byte followed by the
/// payload length in bytes, big endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Header {
    value: u8,
    size: u64,
}

impl Header {
    pub const SIZE: usize = 9;

    pub fn new(opcode: Opcode) -> Self {
        let mut header = Self::default();
        header.set_opcode(opcode);
        header
    }

    /// Header only reply (no payload) with the given opcode and status.
    pub fn ack(opcode: Opcode, status: Status) -> Self {
        let mut header = Self::new(opcode);
        header.set_status(status);
        header
    }

    #[inline]
    pub fn payload_len(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn set_payload_len(&mut self, size: u64) {
        self.size = size;
    }

    #[inline]
    pub fn opcode_raw(&self) -> u8 {
        self.value >> 4
    }

    pub fn opcode(&self) -> Result<Opcode, ProtoError> {
        Opcode::from_raw(self.opcode_raw())
    }

    pub fn set_opcode(&mut self, opcode: Opcode) {
        self.value &= 0x0F;
        self.value |= ((opcode as u8) << 4) & 0xF0;
    }

    pub fn status(&self) -> Status {
        Status::from_wire((self.value >> 1) & 0x03)
    }

    /// Masks the two wire bits first so repeated calls don't accumulate.
    pub fn set_status(&mut self, status: Status) {
        self.value &= !0x06;
        self.value |= ((status as u8) << 1) & 0x06;
    }

    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u8(self.value);
        buf.put_u64(self.size);
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.remaining() < Self::SIZE {
            return Err(ProtoError::Truncated);
        }
        let value = buf.get_u8();
        let size = buf.get_u64();
        Ok(Self { value, size })
    }
}
