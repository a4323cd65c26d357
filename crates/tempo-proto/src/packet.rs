use bytes::{Buf, BufMut};
use tempo_series::Record;

use crate::{Header, Opcode, ProtoError, Status};

/// Names are length prefixed by a u16 on the wire.
pub const MAX_NAME_LEN: usize = u16::MAX as usize;

/// Aggregation selector, carried shifted left by one in the query flags
/// byte. A flags byte of zero selects range/average mode instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Agg {
    Min = 1,
    Max = 2,
    First = 3,
    Last = 4,
}

impl Agg {
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags >> 1) & 0x07 {
            1 => Some(Self::Min),
            2 => Some(Self::Max),
            3 => Some(Self::First),
            4 => Some(Self::Last),
            _ => None,
        }
    }

    #[inline]
    pub fn to_flags(self) -> u8 {
        (self as u8) << 1
    }
}

fn put_name(buf: &mut Vec<u8>, name: &str) -> Result<(), ProtoError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ProtoError::NameLength(name.len()));
    }
    buf.put_u16(name.len() as u16);
    buf.put_slice(name.as_bytes());
    Ok(())
}

fn get_name(buf: &mut &[u8]) -> Result<String, ProtoError> {
    if buf.remaining() < 2 {
        return Err(ProtoError::Truncated);
    }
    let len = buf.get_u16() as usize;
    if len == 0 {
        return Err(ProtoError::NameLength(0));
    }
    if buf.remaining() < len {
        return Err(ProtoError::Truncated);
    }
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    Ok(String::from_utf8(raw)?)
}

/// CREATE body: name plus an advisory retention in nanos.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreatePacket {
    pub name: String,
    pub retention: i64,
}

impl CreatePacket {
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
        put_name(buf, &self.name)?;
        buf.put_i64(self.retention);
        Ok(())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtoError> {
        let name = get_name(&mut buf)?;
        if buf.remaining() < 8 {
            return Err(ProtoError::Truncated);
        }
        Ok(Self { name, retention: buf.get_i64() })
    }
}

/// DELETE body: just the name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeletePacket {
    pub name: String,
}

impl DeletePacket {
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
        put_name(buf, &self.name)
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtoError> {
        Ok(Self { name: get_name(&mut buf)? })
    }
}

/// ADDPOINT body. The timestamp is always encoded; decode only reads it
/// when `have_timestamp` is set, tolerating senders that leave it off.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AddPointPacket {
    pub name: String,
    pub have_timestamp: bool,
    pub value: f64,
    pub timestamp: i64,
}

impl AddPointPacket {
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
        put_name(buf, &self.name)?;
        buf.put_u8(u8::from(self.have_timestamp));
        buf.put_f64(self.value);
        buf.put_i64(self.timestamp);
        Ok(())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtoError> {
        let name = get_name(&mut buf)?;
        if buf.remaining() < 9 {
            return Err(ProtoError::Truncated);
        }
        let have_timestamp = buf.get_u8() != 0;
        let value = buf.get_f64();
        let timestamp = if have_timestamp {
            if buf.remaining() < 8 {
                return Err(ProtoError::Truncated);
            }
            buf.get_i64()
        } else {
            0
        };
        Ok(Self { name, have_timestamp, value, timestamp })
    }
}

/// QUERY body: aggregation flags, inclusive timestamp range (zero meaning
/// unbounded on that side) and the averaging interval selector
/// (`-1` raw records, `0` one overall mean, `> 0` bucketed means).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryPacket {
    pub name: String,
    pub flags: u8,
    pub range: [i64; 2],
    pub avg_interval_ms: i64,
}

impl QueryPacket {
    pub fn agg(&self) -> Option<Agg> {
        Agg::from_flags(self.flags)
    }

    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), ProtoError> {
        put_name(buf, &self.name)?;
        buf.put_u8(self.flags);
        buf.put_i64(self.range[0]);
        buf.put_i64(self.range[1]);
        buf.put_i64(self.avg_interval_ms);
        Ok(())
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtoError> {
        let name = get_name(&mut buf)?;
        if buf.remaining() < 25 {
            return Err(ProtoError::Truncated);
        }
        let flags = buf.get_u8();
        let range = [buf.get_i64(), buf.get_i64()];
        let avg_interval_ms = buf.get_i64();
        Ok(Self { name, flags, range, avg_interval_ms })
    }
}

/// QUERYRESPONSE body: record count then the records themselves.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryResponsePacket {
    pub records: Vec<Record>,
}

impl QueryResponsePacket {
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.put_u64(self.records.len() as u64);
        for record in &self.records {
            buf.put_i64(record.timestamp);
            buf.put_f64(record.value);
        }
    }

    pub fn decode(mut buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.remaining() < 8 {
            return Err(ProtoError::Truncated);
        }
        let count = buf.get_u64() as usize;
        if buf.remaining() < count.saturating_mul(16) {
            return Err(ProtoError::Truncated);
        }
        let mut records = Vec::with_capacity(count);
        for _ in 0..count {
            let timestamp = buf.get_i64();
            let value = buf.get_f64();
            records.push(Record::new(timestamp, value));
        }
        Ok(Self { records })
    }
}

/// Marshals a header only reply.
pub fn ack_frame(opcode: Opcode, status: Status) -> Vec<u8> {
    let mut buf = Vec::with_capacity(Header::SIZE);
    Header::ack(opcode, status).encode(&mut buf);
    buf
}

/// Marshals a full QUERYRESPONSE frame with an `Ok` status.
pub fn query_response_frame(packet: &QueryResponsePacket) -> Vec<u8> {
    let mut payload = Vec::with_capacity(8 + packet.records.len() * 16);
    packet.encode(&mut payload);
    let mut header = Header::ack(Opcode::QueryResponse, Status::Ok);
    header.set_payload_len(payload.len() as u64);
    let mut buf = Vec::with_capacity(Header::SIZE + payload.len());
    header.encode(&mut buf);
    buf.extend_from_slice(&payload);
    buf
}
