use std::{
    io::Read,
    net::Shutdown,
    sync::Arc,
};

use crossbeam_channel::Sender;
use tempo_proto::{
    AddPointPacket, CreatePacket, DeletePacket, Header, Opcode, QueryPacket, Status, ack_frame,
};
use tempo_series::{Record, Registry, TimeSeries, now_ns};
use tracing::{debug, info, warn};

use crate::{
    actor::{ReadOp, WriteOp},
    server::{ConnHandle, ServerError, ServerResponse},
};

/// Requests are small: a u16 name plus a handful of fixed fields. Anything
/// claiming more payload than this is a broken or hostile peer.
const MAX_REQUEST_PAYLOAD: u64 = 128 * 1024;

/// Reader side of one client connection.
///
/// Loops header -> payload -> dispatch until the peer goes away or a frame
/// fails to decode. Semantic failures (unknown series, duplicate create)
/// are answered with a status and keep the connection; anything the codec
/// rejects tears it down without a reply.
pub(crate) struct Connection {
    stream: ConnHandle,
    registry: Arc<Registry>,
    read_ops: Sender<ReadOp>,
    write_ops: Sender<WriteOp>,
    out: Sender<ServerResponse>,
}

impl Connection {
    pub(crate) fn new(
        stream: ConnHandle,
        registry: Arc<Registry>,
        read_ops: Sender<ReadOp>,
        write_ops: Sender<WriteOp>,
        out: Sender<ServerResponse>,
    ) -> Self {
        Self { stream, registry, read_ops, write_ops, out }
    }

    pub(crate) fn serve(self) {
        if let Err(err) = self.read_loop() {
            debug!(?err, "closing connection");
        }
        let _ = self.stream.shutdown(Shutdown::Both);
    }

    fn read_loop(&self) -> Result<(), ServerError> {
        let mut reader = &*self.stream;
        loop {
            let mut header_buf = [0u8; Header::SIZE];
            if let Err(err) = reader.read_exact(&mut header_buf) {
                debug!(?err, "peer gone");
                return Ok(());
            }
            let header = Header::decode(&header_buf)?;
            if header.payload_len() > MAX_REQUEST_PAYLOAD {
                warn!(size = header.payload_len(), "oversized request payload");
                return Ok(());
            }
            let mut payload = vec![0u8; header.payload_len() as usize];
            if let Err(err) = reader.read_exact(&mut payload) {
                debug!(?err, "peer gone mid payload");
                return Ok(());
            }
            self.dispatch(&header, &payload)?;
        }
    }

    /// Routes one decoded frame. Decode failures bubble up and close the
    /// connection; everything else answers on the output channel.
    fn dispatch(&self, header: &Header, payload: &[u8]) -> Result<(), ServerError> {
        let Ok(opcode) = Opcode::from_raw(header.opcode_raw()) else {
            debug!(opcode = header.opcode_raw(), "unknown command");
            return self.respond(ack_frame(Opcode::Ack, Status::UnknownCmd));
        };
        match opcode {
            Opcode::Create => {
                let create = CreatePacket::decode(payload)?;
                let series = TimeSeries::new(&create.name, create.retention);
                let status = if self.registry.insert_if_absent(series) {
                    info!(name = %create.name, retention = create.retention, "created series");
                    Status::Ok
                } else {
                    debug!(name = %create.name, "series already exists");
                    Status::TsExists
                };
                self.respond(ack_frame(Opcode::Ack, status))
            }
            Opcode::Delete => {
                let delete = DeletePacket::decode(payload)?;
                self.registry.delete(&delete.name);
                info!(name = %delete.name, "deleted series");
                self.respond(ack_frame(Opcode::Ack, Status::Ok))
            }
            Opcode::AddPoint => {
                let mut add = AddPointPacket::decode(payload)?;
                if !add.have_timestamp {
                    add.timestamp = now_ns();
                }
                match self.registry.get(&add.name) {
                    None => self.respond(ack_frame(Opcode::Ack, Status::TsNotFound)),
                    Some(series) => {
                        // hand the append to the actor first, then accept;
                        // the write itself produces no response
                        let record = Record::new(add.timestamp, add.value);
                        self.write_ops
                            .send(WriteOp { series, record })
                            .map_err(|_| ServerError::ActorGone)?;
                        self.respond(ack_frame(Opcode::Ack, Status::Accepted))
                    }
                }
            }
            Opcode::Query => {
                let query = QueryPacket::decode(payload)?;
                match self.registry.get(&query.name) {
                    // the miss reply carries the QUERYRESPONSE opcode, a
                    // quirk existing clients rely on
                    None => self.respond(ack_frame(Opcode::QueryResponse, Status::TsNotFound)),
                    Some(series) => self
                        .read_ops
                        .send(ReadOp { conn: Arc::clone(&self.stream), series, query })
                        .map_err(|_| ServerError::ActorGone),
                }
            }
            Opcode::MAddPoint | Opcode::QueryResponse | Opcode::Ack => {
                debug!(opcode = header.opcode_raw(), "unknown command");
                self.respond(ack_frame(Opcode::Ack, Status::UnknownCmd))
            }
        }
    }

    fn respond(&self, bytes: Vec<u8>) -> Result<(), ServerError> {
        self.out
            .send(ServerResponse { conn: Arc::clone(&self.stream), bytes })
            .map_err(|_| ServerError::WriterGone)
    }
}
