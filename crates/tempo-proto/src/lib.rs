mod error;
mod header;
mod packet;

pub use error::ProtoError;
pub use tempo_series::Record;
pub use header::{Header, Opcode, Status};
pub use packet::{
    Agg, AddPointPacket, CreatePacket, DeletePacket, MAX_NAME_LEN, QueryPacket,
    QueryResponsePacket, ack_frame, query_response_frame,
};
