use std::{
    fmt,
    io::{self, BufReader, Read, Write},
    net::TcpStream,
};

use tempo_proto::{
    AddPointPacket, CreatePacket, DeletePacket, Header, Opcode, ProtoError, QueryPacket,
    QueryResponsePacket, Status,
};
use thiserror::Error;

use crate::command::{Command, CommandError, CommandKind, Parser};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Proto(#[from] ProtoError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Blocking wrapper around one server connection. Commands go out as one
/// frame each and the reply is read back before returning.
pub struct Client {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    pub fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        let stream = TcpStream::connect((host, port))?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self { stream, reader })
    }

    /// Parses one line, sends the request and decodes the reply.
    pub fn send_line(&mut self, line: &str) -> Result<Response, ClientError> {
        let command = Parser::new(line).parse()?;
        let frame = request_frame(&command)?;
        self.stream.write_all(&frame)?;

        let mut header_buf = [0u8; Header::SIZE];
        self.reader.read_exact(&mut header_buf)?;
        let header = Header::decode(&header_buf)?;
        if header.opcode_raw() == Opcode::Ack as u8 {
            return Ok(Response { header, command, records: QueryResponsePacket::default() });
        }
        let mut payload = vec![0u8; header.payload_len() as usize];
        self.reader.read_exact(&mut payload)?;
        let records = QueryResponsePacket::decode(&payload)?;
        Ok(Response { header, command, records })
    }
}

/// Marshals one command into a request frame.
fn request_frame(command: &Command) -> Result<Vec<u8>, ProtoError> {
    let mut payload = Vec::new();
    let opcode = match command.kind {
        CommandKind::Create => {
            CreatePacket { name: command.name.clone(), retention: command.retention }
                .encode(&mut payload)?;
            Opcode::Create
        }
        CommandKind::Delete => {
            DeletePacket { name: command.name.clone() }.encode(&mut payload)?;
            Opcode::Delete
        }
        CommandKind::Add => {
            AddPointPacket {
                name: command.name.clone(),
                have_timestamp: command.timestamp != 0,
                value: command.value,
                timestamp: command.timestamp,
            }
            .encode(&mut payload)?;
            Opcode::AddPoint
        }
        // reserved: goes out as a bare header, answered UNKNOWNCMD
        CommandKind::MAdd => Opcode::MAddPoint,
        CommandKind::Query => {
            QueryPacket {
                name: command.name.clone(),
                flags: command.flag,
                range: [command.range.0, command.range.1],
                avg_interval_ms: command.avg_interval_ms,
            }
            .encode(&mut payload)?;
            Opcode::Query
        }
    };
    let mut header = Header::new(opcode);
    header.set_payload_len(payload.len() as u64);
    let mut frame = Vec::with_capacity(Header::SIZE + payload.len());
    header.encode(&mut frame);
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decoded reply paired with the command it answers, for rendering.
pub struct Response {
    pub header: Header,
    pub command: Command,
    pub records: QueryResponsePacket,
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.header.opcode_raw() == Opcode::Ack as u8 {
            return match self.header.status() {
                Status::Ok => write!(f, "(ok)"),
                Status::Accepted => write!(f, "(accepted)"),
                Status::TsExists => {
                    write!(f, "(error) - timeseries already exists: {}", self.command.name)
                }
                Status::TsNotFound => {
                    write!(f, "(error) - timeseries not found: {}", self.command.name)
                }
                Status::UnknownCmd => write!(f, "(error) - unknown command"),
            };
        }
        if self.records.records.is_empty() {
            return write!(f, "(empty)");
        }
        writeln!(f)?;
        writeln!(f, "name: {}", self.command.name)?;
        writeln!(f, "retention: {}", self.command.retention)?;
        writeln!(f, "timestamp\t\tvalue")?;
        writeln!(f, "---------\t\t-----")?;
        for record in &self.records.records {
            writeln!(f, "{} {}", record.timestamp, record.value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_for(line: &str) -> Vec<u8> {
        request_frame(&Parser::new(line).parse().unwrap()).unwrap()
    }

    #[test]
    fn create_request_frame() {
        let frame = frame_for("CREATE ts-test 3000");
        // opcode 0, 17 byte payload
        assert_eq!(frame[0], 0x00);
        assert_eq!(frame[1..9], [0, 0, 0, 0, 0, 0, 0, 17]);
        assert_eq!(
            frame[9..],
            [0, 7, b't', b's', b'-', b't', b'e', b's', b't', 0, 0, 0, 0, 0, 0, 0x0B, 0xB8]
        );
    }

    #[test]
    fn delete_request_frame() {
        let frame = frame_for("DELETE ts-test");
        assert_eq!(frame[0], 0x10);
        assert_eq!(frame.len(), Header::SIZE + 9);
    }

    #[test]
    fn add_request_frame_without_timestamp() {
        let frame = frame_for("ADD ts-test * 2.29");
        assert_eq!(frame[0], 0x20);
        assert_eq!(frame.len(), Header::SIZE + 26);
        let expected = [
            0x00, 0x07, b't', b's', b'-', b't', b'e', b's', b't', 0x00, 0x40, 0x02, 0x51, 0xEB,
            0x85, 0x1E, 0xB8, 0x52, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(frame[9..], expected);
    }

    #[test]
    fn query_request_frame() {
        let frame = frame_for("QUERY ts-test MAX");
        assert_eq!(frame[0], 0x40);
        // flags byte right after the name
        assert_eq!(frame[18], 2 << 1);
    }

    #[test]
    fn ack_renders_from_status() {
        let render = |opcode, status, name: &str| {
            let response = Response {
                header: Header::ack(opcode, status),
                command: Command { name: name.into(), ..Default::default() },
                records: QueryResponsePacket::default(),
            };
            response.to_string()
        };
        assert_eq!(render(Opcode::Ack, Status::Ok, "t"), "(ok)");
        assert_eq!(render(Opcode::Ack, Status::Accepted, "t"), "(accepted)");
        assert_eq!(
            render(Opcode::Ack, Status::TsExists, "cpu"),
            "(error) - timeseries already exists: cpu"
        );
        assert_eq!(
            render(Opcode::Ack, Status::TsNotFound, "cpu"),
            "(error) - timeseries not found: cpu"
        );
    }

    #[test]
    fn empty_result_renders_empty() {
        let response = Response {
            header: Header::ack(Opcode::QueryResponse, Status::Ok),
            command: Command::default(),
            records: QueryResponsePacket::default(),
        };
        assert_eq!(response.to_string(), "(empty)");
    }

    #[test]
    fn records_render_as_a_table() {
        let response = Response {
            header: Header::ack(Opcode::QueryResponse, Status::Ok),
            command: Command { name: "cpu".into(), retention: 3000, ..Default::default() },
            records: QueryResponsePacket {
                records: vec![
                    tempo_proto::Record::new(21424, 98.2),
                    tempo_proto::Record::new(28732, 99.42),
                ],
            },
        };
        let rendered = response.to_string();
        assert!(rendered.starts_with("\nname: cpu\nretention: 3000\n"));
        assert!(rendered.contains("timestamp\t\tvalue\n---------\t\t-----\n"));
        assert!(rendered.ends_with("21424 98.2\n28732 99.42\n"));
    }
}
