use std::{
    io::{self, Write},
    net::{TcpListener, TcpStream},
    sync::Arc,
    thread,
};

use crossbeam_channel::{Receiver, bounded};
use tempo_proto::ProtoError;
use tempo_series::Registry;
use tracing::{info, warn};

use crate::{actor, conn::Connection};

/// A connection as shared between its reader thread and the writer thread.
/// Reads go through the reader's clone, writes are serialized by living on
/// the single writer thread.
pub(crate) type ConnHandle = Arc<TcpStream>;

/// Marshaled response bytes bound for one connection.
pub(crate) struct ServerResponse {
    pub conn: ConnHandle,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
    #[error("frame decode: {0}")]
    Proto(#[from] ProtoError),
    #[error("operation actor is gone")]
    ActorGone,
    #[error("response writer is gone")]
    WriterGone,
}

/// TCP front of the database.
///
/// One thread accepts, one thread per connection reads and dispatches, a
/// single operation actor applies every series mutation and query, and one
/// writer thread drains the output channel back to the sockets. All
/// channels are rendezvous so a slow stage backpressures its producers
/// instead of buffering unboundedly.
pub struct Server {
    host: String,
    port: u16,
}

impl Server {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }

    /// Binds and serves until the listener fails. Only setup errors are
    /// returned; per-connection failures just end that connection.
    pub fn run(&self) -> Result<(), ServerError> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))?;
        info!("listening on {}:{}", self.host, self.port);

        let registry = Arc::new(Registry::new());
        let (read_tx, read_rx) = bounded(0);
        let (write_tx, write_rx) = bounded(0);
        let (out_tx, out_rx) = bounded(0);

        let actor_out = out_tx.clone();
        thread::Builder::new()
            .name("tempo-actor".into())
            .spawn(move || actor::run_actor(read_rx, write_rx, actor_out))?;
        thread::Builder::new().name("tempo-writer".into()).spawn(move || run_writer(out_rx))?;

        for stream in listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(?err, "accept failed");
                    continue;
                }
            };
            if let Ok(peer) = stream.peer_addr() {
                info!(%peer, "connection accepted");
            }
            let connection = Connection::new(
                Arc::new(stream),
                Arc::clone(&registry),
                read_tx.clone(),
                write_tx.clone(),
                out_tx.clone(),
            );
            thread::Builder::new().name("tempo-conn".into()).spawn(move || connection.serve())?;
        }
        Ok(())
    }
}

fn run_writer(out: Receiver<ServerResponse>) {
    for response in out {
        if let Err(err) = (&*response.conn).write_all(&response.bytes) {
            warn!(?err, "dropping response, peer write failed");
        }
    }
}
