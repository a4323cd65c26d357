use clap::Parser;
use tempo_server::Server;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// In-memory time-series database server.
#[derive(Parser, Debug)]
#[command(name = "tpd", version)]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "localhost")]
    host: String,
    /// Port to listen on.
    #[arg(long, default_value_t = 4040)]
    port: u16,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    if let Err(err) = Server::new(args.host, args.port).run() {
        error!(?err, "server terminated");
        std::process::exit(1);
    }
}
