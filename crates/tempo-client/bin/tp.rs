use std::io::{self, BufRead, Write};

use clap::Parser;
use tempo_client::Client;

/// Interactive prompt for the tempo server.
#[derive(Parser, Debug)]
#[command(name = "tp", version)]
struct Args {
    /// Server host to dial.
    #[arg(long, default_value = "localhost")]
    host: String,
    /// Server port.
    #[arg(long, default_value_t = 4040)]
    port: u16,
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    let mut client = match Client::connect(&args.host, args.port) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("(error) - {err}");
            std::process::exit(1);
        }
    };

    let prompt = format!("{}:{}> ", args.host, args.port);
    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("{prompt}");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.eq_ignore_ascii_case("QUIT") {
            break;
        }
        match client.send_line(input) {
            Ok(response) => println!("{response}"),
            Err(err) => eprintln!("(error) - {err}"),
        }
    }
    Ok(())
}
