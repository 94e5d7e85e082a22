//! CLI client for the TCP session relay.
//!
//! Creates or joins a session, then sends stdin to the other members and
//! writes whatever they send to stdout. The session code of a new session is
//! printed to stderr.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tcp-session-client -- --create
//! cargo run --bin tcp-session-client -- --join Abc1234 < file.bin
//! ```

use clap::{ArgGroup, Parser};
use tcp_session_client::{Admission, ClientError, Request, open_session, relay};
use tcp_session_shared::logger::setup_logger;
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(name = "tcp-session-client")]
#[command(about = "Create or join a relay session and pipe stdin/stdout through it", long_about = None)]
#[command(group(ArgGroup::new("action").required(true).args(["create", "join"])))]
struct Args {
    /// Create a new session
    #[arg(short = 'c', long)]
    create: bool,

    /// Join the session with this code
    #[arg(short = 'j', long, value_name = "CODE")]
    join: Option<String>,

    /// Relay server host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Relay server port
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

async fn run(args: Args) -> Result<(), ClientError> {
    let request = match args.join {
        Some(code) => Request::join(code)?,
        None => Request::Create,
    };

    let addr = format!("{}:{}", args.host, args.port);
    let mut stream = TcpStream::connect(&addr).await?;
    stream.set_nodelay(true)?;
    tracing::info!("Connected to {}", addr);

    match open_session(&mut stream, &request).await? {
        Admission::Created(code) => {
            tracing::info!("Session created");
            eprintln!("{}", code);
        }
        Admission::Joined => tracing::info!("Joined session"),
    }

    let received = relay(stream, tokio::io::stdin(), tokio::io::stdout()).await?;
    tracing::info!("Session closed by server after {} bytes", received);
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    if let Err(e) = run(args).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
