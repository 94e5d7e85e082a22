//! TCP session relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tcp-session-server
//! cargo run --bin tcp-session-server -- --host 0.0.0.0 --port 3000 --max-sessions 1000
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tcp_session_server::{
    config::{
        DEFAULT_BACKPRESSURE_CEILING, DEFAULT_MAX_CODE_ATTEMPTS, DEFAULT_MAX_SESSIONS,
        DEFAULT_MAX_USERS_PER_SESSION, DEFAULT_READ_CHUNK_SIZE, DEFAULT_SEND_QUEUE_DEPTH,
        RelayConfig,
    },
    infrastructure::repository::InMemorySessionRepository,
    ui::Server,
    usecase::{CreateSessionUseCase, JoinSessionUseCase, LeaveSessionUseCase, SendDataUseCase},
};
use tcp_session_shared::{logger::setup_logger, protocol::SESSION_CODE_LENGTH};

#[derive(Parser, Debug)]
#[command(name = "tcp-session-server")]
#[command(about = "Relay server for code-addressed TCP sessions", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Maximum number of live sessions
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS)]
    max_sessions: usize,

    /// Maximum number of members in one session
    #[arg(long, default_value_t = DEFAULT_MAX_USERS_PER_SESSION)]
    max_users_per_session: usize,

    /// Bytes read from a member per chunk
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK_SIZE)]
    read_chunk_size: usize,

    /// Chunks queued per member before writes wait
    #[arg(long, default_value_t = DEFAULT_SEND_QUEUE_DEPTH)]
    send_queue_depth: usize,

    /// Unwritten bytes at which a member is disconnected as a slow consumer
    #[arg(long, default_value_t = DEFAULT_BACKPRESSURE_CEILING)]
    backpressure_ceiling: usize,

    /// Deadline for a single socket write, in milliseconds
    #[arg(long, default_value_t = 200)]
    write_timeout_ms: u64,

    /// Delay before closing a rejected connection, in milliseconds
    #[arg(long, default_value_t = 500)]
    close_delay_ms: u64,

    /// Time a new connection has to send its request, in milliseconds
    #[arg(long, default_value_t = 5000)]
    handshake_timeout_ms: u64,

    /// Random session codes tried before creation fails
    #[arg(long, default_value_t = DEFAULT_MAX_CODE_ATTEMPTS)]
    max_code_attempts: usize,
}

impl Args {
    fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_sessions: self.max_sessions,
            max_users_per_session: self.max_users_per_session,
            session_code_length: SESSION_CODE_LENGTH,
            read_chunk_size: self.read_chunk_size,
            send_queue_depth: self.send_queue_depth,
            backpressure_ceiling: self.backpressure_ceiling,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            close_delay: Duration::from_millis(self.close_delay_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
            max_code_attempts: self.max_code_attempts,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    let config = args.relay_config();
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    // Initialize dependencies in order:
    // 1. Repository
    // 2. UseCases
    // 3. Server

    // 1. Create Repository (in-memory session directory)
    let repository = Arc::new(InMemorySessionRepository::new(config.max_sessions));

    // 2. Create UseCases
    let create_session_usecase = Arc::new(CreateSessionUseCase::new(
        repository.clone(),
        config.max_users_per_session,
        config.session_code_length,
        config.max_code_attempts,
    ));
    let join_session_usecase = Arc::new(JoinSessionUseCase::new(
        repository.clone(),
        config.session_code_length,
    ));
    let send_data_usecase = Arc::new(SendDataUseCase::new());
    let leave_session_usecase = Arc::new(LeaveSessionUseCase::new(repository.clone()));

    // 3. Create and run the server
    let server = Server::new(
        create_session_usecase,
        join_session_usecase,
        send_data_usecase,
        leave_session_usecase,
        config,
    );
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
