//! Integration tests for the relay server, driven by raw TCP clients.
//!
//! Each test starts its own server in-process on an ephemeral port.

use std::{collections::HashSet, net::SocketAddr, sync::Arc, time::Duration};

use tcp_session_server::{
    config::RelayConfig,
    infrastructure::repository::InMemorySessionRepository,
    ui::Server,
    usecase::{CreateSessionUseCase, JoinSessionUseCase, LeaveSessionUseCase, SendDataUseCase},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpSocket, TcpStream},
    sync::oneshot,
    time::{sleep, timeout},
};

const SUCCESS: u8 = 0x00;
const SESSION_NOT_FOUND: u8 = 0x02;
const SESSION_FULL: u8 = 0x03;
const SERVER_FULL: u8 = 0x04;
const INVALID_ACTION: u8 = 0x05;

/// Helper struct to manage the in-process server lifecycle
struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Start a server on 127.0.0.1 with an ephemeral port
    async fn start(config: RelayConfig) -> Self {
        config.validate().expect("test config must be valid");
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let repository = Arc::new(InMemorySessionRepository::new(config.max_sessions));
        let server = Server::new(
            Arc::new(CreateSessionUseCase::new(
                repository.clone(),
                config.max_users_per_session,
                config.session_code_length,
                config.max_code_attempts,
            )),
            Arc::new(JoinSessionUseCase::new(
                repository.clone(),
                config.session_code_length,
            )),
            Arc::new(SendDataUseCase::new()),
            Arc::new(LeaveSessionUseCase::new(repository.clone())),
            config,
        );

        let (shutdown, shutdown_rx) = oneshot::channel();
        tokio::spawn(server.serve(listener, async move {
            let _ = shutdown_rx.await;
        }));

        TestServer {
            addr,
            shutdown: Some(shutdown),
        }
    }

    async fn connect(&self) -> TcpStream {
        TcpStream::connect(self.addr).await.unwrap()
    }

    /// Create a session and return the creator's connection and the code
    async fn create(&self) -> (TcpStream, Vec<u8>) {
        let mut stream = self.connect().await;
        stream.write_all(&[0x00]).await.unwrap();
        assert_eq!(read_status(&mut stream).await, SUCCESS);
        let mut code = vec![0u8; 7];
        timeout(Duration::from_secs(5), stream.read_exact(&mut code))
            .await
            .expect("timed out waiting for the session code")
            .unwrap();
        (stream, code)
    }

    /// Send a join request on `stream` and return the status byte
    async fn join_on(&self, mut stream: TcpStream, code: &[u8]) -> (TcpStream, u8) {
        let mut request = vec![0x01];
        request.extend_from_slice(code);
        stream.write_all(&request).await.unwrap();
        let status = read_status(&mut stream).await;
        (stream, status)
    }

    async fn join(&self, code: &[u8]) -> (TcpStream, u8) {
        let stream = self.connect().await;
        self.join_on(stream, code).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Stop accepting when the test ends
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

fn test_config() -> RelayConfig {
    RelayConfig {
        close_delay: Duration::from_millis(50),
        ..RelayConfig::default()
    }
}

async fn read_status(stream: &mut TcpStream) -> u8 {
    let mut status = [0u8; 1];
    timeout(Duration::from_secs(5), stream.read_exact(&mut status))
        .await
        .expect("timed out waiting for a status byte")
        .unwrap();
    status[0]
}

/// Wait until the server closes `stream`, discarding anything still in flight
async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = vec![0u8; 64 * 1024];
    timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await
    .expect("server did not close the connection");
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_session_returns_code() {
    // テスト項目: 作成リクエストに SUCCESS と 7 バイトの英数字コードが返る
    // given (前提条件):
    let server = TestServer::start(test_config()).await;

    // when (操作):
    let (_creator, code) = server.create().await;

    // then (期待する結果):
    assert_eq!(code.len(), 7);
    assert!(code.iter().all(u8::is_ascii_alphanumeric));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fifth_join_gets_session_full() {
    // テスト項目: 4 人の参加は成功し、5 人目は SESSION_FULL で切断される
    // given (前提条件):
    let server = TestServer::start(test_config()).await;
    let (_creator, code) = server.create().await;
    let mut joiners = Vec::new();
    for _ in 0..4 {
        let (stream, status) = server.join(&code).await;
        assert_eq!(status, SUCCESS);
        joiners.push(stream);
    }

    // when (操作):
    let (mut fifth, status) = server.join(&code).await;

    // then (期待する結果):
    assert_eq!(status, SESSION_FULL);
    expect_closed(&mut fifth).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unknown_code_gets_session_not_found() {
    // テスト項目: 存在しないコードへの参加は SESSION_NOT_FOUND で切断される
    // given (前提条件):
    let server = TestServer::start(test_config()).await;

    // when (操作):
    let (mut stream, status) = server.join(b"Zz9Zz9Z").await;

    // then (期待する結果):
    assert_eq!(status, SESSION_NOT_FOUND);
    expect_closed(&mut stream).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unknown_action_gets_invalid_action() {
    // テスト項目: 未知のアクションは INVALID_ACTION で切断される
    // given (前提条件):
    let server = TestServer::start(test_config()).await;
    let mut stream = server.connect().await;

    // when (操作):
    stream.write_all(&[0x09]).await.unwrap();

    // then (期待する結果):
    assert_eq!(read_status(&mut stream).await, INVALID_ACTION);
    expect_closed(&mut stream).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_truncated_join_times_out_with_invalid_action() {
    // テスト項目: コードが揃わないまま待たせると INVALID_ACTION で切断される
    // given (前提条件):
    let server = TestServer::start(RelayConfig {
        handshake_timeout: Duration::from_millis(200),
        ..test_config()
    })
    .await;
    let mut stream = server.connect().await;

    // when (操作):
    stream.write_all(b"\x01Abc").await.unwrap();

    // then (期待する結果):
    assert_eq!(read_status(&mut stream).await, INVALID_ACTION);
    expect_closed(&mut stream).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_bulk_data_reaches_every_joiner_but_not_creator() {
    // テスト項目: 作成者が送った大量のデータが 4 人の参加者全員にバイト単位で正確に届き、作成者には返らない
    // given (前提条件): 途中で切断が起きないよう書き込み期限を長くする
    let server = TestServer::start(RelayConfig {
        write_timeout: Duration::from_secs(10),
        ..test_config()
    })
    .await;
    let (mut creator, code) = server.create().await;
    let mut joiners = Vec::new();
    for _ in 0..4 {
        let (stream, status) = server.join(&code).await;
        assert_eq!(status, SUCCESS);
        joiners.push(stream);
    }
    let payload = Arc::new(pattern(3 * 1024 * 1024));

    // when (操作):
    let mut readers = Vec::new();
    for mut joiner in joiners {
        let len = payload.len();
        readers.push(tokio::spawn(async move {
            let mut received = vec![0u8; len];
            timeout(Duration::from_secs(30), joiner.read_exact(&mut received))
                .await
                .expect("timed out waiting for relayed data")
                .unwrap();
            received
        }));
    }
    creator.write_all(&payload).await.unwrap();

    // then (期待する結果):
    for reader in readers {
        let received = reader.await.unwrap();
        assert!(received == *payload, "relayed data differs from what was sent");
    }
    let mut echo = [0u8; 1];
    let echoed = timeout(Duration::from_millis(300), creator.read(&mut echo)).await;
    assert!(echoed.is_err(), "creator must not receive its own data");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_full_session_relays_50mb_under_default_policy() {
    // テスト項目: デフォルトの書き込み期限と上限のまま、満員のセッションで 50 MB が全参加者へ正確に届く
    // given (前提条件): 作成者 + 4 人で満員にし、5 人目は SESSION_FULL になる
    let server = TestServer::start(test_config()).await;
    let (mut creator, code) = server.create().await;
    let mut joiners = Vec::new();
    for _ in 0..4 {
        let (stream, status) = server.join(&code).await;
        assert_eq!(status, SUCCESS);
        joiners.push(stream);
    }
    let (mut fifth, status) = server.join(&code).await;
    assert_eq!(status, SESSION_FULL);
    expect_closed(&mut fifth).await;

    let payload = Arc::new(pattern(50 * 1024 * 1024));

    // when (操作):
    let mut readers = Vec::new();
    for mut joiner in joiners {
        let payload = payload.clone();
        readers.push(tokio::spawn(async move {
            let mut received = vec![0u8; payload.len()];
            timeout(Duration::from_secs(60), joiner.read_exact(&mut received))
                .await
                .expect("timed out waiting for relayed data")
                .expect("joiner was disconnected");
            received == *payload
        }));
    }
    creator.write_all(&payload).await.unwrap();

    // then (期待する結果):
    for reader in readers {
        assert!(reader.await.unwrap(), "relayed data differs from what was sent");
    }
    let mut echo = [0u8; 1];
    let echoed = timeout(Duration::from_millis(300), creator.read(&mut echo)).await;
    assert!(echoed.is_err(), "creator must not receive its own data");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_joiner_data_reaches_everyone_else() {
    // テスト項目: 参加者の送信も送信者以外の全員に届く
    // given (前提条件):
    let server = TestServer::start(test_config()).await;
    let (mut creator, code) = server.create().await;
    let (mut sender, _) = server.join(&code).await;
    let (mut other, _) = server.join(&code).await;

    // when (操作):
    sender.write_all(b"from a joiner").await.unwrap();

    // then (期待する結果):
    for receiver in [&mut creator, &mut other] {
        let mut received = [0u8; 13];
        timeout(Duration::from_secs(5), receiver.read_exact(&mut received))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&received, b"from a joiner");
    }
    let mut echo = [0u8; 1];
    assert!(
        timeout(Duration::from_millis(300), sender.read(&mut echo))
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_code_is_released_when_last_member_leaves() {
    // テスト項目: 最後のメンバーが抜けるとコードは使えなくなり、枠は再利用できる
    // given (前提条件):
    let server = TestServer::start(RelayConfig {
        max_sessions: 1,
        ..test_config()
    })
    .await;
    let (creator, code) = server.create().await;

    // when (操作):
    drop(creator);

    // then (期待する結果):
    let released = timeout(Duration::from_secs(5), async {
        loop {
            let (_stream, status) = server.join(&code).await;
            if status == SESSION_NOT_FOUND {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(released.is_ok(), "code was never released");
    let (_next, next_code) = server.create().await;
    assert_eq!(next_code.len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_server_full() {
    // テスト項目: セッション数が上限に達すると作成は SERVER_FULL になる
    // given (前提条件):
    let server = TestServer::start(RelayConfig {
        max_sessions: 1,
        ..test_config()
    })
    .await;
    let (_first, _code) = server.create().await;
    let mut second = server.connect().await;

    // when (操作):
    second.write_all(&[0x00]).await.unwrap();

    // then (期待する結果):
    assert_eq!(read_status(&mut second).await, SERVER_FULL);
    expect_closed(&mut second).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_unique_codes() {
    // テスト項目: 同時に作成されたセッションのコードは全て異なる
    // given (前提条件):
    let server = Arc::new(TestServer::start(test_config()).await);

    // when (操作):
    let mut handles = Vec::new();
    for _ in 0..32 {
        let server = server.clone();
        handles.push(tokio::spawn(async move { server.create().await }));
    }
    let mut creators = Vec::new();
    let mut codes = HashSet::new();
    for handle in handles {
        let (stream, code) = handle.await.unwrap();
        creators.push(stream);
        codes.insert(code);
    }

    // then (期待する結果):
    assert_eq!(codes.len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_consumer_is_evicted_without_stalling_others() {
    // テスト項目: 読まない参加者は切断され、他の参加者には全データが届き続ける
    // given (前提条件): 小さな上限と、受信バッファを絞った読まない参加者
    let server = TestServer::start(RelayConfig {
        read_chunk_size: 16 * 1024,
        backpressure_ceiling: 1024 * 1024,
        write_timeout: Duration::from_secs(10),
        ..test_config()
    })
    .await;
    let (mut creator, code) = server.create().await;
    let (mut fast, status) = server.join(&code).await;
    assert_eq!(status, SUCCESS);

    let socket = TcpSocket::new_v4().unwrap();
    socket.set_recv_buffer_size(4096).unwrap();
    let slow_stream = socket.connect(server.addr).await.unwrap();
    let (mut slow, status) = server.join_on(slow_stream, &code).await;
    assert_eq!(status, SUCCESS);

    let payload = Arc::new(pattern(16 * 1024 * 1024));

    // when (操作):
    let len = payload.len();
    let fast_reader = tokio::spawn(async move {
        let mut received = vec![0u8; len];
        timeout(Duration::from_secs(60), fast.read_exact(&mut received))
            .await
            .expect("fast joiner stalled")
            .unwrap();
        received
    });
    creator.write_all(&payload).await.unwrap();

    // then (期待する結果):
    let received = fast_reader.await.unwrap();
    assert!(received == *payload, "fast joiner received corrupted data");

    let mut drained = 0usize;
    let mut buf = vec![0u8; 64 * 1024];
    timeout(Duration::from_secs(10), async {
        loop {
            match slow.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => drained += n,
            }
        }
    })
    .await
    .expect("slow joiner was never disconnected");
    assert!(drained < payload.len());
}
