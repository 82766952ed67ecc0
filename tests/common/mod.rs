use fxqs::config::{ServerConfig, Tables};
use fxqs::server::ServerState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub fn test_config(listen: SocketAddr) -> ServerConfig {
    ServerConfig {
        listen,
        metrics_addr: "127.0.0.1:0".parse().unwrap(),
        max_conns: 1000,
        request_limit: 5,
        block_secs: 60,
        login_timeout: 5,
        max_frame: 1024,
    }
}

pub struct TestClient {
    pub stream: TcpStream,
}

impl TestClient {
    pub async fn connect(addr: &SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        Self { stream }
    }

    /// Connect and complete the login round-trip, asserting acceptance.
    pub async fn login(addr: &SocketAddr, username: &str, password: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&format!("{username}:{password}")).await;
        let reply = client.recv().await;
        assert_eq!(reply, "Login successful.");
        client
    }

    pub async fn send(&mut self, frame: &str) {
        self.stream.write_all(frame.as_bytes()).await.unwrap();
    }

    /// Like `send`, but tolerates a connection the server is already closing.
    pub async fn send_lossy(&mut self, frame: &str) {
        let _ = self.stream.write_all(frame.as_bytes()).await;
    }

    /// Receive one read's worth of reply text.
    pub async fn recv(&mut self) -> String {
        let mut buf = [0u8; 1024];
        let n = tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut buf))
            .await
            .expect("timeout waiting for reply")
            .unwrap();
        assert!(n > 0, "connection closed while waiting for reply");
        String::from_utf8_lossy(&buf[..n]).into_owned()
    }

    /// Drain everything the server sends until it closes the connection.
    /// Needed where the server issues back-to-back writes (e.g. a response
    /// followed by a lockout notice) that TCP may coalesce.
    pub async fn recv_until_close(&mut self) -> String {
        let mut out = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) => break,
                Ok(Ok(n)) => out.extend_from_slice(&buf[..n]),
                Err(_) => panic!("timeout waiting for connection close"),
            }
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Assert the server closes the connection without sending more data.
    pub async fn assert_closed(&mut self) {
        let remainder = self.recv_until_close().await;
        assert!(
            remainder.is_empty(),
            "expected silent close, got {remainder:?}"
        );
    }
}

fn make_state(config: ServerConfig) -> Arc<ServerState> {
    Arc::new(ServerState::new(config, Tables::default()))
}

async fn spawn_server(listener: TcpListener, state: Arc<ServerState>) {
    let state_clone = state.clone();
    tokio::spawn(async move {
        if let Err(e) = fxqs::run(listener, state_clone).await {
            eprintln!("server error in test: {e}");
        }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
}

pub async fn start_server() -> (SocketAddr, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = make_state(test_config(addr));

    spawn_server(listener, state.clone()).await;

    (addr, state)
}

pub async fn start_server_with_max_conns(max_conns: usize) -> (SocketAddr, Arc<ServerState>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mut config = test_config(addr);
    config.max_conns = max_conns;
    let state = make_state(config);

    spawn_server(listener, state.clone()).await;

    (addr, state)
}
