use bytes::Bytes;
use futures::StreamExt;
use multipull::engine::client::{DEFAULT_API_VERSION, FALLBACK_API_VERSION};
use multipull::engine::{ClientOptions, EngineClient, ImageEngine};
use multipull::error::EngineError;
use multipull::logging::Logger;
use multipull::progress::{ImageProgress, decode_events};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;

// One object split across the two chunks of the pull body
const FIRST_CHUNK: &str = r#"{"status":"Downloading","progressDetail":{"current":50,"#;
const SECOND_CHUNK: &str = r#""total":200}}{"status":"done"}"#;

/// Minimal engine answering `/_ping` and `images/create` over plain HTTP
struct FakeDaemon {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    /// Lets the pull body continue past its first chunk
    release: Arc<Notify>,
}

impl FakeDaemon {
    async fn start(api_version: Option<&'static str>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let release = Arc::new(Notify::new());

        let (seen, gate) = (Arc::clone(&requests), Arc::clone(&release));
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(
                    socket,
                    api_version,
                    Arc::clone(&seen),
                    Arc::clone(&gate),
                ));
            }
        });

        Self {
            addr,
            requests,
            release,
        }
    }

    fn client(&self, api_version: Option<&str>) -> EngineClient {
        let options = ClientOptions::new(format!("tcp://{}", self.addr))
            .with_api_version(api_version.map(str::to_string));
        EngineClient::new(&options, Logger::new_quiet()).unwrap()
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request_line(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
    String::from_utf8_lossy(&request)
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

fn chunk(data: &str) -> String {
    format!("{:x}\r\n{}\r\n", data.len(), data)
}

async fn serve(
    mut socket: TcpStream,
    api_version: Option<&'static str>,
    requests: Arc<Mutex<Vec<String>>>,
    release: Arc<Notify>,
) {
    let line = read_request_line(&mut socket).await;
    requests.lock().unwrap().push(line.clone());

    if line.starts_with("GET /_ping ") {
        let header = api_version
            .map(|v| format!("API-Version: {}\r\n", v))
            .unwrap_or_default();
        let response = format!(
            "HTTP/1.1 200 OK\r\n{}Content-Length: 2\r\nConnection: close\r\n\r\nOK",
            header
        );
        socket.write_all(response.as_bytes()).await.unwrap();
    } else if line.contains("fromImage=nope") {
        let body = r#"{"message":"pull access denied for nope"}"#;
        let response = format!(
            "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
    } else {
        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n";
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(chunk(FIRST_CHUNK).as_bytes()).await.unwrap();
        socket.flush().await.unwrap();

        release.notified().await;

        socket.write_all(chunk(SECOND_CHUNK).as_bytes()).await.unwrap();
        socket.write_all(b"0\r\n\r\n").await.unwrap();
        socket.flush().await.unwrap();
    }
    let _ = socket.shutdown().await;
}

#[tokio::test]
async fn test_negotiated_version_used_for_pull() {
    let daemon = FakeDaemon::start(Some("1.41")).await;
    let client = daemon.client(None);
    daemon.release.notify_one();

    let body = client.pull_image("library/alpine:3.20").await.unwrap();
    let events: Vec<_> = decode_events(body).collect().await;

    assert_eq!(
        daemon.requests(),
        vec![
            "GET /_ping HTTP/1.1".to_string(),
            "POST /v1.41/images/create?fromImage=library%2Falpine&tag=3.20 HTTP/1.1".to_string(),
        ]
    );

    let mut progress = ImageProgress::new("library/alpine:3.20");
    let mut seen = Vec::new();
    for event in events {
        progress.apply(&event.unwrap());
        seen.push((progress.status().to_string(), progress.percent()));
    }
    assert_eq!(
        seen,
        vec![("Downloading".to_string(), 25), ("done".to_string(), 25)]
    );
}

#[tokio::test]
async fn test_negotiation_runs_once() {
    let daemon = FakeDaemon::start(Some("1.41")).await;
    let client = daemon.client(None);

    assert!(client.pull_image("nope").await.is_err());
    assert!(client.pull_image("nope").await.is_err());

    let pings = daemon
        .requests()
        .iter()
        .filter(|r| r.starts_with("GET /_ping "))
        .count();
    assert_eq!(pings, 1);
    assert_eq!(client.api_version().await, "1.41");
}

#[tokio::test]
async fn test_newer_engine_capped_at_client_version() {
    let daemon = FakeDaemon::start(Some("1.47")).await;
    let client = daemon.client(None);

    assert_eq!(client.api_version().await, DEFAULT_API_VERSION);
}

#[tokio::test]
async fn test_missing_version_header_falls_back() {
    let daemon = FakeDaemon::start(None).await;
    let client = daemon.client(None);

    assert_eq!(client.ping().await.unwrap(), None);
    assert_eq!(client.api_version().await, FALLBACK_API_VERSION);
}

#[tokio::test]
async fn test_failed_ping_keeps_client_default() {
    // bind then drop to get a port nothing listens on
    let addr = TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap()
        .local_addr()
        .unwrap();
    let options = ClientOptions::new(format!("tcp://{}", addr));
    let client = EngineClient::new(&options, Logger::new_quiet()).unwrap();

    assert!(matches!(client.ping().await, Err(EngineError::Request(_))));
    assert_eq!(client.api_version().await, DEFAULT_API_VERSION);
}

#[tokio::test]
async fn test_pinned_version_skips_ping() {
    let daemon = FakeDaemon::start(Some("1.41")).await;
    let client = daemon.client(Some("1.40"));

    assert!(client.pull_image("nope").await.is_err());

    assert_eq!(
        daemon.requests(),
        vec!["POST /v1.40/images/create?fromImage=nope&tag=latest HTTP/1.1".to_string()]
    );
}

#[tokio::test]
async fn test_error_status_carries_engine_message() {
    let daemon = FakeDaemon::start(Some("1.41")).await;
    let client = daemon.client(None);

    let err = match client.pull_image("nope").await {
        Ok(_) => panic!("pull of a missing image succeeded"),
        Err(e) => e,
    };

    match &err {
        EngineError::Status { status, message } => {
            assert_eq!(*status, 404);
            assert_eq!(message, "pull access denied for nope");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(
        err.to_string(),
        "engine returned status 404: pull access denied for nope"
    );
}

#[tokio::test]
async fn test_body_is_streamed_as_it_arrives() {
    let daemon = FakeDaemon::start(Some("1.41")).await;
    let client = daemon.client(None);

    let mut body = client.pull_image("alpine").await.unwrap();

    // the daemon holds the rest of the body until released
    let first: Bytes = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("first chunk did not arrive before the body completed")
        .unwrap()
        .unwrap();
    assert!(!first.is_empty());
    assert!(FIRST_CHUNK.as_bytes().starts_with(&first));

    daemon.release.notify_one();

    let mut received = first.to_vec();
    while let Some(chunk) = body.next().await {
        received.extend_from_slice(&chunk.unwrap());
    }
    assert_eq!(received, format!("{}{}", FIRST_CHUNK, SECOND_CHUNK).into_bytes());
}
