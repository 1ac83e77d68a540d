// ABOUTME: End-to-end tests driving the bridge over a real WebSocket on an ephemeral port
// ABOUTME: Covers the greeting, error frames, request ordering, backlog limits and teardown

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use pretty_assertions::assert_eq;
use runbox_bridge::{serve, BridgeSettings, BridgeState, GREETING};
use runbox_sandbox::{
    ContainerRuntime, ContainerSummary, ExecResult, GatewayConfig, RuntimeConnector,
};
use runbox_storage::{Database, InstanceRegistry, SqliteCompletionLog, SqliteInstanceRegistry};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Container whose scripts echo their arguments. `/app/slow.js` never
/// finishes on its own and `/app/wait.js` takes a moment.
#[derive(Default)]
struct FakeRuntime {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeRuntime {
    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn find_container(&self, name: &str) -> runbox_sandbox::Result<Option<ContainerSummary>> {
        Ok(Some(ContainerSummary {
            id: "c-1".to_string(),
            name: name.to_string(),
            running: true,
        }))
    }

    async fn is_running(&self, _container_id: &str) -> runbox_sandbox::Result<bool> {
        Ok(true)
    }

    async fn start_container(&self, _container_id: &str) -> runbox_sandbox::Result<()> {
        Ok(())
    }

    async fn exec(&self, _container_id: &str, command: Vec<String>) -> runbox_sandbox::Result<ExecResult> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        match command.get(1).map(String::as_str) {
            Some("/app/slow.js") => sleep(Duration::from_secs(30)).await,
            Some("/app/wait.js") => sleep(Duration::from_millis(200)).await,
            _ => {}
        }

        Ok(ExecResult {
            exit_code: 0,
            stdout: command[1..].join(" ").into_bytes(),
            stderr: Vec::new(),
        })
    }

    async fn download_archive(&self, _container_id: &str, path: &str) -> runbox_sandbox::Result<Vec<u8>> {
        Err(runbox_sandbox::GatewayError::FileNotFound(path.to_string()))
    }

    async fn upload_archive(
        &self,
        _container_id: &str,
        _dest_dir: &str,
        _archive: Vec<u8>,
    ) -> runbox_sandbox::Result<()> {
        Ok(())
    }
}

struct FakeConnector(Arc<FakeRuntime>);

impl RuntimeConnector for FakeConnector {
    fn connect(&self, _address: &str) -> runbox_sandbox::Result<Arc<dyn ContainerRuntime>> {
        let runtime: Arc<dyn ContainerRuntime> = self.0.clone();
        Ok(runtime)
    }
}

struct Bridge {
    addr: SocketAddr,
    runtime: Arc<FakeRuntime>,
    _stop: oneshot::Sender<()>,
    _staging: TempDir,
}

impl Bridge {
    async fn connect(&self, address: &str) -> Client {
        let url = format!("ws://{}/ws?address={}", self.addr, address);
        let (client, _) = connect_async(url).await.unwrap();
        client
    }
}

async fn start_bridge() -> Bridge {
    let db = Database::in_memory().await.unwrap();
    let registry = SqliteInstanceRegistry::new(&db);
    registry.put("10.0.0.5", "i-1").await.unwrap();

    let staging = TempDir::new().unwrap();
    let runtime = Arc::new(FakeRuntime::default());
    let state = Arc::new(BridgeState {
        completions: SqliteCompletionLog::new(&db),
        registry: Arc::new(registry),
        connector: Arc::new(FakeConnector(runtime.clone())),
        settings: BridgeSettings {
            address_wait: Duration::from_millis(100),
            address_poll_interval: Duration::from_millis(10),
            gateway: GatewayConfig {
                staging_dir: staging.path().to_path_buf(),
                command_timeout: Duration::from_secs(60),
                ..Default::default()
            },
        },
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(serve(listener, state, async move {
        let _ = stopped.await;
    }));

    Bridge {
        addr,
        runtime,
        _stop: stop,
        _staging: staging,
    }
}

async fn next_frame(client: &mut Client) -> Value {
    let message = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("frame within 5s")
        .expect("socket still open")
        .unwrap();
    serde_json::from_str(message.to_text().unwrap()).unwrap()
}

async fn send_json(client: &mut Client, value: Value) {
    client.send(Message::text(value.to_string())).await.unwrap();
}

async fn wait_until(check: impl Fn() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !check() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition reached within 2s");
}

fn execute(id: u64, path: &str) -> Value {
    json!({"id": id, "op": "execute", "path": path, "interpreter": "node"})
}

#[tokio::test]
async fn test_greeting_on_connect() {
    let bridge = start_bridge().await;
    let mut client = bridge.connect("10.0.0.5").await;

    assert_eq!(
        next_frame(&mut client).await,
        json!({
            "type": "connected",
            "project": null,
            "address": "10.0.0.5",
            "message": GREETING
        })
    );
}

#[tokio::test]
async fn test_unusable_frames_get_error_frames() {
    let bridge = start_bridge().await;
    let mut client = bridge.connect("10.0.0.5").await;
    next_frame(&mut client).await;

    client.send(Message::text("files")).await.unwrap();
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], json!("error"));
    assert_eq!(frame["code"], json!("bad_request"));

    client.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["code"], json!("bad_request"));

    // The connection survives bad input
    send_json(&mut client, execute(1, "/app/a.js")).await;
    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], json!("result"));
    assert_eq!(frame["data"]["stdout"], json!("/app/a.js"));
}

#[tokio::test]
async fn test_unregistered_address_is_refused_and_closed() {
    let bridge = start_bridge().await;
    let mut client = bridge.connect("10.0.0.9").await;

    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], json!("error"));
    assert_eq!(frame["code"], json!("unavailable"));

    let closing = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("close within 5s");
    assert!(matches!(closing, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
}

#[tokio::test]
async fn test_requests_are_answered_in_order_one_at_a_time() {
    let bridge = start_bridge().await;
    let mut client = bridge.connect("10.0.0.5").await;
    next_frame(&mut client).await;

    send_json(&mut client, execute(1, "/app/wait.js")).await;
    send_json(&mut client, execute(2, "/app/fast.js")).await;

    let first = next_frame(&mut client).await;
    let second = next_frame(&mut client).await;
    assert_eq!(first["id"], json!(1));
    assert_eq!(first["data"]["stdout"], json!("/app/wait.js"));
    assert_eq!(second["id"], json!(2));
    assert_eq!(bridge.runtime.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_full_backlog_answers_busy() {
    let bridge = start_bridge().await;
    let mut client = bridge.connect("10.0.0.5").await;
    next_frame(&mut client).await;

    send_json(&mut client, execute(0, "/app/slow.js")).await;
    let runtime = bridge.runtime.clone();
    wait_until(|| runtime.in_flight() == 1).await;

    // Sixteen wait behind the running script, the next one is turned away
    for id in 1..=17 {
        send_json(&mut client, execute(id, "/app/a.js")).await;
    }

    let frame = next_frame(&mut client).await;
    assert_eq!(frame["type"], json!("error"));
    assert_eq!(frame["code"], json!("busy"));
    assert_eq!(frame["id"], json!(17));
}

#[tokio::test]
async fn test_disconnect_abandons_running_request() {
    let bridge = start_bridge().await;
    let mut client = bridge.connect("10.0.0.5").await;
    next_frame(&mut client).await;

    send_json(&mut client, execute(1, "/app/slow.js")).await;
    let runtime = bridge.runtime.clone();
    wait_until(|| runtime.in_flight() == 1).await;

    client.close(None).await.unwrap();
    drop(client);
    wait_until(|| runtime.in_flight() == 0).await;

    // The server keeps accepting connections afterwards
    let mut client = bridge.connect("10.0.0.5").await;
    assert_eq!(next_frame(&mut client).await["type"], json!("connected"));
    send_json(&mut client, execute(2, "/app/a.js")).await;
    assert_eq!(next_frame(&mut client).await["id"], json!(2));
}
