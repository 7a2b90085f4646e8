//! Integration tests for the numflow WebSocket worker
//!
//! These tests verify the black-box behavior of the server:
//! - Clients run source and receive typed results
//! - Definitions persist per connection and never leak across connections
//! - Failures come back as error messages with a backtrace

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use numflow::{Engine, EngineConfig, Locality};
use numflow_serve::{ClientMessage, NumflowServer, ServerMessage, WireValue};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start a server on an ephemeral port
async fn setup_test_server(engine: Engine) -> (Arc<NumflowServer>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Arc::new(NumflowServer::new(engine));

    let server_clone = server.clone();
    tokio::spawn(async move {
        server_clone.serve(listener).await.unwrap();
    });

    (server, addr)
}

async fn connect_client(addr: SocketAddr) -> WsStream {
    let url = format!("ws://{}", addr);
    let (ws, _) = connect_async(&url).await.expect("Failed to connect");
    ws
}

async fn send(ws: &mut WsStream, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

/// Receive a server message, with timeout
async fn recv(ws: &mut WsStream) -> ServerMessage {
    let msg = timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("Timeout waiting for message")
        .expect("Stream closed")
        .expect("WebSocket error");

    match msg {
        Message::Text(text) => serde_json::from_str(text.as_str()).expect("Invalid JSON"),
        other => panic!("Expected text message, got {:?}", other),
    }
}

async fn run(ws: &mut WsStream, id: u64, source: &str) -> ServerMessage {
    send(
        ws,
        &ClientMessage::Run {
            id,
            source: source.into(),
        },
    )
    .await;
    recv(ws).await
}

// ============ Tests ============

#[tokio::test]
async fn test_run_returns_value() {
    let (_server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;

    let response = run(&mut ws, 1, "define(sq(x), x * x); sq(12)").await;
    assert_eq!(
        response,
        ServerMessage::Result {
            id: 1,
            value: WireValue::Int(144)
        }
    );

    let response = run(&mut ws, 2, "range(3)").await;
    assert_eq!(
        response,
        ServerMessage::Result {
            id: 2,
            value: WireValue::Array(vec![0.0, 1.0, 2.0])
        }
    );
}

#[tokio::test]
async fn test_functions_are_described() {
    let (_server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;

    let response = run(&mut ws, 3, "define(add(a, b), a + b); add(1)").await;
    assert_eq!(
        response,
        ServerMessage::Result {
            id: 3,
            value: WireValue::Function {
                name: "add".into(),
                arity: 1
            }
        }
    );
}

#[tokio::test]
async fn test_define_binds_value() {
    let (_server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;

    send(
        &mut ws,
        &ClientMessage::Define {
            name: "scale".into(),
            source: "2 * 21".into(),
        },
    )
    .await;
    assert_eq!(
        recv(&mut ws).await,
        ServerMessage::Defined {
            name: "scale".into()
        }
    );

    let response = run(&mut ws, 4, "scale + 1").await;
    assert_eq!(
        response,
        ServerMessage::Result {
            id: 4,
            value: WireValue::Int(43)
        }
    );
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let engine = Engine::new();
    engine.define_value("shared", 7i64);
    let (_server, addr) = setup_test_server(engine).await;
    let mut a = connect_client(addr).await;
    let mut b = connect_client(addr).await;

    run(&mut a, 1, "define(secret, 99)").await;
    assert_eq!(
        run(&mut a, 2, "secret + shared").await,
        ServerMessage::Result {
            id: 2,
            value: WireValue::Int(106)
        }
    );

    match run(&mut b, 3, "secret").await {
        ServerMessage::Error { id, message, .. } => {
            assert_eq!(id, Some(3));
            assert!(message.contains("secret"), "{message}");
        }
        other => panic!("Expected Error, got {:?}", other),
    }
    assert_eq!(
        run(&mut b, 4, "shared").await,
        ServerMessage::Result {
            id: 4,
            value: WireValue::Int(7)
        }
    );
}

#[tokio::test]
async fn test_eval_error_has_backtrace() {
    let (_server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;

    run(&mut ws, 1, "define(f(n), error('boom')); define(g(n), f(n) + 1)").await;
    match run(&mut ws, 2, "g(1)").await {
        ServerMessage::Error {
            id,
            message,
            backtrace,
        } => {
            assert_eq!(id, Some(2));
            assert_eq!(message, "error: boom");
            assert_eq!(
                backtrace,
                vec!["at main (main)", "at g (g(1))", "at f (f(n))"]
            );
        }
        other => panic!("Expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_deep_recursion_is_bounded() {
    let (_server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;

    run(&mut ws, 1, "define(count(n), if(n <= 0, 0, count(n - 1)))").await;
    assert_eq!(
        run(&mut ws, 2, "count(900)").await,
        ServerMessage::Result {
            id: 2,
            value: WireValue::Int(0)
        }
    );
    match run(&mut ws, 3, "count(5000)").await {
        ServerMessage::Error { id, message, .. } => {
            assert_eq!(id, Some(3));
            assert!(message.contains("call depth limit"), "{message}");
        }
        other => panic!("Expected Error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_frames_keep_connection_open() {
    let (_server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;

    ws.send(Message::Text("{\"type\":\"bogus\"}".into()))
        .await
        .unwrap();
    match recv(&mut ws).await {
        ServerMessage::Error { id, message, .. } => {
            assert_eq!(id, None);
            assert!(message.starts_with("Invalid message"), "{message}");
        }
        other => panic!("Expected Error, got {:?}", other),
    }

    match run(&mut ws, 5, "1 +").await {
        ServerMessage::Error { id, message, .. } => {
            assert_eq!(id, Some(5));
            assert!(message.starts_with("Parse error"), "{message}");
        }
        other => panic!("Expected Error, got {:?}", other),
    }

    assert_eq!(
        run(&mut ws, 6, "1 + 1").await,
        ServerMessage::Result {
            id: 6,
            value: WireValue::Int(2)
        }
    );
}

#[tokio::test]
async fn test_help_and_locality() {
    let engine = Engine::new().with_config(EngineConfig::new().with_locality(Locality::new(2, 4)));
    let (_server, addr) = setup_test_server(engine).await;
    let mut ws = connect_client(addr).await;

    send(&mut ws, &ClientMessage::Help { name: "fma".into() }).await;
    match recv(&mut ws).await {
        ServerMessage::Help { name, text } => {
            assert_eq!(name, "fma");
            assert!(text.unwrap().contains("fma(_a, _b, _c)"));
        }
        other => panic!("Expected Help, got {:?}", other),
    }

    send(&mut ws, &ClientMessage::Help { name: "nope".into() }).await;
    assert_eq!(
        recv(&mut ws).await,
        ServerMessage::Help {
            name: "nope".into(),
            text: None
        }
    );

    send(&mut ws, &ClientMessage::Locality).await;
    assert_eq!(
        recv(&mut ws).await,
        ServerMessage::Locality {
            worker: 2,
            workers: 4
        }
    );
}

#[tokio::test]
async fn test_disconnect_is_tracked() {
    let (server, addr) = setup_test_server(Engine::new()).await;
    let mut ws = connect_client(addr).await;
    run(&mut ws, 1, "1").await;
    assert_eq!(server.connections(), 1);

    ws.close(None).await.unwrap();
    for _ in 0..50 {
        if server.connections() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(server.connections(), 0);
}
