//! Heartbeat monitor tests against a live proxy and mock stream servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::ws::{Message as AxumMessage, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use resilient_proxy::config::{MonitorConfig, ProviderKind};
use resilient_proxy::health::{EventStreamWatcher, HealthPoller, HeartbeatMonitor};
use resilient_proxy::http::echo_router;
use resilient_proxy::lifecycle::Shutdown;
use resilient_proxy::resilience::BackoffState;
use tokio::net::TcpListener;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message};

mod common;

use common::{provider, proxy_config, start_counting_backend, start_proxy, unused_addr, weatherapi_body};

async fn serve(app: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn gaps(times: &[Instant]) -> Vec<Duration> {
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

fn backoff(min_ms: u64, max_ms: u64) -> BackoffState {
    BackoffState::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_poll_reads_proxy_health() {
    let (upstream, _) = start_counting_backend(200, weatherapi_body("x")).await;
    let proxy = start_proxy(proxy_config(
        vec![provider("weatherapi", ProviderKind::WeatherApi, upstream)],
        3,
    ))
    .await;

    let poller = HealthPoller::new(
        &format!("{}/health", proxy.url()),
        Duration::from_secs(2),
        backoff(100, 1000),
    )
    .unwrap();
    let body = poller.poll_once().await.unwrap();
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["activeProvider"], "weatherapi");

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_watcher_subscribes_and_leaves_on_shutdown() {
    let (upstream, _) = start_counting_backend(200, weatherapi_body("x")).await;
    let proxy = start_proxy(proxy_config(
        vec![provider("weatherapi", ProviderKind::WeatherApi, upstream)],
        3,
    ))
    .await;
    let broadcaster = proxy.orchestrator.broadcaster().clone();

    let monitor_shutdown = Shutdown::new();
    let watcher = EventStreamWatcher::new(proxy.ws_url(), Duration::from_millis(100), backoff(50, 500));
    let task = tokio::spawn(watcher.run(monitor_shutdown.subscribe()));

    assert!(wait_until(|| broadcaster.subscriber_count() == 1).await);

    // Idle pings keep the session alive
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(broadcaster.subscriber_count(), 1);
    assert!(!task.is_finished());

    monitor_shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("watcher should exit promptly")
        .unwrap();
    assert!(wait_until(|| broadcaster.subscriber_count() == 0).await);

    proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_watcher_reconnects_after_server_close() {
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let app = Router::new().route(
        "/ws/heartbeat",
        get(move |ws: WebSocketUpgrade| {
            let counter = counter.clone();
            async move {
                ws.on_upgrade(move |mut socket| async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = socket.send(AxumMessage::Text("hello".into())).await;
                    let _ = socket.send(AxumMessage::Close(None)).await;
                })
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let shutdown = Shutdown::new();
    let watcher = EventStreamWatcher::new(
        format!("ws://{addr}/ws/heartbeat"),
        Duration::from_secs(5),
        backoff(20, 100),
    );
    let task = tokio::spawn(watcher.run(shutdown.subscribe()));

    assert!(wait_until(|| connections.load(Ordering::SeqCst) >= 3).await);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("watcher should exit promptly")
        .unwrap();
}

#[tokio::test]
async fn test_monitor_stops_within_grace_when_proxy_is_down() {
    let addr = unused_addr().await;
    let mut config = MonitorConfig::default();
    config.proxy.host = addr.ip().to_string();
    config.proxy.port = addr.port();
    config.poll_interval_secs = 1;
    config.max_backoff_secs = 60;

    let shutdown = Shutdown::new();
    let handle = HeartbeatMonitor::new(config).spawn(&shutdown).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.trigger();

    assert!(handle.join(Duration::from_secs(2)).await, "both loops should exit within grace");
}

#[tokio::test]
async fn test_echo_endpoint() {
    let shutdown = Shutdown::new();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = echo_router(shutdown.subscribe());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let (mut stream, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    stream.send(Message::Text("ping-1".into())).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match reply {
        Message::Text(text) => assert_eq!(text.as_str(), "Message received: ping-1"),
        other => panic!("unexpected {other:?}"),
    }

    shutdown.trigger();
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(message) = stream.next().await {
            if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                return;
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}

#[tokio::test]
async fn test_watcher_drops_peer_that_stops_reading() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = accepts.clone();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((tcp, _)) = listener.accept().await {
            if let Ok(ws) = accept_async(tcp).await {
                counter.fetch_add(1, Ordering::SeqCst);
                // handshake done; the socket is never polled again
                held.push(ws);
            }
        }
    });

    let shutdown = Shutdown::new();
    let watcher = EventStreamWatcher::new(
        format!("ws://{addr}/ws/heartbeat"),
        Duration::from_millis(100),
        backoff(20, 100),
    );
    let task = tokio::spawn(watcher.run(shutdown.subscribe()));

    assert!(
        wait_until(|| accepts.load(Ordering::SeqCst) >= 2).await,
        "an unanswered ping should end the session and reconnect"
    );

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("watcher should exit promptly")
        .unwrap();
}

#[tokio::test]
async fn test_poller_backs_off_then_resets_on_recovery() {
    let polls = Arc::new(Mutex::new(Vec::<Instant>::new()));
    let recorder = polls.clone();
    let app = Router::new().route(
        "/health",
        get(move || {
            let recorder = recorder.clone();
            async move {
                let mut polls = recorder.lock().unwrap();
                polls.push(Instant::now());
                if polls.len() <= 3 {
                    (StatusCode::SERVICE_UNAVAILABLE, "down")
                } else {
                    (StatusCode::OK, r#"{"status":"ok"}"#)
                }
            }
        }),
    );
    let addr = serve(app).await;

    let shutdown = Shutdown::new();
    let poller = HealthPoller::new(
        &format!("http://{addr}/health"),
        Duration::from_secs(2),
        backoff(100, 1600),
    )
    .unwrap();
    let task = tokio::spawn(poller.run(shutdown.subscribe()));

    assert!(wait_until(|| polls.lock().unwrap().len() >= 6).await);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    let gaps = gaps(&polls.lock().unwrap());
    // three failures: 100ms, 200ms, 400ms
    assert!(gaps[0] >= Duration::from_millis(100), "{gaps:?}");
    assert!(gaps[1] >= Duration::from_millis(200), "{gaps:?}");
    assert!(gaps[2] >= Duration::from_millis(400), "{gaps:?}");
    // healthy again: back to the poll interval instead of 800ms
    assert!(gaps[3] >= Duration::from_millis(100), "{gaps:?}");
    assert!(gaps[3] < Duration::from_millis(400), "{gaps:?}");
    assert!(gaps[4] < Duration::from_millis(400), "{gaps:?}");
}

#[tokio::test]
async fn test_watcher_backs_off_then_resets_on_connect() {
    let attempts = Arc::new(Mutex::new(Vec::<Instant>::new()));
    let recorder = attempts.clone();
    let app = Router::new().route(
        "/ws/heartbeat",
        get(move |ws: WebSocketUpgrade| {
            let recorder = recorder.clone();
            async move {
                let attempt = {
                    let mut attempts = recorder.lock().unwrap();
                    attempts.push(Instant::now());
                    attempts.len()
                };
                if attempt <= 3 {
                    // refuse the upgrade so the connect itself fails
                    StatusCode::SERVICE_UNAVAILABLE.into_response()
                } else {
                    ws.on_upgrade(|mut socket| async move {
                        let _ = socket.send(AxumMessage::Close(None)).await;
                    })
                }
            }
        }),
    );
    let addr = serve(app).await;

    let shutdown = Shutdown::new();
    let watcher = EventStreamWatcher::new(
        format!("ws://{addr}/ws/heartbeat"),
        Duration::from_secs(5),
        backoff(100, 1600),
    );
    let task = tokio::spawn(watcher.run(shutdown.subscribe()));

    assert!(wait_until(|| attempts.lock().unwrap().len() >= 6).await);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), task).await.unwrap().unwrap();

    let gaps = gaps(&attempts.lock().unwrap());
    // three failed connects: 100ms, 200ms, 400ms
    assert!(gaps[0] >= Duration::from_millis(100), "{gaps:?}");
    assert!(gaps[1] >= Duration::from_millis(200), "{gaps:?}");
    assert!(gaps[2] >= Duration::from_millis(400), "{gaps:?}");
    // a successful connect resets to the minimum before the next reconnect
    assert!(gaps[3] >= Duration::from_millis(100), "{gaps:?}");
    assert!(gaps[3] < Duration::from_millis(400), "{gaps:?}");
    assert!(gaps[4] < Duration::from_millis(400), "{gaps:?}");
}
