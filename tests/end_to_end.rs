//! End-to-end platform scenario against a local HTTP endpoint: a synchronous
//! getter, an HTTP-template getter with JSON-path extraction, and an
//! HTTP-template setter that encodes the value and device name into query
//! parameters.

use functor_bridge::{
    Completion, Device, DeviceConfig, LogSink, ModuleRegistry, Outcome, Platform, PlatformConfig,
    PlatformRegistry, Resolver, WatchdogHandle,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

type QueryLog = Arc<Mutex<Option<HashMap<String, String>>>>;

/// Minimal HTTP responder in the shape of the device's remote endpoint:
/// answers every GET with `{"foo": {"bar": 50, "baz": <foo param>}, "query": ...}`
/// and records the query parameters it saw.
async fn spawn_server() -> (u16, QueryLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let seen: QueryLog = Arc::new(Mutex::new(None));
    let record = seen.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let record = record.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut request = Vec::new();
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) => return,
                        Ok(n) => {
                            request.extend_from_slice(&buf[..n]);
                            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                        Err(_) => return,
                    }
                }

                let head = String::from_utf8_lossy(&request);
                let target = head.split_whitespace().nth(1).unwrap_or("/");
                let query = parse_query(target);
                let body = json!({
                    "foo": {
                        "bar": 50,
                        "baz": query.get("foo").cloned(),
                    },
                    "query": query,
                });
                *record.lock().unwrap() = Some(query);

                let payload = body.to_string();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    payload.len(),
                    payload
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    (port, seen)
}

fn parse_query(target: &str) -> HashMap<String, String> {
    let Some((_, query)) = target.split_once('?') else {
        return HashMap::new();
    };
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            Some((
                key.to_string(),
                urlencoding::decode(value).ok()?.into_owned(),
            ))
        })
        .collect()
}

fn completion_channel() -> (Completion, oneshot::Receiver<anyhow::Result<Option<Value>>>) {
    let (tx, rx) = oneshot::channel();
    let completion: Completion = Box::new(move |result| {
        let _ = tx.send(result);
    });
    (completion, rx)
}

fn build_platform(port: u16) -> (Arc<Platform>, Arc<PlatformRegistry>) {
    let device = DeviceConfig::named("Test Device 1")
        .getter(
            "power",
            Arc::new(|_d: &Device, handle: WatchdogHandle| {
                handle.complete(Ok(Some(json!(true))));
                Outcome::Delivered
            }),
        )
        .text(
            "getBrightness",
            &format!("getUrl:http://localhost:{port}/get?foo=boo#$.foo.bar"),
        )
        .text(
            "setBrightness",
            &format!("getUrl:http://localhost:{port}/get?level=${{value}}&name=${{device.name}}"),
        );

    let config = PlatformConfig {
        name: None,
        devices: vec![device],
    };

    let registry = PlatformRegistry::new();
    let platform = Platform::new(
        LogSink::memory().0,
        config,
        Resolver::with_builtin_schemes(Arc::new(ModuleRegistry::new())),
        &registry,
    );
    (platform, registry)
}

#[tokio::test]
async fn platform_scenario() {
    let (port, seen) = spawn_server().await;
    let (platform, registry) = build_platform(port);

    let mut accessories = Vec::new();
    platform.accessories(|devices| accessories = devices);
    assert_eq!(accessories.len(), 1);
    let device = &accessories[0];
    assert_eq!(device.name(), "Test Device 1");

    // Synchronous getter via callback.
    let (completion, rx) = completion_channel();
    device.get("power", completion);
    assert_eq!(rx.await.unwrap().unwrap(), Some(json!(true)));

    // HTTP getter with JSON-path extraction.
    let (completion, rx) = completion_channel();
    device.get("brightness", completion);
    assert_eq!(rx.await.unwrap().unwrap(), Some(json!(50)));
    assert_eq!(
        seen.lock().unwrap().as_ref().and_then(|q| q.get("foo").cloned()),
        Some("boo".to_string())
    );

    // HTTP setter encoding the value and device name into the query.
    let (completion, rx) = completion_channel();
    device.set("brightness", json!(53), completion);
    assert!(rx.await.unwrap().is_ok());
    let query = seen.lock().unwrap().clone().expect("server saw the set");
    assert_eq!(query.get("level").map(String::as_str), Some("53"));
    assert_eq!(query.get("name").map(String::as_str), Some("Test Device 1"));

    // No watchdog guards left in flight once everything completed.
    assert_eq!(registry.in_flight(), 0);
}

#[tokio::test]
async fn transport_failure_surfaces_as_an_error() {
    // Nothing listens on this port; the completion gets the transport error
    // rather than a silent no-value.
    let device = DeviceConfig::named("Offline")
        .text("getBrightness", "getUrl:http://127.0.0.1:1/get#$.foo.bar");
    let config = PlatformConfig {
        name: None,
        devices: vec![device],
    };

    let registry = PlatformRegistry::new();
    let platform = Platform::new(
        LogSink::memory().0,
        config,
        Resolver::with_builtin_schemes(Arc::new(ModuleRegistry::new())),
        &registry,
    );

    let mut accessories = Vec::new();
    platform.accessories(|devices| accessories = devices);

    let (completion, rx) = completion_channel();
    accessories[0].get("brightness", completion);
    assert!(rx.await.unwrap().is_err());
}

#[tokio::test]
async fn missing_getter_degrades_gracefully() {
    let (port, _) = spawn_server().await;
    let (platform, _) = build_platform(port);

    let mut accessories = Vec::new();
    platform.accessories(|devices| accessories = devices);

    let (completion, rx) = completion_channel();
    accessories[0].get("color", completion);
    assert_eq!(rx.await.unwrap().unwrap(), None);
}
