//! WebDriver client against a canned HTTP driver on localhost.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use webpilot_core::{Error, SessionConfig};
use webpilot_driver::wire::ELEMENT_KEY;
use webpilot_driver::{Backend, BrowserSession, ElementRef, WebDriverBackend};

type RequestLog = Arc<Mutex<Vec<String>>>;

/// Serves one request per connection with fixed answers for session "abc".
async fn spawn_driver() -> (SocketAddr, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));

    let requests = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                let _ = serve(stream, requests).await;
            });
        }
    });

    (addr, log)
}

async fn serve(mut stream: TcpStream, log: RequestLog) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    log.lock().unwrap().push(format!("{method} {path}"));

    let (status, payload) = route(&method, &path, &body);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn route(method: &str, path: &str, body: &str) -> (&'static str, String) {
    let ok = |value: serde_json::Value| ("200 OK", serde_json::json!({ "value": value }).to_string());
    let fail = |status: &'static str, code: &str| {
        (
            status,
            serde_json::json!({ "value": { "error": code, "message": format!("{code}\nStacktrace: ...") } })
                .to_string(),
        )
    };

    match (method, path) {
        ("POST", "/session") => ok(serde_json::json!({
            "sessionId": "abc",
            "capabilities": { "browserName": "chrome" }
        })),
        ("POST", "/session/abc/window/rect") => ok(serde_json::json!({ "width": 1920, "height": 1080 })),
        ("POST", "/session/abc/url") => ok(serde_json::Value::Null),
        ("GET", "/session/abc/url") => ok("https://example.com/".into()),
        ("GET", "/session/abc/title") => ok("Example Domain".into()),
        ("GET", "/session/abc/screenshot") => ok("cG5nIQ==".into()),
        ("DELETE", "/session/abc") => ok(serde_json::Value::Null),
        ("POST", "/session/abc/element") if body.contains("#missing") => {
            fail("404 Not Found", "no such element")
        }
        ("POST", "/session/abc/element") if body.contains("#covered") => {
            ok(serde_json::json!({ ELEMENT_KEY: "el-2" }))
        }
        ("POST", "/session/abc/element") => ok(serde_json::json!({ ELEMENT_KEY: "el-1" })),
        ("POST", "/session/abc/elements") if body.contains("\"a\"") => ok(serde_json::json!([
            { ELEMENT_KEY: "el-1" },
            { ELEMENT_KEY: "el-3" },
        ])),
        ("POST", "/session/abc/elements") => ok(serde_json::json!([])),
        ("GET", "/session/abc/element/el-1/displayed") => ok(true.into()),
        ("GET", "/session/abc/element/el-1/enabled") => ok(true.into()),
        ("GET", "/session/abc/element/el-1/text") => ok("Hello".into()),
        ("GET", "/session/abc/element/el-1/attribute/href") => ok("/next".into()),
        ("GET", "/session/abc/element/el-1/attribute/title") => ok(serde_json::Value::Null),
        ("POST", "/session/abc/element/el-1/click") => ok(serde_json::Value::Null),
        ("POST", "/session/abc/element/el-2/click") => {
            fail("400 Bad Request", "element click intercepted")
        }
        _ => fail("404 Not Found", "unknown command"),
    }
}

fn logged(log: &RequestLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[tokio::test]
async fn test_session_lifecycle_and_page_commands() {
    let (addr, log) = spawn_driver().await;
    let backend = WebDriverBackend::new(&format!("http://{addr}")).unwrap();

    let session = backend.connect(&SessionConfig::default()).await.unwrap();
    assert_eq!(session.handle(), "abc");

    session
        .navigate("https://example.com", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(session.current_url().await.unwrap(), "https://example.com/");
    assert_eq!(session.title().await.unwrap(), "Example Domain");
    assert_eq!(session.screenshot().await.unwrap(), b"png!");
    session.close().await.unwrap();

    let requests = logged(&log);
    assert_eq!(requests[0], "POST /session");
    assert_eq!(requests[1], "POST /session/abc/window/rect");
    assert!(requests.contains(&"POST /session/abc/url".to_string()));
    assert_eq!(requests.last().map(String::as_str), Some("DELETE /session/abc"));
}

#[tokio::test]
async fn test_element_commands() {
    let (addr, _log) = spawn_driver().await;
    let backend = WebDriverBackend::new(&format!("http://{addr}/")).unwrap();
    let session = backend.connect(&SessionConfig::default()).await.unwrap();

    let item = session.find_element("#item").await.unwrap().unwrap();
    assert_eq!(item, ElementRef::new("el-1", "#item"));
    assert!(session.find_element("#missing").await.unwrap().is_none());

    assert!(session.element_state(&item).await.unwrap().is_interactable());
    assert_eq!(session.text(&item).await.unwrap(), "Hello");
    assert_eq!(
        session.attribute(&item, "href").await.unwrap().as_deref(),
        Some("/next")
    );
    assert_eq!(session.attribute(&item, "title").await.unwrap(), None);
    session.click(&item).await.unwrap();

    assert_eq!(session.count_elements("a").await.unwrap(), 2);
    assert_eq!(session.count_elements("img").await.unwrap(), 0);

    let covered = session.find_element("#covered").await.unwrap().unwrap();
    match session.click(&covered).await {
        Err(Error::Interaction(detail)) => {
            assert_eq!(detail, "element click intercepted: element click intercepted")
        }
        other => panic!("unexpected click result: {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_endpoint_maps_to_error() {
    let (addr, _log) = spawn_driver().await;
    let backend = WebDriverBackend::new(&format!("http://{addr}")).unwrap();
    let session = backend.connect(&SessionConfig::default()).await.unwrap();

    let gone = ElementRef::new("el-9", "#gone");
    assert!(session.text(&gone).await.is_err());
}

#[tokio::test]
async fn test_connect_to_closed_port_fails_session_init() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = WebDriverBackend::new(&format!("http://{addr}")).unwrap();
    let err = backend.connect(&SessionConfig::default()).await.unwrap_err();
    assert!(matches!(err, Error::SessionInit(_)));
}

#[test]
fn test_endpoint_normalization() {
    let backend = WebDriverBackend::new("http://localhost:4444/wd/hub").unwrap();
    assert_eq!(backend.endpoint().as_str(), "http://localhost:4444/wd/hub/");
    assert_eq!(backend.name(), "webdriver");

    assert!(matches!(
        WebDriverBackend::new("not a url"),
        Err(Error::Config(_))
    ));
}
