//! Tests for `src/wasapi/client.rs` against a one-shot local HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use url::Url;

use wasapi_bridge::bus::EventBus;
use wasapi_bridge::wasapi::client::{SendAttachment, SendMessage, WasapiApi, WasapiClient};
use wasapi_bridge::wasapi::normalizer::{InboundNormalizer, FALLBACK_NAME};
use wasapi_bridge::wasapi::payload::WebhookPayload;
use wasapi_bridge::wasapi::WasapiError;

use crate::support::settings;

/// Raw response to serve.
struct Canned {
    status_line: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

fn json_response(status_line: &'static str, body: &str) -> Canned {
    Canned {
        status_line,
        content_type: "application/json",
        body: body.as_bytes().to_vec(),
    }
}

/// Read one full HTTP request (headers plus `Content-Length` body).
async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let content_length = text[..split]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= split.saturating_add(4).saturating_add(content_length) {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serve one request; returns the base URL and a receiver for the raw request.
async fn serve_once(canned: Canned) -> (String, oneshot::Receiver<String>) {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let request = read_request(&mut socket).await;
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                canned.status_line,
                canned.content_type,
                canned.body.len()
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.write_all(&canned.body).await;
            let _ = tx.send(request);
        }
    });

    (format!("http://{addr}"), rx)
}

fn client_for(base: &str) -> WasapiClient {
    let mut settings = settings();
    settings.api_base = match Url::parse(&format!("{base}/api/v1")) {
        Ok(url) => url,
        Err(err) => panic!("api base should parse: {err}"),
    };
    WasapiClient::new(&settings)
}

async fn captured(rx: oneshot::Receiver<String>) -> String {
    match rx.await {
        Ok(request) => request,
        Err(err) => panic!("server should capture the request: {err}"),
    }
}

#[tokio::test]
async fn contact_lookup_parses_first_name_with_bearer_auth() {
    let (base, rx) = serve_once(json_response(
        "200 OK",
        r#"{"success":true,"data":{"id":7,"first_name":"Ana","last_name":"Lopez","wa_id":"521555@c.us"}}"#,
    ))
    .await;
    let client = client_for(&base);

    let contact = client.contact_by_id("521555@c.us").await;

    let contact = match contact {
        Ok(Some(contact)) => contact,
        other => panic!("expected contact, got: {other:?}"),
    };
    assert_eq!(contact.first_name, "Ana");
    let request = captured(rx).await;
    assert!(request.starts_with("GET /api/v1/contacts/521555"), "{request}");
    assert!(request.to_ascii_lowercase().contains("authorization: bearer test-token"));
}

#[tokio::test]
async fn contact_lookup_not_found_is_none() {
    let (base, _rx) = serve_once(json_response("404 Not Found", r#"{"message":"Not found"}"#)).await;
    let client = client_for(&base);

    let contact = client.contact_by_id("521555@c.us").await;
    assert!(matches!(contact, Ok(None)));
}

#[tokio::test]
async fn whatsapp_numbers_parses_device_list() {
    let (base, rx) = serve_once(json_response(
        "200 OK",
        r#"{"data":[{"id":999,"display_name":"Ventas","phone_number":"5215550000","status":"active"}]}"#,
    ))
    .await;
    let client = client_for(&base);

    let devices = match client.whatsapp_numbers().await {
        Ok(devices) => devices,
        Err(err) => panic!("device list should parse: {err}"),
    };
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].id, 999);
    assert_eq!(devices[0].display_name, "Ventas");
    assert!(captured(rx).await.starts_with("GET /api/v1/whatsapp-numbers"));
}

#[tokio::test]
async fn send_message_posts_json_envelope() {
    let (base, rx) = serve_once(json_response(
        "200 OK",
        r#"{"success":true,"message":"queued","data":{"id":1}}"#,
    ))
    .await;
    let client = client_for(&base);
    let request = SendMessage {
        wa_id: "521555@c.us".to_owned(),
        from_id: "999".to_owned(),
        message: "hi".to_owned(),
    };

    let response = match client.send_message(&request).await {
        Ok(response) => response,
        Err(err) => panic!("send should succeed: {err}"),
    };
    assert!(response.success);
    assert_eq!(response.message.as_deref(), Some("queued"));

    let raw = captured(rx).await;
    assert!(raw.starts_with("POST /api/v1/whatsapp-messages"));
    assert!(raw.contains(r#""from_id":"999""#));
    assert!(raw.contains(r#""wa_id":"521555@c.us""#));
}

#[tokio::test]
async fn send_message_error_status_is_sanitized() {
    let (base, _rx) = serve_once(json_response(
        "401 Unauthorized",
        r#"{"message":"Unauthenticated token 123|abcdefghijklmnopqrstuvwxyz0123"}"#,
    ))
    .await;
    let client = client_for(&base);
    let request = SendMessage {
        wa_id: "521555@c.us".to_owned(),
        from_id: "999".to_owned(),
        message: "hi".to_owned(),
    };

    match client.send_message(&request).await {
        Err(WasapiError::HttpStatus { status, body }) => {
            assert_eq!(status, 401);
            assert!(!body.contains("abcdefghijklmnopqrstuvwxyz0123"));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("expected http status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn fetch_media_sends_token_header_and_reads_content_type() {
    let (base, rx) = serve_once(Canned {
        status_line: "200 OK",
        content_type: "audio/ogg; codecs=opus",
        body: vec![b'O', b'g', b'g', b'S'],
    })
    .await;
    let client = client_for(&base);
    let url = match Url::parse(&format!("{base}/media/voice-1")) {
        Ok(url) => url,
        Err(err) => panic!("media url should parse: {err}"),
    };

    let media = match client.fetch_media(&url).await {
        Ok(media) => media,
        Err(err) => panic!("media fetch should succeed: {err}"),
    };
    assert_eq!(media.bytes, b"OggS".to_vec());
    assert_eq!(media.content_type.as_deref(), Some("audio/ogg; codecs=opus"));

    let raw = captured(rx).await.to_ascii_lowercase();
    assert!(raw.starts_with("get /media/voice-1"));
    assert!(raw.contains("token: test-token"));
}

#[tokio::test]
async fn contact_lookup_server_error_is_http_status() {
    let (base, _rx) = serve_once(json_response(
        "500 Internal Server Error",
        r#"{"message":"Server Error"}"#,
    ))
    .await;
    let client = client_for(&base);

    let contact = client.contact_by_id("521555@c.us").await;
    assert!(
        matches!(contact, Err(WasapiError::HttpStatus { status: 500, .. })),
        "{contact:?}"
    );
}

#[tokio::test]
async fn normalizer_falls_back_when_contact_lookup_errors() {
    let (base, _rx) = serve_once(json_response(
        "503 Service Unavailable",
        r#"{"message":"down"}"#,
    ))
    .await;
    let api = Arc::new(client_for(&base));
    let normalizer = InboundNormalizer::new(api, Arc::new(EventBus::new()), Duration::from_secs(5));
    let payload = match WebhookPayload::from_slice(
        br#"{"data":{"type":"in","wa_id":"521555@c.us","message_type":"text","message":"hola","from_id":999}}"#,
    ) {
        Ok(payload) => payload,
        Err(err) => panic!("test payload should parse: {err}"),
    };

    let event = normalizer.normalize(payload).await;
    assert_eq!(event.map(|e| e.name).as_deref(), Some(FALLBACK_NAME));
}

fn attachment(file_path: std::path::PathBuf, filename: Option<&str>) -> SendAttachment {
    SendAttachment {
        wa_id: "521555@c.us".to_owned(),
        from_id: "999".to_owned(),
        file_path,
        caption: Some("factura".to_owned()),
        filename: filename.map(str::to_owned),
    }
}

#[tokio::test]
async fn send_attachment_posts_multipart_parts() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("local.pdf");
    std::fs::write(&path, b"%PDF-1.7 body").expect("write attachment");
    let (base, rx) = serve_once(json_response(
        "200 OK",
        r#"{"success":true,"message":"attachment queued"}"#,
    ))
    .await;
    let client = client_for(&base);

    let response = client
        .send_attachment(&attachment(path, Some("report.pdf")))
        .await;
    assert!(matches!(response, Ok(ref r) if r.success), "{response:?}");

    let raw = captured(rx).await;
    assert!(raw.starts_with("POST /api/v1/whatsapp-messages/attachment"), "{raw}");
    let lower = raw.to_ascii_lowercase();
    assert!(lower.contains("content-type: multipart/form-data; boundary="));
    assert!(lower.contains("authorization: bearer test-token"));
    for (name, value) in [
        ("wa_id", "521555@c.us"),
        ("from_id", "999"),
        ("caption", "factura"),
        ("filename", "report.pdf"),
    ] {
        let part = format!("name=\"{name}\"\r\n\r\n{value}\r\n");
        assert!(raw.contains(&part), "missing {name} part in:\n{raw}");
    }
    assert!(raw.contains(r#"name="file"; filename="report.pdf""#), "{raw}");
    assert!(raw.contains("%PDF-1.7 body"));
}

#[tokio::test]
async fn send_attachment_without_filename_uses_file_name() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("photo.jpeg");
    std::fs::write(&path, b"jpeg-bytes").expect("write attachment");
    let (base, rx) = serve_once(json_response("200 OK", r#"{"success":true}"#)).await;
    let client = client_for(&base);

    let response = client.send_attachment(&attachment(path, None)).await;
    assert!(response.is_ok(), "{response:?}");

    let raw = captured(rx).await;
    assert!(raw.contains(r#"name="file"; filename="photo.jpeg""#), "{raw}");
    assert!(!raw.contains(r#"name="filename""#), "{raw}");
}

#[tokio::test]
async fn send_attachment_missing_file_is_io_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let client = client_for("http://127.0.0.1:9");

    let response = client
        .send_attachment(&attachment(tmp.path().join("absent.pdf"), None))
        .await;
    assert!(matches!(response, Err(WasapiError::Io(_))), "{response:?}");
}

#[test]
fn client_debug_redacts_token() {
    let client = WasapiClient::new(&settings());
    let debug = format!("{client:?}");
    assert!(!debug.contains("test-token"));
    assert!(debug.contains("api-ws.wasapi.io"));
}
