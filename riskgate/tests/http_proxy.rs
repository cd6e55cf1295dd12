//! Integration tests for the HTTP transport against a wiremock downstream.

use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use riskgate::transport::{HttpOptions, run_http_with};
use riskgate_core::RiskAwareMediator;
use riskgate_core::audit::NoopAuditLog;
use riskgate_core::config::RiskConfig;
use riskgate_core::risk::RiskDetector;

fn mediator() -> Arc<RiskAwareMediator> {
    Arc::new(RiskAwareMediator::new(
        RiskDetector::new(&RiskConfig::default()),
        Arc::new(NoopAuditLog::new()),
        true,
    ))
}

/// Feed `input` through the transport and return the client-visible lines.
async fn run(opts: HttpOptions, input: &str) -> Vec<Value> {
    run_raw(opts, input)
        .await
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

/// Feed `input` through the transport and return the client output verbatim.
async fn run_raw(opts: HttpOptions, input: &str) -> String {
    let (mut client_writer, proxy_in) = duplex(64 * 1024);
    let (proxy_out, mut client_reader) = duplex(64 * 1024);

    client_writer.write_all(input.as_bytes()).await.unwrap();
    drop(client_writer);

    run_http_with(opts, mediator(), CancellationToken::new(), proxy_in, proxy_out)
        .await
        .unwrap();

    let mut out = String::new();
    client_reader.read_to_string(&mut out).await.unwrap();
    out
}

#[tokio::test]
async fn test_request_forwarded_with_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-api-key", "secret"))
        .and(header("content-type", "application/json"))
        .and(body_string_contains("tools/list"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{\n  \"jsonrpc\": \"2.0\",\n  \"id\": 1,\n  \"result\": {\"tools\": []}\n}"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let opts = HttpOptions::new(format!("{}/mcp", server.uri())).with_header("X-Api-Key", "secret");
    let lines = run(opts, "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/list\"}\n").await;

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[0]["result"]["tools"], serde_json::json!([]));
}

#[tokio::test]
async fn test_response_body_relayed_byte_for_byte() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\n\"result\":{\"big\":123456789012345678901234567890,\"f\":1.0e2}}\n",
        ))
        .mount(&server)
        .await;

    let out = run_raw(
        HttpOptions::new(server.uri()),
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"tools/call\",\"params\":{\"name\":\"sum\"}}\n",
    )
    .await;

    assert_eq!(
        out,
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"big\":123456789012345678901234567890,\"f\":1.0e2}}\n"
    );
}

#[tokio::test]
async fn test_risky_request_never_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(0)
        .mount(&server)
        .await;

    let lines = run(
        HttpOptions::new(server.uri()),
        "{\"jsonrpc\":\"2.0\",\"id\":9,\"method\":\"resources/read\",\"params\":{\"sql\":\"drop table users\"}}\n",
    )
    .await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0]["id"].is_null());
    assert!(
        lines[0]["error"]["data"]
            .as_str()
            .unwrap()
            .contains("keyword:DROP TABLE")
    );
}

#[tokio::test]
async fn test_accepted_notification_produces_no_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let lines = run(
        HttpOptions::new(server.uri()),
        "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
    )
    .await;
    assert!(lines.is_empty());
}

#[tokio::test]
async fn test_non_json_error_synthesized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let lines = run(
        HttpOptions::new(server.uri()),
        "{\"jsonrpc\":\"2.0\",\"id\":\"abc\",\"method\":\"tools/list\"}\n",
    )
    .await;

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], "abc");
    assert_eq!(lines[0]["error"]["code"], -32603);
    assert!(lines[0]["error"]["data"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn test_json_error_body_relayed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"jsonrpc":"2.0","id":5,"error":{"code":-32602,"message":"Invalid params"}}"#,
        ))
        .mount(&server)
        .await;

    let lines = run(
        HttpOptions::new(server.uri()),
        "{\"jsonrpc\":\"2.0\",\"id\":5,\"method\":\"tools/call\",\"params\":{\"name\":\"search\"}}\n",
    )
    .await;

    assert_eq!(lines[0]["error"]["code"], -32602);
}

#[tokio::test]
async fn test_event_stream_payloads_relayed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{}}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let lines = run(
        HttpOptions::new(server.uri()),
        "{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n",
    )
    .await;

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], 2);
}

#[tokio::test]
async fn test_unreachable_downstream_answers_request() {
    let lines = run(
        HttpOptions::new("http://127.0.0.1:1/mcp"),
        "{\"jsonrpc\":\"2.0\",\"id\":3,\"method\":\"tools/list\"}\n",
    )
    .await;

    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], 3);
    assert!(
        lines[0]["error"]["data"]
            .as_str()
            .unwrap()
            .starts_with("downstream request failed")
    );
}
