use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use plantwatch_clients::{
    ChatCompletionClient, ClientError, GenerationConfig, RetrievalClient, RetrievalConfig,
};
use plantwatch_core::error::CoreError;
use plantwatch_core::ports::{KnowledgeRetriever, TextGenerator};

/// A captured request: request line plus body.
#[derive(Debug, Clone)]
struct Captured {
    request_line: String,
    headers: String,
    body: String,
}

/// Serve canned `(status, body)` responses in order, one per connection.
async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<Mutex<Vec<Captured>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&captured);

    tokio::spawn(async move {
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            log.lock().await.push(request);

            let reply = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        }
    });

    (format!("http://{addr}"), captured)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let content_length = head
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                let body = String::from_utf8_lossy(&buf[end + 4..end + 4 + content_length]).to_string();
                let (request_line, headers) = head.split_once("\r\n").unwrap_or((&head, ""));
                return Captured {
                    request_line: request_line.to_string(),
                    headers: headers.to_lowercase(),
                    body,
                };
            }
        }
    }
    panic!("connection closed before a full request arrived");
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieval_resolves_collection_then_queries() {
    let (url, captured) = serve(vec![
        (200, r#"{"id":"c0ffee","name":"technical_manuals"}"#.into()),
        (200, r#"{"data":[{"embedding":[0.0,3.0,4.0]}]}"#.into()),
        (
            200,
            r#"{"documents":[["Replace the 24V hotend fan.","Check belt tension."]],"distances":[[0.2,0.6]],"metadatas":[[{"page":14},{"page":3}]]}"#.into(),
        ),
    ])
    .await;

    let client = RetrievalClient::new(RetrievalConfig {
        embedding_url: url.clone(),
        url,
        ..Default::default()
    })
    .unwrap();

    let passages = client.search("FF-001 fan failure").await.unwrap();
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].text, "Replace the 24V hotend fan.");
    assert_eq!(passages[0].page, Some(14));

    let requests = captured.lock().await;
    assert_eq!(
        requests[0].request_line,
        "GET /api/v1/collections/technical_manuals HTTP/1.1"
    );
    assert_eq!(requests[1].request_line, "POST /embeddings HTTP/1.1");
    let embed: serde_json::Value = serde_json::from_str(&requests[1].body).unwrap();
    assert_eq!(embed["input"][0], "FF-001 fan failure");
    assert_eq!(embed["model"], "BAAI/bge-base-en-v1.5");

    assert_eq!(
        requests[2].request_line,
        "POST /api/v1/collections/c0ffee/query HTTP/1.1"
    );
    let body: serde_json::Value = serde_json::from_str(&requests[2].body).unwrap();
    assert_eq!(body["query_embeddings"][0], serde_json::json!([0.0, 0.6, 0.8]));
    assert!(body.get("query_texts").is_none());
    assert_eq!(body["n_results"], 3);
}

#[tokio::test]
async fn retrieval_embedding_failure_is_unavailable() {
    let (url, captured) = serve(vec![
        (200, r#"{"id":"c0ffee"}"#.into()),
        (503, r#"{"error":"model loading"}"#.into()),
    ])
    .await;
    let client = RetrievalClient::new(RetrievalConfig {
        embedding_url: url.clone(),
        url,
        ..Default::default()
    })
    .unwrap();

    assert_matches!(
        client.search("anything").await,
        Err(CoreError::CollaboratorUnavailable { collaborator: "knowledge retriever", .. })
    );
    // no query is sent without a vector
    assert_eq!(captured.lock().await.len(), 2);
}

#[tokio::test]
async fn retrieval_server_error_is_unavailable() {
    let (url, _captured) = serve(vec![(500, r#"{"error":"boom"}"#.into())]).await;
    let client = RetrievalClient::new(RetrievalConfig {
        url,
        ..Default::default()
    })
    .unwrap();

    assert_matches!(
        client.search("anything").await,
        Err(CoreError::CollaboratorUnavailable { collaborator: "knowledge retriever", .. })
    );
}

#[tokio::test]
async fn retrieval_unreachable_is_request_error() {
    // Bind then drop to get a port nobody listens on.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let client = RetrievalClient::new(RetrievalConfig {
        url: format!("http://{addr}"),
        timeout: Duration::from_secs(2),
        ..Default::default()
    })
    .unwrap();

    assert_matches!(client.query("q").await, Err(ClientError::Request(_)));
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn chat_completion_sends_bearer_and_model() {
    let (url, captured) = serve(vec![(
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"Swap the fan."}}]}"#.into(),
    )])
    .await;

    let client = ChatCompletionClient::new(GenerationConfig {
        api_url: url,
        model: "test-model".into(),
        api_key: Some("sk-test".into()),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    assert_eq!(client.complete("prompt text").await.unwrap(), "Swap the fan.");

    let requests = captured.lock().await;
    assert_eq!(requests[0].request_line, "POST /chat/completions HTTP/1.1");
    assert!(requests[0].headers.contains("authorization: bearer sk-test"));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).unwrap();
    assert_eq!(body["model"], "test-model");
    assert_eq!(body["messages"][0]["content"], "prompt text");
}

#[tokio::test]
async fn chat_completion_rate_limit_is_api_error() {
    let (url, _captured) = serve(vec![(429, r#"{"error":"slow down"}"#.into())]).await;
    let client = ChatCompletionClient::new(GenerationConfig {
        api_url: url,
        api_key: Some("k".into()),
        ..Default::default()
    })
    .unwrap();

    assert_matches!(
        client.chat("p").await,
        Err(ClientError::ApiError { status: 429, .. })
    );
}
