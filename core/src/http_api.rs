/// HTTP sync API — the contract polled by web clients
///
/// Endpoints:
///   POST /messages                      body: {"senderId":N,"receiverId":N,"content":"..."}
///   GET  /messages/conversation         ?user1Id=N&user2Id=N&afterSeq=0
///   POST /messages/mark-as-read         ?userId=N&interlocutorId=N[&upToSeq=N]
///   GET  /messages/unread/summary       ?userId=N
///   GET  /messages/unread/count         ?userId=N
///   GET  /status
///
/// Every call is a bounded request/response; clients re-poll on a fixed
/// interval instead of holding a push channel.
use crate::error::{ChatError, Result};
use crate::sync::SyncService;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

// ─── Type alias ──────────────────────────────────────────────────────────────

type BoxBody = http_body_util::combinators::BoxBody<bytes::Bytes, Infallible>;
type Resp = Response<BoxBody>;

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn cors_headers(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
}

fn json_resp(status: StatusCode, body: Vec<u8>) -> Resp {
    cors_headers(Response::builder())
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(bytes::Bytes::from(body)).boxed())
        .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()).boxed()))
}

fn json_ok(value: serde_json::Value) -> Resp {
    json_resp(StatusCode::OK, serde_json::to_vec(&value).unwrap_or_default())
}

fn json_err(status: StatusCode, msg: &str) -> Resp {
    json_resp(
        status,
        serde_json::to_vec(&serde_json::json!({ "error": msg })).unwrap_or_default(),
    )
}

/// Map a service error onto the HTTP status taxonomy: invalid content and
/// self-messages are 400, unknown participants 404, everything else 500.
fn error_resp(e: &ChatError) -> Resp {
    let status = match e {
        ChatError::InvalidContent | ChatError::SelfMessage => StatusCode::BAD_REQUEST,
        ChatError::NotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_err(status, &e.to_string())
}

// ─── Entry point ─────────────────────────────────────────────────────────────

pub async fn start_http_api(service: SyncService, http_addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(http_addr).await.map_err(ChatError::Io)?;
    info!("HTTP sync API started on http://{}", http_addr);

    let service = Arc::new(service);
    loop {
        match listener.accept().await {
            Ok((stream, _peer)) => {
                let io = TokioIo::new(stream);
                let service = service.clone();
                tokio::spawn(async move {
                    let svc = service_fn(move |req| {
                        let service = service.clone();
                        async move { Ok::<_, Infallible>(handle(req, service).await) }
                    });
                    if let Err(e) = http1::Builder::new().serve_connection(io, svc).await {
                        if !e.is_incomplete_message() {
                            error!("HTTP API connection error: {:?}", e);
                        }
                    }
                });
            }
            Err(e) => error!("HTTP API accept error: {}", e),
        }
    }
}

// ─── Router ──────────────────────────────────────────────────────────────────

async fn handle(req: Request<hyper::body::Incoming>, service: Arc<SyncService>) -> Resp {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    // CORS preflight
    if method == Method::OPTIONS {
        return cors_headers(Response::builder())
            .status(StatusCode::NO_CONTENT)
            .body(Full::new(bytes::Bytes::new()).boxed())
            .unwrap_or_else(|_| Response::new(Full::new(bytes::Bytes::new()).boxed()));
    }

    match (method, path.as_str()) {
        (Method::POST, "/messages") => post_send(req, &service).await,
        (Method::GET, "/messages/conversation") => get_conversation(&query, &service),
        (Method::POST, "/messages/mark-as-read") => post_mark_read(&query, &service),
        (Method::GET, "/messages/unread/summary") => get_unread_summary(&query, &service),
        (Method::GET, "/messages/unread/count") => get_unread_count(&query, &service),
        (Method::GET, "/status") => get_status(&service),
        _ => json_err(StatusCode::NOT_FOUND, "not found"),
    }
}

// ─── Handlers ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest {
    sender_id: u64,
    receiver_id: u64,
    content: String,
}

async fn post_send(req: Request<hyper::body::Incoming>, service: &SyncService) -> Resp {
    let body = match read_body(req).await {
        Ok(b) => b,
        Err(e) => return json_err(StatusCode::BAD_REQUEST, &format!("body read error: {}", e)),
    };
    let r: SendRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return json_err(StatusCode::BAD_REQUEST, &format!("invalid JSON: {}", e)),
    };
    match service.send(r.sender_id, r.receiver_id, &r.content) {
        Ok(message) => json_ok(serde_json::json!(message)),
        Err(e) => error_resp(&e),
    }
}

fn get_conversation(query: &str, service: &SyncService) -> Resp {
    let (user1, user2) = match (
        parse_query_u64(query, "user1Id"),
        parse_query_u64(query, "user2Id"),
    ) {
        (Some(a), Some(b)) => (a, b),
        _ => return json_err(StatusCode::BAD_REQUEST, "user1Id and user2Id are required"),
    };
    let after_seq = parse_query_u64(query, "afterSeq").unwrap_or(0);
    match service.fetch_conversation(user1, user2, after_seq) {
        Ok(messages) => {
            let next_after_seq = messages.last().map(|m| m.seq).unwrap_or(after_seq);
            json_ok(serde_json::json!({
                "nextAfterSeq": next_after_seq,
                "messages": messages,
            }))
        }
        Err(e) => error_resp(&e),
    }
}

fn post_mark_read(query: &str, service: &SyncService) -> Resp {
    let (user, interlocutor) = match (
        parse_query_u64(query, "userId"),
        parse_query_u64(query, "interlocutorId"),
    ) {
        (Some(u), Some(i)) => (u, i),
        _ => {
            return json_err(
                StatusCode::BAD_REQUEST,
                "userId and interlocutorId are required",
            )
        }
    };
    let up_to_seq = parse_query_u64(query, "upToSeq");
    match service.mark_read(user, interlocutor, up_to_seq) {
        Ok(cursor) => json_ok(serde_json::json!({ "upToSeq": cursor })),
        Err(e) => error_resp(&e),
    }
}

fn get_unread_summary(query: &str, service: &SyncService) -> Resp {
    let user = match parse_query_u64(query, "userId") {
        Some(u) => u,
        None => return json_err(StatusCode::BAD_REQUEST, "userId is required"),
    };
    match service.unread_summary(user) {
        Ok(summary) => json_ok(serde_json::json!(summary)),
        Err(e) => error_resp(&e),
    }
}

fn get_unread_count(query: &str, service: &SyncService) -> Resp {
    let user = match parse_query_u64(query, "userId") {
        Some(u) => u,
        None => return json_err(StatusCode::BAD_REQUEST, "userId is required"),
    };
    match service.unread_total(user) {
        Ok(count) => json_ok(serde_json::json!({ "count": count })),
        Err(e) => error_resp(&e),
    }
}

fn get_status(service: &SyncService) -> Resp {
    json_ok(serde_json::json!({
        "status": "ok",
        "messages": service.message_count(),
    }))
}

// ─── Utilities ────────────────────────────────────────────────────────────────

async fn read_body(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<bytes::Bytes, String> {
    req.collect()
        .await
        .map(|c| c.to_bytes())
        .map_err(|e| e.to_string())
}

fn parse_query_u64(query: &str, key: &str) -> Option<u64> {
    for pair in query.split('&') {
        if let Some((k, v)) = pair.split_once('=') {
            if k == key {
                return v.parse().ok();
            }
        }
    }
    None
}
