/// TCP command API for the CLI and external clients
///
/// Newline-delimited JSON request/response. Every command names the acting
/// user explicitly.
use crate::directory::{SledDirectory, UserRecord};
use crate::error::{ChatError, Result};
use crate::sync::SyncService;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// API request
#[derive(Debug, Deserialize)]
#[serde(tag = "command")]
enum ApiRequest {
    #[serde(rename = "send")]
    Send {
        sender_id: u64,
        receiver_id: u64,
        content: String,
    },
    #[serde(rename = "history")]
    History {
        user_id: u64,
        other_id: u64,
        #[serde(default)]
        after_seq: u64,
    },
    #[serde(rename = "mark_read")]
    MarkRead {
        user_id: u64,
        interlocutor_id: u64,
        up_to_seq: Option<u64>,
    },
    #[serde(rename = "unread")]
    Unread { user_id: u64 },
    #[serde(rename = "add_user")]
    AddUser { id: u64, display_name: String },
    #[serde(rename = "remove_user")]
    RemoveUser { id: u64 },
    #[serde(rename = "users")]
    Users,
    #[serde(rename = "status")]
    Status,
}

/// API response
#[derive(Debug, Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg),
        }
    }
}

/// Start API server for the CLI
pub async fn start_api_server(
    service: SyncService,
    directory: SledDirectory,
    api_addr: SocketAddr,
) -> Result<()> {
    let listener = TcpListener::bind(&api_addr).await.map_err(ChatError::Io)?;

    info!("API server listening on {}", api_addr);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("API client connected from {}", addr);
                let service = service.clone();
                let directory = directory.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_api_client(stream, service, directory).await {
                        error!("Error handling API client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept API connection: {}", e);
            }
        }
    }
}

/// Handle API client connection
async fn handle_api_client(
    mut stream: TcpStream,
    service: SyncService,
    directory: SledDirectory,
) -> Result<()> {
    let (reader, mut writer) = stream.split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("API client disconnected");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                let response = match handle_request(trimmed, &service, &directory) {
                    Ok(resp) => resp,
                    Err(e) => ApiResponse::error(format!("{}", e)),
                };

                let json = serde_json::to_string(&response).map_err(ChatError::Serialization)?;

                writer
                    .write_all(json.as_bytes())
                    .await
                    .map_err(ChatError::Io)?;
                writer.write_all(b"\n").await.map_err(ChatError::Io)?;
            }
            Err(e) => {
                error!("Error reading from API client: {}", e);
                break;
            }
        }
    }

    Ok(())
}

/// Handle API request
fn handle_request(
    request: &str,
    service: &SyncService,
    directory: &SledDirectory,
) -> Result<ApiResponse> {
    let req: ApiRequest = serde_json::from_str(request)
        .map_err(|e| ChatError::Protocol(format!("Invalid request: {}", e)))?;

    match req {
        ApiRequest::Send {
            sender_id,
            receiver_id,
            content,
        } => match service.send(sender_id, receiver_id, &content) {
            Ok(message) => Ok(ApiResponse::success(serde_json::json!({
                "message": message
            }))),
            Err(e) => Ok(ApiResponse::error(format!("{}", e))),
        },
        ApiRequest::History {
            user_id,
            other_id,
            after_seq,
        } => match service.fetch_conversation(user_id, other_id, after_seq) {
            Ok(messages) => {
                let next_after_seq = messages.last().map(|m| m.seq).unwrap_or(after_seq);
                Ok(ApiResponse::success(serde_json::json!({
                    "next_after_seq": next_after_seq,
                    "messages": messages,
                })))
            }
            Err(e) => Ok(ApiResponse::error(format!("{}", e))),
        },
        ApiRequest::MarkRead {
            user_id,
            interlocutor_id,
            up_to_seq,
        } => match service.mark_read(user_id, interlocutor_id, up_to_seq) {
            Ok(cursor) => Ok(ApiResponse::success(serde_json::json!({
                "up_to_seq": cursor
            }))),
            Err(e) => Ok(ApiResponse::error(format!("{}", e))),
        },
        ApiRequest::Unread { user_id } => match service.unread_summary(user_id) {
            Ok(summary) => {
                let total: u64 = summary.values().sum();
                Ok(ApiResponse::success(serde_json::json!({
                    "total": total,
                    "conversations": summary,
                })))
            }
            Err(e) => Ok(ApiResponse::error(format!("{}", e))),
        },
        ApiRequest::AddUser { id, display_name } => {
            let user = UserRecord {
                id,
                display_name,
                added_at: chrono::Utc::now().to_rfc3339(),
            };
            match directory.upsert_user(&user) {
                Ok(()) => Ok(ApiResponse::success(serde_json::json!({ "user": user }))),
                Err(e) => Ok(ApiResponse::error(format!("{}", e))),
            }
        }
        ApiRequest::RemoveUser { id } => match directory.remove_user(id) {
            Ok(removed) => Ok(ApiResponse::success(serde_json::json!({ "removed": removed }))),
            Err(e) => Ok(ApiResponse::error(format!("{}", e))),
        },
        ApiRequest::Users => match directory.list_users() {
            Ok(users) => Ok(ApiResponse::success(serde_json::json!({ "users": users }))),
            Err(e) => Ok(ApiResponse::error(format!("{}", e))),
        },
        ApiRequest::Status => Ok(ApiResponse::success(serde_json::json!({
            "status": "ok",
            "messages": service.message_count(),
        }))),
    }
}
