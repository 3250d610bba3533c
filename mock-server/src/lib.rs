use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// The only organization the mock knows about.
pub const ORG_SLUG: &str = "acme";
/// Bearer token accepted by every route.
pub const TOKEN: &str = "secret-token";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MessageThread {
    pub id: String,
    pub title: String,
    pub unread_count: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AttachmentInput {
    pub file_path: String,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub content: String,
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Favorite {
    pub id: String,
    pub favoritable_type: String,
    pub favoritable_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub file_type: String,
    pub size: u64,
}

#[derive(Deserialize)]
pub struct CreateMessage {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentInput>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub after: Option<String>,
    pub limit: Option<usize>,
}

/// Error body every failing route returns.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: String,
}

#[derive(Debug)]
pub struct Failure {
    status: StatusCode,
    message: &'static str,
    code: &'static str,
}

impl Failure {
    fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "You must be signed in",
            code: "unauthorized",
        }
    }

    fn forbidden() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: "You do not have access to this organization",
            code: "forbidden",
        }
    }

    fn not_found(message: &'static str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
            code: "not_found",
        }
    }

    fn unprocessable(message: &'static str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message,
            code: "unprocessable",
        }
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message.to_string(),
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default)]
pub struct Store {
    pub threads: Vec<MessageThread>,
    pub messages: Vec<Message>,
    pub favorites: Vec<Favorite>,
    pub members: Vec<Member>,
}

impl Store {
    /// A small organization with two threads, three messages, two favorites.
    pub fn seeded() -> Self {
        let thread = |id: &str, title: &str, unread_count| MessageThread {
            id: id.to_string(),
            title: title.to_string(),
            unread_count,
        };
        let message = |id: &str, content: &str| Message {
            id: id.to_string(),
            thread_id: "t1".to_string(),
            content: content.to_string(),
            attachments: Vec::new(),
        };
        let favorite = |id: &str, kind: &str, target: &str| Favorite {
            id: id.to_string(),
            favoritable_type: kind.to_string(),
            favoritable_id: target.to_string(),
        };
        let member = |id: &str, username: &str, role: &str| Member {
            id: id.to_string(),
            username: username.to_string(),
            role: role.to_string(),
        };
        Self {
            threads: vec![thread("t1", "General", 2), thread("t2", "Design", 0)],
            messages: vec![
                message("m1", "hello"),
                message("m2", "welcome aboard"),
                message("m3", "standup at 10"),
            ],
            favorites: vec![
                favorite("fav_1", "Project", "prj_1"),
                favorite("fav_2", "Post", "post_1"),
            ],
            members: vec![
                member("usr_1", "ada", "admin"),
                member("usr_2", "grace", "member"),
                member("usr_3", "alan", "guest"),
            ],
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::seeded()));
    Router::new()
        .route("/v1/users/me", get(get_me))
        .route("/v1/organizations/{org_slug}/members", get(list_members))
        .route("/v1/organizations/{org_slug}/threads", get(list_threads))
        .route("/v1/organizations/{org_slug}/threads/{thread_id}", get(get_thread))
        .route(
            "/v1/organizations/{org_slug}/threads/{thread_id}/messages",
            get(list_messages).post(create_message),
        )
        .route("/v1/organizations/{org_slug}/favorites", get(list_favorites))
        .route("/v1/organizations/{org_slug}/favorites/{favorite_id}", delete(delete_favorite))
        .route("/v1/organizations/{org_slug}/attachments", post(create_attachment))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn authorize(headers: &HeaderMap) -> Result<(), Failure> {
    let expected = format!("Bearer {TOKEN}");
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(()),
        _ => Err(Failure::unauthorized()),
    }
}

fn authorize_org(headers: &HeaderMap, org_slug: &str) -> Result<(), Failure> {
    authorize(headers)?;
    if org_slug == ORG_SLUG {
        Ok(())
    } else {
        Err(Failure::forbidden())
    }
}

async fn get_me(headers: HeaderMap) -> Result<Json<CurrentUser>, Failure> {
    authorize(&headers)?;
    Ok(Json(CurrentUser {
        id: "usr_1".to_string(),
        username: "ada".to_string(),
        display_name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
    }))
}

/// Supports `roles[]=...` filters, repeated once per role.
async fn list_members(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(org_slug): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Member>>, Failure> {
    authorize_org(&headers, &org_slug)?;
    let roles: Vec<&str> = pairs
        .iter()
        .filter(|(key, _)| key == "roles[]")
        .map(|(_, value)| value.as_str())
        .collect();
    let store = db.read().await;
    let members = store
        .members
        .iter()
        .filter(|m| roles.is_empty() || roles.contains(&m.role.as_str()))
        .cloned()
        .collect();
    Ok(Json(members))
}

async fn list_threads(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(org_slug): Path<String>,
) -> Result<Json<Vec<MessageThread>>, Failure> {
    authorize_org(&headers, &org_slug)?;
    Ok(Json(db.read().await.threads.clone()))
}

async fn get_thread(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((org_slug, thread_id)): Path<(String, String)>,
) -> Result<Json<MessageThread>, Failure> {
    authorize_org(&headers, &org_slug)?;
    let store = db.read().await;
    store
        .threads
        .iter()
        .find(|t| t.id == thread_id)
        .cloned()
        .map(Json)
        .ok_or(Failure::not_found("Thread not found"))
}

async fn list_messages(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((org_slug, thread_id)): Path<(String, String)>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Page<Message>>, Failure> {
    authorize_org(&headers, &org_slug)?;
    let store = db.read().await;
    if !store.threads.iter().any(|t| t.id == thread_id) {
        return Err(Failure::not_found("Thread not found"));
    }
    let in_thread: Vec<&Message> = store.messages.iter().filter(|m| m.thread_id == thread_id).collect();
    let start = match &page.after {
        Some(after) => in_thread
            .iter()
            .position(|m| &m.id == after)
            .map(|i| i + 1)
            .ok_or(Failure::unprocessable("Unknown cursor"))?,
        None => 0,
    };
    let limit = page.limit.unwrap_or(20);
    let data: Vec<Message> = in_thread.iter().skip(start).take(limit).map(|m| (*m).clone()).collect();
    let next_cursor = if start + data.len() < in_thread.len() {
        data.last().map(|m| m.id.clone())
    } else {
        None
    };
    Ok(Json(Page { data, next_cursor }))
}

async fn create_message(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((org_slug, thread_id)): Path<(String, String)>,
    Json(input): Json<CreateMessage>,
) -> Result<(StatusCode, Json<Message>), Failure> {
    authorize_org(&headers, &org_slug)?;
    if input.content.trim().is_empty() && input.attachments.is_empty() {
        return Err(Failure::unprocessable("Content can't be blank"));
    }
    let mut store = db.write().await;
    if !store.threads.iter().any(|t| t.id == thread_id) {
        return Err(Failure::not_found("Thread not found"));
    }
    let message = Message {
        id: Uuid::new_v4().to_string(),
        thread_id,
        content: input.content,
        attachments: input.attachments,
    };
    store.messages.push(message.clone());
    tracing::info!(id = %message.id, thread = %message.thread_id, "message created");
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_favorites(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(org_slug): Path<String>,
) -> Result<Json<Vec<Favorite>>, Failure> {
    authorize_org(&headers, &org_slug)?;
    Ok(Json(db.read().await.favorites.clone()))
}

async fn delete_favorite(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((org_slug, favorite_id)): Path<(String, String)>,
) -> Result<StatusCode, Failure> {
    authorize_org(&headers, &org_slug)?;
    let mut store = db.write().await;
    let before = store.favorites.len();
    store.favorites.retain(|f| f.id != favorite_id);
    if store.favorites.len() == before {
        return Err(Failure::not_found("Favorite not found"));
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Expects a `file` part plus an optional `file_type` text part.
async fn create_attachment(
    headers: HeaderMap,
    Path(org_slug): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), Failure> {
    authorize_org(&headers, &org_slug)?;
    let mut file: Option<(String, u64)> = None;
    let mut file_type = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| Failure::unprocessable("Malformed multipart body"))?
    {
        let part = field.name().map(str::to_string);
        match part.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|_| Failure::unprocessable("Malformed multipart body"))?;
                file = Some((name, bytes.len() as u64));
            }
            Some("file_type") => {
                file_type = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| Failure::unprocessable("Malformed multipart body"))?,
                );
            }
            _ => {}
        }
    }
    let (name, size) = file.ok_or(Failure::unprocessable("File is required"))?;
    Ok((
        StatusCode::CREATED,
        Json(Attachment {
            id: Uuid::new_v4().to_string(),
            name,
            file_type: file_type.unwrap_or_else(|| "application/octet-stream".to_string()),
            size,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_serializes_message_and_code() {
        let json = serde_json::to_value(ErrorBody {
            message: "x".to_string(),
            code: "not_found".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"message": "x", "code": "not_found"}));
    }

    #[test]
    fn create_message_defaults_attachments() {
        let input: CreateMessage = serde_json::from_str(r#"{"content":"hi"}"#).unwrap();
        assert_eq!(input.content, "hi");
        assert!(input.attachments.is_empty());
    }

    #[test]
    fn create_message_rejects_missing_content() {
        let result: Result<CreateMessage, _> = serde_json::from_str(r#"{"attachments":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn seeded_store_has_messages_in_first_thread() {
        let store = Store::seeded();
        assert_eq!(store.threads.len(), 2);
        assert!(store.messages.iter().all(|m| m.thread_id == "t1"));
    }

    #[test]
    fn authorize_requires_exact_bearer_token() {
        let mut headers = HeaderMap::new();
        assert!(authorize(&headers).is_err());
        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(authorize(&headers).is_err());
        headers.insert(header::AUTHORIZATION, format!("Bearer {TOKEN}").parse().unwrap());
        assert!(authorize(&headers).is_ok());
        assert!(authorize_org(&headers, "other").is_err());
    }
}
