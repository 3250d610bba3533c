use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, ErrorBody, Favorite, Member, Message, MessageThread, Page, TOKEN};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn authed(method: &str, uri: &str) -> http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::AUTHORIZATION, format!("Bearer {TOKEN}"))
}

fn get(uri: &str) -> Request<String> {
    authed("GET", uri).body(String::new()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    authed(method, uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

// --- auth ---

#[tokio::test]
async fn missing_token_returns_401_with_error_body() {
    let resp = app()
        .oneshot(Request::builder().uri("/v1/users/me").body(String::new()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "unauthorized");
}

#[tokio::test]
async fn unknown_org_returns_403() {
    let resp = app().oneshot(get("/v1/organizations/globex/threads")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "forbidden");
}

// --- threads ---

#[tokio::test]
async fn list_threads_returns_seeded_threads() {
    let resp = app().oneshot(get("/v1/organizations/acme/threads")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let threads: Vec<MessageThread> = body_json(resp).await;
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0].title, "General");
}

#[tokio::test]
async fn get_thread_not_found() {
    let resp = app().oneshot(get("/v1/organizations/acme/threads/nope")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.message, "Thread not found");
    assert_eq!(err.code, "not_found");
}

// --- messages ---

#[tokio::test]
async fn list_messages_paginates_with_cursor() {
    let resp = app()
        .oneshot(get("/v1/organizations/acme/threads/t1/messages?limit=2"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Page<Message> = body_json(resp).await;
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.next_cursor.as_deref(), Some("m2"));

    let resp = app()
        .oneshot(get("/v1/organizations/acme/threads/t1/messages?after=m2&limit=2"))
        .await
        .unwrap();
    let page: Page<Message> = body_json(resp).await;
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, "m3");
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn create_message_returns_201() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/v1/organizations/acme/threads/t2/messages",
            r#"{"content":"ship it"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let message: Message = body_json(resp).await;
    assert_eq!(message.content, "ship it");
    assert_eq!(message.thread_id, "t2");
}

#[tokio::test]
async fn blank_message_returns_422() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/v1/organizations/acme/threads/t1/messages",
            r#"{"content":"   "}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.code, "unprocessable");
}

// --- members ---

#[tokio::test]
async fn members_filter_by_repeated_roles() {
    let resp = app()
        .oneshot(get("/v1/organizations/acme/members?roles[]=admin&roles[]=member"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let members: Vec<Member> = body_json(resp).await;
    let names: Vec<&str> = members.iter().map(|m| m.username.as_str()).collect();
    assert_eq!(names, vec!["ada", "grace"]);
}

// --- favorites lifecycle ---

#[tokio::test]
async fn favorites_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/v1/organizations/acme/favorites"))
        .await
        .unwrap();
    let favorites: Vec<Favorite> = body_json(resp).await;
    assert_eq!(favorites.len(), 2);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(authed("DELETE", "/v1/organizations/acme/favorites/fav_1").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // delete again, 404
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(authed("DELETE", "/v1/organizations/acme/favorites/fav_1").body(String::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // list after delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get("/v1/organizations/acme/favorites"))
        .await
        .unwrap();
    let favorites: Vec<Favorite> = body_json(resp).await;
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].id, "fav_2");
}

// --- attachments ---

#[tokio::test]
async fn attachment_upload_requires_file_part() {
    let boundary = "XBOUNDARY";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file_type\"\r\n\r\ntext/plain\r\n--{boundary}--\r\n"
    );
    let resp = app()
        .oneshot(
            authed("POST", "/v1/organizations/acme/attachments")
                .header(
                    http::header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(body)
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let err: ErrorBody = body_json(resp).await;
    assert_eq!(err.message, "File is required");
}
