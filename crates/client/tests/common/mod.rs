//! In-process stand-in for the user directory API.
//!
//! Records every request it sees, rotates the anti-forgery token on every
//! response through `Set-Cookie: XSRF-TOKEN=<v>; Path=/` and rejects mutating
//! calls that do not echo the latest token.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header::{AUTHORIZATION, SET_COOKIE}},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{Duration as ChronoDuration, NaiveDate, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;

use userdesk_auth::MemoryCredentialStore;
use userdesk_client::{ClientConfig, UserDesk};
use userdesk_core::{Page, UserDraft, UserId, UserRecord};

pub const JWT_SECRET: &str = "test-secret";
pub const XSRF_KEY: &str = "XSRF-TOKEN;path=/";

pub const ADMIN: (&str, &str) = ("admin", "admin-pass");
pub const READER: (&str, &str) = ("reader", "reader-pass");

const ALL_AUTHORITIES: [&str; 4] = ["GET_USERS", "POST_USERS", "PUT_USERS", "DELETE_USERS"];
const PROFESSIONS: [&str; 3] = ["engineer", "teacher", "doctor"];

#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub bearer: Option<String>,
    pub xsrf: Option<String>,
    /// Token the response rotated to.
    pub rotated_to: Option<String>,
}

impl SeenRequest {
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}

#[derive(Debug, Default)]
pub struct ApiState {
    pub users: BTreeMap<i64, UserRecord>,
    pub next_id: i64,
    pub xsrf_issued: u64,
    pub current_xsrf: Option<String>,
    pub seen: Vec<SeenRequest>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<ApiState>>,
}

impl FakeApi {
    /// 30 users; professions cycle engineer/teacher/doctor, one day apart
    /// starting 2024-01-01.
    pub fn seeded() -> Self {
        let api = Self::default();
        {
            let mut state = api.state.lock();
            for i in 1..=30_i64 {
                state.users.insert(i, seed_user(i));
            }
            state.next_id = 31;
        }
        api
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.state.lock().seen.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().seen.len()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<SeenRequest> {
        self.seen()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn last(&self) -> SeenRequest {
        self.seen().last().cloned().expect("no request recorded")
    }

    pub fn current_xsrf(&self) -> Option<String> {
        self.state.lock().current_xsrf.clone()
    }

    pub fn user(&self, id: i64) -> Option<UserRecord> {
        self.state.lock().users.get(&id).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    fn rotate(&self) -> String {
        let mut state = self.state.lock();
        state.xsrf_issued += 1;
        let token = format!("xsrf-{}", state.xsrf_issued);
        state.current_xsrf = Some(token.clone());
        token
    }
}

fn seed_user(i: i64) -> UserRecord {
    UserRecord {
        id: UserId::new(i),
        firstname: format!("First{i}"),
        lastname: format!("Last{i}"),
        email: format!("user{i}@example.com"),
        profession: PROFESSIONS[(i as usize - 1) % PROFESSIONS.len()].to_string(),
        date_created: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + ChronoDuration::days(i - 1),
        country: "Norway".to_string(),
        city: "Oslo".to_string(),
    }
}

pub struct TestServer {
    pub base_url: String,
    pub api: FakeApi,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let api = FakeApi::seeded();
        let app = router(api.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, api, handle }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::default().with_api_url(&self.base_url).unwrap()
    }

    /// A fresh client over an in-memory credential store.
    pub fn client(&self) -> (UserDesk, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::new());
        let desk = UserDesk::connect(&self.config(), store.clone()).unwrap();
        (desk, store)
    }

    /// A client already signed in as `who`.
    pub async fn signed_in(&self, who: (&str, &str)) -> UserDesk {
        let (desk, _) = self.client();
        desk.auth.authenticate(who.0, who.1).await.unwrap();
        desk
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn mint_token(sub: &str, authorities: &[&str], expires_in: ChronoDuration) -> String {
    let now = Utc::now();
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "sub": sub,
            "authorities": authorities,
            "iat": now.timestamp(),
            "exp": (now + expires_in).timestamp(),
        }),
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

fn router(api: FakeApi) -> Router {
    Router::new()
        .route("/api/auth/authenticate", post(authenticate))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/upload", post(upload_users))
        .route("/api/users/:id", get(get_user).put(update_user).delete(delete_user))
        .layer(middleware::from_fn_with_state(api.clone(), anti_forgery))
        .with_state(api)
}

async fn anti_forgery(State(api): State<FakeApi>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let is_login = path == "/api/auth/authenticate";
    let method = req.method().clone();
    let xsrf = header(req.headers(), "x-xsrf-token");

    let (index, rejected) = {
        let mut state = api.state.lock();
        state.seen.push(SeenRequest {
            method: method.clone(),
            path,
            query: req.uri().query().map(str::to_string),
            bearer: header(req.headers(), AUTHORIZATION.as_str())
                .and_then(|h| h.strip_prefix("Bearer ").map(str::to_string)),
            xsrf: xsrf.clone(),
            rotated_to: None,
        });
        let mutating = !matches!(method, Method::GET | Method::HEAD | Method::OPTIONS);
        let rejected = mutating && !is_login && state.current_xsrf.is_some() && xsrf != state.current_xsrf;
        (state.seen.len() - 1, rejected)
    };

    let mut response = if rejected {
        error(StatusCode::FORBIDDEN, "Invalid CSRF token")
    } else {
        next.run(req).await
    };

    let token = api.rotate();
    api.state.lock().seen[index].rotated_to = Some(token.clone());
    response.headers_mut().append(
        SET_COOKIE,
        HeaderValue::from_str(&format!("XSRF-TOKEN={token}; Path=/")).unwrap(),
    );
    response
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message, "details": null }))).into_response()
}

fn require(headers: &HeaderMap, authority: &str) -> Result<(), Response> {
    let token = header(headers, AUTHORIZATION.as_str())
        .and_then(|h| h.strip_prefix("Bearer ").map(str::to_string))
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    #[derive(Deserialize)]
    struct Claims {
        authorities: Vec<String>,
    }
    let claims = jsonwebtoken::decode::<Claims>(
        &token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| error(StatusCode::UNAUTHORIZED, "Unauthorized"))?
    .claims;

    if claims.authorities.iter().any(|a| a == authority) {
        Ok(())
    } else {
        Err(error(StatusCode::FORBIDDEN, "Access Denied"))
    }
}

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn authenticate(Json(body): Json<LoginBody>) -> Response {
    let authorities: &[&str] = match (body.username.as_str(), body.password.as_str()) {
        (u, p) if (u, p) == ADMIN => &ALL_AUTHORITIES,
        (u, p) if (u, p) == READER => &["GET_USERS"],
        _ => return error(StatusCode::UNAUTHORIZED, "Bad credentials"),
    };
    let token = mint_token(&body.username, authorities, ChronoDuration::minutes(10));
    Json(json!({ "token": token })).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    offset: u64,
    limit: u64,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    profession: Option<String>,
    sort_by: Option<String>,
    sort_direction: Option<String>,
}

async fn list_users(State(api): State<FakeApi>, headers: HeaderMap, Query(params): Query<ListParams>) -> Response {
    if let Err(denied) = require(&headers, "GET_USERS") {
        return denied;
    }
    match params.profession.as_deref() {
        Some("slow") => tokio::time::sleep(Duration::from_millis(200)).await,
        Some("explode") => return error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
        _ => {}
    }
    if let (Some(start), Some(end)) = (params.start_date, params.end_date) {
        if end < start {
            return error(StatusCode::BAD_REQUEST, "Invalid date range");
        }
    }

    let mut matching: Vec<UserRecord> = {
        let state = api.state.lock();
        state
            .users
            .values()
            .filter(|u| params.profession.as_deref().is_none_or(|p| u.profession.eq_ignore_ascii_case(p)))
            .filter(|u| params.start_date.is_none_or(|d| u.date_created.date_naive() >= d))
            .filter(|u| params.end_date.is_none_or(|d| u.date_created.date_naive() <= d))
            .cloned()
            .collect()
    };

    if params.sort_by.as_deref() == Some("lastname") {
        matching.sort_by(|a, b| a.lastname.cmp(&b.lastname));
    }
    if params.sort_direction.as_deref() == Some("desc") {
        matching.reverse();
    }

    let total_elements = matching.len() as u64;
    let content = matching
        .into_iter()
        .skip(params.offset as usize)
        .take(params.limit as usize)
        .collect();
    Json(Page { content, total_elements }).into_response()
}

async fn get_user(State(api): State<FakeApi>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(denied) = require(&headers, "GET_USERS") {
        return denied;
    }
    match api.user(id) {
        Some(user) => Json(user).into_response(),
        None => error(StatusCode::NOT_FOUND, &format!("User not found with id: {id}")),
    }
}

fn record_from(id: i64, draft: UserDraft) -> UserRecord {
    UserRecord {
        id: UserId::new(id),
        firstname: draft.firstname,
        lastname: draft.lastname,
        email: draft.email,
        profession: draft.profession,
        date_created: draft
            .date_created
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
            .unwrap_or_else(Utc::now),
        country: draft.country,
        city: draft.city,
    }
}

async fn create_user(State(api): State<FakeApi>, headers: HeaderMap, Json(draft): Json<UserDraft>) -> Response {
    if let Err(denied) = require(&headers, "POST_USERS") {
        return denied;
    }
    let mut state = api.state.lock();
    let id = state.next_id;
    state.next_id += 1;
    let user = record_from(id, draft);
    state.users.insert(id, user.clone());
    (StatusCode::CREATED, Json(user)).into_response()
}

async fn update_user(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(draft): Json<UserDraft>,
) -> Response {
    if let Err(denied) = require(&headers, "PUT_USERS") {
        return denied;
    }
    let mut state = api.state.lock();
    if !state.users.contains_key(&id) {
        return error(StatusCode::NOT_FOUND, &format!("User not found with id: {id}"));
    }
    let user = record_from(id, draft);
    state.users.insert(id, user.clone());
    Json(user).into_response()
}

async fn delete_user(State(api): State<FakeApi>, headers: HeaderMap, Path(id): Path<i64>) -> Response {
    if let Err(denied) = require(&headers, "DELETE_USERS") {
        return denied;
    }
    match api.state.lock().users.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error(StatusCode::NOT_FOUND, &format!("User not found with id: {id}")),
    }
}

/// Rows: `firstname,lastname,email,profession,country,city` after a header line.
async fn upload_users(State(api): State<FakeApi>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    if let Err(denied) = require(&headers, "POST_USERS") {
        return denied;
    }

    let mut content = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            content = field.bytes().await.ok();
        }
    }
    let Some(content) = content.filter(|c| !c.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Please upload a CSV file.").into_response();
    };

    let text = String::from_utf8_lossy(&content).to_string();
    let mut state = api.state.lock();
    for line in text.lines().skip(1).filter(|l| !l.trim().is_empty()) {
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() != 6 {
            return (StatusCode::BAD_REQUEST, "Malformed CSV row").into_response();
        }
        let id = state.next_id;
        state.next_id += 1;
        let draft = UserDraft {
            firstname: cols[0].to_string(),
            lastname: cols[1].to_string(),
            email: cols[2].to_string(),
            profession: cols[3].to_string(),
            country: cols[4].to_string(),
            city: cols[5].to_string(),
            ..UserDraft::default()
        };
        state.users.insert(id, record_from(id, draft));
    }
    (StatusCode::OK, "Uploaded the file successfully").into_response()
}
