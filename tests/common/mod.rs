//! In-process fake of the survey API for integration tests.
//!
//! State lives behind one mutex. Every request is recorded with its method,
//! path, bearer header, and JSON body so tests can assert on the wire
//! traffic. Household and member routes require a bearer token.

#![allow(dead_code)]

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "secret";
pub const TOKEN: &str = "tok-admin";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub auth: Option<String>,
    pub body: Value,
}

#[derive(Debug)]
pub struct FakeState {
    pub schema: Value,
    pub refs: HashMap<String, Vec<Value>>,
    pub users: Vec<Value>,
    pub next_id: u64,
    pub requests: Vec<Recorded>,
    pub fail_users: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            schema: json!({
                "generalInfo": ["Head of Family", "Ward/Muhalla Name", "Gotra", "Monthly Income", "Number of Family Members"],
                "familyMembers": ["Name", "Age", "Gender", "Marital Status"],
                "additionalInfo": "Any other details"
            }),
            refs: HashMap::new(),
            users: Vec::new(),
            next_id: 100,
            requests: Vec::new(),
            fail_users: false,
        }
    }
}

type Shared = Arc<Mutex<FakeState>>;

pub struct FakeApi {
    pub base_url: String,
    pub state: Shared,
}

impl FakeApi {
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Recorded requests whose `METHOD path` starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| format!("{} {}", r.method, r.path).starts_with(prefix))
            .collect()
    }

    pub fn seed_user(&self, mut user: Value) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("u{}", state.next_id);
        user["_id"] = json!(id);
        state.users.push(user);
        id
    }

    pub fn seed_ref(&self, segment: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("r{}", state.next_id);
        state
            .refs
            .entry(segment.to_string())
            .or_default()
            .push(json!({ "_id": id, "name": name, "__v": 0 }));
        id
    }

    pub fn user(&self, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u["_id"] == json!(id))
            .cloned()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn schema(&self) -> Value {
        self.state.lock().unwrap().schema.clone()
    }

    pub fn set_fail_users(&self, fail: bool) {
        self.state.lock().unwrap().fail_users = fail;
    }
}

/// Binds to an ephemeral port and serves on the current runtime.
pub async fn spawn() -> FakeApi {
    let state: Shared = Arc::new(Mutex::new(FakeState::default()));
    let app = Router::new()
        .route("/api/admin/login", post(login))
        .route("/api/fields", get(get_fields))
        .route("/api/fields/add", post(add_field))
        .route("/api/fields/remove", post(remove_field))
        .route("/api/users", get(list_users).delete(delete_users))
        .route("/api/users/add", post(add_user))
        .route("/api/users/update/{id}", put(update_user))
        .route("/api/users/{ids}", get(get_users))
        .route("/api/{segment}/all", get(list_refs))
        .route("/api/{segment}/add", post(add_ref))
        .route("/api/{segment}/delete/{id}", delete(delete_ref))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeApi {
        base_url: format!("http://{}", addr),
        state,
    }
}

fn record(state: &Shared, method: Method, path: String, headers: &HeaderMap, body: Value) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.lock().unwrap().requests.push(Recorded {
        method: method.to_string(),
        path,
        auth,
        body,
    });
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TOKEN))
}

fn guard(state: &Shared, headers: &HeaderMap) -> Option<Response> {
    if !authorized(headers) {
        return Some(message(StatusCode::UNAUTHORIZED, "Unauthorized"));
    }
    if state.lock().unwrap().fail_users {
        return Some(message(StatusCode::INTERNAL_SERVER_ERROR, "database offline"));
    }
    None
}

async fn login(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&state, Method::POST, "/api/admin/login".into(), &headers, body.clone());
    if body["username"] == json!(USERNAME) && body["password"] == json!(PASSWORD) {
        Json(json!({ "token": TOKEN })).into_response()
    } else {
        message(StatusCode::UNAUTHORIZED, "Invalid username or password")
    }
}

async fn get_fields(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, Method::GET, "/api/fields".into(), &headers, Value::Null);
    let schema = state.lock().unwrap().schema.clone();
    Json(schema).into_response()
}

fn category_key(category: &Value) -> Option<&'static str> {
    match category.as_str() {
        Some("generalInfo") => Some("generalInfo"),
        Some("familyMembers") => Some("familyMembers"),
        _ => None,
    }
}

async fn add_field(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&state, Method::POST, "/api/fields/add".into(), &headers, body.clone());
    let Some(key) = category_key(&body["category"]) else {
        return message(StatusCode::BAD_REQUEST, "Invalid category");
    };
    let mut s = state.lock().unwrap();
    if let (Some(list), Some(new)) = (s.schema[key].as_array_mut(), body["newFields"].as_array()) {
        for field in new {
            if !list.contains(field) {
                list.push(field.clone());
            }
        }
    }
    message(StatusCode::OK, "Fields added successfully")
}

async fn remove_field(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&state, Method::POST, "/api/fields/remove".into(), &headers, body.clone());
    let Some(key) = category_key(&body["category"]) else {
        return message(StatusCode::BAD_REQUEST, "Invalid category");
    };
    let mut s = state.lock().unwrap();
    let remove = body["removeFields"].as_array().cloned().unwrap_or_default();
    if let Some(list) = s.schema[key].as_array_mut() {
        list.retain(|f| !remove.contains(f));
    }
    message(StatusCode::OK, "Fields removed successfully")
}

async fn list_refs(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(segment): Path<String>,
) -> Response {
    record(&state, Method::GET, format!("/api/{}/all", segment), &headers, Value::Null);
    let list = state
        .lock()
        .unwrap()
        .refs
        .get(&segment)
        .cloned()
        .unwrap_or_default();
    Json(list).into_response()
}

async fn add_ref(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(segment): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, Method::POST, format!("/api/{}/add", segment), &headers, body.clone());
    let mut s = state.lock().unwrap();
    s.next_id += 1;
    let id = format!("r{}", s.next_id);
    s.refs
        .entry(segment)
        .or_default()
        .push(json!({ "_id": id, "name": body["name"], "__v": 0 }));
    (StatusCode::CREATED, Json(json!({ "_id": id }))).into_response()
}

async fn delete_ref(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((segment, id)): Path<(String, String)>,
) -> Response {
    record(
        &state,
        Method::DELETE,
        format!("/api/{}/delete/{}", segment, id),
        &headers,
        Value::Null,
    );
    let mut s = state.lock().unwrap();
    let list = s.refs.entry(segment).or_default();
    let before = list.len();
    list.retain(|e| e["_id"] != json!(id));
    if list.len() == before {
        return message(StatusCode::NOT_FOUND, "Not found");
    }
    message(StatusCode::OK, "Deleted")
}

async fn list_users(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, Method::GET, "/api/users".into(), &headers, Value::Null);
    if let Some(denied) = guard(&state, &headers) {
        return denied;
    }
    let users = state.lock().unwrap().users.clone();
    Json(users).into_response()
}

async fn get_users(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(ids): Path<String>,
) -> Response {
    record(&state, Method::GET, format!("/api/users/{}", ids), &headers, Value::Null);
    if let Some(denied) = guard(&state, &headers) {
        return denied;
    }
    let s = state.lock().unwrap();
    let find = |id: &str| s.users.iter().find(|u| u["_id"] == json!(id)).cloned();

    if ids.contains(',') {
        let found: Vec<Value> = ids.split(',').filter_map(find).collect();
        if found.is_empty() {
            return message(StatusCode::NOT_FOUND, "Users not found");
        }
        Json(found).into_response()
    } else {
        match find(&ids) {
            Some(user) => Json(user).into_response(),
            None => message(StatusCode::NOT_FOUND, "User not found"),
        }
    }
}

async fn add_user(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&state, Method::POST, "/api/users/add".into(), &headers, body.clone());
    if let Some(denied) = guard(&state, &headers) {
        return denied;
    }
    let mut s = state.lock().unwrap();
    s.next_id += 1;
    let id = format!("u{}", s.next_id);
    let mut user = body;
    user["_id"] = json!(id);
    user["createdAt"] = json!("2024-05-01T10:00:00.000Z");
    user["updatedAt"] = json!("2024-05-01T10:00:00.000Z");
    user["__v"] = json!(0);
    if let Some(obj) = user.as_object_mut() {
        obj.remove("familyCount");
    }
    s.users.push(user);
    (
        StatusCode::CREATED,
        Json(json!({ "message": "User added successfully", "userId": id })),
    )
        .into_response()
}

async fn update_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    record(&state, Method::PUT, format!("/api/users/update/{}", id), &headers, body.clone());
    if let Some(denied) = guard(&state, &headers) {
        return denied;
    }
    let mut s = state.lock().unwrap();
    let Some(slot) = s.users.iter_mut().find(|u| u["_id"] == json!(id)) else {
        return message(StatusCode::NOT_FOUND, "User not found");
    };
    let created = slot["createdAt"].clone();
    *slot = body;
    slot["_id"] = json!(id);
    slot["createdAt"] = created;
    slot["updatedAt"] = json!("2024-06-01T10:00:00.000Z");
    message(StatusCode::OK, "User updated successfully")
}

async fn delete_users(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    record(&state, Method::DELETE, "/api/users".into(), &headers, body.clone());
    if let Some(denied) = guard(&state, &headers) {
        return denied;
    }
    let ids = body["ids"].as_array().cloned().unwrap_or_default();
    state
        .lock()
        .unwrap()
        .users
        .retain(|u| !ids.contains(&u["_id"]));
    message(StatusCode::OK, "Users deleted successfully")
}
