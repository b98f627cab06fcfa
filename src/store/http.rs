//! HTTP client for the survey API.
//!
//! Paths and bodies follow the server's contract:
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/api/admin/login` | credentials → `{ token }` |
//! | `GET` | `/api/fields` | schema |
//! | `POST` | `/api/fields/add`, `/api/fields/remove` | schema mutation |
//! | `GET` | `/api/{category}/all` | reference list |
//! | `POST` | `/api/{category}/add` | add reference entity |
//! | `DELETE` | `/api/{category}/delete/{id}` | delete reference entity |
//! | `GET` | `/api/users` | all households |
//! | `GET` | `/api/users/{id[,id...]}` | one household or a batch |
//! | `POST` | `/api/users/add` | create → `{ userId }` |
//! | `PUT` | `/api/users/update/{id}` | replace |
//! | `DELETE` | `/api/users` with `{ ids }` | bulk delete |

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{
    Credentials, HouseholdRecord, NewHousehold, ReferenceCategory, ReferenceEntity, Schema,
    Section,
};

use super::SurveyStore;

/// [`SurveyStore`] backed by the remote API.
pub struct HttpStore {
    base_url: String,
    client: Client,
}

impl HttpStore {
    /// Builds a client for `config.api`. When `token` is given it is sent as
    /// a bearer token on every request.
    pub fn new(config: &Config, token: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::validation("session token contains invalid characters"))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url().to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await?;
        handle_response(response).await
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        handle_response(response).await
    }

    /// Sends `request` and discards the response body on success.
    async fn send_unit(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = request.send().await?;
        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = server_message(&body).unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.to_string()
        } else {
            body.clone()
        }
    });

    if status == StatusCode::NOT_FOUND {
        return Err(ApiError::NotFound(message));
    }
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Extracts `message` from a JSON error body.
fn server_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Decodes list entries one at a time. An entry that does not decode is
/// logged and skipped so the rest of the list still shows.
fn decode_entries<T: DeserializeOwned>(entries: Vec<Value>, kind: &str) -> Vec<T> {
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(index, error = %e, "skipping malformed {}", kind);
                None
            }
        })
        .collect()
}

/// A single-id fetch may answer with a bare object; batches answer with a list.
fn records_from_value(value: Value) -> Result<Vec<HouseholdRecord>> {
    match value {
        Value::Array(entries) => Ok(decode_entries(entries, "household")),
        Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
        Value::Null => Ok(Vec::new()),
        other => Err(ApiError::InvalidResponse(format!(
            "expected household record(s), got {}",
            other
        ))),
    }
}

#[async_trait]
impl SurveyStore for HttpStore {
    async fn login(&self, credentials: &Credentials) -> Result<String> {
        let url = self.url("admin/login");
        debug!(%url, username = %credentials.username, "POST");
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(ApiError::Server {
                status: status.as_u16(),
                message: server_message(&body).unwrap_or_else(|| "Login failed".to_string()),
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        match value.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(ApiError::Server {
                status: status.as_u16(),
                message: "Invalid credentials".to_string(),
            }),
        }
    }

    async fn fetch_schema(&self) -> Result<Schema> {
        self.get_json("fields").await
    }

    async fn add_field(&self, section: Section, name: &str) -> Result<()> {
        let url = self.url("fields/add");
        debug!(%url, "POST");
        let body = json!({ "category": section.category(), "newFields": [name] });
        self.send_unit(self.client.post(&url).json(&body)).await
    }

    async fn remove_field(&self, section: Section, name: &str) -> Result<()> {
        let url = self.url("fields/remove");
        debug!(%url, "POST");
        let body = json!({ "category": section.category(), "removeFields": [name] });
        self.send_unit(self.client.post(&url).json(&body)).await
    }

    async fn list_references(&self, category: ReferenceCategory) -> Result<Vec<ReferenceEntity>> {
        let entries: Vec<Value> = self.get_json(&format!("{}/all", category.segment())).await?;
        Ok(decode_entries(entries, category.segment()))
    }

    async fn add_reference(&self, category: ReferenceCategory, name: &str) -> Result<()> {
        let url = self.url(&format!("{}/add", category.segment()));
        debug!(%url, "POST");
        self.send_unit(self.client.post(&url).json(&json!({ "name": name })))
            .await
    }

    async fn delete_reference(&self, category: ReferenceCategory, id: &str) -> Result<()> {
        let url = self.url(&format!("{}/delete/{}", category.segment(), id));
        debug!(%url, "DELETE");
        self.send_unit(self.client.delete(&url)).await
    }

    async fn list_records(&self) -> Result<Vec<HouseholdRecord>> {
        let entries: Vec<Value> = self.get_json("users").await?;
        Ok(decode_entries(entries, "household"))
    }

    async fn fetch_records(&self, ids: &[String]) -> Result<Vec<HouseholdRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let value: Value = self.get_json(&format!("users/{}", ids.join(","))).await?;
        records_from_value(value)
    }

    async fn create_record(&self, record: &NewHousehold) -> Result<String> {
        let body = serde_json::to_value(record)?;
        let value: Value = self.post_json("users/add", &body).await?;
        match value.get("userId") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(ApiError::InvalidResponse(
                "create response did not include userId".to_string(),
            )),
        }
    }

    async fn update_record(&self, id: &str, record: &HouseholdRecord) -> Result<()> {
        let url = self.url(&format!("users/update/{}", id));
        debug!(%url, "PUT");
        self.send_unit(self.client.put(&url).json(record)).await
    }

    async fn delete_records(&self, ids: &[String]) -> Result<()> {
        let url = self.url("users");
        debug!(%url, count = ids.len(), "DELETE");
        self.send_unit(self.client.delete(&url).json(&json!({ "ids": ids })))
            .await
    }
}
