//! Directory service backed by the Notion REST API.
//!
//! ureq is a blocking client, so every request runs on tokio's blocking
//! pool. Listing walks `POST /v1/search` filtered to databases; detail comes
//! from `GET /v1/databases/{id}` or `GET /v1/pages/{id}`.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{
    DirectoryService, ObjectDetail, ObjectSummary, RemoteError, RemoteResult, SearchHit,
    SummaryPage,
};
use crate::identifier::normalize_id;
use crate::types::ObjectKind;

/// Environment variable holding the integration token.
pub const TOKEN_ENV: &str = "NOTION_TOKEN";

const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";
const PAGE_SIZE: u32 = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the Notion API.
#[derive(Clone)]
pub struct NotionDirectory {
    agent: ureq::Agent,
    token: String,
    base_url: String,
}

impl NotionDirectory {
    pub fn new(token: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(REQUEST_TIMEOUT))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Builds a client from the `NOTION_TOKEN` environment variable.
    pub fn from_env() -> RemoteResult<Self> {
        match std::env::var(TOKEN_ENV) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token.trim())),
            _ => Err(RemoteError::Unauthorized(format!("{TOKEN_ENV} is not set"))),
        }
    }

    /// Points the client at a different API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn request(&self, path: String, body: Option<Value>) -> RemoteResult<Value> {
        let agent = self.agent.clone();
        let auth = format!("Bearer {}", self.token);
        let url = format!("{}{}", self.base_url, path);
        tokio::task::spawn_blocking(move || execute(&agent, &auth, &url, body.as_ref()))
            .await
            .map_err(|e| RemoteError::Transient(format!("request task failed: {e}")))?
    }
}

#[async_trait]
impl DirectoryService for NotionDirectory {
    async fn list_summaries(&self, cursor: Option<&str>) -> RemoteResult<SummaryPage> {
        let mut body = json!({
            "filter": { "property": "object", "value": "database" },
            "page_size": PAGE_SIZE,
        });
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        let response = self.request("/search".to_string(), Some(body)).await?;

        let summaries = results(&response)?
            .iter()
            .filter_map(|obj| parse_object(obj).ok())
            .map(|d| ObjectSummary {
                id: d.id,
                kind: d.kind,
                title: d.title,
            })
            .collect();
        let next_cursor = if response["has_more"].as_bool().unwrap_or(false) {
            response["next_cursor"].as_str().map(str::to_string)
        } else {
            None
        };
        Ok(SummaryPage {
            summaries,
            next_cursor,
        })
    }

    async fn get_detail(&self, id: &str, kind: ObjectKind) -> RemoteResult<ObjectDetail> {
        let path = match kind {
            ObjectKind::Database => format!("/databases/{id}"),
            ObjectKind::Page => format!("/pages/{id}"),
        };
        let response = self.request(path, None).await?;
        parse_object(&response)
    }

    async fn search(&self, query: &str, kind: ObjectKind) -> RemoteResult<Vec<SearchHit>> {
        let body = json!({
            "query": query,
            "filter": { "property": "object", "value": kind.as_str() },
            "page_size": 10,
        });
        let response = self.request("/search".to_string(), Some(body)).await?;
        Ok(results(&response)?
            .iter()
            .filter_map(|obj| parse_object(obj).ok())
            .map(|d| SearchHit {
                id: d.id,
                kind: d.kind,
                title: d.title,
            })
            .collect())
    }
}

fn execute(agent: &ureq::Agent, auth: &str, url: &str, body: Option<&Value>) -> RemoteResult<Value> {
    let sent = match body {
        Some(body) => agent
            .post(url)
            .header("Authorization", auth)
            .header("Notion-Version", NOTION_VERSION)
            .send_json(body),
        None => agent
            .get(url)
            .header("Authorization", auth)
            .header("Notion-Version", NOTION_VERSION)
            .call(),
    };
    let mut response = sent.map_err(|e| RemoteError::Transient(e.to_string()))?;

    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return response
            .body_mut()
            .read_json::<Value>()
            .map_err(|e| RemoteError::Protocol(format!("invalid JSON body: {e}")));
    }

    let retry_after_ms = retry_after_ms(
        response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok()),
    );
    let detail = response.body_mut().read_to_string().unwrap_or_default();
    Err(status_error(status, retry_after_ms, &detail, url))
}

/// Converts a `Retry-After` header in seconds to milliseconds. HTTP-date
/// values are ignored.
fn retry_after_ms(header: Option<&str>) -> Option<u64> {
    header
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(|secs| secs.saturating_mul(1000))
}

/// Maps a non-success HTTP status to a [`RemoteError`].
pub(crate) fn status_error(
    status: u16,
    retry_after_ms: Option<u64>,
    detail: &str,
    url: &str,
) -> RemoteError {
    let message = serde_json::from_str::<Value>(detail)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status} from {url}"));
    match status {
        429 => RemoteError::RateLimited { retry_after_ms },
        401 => RemoteError::Unauthorized(message),
        403 => RemoteError::PermissionDenied(message),
        404 => RemoteError::NotFound(message),
        s if s >= 500 => RemoteError::Transient(message),
        _ => RemoteError::Protocol(message),
    }
}

fn results(response: &Value) -> RemoteResult<&Vec<Value>> {
    response["results"]
        .as_array()
        .ok_or_else(|| RemoteError::Protocol("response has no 'results' array".to_string()))
}

/// Parses a database or page object.
pub(crate) fn parse_object(obj: &Value) -> RemoteResult<ObjectDetail> {
    let kind = match obj["object"].as_str() {
        Some("database") => ObjectKind::Database,
        Some("page") => ObjectKind::Page,
        other => {
            return Err(RemoteError::Protocol(format!(
                "unexpected object type {other:?}"
            )))
        }
    };
    let id = obj["id"]
        .as_str()
        .map(normalize_id)
        .ok_or_else(|| RemoteError::Protocol("object has no id".to_string()))?;

    let mut properties = BTreeMap::new();
    if let Some(props) = obj["properties"].as_object() {
        for (name, prop) in props {
            let prop_type = prop["type"].as_str().unwrap_or("unknown");
            properties.insert(name.clone(), prop_type.to_string());
        }
    }

    let title = match kind {
        ObjectKind::Database => plain_text(&obj["title"]),
        ObjectKind::Page => obj["properties"]
            .as_object()
            .and_then(|props| props.values().find(|p| p["type"] == "title"))
            .map(|p| plain_text(&p["title"]))
            .unwrap_or_default(),
    };

    Ok(ObjectDetail {
        id,
        kind,
        title,
        url: obj["url"].as_str().map(str::to_string),
        last_edited_time: obj["last_edited_time"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
        archived: obj["archived"].as_bool().unwrap_or(false)
            || obj["in_trash"].as_bool().unwrap_or(false),
        properties,
    })
}

fn plain_text(rich_text: &Value) -> String {
    rich_text
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}
