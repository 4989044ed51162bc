//! REST client for the remote notes API.
//!
//! # Responsibility
//! - Map backend operations onto `/notes` CRUD and status-patch endpoints.
//! - Surface non-success bodies verbatim as error text.
//!
//! # Invariants
//! - List responses are accepted both enveloped (`{"notes": [...]}`) and bare.
//! - No request is retried here; retry is the caller's decision.

use crate::model::note::{now_rfc3339, Note, NoteDraft, NoteId, NoteStatus};
use crate::repo::backend::{BackendError, BackendResult, NoteBackend};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Page size used when fetching the whole board.
pub const DEFAULT_PER_PAGE: u32 = 1000;
const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
struct CreateNoteBody<'a> {
    title: &'a str,
    content: &'a str,
    status: NoteStatus,
    created_at: String,
}

#[derive(Serialize)]
struct UpdateNoteBody<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct StatusBody {
    status: NoteStatus,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NoteListPayload {
    Enveloped { notes: Vec<Note> },
    Bare(Vec<Note>),
}

impl NoteListPayload {
    fn into_notes(self) -> Vec<Note> {
        match self {
            Self::Enveloped { notes } | Self::Bare(notes) => notes,
        }
    }
}

/// Notes API client.
#[derive(Debug, Clone)]
pub struct HttpNoteBackend {
    client: Client,
    notes_url: Url,
    per_page: u32,
}

impl HttpNoteBackend {
    /// Builds a client for `base_url` (the part before `/notes`).
    ///
    /// # Errors
    /// - `Transport` when the URL does not parse or the client cannot be built.
    pub fn new(base_url: &str) -> BackendResult<Self> {
        Self::with_options(base_url, DEFAULT_PER_PAGE, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_options(base_url: &str, per_page: u32, timeout: Duration) -> BackendResult<Self> {
        let notes_url = notes_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::Transport(format!("http client init failed: {err}")))?;
        Ok(Self {
            client,
            notes_url,
            per_page: per_page.max(1),
        })
    }

    /// Collection endpoint, e.g. `http://host/notes`.
    pub fn notes_url(&self) -> &Url {
        &self.notes_url
    }

    fn note_url(&self, id: &NoteId, suffix: Option<&str>) -> BackendResult<Url> {
        let mut url = self.notes_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| BackendError::Transport("notes url cannot be a base".to_string()))?;
            segments.push(id.as_str());
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        Ok(url)
    }

    async fn execute(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let request = builder
            .build()
            .map_err(|err| BackendError::Transport(format!("invalid request: {err}")))?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!("event=http_request module=repo status=start method={method} url={url}");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|err| BackendError::Transport(err.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                warn!(
                    "event=http_request module=repo status=body_unreadable method={method} url={url} http_status={} error={err}",
                    status.as_u16()
                );
                String::new()
            }
        };
        warn!(
            "event=http_request module=repo status=error method={method} url={url} http_status={}",
            status.as_u16()
        );
        Err(BackendError::Http {
            status: status.as_u16(),
            body,
        })
    }

    async fn execute_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<T> {
        let response = self.execute(builder).await?;
        decode_json(response).await
    }
}

#[async_trait]
impl NoteBackend for HttpNoteBackend {
    async fn list(&self) -> BackendResult<Vec<Note>> {
        let mut url = self.notes_url.clone();
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("per_page", &self.per_page.to_string());
        let payload: NoteListPayload = self.execute_json(self.client.get(url)).await?;
        Ok(payload.into_notes())
    }

    async fn create(&self, draft: &NoteDraft) -> BackendResult<Note> {
        let body = CreateNoteBody {
            title: &draft.title,
            content: &draft.content,
            status: NoteStatus::Todo,
            created_at: now_rfc3339(),
        };
        self.execute_json(self.client.post(self.notes_url.clone()).json(&body))
            .await
    }

    async fn update(&self, id: &NoteId, draft: &NoteDraft) -> BackendResult<Note> {
        let body = UpdateNoteBody {
            title: &draft.title,
            content: &draft.content,
        };
        let url = self.note_url(id, None)?;
        self.execute_json(self.client.patch(url).json(&body))
            .await
            .map_err(|err| not_found_as(err, id))
    }

    async fn update_status(&self, id: &NoteId, status: NoteStatus) -> BackendResult<Note> {
        let url = self.note_url(id, Some("status"))?;
        self.execute_json(self.client.patch(url).json(&StatusBody { status }))
            .await
            .map_err(|err| not_found_as(err, id))
    }

    async fn delete(&self, id: &NoteId) -> BackendResult<()> {
        let url = self.note_url(id, None)?;
        self.execute(self.client.delete(url))
            .await
            .map_err(|err| not_found_as(err, id))?;
        Ok(())
    }
}

async fn decode_json<T: DeserializeOwned>(response: Response) -> BackendResult<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|err| BackendError::Transport(format!("read body failed: {err}")))?;
    serde_json::from_slice(&bytes).map_err(|err| BackendError::Decode(err.to_string()))
}

fn not_found_as(err: BackendError, id: &NoteId) -> BackendError {
    match err {
        BackendError::Http { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            BackendError::NotFound(id.clone())
        }
        other => other,
    }
}

fn notes_url(base_url: &str) -> BackendResult<Url> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let with_notes = if trimmed.ends_with("/notes") {
        trimmed.to_string()
    } else {
        format!("{trimmed}/notes")
    };
    Url::parse(&with_notes)
        .map_err(|err| BackendError::Transport(format!("invalid api url `{base_url}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::{notes_url, HttpNoteBackend, NoteListPayload};
    use crate::model::note::NoteId;

    #[test]
    fn notes_url_appends_collection_once() {
        assert_eq!(
            notes_url("http://127.0.0.1:5000/").unwrap().as_str(),
            "http://127.0.0.1:5000/notes"
        );
        assert_eq!(
            notes_url("http://host/api/notes").unwrap().as_str(),
            "http://host/api/notes"
        );
        assert!(notes_url("not a url").is_err());
    }

    #[test]
    fn note_url_escapes_id_segment() {
        let backend = HttpNoteBackend::new("http://host").unwrap();
        let url = backend.note_url(&NoteId::new("a/b"), Some("status")).unwrap();
        assert_eq!(url.as_str(), "http://host/notes/a%2Fb/status");
    }

    #[test]
    fn list_payload_accepts_both_shapes() {
        let bare: NoteListPayload =
            serde_json::from_str(r#"[{"id": 1, "title": "a", "status": "doing"}]"#).unwrap();
        let enveloped: NoteListPayload = serde_json::from_str(
            r#"{"notes": [{"id": "x", "title": "b", "content": null}], "total": 1}"#,
        )
        .unwrap();
        let bare = bare.into_notes();
        let enveloped = enveloped.into_notes();
        assert_eq!(bare[0].id.as_str(), "1");
        assert_eq!(enveloped[0].content, "");
    }
}
