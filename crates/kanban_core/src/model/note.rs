//! Note domain model.
//!
//! # Responsibility
//! - Define the single board entity and its column status.
//! - Own title/content normalization and validation rules.
//!
//! # Invariants
//! - `id` is opaque; integer and string wire forms decode to the same type.
//! - `status` is always one of the three board columns.
//! - A persisted note always has a non-empty trimmed title.

use chrono::{SecondsFormat, Utc};
use log::warn;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Maximum accepted title length in characters.
pub const TITLE_MAX_CHARS: usize = 200;

/// Opaque note identifier.
///
/// Remote backends may assign integers, the local store assigns UUID strings.
/// Both are kept as their canonical string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(String);

impl NoteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Generates a fresh client-side id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<i64> for NoteId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for NoteId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for NoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NoteIdVisitor;

        impl Visitor<'_> for NoteIdVisitor {
            type Value = NoteId;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a note id as string or integer")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<NoteId, E> {
                if value.trim().is_empty() {
                    return Err(E::custom("note id cannot be empty"));
                }
                Ok(NoteId::new(value))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<NoteId, E> {
                Ok(NoteId::from(value))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<NoteId, E> {
                Ok(NoteId::new(value.to_string()))
            }
        }

        deserializer.deserialize_any(NoteIdVisitor)
    }
}

/// Board column a note is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NoteStatus {
    /// Not started.
    #[default]
    Todo,
    /// In progress.
    Doing,
    /// Done.
    Complete,
}

impl NoteStatus {
    /// All columns in display order.
    pub const ALL: [NoteStatus; 3] = [NoteStatus::Todo, NoteStatus::Doing, NoteStatus::Complete];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Complete => "complete",
        }
    }

    /// Human-facing column header.
    pub fn label(self) -> &'static str {
        match self {
            Self::Todo => "Todo",
            Self::Doing => "Doing",
            Self::Complete => "Complete",
        }
    }

    /// Strict parse used for user input.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "todo" => Some(Self::Todo),
            "doing" => Some(Self::Doing),
            "complete" => Some(Self::Complete),
            _ => None,
        }
    }

    /// Lenient parse used for stored/wire data: unknown values fall back to `Todo`.
    pub fn from_wire(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| {
            warn!(
                "event=status_fallback module=model status=warn value_len={}",
                value.chars().count()
            );
            Self::Todo
        })
    }

    /// Index into per-column arrays, matching `ALL` order.
    pub fn index(self) -> usize {
        match self {
            Self::Todo => 0,
            Self::Doing => 1,
            Self::Complete => 2,
        }
    }
}

impl Display for NoteStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for NoteStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NoteStatus {
    /// Accepts any wire value: recognized strings map to their column,
    /// null or missing to `Todo`, everything else falls back to `Todo`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NoteStatusVisitor;

        impl<'de> Visitor<'de> for NoteStatusVisitor {
            type Value = NoteStatus;

            fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str("a note status")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<NoteStatus, E> {
                Ok(NoteStatus::from_wire(value))
            }

            fn visit_unit<E: de::Error>(self) -> Result<NoteStatus, E> {
                Ok(NoteStatus::Todo)
            }

            fn visit_none<E: de::Error>(self) -> Result<NoteStatus, E> {
                Ok(NoteStatus::Todo)
            }

            fn visit_some<D: Deserializer<'de>>(self, inner: D) -> Result<NoteStatus, D::Error> {
                inner.deserialize_any(self)
            }

            fn visit_bool<E: de::Error>(self, value: bool) -> Result<NoteStatus, E> {
                Ok(NoteStatus::from_wire(&value.to_string()))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<NoteStatus, E> {
                Ok(NoteStatus::from_wire(&value.to_string()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<NoteStatus, E> {
                Ok(NoteStatus::from_wire(&value.to_string()))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<NoteStatus, E> {
                Ok(NoteStatus::from_wire(&value.to_string()))
            }

            fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<NoteStatus, A::Error> {
                while seq.next_element::<de::IgnoredAny>()?.is_some() {}
                Ok(NoteStatus::from_wire("[sequence]"))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<NoteStatus, A::Error> {
                while map
                    .next_entry::<de::IgnoredAny, de::IgnoredAny>()?
                    .is_some()
                {}
                Ok(NoteStatus::from_wire("[map]"))
            }
        }

        deserializer.deserialize_any(NoteStatusVisitor)
    }
}

/// Validation errors for note input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// Title is empty after trimming.
    EmptyTitle,
    /// Title exceeds `TITLE_MAX_CHARS`.
    TitleTooLong { chars: usize, max: usize },
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title is required"),
            Self::TitleTooLong { chars, max } => {
                write!(f, "title has {chars} characters; maximum is {max}")
            }
        }
    }
}

impl Error for NoteValidationError {}

/// Trimmed, validated title/content pair ready for persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    /// Normalizes raw user input and checks the title rules.
    ///
    /// # Errors
    /// - `EmptyTitle` when `title` is blank after trimming.
    /// - `TitleTooLong` when the trimmed title exceeds `TITLE_MAX_CHARS`.
    pub fn parse(title: &str, content: &str) -> Result<Self, NoteValidationError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(NoteValidationError::EmptyTitle);
        }
        let chars = title.chars().count();
        if chars > TITLE_MAX_CHARS {
            return Err(NoteValidationError::TitleTooLong {
                chars,
                max: TITLE_MAX_CHARS,
            });
        }
        Ok(Self {
            title: title.to_string(),
            content: content.trim().to_string(),
        })
    }
}

/// Canonical board entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    /// Null on the wire is read as empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub status: NoteStatus,
    /// Informational only; never used for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Note {
    /// Builds a new `todo` note from a validated draft.
    pub fn from_draft(id: NoteId, draft: NoteDraft) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            status: NoteStatus::Todo,
            created_at: Some(now_rfc3339()),
        }
    }
}

/// Current UTC time in RFC 3339 form with millisecond precision.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
