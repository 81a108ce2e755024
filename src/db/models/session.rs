use serde::{Deserialize, Serialize};

use super::{blank_as_none, Speaker};
use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Free-form schedule text, shown as entered
    #[serde(default)]
    pub time: String,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub speaker_id: Option<String>,
}

impl Entity for Session {
    const COLLECTION: &'static str = "sessions";
}

/// A session joined with its speaker at read time
#[derive(Debug, Clone, Serialize)]
pub struct SessionWithSpeaker {
    #[serde(flatten)]
    pub session: Session,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
}

/// Create-or-replace payload. Without an `id` a new session is created.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub time: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub speaker_id: Option<String>,
}

impl SessionRequest {
    pub fn into_session(self) -> (Option<String>, Session) {
        let session = Session {
            id: String::new(),
            title: self.title.trim().to_string(),
            description: self.description,
            time: self.time,
            speaker_id: self.speaker_id,
        };
        (self.id, session)
    }
}
