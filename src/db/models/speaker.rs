use serde::{Deserialize, Serialize};

use super::blank_as_none;
use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Speaker {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
}

impl Entity for Speaker {
    const COLLECTION: &'static str = "speakers";
}

/// Create-or-replace payload. Without an `id` a new speaker is created.
#[derive(Debug, Deserialize)]
pub struct SpeakerRequest {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(rename = "photoURL", default)]
    pub photo_url: String,
}

impl SpeakerRequest {
    pub fn into_speaker(self) -> (Option<String>, Speaker) {
        let speaker = Speaker {
            id: String::new(),
            name: self.name.trim().to_string(),
            bio: self.bio,
            photo_url: self.photo_url,
        };
        (self.id, speaker)
    }
}
