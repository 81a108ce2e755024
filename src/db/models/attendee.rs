//! Attendee model and registration payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Entity;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attendee {
    #[serde(default)]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub designation: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for Attendee {
    const COLLECTION: &'static str = "attendees";
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub designation: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AttendeeCount {
    pub count: u64,
}
