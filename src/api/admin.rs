//! Admin panel endpoints. All of these sit behind `require_admin`.

use axum::{extract::State, http::StatusCode, Json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use crate::db::{Attendee, Session, SessionRequest, Speaker, SpeakerRequest};
use crate::AppState;

/// Attendee count per designation
pub type DesignationStats = BTreeMap<String, u64>;

/// List all attendees
///
/// GET /api/admin/attendees
pub async fn list_attendees(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Attendee>>, ApiError> {
    let attendees = state
        .db
        .attendees()
        .list()
        .await
        .map_err(|e| ApiError::database("Failed to fetch attendees", &e))?;

    Ok(Json(attendees))
}

/// Designation histogram
///
/// GET /api/admin/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<DesignationStats>, ApiError> {
    let attendees = state
        .db
        .attendees()
        .list()
        .await
        .map_err(|e| ApiError::database("Failed to fetch stats", &e))?;

    let mut stats = DesignationStats::new();
    for attendee in attendees {
        *stats.entry(attendee.designation).or_default() += 1;
    }

    Ok(Json(stats))
}

/// Create a speaker, or replace it when the payload carries an id.
/// Responds 201 whenever the write created the document.
///
/// POST /api/admin/speakers
pub async fn upsert_speaker(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SpeakerRequest>,
) -> Result<(StatusCode, Json<Speaker>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.require("name", &req.name, "Name");
    errors.finish()?;

    let speakers = state.db.speakers();
    let (id, speaker) = req.into_speaker();

    match id {
        Some(id) => {
            let (speaker, created) = speakers
                .upsert(&id, &speaker)
                .await
                .map_err(|e| ApiError::database("Failed to update speaker", &e))?;
            info!(speaker_id = %speaker.id, created, "Speaker saved");
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((status, Json(speaker)))
        }
        None => {
            let speaker = speakers
                .add(&speaker)
                .await
                .map_err(|e| ApiError::database("Failed to create speaker", &e))?;
            info!(speaker_id = %speaker.id, "Speaker created");
            Ok((StatusCode::CREATED, Json(speaker)))
        }
    }
}

/// Create a session, or replace it when the payload carries an id.
/// Responds 201 whenever the write created the document.
///
/// POST /api/admin/sessions
pub async fn upsert_session(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SessionRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors.require("title", &req.title, "Title");
    errors.finish()?;

    let sessions = state.db.sessions();
    let (id, session) = req.into_session();

    match id {
        Some(id) => {
            let (session, created) = sessions
                .upsert(&id, &session)
                .await
                .map_err(|e| ApiError::database("Failed to update session", &e))?;
            info!(session_id = %session.id, created, "Session saved");
            let status = if created {
                StatusCode::CREATED
            } else {
                StatusCode::OK
            };
            Ok((status, Json(session)))
        }
        None => {
            let session = sessions
                .add(&session)
                .await
                .map_err(|e| ApiError::database("Failed to create session", &e))?;
            info!(session_id = %session.id, "Session created");
            Ok((StatusCode::CREATED, Json(session)))
        }
    }
}
