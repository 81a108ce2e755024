//! Public speaker and session listings.

use axum::{extract::State, Json};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::db::{Collection, Session, SessionWithSpeaker, Speaker};
use crate::AppState;

/// Join a session with its speaker. A missing reference, an unknown speaker
/// or a failed lookup all leave the speaker empty.
async fn with_speaker(speakers: &Collection<Speaker>, session: Session) -> SessionWithSpeaker {
    let speaker = match session.speaker_id.as_deref() {
        None => None,
        Some(speaker_id) => match speakers.get(speaker_id).await {
            Ok(Some(speaker)) => Some(speaker),
            Ok(None) => {
                debug!(session_id = %session.id, speaker_id = %speaker_id, "Session references unknown speaker");
                None
            }
            Err(e) => {
                warn!(
                    session_id = %session.id,
                    speaker_id = %speaker_id,
                    error = %e,
                    "Speaker lookup failed"
                );
                None
            }
        },
    };

    SessionWithSpeaker { session, speaker }
}

/// List sessions with their speakers
///
/// GET /api/sessions
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SessionWithSpeaker>>, ApiError> {
    let sessions = state
        .db
        .sessions()
        .list()
        .await
        .map_err(|e| ApiError::database("Failed to fetch sessions", &e))?;

    let speakers = state.db.speakers();
    let joined = join_all(
        sessions
            .into_iter()
            .map(|session| with_speaker(&speakers, session)),
    )
    .await;

    Ok(Json(joined))
}

/// List speakers
///
/// GET /api/speakers
pub async fn list_speakers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Speaker>>, ApiError> {
    let speakers = state
        .db
        .speakers()
        .list()
        .await
        .map_err(|e| ApiError::database("Failed to fetch speakers", &e))?;

    Ok(Json(speakers))
}
