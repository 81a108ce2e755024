//! Public attendee registration endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ApiJson;
use crate::db::{Attendee, AttendeeCount, RegisterRequest, RegisterResponse};
use crate::AppState;

fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .require("fullName", &req.full_name, "Full name")
        .require("email", &req.email, "Email")
        .require("designation", &req.designation, "Designation");
    errors.finish()
}

/// Register an attendee
///
/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    validate_register_request(&req)?;

    let attendees = state.db.attendees();
    let email = req.email.trim();

    // Fast path for the common duplicate; the store's unique constraint on
    // email still decides concurrent registrations.
    let existing = attendees
        .find_by("email", email)
        .await
        .map_err(|e| ApiError::database("Failed to check registration", &e))?;
    if existing.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let attendee = Attendee {
        id: String::new(),
        full_name: req.full_name.trim().to_string(),
        email: email.to_string(),
        designation: req.designation.trim().to_string(),
        created_at: Utc::now(),
    };

    let created = match attendees.add(&attendee).await {
        Ok(created) => created,
        Err(e) if e.is_conflict() => return Err(ApiError::conflict("Email already registered")),
        Err(e) => return Err(ApiError::database("Failed to register attendee", &e)),
    };

    info!(
        attendee_id = %created.id,
        designation = %created.designation,
        "Attendee registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful".to_string(),
            id: created.id,
        }),
    ))
}

/// Number of registered attendees
///
/// GET /api/attendees/count
pub async fn attendee_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AttendeeCount>, ApiError> {
    let count = state
        .db
        .attendees()
        .count()
        .await
        .map_err(|e| ApiError::database("Failed to count attendees", &e))?;

    Ok(Json(AttendeeCount { count }))
}
