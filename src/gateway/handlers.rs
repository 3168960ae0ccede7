//! Garden API handlers.

use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};

use crate::garden::{GardenView, HabitSubmission, InitialHabits, InitiateReport, UpdateReport};
use crate::gateway::auth::AuthenticatedUser;
use crate::gateway::server::GatewayState;
use crate::gateway::types::{ApiError, HealthResponse};

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub async fn garden_handler(
    State(state): State<Arc<GatewayState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<GardenView>, ApiError> {
    Ok(Json(state.service.garden(&user_id).await?))
}

pub async fn initiate_handler(
    State(state): State<Arc<GatewayState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    payload: Result<Json<InitialHabits>, JsonRejection>,
) -> Result<Json<InitiateReport>, ApiError> {
    let Json(habits) = payload?;
    Ok(Json(state.service.initiate(&user_id, &habits).await?))
}

pub async fn update_handler(
    State(state): State<Arc<GatewayState>>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    payload: Result<Json<HabitSubmission>, JsonRejection>,
) -> Result<Json<UpdateReport>, ApiError> {
    let Json(submission) = payload?;
    Ok(Json(state.service.update(&user_id, &submission).await?))
}
