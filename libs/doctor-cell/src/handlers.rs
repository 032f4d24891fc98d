use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateAvailabilityRequest, Doctor, GenerateSlotsRequest, SlotSearchQuery, UpdateDoctorRequest,
};
use crate::services::{AvailabilityService, DoctorService, SlotService};

/// Every protected doctor endpoint acts on the doctor row owned by the
/// authenticated user, never on a caller-supplied doctor id.
async fn resolve_doctor(
    state: &AppConfig,
    user: &User,
    token: &str,
) -> Result<Doctor, AppError> {
    let doctor_service = DoctorService::new(state);
    Ok(doctor_service.get_profile(&user.id, token).await?)
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let slot_service = SlotService::new(&state);

    let slots = slot_service.search_slots(query).await?;

    Ok(Json(json!({
        "slots": slots,
        "total": slots.len()
    })))
}

// ==============================================================================
// PROTECTED PROFILE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let doctor = resolve_doctor(&state, &user, token).await?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let doctor_service = DoctorService::new(&state);
    let updated = doctor_service
        .update_profile(&user.id, request, token)
        .await?;

    Ok(Json(json!(updated)))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let doctor = resolve_doctor(&state, &user, token).await?;

    let availability_service = AvailabilityService::new(&state);
    let availability = availability_service
        .create_availability(doctor.id, request, token)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(availability))))
}

#[axum::debug_handler]
pub async fn list_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = resolve_doctor(&state, &user, token).await?;

    let availability_service = AvailabilityService::new(&state);
    let windows = availability_service
        .list_availability(doctor.id, token)
        .await?;

    Ok(Json(json!({
        "availability": windows,
        "total": windows.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(state): State<Arc<AppConfig>>,
    Path(availability_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = resolve_doctor(&state, &user, token).await?;

    let availability_service = AvailabilityService::new(&state);
    availability_service
        .delete_availability(doctor.id, availability_id, token)
        .await?;

    Ok(Json(json!({ "success": true })))
}

// ==============================================================================
// SLOT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn generate_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<GenerateSlotsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();
    let doctor = resolve_doctor(&state, &user, token).await?;

    let slot_service = SlotService::new(&state);
    let summary = slot_service
        .generate_slots_for_date(doctor.id, request, token)
        .await?;

    Ok((StatusCode::CREATED, Json(json!(summary))))
}

#[axum::debug_handler]
pub async fn delete_slot(
    State(state): State<Arc<AppConfig>>,
    Path(slot_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor = resolve_doctor(&state, &user, token).await?;

    let slot_service = SlotService::new(&state);
    slot_service.delete_slot(doctor.id, slot_id, token).await?;

    Ok(Json(json!({ "success": true })))
}
