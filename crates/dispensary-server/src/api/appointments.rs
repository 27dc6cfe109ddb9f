use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use dispensary_core::{available_slots, ConsultationType};
use dispensary_db::NewAppointment;
use serde::{Deserialize, Serialize};

use crate::middleware::{AuthUser, RequestId};

use super::extract::{ApiJson, ApiQuery};
use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CreateAppointmentRequest {
    pub appointment_time: DateTime<Utc>,
    #[serde(default = "default_consultation_type")]
    pub consultation_type: ConsultationType,
    pub notes: Option<String>,
}

fn default_consultation_type() -> ConsultationType {
    ConsultationType::InitialConsultation
}

#[derive(Debug, Deserialize)]
pub(super) struct SlotsQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct AppointmentItem {
    id: i64,
    appointment_number: String,
    doctor_name: String,
    appointment_time: DateTime<Utc>,
    duration_minutes: i32,
    status: String,
    consultation_type: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<dispensary_db::AppointmentRow> for AppointmentItem {
    fn from(row: dispensary_db::AppointmentRow) -> Self {
        Self {
            id: row.id,
            appointment_number: row.appointment_number,
            doctor_name: row.doctor_name,
            appointment_time: row.appointment_time,
            duration_minutes: row.duration_minutes,
            status: row.status,
            consultation_type: row.consultation_type,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SlotsItem {
    date: NaiveDate,
    slots: Vec<DateTime<Utc>>,
}

/// GET /api/v1/appointments
pub(super) async fn list_appointments(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<AppointmentItem>>>, ApiError> {
    let rows = dispensary_db::list_user_appointments(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(AppointmentItem::from).collect(),
        req_id,
    )))
}

/// GET /api/v1/appointments/slots?date=YYYY-MM-DD
pub(super) async fn list_available_slots(
    Extension(req_id): Extension<RequestId>,
    ApiQuery(query): ApiQuery<SlotsQuery>,
) -> Result<Json<ApiResponse<SlotsItem>>, ApiError> {
    let raw = query
        .date
        .ok_or_else(|| ApiError::new(&req_id.0, "validation_error", "date is required"))?;
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ApiError::new(
            &req_id.0,
            "validation_error",
            format!("date must be YYYY-MM-DD, got '{raw}'"),
        )
    })?;

    Ok(Json(ApiResponse::new(
        SlotsItem {
            date,
            slots: available_slots(date),
        },
        req_id,
    )))
}

/// POST /api/v1/appointments — book a consultation in the future.
pub(super) async fn create_appointment(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AppointmentItem>>), ApiError> {
    if body.appointment_time <= Utc::now() {
        return Err(ApiError::new(
            &req_id.0,
            "validation_error",
            "appointment_time must be in the future",
        ));
    }

    let row = dispensary_db::create_appointment(
        &state.pool,
        NewAppointment {
            user_id: user.id,
            appointment_time: body.appointment_time,
            consultation_type: body.consultation_type,
            notes: body.notes.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(AppointmentItem::from(row), req_id)),
    ))
}
