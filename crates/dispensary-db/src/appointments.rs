use chrono::{DateTime, Utc};
use dispensary_core::{
    appointments::{DEFAULT_DOCTOR_NAME, DEFAULT_DURATION_MINUTES},
    generate_appointment_number, ConsultationType,
};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `appointments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AppointmentRow {
    pub id: i64,
    pub user_id: i64,
    pub appointment_number: String,
    pub doctor_name: String,
    pub appointment_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: String,
    pub consultation_type: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment<'a> {
    pub user_id: i64,
    pub appointment_time: DateTime<Utc>,
    pub consultation_type: ConsultationType,
    pub notes: Option<&'a str>,
}

const APPOINTMENT_COLUMNS: &str = "id, user_id, appointment_number, doctor_name, \
     appointment_time, duration_minutes, status, consultation_type, notes, created_at, updated_at";

/// Inserts a `scheduled` appointment with the house doctor and default
/// duration. Callers reject past times before calling.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_appointment(
    pool: &PgPool,
    appointment: NewAppointment<'_>,
) -> Result<AppointmentRow, DbError> {
    let appointment_number = generate_appointment_number(Utc::now());

    let row = sqlx::query_as::<_, AppointmentRow>(&format!(
        "INSERT INTO appointments \
             (user_id, appointment_number, doctor_name, appointment_time, duration_minutes, \
              status, consultation_type, notes) \
         VALUES ($1, $2, $3, $4, $5, 'scheduled', $6, $7) \
         RETURNING {APPOINTMENT_COLUMNS}"
    ))
    .bind(appointment.user_id)
    .bind(&appointment_number)
    .bind(DEFAULT_DOCTOR_NAME)
    .bind(appointment.appointment_time)
    .bind(DEFAULT_DURATION_MINUTES)
    .bind(appointment.consultation_type.as_str())
    .bind(appointment.notes)
    .fetch_one(pool)
    .await?;

    tracing::info!(
        appointment_id = row.id,
        appointment_number = %row.appointment_number,
        "appointment scheduled"
    );

    Ok(row)
}

/// Lists a user's appointments ordered by appointment time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_user_appointments(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<AppointmentRow>, DbError> {
    let rows = sqlx::query_as::<_, AppointmentRow>(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments \
         WHERE user_id = $1 \
         ORDER BY appointment_time, id"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
