use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use common_auth::{Operation, OptionalIdentity};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::app::{authorize, AppState};
use crate::doctor_handlers::{fetch_doctor, Doctor};
use crate::pagination::{Page, PageParams};
use crate::patient_handlers::{fetch_patient, Patient};
use crate::scheduling::{booked_slots_around, find_conflict, AppointmentStatus};

#[derive(Debug, Deserialize)]
pub struct AppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub patient: Patient,
    pub doctor: Doctor,
    pub appointment_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(FromRow)]
struct AppointmentRow {
    id: Uuid,
    appointment_time: DateTime<Utc>,
    status: String,
    notes: Option<String>,
    patient_id: Uuid,
    patient_first_name: String,
    patient_last_name: String,
    patient_email: String,
    patient_phone: String,
    patient_date_of_birth: NaiveDate,
    patient_gender: Option<String>,
    patient_address: Option<String>,
    patient_medical_history: Option<String>,
    patient_allergies: Option<String>,
    doctor_id: Uuid,
    doctor_first_name: String,
    doctor_last_name: String,
    doctor_email: String,
    doctor_phone: String,
    doctor_specialization: String,
    doctor_qualifications: Option<String>,
    doctor_availability: Option<String>,
}

const APPOINTMENT_SELECT: &str = "SELECT a.id, a.appointment_time, a.status, a.notes,
        p.id AS patient_id, p.first_name AS patient_first_name, p.last_name AS patient_last_name,
        p.email AS patient_email, p.phone AS patient_phone, p.date_of_birth AS patient_date_of_birth,
        p.gender AS patient_gender, p.address AS patient_address,
        p.medical_history AS patient_medical_history, p.allergies AS patient_allergies,
        d.id AS doctor_id, d.first_name AS doctor_first_name, d.last_name AS doctor_last_name,
        d.email AS doctor_email, d.phone AS doctor_phone, d.specialization AS doctor_specialization,
        d.qualifications AS doctor_qualifications, d.availability AS doctor_availability
    FROM appointments a
    JOIN patients p ON p.id = a.patient_id
    JOIN doctors d ON d.id = a.doctor_id";

impl TryFrom<AppointmentRow> for AppointmentResponse {
    type Error = ApiError;

    fn try_from(row: AppointmentRow) -> ApiResult<Self> {
        let status: AppointmentStatus = row.status.parse().map_err(ApiError::internal)?;
        Ok(Self {
            id: row.id,
            patient: Patient {
                id: row.patient_id,
                first_name: row.patient_first_name,
                last_name: row.patient_last_name,
                email: row.patient_email,
                phone: row.patient_phone,
                date_of_birth: row.patient_date_of_birth,
                gender: row.patient_gender,
                address: row.patient_address,
                medical_history: row.patient_medical_history,
                allergies: row.patient_allergies,
            },
            doctor: Doctor {
                id: row.doctor_id,
                first_name: row.doctor_first_name,
                last_name: row.doctor_last_name,
                email: row.doctor_email,
                phone: row.doctor_phone,
                specialization: row.doctor_specialization,
                qualifications: row.doctor_qualifications,
                availability: row.doctor_availability,
            },
            appointment_time: row.appointment_time,
            status,
            notes: row.notes,
        })
    }
}

pub async fn create_appointment(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Json(request): Json<AppointmentRequest>,
) -> ApiResult<(StatusCode, Json<AppointmentResponse>)> {
    authorize(&state, &identity, Operation::CreateAppointment).await?;

    let patient = fetch_patient(&state, request.patient_id).await?;
    let doctor = fetch_doctor(&state, request.doctor_id).await?;

    // Serialize check-then-insert per doctor so concurrent requests cannot
    // both pass the conflict check.
    let _slot_guard = state.doctor_locks.acquire(request.doctor_id).await;

    let slots = booked_slots_around(&state.db, request.doctor_id, request.appointment_time)
        .await
        .map_err(ApiError::internal)?;
    if find_conflict(&slots, request.appointment_time, None).is_some() {
        state.metrics.booking_conflict("create");
        return Err(slot_unavailable());
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO appointments (id, patient_id, doctor_id, appointment_time, status, notes)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(request.patient_id)
    .bind(request.doctor_id)
    .bind(request.appointment_time)
    .bind(request.status.as_str())
    .bind(&request.notes)
    .execute(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let response = AppointmentResponse {
        id,
        patient,
        doctor,
        appointment_time: request.appointment_time,
        status: request.status,
        notes: request.notes,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_appointment(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AppointmentResponse>> {
    authorize(&state, &identity, Operation::ReadAppointment).await?;

    let sql = format!("{APPOINTMENT_SELECT} WHERE a.id = $1");
    let row = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::internal)?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(row.try_into()?))
}

pub async fn list_appointments(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<AppointmentResponse>>> {
    authorize(&state, &identity, Operation::ListAppointments).await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointments")
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let sql = format!("{APPOINTMENT_SELECT} ORDER BY a.appointment_time LIMIT $1 OFFSET $2");
    let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(params.size())
        .bind(params.offset())
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let content = rows
        .into_iter()
        .map(AppointmentResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(Page::new(content, &params, total)))
}

pub async fn list_appointments_by_patient(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(patient_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<AppointmentResponse>>> {
    authorize(&state, &identity, Operation::ListAppointmentsByPatient).await?;

    fetch_patient(&state, patient_id).await?;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM appointments WHERE patient_id = $1")
            .bind(patient_id)
            .fetch_one(&state.db)
            .await
            .map_err(ApiError::internal)?;

    let sql = format!(
        "{APPOINTMENT_SELECT} WHERE a.patient_id = $1 ORDER BY a.appointment_time LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(patient_id)
        .bind(params.size())
        .bind(params.offset())
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let content = rows
        .into_iter()
        .map(AppointmentResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(Page::new(content, &params, total)))
}

pub async fn list_appointments_by_doctor(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(doctor_id): Path<Uuid>,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<AppointmentResponse>>> {
    authorize(&state, &identity, Operation::ListAppointmentsByDoctor).await?;

    fetch_doctor(&state, doctor_id).await?;

    let (total,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM appointments WHERE doctor_id = $1")
            .bind(doctor_id)
            .fetch_one(&state.db)
            .await
            .map_err(ApiError::internal)?;

    let sql = format!(
        "{APPOINTMENT_SELECT} WHERE a.doctor_id = $1 ORDER BY a.appointment_time LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(doctor_id)
        .bind(params.size())
        .bind(params.offset())
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let content = rows
        .into_iter()
        .map(AppointmentResponse::try_from)
        .collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(Page::new(content, &params, total)))
}

pub async fn update_appointment(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
    Json(request): Json<AppointmentRequest>,
) -> ApiResult<Json<AppointmentResponse>> {
    authorize(&state, &identity, Operation::UpdateAppointment).await?;

    let existing: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM appointments WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await
        .map_err(ApiError::internal)?;
    if existing.is_none() {
        return Err(not_found(id));
    }

    let patient = fetch_patient(&state, request.patient_id).await?;
    let doctor = fetch_doctor(&state, request.doctor_id).await?;

    let _slot_guard = state.doctor_locks.acquire(request.doctor_id).await;

    // The record being updated is excluded so it never collides with
    // itself, e.g. when only notes or status change.
    let slots = booked_slots_around(&state.db, request.doctor_id, request.appointment_time)
        .await
        .map_err(ApiError::internal)?;
    if find_conflict(&slots, request.appointment_time, Some(id)).is_some() {
        state.metrics.booking_conflict("update");
        return Err(slot_unavailable());
    }

    let result = sqlx::query(
        "UPDATE appointments SET patient_id = $2, doctor_id = $3, appointment_time = $4,
             status = $5, notes = $6
         WHERE id = $1",
    )
    .bind(id)
    .bind(request.patient_id)
    .bind(request.doctor_id)
    .bind(request.appointment_time)
    .bind(request.status.as_str())
    .bind(&request.notes)
    .execute(&state.db)
    .await
    .map_err(ApiError::internal)?;

    // The existence probe above is not a lock; the row can vanish between
    // it and the UPDATE. Zero affected rows means nothing was persisted.
    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }

    let response = AppointmentResponse {
        id,
        patient,
        doctor,
        appointment_time: request.appointment_time,
        status: request.status,
        notes: request.notes,
    };
    Ok(Json(response))
}

pub async fn delete_appointment(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(&state, &identity, Operation::DeleteAppointment).await?;

    let result = sqlx::query("DELETE FROM appointments WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(ApiError::internal)?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

fn slot_unavailable() -> ApiError {
    ApiError::conflict(
        "SLOT_UNAVAILABLE",
        "Doctor is already booked at this time. Please choose another slot.",
    )
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::not_found(
        "APPOINTMENT_NOT_FOUND",
        format!("Appointment not found with ID: {id}"),
    )
}
