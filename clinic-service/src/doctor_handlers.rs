use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use common_auth::{Operation, OptionalIdentity};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::app::{authorize, AppState};
use crate::auth_handlers::is_unique_violation;
use crate::pagination::{Page, PageParams};
use crate::patient_handlers::SearchParams;

#[derive(Debug, Deserialize)]
pub struct DoctorRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub qualifications: Option<String>,
    /// Free-form schedule note, e.g. "Mon-Fri 9-5".
    pub availability: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Doctor {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub specialization: String,
    pub qualifications: Option<String>,
    pub availability: Option<String>,
}

pub async fn create_doctor(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Json(request): Json<DoctorRequest>,
) -> ApiResult<(StatusCode, Json<Doctor>)> {
    authorize(&state, &identity, Operation::CreateDoctor).await?;

    let doctor = sqlx::query_as::<_, Doctor>(
        "INSERT INTO doctors (id, first_name, last_name, email, phone, specialization, qualifications, availability)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING id, first_name, last_name, email, phone, specialization, qualifications, availability",
    )
    .bind(Uuid::new_v4())
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.specialization)
    .bind(&request.qualifications)
    .bind(&request.availability)
    .fetch_one(&state.db)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("DUPLICATE_EMAIL", "Doctor with this email already exists.")
        } else {
            ApiError::internal(err)
        }
    })?;

    Ok((StatusCode::CREATED, Json(doctor)))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Doctor>> {
    authorize(&state, &identity, Operation::ReadDoctor).await?;
    Ok(Json(fetch_doctor(&state, id).await?))
}

pub async fn list_doctors(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Doctor>>> {
    authorize(&state, &identity, Operation::ListDoctors).await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctors")
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let doctors = sqlx::query_as::<_, Doctor>(
        "SELECT id, first_name, last_name, email, phone, specialization, qualifications, availability
         FROM doctors ORDER BY last_name, first_name LIMIT $1 OFFSET $2",
    )
    .bind(params.size())
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(Page::new(doctors, &params, total)))
}

pub async fn search_doctors(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<Doctor>>> {
    authorize(&state, &identity, Operation::SearchDoctors).await?;

    let pattern = format!("%{}%", params.query);
    let page = params.page_params();

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM doctors
         WHERE first_name ILIKE $1 OR last_name ILIKE $1 OR specialization ILIKE $1",
    )
    .bind(&pattern)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let doctors = sqlx::query_as::<_, Doctor>(
        "SELECT id, first_name, last_name, email, phone, specialization, qualifications, availability
         FROM doctors
         WHERE first_name ILIKE $1 OR last_name ILIKE $1 OR specialization ILIKE $1
         ORDER BY last_name, first_name LIMIT $2 OFFSET $3",
    )
    .bind(&pattern)
    .bind(page.size())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(Page::new(doctors, &page, total)))
}

pub async fn update_doctor(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
    Json(request): Json<DoctorRequest>,
) -> ApiResult<Json<Doctor>> {
    authorize(&state, &identity, Operation::UpdateDoctor).await?;

    fetch_doctor(&state, id).await?;

    let taken: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM doctors WHERE email = $1 AND id <> $2")
            .bind(&request.email)
            .bind(id)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::internal)?;
    if taken.is_some() {
        return Err(ApiError::conflict(
            "DUPLICATE_EMAIL",
            "Another doctor with this email already exists.",
        ));
    }

    let doctor = sqlx::query_as::<_, Doctor>(
        "UPDATE doctors SET first_name = $2, last_name = $3, email = $4, phone = $5,
             specialization = $6, qualifications = $7, availability = $8
         WHERE id = $1
         RETURNING id, first_name, last_name, email, phone, specialization, qualifications, availability",
    )
    .bind(id)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(&request.specialization)
    .bind(&request.qualifications)
    .bind(&request.availability)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(doctor))
}

pub async fn delete_doctor(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(&state, &identity, Operation::DeleteDoctor).await?;

    let result = sqlx::query("DELETE FROM doctors WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(ApiError::internal)?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_doctor(state: &AppState, id: Uuid) -> ApiResult<Doctor> {
    sqlx::query_as::<_, Doctor>(
        "SELECT id, first_name, last_name, email, phone, specialization, qualifications, availability
         FROM doctors WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| not_found(id))
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::not_found("DOCTOR_NOT_FOUND", format!("Doctor not found with ID: {id}"))
}
