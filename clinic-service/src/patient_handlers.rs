use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use common_auth::{Operation, OptionalIdentity};
use common_http_errors::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::app::{authorize, AppState};
use crate::auth_handlers::is_unique_violation;
use crate::pagination::{Page, PageParams};

#[derive(Debug, Deserialize)]
pub struct PatientRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub medical_history: Option<String>,
    pub allergies: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

impl SearchParams {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            size: self.size,
        }
    }
}

pub async fn create_patient(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Json(request): Json<PatientRequest>,
) -> ApiResult<(StatusCode, Json<Patient>)> {
    authorize(&state, &identity, Operation::CreatePatient).await?;

    let patient = sqlx::query_as::<_, Patient>(
        "INSERT INTO patients (id, first_name, last_name, email, phone, date_of_birth, gender, address, medical_history, allergies)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING id, first_name, last_name, email, phone, date_of_birth, gender, address, medical_history, allergies",
    )
    .bind(Uuid::new_v4())
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(request.date_of_birth)
    .bind(&request.gender)
    .bind(&request.address)
    .bind(&request.medical_history)
    .bind(&request.allergies)
    .fetch_one(&state.db)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::conflict("DUPLICATE_EMAIL", "Patient with this email already exists.")
        } else {
            ApiError::internal(err)
        }
    })?;

    Ok((StatusCode::CREATED, Json(patient)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Patient>> {
    authorize(&state, &identity, Operation::ReadPatient).await?;
    Ok(Json(fetch_patient(&state, id).await?))
}

pub async fn list_patients(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Query(params): Query<PageParams>,
) -> ApiResult<Json<Page<Patient>>> {
    authorize(&state, &identity, Operation::ListPatients).await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patients")
        .fetch_one(&state.db)
        .await
        .map_err(ApiError::internal)?;

    let patients = sqlx::query_as::<_, Patient>(
        "SELECT id, first_name, last_name, email, phone, date_of_birth, gender, address, medical_history, allergies
         FROM patients ORDER BY last_name, first_name LIMIT $1 OFFSET $2",
    )
    .bind(params.size())
    .bind(params.offset())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(Page::new(patients, &params, total)))
}

pub async fn search_patients(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Page<Patient>>> {
    authorize(&state, &identity, Operation::SearchPatients).await?;

    let pattern = format!("%{}%", params.query);
    let page = params.page_params();

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM patients WHERE first_name ILIKE $1 OR last_name ILIKE $1",
    )
    .bind(&pattern)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::internal)?;

    let patients = sqlx::query_as::<_, Patient>(
        "SELECT id, first_name, last_name, email, phone, date_of_birth, gender, address, medical_history, allergies
         FROM patients WHERE first_name ILIKE $1 OR last_name ILIKE $1
         ORDER BY last_name, first_name LIMIT $2 OFFSET $3",
    )
    .bind(&pattern)
    .bind(page.size())
    .bind(page.offset())
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(Page::new(patients, &page, total)))
}

pub async fn update_patient(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
    Json(request): Json<PatientRequest>,
) -> ApiResult<Json<Patient>> {
    authorize(&state, &identity, Operation::UpdatePatient).await?;

    // Fail fast when the record is gone; also guards the email check below.
    fetch_patient(&state, id).await?;

    let taken: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM patients WHERE email = $1 AND id <> $2")
            .bind(&request.email)
            .bind(id)
            .fetch_optional(&state.db)
            .await
            .map_err(ApiError::internal)?;
    if taken.is_some() {
        return Err(ApiError::conflict(
            "DUPLICATE_EMAIL",
            "Another patient with this email already exists.",
        ));
    }

    let patient = sqlx::query_as::<_, Patient>(
        "UPDATE patients SET first_name = $2, last_name = $3, email = $4, phone = $5,
             date_of_birth = $6, gender = $7, address = $8, medical_history = $9, allergies = $10
         WHERE id = $1
         RETURNING id, first_name, last_name, email, phone, date_of_birth, gender, address, medical_history, allergies",
    )
    .bind(id)
    .bind(&request.first_name)
    .bind(&request.last_name)
    .bind(&request.email)
    .bind(&request.phone)
    .bind(request.date_of_birth)
    .bind(&request.gender)
    .bind(&request.address)
    .bind(&request.medical_history)
    .bind(&request.allergies)
    .fetch_one(&state.db)
    .await
    .map_err(ApiError::internal)?;

    Ok(Json(patient))
}

pub async fn delete_patient(
    State(state): State<AppState>,
    identity: OptionalIdentity,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    authorize(&state, &identity, Operation::DeletePatient).await?;

    let result = sqlx::query("DELETE FROM patients WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(ApiError::internal)?;

    if result.rows_affected() == 0 {
        return Err(not_found(id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn fetch_patient(state: &AppState, id: Uuid) -> ApiResult<Patient> {
    sqlx::query_as::<_, Patient>(
        "SELECT id, first_name, last_name, email, phone, date_of_birth, gender, address, medical_history, allergies
         FROM patients WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::internal)?
    .ok_or_else(|| not_found(id))
}

fn not_found(id: Uuid) -> ApiError {
    ApiError::not_found("PATIENT_NOT_FOUND", format!("Patient not found with ID: {id}"))
}
