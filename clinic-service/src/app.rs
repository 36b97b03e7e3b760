use std::sync::Arc;

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use common_auth::{
    check, AuthError, Operation, OptionalIdentity, PolicyError, Role, TokenConfig, TokenSigner,
    TokenVerifier,
};
use common_http_errors::{ApiError, ApiResult};
use sqlx::PgPool;
use tracing::warn;

use crate::appointment_handlers::{
    create_appointment, delete_appointment, get_appointment, list_appointments,
    list_appointments_by_doctor, list_appointments_by_patient, update_appointment,
};
use crate::auth_handlers::{login, register};
use crate::config::ClinicConfig;
use crate::doctor_handlers::{
    create_doctor, delete_doctor, get_doctor, list_doctors, search_doctors, update_doctor,
};
use crate::metrics::ClinicMetrics;
use crate::patient_handlers::{
    create_patient, delete_patient, get_patient, list_patients, search_patients, update_patient,
};
use crate::scheduling::DoctorLocks;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub verifier: Arc<TokenVerifier>,
    pub signer: Arc<TokenSigner>,
    pub config: Arc<ClinicConfig>,
    pub metrics: Arc<ClinicMetrics>,
    pub doctor_locks: Arc<DoctorLocks>,
}

impl AppState {
    pub fn new(db: PgPool, config: ClinicConfig, metrics: ClinicMetrics) -> Self {
        let token_config = TokenConfig::new().with_ttl(config.token_ttl_seconds);
        let secret = config.jwt_secret.as_bytes();
        Self {
            verifier: Arc::new(TokenVerifier::new(secret, &token_config)),
            signer: Arc::new(TokenSigner::new(secret, token_config)),
            config: Arc::new(config),
            metrics: Arc::new(metrics),
            doctor_locks: Arc::new(DoctorLocks::new()),
            db,
        }
    }
}

impl FromRef<AppState> for Arc<TokenVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

impl FromRef<AppState> for Arc<TokenSigner> {
    fn from_ref(state: &AppState) -> Self {
        state.signer.clone()
    }
}

/// The request's resolved identity after authentication and authorization.
#[derive(Debug, Clone)]
pub struct Caller {
    pub email: String,
    pub role: Role,
}

/// Evaluates the policy table for the request's identity. The embedded
/// token role wins; the credential store is consulted only when the token
/// carries no role claim, or to confirm the subject under strict mode.
pub async fn authorize(
    state: &AppState,
    identity: &OptionalIdentity,
    op: Operation,
) -> ApiResult<Caller> {
    let Some(ctx) = &identity.0 else {
        return Err(ApiError::unauthenticated());
    };

    let role = match ctx.claims.role {
        Some(role) => {
            if state.config.strict_subject && !subject_exists(&state.db, &ctx.claims.subject).await?
            {
                return Err(reject_unknown_subject(&ctx.claims.subject));
            }
            role
        }
        None => match lookup_role(&state.db, &ctx.claims.subject).await? {
            Some(role) => role,
            None => return Err(reject_unknown_subject(&ctx.claims.subject)),
        },
    };

    check(Some(role), op).map_err(policy_error)?;

    Ok(Caller {
        email: ctx.claims.subject.clone(),
        role,
    })
}

/// The typed failure is logged; the wire answer stays the generic 401 so
/// the response never reveals which check rejected the token.
fn reject_unknown_subject(subject: &str) -> ApiError {
    let err = AuthError::SubjectUnknown(subject.to_string());
    warn!(%err, "rejecting verified token");
    ApiError::unauthenticated()
}

fn policy_error(err: PolicyError) -> ApiError {
    match err {
        PolicyError::Unauthenticated => ApiError::unauthenticated(),
        PolicyError::Forbidden { required } => ApiError::Forbidden {
            required: required.iter().map(|role| role.as_str()).collect(),
        },
    }
}

async fn lookup_role(db: &PgPool, email: &str) -> ApiResult<Option<Role>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT role FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(db)
        .await
        .map_err(ApiError::internal)?;

    match row {
        Some((raw,)) => raw.parse::<Role>().map(Some).map_err(ApiError::internal),
        None => Ok(None),
    }
}

async fn subject_exists(db: &PgPool, email: &str) -> ApiResult<bool> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(db)
        .await
        .map_err(ApiError::internal)?;
    Ok(row.is_some())
}

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<AppState>) -> Result<Response, StatusCode> {
    state
        .metrics
        .render()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/patients", post(create_patient).get(list_patients))
        .route("/api/patients/search", get(search_patients))
        .route(
            "/api/patients/:id",
            get(get_patient).put(update_patient).delete(delete_patient),
        )
        .route("/api/doctors", post(create_doctor).get(list_doctors))
        .route("/api/doctors/search", get(search_doctors))
        .route(
            "/api/doctors/:id",
            get(get_doctor).put(update_doctor).delete(delete_doctor),
        )
        .route(
            "/api/appointments",
            post(create_appointment).get(list_appointments),
        )
        .route(
            "/api/appointments/:id",
            get(get_appointment)
                .put(update_appointment)
                .delete(delete_appointment),
        )
        .route(
            "/api/appointments/patient/:patient_id",
            get(list_appointments_by_patient),
        )
        .route(
            "/api/appointments/doctor/:doctor_id",
            get(list_appointments_by_doctor),
        )
        .with_state(state)
}
