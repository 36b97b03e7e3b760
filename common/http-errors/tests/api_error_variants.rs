//! Status and X-Error-Code regression coverage for every ApiError variant.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use common_http_errors::ApiError;

fn code_header(resp: &axum::response::Response) -> &str {
    resp.headers()
        .get("X-Error-Code")
        .expect("X-Error-Code header")
        .to_str()
        .expect("ascii header")
}

#[test]
fn unauthenticated_variant() {
    let resp = ApiError::unauthenticated().into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(code_header(&resp), "UNAUTHENTICATED");
}

#[test]
fn forbidden_variant() {
    let resp = ApiError::Forbidden {
        required: vec!["ADMIN", "DOCTOR"],
    }
    .into_response();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(code_header(&resp), "FORBIDDEN");
}

#[test]
fn invalid_credentials_variant() {
    let resp = ApiError::InvalidCredentials.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(code_header(&resp), "INVALID_CREDENTIALS");
}

#[test]
fn conflict_variant_carries_its_code() {
    let resp = ApiError::conflict("SLOT_UNAVAILABLE", "taken").into_response();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(code_header(&resp), "SLOT_UNAVAILABLE");
}

#[test]
fn bad_request_variant_carries_its_code() {
    let resp = ApiError::bad_request("EMPTY_EMAIL").into_response();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(code_header(&resp), "EMPTY_EMAIL");
}

#[test]
fn not_found_variant_carries_its_code() {
    let resp = ApiError::not_found("PATIENT_NOT_FOUND", "gone").into_response();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(code_header(&resp), "PATIENT_NOT_FOUND");
}

#[test]
fn internal_variant() {
    let resp = ApiError::internal("boom").into_response();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(code_header(&resp), "internal_error");
}
