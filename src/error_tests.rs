use super::*;

#[test]
fn http_status_mapping() {
    assert_eq!(AppError::bad_request("oops").http_status(), StatusCode::BAD_REQUEST);
    assert_eq!(AppError::Unauthenticated.http_status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::InvalidCredentials.http_status(), StatusCode::UNAUTHORIZED);
    assert_eq!(AppError::Forbidden.http_status(), StatusCode::FORBIDDEN);
    assert_eq!(AppError::not_found("missing").http_status(), StatusCode::NOT_FOUND);
    assert_eq!(AppError::conflict("dup").http_status(), StatusCode::CONFLICT);
    assert_eq!(AppError::internal("panic").http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(AppError::Timeout.http_status(), StatusCode::REQUEST_TIMEOUT);
}

#[test]
fn timeout_has_fixed_message() {
    assert_eq!(AppError::Timeout.code_str(), "timeout");
    assert_eq!(AppError::Timeout.public_message(), "request timed out");
}

#[test]
fn internal_detail_is_not_exposed() {
    let e = AppError::internal("snapshot write failed: /var/lib/timesheet.json");
    assert_eq!(e.public_message(), "internal server error");
    assert_eq!(e.code_str(), "internal");
}

#[test]
fn store_conflict_hides_column() {
    let e: AppError = StoreError::Conflict { field: "email" }.into();
    assert!(matches!(e, AppError::Conflict { .. }));
    assert_eq!(e.public_message(), "email or username already exists");
}

#[test]
fn unauthorized_response_carries_challenge() {
    let resp = AppError::Unauthenticated.into_response();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()), Some("Bearer"));

    let resp = AppError::Forbidden.into_response();
    assert!(resp.headers().get(header::WWW_AUTHENTICATE).is_none());
}
