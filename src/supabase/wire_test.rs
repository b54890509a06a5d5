use super::*;

const USER_ID: &str = "8d0fd2b3-9ca7-4a4c-a4b6-6f4c2f6f3c11";

fn make_session(expires_at: Option<i64>) -> String {
    let mut body = serde_json::json!({
        "access_token": "jwt-access",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "jwt-refresh",
        "user": {
            "id": USER_ID,
            "aud": "authenticated",
            "email": "pilot@example.com",
            "user_metadata": { "company_id": null },
            "app_metadata": { "provider": "email" }
        }
    });
    if let Some(at) = expires_at {
        body["expires_at"] = serde_json::json!(at);
    }
    body.to_string()
}

#[test]
fn endpoints_trim_trailing_slash() {
    let endpoints = Endpoints::new("https://atlas.supabase.co/");
    assert_eq!(endpoints.password_grant(), "https://atlas.supabase.co/auth/v1/token?grant_type=password");
    assert_eq!(endpoints.refresh_grant(), "https://atlas.supabase.co/auth/v1/token?grant_type=refresh_token");
    assert_eq!(endpoints.logout(), "https://atlas.supabase.co/auth/v1/logout");
    assert_eq!(
        endpoints.user_row(USER_ID.parse().unwrap()),
        format!("https://atlas.supabase.co/rest/v1/users?id=eq.{USER_ID}")
    );
}

#[test]
fn parse_session_keeps_server_expiry() {
    let session = parse_session(&make_session(Some(1_700_000_000)), 5).unwrap();
    assert_eq!(session.expires_at, Some(1_700_000_000));
    assert_eq!(session.user.email.as_deref(), Some("pilot@example.com"));
    assert_eq!(session.user.id.to_string(), USER_ID);
}

#[test]
fn parse_session_derives_missing_expiry() {
    let session = parse_session(&make_session(None), 1_000).unwrap();
    assert_eq!(session.expires_at, Some(4_600));
}

#[test]
fn parse_session_rejects_garbage() {
    assert!(matches!(parse_session("{\"access_token\":1}", 0), Err(GatewayError::Decode(_))));
}

#[test]
fn error_message_prefers_specific_fields() {
    assert_eq!(
        error_message(r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#).as_deref(),
        Some("Invalid login credentials")
    );
    assert_eq!(
        error_message(r#"{"error":"invalid_grant","error_description":"Refresh Token Not Found"}"#).as_deref(),
        Some("Refresh Token Not Found")
    );
    assert_eq!(
        error_message(r#"{"code":"PGRST301","message":"JWT expired","details":null}"#).as_deref(),
        Some("JWT expired")
    );
    assert_eq!(error_message("<html>bad gateway</html>"), None);
}

#[test]
fn rejected_carries_status_and_message() {
    let err = rejected(422, r#"{"msg":"User already registered"}"#);
    assert_eq!(err, GatewayError::Rejected { status: 422, message: "User already registered".into() });
    assert_eq!(err.user_message("fallback"), "User already registered");

    let err = rejected(502, "upstream down");
    assert_eq!(err.user_message("fallback"), "fallback");
}

#[test]
fn sign_up_with_session_signs_in() {
    let outcome = parse_sign_up(&make_session(Some(10)), 0).unwrap();
    assert!(outcome.session.is_some());
    assert_eq!(outcome.user.and_then(|u| u.email).as_deref(), Some("pilot@example.com"));
}

#[test]
fn sign_up_pending_confirmation_returns_user_only() {
    let body = serde_json::json!({
        "id": USER_ID,
        "email": "pilot@example.com",
        "confirmation_sent_at": "2025-01-01T00:00:00Z"
    })
    .to_string();
    let outcome = parse_sign_up(&body, 0).unwrap();
    assert!(outcome.session.is_none());
    assert_eq!(outcome.user.map(|u| u.id.to_string()).as_deref(), Some(USER_ID));
}

#[test]
fn profile_rows_embed_company() {
    let body = serde_json::json!([{
        "id": USER_ID,
        "email": "pilot@example.com",
        "company_id": "11111111-2222-3333-4444-555555555555",
        "created_at": "2025-02-03T04:05:06.789+00:00",
        "company": {
            "id": "11111111-2222-3333-4444-555555555555",
            "name": "Northwind Survey",
            "created_at": "2024-12-01T00:00:00+00:00"
        }
    }])
    .to_string();
    let profile = parse_profile_rows(&body).unwrap().unwrap();
    assert_eq!(profile.company_name(), Some("Northwind Survey"));
    assert_eq!(parse_profile_rows("[]").unwrap(), None);
}

#[test]
fn email_rows() {
    assert_eq!(parse_email_rows(r#"[{"email":"admin@yourdomain.com"}]"#).unwrap().as_deref(), Some("admin@yourdomain.com"));
    assert_eq!(parse_email_rows("[]").unwrap(), None);
    assert!(parse_email_rows("{}").is_err());
}
