use auth::types::Company;
use auth::{AuthSnapshot, AuthUser, Profile};
use time::OffsetDateTime;
use uuid::Uuid;

use super::*;

fn signed_in(email: &str, company: Option<&str>, is_admin: bool) -> AuthSnapshot {
    let user = AuthUser { id: Uuid::new_v4(), email: Some(email.into()), user_metadata: serde_json::Map::new() };
    let company = company.map(|name| Company {
        id: Uuid::new_v4(),
        name: name.into(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        projects: None,
    });
    let profile = Profile {
        id: user.id,
        email: email.into(),
        company_id: company.as_ref().map(|c| c.id),
        created_at: OffsetDateTime::UNIX_EPOCH,
        company,
    };
    AuthSnapshot { user: Some(user), session: None, profile: Some(profile), is_admin, loading: false }
}

#[test]
fn dashboard_shows_account_information() {
    let screen = dashboard::render(&signed_in("planner@example.com", Some("Northwind Survey"), false));
    assert!(screen.contains("Welcome, planner@example.com"));
    assert!(screen.contains("Company: Northwind Survey"));
    assert!(screen.contains("Role:    User"));
    assert!(!screen.contains("Admin Panel"));
    assert!(!screen.contains("[Admin]"));
}

#[test]
fn dashboard_without_company_and_admin_actions() {
    let screen = dashboard::render(&signed_in("admin@yourdomain.com", None, true));
    assert!(screen.contains(&format!("Company: {}", dashboard::NOT_ASSIGNED)));
    assert!(screen.contains("Role:    Administrator"));
    assert!(screen.contains("Admin Panel"));
    assert!(screen.contains("[Admin]"));
}

#[test]
fn login_redirects_authenticated_visitors() {
    let snapshot = signed_in("planner@example.com", None, false);
    assert_eq!(login::visit(&snapshot, ""), Page::Redirect("/dashboard".into()));
    assert_eq!(
        login::visit(&snapshot, "redirect=%2Fadmin%3Ftab%3Dusers"),
        Page::Redirect("/admin?tab=users".into())
    );
    assert_eq!(login::visit(&snapshot, "redirect=https%3A%2F%2Fevil.example"), Page::Redirect("/dashboard".into()));
}

#[test]
fn login_form_for_anonymous_visitors_keeps_redirect() {
    let Page::Screen(screen) = login::visit(&AuthSnapshot::default(), "redirect=%2Fdashboard") else {
        panic!("expected the form");
    };
    assert!(screen.contains("--redirect '/dashboard'"));
}

#[test]
fn login_form_lists_errors() {
    let errors = auth::login::FormErrors {
        email: Some("Email is required".into()),
        password: None,
        general: Some("Invalid login credentials".into()),
    };
    let screen = login::form(None, Some(&errors));
    assert!(screen.contains("! Invalid login credentials"));
    assert!(screen.contains("Email: Email is required"));
    assert!(!screen.contains("--redirect"));
}

#[test]
fn access_denied_offers_dashboard() {
    let screen = access_denied("/admin");
    assert!(screen.starts_with("Access Denied\n\nYou don't have permission"));
    assert!(screen.ends_with("  [Go to Dashboard]  atlas open '/admin' --escape"));
}

#[test]
fn access_denied_escape_names_the_denied_route() {
    let screen = access_denied("/admin/companies");
    assert!(screen.contains("atlas open '/admin/companies' --escape"));
    assert!(!screen.contains("'/admin' "));
}
