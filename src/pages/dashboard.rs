use auth::AuthSnapshot;

use super::header;

pub const NOT_ASSIGNED: &str = "Not assigned";

#[must_use]
pub fn role(is_admin: bool) -> &'static str {
    if is_admin { "Administrator" } else { "User" }
}

#[must_use]
pub fn render(snapshot: &AuthSnapshot) -> String {
    let email = snapshot.email().unwrap_or_default();
    let company = snapshot
        .profile
        .as_ref()
        .and_then(|p| p.company_name())
        .unwrap_or(NOT_ASSIGNED);

    let mut lines = vec![
        header(email, snapshot.is_admin),
        String::new(),
        "Dashboard".to_string(),
        "Welcome to your Atlas mapping platform. Access your projects and maps below.".to_string(),
        String::new(),
        "Account Information".to_string(),
        format!("  Email:   {email}"),
        format!("  Company: {company}"),
        format!("  Role:    {}", role(snapshot.is_admin)),
        String::new(),
        "Quick Actions".to_string(),
        "  View Projects".to_string(),
        "  Browse Maps".to_string(),
    ];
    if snapshot.is_admin {
        lines.push("  Admin Panel     atlas open /admin".to_string());
    }
    lines.push("  Sign Out        atlas logout".to_string());
    lines.join("\n")
}
