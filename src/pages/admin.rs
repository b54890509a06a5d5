use auth::AuthSnapshot;

use super::header;

#[must_use]
pub fn render(snapshot: &AuthSnapshot) -> String {
    let email = snapshot.email().unwrap_or_default();
    let user_id = snapshot.user.as_ref().map(|u| u.id.to_string()).unwrap_or_default();
    [
        header(email, snapshot.is_admin),
        String::new(),
        "Admin Panel".to_string(),
        format!("  Signed in as {email} ({user_id})"),
        "  Back to Dashboard  atlas open /dashboard".to_string(),
    ]
    .join("\n")
}
