use super::BRAND;

#[must_use]
pub fn render() -> String {
    [
        format!("Welcome to {BRAND}"),
        "A powerful mapping platform providing centralized access to custom geographic data visualizations.".into(),
        String::new(),
        "  Login           atlas open /auth/login".into(),
        "  View Dashboard  atlas open /dashboard".into(),
        String::new(),
        "Custom Maps: each map is a custom page designed for specific geographic analysis needs.".into(),
        "Project-Based Access: companies access maps organized by projects relevant to their needs.".into(),
        "Secure & Scalable: built with modern technologies and robust security for enterprise use.".into(),
    ]
    .join("\n")
}
