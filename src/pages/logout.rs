use auth::AuthContext;

use super::Page;

/// Sign out and head home. Sign-out never fails from the page's point of view.
pub async fn visit(auth: &AuthContext) -> Page {
    tracing::info!("Signing you out...");
    auth.sign_out().await;
    Page::Redirect("/".to_string())
}
