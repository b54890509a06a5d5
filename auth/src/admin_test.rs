use super::*;

#[test]
fn allow_listed_email_is_admin() {
    let policy = AdminPolicy::allow_list(["admin@yourdomain.com"]);
    assert!(policy.is_admin("admin@yourdomain.com"));
}

#[test]
fn other_emails_are_not_admin() {
    let policy = AdminPolicy::allow_list(["admin@yourdomain.com"]);
    assert!(!policy.is_admin("user@yourdomain.com"));
    assert!(!policy.is_admin(""));
}

#[test]
fn none_grants_nobody() {
    assert!(!AdminPolicy::none().is_admin("admin@yourdomain.com"));
    assert!(!AdminPolicy::default().is_admin("admin@yourdomain.com"));
}

#[test]
fn from_csv_trims_and_skips_blanks() {
    let policy = AdminPolicy::from_csv(" a@x.io , ,b@x.io,");
    assert!(policy.is_admin("a@x.io"));
    assert!(policy.is_admin("b@x.io"));
    assert!(!policy.is_admin(""));
    assert_eq!(format!("{policy:?}"), "AllowList(2)");
}

#[test]
fn predicate_policy_delegates() {
    let policy = AdminPolicy::predicate(|email| email.ends_with("@ops.atlas.dev"));
    assert!(policy.is_admin("root@ops.atlas.dev"));
    assert!(!policy.is_admin("root@atlas.dev"));
    assert_eq!(format!("{policy:?}"), "Predicate(..)");
}
