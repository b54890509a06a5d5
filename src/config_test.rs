use super::*;

/// # Safety
/// Tests must run with `--test-threads=1` to avoid env races.
unsafe fn clear_atlas_env() {
    unsafe {
        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("SUPABASE_ANON_KEY");
        std::env::remove_var("ATLAS_ADMIN_EMAILS");
        std::env::remove_var("ATLAS_SESSION_FILE");
        std::env::remove_var("ATLAS_SITE_URL");
        std::env::remove_var("ATLAS_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("ATLAS_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_applies_defaults() {
    unsafe {
        clear_atlas_env();
        std::env::set_var("SUPABASE_URL", "https://atlas.supabase.co/");
        std::env::set_var("SUPABASE_ANON_KEY", "anon");
        std::env::set_var("HOME", "/home/mapper");
    }

    let cfg = AtlasConfig::from_env().unwrap();
    assert_eq!(cfg.supabase_url, "https://atlas.supabase.co");
    assert_eq!(cfg.anon_key, "anon");
    assert!(cfg.admin_emails.is_empty());
    assert_eq!(cfg.session_file, PathBuf::from("/home/mapper/.atlas/session.json"));
    assert_eq!(cfg.site_url, DEFAULT_SITE_URL);
    assert_eq!(
        cfg.timeouts,
        Timeouts { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    );
    assert!(!cfg.admin_policy().is_admin("admin@yourdomain.com"));

    unsafe { clear_atlas_env() };
}

#[test]
fn from_env_parses_overrides() {
    unsafe {
        clear_atlas_env();
        std::env::set_var("SUPABASE_URL", "http://127.0.0.1:54321");
        std::env::set_var("SUPABASE_ANON_KEY", "anon");
        std::env::set_var("ATLAS_ADMIN_EMAILS", " admin@yourdomain.com, ,ops@atlas.test ");
        std::env::set_var("ATLAS_SESSION_FILE", "/tmp/atlas.json");
        std::env::set_var("ATLAS_SITE_URL", "https://atlas.example/");
        std::env::set_var("ATLAS_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("ATLAS_CONNECT_TIMEOUT_SECS", "not-a-number");
    }

    let cfg = AtlasConfig::from_env().unwrap();
    assert_eq!(cfg.admin_emails, vec!["admin@yourdomain.com".to_string(), "ops@atlas.test".to_string()]);
    assert_eq!(cfg.session_file, PathBuf::from("/tmp/atlas.json"));
    assert_eq!(cfg.site_url, "https://atlas.example");
    assert_eq!(cfg.timeouts, Timeouts { request_secs: 5, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS });

    let policy = cfg.admin_policy();
    assert!(policy.is_admin("ops@atlas.test"));
    assert!(!policy.is_admin("OPS@atlas.test"));

    unsafe { clear_atlas_env() };
}

#[test]
fn from_env_requires_credentials() {
    unsafe {
        clear_atlas_env();
        std::env::set_var("SUPABASE_ANON_KEY", "anon");
    }
    let err = AtlasConfig::from_env().unwrap_err().to_string();
    assert_eq!(err, "SUPABASE_URL is required");

    unsafe {
        std::env::set_var("SUPABASE_URL", "https://atlas.supabase.co");
        std::env::set_var("SUPABASE_ANON_KEY", "  ");
    }
    let err = AtlasConfig::from_env().unwrap_err().to_string();
    assert_eq!(err, "SUPABASE_ANON_KEY is required");

    unsafe { clear_atlas_env() };
}

#[test]
fn rejects_non_http_urls() {
    unsafe { clear_atlas_env() };
    let err = AtlasConfig::with_credentials("atlas.supabase.co".into(), "anon".into()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl { var: "SUPABASE_URL", .. }));
}

#[test]
fn session_file_falls_back_without_home() {
    unsafe {
        clear_atlas_env();
        std::env::set_var("HOME", "");
    }
    let cfg = AtlasConfig::with_credentials("https://atlas.supabase.co".into(), "anon".into()).unwrap();
    assert_eq!(cfg.session_file, PathBuf::from(FALLBACK_SESSION_FILE));

    unsafe { clear_atlas_env() };
}
