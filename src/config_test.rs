use super::*;
use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// # Safety
/// Callers must hold [`lock_env`]; nothing else in this binary reads these vars.
unsafe fn clear_velo_env() {
    unsafe {
        std::env::remove_var("VELO_API_URL");
        std::env::remove_var("VELO_STATE_DIR");
        std::env::remove_var("VELO_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("VELO_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults() {
    let _env = lock_env();
    unsafe {
        clear_velo_env();
        std::env::set_var("VELO_STATE_DIR", "/tmp/velo-test");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.api_url, DEFAULT_API_URL);
    assert_eq!(cfg.state_dir, PathBuf::from("/tmp/velo-test"));
    assert_eq!(cfg.timeouts, HttpTimeouts::default());

    unsafe { clear_velo_env() };
}

#[test]
fn from_env_parses_overrides() {
    let _env = lock_env();
    unsafe {
        clear_velo_env();
        std::env::set_var("VELO_API_URL", "http://localhost:8080/");
        std::env::set_var("VELO_STATE_DIR", "/tmp/velo-test");
        std::env::set_var("VELO_REQUEST_TIMEOUT_SECS", "30");
        std::env::set_var("VELO_CONNECT_TIMEOUT_SECS", "5");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.api_url, "http://localhost:8080");
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: Some(30), connect_secs: Some(5) });

    unsafe { clear_velo_env() };
}

#[test]
fn from_env_ignores_unparsable_timeouts() {
    let _env = lock_env();
    unsafe {
        clear_velo_env();
        std::env::set_var("VELO_STATE_DIR", "/tmp/velo-test");
        std::env::set_var("VELO_REQUEST_TIMEOUT_SECS", "soon");
        std::env::set_var("VELO_CONNECT_TIMEOUT_SECS", "0");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.timeouts, HttpTimeouts::default());

    unsafe { clear_velo_env() };
}

#[test]
fn from_env_rejects_non_http_url() {
    let _env = lock_env();
    unsafe {
        clear_velo_env();
        std::env::set_var("VELO_API_URL", "ftp://velo.test");
    }

    let err = ClientConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::InvalidApiUrl(_)));

    unsafe { clear_velo_env() };
}

#[test]
fn with_api_url_overrides_env_value() {
    let cfg = ClientConfig {
        api_url: DEFAULT_API_URL.to_string(),
        state_dir: PathBuf::from(".velo"),
        timeouts: HttpTimeouts::default(),
    };
    let cfg = cfg.with_api_url("https://staging.velo.test//").unwrap();
    assert_eq!(cfg.api_url, "https://staging.velo.test");
}

#[test]
fn default_state_dir_prefers_xdg_then_home() {
    assert_eq!(
        default_state_dir(Some("/state".into()), Some("/home/ana".into())),
        PathBuf::from("/state/velo")
    );
    assert_eq!(default_state_dir(None, Some("/home/ana".into())), PathBuf::from("/home/ana/.velo"));
    assert_eq!(default_state_dir(None, None), PathBuf::from(".velo"));
}
