use std::path::Path;

use tracing::debug;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Credentials live next to the backend service, relative to the run directory.
pub const ENV_FILE: &str = "../backend/.env";

/// Configuration for the generative-language service. Built once in `main`
/// and handed to the client explicitly rather than read ad hoc from the
/// environment at call sites.
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Missing key is only an error once a generation call is attempted.
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl GenConfig {
    /// Load the `.env` file if present, then read the process environment.
    pub fn load() -> Self {
        if dotenvy::from_path(Path::new(ENV_FILE)).is_err() {
            debug!("No env file at {}, using process environment", ENV_FILE);
        }
        Self::from_env()
    }

    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        cfg.api_key = std::env::var("GEMINI_API_KEY").ok();
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            cfg.model = model;
        }
        if let Ok(base) = std::env::var("GEMINI_API_BASE") {
            cfg.api_base = base;
        }
        cfg
    }
}
