use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "MARKSD_WORKSPACE";
pub const ENV_CALLER: &str = "MARKSD_CALLER";
pub const ENV_LOG: &str = "MARKSD_LOG";
pub const ENV_LOG_JSON: &str = "MARKSD_LOG_JSON";

/// Process-level settings read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub caller: Option<String>,
    pub log_filter: Option<String>,
    pub log_json: bool,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
            caller: non_empty(ENV_CALLER),
            log_filter: non_empty(ENV_LOG),
            log_json: non_empty(ENV_LOG_JSON)
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }
}
