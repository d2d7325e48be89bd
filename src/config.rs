use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub coach_command: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let workspace = non_empty_var("NETOKUL_WORKSPACE").map(PathBuf::from);
        let log_filter = non_empty_var("NETOKUL_LOG").unwrap_or_else(|| "info".to_string());
        let coach_command = non_empty_var("NETOKUL_COACH_COMMAND");

        Self {
            workspace,
            log_filter,
            coach_command,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
