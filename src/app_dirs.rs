use directories::ProjectDirs;
use std::path::PathBuf;

const APP: &str = "exhale";

/// Where the stats database and config file live
pub struct AppDirs;

impl AppDirs {
    /// `$XDG_STATE_HOME/exhale`, else `~/.local/state/exhale`, else the
    /// platform's local data dir
    fn state_dir() -> Option<PathBuf> {
        let xdg = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty());
        if let Some(state) = xdg {
            return Some(PathBuf::from(state).join(APP));
        }
        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".local").join("state").join(APP));
        }
        ProjectDirs::from("", "", APP).map(|pd| pd.data_local_dir().to_path_buf())
    }

    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("stats.db"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP).map(|pd| pd.config_dir().join("config.json"))
    }
}
