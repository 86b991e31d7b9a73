use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{actions::MAX_PURGE_DAYS, errors::Error, Result};

/// Typed configuration for the shop bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    /// Admin recipients in configured order; notification fan-out iterates this.
    pub admins: Vec<i64>,
    pub group_id: i64,
    pub group_username: Option<String>,
    pub database_url: String,

    // Requests
    pub prepay_percent: i64,
    pub allow_reopen: bool,
    pub purge_days: i64,

    // Presentation
    pub start_message_client: String,
    pub start_message_admin: String,
    pub start_photo: PathBuf,
    pub admin_panel_photo: PathBuf,
    pub lots_panel_photo: PathBuf,
    pub requests_panel_photo: PathBuf,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Rate limiting (buy clicks)
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admins = parse_csv_i64(env_str("ADMINS"));
        if admins.is_empty() {
            return Err(Error::Config(
                "ADMINS environment variable is required".to_string(),
            ));
        }

        let group_id = env_i64("GROUP_ID").unwrap_or(0);
        let group_username = env_str("GROUP_USERNAME")
            .and_then(non_empty)
            .map(|s| s.trim_start_matches('@').to_string());
        let database_url =
            env_str("DATABASE_URL").unwrap_or_else(|| "sqlite:bot.db?mode=rwc".to_string());

        let prepay_percent = env_i64("PREPAY_PERCENT").unwrap_or(20);
        if !(0..=100).contains(&prepay_percent) {
            return Err(Error::Config(format!(
                "PREPAY_PERCENT must be within 0..=100, got {prepay_percent}"
            )));
        }
        let allow_reopen = env_bool("REQUEST_ALLOW_REOPEN").unwrap_or(false);
        let purge_days = env_i64("PURGE_DAYS").unwrap_or(7);
        if !(0..=MAX_PURGE_DAYS).contains(&purge_days) {
            return Err(Error::Config(format!(
                "PURGE_DAYS must be within 0..={MAX_PURGE_DAYS}, got {purge_days}"
            )));
        }

        let start_message_client = env_str("START_MESSAGE_CLIENT")
            .and_then(non_empty)
            .unwrap_or_else(|| "👋 Добро пожаловать!".to_string());
        let start_message_admin = env_str("START_MESSAGE_ADMIN")
            .and_then(non_empty)
            .unwrap_or_else(|| "👋 Привет, админ!".to_string());
        let start_photo = env_path("START_PHOTO").unwrap_or_else(|| "image/start_panel.png".into());
        let admin_panel_photo =
            env_path("ADMIN_PANEL_PHOTO").unwrap_or_else(|| "image/admin_panel.png".into());
        let lots_panel_photo =
            env_path("LOTS_PANEL_PHOTO").unwrap_or_else(|| "image/lots_panel.png".into());
        let requests_panel_photo =
            env_path("REQUESTS_PANEL_PHOTO").unwrap_or_else(|| "image/requests_panel.png".into());

        let audit_log_path = env_path("AUDIT_LOG_PATH")
            .unwrap_or_else(|| PathBuf::from("/tmp/shopbot-audit.log"));
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(true);

        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u32("RATE_LIMIT_REQUESTS").unwrap_or(5);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60));

        Ok(Self {
            bot_token,
            admins,
            group_id,
            group_username,
            database_url,
            prepay_percent,
            allow_reopen,
            purge_days,
            start_message_client,
            start_message_admin,
            start_photo,
            admin_panel_photo,
            lots_panel_photo,
            requests_panel_photo,
            audit_log_path,
            audit_log_json,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }

    pub fn is_admin(&self, tg_id: i64) -> bool {
        self.admins.contains(&tg_id)
    }

    /// Config with safe defaults and no environment access, for tests and tools.
    pub fn for_admins(admins: Vec<i64>) -> Self {
        Self {
            bot_token: "x".to_string(),
            admins,
            group_id: -1001234567890,
            group_username: None,
            database_url: "sqlite::memory:".to_string(),
            prepay_percent: 20,
            allow_reopen: false,
            purge_days: 7,
            start_message_client: "hi".to_string(),
            start_message_admin: "hi admin".to_string(),
            start_photo: "image/start_panel.png".into(),
            admin_panel_photo: "image/admin_panel.png".into(),
            lots_panel_photo: "image/lots_panel.png".into(),
            requests_panel_photo: "image/requests_panel.png".into(),
            audit_log_path: std::env::temp_dir().join("shopbot-test-audit.log"),
            audit_log_json: true,
            rate_limit_enabled: false,
            rate_limit_requests: 5,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    let mut out: Vec<i64> = Vec::new();
    for id in v
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
    {
        // Ordered set: keep first occurrence.
        if !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_csv_keeps_order_and_drops_duplicates() {
        let ids = parse_csv_i64(Some(" 3, 1,x,3 ,2,".to_string()));
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn bool_parsing_accepts_common_spellings() {
        assert!(parse_bool("YES"));
        assert!(parse_bool(" on "));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_config_is_admin() {
        let cfg = Config::for_admins(vec![10, 20]);
        assert!(cfg.is_admin(20));
        assert!(!cfg.is_admin(30));
    }
}
