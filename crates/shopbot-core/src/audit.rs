use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{errors::Error, Result};

const AUDIT_MAX_TEXT: usize = 500;

/// One line of the admin audit trail.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_tg_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raffle_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    fn base(event: &str, actor_tg_id: Option<i64>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            actor_tg_id,
            request_id: None,
            lot_id: None,
            raffle_id: None,
            detail: None,
        }
    }

    pub fn request(event: &str, actor_tg_id: i64, request_id: i64, detail: Option<&str>) -> Self {
        Self {
            request_id: Some(request_id),
            detail: detail.map(|s| s.to_string()),
            ..Self::base(event, Some(actor_tg_id))
        }
    }

    pub fn lot(event: &str, actor_tg_id: Option<i64>, lot_id: i64, detail: Option<&str>) -> Self {
        Self {
            lot_id: Some(lot_id),
            detail: detail.map(|s| s.to_string()),
            ..Self::base(event, actor_tg_id)
        }
    }

    pub fn raffle(event: &str, raffle_id: i64, detail: Option<&str>) -> Self {
        Self {
            raffle_id: Some(raffle_id),
            detail: detail.map(|s| s.to_string()),
            ..Self::base(event, None)
        }
    }

    pub fn purge(actor_tg_id: Option<i64>, detail: &str) -> Self {
        Self {
            detail: Some(detail.to_string()),
            ..Self::base("requests_purged", actor_tg_id)
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.detail {
            event.detail = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        // Plain text format for readability.
        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::Validation(
                "audit event is not a JSON object".to_string(),
            ));
        };
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Write, logging instead of failing: the audit trail never blocks an operation.
    pub fn record(&self, event: AuditEvent) {
        let name = event.event.clone();
        if let Err(e) = self.write(event) {
            tracing::warn!(event = %name, error = %e, "failed to write audit event");
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        std::env::temp_dir().join(format!("{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
    }

    #[test]
    fn json_lines_carry_request_fields() {
        let log = AuditLogger::new(tmp_file("shopbot-audit-json"), true);
        log.write(AuditEvent::request("request_taken", 77, 5, Some("pending -> processing")))
            .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(written.trim()).unwrap();
        assert_eq!(v["event"], "request_taken");
        assert_eq!(v["request_id"], 5);
        assert_eq!(v["actor_tg_id"], 77);
        assert!(v.get("lot_id").is_none());
        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn plain_format_truncates_detail() {
        let log = AuditLogger::new(tmp_file("shopbot-audit-plain"), false);
        let detail = "x".repeat(AUDIT_MAX_TEXT + 1);
        log.write(AuditEvent::lot("lot_published", Some(1), 9, Some(&detail)))
            .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("event: lot_published"));
        assert!(written.contains("..."));
        let _ = std::fs::remove_file(log.path());
    }
}
