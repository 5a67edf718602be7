//! Committer identity, clock seam, and signature formatting.
//!
//! Identity lives in the control directory's `config` file as plain
//! `author:` / `email:` lines. The core never consults the wall clock
//! directly: commits take their timestamp from a [`Clock`], which defaults
//! to system time at UTC.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::fsutil;

/// File name of the identity config inside the control directory.
pub const CONFIG_FILE: &str = "config";

/// Who commits are attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// Source of commit timestamps: `(unix-seconds, tz-offset-minutes)`.
pub trait Clock: Send + Sync {
    fn now(&self) -> (i64, i32);
}

/// Wall clock pinned to UTC.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> (i64, i32) {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        (secs, 0)
    }
}

/// Fixed timestamp, for deterministic tests.
pub struct FixedClock(pub i64, pub i32);

impl Clock for FixedClock {
    fn now(&self) -> (i64, i32) {
        (self.0, self.1)
    }
}

/// Load identity from the config file. Missing file yields empty fields;
/// `#` lines are comments and unknown keys are ignored.
pub fn load_identity(control_dir: &Path) -> Result<Identity> {
    let path = control_dir.join(CONFIG_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Identity::default()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Identity::default();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(v) = line.strip_prefix("author:") {
            out.name = v.trim().to_string();
        } else if let Some(v) = line.strip_prefix("email:") {
            out.email = v.trim().to_string();
        }
    }
    Ok(out)
}

/// Overwrite the config file with the given identity.
pub fn save_identity(control_dir: &Path, identity: &Identity) -> Result<()> {
    let text = format!("author: {}\nemail: {}\n", identity.name, identity.email);
    fsutil::write_atomic(&control_dir.join(CONFIG_FILE), text.as_bytes())
}

/// Format a timezone offset in minutes as `±HHMM`.
pub fn tz_offset_string(minutes: i32) -> String {
    let sign = if minutes < 0 { '-' } else { '+' };
    let abs = minutes.abs();
    format!("{sign}{:02}{:02}", abs / 60, abs % 60)
}

/// Build a commit signature: `Name <email> <unix-seconds> <±HHMM>`.
pub fn make_signature(identity: &Identity, secs: i64, tz_minutes: i32) -> String {
    format!(
        "{} <{}> {} {}",
        identity.name,
        identity.email,
        secs,
        tz_offset_string(tz_minutes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identity_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let id = Identity {
            name: "User".into(),
            email: "u@example.com".into(),
        };
        save_identity(tmp.path(), &id).unwrap();
        assert_eq!(load_identity(tmp.path()).unwrap(), id);
    }

    #[test]
    fn test_identity_missing_file() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(load_identity(tmp.path()).unwrap(), Identity::default());
    }

    #[test]
    fn test_identity_ignores_comments_and_unknown_keys() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "# comment\nauthor: A\ncolor: green\nemail: a@b\n",
        )
        .unwrap();
        let id = load_identity(tmp.path()).unwrap();
        assert_eq!(id.name, "A");
        assert_eq!(id.email, "a@b");
    }

    #[test]
    fn test_tz_offset_string() {
        assert_eq!(tz_offset_string(0), "+0000");
        assert_eq!(tz_offset_string(180), "+0300");
        assert_eq!(tz_offset_string(-420), "-0700");
        assert_eq!(tz_offset_string(90), "+0130");
    }

    #[test]
    fn test_make_signature() {
        let id = Identity {
            name: "User".into(),
            email: "u@example.com".into(),
        };
        assert_eq!(
            make_signature(&id, 1714412345, 180),
            "User <u@example.com> 1714412345 +0300"
        );
    }
}
