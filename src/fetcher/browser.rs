//! Browser profiles the portal session is borrowed from.
//!
//! Login itself happens in the user's browser. Here we only read the cookies it
//! stored for the portal host and hand them to [`PortalClient`].

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, IoContext, Result};
use crate::fetcher::PortalClient;
use crate::models::Config;
use crate::utils::get_domain;

/// A cookie read from a browser profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// `Set-Cookie` style string for the jar, valid on every path of the host.
    pub fn header_value(&self) -> String {
        format!("{}={}; Path=/", self.name, self.value)
    }
}

/// Supported browsers and the location of their profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "browser", rename_all = "lowercase")]
pub enum Browser {
    Firefox {
        /// Profile directory containing `cookies.sqlite`
        profile: PathBuf,
    },
    Chrome {
        /// Chrome "User Data" directory
        user_data_dir: PathBuf,
        /// Profile folder name inside it, e.g. `Default`
        profile: String,
    },
}

impl Browser {
    /// Short name used in logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            Browser::Firefox { .. } => "firefox",
            Browser::Chrome { .. } => "chrome",
        }
    }

    /// Check the profile exists and holds a cookie database.
    pub fn setup(&self) -> Result<PathBuf> {
        let db = self.cookie_db().ok_or_else(|| {
            AppError::session(format!(
                "No {} cookie database found under {}",
                self.name(),
                self.profile_dir().display()
            ))
        })?;
        log::info!("Using {} cookies from {}", self.name(), db.display());
        Ok(db)
    }

    /// Read the portal cookies and build a client around them.
    pub fn create_session(&self, config: &Config) -> Result<PortalClient> {
        let host = get_domain(&config.portal.courses_url)
            .ok_or_else(|| AppError::config("portal.courses_url has no host"))?;
        let db = self.setup()?;
        let cookies = self.read_cookies(&db, &host)?;
        if cookies.is_empty() {
            return Err(AppError::session(format!(
                "No cookies for {host} in the {} profile; log in with the browser first",
                self.name()
            )));
        }
        log::info!("Loaded {} session cookies for {}", cookies.len(), host);
        PortalClient::new(config, &cookies)
    }

    fn profile_dir(&self) -> PathBuf {
        match self {
            Browser::Firefox { profile } => profile.clone(),
            Browser::Chrome {
                user_data_dir,
                profile,
            } => user_data_dir.join(profile),
        }
    }

    fn cookie_db(&self) -> Option<PathBuf> {
        let dir = self.profile_dir();
        let candidates = match self {
            Browser::Firefox { .. } => vec![dir.join("cookies.sqlite")],
            Browser::Chrome { .. } => vec![dir.join("Network").join("Cookies"), dir.join("Cookies")],
        };
        candidates.into_iter().find(|p| p.is_file())
    }

    /// Query a private copy of the database; the live one is locked while the browser runs.
    fn read_cookies(&self, db: &Path, host: &str) -> Result<Vec<SessionCookie>> {
        let copy = TempCopy::of(db)?;
        let conn = Connection::open_with_flags(&copy.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let pattern = format!("%{host}");

        match self {
            Browser::Firefox { .. } => {
                let mut stmt =
                    conn.prepare("SELECT name, value FROM moz_cookies WHERE host LIKE ?1")?;
                let rows = stmt.query_map(params![pattern], |row| {
                    Ok(SessionCookie::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            }
            Browser::Chrome { .. } => {
                let mut stmt = conn.prepare(
                    "SELECT name, value, length(encrypted_value) FROM cookies WHERE host_key LIKE ?1",
                )?;
                let rows = stmt.query_map(params![pattern], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<i64>>(2)?.unwrap_or(0),
                    ))
                })?;

                let mut cookies = Vec::new();
                for row in rows {
                    let (name, value, encrypted_len) = row?;
                    if value.is_empty() && encrypted_len > 0 {
                        log::warn!("Skipping encrypted Chrome cookie {name}");
                        continue;
                    }
                    cookies.push(SessionCookie::new(name, value));
                }
                Ok(cookies)
            }
        }
    }
}

/// Copy of a cookie database in the temp directory, removed on drop.
struct TempCopy {
    path: PathBuf,
}

impl TempCopy {
    fn of(source: &Path) -> Result<Self> {
        let path = std::env::temp_dir().join(format!(
            "coursesync-cookies-{}-{}.sqlite",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        std::fs::copy(source, &path).at_path(&path)?;
        Ok(Self { path })
    }
}

impl Drop for TempCopy {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn firefox_profile(tmp: &TempDir) -> Browser {
        let db = tmp.path().join("cookies.sqlite");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch(
            "CREATE TABLE moz_cookies (name TEXT, value TEXT, host TEXT);
             INSERT INTO moz_cookies VALUES ('MoodleSession', 'abc123', 'moodle.iitb.ac.in');
             INSERT INTO moz_cookies VALUES ('other', 'zzz', '.example.com');",
        )
        .unwrap();
        Browser::Firefox {
            profile: tmp.path().to_path_buf(),
        }
    }

    #[test]
    fn test_firefox_cookies_filtered_by_host() {
        let tmp = TempDir::new().unwrap();
        let browser = firefox_profile(&tmp);
        let db = browser.setup().unwrap();
        let cookies = browser.read_cookies(&db, "moodle.iitb.ac.in").unwrap();
        assert_eq!(cookies, vec![SessionCookie::new("MoodleSession", "abc123")]);
    }

    #[test]
    fn test_chrome_encrypted_cookies_skipped() {
        let tmp = TempDir::new().unwrap();
        let profile_dir = tmp.path().join("Default");
        std::fs::create_dir_all(&profile_dir).unwrap();
        let conn = Connection::open(profile_dir.join("Cookies")).unwrap();
        conn.execute_batch(
            "CREATE TABLE cookies (name TEXT, value TEXT, host_key TEXT, encrypted_value BLOB);
             INSERT INTO cookies VALUES ('plain', 'v1', 'moodle.iitb.ac.in', x'');
             INSERT INTO cookies VALUES ('sealed', '', 'moodle.iitb.ac.in', x'763130aabb');",
        )
        .unwrap();
        drop(conn);

        let browser = Browser::Chrome {
            user_data_dir: tmp.path().to_path_buf(),
            profile: "Default".to_string(),
        };
        let db = browser.setup().unwrap();
        let cookies = browser.read_cookies(&db, "moodle.iitb.ac.in").unwrap();
        assert_eq!(cookies, vec![SessionCookie::new("plain", "v1")]);
    }

    #[test]
    fn test_setup_fails_without_database() {
        let tmp = TempDir::new().unwrap();
        let browser = Browser::Firefox {
            profile: tmp.path().join("missing"),
        };
        assert!(matches!(browser.setup(), Err(AppError::Session(_))));
    }

    #[test]
    fn test_session_config_toml() {
        let config: Config = toml::from_str(
            r#"
            [session]
            browser = "chrome"
            user_data_dir = "/home/u/.config/google-chrome"
            profile = "Default"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.session,
            Some(Browser::Chrome {
                user_data_dir: PathBuf::from("/home/u/.config/google-chrome"),
                profile: "Default".to_string(),
            })
        );
    }
}
