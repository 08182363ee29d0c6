use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tokens are treated as expired this many seconds before their stated
/// expiry, so a request never goes out with a token about to lapse.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Credential session as persisted by the login tooling.
///
/// Token acquisition and refresh are out of scope here; this module only
/// answers "is there a usable credential right now".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) after which the access token is invalid.
    /// Absent means the token is treated as non-expiring.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl StoredSession {
    /// Whether the access token is still usable, with the early-expiry margin
    pub fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expires_at {
            Some(at) => at > Utc::now().timestamp() + EXPIRY_MARGIN_SECS,
            None => true,
        }
    }
}

/// Coarse credential contract consulted by the engine at session start
pub trait CredentialProvider: Send + Sync {
    fn has_valid_credential(&self) -> bool;

    /// Current access token, if a valid one is available
    fn access_token(&self) -> Option<String>;
}

/// Credential provider backed by a session file on disk.
///
/// The file is re-read on every call so a login performed by external
/// tooling while the process is running is picked up without a restart.
pub struct FileCredentials {
    path: PathBuf,
}

impl FileCredentials {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn load(&self) -> Option<StoredSession> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<StoredSession>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                log::warn!("Ignoring malformed session file {}: {}", self.path.display(), e);
                None
            }
        }
    }
}

impl CredentialProvider for FileCredentials {
    fn has_valid_credential(&self) -> bool {
        self.load().map(|s| s.is_valid()).unwrap_or(false)
    }

    fn access_token(&self) -> Option<String> {
        self.load().filter(|s| s.is_valid()).map(|s| s.access_token)
    }
}

/// Fixed-token provider, for environments where the token is supplied
/// directly (e.g. an environment variable) rather than via a session file
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl CredentialProvider for StaticCredentials {
    fn has_valid_credential(&self) -> bool {
        self.token.as_deref().map(|t| !t.is_empty()).unwrap_or(false)
    }

    fn access_token(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.is_empty())
    }
}

/// Best-effort extraction of the subject email from a JWT access token,
/// for operator-facing display only. Returns None for opaque tokens.
pub fn subject_email(token: &str) -> Option<String> {
    let payload = token.split('.').nth(1)?;
    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&decoded).ok()?;
    claims
        .get("email")
        .or_else(|| claims.get("user_email"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_session(dir: &TempDir, session: &StoredSession) -> PathBuf {
        let path = dir.path().join("session.json");
        fs::write(&path, serde_json::to_string(session).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_valid_session() {
        let dir = TempDir::new().unwrap();
        let path = write_session(
            &dir,
            &StoredSession {
                access_token: "tok".to_string(),
                refresh_token: None,
                expires_at: Some(Utc::now().timestamp() + 3600),
                token_type: Some("bearer".to_string()),
            },
        );
        let creds = FileCredentials::new(&path);
        assert!(creds.has_valid_credential());
        assert_eq!(creds.access_token().as_deref(), Some("tok"));
    }

    #[test]
    fn test_expired_session() {
        let dir = TempDir::new().unwrap();
        let path = write_session(
            &dir,
            &StoredSession {
                access_token: "tok".to_string(),
                refresh_token: None,
                expires_at: Some(Utc::now().timestamp() - 10),
                token_type: None,
            },
        );
        let creds = FileCredentials::new(&path);
        assert!(!creds.has_valid_credential());
        assert!(creds.access_token().is_none());
    }

    #[test]
    fn test_session_within_expiry_margin_is_invalid() {
        // Expires in 10 seconds: inside the 30-second margin, so unusable
        let session = StoredSession {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 10),
            token_type: None,
        };
        assert!(!session.is_valid());
    }

    #[test]
    fn test_session_without_expiry_is_valid() {
        let session = StoredSession {
            access_token: "tok".to_string(),
            refresh_token: None,
            expires_at: None,
            token_type: None,
        };
        assert!(session.is_valid());
    }

    #[test]
    fn test_missing_session_file() {
        let dir = TempDir::new().unwrap();
        let creds = FileCredentials::new(dir.path().join("absent.json"));
        assert!(!creds.has_valid_credential());
    }

    #[test]
    fn test_malformed_session_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();
        let creds = FileCredentials::new(&path);
        assert!(!creds.has_valid_credential());
    }

    #[test]
    fn test_static_credentials() {
        assert!(StaticCredentials::new(Some("tok".to_string())).has_valid_credential());
        assert!(!StaticCredentials::new(Some(String::new())).has_valid_credential());
        assert!(!StaticCredentials::new(None).has_valid_credential());
    }

    #[test]
    fn test_subject_email_from_jwt() {
        // Header/signature contents are irrelevant; only the payload is read
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(r#"{"email":"op@example.com"}"#);
        let token = format!("x.{}.y", payload);
        assert_eq!(subject_email(&token).as_deref(), Some("op@example.com"));
    }

    #[test]
    fn test_subject_email_opaque_token() {
        assert!(subject_email("not-a-jwt").is_none());
    }
}
