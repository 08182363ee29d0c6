use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a profile as returned by the neighbor source.
///
/// The `public_identifier` is the stable, opaque key used for all equality
/// and dedup decisions; the remaining fields are display payload the engine
/// never interprets. Field names mirror the proxy's JSON wire format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub public_identifier: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default, rename = "profilePictureURL")]
    pub profile_picture_url: Option<String>,
}

impl ProfileSummary {
    /// Build a summary carrying only an identifier (display fields unknown)
    pub fn bare(identifier: impl Into<String>) -> Self {
        Self {
            public_identifier: identifier.into(),
            first_name: None,
            last_name: None,
            headline: None,
            profile_picture_url: None,
        }
    }

    /// Full display name, falling back to the identifier when no name fields
    /// are present
    pub fn display_name(&self) -> String {
        let full = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or(""),
        );
        let full = full.trim();
        if full.is_empty() {
            self.public_identifier.clone()
        } else {
            full.to_string()
        }
    }
}

/// A profile the operator accepted, as persisted in the accepted store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AcceptedProfile {
    #[serde(flatten)]
    pub profile: ProfileSummary,
    pub saved_at: DateTime<Utc>,
}
