use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::version::VersionNumber;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PolicyType {
    OrgPolicy,
    ExistingPolicy,
}

impl PolicyType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OrgPolicy => "orgpolicy",
            Self::ExistingPolicy => "existingpolicy",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "orgpolicy" => Some(Self::OrgPolicy),
            "existingpolicy" => Some(Self::ExistingPolicy),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    InReview,
    Published,
    Archived,
}

impl VersionStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "in_review" => Some(Self::InReview),
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Legal moves of the version state machine. Staying put is always allowed so
/// retried transitions are idempotent.
pub fn transition_allowed(from: VersionStatus, to: VersionStatus) -> bool {
    use VersionStatus::*;
    matches!((from, to), (Draft, InReview) | (InReview, Published) | (Published, Archived) | (Draft, Archived)) || from == to
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub domain_name: Option<String>,
    pub light_logo: Option<String>,
    pub dark_logo: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    /// The logo shown on exported documents: light logo, then dark logo, then
    /// the organization name as a last resort.
    pub fn export_logo(&self) -> String {
        self.light_logo.clone().or_else(|| self.dark_logo.clone()).unwrap_or_else(|| self.name.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PolicyTemplate {
    pub id: Uuid,
    pub title: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub template_html: String,
    pub template_group: Option<String>,
    pub version: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OrgPolicy {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub policy_type: Option<PolicyType>,
    /// Always mirrors the HTML of the most recently committed version.
    pub current_template_html: String,
    pub department: Option<String>,
    pub category: Option<String>,
    pub workforce_assignments: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OrgPolicyDefaults {
    pub policy_type: PolicyType,
    pub current_template_html: String,
    pub department: Option<String>,
    pub category: Option<String>,
    pub workforce_assignments: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PolicyVersion {
    pub id: Uuid,
    pub org_policy_id: Uuid,
    pub version: VersionNumber,
    pub status: VersionStatus,
    pub is_current: bool,
    /// The stored delta, parsed leniently: a row whose `diff_data` does not
    /// parse surfaces here as `Value::Null` rather than failing the load.
    pub diff_data: Value,
    pub checkpoint_template: Option<String>,
    pub expired_at: Option<NaiveDate>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyVersion {
    pub const fn is_checkpoint(&self) -> bool { self.checkpoint_template.is_some() }
}

/// A freshly appended version together with its 1-based position in the
/// policy's history.
#[derive(Debug, Clone)]
pub struct CommittedVersion {
    pub version: PolicyVersion,
    pub position: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for status in [VersionStatus::Draft, VersionStatus::InReview, VersionStatus::Published, VersionStatus::Archived] {
            assert_eq!(VersionStatus::from_str_opt(status.as_str()), Some(status));
        }
        assert_eq!(VersionStatus::from_str_opt("unknown"), None);
    }

    #[test]
    fn state_machine_edges() {
        use VersionStatus::*;
        assert!(transition_allowed(Draft, InReview));
        assert!(transition_allowed(InReview, Published));
        assert!(transition_allowed(Published, Archived));
        assert!(transition_allowed(Draft, Archived));
        // Idempotent retries
        assert!(transition_allowed(Published, Published));
        assert!(transition_allowed(Archived, Archived));
        // Illegal jumps
        assert!(!transition_allowed(Draft, Published));
        assert!(!transition_allowed(Archived, Draft));
        assert!(!transition_allowed(Published, InReview));
        assert!(!transition_allowed(InReview, Archived));
    }

    #[test]
    fn export_logo_fallback_chain() {
        let mut org = Organization {
            id: Uuid::new_v4(),
            name: "Acme".into(),
            domain_name: None,
            light_logo: Some("light.png".into()),
            dark_logo: Some("dark.png".into()),
            status: "active".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(org.export_logo(), "light.png");
        org.light_logo = None;
        assert_eq!(org.export_logo(), "dark.png");
        org.dark_logo = None;
        assert_eq!(org.export_logo(), "Acme");
    }
}
