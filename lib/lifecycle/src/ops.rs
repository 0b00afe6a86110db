use chrono::{DateTime, NaiveDate, Utc};
use policy::VersionStatus;
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct InitialiseRequest {
    pub organization_id: Uuid,
    pub policy_template_id: Uuid,
    pub department: Option<String>,
    pub category: Option<String>,
    pub workforce_assignment: Option<Vec<Value>>,
    pub version: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Initialised {
    pub org_policy_id: Uuid,
    pub created: bool,
    pub title: String,
    pub version: String,
    pub workforce_assignment: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct CreateInitialRequest {
    pub org_policy_id: Uuid,
    pub html_content: Option<String>,
    pub approver_id: Option<Uuid>,
    pub expired_at: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct CreatedVersion {
    pub org_policy_id: Uuid,
    pub policy_version_id: Uuid,
    pub version: String,
    /// Where the checkpoint text came from: `"provided_html"` or
    /// `"org_policy_template"`.
    pub checkpoint_source: &'static str,
    pub changes_count: usize,
    pub approver_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct UpdateRequest {
    pub org_policy_id: Uuid,
    pub organization_id: Uuid,
    pub html_content: String,
    pub workforce_assignment: Vec<Value>,
    pub approver_id: Uuid,
    pub version: Option<String>,
    pub expired_at: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct UpdatedVersion {
    pub org_policy_id: Uuid,
    pub policy_version_id: Uuid,
    pub version: String,
    pub position: usize,
    pub is_checkpoint: bool,
    pub checkpoint_saved: bool,
    pub changes_count: usize,
}

#[derive(Debug, Clone)]
pub struct ReadRequest {
    pub org_policy_id: Uuid,
    pub version: Option<String>,
    pub organization_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PolicyDocument {
    pub org_policy_id: Uuid,
    pub organization_id: Option<Uuid>,
    pub title: String,
    pub version: String,
    pub html: String,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
    pub reconstruction_method: &'static str,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub org_policy_id: Uuid,
    pub organization_id: Uuid,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct PdfExport {
    pub org_policy_id: Uuid,
    pub organization_id: Uuid,
    pub title: String,
    pub version: String,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
    pub pdf: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub org_policy_id: Uuid,
    pub version: String,
    pub status: VersionStatus,
}

#[derive(Debug, Clone)]
pub struct Transitioned {
    pub org_policy_id: Uuid,
    pub version: String,
    pub status: VersionStatus,
    pub is_current: bool,
    pub published_at: Option<DateTime<Utc>>,
}
