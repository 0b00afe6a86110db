use serde_json::Value;
use uuid::Uuid;

pub mod model;
pub mod version;

pub use model::{
    CommittedVersion, Employee, OrgPolicy, OrgPolicyDefaults, Organization, PolicyTemplate, PolicyType, PolicyVersion, VersionStatus,
    transition_allowed,
};
pub use version::VersionNumber;

#[derive(Debug, thiserror::Error)]
pub enum PolicyDataError {
    #[error("PolicyData error: Item not found")]
    NotFound,
    #[error("Approver '{0}' not found")]
    ApproverNotFound(Uuid),
    #[error("PolicyData invalid request: {0}")]
    Invalid(String),
    #[error("PolicyData general error: {0}")]
    GeneralError(String),
}

impl warp::reject::Reject for PolicyDataError {}

/// Everything the store has to do to commit one new version. Built by the
/// lifecycle controller's planner while the store holds the policy's write
/// lock, then executed inside the same transaction.
#[derive(Debug, Clone)]
pub struct VersionPlan {
    pub version: VersionNumber,
    /// Full HTML of the new version, mirrored onto `OrgPolicy.current_template_html`.
    pub new_html: String,
    pub diff_data: Value,
    pub checkpoint_template: Option<String>,
    pub status: VersionStatus,
    pub expired_at: Option<chrono::NaiveDate>,
    pub approver_id: Option<Uuid>,
    /// `Some` replaces the policy's workforce assignments wholesale.
    pub workforce_assignments: Option<Value>,
}

#[async_trait::async_trait]
pub trait PolicyStore {
    async fn get_organization(&self, id: Uuid) -> Result<Organization, PolicyDataError>;
    async fn get_policy_template(&self, id: Uuid) -> Result<PolicyTemplate, PolicyDataError>;
    async fn get_org_policy(&self, id: Uuid) -> Result<OrgPolicy, PolicyDataError>;
    async fn employee_exists(&self, id: Uuid) -> Result<bool, PolicyDataError>;

    /// Finds or creates the policy row for `(organization_id, title)`,
    /// overwriting the content fields when the row already exists. Concurrent
    /// calls for the same pair are serialized; exactly one of them observes
    /// `created == true`.
    async fn upsert_org_policy(
        &self,
        organization_id: Uuid,
        title: String,
        defaults: OrgPolicyDefaults,
    ) -> Result<(OrgPolicy, bool), PolicyDataError>;

    /// The full version sequence of a policy, ordered by creation time ascending.
    async fn list_versions(&self, org_policy_id: Uuid) -> Result<Vec<PolicyVersion>, PolicyDataError>;

    /// Appends one version under the policy's write lock.
    ///
    /// The store opens a write transaction, reads the ordered version
    /// sequence inside it and hands it to `planner`; the returned
    /// [`VersionPlan`] is committed in the same transaction (version row,
    /// `current_template_html` mirror, optional workforce assignment update,
    /// optional approver binding). Because the snapshot and the insert share
    /// the lock, version counting and number generation cannot race. A
    /// planner error, an unknown approver or any constraint violation rolls
    /// the whole append back.
    async fn append_version<F>(&self, org_policy_id: Uuid, planner: F) -> Result<CommittedVersion, PolicyDataError>
    where
        F: 'static + Send + FnOnce(&[PolicyVersion]) -> Result<VersionPlan, PolicyDataError>;

    /// Drives the version state machine. Publishing clears `is_current` on
    /// the previously current version of the same policy and stamps
    /// `published_at`, all in one transaction.
    async fn set_version_status(
        &self,
        org_policy_id: Uuid,
        version: VersionNumber,
        status: VersionStatus,
    ) -> Result<PolicyVersion, PolicyDataError>;
}
