//  LIB.rs
//    by Lut99
//
//  Created:
//    18 Apr 2024, 09:14:26
//  Last edited:
//    07 May 2024, 11:48:32
//  Auto updated?
//    Yes
//
//  Description:
//!   The version lifecycle controller. Orchestrates policy initialisation,
//!   version creation and updates (version-number assignment, checkpoint
//!   placement, delta computation, approver binding), reads and PDF export.
//

use std::sync::Arc;

use chrono::Utc;
use generator::{GenerationSpec, GeneratorConnector, GeneratorError};
use history::HistoryError;
use log::{debug, info};
use policy::{
    CommittedVersion, OrgPolicyDefaults, PolicyDataError, PolicyStore, PolicyType, VersionNumber, VersionPlan, VersionStatus,
};
use render::{PdfRenderer, RenderError};
use serde_json::{json, Value};
use uuid::Uuid;

mod ops;
mod rules;

pub use ops::{
    CreateInitialRequest, CreatedVersion, DownloadRequest, InitialiseRequest, Initialised, PdfExport, PolicyDocument, ReadRequest,
    TransitionRequest, Transitioned, UpdateRequest, UpdatedVersion,
};
pub(crate) use rules::assign_version;


/***** ERRORS *****/
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("Organization not found")]
    OrganizationNotFound(Uuid),
    #[error("Policy template not found")]
    TemplateNotFound(Uuid),
    #[error("OrgPolicy not found")]
    PolicyNotFound(Uuid),
    #[error("No versions found for this policy")]
    NoVersions,
    #[error("Version {0} not found for this policy")]
    VersionNotFound(String),
    #[error("Approver not found")]
    ApproverNotFound(Uuid),
    #[error("AI policy generation failed: {0}")]
    Generator(#[from] GeneratorError),
    #[error("Failed to generate PDF: {0}")]
    Render(#[from] RenderError),
    #[error("Internal server error: {0}")]
    Storage(PolicyDataError),
}

impl warp::reject::Reject for LifecycleError {}

/// Lifts a store error, turning the store's anonymous `NotFound` into the
/// entity-specific variant of the call site.
fn lift(err: PolicyDataError, not_found: LifecycleError) -> LifecycleError {
    match err {
        PolicyDataError::NotFound => not_found,
        PolicyDataError::ApproverNotFound(id) => LifecycleError::ApproverNotFound(id),
        PolicyDataError::Invalid(msg) => LifecycleError::Validation(msg),
        other => LifecycleError::Storage(other),
    }
}


/***** LIBRARY *****/
/// The controller. Generic over its collaborators so tests can swap the
/// store, the generator and the renderer independently.
pub struct Lifecycle<S, G, R> {
    store: Arc<S>,
    generator: Arc<G>,
    renderer: Arc<R>,
    /// The "powered by" logo embedded in every exported PDF.
    parent_logo_url: String,
}

impl<S, G, R> Clone for Lifecycle<S, G, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            generator: self.generator.clone(),
            renderer: self.renderer.clone(),
            parent_logo_url: self.parent_logo_url.clone(),
        }
    }
}

impl<S, G, R> Lifecycle<S, G, R>
where
    S: PolicyStore + Send + Sync,
    G: GeneratorConnector + Send + Sync,
    R: PdfRenderer + Send + Sync,
{
    pub fn new(store: Arc<S>, generator: Arc<G>, renderer: Arc<R>, parent_logo_url: impl Into<String>) -> Self {
        Self { store, generator, renderer, parent_logo_url: parent_logo_url.into() }
    }

    /// Initialises (or refreshes) a policy from a template: asks the external
    /// generator for a starter document and upserts the OrgPolicy row. Does
    /// NOT create a version; that is [`Self::create_initial`]'s job. A
    /// generator failure aborts before anything is written.
    pub async fn initialise(&self, req: InitialiseRequest) -> Result<Initialised, LifecycleError> {
        let organization =
            self.store.get_organization(req.organization_id).await.map_err(|e| lift(e, LifecycleError::OrganizationNotFound(req.organization_id)))?;
        let template = self
            .store
            .get_policy_template(req.policy_template_id)
            .await
            .map_err(|e| lift(e, LifecycleError::TemplateNotFound(req.policy_template_id)))?;
        if template.title.trim().is_empty() {
            return Err(LifecycleError::Validation("Policy template title is required but missing or empty".into()));
        }

        let spec = GenerationSpec {
            template_html: template.template_html.clone(),
            template_title: template.title.clone(),
            department: req.department.clone(),
            category: req.category.clone(),
            organization_name: organization.name.clone(),
        };
        let html = self.generator.generate(&spec).await?;

        let workforce_assignment = req.workforce_assignment.unwrap_or_default();
        let defaults = OrgPolicyDefaults {
            policy_type: PolicyType::ExistingPolicy,
            current_template_html: html,
            department: req.department,
            category: req.category,
            workforce_assignments: json!({ "assignments": workforce_assignment }),
        };
        let (org_policy, created) = self
            .store
            .upsert_org_policy(req.organization_id, template.title.clone(), defaults)
            .await
            .map_err(|e| lift(e, LifecycleError::OrganizationNotFound(req.organization_id)))?;

        info!("Initialised policy '{}' for organization {} (created: {created})", template.title, req.organization_id);
        Ok(Initialised {
            org_policy_id: org_policy.id,
            created,
            title: template.title,
            version: req.version.unwrap_or_else(|| "1".into()),
            workforce_assignment,
        })
    }

    /// Creates the first version of an initialised policy: a full-text
    /// checkpoint at position 1, numbered `1.0`, with a delta from the empty
    /// document so the replay convention holds from the very start.
    pub async fn create_initial(&self, req: CreateInitialRequest) -> Result<CreatedVersion, LifecycleError> {
        let org_policy = self.store.get_org_policy(req.org_policy_id).await.map_err(|e| lift(e, LifecycleError::PolicyNotFound(req.org_policy_id)))?;
        if let Some(approver) = req.approver_id {
            if !self.store.employee_exists(approver).await.map_err(LifecycleError::Storage)? {
                return Err(LifecycleError::ApproverNotFound(approver));
            }
        }

        let provided = req.html_content.is_some();
        let html = req.html_content.unwrap_or(org_policy.current_template_html);
        let expired_at = req.expired_at;
        let approver_id = req.approver_id;
        let html_for_plan = html.clone();
        let committed = self
            .store
            .append_version(req.org_policy_id, move |versions| {
                if !versions.is_empty() {
                    return Err(PolicyDataError::Invalid("Policy already has versions; use update instead".into()));
                }
                let delta = linediff::compute("", &html_for_plan);
                Ok(VersionPlan {
                    version: VersionNumber::new(1, 0),
                    new_html: html_for_plan.clone(),
                    diff_data: delta.to_value(),
                    checkpoint_template: Some(html_for_plan),
                    status: VersionStatus::Draft,
                    expired_at,
                    approver_id,
                    workforce_assignments: None,
                })
            })
            .await
            .map_err(|e| lift(e, LifecycleError::PolicyNotFound(req.org_policy_id)))?;

        info!("Created initial version 1.0 for policy {} (checkpoint)", req.org_policy_id);
        Ok(CreatedVersion {
            org_policy_id: req.org_policy_id,
            policy_version_id: committed.version.id,
            version: committed.version.version.to_string(),
            checkpoint_source: if provided { "provided_html" } else { "org_policy_template" },
            changes_count: changes_count(&committed),
            approver_id: req.approver_id,
        })
    }

    /// Appends a new version holding the delta from its predecessor.
    ///
    /// Version assignment, the expiry-triggered major bump, checkpoint
    /// placement and the base reconstruction all happen inside the store's
    /// write transaction, so two concurrent updates of the same policy cannot
    /// observe the same position or produce duplicate version numbers.
    pub async fn update(&self, req: UpdateRequest) -> Result<UpdatedVersion, LifecycleError> {
        if req.html_content.is_empty() {
            return Err(LifecycleError::Validation("html_content is required".into()));
        }
        self.store.get_org_policy(req.org_policy_id).await.map_err(|e| lift(e, LifecycleError::PolicyNotFound(req.org_policy_id)))?;
        if !self.store.employee_exists(req.approver_id).await.map_err(LifecycleError::Storage)? {
            return Err(LifecycleError::ApproverNotFound(req.approver_id));
        }

        let new_html = req.html_content;
        let provided_version = req.version;
        let expired_at = req.expired_at;
        let approver_id = req.approver_id;
        let workforce_assignment = req.workforce_assignment;
        let today = Utc::now().date_naive();
        let committed = self
            .store
            .append_version(req.org_policy_id, move |versions| {
                let position = versions.len() + 1;
                let assigned = assign_version(provided_version.as_deref(), versions.last(), today);
                if versions.iter().any(|v| v.version == assigned) {
                    return Err(PolicyDataError::Invalid(format!("Version {assigned} already exists for this policy")));
                }

                // The delta is stored against the immediate predecessor, which
                // is exactly what a forward replay reapplies.
                let old_html = match history::reconstruct(versions, None) {
                    Ok(rec) => rec.html,
                    Err(HistoryError::NoVersions) => String::new(),
                    Err(err) => return Err(PolicyDataError::GeneralError(err.to_string())),
                };
                let delta = linediff::compute(&old_html, &new_html);
                debug!("Computed delta with {} change(s) for position {position}", delta.changes.len());

                let is_checkpoint = history::checkpoint_due(position);
                Ok(VersionPlan {
                    version: assigned,
                    new_html: new_html.clone(),
                    diff_data: delta.to_value(),
                    checkpoint_template: is_checkpoint.then(|| new_html.clone()),
                    status: VersionStatus::Draft,
                    expired_at,
                    approver_id: Some(approver_id),
                    workforce_assignments: Some(json!({ "assignments": workforce_assignment })),
                })
            })
            .await
            .map_err(|e| lift(e, LifecycleError::PolicyNotFound(req.org_policy_id)))?;

        info!(
            "Appended version {} at position {} for policy {}{}",
            committed.version.version,
            committed.position,
            req.org_policy_id,
            if committed.version.is_checkpoint() { " (checkpoint)" } else { "" },
        );
        Ok(UpdatedVersion {
            org_policy_id: req.org_policy_id,
            policy_version_id: committed.version.id,
            version: committed.version.version.to_string(),
            position: committed.position,
            is_checkpoint: committed.version.is_checkpoint(),
            checkpoint_saved: committed.version.is_checkpoint(),
            changes_count: changes_count(&committed),
        })
    }

    /// Reconstructs the HTML of one version (the newest when unspecified) and
    /// returns it with the version's metadata.
    pub async fn read(&self, req: ReadRequest) -> Result<PolicyDocument, LifecycleError> {
        let org_policy = self.store.get_org_policy(req.org_policy_id).await.map_err(|e| lift(e, LifecycleError::PolicyNotFound(req.org_policy_id)))?;
        let versions = self.store.list_versions(req.org_policy_id).await.map_err(LifecycleError::Storage)?;

        let target = match &req.version {
            Some(raw) => {
                Some(VersionNumber::parse_loose(raw).ok_or_else(|| LifecycleError::Validation(format!("Invalid version format: '{raw}'")))?)
            },
            None => None,
        };
        let rec = history::reconstruct(&versions, target).map_err(|err| match err {
            HistoryError::NoVersions => LifecycleError::NoVersions,
            HistoryError::VersionNotFound(v) => LifecycleError::VersionNotFound(v),
        })?;
        let row = versions
            .iter()
            .find(|v| v.version == rec.version)
            .ok_or_else(|| LifecycleError::Storage(PolicyDataError::GeneralError("reconstructed version disappeared from history".into())))?;

        Ok(PolicyDocument {
            org_policy_id: org_policy.id,
            organization_id: req.organization_id,
            title: org_policy.title,
            version: rec.version.to_string(),
            html: rec.html,
            status: row.status,
            created_at: row.created_at,
            reconstruction_method: rec.method.as_str(),
        })
    }

    /// As [`Self::read`], but wraps the document in the branded header and
    /// hands it to the PDF converter.
    pub async fn download(&self, req: DownloadRequest) -> Result<PdfExport, LifecycleError> {
        let organization_logo = match self.store.get_organization(req.organization_id).await {
            Ok(org) => org.export_logo(),
            // An unknown organization still gets its document, just unbranded.
            Err(PolicyDataError::NotFound) => String::new(),
            Err(err) => return Err(LifecycleError::Storage(err)),
        };

        let document = self
            .read(ReadRequest { org_policy_id: req.org_policy_id, version: Some(req.version), organization_id: Some(req.organization_id) })
            .await?;

        let wrapped = render::wrap_branded(&document.html, &organization_logo, &self.parent_logo_url);
        let pdf = self.renderer.render(&wrapped).await?;
        info!("Rendered version {} of policy {} to {} PDF bytes", document.version, req.org_policy_id, pdf.len());

        Ok(PdfExport {
            org_policy_id: req.org_policy_id,
            organization_id: req.organization_id,
            title: document.title,
            version: document.version,
            status: document.status,
            created_at: document.created_at,
            pdf,
        })
    }

    /// Drives the status state machine for one version. Publishing moves the
    /// `is_current` marker atomically.
    pub async fn transition(&self, req: TransitionRequest) -> Result<Transitioned, LifecycleError> {
        self.store.get_org_policy(req.org_policy_id).await.map_err(|e| lift(e, LifecycleError::PolicyNotFound(req.org_policy_id)))?;
        let target = VersionNumber::parse_loose(&req.version)
            .ok_or_else(|| LifecycleError::Validation(format!("Invalid version format: '{}'", req.version)))?;
        let updated = self
            .store
            .set_version_status(req.org_policy_id, target, req.status)
            .await
            .map_err(|e| lift(e, LifecycleError::VersionNotFound(target.to_string())))?;

        info!("Version {} of policy {} is now {}", updated.version, req.org_policy_id, updated.status.as_str());
        Ok(Transitioned {
            org_policy_id: req.org_policy_id,
            version: updated.version.to_string(),
            status: updated.status,
            is_current: updated.is_current,
            published_at: updated.published_at,
        })
    }
}

/// Number of change records a committed version's delta carries.
fn changes_count(committed: &CommittedVersion) -> usize {
    committed.version.diff_data.get("changes").and_then(Value::as_array).map(Vec::len).unwrap_or(0)
}
