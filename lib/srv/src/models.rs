use chrono::NaiveDate;
use lifecycle::{
    CreateInitialRequest, DownloadRequest, InitialiseRequest, LifecycleError, ReadRequest, TransitionRequest, UpdateRequest,
};
use policy::VersionStatus;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

/// Parses a required UUID field, naming the field in the error like the rest
/// of the API does.
fn required_uuid(value: Option<&str>, field: &str) -> Result<Uuid, LifecycleError> {
    match value {
        Some(raw) if !raw.is_empty() => Uuid::parse_str(raw).map_err(|_| LifecycleError::Validation(format!("Invalid {field} format"))),
        _ => Err(LifecycleError::Validation(format!("{field} is required"))),
    }
}

fn optional_uuid(value: Option<&str>, field: &str) -> Result<Option<Uuid>, LifecycleError> {
    match value {
        Some(raw) if !raw.is_empty() => {
            Uuid::parse_str(raw).map(Some).map_err(|_| LifecycleError::Validation(format!("Invalid {field} format")))
        },
        _ => Ok(None),
    }
}

#[derive(Deserialize)]
pub struct InitialisePostModel {
    pub organization_id: Option<String>,
    pub policy_template_id: Option<String>,
    pub department: Option<String>,
    pub category: Option<String>,
    pub workforce_assignment: Option<Vec<Value>>,
    pub version: Option<String>,
}

impl InitialisePostModel {
    pub fn to_domain(self) -> Result<InitialiseRequest, LifecycleError> {
        Ok(InitialiseRequest {
            organization_id: required_uuid(self.organization_id.as_deref(), "organization_id")?,
            policy_template_id: required_uuid(self.policy_template_id.as_deref(), "policy_template_id")?,
            department: self.department,
            category: self.category,
            workforce_assignment: self.workforce_assignment,
            version: self.version,
        })
    }
}

#[derive(Deserialize)]
pub struct CreateInitialisedPostModel {
    pub org_policy_id: Option<String>,
    pub html_content: Option<String>,
    pub approver: Option<String>,
    pub expired_at: Option<NaiveDate>,
}

impl CreateInitialisedPostModel {
    pub fn to_domain(self) -> Result<CreateInitialRequest, LifecycleError> {
        Ok(CreateInitialRequest {
            org_policy_id: required_uuid(self.org_policy_id.as_deref(), "org_policy_id")?,
            html_content: self.html_content,
            approver_id: optional_uuid(self.approver.as_deref(), "approver")?,
            expired_at: self.expired_at,
        })
    }
}

#[derive(Deserialize)]
pub struct UpdatePostModel {
    pub org_policy_id: Option<String>,
    pub organization_id: Option<String>,
    pub html_content: Option<String>,
    pub workforce_assignment: Option<Vec<Value>>,
    pub approver: Option<String>,
    pub version: Option<String>,
    pub expired_at: Option<NaiveDate>,
}

impl UpdatePostModel {
    pub fn to_domain(self) -> Result<UpdateRequest, LifecycleError> {
        let html_content = match self.html_content {
            Some(html) if !html.is_empty() => html,
            _ => return Err(LifecycleError::Validation("html_content is required".into())),
        };
        let workforce_assignment =
            self.workforce_assignment.ok_or_else(|| LifecycleError::Validation("workforce_assignment is required".into()))?;
        Ok(UpdateRequest {
            org_policy_id: required_uuid(self.org_policy_id.as_deref(), "org_policy_id")?,
            organization_id: required_uuid(self.organization_id.as_deref(), "organization_id")?,
            html_content,
            workforce_assignment,
            approver_id: required_uuid(self.approver.as_deref(), "approver")?,
            version: self.version,
            expired_at: self.expired_at,
        })
    }
}

#[derive(Deserialize)]
pub struct DataPostModel {
    pub org_policy_id: Option<String>,
    pub version: Option<String>,
    pub organization_id: Option<String>,
}

impl DataPostModel {
    pub fn to_domain(self) -> Result<ReadRequest, LifecycleError> {
        Ok(ReadRequest {
            org_policy_id: required_uuid(self.org_policy_id.as_deref(), "org_policy_id")?,
            version: self.version,
            organization_id: optional_uuid(self.organization_id.as_deref(), "organization_id")?,
        })
    }
}

#[derive(Deserialize)]
pub struct DownloadPostModel {
    pub org_policy_id: Option<String>,
    pub version: Option<String>,
    pub organization_id: Option<String>,
}

impl DownloadPostModel {
    pub fn to_domain(self) -> Result<DownloadRequest, LifecycleError> {
        let version = match self.version {
            Some(version) if !version.is_empty() => version,
            _ => return Err(LifecycleError::Validation("version is required".into())),
        };
        Ok(DownloadRequest {
            org_policy_id: required_uuid(self.org_policy_id.as_deref(), "org_policy_id")?,
            organization_id: required_uuid(self.organization_id.as_deref(), "organization_id")?,
            version,
        })
    }
}

#[derive(Deserialize)]
pub struct StatusPostModel {
    pub org_policy_id: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
}

impl StatusPostModel {
    pub fn to_domain(self) -> Result<TransitionRequest, LifecycleError> {
        let version = match self.version {
            Some(version) if !version.is_empty() => version,
            _ => return Err(LifecycleError::Validation("version is required".into())),
        };
        let status = self
            .status
            .as_deref()
            .and_then(VersionStatus::from_str_opt)
            .ok_or_else(|| LifecycleError::Validation("status must be one of draft, in_review, published, archived".into()))?;
        Ok(TransitionRequest { org_policy_id: required_uuid(self.org_policy_id.as_deref(), "org_policy_id")?, version, status })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_model_names_missing_fields() {
        let model = UpdatePostModel {
            org_policy_id: Some(Uuid::nil().to_string()),
            organization_id: Some(Uuid::nil().to_string()),
            html_content: None,
            workforce_assignment: Some(vec![]),
            approver: Some(Uuid::nil().to_string()),
            version: None,
            expired_at: None,
        };
        match model.to_domain() {
            Err(LifecycleError::Validation(msg)) => assert_eq!(msg, "html_content is required"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn bad_uuids_are_named() {
        let model = DataPostModel { org_policy_id: Some("not-a-uuid".into()), version: None, organization_id: None };
        match model.to_domain() {
            Err(LifecycleError::Validation(msg)) => assert_eq!(msg, "Invalid org_policy_id format"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
