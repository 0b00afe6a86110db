use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use policy::{Employee, OrgPolicy, Organization, PolicyDataError, PolicyTemplate, PolicyType, PolicyVersion, VersionStatus};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{employees, org_policies, organizations, policy_approvers, policy_templates, policy_versions};

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, PolicyDataError> {
    Uuid::parse_str(raw).map_err(|err| PolicyDataError::GeneralError(format!("corrupt UUID '{raw}' in database: {err}")))
}

fn utc(naive: NaiveDateTime) -> DateTime<Utc> { DateTime::from_naive_utc_and_offset(naive, Utc) }

#[derive(Queryable, Insertable, Selectable)]
#[diesel(table_name = organizations)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub domain_name: Option<String>,
    pub light_logo: Option<String>,
    pub dark_logo: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = PolicyDataError;

    fn try_from(row: OrganizationRow) -> Result<Self, Self::Error> {
        Ok(Organization {
            id: parse_uuid(&row.id)?,
            name: row.name,
            domain_name: row.domain_name,
            light_logo: row.light_logo,
            dark_logo: row.dark_logo,
            status: row.status,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }
}

#[derive(Queryable, Insertable, Selectable)]
#[diesel(table_name = policy_templates)]
pub struct PolicyTemplateRow {
    pub id: String,
    pub title: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub template_html: String,
    pub template_group: Option<String>,
    pub version: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<PolicyTemplateRow> for PolicyTemplate {
    type Error = PolicyDataError;

    fn try_from(row: PolicyTemplateRow) -> Result<Self, Self::Error> {
        Ok(PolicyTemplate {
            id: parse_uuid(&row.id)?,
            title: row.title,
            code: row.code,
            description: row.description,
            template_html: row.template_html,
            template_group: row.template_group,
            version: row.version,
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }
}

#[derive(Queryable, Insertable, Selectable)]
#[diesel(table_name = org_policies)]
pub struct OrgPolicyRow {
    pub id: String,
    pub organization_id: String,
    pub title: String,
    pub policy_type: Option<String>,
    pub current_template_html: String,
    pub department: Option<String>,
    pub category: Option<String>,
    pub workforce_assignments: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<OrgPolicyRow> for OrgPolicy {
    type Error = PolicyDataError;

    fn try_from(row: OrgPolicyRow) -> Result<Self, Self::Error> {
        Ok(OrgPolicy {
            id: parse_uuid(&row.id)?,
            organization_id: parse_uuid(&row.organization_id)?,
            title: row.title,
            policy_type: row.policy_type.as_deref().and_then(PolicyType::from_str_opt),
            current_template_html: row.current_template_html,
            department: row.department,
            category: row.category,
            workforce_assignments: row.workforce_assignments.as_deref().and_then(|raw| serde_json::from_str(raw).ok()),
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }
}

#[derive(Queryable, Insertable, Selectable)]
#[diesel(table_name = policy_versions)]
pub struct PolicyVersionRow {
    pub id: String,
    pub org_policy_id: String,
    pub version: String,
    pub status: String,
    pub is_current: bool,
    pub diff_data: String,
    pub checkpoint_template: Option<String>,
    pub expired_at: Option<NaiveDate>,
    pub published_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<PolicyVersionRow> for PolicyVersion {
    type Error = PolicyDataError;

    fn try_from(row: PolicyVersionRow) -> Result<Self, Self::Error> {
        Ok(PolicyVersion {
            id: parse_uuid(&row.id)?,
            org_policy_id: parse_uuid(&row.org_policy_id)?,
            version: row
                .version
                .parse()
                .map_err(|err| PolicyDataError::GeneralError(format!("corrupt version number in row '{}': {err}", row.id)))?,
            status: VersionStatus::from_str_opt(&row.status)
                .ok_or_else(|| PolicyDataError::GeneralError(format!("corrupt status '{}' in row '{}'", row.status, row.id)))?,
            is_current: row.is_current,
            // A diff_data cell that does not parse must not fail the load; the
            // replay layer logs and skips it.
            diff_data: serde_json::from_str(&row.diff_data).unwrap_or(Value::Null),
            checkpoint_template: row.checkpoint_template,
            expired_at: row.expired_at,
            published_at: row.published_at.map(utc),
            created_at: utc(row.created_at),
            updated_at: utc(row.updated_at),
        })
    }
}

#[derive(Queryable, Insertable, Selectable)]
#[diesel(table_name = employees)]
pub struct EmployeeRow {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = PolicyDataError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        Ok(Employee { id: parse_uuid(&row.id)?, name: row.name, email: row.email })
    }
}

#[derive(Queryable, Insertable, Selectable)]
#[diesel(table_name = policy_approvers)]
pub struct PolicyApproverRow {
    pub id: String,
    pub policy_version_id: String,
    pub approver_id: String,
    pub condition: Option<String>,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
