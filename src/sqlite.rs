use chrono::Utc;
use diesel::connection::SimpleConnection as _;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sqlite::SqliteConnection;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, RunQueryDsl, SelectableHelper};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use policy::{
    transition_allowed, CommittedVersion, OrgPolicy, OrgPolicyDefaults, Organization, PolicyDataError, PolicyStore, PolicyTemplate,
    PolicyVersion, VersionNumber, VersionPlan, VersionStatus,
};
use uuid::Uuid;

use crate::models::{OrgPolicyRow, OrganizationRow, PolicyApproverRow, PolicyTemplateRow, PolicyVersionRow};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Sets the pragmas every pooled connection needs: a busy timeout so
/// serialized writers wait for the RESERVED lock instead of erroring, WAL so
/// readers never block behind them, and enforced foreign keys.
#[derive(Debug)]
struct ConnectionTuning;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionTuning {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Failures inside a write transaction: either the database said no, or the
/// domain did.
enum TxError {
    Db(DieselError),
    Data(PolicyDataError),
}

impl From<DieselError> for TxError {
    fn from(err: DieselError) -> Self { Self::Db(err) }
}

impl From<TxError> for PolicyDataError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Db(DieselError::NotFound) => PolicyDataError::NotFound,
            TxError::Db(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info)) => {
                PolicyDataError::Invalid(format!("uniqueness violated: {}", info.message()))
            },
            TxError::Db(err) => PolicyDataError::GeneralError(err.to_string()),
            TxError::Data(err) => err,
        }
    }
}

pub struct SqlitePolicyStore {
    pool: Pool<ConnectionManager<SqliteConnection>>,
}

impl SqlitePolicyStore {
    /// Builds the pool and brings the schema up to date.
    pub fn new(database_url: &str) -> Result<Self, PolicyDataError> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .test_on_check_out(true)
            .connection_customizer(Box::new(ConnectionTuning))
            .build(manager)
            .map_err(|err| PolicyDataError::GeneralError(format!("Could not build connection pool: {err}")))?;

        let mut conn = pool.get().map_err(|err| PolicyDataError::GeneralError(err.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS).map_err(|err| PolicyDataError::GeneralError(format!("Could not run migrations: {err}")))?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<diesel::r2d2::PooledConnection<ConnectionManager<SqliteConnection>>, PolicyDataError> {
        self.pool.get().map_err(|err| PolicyDataError::GeneralError(err.to_string()))
    }
}

#[async_trait::async_trait]
impl PolicyStore for SqlitePolicyStore {
    async fn get_organization(&self, id: Uuid) -> Result<Organization, PolicyDataError> {
        use crate::schema::organizations::dsl::organizations;

        let mut conn = self.conn()?;
        let row: Option<OrganizationRow> = organizations
            .find(id.to_string())
            .select(OrganizationRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|err| PolicyDataError::GeneralError(err.to_string()))?;
        row.ok_or(PolicyDataError::NotFound)?.try_into()
    }

    async fn get_policy_template(&self, id: Uuid) -> Result<PolicyTemplate, PolicyDataError> {
        use crate::schema::policy_templates::dsl::policy_templates;

        let mut conn = self.conn()?;
        let row: Option<PolicyTemplateRow> = policy_templates
            .find(id.to_string())
            .select(PolicyTemplateRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|err| PolicyDataError::GeneralError(err.to_string()))?;
        row.ok_or(PolicyDataError::NotFound)?.try_into()
    }

    async fn get_org_policy(&self, id: Uuid) -> Result<OrgPolicy, PolicyDataError> {
        use crate::schema::org_policies::dsl::org_policies;

        let mut conn = self.conn()?;
        let row: Option<OrgPolicyRow> = org_policies
            .find(id.to_string())
            .select(OrgPolicyRow::as_select())
            .first(&mut conn)
            .optional()
            .map_err(|err| PolicyDataError::GeneralError(err.to_string()))?;
        row.ok_or(PolicyDataError::NotFound)?.try_into()
    }

    async fn employee_exists(&self, id: Uuid) -> Result<bool, PolicyDataError> {
        use crate::schema::employees::dsl::employees;

        let mut conn = self.conn()?;
        let count: i64 = employees
            .find(id.to_string())
            .count()
            .get_result(&mut conn)
            .map_err(|err| PolicyDataError::GeneralError(err.to_string()))?;
        Ok(count > 0)
    }

    async fn upsert_org_policy(
        &self,
        organization_id: Uuid,
        title: String,
        defaults: OrgPolicyDefaults,
    ) -> Result<(OrgPolicy, bool), PolicyDataError> {
        use crate::schema::org_policies::dsl;

        let mut conn = self.conn()?;
        let org_id = organization_id.to_string();
        let workforce = defaults.workforce_assignments.to_string();

        let (row, created) = conn
            .immediate_transaction::<(OrgPolicyRow, bool), TxError, _>(|conn| {
                let existing: Option<OrgPolicyRow> = dsl::org_policies
                    .filter(dsl::organization_id.eq(&org_id))
                    .filter(dsl::title.eq(&title))
                    .select(OrgPolicyRow::as_select())
                    .first(conn)
                    .optional()?;
                let now = Utc::now().naive_utc();

                match existing {
                    Some(row) => {
                        diesel::update(dsl::org_policies.find(&row.id))
                            .set((
                                dsl::current_template_html.eq(&defaults.current_template_html),
                                dsl::department.eq(defaults.department.clone()),
                                dsl::category.eq(defaults.category.clone()),
                                dsl::workforce_assignments.eq(workforce.as_str()),
                                dsl::updated_at.eq(now),
                            ))
                            .execute(conn)?;
                        let row: OrgPolicyRow = dsl::org_policies.find(&row.id).select(OrgPolicyRow::as_select()).first(conn)?;
                        Ok((row, false))
                    },
                    None => {
                        let row = OrgPolicyRow {
                            id: Uuid::new_v4().to_string(),
                            organization_id: org_id.clone(),
                            title: title.clone(),
                            policy_type: Some(defaults.policy_type.as_str().to_string()),
                            current_template_html: defaults.current_template_html.clone(),
                            department: defaults.department.clone(),
                            category: defaults.category.clone(),
                            workforce_assignments: Some(workforce.clone()),
                            created_at: now,
                            updated_at: now,
                        };
                        diesel::insert_into(dsl::org_policies).values(&row).execute(conn)?;
                        Ok((row, true))
                    },
                }
            })
            .map_err(PolicyDataError::from)?;

        Ok((OrgPolicy::try_from(row)?, created))
    }

    async fn list_versions(&self, org_policy_id: Uuid) -> Result<Vec<PolicyVersion>, PolicyDataError> {
        use crate::schema::policy_versions::dsl;

        let mut conn = self.conn()?;
        let rows: Vec<PolicyVersionRow> = dsl::policy_versions
            .filter(dsl::org_policy_id.eq(org_policy_id.to_string()))
            .order(dsl::created_at.asc())
            .select(PolicyVersionRow::as_select())
            .load(&mut conn)
            .map_err(|err| PolicyDataError::GeneralError(err.to_string()))?;
        rows.into_iter().map(PolicyVersion::try_from).collect()
    }

    async fn append_version<F>(&self, org_policy_id: Uuid, planner: F) -> Result<CommittedVersion, PolicyDataError>
    where
        F: 'static + Send + FnOnce(&[PolicyVersion]) -> Result<VersionPlan, PolicyDataError>,
    {
        use crate::schema::{org_policies, policy_approvers, policy_versions};

        let mut conn = self.conn()?;
        let pid = org_policy_id.to_string();

        conn.immediate_transaction::<CommittedVersion, TxError, _>(|conn| {
            // The policy row must exist before anything hangs off of it.
            let policy_count: i64 = org_policies::dsl::org_policies.find(&pid).count().get_result(conn)?;
            if policy_count == 0 {
                return Err(TxError::Data(PolicyDataError::NotFound));
            }

            // Snapshot the history inside the write transaction; the planner's
            // position count and version assignment cannot race another writer.
            let rows: Vec<PolicyVersionRow> = policy_versions::dsl::policy_versions
                .filter(policy_versions::dsl::org_policy_id.eq(&pid))
                .order(policy_versions::dsl::created_at.asc())
                .select(PolicyVersionRow::as_select())
                .load(conn)?;
            let versions: Vec<PolicyVersion> = rows.into_iter().map(PolicyVersion::try_from).collect::<Result<_, _>>().map_err(TxError::Data)?;

            let plan = planner(&versions).map_err(TxError::Data)?;
            let position = versions.len() + 1;
            let now = Utc::now().naive_utc();

            let row = PolicyVersionRow {
                id: Uuid::new_v4().to_string(),
                org_policy_id: pid.clone(),
                version: plan.version.to_string(),
                status: plan.status.as_str().to_string(),
                is_current: false,
                diff_data: plan.diff_data.to_string(),
                checkpoint_template: plan.checkpoint_template.clone(),
                expired_at: plan.expired_at,
                published_at: None,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(policy_versions::dsl::policy_versions).values(&row).execute(conn)?;

            // Keep the policy row's mirror of the newest HTML honest.
            match &plan.workforce_assignments {
                Some(workforce) => {
                    diesel::update(org_policies::dsl::org_policies.find(&pid))
                        .set((
                            org_policies::dsl::current_template_html.eq(&plan.new_html),
                            org_policies::dsl::workforce_assignments.eq(workforce.to_string()),
                            org_policies::dsl::updated_at.eq(now),
                        ))
                        .execute(conn)?;
                },
                None => {
                    diesel::update(org_policies::dsl::org_policies.find(&pid))
                        .set((org_policies::dsl::current_template_html.eq(&plan.new_html), org_policies::dsl::updated_at.eq(now)))
                        .execute(conn)?;
                },
            }

            if let Some(approver) = plan.approver_id {
                let known: i64 =
                    crate::schema::employees::dsl::employees.find(approver.to_string()).count().get_result(conn)?;
                if known == 0 {
                    return Err(TxError::Data(PolicyDataError::ApproverNotFound(approver)));
                }
                let approver_row = PolicyApproverRow {
                    id: Uuid::new_v4().to_string(),
                    policy_version_id: row.id.clone(),
                    approver_id: approver.to_string(),
                    condition: None,
                    status: "pending".to_string(),
                    created_at: now,
                    updated_at: now,
                };
                diesel::insert_into(policy_approvers::dsl::policy_approvers).values(&approver_row).execute(conn)?;
            }

            let version = PolicyVersion::try_from(row).map_err(TxError::Data)?;
            Ok(CommittedVersion { version, position })
        })
        .map_err(PolicyDataError::from)
    }

    async fn set_version_status(
        &self,
        org_policy_id: Uuid,
        version: VersionNumber,
        status: VersionStatus,
    ) -> Result<PolicyVersion, PolicyDataError> {
        use crate::schema::policy_versions::dsl;

        let mut conn = self.conn()?;
        let pid = org_policy_id.to_string();
        let version_str = version.to_string();

        conn.immediate_transaction::<PolicyVersion, TxError, _>(|conn| {
            let row: Option<PolicyVersionRow> = dsl::policy_versions
                .filter(dsl::org_policy_id.eq(&pid))
                .filter(dsl::version.eq(&version_str))
                .select(PolicyVersionRow::as_select())
                .first(conn)
                .optional()?;
            let row = row.ok_or(TxError::Data(PolicyDataError::NotFound))?;
            let current = PolicyVersion::try_from(row).map_err(TxError::Data)?;

            if !transition_allowed(current.status, status) {
                return Err(TxError::Data(PolicyDataError::Invalid(format!(
                    "Cannot transition version {} from {} to {}",
                    current.version,
                    current.status.as_str(),
                    status.as_str(),
                ))));
            }

            let now = Utc::now().naive_utc();
            if status == VersionStatus::Published && current.status != VersionStatus::Published {
                // Exactly one current version per policy: clear, then set.
                diesel::update(dsl::policy_versions.filter(dsl::org_policy_id.eq(&pid)).filter(dsl::is_current.eq(true)))
                    .set((dsl::is_current.eq(false), dsl::updated_at.eq(now)))
                    .execute(conn)?;
                diesel::update(dsl::policy_versions.find(current.id.to_string()))
                    .set((
                        dsl::status.eq(status.as_str()),
                        dsl::is_current.eq(true),
                        dsl::published_at.eq(Some(now)),
                        dsl::updated_at.eq(now),
                    ))
                    .execute(conn)?;
            } else {
                diesel::update(dsl::policy_versions.find(current.id.to_string()))
                    .set((dsl::status.eq(status.as_str()), dsl::updated_at.eq(now)))
                    .execute(conn)?;
            }

            let row: PolicyVersionRow =
                dsl::policy_versions.find(current.id.to_string()).select(PolicyVersionRow::as_select()).first(conn)?;
            PolicyVersion::try_from(row).map_err(TxError::Data)
        })
        .map_err(PolicyDataError::from)
    }
}
