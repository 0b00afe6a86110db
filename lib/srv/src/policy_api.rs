use std::sync::Arc;

use base64ct::{Base64, Encoding as _};
use generator::GeneratorConnector;
use policy::PolicyStore;
use render::PdfRenderer;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};
use warp::Filter;

use crate::response::success_reply;
use crate::{models, Srv};

impl<S, G, R> Srv<S, G, R>
where
    S: 'static + PolicyStore + Send + Sync,
    G: 'static + GeneratorConnector + Send + Sync,
    R: 'static + PdfRenderer + Send + Sync,
{
    // Initialise a policy from a template (no version row yet)
    // POST /policy/initialise
    // out:
    //  - 201 when the OrgPolicy was created, 200 when refreshed
    //  - 400/404/502 envelope

    async fn handle_initialise(this: Arc<Self>, body: models::InitialisePostModel) -> Result<WithStatus<Json>, warp::reject::Rejection> {
        let req = body.to_domain().map_err(warp::reject::custom)?;
        match this.lifecycle().initialise(req).await {
            Ok(outcome) => Ok(success_reply(
                if outcome.created { StatusCode::CREATED } else { StatusCode::OK },
                "Policy initialized successfully",
                json!({
                    "org_policy_id": outcome.org_policy_id,
                    "created": outcome.created,
                    "title": outcome.title,
                    "version": outcome.version,
                    "workforce_assignments": outcome.workforce_assignment,
                }),
            )),
            Err(err) => Err(warp::reject::custom(err)),
        }
    }

    // Create the first (checkpoint) version of an initialised policy
    // POST /policy/create-initialised
    // out:
    //  - 201 version created
    //  - 400/404 envelope

    async fn handle_create_initialised(
        this: Arc<Self>,
        body: models::CreateInitialisedPostModel,
    ) -> Result<WithStatus<Json>, warp::reject::Rejection> {
        let req = body.to_domain().map_err(warp::reject::custom)?;
        match this.lifecycle().create_initial(req).await {
            Ok(outcome) => Ok(success_reply(
                StatusCode::CREATED,
                "Initialized policy version created successfully",
                json!({
                    "org_policy_id": outcome.org_policy_id,
                    "policy_version_id": outcome.policy_version_id,
                    "version_number": outcome.version,
                    "checkpoint_source": outcome.checkpoint_source,
                    "changes_count": outcome.changes_count,
                    "approver": outcome.approver_id,
                }),
            )),
            Err(err) => Err(warp::reject::custom(err)),
        }
    }

    // Append a new version
    // POST /policy/update
    // out:
    //  - 201 version created
    //  - 400/404 envelope

    async fn handle_update(this: Arc<Self>, body: models::UpdatePostModel) -> Result<WithStatus<Json>, warp::reject::Rejection> {
        let req = body.to_domain().map_err(warp::reject::custom)?;
        match this.lifecycle().update(req).await {
            Ok(outcome) => Ok(success_reply(
                StatusCode::CREATED,
                "Policy updated successfully",
                json!({
                    "org_policy_id": outcome.org_policy_id,
                    "policy_version_id": outcome.policy_version_id,
                    "version_number": outcome.version,
                    "version_position": outcome.position,
                    "is_checkpoint": outcome.is_checkpoint,
                    "checkpoint_saved": outcome.checkpoint_saved,
                    "changes_count": outcome.changes_count,
                }),
            )),
            Err(err) => Err(warp::reject::custom(err)),
        }
    }

    // Reconstruct the HTML of a version (latest when unspecified)
    // POST /policy/data
    // out:
    //  - 200 HTML + metadata
    //  - 400/404 envelope

    async fn handle_data(this: Arc<Self>, body: models::DataPostModel) -> Result<WithStatus<Json>, warp::reject::Rejection> {
        let req = body.to_domain().map_err(warp::reject::custom)?;
        match this.lifecycle().read(req).await {
            Ok(document) => Ok(success_reply(
                StatusCode::OK,
                "Policy version HTML retrieved successfully",
                json!({
                    "org_policy_id": document.org_policy_id,
                    "policy_title": document.title,
                    "version": document.version,
                    "html": document.html,
                    "created_at": document.created_at.to_rfc3339(),
                    "status": document.status,
                    "reconstruction_method": document.reconstruction_method,
                    "html_length": document.html.chars().count(),
                    "organization_id": document.organization_id,
                }),
            )),
            Err(err) => Err(warp::reject::custom(err)),
        }
    }

    // Reconstruct a version and export it as a branded PDF
    // POST /policy/download
    // out:
    //  - 200 base64 PDF + metadata
    //  - 400/404/500 envelope

    async fn handle_download(this: Arc<Self>, body: models::DownloadPostModel) -> Result<WithStatus<Json>, warp::reject::Rejection> {
        let req = body.to_domain().map_err(warp::reject::custom)?;
        match this.lifecycle().download(req).await {
            Ok(export) => Ok(success_reply(
                StatusCode::OK,
                "Policy PDF generated successfully",
                json!({
                    "org_policy_id": export.org_policy_id,
                    "policy_title": export.title,
                    "version": export.version,
                    "pdf_base64": Base64::encode_string(&export.pdf),
                    "created_at": export.created_at.to_rfc3339(),
                    "status": export.status,
                    "organization_id": export.organization_id,
                }),
            )),
            Err(err) => Err(warp::reject::custom(err)),
        }
    }

    // Drive the version state machine (draft -> in_review -> published -> archived)
    // POST /policy/status
    // out:
    //  - 200 new status + current marker
    //  - 400/404 envelope

    async fn handle_status(this: Arc<Self>, body: models::StatusPostModel) -> Result<WithStatus<Json>, warp::reject::Rejection> {
        let req = body.to_domain().map_err(warp::reject::custom)?;
        match this.lifecycle().transition(req).await {
            Ok(outcome) => Ok(success_reply(
                StatusCode::OK,
                "Policy version status updated successfully",
                json!({
                    "org_policy_id": outcome.org_policy_id,
                    "version": outcome.version,
                    "status": outcome.status,
                    "is_current": outcome.is_current,
                    "published_at": outcome.published_at.map(|t| t.to_rfc3339()),
                }),
            )),
            Err(err) => Err(warp::reject::custom(err)),
        }
    }

    pub fn policy_handlers(this: Arc<Self>) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let initialise = warp::post()
            .and(warp::path!("initialise"))
            .and(Self::with_self(this.clone()))
            .and(warp::body::json())
            .and_then(Self::handle_initialise);

        let create_initialised = warp::post()
            .and(warp::path!("create-initialised"))
            .and(Self::with_self(this.clone()))
            .and(warp::body::json())
            .and_then(Self::handle_create_initialised);

        let update = warp::post()
            .and(warp::path!("update"))
            .and(Self::with_self(this.clone()))
            .and(warp::body::json())
            .and_then(Self::handle_update);

        let data = warp::post()
            .and(warp::path!("data"))
            .and(Self::with_self(this.clone()))
            .and(warp::body::json())
            .and_then(Self::handle_data);

        let download = warp::post()
            .and(warp::path!("download"))
            .and(Self::with_self(this.clone()))
            .and(warp::body::json())
            .and_then(Self::handle_download);

        let status = warp::post()
            .and(warp::path!("status"))
            .and(Self::with_self(this.clone()))
            .and(warp::body::json())
            .and_then(Self::handle_status);

        warp::path("policy").and(initialise.or(create_initialised).or(update).or(data).or(download).or(status))
    }
}
