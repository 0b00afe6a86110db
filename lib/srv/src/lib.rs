use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use generator::GeneratorConnector;
use lifecycle::{Lifecycle, LifecycleError};
use log::{debug, error, info, warn};
use policy::PolicyStore;
use render::PdfRenderer;
use serde::{Deserialize, Serialize};
use tokio::signal::unix::{signal, Signal, SignalKind};
use warp::reject::Rejection;
use warp::reply::Reply;
use warp::Filter;

use crate::response::{error_reply, status_for};

pub mod models;
pub mod policy_api;
pub mod response;

/// Function that returns a future that only returns if either SIGTERM or SIGINT has been sent to this process.
///
/// This is used to gracefully shut down the warp server, which takes an async function and will run until it returns. This mostly improves Docker-compatability, as it responds to `docker stop` and all that.
///
/// Only works on Unix.
async fn graceful_signal() {
    // Register a SIGTERM handler to be Docker-friendly
    let term_handler: Option<Signal> = match signal(SignalKind::terminate()) {
        Ok(handler) => Some(handler),
        Err(err) => {
            error!("Failed to register SIGTERM signal handler: {err}");
            warn!("Service will NOT shutdown gracefully on SIGTERM");
            None
        },
    };

    // Also register a SIGINT handler to be manual-friendly
    let int_handler: Option<Signal> = match signal(SignalKind::interrupt()) {
        Ok(handler) => Some(handler),
        Err(err) => {
            error!("Failed to register SIGINT signal handler: {err}");
            warn!("Service will NOT shutdown gracefully on SIGINT");
            None
        },
    };

    // Wait until we receive such a signal after which we terminate the server
    match (term_handler, int_handler) {
        (Some(mut term), Some(mut int)) => tokio::select! {
            _ = term.recv() => {
                info!("Received SIGTERM, shutting down gracefully...");
            },

            _ = int.recv() => {
                info!("Received SIGINT, shutting down gracefully...");
            },
        },

        (Some(mut term), None) => {
            term.recv().await;
            info!("Received SIGTERM, shutting down gracefully...");
        },
        (None, Some(mut int)) => {
            int.recv().await;
            info!("Received SIGINT, shutting down gracefully...");
        },

        // Just wait forever to not stop the warp server
        (None, None) => loop {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        },
    }
}

pub struct Srv<S, G, R> {
    addr: SocketAddr,
    lifecycle: Lifecycle<S, G, R>,
}

#[derive(Serialize, Deserialize)]
struct PingResponse {
    success: bool,
    ping:    String,
}

impl<S, G, R> Srv<S, G, R>
where
    S: 'static + PolicyStore + Send + Sync,
    G: 'static + GeneratorConnector + Send + Sync,
    R: 'static + PdfRenderer + Send + Sync,
{
    pub fn new(addr: impl Into<SocketAddr>, lifecycle: Lifecycle<S, G, R>) -> Self { Srv { addr: addr.into(), lifecycle } }

    pub(crate) fn lifecycle(&self) -> &Lifecycle<S, G, R> { &self.lifecycle }

    fn with_self(this: Arc<Self>) -> impl Filter<Extract = (Arc<Self>,), Error = Infallible> + Clone { warp::any().map(move || this.clone()) }

    pub async fn run(self) {
        let addr: SocketAddr = self.addr;
        let this_arc: Arc<Self> = Arc::new(self);

        let ping = warp::get().and(warp::path("ping")).map(|| warp::reply::json(&PingResponse { success: true, ping: String::from("pong") }));
        let policy_api = Self::policy_handlers(this_arc.clone());

        let index = warp::any().and(policy_api.or(ping)).recover(|err: Rejection| async move {
            debug!("err: {:?}", err);
            let res: Result<Box<dyn Reply>, Rejection> = if let Some(err) = err.find::<LifecycleError>() {
                Ok(Box::new(error_reply(status_for(err), err)))
            } else if let Some(err) = err.find::<::policy::PolicyDataError>() {
                let status = match err {
                    ::policy::PolicyDataError::NotFound => warp::http::StatusCode::NOT_FOUND,
                    ::policy::PolicyDataError::ApproverNotFound(_) => warp::http::StatusCode::NOT_FOUND,
                    ::policy::PolicyDataError::Invalid(_) => warp::http::StatusCode::BAD_REQUEST,
                    ::policy::PolicyDataError::GeneralError(_) => warp::http::StatusCode::INTERNAL_SERVER_ERROR,
                };
                Ok(Box::new(error_reply(status, err)))
            } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
                Ok(Box::new(error_reply(warp::http::StatusCode::BAD_REQUEST, "Invalid JSON payload")))
            } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
                Ok(Box::new(error_reply(warp::http::StatusCode::METHOD_NOT_ALLOWED, "POST method required")))
            } else if err.is_not_found() {
                Ok(Box::new(error_reply(warp::http::StatusCode::NOT_FOUND, "Not found")))
            } else {
                debug!("Got err: {:?}", err);
                Err(err)
            };
            res
        });

        let (addr, srv) = warp::serve(index).bind_with_graceful_shutdown(addr, graceful_signal());
        info!("Now serving at {addr}; ready for requests");
        srv.await;
    }
}
