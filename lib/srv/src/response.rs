use std::fmt::Display;

use lifecycle::LifecycleError;
use policy::PolicyDataError;
use serde_json::{Map, Value};
use warp::http::StatusCode;
use warp::reply::{Json, WithStatus};

/// The HTTP status a controller error surfaces as.
pub fn status_for(err: &LifecycleError) -> StatusCode {
    match err {
        LifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
        LifecycleError::OrganizationNotFound(_)
        | LifecycleError::TemplateNotFound(_)
        | LifecycleError::PolicyNotFound(_)
        | LifecycleError::NoVersions
        | LifecycleError::VersionNotFound(_)
        | LifecycleError::ApproverNotFound(_) => StatusCode::NOT_FOUND,
        LifecycleError::Generator(_) => StatusCode::BAD_GATEWAY,
        LifecycleError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        LifecycleError::Storage(PolicyDataError::NotFound) => StatusCode::NOT_FOUND,
        LifecycleError::Storage(PolicyDataError::Invalid(_)) => StatusCode::BAD_REQUEST,
        LifecycleError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A `{"message": ..., "status": "success", ...payload}` reply.
pub fn success_reply(status: StatusCode, message: &str, payload: Value) -> WithStatus<Json> {
    let mut body = Map::new();
    body.insert("message".into(), Value::String(message.into()));
    body.insert("status".into(), Value::String("success".into()));
    if let Value::Object(payload) = payload {
        body.extend(payload);
    }
    warp::reply::with_status(warp::reply::json(&Value::Object(body)), status)
}

/// A `{"error": ..., "status": "error"}` reply. No stack traces, no internals.
pub fn error_reply(status: StatusCode, message: impl Display) -> WithStatus<Json> {
    let mut body = Map::new();
    body.insert("error".into(), Value::String(message.to_string()));
    body.insert("status".into(), Value::String("error".into()));
    warp::reply::with_status(warp::reply::json(&Value::Object(body)), status)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_failures_map_to_bad_gateway() {
        let err = LifecycleError::Generator(generator::GeneratorError::Timeout);
        assert_eq!(status_for(&err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn missing_rows_map_to_not_found() {
        assert_eq!(status_for(&LifecycleError::ApproverNotFound(uuid::Uuid::nil())), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&LifecycleError::NoVersions), StatusCode::NOT_FOUND);
        assert_eq!(status_for(&LifecycleError::Storage(PolicyDataError::NotFound)), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_bad_request() {
        assert_eq!(status_for(&LifecycleError::Validation("x is required".into())), StatusCode::BAD_REQUEST);
    }
}
