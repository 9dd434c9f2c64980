use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use service_core::error::AppError;
use validator::Validate;

/// JSON body that has passed its `validator` rules. Malformed bodies are a
/// 400, rule violations a 422.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Json parse error: {}", e.body_text())))?;

        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::auth::LoginRequest;
    use axum::{body::Body, http::StatusCode, routing::post, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/login",
            post(|ValidatedJson(req): ValidatedJson<LoginRequest>| async move { req.username }),
        )
    }

    async fn post_body(body: &'static str) -> StatusCode {
        app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/login")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        assert_eq!(post_body("{not json").await, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn rule_violations_are_unprocessable() {
        assert_eq!(
            post_body(r#"{"username":"","password":"x"}"#).await,
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            post_body(r#"{"username":"jane","password":"x"}"#).await,
            StatusCode::OK
        );
    }
}
