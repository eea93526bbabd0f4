//! Request extractors whose rejections use the `{message}` error body.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Request,
    },
    http::request::Parts,
    response::{IntoResponse, Response},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::AppError;

/// `axum::Json` that rejects with `AppError::Validation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(Json(value)),
            Err(rejection) => {
                warn!(status = %rejection.status(), "rejected request body");
                Err(AppError::Validation(json_rejection_message(&rejection)))
            }
        }
    }
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(err) => format!("Invalid request body: {}", err.body_text()),
        JsonRejection::JsonSyntaxError(_) => "Request body must be valid JSON".to_string(),
        JsonRejection::MissingJsonContentType(_) => {
            "Content-Type must be application/json".to_string()
        }
        _ => "Invalid request body".to_string(),
    }
}

/// `axum::extract::Query` that rejects with `AppError::Validation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Query<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for Query<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match axum::extract::Query::<T>::from_request_parts(parts, state).await {
            Ok(axum::extract::Query(value)) => Ok(Query(value)),
            Err(rejection) => Err(AppError::Validation(query_rejection_message(&rejection))),
        }
    }
}

fn query_rejection_message(rejection: &QueryRejection) -> String {
    match rejection {
        QueryRejection::FailedToDeserializeQueryString(err) => {
            format!("Invalid query string: {}", err.body_text())
        }
        _ => "Invalid query string".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::StatusCode};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Scored {
        score: i64,
    }

    #[derive(Debug, Deserialize)]
    struct Window {
        days: Option<u32>,
    }

    fn json_request(body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let Json(body) = Json::<Scored>::from_request(json_request(r#"{"score": 7}"#), &())
            .await
            .unwrap();
        assert_eq!(body.score, 7);
    }

    #[tokio::test]
    async fn wrong_type_is_a_validation_error() {
        let err = Json::<Scored>::from_request(json_request(r#"{"score": "high"}"#), &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("score"));
    }

    #[tokio::test]
    async fn syntax_error_is_a_validation_error() {
        let err = Json::<Scored>::from_request(json_request("not json"), &())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Request body must be valid JSON");
    }

    #[tokio::test]
    async fn missing_content_type_is_a_validation_error() {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"score": 7}"#))
            .unwrap();
        let err = Json::<Scored>::from_request(req, &()).await.unwrap_err();
        assert_eq!(err.to_string(), "Content-Type must be application/json");
    }

    #[tokio::test]
    async fn bad_query_is_a_validation_error() {
        let req = axum::http::Request::builder().uri("/?days=abc").body(Body::empty()).unwrap();
        let (mut parts, _) = req.into_parts();
        let err = Query::<Window>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let req = axum::http::Request::builder().uri("/?days=3").body(Body::empty()).unwrap();
        let (mut parts, _) = req.into_parts();
        let Query(window) = Query::<Window>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(window.days, Some(3));
    }
}
