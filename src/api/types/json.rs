//! JSON extractor whose rejections use the gateway error envelope

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json as AxumJson,
};
use serde::{de::DeserializeOwned, Serialize};

use super::error::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct Json<T>(pub T);

impl<S, T> FromRequest<S> for Json<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        AxumJson::<T>::from_request(req, state)
            .await
            .map(|AxumJson(value)| Json(value))
            .map_err(|rejection| rejection_error(&rejection))
    }
}

fn rejection_error(rejection: &JsonRejection) -> ApiError {
    let (code, message) = match rejection {
        JsonRejection::JsonDataError(err) => {
            ("json_parse_error", format!("Invalid request body: {}", err.body_text()))
        }
        JsonRejection::JsonSyntaxError(err) => {
            ("json_parse_error", format!("Malformed JSON: {}", err.body_text()))
        }
        JsonRejection::MissingJsonContentType(_) => (
            "unsupported_media_type",
            "Expected 'Content-Type: application/json'".to_string(),
        ),
        JsonRejection::BytesRejection(err) => (
            "invalid_request",
            format!("Could not read request body: {}", err.body_text()),
        ),
        _ => ("invalid_request", "Invalid JSON request".to_string()),
    };

    ApiError::new(rejection.status(), code, message)
}

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        AxumJson(self.0).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TierBody {
        tier: String,
    }

    fn post(content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = Request::builder().method("POST").uri("/admin/keys/x/tier");
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test]
    async fn test_wrong_field_is_unprocessable() {
        let err = Json::<TierBody>::from_request(post(Some("application/json"), "{\"tyer\": 1}"), &())
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "json_parse_error");
        assert!(err.message().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_syntax_error_is_bad_request() {
        let err = Json::<TierBody>::from_request(post(Some("application/json"), "{tier"), &())
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "json_parse_error");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let err = Json::<TierBody>::from_request(post(None, "{\"tier\": \"PRO\"}"), &())
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.code(), "unsupported_media_type");
    }

    #[tokio::test]
    async fn test_valid_body() {
        let Json(body) = Json::<TierBody>::from_request(post(Some("application/json"), "{\"tier\": \"PRO\"}"), &())
            .await
            .unwrap();
        assert_eq!(body.tier, "PRO");
    }
}
