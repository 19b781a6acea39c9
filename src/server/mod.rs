use crate::normalizer::NormalizeError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use anyhow::anyhow;
use std::collections::HashMap;

pub mod protocol;
pub mod routes;

#[derive(Debug)]
pub struct WebError {
    err: anyhow::Error,
    status: StatusCode,
}

impl WebError {
    pub fn new(status: StatusCode, err: anyhow::Error) -> Self {
        WebError { err, status }
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.err)
    }
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        let err = HashMap::from([("errors", vec![self.to_string()])]);

        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(err)
    }

    fn status_code(&self) -> StatusCode {
        self.status
    }
}

impl From<anyhow::Error> for WebError {
    fn from(err: anyhow::Error) -> WebError {
        WebError::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }
}

impl From<NormalizeError> for WebError {
    fn from(err: NormalizeError) -> Self {
        let status = match err {
            NormalizeError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
            NormalizeError::Encode(_) | NormalizeError::InvalidConfig(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        WebError::new(status, anyhow!(err))
    }
}

impl From<base64::DecodeError> for WebError {
    fn from(err: base64::DecodeError) -> Self {
        WebError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("image is not valid base64: {err}"),
        )
    }
}
