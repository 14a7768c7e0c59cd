//! Error types and axum `IntoResponse` implementation.
//!
//! Handlers turn user-facing rejections into notices on the re-rendered page
//! themselves; whatever reaches [`IntoResponse`] is either an auth failure,
//! a malformed request or an infrastructure fault.

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::html::escape;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Core(#[from] verity_core::Error),

  #[error(transparent)]
  License(#[from] verity_license::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = match &self {
      Error::Unauthorized => {
        let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"verity\""),
        );
        return res;
      }
      Error::BadRequest(_) => StatusCode::BAD_REQUEST,
      Error::Core(e) if e.is_user_facing() => StatusCode::BAD_REQUEST,
      Error::License(e) if e.is_user_facing() => StatusCode::BAD_REQUEST,
      Error::Core(_) | Error::License(_) => {
        error!(error = %self, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    let body = format!(
      "<!doctype html><html><body><h1>{}</h1><p>{}</p></body></html>",
      status.as_u16(),
      escape(&self.to_string())
    );
    (status, Html(body)).into_response()
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
