//! JSON envelopes: `{success: true, ...}` on success, `{error, field?}` on
//! failure.

use axum::{
  Json,
  extract::{FromRequest, Request},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::prelude::*;

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let mut body = json::json!({ "error": self.user_message() });
    if let Error::Validation(FieldError { field, .. }) = &self {
      body["field"] = json::Value::from(*field);
    }
    (self.status(), Json(body)).into_response()
  }
}

/// Merges `data` into a success envelope. Non-object data lands under
/// `data`.
pub fn success(status: StatusCode, data: impl Serialize) -> Result<Response> {
  let data =
    json::to_value(data).map_err(|e| Error::Internal(e.to_string()))?;

  let mut body = match data {
    json::Value::Object(map) => map,
    json::Value::Null => json::Map::new(),
    other => json::Map::from_iter([("data".to_string(), other)]),
  };
  body.insert("success".into(), json::Value::Bool(true));

  Ok((status, Json(json::Value::Object(body))).into_response())
}

pub fn ok(data: impl Serialize) -> Result<Response> {
  success(StatusCode::OK, data)
}

/// `Json` whose rejection speaks the same error envelope.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
  S: Send + Sync,
  T: DeserializeOwned,
{
  type Rejection = Error;

  async fn from_request(req: Request, state: &S) -> Result<Self> {
    match Json::<T>::from_request(req, state).await {
      Ok(Json(value)) => Ok(Payload(value)),
      Err(rejection) => Err(Error::InvalidArgs(rejection.body_text())),
    }
  }
}

/// Logs internal failures with the operation and who it touched.
pub trait Traced<T> {
  fn traced(
    self,
    op: &'static str,
    actor: Option<Uuid>,
    target: Option<Uuid>,
  ) -> Result<T>;
}

impl<T> Traced<T> for Result<T> {
  fn traced(
    self,
    op: &'static str,
    actor: Option<Uuid>,
    target: Option<Uuid>,
  ) -> Result<T> {
    if let Err(err) = &self
      && err.is_internal()
    {
      error!(op, actor = ?actor, target = ?target, "{err}");
    }
    self
  }
}

#[cfg(test)]
mod tests {
  use axum::body::to_bytes;

  use super::*;

  async fn body(response: Response) -> json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn validation_error_names_the_field() {
    let err: Error = FieldError::new("code", "Code is required").into();
    let response = err.into_response();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body(response).await;
    assert_eq!(body["field"], "code");
    assert_eq!(body["error"], "code: Code is required");
  }

  #[tokio::test]
  async fn database_errors_are_opaque() {
    let err = Error::Db(sea_orm::DbErr::Custom("disk I/O error".into()));
    let response = err.into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert!(body.get("field").is_none());
  }

  #[tokio::test]
  async fn success_flattens_objects() {
    let response =
      success(StatusCode::CREATED, json::json!({ "id": 7 })).unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body(response).await, json::json!({ "id": 7, "success": true }));

    let response = ok(vec![1, 2]).unwrap();
    assert_eq!(body(response).await, json::json!({ "data": [1, 2], "success": true }));
  }
}
