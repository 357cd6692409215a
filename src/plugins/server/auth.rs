//! Identity forwarded by the gateway in signed headers.

use std::sync::Arc;

use axum::{
  extract::{FromRequestParts, OptionalFromRequestParts},
  http::{HeaderMap, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
  entity::{UserRole, user},
  prelude::*,
  state::AppState,
  sv,
};

pub const ACTOR_ID: &str = "x-actor-id";
pub const ACTOR_ROLE: &str = "x-actor-role";
pub const ACTOR_EMAIL: &str = "x-actor-email";
pub const ACTOR_SIGNATURE: &str = "x-actor-signature";

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, id: Uuid, role: UserRole) -> Result<HmacSha256> {
  let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
    .map_err(|e| Error::Internal(format!("HMAC key: {e}")))?;
  mac.update(format!("{id}:{}", role.as_str()).as_bytes());
  Ok(mac)
}

/// Hex HMAC-SHA256 of `"{id}:{role}"`, as the gateway computes it.
#[cfg(test)]
pub fn sign(secret: &str, id: Uuid, role: UserRole) -> Result<String> {
  Ok(hex::encode(mac(secret, id, role)?.finalize().into_bytes()))
}

pub fn verify(secret: &str, id: Uuid, role: UserRole, signature: &str) -> bool {
  let Ok(signature) = hex::decode(signature.trim()) else {
    return false;
  };
  mac(secret, id, role).is_ok_and(|mac| mac.verify_slice(&signature).is_ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub id: Uuid,
  pub role: UserRole,
  pub email: Option<String>,
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Result<Option<&'h str>> {
  headers
    .get(name)
    .map(|v| v.to_str().map(str::trim).map_err(|_| Error::Unauthorized))
    .transpose()
}

/// `Ok(None)` when no identity headers are present at all.
pub fn identity(headers: &HeaderMap, secret: &str) -> Result<Option<Identity>> {
  let id = header(headers, ACTOR_ID)?;
  let role = header(headers, ACTOR_ROLE)?;
  let signature = header(headers, ACTOR_SIGNATURE)?;

  let (id, role, signature) = match (id, role, signature) {
    (None, None, None) => return Ok(None),
    (Some(id), Some(role), Some(signature)) => (id, role, signature),
    _ => return Err(Error::Unauthorized),
  };

  let id = Uuid::parse_str(id).map_err(|_| Error::Unauthorized)?;
  let role = UserRole::parse(role).ok_or(Error::Unauthorized)?;
  if !verify(secret, id, role, signature) {
    warn!(actor = %id, "rejected identity with a bad signature");
    return Err(Error::Unauthorized);
  }

  let email = header(headers, ACTOR_EMAIL)?
    .filter(|email| !email.is_empty())
    .map(str::to_string);

  Ok(Some(Identity { id, role, email }))
}

/// The authenticated caller, mirrored into `users`.
#[derive(Debug, Clone)]
pub struct Actor(pub user::Model);

impl Actor {
  pub fn id(&self) -> Uuid {
    self.0.id
  }

  pub fn vendor(&self) -> Result<&user::Model> {
    sv::user::ensure_vendor(&self.0)?;
    Ok(&self.0)
  }

  pub fn admin(&self) -> Result<&user::Model> {
    sv::user::ensure_admin(&self.0)?;
    Ok(&self.0)
  }
}

async fn load(parts: &Parts, app: &AppState) -> Result<Option<Actor>> {
  let Some(Identity { id, role, email }) =
    identity(&parts.headers, &app.config.secret)?
  else {
    return Ok(None);
  };

  let user = app.sv().user.get_or_create(id, role, email).await?;
  Ok(Some(Actor(user)))
}

impl FromRequestParts<Arc<AppState>> for Actor {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    load(parts, app).await?.ok_or(Error::Unauthorized)
  }
}

impl OptionalFromRequestParts<Arc<AppState>> for Actor {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Option<Self>> {
    load(parts, app).await
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  const SECRET: &str = "0123456789abcdef";

  fn headers(id: Uuid, role: &str, signature: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACTOR_ID, HeaderValue::from_str(&id.to_string()).unwrap());
    headers.insert(ACTOR_ROLE, HeaderValue::from_str(role).unwrap());
    headers.insert(ACTOR_SIGNATURE, HeaderValue::from_str(signature).unwrap());
    headers
  }

  #[test]
  fn signature_round_trip() {
    let id = Uuid::new_v4();
    let signature = sign(SECRET, id, UserRole::Vendor).unwrap();

    assert!(verify(SECRET, id, UserRole::Vendor, &signature));
    assert!(!verify(SECRET, id, UserRole::Admin, &signature));
    assert!(!verify("another-secret-value", id, UserRole::Vendor, &signature));
    assert!(!verify(SECRET, id, UserRole::Vendor, "not-hex"));
  }

  #[test]
  fn identity_from_headers() {
    let id = Uuid::new_v4();
    let signature = sign(SECRET, id, UserRole::Shopper).unwrap();
    let mut headers = headers(id, "shopper", &signature);
    headers.insert(ACTOR_EMAIL, HeaderValue::from_static("ada@example.com"));

    let identity = identity(&headers, SECRET).unwrap().unwrap();
    assert_eq!(identity.id, id);
    assert_eq!(identity.role, UserRole::Shopper);
    assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
  }

  #[test]
  fn no_headers_is_anonymous() {
    assert_eq!(identity(&HeaderMap::new(), SECRET).unwrap(), None);
  }

  #[test]
  fn forged_or_partial_identity_is_rejected() {
    let id = Uuid::new_v4();
    let signature = sign(SECRET, id, UserRole::Shopper).unwrap();

    // role escalation with the shopper's signature
    let forged = headers(id, "admin", &signature);
    assert!(matches!(identity(&forged, SECRET), Err(Error::Unauthorized)));

    let mut partial = HeaderMap::new();
    partial.insert(ACTOR_ID, HeaderValue::from_str(&id.to_string()).unwrap());
    assert!(matches!(identity(&partial, SECRET), Err(Error::Unauthorized)));

    let unknown_role = headers(id, "root", &signature);
    assert!(matches!(identity(&unknown_role, SECRET), Err(Error::Unauthorized)));
  }
}
