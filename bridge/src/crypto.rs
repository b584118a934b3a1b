use std::fmt;
use std::time::Duration;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Slack signs requests with version `v0` of its signing scheme.
const SIGNATURE_VERSION: &str = "v0";

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";

/// Shared secret and replay window used to verify inbound webhooks.
#[derive(Clone)]
pub struct SigningContext {
  secret: Vec<u8>,
  clock_skew_tolerance: Duration,
}

impl SigningContext {
  pub fn new(secret: impl Into<Vec<u8>>, clock_skew_tolerance: Duration) -> Self {
    Self {
      secret: secret.into(),
      clock_skew_tolerance,
    }
  }

  pub fn clock_skew_tolerance(&self) -> Duration {
    self.clock_skew_tolerance
  }

  fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256, AuthError> {
    let mut mac = HmacSha256::new_from_slice(&self.secret)
      .map_err(|e| AuthError::Malformed(format!("invalid signing secret: {}", e)))?;
    mac.update(SIGNATURE_VERSION.as_bytes());
    mac.update(b":");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    Ok(mac)
  }
}

impl fmt::Debug for SigningContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SigningContext")
      .field("secret", &"<redacted>")
      .field("clock_skew_tolerance", &self.clock_skew_tolerance)
      .finish()
  }
}

/// Compute the `X-Slack-Signature` header value for a request.
pub fn sign(ctx: &SigningContext, timestamp: &str, body: &[u8]) -> Result<String, AuthError> {
  let mac = ctx.mac(timestamp, body)?;
  Ok(format!(
    "{}={}",
    SIGNATURE_VERSION,
    hex::encode(mac.finalize().into_bytes())
  ))
}

/// Verify a request signature against the current wall clock.
///
/// Protocol: https://api.slack.com/authentication/verifying-requests-from-slack
pub fn verify(
  body: &[u8],
  timestamp: Option<&str>,
  signature: Option<&str>,
  ctx: &SigningContext,
) -> Result<(), AuthError> {
  verify_at(body, timestamp, signature, ctx, chrono::Utc::now().timestamp())
}

/// Same as [`verify`] with an explicit `now` (unix seconds).
///
/// The replay window is checked before the HMAC, so a stale request is
/// reported as `Stale` even when its signature is valid.
pub fn verify_at(
  body: &[u8],
  timestamp: Option<&str>,
  signature: Option<&str>,
  ctx: &SigningContext,
  now: i64,
) -> Result<(), AuthError> {
  let timestamp =
    timestamp.ok_or_else(|| AuthError::Malformed("missing timestamp header".to_string()))?;
  let signature =
    signature.ok_or_else(|| AuthError::Malformed("missing signature header".to_string()))?;

  let ts: i64 = timestamp
    .parse()
    .map_err(|_| AuthError::Malformed(format!("non-numeric timestamp '{}'", timestamp)))?;

  if now.abs_diff(ts) > ctx.clock_skew_tolerance.as_secs() {
    return Err(AuthError::Stale { timestamp: ts, now });
  }

  let provided = signature
    .strip_prefix(SIGNATURE_VERSION)
    .and_then(|rest| rest.strip_prefix('='))
    .and_then(|digest| hex::decode(digest).ok())
    .ok_or(AuthError::Mismatch)?;

  ctx
    .mac(timestamp, body)?
    .verify_slice(&provided)
    .map_err(|_| AuthError::Mismatch)
}

#[cfg(test)]
mod tests {
  use super::*;

  const NOW: i64 = 1_700_000_000;
  const BODY: &[u8] = br#"{"type":"event_callback","event":{"type":"reaction_added"}}"#;

  fn ctx() -> SigningContext {
    SigningContext::new("test_signing_secret_abc123", Duration::from_secs(300))
  }

  fn signed(ts: i64) -> (String, String) {
    let timestamp = ts.to_string();
    let signature = sign(&ctx(), &timestamp, BODY).unwrap();
    (timestamp, signature)
  }

  #[test]
  fn signature_round_trips() {
    let (timestamp, signature) = signed(NOW);
    assert!(verify_at(BODY, Some(&timestamp), Some(&signature), &ctx(), NOW).is_ok());
  }

  #[test]
  fn signature_matches_slack_reference_construction() {
    // Slack's documented basestring: v0:<timestamp>:<body>
    let mut mac = HmacSha256::new_from_slice(b"test_signing_secret_abc123").unwrap();
    mac.update(b"v0:1700000000:");
    mac.update(BODY);
    let expected = format!("v0={}", hex::encode(mac.finalize().into_bytes()));

    assert_eq!(sign(&ctx(), "1700000000", BODY).unwrap(), expected);
  }

  #[test]
  fn any_body_byte_mutation_is_rejected() {
    let (timestamp, signature) = signed(NOW);
    for i in 0..BODY.len() {
      let mut body = BODY.to_vec();
      body[i] ^= 0x01;
      assert_eq!(
        verify_at(&body, Some(&timestamp), Some(&signature), &ctx(), NOW),
        Err(AuthError::Mismatch),
        "mutation at byte {} accepted",
        i
      );
    }
  }

  #[test]
  fn any_signature_byte_mutation_is_rejected() {
    let (timestamp, signature) = signed(NOW);
    for i in 0..signature.len() {
      let mut bytes = signature.clone().into_bytes();
      bytes[i] = if bytes[i] == b'0' { b'1' } else { b'0' };
      let mutated = String::from_utf8(bytes).unwrap();
      assert!(
        verify_at(BODY, Some(&timestamp), Some(&mutated), &ctx(), NOW).is_err(),
        "mutation at byte {} accepted",
        i
      );
    }
  }

  #[test]
  fn timestamp_mutation_is_rejected() {
    let (_, signature) = signed(NOW);
    let shifted = (NOW + 1).to_string();
    assert_eq!(
      verify_at(BODY, Some(&shifted), Some(&signature), &ctx(), NOW),
      Err(AuthError::Mismatch)
    );

    let garbled = format!("{}x", NOW);
    assert!(matches!(
      verify_at(BODY, Some(&garbled), Some(&signature), &ctx(), NOW),
      Err(AuthError::Malformed(_))
    ));
  }

  #[test]
  fn stale_request_is_rejected_even_with_valid_signature() {
    // 10 minutes old, outside the 5 minute window
    let (timestamp, signature) = signed(NOW - 600);
    assert_eq!(
      verify_at(BODY, Some(&timestamp), Some(&signature), &ctx(), NOW),
      Err(AuthError::Stale {
        timestamp: NOW - 600,
        now: NOW
      })
    );
  }

  #[test]
  fn future_timestamp_outside_window_is_stale() {
    let (timestamp, signature) = signed(NOW + 301);
    assert!(matches!(
      verify_at(BODY, Some(&timestamp), Some(&signature), &ctx(), NOW),
      Err(AuthError::Stale { .. })
    ));
  }

  #[test]
  fn timestamp_at_window_edge_is_accepted() {
    let (timestamp, signature) = signed(NOW - 300);
    assert!(verify_at(BODY, Some(&timestamp), Some(&signature), &ctx(), NOW).is_ok());
  }

  #[test]
  fn missing_headers_are_malformed() {
    let (timestamp, signature) = signed(NOW);
    assert!(matches!(
      verify_at(BODY, None, Some(&signature), &ctx(), NOW),
      Err(AuthError::Malformed(_))
    ));
    assert!(matches!(
      verify_at(BODY, Some(&timestamp), None, &ctx(), NOW),
      Err(AuthError::Malformed(_))
    ));
  }

  #[test]
  fn wrong_version_prefix_is_mismatch() {
    let (timestamp, signature) = signed(NOW);
    let v1 = signature.replacen("v0=", "v1=", 1);
    assert_eq!(
      verify_at(BODY, Some(&timestamp), Some(&v1), &ctx(), NOW),
      Err(AuthError::Mismatch)
    );
    assert_eq!(
      verify_at(BODY, Some(&timestamp), Some("v0=bad_signature"), &ctx(), NOW),
      Err(AuthError::Mismatch)
    );
  }

  #[test]
  fn different_secret_is_mismatch() {
    let (timestamp, signature) = signed(NOW);
    let other = SigningContext::new("another_secret", Duration::from_secs(300));
    assert_eq!(
      verify_at(BODY, Some(&timestamp), Some(&signature), &other, NOW),
      Err(AuthError::Mismatch)
    );
  }

  #[test]
  fn debug_output_redacts_secret() {
    let rendered = format!("{:?}", ctx());
    assert!(!rendered.contains("test_signing_secret"));
    assert!(rendered.contains("<redacted>"));
  }
}
