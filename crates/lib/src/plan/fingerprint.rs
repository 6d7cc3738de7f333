//! Plan fingerprints.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::consts::SHORT_FINGERPRINT_LEN;

use super::Plan;

/// SHA-256 over what a plan would do on each host.
///
/// Hosts are fed in name order, each as its name followed by the JSON of
/// its steps, skips and failure. The manifest name and tag filter are left
/// out: two plans that run the same steps share a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
  pub fn of(plan: &Plan) -> Result<Self, serde_json::Error> {
    let mut hasher = Sha256::new();
    for (host, host_plan) in &plan.hosts {
      hasher.update(host.as_bytes());
      hasher.update([0]);
      serde_json::to_writer(&mut hasher, &(&host_plan.steps, &host_plan.skipped, &host_plan.failure))?;
      hasher.update([0]);
    }
    Ok(Self(hasher.finalize().into()))
  }

  /// Leading hex digits, enough to tell plans apart by eye.
  pub fn short(&self) -> String {
    let mut hex = self.to_string();
    hex.truncate(SHORT_FINGERPRINT_LEN);
    hex
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
  }
}
