//! Crate-wide constants.

pub const APP_NAME: &str = "rolebook";

/// Hex digits of a plan fingerprint shown in text output.
pub const SHORT_FINGERPRINT_LEN: usize = 12;

/// Tag that keeps an invocation selected whatever the include filter says.
pub const ALWAYS_TAG: &str = "always";

/// Include-filter tag that selects every invocation.
pub const ALL_TAG: &str = "all";

/// Implicit group containing every inventory host.
pub const ALL_GROUP: &str = "all";

/// Maximum nesting when environment values reference other templated values.
pub const MAX_TEMPLATE_DEPTH: usize = 32;

/// Maximum nesting of a single guard or template expression.
pub const MAX_EXPR_DEPTH: usize = 64;

pub const ENV_INVENTORY: &str = "ROLEBOOK_INVENTORY";
pub const ENV_TAGS: &str = "ROLEBOOK_TAGS";
pub const ENV_SKIP_TAGS: &str = "ROLEBOOK_SKIP_TAGS";
pub const ENV_LOG: &str = "ROLEBOOK_LOG";

pub const DEFAULT_INVENTORY: &str = "inventory.yml";
pub const CONFIG_FILE_NAME: &str = "config.yml";
