//! Canonical categorical values recognized by predicates and ratios.

/// Flag value of boolean-like categorical columns.
pub const YES: &str = "yes";
pub const NO: &str = "no";

/// Sales-channel code of a telesales sale.
pub const TELESALES_CHANNEL: &str = "0110";

/// Renewal status of a first-time policy.
pub const NEW_POLICY: &str = "new";

/// Coverage combination carrying only the compulsory line.
pub const MANDATORY_ONLY_COMBO: &str = "mandatory_only";

/// Business classification of loss-making business.
pub const LOSS_MAKING_CLASS: &str = "loss_making";

/// Product-code prefix of the compulsory line.
pub const MANDATORY_CODE_PREFIX: &str = "0301";

/// Product-code prefixes of the commercial lines.
pub const COMMERCIAL_CODE_PREFIXES: [&str; 3] = ["0312", "0313", "0317"];

/// Product-name markers used when the code column is absent from a batch.
pub const MANDATORY_NAME_MARKER: &str = "compulsory";
pub const COMMERCIAL_NAME_MARKER: &str = "commercial";
