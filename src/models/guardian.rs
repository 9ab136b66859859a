//! Guardian identities and retention policies.
//!
//! The ten canonical Guardians are configuration data: a fixed, versioned
//! table that surrounding systems may extend with entries of the same shape.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Prefix of every Guardian namespace.
pub const GUARDIAN_NAMESPACE_PREFIX: &str = "guardian:";

/// Returns the memory namespace for a Guardian id (`guardian:<id>`).
///
/// Unknown ids still map to this deterministic namespace.
#[must_use]
pub fn namespace_for(guardian_id: &str) -> String {
    format!("{GUARDIAN_NAMESPACE_PREFIX}{guardian_id}")
}

/// When a Guardian's memory records become eligible for deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RetentionRepr", into = "RetentionRepr")]
pub enum RetentionPolicy {
    /// Never pruned.
    Permanent,
    /// Cleared at process teardown.
    Session,
    /// Pruned once a record is older than the duration.
    Ttl(Duration),
}

impl RetentionPolicy {
    /// Returns the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Permanent => "permanent",
            Self::Session => "session",
            Self::Ttl(_) => "ttl",
        }
    }

    /// Returns the TTL in milliseconds, present iff the policy is `ttl`.
    #[must_use]
    pub fn ttl_ms(&self) -> Option<u64> {
        match self {
            Self::Ttl(ttl) => Some(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
            Self::Permanent | Self::Session => None,
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ttl(ttl) => write!(f, "ttl({}ms)", ttl.as_millis()),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Flat serialized form: `{ policy = "ttl", ttl_ms = 3600000 }`.
#[derive(Serialize, Deserialize)]
struct RetentionRepr {
    policy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttl_ms: Option<u64>,
}

impl TryFrom<RetentionRepr> for RetentionPolicy {
    type Error = String;

    fn try_from(repr: RetentionRepr) -> std::result::Result<Self, Self::Error> {
        match (repr.policy.to_lowercase().as_str(), repr.ttl_ms) {
            ("permanent", None) => Ok(Self::Permanent),
            ("session", None) => Ok(Self::Session),
            ("ttl", Some(ms)) => Ok(Self::Ttl(Duration::from_millis(ms))),
            ("ttl", None) => Err("ttl retention requires ttl_ms".to_string()),
            ("permanent" | "session", Some(_)) => {
                Err(format!("{} retention does not take ttl_ms", repr.policy))
            },
            (other, _) => Err(format!("unknown retention policy: {other}")),
        }
    }
}

impl From<RetentionPolicy> for RetentionRepr {
    fn from(policy: RetentionPolicy) -> Self {
        Self {
            policy: policy.as_str().to_string(),
            ttl_ms: policy.ttl_ms(),
        }
    }
}

/// Static identity and retention settings of one Guardian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Stable key.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Role label.
    pub gate: String,
    /// Positive, globally unique ordering key.
    pub frequency: u32,
    /// Element label.
    pub element: String,
    /// Retention policy for the Guardian's namespace.
    pub retention: RetentionPolicy,
}

impl GuardianConfig {
    /// Creates a Guardian configuration.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        gate: impl Into<String>,
        frequency: u32,
        element: impl Into<String>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            gate: gate.into(),
            frequency,
            element: element.into(),
            retention,
        }
    }

    /// Returns the memory namespace (`guardian:<id>`).
    #[must_use]
    pub fn namespace(&self) -> String {
        namespace_for(&self.id)
    }

    /// Checks the entry is well formed on its own.
    ///
    /// Uniqueness against a table is checked by the table owner.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("guardian id must not be empty".into()));
        }
        if self.frequency == 0 {
            return Err(Error::InvalidInput(format!(
                "guardian '{}' must have a positive frequency",
                self.id
            )));
        }
        if self.retention == RetentionPolicy::Ttl(Duration::ZERO) {
            return Err(Error::InvalidInput(format!(
                "guardian '{}' has a zero ttl",
                self.id
            )));
        }
        Ok(())
    }
}

const ONE_DAY: Duration = Duration::from_millis(86_400_000);
const ONE_HOUR: Duration = Duration::from_millis(3_600_000);

/// The canonical table: `(id, name, gate, frequency, element, retention)`.
const CANONICAL: [(&str, &str, &str, u32, &str, RetentionPolicy); 10] = [
    ("lyssandria", "Lyssandria", "Foundation", 174, "Earth", RetentionPolicy::Permanent),
    ("leyla", "Leyla", "Flow", 285, "Water", RetentionPolicy::Session),
    ("draconia", "Draconia", "Fire", 396, "Fire", RetentionPolicy::Permanent),
    ("maylinn", "Maylinn", "Heart", 417, "Wind", RetentionPolicy::Session),
    ("alera", "Alera", "Voice", 528, "Wind", RetentionPolicy::Ttl(ONE_DAY)),
    ("lyria", "Lyria", "Sight", 639, "Water", RetentionPolicy::Permanent),
    ("aiyami", "Aiyami", "Crown", 741, "Spirit", RetentionPolicy::Permanent),
    ("elara", "Elara", "Shift", 852, "Void", RetentionPolicy::Ttl(ONE_HOUR)),
    ("ino", "Ino", "Unity", 963, "Spirit", RetentionPolicy::Session),
    ("shinkami", "Shinkami", "Source", 1111, "Void", RetentionPolicy::Permanent),
];

/// Returns the ten canonical Guardians ordered by ascending frequency.
#[must_use]
pub fn canonical_guardians() -> Vec<GuardianConfig> {
    CANONICAL
        .iter()
        .map(|&(id, name, gate, frequency, element, retention)| {
            GuardianConfig::new(id, name, gate, frequency, element, retention)
        })
        .collect()
}
