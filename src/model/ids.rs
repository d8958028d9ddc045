use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::config::IdConfig;

/// The three tiers of the checklist tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Section,
    Subsection,
    Task,
}

impl NodeKind {
    /// Built-in id prefix for this tier
    pub fn default_prefix(self) -> &'static str {
        match self {
            NodeKind::Section => "sec",
            NodeKind::Subsection => "sub",
            NodeKind::Task => "task",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Section => write!(f, "section"),
            NodeKind::Subsection => write!(f, "subsection"),
            NodeKind::Task => write!(f, "task"),
        }
    }
}

macro_rules! tier_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

tier_id!(
    /// Id of a section, e.g. `sec_m2x1k9_4be01f9a2c`
    SectionId
);
tier_id!(
    /// Id of a subsection, e.g. `sub_m2x1k9_4be01f9a2c`
    SubsectionId
);
tier_id!(
    /// Id of a task, e.g. `task_m2x1k9_4be01f9a2c`. Instances key their state by it.
    TaskId
);

/// Source of fresh node ids.
///
/// Implementations only need to be collision-free with overwhelming
/// probability; the tree operations additionally reject any id already
/// present in the template and ask again.
pub trait IdGenerator {
    fn new_id(&mut self, kind: NodeKind) -> String;
}

/// `<prefix>_<base36 millis>_<10 random hex>`
#[derive(Debug, Clone, Default)]
pub struct RandomIds {
    prefixes: IdConfig,
}

impl RandomIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefixes(prefixes: IdConfig) -> Self {
        RandomIds { prefixes }
    }
}

impl IdGenerator for RandomIds {
    fn new_id(&mut self, kind: NodeKind) -> String {
        let millis = Utc::now().timestamp_millis().max(0) as u64;
        let random = uuid::Uuid::new_v4().simple().to_string();
        format!(
            "{}_{}_{}",
            self.prefixes.prefix(kind),
            to_base36(millis),
            &random[..10]
        )
    }
}

/// Deterministic ids (`sec_1`, `sub_2`, `task_3`, ...) for fixtures and tests.
/// The counter is shared across tiers.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: u64) -> Self {
        SequentialIds { next }
    }
}

impl IdGenerator for SequentialIds {
    fn new_id(&mut self, kind: NodeKind) -> String {
        self.next += 1;
        format!("{}_{}", kind.default_prefix(), self.next)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
