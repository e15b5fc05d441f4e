use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A pipeline stage. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Extract,
    Transform,
    Load,
}

impl Phase {
    /// Every phase, in canonical order.
    pub const ALL: [Phase; 3] = [Phase::Extract, Phase::Transform, Phase::Load];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Extract => "Extract",
            Phase::Transform => "Transform",
            Phase::Load => "Load",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase '{0}' (expected Extract, Transform or Load)")]
pub struct ParsePhaseError(pub String);

impl FromStr for Phase {
    type Err = ParsePhaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePhaseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_totally_ordered() {
        assert!(Phase::Extract < Phase::Transform);
        assert!(Phase::Transform < Phase::Load);

        let mut shuffled = vec![Phase::Load, Phase::Extract, Phase::Transform];
        shuffled.sort();
        assert_eq!(shuffled, Phase::ALL.to_vec());
    }

    #[test]
    fn display_matches_names() {
        assert_eq!(Phase::Extract.to_string(), "Extract");
        assert_eq!(Phase::Transform.to_string(), "Transform");
        assert_eq!(Phase::Load.to_string(), "Load");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("extract".parse::<Phase>().unwrap(), Phase::Extract);
        assert_eq!(" LOAD ".parse::<Phase>().unwrap(), Phase::Load);
    }

    #[test]
    fn parse_rejects_unknown_names() {
        let err = "Validate".parse::<Phase>().unwrap_err();
        assert_eq!(err, ParsePhaseError("Validate".to_string()));
    }
}
