//! DKG phases.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of one eon's DKG. Declaration order is protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Off,
    Dealing,
    Accusing,
    Apologizing,
    Finalized,
}

impl Phase {
    /// All phases in protocol order.
    pub const ALL: [Phase; 5] = [
        Phase::Off,
        Phase::Dealing,
        Phase::Accusing,
        Phase::Apologizing,
        Phase::Finalized,
    ];

    /// Numeric value used for the phase gauge.
    pub fn as_i64(self) -> i64 {
        match self {
            Phase::Off => 0,
            Phase::Dealing => 1,
            Phase::Accusing => 2,
            Phase::Apologizing => 3,
            Phase::Finalized => 4,
        }
    }

    /// The phase following `self`, `None` once finalized.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Off => Some(Phase::Dealing),
            Phase::Dealing => Some(Phase::Accusing),
            Phase::Accusing => Some(Phase::Apologizing),
            Phase::Apologizing => Some(Phase::Finalized),
            Phase::Finalized => None,
        }
    }
}

impl TryFrom<i64> for Phase {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_i64() == value)
            .ok_or(value)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Off => "off",
            Phase::Dealing => "dealing",
            Phase::Accusing => "accusing",
            Phase::Apologizing => "apologizing",
            Phase::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_matches_protocol() {
        assert!(Phase::Off < Phase::Dealing);
        assert!(Phase::Apologizing < Phase::Finalized);
        assert_eq!(Phase::Dealing.next(), Some(Phase::Accusing));
        assert_eq!(Phase::Finalized.next(), None);
    }

    #[test]
    fn test_i64_conversion() {
        for phase in Phase::ALL {
            assert_eq!(Phase::try_from(phase.as_i64()), Ok(phase));
        }
        assert_eq!(Phase::try_from(9), Err(9));
    }

    #[test]
    fn test_display() {
        assert_eq!(Phase::Apologizing.to_string(), "apologizing");
    }
}
