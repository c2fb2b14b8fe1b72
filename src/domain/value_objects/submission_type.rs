use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of scouting record. Unknown kinds are rejected at the boundary
/// rather than carried as an opaque string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionType {
    Match,
    Pit,
    Super,
}

impl SubmissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionType::Match => "match",
            SubmissionType::Pit => "pit",
            SubmissionType::Super => "super",
        }
    }

    /// Match submissions must reference the match they observe.
    pub fn requires_match_key(&self) -> bool {
        matches!(self, SubmissionType::Match)
    }
}

impl FromStr for SubmissionType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "match" => Ok(SubmissionType::Match),
            "pit" => Ok(SubmissionType::Pit),
            "super" => Ok(SubmissionType::Super),
            other => Err(format!("Unknown submission type: {other}")),
        }
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
