use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeagueError {
    #[error("malformed record at {location}: {reason} ({raw:?})")]
    InputMalformed {
        location: String,
        reason: String,
        raw: String,
    },

    #[error("team name '{name}' is ambiguous, it matches {candidates:?}")]
    NameAmbiguous {
        name: String,
        candidates: Vec<String>,
    },

    #[error("{team} has played {opponent} {played} times, quota is {expected}")]
    QuotaExceeded {
        team: String,
        opponent: String,
        played: u32,
        expected: u32,
    },

    #[error("no archived snapshot before {date}")]
    MissingPriorSnapshot { date: NaiveDate },

    #[error("scope '{scope}' has fewer than two teams")]
    EmptyLeague { scope: String },

    #[error("game log contains no readable games")]
    EmptyGameLog,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl LeagueError {
    pub fn malformed(location: impl Into<String>, reason: impl Into<String>, raw: impl Into<String>) -> Self {
        LeagueError::InputMalformed {
            location: location.into(),
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    // Everything else degrades: skipped, clamped or reported as not applicable.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            LeagueError::InputMalformed { .. }
                | LeagueError::QuotaExceeded { .. }
                | LeagueError::MissingPriorSnapshot { .. }
                | LeagueError::EmptyLeague { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LeagueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(!LeagueError::malformed("line 3", "missing score", "LG :3 KT").is_fatal());
        assert!(!LeagueError::EmptyLeague { scope: "CL".to_string() }.is_fatal());
        assert!(LeagueError::EmptyGameLog.is_fatal());
        assert!(LeagueError::NameAmbiguous {
            name: "lotte".to_string(),
            candidates: vec!["LT".to_string(), "M".to_string()],
        }
        .is_fatal());
    }
}
