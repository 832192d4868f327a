//! Text forms of status values.
//!
//! Cached entries keep their status as the same strings shown to users, so
//! rendering and parsing must be exact inverses: `parse(render(x)) == x` for
//! every constructed value. Anything unrecognised parses to `Unknown`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::types::{DisabledReason, LocalState, SyncState};

const ERROR_PREFIX: &str = "Error: ";

static AHEAD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^ahead by (\d+)$").unwrap());
static BEHIND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^behind by (\d+)$").unwrap());
static DIVERGED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^diverged \(↑(\d+) ↓(\d+)\)$").unwrap());

impl fmt::Display for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LocalState::Clean => "Clean",
            LocalState::Dirty => "Dirty",
            LocalState::Error => "Error",
            LocalState::Unknown => "Unknown",
        };
        f.write_str(text)
    }
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DisabledReason::Ssh => "SSH status check disabled",
            DisabledReason::Https => "HTTPS status check disabled",
            DisabledReason::General => "Remote status check disabled",
        };
        f.write_str(text)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Synced => f.write_str("Synced"),
            SyncState::Ahead(count) => write!(f, "Ahead by {count}"),
            SyncState::Behind(count) => write!(f, "Behind by {count}"),
            SyncState::Diverged { ahead, behind } => write!(f, "Diverged (↑{ahead} ↓{behind})"),
            SyncState::NoRemote => f.write_str("No remote configured"),
            SyncState::NoUpstream => f.write_str("No upstream branch"),
            SyncState::CheckDisabled(reason) => write!(f, "{reason}"),
            SyncState::Error(message) => write!(f, "{ERROR_PREFIX}{message}"),
            SyncState::Unknown => f.write_str("Unknown status"),
        }
    }
}

/// Reconstructs status values from their rendered text
pub struct StatusParser;

impl StatusParser {
    pub fn parse_local_state(text: &str) -> LocalState {
        let text = text.trim();
        if text.eq_ignore_ascii_case("clean") {
            LocalState::Clean
        } else if text.eq_ignore_ascii_case("dirty") {
            LocalState::Dirty
        } else if text.eq_ignore_ascii_case("error") {
            LocalState::Error
        } else {
            LocalState::Unknown
        }
    }

    pub fn parse_sync_state(text: &str) -> SyncState {
        // The message is kept byte-for-byte, so check this before trimming
        if let Some(message) = text.strip_prefix(ERROR_PREFIX) {
            return SyncState::Error(message.to_string());
        }

        let text = text.trim();
        let fixed = [
            ("Synced", SyncState::Synced),
            ("No remote configured", SyncState::NoRemote),
            ("No upstream branch", SyncState::NoUpstream),
            (
                "SSH status check disabled",
                SyncState::CheckDisabled(DisabledReason::Ssh),
            ),
            (
                "HTTPS status check disabled",
                SyncState::CheckDisabled(DisabledReason::Https),
            ),
            (
                "Remote status check disabled",
                SyncState::CheckDisabled(DisabledReason::General),
            ),
        ];
        if let Some((_, state)) = fixed
            .into_iter()
            .find(|(form, _)| form.eq_ignore_ascii_case(text))
        {
            return state;
        }

        if let Some(caps) = DIVERGED_RE.captures(text) {
            if let (Ok(ahead), Ok(behind)) = (caps[1].parse(), caps[2].parse()) {
                return SyncState::Diverged { ahead, behind };
            }
        } else if let Some(caps) = AHEAD_RE.captures(text) {
            if let Ok(count) = caps[1].parse() {
                return SyncState::Ahead(count);
            }
        } else if let Some(caps) = BEHIND_RE.captures(text) {
            if let Ok(count) = caps[1].parse() {
                return SyncState::Behind(count);
            }
        }

        SyncState::Unknown
    }
}

impl FromStr for LocalState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StatusParser::parse_local_state(s))
    }
}

impl FromStr for SyncState {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(StatusParser::parse_sync_state(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(state: SyncState) {
        let rendered = state.to_string();
        assert_eq!(
            StatusParser::parse_sync_state(&rendered),
            state,
            "round trip failed for {rendered:?}"
        );
    }

    #[test]
    fn test_sync_state_round_trip() {
        round_trip(SyncState::Synced);
        round_trip(SyncState::Ahead(3));
        round_trip(SyncState::Behind(0));
        round_trip(SyncState::Diverged {
            ahead: 2,
            behind: 5,
        });
        round_trip(SyncState::NoRemote);
        round_trip(SyncState::NoUpstream);
        round_trip(SyncState::CheckDisabled(DisabledReason::Ssh));
        round_trip(SyncState::CheckDisabled(DisabledReason::Https));
        round_trip(SyncState::CheckDisabled(DisabledReason::General));
        round_trip(SyncState::Error("boom".to_string()));
        round_trip(SyncState::Unknown);
    }

    #[test]
    fn test_error_message_survives_keywords() {
        // Words that look like other states must stay inside the message
        round_trip(SyncState::Error(
            "remote ahead by 4, check disabled: no upstream ".to_string(),
        ));
        round_trip(SyncState::Error(String::new()));
    }

    #[test]
    fn test_rendered_forms() {
        assert_eq!(SyncState::Ahead(3).to_string(), "Ahead by 3");
        assert_eq!(
            SyncState::Diverged {
                ahead: 2,
                behind: 5
            }
            .to_string(),
            "Diverged (↑2 ↓5)"
        );
        assert_eq!(SyncState::Error("boom".into()).to_string(), "Error: boom");
    }

    #[test]
    fn test_unrecognised_text_is_unknown() {
        assert_eq!(StatusParser::parse_sync_state("sideways"), SyncState::Unknown);
        assert_eq!(StatusParser::parse_sync_state("Ahead by lots"), SyncState::Unknown);
        assert_eq!(
            StatusParser::parse_sync_state("Ahead by 99999999999999999999999999"),
            SyncState::Unknown
        );
        assert_eq!(StatusParser::parse_local_state("???"), LocalState::Unknown);
    }

    #[test]
    fn test_local_state_round_trip() {
        for state in [
            LocalState::Clean,
            LocalState::Dirty,
            LocalState::Error,
            LocalState::Unknown,
        ] {
            assert_eq!(state.to_string().parse::<LocalState>().unwrap(), state);
        }
        assert_eq!(StatusParser::parse_local_state("DIRTY"), LocalState::Dirty);
    }
}
