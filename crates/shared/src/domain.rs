use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a USSD dialog currently is. Persisted with the session and used to
/// pick the handler for the next input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MenuState {
    Welcome,
    RequestCode,
    VerifyId,
    VerifyCode,
    BallotPosition,
    ReviewVotes,
    ConfirmSubmission,
    FinalConfirm,
    VoteSubmitted,
    /// Any persisted value this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl MenuState {
    pub fn as_str(self) -> &'static str {
        match self {
            MenuState::Welcome => "WELCOME",
            MenuState::RequestCode => "REQUEST_CODE",
            MenuState::VerifyId => "VERIFY_ID",
            MenuState::VerifyCode => "VERIFY_CODE",
            MenuState::BallotPosition => "BALLOT_POSITION",
            MenuState::ReviewVotes => "REVIEW_VOTES",
            MenuState::ConfirmSubmission => "CONFIRM_SUBMISSION",
            MenuState::FinalConfirm => "FINAL_CONFIRM",
            MenuState::VoteSubmitted => "VOTE_SUBMITTED",
            MenuState::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for MenuState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingProgress {
    pub current_position_index: usize,
    /// position id -> candidate id
    #[serde(default)]
    pub selections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdSession {
    pub session_id: String,
    pub phone_number: String,
    pub current_menu: MenuState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_name: Option<String>,
    #[serde(default)]
    pub voting_progress: VotingProgress,
    pub last_activity: DateTime<Utc>,
}

impl UssdSession {
    pub fn new(session_id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            phone_number: phone_number.into(),
            current_menu: MenuState::Welcome,
            election_id: None,
            voter_id: None,
            voter_name: None,
            voting_progress: VotingProgress::default(),
            last_activity: Utc::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl Position {
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    #[serde(default)]
    pub positions: Vec<Position>,
}
