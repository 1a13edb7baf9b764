use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Ballot, Election},
    error::{BackendError, BackendErrorCode, BackendResult},
};

/// Form body the carrier gateway posts for every keypress.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UssdRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub service_code: Option<String>,
}

/// The gateway resends everything typed so far (`1*2*123456`); only the last
/// token is new. Blank tokens count as no input.
pub fn latest_input(text: &str) -> Option<&str> {
    if text.is_empty() {
        return None;
    }
    text.rsplit('*').next().filter(|token| !token.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UssdReply {
    /// `CON`: more input is expected.
    Continue(String),
    /// `END`: the dialog is over.
    End(String),
}

impl UssdReply {
    pub fn con(text: impl Into<String>) -> Self {
        UssdReply::Continue(text.into())
    }

    pub fn end(text: impl Into<String>) -> Self {
        UssdReply::End(text.into())
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UssdReply::End(_))
    }

    pub fn text(&self) -> &str {
        match self {
            UssdReply::Continue(text) | UssdReply::End(text) => text,
        }
    }

    /// Parses a rendered body back into a reply; used by clients of the
    /// transport.
    pub fn parse(body: &str) -> Option<Self> {
        if let Some(rest) = body.strip_prefix("CON") {
            return Some(UssdReply::Continue(rest.trim_start_matches(' ').to_string()));
        }
        body.strip_prefix("END")
            .map(|rest| UssdReply::End(rest.trim_start_matches(' ').to_string()))
    }
}

impl std::fmt::Display for UssdReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UssdReply::Continue(text) => write!(f, "CON {text}"),
            UssdReply::End(text) => write!(f, "END {text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCodeRequest {
    pub voter_id: String,
    pub phone_number: String,
    pub election_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIdentityRequest {
    pub voter_id: String,
    pub phone_number: String,
    pub verification_code: String,
    pub election_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotRequest {
    pub election_id: String,
    pub voter_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteRequest {
    pub election_id: String,
    pub voter_id: String,
    /// position id -> candidate id
    pub votes: BTreeMap<String, String>,
    pub session_id: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusRequest {
    pub election_id: String,
    pub voter_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedVoter {
    pub voter_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub receipt_code: Option<String>,
}

fn failure<T>(error: Option<String>, error_code: Option<BackendErrorCode>) -> BackendResult<T> {
    Err(BackendError::new(error_code.unwrap_or_default(), error))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveElectionsResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elections: Option<Vec<Election>>,
}

impl ActiveElectionsResponse {
    pub fn into_result(self) -> BackendResult<Vec<Election>> {
        match (self.success, self.elections) {
            (true, Some(elections)) => Ok(elections),
            _ => failure(self.error, None),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationCodeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<BackendErrorCode>,
}

impl VerificationCodeResponse {
    pub fn into_result(self) -> BackendResult<()> {
        if self.success {
            Ok(())
        } else {
            failure(self.error, self.error_code)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIdentityResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<BackendErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_name: Option<String>,
}

impl VerifyIdentityResponse {
    pub fn into_result(self) -> BackendResult<VerifiedVoter> {
        if self.success {
            Ok(VerifiedVoter {
                voter_name: self.voter_name,
            })
        } else {
            failure(self.error, self.error_code)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ballot: Option<Ballot>,
}

impl BallotResponse {
    pub fn into_result(self) -> BackendResult<Ballot> {
        match (self.success, self.ballot) {
            (true, Some(ballot)) => Ok(ballot),
            _ => failure(self.error, None),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVoteResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<BackendErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_code: Option<String>,
}

impl SubmitVoteResponse {
    pub fn into_result(self) -> BackendResult<VoteReceipt> {
        if self.success {
            Ok(VoteReceipt {
                receipt_code: self.receipt_code,
            })
        } else {
            failure(self.error, self.error_code)
        }
    }
}

fn default_success() -> bool {
    true
}

/// `success` is optional here; the backend only sends it when the status
/// lookup itself failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HasVotedResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HasVotedResponse {
    pub fn into_result(self) -> BackendResult<bool> {
        if self.success {
            Ok(self.has_voted)
        } else {
            failure(self.error, None)
        }
    }
}
