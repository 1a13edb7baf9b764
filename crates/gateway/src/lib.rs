use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Ballot, Election},
    error::{BackendError, BackendResult},
    protocol::{
        ActiveElectionsResponse, BallotRequest, BallotResponse, HasVotedResponse,
        SubmitVoteRequest, SubmitVoteResponse, VerificationCodeRequest, VerificationCodeResponse,
        VerifiedVoter, VerifyIdentityRequest, VerifyIdentityResponse, VoteReceipt,
        VoteStatusRequest,
    },
};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

/// The six calls the voting backend exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    ActiveElections,
    RequestVerificationCode,
    VerifyVoterIdentity,
    Ballot,
    SubmitVote,
    HasVoted,
}

impl BackendOperation {
    pub fn rpc_name(self) -> &'static str {
        match self {
            BackendOperation::ActiveElections => "getActiveElections",
            BackendOperation::RequestVerificationCode => "requestVerificationCode",
            BackendOperation::VerifyVoterIdentity => "verifyVoterIdentity",
            BackendOperation::Ballot => "getBallot",
            BackendOperation::SubmitVote => "submitVote",
            BackendOperation::HasVoted => "hasVoted",
        }
    }

    /// Message surfaced to the voter when the call never reached a usable
    /// backend answer.
    pub fn unavailable_message(self) -> &'static str {
        match self {
            BackendOperation::ActiveElections
            | BackendOperation::RequestVerificationCode
            | BackendOperation::VerifyVoterIdentity => "Service temporarily unavailable.",
            BackendOperation::Ballot => "Failed to load ballot.",
            BackendOperation::SubmitVote => "Failed to submit vote.",
            BackendOperation::HasVoted => "Unable to validate voter status. Please try again.",
        }
    }
}

impl std::fmt::Display for BackendOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.rpc_name())
    }
}

/// Facade over the voting backend. Implementations never surface transport
/// failures as anything but a [`BackendError`] with an `RPC_ERROR` code.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn active_elections(&self) -> BackendResult<Vec<Election>>;
    async fn request_verification_code(&self, request: &VerificationCodeRequest)
        -> BackendResult<()>;
    async fn verify_voter_identity(
        &self,
        request: &VerifyIdentityRequest,
    ) -> BackendResult<VerifiedVoter>;
    async fn ballot(&self, request: &BallotRequest) -> BackendResult<Ballot>;
    async fn submit_vote(&self, request: &SubmitVoteRequest) -> BackendResult<VoteReceipt>;
    async fn has_voted(&self, request: &VoteStatusRequest) -> BackendResult<bool>;
}

#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error("invalid backend url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("failed to build backend http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
enum CallError {
    #[error("failed to build endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// JSON-over-HTTP client: every operation is a `POST {base}/rpc/{name}` with a
/// camelCase body and a `{ success, error, errorCode, ... }` envelope back.
#[derive(Clone)]
pub struct HttpBackendGateway {
    http: Client,
    base_url: Url,
}

impl HttpBackendGateway {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, GatewayConfigError> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).map_err(|source| GatewayConfigError::InvalidUrl {
            url: base_url.to_string(),
            source,
        })?;

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post<B, R>(&self, operation: BackendOperation, body: &B) -> Result<R, CallError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let endpoint = self
            .base_url
            .join(&format!("rpc/{}", operation.rpc_name()))?;
        debug!(%operation, %endpoint, "calling backend");
        let res = self
            .http
            .post(endpoint)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(res.json().await?)
    }

    /// Runs one call and collapses any transport failure into an
    /// `RPC_ERROR`.
    async fn call<B, R, T>(
        &self,
        operation: BackendOperation,
        body: &B,
        into_result: impl FnOnce(R) -> BackendResult<T> + Send,
    ) -> BackendResult<T>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        match self.post::<B, R>(operation, body).await {
            Ok(envelope) => into_result(envelope),
            Err(err) => {
                error!(%operation, error = %err, "backend rpc error");
                Err(BackendError::rpc(operation.unavailable_message()))
            }
        }
    }
}

#[async_trait]
impl BackendGateway for HttpBackendGateway {
    async fn active_elections(&self) -> BackendResult<Vec<Election>> {
        self.call(
            BackendOperation::ActiveElections,
            &serde_json::json!({}),
            ActiveElectionsResponse::into_result,
        )
        .await
    }

    async fn request_verification_code(
        &self,
        request: &VerificationCodeRequest,
    ) -> BackendResult<()> {
        self.call(
            BackendOperation::RequestVerificationCode,
            request,
            VerificationCodeResponse::into_result,
        )
        .await
    }

    async fn verify_voter_identity(
        &self,
        request: &VerifyIdentityRequest,
    ) -> BackendResult<VerifiedVoter> {
        self.call(
            BackendOperation::VerifyVoterIdentity,
            request,
            VerifyIdentityResponse::into_result,
        )
        .await
    }

    async fn ballot(&self, request: &BallotRequest) -> BackendResult<Ballot> {
        self.call(BackendOperation::Ballot, request, BallotResponse::into_result)
            .await
    }

    async fn submit_vote(&self, request: &SubmitVoteRequest) -> BackendResult<VoteReceipt> {
        self.call(
            BackendOperation::SubmitVote,
            request,
            SubmitVoteResponse::into_result,
        )
        .await
    }

    async fn has_voted(&self, request: &VoteStatusRequest) -> BackendResult<bool> {
        self.call(
            BackendOperation::HasVoted,
            request,
            HasVotedResponse::into_result,
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
