//! USSD voting dialog.
//!
//! [`MenuStateMachine::handle`] takes the persisted session plus the newest
//! input token, talks to the voting backend where a step needs it, and
//! returns the next screen. Each [`MenuState`] has exactly one handler.

use std::sync::Arc;

use gateway::{BackendGateway, BackendOperation};
use shared::{
    domain::{Ballot, Election, MenuState, UssdSession},
    error::{BackendError, BackendErrorCode},
    protocol::{
        BallotRequest, SubmitVoteRequest, UssdReply, VerificationCodeRequest,
        VerifyIdentityRequest, VoteStatusRequest,
    },
};

mod ballot;
pub mod observer;
pub mod prompts;

use ballot::{next_open_position, parse_choice, position_prompt, previous_open_position, review_screen};
pub use observer::{MenuEvent, MenuObserver, TracingObserver};

pub const DEFAULT_SHORT_CODE: &str = "*384#";

#[derive(Debug, Clone)]
pub struct MenuSettings {
    /// Dial string quoted back to the voter, e.g. `*384#`.
    pub short_code: String,
}

impl Default for MenuSettings {
    fn default() -> Self {
        Self {
            short_code: DEFAULT_SHORT_CODE.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct MenuStateMachine {
    backend: Arc<dyn BackendGateway>,
    observer: Arc<dyn MenuObserver>,
    settings: MenuSettings,
}

impl MenuStateMachine {
    pub fn new(backend: Arc<dyn BackendGateway>, settings: MenuSettings) -> Self {
        Self {
            backend,
            observer: Arc::new(TracingObserver),
            settings,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn MenuObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Handles one input token for `session` and returns the screen to show.
    ///
    /// Changes are applied to `session` only when the dialog continues or the
    /// vote was accepted; any other terminal reply leaves it untouched.
    pub async fn handle(&self, session: &mut UssdSession, input: Option<&str>) -> UssdReply {
        let input = input.map(str::trim).filter(|token| !token.is_empty());
        self.observer.record(&MenuEvent::Input {
            session_id: &session.session_id,
            state: session.current_menu,
            input,
        });

        let mut draft = session.clone();
        let reply = self.dispatch(&mut draft, input).await;

        if !reply.is_terminal() || draft.current_menu == MenuState::VoteSubmitted {
            if draft.current_menu != session.current_menu {
                self.observer.record(&MenuEvent::Transition {
                    session_id: &session.session_id,
                    from: session.current_menu,
                    to: draft.current_menu,
                });
            }
            *session = draft;
        }
        reply
    }

    async fn dispatch(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        match draft.current_menu {
            MenuState::Welcome => self.welcome(draft, input).await,
            MenuState::RequestCode => self.request_code(draft, input).await,
            MenuState::VerifyId => self.verify_id(draft, input).await,
            MenuState::VerifyCode => self.verify_code(draft, input).await,
            MenuState::BallotPosition => self.ballot_position(draft, input).await,
            MenuState::ReviewVotes => self.review_votes(draft, input).await,
            MenuState::ConfirmSubmission => self.confirm_submission(draft, input).await,
            MenuState::FinalConfirm => self.final_confirm(draft, input).await,
            MenuState::VoteSubmitted | MenuState::Unknown => {
                self.invalid_state(draft, "no handler for persisted state")
            }
        }
    }

    async fn welcome(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        let elections = match self.backend.active_elections().await {
            Ok(elections) => elections,
            Err(err) => {
                self.backend_failed(draft, BackendOperation::ActiveElections, &err);
                return UssdReply::end(prompts::NO_ACTIVE_ELECTIONS);
            }
        };
        if elections.is_empty() {
            return UssdReply::end(prompts::NO_ACTIVE_ELECTIONS);
        }

        if draft.election_id.is_some() {
            return match input {
                None => UssdReply::con(prompts::welcome_menu()),
                Some(choice) => choose_action(draft, choice),
            };
        }

        if let [election] = elections.as_slice() {
            draft.election_id = Some(election.id.clone());
            return match input {
                None => UssdReply::con(prompts::welcome_to(&election.name)),
                Some(choice) => choose_action(draft, choice),
            };
        }

        let Some(choice) = input else {
            return UssdReply::con(prompts::election_list(
                elections.iter().map(|e| e.name.as_str()),
            ));
        };
        match parse_choice(choice, elections.len()) {
            Some(number) => {
                let Election { id, name } = &elections[number - 1];
                draft.election_id = Some(id.clone());
                // The action choice arrives with the next request.
                UssdReply::con(prompts::selected_election(name))
            }
            None => UssdReply::end(prompts::INVALID_ELECTION_SELECTION),
        }
    }

    async fn request_code(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        let Some(voter_id) = input else {
            return UssdReply::end(prompts::VOTER_ID_REQUIRED);
        };
        let Some(election_id) = draft.election_id.clone() else {
            return UssdReply::end(prompts::ELECTION_NOT_SELECTED);
        };

        let request = VerificationCodeRequest {
            voter_id: voter_id.to_string(),
            phone_number: draft.phone_number.clone(),
            election_id,
        };
        match self.backend.request_verification_code(&request).await {
            Ok(()) => UssdReply::end(prompts::code_sent(&self.settings.short_code)),
            Err(err) => {
                self.backend_failed(draft, BackendOperation::RequestVerificationCode, &err);
                UssdReply::end(prompts::with_hint(
                    err.message_or("Failed to send code"),
                    prompts::TRY_AGAIN_OR_SUPPORT,
                ))
            }
        }
    }

    async fn verify_id(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        let Some(voter_id) = input else {
            return UssdReply::end(prompts::VOTER_ID_REQUIRED);
        };
        let Some(election_id) = draft.election_id.clone() else {
            return UssdReply::end(prompts::ELECTION_NOT_SELECTED);
        };
        draft.voter_id = Some(voter_id.to_string());

        let status = VoteStatusRequest {
            election_id: election_id.clone(),
            voter_id: voter_id.to_string(),
        };
        match self.backend.has_voted(&status).await {
            Ok(true) => return UssdReply::end(prompts::ALREADY_VOTED),
            Ok(false) => {}
            Err(err) => {
                self.backend_failed(draft, BackendOperation::HasVoted, &err);
                return UssdReply::end(err.message_or("Failed to validate voting status."));
            }
        }

        let request = VerificationCodeRequest {
            voter_id: voter_id.to_string(),
            phone_number: draft.phone_number.clone(),
            election_id,
        };
        if let Err(err) = self.backend.request_verification_code(&request).await {
            self.backend_failed(draft, BackendOperation::RequestVerificationCode, &err);
            return UssdReply::end(prompts::with_hint(
                err.message_or("Verification failed"),
                prompts::TRY_AGAIN_OR_SUPPORT,
            ));
        }

        draft.current_menu = MenuState::VerifyCode;
        UssdReply::con(prompts::ENTER_CODE)
    }

    async fn verify_code(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        let Some(code) = input else {
            return UssdReply::end(prompts::CODE_REQUIRED);
        };
        if !is_verification_code(code) {
            return UssdReply::end(prompts::INVALID_CODE_FORMAT);
        }
        let (Some(voter_id), Some(election_id)) = (draft.voter_id.clone(), draft.election_id.clone())
        else {
            return self.invalid_state(draft, "code entered without voter or election");
        };

        let request = VerifyIdentityRequest {
            voter_id,
            phone_number: draft.phone_number.clone(),
            verification_code: code.to_string(),
            election_id,
        };
        let voter = match self.backend.verify_voter_identity(&request).await {
            Ok(voter) => voter,
            Err(err) => {
                self.backend_failed(draft, BackendOperation::VerifyVoterIdentity, &err);
                let message = err.message_or("Invalid code");
                let hint = match err.code {
                    BackendErrorCode::CodeExpired => {
                        prompts::request_new_code(&self.settings.short_code)
                    }
                    class if class.is_already_voted() => prompts::THANK_YOU.to_string(),
                    _ => prompts::TRY_AGAIN.to_string(),
                };
                return UssdReply::end(prompts::with_hint(message, &hint));
            }
        };

        draft.voter_name = voter.voter_name;
        draft.voting_progress.current_position_index = 0;
        draft.current_menu = MenuState::BallotPosition;
        self.show_ballot_position(draft).await
    }

    async fn ballot_position(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        let Some(choice) = input else {
            return UssdReply::end(prompts::INVALID_INPUT);
        };
        let ballot = match self.fetch_ballot(draft, prompts::BALLOT_UNAVAILABLE).await {
            Ok(ballot) => ballot,
            Err(reply) => return reply,
        };

        let index = draft.voting_progress.current_position_index;
        let Some(position) = ballot.positions.get(index) else {
            // The ballot shrank since the last request.
            return self.render_ballot(draft, &ballot);
        };
        if position.candidates.is_empty() {
            return self.render_ballot(draft, &ballot);
        }

        if choice == "0" {
            if index == 0 {
                return UssdReply::end(prompts::VOTING_CANCELLED);
            }
            if let Some(previous) = previous_open_position(&ballot, index) {
                draft.voting_progress.current_position_index = previous;
            }
            return self.render_ballot(draft, &ballot);
        }

        let Some(number) = parse_choice(choice, position.candidates.len()) else {
            return UssdReply::con(prompts::with_hint(
                prompts::INVALID_CHOICE,
                &position_prompt(position, index),
            ));
        };
        let candidate = &position.candidates[number - 1];
        draft
            .voting_progress
            .selections
            .insert(position.id.clone(), candidate.id.clone());
        draft.voting_progress.current_position_index = index + 1;
        self.render_ballot(draft, &ballot)
    }

    async fn review_votes(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        self.confirm_submission(draft, input).await
    }

    async fn confirm_submission(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        match input {
            None => UssdReply::end(prompts::INVALID_INPUT),
            Some("0") => UssdReply::end(prompts::VOTING_CANCELLED),
            Some("1") => {
                draft.current_menu = MenuState::FinalConfirm;
                UssdReply::con(prompts::FINAL_CONFIRM)
            }
            Some("2") => {
                draft.voting_progress.current_position_index = 0;
                draft.voting_progress.selections.clear();
                draft.current_menu = MenuState::BallotPosition;
                self.show_ballot_position(draft).await
            }
            Some(_) => UssdReply::end(prompts::INVALID_OPTION),
        }
    }

    async fn final_confirm(&self, draft: &mut UssdSession, input: Option<&str>) -> UssdReply {
        match input {
            None => UssdReply::end(prompts::INVALID_INPUT),
            Some("0") => {
                draft.current_menu = MenuState::ReviewVotes;
                match self.fetch_ballot(draft, prompts::BALLOT_UNAVAILABLE_RETRY).await {
                    Ok(ballot) => self.render_review(draft, &ballot),
                    Err(reply) => reply,
                }
            }
            Some("1") => self.submit(draft).await,
            Some(_) => UssdReply::end(prompts::INVALID_OPTION),
        }
    }

    async fn submit(&self, draft: &mut UssdSession) -> UssdReply {
        let (Some(voter_id), Some(election_id)) = (draft.voter_id.clone(), draft.election_id.clone())
        else {
            return self.invalid_state(draft, "submission without voter or election");
        };

        let request = SubmitVoteRequest {
            election_id,
            voter_id,
            votes: draft.voting_progress.selections.clone(),
            session_id: draft.session_id.clone(),
            phone_number: draft.phone_number.clone(),
        };
        match self.backend.submit_vote(&request).await {
            Ok(receipt) => {
                draft.current_menu = MenuState::VoteSubmitted;
                UssdReply::end(prompts::vote_submitted(
                    receipt.receipt_code.as_deref().unwrap_or("N/A"),
                ))
            }
            Err(err) => {
                self.backend_failed(draft, BackendOperation::SubmitVote, &err);
                UssdReply::end(prompts::submission_failed(err.message_or("Unknown error")))
            }
        }
    }

    async fn show_ballot_position(&self, draft: &mut UssdSession) -> UssdReply {
        match self.fetch_ballot(draft, prompts::BALLOT_UNAVAILABLE).await {
            Ok(ballot) => self.render_ballot(draft, &ballot),
            Err(reply) => reply,
        }
    }

    /// Shows the position at the current index, moving forward past
    /// positions without candidates. Once every position is behind the
    /// voter the review screen is shown instead.
    fn render_ballot(&self, draft: &mut UssdSession, ballot: &Ballot) -> UssdReply {
        let count = ballot.positions.len();
        let start = draft.voting_progress.current_position_index.min(count);
        let next = next_open_position(ballot, start);

        for skipped in &ballot.positions[start..next.unwrap_or(count)] {
            self.observer.record(&MenuEvent::PositionSkipped {
                session_id: &draft.session_id,
                position_id: &skipped.id,
                title: &skipped.title,
            });
        }

        match next {
            Some(index) => {
                draft.voting_progress.current_position_index = index;
                UssdReply::con(position_prompt(&ballot.positions[index], index))
            }
            None => {
                draft.voting_progress.current_position_index = count;
                draft.current_menu = MenuState::ReviewVotes;
                self.render_review(draft, ballot)
            }
        }
    }

    fn render_review(&self, draft: &mut UssdSession, ballot: &Ballot) -> UssdReply {
        match review_screen(ballot, &draft.voting_progress.selections) {
            Some(screen) => {
                draft.current_menu = MenuState::ConfirmSubmission;
                UssdReply::con(screen)
            }
            None => UssdReply::end(prompts::NO_SELECTIONS),
        }
    }

    async fn fetch_ballot(
        &self,
        draft: &UssdSession,
        unavailable: &'static str,
    ) -> Result<Ballot, UssdReply> {
        let (Some(election_id), Some(voter_id)) = (&draft.election_id, &draft.voter_id) else {
            return Err(self.invalid_state(draft, "ballot requested without voter or election"));
        };
        let request = BallotRequest {
            election_id: election_id.clone(),
            voter_id: voter_id.clone(),
        };
        self.backend.ballot(&request).await.map_err(|err| {
            self.backend_failed(draft, BackendOperation::Ballot, &err);
            UssdReply::end(unavailable)
        })
    }

    fn backend_failed(&self, draft: &UssdSession, operation: BackendOperation, error: &BackendError) {
        self.observer.record(&MenuEvent::BackendFailure {
            session_id: &draft.session_id,
            operation,
            error,
        });
    }

    fn invalid_state(&self, draft: &UssdSession, detail: &str) -> UssdReply {
        self.observer.record(&MenuEvent::Anomaly {
            session_id: &draft.session_id,
            state: draft.current_menu,
            detail,
        });
        UssdReply::end(prompts::INVALID_SESSION_STATE)
    }
}

fn choose_action(draft: &mut UssdSession, choice: &str) -> UssdReply {
    match choice {
        "1" => {
            draft.current_menu = MenuState::RequestCode;
            UssdReply::con(prompts::ENTER_VOTER_ID)
        }
        "2" => {
            draft.current_menu = MenuState::VerifyId;
            UssdReply::con(prompts::ENTER_VOTER_ID)
        }
        _ => UssdReply::end(prompts::INVALID_OPTION_DIAL_AGAIN),
    }
}

fn is_verification_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
