//! Screen texts shown to the voter, without the `CON`/`END` marker.

pub const ACTION_OPTIONS: &str = "1. Request Verification Code\n2. Vote in Election";
pub const ENTER_VOTER_ID: &str = "Enter your Voter ID:";
pub const ENTER_CODE: &str =
    "A 6-digit code has been sent to your phone.\n\nEnter the code to proceed:";

pub const NO_ACTIVE_ELECTIONS: &str = "No active elections available.\n\nPlease try again later.";
pub const INVALID_OPTION_DIAL_AGAIN: &str = "Invalid option. Please dial again.";
pub const INVALID_ELECTION_SELECTION: &str = "Invalid election selection.";
pub const VOTER_ID_REQUIRED: &str = "Voter ID is required.";
pub const ELECTION_NOT_SELECTED: &str = "Election not selected. Please dial again.";
pub const ALREADY_VOTED: &str =
    "You have already cast your ballot in this election.\n\nThank you for participating!";
pub const CODE_REQUIRED: &str = "Verification code is required.";
pub const INVALID_CODE_FORMAT: &str = "Invalid code format.\n\nCode must be 6 digits.";
pub const THANK_YOU: &str = "Thank you for participating!";
pub const TRY_AGAIN: &str = "Please try again.";
pub const TRY_AGAIN_OR_SUPPORT: &str = "Please try again or contact support.";

pub const INVALID_INPUT: &str = "Invalid input.";
pub const INVALID_OPTION: &str = "Invalid option.";
pub const INVALID_CHOICE: &str = "Invalid choice. Try again.";
pub const VOTING_CANCELLED: &str = "Voting cancelled.\n\nYour vote was not submitted.";
pub const NO_SELECTIONS: &str = "No selections made.\n\nVoting cancelled.";
pub const BALLOT_UNAVAILABLE: &str = "Failed to load ballot.\n\nPlease try again later.";
pub const BALLOT_UNAVAILABLE_RETRY: &str = "Failed to load ballot.\n\nPlease try again.";

pub const REVIEW_HEADER: &str = "Review your choices:";
pub const REVIEW_OPTIONS: &str = "1. Submit Vote\n2. Change Choices\n0. Cancel";
pub const FINAL_CONFIRM: &str = "Are you sure you want to submit?\nThis action cannot be undone.\n\n1. Yes, Submit\n0. No, Go Back";
pub const SUBMISSION_SUPPORT: &str = "Please contact support if this persists.";

pub const INVALID_SESSION_STATE: &str = "Invalid session state. Please try again.";

pub fn welcome_menu() -> String {
    format!("Welcome\n\n{ACTION_OPTIONS}")
}

pub fn welcome_to(election_name: &str) -> String {
    format!("Welcome to {election_name}\n\n{ACTION_OPTIONS}")
}

pub fn selected_election(election_name: &str) -> String {
    format!("{election_name}\n\n{ACTION_OPTIONS}")
}

pub fn election_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut text = String::from("Select Election:");
    for (index, name) in names.into_iter().enumerate() {
        text.push_str(&format!("\n{}. {name}", index + 1));
    }
    text
}

pub fn code_sent(short_code: &str) -> String {
    format!("Verification code sent to your phone.\n\nDial {short_code} again to vote.")
}

pub fn request_new_code(short_code: &str) -> String {
    format!("Dial {short_code} to request a new code.")
}

pub fn with_hint(message: &str, hint: &str) -> String {
    format!("{message}\n\n{hint}")
}

pub fn submission_failed(message: &str) -> String {
    format!("Submission Failed: {message}\n\n{SUBMISSION_SUPPORT}")
}

pub fn vote_submitted(receipt_code: &str) -> String {
    format!("Vote Submitted Successfully!\n\nReceipt: {receipt_code}\n\nThank you for voting!")
}
