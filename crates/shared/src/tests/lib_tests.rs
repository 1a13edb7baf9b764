use crate::{
    domain::{MenuState, UssdSession},
    error::BackendErrorCode,
    protocol::{
        latest_input, HasVotedResponse, SubmitVoteResponse, UssdReply, VerifyIdentityResponse,
    },
};

#[test]
fn latest_input_takes_last_star_token() {
    assert_eq!(latest_input(""), None);
    assert_eq!(latest_input("1"), Some("1"));
    assert_eq!(latest_input("1*2*123456"), Some("123456"));
    assert_eq!(latest_input("1*"), None);
    assert_eq!(latest_input("1* "), None);
}

#[test]
fn reply_renders_con_and_end_markers() {
    assert_eq!(UssdReply::con("Enter your Voter ID:").to_string(), "CON Enter your Voter ID:");
    assert_eq!(UssdReply::end("Bye").to_string(), "END Bye");
    assert!(UssdReply::end("Bye").is_terminal());
    assert!(!UssdReply::con("More").is_terminal());
}

#[test]
fn reply_parses_rendered_body() {
    assert_eq!(
        UssdReply::parse("CON Welcome\n\n1. Vote"),
        Some(UssdReply::con("Welcome\n\n1. Vote"))
    );
    assert_eq!(UssdReply::parse("END Done"), Some(UssdReply::end("Done")));
    assert_eq!(UssdReply::parse("garbage"), None);
}

#[test]
fn session_round_trips_through_json_with_camel_case_fields() {
    let mut session = UssdSession::new("ATUid_1", "+254700000001");
    session.current_menu = MenuState::BallotPosition;
    session.election_id = Some("e-1".into());
    session
        .voting_progress
        .selections
        .insert("p-1".into(), "c-2".into());

    let json = serde_json::to_value(&session).expect("serialize");
    assert_eq!(json["currentMenu"], "BALLOT_POSITION");
    assert_eq!(json["votingProgress"]["selections"]["p-1"], "c-2");

    let back: UssdSession = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, session);
}

#[test]
fn unrecognised_menu_state_decodes_as_unknown() {
    let state: MenuState = serde_json::from_str("\"SOMETHING_NEW\"").expect("decode");
    assert_eq!(state, MenuState::Unknown);
}

#[test]
fn verify_failure_keeps_classified_error_code() {
    let response: VerifyIdentityResponse = serde_json::from_str(
        r#"{"success":false,"error":"Code expired","errorCode":"CODE_EXPIRED"}"#,
    )
    .expect("decode");
    let err = response.into_result().expect_err("should fail");
    assert_eq!(err.code, BackendErrorCode::CodeExpired);
    assert_eq!(err.message_or("fallback"), "Code expired");
}

#[test]
fn unknown_error_code_is_unclassified() {
    let response: SubmitVoteResponse =
        serde_json::from_str(r#"{"success":false,"errorCode":"QUOTA"}"#).expect("decode");
    let err = response.into_result().expect_err("should fail");
    assert_eq!(err.code, BackendErrorCode::Unclassified);
    assert_eq!(err.message_or("Unknown error"), "Unknown error");
}

#[test]
fn has_voted_treats_missing_success_as_ok() {
    let response: HasVotedResponse = serde_json::from_str(r#"{"hasVoted":true}"#).expect("decode");
    assert!(response.into_result().expect("ok"));

    let response: HasVotedResponse =
        serde_json::from_str(r#"{"success":false,"hasVoted":false,"error":"down"}"#)
            .expect("decode");
    assert!(response.into_result().is_err());
}
