use super::*;

#[test]
fn dial_defaults_to_local_gateway_and_short_code() {
    let cli = Cli::try_parse_from(["tools", "dial", "--phone", "+254700000001"]).expect("parse");
    match cli.command {
        Command::Dial {
            server_url,
            phone,
            session_id,
            service_code,
        } => {
            assert_eq!(server_url, "http://127.0.0.1:8080");
            assert_eq!(phone, "+254700000001");
            assert_eq!(session_id, None);
            assert_eq!(service_code, "*384#");
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn dial_requires_a_phone_number() {
    assert!(Cli::try_parse_from(["tools", "dial"]).is_err());
}

#[test]
fn purge_sessions_accepts_database_url() {
    let cli = Cli::try_parse_from([
        "tools",
        "purge-sessions",
        "--database-url",
        "sqlite://./tmp/sessions.db",
    ])
    .expect("parse");
    assert!(matches!(
        cli.command,
        Command::PurgeSessions { database_url } if database_url == "sqlite://./tmp/sessions.db"
    ));
}
