use super::*;

#[test]
fn request_arg_splits_on_first_equals() {
    assert_eq!(parse_request_arg("siteName=My Site"), Ok(("siteName".into(), "My Site".into())));
    assert_eq!(parse_request_arg("returnTo=/a/?b=c"), Ok(("returnTo".into(), "/a/?b=c".into())));
}

#[test]
fn request_arg_allows_empty_value() {
    assert_eq!(parse_request_arg("privacyPolicy="), Ok(("privacyPolicy".into(), String::new())));
}

#[test]
fn request_arg_rejects_missing_key_or_separator() {
    assert!(parse_request_arg("=value").is_err());
    assert!(parse_request_arg("novalue").is_err());
}

#[test]
fn cli_parses_login_with_args() {
    let cli = Cli::try_parse_from([
        "browserid-shim",
        "--base-url",
        "http://localhost:8000",
        "login",
        "--next",
        "/home/",
        "--arg",
        "foo=bar",
    ])
    .unwrap();
    assert_eq!(cli.base_url.as_deref(), Some("http://localhost:8000"));
    match cli.command {
        Command::Login { next, args } => {
            assert_eq!(next.as_deref(), Some("/home/"));
            assert_eq!(args, vec![("foo".to_string(), "bar".to_string())]);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn cli_rejects_malformed_arg() {
    assert!(Cli::try_parse_from(["browserid-shim", "login", "--arg", "oops"]).is_err());
}
