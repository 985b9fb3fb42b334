use anyhow::Result;

use super::build;
use super::format_servers;
use crate::configuration::ConfigKey;

#[test]
fn it_lists_supported_servers() {
    insta::assert_snapshot!(format_servers(), @r###"
    - ollama (default port 11434, health check every 500ms for up to 30s)
    - mlx_lm (default port 8080, health check every 1000ms for up to 60s)
    "###);
}

#[test]
fn it_accepts_chat_as_an_alias_of_connect() -> Result<()> {
    let matches = build().try_get_matches_from(vec!["lmdeck", "chat", "-b", "mlx_lm", "-m", "qwen"])?;

    let (name, subcmd_matches) = matches.subcommand().unwrap();
    assert_eq!(name, "connect");
    assert_eq!(
        subcmd_matches
            .get_one::<String>(&ConfigKey::Backend.to_string())
            .unwrap(),
        "mlx_lm"
    );
    assert_eq!(
        subcmd_matches
            .get_one::<String>(&ConfigKey::Model.to_string())
            .unwrap(),
        "qwen"
    );

    return Ok(());
}

#[test]
fn it_rejects_unknown_backends() {
    let res = build().try_get_matches_from(vec!["lmdeck", "connect", "--backend", "llamacpp"]);

    assert!(res.is_err());
}
