//! end to end tests of the dispatcher: gate, checks, execution and logs

mod common;

use common::{TestBastion, config_in};
use gatehouse::Error;
use gatehouse_db::LogStore;
use gatehouse_state::{OWNERS_GROUP, Role, TotpState, read_authorized_keys, test_utils::ed25519_key_line};
use gatehouse_types::AmbiguityPolicy;

#[tokio::test]
async fn test_range_grant_covers_address() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    t.run("alice", "self access add --access root@10.0.0.0/8:22")
        .await
        .unwrap();
    t.run("alice", "connect --access root@10.1.2.3:22").await.unwrap();

    let requests = t.launcher.requests();
    assert_eq!(requests.len(), 1);
    let destination = &requests[0].destination;
    assert_eq!(destination.host, "10.1.2.3");
    assert_eq!(destination.user, "root");
    assert_eq!(destination.port, 22);
    assert_eq!(destination.prefix.unwrap().to_string(), "10.0.0.0/8");
}

#[tokio::test]
async fn test_alias_resolves_to_stored_destination() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    t.run("alice", "self access add --access root@example.com:22 --alias web")
        .await
        .unwrap();
    t.run("alice", "connect --access web").await.unwrap();

    let requests = t.launcher.requests();
    assert_eq!(requests[0].destination.short_string(), "root@example.com:22 (web)");
}

#[tokio::test]
async fn test_alias_on_two_ports_is_ambiguous() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    t.run("alice", "self access add --access user@db:5432 --alias db --force")
        .await
        .unwrap();
    t.run("alice", "self access add --access user@db:2222 --alias db --force")
        .await
        .unwrap();

    match t.run("alice", "connect --access user@db").await {
        Err(Error::Ambiguous(candidates)) => assert_eq!(candidates.len(), 2),
        other => panic!("expected ambiguity, got {other:?}"),
    }
    assert!(t.launcher.requests().is_empty());
}

#[tokio::test]
async fn test_prompt_policy_still_fails_without_an_answer() {
    let t = TestBastion::with_config(|dir| {
        let mut config = config_in(dir, "bastion-test");
        config.access.ambiguity = AmbiguityPolicy::Prompt;
        config
    })
    .await;
    t.add_user("alice").await;
    t.run("alice", "self access add --access user@db:5432 --alias db --force")
        .await
        .unwrap();
    t.run("alice", "self access add --access user@db:2222 --alias db --force")
        .await
        .unwrap();

    // the test dispatcher declines every prompt
    assert!(matches!(
        t.run("alice", "connect --access user@db").await,
        Err(Error::Ambiguous(_))
    ));
}

#[tokio::test]
async fn test_unresolvable_host_needs_force() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    let err = t
        .run("alice", "self access add --access root@nowhere.invalid")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_revoked_grant_is_denied() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    t.run("alice", "self access add --access root@test.com:22")
        .await
        .unwrap();
    t.run("alice", "self access del --access root@test.com:22")
        .await
        .unwrap();

    let err = t.run("alice", "connect --access root@test.com:22").await.unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
    assert!(t.launcher.requests().is_empty());
}

#[tokio::test]
async fn test_duplicate_and_unknown_grants() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    t.run("alice", "self access add --access root@test.com:22")
        .await
        .unwrap();
    assert!(matches!(
        t.run("alice", "self access add --access root@test.com:22").await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        t.run("alice", "self access del --access root@example.com:22").await,
        Err(Error::NotFound(_))
    ));

    let listed = t.run("alice", "self access list").await.unwrap();
    assert!(listed.output.contains("test.com"));
}

#[tokio::test]
async fn test_same_destination_under_two_aliases() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    t.run("alice", "self access add --access root@example.com:22 --alias web")
        .await
        .unwrap();
    t.run("alice", "self access add --access root@example.com:22 --alias www")
        .await
        .unwrap();

    // the unaliased grant was never added
    assert!(matches!(
        t.run("alice", "self access del --access root@example.com:22").await,
        Err(Error::NotFound(_))
    ));
    t.run("alice", "self access del --access root@example.com:22 --alias web")
        .await
        .unwrap();

    let listed = t.run("alice", "self access list").await.unwrap();
    assert!(!listed.output.contains("Alias: web "));
    assert!(listed.output.contains("Alias: www "));
    t.run("alice", "connect --access www").await.unwrap();
}

#[tokio::test]
async fn test_reserved_words_cannot_be_aliases() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    let err = t
        .run("alice", "self access add --access root@example.com --alias connect")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_group_owner_gate() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    t.add_user("bob").await;
    t.add_user("carol").await;

    t.run("root", "group create --group ops --owner alice")
        .await
        .unwrap();

    // bob holds no role in ops and does not own the bastion
    let err = t
        .run("bob", "group aclkeeper add --group ops --account carol")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
    assert!(!t.user("carol").await.has_role("ops", Role::AclKeeper));

    // the group owner and the bastion owner both pass
    t.run("alice", "group aclkeeper add --group ops --account carol")
        .await
        .unwrap();
    t.run("root", "group gatekeeper add --group ops --account bob")
        .await
        .unwrap();

    let carol = t.user("carol").await;
    assert!(carol.has_role("ops", Role::AclKeeper));
    assert!(!carol.has_role("ops", Role::Member));
    assert!(t.user("bob").await.has_role("ops", Role::GateKeeper));
}

#[tokio::test]
async fn test_bastion_owner_passes_any_group_owner_gate() {
    let t = TestBastion::new().await;
    for name in ["alice", "carol", "dave", "erin"] {
        t.add_user(name).await;
    }
    let directory = t.bastion.directory();
    directory.provision_group(OWNERS_GROUP, "dave").await.unwrap();
    directory
        .grant_role(OWNERS_GROUP, "erin", Role::Member)
        .await
        .unwrap();
    t.run("root", "group create --group ops --owner alice")
        .await
        .unwrap();

    // dave owns the bastion but holds no role in ops
    t.run("dave", "group owner add --group ops --account carol")
        .await
        .unwrap();
    assert!(t.user("carol").await.has_role("ops", Role::Owner));

    // membership of owners is not ownership
    let err = t
        .run("erin", "group gatekeeper add --group ops --account carol")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));
    assert!(!t.user("carol").await.has_role("ops", Role::GateKeeper));
}

#[tokio::test]
async fn test_last_owner_cannot_leave() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    t.run("root", "group create --group ops --owner alice")
        .await
        .unwrap();

    let err = t
        .run("alice", "group owner del --group ops --account alice")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_group_access_reaches_members() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    t.add_user("bob").await;
    t.run("root", "group create --group ops --owner alice")
        .await
        .unwrap();

    t.run("alice", "group access add --group ops --access root@db1.example.net:22")
        .await
        .unwrap();
    assert!(matches!(
        t.run("bob", "connect --access root@db1.example.net:22").await,
        Err(Error::Authorization(_))
    ));
    assert!(matches!(
        t.run("bob", "group access list --group ops").await,
        Err(Error::Authorization(_))
    ));

    t.run("alice", "group member add --group ops --account bob")
        .await
        .unwrap();
    t.run("bob", "connect --access root@db1.example.net:22").await.unwrap();
    let listed = t.run("bob", "group access list --group ops").await.unwrap();
    assert!(listed.output.contains("db1.example.net"));

    let info = t.run("bob", "group info --group ops").await.unwrap();
    assert!(info.output.contains("alice"));
    assert!(info.output.contains("bob"));
}

#[tokio::test]
async fn test_group_delete_archives_group() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    t.run("root", "group create --group ops --owner alice")
        .await
        .unwrap();
    assert!(t.run("alice", "group list").await.unwrap().output.contains("ops"));

    assert!(matches!(
        t.run("alice", "group delete --group ops").await,
        Err(Error::Authorization(_))
    ));
    assert!(matches!(
        t.run("root", "group delete --group owners").await,
        Err(Error::Validation(_))
    ));
    t.run("root", "group delete --group ops").await.unwrap();

    assert!(t.bastion.directory().find_group("ops").await.unwrap().is_none());
    assert!(t.user("alice").await.groups.is_empty());
}

#[tokio::test]
async fn test_account_create_and_delete() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    let key = ed25519_key_line(42, "dave@laptop");

    // the key contains spaces, so it goes in as a single word
    let mut words = common::words("account create --account dave --public-key");
    words.push(key.clone());
    assert!(matches!(
        t.dispatcher().dispatch("alice", &words, None).await,
        Err(Error::Authorization(_))
    ));
    t.dispatcher().dispatch("root", &words, None).await.unwrap();

    let dave = t.user("dave").await;
    let keys = read_authorized_keys(&dave.authorized_keys_path()).await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].to_string(), key);

    assert!(matches!(
        t.dispatcher().dispatch("root", &words, None).await,
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        t.run("root", "account create --account bg_sneaky --public-key x").await,
        Err(Error::Validation(_))
    ));

    t.run("root", "account delete --account dave").await.unwrap();
    assert!(!t.bastion.directory().is_managed_user("dave").await.unwrap());
    assert!(matches!(
        t.run("root", "account delete --account dave").await,
        Err(Error::NotFound(_))
    ));
}

#[tokio::test]
async fn test_ingress_keys() {
    let t = TestBastion::new().await;
    let alice = t.add_user("alice").await;

    let mut add = common::words("self ingress-key add --public-key");
    add.push(ed25519_key_line(7, "alice@phone"));
    t.dispatcher().dispatch("alice", &add, None).await.unwrap();
    assert!(matches!(
        t.dispatcher().dispatch("alice", &add, None).await,
        Err(Error::Validation(_))
    ));

    let keys = read_authorized_keys(&alice.authorized_keys_path()).await.unwrap();
    assert_eq!(keys.len(), 2);
    let listed = t.run("alice", "self ingress-key list").await.unwrap();
    assert!(listed.output.contains("alice@phone"));

    let del = format!("self ingress-key del --public-key {}", keys[1].blob);
    t.run("alice", &del).await.unwrap();

    // the last key stays
    let last = format!("self ingress-key del --public-key {}", keys[0].blob);
    assert!(matches!(t.run("alice", &last).await, Err(Error::Validation(_))));
    let keys = read_authorized_keys(&alice.authorized_keys_path()).await.unwrap();
    assert_eq!(keys.len(), 1);
}

#[tokio::test]
async fn test_totp_lifecycle() {
    let t = TestBastion::new().await;
    let alice = t.add_user("alice").await;

    t.run("alice", "self totp enable").await.unwrap();
    let state = TotpState::parse(&std::fs::read_to_string(alice.totp_path()).unwrap()).unwrap();
    assert_eq!(state.codes.len(), gatehouse_state::totp::EMERGENCY_CODE_COUNT);
    assert!(matches!(
        t.run("alice", "self totp enable").await,
        Err(Error::Validation(_))
    ));

    t.run("alice", "self totp regenerate-codes").await.unwrap();
    let regenerated =
        TotpState::parse(&std::fs::read_to_string(alice.totp_path()).unwrap()).unwrap();
    assert_eq!(regenerated.secret, state.secret);

    t.run("alice", "self totp disable").await.unwrap();
    assert!(!alice.totp_path().exists());
    assert!(t.run("alice", "info").await.unwrap().output.contains("disabled"));
}

#[tokio::test]
async fn test_egress_keys_and_known_hosts() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    let ssh = t.home("alice").join(".ssh");
    std::fs::create_dir_all(&ssh).unwrap();

    let listed = t.run("alice", "self egress-key list").await.unwrap();
    assert_eq!(listed.output, "no egress keys");

    std::fs::write(ssh.join("id_ed25519"), "private half").unwrap();
    std::fs::write(ssh.join("id_ed25519.pub"), ed25519_key_line(9, "alice@bastion")).unwrap();
    let listed = t.run("alice", "self egress-keys").await.unwrap();
    assert!(listed.output.contains("alice@bastion"));
    assert!(listed.output.contains("id_ed25519.pub"));

    std::fs::write(
        ssh.join("known_hosts"),
        "db1.example.net ssh-ed25519 AAAAC3Nza\nweb.example.net ssh-ed25519 AAAAC3Nzb\n",
    )
    .unwrap();
    t.run("alice", "self hostkey forget --hostkey db1.example.net")
        .await
        .unwrap();
    assert_eq!(
        std::fs::read_to_string(ssh.join("known_hosts")).unwrap(),
        "web.example.net ssh-ed25519 AAAAC3Nzb\n"
    );

    let err = t.run("alice", "self hostkey forget").await.unwrap_err();
    assert!(matches!(err, Error::MissingArguments(_)));
}

#[tokio::test]
async fn test_denied_call_is_logged() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    let err = t.run("alice", "group create --group ops --owner alice").await.unwrap_err();
    assert!(err.is_denial());

    let logs = t.bastion.logs().list_logs(Some("group create"), 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].allowed);
    assert!(logs[0].session_end_date.is_some());

    let sessions = t.run("alice", "self sessions list").await.unwrap();
    assert!(sessions.output.contains("group create"));
    assert!(sessions.output.contains("denied"));
}

#[tokio::test]
async fn test_denied_connect_logs_requested_destination() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    let err = t.run("alice", "connect --access root@test.com:22").await.unwrap_err();
    assert!(matches!(err, Error::Authorization(_)));

    let logs = t.bastion.logs().list_logs(Some("connect"), 10).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert!(!logs[0].allowed);
    assert_eq!(logs[0].host_to, "test.com");
    assert_eq!(logs[0].user_to, "root");
    assert_eq!(logs[0].port_to, 22);
}

#[tokio::test]
async fn test_arguments_are_validated() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;

    let err = t.run("alice", "self access add").await.unwrap_err();
    assert!(matches!(err, Error::MissingArguments(_)));
    assert_eq!(err.exit_code(), 2);

    let err = t.run("alice", "self access add help").await.unwrap_err();
    assert!(err.to_string().contains("usage: self access add"));

    let err = t
        .run("alice", "self access add --access root@test.com --bogus 1")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    assert!(matches!(
        t.run("alice", "frobnicate").await,
        Err(Error::UnknownOperation(_))
    ));
}

#[tokio::test]
async fn test_disabled_operation() {
    let t = TestBastion::with_config(|dir| {
        let mut config = config_in(dir, "bastion-test");
        config.general.disabled_operations = vec!["self totp disable".into()];
        config
    })
    .await;
    t.add_user("alice").await;

    let err = t.run("alice", "self totp disable").await.unwrap_err();
    assert!(matches!(err, Error::Disabled(_)));
    assert_eq!(err.exit_code(), 126);
}

#[tokio::test]
async fn test_nothing_is_queued_without_a_daemon() {
    let t = TestBastion::new().await;
    t.add_user("alice").await;
    t.run("alice", "self access add --access root@test.com:22")
        .await
        .unwrap();
    assert_eq!(t.bastion.outbox().len().await.unwrap(), 0);
}
