//! Peer directory behavior against an in-memory store.

use chrono::{Duration, Utc};

use lamess_core::error::ErrorKind;
use lamess_database::migration::run_migrations;
use lamess_database::repositories::{SessionRepository, UserRepository};
use lamess_database::DatabasePool;
use lamess_domain::{PeerDirectory, Session};
use lamess_entity::profile::UserProfile;
use lamess_presence::packet::process_session_id;

async fn directory() -> PeerDirectory {
    let db = DatabasePool::connect_in_memory().await.expect("open db");
    run_migrations(db.pool()).await.expect("migrate");
    PeerDirectory::new(
        UserRepository::new(db.pool().clone()),
        SessionRepository::new(db.pool().clone()),
    )
}

fn profile() -> UserProfile {
    UserProfile::new("nicename", "N", "u@e.co").expect("profile")
}

fn session(session_id: &str, index: u8) -> Session {
    Session::new(
        session_id,
        index,
        Utc::now() + Duration::minutes(4),
        "127.0.0.1:4000",
    )
}

#[tokio::test]
async fn test_new_user_is_idempotent() {
    let directory = directory().await;
    let first = directory.new_user(&profile()).await.expect("create");
    let second = directory.new_user(&profile()).await.expect("upsert");
    assert!(first.is_persisted());
    assert_eq!(first.id(), second.id());
}

#[tokio::test]
async fn test_attach_session_once_then_noop_then_conflict() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");

    let mut session_a = session("A1", 0);
    assert!(directory
        .add_session(&user, &mut session_a)
        .await
        .expect("first attach"));
    assert!(session_a.is_persisted());

    // Same instance again: already attached to this user.
    assert!(!directory
        .add_session(&user, &mut session_a)
        .await
        .expect("re-attach is a no-op"));

    // A fresh instance reusing the session ID conflicts in the store.
    let mut duplicate = session("A1", 1);
    let err = directory
        .add_session(&user, &mut duplicate)
        .await
        .expect_err("duplicate session id must fail");
    assert_eq!(err.kind, ErrorKind::SaveFailed);
}

#[tokio::test]
async fn test_attach_to_another_owner_is_a_state_violation() {
    let directory = directory().await;
    let owner = directory.new_user(&profile()).await.expect("owner");
    let other_profile = UserProfile::new("othername", "O", "o@e.co").expect("profile");
    let other = directory.new_user(&other_profile).await.expect("other");

    let mut owned = session("A1", 0);
    directory
        .add_session(&owner, &mut owned)
        .await
        .expect("attach");

    let err = directory
        .add_session(&other, &mut owned)
        .await
        .expect_err("session of another owner");
    assert_eq!(err.kind, ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_main_session_has_lowest_device_index() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");

    for (id, index) in [("S2", 2u8), ("S0", 0), ("S1", 1)] {
        let mut s = session(id, index);
        directory.add_session(&user, &mut s).await.expect("attach");
    }

    let main = directory
        .main_session(&user)
        .await
        .expect("query")
        .expect("some active session");
    assert_eq!(main.session_id(), "S0");
    assert_eq!(main.device_preference_index(), 0);
}

#[tokio::test]
async fn test_main_session_tie_breaks_by_insertion_order() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");

    for id in ["first", "second"] {
        let mut s = session(id, 1);
        directory.add_session(&user, &mut s).await.expect("attach");
    }

    let main = directory
        .main_session(&user)
        .await
        .expect("query")
        .expect("some active session");
    assert_eq!(main.session_id(), "first");
}

#[tokio::test]
async fn test_main_session_ignores_expired_and_handles_none() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");
    assert!(directory.main_session(&user).await.expect("query").is_none());

    let mut expired = Session::new(
        "gone",
        0,
        Utc::now() + Duration::milliseconds(1),
        "127.0.0.1:4000",
    );
    directory
        .add_session(&user, &mut expired)
        .await
        .expect("attach");
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(directory.main_session(&user).await.expect("query").is_none());
}

#[tokio::test]
async fn test_renew_moves_expiry_to_the_stored_instant() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");
    let mut s = session("A1", 0);
    directory.add_session(&user, &mut s).await.expect("attach");

    let new_expiry = Utc::now() + Duration::minutes(10);
    directory.renew(&mut s, new_expiry).await.expect("renew");
    assert_eq!(s.expiry_time(), new_expiry);

    let reloaded = directory
        .session_by_id("A1")
        .await
        .expect("query")
        .expect("present");
    assert_eq!(reloaded.expiry_time(), new_expiry);
    assert_eq!(reloaded.owner_user_id(), user.id());
}

#[tokio::test]
async fn test_renew_rejects_past_instants_and_unpersisted_sessions() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");
    let mut attached = session("A1", 0);
    directory
        .add_session(&user, &mut attached)
        .await
        .expect("attach");

    let err = directory
        .renew(&mut attached, Utc::now() - Duration::seconds(5))
        .await
        .expect_err("past renew must fail");
    assert_eq!(err.kind, ErrorKind::InvalidRenewTime);

    // The boundary is non-strict: renewing to exactly now also fails.
    let err = directory
        .renew(&mut attached, Utc::now())
        .await
        .expect_err("renew to the current instant must fail");
    assert_eq!(err.kind, ErrorKind::InvalidRenewTime);

    let mut loose = session("A2", 0);
    let err = directory
        .renew(&mut loose, Utc::now() + Duration::minutes(5))
        .await
        .expect_err("unpersisted renew must fail");
    assert_eq!(err.kind, ErrorKind::RenewFailure);
}

#[tokio::test]
async fn test_sign_off_expires_the_session() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");
    let mut s = session("A1", 0);
    directory.add_session(&user, &mut s).await.expect("attach");
    assert!(!s.is_expired());

    directory.sign_off(&mut s).await.expect("sign off");
    assert!(s.is_expired());

    let reloaded = directory
        .session_by_id("A1")
        .await
        .expect("query")
        .expect("present");
    assert!(reloaded.is_expired());

    let mut loose = session("A2", 0);
    let err = directory
        .sign_off(&mut loose)
        .await
        .expect_err("unpersisted sign-off must fail");
    assert_eq!(err.kind, ErrorKind::InvalidState);
}

#[tokio::test]
async fn test_session_owner_resolves_through_the_store() {
    let directory = directory().await;
    let user = directory.new_user(&profile()).await.expect("user");
    let mut s = session("A1", 0);
    directory.add_session(&user, &mut s).await.expect("attach");

    let owner = directory
        .session_owner(&s)
        .await
        .expect("query")
        .expect("owner present");
    assert_eq!(owner.profile().username(), "nicename");
}

#[tokio::test]
async fn test_is_self_matches_the_process_session() {
    let own = Session::new(
        process_session_id(),
        1,
        Utc::now() + Duration::minutes(5),
        "127.0.0.1:4000",
    );
    assert!(own.is_self());

    let foreign = session(&uuid::Uuid::new_v4().to_string(), 1);
    assert!(!foreign.is_self());
}
