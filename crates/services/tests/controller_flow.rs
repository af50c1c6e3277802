use std::sync::Arc;

use backend::{Backend, InMemoryBackend, ProfileRepository};
use quiz_core::model::{AttemptRecord, Operation, Role, UserId};
use quiz_core::time::{fixed_clock, fixed_now};
use services::{DeleteUserError, NewUser, SessionController, SignUpError, View};

fn new_user(name: &str, email: &str, role: Role, child_id: Option<UserId>) -> NewUser {
    NewUser {
        name: name.to_owned(),
        email: email.to_owned(),
        password: "pw".to_owned(),
        role,
        child_id,
    }
}

fn setup() -> (InMemoryBackend, Arc<SessionController>) {
    let memory = InMemoryBackend::with_clock(fixed_clock());
    let controller = SessionController::new(Backend::from_memory(memory.clone()), fixed_clock());
    controller.spawn_auth_listener();
    (memory, controller)
}

#[tokio::test]
async fn sign_in_event_populates_session_and_caches() {
    let (memory, controller) = setup();
    let student = memory
        .seed_user("kid@example.com", "pw", "Kid", Role::Student)
        .unwrap();
    memory
        .seed_attempt(
            AttemptRecord::new(student, Operation::Addition, 1, 80, 20.0, fixed_now()).unwrap(),
        )
        .unwrap();

    controller.login("kid@example.com", "pw").await.unwrap();

    let mut rx = controller.subscribe();
    rx.wait_for(|s| s.current_user.is_some() && !s.users.is_empty() && !s.progress.is_empty())
        .await
        .unwrap();

    let state = controller.state();
    assert_eq!(state.current_user.unwrap().id(), student);
    assert_eq!(state.view, View::Dashboard);
    assert_eq!(state.progress.score(student, Operation::Addition, 1), Some(80));
}

#[tokio::test]
async fn bad_credentials_abort_without_touching_state() {
    let (_memory, controller) = setup();

    let err = controller.login("ghost@example.com", "pw").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid login credentials");

    let state = controller.state();
    assert!(state.current_user.is_none());
    assert_eq!(state.view, View::Login);
    assert!(!state.is_loading);
}

#[tokio::test]
async fn logout_event_clears_caches_and_returns_to_login() {
    let (memory, controller) = setup();
    memory
        .seed_user("kid@example.com", "pw", "Kid", Role::Student)
        .unwrap();
    controller.login("kid@example.com", "pw").await.unwrap();

    let mut rx = controller.subscribe();
    rx.wait_for(|s| s.current_user.is_some()).await.unwrap();

    controller.logout().await.unwrap();
    rx.wait_for(|s| s.current_user.is_none()).await.unwrap();

    let state = controller.state();
    assert_eq!(state.view, View::Login);
    assert!(state.users.is_empty());
    assert!(state.progress.is_empty());
}

#[tokio::test]
async fn overlapping_logins_resolve_to_the_last_auth_event() {
    let (memory, controller) = setup();
    memory.seed_user("a@x.com", "pw", "A", Role::Teacher).unwrap();
    let b = memory.seed_user("b@x.com", "pw", "B", Role::Teacher).unwrap();

    let (first, second) = tokio::join!(
        controller.login("a@x.com", "pw"),
        controller.login("b@x.com", "pw"),
    );
    first.unwrap();
    second.unwrap();

    let mut rx = controller.subscribe();
    let final_session = memory.current_session().unwrap();
    rx.wait_for(|s| {
        s.current_user
            .as_ref()
            .is_some_and(|u| u.id() == final_session.user_id)
    })
    .await
    .unwrap();

    // no mixture: the in-memory service ran the calls in order, so the
    // second sign-in owns the session
    assert_eq!(final_session.user_id, b);
}

#[tokio::test]
async fn parent_signup_with_missing_child_reports_partial_success() {
    let (memory, controller) = setup();

    let err = controller
        .sign_up(new_user(
            "Pat",
            "pat@example.com",
            Role::Parent,
            Some(UserId::random()),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SignUpError::LinkFailed { .. }));

    // phase 1 stuck: account exists, profile has no child link
    let session = memory.current_session().unwrap();
    let profile = memory.get_profile(session.user_id).await.unwrap();
    assert_eq!(profile.child_id, None);
    assert_eq!(profile.role, Role::Parent);
}

#[tokio::test]
async fn parent_signup_with_real_child_links_in_second_phase() {
    let (memory, controller) = setup();
    let child = memory
        .seed_user("kid@example.com", "pw", "Kid", Role::Student)
        .unwrap();

    controller
        .sign_up(new_user("Pat", "pat@example.com", Role::Parent, Some(child)))
        .await
        .unwrap();

    let session = memory.current_session().unwrap();
    let profile = memory.get_profile(session.user_id).await.unwrap();
    assert_eq!(profile.child_id, Some(child));
}

#[tokio::test]
async fn add_user_replaces_the_callers_session() {
    let (memory, controller) = setup();
    memory
        .seed_user("admin@example.com", "pw", "Admin", Role::Admin)
        .unwrap();
    controller.login("admin@example.com", "pw").await.unwrap();

    let mut rx = controller.subscribe();
    rx.wait_for(|s| s.current_user.is_some()).await.unwrap();

    controller
        .add_user(new_user("Kid", "kid@example.com", Role::Student, None))
        .await
        .unwrap();

    // identity creation authenticated as the new user
    rx.wait_for(|s| {
        s.current_user
            .as_ref()
            .is_some_and(|u| u.email() == "kid@example.com")
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn delete_user_removes_target_from_both_caches() {
    let (memory, controller) = setup();
    memory
        .seed_user("admin@example.com", "pw", "Admin", Role::Admin)
        .unwrap();
    let target = memory
        .seed_user("kid@example.com", "pw", "Kid", Role::Student)
        .unwrap();
    memory
        .seed_attempt(
            AttemptRecord::new(target, Operation::Subtraction, 2, 60, 30.0, fixed_now()).unwrap(),
        )
        .unwrap();

    controller.login("admin@example.com", "pw").await.unwrap();
    let mut rx = controller.subscribe();
    rx.wait_for(|s| s.current_user.is_some()).await.unwrap();

    controller.delete_user(target).await.unwrap();

    let state = controller.state();
    assert!(state.users.iter().all(|u| u.id() != target));
    assert!(!state.progress.contains_student(target));
}

#[tokio::test]
async fn deleting_the_signed_in_account_is_rejected() {
    let (memory, controller) = setup();
    let admin = memory
        .seed_user("admin@example.com", "pw", "Admin", Role::Admin)
        .unwrap();
    controller.login("admin@example.com", "pw").await.unwrap();

    let mut rx = controller.subscribe();
    rx.wait_for(|s| s.current_user.is_some()).await.unwrap();

    let err = controller.delete_user(admin).await.unwrap_err();
    assert!(matches!(err, DeleteUserError::CannotDeleteSelf));

    // nothing happened: the admin is still cached
    assert!(controller.state().users.iter().any(|u| u.id() == admin));
}

#[tokio::test]
async fn failed_cache_refresh_keeps_the_stale_snapshot() {
    let (memory, controller) = setup();
    memory
        .seed_user("kid@example.com", "pw", "Kid", Role::Student)
        .unwrap();
    controller.login("kid@example.com", "pw").await.unwrap();

    let mut rx = controller.subscribe();
    rx.wait_for(|s| !s.users.is_empty()).await.unwrap();
    let before = controller.state().users;

    memory.set_fail_profile_reads(true);
    controller.refresh_users().await;

    assert_eq!(controller.state().users, before);
}
