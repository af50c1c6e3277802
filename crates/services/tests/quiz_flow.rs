use std::sync::Arc;

use backend::{Backend, InMemoryBackend, ProgressRepository};
use quiz_core::Clock;
use quiz_core::model::{Operation, QuizSettings, Role};
use services::quiz::{spawn_quiz, QuizPhase, QUESTION_COUNT};
use services::{SessionController, View};

async fn signed_in_student(role: Role) -> (InMemoryBackend, Arc<SessionController>) {
    let memory = InMemoryBackend::new();
    let controller = SessionController::new(Backend::from_memory(memory.clone()), Clock::default_clock());
    controller.spawn_auth_listener();

    memory.seed_user("kid@example.com", "pw", "Kid", role).unwrap();
    controller.login("kid@example.com", "pw").await.unwrap();

    let mut rx = controller.subscribe();
    rx.wait_for(|s| s.current_user.is_some()).await.unwrap();
    (memory, controller)
}

#[tokio::test(start_paused = true)]
async fn perfect_addition_run_scores_one_hundred_and_persists() {
    let (memory, controller) = signed_in_student(Role::Student).await;
    let student = controller.state().current_user.unwrap().id();

    let settings = QuizSettings::new(Operation::Addition, 1, 30);
    let handle = spawn_quiz(Arc::clone(&controller), settings);
    assert_eq!(controller.state().view, View::Quiz);

    let mut snapshots = handle.snapshots();
    loop {
        let snap = snapshots.borrow().clone();
        match snap.phase {
            QuizPhase::AwaitingAnswer => {
                let question = snap.question.expect("awaiting phase carries a question");
                handle.submit(question.answer).await;
                snapshots.changed().await.unwrap();
            }
            QuizPhase::Complete => break,
            _ => snapshots.changed().await.unwrap(),
        }
    }
    handle.wait().await;

    let state = controller.state();
    assert_eq!(state.view, View::Results);
    let summary = state.quiz_summary.expect("summary published on completion");
    assert_eq!(summary.score(), 100);
    assert_eq!(summary.results().len(), QUESTION_COUNT);

    // persisted attempt row and refreshed index
    let rows = memory.list_attempts().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score, 100);
    assert_eq!(state.progress.score(student, Operation::Addition, 1), Some(100));
}

#[tokio::test(start_paused = true)]
async fn non_student_finishing_a_quiz_changes_nothing() {
    let (memory, controller) = signed_in_student(Role::Teacher).await;

    let settings = QuizSettings::new(Operation::Multiplication, 2, 5);
    let handle = spawn_quiz(Arc::clone(&controller), settings);
    let view_before_finish = controller.state().view;

    // let every question time out
    handle.wait().await;

    let state = controller.state();
    assert_eq!(state.view, view_before_finish);
    assert!(state.quiz_summary.is_none());
    assert!(memory.list_attempts().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timed_out_run_scores_zero() {
    let (memory, controller) = signed_in_student(Role::Student).await;
    let student = controller.state().current_user.unwrap().id();

    let settings = QuizSettings::new(Operation::Subtraction, 1, 2);
    let handle = spawn_quiz(Arc::clone(&controller), settings);
    handle.wait().await;

    let state = controller.state();
    assert_eq!(state.view, View::Results);
    let summary = state.quiz_summary.expect("summary published on completion");
    assert_eq!(summary.score(), 0);
    assert!(summary.results().iter().all(|r| r.user_answer.is_none()));
    assert_eq!(
        state.progress.score(student, Operation::Subtraction, 1),
        Some(0)
    );
    assert_eq!(memory.list_attempts().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retake_overwrites_the_stage_score_in_the_index() {
    let (_memory, controller) = signed_in_student(Role::Student).await;
    let student = controller.state().current_user.unwrap().id();
    let settings = QuizSettings::new(Operation::Addition, 1, 2);

    // first run: all timeouts, scores 0
    spawn_quiz(Arc::clone(&controller), settings).wait().await;
    assert_eq!(
        controller.state().progress.score(student, Operation::Addition, 1),
        Some(0)
    );

    // second run: all correct, overwrites the stage entry
    let handle = spawn_quiz(Arc::clone(&controller), QuizSettings::new(Operation::Addition, 1, 30));
    let mut snapshots = handle.snapshots();
    loop {
        let snap = snapshots.borrow().clone();
        match snap.phase {
            QuizPhase::AwaitingAnswer => {
                let question = snap.question.expect("awaiting phase carries a question");
                handle.submit(question.answer).await;
                snapshots.changed().await.unwrap();
            }
            QuizPhase::Complete => break,
            _ => snapshots.changed().await.unwrap(),
        }
    }
    handle.wait().await;

    assert_eq!(
        controller.state().progress.score(student, Operation::Addition, 1),
        Some(100)
    );
}
