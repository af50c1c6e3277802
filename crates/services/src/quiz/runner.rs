//! Async driver for [`QuizEngine`].
//!
//! Owns the only timers in the quiz flow: a repeating one-second tick for
//! the active question and the fixed reveal delay between questions. The
//! tick is rebuilt whenever the question changes, so exactly one timer is
//! live per question at any instant. Consumers talk to the running session
//! through a command channel and observe it through snapshot broadcasts.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use quiz_core::model::{Question, QuizResult, QuizSettings};

use crate::controller::SessionController;
use super::engine::{QuizEngine, QuizPhase};

/// Pause between revealing an answer and issuing the next question.
pub const REVEAL_DELAY: Duration = Duration::from_millis(1500);

const COMMAND_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizCommand {
    Submit(i64),
    Cancel,
}

/// Published state of a running session.
#[derive(Debug, Clone)]
pub struct QuizSnapshot {
    pub phase: QuizPhase,
    pub question_number: usize,
    pub question: Option<Question>,
    pub remaining_secs: u32,
    pub last_result: Option<QuizResult>,
}

/// Handle to a spawned quiz session.
pub struct QuizHandle {
    commands: mpsc::Sender<QuizCommand>,
    snapshots: watch::Receiver<QuizSnapshot>,
    task: JoinHandle<()>,
}

impl QuizHandle {
    /// Submit an answer for the current question. Late submissions (after a
    /// timeout already revealed the question) are ignored by the driver.
    pub async fn submit(&self, answer: i64) {
        let _ = self.commands.send(QuizCommand::Submit(answer)).await;
    }

    /// Abort the session, discarding partial results.
    pub async fn cancel(&self) {
        let _ = self.commands.send(QuizCommand::Cancel).await;
    }

    #[must_use]
    pub fn snapshots(&self) -> watch::Receiver<QuizSnapshot> {
        self.snapshots.clone()
    }

    /// Wait for the driver task to finish (completion or cancellation).
    pub async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Start a quiz session: pins the settings on the controller, spawns the
/// driver task, and returns the handle consumers interact through.
#[must_use]
pub fn spawn_quiz(controller: Arc<SessionController>, settings: QuizSettings) -> QuizHandle {
    controller.start_quiz(settings);

    let clock = controller.clock();
    let mut engine = QuizEngine::new(settings);
    // Idle → AwaitingAnswer cannot fail on a fresh engine
    let _ = engine.start(clock.now());

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (snapshots_tx, snapshots_rx) = watch::channel(snapshot(&engine, settings.timer_secs));

    let task = tokio::spawn(drive(controller, engine, commands_rx, snapshots_tx));

    QuizHandle {
        commands: commands_tx,
        snapshots: snapshots_rx,
        task,
    }
}

fn snapshot(engine: &QuizEngine, remaining_secs: u32) -> QuizSnapshot {
    QuizSnapshot {
        phase: engine.phase(),
        question_number: engine.question_number(),
        question: engine.current_question().cloned(),
        remaining_secs,
        last_result: engine.last_result().cloned(),
    }
}

async fn drive(
    controller: Arc<SessionController>,
    mut engine: QuizEngine,
    mut commands: mpsc::Receiver<QuizCommand>,
    snapshots: watch::Sender<QuizSnapshot>,
) {
    let clock = controller.clock();
    let timer_secs = engine.settings().timer_secs;

    loop {
        match engine.phase() {
            QuizPhase::AwaitingAnswer => {
                // fresh tick for this question; replaces the previous one
                let mut tick = tokio::time::interval(Duration::from_secs(1));
                tick.tick().await; // the immediate first tick
                let mut remaining = timer_secs;

                let answer = loop {
                    tokio::select! {
                        command = commands.recv() => match command {
                            Some(QuizCommand::Submit(value)) => break Some(value),
                            Some(QuizCommand::Cancel) | None => {
                                controller.exit_quiz();
                                return;
                            }
                        },
                        _ = tick.tick() => {
                            remaining = remaining.saturating_sub(1);
                            if remaining == 0 {
                                break None; // timer expiry submits "no answer"
                            }
                            let _ = snapshots.send(snapshot(&engine, remaining));
                        }
                    }
                };

                if engine.submit(answer, clock.now()).is_ok() {
                    let _ = snapshots.send(snapshot(&engine, 0));
                }
            }
            QuizPhase::Revealed => {
                let delay = tokio::time::sleep(REVEAL_DELAY);
                tokio::pin!(delay);
                loop {
                    tokio::select! {
                        () = &mut delay => break,
                        command = commands.recv() => match command {
                            Some(QuizCommand::Cancel) | None => {
                                controller.exit_quiz();
                                return;
                            }
                            // already revealed; a late submit records nothing
                            Some(QuizCommand::Submit(_)) => {}
                        }
                    }
                }

                match engine.advance(clock.now()) {
                    Ok(Some(summary)) => {
                        let _ = snapshots.send(snapshot(&engine, 0));
                        if let Err(error) = controller.finish_quiz(summary).await {
                            tracing::warn!(%error, "failed to persist quiz summary");
                        }
                        return;
                    }
                    Ok(None) => {
                        let _ = snapshots.send(snapshot(&engine, timer_secs));
                    }
                    Err(error) => {
                        tracing::warn!(%error, "quiz driver in inconsistent phase");
                        return;
                    }
                }
            }
            QuizPhase::Idle | QuizPhase::Complete => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::Backend;
    use quiz_core::Clock;
    use quiz_core::model::Operation;
    use crate::nav::View;

    fn controller() -> Arc<SessionController> {
        SessionController::new(Backend::in_memory(), Clock::default_clock())
    }

    fn settings(timer_secs: u32) -> QuizSettings {
        QuizSettings::new(Operation::Addition, 1, timer_secs)
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_questions_time_out_as_incorrect() {
        let controller = controller();
        let handle = spawn_quiz(Arc::clone(&controller), settings(3));
        let mut snapshots = handle.snapshots();

        loop {
            snapshots.changed().await.unwrap();
            let snap = snapshots.borrow().clone();
            if let Some(result) = snap.last_result {
                assert_eq!(result.user_answer, None);
                assert!(!result.is_correct);
                break;
            }
        }
        handle.cancel().await;
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_of_submitted_answers_completes() {
        let controller = controller();
        let handle = spawn_quiz(Arc::clone(&controller), settings(30));
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

        let snap = snapshots.borrow().clone();
        let result = snap.last_result.expect("completed run has results");
        assert!(result.is_correct);
        handle.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_partials_and_returns_to_dashboard() {
        let controller = controller();
        let handle = spawn_quiz(Arc::clone(&controller), settings(30));

        handle.cancel().await;
        handle.wait().await;

        let state = controller.state();
        assert_eq!(state.view, View::Dashboard);
        assert!(state.quiz_settings.is_none());
        assert!(state.quiz_summary.is_none());
    }
}
