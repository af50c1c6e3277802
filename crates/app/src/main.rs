//! Composition root: wires a backend to the session controller and runs a
//! thin line-based renderer. The renderer only reads published snapshots and
//! forwards commands; every decision lives in the services layer.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use backend::{Backend, InMemoryBackend, RestBackend, RestConfig};
use quiz_core::model::{Operation, QuizSettings, Role};
use quiz_core::Clock;
use services::quiz::{spawn_quiz, QuizHandle, QuizPhase};
use services::{NewUser, SessionController};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    UnknownBackend(String),
    MissingRestConfig,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownBackend(raw) => write!(f, "unknown --backend value: {raw}"),
            ArgsError::MissingRestConfig => write!(
                f,
                "rest backend needs QUIZ_BACKEND_URL and QUIZ_BACKEND_ANON_KEY"
            ),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Memory,
    Rest,
}

struct Args {
    backend: BackendKind,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--backend memory|rest]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --backend memory   (seeded demo accounts, password 'pw')");
    eprintln!();
    eprintln!("Environment (rest backend):");
    eprintln!("  QUIZ_BACKEND_URL, QUIZ_BACKEND_ANON_KEY");
    eprintln!();
    eprintln!("Commands once running:");
    eprintln!("  login <email> <password>     signup <name> <email> <password> <role>");
    eprintln!("  logout                       users");
    eprintln!("  quiz <operation> <stage> <timer-secs>");
    eprintln!("  answer <n>                   cancel");
    eprintln!("  quit");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, ArgsError> {
    let mut backend = BackendKind::Memory;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--backend" => {
                backend = match require_value(&mut args, "--backend")?.as_str() {
                    "memory" => BackendKind::Memory,
                    "rest" => BackendKind::Rest,
                    other => return Err(ArgsError::UnknownBackend(other.to_string())),
                };
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(ArgsError::UnknownArg(other.to_string())),
        }
    }
    Ok(Args { backend })
}

fn seeded_memory_backend() -> InMemoryBackend {
    let memory = InMemoryBackend::new();
    let seeds = [
        ("admin@demo.test", "Demo Admin", Role::Admin),
        ("teacher@demo.test", "Demo Teacher", Role::Teacher),
        ("kid@demo.test", "Demo Student", Role::Student),
        ("parent@demo.test", "Demo Parent", Role::Parent),
    ];
    for (email, name, role) in seeds {
        if let Err(error) = memory.seed_user(email, "pw", name, role) {
            tracing::warn!(%error, email, "failed to seed demo account");
        }
    }
    memory
}

fn build_backend(kind: BackendKind) -> Result<Backend, ArgsError> {
    match kind {
        BackendKind::Memory => Ok(Backend::from_memory(seeded_memory_backend())),
        BackendKind::Rest => {
            let config = RestConfig::from_env().ok_or(ArgsError::MissingRestConfig)?;
            Ok(Backend::rest(RestBackend::new(config)))
        }
    }
}

fn parse_role(raw: &str) -> Option<Role> {
    raw.parse().ok()
}

async fn handle_command(
    controller: &Arc<SessionController>,
    active_quiz: &mut Option<QuizHandle>,
    line: &str,
) -> bool {
    let parts: Vec<&str> = line.split_whitespace().collect();
    match parts.as_slice() {
        [] => {}
        ["quit"] | ["exit"] => return false,
        ["login", email, password] => {
            if let Err(error) = controller.login(email, password).await {
                println!("login failed: {error}");
            }
        }
        ["signup", name, email, password, role] => match parse_role(role) {
            Some(role) => {
                let result = controller
                    .sign_up(NewUser {
                        name: (*name).to_string(),
                        email: (*email).to_string(),
                        password: (*password).to_string(),
                        role,
                        child_id: None,
                    })
                    .await;
                if let Err(error) = result {
                    println!("signup failed: {error}");
                }
            }
            None => println!("unknown role: {role}"),
        },
        ["logout"] => {
            if let Err(error) = controller.logout().await {
                println!("logout failed: {error}");
            }
        }
        ["users"] => {
            for user in controller.state().users {
                println!("  {} <{}> [{}]", user.name(), user.email(), user.role());
            }
        }
        ["quiz", operation, stage, timer] => {
            let operation = Operation::parse(operation);
            match (stage.parse(), timer.parse()) {
                (Ok(stage), Ok(timer_secs)) => {
                    let settings = QuizSettings::new(operation, stage, timer_secs);
                    *active_quiz = Some(spawn_quiz(Arc::clone(controller), settings));
                }
                _ => println!("usage: quiz <operation> <stage> <timer-secs>"),
            }
        }
        ["answer", value] => match (active_quiz.as_ref(), value.parse::<i64>()) {
            (Some(quiz), Ok(answer)) => quiz.submit(answer).await,
            (None, _) => println!("no quiz running"),
            (_, Err(_)) => println!("usage: answer <n>"),
        },
        ["cancel"] => {
            if let Some(quiz) = active_quiz.take() {
                quiz.cancel().await;
                quiz.wait().await;
            } else {
                println!("no quiz running");
            }
        }
        _ => println!("unknown command: {line}"),
    }
    true
}

/// Print state transitions as they are published.
fn spawn_renderer(controller: &Arc<SessionController>) {
    let mut states = controller.subscribe();
    tokio::spawn(async move {
        let mut last_view = None;
        while states.changed().await.is_ok() {
            let state = states.borrow().clone();
            let view = state.resolved_view();
            if last_view != Some(view) {
                last_view = Some(view);
                match &state.current_user {
                    Some(user) => println!("-- {view:?} ({} as {})", user.name(), user.role()),
                    None => println!("-- {view:?}"),
                }
            }
            if let Some(summary) = &state.quiz_summary {
                if view == services::View::Results {
                    println!(
                        "   score {}%, total time {:.1}s",
                        summary.score(),
                        summary.total_time()
                    );
                }
            }
        }
    });
}

/// Print quiz questions and reveals for the active session.
fn spawn_quiz_printer(quiz: &QuizHandle) {
    let mut snapshots = quiz.snapshots();
    tokio::spawn(async move {
        let mut last_number = 0;
        loop {
            let snap = snapshots.borrow().clone();
            match snap.phase {
                QuizPhase::AwaitingAnswer => {
                    if snap.question_number != last_number {
                        last_number = snap.question_number;
                        if let Some(question) = &snap.question {
                            println!("Q{}: {}", snap.question_number, question.text);
                        }
                    }
                }
                QuizPhase::Revealed => {
                    if let Some(result) = &snap.last_result {
                        let verdict = if result.is_correct { "correct" } else { "wrong" };
                        println!("   {verdict} ({})", result.question.text);
                    }
                }
                QuizPhase::Complete => break,
                QuizPhase::Idle => {}
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(error) => {
            eprintln!("error: {error}");
            print_usage();
            std::process::exit(2);
        }
    };

    let backend = match build_backend(args.backend) {
        Ok(backend) => backend,
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(2);
        }
    };

    let controller = SessionController::new(backend, Clock::default_clock());
    controller.spawn_auth_listener();
    spawn_renderer(&controller);

    println!("math quiz (type 'quit' to exit, '--help' on the command line for usage)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut active_quiz: Option<QuizHandle> = None;
    while let Ok(Some(line)) = lines.next_line().await {
        let quiz_was_running = active_quiz.is_some();
        if !handle_command(&controller, &mut active_quiz, &line).await {
            break;
        }
        if !quiz_was_running {
            if let Some(quiz) = &active_quiz {
                spawn_quiz_printer(quiz);
            }
        }
    }

    if let Some(quiz) = active_quiz.take() {
        quiz.cancel().await;
        quiz.wait().await;
    }
}
