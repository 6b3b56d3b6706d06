// Quiz Server CLI
// Drives a running quiz server as host or player and runs scripted validation scenarios

use clap::{Parser, Subcommand};
use colored::*;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use quiz_server::quiz::catalog::Question;
use quiz_server::quiz::evaluator::Submission;
use quiz_server::quiz::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWrite = SplitSink<WsStream, Message>;
type WsRead = SplitStream<WsStream>;

#[derive(Parser)]
#[command(name = "quiz-cli")]
#[command(about = "Quiz Server CLI", long_about = None)]
struct Cli {
    /// Server address (default: 127.0.0.1:4000)
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server health endpoint
    Health,

    /// Get countdown configuration
    Config,

    /// Create a room, load the questions, start the quiz and follow it to the end
    Host {
        /// Room ID to create
        #[arg(short, long)]
        room_id: String,

        /// Seconds to wait for players before starting
        #[arg(short, long, default_value_t = 0)]
        wait: u64,
    },

    /// Join a room and follow the quiz as a player
    Play {
        /// Room ID to join
        #[arg(short, long)]
        room_id: String,

        /// Answer every question with the option at this position
        #[arg(short, long)]
        answer: Option<usize>,
    },

    /// Run the scripted end-to-end scenario
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Health => check_health(&cli.server).await,
        Commands::Config => check_config(&cli.server).await,
        Commands::Host { room_id, wait } => host(&cli.server, room_id, *wait).await,
        Commands::Play { room_id, answer } => play(&cli.server, room_id, *answer).await,
        Commands::Validate => {
            if validate(&cli.server).await {
                println!("\n{}", "All validation steps passed".green().bold());
            } else {
                println!("\n{}", "Validation failed".red().bold());
                std::process::exit(1);
            }
        }
    }
}

async fn check_health(server: &str) {
    println!("{}", "Checking server health...".cyan());

    let url = format!("http://{}/quiz/health", server);

    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            println!("{} Health check passed", "✓".green());
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                println!("  Status: {}", body["status"].as_str().unwrap_or("unknown"));
                println!("  Version: {}", body["version"].as_str().unwrap_or("unknown"));
                println!("  Connections: {}", body["connections"]);
            }
        }
        Ok(resp) => println!("{} Health check failed: {}", "✗".red(), resp.status()),
        Err(e) => {
            println!("{} Cannot connect to server: {}", "✗".red(), e);
            println!("  Make sure the server is running on {}", server);
        }
    }
}

async fn check_config(server: &str) {
    let url = format!("http://{}/quiz/config", server);

    match reqwest::Client::new().get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            }
        }
        Ok(resp) => println!("{} Config fetch failed: {}", "✗".red(), resp.status()),
        Err(e) => println!("{} Cannot connect to server: {}", "✗".red(), e),
    }
}

async fn connect(server: &str) -> Option<(WsWrite, WsRead)> {
    let url = format!("ws://{}/quiz", server);
    match connect_async(&url).await {
        Ok((ws_stream, _)) => Some(ws_stream.split()),
        Err(e) => {
            println!("{} Cannot connect to {}: {}", "✗".red(), url, e);
            None
        }
    }
}

async fn send(write: &mut WsWrite, message: &ClientMessage) -> bool {
    let Ok(text) = serde_json::to_string(message) else {
        return false;
    };
    if let Err(e) = write.send(Message::Text(text)).await {
        println!("{} Failed to send message: {}", "✗".red(), e);
        return false;
    }
    true
}

/// Next server message, or `None` on timeout, close or error.
async fn receive(read: &mut WsRead, wait: Duration) -> Option<ServerMessage> {
    loop {
        match timeout(wait, read.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => match serde_json::from_str(&text) {
                Ok(message) => return Some(message),
                Err(_) => println!("{} Unrecognised message: {}", "?".yellow(), text),
            },
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
                println!("{} Connection closed", "✗".yellow());
                return None;
            }
            Ok(Some(Ok(_))) => continue,
            Ok(Some(Err(e))) => {
                println!("{} Connection error: {}", "✗".red(), e);
                return None;
            }
            Err(_) => return None,
        }
    }
}

fn print_event(message: &ServerMessage, questions: &[Question]) {
    match message {
        ServerMessage::UserJoined { room_id, joined_users } => {
            println!("{} {} players in room {}", "+".green(), joined_users, room_id.bold());
        }
        ServerMessage::UserLeft { joined_users, .. } => {
            println!("{} {} players remain", "-".yellow(), joined_users);
        }
        ServerMessage::QuizQuestions { questions } => {
            println!("{} Loaded {} questions", "✓".green(), questions.len());
        }
        ServerMessage::QuizStarted { .. } => {
            println!("\n{}", "Quiz started!".green().bold());
            print_question(questions, 0);
        }
        ServerMessage::QuizTimerUpdate { seconds_left } => {
            println!("  {} {}s", "⏱".cyan(), seconds_left);
        }
        ServerMessage::NextQuestion { question_index } => print_question(questions, *question_index),
        ServerMessage::QuizEnded => println!("\n{}", "Quiz ended".green().bold()),
        ServerMessage::AnswerResult { success: true, correct, .. } => {
            if *correct == Some(true) {
                println!("  {} Someone answered correctly", "✓".green());
            } else {
                println!("  {} Someone answered incorrectly", "✗".red());
            }
        }
        ServerMessage::AnswerResult { message, .. } => {
            println!("  {} Answer rejected: {}", "✗".red(), message.as_deref().unwrap_or("unknown"));
        }
        ServerMessage::Error { message } => println!("{} {}", "Error:".red().bold(), message),
    }
}

fn print_question(questions: &[Question], index: usize) {
    let Some(question) = questions.get(index) else {
        println!("{} Question #{}", "?".bold(), index + 1);
        return;
    };
    println!("\n{} {}", format!("Q{}.", index + 1).bold(), question.prompt.bright_white());
    for (position, option) in question.options.iter().enumerate() {
        println!("   {}. {}", position, option);
    }
}

async fn host(server: &str, room_id: &str, wait: u64) {
    let Some((mut write, mut read)) = connect(server).await else {
        return;
    };

    let create = ClientMessage::CreateRoom { room_id: room_id.to_string() };
    if !send(&mut write, &create).await || !send(&mut write, &ClientMessage::JoinQuiz).await {
        return;
    }

    let mut questions = Vec::new();
    while questions.is_empty() {
        match receive(&mut read, Duration::from_secs(5)).await {
            Some(ServerMessage::QuizQuestions { questions: loaded }) => {
                println!("{} Loaded {} questions", "✓".green(), loaded.len());
                questions = loaded;
            }
            Some(message @ ServerMessage::Error { .. }) => {
                print_event(&message, &questions);
                return;
            }
            Some(message) => print_event(&message, &questions),
            None => {
                println!("{} No questions received", "✗".red());
                return;
            }
        }
    }

    if wait > 0 {
        println!("Waiting {}s for players to join {}...", wait, room_id.green().bold());
        let deadline = tokio::time::Instant::now() + Duration::from_secs(wait);
        while let Some(remaining) = deadline.checked_duration_since(tokio::time::Instant::now()) {
            if let Some(message) = receive(&mut read, remaining).await {
                print_event(&message, &questions);
            }
        }
    }

    let start = ClientMessage::StartQuiz { room_id: room_id.to_string() };
    if !send(&mut write, &start).await {
        return;
    }

    while let Some(message) = receive(&mut read, Duration::from_secs(60)).await {
        print_event(&message, &questions);
        if matches!(message, ServerMessage::QuizEnded | ServerMessage::Error { .. }) {
            break;
        }
    }
}

async fn play(server: &str, room_id: &str, answer: Option<usize>) {
    let Some((mut write, mut read)) = connect(server).await else {
        return;
    };

    let join = ClientMessage::JoinRoom { room_id: room_id.to_string() };
    if !send(&mut write, &join).await || !send(&mut write, &ClientMessage::JoinQuiz).await {
        return;
    }

    let mut questions: Vec<Question> = Vec::new();
    println!("Waiting for the host to start... press {} to leave", "Ctrl+C".bold());

    loop {
        let Some(message) = receive(&mut read, Duration::from_secs(600)).await else {
            break;
        };
        print_event(&message, &questions);

        let current = match &message {
            ServerMessage::QuizQuestions { questions: loaded } => {
                questions = loaded.clone();
                None
            }
            ServerMessage::QuizStarted { .. } => Some(0),
            ServerMessage::NextQuestion { question_index } => Some(*question_index),
            ServerMessage::QuizEnded => break,
            _ => None,
        };

        let (Some(index), Some(position)) = (current, answer) else {
            continue;
        };
        let Some(question) = questions.get(index) else {
            continue;
        };
        let Some(option) = question.options.get(position) else {
            continue;
        };

        let submit = ClientMessage::SubmitAnswer(Submission {
            question_id: question.id.clone(),
            selected_option: option.clone(),
            room_id: Some(room_id.to_string()),
        });
        println!("  {} Answering {}", "▶".cyan(), option);
        if !send(&mut write, &submit).await {
            break;
        }
    }
}

fn step(ok: bool, label: &str) -> bool {
    if ok {
        println!("{} {}", "✓".green(), label);
    } else {
        println!("{} {}", "✗".red(), label);
    }
    ok
}

/// Waits for the first message matching `predicate`, skipping others.
async fn expect(read: &mut WsRead, predicate: impl Fn(&ServerMessage) -> bool) -> Option<ServerMessage> {
    while let Some(message) = receive(read, Duration::from_secs(15)).await {
        if predicate(&message) {
            return Some(message);
        }
    }
    None
}

async fn validate(server: &str) -> bool {
    println!("{}", "Running validation scenario...".cyan());
    let room_id = format!("validate-{}", std::process::id());

    let Some((mut host_write, mut host_read)) = connect(server).await else {
        return false;
    };
    let Some((mut player_write, mut player_read)) = connect(server).await else {
        return false;
    };

    // Joining an unknown room fails.
    let join_missing = ClientMessage::JoinRoom { room_id: format!("{room_id}-missing") };
    send(&mut player_write, &join_missing).await;
    let rejected = expect(&mut player_read, |m| matches!(m, ServerMessage::Error { .. })).await;
    if !step(
        matches!(rejected, Some(ServerMessage::Error { ref message }) if message == "Room not found"),
        "Unknown room is rejected",
    ) {
        return false;
    }

    send(&mut host_write, &ClientMessage::CreateRoom { room_id: room_id.clone() }).await;
    let created = expect(&mut host_read, |m| matches!(m, ServerMessage::UserJoined { .. })).await;
    if !step(
        matches!(created, Some(ServerMessage::UserJoined { joined_users: 0, .. })),
        "Room created with zero players",
    ) {
        return false;
    }

    send(&mut player_write, &ClientMessage::JoinRoom { room_id: room_id.clone() }).await;
    let joined = expect(&mut host_read, |m| matches!(m, ServerMessage::UserJoined { .. })).await;
    if !step(
        matches!(joined, Some(ServerMessage::UserJoined { joined_users: 1, .. })),
        "Player join is broadcast to the host",
    ) {
        return false;
    }

    send(&mut player_write, &ClientMessage::JoinQuiz).await;
    let loaded = expect(&mut player_read, |m| {
        matches!(m, ServerMessage::QuizQuestions { .. } | ServerMessage::Error { .. })
    })
    .await;
    let Some(ServerMessage::QuizQuestions { questions }) = loaded else {
        step(false, "Questions loaded");
        return false;
    };
    if !step(!questions.is_empty(), "Questions loaded") {
        return false;
    }

    let no_room = ClientMessage::SubmitAnswer(Submission {
        question_id: questions[0].id.clone(),
        selected_option: questions[0].options[0].clone(),
        room_id: None,
    });
    send(&mut player_write, &no_room).await;
    let rejected = expect(&mut player_read, |m| matches!(m, ServerMessage::AnswerResult { .. })).await;
    if !step(
        matches!(rejected, Some(ServerMessage::AnswerResult { success: false, .. })),
        "Answer without room id is rejected",
    ) {
        return false;
    }

    send(&mut host_write, &ClientMessage::StartQuiz { room_id: room_id.clone() }).await;
    let started = expect(&mut player_read, |m| matches!(m, ServerMessage::QuizStarted { .. })).await;
    if !step(started.is_some(), "Quiz start reaches the player") {
        return false;
    }

    let tick = expect(&mut player_read, |m| matches!(m, ServerMessage::QuizTimerUpdate { .. })).await;
    if !step(tick.is_some(), "Countdown ticks arrive") {
        return false;
    }

    let answer = ClientMessage::SubmitAnswer(Submission {
        question_id: questions[0].id.clone(),
        selected_option: questions[0].options[0].clone(),
        room_id: Some(room_id.clone()),
    });
    send(&mut player_write, &answer).await;
    let verdict = expect(&mut host_read, |m| matches!(m, ServerMessage::AnswerResult { .. })).await;
    if !step(
        matches!(verdict, Some(ServerMessage::AnswerResult { success: true, .. })),
        "Answer verdict is broadcast to the room",
    ) {
        return false;
    }

    // Dropping the player empties the room and stops the countdown.
    drop(player_write);
    drop(player_read);
    step(true, "Player disconnected");
    true
}
