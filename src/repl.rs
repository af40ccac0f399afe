use crate::access::AccessError;
use crate::agent::{ PendingTurn, SageAgent };
use crate::llm::ProviderError;
use crate::models::chat::SageReply;
use crate::render::render_message;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::{ error, info, warn };
use std::error::Error;
use std::io::Write;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader };
use tokio::task::{ JoinError, JoinHandle };

#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Say(&'a str),
    Voice(&'a str),
    Logout,
    Quit,
    Help,
}

pub fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if !trimmed.starts_with('/') {
        return Command::Say(line);
    }
    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (trimmed, ""),
    };
    match name {
        "/logout" => Command::Logout,
        "/quit" | "/exit" => Command::Quit,
        "/voice" if !rest.is_empty() => Command::Voice(rest),
        _ => Command::Help,
    }
}

enum Screen {
    AskName,
    AskToken {
        name: String,
    },
    Chat,
}

/// The one provider call allowed to be outstanding.
enum InFlight {
    Reply(PendingTurn, JoinHandle<Result<SageReply, ProviderError>>),
    // Tagged with the session epoch it was started in.
    Transcript(u64, JoinHandle<Result<String, ProviderError>>),
}

enum Finished {
    Reply(Result<SageReply, ProviderError>),
    Transcript(Result<String, ProviderError>),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

fn flatten<T>(joined: Result<Result<T, ProviderError>, JoinError>) -> Result<T, ProviderError> {
    joined.unwrap_or_else(|e| Err(ProviderError::Task(e.to_string())))
}

async fn wait_in_flight(in_flight: &mut Option<InFlight>) -> Finished {
    match in_flight {
        Some(InFlight::Reply(_, handle)) => Finished::Reply(flatten(handle.await)),
        Some(InFlight::Transcript(_, handle)) => Finished::Transcript(flatten(handle.await)),
        None => std::future::pending().await,
    }
}

fn prompt(label: &str) {
    print!("{}: ", label);
    let _ = std::io::stdout().flush();
}

struct Terminal {
    agent: SageAgent,
    screen: Screen,
    in_flight: Option<InFlight>,
    shown: usize,
    thinking: bool,
}

impl Terminal {
    fn new(agent: SageAgent) -> Self {
        let screen = if agent.profile().is_some() { Screen::Chat } else { Screen::AskName };
        Self {
            agent,
            screen,
            in_flight: None,
            shown: 0,
            thinking: false,
        }
    }

    fn intro(&self) {
        match &self.screen {
            Screen::Chat => {
                if let Some(profile) = self.agent.profile() {
                    println!("{}, {}", self.agent.persona().sage_label, profile.name);
                }
                println!("{}", self.agent.persona().help_text);
            }
            Screen::AskName => prompt(&self.agent.persona().name_prompt),
            Screen::AskToken { .. } => prompt(&self.agent.persona().token_prompt),
        }
    }

    fn flush_messages(&mut self) {
        let messages = self.agent.messages();
        for message in messages.iter().skip(self.shown) {
            println!("{}", render_message(message, self.agent.persona()));
        }
        self.shown = messages.len();
        if self.thinking {
            println!("… {}", self.agent.persona().thinking_indicator);
            self.thinking = false;
        }
    }

    fn start_turn(&mut self, text: &str) {
        if self.in_flight.is_some() {
            println!("{}", self.agent.persona().busy_notice);
            return;
        }
        if let Some(turn) = self.agent.begin_turn(text) {
            info!("Asking the sage ({} chars)", turn.text().chars().count());
            let handle = tokio::spawn(self.agent.reply_future(&turn));
            self.in_flight = Some(InFlight::Reply(turn, handle));
            self.thinking = true;
        }
    }

    async fn start_transcription(&mut self, path: &str) {
        if self.in_flight.is_some() {
            println!("{}", self.agent.persona().busy_notice);
            return;
        }
        let audio = match tokio::fs::read(path).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!("Cannot read voice message {}: {}", path, e);
                println!("{}", self.agent.persona().transcription_failed);
                return;
            }
        };
        info!("Transcribing {} ({} bytes)", path, audio.len());
        let sage = self.agent.sage();
        let encoded = BASE64.encode(audio);
        let handle = tokio::spawn(async move { sage.transcribe_audio(&encoded).await });
        self.in_flight = Some(InFlight::Transcript(self.agent.epoch(), handle));
        self.thinking = true;
    }

    fn finish(&mut self, finished: Finished) {
        let in_flight = self.in_flight.take();
        match (finished, in_flight) {
            (Finished::Reply(result), Some(InFlight::Reply(turn, _))) => {
                self.agent.complete_turn(turn, result);
            }
            (Finished::Transcript(result), Some(InFlight::Transcript(epoch, _))) => {
                if epoch != self.agent.epoch() {
                    info!("Discarding transcript from a closed session");
                    return;
                }
                match result {
                    Ok(transcript) => {
                        println!("🎙 {}", transcript);
                        self.start_turn(&transcript);
                    }
                    Err(e) => {
                        error!("Transcription failed: {}", e);
                        println!("{}", self.agent.persona().transcription_failed);
                    }
                }
            }
            _ => {
                warn!("Provider call finished without a matching request");
            }
        }
    }

    async fn handle_line(&mut self, line: &str) -> Flow {
        let line = line.trim_end_matches('\r');
        if !matches!(self.screen, Screen::Chat) && parse_command(line) == Command::Quit {
            return Flow::Quit;
        }
        match std::mem::replace(&mut self.screen, Screen::AskName) {
            Screen::AskName => {
                let name = line.trim();
                if name.is_empty() {
                    println!("{}", self.agent.persona().empty_name);
                } else {
                    self.screen = Screen::AskToken { name: name.to_string() };
                }
            }
            Screen::AskToken { name } => {
                let outcome = self.agent.register(&name, line).await.map(|_| ());
                match outcome {
                    Ok(()) | Err(AccessError::AlreadyRegistered) => {
                        self.screen = Screen::Chat;
                        self.shown = 0;
                    }
                    Err(AccessError::InvalidToken) => {
                        println!("{}", self.agent.persona().invalid_access_code);
                    }
                    Err(AccessError::EmptyName) => {
                        println!("{}", self.agent.persona().empty_name);
                    }
                }
            }
            Screen::Chat => {
                self.screen = Screen::Chat;
                match parse_command(line) {
                    Command::Quit => {
                        return Flow::Quit;
                    }
                    Command::Logout => {
                        self.agent.logout().await;
                        self.screen = Screen::AskName;
                        self.shown = 0;
                        self.thinking = false;
                    }
                    Command::Help => println!("{}", self.agent.persona().help_text),
                    Command::Voice(path) => self.start_transcription(path).await,
                    Command::Say(text) => self.start_turn(text),
                }
                if matches!(self.screen, Screen::Chat) {
                    return Flow::Continue;
                }
            }
        }
        self.flush_messages();
        self.intro();
        Flow::Continue
    }
}

/// Runs the registration prompt and the chat view on stdin/stdout until the
/// user quits or input ends.
pub async fn run_terminal(agent: SageAgent) -> Result<(), Box<dyn Error + Send + Sync>> {
    let mut term = Terminal::new(agent);
    term.intro();
    drive(&mut term, BufReader::new(tokio::io::stdin())).await?;
    println!();
    Ok(())
}

/// Feeds `input` to the terminal line by line. On end of input the call still
/// in flight is awaited before returning.
async fn drive<R>(term: &mut Terminal, input: R) -> Result<(), Box<dyn Error + Send + Sync>>
    where R: AsyncBufRead + Unpin
{
    let mut lines = input.lines();
    let mut input_closed = false;

    loop {
        if input_closed && term.in_flight.is_none() {
            break;
        }
        tokio::select! {
            line = lines.next_line(), if !input_closed => {
                match line? {
                    Some(line) => {
                        if term.handle_line(&line).await == Flow::Quit {
                            break;
                        }
                    }
                    None => {
                        info!("Input closed");
                        input_closed = true;
                    }
                }
            }
            finished = wait_in_flight(&mut term.in_flight), if term.in_flight.is_some() => {
                term.finish(finished);
            }
        }
        if matches!(term.screen, Screen::Chat) {
            term.flush_messages();
        }
    }
    Ok(())
}
