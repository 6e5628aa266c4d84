//! Chat command: engine wiring and the interactive command loop.
//!
//! Three tasks run under one cancellation signal: the UDP listener, the
//! engine dispatcher, and this command loop, which reads stdin lines and
//! prints engine events as they arrive. Commands map one-to-one onto engine
//! operations; each failing command prints a single line naming the failure.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use tokio::io::{self, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{mpsc, watch};

use parley::crypto::signing;
use parley::engine::{ChatEngine, EngineEvent};
use parley::profile::{read_contacts, read_profile, Profile};

use super::CommandExecutor;

/// Run the chat client with an interactive prompt.
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Profile JSON file
    #[arg(long, default_value = "profile.json")]
    pub profile: PathBuf,

    /// Contacts JSON file (created on first change if missing)
    #[arg(long, default_value = "contacts.json")]
    pub contacts: PathBuf,

    /// Private signing key JSON file
    #[arg(long, default_value = "identity.key.json")]
    pub key: PathBuf,
}

impl CommandExecutor for ChatCommand {
    fn execute(&self) -> Result<()> {
        let runtime = tokio::runtime::Runtime::new().context("starting runtime")?;
        runtime.block_on(self.run())
    }
}

impl ChatCommand {
    async fn run(&self) -> Result<()> {
        let me = read_profile(&self.profile)
            .with_context(|| format!("reading {}", self.profile.display()))?;
        let contacts = read_contacts(&self.contacts).unwrap_or_default();
        let key = signing::read_private_key(&self.key)
            .with_context(|| format!("reading {}", self.key.display()))?;

        let (engine, mut events) =
            ChatEngine::new(me.clone(), contacts, key, Some(self.contacts.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (listener, dispatcher) = std::sync::Arc::clone(&engine)
            .start(shutdown_rx)
            .await
            .context("starting listener")?;

        println!("{me} ready. Type `help` for commands.");

        let mut lines = BufReader::new(io::stdin()).lines();
        run_loop(&engine, &mut events, &mut lines).await;

        let _ = shutdown_tx.send(true);
        // give in-flight writes a moment to drain before the socket closes
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = tokio::join!(listener, dispatcher);
        Ok(())
    }
}

async fn run_loop(
    engine: &ChatEngine,
    events: &mut mpsc::Receiver<EngineEvent>,
    lines: &mut Lines<BufReader<Stdin>>,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                let Some(event) = event else { break };
                print_event(&event);
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_line(engine, line.trim()).await {
                            break;
                        }
                    }
                    Ok(None) | Err(_) => break, // stdin closed
                }
            }
        }
    }
}

/// Split a line into the leading word and the trimmed remainder.
fn split_command(line: &str) -> (&str, &str) {
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

/// Dispatch one command line. Returns `false` when the loop should exit.
async fn handle_line(engine: &ChatEngine, line: &str) -> bool {
    let (command, rest) = split_command(line);
    match command {
        "" => {}
        "help" => print_help(),
        "exit" | "quit" => return false,
        "me" => println!("{}", engine.me().await),
        "ip" => match super::ip::public_ip().await {
            Ok(ip) => println!("public ip: {ip}"),
            Err(err) => println!("ip lookup failed: {err}"),
        },
        "contacts" => contacts_command(engine, rest).await,
        "requests" => {
            for (index, request) in engine.requests().await {
                println!(" [{index}] {} at {}", request.profile, stamp(request.timestamp));
            }
        }
        "accept" => match parse_index(rest) {
            Some(index) => match engine.accept(index).await {
                Ok(at) => println!("session [{at}] active"),
                Err(err) => println!("accept failed: {err}"),
            },
            None => println!("usage: accept <request#>"),
        },
        "reject" => match parse_index(rest) {
            Some(index) => {
                engine.reject(index).await;
            }
            None => println!("usage: reject <request#>"),
        },
        "chat" => match parse_index(rest) {
            Some(index) => match engine.contact(index).await {
                Some(contact) => match engine.send_request(contact).await {
                    Ok(at) => println!("request sent; session [{at}] pending"),
                    Err(err) => println!("request failed: {err}"),
                },
                None => println!("no contact [{index}]"),
            },
            None => println!("usage: chat <contact#>"),
        },
        "msg" => {
            let (index, text) = split_command(rest);
            match (index.parse::<usize>().ok(), text) {
                (Some(index), text) if !text.is_empty() => {
                    if let Err(err) = engine.send_text(index, text).await {
                        println!("send failed: {err}");
                    }
                }
                _ => println!("usage: msg <session#> <text>"),
            }
        }
        "sessions" => {
            for (index, line) in engine.sessions().await {
                println!(" [{index}] {line}");
            }
        }
        "drop" => match parse_index(rest) {
            Some(index) => {
                if !engine.drop_session(index).await {
                    println!("no session [{index}]");
                }
            }
            None => println!("usage: drop <session#>"),
        },
        other => println!("unknown command `{other}`; try `help`"),
    }
    true
}

async fn contacts_command(engine: &ChatEngine, rest: &str) {
    let (sub, args) = split_command(rest);
    match sub {
        "" => {
            for (index, contact) in engine.contacts().await {
                println!(" [{index}] {contact}");
            }
        }
        "add" => match Profile::parse(args) {
            Ok(contact) => match engine.add_contact(contact).await {
                Ok(index) => println!("contact [{index}] added"),
                Err(err) => println!("add failed: {err}"),
            },
            Err(err) => println!("add failed: {err}"),
        },
        "rm" => match parse_index(args) {
            Some(index) => match engine.remove_contact(index).await {
                Ok(true) => {}
                Ok(false) => println!("no contact [{index}]"),
                Err(err) => println!("remove failed: {err}"),
            },
            None => println!("usage: contacts rm <contact#>"),
        },
        other => println!("unknown subcommand `contacts {other}`"),
    }
}

fn parse_index(arg: &str) -> Option<usize> {
    arg.parse().ok()
}

fn stamp(timestamp: parley::TimeStamp) -> String {
    timestamp
        .to_wall_time()
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string()
}

fn print_event(event: &EngineEvent) {
    match event {
        EngineEvent::RequestReceived { index, from } => {
            println!(" chat request [{index}] from {from} - `accept {index}` or `reject {index}`");
        }
        EngineEvent::SessionActive { index, id, with } => {
            println!(" session [{index}] ({id}) active with {with}");
        }
        EngineEvent::SessionUpgradeFailed { id, from } => {
            println!(" session ({id}) upgrade failed ({from})");
        }
        EngineEvent::TextReceived { index, text } => {
            let from = text
                .author
                .as_ref()
                .map(|profile| profile.to_string())
                .unwrap_or_else(|| "?".into());
            println!(" [{index}] {from} | {} > {}", stamp(text.timestamp), text.message);
        }
    }
}

fn print_help() {
    println!(
        "\
commands:
  me                          show my profile
  ip                          discover my public IP (informational)
  contacts                    list contacts
  contacts add <n@addr:port>  add a contact
  contacts rm <contact#>      remove a contact
  requests                    list pending chat requests
  accept <request#>           accept a request, opening a session
  reject <request#>           silently drop a request
  chat <contact#>             ask a contact to chat
  msg <session#> <text>       send a message in a session
  sessions                    list sessions
  drop <session#>             drop a session
  exit                        quit"
    );
}
