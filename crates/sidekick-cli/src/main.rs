use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::*;
use futures_util::StreamExt;
use sidekick_chat::{
    AuthGuard, BackendClient, ChatSession, Session, SessionStore, StreamConfig,
};
use sidekick_common::{ClientConfig, Persona, initials};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use termimad::MadSkin;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

mod render;

use render::{ReplyPrinter, print_conversation, print_personas};

/// Command-line arguments for the Sidekick CLI
#[derive(Parser)]
#[command(name = "sidekick", about = "Sidekick - streaming chat in your terminal")]
pub struct Args {
    /// Path to a TOML configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides the configuration
    #[clap(long)]
    api_url: Option<String>,

    /// Directory holding the session file
    #[clap(long)]
    data_dir: Option<PathBuf>,

    /// Enable debug mode
    #[clap(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Signup {
        #[clap(long)]
        name: String,
        #[clap(long)]
        email: String,
    },
    /// Log in and store the session
    Login {
        #[clap(long)]
        email: String,
    },
    /// Forget the stored session
    Logout,
    /// List available personas
    Personas,
    /// Show the stored conversation of the current session
    History,
    /// Start chatting
    Chat {
        /// Persona key (friendly, mentor, witty, therapist, formal)
        #[clap(long, short_alias = 'p')]
        persona: Option<String>,
    },
}

/// Print `label` and read one line. `None` once the input is closed.
fn prompt(input: &mut impl BufRead, label: &str) -> Result<Option<String>> {
    print!("{}", label.bright_cyan());
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// Like `prompt`, but a closed input is an error
fn prompt_required(label: &str) -> Result<String> {
    prompt(&mut io::stdin().lock(), label)?.ok_or_else(|| anyhow!("Input closed"))
}

/// One line typed into the chat loop
#[derive(Debug, PartialEq, Eq)]
enum ReplInput<'a> {
    Quit,
    Persona(Option<&'a str>),
    Reset,
    History,
    Help,
    UnknownCommand(&'a str),
    Message(&'a str),
}

fn parse_repl_input(input: &str) -> ReplInput<'_> {
    let mut parts = input.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match command.to_lowercase().as_str() {
        "quit" | "exit" => ReplInput::Quit,
        "/persona" => ReplInput::Persona(argument),
        "/reset" => ReplInput::Reset,
        "/history" => ReplInput::History,
        "/help" => ReplInput::Help,
        _ if command.starts_with('/') => ReplInput::UnknownCommand(command),
        _ => ReplInput::Message(input),
    }
}

fn print_help() {
    println!("/persona [key]  choose how the assistant talks");
    println!("/reset          clear the conversation on screen");
    println!("/history        reload the stored conversation");
    println!("quit | exit     leave");
}

fn parse_persona(key: &str) -> Result<Persona> {
    match Persona::from_key(key) {
        Some(persona) => Ok(persona),
        None => bail!("Unknown persona '{}'. Run `sidekick personas` to list them.", key),
    }
}

/// Show the persona menu and let the user choose. `None` when the input
/// closes before a valid choice.
fn select_persona_interactively(input: &mut impl BufRead, current: Persona) -> Result<Option<Persona>> {
    print_personas(Some(current));
    loop {
        let Some(line) = prompt(input, "Choose a persona (1-6) or type its name: ")? else {
            println!();
            return Ok(None);
        };
        let line = line.trim();

        if let Ok(choice) = line.parse::<usize>() {
            if (1..=Persona::ALL.len()).contains(&choice) {
                return Ok(Some(Persona::ALL[choice - 1]));
            }
        }
        if let Some(persona) = Persona::from_key(line) {
            return Ok(Some(persona));
        }
        println!("{}", "❌ Invalid choice. Please try again.".red());
    }
}

async fn signup(client: &BackendClient, store: &mut SessionStore, name: &str, email: &str) -> Result<()> {
    let password = prompt_required("Password: ")?;
    let confirm = prompt_required("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match!");
    }

    let user = client.register(name, email, &password).await?;
    Session::save_signup(store, &user.name, &user.email)?;
    println!("{}", "✅ Account created! Log in now with `sidekick login`.".bright_green());
    Ok(())
}

async fn login(client: &BackendClient, store: &mut SessionStore, email: &str) -> Result<()> {
    let password = prompt_required("Password: ")?;
    let response = client.login(email, &password).await?;
    let session = Session::save_login(store, &response, email)?;
    println!(
        "{}",
        format!("👋 Welcome, {} ({})", session.user_name, initials(&session.user_name))
            .bright_green()
    );
    Ok(())
}

fn open_chat(client: BackendClient, store: &SessionStore) -> Result<ChatSession> {
    let session = AuthGuard::verify(store)?;
    let stream_config = StreamConfig::from(client.config());
    Ok(ChatSession::new(Arc::new(client), session, stream_config))
}

/// Stream one reply to the terminal
async fn send_and_render(chat: &mut ChatSession, input: &str) -> Result<()> {
    let mut reply = chat.send(input).await?;
    let mut printer = ReplyPrinter::new();

    print!("{} ", "AI:".bright_green().bold());
    io::stdout().flush()?;

    while let Some(event) = reply.next().await {
        chat.apply(&event);
        if let Some(output) = printer.render(&event) {
            print!("{}", output);
            io::stdout().flush()?;
        }
    }
    Ok(())
}

/// Main conversation loop, until quit or end of input
async fn conversation_loop(mut chat: ChatSession, input: &mut impl BufRead) -> Result<()> {
    let skin = MadSkin::default();
    let user_name = chat.session().user_name.clone();

    print_conversation(chat.conversation(), &skin, &user_name);
    println!(
        "{}",
        format!("💬 Chatting as {} with {}. Type 'quit' or 'exit' to stop.", user_name, chat.persona())
            .bright_green()
    );
    println!(
        "{}",
        "Commands: /persona [key], /reset, /history, /help".bright_yellow()
    );
    println!();

    loop {
        let Some(line) = prompt(input, &format!("{}: ", user_name))? else {
            println!();
            break;
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        match parse_repl_input(line) {
            ReplInput::Quit => {
                println!("{}", "👋 Goodbye!".bright_green());
                break;
            }
            ReplInput::Persona(argument) => {
                let persona = match argument {
                    Some(key) => match parse_persona(key) {
                        Ok(persona) => persona,
                        Err(e) => {
                            println!("{}", format!("❌ {}", e).red());
                            continue;
                        }
                    },
                    None => match select_persona_interactively(input, chat.persona())? {
                        Some(persona) => persona,
                        None => break,
                    },
                };
                chat.set_persona(persona);
                println!("{}", format!("🎭 Persona: {}", persona).bright_magenta());
            }
            ReplInput::Reset => {
                chat.reset();
                println!("{}", "🧹 Chat cleared.".bright_yellow());
            }
            ReplInput::History => match chat.load_history().await {
                Ok(_) => print_conversation(chat.conversation(), &skin, &user_name),
                Err(e) => println!("{}", format!("❌ History error: {}", e).red()),
            },
            ReplInput::Help => print_help(),
            ReplInput::UnknownCommand(command) => {
                println!("{}", format!("❓ Unknown command {}", command).yellow());
                print_help();
            }
            ReplInput::Message(text) => {
                if let Err(e) = send_and_render(&mut chat, text).await {
                    println!("{}", format!("❌ {}", e).red());
                }
                println!();
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Setup tracing; logs go to stderr so they do not mix with replies
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(api_url) = args.api_url {
        config.api_url = api_url;
        config.validate()?;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    info!("Backend: {}", config.api_url);
    info!("Data directory: {}", config.data_dir.display());

    let mut store = SessionStore::in_data_dir(&config.data_dir)?;
    let client = BackendClient::new(config)?;

    match args.command {
        Command::Signup { name, email } => signup(&client, &mut store, &name, &email).await?,
        Command::Login { email } => login(&client, &mut store, &email).await?,
        Command::Logout => {
            store.clear()?;
            println!("{}", "👋 Logged out.".bright_green());
        }
        Command::Personas => print_personas(None),
        Command::History => {
            let mut chat = open_chat(client, &store)?;
            let user_name = chat.session().user_name.clone();
            chat.load_history().await?;
            print_conversation(chat.conversation(), &MadSkin::default(), &user_name);
        }
        Command::Chat { persona } => {
            let mut chat = open_chat(client, &store)?;
            if let Some(key) = persona {
                chat.set_persona(parse_persona(&key)?);
            }
            if let Err(e) = chat.load_history().await {
                error!("History error: {}", e);
                println!("{}", format!("⚠ Could not load history: {}", e).yellow());
            }
            conversation_loop(chat, &mut io::stdin().lock()).await?;
        }
    }

    Ok(())
}
