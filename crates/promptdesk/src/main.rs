//! Command-line front end for the prompt desk.
//!
//! State lives in a data directory (default `.promptdesk`): the registry
//! snapshot in `registry.json`, conversations under `transcripts/`, and an
//! optional `promptdesk.json` config overlay.
//!
//! # Examples
//!
//! ```sh
//! # Compose a prompt from structured fields and save it
//! promptdesk generate --name Clara --role "assistente de atendimento" \
//!     --tone amigavel --save-as "Atendimento"
//!
//! # Create an agent linked to it, then chat with it
//! promptdesk agents create "Agente de Suporte" --prompt pr-... --model openai/gpt-5
//! promptdesk chat ag-...
//!
//! # Commit a new version and browse the history
//! promptdesk prompts edit pr-... --file prompt.txt --bump major --notes "Novo tom"
//! promptdesk prompts history pr-...
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use promptdesk::commit::{CommitOutcome, SaveVersion, VersionCommit};
use promptdesk::config::CONFIG_FILE;
use promptdesk::desk::CreateAgentForm;
use promptdesk::draft::{DraftAction, DraftField, DraftMode, PromptDraft, Tone};
use promptdesk::events::{CompositeEventHandler, DeskEvent, FnEventHandler, LoggingHandler};
use promptdesk::history::Clipboard;
use promptdesk::registry::{AgentStatus, BumpKind, FileRegistry, SemVer};
use promptdesk::store::{FileStore, KeyValueStore};
use promptdesk::tester::{ChatRole, ConversationTester};
use promptdesk::{Desk, DeskConfig, DeskError, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Manage AI agents, their versioned system prompts, and test them in a
/// simulated chat.
#[derive(Parser)]
#[command(name = "promptdesk")]
struct Cli {
    /// Data directory holding the registry and transcripts.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data-dir>/promptdesk.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Author recorded on committed versions.
    #[arg(long, global = true)]
    author: Option<String>,

    /// Simulated reply latency in milliseconds.
    #[arg(long, global = true)]
    reply_delay_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the model catalog.
    Models,

    /// Manage agents.
    Agents {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Manage prompts and their versions.
    Prompts {
        #[command(subcommand)]
        command: PromptCommand,
    },

    /// Render a system prompt from structured fields.
    Generate(GenerateArgs),

    /// Chat with an agent.
    Chat {
        agent_id: String,

        /// Prompt version to test instead of the current one.
        #[arg(long)]
        version: Option<SemVer>,
    },
}

#[derive(Subcommand)]
enum AgentCommand {
    List,
    Create {
        name: String,

        /// Prompt to link.
        #[arg(long)]
        prompt: String,

        /// Model id (default from config).
        #[arg(long)]
        model: Option<String>,

        /// Create the agent inactive.
        #[arg(long)]
        inactive: bool,
    },
    Show {
        id: String,
    },
    /// Flip between active and inactive.
    Toggle {
        id: String,
    },
    SetModel {
        id: String,
        model: String,
    },
    /// Link a prompt.
    Link {
        id: String,
        prompt: String,
    },
    /// Save a new version of the agent's linked prompt.
    SaveVersion {
        id: String,

        #[arg(long, default_value = "minor")]
        bump: BumpKind,

        /// Release notes.
        #[arg(long)]
        notes: String,

        #[command(flatten)]
        input: TextInput,
    },
}

#[derive(Subcommand)]
enum PromptCommand {
    List,
    Create {
        #[arg(long)]
        title: String,

        #[command(flatten)]
        input: TextInput,
    },
    /// Commit a new version.
    Edit {
        id: String,

        /// New title (default: keep).
        #[arg(long)]
        title: Option<String>,

        #[arg(long, default_value = "minor")]
        bump: BumpKind,

        /// Change description.
        #[arg(long)]
        notes: Option<String>,

        #[command(flatten)]
        input: TextInput,
    },
    History {
        id: String,
    },
    /// Re-commit an old version's text as the newest version.
    Restore {
        id: String,
        version: SemVer,
    },
    Show {
        id: String,

        #[arg(long)]
        version: Option<SemVer>,

        /// Print only the prompt text.
        #[arg(long)]
        copy: bool,
    },
}

/// Prompt text from a flag, a file, or stdin.
#[derive(clap::Args)]
struct TextInput {
    #[arg(long, conflicts_with = "file")]
    text: Option<String>,

    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(clap::Args)]
struct GenerateArgs {
    /// Persona name.
    #[arg(long)]
    name: String,

    #[arg(long)]
    role: String,

    /// Target audience.
    #[arg(long, default_value = "")]
    audience: String,

    #[arg(long, default_value = "")]
    objective: String,

    /// Tone of voice: amigavel, formal, tecnico, educado, institucional,
    /// neutro, engracado, or free text.
    #[arg(long, default_value = "")]
    tone: String,

    /// Forbidden patterns.
    #[arg(long, default_value = "")]
    forbidden: String,

    /// Additional instructions appended to the generated base.
    #[arg(long)]
    refine: Option<String>,

    /// Commit the result as a new prompt with this title.
    #[arg(long)]
    save_as: Option<String>,
}

/// Clipboard that writes to stdout, so `--copy` output can be piped.
struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn write_text(&self, text: &str) -> Result<()> {
        println!("{text}");
        Ok(())
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("promptdesk=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<DeskConfig> {
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| DeskConfig::default().data_dir);
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    let mut config = DeskConfig::load(&path)?;
    if let Some(dir) = &cli.data_dir {
        config = config.with_data_dir(dir);
    }
    if let Some(author) = &cli.author {
        config = config.with_author(author);
    }
    if let Some(ms) = cli.reply_delay_ms {
        config = config.with_reply_delay(Duration::from_millis(ms));
    }
    Ok(config)
}

fn read_text(input: TextInput) -> Result<String> {
    match (input.text, input.file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| DeskError::io(format!("failed to read {}", path.display()), e)),
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| DeskError::io("failed to read stdin", e))?;
            Ok(buf)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let registry = Arc::new(FileRegistry::open(&config.data_dir)?);
    let events = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(FnEventHandler::new(|event| {
            if let DeskEvent::Notice(notice) = event {
                eprintln!("{}: {}", notice.title, notice.description);
            }
        }));
    let desk = Desk::new(registry, config).with_event_handler(Arc::new(events));

    match cli.command {
        Command::Models => {
            for model in desk.models() {
                let marker = if model.id == desk.config().default_model {
                    "*"
                } else {
                    " "
                };
                println!("{marker} {:<32} {}", model.id, model.label);
            }
        }
        Command::Agents { command } => run_agents(&desk, command)?,
        Command::Prompts { command } => run_prompts(&desk, command)?,
        Command::Generate(args) => run_generate(&desk, args)?,
        Command::Chat { agent_id, version } => run_chat(&desk, &agent_id, version).await?,
    }
    Ok(())
}

fn run_agents(desk: &Desk, command: AgentCommand) -> Result<()> {
    match command {
        AgentCommand::List => {
            for agent in desk.registry().agents()? {
                println!(
                    "{:<24} {:<10} {:<30} {}",
                    agent.id,
                    agent.status.label(),
                    agent.model,
                    agent.name
                );
            }
        }
        AgentCommand::Create {
            name,
            prompt,
            model,
            inactive,
        } => {
            let mut form = CreateAgentForm::new(desk.config());
            form.name = name;
            form.prompt_id = Some(prompt);
            if let Some(model) = model {
                form.model = model;
            }
            if inactive {
                form.status = AgentStatus::Inactive;
            }
            let agent = desk.create_agent(form)?;
            println!("{}", agent.id);
        }
        AgentCommand::Show { id } => {
            let agent = desk.registry().agent(&id)?;
            println!("{} ({})", agent.name, agent.id);
            println!("  status:  {}", agent.status.label());
            println!("  model:   {}", agent.model);
            match desk.agent_prompt(&id) {
                Ok(prompt) => {
                    println!("  prompt:  {} v{}", prompt.title, prompt.current_version);
                    if let Some(current) = prompt.current() {
                        println!("\n{}", current.text);
                    }
                }
                Err(_) => println!("  prompt:  -"),
            }
        }
        AgentCommand::Toggle { id } => {
            let agent = desk.toggle_agent_status(&id)?;
            println!("{} {}", agent.id, agent.status.label());
        }
        AgentCommand::SetModel { id, model } => {
            let agent = desk.set_agent_model(&id, &model)?;
            println!("{} {}", agent.id, agent.model);
        }
        AgentCommand::Link { id, prompt } => {
            let agent = desk.link_prompt(&id, &prompt)?;
            println!("{} -> {prompt}", agent.id);
        }
        AgentCommand::SaveVersion {
            id,
            bump,
            notes,
            input,
        } => {
            let text = read_text(input)?;
            let mut form = SaveVersion { bump, notes };
            let version = desk.save_agent_version(&id, &mut form, &text)?;
            println!("v{}", version.version);
        }
    }
    Ok(())
}

fn run_prompts(desk: &Desk, command: PromptCommand) -> Result<()> {
    match command {
        PromptCommand::List => {
            for prompt in desk.registry().prompts()? {
                println!(
                    "{:<24} v{:<8} {:>3} version(s)  {}",
                    prompt.id,
                    prompt.current_version.to_string(),
                    prompt.version_count(),
                    prompt.title
                );
            }
        }
        PromptCommand::Create { title, input } => {
            let text = read_text(input)?;
            let draft = PromptDraft::editing(title, text);
            let outcome = desk.commit(VersionCommit::create(), draft)?;
            println!("{}", outcome.prompt_id());
        }
        PromptCommand::Edit {
            id,
            title,
            bump,
            notes,
            input,
        } => {
            let mut draft = desk.edit_draft(&id)?;
            if let Some(title) = title {
                draft = desk.apply_draft(draft, DraftAction::SetTitle(title));
            }
            draft = desk.apply_draft(draft, DraftAction::SetText(read_text(input)?));
            let commit = VersionCommit::edit(&id)
                .with_bump(bump)
                .with_notes(notes.unwrap_or_default());
            if let CommitOutcome::Appended { version, .. } = desk.commit(commit, draft)? {
                println!("v{}", version.version);
            }
        }
        PromptCommand::History { id } => {
            let history = desk.history(&id)?;
            println!("{} ({})", history.title, history.prompt_id);
            for entry in &history.entries {
                let v = &entry.version;
                let marker = if entry.is_current { "*" } else { " " };
                println!(
                    "{marker} v{:<8} {:<5} {}  {}  {}",
                    v.version.to_string(),
                    v.bump.as_str(),
                    v.created_at.format("%Y-%m-%d %H:%M"),
                    v.author,
                    v.notes
                );
            }
        }
        PromptCommand::Restore { id, version } => {
            let restored = desk.restore(&id, version)?;
            println!("v{}", restored.version);
        }
        PromptCommand::Show { id, version, copy } => {
            let prompt = desk.registry().prompt(&id)?;
            let version = version.unwrap_or(prompt.current_version);
            if copy {
                desk.copy_version(&StdoutClipboard, &id, version)?;
                return Ok(());
            }
            let entry = prompt
                .version(version)
                .ok_or_else(|| DeskError::not_found("version", format!("{id}@{version}")))?;
            println!("{} v{} ({})", prompt.title, entry.version, entry.bump);
            println!("{}  {}", entry.author, entry.created_at.format("%Y-%m-%d %H:%M"));
            println!("{}\n", entry.notes);
            println!("{}", entry.text);
        }
    }
    Ok(())
}

fn run_generate(desk: &Desk, args: GenerateArgs) -> Result<()> {
    let tone = args
        .tone
        .parse::<Tone>()
        .map(|t| t.label().to_string())
        .unwrap_or(args.tone);
    let mut actions = vec![
        DraftAction::SetMode(DraftMode::Assisted),
        DraftAction::SetField(DraftField::Name, args.name),
        DraftAction::SetField(DraftField::Role, args.role),
        DraftAction::SetField(DraftField::Audience, args.audience),
        DraftAction::SetField(DraftField::Objective, args.objective),
        DraftAction::SetField(DraftField::Tone, tone),
        DraftAction::SetField(DraftField::Forbidden, args.forbidden),
        DraftAction::Generate,
    ];
    if let Some(refinement) = args.refine {
        actions.push(DraftAction::SetRefinement(refinement));
        actions.push(DraftAction::Generate);
    }
    if let Some(title) = &args.save_as {
        actions.push(DraftAction::SetTitle(title.clone()));
    }

    let mut draft = PromptDraft::default();
    for action in actions {
        draft = desk.apply_draft(draft, action);
    }

    if args.save_as.is_some() {
        let outcome = desk.commit(VersionCommit::create(), draft)?;
        println!("{}", outcome.prompt_id());
    } else {
        println!("{}", draft.text);
    }
    Ok(())
}

async fn run_chat(desk: &Desk, agent_id: &str, version: Option<SemVer>) -> Result<()> {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(desk.config().transcripts_dir())?);
    let mut tester = desk.tester(store)?;
    let snapshot = desk.agent_snapshot(agent_id, version)?;
    let name = snapshot.agent_name.clone();
    tester.select_agent(snapshot)?;
    eprintln!(
        "Chatting with {name}. Commands: /new /list /open <id> /delete <id> /quit \
         (Ctrl-C cancels a pending reply, or exits at the prompt)"
    );
    chat_loop(&mut tester, BufReader::new(tokio::io::stdin())).await
}

/// One line of chat input.
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Blank,
    Quit,
    New,
    List,
    Open(&'a str),
    Delete(&'a str),
    Message(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "" => Self::Blank,
            "/quit" => Self::Quit,
            "/new" => Self::New,
            "/list" => Self::List,
            "/open" => Self::Open(arg.trim()),
            "/delete" => Self::Delete(arg.trim()),
            _ => Self::Message(line),
        }
    }
}

/// Read chat input until `/quit`, EOF, or Ctrl-C at the prompt. A failing
/// command is reported and the session goes on; only read errors end it.
async fn chat_loop<R>(tester: &mut ConversationTester, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => {
                line.map_err(|e| DeskError::io("failed to read stdin", e))?
            }
            Ok(()) = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else { break };
        match ChatInput::parse(&line) {
            ChatInput::Quit => break,
            input => {
                if let Err(e) = handle_chat_input(tester, input).await {
                    eprintln!("Error: {e}");
                }
            }
        }
    }
    Ok(())
}

async fn handle_chat_input(tester: &mut ConversationTester, input: ChatInput<'_>) -> Result<()> {
    match input {
        ChatInput::Blank | ChatInput::Quit => {}
        ChatInput::New => {
            let id = tester.new_conversation()?.id.clone();
            eprintln!("Opened {id}");
        }
        ChatInput::List => {
            let active = tester.active().map(|c| c.id.as_str());
            for conv in tester.conversations() {
                let marker = if Some(conv.id.as_str()) == active {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {:<24} {:<20} {}",
                    conv.id, conv.agent.agent_name, conv.title
                );
            }
        }
        ChatInput::Open(id) => {
            tester.open_conversation(id)?;
            print_transcript(tester);
        }
        ChatInput::Delete(id) => {
            tester.delete_conversation(id)?;
            eprintln!("Deleted {id}");
        }
        ChatInput::Message(text) => send_line(tester, text).await?,
    }
    Ok(())
}

/// Send one message; Ctrl-C cancels the pending reply.
async fn send_line(tester: &mut ConversationTester, line: &str) -> Result<()> {
    let pending = tester.submit(line)?;
    let cancel = pending.cancel_handle();
    let wait = pending.wait();
    tokio::pin!(wait);
    let outcome = tokio::select! {
        outcome = &mut wait => outcome,
        Ok(()) = tokio::signal::ctrl_c() => {
            cancel.cancel();
            wait.await
        }
    };
    match tester.resolve(outcome)? {
        Some(reply) => {
            let name = tester
                .selected_agent()
                .map(|a| a.agent_name.as_str())
                .unwrap_or("agent");
            println!("{name}: {}", reply.content);
        }
        None => eprintln!("(reply cancelled)"),
    }
    Ok(())
}

fn print_transcript(tester: &ConversationTester) {
    let name = tester
        .selected_agent()
        .map(|a| a.agent_name.as_str())
        .unwrap_or("agent");
    for message in tester.transcript() {
        match message.role {
            ChatRole::User => println!("> {}", message.content),
            ChatRole::Assistant => println!("{name}: {}", message.content),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptdesk::store::MemoryStore;
    use promptdesk::tester::{AgentSnapshot, CannedResponder, TranscriptStore};

    fn tester() -> ConversationTester {
        let transcripts =
            TranscriptStore::new(Arc::new(MemoryStore::new()), promptdesk::TRANSCRIPT_KEY);
        let responder = CannedResponder::new("resposta", Duration::from_millis(5));
        let mut tester = ConversationTester::new(Arc::new(responder), transcripts).unwrap();
        tester
            .select_agent(AgentSnapshot {
                agent_id: "ag-1".into(),
                agent_name: "Suporte".into(),
                model: promptdesk::DEFAULT_MODEL.into(),
                prompt_version: None,
                system_prompt: None,
            })
            .unwrap();
        tester
    }

    #[test]
    fn chat_input_parses_commands_and_messages() {
        assert_eq!(ChatInput::parse("   "), ChatInput::Blank);
        assert_eq!(ChatInput::parse("/quit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/open  cv-1 "), ChatInput::Open("cv-1"));
        assert_eq!(ChatInput::parse("/delete cv-2"), ChatInput::Delete("cv-2"));
        assert_eq!(ChatInput::parse(" olá mundo "), ChatInput::Message("olá mundo"));
    }

    #[tokio::test]
    async fn failing_commands_do_not_end_the_session() {
        let mut tester = tester();
        let input: &[u8] = b"/open nope\n/delete nope\nola\n/quit\ndepois\n";
        chat_loop(&mut tester, input).await.unwrap();

        let roles: Vec<ChatRole> = tester.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, [ChatRole::User, ChatRole::Assistant]);
        assert_eq!(tester.transcript()[0].content, "ola");
    }

    #[tokio::test]
    async fn end_of_input_ends_the_session() {
        let mut tester = tester();
        let input: &[u8] = b"/new\n";
        chat_loop(&mut tester, input).await.unwrap();
        assert!(tester.transcript().is_empty());
    }
}
