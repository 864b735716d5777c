//! CLI binary for hark.

use anyhow::Context;
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand, ValueEnum};
use hark::actions::{BuiltinExecutor, DryRunHost};
use hark::audio::{AcquireOutcome, CpalDevice, LeaseRole, ListenOutcome, MicrophoneArbiter};
use hark::config::{ResponseStyle, SpeechEngine};
use hark::history::CommandHistory;
use hark::locate::Locator;
use hark::notes::NotesStore;
use hark::scheduler::{ReminderAnnouncer, ReminderScheduler, ScheduledTask};
use hark::stt::FallbackRecognizer;
use hark::tts::{LogSink, Speaker};
use hark::voice_command::{ActionDescriptor, ActionKind, TeachKind};
use hark::{
    CommandDispatcher, CommandResolver, CommandStore, EventHub, ListeningStateMachine,
    MachineParts, Resolution, RuntimeEvent, SettingsStore, app_dirs,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Hark: voice command assistant core.
#[derive(Parser)]
#[command(name = "hark", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the JSON command table.
    #[arg(long)]
    commands: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Type commands and hear (read) the responses.
    Chat,

    /// Show how a phrase resolves, without running it.
    Resolve {
        /// The phrase to resolve.
        text: Vec<String>,
    },

    /// Manage the command table.
    #[command(subcommand)]
    Commands(CommandsCmd),

    /// Show or change settings.
    #[command(subcommand)]
    Settings(SettingsCmd),

    /// List available audio input devices.
    Devices,

    /// Capture one utterance from the microphone and report its length.
    MicTest,
}

#[derive(Subcommand)]
enum CommandsCmd {
    /// List commands, optionally filtered.
    List {
        /// Only show triggers containing this text.
        filter: Option<String>,
    },
    /// Teach a command.
    Add {
        /// Trigger phrase.
        trigger: String,
        /// What kind of command this is.
        #[arg(long, value_enum)]
        kind: Kind,
        /// Application, search, folder, command line or text.
        detail: String,
    },
    /// Rename a command and/or change what it does.
    Edit {
        /// Existing trigger phrase.
        old: String,
        /// New trigger phrase.
        new: String,
        #[arg(long, value_enum)]
        kind: Kind,
        detail: String,
    },
    /// Bind a trigger directly to an action.
    Bind {
        trigger: String,
        /// Action name, e.g. `say_time`.
        action: String,
        /// Pass the words after the trigger as the query.
        #[arg(long)]
        dynamic: bool,
    },
    /// Delete a command.
    Remove { trigger: String },
    /// Restore the built-in commands.
    Reset,
    /// Merge commands from a JSON file.
    Import { path: PathBuf },
    /// Write all commands to a JSON file.
    Export { path: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    App,
    Website,
    Folder,
    Command,
    Text,
    Say,
}

impl From<Kind> for TeachKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::App => Self::App,
            Kind::Website => Self::Website,
            Kind::Folder => Self::Folder,
            Kind::Command => Self::Command,
            Kind::Text => Self::Text,
            Kind::Say => Self::Say,
        }
    }
}

#[derive(Subcommand)]
enum SettingsCmd {
    /// Print the effective configuration.
    Show,
    /// Change the wake phrase.
    WakeWord { phrase: Vec<String> },
    /// Microphone sensitivity, 0-100.
    Sensitivity { value: u8 },
    /// Response style.
    Style {
        #[arg(value_enum)]
        style: Style,
    },
    /// Speech recognition engine policy.
    Engine {
        #[arg(value_enum)]
        engine: Engine,
    },
    /// Turn background listening on or off.
    Background {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Style {
    Casual,
    Formal,
    Silent,
}

#[derive(Clone, Copy, ValueEnum)]
enum Engine {
    OnlineFirst,
    OnlineOnly,
    OfflineOnly,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so responses on stdout stay clean.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hark=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = Arc::new(SettingsStore::open(
        cli.config.clone().unwrap_or_else(app_dirs::config_file),
    )?);
    let commands_path = cli.commands.clone().unwrap_or_else(app_dirs::commands_file);

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(settings, commands_path).await,
        Command::Resolve { text } => resolve(&settings, commands_path, &text.join(" ")),
        Command::Commands(cmd) => manage_commands(commands_path, cmd),
        Command::Settings(cmd) => manage_settings(&settings, cmd),
        Command::Devices => list_devices(),
        Command::MicTest => mic_test(&settings),
    }
}

async fn run_chat(settings: Arc<SettingsStore>, commands_path: PathBuf) -> anyhow::Result<()> {
    let config = settings.snapshot();
    let events = Arc::new(EventHub::new());
    let speaker = Speaker::new(Arc::new(LogSink), Arc::clone(&settings));

    let announcer = ReminderAnnouncer::new(speaker.clone(), Arc::clone(&events), &config.scheduler);
    let reminders = ReminderScheduler::new(
        tokio::runtime::Handle::current(),
        config.scheduler.clone(),
        announcer.into_callback(),
    );

    let notes_dir = config.notes.dir.clone().unwrap_or_else(app_dirs::notes_dir);
    let executor = BuiltinExecutor::new(
        Arc::new(DryRunHost),
        NotesStore::open(notes_dir)?,
        Locator::from_home(),
    )
    .with_reminders(reminders.clone());

    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::new(CommandStore::open(commands_path)?),
        CommandResolver::new(config.resolver.clone()),
        Arc::new(executor),
        Arc::new(CommandHistory::new(&config.history)),
        Arc::clone(&events),
    ));

    // No recognition engine ships with the CLI; voice cycles report a
    // service error, typed input works fully.
    let recognizer = Arc::new(FallbackRecognizer::new(None, None, Arc::clone(&settings)));
    let machine = ListeningStateMachine::new(MachineParts {
        arbiter: MicrophoneArbiter::new(Arc::new(CpalDevice::new(config.audio.clone()))),
        recognizer,
        dispatcher: Arc::clone(&dispatcher),
        speaker: speaker.clone(),
        settings: Arc::clone(&settings),
        events: Arc::clone(&events),
    });

    let rx = events.subscribe();
    std::thread::Builder::new()
        .name("hark-events".into())
        .spawn(move || {
            for event in rx {
                if let Some(line) = event_line(&event) {
                    println!("\n{line}");
                }
            }
        })?;

    if config.listening.background && machine.start_background()? {
        info!("background wake loop started");
    }

    println!("Hark v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "Say '{}' or type :listen to speak a command.",
        settings.wake_phrase()
    );
    println!("Type a command, or :history, :unrecognized, :reminders, :teach, :listen, :quit.\n");
    speaker.say("Hark is ready.");

    let repl_machine = machine.clone();
    let repl_reminders = reminders.clone();
    tokio::task::spawn_blocking(move || repl(&repl_machine, &dispatcher, &repl_reminders))
        .await
        .context("chat loop failed")??;

    reminders.shutdown();
    machine.stop_background();
    info!("goodbye");
    Ok(())
}

/// One line of chat input.
#[derive(Debug, PartialEq)]
enum ChatLine<'a> {
    Empty,
    Quit,
    History,
    Unrecognized,
    Reminders,
    Listen,
    Teach(&'a str),
    Text(&'a str),
}

impl<'a> ChatLine<'a> {
    fn parse(line: &'a str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            ":quit" | ":q" => Self::Quit,
            ":history" => Self::History,
            ":unrecognized" => Self::Unrecognized,
            ":reminders" => Self::Reminders,
            ":listen" => Self::Listen,
            text => match text.strip_prefix(":teach ") {
                Some(rest) => Self::Teach(rest),
                None => Self::Text(text),
            },
        }
    }
}

/// Status line printed for events the chat surfaces.
fn event_line(event: &RuntimeEvent) -> Option<String> {
    match event {
        RuntimeEvent::ReminderDue { description, .. } => Some(format!("[reminder] {description}")),
        RuntimeEvent::StateChanged { state, message } => Some(format!("[{state}] {message}")),
        RuntimeEvent::WakeWordDetected { heard, score } => {
            Some(format!("[wake] heard '{heard}' ({score})"))
        }
        _ => None,
    }
}

fn reminder_line(task: &ScheduledTask, now: DateTime<Local>) -> String {
    let when = if task.is_due(now) {
        "due now".to_owned()
    } else {
        format!("in {} min", task.remaining(now).as_secs().div_ceil(60))
    };
    format!(
        "#{} {} at {} ({when})",
        task.id,
        task.description,
        task.due_at.format("%H:%M")
    )
}

fn repl(
    machine: &ListeningStateMachine,
    dispatcher: &CommandDispatcher,
    reminders: &ReminderScheduler,
) -> anyhow::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        print!("you> ");
        stdout.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        match ChatLine::parse(&line) {
            ChatLine::Empty => continue,
            ChatLine::Quit => return Ok(()),
            ChatLine::History => {
                for entry in dispatcher.history().entries() {
                    println!(
                        "  {}  {}  ->  {}",
                        entry.at.format("%H:%M:%S"),
                        entry.command,
                        entry.response
                    );
                }
            }
            ChatLine::Unrecognized => {
                for phrase in dispatcher.history().unrecognized() {
                    println!("  {phrase}");
                }
            }
            ChatLine::Reminders => {
                let now = Local::now();
                for task in reminders.active() {
                    println!("  {}", reminder_line(&task, now));
                }
            }
            ChatLine::Listen => match machine.activate() {
                Ok(true) => println!("  Listening..."),
                Ok(false) => println!("  Busy, try again in a moment."),
                Err(e) => eprintln!("error: {e}"),
            },
            ChatLine::Teach(rest) => match teach_line(dispatcher, rest) {
                Ok(message) => println!("  {message}"),
                Err(e) => eprintln!("error: {e}"),
            },
            ChatLine::Text(text) => match machine.submit_text(text) {
                Ok(response) => println!("hark> {response}"),
                Err(e) => eprintln!("error: {e}"),
            },
        }
    }
}

/// `<phrase> = <action>[ *]`; a trailing `*` makes the trigger dynamic.
fn teach_line(dispatcher: &CommandDispatcher, line: &str) -> anyhow::Result<String> {
    let (phrase, action) = line
        .split_once('=')
        .context("usage: :teach <phrase> = <action>[ *]")?;
    let action = action.trim();
    let (action, dynamic) = match action.strip_suffix('*') {
        Some(rest) => (rest.trim_end(), true),
        None => (action, false),
    };
    let action: ActionKind = action.parse()?;
    let descriptor = if dynamic {
        ActionDescriptor::dynamic(action)
    } else {
        ActionDescriptor::simple(action)
    };
    let replaced = dispatcher.teach(phrase, descriptor)?;
    let verb = if replaced { "Updated" } else { "Learned" };
    Ok(format!("{verb} '{}' -> {action}", phrase.trim()))
}

fn resolve(settings: &SettingsStore, commands_path: PathBuf, text: &str) -> anyhow::Result<()> {
    let store = CommandStore::open(commands_path)?;
    let resolver = CommandResolver::new(settings.read().resolver.clone());
    match resolver.resolve(text, &store.read()) {
        Resolution::Resolved(cmd) => {
            println!("action:     {}", cmd.action);
            println!("tier:       {:?}", cmd.tier);
            if let Some(trigger) = &cmd.matched_trigger {
                println!("trigger:    {trigger}");
            }
            if let Some(rule) = cmd.rule {
                println!("rule:       {rule}");
            }
            println!("confidence: {}", cmd.confidence);
            println!("hedged:     {}", cmd.hedged);
            for (key, value) in &cmd.params {
                println!("param:      {key} = {value}");
            }
        }
        Resolution::Unresolved => println!("unresolved"),
    }
    Ok(())
}

fn manage_commands(path: PathBuf, cmd: CommandsCmd) -> anyhow::Result<()> {
    let store = CommandStore::open(path)?;
    match cmd {
        CommandsCmd::List { filter } => {
            let table = store.read();
            let entries: Vec<_> = match &filter {
                Some(q) => table.search(q),
                None => table.iter().collect(),
            };
            for entry in entries {
                let mut line = format!("{:<24} {}", entry.trigger, entry.descriptor.action);
                if entry.descriptor.dynamic {
                    line.push_str(" {query}");
                }
                for (key, value) in &entry.descriptor.params {
                    line.push_str(&format!(" {key}={value}"));
                }
                println!("{line}");
            }
        }
        CommandsCmd::Add {
            trigger,
            kind,
            detail,
        } => {
            let replaced = store.teach(&trigger, TeachKind::from(kind).descriptor(&detail))?;
            println!("{} '{trigger}'", if replaced { "Updated" } else { "Added" });
        }
        CommandsCmd::Edit {
            old,
            new,
            kind,
            detail,
        } => {
            store.edit(&old, &new, TeachKind::from(kind).descriptor(&detail))?;
            println!("Updated '{old}' -> '{new}'");
        }
        CommandsCmd::Bind {
            trigger,
            action,
            dynamic,
        } => {
            let action: ActionKind = action.parse()?;
            let descriptor = if dynamic {
                ActionDescriptor::dynamic(action)
            } else {
                ActionDescriptor::simple(action)
            };
            store.teach(&trigger, descriptor)?;
            println!("Bound '{trigger}' to {action}");
        }
        CommandsCmd::Remove { trigger } => {
            if store.remove(&trigger)? {
                println!("Removed '{trigger}'");
            } else {
                println!("No command '{trigger}'");
            }
        }
        CommandsCmd::Reset => {
            store.reset_to_defaults()?;
            println!("Restored {} built-in commands", store.read().len());
        }
        CommandsCmd::Import { path } => {
            let merged = store.import(&path)?;
            println!("Imported {merged} commands from {}", path.display());
        }
        CommandsCmd::Export { path } => {
            store.export(&path)?;
            println!("Exported {} commands to {}", store.read().len(), path.display());
        }
    }
    Ok(())
}

fn manage_settings(settings: &SettingsStore, cmd: SettingsCmd) -> anyhow::Result<()> {
    match cmd {
        SettingsCmd::Show => print!("{}", toml::to_string_pretty(&settings.snapshot())?),
        SettingsCmd::WakeWord { phrase } => settings.set_wake_word(&phrase.join(" "))?,
        SettingsCmd::Sensitivity { value } => settings.set_sensitivity(value)?,
        SettingsCmd::Style { style } => settings.set_response_style(match style {
            Style::Casual => ResponseStyle::Casual,
            Style::Formal => ResponseStyle::Formal,
            Style::Silent => ResponseStyle::Silent,
        })?,
        SettingsCmd::Engine { engine } => settings.set_speech_engine(match engine {
            Engine::OnlineFirst => SpeechEngine::OnlineFirst,
            Engine::OnlineOnly => SpeechEngine::OnlineOnly,
            Engine::OfflineOnly => SpeechEngine::OfflineOnly,
        })?,
        SettingsCmd::Background { enabled } => settings.set_background_listening(enabled)?,
    }
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in CpalDevice::list_input_devices()? {
        println!("  - {name}");
    }
    Ok(())
}

fn mic_test(settings: &SettingsStore) -> anyhow::Result<()> {
    let config = settings.snapshot();
    let arbiter = MicrophoneArbiter::new(Arc::new(CpalDevice::new(config.audio.clone())));
    let AcquireOutcome::Granted(mut lease) = arbiter.acquire(LeaseRole::Active, true)? else {
        anyhow::bail!("microphone is busy");
    };

    println!("Say something...");
    match lease.listen(config.listening.active_window())? {
        ListenOutcome::Speech(segment) => println!(
            "Captured {:.2}s of speech at {} Hz",
            segment.duration().as_secs_f64(),
            segment.sample_rate
        ),
        ListenOutcome::Timeout => println!("No speech detected."),
    }
    lease.release();
    Ok(())
}
