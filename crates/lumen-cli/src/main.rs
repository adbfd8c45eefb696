use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lumen_contracts::chat::{parse_intent, Intent, CHAT_HELP_COMMANDS};
use lumen_contracts::config::{
    default_config_path, load_file_config, ConfigOverrides, StudioConfig,
};
use lumen_contracts::events::{EventPayload, EventWriter};
use lumen_contracts::history::SessionHistory;
use lumen_contracts::models::Capability;
use lumen_contracts::session::SessionContext;
use lumen_engine::export::{export_history_html, save_entry, save_numbered};
use lumen_engine::{
    DryrunModel, GeminiClient, GenerationOutcome, GenerativeModel, InputImage, Studio,
    StudioError,
};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

const MISSING_KEY_MESSAGE: &str = "Add your Google API key to start.";
const DEFAULT_EXPORT_NAME: &str = "lumen_history.html";

#[derive(Debug, Parser)]
#[command(name = "lumen", version, about = "Gemini image studio")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    api_key: Option<String>,
    #[arg(long, global = true)]
    text_model: Option<String>,
    #[arg(long, global = true)]
    image_model: Option<String>,
    /// Rewrite prompts with the text model before generating.
    #[arg(long, global = true)]
    enhance: bool,
    /// Use the offline model; no key or network needed.
    #[arg(long, global = true)]
    dryrun: bool,
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Chat(ChatArgs),
    Generate(GenerateArgs),
    Edit(EditArgs),
    Pose(PoseArgs),
}

#[derive(Debug, Parser)]
struct ChatArgs {
    /// Where each new result is also written.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    image: PathBuf,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Parser)]
struct PoseArgs {
    #[arg(long)]
    base: PathBuf,
    #[arg(long)]
    reference: PathBuf,
    #[arg(long)]
    out: PathBuf,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lumen error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = resolve_config(&cli, |key| std::env::var(key).ok())?;
    let Some(model) = build_model(&config, cli.dryrun) else {
        eprintln!("{MISSING_KEY_MESSAGE}");
        return Ok(1);
    };

    let mut session = SessionContext::new(config.settings.clone());
    let events = match cli.events.as_ref() {
        Some(path) => EventWriter::new(path, session.session_id()),
        None => EventWriter::disabled(session.session_id()),
    };
    events.emit(
        "session_started",
        json_object(json!({
            "client": model.name(),
            "text_model": session.settings.text_model,
            "image_model": session.settings.image_model,
            "enhance_prompts": session.settings.enhance_prompts,
        })),
    )?;
    tracing::info!(
        client = model.name(),
        session_id = session.session_id(),
        "session started"
    );
    let studio = Studio::new(model, events);

    match cli.command {
        Command::Chat(args) => {
            run_chat(&studio, &mut session, args.out.as_deref())?;
            Ok(0)
        }
        Command::Generate(args) => {
            let outcome = studio.text_to_image(&mut session, &args.prompt)?;
            finish_one_shot(&outcome, &args.out)
        }
        Command::Edit(args) => {
            let image = InputImage::from_path(&args.image)?;
            let outcome = studio.edit(&mut session, Some(&image), &args.prompt)?;
            finish_one_shot(&outcome, &args.out)
        }
        Command::Pose(args) => {
            let base = InputImage::from_path(&args.base)?;
            let reference = InputImage::from_path(&args.reference)?;
            let outcome = studio.pose_transfer(&mut session, Some(&base), Some(&reference))?;
            finish_one_shot(&outcome, &args.out)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "lumen=debug" } else { "lumen=info" };
    let filter = if verbose {
        EnvFilter::new(default_directive)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_config<F>(cli: &Cli, env_lookup: F) -> Result<StudioConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match cli.config.as_deref() {
        Some(path) => load_file_config(path, true)?,
        None => match default_config_path() {
            Some(path) => load_file_config(&path, false)?,
            None => Default::default(),
        },
    };
    let overrides = ConfigOverrides {
        api_key: cli.api_key.clone(),
        text_model: cli.text_model.clone(),
        image_model: cli.image_model.clone(),
        enhance_prompts: cli.enhance,
    };
    Ok(StudioConfig::resolve(file, overrides, env_lookup))
}

/// `None` means no key and no dry-run: nothing may be sent.
fn build_model(config: &StudioConfig, dryrun: bool) -> Option<Box<dyn GenerativeModel>> {
    if dryrun {
        return Some(Box::new(DryrunModel::new()));
    }
    let api_key = config.api_key.as_deref()?;
    Some(Box::new(GeminiClient::new(
        config.api_base.clone(),
        api_key,
        config.request_timeout_s,
    )))
}

fn finish_one_shot(outcome: &GenerationOutcome, out_dir: &Path) -> Result<i32> {
    report_outcome(outcome);
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    for (idx, image) in outcome.images().iter().enumerate() {
        let path = save_numbered(
            out_dir,
            outcome.mode.slug(),
            idx + 1,
            image.file_extension(),
            &image.bytes,
        )?;
        println!("Saved {}", path.display());
    }
    Ok(0)
}

fn report_outcome(outcome: &GenerationOutcome) {
    for warning in &outcome.warnings {
        println!("warning: {warning}");
    }
    if let Some(enhanced) = outcome.enhanced_prompt.as_deref() {
        println!("Enhanced prompt: {enhanced}");
    }
    if let Some(pose) = outcome.pose_description.as_deref() {
        println!("Pose: {pose}");
    }
    let primary = outcome.primary_image();
    println!(
        "{}: {}x{} {} ({} bytes)",
        outcome.mode.label(),
        primary.width,
        primary.height,
        primary.mime_type,
        primary.bytes.len()
    );
}

fn run_chat(studio: &Studio, session: &mut SessionContext, out_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let stdin = io::stdin();
    let mut line = String::new();
    println!("Lumen chat started ({}). Type /help for commands.", studio.model_name());

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match handle_intent(studio, session, out_dir, &intent) {
            Ok(ChatFlow::Continue) => {}
            Ok(ChatFlow::Quit) => break,
            Err(err) => println!("{err:#}"),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChatFlow {
    Continue,
    Quit,
}

fn handle_intent(
    studio: &Studio,
    session: &mut SessionContext,
    out_dir: Option<&Path>,
    intent: &Intent,
) -> Result<ChatFlow> {
    match intent.action.as_str() {
        "noop" => {}
        "quit" => return Ok(ChatFlow::Quit),
        "help" => println!("Commands: {}", CHAT_HELP_COMMANDS.join(" ")),
        "generate" => {
            let prompt = intent.prompt.as_deref().unwrap_or_default();
            let outcome = studio.text_to_image(session, prompt);
            show_result(session, out_dir, outcome)?;
        }
        "edit" => {
            let image = load_optional_image(intent.arg_str("path"))?;
            let instruction = intent.prompt.as_deref().unwrap_or_default();
            let outcome = studio.edit(session, image.as_ref(), instruction);
            show_result(session, out_dir, outcome)?;
        }
        "pose_transfer" => {
            let paths = intent.arg_list("paths");
            let base = load_optional_image(paths.first().map(String::as_str))?;
            let reference = load_optional_image(paths.get(1).map(String::as_str))?;
            let outcome = studio.pose_transfer(session, base.as_ref(), reference.as_ref());
            show_result(session, out_dir, outcome)?;
        }
        "history" => {
            for line in history_lines(&session.history) {
                println!("{line}");
            }
        }
        "save" => {
            let paths = intent.arg_list("paths");
            let Some(index_text) = paths.first() else {
                println!("/save requires a history number");
                return Ok(ChatFlow::Continue);
            };
            let index = match parse_history_index(index_text, session.history.len()) {
                Ok(index) => index,
                Err(message) => {
                    println!("{message}");
                    return Ok(ChatFlow::Continue);
                }
            };
            if let Some(entry) = session.history.get(index) {
                let target = paths.get(1).map(PathBuf::from);
                let path = save_entry(entry, target.as_deref().or(out_dir))?;
                println!("Saved {}", path.display());
            }
        }
        "export" => {
            let paths = intent.arg_list("paths");
            let out_path = match paths.first() {
                Some(path) => PathBuf::from(path),
                None => out_dir
                    .map(|dir| dir.join(DEFAULT_EXPORT_NAME))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_NAME)),
            };
            export_history_html(&session.history, &out_path)?;
            println!(
                "Exported {} image(s) to {}",
                session.history.len(),
                out_path.display()
            );
        }
        "clear_history" => {
            let removed = studio.clear_history(session);
            println!("Cleared {removed} image(s) from history.");
        }
        "set_enhance" => {
            let enabled = match intent.command_args.get("enabled") {
                Some(Value::Bool(value)) => *value,
                _ => !session.settings.enhance_prompts,
            };
            session.settings.enhance_prompts = enabled;
            println!(
                "Prompt enhancement {}",
                if enabled { "on" } else { "off" }
            );
        }
        "set_text_model" => set_model(studio, session, intent, Capability::Text),
        "set_image_model" => set_model(studio, session, intent, Capability::Image),
        "models" => {
            println!("Text model: {}", session.settings.text_model);
            println!("Image model: {}", session.settings.image_model);
            for spec in studio.selector().registry.list() {
                let capabilities: Vec<&str> =
                    spec.capabilities.iter().map(|cap| cap.as_str()).collect();
                println!("  {} ({}) [{}]", spec.name, spec.provider, capabilities.join(", "));
            }
        }
        "unknown" => {
            let command = intent.arg_str("command").unwrap_or_default();
            println!("Unknown command /{command}. Type /help for commands.");
        }
        other => println!("Unsupported action {other}"),
    }
    Ok(ChatFlow::Continue)
}

fn set_model(studio: &Studio, session: &mut SessionContext, intent: &Intent, capability: Capability) {
    let current = match capability {
        Capability::Image => session.settings.image_model.clone(),
        _ => session.settings.text_model.clone(),
    };
    let Some(requested) = intent.arg_str("model") else {
        println!("Current {capability} model: {current}");
        return;
    };
    match studio.selector().select(Some(requested), capability) {
        Ok(selection) => {
            if let Some(reason) = selection.fallback_reason.as_deref() {
                println!("warning: {reason} Using {}.", selection.model.name);
            }
            let name = selection.model.name.clone();
            match capability {
                Capability::Image => session.settings.image_model = name.clone(),
                _ => session.settings.text_model = name.clone(),
            }
            println!("{} model set to {name}", capitalize(capability.as_str()));
        }
        Err(message) => println!("{message}"),
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A blank path is "not uploaded"; a bad file is an error.
fn load_optional_image(path: Option<&str>) -> Result<Option<InputImage>> {
    match path.map(str::trim).filter(|value| !value.is_empty()) {
        Some(path) => Ok(Some(InputImage::from_path(Path::new(path))?)),
        None => Ok(None),
    }
}

fn show_result(
    session: &SessionContext,
    out_dir: Option<&Path>,
    outcome: Result<GenerationOutcome, StudioError>,
) -> Result<()> {
    let outcome = outcome?;
    report_outcome(&outcome);
    if let (Some(dir), Some(entry)) = (out_dir, session.history.latest()) {
        let path = save_entry(entry, Some(dir))?;
        println!("Saved {}", path.display());
    }
    println!("History: {} image(s)", session.history.len());
    Ok(())
}

fn history_lines(history: &SessionHistory) -> Vec<String> {
    if history.is_empty() {
        return vec![
            "No images yet. Generate, edit, or transfer a pose to see your history here."
                .to_string(),
        ];
    }
    history
        .newest_first()
        .enumerate()
        .map(|(idx, entry)| {
            format!(
                "#{} {} | {}",
                idx + 1,
                entry.caption(),
                entry.prompt_preview()
            )
        })
        .collect()
}

/// Turns a 1-based history number into a newest-first index.
fn parse_history_index(raw: &str, len: usize) -> Result<usize, String> {
    let number: usize = raw
        .trim()
        .trim_start_matches('#')
        .parse()
        .map_err(|_| format!("'{raw}' is not a history number"))?;
    if number == 0 || number > len {
        return Err(format!("No history entry #{number} ({len} available)"));
    }
    Ok(number - 1)
}

fn json_object(value: Value) -> EventPayload {
    match value {
        Value::Object(map) => map,
        _ => EventPayload::new(),
    }
}
