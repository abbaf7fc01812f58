//! Buildora CLI - compose, preview, generate and archive small web projects
//!
//! Usage:
//!   buildora init                          Write a default .buildora/config.toml
//!   buildora new <name>                    Create a project from a starter template
//!   buildora list                          List stored projects
//!   buildora compose <project>             Print the composed preview document
//!   buildora preview <project>             Serve a live preview with diagnostics
//!   buildora generate <description>        Generate a new project
//!   buildora generate <instr> -p <project> -f <file>
//!                                          Edit one file of a project
//!   buildora chat [-p <project>]           Multi-turn assistant; code replies
//!                                          are applied to the project
//!   buildora export <project>              Export a zip archive
//!   buildora import <file.zip|file.json>   Import a project
//!
//! `<project>` is either a path to a project JSON file or an id in the store.

mod location;

use anyhow::{bail, Context, Result};
use buildora_agent::{
    extract, fallback_text, prompt, sanitize_project_name, Conversation, GenerationClient,
    GenerationSession, PROJECT_FILES,
};
use buildora_archive::{import_json, import_zip, ArchiveComposer, DownloadSlot, ExportMode};
use buildora_compose::{compose, compose_entry};
use buildora_core::fail_open::{fail_open, fail_open_with_retries};
use buildora_core::store::{JsonDirStore, ProjectStore};
use buildora_core::templates::Template;
use buildora_core::{BuildoraConfig, FileUpdate, Project, ProjectGraph, ProjectKind};
use buildora_sandbox::{PreviewServer, SandboxHost};
use clap::{Parser, Subcommand};
use location::{write_project_file, Location};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "buildora")]
#[command(author, version, about = "Compose, preview, generate and archive small web projects")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Workspace root holding .buildora/ (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,

    /// Create a project from a starter template
    New {
        /// Project name
        name: String,

        /// Starter template (static-landing, legacy-basic)
        #[arg(short, long, default_value = "static-landing")]
        template: Template,

        /// Write the project to this JSON file instead of the store
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// List stored projects, most recently modified first
    List,

    /// Copy a project under fresh ids
    Duplicate {
        /// Project file or store id
        project: String,
    },

    /// Print the composed preview document
    Compose {
        /// Project file or store id
        project: String,

        /// Entry document (defaults to the first index* document)
        #[arg(short, long)]
        entry: Option<String>,

        /// Write the document here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Serve a live preview and stream its diagnostics
    Preview {
        /// Project file or store id
        project: String,

        /// Entry document (defaults to the first index* document)
        #[arg(short, long)]
        entry: Option<String>,

        /// Address to bind (overrides preview.bind)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Generate a project, or edit one file of an existing project
    Generate {
        /// Project description, or the edit instruction with --file
        instruction: String,

        /// Project to edit (file or store id)
        #[arg(short, long, requires = "file")]
        project: Option<String>,

        /// File to edit within the project
        #[arg(short, long, requires = "project")]
        file: Option<String>,

        /// Write a newly generated project to this JSON file instead of the store
        #[arg(short, long, value_name = "FILE", conflicts_with = "project")]
        out: Option<PathBuf>,
    },

    /// Talk to the assistant, carrying prior turns into every request
    Chat {
        /// Apply files from code replies to this project (file or store id)
        #[arg(short, long)]
        project: Option<String>,

        /// Keep the conversation in this JSON transcript across runs
        #[arg(short, long, value_name = "FILE")]
        transcript: Option<PathBuf>,

        /// Send one message and exit instead of reading turns from stdin
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Export a project archive
    Export {
        /// Project file or store id
        project: String,

        /// structured (folders mirrored) or merged (single document)
        #[arg(short, long, default_value = "structured")]
        mode: ExportMode,

        /// Directory to save the archive in
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Import a zip archive or project JSON record
    Import {
        /// Archive or JSON file
        file: PathBuf,

        /// Project name when the archive does not provide one
        #[arg(short, long)]
        name: Option<String>,

        /// Write the project to this JSON file instead of the store
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins when set
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = BuildoraConfig::load_or_default(&cli.root).context("Failed to load config")?;
    let store = JsonDirStore::new(cli.root.join(&config.store.directory));

    match cli.command {
        Commands::Init => cmd_init(&cli.root),
        Commands::New {
            name,
            template,
            out,
        } => cmd_new(&store, name, template, out).await,
        Commands::List => cmd_list(&store).await,
        Commands::Duplicate { project } => cmd_duplicate(&store, project).await,
        Commands::Compose {
            project,
            entry,
            out,
        } => cmd_compose(&store, project, entry, out).await,
        Commands::Preview {
            project,
            entry,
            bind,
        } => cmd_preview(&config, &store, project, entry, bind).await,
        Commands::Generate {
            instruction,
            project,
            file,
            out,
        } => match (project, file) {
            (Some(project), Some(file)) => {
                cmd_edit(&config, &store, instruction, project, file).await
            }
            _ => cmd_create(&config, &store, instruction, out).await,
        },
        Commands::Chat {
            project,
            transcript,
            message,
        } => cmd_chat(&config, &store, project, transcript, message).await,
        Commands::Export { project, mode, out } => {
            cmd_export(&config, &store, project, mode, out).await
        }
        Commands::Import { file, name, out } => cmd_import(&store, file, name, out).await,
    }
}

fn cmd_init(root: &Path) -> Result<()> {
    let path = BuildoraConfig::write_default(root).context("Failed to write config")?;
    println!("Wrote {}", path.display());
    println!();
    println!("Set OPENROUTER_API_KEY (or generation.api_key_env) before running `buildora generate`.");
    Ok(())
}

/// Persist a new project to `out` or the store, returning where it went
async fn persist_new(store: &JsonDirStore, project: &Project, out: Option<PathBuf>) -> Result<String> {
    match out {
        Some(path) => {
            write_project_file(&path, project)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path.display().to_string())
        }
        None => {
            store
                .put(project)
                .await
                .context("Failed to save project to store")?;
            Ok(format!("store:{}", project.id))
        }
    }
}

async fn cmd_new(
    store: &JsonDirStore,
    name: String,
    template: Template,
    out: Option<PathBuf>,
) -> Result<()> {
    let project = template.instantiate(&name);
    let saved = persist_new(store, &project, out).await?;

    info!(id = %project.id, template = template.id(), "Created project");
    println!("Created {} ({} files) -> {}", project.name, project.graph.len(), saved);
    Ok(())
}

async fn cmd_list(store: &JsonDirStore) -> Result<()> {
    let projects = store.list().await.context("Failed to list projects")?;
    if projects.is_empty() {
        println!("No projects in {}", store.dir().display());
        return Ok(());
    }

    for project in projects {
        println!(
            "{}  {:<24} {:<16} {} files, modified {}",
            project.id,
            project.name,
            project.graph.kind,
            project.graph.len(),
            project.last_modified.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

async fn cmd_duplicate(store: &JsonDirStore, project: String) -> Result<()> {
    let location = Location::parse(&project);
    let original = location
        .load(store)
        .await
        .with_context(|| format!("Failed to load {}", location))?;

    let copy = original.duplicate();
    store.put(&copy).await.context("Failed to save copy")?;

    println!("Duplicated {} as {} -> store:{}", original.name, copy.name, copy.id);
    Ok(())
}

async fn cmd_compose(
    store: &JsonDirStore,
    project: String,
    entry: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let location = Location::parse(&project);
    let project = location
        .load(store)
        .await
        .with_context(|| format!("Failed to load {}", location))?;

    let document = match entry {
        Some(entry) => compose(&project.graph, &entry),
        None => compose_entry(&project.graph),
    };

    match out {
        Some(path) => {
            tokio::fs::write(&path, &document)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {} ({} bytes)", path.display(), document.len());
        }
        None => println!("{}", document),
    }
    Ok(())
}

async fn cmd_preview(
    config: &BuildoraConfig,
    store: &JsonDirStore,
    project: String,
    entry: Option<String>,
    bind: Option<String>,
) -> Result<()> {
    let location = Location::parse(&project);
    let mut current = location
        .load(store)
        .await
        .with_context(|| format!("Failed to load {}", location))?;

    let bind = bind.unwrap_or_else(|| config.preview.bind.clone());
    let server = PreviewServer::bind(&bind)
        .await
        .with_context(|| format!("Failed to bind preview server on {}", bind))?;
    let url = server.url();

    let mut host = SandboxHost::new(server);
    if let Some(entry) = entry {
        host = host.with_entry(entry);
    }
    host.render(&current.graph).await?;

    println!("Previewing {} at {}", current.name, url);
    println!("Watching {} for changes. Press Ctrl+C to stop.", location);
    println!();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.preview.poll_ms.max(50)));
    let mut printed = 0;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                // A half-written or missing file keeps the previous snapshot live
                if let Some(latest) = fail_open("preview::reload", || location.load(store)).await {
                    if latest.graph != current.graph {
                        current = latest;
                        let generation = host.reload(&current.graph).await?;
                        println!("--- reloaded (generation {}) ---", generation);
                    }
                }

                for entry in host.log().since(printed).await {
                    printed += 1;
                    println!(
                        "[{}] {} {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.level,
                        entry.message
                    );
                }
            }
        }
    }

    let reloads = host.reload_counter();
    let log = host.shutdown().await?;
    println!();
    println!(
        "Preview stopped after {} reloads, {} diagnostics captured",
        reloads,
        log.len().await
    );
    Ok(())
}

/// Cancel `token` on Ctrl+C until the returned task is aborted
fn cancel_on_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancelling generation");
            token.cancel();
        }
    })
}

/// Run one generation session, printing its log as it finishes
///
/// `Ok(None)` means the user cancelled.
async fn run_session(
    config: &BuildoraConfig,
    session: &mut GenerationSession,
    messages: Vec<buildora_agent::ChatMessage>,
) -> Result<Option<String>> {
    let client =
        GenerationClient::from_config(config.generation.clone()).context("Cannot start generation")?;

    let cancel = CancellationToken::new();
    let watcher = cancel_on_ctrl_c(cancel.clone());
    let result = client.generate(session, messages, &cancel).await;
    watcher.abort();

    for line in session.log() {
        println!("{}", line);
    }

    match result {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.is_cancelled() => {
            println!("Generation cancelled; nothing was applied.");
            Ok(None)
        }
        Err(e) if e.is_retryable() => {
            Err(e).context("Generation failed; run the same command again to retry")
        }
        Err(e) => Err(e).context("Generation failed"),
    }
}

async fn cmd_create(
    config: &BuildoraConfig,
    store: &JsonDirStore,
    description: String,
    out: Option<PathBuf>,
) -> Result<()> {
    let mut session = GenerationSession::new(description.clone());
    if run_session(config, &mut session, prompt::create_project(&description))
        .await?
        .is_none()
    {
        return Ok(());
    }

    let set = session
        .extract(&prompt::create_expected())
        .require_format()
        .context("The model did not return files in the expected format")?;
    for name in &set.missing {
        warn!(file = %name, "Generated output has no section for this file");
    }

    let name = set
        .project_name()
        .unwrap_or_else(|| sanitize_project_name(""));
    let mut graph = ProjectGraph::new(ProjectKind::Static);
    graph.apply_updates(&set.updates());
    let project = Project::new(name, graph);

    let saved = match out {
        Some(path) => persist_new(store, &project, Some(path)).await?,
        None => match fail_open_with_retries("generate::save", || store.put(&project), 3).await {
            Some(()) => format!("store:{}", project.id),
            None => {
                // Keep the result even when the store is unavailable
                let path = PathBuf::from(format!("{}.json", project.name));
                persist_new(store, &project, Some(path)).await?
            }
        },
    };

    println!();
    println!(
        "Generated {} ({} files) -> {}",
        project.name,
        project.graph.len(),
        saved
    );
    Ok(())
}

/// Split edit updates into the content for the edited node and everything else
fn partition_edit(updates: Vec<FileUpdate>, file_name: &str) -> (Option<String>, Vec<FileUpdate>) {
    let mut edited = None;
    let mut others = Vec::new();
    for update in updates {
        if edited.is_none() && update.name.eq_ignore_ascii_case(file_name) {
            edited = Some(update.content);
        } else {
            others.push(update);
        }
    }
    (edited, others)
}

async fn cmd_edit(
    config: &BuildoraConfig,
    store: &JsonDirStore,
    instruction: String,
    project: String,
    file_name: String,
) -> Result<()> {
    let location = Location::parse(&project);
    let mut project = location
        .load(store)
        .await
        .with_context(|| format!("Failed to load {}", location))?;

    let target = match project.graph.find_by_name(&file_name) {
        Some(node) => node.clone(),
        None => bail!("{} has no file named {}", project.name, file_name),
    };

    let mut session = GenerationSession::new(instruction.clone());
    let text = match run_session(config, &mut session, prompt::edit_file(&target, &instruction)).await? {
        Some(text) => text,
        None => return Ok(()),
    };

    let expected = prompt::edit_expected(&target.name);
    let expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    let set = session.extract(&expected);

    if set.format_detected {
        // The edited node is replaced by id so nested files stay in place
        let (edited, others) = partition_edit(set.updates(), &target.name);
        if let Some(content) = edited {
            project.graph.replace_content(&target.id, content)?;
            println!("Updated {}", target.name);
        }
        let summary = project.graph.apply_updates(&others);
        for name in summary.updated {
            println!("Updated {}", name);
        }
        for name in summary.created {
            println!("Created {}", name);
        }
    } else {
        project
            .graph
            .replace_content(&target.id, fallback_text(&text))?;
        println!("No file markers in the response; replaced {} with the full text", target.name);
    }
    project.touch();

    if fail_open_with_retries("generate::save", || location.save(store, &project), 3)
        .await
        .is_none()
    {
        bail!("Edits could not be saved to {}", location);
    }
    println!("Saved {}", location);
    Ok(())
}

/// File updates carried by an assistant reply, if it used the file markers
fn reply_updates(reply: &str) -> Option<Vec<FileUpdate>> {
    let set = extract(reply, &PROJECT_FILES);
    set.format_detected.then(|| set.updates())
}

/// One assistant exchange; code replies are merged into `location` when given
async fn chat_turn(
    config: &BuildoraConfig,
    store: &JsonDirStore,
    conversation: &mut Conversation,
    location: Option<&Location>,
    input: &str,
) -> Result<()> {
    let mut session = GenerationSession::new(input);
    let reply = match run_session(config, &mut session, conversation.request(input)).await? {
        Some(reply) => reply,
        None => return Ok(()),
    };
    conversation.record(input, reply.clone());

    let (Some(location), Some(updates)) = (location, reply_updates(&reply)) else {
        return Ok(());
    };
    let mut project = location
        .load(store)
        .await
        .with_context(|| format!("Failed to load {}", location))?;
    let summary = project.graph.apply_updates(&updates);
    project.touch();

    if fail_open_with_retries("chat::save", || location.save(store, &project), 3)
        .await
        .is_none()
    {
        bail!("Reply files could not be saved to {}", location);
    }
    for name in summary.updated {
        println!("Updated {}", name);
    }
    for name in summary.created {
        println!("Created {}", name);
    }
    println!("Saved {}", location);
    Ok(())
}

async fn save_transcript(conversation: &Conversation, transcript: Option<&Path>) -> Result<()> {
    if let Some(path) = transcript {
        conversation
            .save(path)
            .await
            .with_context(|| format!("Failed to write transcript {}", path.display()))?;
    }
    Ok(())
}

async fn cmd_chat(
    config: &BuildoraConfig,
    store: &JsonDirStore,
    project: Option<String>,
    transcript: Option<PathBuf>,
    message: Option<String>,
) -> Result<()> {
    let mut conversation = match &transcript {
        Some(path) => Conversation::load(path)
            .await
            .with_context(|| format!("Failed to read transcript {}", path.display()))?,
        None => Conversation::new(),
    };
    let location = project.as_deref().map(Location::parse);

    if let Some(message) = message {
        chat_turn(config, store, &mut conversation, location.as_ref(), &message).await?;
        return save_transcript(&conversation, transcript.as_deref()).await;
    }

    println!(
        "Chatting with {} prior exchanges. /clear resets, /exit or Ctrl+D quits.",
        conversation.exchanges()
    );
    if let Some(location) = &location {
        println!("Code replies are applied to {}", location);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                conversation.clear();
                println!("Conversation cleared");
            }
            input => {
                // A failed turn is reported and leaves the history untouched
                if let Err(e) =
                    chat_turn(config, store, &mut conversation, location.as_ref(), input).await
                {
                    eprintln!("{:#}", e);
                    continue;
                }
            }
        }
        save_transcript(&conversation, transcript.as_deref()).await?;
    }

    println!();
    println!("Chat ended after {} exchanges", conversation.exchanges());
    Ok(())
}

async fn cmd_export(
    config: &BuildoraConfig,
    store: &JsonDirStore,
    project: String,
    mode: ExportMode,
    out: PathBuf,
) -> Result<()> {
    let location = Location::parse(&project);
    let project = location
        .load(store)
        .await
        .with_context(|| format!("Failed to load {}", location))?;

    let composer = ArchiveComposer::new(&config.archive);
    let archive = composer
        .export_async(mode, project.name.clone(), project.graph.clone())
        .await
        .with_context(|| format!("{} export failed", mode))?;

    let mut slot = DownloadSlot::new();
    slot.replace(&archive)?;
    let handle = match slot.take() {
        Some(handle) => handle,
        None => bail!("Export produced no download"),
    };

    tokio::fs::create_dir_all(&out).await?;
    let saved = handle
        .save_to(&out)
        .with_context(|| format!("Failed to save archive in {}", out.display()))?;

    println!(
        "Exported {} ({}, {} bytes) -> {}",
        project.name,
        mode,
        archive.bytes.len(),
        saved.display()
    );
    Ok(())
}

async fn cmd_import(
    store: &JsonDirStore,
    file: PathBuf,
    name: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let fallback = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Imported".to_string())
    });

    let is_json = file.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let project = if is_json {
        let text = tokio::fs::read_to_string(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        import_json(&text, &fallback)?
    } else {
        let bytes = tokio::fs::read(&file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        import_zip(&bytes, &fallback)?
    };

    let saved = persist_new(store, &project, out).await?;
    println!(
        "Imported {} ({}, {} files) -> {}",
        project.name,
        project.graph.kind,
        project.graph.len(),
        saved
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_generate_edit() {
        let cli = Cli::try_parse_from([
            "buildora", "generate", "make it blue", "-p", "site.json", "-f", "style.css",
        ])
        .unwrap();
        match cli.command {
            Commands::Generate { project, file, .. } => {
                assert_eq!(project.as_deref(), Some("site.json"));
                assert_eq!(file.as_deref(), Some("style.css"));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_edit_requires_both_project_and_file() {
        assert!(Cli::try_parse_from(["buildora", "generate", "x", "-f", "style.css"]).is_err());
        assert!(Cli::try_parse_from(["buildora", "generate", "x", "-p", "a.json"]).is_err());
    }

    #[test]
    fn test_value_enums() {
        let cli = Cli::try_parse_from(["buildora", "export", "a.json", "-m", "merged"]).unwrap();
        assert!(matches!(cli.command, Commands::Export { mode: ExportMode::Merged, .. }));

        let cli = Cli::try_parse_from(["buildora", "new", "Shop", "-t", "php"]).unwrap();
        assert!(matches!(cli.command, Commands::New { template: Template::LegacyBasic, .. }));

        assert!(Cli::try_parse_from(["buildora", "export", "a.json", "-m", "tarball"]).is_err());
    }

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::try_parse_from([
            "buildora", "chat", "-p", "site.json", "-t", "talk.json", "-m", "add a footer",
        ])
        .unwrap();
        match cli.command {
            Commands::Chat {
                project,
                transcript,
                message,
            } => {
                assert_eq!(project.as_deref(), Some("site.json"));
                assert_eq!(transcript, Some(PathBuf::from("talk.json")));
                assert_eq!(message.as_deref(), Some("add a footer"));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_reply_updates_only_for_marked_code() {
        let updates =
            reply_updates("Sure.\n=== index.html ===\n<p>hi</p>\n=== style.css ===\np{}").unwrap();
        let names: Vec<&str> = updates.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["index.html", "style.css"]);

        assert!(reply_updates("A closure captures its environment.").is_none());
    }

    #[test]
    fn test_partition_edit() {
        let updates = vec![
            FileUpdate::new("index.html", "<p>new</p>"),
            FileUpdate::new("Style.css", "p{}"),
        ];
        let (edited, others) = partition_edit(updates, "style.css");
        assert_eq!(edited.as_deref(), Some("p{}"));
        assert_eq!(others, vec![FileUpdate::new("index.html", "<p>new</p>")]);
    }
}
