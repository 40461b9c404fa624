mod host;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use vaultlab_api::{LabClient, ServerStatus};
use vaultlab_engine::{ClickOutcome, DispatchOutcome, Host, LabPlugin, OperationUpdate};
use vaultlab_registry::{DebugLevel, FileSettingsStorage, OperationConfigStore, default_config_path};
use vaultlab_types::{OperationId, OperationMode, Region};
use vaultlab_util::expand_tilde;

use crate::host::{FileEditor, FsVault, StderrNotifier, TerminalSlots};

#[derive(Debug, Parser)]
#[command(name = "vaultlab", version, about = "Run script-server operations against a notes folder")]
struct Cli {
    #[command(flatten)]
    context: ContextArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct ContextArgs {
    /// Root folder of the vault.
    #[arg(long, global = true, default_value = ".")]
    vault: String,

    /// Vault-relative path of the active document.
    #[arg(long, global = true)]
    note: Option<String>,

    /// Text treated as the current selection.
    #[arg(long, global = true)]
    selection: Option<String>,

    /// Settings file (defaults to $VAULTLAB_CONFIG_PATH or the user config dir).
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check the server and list the registered commands.
    Status,
    /// List every operation the server offers with its configuration.
    List,
    /// Invoke an operation.
    Run { id: String },
    /// Send one line to a conversation operation.
    Chat { id: String, line: String },
    /// Invoke a panel operation, then click one of its items.
    Click {
        id: String,
        path: String,
        /// Open in a new split.
        #[arg(long)]
        split: bool,
    },
    /// Show or edit settings.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Show,
    SetUrl { url: String },
    Enable { id: String },
    Disable { id: String },
    Label { id: String, label: String },
    Mode { id: String, mode: OperationMode },
    /// Empty string restores the default icon.
    Icon { id: String, icon: String },
    Focus {
        id: String,
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    Region { id: String, region: Region },
    Debug { level: DebugLevel },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let plugin = build_plugin(&cli.context)?;

    let status = plugin.load().await.context("load settings")?;
    let result = run(&plugin, cli.command, &status).await;
    plugin.unload().await;
    result
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_plugin(context: &ContextArgs) -> Result<LabPlugin> {
    let vault = FsVault::new(expand_tilde(&context.vault));
    if !vault.root_path().is_dir() {
        bail!("vault folder not found: {}", vault.root_path().display());
    }
    let editor = FileEditor::new(vault.root_path(), context.note.clone(), context.selection.clone());
    let settings_path: PathBuf = match &context.config {
        Some(path) => expand_tilde(path),
        None => default_config_path(),
    };
    tracing::debug!(path = %settings_path.display(), "using settings file");

    let store = OperationConfigStore::new(Arc::new(FileSettingsStorage::new(settings_path)));
    let remote = LabClient::new().context("build http client")?;
    let host = Host::new(
        Arc::new(editor),
        Arc::new(vault),
        Arc::new(TerminalSlots::new()),
        Arc::new(StderrNotifier),
    );
    Ok(LabPlugin::new(store, Arc::new(remote), host))
}

async fn run(plugin: &LabPlugin, command: Command, status: &ServerStatus) -> Result<()> {
    match command {
        Command::Status => {
            print_status(status);
            for command in plugin.commands().await {
                println!("{:<32} {:<26} {}", command.id, command.mode.description(), command.name);
            }
        }
        Command::List => print_operations(plugin).await,
        Command::Run { id } => {
            let outcome = plugin.invoke(&OperationId::from(id.as_str())).await?;
            report(&id, outcome);
        }
        Command::Chat { id, line } => {
            let outcome = plugin.submit_message(&OperationId::from(id.as_str()), &line).await?;
            report(&id, outcome);
        }
        Command::Click { id, path, split } => {
            let operation = OperationId::from(id.as_str());
            plugin.invoke(&operation).await?;
            match plugin.click_item(&operation, &path, split).await? {
                ClickOutcome::Opened { path } => println!("opened {path}"),
                ClickOutcome::Removed { path } => println!("removed {path}"),
            }
        }
        Command::Config(command) => run_config(plugin, command).await?,
    }
    Ok(())
}

async fn run_config(plugin: &LabPlugin, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = plugin.settings().await;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigCommand::SetUrl { url } => {
            let status = plugin.set_server_url(&url).await?;
            print_status(&status);
        }
        ConfigCommand::Enable { id } => {
            plugin.set_operation_active(&OperationId::from(id.as_str()), true).await?;
            println!("enabled {id}");
        }
        ConfigCommand::Disable { id } => {
            plugin.set_operation_active(&OperationId::from(id.as_str()), false).await?;
            println!("disabled {id}");
        }
        ConfigCommand::Label { id, label } => {
            update(plugin, &id, OperationUpdate { label: Some(label), ..Default::default() }).await?;
        }
        ConfigCommand::Mode { id, mode } => {
            update(plugin, &id, OperationUpdate { mode: Some(mode), ..Default::default() }).await?;
        }
        ConfigCommand::Icon { id, icon } => {
            update(plugin, &id, OperationUpdate { icon: Some(icon), ..Default::default() }).await?;
        }
        ConfigCommand::Focus { id, enabled } => {
            let change = OperationUpdate {
                invoke_on_focus: Some(enabled),
                ..Default::default()
            };
            update(plugin, &id, change).await?;
        }
        ConfigCommand::Region { id, region } => {
            update(plugin, &id, OperationUpdate { region: Some(region), ..Default::default() }).await?;
        }
        ConfigCommand::Debug { level } => {
            plugin.set_debug(level).await?;
            println!("debug {level}");
        }
    }
    Ok(())
}

async fn update(plugin: &LabPlugin, id: &str, change: OperationUpdate) -> Result<()> {
    plugin
        .update_operation(&OperationId::from(id), change)
        .await
        .with_context(|| format!("update {id}"))?;
    println!("updated {id}");
    Ok(())
}

fn print_status(status: &ServerStatus) {
    match status {
        ServerStatus::Available { ids } => println!("online [{}]", ids.len()),
        ServerStatus::Unavailable { reason } => println!("cannot reach server ({reason})"),
    }
}

async fn print_operations(plugin: &LabPlugin) {
    let view = plugin.settings_view().await;
    println!("server {} ({}), debug {}", view.server_url, view.status_line, view.debug);
    for entry in view.operations {
        let state = match (entry.config.active, entry.synthesized) {
            (true, _) => "active",
            (false, true) => "new",
            (false, false) => "inactive",
        };
        println!(
            "{:<24} {:<9} {:<14} {:<28} {}",
            entry.id,
            state,
            entry.config.mode,
            entry.config.display_label(&entry.id),
            entry.url
        );
    }
}

fn report(id: &str, outcome: DispatchOutcome) {
    match outcome {
        DispatchOutcome::Applied => println!("{id}: applied"),
        DispatchOutcome::Discarded => println!("{id}: response discarded"),
        DispatchOutcome::Revealed => println!("{id}: panel opened"),
    }
}
