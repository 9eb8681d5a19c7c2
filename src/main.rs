use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;

use plugsmith::backend::HttpBackend;
use plugsmith::config::Config;
use plugsmith::models::WorkspaceKey;
use plugsmith::notify::TracingNotifier;
use plugsmith::sync::SyncCore;

#[derive(Parser)]
#[command(name = "plugsmith")]
#[command(version, about = "Workspace synchronization client for the plugin-generation backend")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Backend base URL (overrides config file and env)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Owner id for all workspace operations
    #[arg(long, global = true, default_value = "local")]
    pub owner: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load a workspace once and print its file listing
    Status {
        /// Workspace name
        name: String,
        /// Bypass the already-loaded cache
        #[arg(long)]
        force: bool,
    },
    /// Generate a workspace from a prompt
    Generate {
        /// Free-text prompt describing the plugin
        prompt: String,
        /// Requested workspace name (backend may pick another)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Recompile a workspace, letting the backend self-fix
    Recompile {
        name: String,
        /// Fix-attempt budget forwarded to the backend
        #[arg(long)]
        max_fix_attempts: Option<u32>,
    },
    /// Download the compiled artifact
    Download {
        name: String,
        /// Output path (defaults to <name>.jar)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Push out-of-band file edits into a workspace
    Sync { name: String },
    /// Open a workspace and keep it refreshed until interrupted
    Watch { name: String },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_view(view: &plugsmith::sync::WorkspaceView) {
    println!(
        "{} {} ({}, {} files)",
        style("workspace").bold(),
        view.key,
        view.status,
        view.files.len()
    );
    for file in &view.files {
        let marker = if view.selected_path.as_deref() == Some(&file.path) {
            "*"
        } else {
            " "
        };
        println!("  {} {} [{}]", marker, file.path, file.language);
    }
    if let Some(err) = &view.last_error {
        println!("  {} {}", style("load error:").red(), err);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir().context("Failed to resolve working directory")?;
    let mut config = Config::load_or_default(&cwd)?;
    if let Some(url) = cli.backend_url {
        config.backend.url = url;
    }

    let backend = Arc::new(HttpBackend::new(config.backend.url.clone()));
    let core = SyncCore::new(config, backend, Arc::new(TracingNotifier));
    let listener = core.start_invalidation_listener();

    let result = run(&cli.owner, &cli.command, &core).await;
    listener.abort();
    result
}

async fn run(owner: &str, command: &Commands, core: &Arc<SyncCore>) -> Result<()> {
    match command {
        Commands::Status { name, force } => {
            let key = WorkspaceKey::new(owner, name.clone());
            match core.load(&key, *force).await {
                Ok(_) => {}
                Err(err) => println!("{} {}", style("✗").red(), err),
            }
            match core.view(&key).await {
                Some(view) => print_view(&view),
                None => println!("workspace {} has no local state", key),
            }
        }
        Commands::Generate { prompt, name } => {
            let resp = core.generate(owner, prompt, name.as_deref()).await?;
            if resp.success {
                println!(
                    "{} generated workspace {}",
                    style("✓").green(),
                    resp.resolved_name
                );
                if let Some(text) = resp.result_text {
                    println!("{}", text);
                }
                if let Some(view) = core.active_view().await {
                    print_view(&view);
                }
            } else {
                println!(
                    "{} generation failed: {}",
                    style("✗").red(),
                    resp.result_text.unwrap_or_default()
                );
            }
        }
        Commands::Recompile {
            name,
            max_fix_attempts,
        } => {
            let key = WorkspaceKey::new(owner, name.clone());
            let resp = core.recompile(&key, *max_fix_attempts).await?;
            if resp.success {
                println!("{} workspace {} compiled", style("✓").green(), key);
            } else {
                println!("{} compilation failed", style("✗").red());
                if let Some(diagnostics) = resp.diagnostics {
                    println!("{}", diagnostics);
                }
            }
        }
        Commands::Download { name, output } => {
            let key = WorkspaceKey::new(owner, name.clone());
            let bytes = core.download_artifact(&key).await?;
            let path = output
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.jar", name)));
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write artifact to {}", path.display()))?;
            println!(
                "{} saved {} bytes to {}",
                style("✓").green(),
                bytes.len(),
                path.display()
            );
        }
        Commands::Sync { name } => {
            let key = WorkspaceKey::new(owner, name.clone());
            let resp = core.sync_files(&key).await?;
            if resp.success {
                println!(
                    "{} synced {} files into {}",
                    style("✓").green(),
                    resp.files_count,
                    key
                );
            } else {
                println!("{} sync failed", style("✗").red());
            }
        }
        Commands::Watch { name } => {
            let key = WorkspaceKey::new(owner, name.clone());
            core.set_active(Some(key.clone())).await?;
            match core.load(&key, false).await {
                Ok(_) => {
                    if let Some(view) = core.view(&key).await {
                        print_view(&view);
                    }
                }
                Err(err) => println!("{} {}", style("✗").red(), err),
            }
            println!("watching {} (ctrl-c to stop)", key);
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for ctrl-c")?;
            core.set_active(None).await?;
        }
    }
    Ok(())
}
