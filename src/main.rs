use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use laradev_editor::actions::{ActionOutcome, RemoteAction};
use laradev_editor::config::Config;
use laradev_editor::file_ref::FileRef;
use laradev_editor::gateway::{HttpGateway, RemoteGateway};
use laradev_editor::notify::{AlwaysConfirm, ConfirmPrompt, Confirmer};
use laradev_editor::project::{ApiConfig, Project, ProjectStore, redact_secret};
use laradev_editor::widget::MemoryWidget;
use laradev_editor::workspace::Workspace;

#[derive(Parser)]
#[command(name = "laradev-editor")]
#[command(about = "Edit the files of a remote Laravel project", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project to use instead of the active one (id or name)
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Answer yes to every confirmation
    #[arg(short, long, global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage known projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    #[command(flatten)]
    Workspace(WorkspaceCommands),
}

/// Commands that run against the active project
#[derive(Subcommand)]
enum WorkspaceCommands {
    /// List the project's files
    List,
    /// Print a file's content
    Show {
        /// File identifier, e.g. `blade-login` or `model-Order-migration`
        id: String,
    },
    /// Replace a file's content with a local file
    Push {
        id: String,

        /// Local file to upload
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Run a table operation for a model document
    Run {
        id: String,

        /// migrate, rollback or alter
        action: String,
    },
    /// Empty a model's table
    Truncate { model: String },
    /// Show the latest rows of a model's table
    Rows { model: String },
    /// Create a migration
    Migration { name: String },
    /// Run a project maintenance job
    Maintain {
        /// deploy, generate-models, generate-migrations or backup
        task: String,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// List known projects
    List,
    /// Add a project
    Add {
        name: String,

        /// Root address of the Laravel application
        #[arg(long)]
        root: String,

        #[arg(long)]
        token: String,

        #[arg(long)]
        password: String,
    },
    /// Make a project the active one
    Use { project: String },
}

/// Asks on the terminal
struct TerminalConfirm;

impl Confirmer for TerminalConfirm {
    fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        let question = match prompt {
            ConfirmPrompt::Reload { file } => {
                format!("Discard your changes to {file} and reload it?")
            }
            ConfirmPrompt::LeaveWithUnsaved { dirty } => {
                format!("Unsaved changes in {}. Leave anyway?", dirty.join(", "))
            }
            ConfirmPrompt::RemoteOperation { operation, model } => {
                format!("{operation} for {model}?")
            }
            ConfirmPrompt::Delete { file } => format!("Delete {file} on the server?"),
            ConfirmPrompt::Maintenance { task } => format!("{task} now?"),
        };
        eprint!("{question} [y/N] ");
        if std::io::stderr().flush().is_err() {
            return false;
        }

        let mut answer = String::new();
        match std::io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim(), "y" | "Y" | "yes"),
            Err(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let confirmer: &dyn Confirmer = if cli.yes {
        &AlwaysConfirm
    } else {
        &TerminalConfirm
    };

    let result = match cli.command {
        Commands::Projects { command } => run_projects(cli.config, command).await,
        Commands::Workspace(command) => {
            run_workspace(cli.config, cli.project, command, confirmer).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(path) => Config::load(&path)?,
        None => Config::load_default()?,
    })
}

async fn run_projects(
    config_path: Option<PathBuf>,
    command: ProjectCommands,
) -> anyhow::Result<ExitCode> {
    let store = ProjectStore::open_default()?;
    match command {
        ProjectCommands::List => {
            let active = store.active()?.map(|p| p.id);
            for project in store.projects()? {
                let marker = if active.as_deref() == Some(project.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker} {} {} ({}, token {})",
                    project.id,
                    project.name,
                    project.root_address,
                    redact_secret(&project.developer_token)
                );
            }
        }
        ProjectCommands::Add {
            name,
            root,
            token,
            password,
        } => {
            let project = Project::new(name, root, token, password);
            let config = load_config(config_path)?;
            let gateway = HttpGateway::new(ApiConfig::from_project(&project)?, &config.http)?;
            if let Err(e) = gateway
                .connect(&project.developer_token, &project.backend_password)
                .await
            {
                eprintln!("Could not connect to {}: {e}", project.root_address);
                return Ok(ExitCode::FAILURE);
            }
            store.add(project.clone())?;
            println!("Added project {} ({})", project.name, project.id);
        }
        ProjectCommands::Use { project } => {
            let project = store.set_active(&project)?;
            println!("Using {} ({})", project.name, project.root_address);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_workspace(
    config_path: Option<PathBuf>,
    project: Option<String>,
    command: WorkspaceCommands,
    confirmer: &dyn Confirmer,
) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;

    let projects = ProjectStore::open_default()?;
    let project = match project {
        Some(id) => projects.set_active(&id)?,
        None => projects
            .active()?
            .ok_or_else(|| anyhow::anyhow!("no active project, run `projects use` first"))?,
    };

    let mut workspace = Workspace::connect(config, &project, MemoryWidget::new())?;

    let code = match command {
        WorkspaceCommands::List => {
            workspace.refresh_listing().await?;
            let tree = workspace.file_tree();
            for model in &tree.models {
                println!("{}", model.name);
                for document in &model.documents {
                    println!("  {document}");
                }
            }
            for file in tree.blades.iter().chain(&tree.scripts).chain(&tree.cores) {
                println!("{file}");
            }
            ExitCode::SUCCESS
        }
        WorkspaceCommands::Show { id } => {
            let id = FileRef::parse(&id)?;
            workspace.open(&id).await?;
            if let Some(content) = workspace.store().get_content(&id) {
                println!("{content}");
            }
            ExitCode::SUCCESS
        }
        WorkspaceCommands::Push { id, file } => {
            let id = FileRef::parse(&id)?;
            let content = tokio::fs::read_to_string(&file).await?;
            workspace.open(&id).await?;
            workspace.controller().widget().type_text(&content);
            workspace.controller_mut().save_active().await?;
            println!("Saved {}", id.display_name());
            ExitCode::SUCCESS
        }
        WorkspaceCommands::Run { id, action } => {
            let id = FileRef::parse(&id)?;
            let action = RemoteAction::from_name(&action)
                .ok_or_else(|| anyhow::anyhow!("unknown action '{action}'"))?;
            report(workspace.dispatcher().dispatch(&id, action, confirmer).await)
        }
        WorkspaceCommands::Truncate { model } => {
            report(workspace.dispatcher().truncate(&model, confirmer).await)
        }
        WorkspaceCommands::Rows { model } => match workspace.dispatcher().last_rows(&model).await {
            Some(rows) => {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                ExitCode::SUCCESS
            }
            None => ExitCode::FAILURE,
        },
        WorkspaceCommands::Migration { name } => {
            workspace.create_migration(&name).await?;
            println!("Created migration {name}");
            ExitCode::SUCCESS
        }
        WorkspaceCommands::Maintain { task } => {
            let action = RemoteAction::from_name(&task)
                .ok_or_else(|| anyhow::anyhow!("unknown task '{task}'"))?;
            report(workspace.dispatcher().run_maintenance(action, confirmer).await)
        }
    };

    for notification in workspace.notifications().drain() {
        if notification.is_error() {
            eprintln!("{}", notification.message);
        }
    }
    workspace.teardown(confirmer);
    Ok(code)
}

fn report(outcome: ActionOutcome) -> ExitCode {
    match outcome {
        ActionOutcome::Completed => ExitCode::SUCCESS,
        ActionOutcome::Cancelled => {
            eprintln!("Cancelled");
            ExitCode::SUCCESS
        }
        ActionOutcome::Unavailable => {
            eprintln!("This action is not available for that file");
            ExitCode::FAILURE
        }
        ActionOutcome::Busy(running) => {
            eprintln!("{running} is still running");
            ExitCode::FAILURE
        }
        ActionOutcome::Failed(_) => ExitCode::FAILURE,
    }
}
