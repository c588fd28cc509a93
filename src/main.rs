//! FlowForge CLI - natural-language workflow DAGs, executed.

use clap::{Parser, Subcommand};
use colored::Colorize;
use futures::StreamExt;

use flowforge::catalog::search_api_catalog;
use flowforge::{
    create_service_layer, FlowError, GenerateRequest, Planner, PlannerEvent, Settings, Validator,
    Workflow, WorkflowExecutor, WorkflowStore,
};

#[derive(Parser)]
#[command(name = "flowforge")]
#[command(about = "FlowForge - LLM-planned workflow DAGs over real or simulated services")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a workflow from a natural-language request and execute it
    Generate {
        /// What the workflow should accomplish
        request: String,

        /// Team whose knowledge base to use
        #[arg(short, long, default_value = "default")]
        team: String,

        /// Extra context as key=value pairs (repeatable)
        #[arg(short, long)]
        context: Vec<String>,

        /// Modify an existing workflow id instead of creating fresh
        #[arg(long)]
        modify: Option<String>,
    },

    /// Run a workflow JSON file against the configured services
    Run {
        /// Path to the workflow JSON file
        file: String,
    },

    /// Validate a workflow JSON file
    Validate {
        /// Path to the workflow JSON file
        file: String,
    },

    /// List stored workflows for a team
    List {
        #[arg(short, long, default_value = "default")]
        team: String,
    },

    /// Search the service action catalog
    Catalog {
        /// Natural-language query
        query: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env (ignore if not present).
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    let result = match cli.command {
        Commands::Generate {
            request,
            team,
            context,
            modify,
        } => generate(&settings, request, team, context, modify).await,
        Commands::Run { file } => run_workflow(&settings, &file).await,
        Commands::Validate { file } => validate_workflow(&file),
        Commands::List { team } => list_workflows(&settings, &team),
        Commands::Catalog { query } => {
            catalog_search(&query);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(suggestion) = e.fix_suggestion() {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn store(settings: &Settings) -> WorkflowStore {
    let dir = settings
        .workflow_dir
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("workflows"));
    WorkflowStore::new(dir)
}

async fn generate(
    settings: &Settings,
    request: String,
    team: String,
    context: Vec<String>,
    modify: Option<String>,
) -> Result<(), FlowError> {
    let store = store(settings);
    let mut generate_request = GenerateRequest::new(request, &team);
    for pair in context {
        if let Some((key, value)) = pair.split_once('=') {
            generate_request
                .context
                .insert(key.to_string(), value.to_string());
        }
    }
    if let Some(workflow_id) = modify {
        generate_request.existing_workflow = store.load(&workflow_id, &team)?;
        if generate_request.existing_workflow.is_none() {
            return Err(FlowError::other(format!(
                "No stored workflow '{workflow_id}' for team '{team}'"
            )));
        }
    }

    let planner = Planner::new(settings.clone())?.with_store(store);
    let mut stream = planner.generate(generate_request);

    while let Some(event) = stream.next().await {
        render_event(&event);
    }
    Ok(())
}

fn render_event(event: &PlannerEvent) {
    match event {
        PlannerEvent::Text(text) => println!("{text}"),
        PlannerEvent::ToolUse { tool, .. } => {
            println!("{} {}", "→".cyan(), tool.cyan());
        }
        PlannerEvent::ToolResult { .. } => {}
        PlannerEvent::Workflow(workflow) => {
            println!(
                "{} Parsed workflow '{}' ({} nodes, services: {})",
                "✓".green(),
                workflow.id,
                workflow.nodes.len(),
                workflow.referenced_services().join(", ")
            );
        }
        PlannerEvent::ExecutionReport {
            markdown, attempt, ..
        } => {
            println!("\n{} attempt {attempt}\n{markdown}\n", "Execution".bold());
        }
        PlannerEvent::ConnectorBuilt { service, path, .. } => {
            println!(
                "{} Built connector for '{}' at {}",
                "✓".green(),
                service,
                path.display()
            );
        }
        PlannerEvent::WorkflowSaved {
            workflow_id,
            team,
            version,
        } => {
            println!(
                "{} Saved {workflow_id} v{version} (team {team})",
                "✓".green()
            );
        }
        PlannerEvent::Workspace { path } => {
            println!("{} workspace: {}", "·".dimmed(), path.display());
        }
        PlannerEvent::Result { usage, .. } => {
            println!(
                "{} {} tokens in / {} tokens out",
                "·".dimmed(),
                usage.input_tokens,
                usage.output_tokens
            );
        }
        PlannerEvent::Error(message) => {
            eprintln!("{} {}", "Error:".red().bold(), message);
        }
    }
}

async fn run_workflow(settings: &Settings, file: &str) -> Result<(), FlowError> {
    let workflow = Workflow::from_json(&tokio::fs::read_to_string(file).await?)?;

    let validation = Validator::new().validate(&workflow);
    if !validation.is_valid() {
        return Err(FlowError::Validation(validation.render_errors()));
    }

    println!(
        "{} Running '{}' in {} mode",
        "→".cyan(),
        workflow.name.cyan().bold(),
        settings.connector_mode.to_string().cyan()
    );

    let layer = create_service_layer(settings);
    let mut executor = WorkflowExecutor::new(layer.services, layer.trace.clone(), None);
    let report = executor.execute(&workflow).await?;

    println!("{}", report.to_markdown());
    if !report.is_clean() {
        return Err(FlowError::other(format!(
            "{} of {} steps failed",
            report.failed, report.total_steps
        )));
    }
    Ok(())
}

fn validate_workflow(file: &str) -> Result<(), FlowError> {
    let workflow = Workflow::from_json(&std::fs::read_to_string(file)?)?;
    let result = Validator::new().validate(&workflow);

    for warning in &result.warnings {
        println!("{} {}", "Warning:".yellow(), warning);
    }
    if !result.is_valid() {
        return Err(FlowError::Validation(result.render_errors()));
    }

    println!("{} Workflow '{}' is valid", "✓".green(), file);
    println!("  Name: {}", workflow.name);
    println!("  Team: {}", workflow.team);
    println!("  Nodes: {}", workflow.nodes.len());
    println!("  Edges: {}", workflow.edges.len());
    println!("  Version: {}", workflow.version);
    Ok(())
}

fn list_workflows(settings: &Settings, team: &str) -> Result<(), FlowError> {
    let workflows = store(settings).list_by_team(team)?;
    if workflows.is_empty() {
        println!("No workflows stored for team '{team}'");
        return Ok(());
    }
    for workflow in workflows {
        println!(
            "{}  v{}  {} ({} nodes)",
            workflow.id.cyan(),
            workflow.version,
            workflow.name,
            workflow.nodes.len()
        );
    }
    Ok(())
}

fn catalog_search(query: &str) {
    let results = search_api_catalog(query, 5);
    if results.is_empty() {
        println!("No catalog entries match '{query}'");
        return;
    }
    for entry in results {
        println!(
            "{}.{}  {}",
            entry.service.cyan(),
            entry.action.cyan().bold(),
            entry.description
        );
        for param in &entry.parameters {
            let marker = if param.required { "required" } else { "optional" };
            println!("    {} ({marker})", param.name);
        }
    }
}
