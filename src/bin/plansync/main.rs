//! Terminal front end for the query-plan playground.
#![forbid(unsafe_code)]

mod ui;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use plansync::{
    api::HttpPlanner,
    catalog::Direction,
    config::ClientConfig,
    controller::MutationReport,
    executor::{ExecutionOutcome, ResponseOrdering},
    model::{Dataset, HistoryRecord},
    render::DisplayTable,
    session::{Session, SessionOptions},
    telemetry,
};
use serde::Serialize;

use crate::ui::{format_duration, ColorChoice, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "plansync",
    version,
    about = "Keep a query planner's rule order in sync and run queries against it",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        env = "PLANSYNC_CONFIG",
        value_name = "FILE",
        help = "Client configuration file"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        env = "PLANSYNC_URL",
        value_name = "URL",
        help = "Planner base URL (overrides the config file)"
    )]
    url: Option<String>,

    #[arg(
        long,
        global = true,
        value_name = "SQL",
        help = "Query re-executed after rule changes"
    )]
    query: Option<String>,

    #[arg(
        long,
        global = true,
        value_enum,
        help = "Policy for overlapping query responses"
    )]
    ordering: Option<OrderingArg>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ColorChoice::Auto,
        help = "When to color output"
    )]
    color: ColorChoice,

    #[arg(short, long, global = true, help = "Plain output without decorations")]
    quiet: bool,

    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug)"
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or change the applied rule order.
    Rules {
        #[command(subcommand)]
        action: Option<RulesAction>,
    },
    /// Run queries, then print the execution history.
    Query {
        #[arg(value_name = "SQL", help = "Queries to run in order")]
        sql: Vec<String>,
    },
    /// List, upload or remove datasets.
    Datasets {
        #[command(subcommand)]
        action: Option<DatasetsAction>,
    },
    /// Manage the client configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Print shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum RulesAction {
    /// Move an applied rule one step earlier.
    Up { name: String },
    /// Move an applied rule one step later.
    Down { name: String },
    /// Append an available rule to the applied order.
    Add { name: String },
    /// Remove a rule from the applied order.
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
enum DatasetsAction {
    /// Upload a data file; the dataset is named after the file.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Remove a dataset.
    Remove { name: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a configuration file with every default filled in.
    Init {
        #[arg(long, help = "Overwrite an existing file")]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OrderingArg {
    LastResponseWins,
    LatestRequestOnly,
}

impl From<OrderingArg> for ResponseOrdering {
    fn from(ordering: OrderingArg) -> Self {
        match ordering {
            OrderingArg::LastResponseWins => ResponseOrdering::LastResponseWins,
            OrderingArg::LatestRequestOnly => ResponseOrdering::LatestRequestOnly,
        }
    }
}

#[derive(Serialize)]
struct RulesView {
    applied: Vec<String>,
    available: Vec<String>,
}

#[derive(Serialize)]
struct QueryReport {
    outcomes: Vec<ExecutionOutcome>,
    failed: usize,
    table: Option<DisplayTable>,
    history: Vec<HistoryRecord>,
}

#[derive(Serialize)]
struct DatasetsView<'a> {
    datasets: &'a [Dataset],
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    telemetry::install_tracing_subscriber(match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    });
    let ui = Ui::new(cli.color, cli.quiet);

    let mut config = ClientConfig::load(cli.config.clone())?;
    if let Some(url) = cli.url.as_deref() {
        config.set_base_url(url)?;
    }
    if let Some(ordering) = cli.ordering {
        config.set_response_ordering(ordering.into());
    }

    match &cli.command {
        Command::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(*shell, &mut command, "plansync", &mut std::io::stdout());
        }
        Command::Config { action } => run_config(&cli, &ui, &config, action)?,
        Command::Rules { action } => {
            let mut session = open_session(&cli, &ui, &config).await?;
            if !session.start().await.rules_loaded {
                return Err("could not load rules from the planner".into());
            }
            match action {
                None => {
                    let view = RulesView {
                        applied: session.rules().applied_names(),
                        available: session
                            .rules()
                            .with_catalog(|catalog| catalog.available_names()),
                    };
                    emit(&cli.format, &view, |_| print_rules(&ui, &view, None))?;
                }
                Some(action) => run_rules_action(&cli, &ui, &mut session, action).await?,
            }
        }
        Command::Query { sql } => {
            let mut session = open_session(&cli, &ui, &config).await?;
            session.start().await;
            run_queries(&cli, &ui, &session, sql).await?;
        }
        Command::Datasets { action } => {
            let mut session = open_session(&cli, &ui, &config).await?;
            if !session.start().await.datasets_loaded {
                return Err("could not load datasets from the planner".into());
            }
            match action {
                None => {}
                Some(DatasetsAction::Upload { file }) => {
                    let task = ui.task(format!("uploading {}", file.display()));
                    let dataset = session.datasets_mut().upload(file).await;
                    task.finish();
                    let dataset = dataset?;
                    ui.success(&format!("dataset '{}' uploaded", dataset.name));
                }
                Some(DatasetsAction::Remove { name }) => {
                    session.datasets_mut().remove(name).await?;
                    ui.success(&format!("dataset '{name}' removed"));
                }
            }
            let view = DatasetsView {
                datasets: session.datasets().datasets(),
            };
            emit(&cli.format, &view, |_| {
                ui.list(
                    "Datasets",
                    view.datasets.iter().map(|dataset| dataset.name.clone()),
                )
            })?;
        }
    }

    Ok(())
}

async fn open_session(
    cli: &Cli,
    ui: &Ui,
    config: &ClientConfig,
) -> Result<Session<HttpPlanner>, Box<dyn Error>> {
    let planner = HttpPlanner::new(config.base_url()?)?;
    tracing::info!(url = %planner.base_url(), "using planner");
    let mut options = SessionOptions::from_config(config);
    if let Some(query) = cli.query.as_deref() {
        options.query = query.to_string();
    }
    Ok(Session::new(
        Arc::new(planner),
        options,
        Arc::new(ui.notifier()),
    ))
}

async fn run_rules_action(
    cli: &Cli,
    ui: &Ui,
    session: &mut Session<HttpPlanner>,
    action: &RulesAction,
) -> Result<(), Box<dyn Error>> {
    let controller = session.rules_mut();
    let task = ui.task("synchronizing rule order");
    let (report, touched) = match action {
        RulesAction::Up { name } => {
            controller.select(name)?;
            (controller.move_selected(Direction::Up).await?, Some(name))
        }
        RulesAction::Down { name } => {
            controller.select(name)?;
            (controller.move_selected(Direction::Down).await?, Some(name))
        }
        RulesAction::Add { name } => (controller.promote(name).await?, Some(name)),
        RulesAction::Remove { name } => (controller.demote(name).await?, None),
    };
    let elapsed = task.finish();

    let session: &Session<HttpPlanner> = session;
    emit(&cli.format, &report, |_| {
        print_mutation(ui, session, &report, touched.map(String::as_str));
        if report.changed {
            ui.info(&format!("synchronized in {}", format_duration(elapsed)));
        }
    })?;

    if report.changed && !report.committed {
        return Err("the planner did not accept the new rule order".into());
    }
    Ok(())
}

async fn run_queries(
    cli: &Cli,
    ui: &Ui,
    session: &Session<HttpPlanner>,
    sql: &[String],
) -> Result<(), Box<dyn Error>> {
    let queries: Vec<String> = if sql.is_empty() {
        vec![session.query_text().to_string()]
    } else {
        sql.to_vec()
    };

    let mut outcomes = Vec::with_capacity(queries.len());
    let mut failed = 0;
    for query in &queries {
        let task = ui.task("executing query");
        let outcome = session.executor().execute(query).await;
        task.finish();
        match outcome {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) => {
                tracing::debug!(error = %err, "query failed");
                failed += 1;
            }
        }
    }

    let report = QueryReport {
        outcomes,
        failed,
        table: session.executor().table(),
        history: session.executor().history(),
    };
    emit(&cli.format, &report, |_| {
        if let Some(table) = report.table.as_ref() {
            ui.table("Result", &table.headers, &table.rows);
        }
        print_history(ui, session);
    })?;

    if failed > 0 {
        return Err(format!("{failed} of {} queries failed", queries.len()).into());
    }
    Ok(())
}

fn run_config(
    cli: &Cli,
    ui: &Ui,
    config: &ClientConfig,
    action: &ConfigAction,
) -> Result<(), Box<dyn Error>> {
    match action {
        ConfigAction::Init { force } => {
            if let Some(path) = config.path() {
                if path.exists() && !force {
                    return Err(format!(
                        "{} already exists; pass --force to overwrite",
                        path.display()
                    )
                    .into());
                }
            }
            let path = config.persist()?;
            ui.success(&format!("wrote {}", path.display()));
        }
        ConfigAction::Show => {
            let rendered = config.to_toml_string()?;
            match cli.format {
                OutputFormat::Json => {
                    let value: toml::Value = toml::from_str(&rendered)?;
                    println!("{}", serde_json::to_string_pretty(&value)?);
                }
                OutputFormat::Text => {
                    if let Some(path) = config.path() {
                        ui.info(&format!("# {}", path.display()));
                    }
                    print!("{rendered}");
                }
            }
        }
    }
    Ok(())
}

fn print_rules(ui: &Ui, view: &RulesView, touched: Option<&str>) {
    ui.ordered_list(
        "Applied rules",
        view.applied
            .iter()
            .map(|name| (name.clone(), Some(name.as_str()) == touched)),
    );
    ui.list("Available rules", view.available.iter().cloned());
}

fn print_mutation(
    ui: &Ui,
    session: &Session<HttpPlanner>,
    report: &MutationReport,
    touched: Option<&str>,
) {
    let view = RulesView {
        applied: report.applied.clone(),
        available: session
            .rules()
            .with_catalog(|catalog| catalog.available_names()),
    };
    print_rules(ui, &view, touched);
    if !report.changed {
        ui.info("rule order unchanged");
        return;
    }
    match report.execution.as_ref().and_then(ExecutionOutcome::applied) {
        Some(execution) => {
            ui.table("Result", &execution.table.headers, &execution.table.rows);
            ui.section(
                "Costs",
                [
                    ("plan", execution.result.plan_cost.to_string()),
                    ("best", execution.result.best_cost.to_string()),
                    ("time", execution.result.exec_time.to_string()),
                ],
            );
        }
        None => ui.warn("query was not re-executed"),
    }
}

fn print_history(ui: &Ui, session: &Session<HttpPlanner>) {
    let headers: Vec<String> = ["#", "Query", "Rules", "Plan cost", "Best cost", "Exec time"]
        .iter()
        .map(|header| header.to_string())
        .collect();
    let rows: Vec<Vec<String>> = session.executor().with_history(|history| {
        history
            .display_rows()
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.split_whitespace().collect::<Vec<_>>().join(" "))
                    .collect()
            })
            .collect()
    });
    ui.table("History", &headers, &rows);
}

fn emit<T, F>(format: &OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(OutputFormat),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(OutputFormat::Text),
    }
    Ok(())
}
