use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tlm_components::Component;
use tlm_core::Severity;
use tlm_sim::{
    ComponentSystem, NetworkDescription, RunOutcome, SchedulerStrategy, Session, SimError,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tlm")]
#[command(about = "TLM network simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and initialize a network without running it
    Check {
        /// Path to the network YAML file
        model_path: PathBuf,
    },
    /// Run a simulation
    Run(RunArgs),
    /// List the component and node types of the standard library
    Types,
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to the network YAML file
    model_path: PathBuf,
    /// Start time in seconds (overrides the file)
    #[arg(long)]
    start: Option<f64>,
    /// Stop time in seconds (overrides the file)
    #[arg(long)]
    stop: Option<f64>,
    /// Top-level timestep in seconds (overrides the file)
    #[arg(long)]
    timestep: Option<f64>,
    /// Worker threads, 0 for one per core
    #[arg(long)]
    threads: Option<usize>,
    /// Scheduling strategy
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
    /// Parameter override, `component.parameter=value`
    #[arg(long = "set", value_name = "COMP.PARAM=VALUE")]
    overrides: Vec<String>,
    /// Logged variable to export, `component.port.variable`
    #[arg(long = "probe", value_name = "COMP.PORT.VAR")]
    probes: Vec<String>,
    /// Output CSV file path (optional, defaults to stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Serial,
    StaticPartition,
    WorkStealing,
    TaskPool,
}

impl From<StrategyArg> for SchedulerStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Serial => SchedulerStrategy::Serial,
            StrategyArg::StaticPartition => SchedulerStrategy::StaticPartition,
            StrategyArg::WorkStealing => SchedulerStrategy::WorkStealing,
            StrategyArg::TaskPool => SchedulerStrategy::TaskPool,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("Bad argument '{arg}': {what}")]
    BadArg { arg: String, what: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type CliResult<T> = Result<T, CliError>;

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { model_path } => cmd_check(&model_path),
        Commands::Run(args) => cmd_run(&args),
        Commands::Types => cmd_types(),
    }
}

fn cmd_check(model_path: &Path) -> CliResult<()> {
    println!("Checking network: {}", model_path.display());
    let session = Session::new()?;
    let description = NetworkDescription::load(model_path)?;
    let mut system = session.build(&description)?;
    let result = system.initialize(description.start, description.stop);
    print_message_summary(&session);
    result?;

    println!("✓ Network is valid");
    println!("  Components: {}", system.num_components());
    println!("  Nodes: {}", system.nodes().len());
    println!("  Timestep: {} s", system.timestep());
    println!("  Log rows: {}", system.log_slots());
    Ok(())
}

fn cmd_run(args: &RunArgs) -> CliResult<()> {
    let session = Session::new()?;
    let mut description = NetworkDescription::load(&args.model_path)?;
    if let Some(start) = args.start {
        description.start = start;
    }
    if let Some(stop) = args.stop {
        description.stop = stop;
    }
    if let Some(ts) = args.timestep {
        description.system.timestep = Some(ts);
    }
    if let Some(threads) = args.threads {
        description.options.threads = threads;
    }
    if let Some(strategy) = args.strategy {
        description.options.strategy = strategy.into();
    }

    let probes = args
        .probes
        .iter()
        .map(|p| parse_probe(p))
        .collect::<CliResult<Vec<_>>>()?;

    let mut system = session.build(&description)?;
    tracing::debug!(
        components = system.num_components(),
        nodes = system.nodes().len(),
        "built network"
    );
    for arg in &args.overrides {
        let (component, param, value) = parse_override(arg)?;
        system.set_component_parameter(component, param, value)?;
    }

    println!(
        "Running {} from {} s to {} s",
        description.system.name, description.start, description.stop
    );
    println!(
        "  strategy = {}, threads = {}",
        system.options().strategy,
        system.options().effective_threads()
    );

    let started = Instant::now();
    let result = system.simulate(description.start, description.stop);
    let elapsed = started.elapsed().as_secs_f64();
    print_message_summary(&session);
    match result? {
        RunOutcome::Completed => println!("✓ Simulation completed in {:.3}s", elapsed),
        RunOutcome::Aborted => println!("Simulation aborted after {:.3}s", elapsed),
    }
    println!("  Logged samples: {}", system.num_logged_samples());

    if !probes.is_empty() {
        export_probes(&system, &probes, args.output.as_deref())?;
    }
    system.finalize()?;
    Ok(())
}

fn cmd_types() -> CliResult<()> {
    let session = Session::new()?;
    println!("Component types:");
    for type_name in session.component_factory().type_names() {
        let kind = session
            .create_component(&type_name, "probe")
            .map(|c| format!("{:?}", c.kind()))
            .unwrap_or_else(|_| "?".to_string());
        println!("  {:<34} {}", type_name, kind);
    }
    println!("\nNode types:");
    for type_name in session.node_factory().type_names() {
        println!("  {}", type_name);
    }
    Ok(())
}

struct Probe<'a> {
    component: &'a str,
    port: &'a str,
    variable: &'a str,
}

/// `sub/comp.port.var`
fn parse_probe(arg: &str) -> CliResult<Probe<'_>> {
    let mut parts = arg.rsplitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(variable), Some(port), Some(component)) if !component.is_empty() => Ok(Probe {
            component,
            port,
            variable,
        }),
        _ => Err(CliError::BadArg {
            arg: arg.to_string(),
            what: "expected component.port.variable",
        }),
    }
}

/// `sub/comp.param=value`
fn parse_override(arg: &str) -> CliResult<(&str, &str, f64)> {
    let bad = |what| CliError::BadArg {
        arg: arg.to_string(),
        what,
    };
    let (target, value) = arg.split_once('=').ok_or_else(|| bad("expected comp.param=value"))?;
    let (component, param) = target
        .rsplit_once('.')
        .ok_or_else(|| bad("expected comp.param=value"))?;
    let value = value.trim().parse::<f64>().map_err(|_| bad("value is not a number"))?;
    Ok((component, param, value))
}

fn export_probes(system: &ComponentSystem, probes: &[Probe<'_>], output: Option<&Path>) -> CliResult<()> {
    let time = system.time_vector();
    let columns = probes
        .iter()
        .map(|p| system.log_data_vector(p.component, p.port, p.variable))
        .collect::<Result<Vec<_>, _>>()?;

    let mut csv = String::from("time_s");
    for p in probes {
        csv.push_str(&format!(",{}.{}.{}", p.component, p.port, p.variable));
    }
    csv.push('\n');
    for (row, t) in time.iter().enumerate() {
        csv.push_str(&t.to_string());
        for column in &columns {
            match column.get(row) {
                Some(v) => csv.push_str(&format!(",{}", v)),
                None => csv.push(','),
            }
        }
        csv.push('\n');
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!("✓ Exported {} rows to {}", time.len(), path.display());
    } else {
        print!("{}", csv);
    }
    Ok(())
}

/// Messages are already shown through tracing; this adds the totals.
fn print_message_summary(session: &Session) {
    let messages = session.messages().take_all();
    let count = |severity: Severity| messages.iter().filter(|m| m.severity == severity).count();
    let (warnings, errors) = (count(Severity::Warning), count(Severity::Error));
    if warnings + errors > 0 {
        println!("  Messages: {} warnings, {} errors", warnings, errors);
    }
}
