pub mod args;
pub mod commands;

pub use args::{GraphArgs, HistoryArgs, RunArgs, ValidateArgs};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
PIPELINE COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "trialflow")]
#[command(version = crate::VERSION)]
#[command(about = "Sequential ETL pipeline runner for clinical trial outcomes")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: validate the pipeline, render its graph, run it, then inspect run history."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Execute the clinical trial pipeline",
        long_about = "Run executes extract, transform, and load strictly in order, passing values through the run-scoped exchange store and persisting a run record.",
        after_help = "Example:\n    trialflow run --phase phase1"
    )]
    Run(RunArgs),
    #[command(
        about = "Validate a pipeline definition",
        long_about = "Validate checks stage ids, upstream references, and acyclicity for the built-in pipeline or a YAML description, and reports linearity warnings.",
        after_help = "Examples:\n    trialflow validate\n    trialflow validate --file pipeline.yaml"
    )]
    Validate(ValidateArgs),
    #[command(
        about = "Render the stage graph as Graphviz DOT",
        long_about = "Graph prints the stage dependency graph in DOT format for the built-in pipeline or a YAML description.",
        after_help = "Example:\n    trialflow graph | dot -Tsvg > pipeline.svg"
    )]
    Graph(GraphArgs),
    #[command(
        about = "List persisted pipeline runs",
        long_about = "History lists run records persisted under .trialflow/state/runs, most recent first.",
        after_help = "Example:\n    trialflow history --limit 5"
    )]
    History(HistoryArgs),
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Validate(validate_args) => commands::validate(validate_args).await,
        Command::Graph(graph_args) => commands::graph(graph_args).await,
        Command::History(history_args) => commands::history(history_args).await,
    }
}
