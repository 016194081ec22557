use clap::Parser;
use log::{debug, info};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tabflow::{
    parse_keywords, resolve_expressions, substitute_templates, ContainerStore, EngineError,
    PipelineExecutor, WorkbookWriter,
};

/// General-purpose query engine over local flat files
#[derive(Parser, Debug)]
#[command(name = "tabflow")]
#[command(about = "Run a declarative ETL pipeline over tabular containers", long_about = None)]
struct Args {
    /// Pipeline configuration (YAML)
    config: PathBuf,

    /// Destination directory for the written containers
    dest: PathBuf,

    /// Run-time keyword string, e.g. "@cob=20180403@region=emea"
    keywords: String,
}

fn run(args: &Args) -> Result<(), EngineError> {
    let keywords = parse_keywords(&args.keywords)?;

    info!("parsing configuration {}", args.config.display());
    let text = fs::read_to_string(&args.config)?;
    let mut doc: serde_yaml::Value = serde_yaml::from_str(&text)?;

    // two-phase resolution: expressions first, then keyword templates
    resolve_expressions(&mut doc);
    substitute_templates(&mut doc, &keywords)?;
    if let Ok(json) = serde_json::to_string_pretty(&doc) {
        debug!("resolved configuration:\n{json}");
    }

    let mut store = ContainerStore::new();
    PipelineExecutor::run(&doc, &mut store)?;

    WorkbookWriter::new(&args.dest).write_store(&store)?;
    store.memory_report();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tabflow: {err}");
            ExitCode::FAILURE
        }
    }
}
