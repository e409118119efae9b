use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, InspectArgs, JudgeArgs, PipelineArgs, ScoutArgs};
use notesieve::{
    config::RetrievalConfig,
    corpus::ChunkStore,
    cross_encoder::CrossEncoderProvider,
    dense::DenseProvider,
    diagnostics::StageDiagnostics,
    error,
    inspector,
    judge,
    late_interaction::LateInteractionProvider,
    lexical::LexicalProvider,
    links::LinkTable,
    pipeline,
    scout,
};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("NOTESIEVE_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> error::Result<()> {
    let config = RetrievalConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Scout(args) => cmd_scout(&config, &args),
        Command::Inspect(args) => cmd_inspect(&config, &args),
        Command::Judge(args) => cmd_judge(&config, &args),
        Command::Pipeline(args) => cmd_pipeline(&config, &args),
    }
}

fn cmd_scout(
    config: &RetrievalConfig,
    args: &ScoutArgs,
) -> error::Result<()> {
    let store = ChunkStore::load_for_stage("scout", &args.chunks)?;
    let limit = config.scout_provider_limit();
    let lexical = LexicalProvider::new(&config.bm25, limit);
    let dense = DenseProvider::new(&config.dense, limit);

    let diag = scout::run_scout(
        config,
        &store,
        &args.query,
        &lexical,
        &dense,
        &args.out_dir,
    )?;

    println!(
        "Scout complete: {} candidate(s) from {} chunk(s) in {:.3}s",
        diag.output_count,
        diag.input_count,
        diag.total_seconds()
    );
    Ok(())
}

fn cmd_inspect(
    config: &RetrievalConfig,
    args: &InspectArgs,
) -> error::Result<()> {
    let store = ChunkStore::load_for_stage("inspector", &args.chunks)?;
    let scorer = LateInteractionProvider::new(&config.li);

    let diag = inspector::run_inspect(
        config,
        &store,
        &args.query,
        &scorer,
        &args.candidates,
        &args.out_dir,
    )?;

    println!(
        "Inspector complete: rescored {} of {} candidate(s) in {:.3}s",
        diag.output_count,
        diag.input_count,
        diag.total_seconds()
    );
    Ok(())
}

fn cmd_judge(config: &RetrievalConfig, args: &JudgeArgs) -> error::Result<()> {
    let store = ChunkStore::load_for_stage("judge", &args.chunks)?;
    let scorer = CrossEncoderProvider::new(&config.xenc);
    let links = match args.links.as_deref() {
        Some(path) => LinkTable::load(path),
        None => LinkTable::empty(),
    };

    let diag = judge::run_judge(
        config,
        &store,
        &args.query,
        &scorer,
        &args.rescored,
        &links,
        &args.out_dir,
    )?;

    print_judge_summary(&diag);
    Ok(())
}

fn cmd_pipeline(
    config: &RetrievalConfig,
    args: &PipelineArgs,
) -> error::Result<()> {
    let store = ChunkStore::load_for_stage("scout", &args.chunks)?;
    let limit = config.scout_provider_limit();
    let lexical = LexicalProvider::new(&config.bm25, limit);
    let dense = DenseProvider::new(&config.dense, limit);
    let interaction = LateInteractionProvider::new(&config.li);
    let pair = CrossEncoderProvider::new(&config.xenc);
    let links = match args.links.as_deref() {
        Some(path) => LinkTable::load(path),
        None => LinkTable::empty(),
    };

    let diags = pipeline::run_pipeline(
        config,
        &store,
        &args.query,
        &lexical,
        &dense,
        &interaction,
        &pair,
        &links,
        &args.out_dir,
    )?;

    for diag in &diags {
        match diag.stage.as_str() {
            "judge" => print_judge_summary(diag),
            stage => println!(
                "{stage}: {} -> {} in {:.3}s",
                diag.input_count,
                diag.output_count,
                diag.total_seconds()
            ),
        }
    }
    Ok(())
}

fn print_judge_summary(diag: &StageDiagnostics) {
    println!(
        "Judge complete: {} result(s), {} patient link(s) in {:.3}s",
        diag.output_count,
        diag.patient_uid_attached.unwrap_or(0),
        diag.total_seconds()
    );
}
