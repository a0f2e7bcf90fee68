use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use rnalight_rs::kmer_vocab::default_vocabulary;
use rnalight_rs::linear_model::LinearModel;
use rnalight_rs::normalize::ZeroRowPolicy;
use rnalight_rs::predict_batch;
use rnalight_rs::sequence_io::{read_sequence_records, InputFormat};
use rnalight_rs::staging::{ExportSink, FeatureSink, TempStaging};
use rnalight_rs::PipelineConfig;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Tsv,
    Fasta,
}

#[derive(Parser)]
#[command(version, about = "Score RNA sequences from their 3/4/5-mer frequencies")]
struct Cli {
    /// Input sequences: `id<TAB>sequence` lines or FASTA, optionally gzipped
    input: PathBuf,

    /// Linear model weights (TSV)
    #[arg(short = 'm', long = "model")]
    model: PathBuf,

    /// Input format; guessed from the file name when omitted
    #[arg(long = "format", value_enum)]
    format: Option<FormatArg>,

    /// Write predictions here instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Keep the frequency and raw-count tables in this directory
    #[arg(long = "export-dir", conflicts_with = "stage_dir")]
    export_dir: Option<PathBuf>,

    /// Stage the tables in a scratch directory under this path, removed after scoring
    #[arg(long = "stage-dir")]
    stage_dir: Option<PathBuf>,

    /// Drop sequences without any countable k-mer instead of scoring a zero row
    #[arg(long = "reject-zero-rows", default_value_t = false)]
    reject_zero_rows: bool,

    /// Treat `U` as `T`
    #[arg(long = "rna", default_value_t = false)]
    rna: bool,

    /// Worker threads for k-mer counting; 1 counts on the calling thread
    #[arg(short = 't', long = "threads", default_value_t = 1)]
    threads: usize,

    #[arg(long = "verbose", default_value_t = false)]
    verbose: bool,
}

fn spinner(color: &str, msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner().template(&template) {
        spinner.set_style(style.tick_strings(&[
            "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
        ]));
    }
    spinner.set_message(msg.to_string());
    spinner
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.threads > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()?;
    }

    // 1. Model
    let sp = spinner("blue", "Loading model...");
    let model = LinearModel::from_path(&cli.model)?;
    sp.finish_with_message("Model loaded.");

    // 2. Sequences
    let sp = spinner("green", "Reading sequences...");
    let format = cli.format.map(|f| match f {
        FormatArg::Tsv => InputFormat::Tabular,
        FormatArg::Fasta => InputFormat::Fasta,
    });
    let batch = read_sequence_records(&cli.input, format, cli.rna)?;
    sp.finish_with_message(format!(
        "Read {} sequence(s), {} rejected.",
        batch.records.len(),
        batch.rejected.len()
    ));

    // 3. Features + inference
    let sp = spinner("yellow", "Scoring sequences...");
    let config = PipelineConfig {
        zero_row_policy: if cli.reject_zero_rows {
            ZeroRowPolicy::Reject
        } else {
            ZeroRowPolicy::ZeroFill
        },
        parallel: cli.threads > 1,
    };
    let prefix = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "query".to_string());

    let mut export;
    let mut staging;
    let sink: Option<&mut dyn FeatureSink> = match (&cli.export_dir, &cli.stage_dir) {
        (Some(dir), _) => {
            export = ExportSink::new(dir, prefix);
            Some(&mut export)
        }
        (None, Some(dir)) => {
            staging = TempStaging::new(dir, prefix);
            Some(&mut staging)
        }
        (None, None) => None,
    };
    let results = predict_batch(batch, default_vocabulary(), &model, sink, &config)?;
    sp.finish_with_message(format!("Scored {} sequence(s).", results.predictions.len()));

    // 4. Output
    let text = results.get_prediction_output();
    match &cli.output {
        Some(path) => {
            fs::write(path, text)?;
            log::info!("Wrote predictions to {}", path.display());
        }
        None => print!("{text}"),
    }
    if !results.rejected.is_empty() {
        eprint!("{}", results.get_rejected_text());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
