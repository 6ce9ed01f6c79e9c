use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use docbench::Database;
use docbench::config::EngineConfig;
use docbench::errors::DbError;
use docbench::import::{self, ImportOptions};
use docbench::synth::{self, SynthSpec};
use docbench::utils::logger;
use docbench::workload::{self, QuerySet, WorkloadOptions};

#[derive(Parser, Debug)]
#[command(name = "docbench", version, about = "Big Data Benchmark query workload over an in-memory document store", long_about = None)]
struct Cli {
    #[arg(long, global = true, help = "Path to a config file (TOML). Overrides DOCBENCH_CONFIG and ./docbench.toml")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Write rolling log files to this directory instead of stderr")]
    log_dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Log level: off|error|warn|info|debug|trace")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Print the inflated content of .deflate files to stdout")]
    Inflate {
        #[arg(required = true, help = "Files to inflate")]
        files: Vec<PathBuf>,
    },
    #[command(about = "Write synthetic rankings.csv and uservisits.csv shaped like the tiny data set")]
    Generate {
        #[arg(long, help = "Output directory")]
        out: PathBuf,
        #[arg(long, default_value_t = 42, help = "RNG seed")]
        seed: u64,
    },
    #[command(about = "Load the data files and run the benchmark queries; prints a JSON report")]
    Run {
        #[arg(long, num_args = 1.., required = true, help = "Rankings CSV or .deflate files")]
        rankings: Vec<PathBuf>,
        #[arg(long, num_args = 1.., required = true, help = "Uservisits CSV or .deflate files")]
        uservisits: Vec<PathBuf>,
        #[arg(long, default_value = "all", help = "Which query to run: 1|2|3|all")]
        query: String,
        #[arg(long, help = "Skip the tiny data set's expected-result checks")]
        skip_checks: bool,
    },
}

fn load_config(cli: &Cli) -> Result<EngineConfig, DbError> {
    // CLI > env > config file > defaults
    let mut cfg = EngineConfig::load(cli.config.as_deref())?;
    if cli.log_dir.is_some() {
        cfg.log_dir.clone_from(&cli.log_dir);
    }
    if cli.log_level.is_some() {
        cfg.log_level.clone_from(&cli.log_level);
    }
    Ok(cfg)
}

fn init_logging(cfg: &EngineConfig) {
    let res = match &cfg.log_dir {
        Some(dir) => logger::configure_logging(Some(dir.as_path()), cfg.log_level.as_deref(), None),
        None => logger::init_stderr(cfg.log_level.as_deref()),
    };
    if let Err(e) = res {
        eprintln!("warning: logging disabled: {e}");
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config(&cli)?;
    init_logging(&cfg);
    match cli.command {
        Commands::Inflate { files } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            for f in &files {
                import::inflate_to(&mut out, f)?;
            }
            out.flush()?;
        }
        Commands::Generate { out, seed } => {
            let data = synth::generate(seed, &SynthSpec::tiny())?;
            let (r, v) = synth::write_csv(&out, &data)?;
            println!("{}\n{}", r.display(), v.display());
        }
        Commands::Run { rankings, uservisits, query, skip_checks } => {
            let opts = WorkloadOptions { queries: QuerySet::parse(&query)?, skip_checks };
            let import_opts = ImportOptions::from_config(&cfg);
            // logging was initialized above
            let db = Database::with_config(EngineConfig { log_dir: None, ..cfg });
            import::import_rankings(&db, rankings.as_slice(), &import_opts)?;
            import::import_uservisits(&db, uservisits.as_slice(), &import_opts)?;
            let report = workload::run_all(&db, &opts)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
