use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use crate::utils::devlog::TRACE_TARGET;

pub const METRICS_TARGET: &str = "docbench::metrics";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_RETENTION: u32 = 7;

type LogResult = Result<(), Box<dyn std::error::Error>>;

/// Initializes the logging system from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error if the file is missing or invalid, or a logger is already set.
pub fn init() -> LogResult {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes the logging system from a specific config file path.
///
/// # Errors
/// Returns an error if the file is missing or invalid, or a logger is already set.
pub fn init_path(path: &Path) -> LogResult {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Parses a level name; unknown names fall back to `info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(dir: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", dir.join(format!("{stem}.{{}}.log")).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(format!("{stem}.log")), Box::new(policy))?)
}

/// Builds the rolling-file configuration:
/// `{dir}/app.log` for everything, `{dir}/metrics.log` for `docbench::metrics`,
/// and `{dir}/trace.log` for bench records when `enable_trace` is set.
///
/// # Errors
/// Returns an error if the directory or any appender cannot be created.
pub fn build_config(
    dir: &Path,
    level: LevelFilter,
    retention: u32,
    enable_trace: bool,
) -> Result<Config, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", retention)?)))
        .appender(Appender::builder().build("metrics", Box::new(rolling(dir, "metrics", retention)?)))
        .logger(Logger::builder().appender("metrics").additive(false).build(METRICS_TARGET, level));
    if enable_trace {
        builder = builder
            .appender(Appender::builder().build("trace", Box::new(rolling(dir, "trace", retention)?)))
            .logger(
                Logger::builder()
                    .appender("trace")
                    .additive(false)
                    .build(TRACE_TARGET, LevelFilter::Trace),
            );
    } else {
        builder = builder.logger(Logger::builder().additive(false).build(TRACE_TARGET, LevelFilter::Off));
    }
    Ok(builder.build(Root::builder().appender("app").build(level))?)
}

/// Configure logging globally for the process.
/// - dir: base directory for logs; if None, current directory.
/// - level: off|error|warn|info|debug|trace
/// - retention: number of rolled files to keep (default 7)
///
/// # Errors
/// Returns an error if the appenders cannot be built or a logger is already set.
pub fn configure_logging(dir: Option<&Path>, level: Option<&str>, retention: Option<u32>) -> LogResult {
    configure_logging_with_trace(dir, level, retention, false)
}

/// Like [`configure_logging`], additionally persisting bench records to `trace.log` when asked.
///
/// # Errors
/// Returns an error if the appenders cannot be built or a logger is already set.
pub fn configure_logging_with_trace(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
    enable_trace: bool,
) -> LogResult {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    let config =
        build_config(&base, parse_level(level), retention.unwrap_or(DEFAULT_RETENTION), enable_trace)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Logs to `{base}/{name}_logs/` with the same appender layout as [`configure_logging`].
///
/// # Errors
/// Returns an error if the directory cannot be created or the logger fails to initialize.
pub fn init_for_db_in(base_dir: &Path, name: &str) -> LogResult {
    let dir = base_dir.join(format!("{name}_logs"));
    let config = build_config(&dir, LevelFilter::Info, DEFAULT_RETENTION, false)?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Console logging on stderr, for the CLI when no log directory is configured.
///
/// # Errors
/// Returns an error if a logger is already set.
pub fn init_stderr(level: Option<&str>) -> LogResult {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {m}{n}")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .logger(Logger::builder().additive(false).build(TRACE_TARGET, LevelFilter::Off))
        .build(Root::builder().appender("stderr").build(parse_level(level)))?;
    log4rs::init_config(config)?;
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `DOCBENCH_LOG_DIR`
/// - `DOCBENCH_LOG_LEVEL`
/// - `DOCBENCH_LOG_RETENTION`
/// - `DOCBENCH_TRACE` (1/true/yes)
///
/// # Errors
/// Returns an error if the appenders cannot be built or a logger is already set.
pub fn configure_from_env() -> LogResult {
    let dir = std::env::var("DOCBENCH_LOG_DIR").ok().map(PathBuf::from);
    let level = std::env::var("DOCBENCH_LOG_LEVEL").ok();
    let retention = std::env::var("DOCBENCH_LOG_RETENTION").ok().and_then(|s| s.parse::<u32>().ok());
    let trace = std::env::var("DOCBENCH_TRACE")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    configure_logging_with_trace(dir.as_deref(), level.as_deref(), retention, trace)
}
