use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const FILTER_ENV: &str = "WATERFALL_LOG_FILTER";
const TRACE_DEPS_ENV: &str = "WATERFALL_TRACE_DEPS";

const TRACE_DEP_TARGETS: &[&str] = &["tokio_tungstenite", "tungstenite", "native_tls", "mio"];

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. Later calls are no-ops.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if GUARD.get().is_some() {
        return Ok(());
    }

    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(config.level.to_filter()))
        .with_target(config.level >= LogLevel::Debug)
        .with_thread_names(config.level >= LogLevel::Trace)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Configure(err.to_string()))?;

    let _ = GUARD.set(guard);
    Ok(())
}

fn build_env_filter(level: LevelFilter) -> EnvFilter {
    match std::env::var(FILTER_ENV) {
        Ok(filter) => EnvFilter::new(filter),
        Err(_) => EnvFilter::new(default_filter_for(level, trace_deps_enabled())),
    }
}

fn trace_deps_enabled() -> bool {
    std::env::var(TRACE_DEPS_ENV)
        .map(|value| value != "0" && !value.is_empty())
        .unwrap_or(false)
}

fn default_filter_for(level: LevelFilter, trace_deps: bool) -> String {
    let mut filter = level.to_string().to_lowercase();
    if level == LevelFilter::TRACE && !trace_deps {
        for target in TRACE_DEP_TARGETS {
            filter.push(',');
            filter.push_str(target);
            filter.push_str("=info");
        }
    }
    filter
}
