use std::{
    collections::BTreeMap,
    io::{self, Write},
    str::FromStr,
    sync::Arc,
};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use env_logger::Builder;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use pingora::{
    server::{ListenFds, ShutdownWatch},
    services::Service,
};
use serde::Serialize;
use tokio::{
    fs::{create_dir_all, metadata, OpenOptions},
    io::{AsyncWriteExt, BufWriter},
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};

use crate::core::{GatewayError, GatewayResult};

/// Sub-logger covering the gateway itself.
pub const CORE_LOGGER: &str = "core";
const CORE_TARGET: &str = "nsgate";

/// Parses a level name, accepting the `WARNING`/`CRITICAL` spellings too.
/// Anything unrecognised is `INFO`.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.to_ascii_uppercase().as_str() {
        "WARNING" => LevelFilter::Warn,
        "CRITICAL" | "FATAL" => LevelFilter::Error,
        other => LevelFilter::from_str(other).unwrap_or(LevelFilter::Info),
    }
}

#[derive(Clone, Debug)]
struct SubLogger {
    target: String,
    level: LevelFilter,
}

#[derive(Clone, Debug)]
struct LevelTable {
    root: LevelFilter,
    loggers: BTreeMap<String, SubLogger>,
}

impl LevelTable {
    /// Level of the most specific sub-logger whose target prefixes `target`.
    fn level_for(&self, target: &str) -> LevelFilter {
        self.loggers
            .values()
            .filter(|l| {
                target == l.target
                    || target
                        .strip_prefix(l.target.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
            .max_by_key(|l| l.target.len())
            .map_or(self.root, |l| l.level)
    }
}

/// Current levels, as reported by the settings endpoint.
#[derive(Debug, PartialEq, Serialize)]
pub struct LevelSnapshot {
    pub loglevel: String,
    pub loggers: BTreeMap<String, String>,
}

/// Process-wide log level table with a registry of named sub-loggers.
///
/// Cloning yields another handle onto the same table.
#[derive(Clone)]
pub struct LogLevels {
    table: Arc<ArcSwap<LevelTable>>,
}

impl LogLevels {
    pub fn new(root: LevelFilter) -> Self {
        let levels = Self {
            table: Arc::new(ArcSwap::from_pointee(LevelTable {
                root,
                loggers: BTreeMap::new(),
            })),
        };
        levels.register(CORE_LOGGER, CORE_TARGET);
        levels
    }

    /// Registers `name` for records under `target`, starting at the root level.
    pub fn register(&self, name: &str, target: &str) {
        self.table.rcu(|table| {
            let mut table = LevelTable::clone(table);
            table.loggers.insert(
                name.to_string(),
                SubLogger {
                    target: target.to_string(),
                    level: table.root,
                },
            );
            table
        });
    }

    pub fn root(&self) -> LevelFilter {
        self.table.load().root
    }

    pub fn get(&self, name: &str) -> Option<LevelFilter> {
        self.table.load().loggers.get(name).map(|l| l.level)
    }

    pub fn set(&self, name: &str, level: LevelFilter) -> GatewayResult<()> {
        if self.get(name).is_none() {
            return Err(GatewayError::NotFound(format!("no logger named {name}")));
        }
        self.table.rcu(|table| {
            let mut table = LevelTable::clone(table);
            if let Some(logger) = table.loggers.get_mut(name) {
                logger.level = level;
            }
            table
        });
        log::info!("log level of {name} set to {level}");
        Ok(())
    }

    /// Sets the root and every registered sub-logger.
    pub fn set_all(&self, level: LevelFilter) {
        self.table.rcu(|table| {
            let mut table = LevelTable::clone(table);
            table.root = level;
            for logger in table.loggers.values_mut() {
                logger.level = level;
            }
            table
        });
        log::info!("log level set to {level}");
    }

    pub fn snapshot(&self) -> LevelSnapshot {
        let table = self.table.load();
        LevelSnapshot {
            loglevel: table.root.to_string(),
            loggers: table
                .loggers
                .iter()
                .map(|(name, l)| (name.clone(), l.level.to_string()))
                .collect(),
        }
    }

    pub fn enabled(&self, target: &str, level: log::Level) -> bool {
        level <= self.table.load().level_for(target)
    }
}

/// Consults the level table, then hands records to env_logger for formatting.
struct LevelGate {
    levels: LogLevels,
    inner: env_logger::Logger,
}

impl Log for LevelGate {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.levels.enabled(metadata.target(), metadata.level())
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs the process logger. Records go to stderr, or through `sink`
/// into its log file.
pub fn init(levels: LogLevels, sink: Option<&Logger>) -> Result<(), SetLoggerError> {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Trace);
    if let Some(sink) = sink {
        builder.target(env_logger::Target::Pipe(Box::new(sink.create_async_writer())));
    }

    log::set_boxed_logger(Box::new(LevelGate {
        levels,
        inner: builder.build(),
    }))?;
    log::set_max_level(LevelFilter::Trace);
    Ok(())
}

pub struct AsyncWriter {
    sender: UnboundedSender<Vec<u8>>,
}

impl Write for AsyncWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let data = buf.to_vec();
        self.sender.send(data).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Background service appending formatted records to a file.
pub struct Logger {
    sender: UnboundedSender<Vec<u8>>,
    receiver: UnboundedReceiver<Vec<u8>>,
    path: String,
}

impl Logger {
    pub fn new(path: &str) -> Self {
        let (sender, receiver) = unbounded_channel::<Vec<u8>>();
        Self {
            sender,
            receiver,
            path: path.to_string(),
        }
    }

    fn create_async_writer(&self) -> AsyncWriter {
        AsyncWriter {
            sender: self.sender.clone(),
        }
    }
}

#[async_trait]
impl Service for Logger {
    async fn start_service(&mut self, _fds: Option<ListenFds>, mut shutdown: ShutdownWatch) {
        if let Some(parent) = std::path::Path::new(&self.path).parent() {
            if metadata(parent).await.is_err() {
                if let Err(e) = create_dir_all(parent).await {
                    eprintln!("Failed to create log path {}: {e}", parent.display());
                    return;
                }
            }
        }

        let file = match OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
        {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Failed to open or create log file {}: {e}", self.path);
                return;
            }
        };
        let mut file = BufWriter::new(file);

        loop {
            tokio::select! {
                biased;
                // Shutdown signal handling
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("Shutdown signal received, stopping write log");
                        break;
                    }
                },

                data = self.receiver.recv() => {
                    match data {
                        Some(data) => {
                            if let Err(e) = file.write_all(&data).await {
                                eprintln!("Failed to write to log file: {e}");
                            }
                            // keep the file current when the channel drains
                            if self.receiver.is_empty() {
                                if let Err(e) = file.flush().await {
                                    eprintln!("Failed to flush log file: {e}");
                                }
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // drain whatever was logged during shutdown
        while let Ok(data) = self.receiver.try_recv() {
            let _ = file.write_all(&data).await;
        }
        if let Err(e) = file.flush().await {
            eprintln!("Failed to flush log file: {e}");
        }
    }

    fn name(&self) -> &'static str {
        "log sync"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("warning"), LevelFilter::Warn);
        assert_eq!(parse_level("CRITICAL"), LevelFilter::Error);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn test_sub_logger_levels() {
        let levels = LogLevels::new(LevelFilter::Info);
        levels.register("namespace", "nsgate::filter::namespace");

        assert!(!levels.enabled("nsgate::filter::namespace", Level::Debug));
        levels.set("namespace", LevelFilter::Debug).unwrap();
        assert!(levels.enabled("nsgate::filter::namespace", Level::Debug));
        assert!(!levels.enabled("nsgate::engine::split", Level::Debug));
        // unregistered targets follow the root
        assert!(levels.enabled("reqwest::connect", Level::Info));
        assert!(!levels.enabled("reqwest::connect", Level::Debug));

        assert!(levels.set("unknown", LevelFilter::Debug).is_err());
    }

    #[test]
    fn test_set_all_and_snapshot() {
        let levels = LogLevels::new(LevelFilter::Info);
        levels.register("audit", "nsgate::filter::audit");
        let handle = levels.clone();
        handle.set_all(LevelFilter::Debug);

        assert_eq!(levels.root(), LevelFilter::Debug);
        assert_eq!(levels.get(CORE_LOGGER), Some(LevelFilter::Debug));
        let snapshot = levels.snapshot();
        assert_eq!(snapshot.loglevel, "DEBUG");
        assert_eq!(snapshot.loggers.get("audit").map(String::as_str), Some("DEBUG"));
        assert_eq!(snapshot.loggers.len(), 2);
    }

    #[test]
    fn test_prefix_match_is_segment_aware() {
        let levels = LogLevels::new(LevelFilter::Warn);
        levels.register("audit", "nsgate::filter::audit");
        levels.set("audit", LevelFilter::Trace).unwrap();
        assert!(!levels.enabled("nsgate::filter::auditor", Level::Info));
        assert!(levels.enabled("nsgate::filter::audit::detail", Level::Trace));
    }
}
