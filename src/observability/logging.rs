//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the process-wide `tracing` subscriber
//! - Render records as a colorized single line (development) or JSON lines
//! - Optionally write rotated `combined` and `error` log files
//!
//! # Log Files
//! - `combined.log` receives every record at or above the threshold
//! - `error.log` receives errors only
//! - A file rolls over once it passes `max_size_bytes` or the local date
//!   changes; rolled files are gzipped as `<name>.log.<n>.gz`, newest
//!   first, and at most `max_files` are kept per sink
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Level from `LOG_LEVEL`, overridable through `RUST_LOG`
//! - Records below the threshold are filtered out, never buffered

use std::fmt;
use std::io::{self, IsTerminal};

use chrono::{DateTime, Local, NaiveDate};
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::{Environment, LogLevel, LoggingConfig};
use crate::observability::logger::{CORRELATION_FIELD, METADATA_FIELD, SERVICE_FIELD};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to create log directory: {0}")]
    Directory(#[from] io::Error),

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

/// Keeps the background file writers alive. Dropping it flushes and stops
/// file output, so hold it for the lifetime of the process.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

/// How records are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// `timestamp [level] [correlationId] [service]: message {metadata}`
    Pretty,
    /// One JSON object per line.
    Json,
}

impl OutputFormat {
    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Development => OutputFormat::Pretty,
            _ => OutputFormat::Json,
        }
    }
}

/// Install the global subscriber.
pub fn init_logging(
    config: &LoggingConfig,
    environment: Environment,
) -> Result<LoggingGuard, LoggingError> {
    let format = OutputFormat::for_environment(environment);
    let ansi = format == OutputFormat::Pretty && std::io::stdout().is_terminal();
    let directives = default_directives(config.level);
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directives));

    let console = tracing_subscriber::fmt::layer()
        .event_format(RecordFormat::new(format))
        .with_ansi(ansi)
        .with_writer(std::io::stdout)
        .with_filter(filter());

    let mut guards = Vec::new();
    let (combined, errors) = if config.to_file {
        std::fs::create_dir_all(&config.directory)?;

        let (combined_writer, guard) =
            tracing_appender::non_blocking(RotatingFile::open(config, "combined"));
        guards.push(guard);
        let (error_writer, guard) =
            tracing_appender::non_blocking(RotatingFile::open(config, "error"));
        guards.push(guard);

        let combined = tracing_subscriber::fmt::layer()
            .event_format(RecordFormat::new(OutputFormat::Json))
            .with_ansi(false)
            .with_writer(combined_writer)
            .with_filter(filter());
        let errors = tracing_subscriber::fmt::layer()
            .event_format(RecordFormat::new(OutputFormat::Json))
            .with_ansi(false)
            .with_writer(error_writer)
            .with_filter(LevelFilter::ERROR);
        (Some(combined), Some(errors))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(console)
        .with(combined)
        .with(errors)
        .try_init()?;

    tracing::debug!(
        level = %config.level,
        format = ?format,
        to_file = config.to_file,
        directory = %config.directory.display(),
        max_size_bytes = config.max_size_bytes,
        max_files = config.max_files,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guards: guards })
}

/// Log file sink that rolls over on size or on a new local day.
pub struct RotatingFile {
    file: FileRotate<AppendCount>,
    day: NaiveDate,
}

impl RotatingFile {
    /// Opens `<directory>/<name>.log` for appending. The directory must exist.
    pub fn open(config: &LoggingConfig, name: &str) -> Self {
        let file = FileRotate::new(
            config.directory.join(format!("{}.log", name)),
            AppendCount::new(config.max_files),
            ContentLimit::BytesSurpassed(config.max_size_bytes),
            Compression::OnRotate(0),
            #[cfg(unix)]
            None,
        );
        Self {
            file,
            day: Local::now().date_naive(),
        }
    }
}

impl io::Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let today = Local::now().date_naive();
        if today != self.day {
            self.day = today;
            self.file.rotate()?;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Filter directives for a configured level. Driver crates are capped at
/// `warn` so debug output stays readable.
fn default_directives(level: LogLevel) -> String {
    let quiet = level.min(LogLevel::Warn);
    format!(
        "{level},tokio_postgres={quiet},redis={quiet},hyper={quiet},rustls={quiet},tower_http={quiet}"
    )
}

/// Event formatter shared by the console and file sinks.
#[derive(Debug, Clone, Copy)]
pub struct RecordFormat {
    format: OutputFormat,
}

impl RecordFormat {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

impl<S, N> FormatEvent<S, N> for RecordFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let record = LogRecord::from_event(event);
        match self.format {
            OutputFormat::Pretty => {
                let ansi = writer.has_ansi_escapes();
                writeln!(writer, "{}", record.render_pretty(ansi))
            }
            OutputFormat::Json => writeln!(writer, "{}", record.render_json()),
        }
    }
}

/// One log line, decoded from a `tracing` event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
    pub correlation_id: Option<String>,
    pub service: Option<String>,
    pub metadata: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: Level, message: &str) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.to_string(),
            correlation_id: None,
            service: None,
            metadata: Map::new(),
        }
    }

    pub fn from_event(event: &Event<'_>) -> Self {
        let mut record = Self::new(*event.metadata().level(), "");
        event.record(&mut RecordVisitor {
            record: &mut record,
        });
        record
    }

    pub fn render_pretty(&self, ansi: bool) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        let level = if ansi {
            format!("\x1b[{}m{}\x1b[0m", level_color(&self.level), level)
        } else {
            level
        };

        let mut line = format!("{} [{}]", self.timestamp.format("%Y-%m-%d %H:%M:%S"), level);
        if let Some(id) = &self.correlation_id {
            line.push_str(&format!(" [{}]", id));
        }
        if let Some(service) = &self.service {
            line.push_str(&format!(" [{}]", service));
        }
        line.push_str(": ");
        line.push_str(&self.message);
        if !self.metadata.is_empty() {
            line.push(' ');
            line.push_str(&Value::Object(self.metadata.clone()).to_string());
        }
        line
    }

    pub fn render_json(&self) -> String {
        let mut object = Map::new();
        object.insert(
            "timestamp".into(),
            Value::from(self.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string()),
        );
        object.insert("level".into(), Value::from(self.level.as_str().to_ascii_lowercase()));
        object.insert("message".into(), Value::from(self.message.clone()));
        if let Some(id) = &self.correlation_id {
            object.insert(CORRELATION_FIELD.into(), Value::from(id.clone()));
        }
        if let Some(service) = &self.service {
            object.insert(SERVICE_FIELD.into(), Value::from(service.clone()));
        }
        for (key, value) in &self.metadata {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(object).to_string()
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "31",
        Level::WARN => "33",
        Level::INFO => "32",
        Level::DEBUG => "34",
        Level::TRACE => "35",
    }
}

struct RecordVisitor<'a> {
    record: &'a mut LogRecord,
}

impl RecordVisitor<'_> {
    fn put(&mut self, name: &str, value: Value) {
        match name {
            "message" => self.record.message = value_text(value),
            CORRELATION_FIELD => self.record.correlation_id = Some(value_text(value)),
            SERVICE_FIELD => self.record.service = Some(value_text(value)),
            METADATA_FIELD => match &value {
                Value::String(text) => match serde_json::from_str::<Value>(text) {
                    Ok(Value::Object(map)) => self.record.metadata.extend(map),
                    _ => {
                        self.record.metadata.insert(name.to_string(), value);
                    }
                },
                _ => {
                    self.record.metadata.insert(name.to_string(), value);
                }
            },
            // Bridged `log` records carry their origin in `log.*` fields.
            _ if name.starts_with("log.") => {}
            _ => {
                self.record.metadata.insert(name.to_string(), value);
            }
        }
    }
}

fn value_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl Visit for RecordVisitor<'_> {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field.name(), Value::from(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field.name(), Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field.name(), Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field.name(), Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field.name(), Value::from(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field.name(), Value::from(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field.name(), Value::from(format!("{:?}", value)));
    }
}

/// In-memory log capture for tests.
#[cfg(test)]
pub(crate) mod capture {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub(crate) struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        /// Every captured line parsed as JSON.
        pub(crate) fn json_lines(&self) -> Vec<Value> {
            self.contents()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    /// A subscriber rendering through [`RecordFormat`] into a shared buffer.
    pub(crate) fn subscriber(
        format: OutputFormat,
        max_level: Level,
    ) -> (impl Subscriber + Send + Sync + 'static, SharedBuf) {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .event_format(RecordFormat::new(format))
            .with_max_level(max_level)
            .with_writer(move || writer.clone())
            .finish();
        (subscriber, buf)
    }
}
