#![deny(missing_docs)]
//! Scoped logging for the bulletin workspace.
//!
//! Components never reach for a process-wide logger on their own. They are
//! handed a [`LogScope`] at construction time and log through it; the scope
//! decides where records go. The default sink forwards to the `log` facade
//! using the scope name as the record target, so whatever backend the binary
//! installs (see `bulletin_app`) receives them. Tests can swap in a
//! [`CaptureSink`] and assert on what was logged.

use std::borrow::Cow;
use std::fmt;
use std::sync::{Arc, Mutex};

pub use log::Level;

/// Destination for records produced through a [`LogScope`].
pub trait LogSink: Send + Sync {
    /// Records a single, already formatted message.
    fn record(&self, level: Level, scope: &str, message: &str);
}

/// Forwards every record to the global `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeSink;

impl LogSink for FacadeSink {
    fn record(&self, level: Level, scope: &str, message: &str) {
        log::log!(target: scope, level, "{message}");
    }
}

/// A single record kept by [`CaptureSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    /// Severity of the record.
    pub level: Level,
    /// Fully qualified scope name, e.g. `pipeline.extract`.
    pub scope: String,
    /// Formatted message.
    pub message: String,
}

/// In-memory sink, mostly useful in tests.
#[derive(Debug, Default)]
pub struct CaptureSink {
    records: Mutex<Vec<CapturedRecord>>,
}

impl CaptureSink {
    /// Creates an empty capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything recorded so far.
    pub fn records(&self) -> Vec<CapturedRecord> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Returns the messages recorded at `level`.
    pub fn messages_at(&self, level: Level) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.level == level)
            .map(|r| r.message)
            .collect()
    }
}

impl LogSink for CaptureSink {
    fn record(&self, level: Level, scope: &str, message: &str) {
        let entry = CapturedRecord {
            level,
            scope: scope.to_string(),
            message: message.to_string(),
        };
        match self.records.lock() {
            Ok(mut records) => records.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

/// Named logging capability handed to each component.
#[derive(Clone)]
pub struct LogScope {
    sink: Arc<dyn LogSink>,
    name: Cow<'static, str>,
}

impl LogScope {
    /// Creates a root scope writing to `sink`.
    pub fn new(name: impl Into<Cow<'static, str>>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            name: name.into(),
        }
    }

    /// Root scope forwarding to the `log` facade.
    pub fn facade(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, Arc::new(FacadeSink))
    }

    /// Derives a nested scope, `parent.child`, sharing the same sink.
    pub fn child(&self, name: &str) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
            name: Cow::Owned(format!("{}.{}", self.name, name)),
        }
    }

    /// Name of this scope.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logs preformatted arguments at `level`.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let message = match args.as_str() {
            Some(s) => Cow::Borrowed(s),
            None => Cow::Owned(args.to_string()),
        };
        self.sink.record(level, &self.name, &message);
    }
}

impl fmt::Debug for LogScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogScope").field("name", &self.name).finish()
    }
}

/// Logs a trace-level message through a [`LogScope`].
#[macro_export]
macro_rules! bulletin_trace {
    ($scope:expr, $($arg:tt)*) => {{
        $scope.log($crate::Level::Trace, format_args!($($arg)*));
    }};
}

/// Logs a debug-level message through a [`LogScope`].
#[macro_export]
macro_rules! bulletin_debug {
    ($scope:expr, $($arg:tt)*) => {{
        $scope.log($crate::Level::Debug, format_args!($($arg)*));
    }};
}

/// Logs an info-level message through a [`LogScope`].
#[macro_export]
macro_rules! bulletin_info {
    ($scope:expr, $($arg:tt)*) => {{
        $scope.log($crate::Level::Info, format_args!($($arg)*));
    }};
}

/// Logs a warn-level message through a [`LogScope`].
#[macro_export]
macro_rules! bulletin_warn {
    ($scope:expr, $($arg:tt)*) => {{
        $scope.log($crate::Level::Warn, format_args!($($arg)*));
    }};
}

/// Logs an error-level message through a [`LogScope`].
#[macro_export]
macro_rules! bulletin_error {
    ($scope:expr, $($arg:tt)*) => {{
        $scope.log($crate::Level::Error, format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
