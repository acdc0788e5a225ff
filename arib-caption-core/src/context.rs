//! Shared logging collaborator and the small per-instance `Context` handle.

use std::sync::Arc;

/// Severity of a message passed to a [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Verbose,
}

/// Logging side-channel invoked from the same thread as the caller.
///
/// The decoder and renderer never unwind on malformed input; this is the
/// only way they report diagnostic detail beyond the typed `Error`/`Status`
/// return values.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// A [`Logger`] that discards everything. Used when no logger is supplied.
#[derive(Debug, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}

/// Small handle shared by a [`crate::Decoder`] or a renderer instance. Its
/// only real job is to own the logger for the lifetime of the
/// decoder/renderer built from it.
#[derive(Clone)]
pub struct Context {
    logger: Arc<dyn Logger>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            logger: Arc::new(NullLogger),
        }
    }

    pub fn with_logger(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub(crate) fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.logger.log(level, message.as_ref());
    }
}
