//! Injectable logging sink.
//!
//! The fracture tool never reaches for a global logger directly; it reports
//! through a [`Logger`] it was handed at construction time. The default,
//! [`LogCrateLogger`], forwards everything to the `log` facade so that the
//! host application decides where messages end up.

use log::Level;
use std::fmt::Debug;

/// A sink for diagnostics produced while fracturing.
pub trait Logger: Debug + Send {
    fn log(&self, level: Level, message: &str);

    fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }
}

/// Forwards to the `log` crate under the `shardrs` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrateLogger;

impl Logger for LogCrateLogger {
    fn log(&self, level: Level, message: &str) {
        log::log!(target: "shardrs", level, "{}", message);
    }
}

/// Drops every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _level: Level, _message: &str) {}
}
