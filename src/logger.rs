use std::fmt::Write as _;

use crate::value::SqlValue;

/// Log target for statement audit lines, for subscriber filtering.
pub const SQL_LOG_TARGET: &str = "sqlbridge::sql";

/// Per-database statement logger.
///
/// Databases report every statement here before it touches the wire, so
/// a failed statement still leaves a record of what was attempted.
#[derive(Debug, Clone)]
pub struct SqlLogger {
    database: String,
}

impl SqlLogger {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        SqlLogger {
            database: database.into(),
        }
    }

    /// Records one statement with its bound arguments.
    pub fn statement(&self, sql: &str, args: &[SqlValue]) {
        tracing::debug!(
            target: "sqlbridge::sql",
            database = %self.database,
            args = %render_args(args),
            "{sql}"
        );
    }
}

/// Renders bound arguments for the log line. Byte arguments are written
/// raw; everything else uses its display form.
fn render_args(args: &[SqlValue]) -> String {
    let mut out = String::from("[");
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match arg {
            SqlValue::Blob(bytes) => out.push_str(&String::from_utf8_lossy(bytes)),
            other => {
                let _ = write!(out, "{other}");
            }
        }
    }
    out.push(']');
    out
}
