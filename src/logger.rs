//! Query logging: timing each driver call and reporting it through a [`Logger`].

use crate::args::UnitedArgs;
use crate::error::{Error, Result};
use crate::options::Options;
use crate::value::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;

/// The kind of call being logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Exec,
    QueryOne,
    QueryAll,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Exec => "exec",
            Operation::QueryOne => "query_one",
            Operation::QueryAll => "query_all",
        }
    }
}

/// Call metadata passed alongside each log message.
#[derive(Debug, Clone)]
pub struct LogContext<'a> {
    pub operation: Operation,
    /// Caller supplied label, see [`crate::Db::with_tag`]
    pub tag: Option<&'a str>,
    pub driver: &'static str,
    pub elapsed: Duration,
}

impl<'a> LogContext<'a> {
    pub fn new(operation: Operation, driver: &'static str, tag: Option<&'a str>) -> Self {
        Self {
            operation,
            tag,
            driver,
            elapsed: Duration::ZERO,
        }
    }
}

/// Sink for query log lines.
pub trait Logger: Send + Sync {
    /// A successful call that was slow, or any success when success logging is on.
    fn log_query(&self, ctx: &LogContext<'_>, msg: &str);

    /// A failed call. Always reported.
    fn log_query_err(&self, ctx: &LogContext<'_>, msg: &str);
}

/// Formats one log line from the query, its arguments, the outcome and the
/// elapsed milliseconds.
pub type LogFormatter =
    Arc<dyn Fn(&str, &UnitedArgs, Option<&Error>, u128) -> String + Send + Sync>;

/// `"{sql} {elapsed}ms"`
pub fn default_log_formatter(sql: &str, _args: &UnitedArgs, _err: Option<&Error>, elapsed_ms: u128) -> String {
    format!("{sql} {elapsed_ms}ms")
}

/// A [`Logger`] emitting `tracing` events on the `sqlx_rowmap::sql` target.
#[derive(Debug, Clone)]
pub struct TracingLogger {
    /// Level for successful calls; failures are always `ERROR`.
    pub level: Level,
}

impl Default for TracingLogger {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl TracingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

impl Logger for TracingLogger {
    fn log_query(&self, ctx: &LogContext<'_>, msg: &str) {
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN => tracing::warn!($($field)*),
                    Level::INFO => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let tag = ctx.tag.unwrap_or("-");
        emit_at_level!(
            self.level,
            target: "sqlx_rowmap::sql",
            operation = ctx.operation.as_str(),
            tag,
            driver = ctx.driver,
            elapsed_ms = ctx.elapsed.as_millis() as u64,
            "{msg}"
        );
    }

    fn log_query_err(&self, ctx: &LogContext<'_>, msg: &str) {
        tracing::error!(
            target: "sqlx_rowmap::sql",
            operation = ctx.operation.as_str(),
            tag = ctx.tag.unwrap_or("-"),
            driver = ctx.driver,
            elapsed_ms = ctx.elapsed.as_millis() as u64,
            "{msg}"
        );
    }
}

/// Runs `call`, timing it and logging according to `opts`.
///
/// Failures are always logged. Successes are logged when `log_success` is on
/// or the call took at least the slow threshold. With `log_bound` the message
/// shows the bound text and positional arguments instead of the raw query.
pub async fn log_do<R, Fut>(
    mut ctx: LogContext<'_>,
    query: &str,
    united: &UnitedArgs,
    bound_sql: &str,
    bound_args: &[Value],
    opts: &Options,
    call: Fut,
) -> Result<R>
where
    Fut: Future<Output = Result<R>>,
{
    let Some(logger) = opts.logger.as_deref() else {
        return call.await;
    };

    let started = Instant::now();
    let res = call.await;
    ctx.elapsed = started.elapsed();
    let elapsed_ms = ctx.elapsed.as_millis();

    let format = |err: Option<&Error>| {
        let bound_united;
        let (sql, args) = if opts.log_bound {
            bound_united = UnitedArgs {
                unnamed: bound_args.to_vec(),
                ..Default::default()
            };
            (bound_sql, &bound_united)
        } else {
            (query, united)
        };
        match &opts.log_formatter {
            Some(formatter) => formatter(sql, args, err, elapsed_ms),
            None => default_log_formatter(sql, args, err, elapsed_ms),
        }
    };

    match &res {
        Err(err) => logger.log_query_err(&ctx, &format(Some(err))),
        Ok(_) if opts.log_success || ctx.elapsed >= opts.slow_threshold() => {
            logger.log_query(&ctx, &format(None))
        }
        Ok(_) => {}
    }
    res
}
