//! Per-connection configuration, threaded explicitly through every call.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::logger::{LogFormatter, Logger, TracingLogger};
use crate::mapper::Mapper;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Slow-query threshold used when none is configured.
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(3000);

/// A per-call override of [`Options`], supplied through [`crate::Arg::options`].
pub type OptionsModifier = Arc<dyn Fn(&mut Options) + Send + Sync>;

/// Resolves the column name a struct field is matched against when it has
/// no explicit column tag.
pub trait NameResolver: Send + Sync {
    fn resolve_column_name(&self, struct_name: &str, field_name: &str) -> String;
}

/// Uses the field name as the column name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNameResolver;

impl NameResolver for DefaultNameResolver {
    fn resolve_column_name(&self, _struct_name: &str, field_name: &str) -> String {
        field_name.to_owned()
    }
}

/// Configuration carried by a [`crate::Db`] handle.
///
/// Every query copies these options and applies the call's overrides to the
/// copy, so overrides never leak into later calls.
#[derive(Clone)]
pub struct Options {
    /// Dialect, picked from the driver name when `None`.
    pub dialect: Option<Arc<dyn Dialect>>,
    /// Row mapping strategy, [`crate::mapper::default_mapper`] when `None`.
    pub mapper: Option<Mapper>,
    pub name_resolver: Option<Arc<dyn NameResolver>>,
    /// Charset used to decode text columns (`""` means UTF-8).
    pub text_charset: String,

    /// Logging hook, `None` disables query logging.
    pub logger: Option<Arc<dyn Logger>>,
    pub log_formatter: Option<LogFormatter>,
    /// Log the bound text and positional arguments instead of the raw query.
    pub log_bound: bool,
    /// Log every successful call, not only slow ones.
    pub log_success: bool,
    pub log_slow_threshold: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            dialect: None,
            mapper: None,
            name_resolver: None,
            text_charset: String::new(),
            logger: Some(Arc::new(TracingLogger::default())),
            log_formatter: None,
            log_bound: false,
            log_success: false,
            log_slow_threshold: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("dialect", &self.dialect)
            .field("mapper", &self.mapper.as_ref().map(|_| "custom"))
            .field("text_charset", &self.text_charset)
            .field("logger", &self.logger.is_some())
            .field("log_bound", &self.log_bound)
            .field("log_success", &self.log_success)
            .field("log_slow_threshold", &self.log_slow_threshold)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Create options with defaults (tracing logger, UTF-8 text, 3s slow threshold).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn with_mapper(mut self, mapper: Mapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn with_name_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.name_resolver = Some(resolver);
        self
    }

    pub fn with_text_charset(mut self, charset: impl Into<String>) -> Self {
        self.text_charset = charset.into();
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Turn query logging off.
    pub fn without_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    pub fn with_log_formatter(mut self, formatter: LogFormatter) -> Self {
        self.log_formatter = Some(formatter);
        self
    }

    pub fn log_bound(mut self, enabled: bool) -> Self {
        self.log_bound = enabled;
        self
    }

    pub fn log_success(mut self, enabled: bool) -> Self {
        self.log_success = enabled;
        self
    }

    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.log_slow_threshold = Some(threshold);
        self
    }

    /// The configured dialect.
    pub fn dialect(&self) -> Result<&dyn Dialect> {
        self.dialect
            .as_deref()
            .ok_or_else(|| Error::UnsupportedBackend("no dialect configured".into()))
    }

    pub fn name_resolver(&self) -> &dyn NameResolver {
        match &self.name_resolver {
            Some(resolver) => resolver.as_ref(),
            None => &DefaultNameResolver,
        }
    }

    /// Zero or unset thresholds fall back to [`DEFAULT_SLOW_THRESHOLD`].
    pub fn slow_threshold(&self) -> Duration {
        match self.log_slow_threshold {
            Some(t) if !t.is_zero() => t,
            _ => DEFAULT_SLOW_THRESHOLD,
        }
    }

    /// A copy of these options with `modifier` applied.
    pub fn modified(&self, modifier: Option<&OptionsModifier>) -> Options {
        let mut opts = self.clone();
        if let Some(modifier) = modifier {
            modifier(&mut opts);
        }
        opts
    }
}
