//! The [`Db`] handle: a driver plus the options every call runs with.

use crate::args::UnitedArgs;
use crate::dialect::{dialect_of, Dialect};
use crate::driver::{Driver, MySqlTx};
use crate::error::{Error, Result};
use crate::logger::{LogContext, Operation};
use crate::options::Options;
use crate::value::Value;
use sqlx::MySqlPool;
use std::sync::Arc;

/// A query rewritten into the backend's bind syntax with its positional
/// arguments in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub sql: String,
    pub args: Vec<Value>,
}

/// A database handle over any [`Driver`]: a pool, a transaction, or a test
/// double.
///
/// Queries take `:name` placeholders and a list of [`crate::Arg`]s; see
/// [`Db::exec`], [`Db::query_one`] and [`Db::query_all`].
pub struct Db<D: Driver> {
    driver: D,
    options: Arc<Options>,
    tag: Option<String>,
}

impl<D: Driver> std::fmt::Debug for Db<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("driver", &self.driver.driver_name())
            .field("options", &self.options)
            .field("tag", &self.tag)
            .finish()
    }
}

impl<D: Driver> Db<D> {
    /// Wraps `driver`, picking the dialect from its name unless `options`
    /// already sets one.
    pub fn new(driver: D, mut options: Options) -> Result<Self> {
        if options.dialect.is_none() {
            let name = driver.driver_name();
            let dialect = dialect_of(name).ok_or_else(|| Error::UnsupportedBackend(name.to_owned()))?;
            options.dialect = Some(dialect);
        }
        Ok(Self {
            driver,
            options: Arc::new(options),
            tag: None,
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn dialect(&self) -> Result<&dyn Dialect> {
        self.options.dialect()
    }

    /// Labels every log line of this handle with `tag`.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Quotes an identifier for this backend.
    pub fn quote(&self, ident: &str) -> Result<String> {
        Ok(self.dialect()?.quote(ident, &self.options))
    }

    /// Compiles `sql` and resolves every placeholder against `args`.
    ///
    /// Without named placeholders the positional arguments are passed through
    /// as they are. Otherwise each name is looked up among the named
    /// arguments, then read as a 1-based index into the positional ones.
    ///
    /// ```
    /// # use sqlx_rowmap::{args, named, unite, Db};
    /// # fn demo<D: sqlx_rowmap::Driver>(db: &Db<D>) -> sqlx_rowmap::Result<()> {
    /// let (united, _) = unite(args!["a", named("id", 7)]);
    /// let bound = db.bind("SELECT * FROM t WHERE id = :id OR name = :1", &united)?;
    /// assert_eq!(bound.sql, "SELECT * FROM t WHERE id = ? OR name = ?");
    /// # Ok(())
    /// # }
    /// ```
    pub fn bind(&self, sql: &str, args: &UnitedArgs) -> Result<BoundQuery> {
        bind_with(&self.options, sql, args)
    }

    pub(crate) fn shared_options(&self) -> &Arc<Options> {
        &self.options
    }

    pub(crate) fn log_context(&self, operation: Operation) -> LogContext<'_> {
        LogContext::new(operation, self.driver.driver_name(), self.tag.as_deref())
    }

    /// Closes the underlying driver.
    pub async fn close(&self) -> Result<()> {
        self.driver.close().await
    }
}

pub(crate) fn bind_with(opts: &Options, sql: &str, args: &UnitedArgs) -> Result<BoundQuery> {
    let compiled = opts.dialect()?.compile_named_query(sql, opts)?;
    if compiled.param_names.is_empty() {
        return Ok(BoundQuery {
            sql: compiled.text,
            args: args.unnamed.clone(),
        });
    }
    let values = compiled
        .param_names
        .iter()
        .map(|name| lookup(name, args))
        .collect::<Result<Vec<_>>>()?;
    Ok(BoundQuery {
        sql: compiled.text,
        args: values,
    })
}

fn lookup(name: &str, args: &UnitedArgs) -> Result<Value> {
    if let Some(v) = args.named.get(name) {
        return Ok(v.clone());
    }
    name.parse::<usize>()
        .ok()
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| args.unnamed.get(i))
        .cloned()
        .ok_or_else(|| Error::UnboundPlaceholder(name.to_owned()))
}

impl Db<MySqlPool> {
    /// Connects a pool for `driver_name` at `url`.
    pub async fn open(driver_name: &str, url: &str, options: Options) -> Result<Self> {
        if driver_name != "mysql" {
            return Err(Error::UnsupportedBackend(driver_name.to_owned()));
        }
        let pool = MySqlPool::connect(url).await?;
        tracing::debug!(target: "sqlx_rowmap::db", driver = driver_name, "connected");
        Db::new(pool, options)
    }

    /// Starts a transaction carrying this handle's options and tag.
    pub async fn begin(&self) -> Result<Db<MySqlTx>> {
        let tx = MySqlTx::begin(&self.driver).await?;
        Ok(Db {
            driver: tx,
            options: self.options.clone(),
            tag: self.tag.clone(),
        })
    }
}

impl Db<MySqlTx> {
    pub async fn commit(self) -> Result<()> {
        self.driver.commit().await
    }

    pub async fn rollback(self) -> Result<()> {
        self.driver.rollback().await
    }
}
