use crate::args::{unite, Arg};
use crate::db::{bind_with, Db};
use crate::driver::{Driver, ExecResult};
use crate::error::Result;
use crate::logger::{log_do, Operation};

impl<D: Driver> Db<D> {
    /// Executes a statement that returns no rows.
    ///
    /// The SQL can contain named placeholders (`:name`), resolved against the
    /// unified `args`. An [`Arg::options`] entry overrides this handle's
    /// options for this call only.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Bind`] or [`crate::Error::UnboundPlaceholder`]
    /// if the query cannot be bound (the driver is not called), or the
    /// driver's error.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sqlx_rowmap::{args, named, Db, Options};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = Db::open("mysql", "mysql://localhost/test", Options::new()).await?;
    ///
    /// let res = db
    ///     .exec(
    ///         "INSERT INTO users (user_id, name) VALUES (:user_id, :name)",
    ///         args![named("user_id", 42), named("name", "John Doe")],
    ///     )
    ///     .await?;
    /// println!("Inserted {} rows, id {}", res.rows_affected, res.last_insert_id);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn exec(&self, sql: &str, args: impl IntoIterator<Item = Arg>) -> Result<ExecResult> {
        let (united, modifier) = unite(args);
        let opts = self.shared_options().modified(modifier.as_ref());
        let bound = bind_with(&opts, sql, &united)?;

        log_do(
            self.log_context(Operation::Exec),
            sql,
            &united,
            &bound.sql,
            &bound.args,
            &opts,
            self.driver().execute(&bound.sql, &bound.args),
        )
        .await
    }
}
