//! # sqlx-rowmap
//!
//! Named parameter binding and reflection-free row mapping on top of SQLx.
//!
//! ## Features
//!
//! - **Named Placeholders**: Write `:param_name` in SQL; the dialect rewrites them into
//!   its own bind syntax (`?`, `$1`, `@p1`) and resolves them against the call's arguments
//! - **Flexible Arguments**: Mix positional values, [`named`] values, maps and per-call
//!   option overrides in one [`args!`] list
//! - **Row Mapping**: Map rows into records, `Option`/`Box` records, string-keyed maps,
//!   scalars or `Vec`s of scalars through one [`Target`] trait
//! - **Derive**: `#[derive(Record)]` with `#[rowmap(col, cols, embed, skip)]` field attributes
//! - **Schema Cache**: Record layouts (including embedded records) are analysed once per type
//! - **Checked Coercion**: Driver values are converted into the requested types by the
//!   [`Dialect`], with range checks and column-named errors
//! - **Query Logging**: Slow and failed queries are reported through `tracing`
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sqlx = { version = "0.8", features = ["mysql", "runtime-tokio"] }
//! sqlx-rowmap = "0.1"
//! ```
//!
//! ## Examples
//!
//! ### Executing a Statement
//!
//! ```rust,no_run
//! use sqlx_rowmap::{args, named, Db, Options};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Db::open("mysql", "mysql://localhost/test", Options::new()).await?;
//!
//! let res = db
//!     .exec(
//!         "INSERT INTO users (id, name) VALUES (:id, :name)",
//!         args![named("id", 42), named("name", "John Doe")],
//!     )
//!     .await?;
//! println!("Inserted {} rows", res.rows_affected);
//! # Ok(())
//! # }
//! ```
//!
//! ### Mapping Rows into Records
//!
//! ```rust,no_run
//! use sqlx_rowmap::{args, named, Db, Options, Record, Result};
//!
//! #[derive(Debug, Default, Record)]
//! struct User {
//!     #[rowmap(col = "user_id")]
//!     id: i64,
//!     #[rowmap(cols = "login, username")]
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! # async fn example() -> Result<()> {
//! # let db = Db::open("mysql", "mysql://localhost/test", Options::new()).await?;
//! let mut users: Vec<User> = Vec::new();
//! db.query_all(&mut users, "SELECT * FROM users WHERE age >= :min_age", args![named("min_age", 18)])
//!     .await?;
//!
//! let mut user: Option<User> = None;
//! match db.query_one(&mut user, "SELECT * FROM users WHERE id = ?", args![42]).await {
//!     Ok(()) => println!("Found user: {:?}", user),
//!     Err(e) if e.is_no_rows() => println!("User not found"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Using with Transactions
//!
//! ```rust,no_run
//! use sqlx_rowmap::{args, named, Db, Options};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let db = Db::open("mysql", "mysql://localhost/test", Options::new()).await?;
//! let tx = db.begin().await?;
//!
//! tx.exec(
//!     "UPDATE accounts SET balance = balance - :amount WHERE id = :from_id",
//!     args![named("amount", 100), named("from_id", 1)],
//! )
//! .await?;
//! tx.exec(
//!     "UPDATE accounts SET balance = balance + :amount WHERE id = :to_id",
//!     args![named("amount", 100), named("to_id", 2)],
//! )
//! .await?;
//!
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## How It Works
//!
//! 1. **Unite**: All arguments of a call are merged into one positional list and one
//!    name-keyed map; later names win
//! 2. **Bind**: The dialect compiles `:name` placeholders into its bind syntax and the
//!    names are resolved against the united arguments
//! 3. **Map**: Each row is scanned into dialect-chosen cells, coerced into the types the
//!    destination declares and stored by shape
//!
//! ## Limitations
//!
//! - Currently only MySQL has a driver and dialect
//! - Placeholder names are Unicode letters, digits, `_` and `.`; write `::` for a
//!   literal `:`
//! - Result sets are read fully into memory before rows are mapped
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license at your option.

extern crate self as sqlx_rowmap;

pub mod args;
pub mod builder;
pub mod db;
pub mod dest;
pub mod dialect;
pub mod driver;
pub mod error;
pub mod logger;
pub mod mapper;
pub mod options;
pub mod query;
pub mod query_as;
pub mod schema;
pub mod value;

#[cfg(test)]
mod mock;

pub use args::{named, unite, Arg, NamedArg, NamedArgs, UnitedArgs};
pub use builder::{compile_named_query, BindStyle, CompiledQuery};
pub use db::{BoundQuery, Db};
pub use dest::{Dest, Shape, Target};
pub use dialect::{Dialect, MySqlDialect, QuoteStyle};
pub use driver::{ColumnType, Cursor, Driver, ExecResult, MySqlTx, ScanCell, ScanKind};
pub use error::{Error, Result};
pub use logger::{LogContext, LogFormatter, Logger, Operation, TracingLogger};
pub use mapper::{Mapper, Src};
pub use options::{DefaultNameResolver, NameResolver, Options, OptionsModifier};
pub use schema::{schema_of, FieldDef, Record};
pub use value::{FromValue, Value, ValueType};

/// Convenience re-exports for common use cases
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::schema::{assign_field, unknown_field, FieldDef, Record};
    pub use crate::{args, impl_target, named, Arg, Db, Options, Target, Value};
}
