use crate::args::{unite, Arg};
use crate::db::{bind_with, Db};
use crate::dest::Target;
use crate::driver::{Cursor, Driver};
use crate::error::Result;
use crate::logger::{log_do, Operation};
use crate::mapper::{map_all, map_one, visit_all, visit_one};
use crate::options::Options;

impl<D: Driver> Db<D> {
    /// Runs a query and maps its first row into `dest`.
    ///
    /// `dest` can be a registered record, an `Option` or `Box` of one, a
    /// string-keyed map, a scalar (first column) or a `Vec` of scalars (the
    /// row as a sequence). Extra rows are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NoRows`] if the query matched nothing, a
    /// [`crate::Error::CoerceDest`] naming the column that did not fit, or the
    /// driver's error.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sqlx_rowmap::{args, named, Db, Options};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let db = Db::open("mysql", "mysql://localhost/test", Options::new()).await?;
    /// let mut name = String::new();
    /// db.query_one(&mut name, "SELECT name FROM users WHERE id = :id", args![named("id", 42)])
    ///     .await?;
    ///
    /// let mut count: i64 = 0;
    /// db.query_one(&mut count, "SELECT COUNT(*) FROM users", args![]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query_one(
        &self,
        dest: &mut dyn Target,
        sql: &str,
        args: impl IntoIterator<Item = Arg>,
    ) -> Result<()> {
        let (mut cursor, opts) = self.open_cursor(Operation::QueryOne, sql, args).await?;
        let res = map_one(cursor.as_mut(), dest, &opts).await;
        finish(cursor, res).await
    }

    /// Runs a query and appends one element per row to `dest`.
    ///
    /// Rows are mapped into fresh `E::default()` values. On error `dest` is
    /// left as it was; zero rows is not an error.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use sqlx_rowmap::{args, named, Db, Options, Value};
    /// use std::collections::HashMap;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let db = Db::open("mysql", "mysql://localhost/test", Options::new()).await?;
    /// let mut rows: Vec<HashMap<String, Value>> = Vec::new();
    /// db.query_all(&mut rows, "SELECT * FROM users WHERE age >= :min_age", args![named("min_age", 18)])
    ///     .await?;
    /// println!("Found {} users", rows.len());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn query_all<E>(
        &self,
        dest: &mut Vec<E>,
        sql: &str,
        args: impl IntoIterator<Item = Arg>,
    ) -> Result<()>
    where
        E: Target + Default,
    {
        let (mut cursor, opts) = self.open_cursor(Operation::QueryAll, sql, args).await?;
        let res = map_all(cursor.as_mut(), dest, &opts).await;
        finish(cursor, res).await
    }

    /// Runs a query and hands the cursor, positioned on the first row, to `f`.
    pub async fn query_one_with<F>(&self, f: F, sql: &str, args: impl IntoIterator<Item = Arg>) -> Result<()>
    where
        F: FnMut(&mut dyn Cursor) -> Result<()> + Send,
    {
        let (mut cursor, _opts) = self.open_cursor(Operation::QueryOne, sql, args).await?;
        let res = visit_one(cursor.as_mut(), f).await;
        finish(cursor, res).await
    }

    /// Runs a query and hands the cursor to `f` once per row.
    pub async fn query_all_with<F>(&self, f: F, sql: &str, args: impl IntoIterator<Item = Arg>) -> Result<()>
    where
        F: FnMut(&mut dyn Cursor) -> Result<()> + Send,
    {
        let (mut cursor, _opts) = self.open_cursor(Operation::QueryAll, sql, args).await?;
        let res = visit_all(cursor.as_mut(), f).await;
        finish(cursor, res).await
    }

    async fn open_cursor(
        &self,
        operation: Operation,
        sql: &str,
        args: impl IntoIterator<Item = Arg>,
    ) -> Result<(Box<dyn Cursor>, Options)> {
        let (united, modifier) = unite(args);
        let opts = self.shared_options().modified(modifier.as_ref());
        let bound = bind_with(&opts, sql, &united)?;

        let cursor = log_do(
            self.log_context(operation),
            sql,
            &united,
            &bound.sql,
            &bound.args,
            &opts,
            self.driver().query(&bound.sql, &bound.args),
        )
        .await?;
        Ok((cursor, opts))
    }
}

/// Closes `cursor` whatever the outcome; a mapping error wins over a close error.
async fn finish(mut cursor: Box<dyn Cursor>, res: Result<()>) -> Result<()> {
    let closed = cursor.close().await;
    res.and(closed)
}

#[cfg(test)]
mod tests {
    use crate::args::named;
    use crate::logger::tests::RecordingLogger;
    use crate::mock::{MockDriver, MockSet};
    use crate::schema::Record;
    use crate::mapper::Src;
    use crate::{args, Arg, Cursor, Db, Dest, Error, Mapper, Options, Result, Value};
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Debug, Default, PartialEq, Record)]
    struct Timestamps {
        created_at: Option<NaiveDate>,
    }

    #[derive(Debug, Default, PartialEq, Record)]
    struct User {
        #[rowmap(col = "user_id")]
        id: u32,
        name: String,
        active: bool,
        #[rowmap(embed)]
        stamps: Timestamps,
    }

    fn user_rows() -> Vec<MockSet> {
        vec![MockSet::new(
            &[
                ("user_id", "INT"),
                ("Name", "VARCHAR"),
                ("active", "TINYINT"),
                ("created_at", "DATE"),
            ],
            vec![
                vec![
                    Value::Int(1),
                    Value::Bytes(b"alice".to_vec()),
                    Value::Int(1),
                    Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()),
                ],
                vec![
                    Value::Int(2),
                    Value::Bytes(b"bob".to_vec()),
                    Value::Int(0),
                    Value::Null,
                ],
            ],
        )]
    }

    fn db(driver: MockDriver) -> Db<MockDriver> {
        Db::new(driver, Options::new().without_logger()).unwrap()
    }

    #[tokio::test]
    async fn test_query_one_struct() {
        let db = db(MockDriver::new().with_result(user_rows()));
        let mut user = User::default();
        db.query_one(&mut user, "SELECT * FROM users WHERE id = :id", args![named("id", 1)])
            .await
            .unwrap();
        assert_eq!(
            user,
            User {
                id: 1,
                name: "alice".into(),
                active: true,
                stamps: Timestamps {
                    created_at: NaiveDate::from_ymd_opt(2024, 1, 2),
                },
            }
        );
        assert_eq!(db.driver().calls()[0].0, "SELECT * FROM users WHERE id = ?");
        assert_eq!(db.driver().cursors_closed(), 1);
    }

    #[tokio::test]
    async fn test_query_one_no_rows_closes_cursor() {
        let db = db(MockDriver::new().with_result(vec![MockSet::new(&[("id", "INT")], vec![])]));
        let mut id: Option<i64> = None;
        let err = db.query_one(&mut id, "SELECT id FROM t", args![]).await.unwrap_err();
        assert!(err.is_no_rows());
        assert_eq!(db.driver().cursors_closed(), 1);
    }

    #[tokio::test]
    async fn test_query_one_no_rows_keeps_option_empty() {
        let db = db(MockDriver::new().with_result(vec![MockSet::new(&[("user_id", "INT")], vec![])]));
        let mut user: Option<User> = None;
        let err = db
            .query_one(&mut user, "SELECT * FROM users WHERE id = ?", args![9])
            .await
            .unwrap_err();
        assert!(err.is_no_rows());
        assert!(user.is_none());
        assert_eq!(db.driver().cursors_closed(), 1);
    }

    #[tokio::test]
    async fn test_query_one_fills_option_record() {
        let db = db(MockDriver::new().with_result(user_rows()));
        let mut user: Option<User> = None;
        db.query_one(&mut user, "SELECT * FROM users", args![]).await.unwrap();
        let user = user.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "alice");
    }

    #[tokio::test]
    async fn test_query_all_appends_structs() {
        let db = db(MockDriver::new().with_result(user_rows()));
        let mut users: Vec<Box<User>> = vec![Box::default()];
        db.query_all(&mut users, "SELECT * FROM users", args![]).await.unwrap();
        assert_eq!(users.len(), 3);
        assert_eq!(users[2].name, "bob");
        assert!(!users[2].active);
        assert_eq!(users[2].stamps.created_at, None);
    }

    #[tokio::test]
    async fn test_query_all_maps_and_scalars() {
        let db = db(MockDriver::new()
            .with_result(user_rows())
            .with_result(user_rows()));

        let mut rows: Vec<HashMap<String, Value>> = Vec::new();
        db.query_all(&mut rows, "SELECT * FROM users", args![]).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Name"], Value::Text("alice".into()));
        assert_eq!(rows[1]["created_at"], Value::Null);

        let mut ids: Vec<u8> = Vec::new();
        db.query_all(&mut ids, "SELECT * FROM users", args![]).await.unwrap();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_query_all_error_leaves_destination() {
        let db = db(MockDriver::new().with_result(vec![MockSet::new(
            &[("name", "VARCHAR")],
            vec![vec![Value::Bytes(b"a".to_vec())], vec![Value::Null]],
        )]));
        let mut names: Vec<String> = vec!["kept".into()];
        let err = db.query_all(&mut names, "SELECT name FROM t", args![]).await.unwrap_err();
        assert!(matches!(err, Error::CoerceDest { ref column, .. } if column == "name"));
        assert_eq!(names, vec!["kept".to_string()]);
        assert_eq!(db.driver().cursors_closed(), 1);
    }

    #[tokio::test]
    async fn test_iteration_error_is_surfaced() {
        let db = db(MockDriver::new()
            .with_result(user_rows())
            .with_iteration_error("lost connection"));
        let mut users: Vec<User> = Vec::new();
        let err = db.query_all(&mut users, "SELECT * FROM users", args![]).await.unwrap_err();
        assert!(matches!(err, Error::Driver(ref m) if m == "lost connection"));
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_raw_cursor_callbacks() {
        let db = db(MockDriver::new()
            .with_result(user_rows())
            .with_result(user_rows())
            .with_result(vec![]));

        let mut rows = 0;
        db.query_all_with(
            |cursor: &mut dyn Cursor| {
                assert_eq!(cursor.columns()?.len(), 4);
                rows += 1;
                Ok(())
            },
            "SELECT * FROM users",
            args![],
        )
        .await
        .unwrap();
        assert_eq!(rows, 2);

        let mut first = 0;
        db.query_one_with(
            |_cursor: &mut dyn Cursor| {
                first += 1;
                Ok(())
            },
            "SELECT * FROM users",
            args![],
        )
        .await
        .unwrap();
        assert_eq!(first, 1);

        let err = db
            .query_one_with(|_cursor: &mut dyn Cursor| Ok(()), "SELECT 1", args![])
            .await
            .unwrap_err();
        assert!(err.is_no_rows());
        assert_eq!(db.driver().cursors_closed(), 3);
    }

    #[tokio::test]
    async fn test_per_call_mapper_override() {
        let db = db(MockDriver::new().with_result(user_rows()));
        let mapper: Mapper = Arc::new(|_src: &mut Src<'_>, dest: &mut Dest<'_>, _opts: &Options| match dest {
            Dest::Primitive(slot) => slot.put(Value::Int(99)),
            _ => Err(Error::invalid_dest("expected primitive")),
        });
        let mut out: Vec<i64> = Vec::new();
        db.query_all(
            &mut out,
            "SELECT * FROM users",
            args![Arg::options(move |o| o.mapper = Some(mapper.clone()))],
        )
        .await
        .unwrap();
        assert_eq!(out, vec![99, 99]);
        assert!(db.options().mapper.is_none());
    }

    #[tokio::test]
    async fn test_query_is_logged_with_tag() {
        let logger = Arc::new(RecordingLogger::default());
        let db = Db::new(
            MockDriver::new().with_result(user_rows()),
            Options::new().with_logger(logger.clone()).log_success(true),
        )
        .unwrap()
        .with_tag("users");
        let mut n = 0i64;
        db.query_one(&mut n, "SELECT id FROM users", args![]).await.unwrap();
        assert_eq!(n, 1);
        let lines = logger.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].1.starts_with("SELECT id FROM users "));
    }
}
