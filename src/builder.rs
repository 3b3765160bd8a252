use crate::error::{Error, Result};

/// Placeholder syntax a backend understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindStyle {
    /// `?` (MySQL, SQLite)
    #[default]
    Question,
    /// `$1`, `$2`, ... (PostgreSQL)
    Dollar,
    /// `@p1`, `@p2`, ... (SQL Server)
    At,
    /// `:name`, passed through unchanged (Oracle)
    Named,
}

/// A query rewritten into a backend's bind syntax.
///
/// `param_names` holds one entry per emitted placeholder, in emission order.
/// A name used twice appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub text: String,
    pub param_names: Vec<String>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

/// Rewrites named placeholders (`:name`) into the placeholders of `style`.
///
/// - `::` is an escape for a literal `:` (keeps `x::int` casts intact).
/// - `:=` is passed through as an operator.
/// - A name runs over Unicode letters and digits, `_` and `.`; end of input closes it.
/// - A `:` inside a name, or a `:` that captures nothing, is an error.
///
/// # Examples
///
/// ```
/// use sqlx_rowmap::builder::{compile_named_query, BindStyle};
///
/// let q = compile_named_query("SELECT * FROM users WHERE id = :id AND age > :age", BindStyle::Dollar)?;
/// assert_eq!(q.text, "SELECT * FROM users WHERE id = $1 AND age > $2");
/// assert_eq!(q.param_names, vec!["id", "age"]);
/// # Ok::<(), sqlx_rowmap::Error>(())
/// ```
pub fn compile_named_query(template: &str, style: BindStyle) -> Result<CompiledQuery> {
    let mut text = String::with_capacity(template.len());
    let mut param_names = Vec::new();
    let mut name = String::new();
    // byte offset of the `:` that opened the current name
    let mut name_start: Option<usize> = None;
    let mut counter = 1usize;

    for (i, c) in template.char_indices() {
        let Some(start) = name_start else {
            if c == ':' {
                name_start = Some(i);
                name.clear();
            } else {
                text.push(c);
            }
            continue;
        };

        if c == ':' {
            if name.is_empty() {
                text.push(':');
                name_start = None;
                continue;
            }
            return Err(Error::Bind(format!(
                "unexpected `:` while reading named param at {i}"
            )));
        }
        if c == '=' && name.is_empty() {
            text.push_str(":=");
            name_start = None;
            continue;
        }
        if is_name_char(c) {
            name.push(c);
            continue;
        }

        emit_placeholder(&mut text, &mut param_names, &name, start, style, &mut counter)?;
        name_start = None;
        text.push(c);
    }

    if let Some(start) = name_start {
        emit_placeholder(&mut text, &mut param_names, &name, start, style, &mut counter)?;
    }

    Ok(CompiledQuery { text, param_names })
}

fn emit_placeholder(
    text: &mut String,
    names: &mut Vec<String>,
    name: &str,
    start: usize,
    style: BindStyle,
    counter: &mut usize,
) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Bind(format!("empty named param at {start}")));
    }
    match style {
        BindStyle::Question => text.push('?'),
        BindStyle::Dollar => {
            text.push('$');
            text.push_str(&counter.to_string());
            *counter += 1;
        }
        BindStyle::At => {
            text.push_str("@p");
            text.push_str(&counter.to_string());
            *counter += 1;
        }
        BindStyle::Named => {
            text.push(':');
            text.push_str(name);
        }
    }
    names.push(name.to_owned());
    Ok(())
}

/// Converts named placeholders (`:name`) to positional placeholders (`?`) for MySQL.
///
/// # Examples
///
/// ```
/// use sqlx_rowmap::builder::build_query;
///
/// let sql = build_query("SELECT * FROM users WHERE id = :id AND name = :name")?;
/// assert_eq!(sql, "SELECT * FROM users WHERE id = ? AND name = ?");
/// # Ok::<(), sqlx_rowmap::Error>(())
/// ```
pub fn build_query(template: &str) -> crate::Result<String> {
    compile_named_query(template, BindStyle::Question).map(|q| q.text)
}
