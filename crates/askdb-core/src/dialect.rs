use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported SQL dialects. Closed set: each variant has its own catalog
/// query set in the introspection crate and its own rule block in the
/// prompt builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    Sqlite,
    Postgres,
    Mysql,
}

impl Dialect {
    /// Parse a user-supplied dialect tag. Accepts common aliases.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "mysql" | "mariadb" => Ok(Dialect::Mysql),
            other => Err(Error::UnsupportedDialect(format!(
                "'{other}' (supported: sqlite, postgres, mysql)"
            ))),
        }
    }

    /// Infer the dialect from a connection string scheme, if present.
    pub fn from_connection_string(conn: &str) -> Option<Self> {
        if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else if conn.starts_with("mysql://") || conn.starts_with("mariadb://") {
            Some(Dialect::Mysql)
        } else if conn.starts_with("sqlite:") || conn.ends_with(".db") || conn.ends_with(".sqlite")
        {
            Some(Dialect::Sqlite)
        } else {
            None
        }
    }

    /// Canonical name used in logs, prompts, and artifacts.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::Mysql => "mysql",
        }
    }

    /// Quote an identifier for interpolation into a catalog query.
    ///
    /// Table names come from the catalog itself, but they still pass
    /// through here so an adversarial name cannot break out of the
    /// quoted position.
    pub fn quote_ident(&self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite | Dialect::Postgres => {
                format!("\"{}\"", ident.replace('"', "\"\""))
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!(Dialect::parse("PostgreSQL").unwrap(), Dialect::Postgres);
        assert_eq!(Dialect::parse(" sqlite3 ").unwrap(), Dialect::Sqlite);
        assert_eq!(Dialect::parse("mariadb").unwrap(), Dialect::Mysql);
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = Dialect::parse("oracle").unwrap_err();
        assert_eq!(err.kind(), "unsupported_dialect");
    }

    #[test]
    fn infers_from_connection_string() {
        assert_eq!(
            Dialect::from_connection_string("postgres://u@h/db"),
            Some(Dialect::Postgres)
        );
        assert_eq!(
            Dialect::from_connection_string("./sample.db"),
            Some(Dialect::Sqlite)
        );
        assert_eq!(Dialect::from_connection_string("odbc://x"), None);
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(Dialect::Sqlite.quote_ident("or\"ders"), "\"or\"\"ders\"");
        assert_eq!(Dialect::Mysql.quote_ident("or`ders"), "`or``ders`");
    }
}
