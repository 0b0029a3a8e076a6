use askdb_core::{Dialect, QueryResult, SchemaDescription};

/// A system/user message pair ready for the completion client.
///
/// Building one is a pure function of its inputs; given the same schema
/// snapshot, dialect, and question, the payload is byte-identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Render a schema snapshot into the compact textual form used both in
/// prompts and in the `connect_db` tool output.
pub fn render_schema(schema: &SchemaDescription) -> String {
    let mut lines = vec![format!("Dialect: {}", schema.dialect)];
    if let Some(database) = &schema.database {
        lines.push(format!("Database: {database}"));
    }
    lines.push(String::new());

    for table in &schema.tables {
        lines.push(format!("Table: {} ({} rows)", table.name, table.row_count));
        for column in &table.columns {
            let nullable = if column.is_nullable { "NULL" } else { "NOT NULL" };
            let pk = if table.primary_key.contains(&column.name) {
                " [PRIMARY KEY]"
            } else {
                ""
            };
            lines.push(format!(
                "  {}: {} {nullable}{pk}",
                column.name, column.declared_type
            ));
        }
        if !table.foreign_keys.is_empty() {
            lines.push("  Foreign keys:".to_string());
            for fk in &table.foreign_keys {
                lines.push(format!(
                    "    {} -> {}.{}",
                    fk.column, fk.referenced_table, fk.referenced_column
                ));
            }
        }
        if !table.sample_rows.is_empty() {
            lines.push("  Sample rows:".to_string());
            for row in &table.sample_rows {
                let cells: Vec<String> = row.iter().map(|value| value.to_string()).collect();
                lines.push(format!("    ({})", cells.join(", ")));
            }
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Dialect quirks the model must respect, stated as explicit rules.
fn dialect_rules(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Sqlite => {
            "- Quote identifiers with double quotes when needed.\n\
             - Use strftime()/date() for date manipulation.\n\
             - String concatenation uses the || operator.\n\
             - Use LIMIT n for row limits."
        }
        Dialect::Postgres => {
            "- Quote identifiers with double quotes when needed; unquoted names fold to lowercase.\n\
             - Use date_trunc()/to_char() for date manipulation and ILIKE for case-insensitive matching.\n\
             - String concatenation uses the || operator.\n\
             - Use LIMIT n for row limits."
        }
        Dialect::Mysql => {
            "- Quote identifiers with backticks when needed.\n\
             - Use DATE_FORMAT()/STR_TO_DATE() for date manipulation.\n\
             - String concatenation uses CONCAT().\n\
             - Use LIMIT n for row limits."
        }
    }
}

/// Prompt that asks for a single read-only SQL statement answering the
/// question.
pub fn sql_prompt(schema_text: &str, dialect: Dialect, question: &str) -> Prompt {
    let system = format!(
        "You are an expert SQL query generator. Convert the user's natural \
         language question into one precise {dialect} query.\n\n\
         DATABASE SCHEMA:\n{schema_text}\n\
         DIALECT RULES:\n{rules}\n\n\
         REQUIREMENTS:\n\
         1. Generate exactly ONE read-only SELECT statement. Never emit INSERT, \
         UPDATE, DELETE, DROP, ALTER, CREATE, TRUNCATE, or any other \
         data-modifying statement.\n\
         2. Use only table and column names that appear in the schema.\n\
         3. Use JOINs when the question spans multiple tables, and aggregate \
         functions (COUNT, SUM, AVG, MIN, MAX) when it asks for totals or \
         averages.\n\
         4. Add ORDER BY when the question implies ranking and LIMIT when it \
         asks for a top N.\n\
         5. Return ONLY the raw SQL with no markdown, no backticks, and no \
         explanation.",
        rules = dialect_rules(dialect),
    );
    Prompt {
        system,
        user: question.to_string(),
    }
}

/// Prompt that asks for a step-by-step plain-English breakdown of a
/// query's clauses.
pub fn explain_prompt(schema_text: &str, sql: &str) -> Prompt {
    let system = format!(
        "You are an expert SQL educator. Explain the given SQL query in plain \
         English, step by step.\n\n\
         DATABASE SCHEMA:\n{schema_text}\n\
         RULES:\n\
         1. Break the query into numbered logical steps, one per clause \
         (SELECT, FROM, JOIN, WHERE, GROUP BY, ORDER BY, LIMIT).\n\
         2. Explain why tables are joined and what any aggregation computes.\n\
         3. Describe the columns the user will see in the output.\n\
         4. Keep it concise and suitable for someone learning SQL, in markdown."
    );
    Prompt {
        system,
        user: format!("Explain this SQL query:\n\n{sql}"),
    }
}

/// Prompt that asks for a chart-type suggestion as strict JSON.
pub fn chart_prompt(question: &str, result: &QueryResult) -> Prompt {
    let preview_rows = result.rows.len().min(10);
    let mut preview = format!("columns: {}\nrows:\n", result.columns.join(", "));
    for row in result.rows.iter().take(preview_rows) {
        let cells: Vec<String> = row.iter().map(|value| value.to_string()).collect();
        preview.push_str(&format!("  {}\n", cells.join(", ")));
    }

    let system = "You are a data visualization expert. Given a question and its \
                  query result, pick the best chart.\n\
                  Respond with ONLY valid JSON, no markdown:\n\
                  {\"chart_type\": \"bar|horizontal_bar|line|pie|doughnut|scatter\", \
                  \"label_field\": \"column\", \"value_fields\": [\"column\"], \
                  \"title\": \"chart title\"}\n\
                  Guidelines: bar for category comparisons, line for time series, \
                  pie/doughnut for proportions with at most 8 slices, scatter for \
                  two numeric columns, horizontal_bar for many or long labels."
        .to_string();

    Prompt {
        system,
        user: format!("Question: {question}\n\nData:\n{preview}"),
    }
}
