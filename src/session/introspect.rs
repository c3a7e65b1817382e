//! Schema introspection shortcuts.
//!
//! Each helper builds a catalog query and runs it through
//! `Session::execute`, so the implicit limit and rendering apply as usual.

use super::Session;
use crate::error::Result;
use crate::render::RenderedOutput;

/// Options for `describe_columns`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnQuery {
    /// Raw `order by` expression.
    pub order_by: Option<String>,
    /// Select every `information_schema.columns` field, not just the type.
    pub full_info: bool,
    /// Extra raw predicate, `and`-ed onto the table filter.
    pub extra_where: Option<String>,
}

/// Quotes `value` as an SQL string literal.
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn describe_table_sql(table: &str) -> String {
    format!(
        "select *
from information_schema.tables
where table_schema = 'public'
  and table_type = 'BASE TABLE'
  and table_name = {}",
        literal(table)
    )
}

pub fn describe_columns_sql(table: &str, query: &ColumnQuery) -> String {
    let columns = if query.full_info {
        "column_name, *"
    } else {
        "column_name, data_type"
    };

    let mut predicates = vec![format!("table_name = {}", literal(table))];
    if let Some(extra) = query.extra_where.as_deref().filter(|s| !s.trim().is_empty()) {
        predicates.push(extra.to_string());
    }

    let mut sql = format!(
        "select {columns}\nfrom information_schema.columns\nwhere {}",
        predicates.join(" and ")
    );
    if let Some(order_by) = query.order_by.as_deref().filter(|s| !s.trim().is_empty()) {
        sql.push_str("\norder by ");
        sql.push_str(order_by);
    }
    sql
}

pub fn describe_foreign_keys_sql(table: &str) -> String {
    format!(
        "select tc.constraint_name, tc.table_name, kcu.column_name,
       ccu.table_name as foreign_table_name,
       ccu.column_name as foreign_column_name
from information_schema.table_constraints as tc
join information_schema.key_column_usage as kcu
  on tc.constraint_name = kcu.constraint_name
join information_schema.constraint_column_usage as ccu
  on ccu.constraint_name = tc.constraint_name
where tc.constraint_type = 'FOREIGN KEY'
  and tc.table_name = {}",
        literal(table)
    )
}

pub fn all_foreign_keys_sql() -> String {
    "select c.conrelid::regclass::text as table_from,
       c.conname::text as conname,
       pg_get_constraintdef(c.oid) as definition
from pg_constraint c
join pg_namespace n on n.oid = c.connamespace
where c.contype = 'f'
  and n.nspname = 'public'
order by c.conrelid::regclass::text, c.contype desc"
        .to_string()
}

pub fn all_tables_sql() -> String {
    "select table_name
from information_schema.tables
where table_schema = 'public'
  and table_type = 'BASE TABLE'
order by table_name"
        .to_string()
}

impl Session {
    /// Shows the `information_schema.tables` row of a public base table.
    pub async fn describe_table(&mut self, table: &str) -> Result<RenderedOutput> {
        self.execute(&describe_table_sql(table)).await
    }

    /// Lists the columns of `table`.
    pub async fn describe_columns(
        &mut self,
        table: &str,
        query: &ColumnQuery,
    ) -> Result<RenderedOutput> {
        self.execute(&describe_columns_sql(table, query)).await
    }

    /// Lists the foreign keys declared on `table`.
    pub async fn describe_foreign_keys(&mut self, table: &str) -> Result<RenderedOutput> {
        self.execute(&describe_foreign_keys_sql(table)).await
    }

    /// Lists every foreign key in the `public` schema.
    pub async fn all_foreign_keys(&mut self) -> Result<RenderedOutput> {
        self.execute(&all_foreign_keys_sql()).await
    }

    /// Lists public base tables by name.
    pub async fn all_tables(&mut self) -> Result<RenderedOutput> {
        self.execute(&all_tables_sql()).await
    }
}
