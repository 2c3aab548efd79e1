use serde_json::Value;

use super::{QueryBuilder, SqlDialect};
use crate::entity::schema_types::EntitySchema;

/// Query builder that renders plain SQL text with `?` placeholders.
///
/// Joins are always rendered as `INNER JOIN`; the relation compiler has no outer
/// join mode.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQueryBuilder {
    dialect: SqlDialect,
    from: String,
    joins: Vec<(String, String)>,
    filters: Vec<String>,
    projection: Vec<String>,
    order_by: Vec<String>,
    limit: Option<(u64, u64)>,
    join_params: Vec<Value>,
    filter_params: Vec<Value>,
}

impl SqlQueryBuilder {
    pub fn new(dialect: SqlDialect, set_expression: &str) -> Self {
        SqlQueryBuilder {
            dialect,
            from: set_expression.to_string(),
            joins: Vec::new(),
            filters: Vec::new(),
            projection: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            join_params: Vec::new(),
            filter_params: Vec::new(),
        }
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    /// Parameters in placeholder order: join parameters first, then filters
    pub fn params(&self) -> Vec<Value> {
        self.join_params
            .iter()
            .chain(self.filter_params.iter())
            .cloned()
            .collect()
    }

    pub fn to_sql(&self) -> String {
        let select = if self.projection.is_empty() {
            "*".to_string()
        } else {
            self.projection.join(", ")
        };

        let mut sql = format!("SELECT {}\nFROM {}\n", select, self.from);

        for (set_expression, condition) in &self.joins {
            if condition.is_empty() {
                sql.push_str(&format!("CROSS JOIN {}\n", set_expression));
            } else {
                sql.push_str(&format!("INNER JOIN {} ON {}\n", set_expression, condition));
            }
        }

        if !self.filters.is_empty() {
            sql.push_str(&format!("WHERE {}\n", self.filters.join(" AND ")));
        }

        if !self.order_by.is_empty() {
            sql.push_str(&format!("ORDER BY {}\n", self.order_by.join(", ")));
        }

        if let Some((count, offset)) = self.limit {
            if offset > 0 {
                sql.push_str(&format!("LIMIT {} OFFSET {}\n", count, offset));
            } else {
                sql.push_str(&format!("LIMIT {}\n", count));
            }
        }

        sql
    }
}

impl QueryBuilder for SqlQueryBuilder {
    fn add_joined_set(&mut self, set_expression: &str, condition: &str, params: &[Value]) {
        self.joins
            .push((set_expression.to_string(), condition.to_string()));
        self.join_params.extend(params.iter().cloned());
    }

    fn add_filter(&mut self, condition: &str, params: &[Value]) {
        self.filters.push(condition.to_string());
        self.filter_params.extend(params.iter().cloned());
    }

    fn add_projected_property(&mut self, qualified_name: &str, alias: Option<&str>) {
        match alias {
            Some(alias) => self
                .projection
                .push(format!("{} AS {}", qualified_name, alias)),
            None => self.projection.push(qualified_name.to_string()),
        }
    }

    fn add_sort(&mut self, qualified_name: &str, ascending: bool) {
        let direction = if ascending { "ASC" } else { "DESC" };
        self.order_by
            .push(format!("{} {}", qualified_name, direction));
    }

    fn limit(&mut self, count: u64, offset: u64) {
        self.limit = Some((count, offset));
    }
}

/// `CREATE TABLE IF NOT EXISTS` statement for a virtual entity's dataset
pub fn create_table_sql(
    dialect: SqlDialect,
    set_name: &str,
    schema: &EntitySchema,
    id_properties: &[String],
) -> String {
    let columns: Vec<String> = schema
        .iter()
        .map(|definition| {
            format!(
                "  {} {}",
                dialect.quote_identifier(&definition.name),
                dialect.column_type(&definition.property_type)
            )
        })
        .collect();

    let primary_key: Vec<String> = id_properties
        .iter()
        .map(|name| dialect.quote_identifier(name))
        .collect();

    match dialect {
        SqlDialect::ClickHouse => format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n) ENGINE = MergeTree ORDER BY ({})",
            dialect.quote_identifier(set_name),
            columns.join(",\n"),
            primary_key.join(", ")
        ),
        _ => format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{},\n  PRIMARY KEY ({})\n)",
            dialect.quote_identifier(set_name),
            columns.join(",\n"),
            primary_key.join(", ")
        ),
    }
}
