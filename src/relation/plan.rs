use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::datasource::{self, QueryBuilder, SqlDialect, SqlQueryBuilder};
use crate::utils::identifier::split_qualified;

/// `<set alias>.<property>`; property `*` selects every property of the set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub qualifier: String,
    pub property: String,
}

impl QualifiedName {
    pub fn new(qualifier: impl Into<String>, property: impl Into<String>) -> Self {
        QualifiedName {
            qualifier: qualifier.into(),
            property: property.into(),
        }
    }

    pub fn all(qualifier: impl Into<String>) -> Self {
        QualifiedName::new(qualifier, "*")
    }

    /// Parse `a.b`; unqualified names get `default_qualifier`
    pub fn parse(name: &str, default_qualifier: &str) -> Self {
        match split_qualified(name) {
            (Some(qualifier), property) => QualifiedName::new(qualifier, property),
            (None, property) => QualifiedName::new(default_qualifier, property),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.property == "*"
    }

    pub fn render(&self, quote: &dyn Fn(&str) -> String) -> String {
        if self.is_wildcard() {
            format!("{}.*", quote(&self.qualifier))
        } else {
            format!("{}.{}", quote(&self.qualifier), quote(&self.property))
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.qualifier, self.property)
    }
}

/// Caller-supplied condition template with its positional parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub template: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlanCondition {
    /// `left = right` between two joined sets
    Equals {
        left: QualifiedName,
        right: QualifiedName,
    },
    /// `property = ?` with the value bound as a parameter
    Bound {
        property: QualifiedName,
        value: Value,
    },
    Template(Condition),
}

impl PlanCondition {
    pub fn render(&self, quote: &dyn Fn(&str) -> String) -> String {
        match self {
            PlanCondition::Equals { left, right } => {
                format!("{} = {}", left.render(quote), right.render(quote))
            }
            PlanCondition::Bound { property, .. } => format!("{} = ?", property.render(quote)),
            // Templates are opaque; scope each one so it stays a single conjunct
            PlanCondition::Template(condition) => format!("({})", condition.template),
        }
    }

    pub fn params(&self) -> Vec<Value> {
        match self {
            PlanCondition::Equals { .. } => Vec::new(),
            PlanCondition::Bound { value, .. } => vec![value.clone()],
            PlanCondition::Template(condition) => condition.params.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetReference {
    pub set_name: String,
    pub alias: String,
}

impl SetReference {
    pub fn new(set_name: impl Into<String>, alias: impl Into<String>) -> Self {
        SetReference {
            set_name: set_name.into(),
            alias: alias.into(),
        }
    }

    pub fn render(&self, quote: &dyn Fn(&str) -> String) -> String {
        datasource::set_expression(quote, &self.set_name, &self.alias)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedSet {
    pub set: SetReference,
    pub join_type: JoinType,
    pub joining_on: Vec<PlanCondition>,
}

impl JoinedSet {
    pub fn render_condition(&self, quote: &dyn Fn(&str) -> String) -> String {
        self.joining_on
            .iter()
            .map(|condition| condition.render(quote))
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    pub fn params(&self) -> Vec<Value> {
        self.joining_on.iter().flat_map(PlanCondition::params).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedProperty {
    pub property: QualifiedName,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortItem {
    pub property: QualifiedName,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub count: u64,
    pub offset: u64,
}

/// Compiled relation query. Pure data: building one performs no I/O.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub root: SetReference,
    pub joins: Vec<JoinedSet>,
    pub filters: Vec<PlanCondition>,
    pub projection: Vec<ProjectedProperty>,
    pub sort: Vec<SortItem>,
    pub limit: Option<Limit>,
}

impl QueryPlan {
    pub fn new(root: SetReference) -> Self {
        QueryPlan {
            root,
            joins: Vec::new(),
            filters: Vec::new(),
            projection: Vec::new(),
            sort: Vec::new(),
            limit: None,
        }
    }

    /// Root set followed by every joined set, in join order
    pub fn joined_sets(&self) -> impl Iterator<Item = &SetReference> {
        std::iter::once(&self.root).chain(self.joins.iter().map(|join| &join.set))
    }

    /// Parameters in placeholder order: each join's in join order, then filters
    pub fn params(&self) -> Vec<Value> {
        self.joins
            .iter()
            .flat_map(JoinedSet::params)
            .chain(self.filters.iter().flat_map(PlanCondition::params))
            .collect()
    }

    pub fn root_expression(&self, quote: &dyn Fn(&str) -> String) -> String {
        self.root.render(quote)
    }

    /// Feed everything except the root set into `builder`
    pub fn write_to<B>(&self, builder: &mut B, quote: &dyn Fn(&str) -> String)
    where
        B: QueryBuilder + ?Sized,
    {
        for join in &self.joins {
            builder.add_joined_set(
                &join.set.render(quote),
                &join.render_condition(quote),
                &join.params(),
            );
        }

        for filter in &self.filters {
            builder.add_filter(&filter.render(quote), &filter.params());
        }

        for projected in &self.projection {
            let alias = projected.alias.as_deref().map(|alias| quote(alias));
            builder.add_projected_property(&projected.property.render(quote), alias.as_deref());
        }

        for item in &self.sort {
            builder.add_sort(&item.property.render(quote), item.ascending);
        }

        if let Some(limit) = self.limit {
            builder.limit(limit.count, limit.offset);
        }
    }

    /// Render through the reference SQL builder
    pub fn to_sql(&self, dialect: SqlDialect) -> SqlQueryBuilder {
        let quote = |name: &str| dialect.quote_identifier(name);
        let mut builder = SqlQueryBuilder::new(dialect, &self.root_expression(&quote));
        self.write_to(&mut builder, &quote);
        builder
    }
}
