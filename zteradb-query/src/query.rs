//! Query document builder.
//!
//! A [`Query`] accumulates the pieces of one ZQL query through chaining
//! setters and serializes them with [`Query::generate`] into the wire
//! document consumed by the server.

use crate::error::BuildError;
use crate::filter::Filter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;

/// Field names that cannot be used as user field keys.
pub const RESERVED_FIELDS: &[&str] = &[
    "__schema_name",
    "__database_id",
    "__query_type",
    "__fields",
    "__filters",
    "__filter_conditions",
    "__limit",
    "__sort",
    "__related_fields",
    "__count",
    "__env",
];

fn is_reserved(name: &str) -> bool {
    name.starts_with("__") || RESERVED_FIELDS.contains(&name)
}

/// Query type alphabet. The wire code is the listing position; `None` is
/// rejected at generation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    #[default]
    None,
    Insert,
    Select,
    Update,
    Delete,
}

impl QueryType {
    pub fn code(self) -> u8 {
        match self {
            QueryType::None => 0,
            QueryType::Insert => 1,
            QueryType::Select => 2,
            QueryType::Update => 3,
            QueryType::Delete => 4,
        }
    }
}

/// Deployment environment used to route queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
    Dev,
    Staging,
    Qa,
    Prod,
}

impl Env {
    pub fn as_str(self) -> &'static str {
        match self {
            Env::Dev => "dev",
            Env::Staging => "staging",
            Env::Qa => "qa",
            Env::Prod => "prod",
        }
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Env {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Env::Dev),
            "staging" => Ok(Env::Staging),
            "qa" => Ok(Env::Qa),
            "prod" => Ok(Env::Prod),
            other => Err(BuildError::InvalidEnv(other.to_string())),
        }
    }
}

/// One ZQL query. Immutable once handed to the pool; setters consume and
/// return the builder so accumulated state is captured.
#[derive(Debug, Clone, Default)]
pub struct Query {
    schema_name: String,
    database_id: Option<String>,
    query_type: QueryType,
    fields: Map<String, Value>,
    filters: Map<String, Value>,
    filter_conditions: Vec<Value>,
    sort: Vec<(String, i64)>,
    limit: Option<(i64, i64)>,
    related: Vec<(String, Query)>,
    count: bool,
    env: Option<Env>,
}

impl Query {
    pub fn new(schema_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            ..Self::default()
        }
    }

    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Pins the query to a database; serialized as the `db` key.
    pub fn with_database_id(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = Some(database_id.into());
        self
    }

    // ---- query type ---------------------------------------------------

    pub fn select(mut self) -> Self {
        self.query_type = QueryType::Select;
        self
    }

    pub fn insert(mut self) -> Self {
        self.query_type = QueryType::Insert;
        self
    }

    pub fn update(mut self) -> Self {
        self.query_type = QueryType::Update;
        self
    }

    pub fn delete(mut self) -> Self {
        self.query_type = QueryType::Delete;
        self
    }

    // ---- fields and filters -------------------------------------------

    /// Merges the map into the user field store. Reserved names are
    /// rejected.
    pub fn fields(mut self, map: Map<String, Value>) -> Result<Self, BuildError> {
        for (name, value) in map {
            if is_reserved(&name) {
                return Err(BuildError::ReservedField(name));
            }
            self.fields.insert(name, value);
        }
        Ok(self)
    }

    /// Sets a single user field. Names starting with `__` or in the
    /// reserved list are rejected.
    pub fn set_field(
        mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, BuildError> {
        let name = name.into();
        if is_reserved(&name) {
            return Err(BuildError::ReservedField(name));
        }
        self.fields.insert(name, value.into());
        Ok(self)
    }

    /// Merges equality-only field/scalar pairs. Object values are rejected.
    pub fn filter(mut self, map: Map<String, Value>) -> Result<Self, BuildError> {
        for (name, value) in map {
            if value.is_object() {
                return Err(BuildError::NonScalarFilter(name));
            }
            self.filters.insert(name, value);
        }
        Ok(self)
    }

    /// Appends a filter tree's accumulated form to the condition list.
    pub fn filter_condition(mut self, filter: &Filter) -> Self {
        self.filter_conditions.push(filter.to_value());
        self
    }

    // ---- ordering and slicing -----------------------------------------

    /// Appends (field, order) pairs. Orders must be `1` or `-1`; an empty
    /// map is rejected.
    pub fn sort(
        mut self,
        pairs: impl IntoIterator<Item = (String, i64)>,
    ) -> Result<Self, BuildError> {
        let pairs: Vec<(String, i64)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return Err(BuildError::EmptySort);
        }
        for (field, order) in pairs {
            if order != 1 && order != -1 {
                return Err(BuildError::InvalidSortOrder { field, order });
            }
            self.sort.push((field, order));
        }
        Ok(self)
    }

    /// Restricts the result to the half-open row range `[start, end)`.
    pub fn limit(mut self, start: i64, end: i64) -> Result<Self, BuildError> {
        if start < 0 || end < 0 {
            return Err(BuildError::NegativeLimit { start, end });
        }
        if start >= end {
            return Err(BuildError::InvalidLimitRange { start, end });
        }
        self.limit = Some((start, end));
        Ok(self)
    }

    /// Asks for a row count. Toggles on and stays on.
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    // ---- composition --------------------------------------------------

    /// Attaches a related sub-query under the given name.
    pub fn related(mut self, name: impl Into<String>, query: Query) -> Self {
        self.related.push((name.into(), query));
        self
    }

    pub fn set_env(mut self, env: Env) -> Self {
        self.env = Some(env);
        self
    }

    // ---- finalization -------------------------------------------------

    /// Serializes the query into the wire document. Fails when no concrete
    /// query type has been set; related sub-queries are generated
    /// recursively and share that requirement.
    pub fn generate(&self) -> Result<Value, BuildError> {
        if self.query_type == QueryType::None {
            return Err(BuildError::MissingQueryType);
        }

        let mut related = Map::new();
        for (name, query) in &self.related {
            related.insert(name.clone(), query.generate()?);
        }

        let mut sort = Map::new();
        for (field, order) in &self.sort {
            sort.insert(field.clone(), json!(order));
        }

        Ok(json!({
            "db": self.database_id,
            "sh": self.schema_name,
            "qt": self.query_type.code(),
            "fl": self.fields,
            "fi": self.filters,
            "fc": self.filter_conditions,
            "rf": related,
            "st": sort,
            "lt": self.limit.map(|(start, end)| json!([start, end])).unwrap_or(Value::Null),
            "cnt": self.count,
            "env": self.env.map(|env| json!(env.as_str())).unwrap_or(Value::Null),
        }))
    }
}
