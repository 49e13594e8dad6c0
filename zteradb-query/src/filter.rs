//! Filter expression tree.
//!
//! Filters are built by chaining constructors on a [`Filter`] accumulator;
//! each constructor appends one node. Retrieving the accumulated form
//! unwraps a single node and returns the list otherwise, and nesting a
//! builder inside another substitutes that form.

use crate::error::BuildError;
use serde_json::{json, Value};

/// Operator alphabet, with the wire token for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // logical
    And,
    Or,
    // comparison
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    // arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // string, case-sensitive
    Contains,
    StartsWith,
    EndsWith,
    // string, case-insensitive
    IContains,
    IStartsWith,
    IEndsWith,
    // set
    In,
}

impl Operator {
    /// The token written to the wire.
    pub fn token(self) -> &'static str {
        match self {
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Contains => "%%",
            Operator::StartsWith => "^%%",
            Operator::EndsWith => "%%$",
            Operator::IContains => "i%%",
            Operator::IStartsWith => "^i%%",
            Operator::IEndsWith => "i%%$",
            Operator::In => "IN",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Some(match token {
            "&&" => Operator::And,
            "||" => Operator::Or,
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Mod,
            "%%" => Operator::Contains,
            "^%%" => Operator::StartsWith,
            "%%$" => Operator::EndsWith,
            "i%%" => Operator::IContains,
            "^i%%" => Operator::IStartsWith,
            "i%%$" => Operator::IEndsWith,
            "IN" => Operator::In,
            _ => return None,
        })
    }
}

/// One operand position in a filter node.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A literal scalar value.
    Literal(Value),
    /// A reference to a schema field by name. Bare strings are interpreted
    /// as field references; use [`Operand::literal`] for string literals.
    Field(String),
    /// A nested filter; its accumulated form is substituted on
    /// serialization.
    Nested(Filter),
}

impl Operand {
    pub fn literal(value: impl Into<Value>) -> Self {
        Operand::Literal(value.into())
    }

    pub fn field(name: impl Into<String>) -> Self {
        Operand::Field(name.into())
    }

    fn to_value(&self) -> Value {
        match self {
            Operand::Literal(value) => value.clone(),
            Operand::Field(name) => Value::String(name.clone()),
            Operand::Nested(filter) => filter.to_value(),
        }
    }

    fn from_wire(value: &Value) -> Self {
        match value {
            Value::Object(map) if map.contains_key("operator") => {
                match FilterNode::from_value(value) {
                    Ok(node) => Operand::Nested(Filter { nodes: vec![node] }),
                    Err(_) => Operand::Literal(value.clone()),
                }
            }
            Value::Array(items)
                if !items.is_empty()
                    && items.iter().all(|item| {
                        item.as_object().is_some_and(|map| map.contains_key("operator"))
                    }) =>
            {
                let parsed: Result<Vec<FilterNode>, BuildError> =
                    items.iter().map(FilterNode::from_value).collect();
                match parsed {
                    Ok(nodes) => Operand::Nested(Filter { nodes }),
                    Err(_) => Operand::Literal(value.clone()),
                }
            }
            Value::String(name) => Operand::Field(name.clone()),
            other => Operand::Literal(other.clone()),
        }
    }
}

impl From<&str> for Operand {
    fn from(name: &str) -> Self {
        Operand::Field(name.to_string())
    }
}

impl From<String> for Operand {
    fn from(name: String) -> Self {
        Operand::Field(name)
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Literal(Value::from(value))
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Literal(Value::from(value))
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Literal(Value::from(value))
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Literal(value)
    }
}

impl From<Filter> for Operand {
    fn from(filter: Filter) -> Self {
        Operand::Nested(filter)
    }
}

/// One node of the filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    /// `{operator, operand, result}` — used by `=`, `!=`, `IN`, and the
    /// string operators.
    Binary {
        op: Operator,
        operand: Operand,
        result: Operand,
    },
    /// `{operator, operand: [...]}` — used by the logical, arithmetic, and
    /// ordered comparison operators.
    Nary { op: Operator, operands: Vec<Operand> },
}

impl FilterNode {
    /// Serializes the node to its wire form.
    pub fn to_value(&self) -> Value {
        match self {
            FilterNode::Binary {
                op,
                operand,
                result,
            } => json!({
                "operator": op.token(),
                "operand": operand.to_value(),
                "result": result.to_value(),
            }),
            FilterNode::Nary { op, operands } => json!({
                "operator": op.token(),
                "operand": operands.iter().map(Operand::to_value).collect::<Vec<_>>(),
            }),
        }
    }

    /// Rebuilds a node from its wire form. Strings in operand positions come
    /// back as field references; the round trip is exact on re-serialization.
    pub fn from_value(value: &Value) -> Result<Self, BuildError> {
        let map = value
            .as_object()
            .ok_or_else(|| BuildError::MalformedNode("expected an object".into()))?;
        let token = map
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| BuildError::MalformedNode("missing operator token".into()))?;
        let op = Operator::from_token(token)
            .ok_or_else(|| BuildError::MalformedNode(format!("unknown operator {token:?}")))?;
        let operand = map
            .get("operand")
            .ok_or_else(|| BuildError::MalformedNode("missing operand".into()))?;

        if let Some(result) = map.get("result") {
            Ok(FilterNode::Binary {
                op,
                operand: Operand::from_wire(operand),
                result: Operand::from_wire(result),
            })
        } else {
            let items = operand.as_array().ok_or_else(|| {
                BuildError::MalformedNode("operand list expected for n-ary node".into())
            })?;
            Ok(FilterNode::Nary {
                op,
                operands: items.iter().map(Operand::from_wire).collect(),
            })
        }
    }
}

/// Accumulates filter nodes; every constructor appends one node and hands
/// the builder back for chaining.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    nodes: Vec<FilterNode>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    /// The accumulated wire form: a single node unwrapped, a list otherwise.
    pub fn to_value(&self) -> Value {
        if self.nodes.len() == 1 {
            self.nodes[0].to_value()
        } else {
            Value::Array(self.nodes.iter().map(FilterNode::to_value).collect())
        }
    }

    /// Rebuilds a filter from a serialized node or node list.
    pub fn from_value(value: &Value) -> Result<Self, BuildError> {
        let nodes = match value {
            Value::Array(items) => items
                .iter()
                .map(FilterNode::from_value)
                .collect::<Result<Vec<_>, _>>()?,
            other => vec![FilterNode::from_value(other)?],
        };
        Ok(Self { nodes })
    }

    fn push_nary(mut self, op: Operator, operands: Vec<Operand>) -> Self {
        self.nodes.push(FilterNode::Nary { op, operands });
        self
    }

    fn push_binary(
        mut self,
        op: Operator,
        operand: impl Into<Operand>,
        result: impl Into<Operand>,
    ) -> Self {
        self.nodes.push(FilterNode::Binary {
            op,
            operand: operand.into(),
            result: result.into(),
        });
        self
    }

    fn push_ordered(
        self,
        op: Operator,
        operands: Vec<Operand>,
    ) -> Result<Self, BuildError> {
        if operands.len() < 2 {
            return Err(BuildError::NotEnoughOperands {
                op: op.token(),
                min: 2,
                got: operands.len(),
            });
        }
        Ok(self.push_nary(op, operands))
    }

    fn push_string(
        self,
        op: Operator,
        field: &str,
        value: &str,
    ) -> Result<Self, BuildError> {
        if field.is_empty() {
            return Err(BuildError::EmptyField { op: op.token() });
        }
        if value.is_empty() {
            return Err(BuildError::EmptyString { op: op.token() });
        }
        Ok(self.push_binary(op, Operand::field(field), Operand::literal(value)))
    }

    fn push_division(self, op: Operator, operands: Vec<Operand>) -> Result<Self, BuildError> {
        for operand in &operands {
            if matches!(operand, Operand::Literal(Value::Array(_))) {
                return Err(BuildError::InvalidOperand { op: op.token() });
            }
        }
        Ok(self.push_nary(op, operands))
    }

    // ---- logical ------------------------------------------------------

    pub fn and(self, operands: impl IntoIterator<Item = Operand>) -> Self {
        self.push_nary(Operator::And, operands.into_iter().collect())
    }

    pub fn or(self, operands: impl IntoIterator<Item = Operand>) -> Self {
        self.push_nary(Operator::Or, operands.into_iter().collect())
    }

    // ---- comparison ---------------------------------------------------

    pub fn eq(self, operand: impl Into<Operand>, result: impl Into<Operand>) -> Self {
        self.push_binary(Operator::Eq, operand, result)
    }

    pub fn ne(self, operand: impl Into<Operand>, result: impl Into<Operand>) -> Self {
        self.push_binary(Operator::Ne, operand, result)
    }

    /// Requires at least two operands.
    pub fn gt(self, operands: impl IntoIterator<Item = Operand>) -> Result<Self, BuildError> {
        self.push_ordered(Operator::Gt, operands.into_iter().collect())
    }

    /// Requires at least two operands.
    pub fn ge(self, operands: impl IntoIterator<Item = Operand>) -> Result<Self, BuildError> {
        self.push_ordered(Operator::Ge, operands.into_iter().collect())
    }

    /// Requires at least two operands.
    pub fn lt(self, operands: impl IntoIterator<Item = Operand>) -> Result<Self, BuildError> {
        self.push_ordered(Operator::Lt, operands.into_iter().collect())
    }

    /// Requires at least two operands.
    pub fn le(self, operands: impl IntoIterator<Item = Operand>) -> Result<Self, BuildError> {
        self.push_ordered(Operator::Le, operands.into_iter().collect())
    }

    // ---- arithmetic ---------------------------------------------------

    pub fn add(self, operands: impl IntoIterator<Item = Operand>) -> Self {
        self.push_nary(Operator::Add, operands.into_iter().collect())
    }

    pub fn sub(self, operands: impl IntoIterator<Item = Operand>) -> Self {
        self.push_nary(Operator::Sub, operands.into_iter().collect())
    }

    pub fn mul(self, operands: impl IntoIterator<Item = Operand>) -> Self {
        self.push_nary(Operator::Mul, operands.into_iter().collect())
    }

    /// Division. Operands must be scalar; a zero divisor is not rejected
    /// here, the server reports it.
    pub fn div(self, operands: impl IntoIterator<Item = Operand>) -> Result<Self, BuildError> {
        self.push_division(Operator::Div, operands.into_iter().collect())
    }

    /// Modulo. Operands must be scalar; a zero divisor is not rejected
    /// here, the server reports it.
    pub fn rem(self, operands: impl IntoIterator<Item = Operand>) -> Result<Self, BuildError> {
        self.push_division(Operator::Mod, operands.into_iter().collect())
    }

    // ---- string (case-sensitive) --------------------------------------

    pub fn contains(self, field: &str, value: &str) -> Result<Self, BuildError> {
        self.push_string(Operator::Contains, field, value)
    }

    pub fn starts_with(self, field: &str, value: &str) -> Result<Self, BuildError> {
        self.push_string(Operator::StartsWith, field, value)
    }

    pub fn ends_with(self, field: &str, value: &str) -> Result<Self, BuildError> {
        self.push_string(Operator::EndsWith, field, value)
    }

    // ---- string (case-insensitive) ------------------------------------

    pub fn icontains(self, field: &str, value: &str) -> Result<Self, BuildError> {
        self.push_string(Operator::IContains, field, value)
    }

    pub fn istarts_with(self, field: &str, value: &str) -> Result<Self, BuildError> {
        self.push_string(Operator::IStartsWith, field, value)
    }

    pub fn iends_with(self, field: &str, value: &str) -> Result<Self, BuildError> {
        self.push_string(Operator::IEndsWith, field, value)
    }

    // ---- set ----------------------------------------------------------

    /// Membership test of `field` against a list of values.
    pub fn in_list(
        self,
        field: &str,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self, BuildError> {
        if field.is_empty() {
            return Err(BuildError::EmptyField {
                op: Operator::In.token(),
            });
        }
        let values: Vec<Value> = values.into_iter().collect();
        Ok(self.push_binary(
            Operator::In,
            Operand::field(field),
            Operand::Literal(Value::Array(values)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_and_of_eq_and_istarts_with() {
        let filter = Filter::new().and([
            Filter::new().eq("status", Operand::literal("A")).into(),
            Filter::new().istarts_with("name", "S").unwrap().into(),
        ]);
        assert_eq!(
            filter.to_value(),
            json!({
                "operator": "&&",
                "operand": [
                    {"operator": "=", "operand": "status", "result": "A"},
                    {"operator": "^i%%", "operand": "name", "result": "S"},
                ],
            })
        );
    }

    #[test]
    fn test_single_node_unwrapped_multiple_listed() {
        let one = Filter::new().eq("a", 1i64);
        assert!(one.to_value().is_object());

        let two = Filter::new().eq("a", 1i64).eq("b", 2i64);
        let value = two.to_value();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_nested_multi_node_substitutes_list() {
        let inner = Filter::new().eq("a", 1i64).eq("b", 2i64);
        let outer = Filter::new().or([inner.into(), Operand::literal(true)]);
        let value = outer.to_value();
        assert_eq!(value["operator"], "||");
        assert!(value["operand"][0].is_array());
        assert_eq!(value["operand"][1], json!(true));
    }

    #[test]
    fn test_ordered_comparison_requires_two_operands() {
        let err = Filter::new().gt([Operand::field("age")]).unwrap_err();
        assert!(matches!(err, BuildError::NotEnoughOperands { min: 2, .. }));

        let err = Filter::new().lt([]).unwrap_err();
        assert!(matches!(err, BuildError::NotEnoughOperands { got: 0, .. }));

        assert!(Filter::new()
            .ge([Operand::field("age"), Operand::literal(21i64)])
            .is_ok());
    }

    #[test]
    fn test_logical_accepts_any_list() {
        // AND/OR only require an array, not a minimum length.
        let filter = Filter::new().and([]);
        assert_eq!(filter.to_value(), json!({"operator": "&&", "operand": []}));
    }

    #[test]
    fn test_string_operators_reject_empty_arguments() {
        assert!(matches!(
            Filter::new().contains("", "x").unwrap_err(),
            BuildError::EmptyField { .. }
        ));
        assert!(matches!(
            Filter::new().ends_with("name", "").unwrap_err(),
            BuildError::EmptyString { .. }
        ));
        assert!(Filter::new().icontains("name", "smith").is_ok());
    }

    #[test]
    fn test_in_list_requires_field() {
        assert!(matches!(
            Filter::new().in_list("", [json!(1)]).unwrap_err(),
            BuildError::EmptyField { .. }
        ));
        let filter = Filter::new().in_list("state", [json!("A"), json!("B")]).unwrap();
        assert_eq!(
            filter.to_value(),
            json!({"operator": "IN", "operand": "state", "result": ["A", "B"]})
        );
    }

    #[test]
    fn test_division_allows_zero_divisor() {
        let filter = Filter::new()
            .div([Operand::field("total"), Operand::literal(0i64)])
            .unwrap();
        assert_eq!(
            filter.to_value(),
            json!({"operator": "/", "operand": ["total", 0]})
        );
    }

    #[test]
    fn test_division_rejects_array_operands() {
        let err = Filter::new()
            .div([Operand::literal(json!([1, 2])), Operand::literal(1i64)])
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidOperand { op: "/" }));

        let err = Filter::new()
            .rem([Operand::field("total"), Operand::literal(json!([3]))])
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidOperand { op: "%" }));

        // Field references and nested filters stay valid operands.
        assert!(Filter::new()
            .rem([
                Operand::field("total"),
                Filter::new().eq("base", 2i64).into(),
            ])
            .is_ok());
    }

    #[test]
    fn test_operator_tokens_roundtrip() {
        for op in [
            Operator::And,
            Operator::Or,
            Operator::Eq,
            Operator::Ne,
            Operator::Gt,
            Operator::Ge,
            Operator::Lt,
            Operator::Le,
            Operator::Add,
            Operator::Sub,
            Operator::Mul,
            Operator::Div,
            Operator::Mod,
            Operator::Contains,
            Operator::StartsWith,
            Operator::EndsWith,
            Operator::IContains,
            Operator::IStartsWith,
            Operator::IEndsWith,
            Operator::In,
        ] {
            assert_eq!(Operator::from_token(op.token()), Some(op));
        }
        assert_eq!(Operator::from_token("<>"), None);
    }

    #[test]
    fn test_serialize_rebuild_roundtrip() {
        let filter = Filter::new()
            .and([
                Filter::new().eq("status", Operand::literal("A")).into(),
                Filter::new()
                    .gt([Operand::field("age"), Operand::literal(21i64)])
                    .unwrap()
                    .into(),
            ])
            .in_list("state", [json!("CA"), json!("OR")])
            .unwrap();

        let wire = filter.to_value();
        let rebuilt = Filter::from_value(&wire).unwrap();
        assert_eq!(rebuilt.to_value(), wire);
        assert_eq!(rebuilt.len(), filter.len());
    }

    #[test]
    fn test_from_value_rejects_garbage() {
        assert!(Filter::from_value(&json!(42)).is_err());
        assert!(Filter::from_value(&json!({"operand": []})).is_err());
        assert!(Filter::from_value(&json!({"operator": "<>", "operand": []})).is_err());
        assert!(Filter::from_value(&json!({"operator": "&&", "operand": 3})).is_err());
    }
}
