//! Abstract Syntax Tree for the ClickHouse SELECT dialect.
//!
//! Every node renders back to canonical ClickHouse text through `Display`:
//! function arguments are joined with `", "`, string literals keep their
//! single quotes and quoted identifiers keep their quote characters. The
//! rendered form is what the analyzer reports as a column's origin
//! expression.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Writes `items` separated by `", "`.
fn comma_separated<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

// ============================================================================
// Identifiers and literals
// ============================================================================

/// An identifier, optionally quoted with backticks or double quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ident {
    /// The identifier text without quotes.
    pub value: String,
    /// The quote character used in the source, if any.
    pub quote: Option<char>,
}

impl Ident {
    /// Creates an unquoted identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quote: None,
        }
    }

    /// Creates an identifier quoted with `quote`.
    #[must_use]
    pub fn quoted(value: impl Into<String>, quote: char) -> Self {
        Self {
            value: value.into(),
            quote: Some(quote),
        }
    }

    /// Returns true if the identifier was written with quotes.
    #[must_use]
    pub fn is_quoted(&self) -> bool {
        self.quote.is_some()
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quote {
            Some(q) => write!(f, "{q}{}{q}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    /// A single-quoted string, stored as written between the quotes.
    String(String),
    /// A numeric literal, stored as written (including `nan` and `inf`).
    Number(String),
    /// `true` or `false`.
    Boolean(bool),
    /// `NULL`.
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => {
                let escaped = s.replace('\\', "\\\\").replace('\'', "\\'");
                write!(f, "'{escaped}'")
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => write!(f, "NULL"),
        }
    }
}

// ============================================================================
// Operators
// ============================================================================

/// Binary operators, logical and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOperator {
    /// Logical AND
    And,
    /// Logical OR
    Or,
    /// Equal (`=`, `==`)
    Eq,
    /// Not equal (`!=`, `<>`)
    NotEq,
    /// Less than
    Lt,
    /// Less than or equal
    LtEq,
    /// Greater than
    Gt,
    /// Greater than or equal
    GtEq,
    /// Addition
    Plus,
    /// Subtraction
    Minus,
    /// Multiplication
    Multiply,
    /// Division
    Divide,
    /// Modulo
    Modulo,
    /// String concatenation (`||`)
    Concat,
}

impl BinaryOperator {
    /// Returns true for the comparison operators.
    #[must_use]
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::NotEq | Self::Lt | Self::LtEq | Self::Gt | Self::GtEq
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
            Self::Eq => write!(f, "="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::LtEq => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtEq => write!(f, ">="),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Multiply => write!(f, "*"),
            Self::Divide => write!(f, "/"),
            Self::Modulo => write!(f, "%"),
            Self::Concat => write!(f, "||"),
        }
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOperator {
    /// Logical NOT
    Not,
    /// Numeric negation
    Minus,
    /// Numeric identity
    Plus,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Not => write!(f, "NOT "),
            Self::Minus => write!(f, "-"),
            Self::Plus => write!(f, "+"),
        }
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// A function call, including parametric aggregates and window calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    /// The function name as written.
    pub name: String,
    /// Parameters of a parametric aggregate: `quantile(0.9)(x)`.
    pub params: Option<Vec<Expr>>,
    /// The call arguments.
    pub args: Vec<Expr>,
    /// `count(DISTINCT x)`.
    pub distinct: bool,
    /// The `OVER` clause of a window call.
    pub over: Option<WindowRef>,
}

impl Function {
    /// Creates a plain call `name(args)`.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            params: None,
            args,
            distinct: false,
            over: None,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(params) = &self.params {
            write!(f, "(")?;
            comma_separated(f, params)?;
            write!(f, ")")?;
        }
        write!(f, "(")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        comma_separated(f, &self.args)?;
        write!(f, ")")?;
        if let Some(over) = &self.over {
            write!(f, " OVER {over}")?;
        }
        Ok(())
    }
}

/// The target of an `OVER` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowRef {
    /// `OVER name`
    Named(String),
    /// `OVER (PARTITION BY ... ORDER BY ...)`
    Spec(WindowSpec),
}

impl fmt::Display for WindowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "{name}"),
            Self::Spec(spec) => write!(f, "({spec})"),
        }
    }
}

/// A window definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// `PARTITION BY` expressions.
    pub partition_by: Vec<Expr>,
    /// `ORDER BY` expressions.
    pub order_by: Vec<OrderByExpr>,
    /// The frame clause, kept as normalized text.
    pub frame: Option<String>,
}

impl fmt::Display for WindowSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if !self.partition_by.is_empty() {
            write!(f, "PARTITION BY ")?;
            comma_separated(f, &self.partition_by)?;
            sep = " ";
        }
        if !self.order_by.is_empty() {
            write!(f, "{sep}ORDER BY ")?;
            comma_separated(f, &self.order_by)?;
            sep = " ";
        }
        if let Some(frame) = &self.frame {
            write!(f, "{sep}{frame}")?;
        }
        Ok(())
    }
}

/// One `CASE` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    /// The `WHEN` condition (or value, for the operand form).
    pub condition: Expr,
    /// The `THEN` result.
    pub result: Expr,
}

/// A SQL expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A bare column reference.
    Identifier(Ident),
    /// A qualified reference such as `m.region` or `db.table.column`.
    CompoundIdentifier(Vec<Ident>),
    /// A literal value.
    Literal(Literal),
    /// `*` or `t.*`.
    Wildcard(Vec<Ident>),
    /// A function call.
    Function(Function),
    /// `left op right`.
    BinaryOp {
        /// Left operand.
        left: Box<Expr>,
        /// The operator.
        op: BinaryOperator,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `op expr`.
    UnaryOp {
        /// The operator.
        op: UnaryOperator,
        /// The operand.
        expr: Box<Expr>,
    },
    /// `expr [GLOBAL] [NOT] IN (a, b, ...)`.
    InList {
        /// The tested expression.
        expr: Box<Expr>,
        /// The candidate values.
        list: Vec<Expr>,
        /// `NOT IN`.
        negated: bool,
        /// `GLOBAL IN`.
        global: bool,
    },
    /// `expr [GLOBAL] [NOT] IN (SELECT ...)`.
    InSubquery {
        /// The tested expression.
        expr: Box<Expr>,
        /// The sub-query producing candidates.
        subquery: Box<SelectStatement>,
        /// `NOT IN`.
        negated: bool,
        /// `GLOBAL IN`.
        global: bool,
    },
    /// `expr [GLOBAL] [NOT] IN other` where `other` is an array, a function
    /// call or a named set.
    InExpr {
        /// The tested expression.
        expr: Box<Expr>,
        /// The candidate source.
        target: Box<Expr>,
        /// `NOT IN`.
        negated: bool,
        /// `GLOBAL IN`.
        global: bool,
    },
    /// `expr [NOT] BETWEEN low AND high`.
    Between {
        /// The tested expression.
        expr: Box<Expr>,
        /// `NOT BETWEEN`.
        negated: bool,
        /// Lower bound.
        low: Box<Expr>,
        /// Upper bound.
        high: Box<Expr>,
    },
    /// `expr [NOT] LIKE pattern` and `ILIKE`.
    Like {
        /// The tested expression.
        expr: Box<Expr>,
        /// The pattern.
        pattern: Box<Expr>,
        /// `NOT LIKE`.
        negated: bool,
        /// `ILIKE`.
        case_insensitive: bool,
    },
    /// `expr IS [NOT] NULL`.
    IsNull {
        /// The tested expression.
        expr: Box<Expr>,
        /// `IS NOT NULL`.
        negated: bool,
    },
    /// `EXISTS (SELECT ...)`.
    Exists(Box<SelectStatement>),
    /// A scalar sub-query `(SELECT ...)`.
    Subquery(Box<SelectStatement>),
    /// A parenthesized expression.
    Nested(Box<Expr>),
    /// A tuple `(a, b)`.
    Tuple(Vec<Expr>),
    /// An array literal `[a, b]`.
    Array(Vec<Expr>),
    /// `CASE [operand] WHEN ... THEN ... [ELSE ...] END`.
    Case {
        /// The operand of the simple form.
        operand: Option<Box<Expr>>,
        /// The branches.
        branches: Vec<WhenClause>,
        /// The `ELSE` result.
        else_result: Option<Box<Expr>>,
    },
    /// `INTERVAL value [UNIT]`.
    Interval {
        /// The interval length.
        value: Box<Expr>,
        /// The unit, upper-cased.
        unit: Option<String>,
    },
    /// A higher-order function argument `x -> body`.
    Lambda {
        /// The bound parameters.
        params: Vec<Ident>,
        /// The lambda body.
        body: Box<Expr>,
    },
    /// `expr::Type`.
    Cast {
        /// The converted expression.
        expr: Box<Expr>,
        /// The target type as written.
        data_type: String,
    },
    /// `expr[index]`.
    Index {
        /// The indexed expression.
        expr: Box<Expr>,
        /// The index.
        index: Box<Expr>,
    },
}

impl Expr {
    /// Builds a bare column reference.
    #[must_use]
    pub fn column(name: impl Into<String>) -> Self {
        Self::Identifier(Ident::new(name))
    }

    /// Builds a string literal.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Literal(Literal::String(value.into()))
    }

    /// Returns the referenced column name for identifiers, taking the last
    /// segment of a qualified reference.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        match self {
            Self::Identifier(ident) => Some(&ident.value),
            Self::CompoundIdentifier(parts) => parts.last().map(|p| p.value.as_str()),
            _ => None,
        }
    }

    /// Returns the value of a string literal.
    #[must_use]
    pub fn as_string_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(Literal::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the direct sub-expressions of this node.
    ///
    /// Sub-queries are not expressions and are not returned.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Self::Identifier(_)
            | Self::CompoundIdentifier(_)
            | Self::Literal(_)
            | Self::Wildcard(_)
            | Self::Exists(_)
            | Self::Subquery(_) => Vec::new(),
            Self::Function(func) => {
                let mut children: Vec<&Expr> = func.params.iter().flatten().collect();
                children.extend(func.args.iter());
                if let Some(WindowRef::Spec(spec)) = &func.over {
                    children.extend(spec.partition_by.iter());
                    children.extend(spec.order_by.iter().map(|o| &o.expr));
                }
                children
            }
            Self::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Self::UnaryOp { expr, .. }
            | Self::IsNull { expr, .. }
            | Self::Nested(expr)
            | Self::Cast { expr, .. }
            | Self::InSubquery { expr, .. } => vec![expr.as_ref()],
            Self::InList { expr, list, .. } => {
                let mut children = vec![expr.as_ref()];
                children.extend(list.iter());
                children
            }
            Self::InExpr { expr, target, .. } => vec![expr.as_ref(), target.as_ref()],
            Self::Between {
                expr, low, high, ..
            } => vec![expr.as_ref(), low.as_ref(), high.as_ref()],
            Self::Like { expr, pattern, .. } => vec![expr.as_ref(), pattern.as_ref()],
            Self::Tuple(items) | Self::Array(items) => items.iter().collect(),
            Self::Case {
                operand,
                branches,
                else_result,
            } => {
                let mut children: Vec<&Expr> = operand.iter().map(|e| &**e).collect();
                for branch in branches {
                    children.push(&branch.condition);
                    children.push(&branch.result);
                }
                children.extend(else_result.iter().map(|e| &**e));
                children
            }
            Self::Interval { value, .. } => vec![value.as_ref()],
            Self::Lambda { body, .. } => vec![body.as_ref()],
            Self::Index { expr, index } => vec![expr.as_ref(), index.as_ref()],
        }
    }

    /// Returns the height of the expression tree, counting this node as 1.
    ///
    /// Walks with an explicit stack, so any tree shape is safe to measure.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(self, 1)];
        while let Some((expr, level)) = stack.pop() {
            deepest = deepest.max(level);
            stack.extend(expr.children().into_iter().map(|child| (child, level + 1)));
        }
        deepest
    }
}

fn write_in(
    f: &mut fmt::Formatter<'_>,
    expr: &Expr,
    negated: bool,
    global: bool,
) -> fmt::Result {
    write!(f, "{expr} ")?;
    if global {
        write!(f, "GLOBAL ")?;
    }
    if negated {
        write!(f, "NOT ")?;
    }
    write!(f, "IN ")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier(ident) => write!(f, "{ident}"),
            Self::CompoundIdentifier(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
            Self::Literal(lit) => write!(f, "{lit}"),
            Self::Wildcard(qualifier) => {
                for part in qualifier {
                    write!(f, "{part}.")?;
                }
                write!(f, "*")
            }
            Self::Function(func) => write!(f, "{func}"),
            Self::BinaryOp { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::UnaryOp { op, expr } => write!(f, "{op}{expr}"),
            Self::InList {
                expr,
                list,
                negated,
                global,
            } => {
                write_in(f, expr, *negated, *global)?;
                write!(f, "(")?;
                comma_separated(f, list)?;
                write!(f, ")")
            }
            Self::InSubquery {
                expr,
                subquery,
                negated,
                global,
            } => {
                write_in(f, expr, *negated, *global)?;
                write!(f, "({subquery})")
            }
            Self::InExpr {
                expr,
                target,
                negated,
                global,
            } => {
                write_in(f, expr, *negated, *global)?;
                write!(f, "{target}")
            }
            Self::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let not = if *negated { "NOT " } else { "" };
                write!(f, "{expr} {not}BETWEEN {low} AND {high}")
            }
            Self::Like {
                expr,
                pattern,
                negated,
                case_insensitive,
            } => {
                let not = if *negated { "NOT " } else { "" };
                let op = if *case_insensitive { "ILIKE" } else { "LIKE" };
                write!(f, "{expr} {not}{op} {pattern}")
            }
            Self::IsNull { expr, negated } => {
                if *negated {
                    write!(f, "{expr} IS NOT NULL")
                } else {
                    write!(f, "{expr} IS NULL")
                }
            }
            Self::Exists(subquery) => write!(f, "EXISTS ({subquery})"),
            Self::Subquery(subquery) => write!(f, "({subquery})"),
            Self::Nested(expr) => write!(f, "({expr})"),
            Self::Tuple(items) => {
                write!(f, "(")?;
                comma_separated(f, items)?;
                write!(f, ")")
            }
            Self::Array(items) => {
                write!(f, "[")?;
                comma_separated(f, items)?;
                write!(f, "]")
            }
            Self::Case {
                operand,
                branches,
                else_result,
            } => {
                write!(f, "CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for branch in branches {
                    write!(f, " WHEN {} THEN {}", branch.condition, branch.result)?;
                }
                if let Some(else_result) = else_result {
                    write!(f, " ELSE {else_result}")?;
                }
                write!(f, " END")
            }
            Self::Interval { value, unit } => match unit {
                Some(unit) => write!(f, "INTERVAL {value} {unit}"),
                None => write!(f, "INTERVAL {value}"),
            },
            Self::Lambda { params, body } => {
                if let [param] = params.as_slice() {
                    write!(f, "{param} -> {body}")
                } else {
                    write!(f, "(")?;
                    comma_separated(f, params)?;
                    write!(f, ") -> {body}")
                }
            }
            Self::Cast { expr, data_type } => write!(f, "{expr}::{data_type}"),
            Self::Index { expr, index } => write!(f, "{expr}[{index}]"),
        }
    }
}

// ============================================================================
// SELECT statement
// ============================================================================

/// A projection entry with its optional alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    /// The projected expression.
    pub expr: Expr,
    /// `AS alias`, explicit or implicit.
    pub alias: Option<Ident>,
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {alias}", self.expr),
            None => write!(f, "{}", self.expr),
        }
    }
}

/// An entry of a `WITH` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WithItem {
    /// `name AS (SELECT ...)`
    Cte {
        /// The CTE name.
        name: Ident,
        /// The CTE body.
        query: Box<SelectStatement>,
    },
    /// ClickHouse scalar binding `expr AS name`.
    Expression {
        /// The bound expression.
        expr: Expr,
        /// The bound name.
        alias: Ident,
    },
}

impl fmt::Display for WithItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cte { name, query } => write!(f, "{name} AS ({query})"),
            Self::Expression { expr, alias } => write!(f, "{expr} AS {alias}"),
        }
    }
}

/// A table source in `FROM` or `JOIN`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableFactor {
    /// A named table (or CTE reference).
    Table {
        /// The possibly qualified name.
        name: Vec<Ident>,
        /// The table alias.
        alias: Option<Ident>,
        /// `FINAL` modifier.
        is_final: bool,
        /// `SAMPLE` ratio.
        sample: Option<Expr>,
    },
    /// A table function such as `numbers(10)`.
    Function {
        /// The call.
        function: Function,
        /// The table alias.
        alias: Option<Ident>,
    },
    /// A derived table `(SELECT ...)`.
    Derived {
        /// The sub-query.
        subquery: Box<SelectStatement>,
        /// The table alias.
        alias: Option<Ident>,
    },
}

impl TableFactor {
    /// Returns the unqualified table name if this is a single-part table
    /// reference, which is the only form that can name a CTE.
    #[must_use]
    pub fn cte_candidate(&self) -> Option<&str> {
        match self {
            Self::Table { name, .. } if name.len() == 1 => Some(&name[0].value),
            _ => None,
        }
    }
}

impl fmt::Display for TableFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alias = match self {
            Self::Table {
                name,
                alias,
                is_final,
                sample,
            } => {
                for (i, part) in name.iter().enumerate() {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{part}")?;
                }
                if *is_final {
                    write!(f, " FINAL")?;
                }
                if let Some(sample) = sample {
                    write!(f, " SAMPLE {sample}")?;
                }
                alias
            }
            Self::Function { function, alias } => {
                write!(f, "{function}")?;
                alias
            }
            Self::Derived { subquery, alias } => {
                write!(f, "({subquery})")?;
                alias
            }
        };
        if let Some(alias) = alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

/// The join type keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    /// `JOIN` / `INNER JOIN`
    Inner,
    /// `LEFT [OUTER] JOIN`
    Left,
    /// `RIGHT [OUTER] JOIN`
    Right,
    /// `FULL [OUTER] JOIN`
    Full,
    /// `CROSS JOIN` or a comma
    Cross,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER JOIN"),
            Self::Left => write!(f, "LEFT JOIN"),
            Self::Right => write!(f, "RIGHT JOIN"),
            Self::Full => write!(f, "FULL JOIN"),
            Self::Cross => write!(f, "CROSS JOIN"),
        }
    }
}

/// The join condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JoinConstraint {
    /// `ON expr`
    On(Expr),
    /// `USING (a, b)` or `USING a`
    Using(Vec<Ident>),
    /// No condition.
    None,
}

/// A joined table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    /// `GLOBAL JOIN`.
    pub global: bool,
    /// The join type.
    pub kind: JoinKind,
    /// `ANY`, `ALL`, `ASOF`, `SEMI` or `ANTI`.
    pub strictness: Option<String>,
    /// The joined source.
    pub relation: TableFactor,
    /// The join condition.
    pub constraint: JoinConstraint,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.global {
            write!(f, "GLOBAL ")?;
        }
        if let Some(strictness) = &self.strictness {
            write!(f, "{strictness} ")?;
        }
        write!(f, "{} {}", self.kind, self.relation)?;
        match &self.constraint {
            JoinConstraint::On(expr) => write!(f, " ON {expr}"),
            JoinConstraint::Using(columns) => {
                write!(f, " USING (")?;
                comma_separated(f, columns)?;
                write!(f, ")")
            }
            JoinConstraint::None => Ok(()),
        }
    }
}

/// The `FROM` clause: a leading source followed by joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromClause {
    /// The first source.
    pub relation: TableFactor,
    /// Joined sources, in order.
    pub joins: Vec<Join>,
}

impl FromClause {
    /// Iterates over every source, the leading one first.
    pub fn relations(&self) -> impl Iterator<Item = &TableFactor> {
        std::iter::once(&self.relation).chain(self.joins.iter().map(|j| &j.relation))
    }
}

/// `[LEFT] ARRAY JOIN items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayJoin {
    /// `LEFT ARRAY JOIN`.
    pub left: bool,
    /// The unfolded arrays.
    pub items: Vec<SelectItem>,
}

/// A `GROUP BY` modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupByModifier {
    /// `WITH ROLLUP`
    Rollup,
    /// `WITH CUBE`
    Cube,
    /// `WITH TOTALS`
    Totals,
}

impl fmt::Display for GroupByModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rollup => write!(f, "WITH ROLLUP"),
            Self::Cube => write!(f, "WITH CUBE"),
            Self::Totals => write!(f, "WITH TOTALS"),
        }
    }
}

/// The `GROUP BY` clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupBy {
    /// The grouping keys.
    pub items: Vec<Expr>,
    /// Trailing modifiers.
    pub modifiers: Vec<GroupByModifier>,
}

/// An `ORDER BY` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderByExpr {
    /// The sort key.
    pub expr: Expr,
    /// `Some(true)` for ASC, `Some(false)` for DESC.
    pub asc: Option<bool>,
    /// `Some(true)` for NULLS FIRST, `Some(false)` for NULLS LAST.
    pub nulls_first: Option<bool>,
    /// `WITH FILL`.
    pub with_fill: bool,
}

impl fmt::Display for OrderByExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        match self.asc {
            Some(true) => write!(f, " ASC")?,
            Some(false) => write!(f, " DESC")?,
            None => {}
        }
        match self.nulls_first {
            Some(true) => write!(f, " NULLS FIRST")?,
            Some(false) => write!(f, " NULLS LAST")?,
            None => {}
        }
        if self.with_fill {
            write!(f, " WITH FILL")?;
        }
        Ok(())
    }
}

/// `WINDOW name AS (...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedWindow {
    /// The window name.
    pub name: Ident,
    /// The window definition.
    pub spec: WindowSpec,
}

/// `LIMIT n [OFFSET m] BY exprs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitBy {
    /// Rows kept per key.
    pub limit: Expr,
    /// Rows skipped per key.
    pub offset: Option<Expr>,
    /// The keys.
    pub by: Vec<Expr>,
}

/// `LIMIT` / `OFFSET`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Limit {
    /// Maximum number of rows.
    pub count: Option<Expr>,
    /// Rows skipped.
    pub offset: Option<Expr>,
}

/// A `SETTINGS` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    /// The setting name.
    pub name: Ident,
    /// The setting value.
    pub value: Expr,
}

/// The operator joining two SELECTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetOperator {
    /// `UNION`
    Union,
    /// `INTERSECT`
    Intersect,
    /// `EXCEPT`
    Except,
}

impl fmt::Display for SetOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Union => write!(f, "UNION"),
            Self::Intersect => write!(f, "INTERSECT"),
            Self::Except => write!(f, "EXCEPT"),
        }
    }
}

/// A trailing set-operation branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetBranch {
    /// The operator.
    pub op: SetOperator,
    /// `ALL` (`Some(true)`) or `DISTINCT` (`Some(false)`).
    pub all: Option<bool>,
    /// The branch query.
    pub select: SelectStatement,
}

/// A complete SELECT statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectStatement {
    /// `WITH` entries in definition order.
    pub with: Vec<WithItem>,
    /// `SELECT DISTINCT`.
    pub distinct: bool,
    /// The projection list.
    pub projection: Vec<SelectItem>,
    /// The `FROM` clause.
    pub from: Option<FromClause>,
    /// `ARRAY JOIN` clauses.
    pub array_joins: Vec<ArrayJoin>,
    /// `PREWHERE` condition.
    pub prewhere: Option<Expr>,
    /// `WHERE` condition.
    pub selection: Option<Expr>,
    /// `GROUP BY` clause.
    pub group_by: Option<GroupBy>,
    /// `HAVING` condition.
    pub having: Option<Expr>,
    /// `WINDOW` definitions.
    pub windows: Vec<NamedWindow>,
    /// `ORDER BY` entries.
    pub order_by: Vec<OrderByExpr>,
    /// `LIMIT ... BY`.
    pub limit_by: Option<LimitBy>,
    /// `LIMIT` / `OFFSET`.
    pub limit: Option<Limit>,
    /// `SETTINGS` entries.
    pub settings: Vec<Setting>,
    /// `FORMAT` name.
    pub format: Option<String>,
    /// Trailing `UNION` / `INTERSECT` / `EXCEPT` branches.
    pub set_branches: Vec<SetBranch>,
}

impl SelectStatement {
    /// Iterates over the CTE definitions of this statement's `WITH` clause.
    pub fn ctes(&self) -> impl Iterator<Item = (&Ident, &SelectStatement)> {
        self.with.iter().filter_map(|item| match item {
            WithItem::Cte { name, query } => Some((name, query.as_ref())),
            WithItem::Expression { .. } => None,
        })
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.with.is_empty() {
            write!(f, "WITH ")?;
            comma_separated(f, &self.with)?;
            write!(f, " ")?;
        }
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        comma_separated(f, &self.projection)?;
        if let Some(from) = &self.from {
            write!(f, " FROM {}", from.relation)?;
            for join in &from.joins {
                write!(f, " {join}")?;
            }
        }
        for array_join in &self.array_joins {
            let left = if array_join.left { "LEFT " } else { "" };
            write!(f, " {left}ARRAY JOIN ")?;
            comma_separated(f, &array_join.items)?;
        }
        if let Some(prewhere) = &self.prewhere {
            write!(f, " PREWHERE {prewhere}")?;
        }
        if let Some(selection) = &self.selection {
            write!(f, " WHERE {selection}")?;
        }
        if let Some(group_by) = &self.group_by {
            write!(f, " GROUP BY ")?;
            comma_separated(f, &group_by.items)?;
            for modifier in &group_by.modifiers {
                write!(f, " {modifier}")?;
            }
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if !self.windows.is_empty() {
            write!(f, " WINDOW ")?;
            for (i, window) in self.windows.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} AS ({})", window.name, window.spec)?;
            }
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY ")?;
            comma_separated(f, &self.order_by)?;
        }
        if let Some(limit_by) = &self.limit_by {
            write!(f, " LIMIT {}", limit_by.limit)?;
            if let Some(offset) = &limit_by.offset {
                write!(f, " OFFSET {offset}")?;
            }
            write!(f, " BY ")?;
            comma_separated(f, &limit_by.by)?;
        }
        if let Some(limit) = &self.limit {
            if let Some(count) = &limit.count {
                write!(f, " LIMIT {count}")?;
            }
            if let Some(offset) = &limit.offset {
                write!(f, " OFFSET {offset}")?;
            }
        }
        if !self.settings.is_empty() {
            write!(f, " SETTINGS ")?;
            for (i, setting) in self.settings.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{} = {}", setting.name, setting.value)?;
            }
        }
        if let Some(format) = &self.format {
            write!(f, " FORMAT {format}")?;
        }
        for branch in &self.set_branches {
            write!(f, " {}", branch.op)?;
            match branch.all {
                Some(true) => write!(f, " ALL")?,
                Some(false) => write!(f, " DISTINCT")?,
                None => {}
            }
            write!(f, " {}", branch.select)?;
        }
        Ok(())
    }
}

/// A parsed top-level statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    /// A SELECT, possibly with a `WITH` prefix or set operations.
    Select(Box<SelectStatement>),
    /// Any other statement, identified by its leading keyword. Its body is
    /// never parsed.
    Other(String),
}
