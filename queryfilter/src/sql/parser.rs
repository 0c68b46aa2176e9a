//! Recursive-descent parser for the ClickHouse SELECT dialect.
//!
//! Parses statements like:
//! - `SELECT avg(value) FROM metrics WHERE metric_name = 'cpu' GROUP BY region`
//! - `WITH t AS (SELECT * FROM metrics) SELECT * FROM t`
//! - `WITH toUInt64(60) AS step SELECT ... FROM a INNER JOIN (SELECT ...) AS b USING fp`
//!
//! Only the first statement is parsed. A first statement that is not a
//! SELECT is recognized by its leading keyword and left unparsed.

use super::ast::{
    ArrayJoin, BinaryOperator, Expr, FromClause, Function, GroupBy, GroupByModifier, Ident, Join,
    JoinConstraint, JoinKind, Limit, LimitBy, Literal, NamedWindow, OrderByExpr, SelectItem,
    SelectStatement, SetBranch, SetOperator, Setting, Statement, TableFactor, UnaryOperator,
    WhenClause, WindowRef, WindowSpec, WithItem,
};
use super::lexer::{char_offset, leading_word, tokenize, unescape_string, Token, TokenKind};
use crate::error::Span;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur while parsing SQL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The query syntax is invalid.
    #[error("Invalid query syntax at {span}: {message}")]
    SyntaxError {
        /// Description of the problem.
        message: String,
        /// Character offsets of the problem.
        span: Span,
    },

    /// An unexpected token was encountered.
    #[error("Unexpected token at {span}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        /// What was expected.
        expected: String,
        /// What was found.
        found: String,
        /// Character offsets of the found token.
        span: Span,
    },

    /// The query is empty.
    #[error("Empty query")]
    EmptyQuery,
}

impl ParseError {
    /// Returns the location of the error, if known.
    #[must_use]
    pub fn span(&self) -> Option<Span> {
        match self {
            Self::SyntaxError { span, .. } | Self::UnexpectedToken { span, .. } => Some(*span),
            Self::EmptyQuery => None,
        }
    }
}

/// Keywords that can never start an expression. A bare occurrence is only
/// accepted where it closes a list (before `,`, `)` or the end of the
/// statement), and the analyzer rejects it later.
static RESERVED_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "SELECT", "FROM", "WHERE", "PREWHERE", "GROUP", "HAVING", "ORDER", "LIMIT", "OFFSET",
        "UNION", "INTERSECT", "EXCEPT", "JOIN", "ON", "USING", "AS", "SETTINGS", "FORMAT",
        "WINDOW", "INTO", "AND", "OR", "IN", "IS", "LIKE", "ILIKE", "BETWEEN", "WHEN", "THEN",
        "ELSE", "END", "BY",
    ]
    .into_iter()
    .collect()
});

/// Words that end an expression instead of being read as an implicit alias.
static ALIAS_STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER", "GLOBAL", "LOCAL", "ANY", "ALL",
        "ASOF", "SEMI", "ANTI", "PASTE", "ARRAY", "FINAL", "SAMPLE", "WITH", "ASC", "DESC",
        "NULLS", "COLLATE", "DISTINCT", "NOT", "OVER", "QUALIFY",
    ]
    .into_iter()
    .collect()
});

/// Leading keywords of statements that are recognized but never parsed.
static OTHER_STATEMENTS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "INSERT", "DELETE", "CREATE", "DROP", "ALTER", "UPDATE", "TRUNCATE", "RENAME",
        "OPTIMIZE", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "SET", "USE", "GRANT", "REVOKE",
        "SYSTEM", "KILL", "ATTACH", "DETACH", "EXCHANGE", "CHECK", "WATCH", "BACKUP", "RESTORE",
        "UNDROP", "MOVE",
    ]
    .into_iter()
    .collect()
});

static INTERVAL_UNITS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "NANOSECOND", "MICROSECOND", "MILLISECOND", "SECOND", "MINUTE", "HOUR", "DAY", "WEEK",
        "MONTH", "QUARTER", "YEAR",
    ]
    .into_iter()
    .collect()
});

/// Nesting budget shared by parenthesized expressions, call arguments,
/// `CASE` branches, unary operators and sub-queries.
const MAX_NESTING_DEPTH: usize = 64;

/// Budget spent by one sub-query level.
const QUERY_NESTING_COST: usize = 4;

/// Maximum height of an expression built from an operator chain such as
/// `a OR b OR c`.
const MAX_EXPR_DEPTH: usize = 256;

/// Returns true if `word` is a keyword that cannot name a column unquoted.
#[must_use]
pub fn is_reserved_keyword(word: &str) -> bool {
    RESERVED_KEYWORDS.contains(word.to_ascii_uppercase().as_str())
}

/// Parses the first statement of `input`.
///
/// # Errors
///
/// Returns a `ParseError` if:
/// - The query is empty
/// - The first statement is neither a SELECT nor a recognized statement
/// - The SELECT has invalid syntax or unexpected trailing content
///
/// # Examples
///
/// ```
/// use queryfilter::sql::{parse_statement, Statement};
///
/// let stmt = parse_statement("SELECT * FROM metrics WHERE metric_name = 'cpu'").unwrap();
/// assert!(matches!(stmt, Statement::Select(_)));
///
/// let stmt = parse_statement("DROP TABLE metrics").unwrap();
/// assert_eq!(stmt, Statement::Other("DROP".to_string()));
/// ```
pub fn parse_statement(input: &str) -> Result<Statement, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::EmptyQuery);
    }

    if let Some(word) = leading_word(input) {
        let keyword = word.to_ascii_uppercase();
        if OTHER_STATEMENTS.contains(keyword.as_str()) {
            return Ok(Statement::Other(keyword));
        }
    }

    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::EmptyQuery);
    }

    let mut parser = SqlParser::new(input, &tokens);
    let select = parser.statement()?;
    Ok(Statement::Select(Box::new(select)))
}

/// Parses `input` and requires it to be a SELECT statement.
///
/// # Errors
///
/// Returns a `ParseError` if the input is not a valid SELECT.
pub fn parse_select(input: &str) -> Result<SelectStatement, ParseError> {
    match parse_statement(input)? {
        Statement::Select(select) => Ok(*select),
        Statement::Other(keyword) => Err(ParseError::UnexpectedToken {
            expected: "SELECT".to_string(),
            found: keyword,
            span: Span::new(0, 0),
        }),
    }
}

type ParseResult<T> = Result<T, ParseError>;

struct SqlParser<'a> {
    source: &'a str,
    tokens: &'a [Token<'a>],
    pos: usize,
    depth: usize,
}

impl<'a> SqlParser<'a> {
    fn new(source: &'a str, tokens: &'a [Token<'a>]) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn peek_nth(&self, n: usize) -> Option<&Token<'a>> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.tokens.get(self.pos).copied();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn peek_nth_keyword(&self, n: usize, keyword: &str) -> bool {
        self.peek_nth(n).is_some_and(|t| t.is_keyword(keyword))
    }

    fn peek_symbol(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|t| t.is_symbol(symbol))
    }

    fn peek_nth_symbol(&self, n: usize, symbol: &str) -> bool {
        self.peek_nth(n).is_some_and(|t| t.is_symbol(symbol))
    }

    fn parse_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the whole keyword sequence or nothing.
    fn parse_keywords(&mut self, keywords: &[&str]) -> bool {
        let matches = keywords
            .iter()
            .enumerate()
            .all(|(i, kw)| self.peek_nth_keyword(i, kw));
        if matches {
            self.pos += keywords.len();
        }
        matches
    }

    fn consume_symbol(&mut self, symbol: &str) -> bool {
        if self.peek_symbol(symbol) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        if self.parse_keyword(keyword) {
            Ok(())
        } else {
            Err(self.expected(keyword))
        }
    }

    fn expect_symbol(&mut self, symbol: &str) -> ParseResult<()> {
        if self.consume_symbol(symbol) {
            Ok(())
        } else {
            Err(self.expected(&format!("'{symbol}'")))
        }
    }

    fn span_of(&self, token: &Token<'_>) -> Span {
        Span::new(
            char_offset(self.source, token.offset),
            char_offset(self.source, token.end),
        )
    }

    /// Span of the next token, or an empty span at the end of input.
    fn current_span(&self) -> Span {
        match self.peek() {
            Some(token) => self.span_of(token),
            None => {
                let end = self.source.chars().count();
                Span::new(end, end)
            }
        }
    }

    fn expected(&self, expected: &str) -> ParseError {
        let found = match self.peek() {
            Some(token) => self.source[token.offset..token.end].to_string(),
            None => "end of input".to_string(),
        };
        ParseError::UnexpectedToken {
            expected: expected.to_string(),
            found,
            span: self.current_span(),
        }
    }

    fn too_deep(&self) -> ParseError {
        ParseError::SyntaxError {
            message: "query nesting too deep".to_string(),
            span: self.current_span(),
        }
    }

    /// Runs `parse` one nesting level deeper, failing once the nesting
    /// budget is spent.
    fn nested<T>(
        &mut self,
        cost: usize,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth + cost > MAX_NESTING_DEPTH {
            return Err(self.too_deep());
        }
        self.depth += cost;
        let result = parse(self);
        self.depth -= cost;
        result
    }

    /// Rejects operator chains taller than `MAX_EXPR_DEPTH`.
    fn check_height(&self, expr: &Expr) -> ParseResult<()> {
        if expr.depth() > MAX_EXPR_DEPTH {
            return Err(self.too_deep());
        }
        Ok(())
    }

    /// True if the upcoming tokens open a sub-query: `(SELECT` or `(WITH`.
    fn at_subquery(&self) -> bool {
        self.peek_symbol("(")
            && (self.peek_nth_keyword(1, "SELECT") || self.peek_nth_keyword(1, "WITH"))
    }

    /// True if the next token closes a list or the statement.
    fn at_list_end(&self, n: usize) -> bool {
        match self.peek_nth(n) {
            None => true,
            Some(t) => t.is_symbol(",") || t.is_symbol(")") || t.is_symbol(";"),
        }
    }

    fn ident(&mut self) -> ParseResult<Ident> {
        match self.peek().copied() {
            Some(Token {
                kind: TokenKind::Word,
                text,
                ..
            }) => {
                self.pos += 1;
                Ok(Ident::new(text))
            }
            Some(Token {
                kind: TokenKind::QuotedIdent(quote),
                text,
                ..
            }) => {
                self.pos += 1;
                Ok(Ident::quoted(text, quote))
            }
            _ => Err(self.expected("identifier")),
        }
    }

    /// Reads an optional alias, with or without `AS`.
    fn optional_alias(&mut self) -> ParseResult<Option<Ident>> {
        if self.parse_keyword("AS") {
            return self.ident().map(Some);
        }
        match self.peek().copied() {
            Some(t) if matches!(t.kind, TokenKind::QuotedIdent(_)) => self.ident().map(Some),
            Some(t) if t.kind == TokenKind::Word => {
                let upper = t.text.to_ascii_uppercase();
                if RESERVED_KEYWORDS.contains(upper.as_str())
                    || ALIAS_STOP_WORDS.contains(upper.as_str())
                {
                    Ok(None)
                } else {
                    self.ident().map(Some)
                }
            }
            _ => Ok(None),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self) -> ParseResult<SelectStatement> {
        match self.peek() {
            Some(t) if t.is_keyword("SELECT") || t.is_keyword("WITH") || t.is_symbol("(") => {}
            _ => return Err(self.expected("SELECT")),
        }

        let select = self.query()?;
        self.consume_symbol(";");

        if let Some(token) = self.peek() {
            return Err(ParseError::SyntaxError {
                message: format!(
                    "Unexpected trailing content: '{}'",
                    &self.source[token.offset..token.end]
                ),
                span: self.span_of(token),
            });
        }
        Ok(select)
    }

    fn query(&mut self) -> ParseResult<SelectStatement> {
        self.nested(QUERY_NESTING_COST, Self::query_body)
    }

    fn query_body(&mut self) -> ParseResult<SelectStatement> {
        let with = if self.parse_keyword("WITH") {
            self.with_items()?
        } else {
            Vec::new()
        };

        let mut select = self.query_term()?;
        if !with.is_empty() {
            let mut all = with;
            all.append(&mut select.with);
            select.with = all;
        }

        while let Some(op) = self.set_operator() {
            let all = if self.parse_keyword("ALL") {
                Some(true)
            } else if self.parse_keyword("DISTINCT") {
                Some(false)
            } else {
                None
            };
            let branch = self.query_term()?;
            select.set_branches.push(SetBranch {
                op,
                all,
                select: branch,
            });
        }

        Ok(select)
    }

    fn query_term(&mut self) -> ParseResult<SelectStatement> {
        if self.peek_symbol("(") {
            self.pos += 1;
            let select = self.query()?;
            self.expect_symbol(")")?;
            return Ok(select);
        }
        if self.peek_keyword("WITH") {
            return self.query();
        }
        self.select_core()
    }

    fn set_operator(&mut self) -> Option<SetOperator> {
        if self.parse_keyword("UNION") {
            Some(SetOperator::Union)
        } else if self.parse_keyword("INTERSECT") {
            Some(SetOperator::Intersect)
        } else if self.parse_keyword("EXCEPT") {
            Some(SetOperator::Except)
        } else {
            None
        }
    }

    fn with_items(&mut self) -> ParseResult<Vec<WithItem>> {
        let mut items = Vec::new();
        loop {
            let is_cte = self
                .peek()
                .is_some_and(|t| matches!(t.kind, TokenKind::Word | TokenKind::QuotedIdent(_)))
                && self.peek_nth_keyword(1, "AS")
                && self.peek_nth_symbol(2, "(")
                && (self.peek_nth_keyword(3, "SELECT") || self.peek_nth_keyword(3, "WITH"));

            if is_cte {
                let name = self.ident()?;
                self.expect_keyword("AS")?;
                self.expect_symbol("(")?;
                let query = self.query()?;
                self.expect_symbol(")")?;
                items.push(WithItem::Cte {
                    name,
                    query: Box::new(query),
                });
            } else {
                let expr = self.expr()?;
                self.expect_keyword("AS")?;
                let alias = self.ident()?;
                items.push(WithItem::Expression { expr, alias });
            }

            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(items)
    }

    fn select_core(&mut self) -> ParseResult<SelectStatement> {
        self.expect_keyword("SELECT")?;
        let mut select = SelectStatement {
            distinct: self.parse_keyword("DISTINCT"),
            ..SelectStatement::default()
        };
        if !select.distinct {
            self.parse_keyword("ALL");
        }

        select.projection = self.select_items()?;

        if self.parse_keyword("FROM") {
            let (from, array_joins) = self.from_clause()?;
            select.from = Some(from);
            select.array_joins = array_joins;
        }
        while let Some(array_join) = self.array_join()? {
            select.array_joins.push(array_join);
        }

        if self.parse_keyword("PREWHERE") {
            select.prewhere = Some(self.expr()?);
        }
        if self.parse_keyword("WHERE") {
            select.selection = Some(self.expr()?);
        }
        if self.parse_keywords(&["GROUP", "BY"]) {
            select.group_by = Some(self.group_by()?);
        }
        if self.parse_keyword("HAVING") {
            select.having = Some(self.expr()?);
        }
        if self.parse_keyword("WINDOW") {
            select.windows = self.named_windows()?;
        }
        if self.parse_keywords(&["ORDER", "BY"]) {
            select.order_by = self.order_by_list()?;
        }
        self.limit_clauses(&mut select)?;
        if self.parse_keyword("SETTINGS") {
            select.settings = self.settings()?;
        }
        if self.parse_keyword("FORMAT") {
            select.format = Some(self.ident()?.value);
        }

        Ok(select)
    }

    fn select_items(&mut self) -> ParseResult<Vec<SelectItem>> {
        let mut items = Vec::new();
        loop {
            let expr = self.expr()?;
            let alias = self.optional_alias()?;
            items.push(SelectItem { expr, alias });
            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(items)
    }

    // ========================================================================
    // FROM and JOIN
    // ========================================================================

    fn from_clause(&mut self) -> ParseResult<(FromClause, Vec<ArrayJoin>)> {
        let relation = self.table_factor()?;
        let mut joins = Vec::new();
        let mut array_joins = Vec::new();

        loop {
            if let Some(array_join) = self.array_join()? {
                array_joins.push(array_join);
                continue;
            }
            if self.consume_symbol(",") {
                joins.push(Join {
                    global: false,
                    kind: JoinKind::Cross,
                    strictness: None,
                    relation: self.table_factor()?,
                    constraint: JoinConstraint::None,
                });
                continue;
            }
            let Some((global, kind, strictness)) = self.join_operator() else {
                break;
            };
            let relation = self.table_factor()?;
            let constraint = self.join_constraint()?;
            joins.push(Join {
                global,
                kind,
                strictness,
                relation,
                constraint,
            });
        }

        Ok((FromClause { relation, joins }, array_joins))
    }

    fn array_join(&mut self) -> ParseResult<Option<ArrayJoin>> {
        let left = if self.parse_keywords(&["LEFT", "ARRAY", "JOIN"]) {
            true
        } else if self.parse_keywords(&["ARRAY", "JOIN"]) {
            false
        } else {
            return Ok(None);
        };
        let items = self.select_items()?;
        Ok(Some(ArrayJoin { left, items }))
    }

    fn join_operator(&mut self) -> Option<(bool, JoinKind, Option<String>)> {
        let start = self.pos;
        let global = self.parse_keyword("GLOBAL");
        if !global {
            self.parse_keyword("LOCAL");
        }

        let mut strictness = self.join_strictness();
        let kind = if self.parse_keyword("INNER") {
            JoinKind::Inner
        } else if self.parse_keyword("LEFT") {
            JoinKind::Left
        } else if self.parse_keyword("RIGHT") {
            JoinKind::Right
        } else if self.parse_keyword("FULL") {
            JoinKind::Full
        } else if self.parse_keyword("CROSS") || self.parse_keyword("PASTE") {
            JoinKind::Cross
        } else {
            JoinKind::Inner
        };
        self.parse_keyword("OUTER");
        if strictness.is_none() {
            strictness = self.join_strictness();
        }

        if self.parse_keyword("JOIN") {
            Some((global, kind, strictness))
        } else {
            self.pos = start;
            None
        }
    }

    fn join_strictness(&mut self) -> Option<String> {
        ["ANY", "ALL", "ASOF", "SEMI", "ANTI"]
            .into_iter()
            .find(|kw| self.parse_keyword(kw))
            .map(str::to_string)
    }

    fn join_constraint(&mut self) -> ParseResult<JoinConstraint> {
        if self.parse_keyword("ON") {
            return Ok(JoinConstraint::On(self.expr()?));
        }
        if self.parse_keyword("USING") {
            if self.consume_symbol("(") {
                let mut columns = vec![self.ident()?];
                while self.consume_symbol(",") {
                    columns.push(self.ident()?);
                }
                self.expect_symbol(")")?;
                return Ok(JoinConstraint::Using(columns));
            }
            return Ok(JoinConstraint::Using(vec![self.ident()?]));
        }
        Ok(JoinConstraint::None)
    }

    fn table_factor(&mut self) -> ParseResult<TableFactor> {
        if self.at_subquery() {
            self.pos += 1;
            let subquery = self.query()?;
            self.expect_symbol(")")?;
            let alias = self.optional_alias()?;
            return Ok(TableFactor::Derived {
                subquery: Box::new(subquery),
                alias,
            });
        }

        let mut name = vec![self.ident()?];
        while self.peek_symbol(".") {
            self.pos += 1;
            name.push(self.ident()?);
        }

        if self.peek_symbol("(") && name.len() == 1 {
            let function = self.function_call(name.remove(0).value)?;
            let alias = self.optional_alias()?;
            return Ok(TableFactor::Function { function, alias });
        }

        let mut is_final = self.parse_keyword("FINAL");
        let sample = if self.parse_keyword("SAMPLE") {
            let ratio = self.additive()?;
            if self.parse_keyword("OFFSET") {
                self.additive()?;
            }
            Some(ratio)
        } else {
            None
        };
        let alias = self.optional_alias()?;
        if !is_final {
            is_final = self.parse_keyword("FINAL");
        }

        Ok(TableFactor::Table {
            name,
            alias,
            is_final,
            sample,
        })
    }

    // ========================================================================
    // Trailing clauses
    // ========================================================================

    fn group_by(&mut self) -> ParseResult<GroupBy> {
        let items = self.expr_list()?;
        let mut modifiers = Vec::new();
        loop {
            if self.parse_keywords(&["WITH", "ROLLUP"]) {
                modifiers.push(GroupByModifier::Rollup);
            } else if self.parse_keywords(&["WITH", "CUBE"]) {
                modifiers.push(GroupByModifier::Cube);
            } else if self.parse_keywords(&["WITH", "TOTALS"]) {
                modifiers.push(GroupByModifier::Totals);
            } else {
                break;
            }
        }
        Ok(GroupBy { items, modifiers })
    }

    fn named_windows(&mut self) -> ParseResult<Vec<NamedWindow>> {
        let mut windows = Vec::new();
        loop {
            let name = self.ident()?;
            self.expect_keyword("AS")?;
            self.expect_symbol("(")?;
            let spec = self.window_spec()?;
            self.expect_symbol(")")?;
            windows.push(NamedWindow { name, spec });
            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(windows)
    }

    /// Parses the inside of `OVER (...)` or `WINDOW w AS (...)`.
    fn window_spec(&mut self) -> ParseResult<WindowSpec> {
        let mut spec = WindowSpec::default();
        if self.parse_keywords(&["PARTITION", "BY"]) {
            spec.partition_by = self.expr_list()?;
        }
        if self.parse_keywords(&["ORDER", "BY"]) {
            spec.order_by = self.order_by_list()?;
        }
        if self.peek_keyword("ROWS") || self.peek_keyword("RANGE") {
            let mut words = Vec::new();
            while let Some(token) = self.peek().copied() {
                if token.is_symbol(")") {
                    break;
                }
                words.push(self.source[token.offset..token.end].to_ascii_uppercase());
                self.pos += 1;
            }
            spec.frame = Some(words.join(" "));
        }
        Ok(spec)
    }

    fn order_by_list(&mut self) -> ParseResult<Vec<OrderByExpr>> {
        let mut items = Vec::new();
        loop {
            let expr = self.expr()?;
            let asc = if self.parse_keyword("ASC") || self.parse_keyword("ASCENDING") {
                Some(true)
            } else if self.parse_keyword("DESC") || self.parse_keyword("DESCENDING") {
                Some(false)
            } else {
                None
            };
            let nulls_first = if self.parse_keywords(&["NULLS", "FIRST"]) {
                Some(true)
            } else if self.parse_keywords(&["NULLS", "LAST"]) {
                Some(false)
            } else {
                None
            };
            if self.parse_keyword("COLLATE") {
                self.advance();
            }
            let with_fill = self.parse_keywords(&["WITH", "FILL"]);
            if with_fill {
                for keyword in ["FROM", "TO", "STEP"] {
                    if self.parse_keyword(keyword) {
                        self.additive()?;
                    }
                }
            }
            items.push(OrderByExpr {
                expr,
                asc,
                nulls_first,
                with_fill,
            });
            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(items)
    }

    fn limit_clauses(&mut self, select: &mut SelectStatement) -> ParseResult<()> {
        while self.parse_keyword("LIMIT") {
            let first = self.additive()?;
            let (count, offset) = if self.consume_symbol(",") {
                (self.additive()?, Some(first))
            } else if self.parse_keyword("OFFSET") {
                (first, Some(self.additive()?))
            } else {
                (first, None)
            };

            if self.parse_keyword("BY") {
                select.limit_by = Some(LimitBy {
                    limit: count,
                    offset,
                    by: self.expr_list()?,
                });
            } else {
                self.parse_keywords(&["WITH", "TIES"]);
                select.limit = Some(Limit {
                    count: Some(count),
                    offset,
                });
                break;
            }
        }

        if self.parse_keyword("OFFSET") {
            let offset = self.additive()?;
            if !self.parse_keyword("ROWS") {
                self.parse_keyword("ROW");
            }
            let limit = select.limit.get_or_insert(Limit {
                count: None,
                offset: None,
            });
            limit.offset = Some(offset);
        }
        Ok(())
    }

    fn settings(&mut self) -> ParseResult<Vec<Setting>> {
        let mut settings = Vec::new();
        loop {
            let name = self.ident()?;
            self.expect_symbol("=")?;
            let value = self.additive()?;
            settings.push(Setting { name, value });
            if !self.consume_symbol(",") {
                break;
            }
        }
        Ok(settings)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr_list(&mut self) -> ParseResult<Vec<Expr>> {
        let mut items = vec![self.expr()?];
        while self.consume_symbol(",") {
            items.push(self.expr()?);
        }
        Ok(items)
    }

    fn expr(&mut self) -> ParseResult<Expr> {
        self.nested(1, Self::lambda_or_expr)
    }

    fn lambda_or_expr(&mut self) -> ParseResult<Expr> {
        let single_param_lambda = self
            .peek()
            .is_some_and(|t| t.kind == TokenKind::Word)
            && self.peek_nth_symbol(1, "->");
        if single_param_lambda {
            let param = self.ident()?;
            self.pos += 1;
            let body = self.expr()?;
            return Ok(Expr::Lambda {
                params: vec![param],
                body: Box::new(body),
            });
        }
        self.or_expr()
    }

    fn or_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.and_expr()?;
        while self.parse_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::Or,
                right: Box::new(right),
            };
            self.check_height(&left)?;
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.not_expr()?;
        while self.parse_keyword("AND") {
            let right = self.not_expr()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op: BinaryOperator::And,
                right: Box::new(right),
            };
            self.check_height(&left)?;
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> ParseResult<Expr> {
        if self.parse_keyword("NOT") {
            let expr = self.nested(1, Self::not_expr)?;
            return Ok(Expr::UnaryOp {
                op: UnaryOperator::Not,
                expr: Box::new(expr),
            });
        }
        self.comparison()
    }

    fn comparison_operator(&mut self) -> Option<BinaryOperator> {
        let op = match self.peek() {
            Some(t) if t.kind == TokenKind::Symbol => match t.text {
                "=" | "==" => BinaryOperator::Eq,
                "!=" | "<>" => BinaryOperator::NotEq,
                "<" => BinaryOperator::Lt,
                "<=" => BinaryOperator::LtEq,
                ">" => BinaryOperator::Gt,
                ">=" => BinaryOperator::GtEq,
                _ => return None,
            },
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.additive()?;
        loop {
            self.check_height(&left)?;
            if let Some(op) = self.comparison_operator() {
                let right = self.additive()?;
                left = Expr::BinaryOp {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                };
                continue;
            }

            if self.parse_keywords(&["IS", "NOT", "NULL"]) {
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated: true,
                };
                continue;
            }
            if self.parse_keywords(&["IS", "NULL"]) {
                left = Expr::IsNull {
                    expr: Box::new(left),
                    negated: false,
                };
                continue;
            }

            let global = self.peek_keyword("GLOBAL")
                && (self.peek_nth_keyword(1, "IN")
                    || (self.peek_nth_keyword(1, "NOT") && self.peek_nth_keyword(2, "IN")));
            if global {
                self.pos += 1;
            }
            let negated = self.peek_keyword("NOT")
                && ["IN", "LIKE", "ILIKE", "BETWEEN"]
                    .iter()
                    .any(|kw| self.peek_nth_keyword(1, kw));
            if negated {
                self.pos += 1;
            }

            if self.parse_keyword("IN") {
                left = self.in_rhs(left, negated, global)?;
            } else if self.peek_keyword("LIKE") || self.peek_keyword("ILIKE") {
                let case_insensitive = self.peek_keyword("ILIKE");
                self.pos += 1;
                let pattern = self.additive()?;
                left = Expr::Like {
                    expr: Box::new(left),
                    pattern: Box::new(pattern),
                    negated,
                    case_insensitive,
                };
            } else if self.parse_keyword("BETWEEN") {
                let low = self.additive()?;
                self.expect_keyword("AND")?;
                let high = self.additive()?;
                left = Expr::Between {
                    expr: Box::new(left),
                    negated,
                    low: Box::new(low),
                    high: Box::new(high),
                };
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn in_rhs(&mut self, expr: Expr, negated: bool, global: bool) -> ParseResult<Expr> {
        if self.at_subquery() {
            self.pos += 1;
            let subquery = self.query()?;
            self.expect_symbol(")")?;
            return Ok(Expr::InSubquery {
                expr: Box::new(expr),
                subquery: Box::new(subquery),
                negated,
                global,
            });
        }
        if self.consume_symbol("(") {
            let list = if self.peek_symbol(")") {
                Vec::new()
            } else {
                self.expr_list()?
            };
            self.expect_symbol(")")?;
            return Ok(Expr::InList {
                expr: Box::new(expr),
                list,
                negated,
                global,
            });
        }
        let target = self.additive()?;
        Ok(Expr::InExpr {
            expr: Box::new(expr),
            target: Box::new(target),
            negated,
            global,
        })
    }

    fn additive(&mut self) -> ParseResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = if self.peek_symbol("+") {
                BinaryOperator::Plus
            } else if self.peek_symbol("-") {
                BinaryOperator::Minus
            } else if self.peek_symbol("||") {
                BinaryOperator::Concat
            } else {
                break;
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
            self.check_height(&left)?;
        }
        Ok(left)
    }

    fn multiplicative(&mut self) -> ParseResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = if self.peek_symbol("*") {
                BinaryOperator::Multiply
            } else if self.peek_symbol("/") {
                BinaryOperator::Divide
            } else if self.peek_symbol("%") {
                BinaryOperator::Modulo
            } else {
                break;
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::BinaryOp {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
            self.check_height(&left)?;
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = if self.peek_symbol("-") {
            UnaryOperator::Minus
        } else if self.peek_symbol("+") {
            UnaryOperator::Plus
        } else {
            return self.postfix();
        };
        self.pos += 1;
        let expr = self.nested(1, Self::unary)?;
        Ok(Expr::UnaryOp {
            op,
            expr: Box::new(expr),
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            self.check_height(&expr)?;
            if self.consume_symbol("::") {
                let data_type = self.data_type()?;
                expr = Expr::Cast {
                    expr: Box::new(expr),
                    data_type,
                };
            } else if self.consume_symbol("[") {
                let index = self.expr()?;
                self.expect_symbol("]")?;
                expr = Expr::Index {
                    expr: Box::new(expr),
                    index: Box::new(index),
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Reads a type name such as `UInt64` or `Nullable(String)` as text.
    fn data_type(&mut self) -> ParseResult<String> {
        let name = self.ident()?.value;
        if !self.peek_symbol("(") {
            return Ok(name);
        }
        let start = self.peek().map_or(0, |t| t.offset);
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            if token.is_symbol("(") {
                depth += 1;
            } else if token.is_symbol(")") {
                depth -= 1;
                if depth == 0 {
                    return Ok(format!("{name}{}", &self.source[start..token.end]));
                }
            }
        }
        Err(self.expected("')'"))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let Some(token) = self.peek().copied() else {
            return Err(self.expected("expression"));
        };

        match token.kind {
            TokenKind::Number => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::Number(token.text.to_string())))
            }
            TokenKind::String => {
                self.pos += 1;
                Ok(Expr::Literal(Literal::String(unescape_string(token.text))))
            }
            TokenKind::QuotedIdent(_) => self.identifier_chain(),
            TokenKind::Symbol => match token.text {
                "(" => self.parenthesized(),
                "[" => {
                    self.pos += 1;
                    let items = if self.peek_symbol("]") {
                        Vec::new()
                    } else {
                        self.expr_list()?
                    };
                    self.expect_symbol("]")?;
                    Ok(Expr::Array(items))
                }
                "*" => {
                    self.pos += 1;
                    Ok(Expr::Wildcard(Vec::new()))
                }
                _ => Err(self.expected("expression")),
            },
            TokenKind::Word => self.word_expr(token),
        }
    }

    fn parenthesized(&mut self) -> ParseResult<Expr> {
        if self.at_subquery() {
            self.pos += 1;
            let subquery = self.query()?;
            self.expect_symbol(")")?;
            return Ok(Expr::Subquery(Box::new(subquery)));
        }

        self.pos += 1;
        let mut items = self.expr_list()?;
        self.expect_symbol(")")?;

        if self.consume_symbol("->") {
            let mut params = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Expr::Identifier(ident) => params.push(ident),
                    _ => return Err(self.expected("lambda parameter")),
                }
            }
            let body = self.expr()?;
            return Ok(Expr::Lambda {
                params,
                body: Box::new(body),
            });
        }

        if items.len() == 1 {
            Ok(Expr::Nested(Box::new(items.remove(0))))
        } else {
            Ok(Expr::Tuple(items))
        }
    }

    fn word_expr(&mut self, token: Token<'a>) -> ParseResult<Expr> {
        let upper = token.text.to_ascii_uppercase();
        let call = self.peek_nth_symbol(1, "(");

        match upper.as_str() {
            "CASE" => {
                self.pos += 1;
                return self.case_expr();
            }
            "EXISTS" if call => {
                self.pos += 1;
                if !self.at_subquery() {
                    return Err(self.expected("sub-query"));
                }
                self.pos += 1;
                let subquery = self.query()?;
                self.expect_symbol(")")?;
                return Ok(Expr::Exists(Box::new(subquery)));
            }
            "INTERVAL" if !call => {
                self.pos += 1;
                return self.interval();
            }
            "NULL" if !call => {
                self.pos += 1;
                return Ok(Expr::Literal(Literal::Null));
            }
            "TRUE" | "FALSE" if !call => {
                self.pos += 1;
                return Ok(Expr::Literal(Literal::Boolean(upper == "TRUE")));
            }
            "NAN" | "INF" if !call => {
                self.pos += 1;
                return Ok(Expr::Literal(Literal::Number(token.text.to_string())));
            }
            _ => {}
        }

        if call {
            self.pos += 1;
            return self.function_call(token.text.to_string()).map(Expr::Function);
        }

        if RESERVED_KEYWORDS.contains(upper.as_str()) && !self.at_list_end(1) {
            return Err(ParseError::UnexpectedToken {
                expected: "expression".to_string(),
                found: token.text.to_string(),
                span: self.span_of(&token),
            });
        }

        self.identifier_chain()
    }

    fn identifier_chain(&mut self) -> ParseResult<Expr> {
        let mut parts = vec![self.ident()?];
        while self.peek_symbol(".") {
            let next_is_part = self
                .peek_nth(1)
                .is_some_and(|t| matches!(t.kind, TokenKind::Word | TokenKind::QuotedIdent(_)));
            if self.peek_nth_symbol(1, "*") {
                self.pos += 2;
                return Ok(Expr::Wildcard(parts));
            }
            if !next_is_part {
                break;
            }
            self.pos += 1;
            parts.push(self.ident()?);
        }

        if parts.len() == 1 {
            Ok(Expr::Identifier(parts.remove(0)))
        } else {
            Ok(Expr::CompoundIdentifier(parts))
        }
    }

    /// Parses `(args) [(args)] [OVER ...]` after the function name.
    fn function_call(&mut self, name: String) -> ParseResult<Function> {
        let (mut distinct, mut args) = self.call_arguments()?;
        let mut params = None;
        if self.peek_symbol("(") {
            let (inner_distinct, inner_args) = self.call_arguments()?;
            params = Some(std::mem::replace(&mut args, inner_args));
            distinct = inner_distinct;
        }

        let over = if self.parse_keyword("OVER") {
            if self.consume_symbol("(") {
                let spec = self.window_spec()?;
                self.expect_symbol(")")?;
                Some(WindowRef::Spec(spec))
            } else {
                Some(WindowRef::Named(self.ident()?.value))
            }
        } else {
            None
        };

        Ok(Function {
            name,
            params,
            args,
            distinct,
            over,
        })
    }

    fn call_arguments(&mut self) -> ParseResult<(bool, Vec<Expr>)> {
        self.expect_symbol("(")?;
        let distinct = self.parse_keyword("DISTINCT");
        let args = if self.peek_symbol(")") {
            Vec::new()
        } else {
            self.expr_list()?
        };
        self.expect_symbol(")")?;
        Ok((distinct, args))
    }

    fn case_expr(&mut self) -> ParseResult<Expr> {
        let operand = if self.peek_keyword("WHEN") {
            None
        } else {
            Some(Box::new(self.expr()?))
        };

        let mut branches = Vec::new();
        while self.parse_keyword("WHEN") {
            let condition = self.expr()?;
            self.expect_keyword("THEN")?;
            let result = self.expr()?;
            branches.push(WhenClause { condition, result });
        }
        if branches.is_empty() {
            return Err(self.expected("WHEN"));
        }

        let else_result = if self.parse_keyword("ELSE") {
            Some(Box::new(self.expr()?))
        } else {
            None
        };
        self.expect_keyword("END")?;

        Ok(Expr::Case {
            operand,
            branches,
            else_result,
        })
    }

    fn interval(&mut self) -> ParseResult<Expr> {
        let value = self.unary()?;
        let unit = match self.peek().copied() {
            Some(t) if t.kind == TokenKind::Word => {
                let upper = t.text.to_ascii_uppercase();
                let singular = upper.strip_suffix('S').unwrap_or(&upper);
                if INTERVAL_UNITS.contains(singular) {
                    let unit = singular.to_string();
                    self.pos += 1;
                    Some(unit)
                } else {
                    None
                }
            }
            _ => None,
        };
        Ok(Expr::Interval {
            value: Box::new(value),
            unit,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn select(sql: &str) -> SelectStatement {
        parse_select(sql).unwrap()
    }

    #[test]
    fn test_parse_simple_select() {
        let stmt = select("SELECT * FROM metrics WHERE metric_name = 'cpu'");
        assert_eq!(stmt.projection.len(), 1);
        assert_eq!(stmt.projection[0].expr, Expr::Wildcard(Vec::new()));
        assert_eq!(
            stmt.selection.unwrap().to_string(),
            "metric_name = 'cpu'"
        );
    }

    #[test]
    fn test_parse_case_insensitive_keywords() {
        let stmt = select("select region from metrics where x = 1 group by region");
        assert!(stmt.group_by.is_some());
    }

    #[test]
    fn test_parse_aliases() {
        let stmt = select("SELECT region AS r, zone z, `os.type` AS `os` FROM metrics m");
        let aliases: Vec<_> = stmt
            .projection
            .iter()
            .map(|item| item.alias.as_ref().map(|a| a.value.clone()))
            .collect();
        assert_eq!(
            aliases,
            vec![
                Some("r".to_string()),
                Some("z".to_string()),
                Some("os".to_string())
            ]
        );
        match stmt.from.unwrap().relation {
            TableFactor::Table { name, alias, .. } => {
                assert_eq!(name[0].value, "metrics");
                assert_eq!(alias.unwrap().value, "m");
            }
            other => panic!("Expected table, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_function_rendering_is_canonical() {
        let stmt = select(
            "SELECT toStartOfInterval(toDateTime(intDiv(s.unix_milli,1000)),\n   toIntervalSecond(bucket_s)) AS ts FROM t",
        );
        assert_eq!(
            stmt.projection[0].expr.to_string(),
            "toStartOfInterval(toDateTime(intDiv(s.unix_milli, 1000)), toIntervalSecond(bucket_s))"
        );
    }

    #[test]
    fn test_parse_interval() {
        let stmt = select("SELECT toStartOfInterval(ts, INTERVAL 60 second) FROM t");
        assert_eq!(
            stmt.projection[0].expr.to_string(),
            "toStartOfInterval(ts, INTERVAL 60 SECOND)"
        );
    }

    #[test]
    fn test_parse_in_variants() {
        let stmt = select(
            "SELECT 1 FROM t WHERE a IN ('x', 'y') AND b GLOBAL NOT IN ('z') AND c IN ['w'] AND d IN (SELECT d FROM u)",
        );
        let rendered = stmt.selection.unwrap().to_string();
        assert_eq!(
            rendered,
            "a IN ('x', 'y') AND b GLOBAL NOT IN ('z') AND c IN ['w'] AND d IN (SELECT d FROM u)"
        );
    }

    #[test]
    fn test_parse_cte_and_scalar_with() {
        let stmt = select(
            "WITH toUInt64(60) AS bucket_s, agg AS (SELECT region FROM metrics GROUP BY region) SELECT * FROM agg",
        );
        assert_eq!(stmt.with.len(), 2);
        assert!(matches!(stmt.with[0], WithItem::Expression { .. }));
        assert!(matches!(stmt.with[1], WithItem::Cte { .. }));
        assert_eq!(stmt.ctes().count(), 1);
    }

    #[test]
    fn test_parse_joins() {
        let stmt = select(
            "SELECT * FROM a AS x GLOBAL LEFT ANY JOIN (SELECT fp FROM b) AS y USING fp INNER JOIN c ON x.id = c.id",
        );
        let from = stmt.from.unwrap();
        assert_eq!(from.joins.len(), 2);
        assert!(from.joins[0].global);
        assert_eq!(from.joins[0].kind, JoinKind::Left);
        assert_eq!(from.joins[0].strictness.as_deref(), Some("ANY"));
        assert!(matches!(from.joins[0].relation, TableFactor::Derived { .. }));
        assert_eq!(
            from.joins[0].constraint,
            JoinConstraint::Using(vec![Ident::new("fp")])
        );
        assert!(matches!(from.joins[1].constraint, JoinConstraint::On(_)));
    }

    #[test]
    fn test_parse_clickhouse_clauses() {
        let stmt = select(
            "SELECT region FROM metrics FINAL SAMPLE 0.1 ARRAY JOIN tags AS tag PREWHERE a = 1 WHERE b = 2 \
             GROUP BY region WITH TOTALS HAVING count() > 1 ORDER BY region DESC WITH FILL \
             LIMIT 5 BY region LIMIT 10 OFFSET 5 SETTINGS max_threads = 8 FORMAT JSON",
        );
        assert!(stmt.prewhere.is_some());
        assert_eq!(stmt.array_joins.len(), 1);
        assert_eq!(
            stmt.group_by.as_ref().unwrap().modifiers,
            vec![GroupByModifier::Totals]
        );
        assert!(stmt.having.is_some());
        assert!(stmt.order_by[0].with_fill);
        assert!(stmt.limit_by.is_some());
        assert!(stmt.limit.is_some());
        assert_eq!(stmt.settings.len(), 1);
        assert_eq!(stmt.format.as_deref(), Some("JSON"));
    }

    #[test]
    fn test_parse_window_functions() {
        let stmt = select(
            "SELECT lagInFrame(v, 1, 0) OVER w, avg(v) OVER (PARTITION BY r ORDER BY ts ROWS BETWEEN 1 PRECEDING AND CURRENT ROW) \
             FROM t WINDOW w AS (PARTITION BY fp ORDER BY fp, ts)",
        );
        assert_eq!(
            stmt.projection[0].expr.to_string(),
            "lagInFrame(v, 1, 0) OVER w"
        );
        assert_eq!(
            stmt.projection[1].expr.to_string(),
            "avg(v) OVER (PARTITION BY r ORDER BY ts ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)"
        );
        assert_eq!(stmt.windows.len(), 1);
    }

    #[test]
    fn test_parse_lambda_and_parametric_aggregate() {
        let stmt = select(
            "SELECT arrayMap(x -> toFloat64(x), groupArray(le)), quantile(0.9)(value), arrayFilter((a, b) -> a > b, xs, ys) FROM t",
        );
        assert_eq!(
            stmt.projection[0].expr.to_string(),
            "arrayMap(x -> toFloat64(x), groupArray(le))"
        );
        assert_eq!(stmt.projection[1].expr.to_string(), "quantile(0.9)(value)");
        assert_eq!(
            stmt.projection[2].expr.to_string(),
            "arrayFilter((a, b) -> a > b, xs, ys)"
        );
    }

    #[test]
    fn test_parse_case_and_exists() {
        let stmt = select(
            "SELECT CASE WHEN metric_name = 'cpu' THEN value * 2 ELSE value END FROM t WHERE EXISTS (SELECT 1 FROM u)",
        );
        assert_eq!(
            stmt.projection[0].expr.to_string(),
            "CASE WHEN metric_name = 'cpu' THEN value * 2 ELSE value END"
        );
        assert!(matches!(stmt.selection, Some(Expr::Exists(_))));
    }

    #[test]
    fn test_parse_union() {
        let stmt = select("SELECT a FROM t UNION ALL SELECT b FROM u UNION DISTINCT SELECT c FROM v");
        assert_eq!(stmt.set_branches.len(), 2);
        assert_eq!(stmt.set_branches[0].all, Some(true));
        assert_eq!(stmt.set_branches[1].all, Some(false));
    }

    #[test]
    fn test_parse_parenthesized_query() {
        let stmt = select("(SELECT a FROM t) UNION ALL (SELECT b FROM u)");
        assert_eq!(stmt.set_branches.len(), 1);
    }

    #[test]
    fn test_parse_nan_and_null_literals() {
        let stmt = select("SELECT If(x < 0, nan, x), y IS NOT NULL FROM t");
        assert_eq!(stmt.projection[0].expr.to_string(), "If(x < 0, nan, x)");
        assert_eq!(stmt.projection[1].expr.to_string(), "y IS NOT NULL");
    }

    #[test]
    fn test_parse_only_first_statement() {
        let stmt = select("SELECT a FROM t; DELETE FROM t WHERE metric_name = 'mem';");
        assert!(stmt.selection.is_none());
    }

    #[test]
    fn test_parse_other_statement() {
        assert_eq!(
            parse_statement("INSERT INTO t VALUES (1)").unwrap(),
            Statement::Other("INSERT".to_string())
        );
        assert!(parse_select("CREATE DATABASE db").is_err());
    }

    #[test]
    fn test_parse_empty_query() {
        assert_eq!(parse_statement("   ").unwrap_err(), ParseError::EmptyQuery);
        assert_eq!(
            parse_statement("-- only a comment").unwrap_err(),
            ParseError::EmptyQuery
        );
    }

    #[test]
    fn test_parse_error_select_without_columns() {
        let err = parse_statement("SELECT FROM metrics WHERE").unwrap_err();
        match err {
            ParseError::UnexpectedToken { found, span, .. } => {
                assert_eq!(found, "FROM");
                assert_eq!(span, Span::new(7, 11));
            }
            other => panic!("Expected unexpected token, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_incomplete_where() {
        let err = parse_statement("SELECT a FROM metrics WHERE").unwrap_err();
        assert_eq!(err.span(), Some(Span::new(27, 27)));
    }

    #[test]
    fn test_parse_error_unknown_statement() {
        assert!(parse_statement("FOO BAR").is_err());
    }

    #[test]
    fn test_parse_error_trailing_content() {
        let err = parse_statement("SELECT a FROM t )").unwrap_err();
        assert!(matches!(err, ParseError::SyntaxError { .. }));
    }

    #[test]
    fn test_reserved_keyword_before_list_end_is_identifier() {
        let stmt = select("SELECT count() FROM t GROUP BY region, from");
        let items = &stmt.group_by.unwrap().items;
        assert_eq!(items[1], Expr::column("from"));
        assert!(is_reserved_keyword("from"));
        assert!(!is_reserved_keyword("region"));
    }

    #[test]
    fn test_parse_error_nesting_too_deep() {
        let depth = 10_000;
        let sql = format!(
            "SELECT * FROM metrics WHERE {}metric_name = 'cpu'{}",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        match parse_statement(&sql).unwrap_err() {
            ParseError::SyntaxError { message, .. } => {
                assert_eq!(message, "query nesting too deep");
            }
            other => panic!("Expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_nested_subqueries_too_deep() {
        let depth = 1_000;
        let sql = format!(
            "SELECT * FROM {}metrics{}",
            "(SELECT * FROM ".repeat(depth),
            ")".repeat(depth)
        );
        assert!(matches!(
            parse_statement(&sql).unwrap_err(),
            ParseError::SyntaxError { .. }
        ));
    }

    #[test]
    fn test_parse_error_operator_chain_too_long() {
        let terms = vec!["metric_name = 'cpu'"; 5_000].join(" OR ");
        let sql = format!("SELECT * FROM metrics WHERE {terms}");
        assert!(matches!(
            parse_statement(&sql).unwrap_err(),
            ParseError::SyntaxError { .. }
        ));

        let unary = format!("SELECT {}1", "- ".repeat(5_000));
        assert!(parse_statement(&unary).is_err());
    }

    #[test]
    fn test_parse_moderate_nesting() {
        let sql = format!(
            "SELECT * FROM metrics WHERE {}metric_name = 'cpu'{}",
            "(".repeat(20),
            ")".repeat(20)
        );
        assert!(parse_statement(&sql).is_ok());
    }

    #[test]
    fn test_parse_cast_with_type_arguments() {
        let select = parse_select("SELECT value::Nullable(Decimal(10, 2)) FROM t").unwrap();
        match &select.projection[0].expr {
            Expr::Cast { data_type, .. } => assert_eq!(data_type, "Nullable(Decimal(10, 2))"),
            other => panic!("expected cast, got {other:?}"),
        }
    }
}
