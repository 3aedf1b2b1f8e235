//! Query normalization - JPQL rewriting and SQL validation
//!
//! A query text resolves to exactly one of a normalized SQL string or
//! a failure reason, never both, never neither. Native SQL is parameter
//! rewritten and validated; JPQL is rewritten against the entity alias
//! map (entity -> table, `alias.field` -> column) and then validated
//! the same way. Non-SELECT statements are rejected before any adapter
//! can see them.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sqlparser::ast::{
    Expr, Join, JoinConstraint, JoinOperator, Query, SetExpr, Statement, TableFactor,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser as SqlParser;

use super::alias::EntityAliasMap;
use crate::extract::QueryKind;

/// A query that normalized successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuery {
    /// Engine-native SQL with `$n` parameters
    pub sql: String,
    /// Physical tables the query touches
    pub tables: BTreeSet<String>,
    /// Columns referenced by WHERE/JOIN predicates
    pub predicate_columns: BTreeSet<String>,
}

/// Outcome of normalizing one query text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub original: String,
    outcome: Result<ResolvedQuery, String>,
}

impl NormalizedQuery {
    pub fn resolved(original: &str, resolved: ResolvedQuery) -> Self {
        Self {
            original: original.to_string(),
            outcome: Ok(resolved),
        }
    }

    pub fn failed(original: &str, reason: &str) -> Self {
        Self {
            original: original.to_string(),
            outcome: Err(reason.to_string()),
        }
    }

    pub fn sql(&self) -> Option<&str> {
        self.outcome.as_ref().ok().map(|r| r.sql.as_str())
    }

    pub fn resolved_query(&self) -> Option<&ResolvedQuery> {
        self.outcome.as_ref().ok()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.outcome.as_ref().err().map(String::as_str)
    }
}

/// Normalize one query text against the read-only alias map.
pub fn normalize_query(text: &str, kind: QueryKind, aliases: &EntityAliasMap) -> NormalizedQuery {
    let result = match kind {
        QueryKind::Jpql => normalize_jpql(text, aliases),
        QueryKind::NativeSql => Ok(rewrite_parameters(text)),
    };

    let sql = match result {
        Ok(sql) => sql,
        Err(reason) => return NormalizedQuery::failed(text, &reason),
    };

    match parse_select(&sql) {
        Ok((tables, predicate_columns)) => NormalizedQuery::resolved(
            text,
            ResolvedQuery {
                sql: sql.trim().to_string(),
                tables,
                predicate_columns,
            },
        ),
        Err(reason) => NormalizedQuery::failed(text, &reason),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Other(String),
}

impl Tok {
    fn word(&self) -> Option<&str> {
        match self {
            Tok::Word(w) => Some(w),
            Tok::Other(_) => None,
        }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        self.word().map_or(false, |w| w.eq_ignore_ascii_case(kw))
    }

    fn is_blank(&self) -> bool {
        match self {
            Tok::Word(_) => false,
            Tok::Other(o) => o.chars().all(char::is_whitespace),
        }
    }
}

const JPQL_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "BY", "ORDER", "HAVING", "AS", "AND", "OR", "NOT", "IN",
    "LIKE", "BETWEEN", "IS", "NULL", "DISTINCT", "JOIN", "LEFT", "RIGHT", "INNER", "OUTER",
    "FETCH", "ON", "ASC", "DESC", "NEW", "CASE", "WHEN", "THEN", "ELSE", "END", "EXISTS",
    "MEMBER", "OF", "EMPTY", "TRUE", "FALSE", "LIMIT", "OFFSET", "UNION", "ALL",
];

fn is_jpql_keyword(word: &str) -> bool {
    JPQL_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

fn tokenize(text: &str) -> Vec<Tok> {
    let mut toks = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            toks.push(Tok::Word(word));
        } else if c == '\'' {
            // string literal, kept verbatim
            let mut lit = String::new();
            lit.push(c);
            chars.next();
            while let Some(&c) = chars.peek() {
                lit.push(c);
                chars.next();
                if c == '\'' {
                    break;
                }
            }
            toks.push(Tok::Other(lit));
        } else if c.is_whitespace() {
            let mut ws = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    ws.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            toks.push(Tok::Other(ws));
        } else {
            chars.next();
            toks.push(Tok::Other(c.to_string()));
        }
    }

    toks
}

fn next_significant(toks: &[Tok], after: usize) -> Option<usize> {
    toks.iter()
        .enumerate()
        .skip(after + 1)
        .find(|(_, t)| !t.is_blank())
        .map(|(i, _)| i)
}

/// Drop a token and the run of whitespace immediately before it.
fn drop_token(toks: &mut [Tok], idx: usize) {
    toks[idx] = Tok::Other(String::new());
    if idx > 0 && toks[idx - 1].is_blank() {
        toks[idx - 1] = Tok::Other(String::new());
    }
}

/// Rewrite JDBC/JPQL parameters into `$n` form: `?3` keeps its index,
/// bare `?` takes the next free index, `:name` is assigned by first
/// appearance. Content inside string literals is untouched.
fn rewrite_parameters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut next_index: u32 = 1;
    let mut named: HashMap<String, u32> = HashMap::new();

    while let Some(c) = chars.next() {
        if c == '\'' {
            in_string = !in_string;
            out.push(c);
            continue;
        }
        if in_string {
            out.push(c);
            continue;
        }
        match c {
            '?' => {
                let mut digits = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        digits.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if digits.is_empty() {
                    out.push_str(&format!("${}", next_index));
                    next_index += 1;
                } else {
                    let n: u32 = digits.parse().unwrap_or(next_index);
                    out.push_str(&format!("${}", n));
                    next_index = next_index.max(n + 1);
                }
            }
            ':' => {
                if chars.peek() == Some(&':') {
                    chars.next();
                    out.push_str("::");
                    continue;
                }
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    out.push(':');
                } else {
                    let idx = *named.entry(name).or_insert_with(|| {
                        let i = next_index;
                        next_index += 1;
                        i
                    });
                    out.push_str(&format!("${}", idx));
                }
            }
            _ => out.push(c),
        }
    }

    out
}

/// Rewrite a JPQL query into engine-native SQL using the alias map.
fn normalize_jpql(text: &str, aliases: &EntityAliasMap) -> Result<String, String> {
    let text = rewrite_parameters(text);
    let mut toks = tokenize(&text);

    let first = toks
        .iter()
        .position(|t| !t.is_blank())
        .ok_or_else(|| "empty query text".to_string())?;
    if !toks[first].is_keyword("SELECT") {
        return Err("non-SELECT statement rejected".to_string());
    }

    if toks.iter().any(|t| t.is_keyword("JOIN")) {
        return Err("unsupported JPQL construct: JOIN".to_string());
    }

    // FROM clause: resolve each `Entity [AS] alias` item.
    let mut alias_entities: HashMap<String, String> = HashMap::new();
    let mut i = 0;
    while i < toks.len() {
        if !toks[i].is_keyword("FROM") {
            i += 1;
            continue;
        }
        let mut cursor = i;
        loop {
            let entity_idx = next_significant(&toks, cursor)
                .ok_or_else(|| "malformed FROM clause".to_string())?;
            let entity = match toks[entity_idx].word() {
                Some(w) if !is_jpql_keyword(w) => w.to_string(),
                _ => return Err("malformed FROM clause".to_string()),
            };
            if entity.contains('.') {
                return Err(format!(
                    "unsupported JPQL construct: qualified entity name {}",
                    entity
                ));
            }
            let table = aliases
                .table_for(&entity)
                .ok_or_else(|| format!("unresolved entity alias {}", entity))?
                .to_string();
            toks[entity_idx] = Tok::Word(table);

            // optional AS, optional alias
            let mut last = entity_idx;
            if let Some(next_idx) = next_significant(&toks, entity_idx) {
                let mut alias_idx = next_idx;
                if toks[next_idx].is_keyword("AS") {
                    drop_token(&mut toks, next_idx);
                    alias_idx = match next_significant(&toks, next_idx) {
                        Some(idx) => idx,
                        None => break,
                    };
                }
                if let Some(w) = toks[alias_idx].word() {
                    if !is_jpql_keyword(w) && !w.contains('.') {
                        alias_entities.insert(w.to_string(), entity.clone());
                        drop_token(&mut toks, alias_idx);
                        last = alias_idx;
                    }
                }
            }

            // comma means another FROM item
            match next_significant(&toks, last) {
                Some(idx) if toks[idx] == Tok::Other(",".to_string()) => cursor = idx,
                _ => break,
            }
        }
        i += 1;
    }

    // SELECT list regions, for bare-alias projection rewriting.
    let mut select_ranges = Vec::new();
    let mut stack = Vec::new();
    for (idx, tok) in toks.iter().enumerate() {
        if tok.is_keyword("SELECT") {
            stack.push(idx);
        } else if tok.is_keyword("FROM") {
            if let Some(start) = stack.pop() {
                select_ranges.push((start, idx));
            }
        }
    }
    let in_select = |idx: usize| select_ranges.iter().any(|&(s, f)| idx > s && idx < f);

    // Rewrite alias references.
    for idx in 0..toks.len() {
        let Some(word) = toks[idx].word().map(str::to_string) else {
            continue;
        };
        if let Some((prefix, field)) = word.split_once('.') {
            if let Some(entity) = alias_entities.get(prefix) {
                if field.contains('.') {
                    return Err(format!("unsupported JPQL construct: nested path {}", word));
                }
                toks[idx] = Tok::Word(aliases.column_for(entity, field));
            }
        } else if alias_entities.contains_key(&word) && in_select(idx) {
            toks[idx] = Tok::Word("*".to_string());
        }
    }

    let mut out = String::new();
    for tok in &toks {
        match tok {
            Tok::Word(w) => out.push_str(w),
            Tok::Other(o) => out.push_str(o),
        }
    }
    Ok(out)
}

/// Parse normalized SQL, rejecting anything but a single SELECT, and
/// collect the physical tables and predicate columns it references.
pub(crate) fn parse_select(sql: &str) -> Result<(BTreeSet<String>, BTreeSet<String>), String> {
    let dialect = PostgreSqlDialect {};
    let statements = SqlParser::parse_sql(&dialect, sql).map_err(|e| e.to_string())?;

    let statement = match statements.as_slice() {
        [s] => s,
        [] => return Err("empty query text".to_string()),
        _ => return Err("expected a single statement".to_string()),
    };

    let query = match statement {
        Statement::Query(q) => q,
        _ => return Err("non-SELECT statement rejected".to_string()),
    };

    let mut tables = BTreeSet::new();
    let mut columns = BTreeSet::new();
    collect_query(query, &mut tables, &mut columns);
    Ok((tables, columns))
}

fn collect_query(query: &Query, tables: &mut BTreeSet<String>, columns: &mut BTreeSet<String>) {
    collect_set_expr(&query.body, tables, columns);
}

fn collect_set_expr(body: &SetExpr, tables: &mut BTreeSet<String>, columns: &mut BTreeSet<String>) {
    match body {
        SetExpr::Select(select) => {
            for twj in &select.from {
                collect_table_factor(&twj.relation, tables);
                for join in &twj.joins {
                    collect_join(join, tables, columns);
                }
            }
            if let Some(selection) = &select.selection {
                collect_columns(selection, columns);
            }
        }
        SetExpr::Query(q) => collect_query(q, tables, columns),
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_expr(left, tables, columns);
            collect_set_expr(right, tables, columns);
        }
        _ => {}
    }
}

fn collect_join(join: &Join, tables: &mut BTreeSet<String>, columns: &mut BTreeSet<String>) {
    collect_table_factor(&join.relation, tables);
    let constraint = match &join.join_operator {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => c,
        _ => return,
    };
    if let JoinConstraint::On(expr) = constraint {
        collect_columns(expr, columns);
    }
}

fn collect_table_factor(factor: &TableFactor, tables: &mut BTreeSet<String>) {
    match factor {
        TableFactor::Table { name, .. } => {
            if let Some(last) = name.0.last() {
                tables.insert(last.value.clone());
            }
        }
        TableFactor::Derived { .. } | TableFactor::NestedJoin { .. } => {}
        _ => {}
    }
}

fn collect_columns(expr: &Expr, columns: &mut BTreeSet<String>) {
    match expr {
        Expr::Identifier(ident) => {
            columns.insert(ident.value.clone());
        }
        Expr::CompoundIdentifier(parts) => {
            if let Some(last) = parts.last() {
                columns.insert(last.value.clone());
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_columns(left, columns);
            collect_columns(right, columns);
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => collect_columns(expr, columns),
        Expr::InList { expr, list, .. } => {
            collect_columns(expr, columns);
            for item in list {
                collect_columns(item, columns);
            }
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            collect_columns(expr, columns);
            collect_columns(low, columns);
            collect_columns(high, columns);
        }
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            collect_columns(expr, columns);
            collect_columns(pattern, columns);
        }
        Expr::IsNull(expr) | Expr::IsNotNull(expr) => collect_columns(expr, columns),
        _ => {}
    }
}
