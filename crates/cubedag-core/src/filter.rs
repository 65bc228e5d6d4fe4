//! Boolean filters over dimension columns.
//!
//! The engine mostly treats filters as opaque values: it combines them with
//! `and`, compares them for step interning, and hands them to the data source.
//! Only the few measure kinds that must reason about columns (unfiltering,
//! mono-selection checks) look inside.
//!
//! `and`/`or` normalize their output (flattened, sorted, same-column matchers
//! merged) so that logically identical filters built in a different order
//! intern to the same query step.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::slice::{Coordinate, Coordinates};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    Equals(Coordinate),
    In(BTreeSet<Coordinate>),
}

impl Matcher {
    pub fn accepts(&self, c: &Coordinate) -> bool {
        match self {
            Matcher::Equals(v) => v == c,
            Matcher::In(vs) => vs.contains(c),
        }
    }

    fn allowed(&self) -> BTreeSet<Coordinate> {
        match self {
            Matcher::Equals(v) => BTreeSet::from([v.clone()]),
            Matcher::In(vs) => vs.clone(),
        }
    }

    fn from_allowed(mut allowed: BTreeSet<Coordinate>) -> Option<Matcher> {
        match allowed.len() {
            0 => None,
            1 => allowed.pop_first().map(Matcher::Equals),
            _ => Some(Matcher::In(allowed)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    MatchAll,
    MatchNone,
    Column {
        column: String,
        matcher: Matcher,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: impl Into<Coordinate>) -> Self {
        Filter::Column {
            column: column.into(),
            matcher: Matcher::Equals(value.into()),
        }
    }

    pub fn is_in<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Coordinate>,
    {
        let allowed: BTreeSet<Coordinate> = values.into_iter().map(Into::into).collect();
        match Matcher::from_allowed(allowed) {
            Some(matcher) => Filter::Column {
                column: column.into(),
                matcher,
            },
            None => Filter::MatchNone,
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Filter::MatchAll)
    }

    pub fn is_match_none(&self) -> bool {
        matches!(self, Filter::MatchNone)
    }

    /// Conjunction of all given filters (MatchAll when empty).
    pub fn all_of<I: IntoIterator<Item = Filter>>(filters: I) -> Filter {
        filters.into_iter().fold(Filter::MatchAll, Filter::and)
    }

    pub fn and(self, other: Filter) -> Filter {
        let mut operands = Vec::new();
        for f in [self, other] {
            match f {
                Filter::MatchAll => {}
                Filter::MatchNone => return Filter::MatchNone,
                Filter::And(inner) => operands.extend(inner),
                f => operands.push(f),
            }
        }

        // Intersect matchers of the same column.
        let mut by_column: BTreeMap<String, BTreeSet<Coordinate>> = BTreeMap::new();
        let mut others = Vec::new();
        for f in operands {
            match f {
                Filter::Column { column, matcher } => {
                    let allowed = matcher.allowed();
                    match by_column.get_mut(&column) {
                        Some(current) => current.retain(|c| allowed.contains(c)),
                        None => {
                            by_column.insert(column, allowed);
                        }
                    }
                }
                f => others.push(f),
            }
        }

        let mut out = Vec::with_capacity(by_column.len() + others.len());
        for (column, allowed) in by_column {
            match Matcher::from_allowed(allowed) {
                Some(matcher) => out.push(Filter::Column { column, matcher }),
                None => return Filter::MatchNone,
            }
        }
        out.extend(others);
        Self::finish_operands(out, Filter::MatchAll, Filter::And)
    }

    pub fn or(self, other: Filter) -> Filter {
        let mut operands = Vec::new();
        for f in [self, other] {
            match f {
                Filter::MatchNone => {}
                Filter::MatchAll => return Filter::MatchAll,
                Filter::Or(inner) => operands.extend(inner),
                f => operands.push(f),
            }
        }

        // Union matchers of the same column.
        let mut by_column: BTreeMap<String, BTreeSet<Coordinate>> = BTreeMap::new();
        let mut others = Vec::new();
        for f in operands {
            match f {
                Filter::Column { column, matcher } => {
                    by_column.entry(column).or_default().extend(matcher.allowed());
                }
                f => others.push(f),
            }
        }

        let mut out = Vec::with_capacity(by_column.len() + others.len());
        for (column, allowed) in by_column {
            if let Some(matcher) = Matcher::from_allowed(allowed) {
                out.push(Filter::Column { column, matcher });
            }
        }
        out.extend(others);
        Self::finish_operands(out, Filter::MatchNone, Filter::Or)
    }

    fn finish_operands(
        mut operands: Vec<Filter>,
        neutral: Filter,
        wrap: fn(Vec<Filter>) -> Filter,
    ) -> Filter {
        operands.sort();
        operands.dedup();
        match operands.len() {
            0 => neutral,
            1 => operands.pop().unwrap_or(neutral),
            _ => wrap(operands),
        }
    }

    pub fn negate(self) -> Filter {
        match self {
            Filter::MatchAll => Filter::MatchNone,
            Filter::MatchNone => Filter::MatchAll,
            Filter::Not(inner) => *inner,
            other => Filter::Not(Box::new(other)),
        }
    }

    /// Evaluate against a row (or a slice). A missing column never matches.
    pub fn matches<R: Coordinates + ?Sized>(&self, row: &R) -> bool {
        match self {
            Filter::MatchAll => true,
            Filter::MatchNone => false,
            Filter::Column { column, matcher } => {
                row.coordinate(column).is_some_and(|c| matcher.accepts(c))
            }
            Filter::And(fs) => fs.iter().all(|f| f.matches(row)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(row)),
            Filter::Not(f) => !f.matches(row),
        }
    }

    /// The single coordinate this filter pins `column` to, if any.
    pub fn mono_selected(&self, column: &str) -> Option<&Coordinate> {
        match self {
            Filter::Column { column: c, matcher } if c == column => match matcher {
                Matcher::Equals(v) => Some(v),
                // `in: [x]` written by hand is not normalized to `Equals`
                Matcher::In(allowed) if allowed.len() == 1 => allowed.first(),
                Matcher::In(_) => None,
            },
            Filter::And(fs) => fs.iter().find_map(|f| f.mono_selected(column)),
            _ => None,
        }
    }

    /// Every column this filter reads.
    pub fn columns(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Filter::MatchAll | Filter::MatchNone => {}
            Filter::Column { column, .. } => {
                out.insert(column.as_str());
            }
            Filter::And(fs) | Filter::Or(fs) => fs.iter().for_each(|f| f.collect_columns(out)),
            Filter::Not(f) => f.collect_columns(out),
        }
    }

    /// Drop the constraints on `columns` (or, when `inverse`, on every other
    /// column).
    ///
    /// A conjunction is handled operand by operand. A disjunction or negation
    /// is dropped when all its columns are affected and kept when none is;
    /// one mixing affected and unaffected columns cannot be split without
    /// changing its meaning and is rejected.
    pub fn retain_columns<S: AsRef<str>>(&self, columns: &[S], inverse: bool) -> Result<Filter> {
        let affected = |column: &str| {
            let listed = columns.iter().any(|c| c.as_ref() == column);
            listed != inverse
        };

        match self {
            Filter::MatchAll | Filter::MatchNone => Ok(self.clone()),
            Filter::Column { column, .. } => {
                if affected(column) {
                    Ok(Filter::MatchAll)
                } else {
                    Ok(self.clone())
                }
            }
            Filter::And(fs) => {
                let mut out = Filter::MatchAll;
                for f in fs {
                    out = out.and(f.retain_columns(columns, inverse)?);
                }
                Ok(out)
            }
            Filter::Or(_) | Filter::Not(_) => {
                let cols = self.columns();
                let hit = cols.iter().filter(|c| affected(c)).count();
                if hit == 0 {
                    Ok(self.clone())
                } else if hit == cols.len() {
                    Ok(Filter::MatchAll)
                } else {
                    Err(Error::UnsupportedFilterShape(format!(
                        "cannot remove {} from '{}' without changing its meaning",
                        cols.iter()
                            .filter(|c| affected(c))
                            .copied()
                            .collect::<Vec<_>>()
                            .join(","),
                        self
                    )))
                }
            }
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::MatchAll => write!(f, "matchAll"),
            Filter::MatchNone => write!(f, "matchNone"),
            Filter::Column {
                column,
                matcher: Matcher::Equals(v),
            } => write!(f, "{column}={v}"),
            Filter::Column {
                column,
                matcher: Matcher::In(vs),
            } => {
                write!(f, "{column} in (")?;
                for (i, v) in vs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, ")")
            }
            Filter::And(fs) => join(f, fs, "&"),
            Filter::Or(fs) => join(f, fs, "|"),
            Filter::Not(inner) => write!(f, "!({inner})"),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, fs: &[Filter], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, x) in fs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{x}")?;
    }
    write!(f, ")")
}
