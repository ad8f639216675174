//! Example/criteria object for filter-based mapper operations.
//!
//! # Responsibility
//! - Collect predicates as OR-ed groups of AND-ed conditions.
//! - Render predicates to parameterized SQL for one entity's columns.
//!
//! # Invariants
//! - Column names are only interpolated after matching the entity column list.
//! - Every value is bound as a parameter.

use super::{MapperError, MapperResult};
use rusqlite::types::Value;

/// Ordering direction for criteria results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
}

impl Condition {
    fn column(&self) -> &str {
        match self {
            Self::Compare { column, .. }
            | Self::Null { column, .. }
            | Self::In { column, .. }
            | Self::Between { column, .. } => column,
        }
    }
}

/// Filter description passed through `BaseService` to the mapper.
///
/// ```
/// use recordkit_core::Criteria;
///
/// // (age >= 18 AND name LIKE 'a%') OR (email IS NULL)
/// let criteria = Criteria::new()
///     .ge("age", 18_i64)
///     .like("name", "a%".to_string())
///     .or()
///     .is_null("email")
///     .order_by_desc("age");
/// assert!(criteria.has_conditions());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Criteria {
    groups: Vec<Vec<Condition>>,
    order_by: Vec<(String, SortDirection)>,
    distinct: bool,
}

/// SQL fragments rendered for one entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct RenderedCriteria {
    /// Predicate without the `WHERE` keyword; empty when unconditioned.
    pub where_sql: String,
    /// Comma-separated ordering terms; empty when unordered.
    pub order_sql: String,
    pub binds: Vec<Value>,
    pub distinct: bool,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, "=", value)
    }

    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, "<>", value)
    }

    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, ">", value)
    }

    pub fn ge(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, ">=", value)
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, "<", value)
    }

    pub fn le(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, "<=", value)
    }

    pub fn like(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.compare(column, "LIKE", pattern)
    }

    pub fn not_like(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.compare(column, "NOT LIKE", pattern)
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.push(Condition::Null {
            column: column.into(),
            negated: false,
        })
    }

    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.push(Condition::Null {
            column: column.into(),
            negated: true,
        })
    }

    /// `column IN (...)`. An empty list matches nothing.
    pub fn in_list<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        })
    }

    /// `column NOT IN (...)`. An empty list matches everything and adds no
    /// predicate, so guarded whole-table writes still reject it.
    pub fn not_in_list<V: Into<Value>>(
        self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        })
    }

    pub fn between(
        self,
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        self.push(Condition::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        })
    }

    /// Starts a new condition group OR-ed with the previous ones.
    pub fn or(mut self) -> Self {
        if self.groups.last().is_some_and(|group| !group.is_empty()) {
            self.groups.push(Vec::new());
        }
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn order_by_asc(self, column: impl Into<String>) -> Self {
        self.order_by(column, SortDirection::Asc)
    }

    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        self.order_by(column, SortDirection::Desc)
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Returns whether any predicate has been added.
    pub fn has_conditions(&self) -> bool {
        self.groups.iter().any(|group| !group.is_empty())
    }

    fn compare(self, column: impl Into<String>, op: &'static str, value: impl Into<Value>) -> Self {
        self.push(Condition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        })
    }

    fn push(mut self, condition: Condition) -> Self {
        match self.groups.last_mut() {
            Some(group) => group.push(condition),
            None => self.groups.push(vec![condition]),
        }
        self
    }

    /// Renders predicates and ordering against `columns` of `table`.
    pub(crate) fn render(
        &self,
        table: &'static str,
        columns: &[&str],
    ) -> MapperResult<RenderedCriteria> {
        let known = |column: &str| -> MapperResult<()> {
            if columns.contains(&column) {
                Ok(())
            } else {
                Err(MapperError::UnknownColumn {
                    table,
                    column: column.to_string(),
                })
            }
        };

        let mut binds = Vec::new();
        let mut rendered_groups = Vec::new();
        let mut matches_everything = false;
        for group in self.groups.iter().filter(|group| !group.is_empty()) {
            let mut terms = Vec::with_capacity(group.len());
            for condition in group {
                known(condition.column())?;
                if let Some(term) = render_condition(condition, &mut binds) {
                    terms.push(term);
                }
            }
            if terms.is_empty() {
                // Every term is always true, so the whole disjunction is.
                matches_everything = true;
            } else {
                rendered_groups.push(format!("({})", terms.join(" AND ")));
            }
        }
        if matches_everything {
            rendered_groups.clear();
            binds.clear();
        }

        let mut order_terms = Vec::with_capacity(self.order_by.len());
        for (column, direction) in &self.order_by {
            known(column.as_str())?;
            order_terms.push(format!("{column} {}", direction.as_sql()));
        }

        Ok(RenderedCriteria {
            where_sql: rendered_groups.join(" OR "),
            order_sql: order_terms.join(", "),
            binds,
            distinct: self.distinct,
        })
    }
}

/// Renders one condition; `None` means it holds for every row.
fn render_condition(condition: &Condition, binds: &mut Vec<Value>) -> Option<String> {
    let term = match condition {
        Condition::Compare { column, op, value } => {
            binds.push(value.clone());
            format!("{column} {op} ?")
        }
        Condition::Null { column, negated } => {
            if *negated {
                format!("{column} IS NOT NULL")
            } else {
                format!("{column} IS NULL")
            }
        }
        Condition::In {
            values, negated, ..
        } if values.is_empty() => {
            if *negated {
                return None;
            }
            "0 = 1".to_string()
        }
        Condition::In {
            column,
            values,
            negated,
        } => {
            binds.extend(values.iter().cloned());
            let placeholders = vec!["?"; values.len()].join(", ");
            let keyword = if *negated { "NOT IN" } else { "IN" };
            format!("{column} {keyword} ({placeholders})")
        }
        Condition::Between { column, low, high } => {
            binds.push(low.clone());
            binds.push(high.clone());
            format!("{column} BETWEEN ? AND ?")
        }
    };
    Some(term)
}

#[cfg(test)]
mod tests {
    use super::Criteria;
    use crate::mapper::MapperError;
    use rusqlite::types::Value;

    const COLUMNS: &[&str] = &["id", "name", "age"];

    #[test]
    fn empty_criteria_renders_nothing() {
        let rendered = Criteria::new().render("people", COLUMNS).unwrap();
        assert!(rendered.where_sql.is_empty());
        assert!(rendered.order_sql.is_empty());
        assert!(rendered.binds.is_empty());
        assert!(!Criteria::new().has_conditions());
    }

    #[test]
    fn groups_are_and_ed_inside_and_or_ed_between() {
        let rendered = Criteria::new()
            .eq("name", "ann".to_string())
            .gt("age", 30_i64)
            .or()
            .is_null("age")
            .render("people", COLUMNS)
            .unwrap();

        assert_eq!(
            rendered.where_sql,
            "(name = ? AND age > ?) OR (age IS NULL)"
        );
        assert_eq!(
            rendered.binds,
            vec![Value::Text("ann".to_string()), Value::Integer(30)]
        );
    }

    #[test]
    fn leading_or_does_not_create_empty_group() {
        let rendered = Criteria::new()
            .or()
            .eq("id", 1_i64)
            .or()
            .or()
            .eq("id", 2_i64)
            .render("people", COLUMNS)
            .unwrap();

        assert_eq!(rendered.where_sql, "(id = ?) OR (id = ?)");
    }

    #[test]
    fn in_lists_bind_each_value_and_handle_empty_lists() {
        let rendered = Criteria::new()
            .in_list("id", [1_i64, 2, 3])
            .not_in_list("age", Vec::<i64>::new())
            .in_list("name", Vec::<String>::new())
            .render("people", COLUMNS)
            .unwrap();

        assert_eq!(
            rendered.where_sql,
            "(id IN (?, ?, ?) AND 0 = 1)"
        );
        assert_eq!(rendered.binds.len(), 3);
    }

    #[test]
    fn always_true_group_leaves_criteria_unconditioned() {
        let rendered = Criteria::new()
            .not_in_list("id", Vec::<i64>::new())
            .render("people", COLUMNS)
            .unwrap();
        assert!(rendered.where_sql.is_empty());

        let rendered = Criteria::new()
            .eq("name", "ann".to_string())
            .or()
            .not_in_list("age", Vec::<i64>::new())
            .render("people", COLUMNS)
            .unwrap();
        assert!(rendered.where_sql.is_empty());
        assert!(rendered.binds.is_empty());
    }

    #[test]
    fn between_and_ordering_render_in_declaration_order() {
        let rendered = Criteria::new()
            .between("age", 18_i64, 65_i64)
            .order_by_desc("age")
            .order_by_asc("id")
            .distinct()
            .render("people", COLUMNS)
            .unwrap();

        assert_eq!(rendered.where_sql, "(age BETWEEN ? AND ?)");
        assert_eq!(rendered.order_sql, "age DESC, id ASC");
        assert!(rendered.distinct);
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let err = Criteria::new()
            .eq("name; DROP TABLE people", 1_i64)
            .render("people", COLUMNS)
            .unwrap_err();
        assert!(matches!(err, MapperError::UnknownColumn { table: "people", .. }));

        let err = Criteria::new()
            .order_by_asc("missing")
            .render("people", COLUMNS)
            .unwrap_err();
        assert!(matches!(err, MapperError::UnknownColumn { column, .. } if column == "missing"));
    }
}
