//! Ordering, paging, and join declarations accumulated by a query.

use serde::{Deserialize, Serialize};

use crate::predicate::Member;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderSpec {
    /// Column to order by.
    pub member: Member,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderSpec {
    /// Ascending order on a column.
    pub fn asc(member: Member) -> Self {
        Self {
            member,
            direction: OrderDirection::Asc,
        }
    }

    /// Descending order on a column.
    pub fn desc(member: Member) -> Self {
        Self {
            member,
            direction: OrderDirection::Desc,
        }
    }
}

/// A contiguous window over the ordered result.
///
/// `page` is 1-based; page `p` with `count` rows skips `(p - 1) * count` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    /// Rows per page.
    pub count: u32,
}

impl Page {
    /// Create a page window. A page number of zero is treated as the first page.
    pub fn new(page: u32, count: u32) -> Self {
        Self {
            page: page.max(1),
            count,
        }
    }

    /// Rows to skip before the window starts.
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.count as u64
    }
}

/// Join flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    /// `INNER JOIN`
    Inner,
    /// `LEFT OUTER JOIN`
    LeftOuter,
}

impl JoinKind {
    /// SQL spelling of the join.
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// One link of a join chain.
///
/// The source must be the root entity or the destination of an earlier join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinSpec {
    /// Entity already present in the chain.
    pub source_entity: String,
    /// Column on the source side.
    pub source_column: String,
    /// Entity being joined in.
    pub target_entity: String,
    /// Column on the destination side.
    pub target_column: String,
    /// Join flavor.
    pub kind: JoinKind,
}

/// A foreign-key style link between two tables, used by table generators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    /// Referencing entity.
    pub source_entity: String,
    /// Referencing column.
    pub source_column: String,
    /// Referenced entity.
    pub target_entity: String,
    /// Referenced column.
    pub target_column: String,
}

impl Relation {
    /// Create a relation.
    pub fn new(
        source_entity: impl Into<String>,
        source_column: impl Into<String>,
        target_entity: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            source_entity: source_entity.into(),
            source_column: source_column.into(),
            target_entity: target_entity.into(),
            target_column: target_column.into(),
        }
    }

    /// Conventional constraint name, `FK_Source_Column_Target`.
    pub fn constraint_name(&self) -> String {
        format!(
            "FK_{}_{}_{}",
            self.source_entity, self.source_column, self.target_entity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::new(1, 10).offset(), 0);
        assert_eq!(Page::new(3, 10).offset(), 20);
        assert_eq!(Page::new(0, 5).page, 1);
    }

    #[test]
    fn test_relation_constraint_name() {
        let rel = Relation::new("Order", "CustomerId", "Customer", "Id");
        assert_eq!(rel.constraint_name(), "FK_Order_CustomerId_Customer");
    }
}
