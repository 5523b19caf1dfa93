//! Predicate expression trees.
//!
//! A [`Predicate`] is an explicit, serializable boolean filter over the
//! columns of an entity. Trees are built with [`col`] and the combinators on
//! [`Member`] and [`Predicate`]:
//!
//! ```
//! use ormsql_proto::predicate::col;
//!
//! let filter = (col("Name").eq("Ice Candy") | col("Name").eq("Random")) & col("Id").gt(1);
//! assert!(filter.is_logical());
//! ```
//!
//! Operands are either literals or [`Capture`]s. A capture holds a closure
//! that is evaluated exactly once, when the tree is translated into SQL, so
//! the statement sees a snapshot of closed-over state rather than a live
//! reference.

use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// SQL spelling of the operator.
    pub fn as_sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Method-call style predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    /// Substring match, `LIKE '%' + x + '%'`.
    Contains,
    /// Prefix match, `LIKE x + '%'`.
    StartsWith,
    /// Set membership, `IN (...)`.
    In,
}

/// A column reference, optionally qualified by the entity that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Owning entity type name. `None` means the query's root entity.
    pub entity: Option<String>,
    /// Column (property) name.
    pub name: String,
}

/// Start a predicate on a column of the root entity.
pub fn col(name: impl Into<String>) -> Member {
    Member {
        entity: None,
        name: name.into(),
    }
}

/// Start a predicate on a column of a joined entity.
pub fn col_of(entity: impl Into<String>, name: impl Into<String>) -> Member {
    Member {
        entity: Some(entity.into()),
        name: name.into(),
    }
}

/// Build an operand that is resolved when the predicate is translated.
pub fn captured<F, V>(f: F) -> Capture
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<Value>,
{
    Capture::new(move || Ok(f().into()))
}

impl Member {
    fn compare(self, op: CompareOp, operand: impl IntoOperand) -> Predicate {
        Predicate::Compare {
            op,
            member: self,
            operand: operand.into_operand(),
        }
    }

    fn method(self, kind: MethodKind, argument: impl IntoOperand) -> Predicate {
        Predicate::Method {
            kind,
            member: self,
            argument: argument.into_operand(),
        }
    }

    /// `member = value`
    pub fn eq(self, value: impl IntoOperand) -> Predicate {
        self.compare(CompareOp::Eq, value)
    }

    /// `member <> value`
    pub fn ne(self, value: impl IntoOperand) -> Predicate {
        self.compare(CompareOp::Ne, value)
    }

    /// `member < value`
    pub fn lt(self, value: impl IntoOperand) -> Predicate {
        self.compare(CompareOp::Lt, value)
    }

    /// `member <= value`
    pub fn le(self, value: impl IntoOperand) -> Predicate {
        self.compare(CompareOp::Le, value)
    }

    /// `member > value`
    pub fn gt(self, value: impl IntoOperand) -> Predicate {
        self.compare(CompareOp::Gt, value)
    }

    /// `member >= value`
    pub fn ge(self, value: impl IntoOperand) -> Predicate {
        self.compare(CompareOp::Ge, value)
    }

    /// Substring match.
    pub fn contains(self, value: impl IntoOperand) -> Predicate {
        self.method(MethodKind::Contains, value)
    }

    /// Prefix match.
    pub fn starts_with(self, value: impl IntoOperand) -> Predicate {
        self.method(MethodKind::StartsWith, value)
    }

    /// Set membership. The operand must resolve to a [`Value::List`].
    pub fn is_in(self, values: impl IntoOperand) -> Predicate {
        self.method(MethodKind::In, values)
    }

    /// Negated set membership.
    pub fn not_in(self, values: impl IntoOperand) -> Predicate {
        !self.is_in(values)
    }
}

/// A predicate expression tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Predicate {
    /// `member op operand`
    Compare {
        op: CompareOp,
        member: Member,
        operand: Operand,
    },
    /// Both sides hold.
    And(Box<Predicate>, Box<Predicate>),
    /// Either side holds.
    Or(Box<Predicate>, Box<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
    /// `Contains`, `StartsWith` or `In`.
    Method {
        kind: MethodKind,
        member: Member,
        argument: Operand,
    },
    /// Tautology, renders as `1 = 1`.
    True,
}

impl Predicate {
    /// Combine with `AND`.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// Combine with `OR`.
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Check if this node is an `AND` or `OR`.
    pub fn is_logical(&self) -> bool {
        matches!(self, Predicate::And(..) | Predicate::Or(..))
    }

    /// Fold a sequence of predicates into a left-deep `AND` chain.
    ///
    /// Returns `None` for an empty sequence.
    pub fn all(predicates: impl IntoIterator<Item = Predicate>) -> Option<Predicate> {
        predicates.into_iter().reduce(Predicate::and)
    }

    /// Every column referenced by this tree, in walk order.
    pub fn members(&self) -> Vec<&Member> {
        let mut out = Vec::new();
        self.collect_members(&mut out);
        out
    }

    fn collect_members<'a>(&'a self, out: &mut Vec<&'a Member>) {
        match self {
            Predicate::Compare { member, .. } | Predicate::Method { member, .. } => {
                out.push(member)
            }
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_members(out);
                r.collect_members(out);
            }
            Predicate::Not(inner) => inner.collect_members(out),
            Predicate::True => {}
        }
    }
}

impl BitAnd for Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Predicate) -> Predicate {
        self.and(rhs)
    }
}

impl BitOr for Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Predicate) -> Predicate {
        self.or(rhs)
    }
}

impl Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}

/// The right-hand side of a comparison or the argument of a method call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operand {
    /// A value fixed when the tree was built.
    Literal(Value),
    /// A value computed when the tree is translated.
    #[serde(skip)]
    Captured(Capture),
}

impl Operand {
    /// Evaluate the operand.
    ///
    /// Literals are cloned; captures run their closure.
    pub fn resolve(&self) -> Result<Value, String> {
        match self {
            Operand::Literal(value) => Ok(value.clone()),
            Operand::Captured(capture) => capture.evaluate(),
        }
    }
}

type CaptureFn = dyn Fn() -> Result<Value, String> + Send + Sync;

/// A deferred operand: closed-over state, a nested property read, or the
/// result of a function call.
#[derive(Clone)]
pub struct Capture {
    f: Arc<CaptureFn>,
}

impl Capture {
    /// Wrap a fallible closure. An `Err` surfaces as a translation error.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Result<Value, String> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Run the closure.
    pub fn evaluate(&self) -> Result<Value, String> {
        (self.f)()
    }
}

impl fmt::Debug for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Capture(..)")
    }
}

/// Conversion into an [`Operand`].
pub trait IntoOperand {
    /// Perform the conversion.
    fn into_operand(self) -> Operand;
}

impl IntoOperand for Operand {
    fn into_operand(self) -> Operand {
        self
    }
}

impl IntoOperand for Capture {
    fn into_operand(self) -> Operand {
        Operand::Captured(self)
    }
}

impl IntoOperand for Value {
    fn into_operand(self) -> Operand {
        Operand::Literal(self)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),*) => {
        $(
            impl IntoOperand for $ty {
                fn into_operand(self) -> Operand {
                    Operand::Literal(Value::from(self))
                }
            }
        )*
    };
}

literal_operand!(bool, i32, i64, f32, f64, String, &str);

impl<T: Into<Value>> IntoOperand for Option<T> {
    fn into_operand(self) -> Operand {
        Operand::Literal(Value::from(self))
    }
}

impl<T: Into<Value>> IntoOperand for Vec<T> {
    fn into_operand(self) -> Operand {
        Operand::Literal(self.into_iter().collect())
    }
}
