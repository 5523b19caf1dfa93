//! ormsql protocol types.
//!
//! Plain data shared by the query core and its backends.
//!
//! # Modules
//!
//! - [`value`] - Runtime values for parameters and result rows
//! - [`predicate`] - Predicate expression trees and their builder API
//! - [`query`] - Ordering, paging, and join declarations

pub mod predicate;
pub mod query;
pub mod value;

pub use predicate::{
    captured, col, col_of, Capture, CompareOp, IntoOperand, Member, MethodKind, Operand,
    Predicate,
};
pub use query::{JoinKind, JoinSpec, OrderDirection, OrderSpec, Page, Relation};
pub use value::{KeyValue, Value};
