//! Insert, update and delete clauses.
//!
//! Each clause renders through the shared serializer in DML mode, so target
//! columns come out unqualified. Batches are executed as one statement with a
//! binding set per item.

mod clause;
pub mod delete;
pub mod insert;
pub mod update;

pub use delete::DeleteClause;
pub use insert::InsertClause;
pub use update::UpdateClause;
