//! Statement builders.
//!
//! Builders hold no dialect; the dialect is chosen when a statement is
//! rendered with [`ToSql`](crate::ToSql).

mod insert;
mod select;
mod update;

pub use insert::Insert;
pub use select::{AGGREGATE_ALIAS, OrderBy, Select, SelectItem};
pub use update::Update;
