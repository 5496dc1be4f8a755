//! Statement building, placeholder compilation and record mapping.

pub mod builder;
pub mod compiler;
pub mod repository;
pub mod serializer;
pub mod table;

pub use builder::{INSTANCE_ID_PARAM, QueryBuilder, Statement, StatementKind};
pub use compiler::{CompiledQuery, compile};
pub use repository::Repository;
pub use serializer::{Record, decode, encode, from_row, from_rows, to_params};
pub use table::{Table, quote_ident};
