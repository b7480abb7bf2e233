pub mod covariate;
pub mod event;
pub mod parser;
pub mod structs;
pub mod table;
pub use covariate::*;
pub use event::*;
pub use structs::{compare_ids, Data, Subject};
pub use table::{Cell, RawRow, RawTable, Table, TableError};
