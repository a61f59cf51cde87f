pub mod btree;
pub mod manager;
pub mod table;
pub mod value;

pub use btree::{BPlusTree, DEFAULT_ORDER, InternalNode, LeafNode, Node, NodeId, TreeError, TreeResult};
pub use manager::{DatabaseError, DatabaseManager, DatabaseResult, TableInfo};
pub use table::{RecordId, RowIds, Table, TableError, TableResult};
pub use value::Value;
