pub mod memory;
pub mod postgres;
pub mod traits;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use traits::{
    IdentityStore, MatchStore, RealmStore, RecordStore, SchemaStore, Store, StorageError,
};
