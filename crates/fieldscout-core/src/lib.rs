pub mod claims;
pub mod error;
pub mod identity;
pub mod ids;
pub mod policy;
pub mod realm;
pub mod records;
pub mod roles;
pub mod schema;
pub mod upsert;
pub mod visibility;

pub use claims::{AuthContext, Claims, ClaimsError, extract};
pub use error::ErrorKind;
pub use ids::{EventKey, MatchKey, RealmId, SchemaId, SubjectId, TeamKey};
pub use policy::{Decision, DenyReason};
pub use roles::{RoleLevel, Roles};
pub use upsert::{UpsertOutcome, Upsertable};
pub use visibility::RealmFilter;
