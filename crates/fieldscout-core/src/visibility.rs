//! Realm inclusion predicate for reads.
//!
//! The filter is computed from the caller alone and handed to the storage
//! layer, which applies it in its query so rows from hidden realms are never
//! loaded. Rows without a realm (authoritative rosters, standard schemas) are
//! visible to everyone.

use crate::claims::AuthContext;
use crate::ids::RealmId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmFilter {
    /// Every realm, private or not.
    All,
    /// Only realms that share their reports.
    Shared,
    /// The caller's own realm plus every sharing realm.
    OwnAndShared(RealmId),
}

pub fn filter_for(ctx: Option<&AuthContext>) -> RealmFilter {
    match ctx {
        Some(ctx) if ctx.roles.is_super_admin => RealmFilter::All,
        Some(ctx) => RealmFilter::OwnAndShared(ctx.realm),
        None => RealmFilter::Shared,
    }
}

impl RealmFilter {
    /// Whether a row owned by `realm` is visible, given that realm's sharing
    /// policy.
    pub fn admits(&self, realm: Option<RealmId>, share_reports: bool) -> bool {
        let Some(realm) = realm else {
            return true;
        };
        match self {
            RealmFilter::All => true,
            RealmFilter::Shared => share_reports,
            RealmFilter::OwnAndShared(own) => *own == realm || share_reports,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, RealmFilter::All)
    }

    /// The private realm this filter additionally admits, if any.
    pub fn own_realm(&self) -> Option<RealmId> {
        match self {
            RealmFilter::OwnAndShared(own) => Some(*own),
            RealmFilter::All | RealmFilter::Shared => None,
        }
    }
}
