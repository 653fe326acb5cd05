use crate::claims::AuthContext;
use crate::records::Owned;

use super::DenyReason;

pub fn require_authenticated(ctx: Option<&AuthContext>) -> Result<&AuthContext, DenyReason> {
    ctx.ok_or(DenyReason::NotAuthenticated)
}

/// Authorizes a crowd-sourced write and binds the record to the caller.
/// Any reporter or realm the client put in the body is overwritten.
pub fn stamp_record<R: Owned>(ctx: Option<&AuthContext>, mut record: R) -> Result<R, DenyReason> {
    let ctx = require_authenticated(ctx)?;
    record.set_owner(ctx.subject, ctx.realm);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EventKey, MatchKey, RealmId, SubjectId, TeamKey};
    use crate::records::{Report, ReportData};
    use crate::roles::Roles;
    use crate::policy::strategies;
    use proptest::prelude::*;

    fn report_with_owner(reporter: Option<i64>, realm: Option<i64>) -> Report {
        Report {
            event_key: EventKey::new("2024casd"),
            match_key: MatchKey::new("2024casd_qm1"),
            team_key: TeamKey::new("frc254"),
            reporter_id: reporter.map(SubjectId::new),
            realm_id: realm.map(RealmId::new),
            auto_name: String::new(),
            data: ReportData::default(),
        }
    }

    #[test]
    fn plain_user_report_is_bound_to_caller() {
        let ctx = AuthContext::new(SubjectId::new(9), RealmId::new(3), Roles::NONE);

        let stamped = stamp_record(Some(&ctx), report_with_owner(Some(1), Some(99))).unwrap();

        assert_eq!(stamped.reporter_id, Some(SubjectId::new(9)));
        assert_eq!(stamped.realm_id, Some(RealmId::new(3)));
    }

    #[test]
    fn anonymous_write_is_denied() {
        let result = stamp_record(None, report_with_owner(None, None));

        assert_eq!(result, Err(DenyReason::NotAuthenticated));
    }

    proptest! {
        #[test]
        fn stamped_owner_is_always_the_caller(
            ctx in strategies::context(strategies::roles()),
            reporter in proptest::option::of(any::<i64>()),
            realm in proptest::option::of(any::<i64>()),
        ) {
            let stamped = stamp_record(Some(&ctx), report_with_owner(reporter, realm)).unwrap();

            prop_assert_eq!(stamped.reporter_id, Some(ctx.subject));
            prop_assert_eq!(stamped.realm_id, Some(ctx.realm));
        }
    }
}
