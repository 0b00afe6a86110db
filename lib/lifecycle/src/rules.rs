use chrono::NaiveDate;
use policy::{PolicyVersion, VersionNumber};

/// Picks the number for a version about to be appended.
///
/// - A caller-supplied `"X.Y"` forces a major bump to `"(X+1).0"`.
/// - Otherwise the latest version bumps its minor, or its major when that
///   version expired before `today`.
/// - An empty history, or an unparseable input, yields `"1.0"`.
pub(crate) fn assign_version(provided: Option<&str>, last: Option<&PolicyVersion>, today: NaiveDate) -> VersionNumber {
    match provided {
        Some(raw) => match VersionNumber::parse_loose(raw) {
            Some(v) => v.bump_major(),
            None => VersionNumber::new(1, 0),
        },
        None => match last {
            Some(last) => {
                let expired = last.expired_at.map_or(false, |expiry| today > expiry);
                if expired { last.version.bump_major() } else { last.version.bump_minor() }
            },
            None => VersionNumber::new(1, 0),
        },
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;
    use policy::VersionStatus;
    use serde_json::Value;
    use uuid::Uuid;

    use super::*;

    fn last(version: &str, expired_at: Option<NaiveDate>) -> PolicyVersion {
        PolicyVersion {
            id: Uuid::new_v4(),
            org_policy_id: Uuid::nil(),
            version: version.parse().unwrap(),
            status: VersionStatus::Draft,
            is_current: false,
            diff_data: Value::Null,
            checkpoint_template: None,
            expired_at,
            published_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn day(s: &str) -> NaiveDate { s.parse().unwrap() }

    #[test]
    fn first_ever_version_is_one_dot_zero() {
        assert_eq!(assign_version(None, None, day("2024-05-01")), VersionNumber::new(1, 0));
    }

    #[test]
    fn omitted_version_bumps_the_minor() {
        let prev = last("1.3", None);
        assert_eq!(assign_version(None, Some(&prev), day("2024-05-01")), VersionNumber::new(1, 4));
    }

    #[test]
    fn expiry_forces_a_major_bump() {
        let prev = last("1.3", Some(day("2024-04-30")));
        assert_eq!(assign_version(None, Some(&prev), day("2024-05-01")), VersionNumber::new(2, 0));
    }

    #[test]
    fn expiry_today_does_not_count_as_expired() {
        let prev = last("1.3", Some(day("2024-05-01")));
        assert_eq!(assign_version(None, Some(&prev), day("2024-05-01")), VersionNumber::new(1, 4));
    }

    #[test]
    fn provided_version_forces_a_major_bump() {
        let prev = last("1.3", None);
        assert_eq!(assign_version(Some("1.1"), Some(&prev), day("2024-05-01")), VersionNumber::new(2, 0));
        assert_eq!(assign_version(Some("4.7"), Some(&prev), day("2024-05-01")), VersionNumber::new(5, 0));
        // Bare majors get their minor padded before the bump
        assert_eq!(assign_version(Some("2"), Some(&prev), day("2024-05-01")), VersionNumber::new(3, 0));
    }

    #[test]
    fn unparseable_version_falls_back_to_one_dot_zero() {
        let prev = last("3.9", None);
        assert_eq!(assign_version(Some("not-a-version"), Some(&prev), day("2024-05-01")), VersionNumber::new(1, 0));
        assert_eq!(assign_version(Some(""), Some(&prev), day("2024-05-01")), VersionNumber::new(1, 0));
    }
}
