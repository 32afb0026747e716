//! Capacity enforcement: which registrations go when an event shrinks.

use uuid::Uuid;

use crate::models::Registration;

/// How many active registrations exceed `capacity`. Unlimited capacity never overflows.
pub fn excess(active_registrations: i64, capacity: Option<i32>) -> i64 {
    match capacity {
        Some(capacity) => (active_registrations - i64::from(capacity)).max(0),
        None => 0,
    }
}

/// Picks the registrations to delete so the active count fits `capacity`.
///
/// Cancelled registrations are ignored. The most recently created go first,
/// ties broken by the larger id, matching the Postgres eviction query.
pub fn registrations_to_evict(registrations: &[Registration], capacity: Option<i32>) -> Vec<Uuid> {
    let mut active: Vec<&Registration> = registrations.iter().filter(|r| r.is_active()).collect();
    let overflow = excess(active.len() as i64, capacity);
    if overflow == 0 {
        return Vec::new();
    }

    active.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    active
        .into_iter()
        .take(overflow as usize)
        .map(|r| r.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegistrationStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn registrations(count: usize) -> Vec<Registration> {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        (0..count)
            .map(|i| Registration {
                id: Uuid::new_v4(),
                event_id: Uuid::nil(),
                user_id: None,
                email: format!("guest{i}@example.com"),
                name: None,
                status: RegistrationStatus::Registered,
                check_in_at: None,
                cancelled_at: None,
                created_at: base + Duration::minutes(i as i64),
                updated_at: base + Duration::minutes(i as i64),
            })
            .collect()
    }

    #[test]
    fn test_excess() {
        assert_eq!(excess(10, Some(7)), 3);
        assert_eq!(excess(3, Some(7)), 0);
        assert_eq!(excess(10, None), 0);
    }

    #[test]
    fn test_lowering_capacity_evicts_most_recent() {
        let regs = registrations(5);
        let evicted = registrations_to_evict(&regs, Some(2));
        assert_eq!(evicted, vec![regs[4].id, regs[3].id, regs[2].id]);
    }

    #[test]
    fn test_cancelled_registrations_do_not_count() {
        let mut regs = registrations(4);
        regs[3].status = RegistrationStatus::Cancelled;
        regs[1].status = RegistrationStatus::CheckedIn;

        let evicted = registrations_to_evict(&regs, Some(2));
        assert_eq!(evicted, vec![regs[2].id]);
    }

    #[test]
    fn test_no_eviction_when_within_capacity_or_unlimited() {
        let regs = registrations(3);
        assert!(registrations_to_evict(&regs, Some(3)).is_empty());
        assert!(registrations_to_evict(&regs, None).is_empty());
    }

    #[test]
    fn test_same_timestamp_breaks_ties_by_id() {
        let mut regs = registrations(3);
        let stamp = regs[0].created_at;
        for r in &mut regs {
            r.created_at = stamp;
        }
        let evicted = registrations_to_evict(&regs, Some(2));
        let max_id = regs.iter().map(|r| r.id).max().unwrap();
        assert_eq!(evicted, vec![max_id]);
    }
}
