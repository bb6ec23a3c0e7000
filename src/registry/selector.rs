//! Picks the next unit to execute.

use super::model::{UnitStatus, WorkUnit};
use std::cmp::Ordering;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Selected(WorkUnit),
    /// No unit has status `ready`.
    NoReadyUnits,
    /// Every ready unit waits on a blocker that is not yet implemented.
    AllBlocked { blocked: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// First recognized tag in sorted order, else `Medium`.
    pub fn of(unit: &WorkUnit) -> Self {
        unit.tags
            .iter()
            .find_map(|tag| Self::from_tag(tag))
            .unwrap_or(Self::Medium)
    }
}

/// A unit is blocked while any registered blocker is not `implemented`.
///
/// Blocker IDs missing from `units` are ignored.
pub fn is_blocked(unit: &WorkUnit, units: &[WorkUnit]) -> bool {
    let status_by_id: BTreeMap<&str, UnitStatus> = units
        .iter()
        .map(|u| (u.unit_id.as_str(), u.status))
        .collect();
    blocked_with(unit, &status_by_id)
}

fn blocked_with(unit: &WorkUnit, status_by_id: &BTreeMap<&str, UnitStatus>) -> bool {
    unit.dependencies.blocked_by.iter().any(|blocker| {
        status_by_id
            .get(blocker.as_str())
            .is_some_and(|status| *status != UnitStatus::Implemented)
    })
}

fn partition_ready(units: &[WorkUnit]) -> (Vec<&WorkUnit>, Vec<&WorkUnit>) {
    let status_by_id: BTreeMap<&str, UnitStatus> = units
        .iter()
        .map(|u| (u.unit_id.as_str(), u.status))
        .collect();
    units
        .iter()
        .filter(|u| u.status == UnitStatus::Ready)
        .partition(|u| !blocked_with(u, &status_by_id))
}

fn by_priority(a: &&WorkUnit, b: &&WorkUnit) -> Ordering {
    Priority::of(a)
        .cmp(&Priority::of(b))
        .then_with(|| a.created_date.cmp(&b.created_date))
        .then_with(|| a.unit_number.cmp(&b.unit_number))
}

/// Ready units with no outstanding blockers, best candidate first.
pub fn ready_unblocked_units(units: &[WorkUnit]) -> Vec<&WorkUnit> {
    let (mut unblocked, _) = partition_ready(units);
    unblocked.sort_by(by_priority);
    unblocked
}

/// IDs of ready units held back by a blocker.
pub fn blocked_units(units: &[WorkUnit]) -> Vec<String> {
    let (_, blocked) = partition_ready(units);
    blocked.into_iter().map(|u| u.unit_id.clone()).collect()
}

pub fn select_next(units: &[WorkUnit]) -> Selection {
    let (mut unblocked, blocked) = partition_ready(units);
    if unblocked.is_empty() {
        if blocked.is_empty() {
            return Selection::NoReadyUnits;
        }
        return Selection::AllBlocked {
            blocked: blocked.into_iter().map(|u| u.unit_id.clone()).collect(),
        };
    }
    unblocked.sort_by(by_priority);
    match unblocked.first() {
        Some(unit) => Selection::Selected((*unit).clone()),
        None => Selection::NoReadyUnits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::model::{unit_id_for, Dependencies};
    use chrono::NaiveDate;

    fn unit(n: u32, status: UnitStatus, tags: &[&str], blocked_by: &[&str], day: u32) -> WorkUnit {
        WorkUnit {
            unit_id: unit_id_for(n),
            unit_number: n,
            title: format!("Unit {n}"),
            slug: format!("unit-{n}"),
            description: None,
            status,
            created_date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            prepared_date: None,
            ready_date: None,
            implemented_date: None,
            archived_date: None,
            directory: format!(".tasks/units/{}", unit_id_for(n)),
            tracker_issue: None,
            tracker_url: None,
            execution_mode: None,
            files_created: None,
            files_modified: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            dependencies: Dependencies {
                blocked_by: blocked_by.iter().map(|b| b.to_string()).collect(),
                ..Dependencies::default()
            },
        }
    }

    fn selected_id(selection: Selection) -> String {
        match selection {
            Selection::Selected(unit) => unit.unit_id,
            other => panic!("expected a selection, got {other:?}"),
        }
    }

    #[test]
    fn no_ready_units() {
        let units = vec![
            unit(1, UnitStatus::Defined, &[], &[], 1),
            unit(2, UnitStatus::Implemented, &[], &[], 1),
        ];
        assert_eq!(select_next(&units), Selection::NoReadyUnits);
        assert_eq!(select_next(&[]), Selection::NoReadyUnits);
    }

    #[test]
    fn blocker_must_be_implemented() {
        let units = vec![
            unit(1, UnitStatus::Ready, &[], &[], 1),
            unit(2, UnitStatus::Ready, &["critical"], &["UNIT-001"], 1),
        ];
        assert_eq!(selected_id(select_next(&units)), "UNIT-001");
        assert_eq!(blocked_units(&units), vec!["UNIT-002"]);
    }

    #[test]
    fn chain_selects_unit_whose_blocker_is_implemented() {
        let units = vec![
            unit(1, UnitStatus::Implemented, &[], &[], 1),
            unit(2, UnitStatus::Ready, &[], &["UNIT-001"], 2),
            unit(3, UnitStatus::Ready, &["critical"], &["UNIT-002"], 1),
        ];
        assert_eq!(selected_id(select_next(&units)), "UNIT-002");
        assert!(is_blocked(&units[2], &units));
    }

    #[test]
    fn all_ready_units_blocked() {
        let units = vec![
            unit(1, UnitStatus::Prepared, &[], &[], 1),
            unit(2, UnitStatus::Ready, &[], &["UNIT-001"], 2),
            unit(3, UnitStatus::Ready, &[], &["UNIT-001"], 3),
        ];
        assert_eq!(
            select_next(&units),
            Selection::AllBlocked {
                blocked: vec!["UNIT-002".into(), "UNIT-003".into()]
            }
        );
    }

    #[test]
    fn missing_blocker_does_not_block() {
        let units = vec![unit(4, UnitStatus::Ready, &[], &["UNIT-999"], 1)];
        assert!(!is_blocked(&units[0], &units));
        assert_eq!(selected_id(select_next(&units)), "UNIT-004");
    }

    #[test]
    fn priority_then_created_date_then_number() {
        let units = vec![
            unit(1, UnitStatus::Implemented, &[], &[], 1),
            unit(2, UnitStatus::Ready, &["high"], &["UNIT-001"], 2),
            unit(3, UnitStatus::Ready, &["critical"], &["UNIT-004"], 3),
            unit(4, UnitStatus::Ready, &[], &[], 4),
        ];
        assert_eq!(selected_id(select_next(&units)), "UNIT-002");

        let ids: Vec<&str> = ready_unblocked_units(&units)
            .into_iter()
            .map(|u| u.unit_id.as_str())
            .collect();
        assert_eq!(ids, vec!["UNIT-002", "UNIT-004"]);
    }

    #[test]
    fn ties_break_on_date_then_number() {
        let units = vec![
            unit(1, UnitStatus::Ready, &["low"], &[], 1),
            unit(2, UnitStatus::Ready, &[], &[], 5),
            unit(3, UnitStatus::Ready, &["medium"], &[], 5),
            unit(4, UnitStatus::Ready, &["medium"], &[], 2),
        ];
        let ids: Vec<&str> = ready_unblocked_units(&units)
            .into_iter()
            .map(|u| u.unit_id.as_str())
            .collect();
        assert_eq!(ids, vec!["UNIT-004", "UNIT-002", "UNIT-003", "UNIT-001"]);
    }

    #[test]
    fn first_recognized_tag_in_sorted_order_wins() {
        let tagged = unit(1, UnitStatus::Ready, &["low", "backend", "critical"], &[], 1);
        assert_eq!(Priority::of(&tagged), Priority::Critical);
        let untagged = unit(2, UnitStatus::Ready, &["backend"], &[], 1);
        assert_eq!(Priority::of(&untagged), Priority::Medium);
    }
}
