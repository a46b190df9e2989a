//! End-to-end allocation flow against the `SQLite` store.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parkd_core::model::{
    DraftAllocation, Lot, LotId, NewRequest, RegionKey, Role, Space, SpaceId, UserId, lot_names,
    role_names,
};
use parkd_core::run::run_for_date;
use parkd_core::store::{AllocationStore, StoreError};
use parkd_daemon::store::SqliteStore;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 11, 20, 0, 0).unwrap()
}

fn amsterdam() -> RegionKey {
    RegionKey::new("NL", "Amsterdam")
}

/// A store with two roles, one two-space lot, and two employees.
fn seeded_store() -> SqliteStore {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.insert_role(&Role::new(role_names::EMPLOYEE, 2)).unwrap();
    store.insert_role(&Role::new(role_names::MANAGER, 1)).unwrap();

    let mut lot = Lot::new(LotId(1), lot_names::HQ, 0, amsterdam());
    lot.address = Some("Hoofdstraat 1".to_string());
    lot.eligible_roles.insert(role_names::EMPLOYEE.to_string());
    lot.spaces = vec![
        Space::new(SpaceId(10), lot.id, "A1"),
        Space::new(SpaceId(11), lot.id, "A2"),
    ];
    store.insert_lot(&lot).unwrap();

    for user in [1, 2] {
        store.insert_user(UserId(user), &format!("User {user}")).unwrap();
        store.assign_role(UserId(user), role_names::EMPLOYEE).unwrap();
    }
    store
}

fn submit(store: &mut SqliteStore, user: i64, d: u32, secs: i64) -> parkd_core::model::Request {
    store
        .create_request(NewRequest {
            requester: UserId(user),
            requested_date: date(d),
            requested_at: now() + chrono::Duration::seconds(secs),
            region: amsterdam(),
        })
        .unwrap()
}

#[test]
fn run_allocates_and_persists() {
    let mut store = seeded_store();
    submit(&mut store, 1, 12, 0);
    submit(&mut store, 2, 12, 60);

    let report = run_for_date(&mut store, date(12), now()).unwrap();
    assert_eq!(report.satisfied(), 2);

    // FIFO pairing against ascending space ids survives the round trip.
    let stored = store.allocations_for_date(date(12)).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].requester, UserId(1));
    assert_eq!(stored[0].space_id, SpaceId(10));
    assert_eq!(stored[1].requester, UserId(2));
    assert_eq!(stored[1].space_id, SpaceId(11));
}

#[test]
fn rerun_for_same_date_allocates_nothing() {
    let mut store = seeded_store();
    submit(&mut store, 1, 12, 0);

    assert_eq!(run_for_date(&mut store, date(12), now()).unwrap().satisfied(), 1);
    assert_eq!(run_for_date(&mut store, date(12), now()).unwrap().satisfied(), 0);
    assert_eq!(store.allocations_for_date(date(12)).unwrap().len(), 1);
}

#[test]
fn unique_constraints_reject_overlapping_writes() {
    let mut store = seeded_store();
    store
        .save_allocations(&[DraftAllocation::new(UserId(1), SpaceId(10), date(12), now())])
        .unwrap();

    // Same space, same date.
    let err = store
        .save_allocations(&[DraftAllocation::new(UserId(2), SpaceId(10), date(12), now())])
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    // Same user, same date.
    let err = store
        .save_allocations(&[DraftAllocation::new(UserId(1), SpaceId(11), date(12), now())])
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));

    assert_eq!(store.allocations_for_date(date(12)).unwrap().len(), 1);
}

#[test]
fn conflicting_batch_rolls_back_entirely() {
    let mut store = seeded_store();
    let drafts = vec![
        DraftAllocation::new(UserId(1), SpaceId(10), date(12), now()),
        DraftAllocation::new(UserId(2), SpaceId(10), date(12), now()),
    ];

    assert!(store.save_allocations(&drafts).is_err());
    assert!(store.allocations_for_date(date(12)).unwrap().is_empty());
}

#[test]
fn duplicate_request_is_rejected_by_constraint() {
    let mut store = seeded_store();
    submit(&mut store, 1, 12, 0);

    let err = store
        .create_request(NewRequest {
            requester: UserId(1),
            requested_date: date(12),
            requested_at: now(),
            region: amsterdam(),
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { .. }));
}

#[test]
fn withdraw_request_round_trip() {
    let mut store = seeded_store();
    let request = submit(&mut store, 1, 12, 0);

    // Wrong owner, then the right one.
    assert!(!store.withdraw_request(request.id, UserId(2)).unwrap());
    assert!(store.withdraw_request(request.id, UserId(1)).unwrap());
    assert!(store.pending_requests(date(12)).unwrap().is_empty());
}

#[test]
fn withdraw_is_refused_once_allocated() {
    let mut store = seeded_store();
    let request = submit(&mut store, 1, 12, 0);
    run_for_date(&mut store, date(12), now()).unwrap();

    assert!(!store.withdraw_request(request.id, UserId(1)).unwrap());
}

#[test]
fn user_allocation_query_joins_display_data() {
    let mut store = seeded_store();
    submit(&mut store, 1, 12, 0);
    run_for_date(&mut store, date(12), now()).unwrap();

    let details = store.user_allocation(UserId(1), date(12)).unwrap().unwrap();
    assert_eq!(details.space_label, "A1");
    assert_eq!(details.lot_name, lot_names::HQ);
    assert_eq!(details.lot_address.as_deref(), Some("Hoofdstraat 1"));
    assert_eq!(details.allocation.allocated_at, now());

    assert!(store.user_allocation(UserId(2), date(12)).unwrap().is_none());
}

#[test]
fn topology_round_trips_through_sqlite() {
    let store = seeded_store();
    let lots = store.lots().unwrap();

    assert_eq!(lots.len(), 1);
    let lot = &lots[0];
    assert_eq!(lot.name, lot_names::HQ);
    assert_eq!(lot.region, amsterdam());
    assert!(lot.allows_role(role_names::EMPLOYEE));
    assert_eq!(lot.spaces.len(), 2);
    assert_eq!(lot.spaces[0].id, SpaceId(10));
    assert_eq!(lot.spaces[0].label, "A1");
}

#[test]
fn role_directory_resolves_assignments() {
    let mut store = seeded_store();
    store.assign_role(UserId(1), role_names::MANAGER).unwrap();

    let directory = store
        .role_directory(&[UserId(1), UserId(2), UserId(99)])
        .unwrap();
    assert_eq!(directory.priority_rank(UserId(1)), Some(1));
    assert_eq!(directory.priority_rank(UserId(2)), Some(2));
    assert_eq!(directory.priority_rank(UserId(99)), None);
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("parkd.sqlite3");

    {
        let mut store = SqliteStore::open(&db_path).unwrap();
        store.insert_role(&Role::new(role_names::EMPLOYEE, 2)).unwrap();
        store.insert_user(UserId(1), "User 1").unwrap();
        store.assign_role(UserId(1), role_names::EMPLOYEE).unwrap();

        let mut lot = Lot::new(LotId(1), lot_names::HQ, 0, amsterdam());
        lot.eligible_roles.insert(role_names::EMPLOYEE.to_string());
        lot.spaces = vec![Space::new(SpaceId(10), lot.id, "A1")];
        store.insert_lot(&lot).unwrap();

        submit(&mut store, 1, 12, 0);
        run_for_date(&mut store, date(12), now()).unwrap();
    }

    let store = SqliteStore::open(&db_path).unwrap();
    let stored = store.allocations_for_date(date(12)).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].requester, UserId(1));
    assert_eq!(stored[0].allocated_at, now());
}
