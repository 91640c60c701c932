// tests/reconcile.rs

mod common;

use chrono::{Duration, Utc};
use common::*;
use ldapsync::config::SourceKind;
use ldapsync::directory::Directory;
use ldapsync::events::SyncAction;
use ldapsync::models::user::DepartmentAssignment;
use ldapsync::models::{Department, PasswordHash, Role, SourceDepartment, SourceUser, SyncState, User, UserStatus};
use ldapsync::source::ExportSource;
use ldapsync::store::{Criteria, DepartmentStore, UserStore};
use ldapsync::sync::ErrorKind;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio_test::{assert_err, assert_ok};

fn hr_export() -> ldapsync::source::SourceExport {
    export(json!({
        "departments": [
            { "id": "10", "parent_id": "1", "name": "Eng" },
            { "id": "1", "parent_id": "0", "name": "Root" }
        ],
        "users": [
            { "id": "u1", "username": "alice", "name": "Alice", "email": "alice@example.com", "department": [10] }
        ]
    }))
}

fn wecom_export(usernames: &[&str]) -> ldapsync::source::SourceExport {
    let users: Vec<_> = usernames
        .iter()
        .enumerate()
        .map(|(i, name)| json!({ "userid": 100 + i, "username": name, "name": name, "department": [2] }))
        .collect();
    export(json!({
        "departments": [
            { "id": 1, "parentid": 0, "name": "Acme" },
            { "id": 2, "parentid": 1, "name": "Ops" }
        ],
        "users": users
    }))
}

const OPS_DN: &str = "cn=Ops,cn=Acme,dc=example,dc=com";

async fn user(h: &Harness, username: &str) -> User {
    UserStore::find(&*h.store, &Criteria::new().dn(user_dn(username)))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no row for {username}"))
}

async fn department(h: &Harness, dn: &str) -> Department {
    DepartmentStore::find(&*h.store, &Criteria::new().dn(dn))
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("no row for {dn}"))
}

#[tokio::test]
async fn departments_are_created_parents_first() {
    let h = Harness::new().with_source(source("hr", SourceKind::DingTalk), Arc::new(ExportSource::in_memory(hr_export())));
    let mut events = h.reconciler.events().subscribe();

    let outcome = h.reconciler.sync_departments("hr").await.unwrap();
    assert_eq!(outcome.seen, 2);
    assert_eq!(outcome.created, 2);

    let rows = DepartmentStore::list_all(&*h.store).await.unwrap();
    let dns: Vec<&str> = rows.iter().map(|d| d.group_dn.as_str()).collect();
    assert_eq!(dns, ["cn=Root,dc=example,dc=com", "cn=Eng,cn=Root,dc=example,dc=com"]);
    assert!(rows.iter().all(|d| d.sync_state == SyncState::Synced));
    assert_eq!(rows[0].children, vec![rows[1].id]);
    assert_eq!(rows[1].parent_id, rows[0].id);
    assert_eq!(rows[1].source_dept_id, "hr_10");

    for row in &rows {
        assert!(h.directory.entry(&row.group_dn).await.is_some());
        let event = events.try_recv().unwrap();
        assert_eq!(event.action, SyncAction::DepartmentCreated);
        assert_eq!(event.entity, row.group_dn);
    }
}

#[tokio::test]
async fn renamed_department_keeps_children_under_old_dn() {
    let departments = |middle: &str| {
        json!([
            { "id": "1", "parent_id": "0", "name": "Root" },
            { "id": "10", "parent_id": "1", "name": middle },
            { "id": "11", "parent_id": "10", "name": "QA" }
        ])
    };
    let feed = Arc::new(ExportSource::in_memory(export(json!({ "departments": departments("Eng") }))));
    let h = Harness::new().with_source(source("hr", SourceKind::DingTalk), feed.clone());
    assert_ok!(h.reconciler.sync_departments("hr").await);

    let qa_dn = "cn=QA,cn=Eng,cn=Root,dc=example,dc=com";
    let qa = department(&h, qa_dn).await;

    feed.replace(export(json!({ "departments": departments("Platform") }))).await.unwrap();
    let outcome = h.reconciler.sync_departments("hr").await.unwrap();
    assert_eq!(outcome.created, 1);

    // DN потомка выводится из первой строки родителя, то есть из старой
    assert_eq!(department(&h, qa_dn).await, qa);
    assert!(h.directory.entry(qa_dn).await.is_some());
    let old = department(&h, "cn=Eng,cn=Root,dc=example,dc=com").await;
    assert_eq!(qa.parent_id, old.id);

    let renamed = department(&h, "cn=Platform,cn=Root,dc=example,dc=com").await;
    assert_eq!(renamed.source_dept_id, old.source_dept_id);
    assert_eq!(renamed.source_dept_id, "hr_10");
    assert!(h.directory.entry(&renamed.group_dn).await.is_some());

    let missing = DepartmentStore::find(&*h.store, &Criteria::new().dn("cn=QA,cn=Platform,cn=Root,dc=example,dc=com"))
        .await
        .unwrap();
    assert!(missing.is_none());
    assert_eq!(DepartmentStore::list_all(&*h.store).await.unwrap().len(), 4);
}

#[tokio::test]
async fn users_are_published_with_membership() {
    let h = Harness::new().with_source(source("hr", SourceKind::DingTalk), Arc::new(ExportSource::in_memory(hr_export())));
    assert_ok!(h.reconciler.sync_source("hr").await);

    let alice = user(&h, "alice").await;
    let eng = department(&h, "cn=Eng,cn=Root,dc=example,dc=com").await;
    assert_eq!(alice.user_dn, user_dn("alice"));
    assert_eq!(alice.source_user_id, "hr_u1");
    assert_eq!(alice.departments, "Eng");
    assert_eq!(alice.department_ids, vec![eng.id]);
    assert_eq!(alice.sync_state, SyncState::Synced);
    assert_eq!(alice.status, UserStatus::Active);
    assert!(bcrypt::verify("Welcome1!", &alice.password.hash).unwrap());
    assert_eq!(eng.members, vec![alice.id]);

    let entry = h.directory.entry(&alice.user_dn).await.unwrap();
    assert_eq!(entry.first("mail"), Some("alice@example.com"));
    assert!(entry.first("userPassword").unwrap().starts_with("{CRYPT}"));
    assert_eq!(h.directory.members_of(&eng.group_dn).await, vec![alice.user_dn.clone()]);
}

#[tokio::test]
async fn second_pass_with_same_data_writes_nothing() {
    let mut config = source("hr", SourceKind::DingTalk);
    config.update_on_sync = true;
    let h = Harness::new().with_source(config, Arc::new(ExportSource::in_memory(hr_export())));
    assert_ok!(h.reconciler.sync_source("hr").await);

    let writes = h.directory.writes();
    let departments = DepartmentStore::list_all(&*h.store).await.unwrap();
    let users = UserStore::list_all(&*h.store).await.unwrap();
    let mut events = h.reconciler.events().subscribe();

    let outcome = h.reconciler.sync_source("hr").await.unwrap();
    assert_eq!(outcome.departments.created + outcome.departments.repaired, 0);
    assert_eq!(outcome.users.synced, 1);
    assert_eq!(outcome.users.created + outcome.users.updated + outcome.users.deprovisioned, 0);
    assert_eq!(h.directory.writes(), writes);
    assert!(events.try_recv().is_err());
    // строки хранилища не тронуты, включая метки времени
    assert_eq!(DepartmentStore::list_all(&*h.store).await.unwrap(), departments);
    assert_eq!(UserStore::list_all(&*h.store).await.unwrap(), users);
}

#[tokio::test]
async fn failed_publish_is_repaired_on_next_pass() {
    let h = Harness::new().with_source(
        source("wecom", SourceKind::WeCom),
        Arc::new(ExportSource::in_memory(wecom_export(&["alice", "bob"]))),
    );
    *h.directory.fail_create_user.lock().unwrap() = Some("bob".to_string());

    let err = h.reconciler.sync_source("wecom").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Directory);
    assert!(err.to_string().contains(&user_dn("bob")));

    let bob = user(&h, "bob").await;
    assert_eq!(bob.sync_state, SyncState::Pending);
    assert!(h.directory.entry(&bob.user_dn).await.is_none());

    *h.directory.fail_create_user.lock().unwrap() = None;
    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.deprovisioned, 0);

    let bob = user(&h, "bob").await;
    assert_eq!(bob.sync_state, SyncState::Synced);
    assert!(h.directory.entry(&bob.user_dn).await.is_some());
    assert!(h.directory.members_of(OPS_DN).await.contains(&bob.user_dn));
    assert!(department(&h, OPS_DN).await.members.contains(&bob.id));
}

#[tokio::test]
async fn roster_absence_deprovisions_and_rehire_restores() {
    let feed = Arc::new(ExportSource::in_memory(wecom_export(&["alice", "bob"])));
    let h = Harness::new().with_source(source("wecom", SourceKind::WeCom), feed.clone());
    assert_ok!(h.reconciler.sync_source("wecom").await);
    let bob_id = user(&h, "bob").await.id;

    feed.replace(wecom_export(&["alice"])).await.unwrap();
    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.deprovisioned, 1);

    let bob = user(&h, "bob").await;
    assert_eq!(bob.status, UserStatus::Left);
    assert!(h.directory.entry(&bob.user_dn).await.is_none());
    assert!(!h.directory.members_of(OPS_DN).await.contains(&bob.user_dn));
    assert!(!department(&h, OPS_DN).await.members.contains(&bob_id));
    assert_eq!(user(&h, "alice").await.status, UserStatus::Active);

    // уже ушедший не снимается повторно
    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.deprovisioned, 0);

    feed.replace(wecom_export(&["alice", "bob"])).await.unwrap();
    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.reactivated, 1);

    let bob = user(&h, "bob").await;
    assert_eq!(bob.id, bob_id);
    assert_eq!(bob.status, UserStatus::Active);
    assert_eq!(bob.sync_state, SyncState::Synced);
    assert!(h.directory.members_of(OPS_DN).await.contains(&bob.user_dn));
}

#[tokio::test]
async fn failed_directory_delete_keeps_user_active() {
    let feed = Arc::new(ExportSource::in_memory(wecom_export(&["alice", "bob"])));
    let h = Harness::new().with_source(source("wecom", SourceKind::WeCom), feed.clone());
    assert_ok!(h.reconciler.sync_source("wecom").await);

    feed.replace(wecom_export(&["alice"])).await.unwrap();
    h.directory.fail_delete.store(true, Ordering::SeqCst);
    let err = assert_err!(h.reconciler.sync_users("wecom").await);
    assert_eq!(err.kind(), ErrorKind::Directory);
    assert_eq!(user(&h, "bob").await.status, UserStatus::Active);

    h.directory.fail_delete.store(false, Ordering::SeqCst);
    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.deprovisioned, 1);
    assert_eq!(user(&h, "bob").await.status, UserStatus::Left);
}

#[tokio::test]
async fn explicit_listing_honours_leave_window() {
    let days_ago = |days: i64| (Utc::now() - Duration::days(days)).to_rfc3339();
    let feed = Arc::new(ExportSource::in_memory(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [
            { "userid": "a1", "username": "alice", "department": [1] },
            { "userid": "b2", "username": "bob", "department": [1] },
            { "userid": "c3", "username": "carol", "department": [1] }
        ]
    }))));
    let mut config = source("ding", SourceKind::DingTalk);
    config.leave_range_days = 30;
    let h = Harness::new().with_source(config, feed.clone());
    assert_ok!(h.reconciler.sync_source("ding").await);

    feed.replace(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [{ "userid": "a1", "username": "alice", "department": [1] }],
        "leavers": [
            { "id": "b2", "left_at": days_ago(3) },
            { "id": "c3", "left_at": days_ago(90) },
            { "id": "ghost", "left_at": days_ago(1) }
        ]
    })))
    .await
    .unwrap();

    let outcome = h.reconciler.sync_users("ding").await.unwrap();
    assert_eq!(outcome.deprovisioned, 1);
    assert_eq!(user(&h, "bob").await.status, UserStatus::Left);
    // вне окна и без записи в листинге: остаётся
    assert_eq!(user(&h, "carol").await.status, UserStatus::Active);
    assert_eq!(user(&h, "alice").await.status, UserStatus::Active);
}

#[tokio::test]
async fn rehired_user_still_listed_as_leaver_stays_active() {
    let days_ago = |days: i64| (Utc::now() - Duration::days(days)).to_rfc3339();
    let alice = json!({ "userid": "a1", "username": "alice", "department": [1] });
    let bob = json!({ "userid": "b2", "username": "bob", "department": [1] });
    let feed = Arc::new(ExportSource::in_memory(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [alice.clone(), bob.clone()]
    }))));
    let mut config = source("ding", SourceKind::DingTalk);
    config.leave_range_days = 30;
    let h = Harness::new().with_source(config, feed.clone());
    assert_ok!(h.reconciler.sync_source("ding").await);

    let leavers = json!([{ "id": "b2", "left_at": days_ago(3) }]);
    feed.replace(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [alice.clone()],
        "leavers": leavers.clone()
    })))
    .await
    .unwrap();
    let outcome = h.reconciler.sync_users("ding").await.unwrap();
    assert_eq!(outcome.deprovisioned, 1);
    assert_eq!(user(&h, "bob").await.status, UserStatus::Left);

    // снова в активном списке, но листинг уволенных ещё помнит его
    feed.replace(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [alice, bob],
        "leavers": leavers
    })))
    .await
    .unwrap();
    let outcome = h.reconciler.sync_users("ding").await.unwrap();
    assert_eq!(outcome.reactivated, 1);
    assert_eq!(outcome.deprovisioned, 0);
    let bob = user(&h, "bob").await;
    assert_eq!(bob.status, UserStatus::Active);
    assert!(h.directory.entry(&bob.user_dn).await.is_some());

    let writes = h.directory.writes();
    for _ in 0..2 {
        let outcome = h.reconciler.sync_users("ding").await.unwrap();
        assert_eq!(outcome.reactivated + outcome.deprovisioned, 0);
    }
    assert_eq!(h.directory.writes(), writes);
    assert_eq!(user(&h, "bob").await.status, UserStatus::Active);
}

#[tokio::test]
async fn duplicate_leaver_ids_deprovision_once() {
    let feed = Arc::new(ExportSource::in_memory(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [
            { "userid": "a1", "username": "alice", "department": [1] },
            { "userid": "b2", "username": "bob", "department": [1] }
        ]
    }))));
    let h = Harness::new().with_source(source("ding", SourceKind::DingTalk), feed.clone());
    assert_ok!(h.reconciler.sync_source("ding").await);

    feed.replace(export(json!({
        "departments": [{ "id": 1, "parent_id": 0, "name": "Acme" }],
        "users": [{ "userid": "a1", "username": "alice", "department": [1] }],
        "leavers": [{ "id": "b2" }, { "id": " b2 " }, { "id": "b2" }]
    })))
    .await
    .unwrap();

    let outcome = h.reconciler.sync_users("ding").await.unwrap();
    assert_eq!(outcome.deprovisioned, 1);
    assert_eq!(user(&h, "bob").await.status, UserStatus::Left);
    assert!(h.directory.entry(&user_dn("bob")).await.is_none());
}

#[tokio::test]
async fn update_on_sync_controls_profile_changes() {
    let feed = Arc::new(ExportSource::in_memory(export(json!({
        "departments": [
            { "id": 1, "parentid": 0, "name": "Acme" },
            { "id": 2, "parentid": 1, "name": "Ops" },
            { "id": 3, "parentid": 1, "name": "Eng" }
        ],
        "users": [{ "userid": 7, "username": "alice", "email": "alice@old.example", "title": "Engineer", "department": [2] }]
    }))));
    let h = Harness::new().with_source(source("wecom", SourceKind::WeCom), feed.clone());
    assert_ok!(h.reconciler.sync_source("wecom").await);

    feed.replace(export(json!({
        "departments": [
            { "id": 1, "parentid": 0, "name": "Acme" },
            { "id": 2, "parentid": 1, "name": "Ops" },
            { "id": 3, "parentid": 1, "name": "Eng" }
        ],
        "users": [{ "userid": 7, "username": "alice", "email": "alice@new.example", "department": [3] }]
    })))
    .await
    .unwrap();

    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.updated, 0);
    assert_eq!(user(&h, "alice").await.mail, "alice@old.example");

    let mut config = source("wecom", SourceKind::WeCom);
    config.update_on_sync = true;
    let h = h.with_source(config, feed.clone());
    let outcome = h.reconciler.sync_users("wecom").await.unwrap();
    assert_eq!(outcome.updated, 1);

    let alice = user(&h, "alice").await;
    let eng_dn = "cn=Eng,cn=Acme,dc=example,dc=com";
    assert_eq!(alice.mail, "alice@new.example");
    // пустое значение источника не затирает сохранённое
    assert_eq!(alice.position, "Engineer");
    assert_eq!(alice.departments, "Eng");
    assert_eq!(alice.department_ids, vec![department(&h, eng_dn).await.id]);

    let entry = h.directory.entry(&alice.user_dn).await.unwrap();
    assert_eq!(entry.first("mail"), Some("alice@new.example"));
    assert_eq!(h.directory.members_of(eng_dn).await, vec![alice.user_dn.clone()]);
    assert!(h.directory.members_of(OPS_DN).await.is_empty());
    assert!(department(&h, OPS_DN).await.members.is_empty());
}

#[tokio::test]
async fn drift_marks_missing_entries_and_push_restores_them() {
    let h = Harness::new().with_source(
        source("wecom", SourceKind::WeCom),
        Arc::new(ExportSource::in_memory(wecom_export(&["alice", "bob"]))),
    );
    assert_ok!(h.reconciler.sync_source("wecom").await);
    let report = h.reconciler.detect_user_drift().await.unwrap();
    assert_eq!(report.checked, 2);
    assert!(report.stale.is_empty());

    h.directory.delete_user(&user_dn("bob")).await.unwrap();
    let report = h.reconciler.detect_user_drift().await.unwrap();
    assert_eq!(report.stale, vec![user_dn("bob")]);
    let bob = user(&h, "bob").await;
    assert_eq!(bob.sync_state, SyncState::Stale);

    let pushed = h.reconciler.push_users(&[bob.id]).await.unwrap();
    assert_eq!((pushed.pushed, pushed.created), (1, 1));
    assert_eq!(user(&h, "bob").await.sync_state, SyncState::Synced);
    assert!(h.directory.members_of(OPS_DN).await.contains(&bob.user_dn));
}

#[tokio::test]
async fn department_drift_and_push() {
    let h = Harness::new();
    let orphan = SourceDepartment {
        source: "manual".into(),
        source_dept_id: "manual_5".into(),
        source_dept_parent_id: "manual_1".into(),
        name: "Legal".into(),
        remark: String::new(),
    };
    let row = DepartmentStore::create(&*h.store, Department::from_source(&orphan, 0, BASE_DN))
        .await
        .unwrap();

    let report = h.reconciler.detect_department_drift().await.unwrap();
    assert_eq!(report.stale, vec!["cn=Legal,dc=example,dc=com".to_string()]);

    let pushed = h.reconciler.push_departments(&[row.id]).await.unwrap();
    assert_eq!(pushed.created, 1);
    assert!(h.directory.entry(&row.group_dn).await.is_some());
    assert_eq!(department(&h, &row.group_dn).await.sync_state, SyncState::Synced);
    assert!(h.reconciler.detect_department_drift().await.unwrap().stale.is_empty());
}

#[tokio::test]
async fn drift_ignores_admin_account() {
    let h = Harness::new();
    let admin = SourceUser {
        source: "manual".into(),
        username: "admin".into(),
        ..SourceUser::default()
    };
    let password = PasswordHash::new_bcrypt("secret", 4).unwrap();
    let admin = User::from_source(&admin, ADMIN_DN.to_string(), DepartmentAssignment::default(), Role::default(), password);
    UserStore::create(&*h.store, admin).await.unwrap();

    let report = h.reconciler.detect_user_drift().await.unwrap();
    assert_eq!(report.checked, 0);
    assert!(report.stale.is_empty());
}

#[tokio::test]
async fn unknown_or_disabled_source_is_rejected() {
    let mut config = source("wecom", SourceKind::WeCom);
    config.enabled = false;
    let h = Harness::new().with_source(config, Arc::new(ExportSource::in_memory(wecom_export(&["alice"]))));

    let err = h.reconciler.sync_departments("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h.reconciler.sync_users("wecom").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("disabled"));
    assert_eq!(h.directory.writes(), 0);
}

#[tokio::test]
async fn invalid_record_is_named_and_nothing_is_written() {
    let h = Harness::new().with_source(
        source("hr", SourceKind::DingTalk),
        Arc::new(ExportSource::in_memory(export(json!({
            "departments": [
                { "id": "1", "parent_id": "0", "name": "Root" },
                { "id": "2", "parent_id": "1" }
            ]
        })))),
    );

    let err = h.reconciler.sync_departments("hr").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("department #1"));
    assert!(DepartmentStore::list_all(&*h.store).await.unwrap().is_empty());
}

#[tokio::test]
async fn unreadable_source_is_a_remote_fetch_error() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new().with_source(
        source("hr", SourceKind::DingTalk),
        Arc::new(ExportSource::from_file(dir.path().join("missing.json"))),
    );

    let err = h.reconciler.sync_departments("hr").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RemoteFetch);
    assert_eq!(h.directory.writes(), 0);
}
