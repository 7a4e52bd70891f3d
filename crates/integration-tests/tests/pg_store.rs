//! `PgStore` against a throwaway PostgreSQL container.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use domains::models::{
    Address, AttendanceKey, AttendanceSheet, NewNotification, NewStudent, NewUser, Notification,
    NotificationQuery, PageRequest, Profile, Role, Student, StudentFilter, Term, User,
};
use domains::ports::{
    AttendanceRepository, IdSequence, NotificationRepository, StudentRepository, UserRepository,
};
use domains::AppError;
use storage_adapters::PgStore;
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use testcontainers_modules::testcontainers::ContainerAsync;
use uuid::Uuid;

async fn store() -> (ContainerAsync<Postgres>, Arc<PgStore>) {
    let node = Postgres::default().start().await.expect("postgres container");
    let host = node.get_host().await.expect("container host");
    let port = node.get_host_port_ipv4(5432).await.expect("mapped port");
    let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

    let store = PgStore::connect(&url, 4).await.expect("connect");
    store.migrate().await.expect("migrations");
    (node, Arc::new(store))
}

fn user(email: &str) -> User {
    User::new(
        NewUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password_hash: "hash".into(),
            phone: "+14155550123".into(),
            date_of_birth: NaiveDate::from_ymd_opt(2010, 12, 10).unwrap(),
            role: Role::Student,
            address: Address {
                street: "12 St James's Square".into(),
                city: "London".into(),
                state: "LDN".into(),
                zip_code: "SW1Y".into(),
            },
        },
        Utc::now(),
    )
}

fn student(user: &User, code: &str) -> Profile {
    Profile::Student(Student::new(
        NewStudent {
            user_id: user.id,
            student_code: code.into(),
            grade: "10".into(),
            class: Some("10A".into()),
            section: None,
            academic_year: "2026".into(),
        },
        Utc::now(),
    ))
}

#[tokio::test]
async fn duplicate_email_is_a_conflict_and_rolls_back_the_profile() {
    let (_node, store) = store().await;
    let first = user("ada@example.com");
    store
        .create_account(&first, &student(&first, "STU20260001"))
        .await
        .unwrap();

    let second = user("ada@example.com");
    let err = store
        .create_account(&second, &student(&second, "STU20260002"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(ref m) if m == "User with this email already exists"));
    assert!(store.find_by_code("STU20260002").await.unwrap().is_none());
    assert!(UserRepository::find_by_id(store.as_ref(), second.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn id_sequences_count_per_key() {
    let (_node, store) = store().await;
    assert_eq!(store.next("STU2026").await.unwrap(), 1);
    assert_eq!(store.next("STU2026").await.unwrap(), 2);
    assert_eq!(store.next("TCH2026").await.unwrap(), 1);
    assert_eq!(store.next("STU2026").await.unwrap(), 3);
}

#[tokio::test]
async fn listing_totals_do_not_depend_on_the_page() {
    let (_node, store) = store().await;
    for n in 1..=3 {
        let u = user(&format!("student{n}@example.com"));
        store
            .create_account(&u, &student(&u, &format!("STU2026000{n}")))
            .await
            .unwrap();
    }

    let second = StudentRepository::list(
        store.as_ref(),
        &StudentFilter::default(),
        PageRequest::new(Some(2), Some(2)),
    )
    .await
    .unwrap();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].student_code, "STU20260003");
    assert_eq!(second.total, 3);
    assert_eq!(second.total_pages, 2);

    let beyond = StudentRepository::list(
        store.as_ref(),
        &StudentFilter::default(),
        PageRequest::new(Some(5), Some(2)),
    )
    .await
    .unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 3);
    assert_eq!(beyond.total_pages, 2);
}

#[tokio::test]
async fn unread_count_follows_read_state() {
    let (_node, store) = store().await;
    let reader = Uuid::now_v7();
    let now = Utc::now();
    let note = |title: &str| {
        Notification::new(
            NewNotification {
                title: title.into(),
                message: "hello".into(),
                recipients: vec![reader],
                ..Default::default()
            },
            now,
        )
    };
    let mut first = note("first");
    NotificationRepository::insert(store.as_ref(), &first).await.unwrap();
    NotificationRepository::insert(store.as_ref(), &note("second")).await.unwrap();
    assert_eq!(store.count_unread(reader, now).await.unwrap(), 2);

    first.mark_read(reader, now);
    NotificationRepository::update(store.as_ref(), &first).await.unwrap();
    assert_eq!(store.count_unread(reader, now).await.unwrap(), 1);
    assert_eq!(store.count_unread(Uuid::now_v7(), now).await.unwrap(), 0);

    let unread = store
        .list_for_user(
            reader,
            NotificationQuery {
                unread_only: true,
                kind: None,
            },
            PageRequest::default(),
            now,
        )
        .await
        .unwrap();
    assert_eq!(unread.total, 1);
    assert_eq!(unread.items[0].title, "second");
}

#[tokio::test]
async fn one_attendance_sheet_per_date_subject_and_class() {
    let (_node, store) = store().await;
    let key = AttendanceKey {
        date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        subject_id: Uuid::now_v7(),
        class: "10A".into(),
    };
    let now = Utc::now();
    let sheet = AttendanceSheet::new(key.clone(), "2026".into(), Term::First, now);
    store.save(&sheet).await.unwrap();
    store.save(&sheet).await.unwrap();

    let rival = AttendanceSheet::new(key.clone(), "2026".into(), Term::First, now + Duration::seconds(1));
    let err = store.save(&rival).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let found = store.find_by_key(&key).await.unwrap().expect("sheet");
    assert_eq!(found.id, sheet.id);
}
