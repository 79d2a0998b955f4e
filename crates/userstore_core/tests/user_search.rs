use chrono::NaiveDate;
use rusqlite::Connection;
use std::cell::RefCell;
use userstore_core::db::migrations::apply_migrations;
use userstore_core::{
    open_db_in_memory, DateRange, DbConfig, PageRequest, RepoError, Repository, Session, User,
    UserFilter,
};

thread_local! {
    static EXECUTED: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

fn record_statement(sql: &str) {
    EXECUTED.with(|executed| executed.borrow_mut().push(sql.to_string()));
}

fn take_executed() -> Vec<String> {
    EXECUTED.with(|executed| executed.borrow_mut().drain(..).collect())
}

fn seeded() -> Connection {
    let mut conn = open_db_in_memory(&DbConfig::default()).unwrap();
    let repo = Repository::<User>::new().unwrap();
    {
        let session = Session::new(&conn);
        let rows = [
            ("u1", "alice", "alice@example.com", "555-0101", (1990, 4, 2)),
            ("u2", "alan", "alan@work.org", "020-555-77", (1985, 11, 30)),
            ("u3", "bob", "bob@example.com", "030-1234", (2001, 1, 15)),
            ("u4", "Albert", "albert@example.com", "999", (1970, 6, 1)),
            ("u5", "a_ron", "aron@example.com", "", (1995, 3, 3)),
        ];
        for (id, username, email, phone, (y, m, d)) in rows {
            let user = User {
                id: id.to_string(),
                username: username.to_string(),
                email: email.to_string(),
                phone: phone.to_string(),
                date_of_birth: NaiveDate::from_ymd_opt(y, m, d),
            };
            repo.create(&session, &user).unwrap();
        }
    }
    conn.trace(Some(record_statement));
    take_executed();
    conn
}

fn ids(users: &[User]) -> Vec<&str> {
    users.iter().map(|user| user.id.as_str()).collect()
}

#[test]
fn empty_filter_matches_everything() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let result = repo
        .search(&session, &UserFilter::default(), PageRequest::new(10, 0))
        .unwrap();
    assert_eq!(result.total, 5);
    assert_eq!(ids(&result.items), vec!["u1", "u2", "u3", "u4", "u5"]);
}

#[test]
fn username_prefix_is_case_sensitive() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let filter = UserFilter {
        username: Some("al".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &filter, PageRequest::new(10, 0)).unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(ids(&result.items), vec!["u1", "u2"]);

    let upper = UserFilter {
        username: Some("Al".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &upper, PageRequest::new(10, 0)).unwrap();
    assert_eq!(ids(&result.items), vec!["u4"]);
}

#[test]
fn wildcards_in_input_match_literally() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let filter = UserFilter {
        username: Some("a_".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &filter, PageRequest::new(10, 0)).unwrap();
    assert_eq!(ids(&result.items), vec!["u5"]);
}

#[test]
fn phone_contains_and_email_prefix_combine() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let by_phone = UserFilter {
        phone: Some("555".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &by_phone, PageRequest::new(10, 0)).unwrap();
    assert_eq!(ids(&result.items), vec!["u1", "u2"]);

    let combined = UserFilter {
        phone: Some("555".to_string()),
        email: Some("alan@".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &combined, PageRequest::new(10, 0)).unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(ids(&result.items), vec!["u2"]);
}

#[test]
fn date_of_birth_range_is_inclusive() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let filter = UserFilter {
        date_of_birth: Some(DateRange {
            min: NaiveDate::from_ymd_opt(1985, 11, 30),
            max: NaiveDate::from_ymd_opt(1995, 3, 3),
        }),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &filter, PageRequest::new(10, 0)).unwrap();
    assert_eq!(ids(&result.items), vec!["u1", "u2", "u5"]);

    let open_ended = UserFilter {
        date_of_birth: Some(DateRange {
            min: NaiveDate::from_ymd_opt(2000, 1, 1),
            max: None,
        }),
        ..UserFilter::default()
    };
    let result = repo
        .search(&session, &open_ended, PageRequest::new(10, 0))
        .unwrap();
    assert_eq!(ids(&result.items), vec!["u3"]);
}

#[test]
fn paging_keeps_total_independent_of_window() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let result = repo
        .search(&session, &UserFilter::default(), PageRequest::from_page(2, 2))
        .unwrap();
    assert_eq!(result.total, 5);
    assert_eq!(ids(&result.items), vec!["u3", "u4"]);

    let past_end = repo
        .search(&session, &UserFilter::default(), PageRequest::new(2, 10))
        .unwrap();
    assert_eq!(past_end.total, 5);
    assert!(past_end.items.is_empty());
}

#[test]
fn sort_spec_orders_results() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let filter = UserFilter {
        sort: Some("-dateOfBirth".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &filter, PageRequest::new(3, 0)).unwrap();
    assert_eq!(ids(&result.items), vec!["u3", "u5", "u1"]);

    let invalid = UserFilter {
        sort: Some("password".to_string()),
        ..UserFilter::default()
    };
    let err = repo
        .search(&session, &invalid, PageRequest::new(3, 0))
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidField(ref field) if field == "password"));
}

#[test]
fn non_positive_limit_never_touches_the_store() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    for limit in [0, -1] {
        let result = repo
            .search(&session, &UserFilter::default(), PageRequest::new(limit, 0))
            .unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 0);
    }
    assert!(take_executed().is_empty());
}

#[test]
fn zero_matches_skip_the_page_query() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let filter = UserFilter {
        id: Some("nobody".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &filter, PageRequest::new(10, 0)).unwrap();
    assert!(result.items.is_empty());
    assert_eq!(result.total, 0);

    let executed = take_executed();
    assert_eq!(executed.len(), 1);
    assert!(executed[0].starts_with("SELECT COUNT(*) FROM users WHERE id = "));
}

#[test]
fn matches_run_count_then_page() {
    let conn = seeded();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let filter = UserFilter {
        username: Some("b".to_string()),
        ..UserFilter::default()
    };
    repo.search(&session, &filter, PageRequest::new(10, 0)).unwrap();

    let executed = take_executed();
    assert_eq!(executed.len(), 2);
    assert!(executed[0].starts_with("SELECT COUNT(*)"));
    assert!(executed[1].ends_with("LIMIT 10 OFFSET 0"));
}

#[test]
fn prefix_is_case_sensitive_on_caller_opened_connection() {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();
    repo.create(&session, &User::with_id("u1", "alice")).unwrap();
    repo.create(&session, &User::with_id("u2", "Albert")).unwrap();

    let filter = UserFilter {
        username: Some("Al".to_string()),
        ..UserFilter::default()
    };
    let result = repo.search(&session, &filter, PageRequest::new(10, 0)).unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(ids(&result.items), vec!["u2"]);

    let glob_chars = UserFilter {
        username: Some("A*".to_string()),
        ..UserFilter::default()
    };
    let result = repo
        .search(&session, &glob_chars, PageRequest::new(10, 0))
        .unwrap();
    assert_eq!(result.total, 0);
}

#[test]
fn sort_ties_break_on_primary_key() {
    let conn = open_db_in_memory(&DbConfig::default()).unwrap();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();
    for (id, username) in [("u3", "carol"), ("u1", "alice"), ("u2", "bob")] {
        let mut user = User::with_id(id, username);
        user.date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 1);
        repo.create(&session, &user).unwrap();
    }

    let filter = UserFilter {
        sort: Some("-dateOfBirth".to_string()),
        ..UserFilter::default()
    };
    let first = repo.search(&session, &filter, PageRequest::new(2, 0)).unwrap();
    let second = repo.search(&session, &filter, PageRequest::new(2, 2)).unwrap();
    assert_eq!(ids(&first.items), vec!["u1", "u2"]);
    assert_eq!(ids(&second.items), vec!["u3"]);
}
