use rusqlite::Connection;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use userstore_core::{
    open_db_in_memory, run_in_transaction, CancelToken, DbConfig, PartialUpdate, RepoError,
    RepoResult, Repository, Session, Statement, User,
};

fn open() -> Connection {
    open_db_in_memory(&DbConfig::default()).unwrap()
}

#[test]
fn failed_operation_rolls_back_earlier_writes() {
    let conn = open();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let result: RepoResult<()> = run_in_transaction(&session, |tx| {
        repo.create(tx, &User::with_id("u1", "alice"))?;
        repo.create(tx, &User::with_id("u1", "duplicate"))?;
        Ok(())
    });

    let err = result.unwrap_err();
    assert!(err.is_constraint_violation());
    assert!(repo.load(&session, "u1").unwrap().is_none());
    assert!(conn.is_autocommit());
}

#[test]
fn panic_inside_operation_rolls_back() {
    let conn = open();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| {
        run_in_transaction(&session, |tx| -> RepoResult<()> {
            repo.create(tx, &User::with_id("u1", "alice"))?;
            panic!("operation failed mid-write");
        })
    }));

    assert!(outcome.is_err());
    assert!(conn.is_autocommit());
    assert!(repo.load(&session, "u1").unwrap().is_none());
}

#[test]
fn nested_writes_join_the_outer_transaction() {
    let conn = open();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let result: RepoResult<()> = run_in_transaction(&session, |tx| {
        assert!(tx.in_transaction());
        assert_eq!(repo.create(tx, &User::with_id("u1", "alice"))?, 1);

        let partial = PartialUpdate::new()
            .with("id", "u1".to_string())
            .with("email", "x@y.com".to_string());
        assert_eq!(repo.patch(tx, &partial)?, 1);

        // Still inside the outer transaction: the nested writes did not commit.
        assert!(!tx.conn().is_autocommit());
        assert_eq!(repo.load(tx, "u1")?.unwrap().email, "x@y.com");

        Err(RepoError::InvalidData("abort outer workflow".to_string()))
    });

    assert!(matches!(result, Err(RepoError::InvalidData(_))));
    assert!(repo.load(&session, "u1").unwrap().is_none());
}

#[test]
fn nested_success_commits_once_at_the_outer_boundary() {
    let conn = open();
    let session = Session::new(&conn);
    let repo = Repository::<User>::new().unwrap();

    let created: usize = run_in_transaction(&session, |tx| {
        let first = repo.create(tx, &User::with_id("u1", "alice"))?;
        let second = repo.create(tx, &User::with_id("u2", "bob"))?;
        Ok(first + second)
    })
    .unwrap();

    assert_eq!(created, 2);
    assert_eq!(repo.all(&session).unwrap().len(), 2);
}

#[test]
fn caller_opened_transaction_is_joined_not_committed() {
    let conn = open();
    let repo = Repository::<User>::new().unwrap();

    let tx = conn.unchecked_transaction().unwrap();
    {
        let session = Session::new(&tx);
        assert!(session.in_transaction());
        assert_eq!(repo.create(&session, &User::with_id("u1", "alice")).unwrap(), 1);
    }
    tx.rollback().unwrap();

    let session = Session::new(&conn);
    assert!(repo.load(&session, "u1").unwrap().is_none());
}

#[test]
fn cancelled_session_runs_nothing() {
    let conn = open();
    let token = CancelToken::new();
    token.cancel();
    let session = Session::with_cancel(&conn, token);
    let repo = Repository::<User>::new().unwrap();

    let err = repo
        .create(&session, &User::with_id("u1", "alice"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Cancelled));

    let fresh = Session::new(&conn);
    assert!(repo.load(&fresh, "u1").unwrap().is_none());
}

#[test]
fn cancellation_during_transaction_rolls_back() {
    let conn = open();
    let token = CancelToken::new();
    let session = Session::with_cancel(&conn, token.clone());
    let repo = Repository::<User>::new().unwrap();

    let result: RepoResult<()> = run_in_transaction(&session, |tx| {
        repo.create(tx, &User::with_id("u1", "alice"))?;
        token.cancel();
        Ok(())
    });

    assert!(matches!(result, Err(RepoError::Cancelled)));
    assert!(conn.is_autocommit());
    let fresh = Session::new(&conn);
    assert!(repo.load(&fresh, "u1").unwrap().is_none());
}

#[test]
fn deadline_interrupts_running_statement() {
    let conn = open();
    let session = Session::with_cancel(&conn, CancelToken::with_timeout(Duration::from_millis(50)));

    let endless = Statement::new(
        "WITH RECURSIVE counter(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM counter)
         SELECT COUNT(*) FROM (SELECT n FROM counter LIMIT 1000000000000)",
        Vec::new(),
    );
    let err = session.query_count(&endless).unwrap_err();
    assert!(matches!(err, RepoError::Cancelled));

    // The interrupt handler is removed once the statement ends.
    let repo = Repository::<User>::new().unwrap();
    let fresh = Session::new(&conn);
    assert_eq!(repo.create(&fresh, &User::with_id("u1", "alice")).unwrap(), 1);
}
