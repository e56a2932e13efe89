use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use ledger_core::{
    CreateAccountCmd, CreateTransactionCmd, Currency, Ledger, LedgerError, Money,
    TransactionListFilter, UpdateTransactionCmd,
};
use migration::MigratorTrait;

async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    for (username, is_admin) in [("alice", false), ("bob", false)] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO users (username, is_admin) VALUES (?, ?)",
            vec![username.into(), is_admin.into()],
        ))
        .await
        .unwrap();
    }
    let ledger = Ledger::builder().database(db.clone()).build().unwrap();
    (ledger, db)
}

async fn eur_account(ledger: &Ledger, opening_minor: i64) -> Uuid {
    ledger
        .create_account(
            CreateAccountCmd::new("Main", "alice", Currency::Eur)
                .opening_balance(Money::from_minor(opening_minor)),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn create_transaction_moves_the_balance() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 100_00).await;

    ledger
        .create_transaction(
            CreateTransactionCmd::new(
                account_id,
                "alice",
                Money::from_minor(-30_00),
                Currency::Eur,
                Utc::now(),
            )
            .description("groceries"),
        )
        .await
        .unwrap();

    let balance = ledger.current_balance(account_id, "alice").await.unwrap();
    assert_eq!(balance, Money::from_minor(70_00));
}

#[tokio::test]
async fn zero_amount_is_rejected() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;

    let err = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::ZERO,
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidAmount("amount must not be 0".to_string())
    );
}

#[tokio::test]
async fn currency_mismatch_is_rejected() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;

    let err = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(10_00),
            Currency::Usd,
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::CurrencyMismatch(_)));
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::ZERO
    );
}

#[tokio::test]
async fn update_amount_applies_the_difference() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 100_00).await;

    let tx_id = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(-30_00),
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap();

    ledger
        .update_transaction(
            UpdateTransactionCmd::new(account_id, tx_id, "alice")
                .amount(Money::from_minor(-50_00))
                .description("bigger lunch"),
        )
        .await
        .unwrap();

    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(50_00)
    );
    let tx = ledger
        .transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert_eq!(tx.amount, Money::from_minor(-50_00));
    assert_eq!(tx.description.as_deref(), Some("bigger lunch"));
}

#[tokio::test]
async fn currency_and_account_are_immutable() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;
    let other_account = ledger
        .create_account(CreateAccountCmd::new("Savings", "alice", Currency::Eur))
        .await
        .unwrap();

    let tx_id = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(-5_00),
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap();

    let mut cmd = UpdateTransactionCmd::new(account_id, tx_id, "alice");
    cmd.currency = Some(Currency::Usd);
    assert!(matches!(
        ledger.update_transaction(cmd).await.unwrap_err(),
        LedgerError::ImmutableField(_)
    ));

    let mut cmd = UpdateTransactionCmd::new(account_id, tx_id, "alice");
    cmd.move_to_account_id = Some(other_account);
    assert!(matches!(
        ledger.update_transaction(cmd).await.unwrap_err(),
        LedgerError::ImmutableField(_)
    ));
}

#[tokio::test]
async fn soft_delete_reverts_the_balance_and_hides_the_row() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 100_00).await;

    let tx_id = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(-30_00),
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap();

    ledger
        .soft_delete_transaction(account_id, tx_id, "alice")
        .await
        .unwrap();

    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(100_00)
    );

    let (visible, _) = ledger
        .list_transactions(
            account_id,
            &TransactionListFilter::default(),
            "alice",
            50,
            None,
        )
        .await
        .unwrap();
    assert!(visible.is_empty());

    let filter = TransactionListFilter {
        include_deleted: true,
        ..Default::default()
    };
    let (all, _) = ledger
        .list_transactions(account_id, &filter, "alice", 50, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].deleted_at.is_some());
    assert_eq!(all[0].deleted_by.as_deref(), Some("alice"));

    // A second delete behaves as if the row were gone.
    let err = ledger
        .soft_delete_transaction(account_id, tx_id, "alice")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::KeyNotFound("transaction not exists".to_string())
    );
}

#[tokio::test]
async fn inactive_account_rejects_writes() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;

    ledger
        .update_account(account_id, "alice", None, Some(false))
        .await
        .unwrap();

    let err = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(10_00),
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::AccountInactive(_)));

    // Reads still work on an inactive account.
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::ZERO
    );
}

#[tokio::test]
async fn list_paginates_newest_first() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;

    let base = Utc::now();
    for i in 0..3 {
        ledger
            .create_transaction(
                CreateTransactionCmd::new(
                    account_id,
                    "alice",
                    Money::from_minor(10_00 + i),
                    Currency::Eur,
                    base + Duration::minutes(i),
                )
                .description(format!("tx {i}")),
            )
            .await
            .unwrap();
    }

    let filter = TransactionListFilter::default();
    let (page1, cursor) = ledger
        .list_transactions(account_id, &filter, "alice", 2, None)
        .await
        .unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[0].description.as_deref(), Some("tx 2"));
    assert_eq!(page1[1].description.as_deref(), Some("tx 1"));
    let cursor = cursor.expect("expected a next page");

    let (page2, cursor2) = ledger
        .list_transactions(account_id, &filter, "alice", 2, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].description.as_deref(), Some("tx 0"));
    assert!(cursor2.is_none());

    assert!(matches!(
        ledger
            .list_transactions(account_id, &filter, "alice", 2, Some("garbage"))
            .await
            .unwrap_err(),
        LedgerError::InvalidCursor(_)
    ));
}

#[tokio::test]
async fn concurrent_creates_serialize_on_the_account() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 100_00).await;

    let ledger = Arc::new(ledger);
    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = Arc::clone(&ledger);
        handles.push(tokio::spawn(async move {
            ledger
                .create_transaction(CreateTransactionCmd::new(
                    account_id,
                    "alice",
                    Money::from_minor(-1_00),
                    Currency::Eur,
                    Utc::now(),
                ))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(90_00)
    );
}

#[tokio::test]
async fn balance_overflow_rolls_the_mutation_back() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, i64::MAX).await;

    let err = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(1),
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidAmount("balance overflow".to_string())
    );

    // The insert and the failed delta roll back together.
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(i64::MAX)
    );
    let filter = TransactionListFilter {
        include_deleted: true,
        ..Default::default()
    };
    let (rows, _) = ledger
        .list_transactions(account_id, &filter, "alice", 10, None)
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn duplicate_account_name_is_rejected_until_deleted() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;

    let err = ledger
        .create_account(CreateAccountCmd::new("Main", "alice", Currency::Eur))
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::ExistingKey("Main".to_string()));

    // Another user may reuse the name, and so may the owner after deletion.
    ledger
        .create_account(CreateAccountCmd::new("Main", "bob", Currency::Eur))
        .await
        .unwrap();
    ledger
        .soft_delete_account(account_id, "alice")
        .await
        .unwrap();
    ledger
        .create_account(CreateAccountCmd::new("Main", "alice", Currency::Eur))
        .await
        .unwrap();
}

#[tokio::test]
async fn value_date_defaults_to_occurrence_date() {
    let (ledger, _db) = ledger_with_db().await;
    let account_id = eur_account(&ledger, 0).await;

    let occurred_at = Utc::now();
    let tx_id = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(10_00),
            Currency::Eur,
            occurred_at,
        ))
        .await
        .unwrap();

    let tx = ledger
        .transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert_eq!(tx.value_date, occurred_at.date_naive());
}
