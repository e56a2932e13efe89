use chrono::Utc;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};
use uuid::Uuid;

use ledger_core::{
    CreateAccountCmd, CreateTransactionCmd, Currency, Ledger, LedgerError, Money, SplitPart,
    SplitTransactionCmd, TransactionListFilter, UpdateTransactionCmd,
};
use migration::MigratorTrait;

async fn ledger_with_db() -> (Ledger, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO users (username, is_admin) VALUES (?, ?)",
        vec!["alice".into(), false.into()],
    ))
    .await
    .unwrap();
    let ledger = Ledger::builder().database(db.clone()).build().unwrap();
    (ledger, db)
}

async fn account_with_expense(ledger: &Ledger, opening_minor: i64, amount_minor: i64) -> (Uuid, Uuid) {
    let account_id = ledger
        .create_account(
            CreateAccountCmd::new("Main", "alice", Currency::Eur)
                .opening_balance(Money::from_minor(opening_minor)),
        )
        .await
        .unwrap();
    let tx_id = ledger
        .create_transaction(CreateTransactionCmd::new(
            account_id,
            "alice",
            Money::from_minor(amount_minor),
            Currency::Eur,
            Utc::now(),
        ))
        .await
        .unwrap();
    (account_id, tx_id)
}

#[tokio::test]
async fn split_preserves_the_balance_and_flags_the_parent() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 100_00, -30_00).await;

    let child_ids = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-10_00)).category("food"),
                SplitPart::new(Money::from_minor(-20_00)).category("household"),
            ],
        ))
        .await
        .unwrap();
    assert_eq!(child_ids.len(), 2);

    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(70_00)
    );

    let parent = ledger
        .transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert!(parent.is_split_parent);
    assert_eq!(parent.amount, Money::from_minor(-30_00));

    // Default listing shows the children, not the parent.
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
    assert_eq!(visible.len(), 2);
    assert!(visible.iter().all(|tx| tx.parent_transaction_id == Some(tx_id)));

    let children = ledger
        .split_children(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(
        children.iter().map(|c| c.amount).sum::<Money>(),
        Money::from_minor(-30_00)
    );
}

#[tokio::test]
async fn split_sum_mismatch_leaves_everything_untouched() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 100_00, -30_00).await;

    let err = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-10_00)),
                SplitPart::new(Money::from_minor(-15_00)),
            ],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::SplitSumMismatch(_)));

    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(70_00)
    );
    let parent = ledger
        .transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert!(!parent.is_split_parent);
}

#[tokio::test]
async fn split_requires_at_least_two_nonzero_parts() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 0, -30_00).await;

    let err = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![SplitPart::new(Money::from_minor(-30_00))],
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));

    let err = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-30_00)),
                SplitPart::new(Money::ZERO),
            ],
        ))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LedgerError::InvalidAmount("amount must not be 0".to_string())
    );
}

#[tokio::test]
async fn neither_parent_nor_child_can_be_split_again() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 0, -30_00).await;

    let child_ids = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-10_00)),
                SplitPart::new(Money::from_minor(-20_00)),
            ],
        ))
        .await
        .unwrap();

    let again = SplitTransactionCmd::new(
        account_id,
        tx_id,
        "alice",
        vec![
            SplitPart::new(Money::from_minor(-15_00)),
            SplitPart::new(Money::from_minor(-15_00)),
        ],
    );
    assert!(matches!(
        ledger.split_transaction(again).await.unwrap_err(),
        LedgerError::AlreadySplit(_)
    ));

    let on_child = SplitTransactionCmd::new(
        account_id,
        child_ids[1],
        "alice",
        vec![
            SplitPart::new(Money::from_minor(-10_00)),
            SplitPart::new(Money::from_minor(-10_00)),
        ],
    );
    assert!(matches!(
        ledger.split_transaction(on_child).await.unwrap_err(),
        LedgerError::AlreadySplit(_)
    ));
}

#[tokio::test]
async fn split_amounts_are_frozen() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 0, -30_00).await;

    let child_ids = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-10_00)),
                SplitPart::new(Money::from_minor(-20_00)),
            ],
        ))
        .await
        .unwrap();

    let patch_parent =
        UpdateTransactionCmd::new(account_id, tx_id, "alice").amount(Money::from_minor(-40_00));
    assert!(matches!(
        ledger.update_transaction(patch_parent).await.unwrap_err(),
        LedgerError::ImmutableField(_)
    ));

    let patch_child = UpdateTransactionCmd::new(account_id, child_ids[0], "alice")
        .amount(Money::from_minor(-15_00));
    assert!(matches!(
        ledger.update_transaction(patch_child).await.unwrap_err(),
        LedgerError::ImmutableField(_)
    ));

    // Descriptive fields on a child stay editable.
    ledger
        .update_transaction(
            UpdateTransactionCmd::new(account_id, child_ids[0], "alice").description("wine"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn join_then_delete_restores_the_opening_balance() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 100_00, -30_00).await;

    ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-10_00)),
                SplitPart::new(Money::from_minor(-20_00)),
            ],
        ))
        .await
        .unwrap();

    // A split parent cannot be deleted while its children are live.
    assert!(matches!(
        ledger
            .soft_delete_transaction(account_id, tx_id, "alice")
            .await
            .unwrap_err(),
        LedgerError::SplitParentNotDeletable(_)
    ));

    ledger
        .join_transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(70_00)
    );

    let parent = ledger
        .transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert!(!parent.is_split_parent);

    ledger
        .soft_delete_transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(100_00)
    );
}

#[tokio::test]
async fn join_accounts_for_individually_deleted_children() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 100_00, -30_00).await;

    let child_ids = ledger
        .split_transaction(SplitTransactionCmd::new(
            account_id,
            tx_id,
            "alice",
            vec![
                SplitPart::new(Money::from_minor(-10_00)),
                SplitPart::new(Money::from_minor(-20_00)),
            ],
        ))
        .await
        .unwrap();

    ledger
        .soft_delete_transaction(account_id, child_ids[0], "alice")
        .await
        .unwrap();
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(80_00)
    );

    ledger
        .join_transaction(account_id, tx_id, "alice")
        .await
        .unwrap();
    assert_eq!(
        ledger.current_balance(account_id, "alice").await.unwrap(),
        Money::from_minor(70_00)
    );
}

#[tokio::test]
async fn join_rejects_ordinary_transactions() {
    let (ledger, _db) = ledger_with_db().await;
    let (account_id, tx_id) = account_with_expense(&ledger, 0, -30_00).await;

    assert!(matches!(
        ledger
            .join_transaction(account_id, tx_id, "alice")
            .await
            .unwrap_err(),
        LedgerError::NotASplitParent(_)
    ));
}
