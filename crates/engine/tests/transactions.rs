use chrono::Utc;
use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    ActorContext, Applied, Direction, Engine, EngineError, Mutation, MutationOutcome,
    PettyCashCmd, PettyCashKind, Product, ProductDraft, Role, StockAdjustment,
    TransactionChanges, TransactionCmd, TransactionKind, TransactionListFilter,
    TransactionStatus, ValidationError,
};
use migration::MigratorTrait;

struct Fixture {
    engine: Engine,
    admin: ActorContext,
    employee: ActorContext,
    _db: DatabaseConnection,
}

async fn engine_with_db(require_funds: bool) -> Fixture {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .require_funds(require_funds)
        .build()
        .await
        .unwrap();
    let admin = engine
        .upsert_actor(Uuid::new_v4(), "Alice", Role::Admin)
        .await
        .unwrap();
    let employee = engine
        .upsert_actor(Uuid::new_v4(), "Bob", Role::Employee)
        .await
        .unwrap();
    Fixture {
        admin: engine.resolve_actor(admin.id).await.unwrap(),
        employee: engine.resolve_actor(employee.id).await.unwrap(),
        engine,
        _db: db,
    }
}

async fn deposit_income(fx: &Fixture, amount_minor: i64) {
    fx.engine
        .create_transaction(
            &fx.admin,
            TransactionCmd::new(
                TransactionKind::Income,
                amount_minor,
                "Owner deposit",
                "Opening cash",
                Utc::now(),
            ),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn unknown_actor_is_unauthorized() {
    let fx = engine_with_db(false).await;
    let err = fx.engine.resolve_actor(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));
}

#[tokio::test]
async fn upsert_actor_updates_the_role() {
    let fx = engine_with_db(false).await;
    let id = fx.employee.actor_id();
    fx.engine
        .upsert_actor(id, "Bob", Role::Manager)
        .await
        .unwrap();
    assert_eq!(
        fx.engine.resolve_actor(id).await.unwrap().role(),
        Role::Manager
    );
    assert_eq!(fx.engine.list_actors().await.unwrap().len(), 2);
}

#[tokio::test]
async fn cash_balance_counts_only_paid_rows() {
    let fx = engine_with_db(false).await;
    deposit_income(&fx, 10_000).await;
    fx.engine
        .create_transaction(
            &fx.employee,
            TransactionCmd::new(
                TransactionKind::Expense,
                2_500,
                "Rent",
                "October rent",
                Utc::now(),
            ),
        )
        .await
        .unwrap();
    fx.engine
        .create_transaction(
            &fx.employee,
            TransactionCmd::new(
                TransactionKind::Income,
                9_999,
                "Invoice",
                "Unpaid invoice",
                Utc::now(),
            )
            .status(TransactionStatus::Pending)
            .client_name("Eve"),
        )
        .await
        .unwrap();

    assert_eq!(fx.engine.cash_balance().await.unwrap(), 7_500);
    let pending = fx
        .engine
        .list_transactions(TransactionListFilter {
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].client_name.as_deref(), Some("Eve"));
}

#[tokio::test]
async fn manual_transactions_are_validated() {
    let fx = engine_with_db(false).await;
    let err = fx
        .engine
        .create_transaction(
            &fx.admin,
            TransactionCmd::new(TransactionKind::Income, 0, "Sale", "Nothing", Utc::now()),
        )
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Validation(ValidationError::InvalidAmount(0)));

    let err = fx
        .engine
        .create_transaction(
            &fx.admin,
            TransactionCmd::new(TransactionKind::Income, 100, "Sale", "   ", Utc::now()),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::MissingField("description"))
    );
}

#[tokio::test]
async fn paid_transactions_are_immutable() {
    let fx = engine_with_db(false).await;
    let paid = fx
        .engine
        .create_transaction(
            &fx.admin,
            TransactionCmd::new(TransactionKind::Income, 500, "Sale", "Cash sale", Utc::now()),
        )
        .await
        .unwrap();

    let changes = TransactionChanges {
        amount_minor: Some(600),
        ..Default::default()
    };
    let err = fx
        .engine
        .update_transaction(&fx.admin, paid.id, changes)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    let err = fx
        .engine
        .delete_transaction(&fx.admin, paid.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn pending_transactions_can_be_edited_and_settled_by_admins() {
    let fx = engine_with_db(false).await;
    let pending = fx
        .engine
        .create_transaction(
            &fx.employee,
            TransactionCmd::new(TransactionKind::Income, 800, "Invoice", "Case order", Utc::now())
                .status(TransactionStatus::Pending),
        )
        .await
        .unwrap();

    let err = fx
        .engine
        .update_transaction(&fx.employee, pending.id, TransactionChanges::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    let settled = fx
        .engine
        .update_transaction(
            &fx.admin,
            pending.id,
            TransactionChanges {
                amount_minor: Some(900),
                status: Some(TransactionStatus::Paid),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(settled.amount_minor, 900);
    assert_eq!(
        fx.engine.transaction(pending.id).await.unwrap().status,
        TransactionStatus::Paid
    );
    assert_eq!(fx.engine.cash_balance().await.unwrap(), 900);
}

#[tokio::test]
async fn pending_transactions_can_be_deleted() {
    let fx = engine_with_db(false).await;
    let pending = fx
        .engine
        .create_transaction(
            &fx.admin,
            TransactionCmd::new(TransactionKind::Expense, 300, "Supplies", "Tape", Utc::now())
                .status(TransactionStatus::Overdue),
        )
        .await
        .unwrap();
    fx.engine
        .delete_transaction(&fx.admin, pending.id)
        .await
        .unwrap();
    let err = fx.engine.transaction(pending.id).await.unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn require_funds_blocks_overspending() {
    let fx = engine_with_db(true).await;
    deposit_income(&fx, 1_000).await;

    let err = fx
        .engine
        .create_transaction(
            &fx.admin,
            TransactionCmd::new(TransactionKind::Expense, 1_500, "Rent", "Too much", Utc::now()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    // A product whose investment exceeds the balance is refused whole.
    let draft = ProductDraft {
        name: "Tablet".to_string(),
        price_minor: Some(90_000),
        cost_price_minor: 60_000,
        stock: 1,
        ..Default::default()
    };
    let err = fx
        .engine
        .submit(&fx.admin, Mutation::CreateProduct(draft))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert!(fx.engine.list_products().await.unwrap().is_empty());
}

#[tokio::test]
async fn require_funds_blocks_restocking_beyond_the_balance() {
    let fx = engine_with_db(true).await;
    deposit_income(&fx, 1_000).await;
    let draft = ProductDraft {
        name: "Cable".to_string(),
        price_minor: Some(900),
        cost_price_minor: 400,
        stock: 0,
        ..Default::default()
    };
    let product: Product = match fx
        .engine
        .submit(&fx.admin, Mutation::CreateProduct(draft))
        .await
        .unwrap()
    {
        MutationOutcome::Applied(Applied::Product(product)) => product,
        other => panic!("expected an applied product, got {other:?}"),
    };

    let restock = StockAdjustment {
        product_id: product.id,
        direction: Direction::Entry,
        quantity: 3,
        reason: None,
        is_financial: true,
        unit_cost_minor: None,
        expected_version: None,
    };
    let err = fx
        .engine
        .adjust_stock(&fx.admin, restock.clone())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(fx.engine.product(product.id).await.unwrap().stock, 0);

    let affordable = StockAdjustment {
        quantity: 2,
        ..restock
    };
    fx.engine
        .adjust_stock(&fx.admin, affordable)
        .await
        .unwrap();
    assert_eq!(fx.engine.cash_balance().await.unwrap(), 200);
}

#[tokio::test]
async fn petty_cash_is_admin_only_and_never_overdrawn() {
    let fx = engine_with_db(false).await;

    let err = fx
        .engine
        .record_petty_cash(
            &fx.employee,
            PettyCashCmd::new(PettyCashKind::Deposit, 1_000, "Float", Utc::now()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Unauthorized(_)));

    fx.engine
        .record_petty_cash(
            &fx.admin,
            PettyCashCmd::new(PettyCashKind::Deposit, 1_000, "Float", Utc::now()),
        )
        .await
        .unwrap();
    let err = fx
        .engine
        .record_petty_cash(
            &fx.admin,
            PettyCashCmd::new(PettyCashKind::Withdrawal, 1_500, "Coffee", Utc::now()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    fx.engine
        .record_petty_cash(
            &fx.admin,
            PettyCashCmd::new(PettyCashKind::Withdrawal, 400, "Coffee", Utc::now()),
        )
        .await
        .unwrap();
    assert_eq!(fx.engine.petty_cash_balance().await.unwrap(), 600);
    assert_eq!(fx.engine.list_petty_cash().await.unwrap().len(), 2);

    // The cash box is kept apart from the main ledger.
    assert_eq!(fx.engine.cash_balance().await.unwrap(), 0);
}
