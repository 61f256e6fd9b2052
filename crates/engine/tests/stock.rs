use sea_orm::{Database, DatabaseConnection};
use tokio::sync::broadcast::error::TryRecvError;
use uuid::Uuid;

use engine::{
    ActorContext, Applied, ChangeAction, ChangeEvent, Direction, Engine, EngineError, EntityKind,
    MovementListFilter, Mutation, MutationOutcome, Product, ProductChanges, ProductDraft,
    ProductStatus, Role, StockAdjustment, TransactionKind, TransactionListFilter,
    ValidationError,
};
use migration::MigratorTrait;

struct Fixture {
    engine: Engine,
    admin: ActorContext,
    employee: ActorContext,
    _db: DatabaseConnection,
}

async fn engine_with_db() -> Fixture {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
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

fn applied_product(outcome: MutationOutcome) -> Product {
    match outcome {
        MutationOutcome::Applied(Applied::Product(product)) => product,
        other => panic!("expected an applied product, got {other:?}"),
    }
}

async fn seed_product(fx: &Fixture, name: &str, stock: i64, price: i64, cost: i64) -> Product {
    let draft = ProductDraft {
        name: name.to_string(),
        price_minor: Some(price),
        cost_price_minor: cost,
        stock,
        min_stock: Some(2),
        ..Default::default()
    };
    let outcome = fx
        .engine
        .submit(&fx.admin, Mutation::CreateProduct(draft))
        .await
        .unwrap();
    applied_product(outcome)
}

fn exit(product_id: Uuid, quantity: i64, is_financial: bool) -> StockAdjustment {
    StockAdjustment {
        product_id,
        direction: Direction::Exit,
        quantity,
        reason: None,
        is_financial,
        unit_cost_minor: None,
        expected_version: None,
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn create_product_writes_initial_movement_and_investment() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "USB-C cable", 10, 2500, 1000).await;

    assert_eq!(product.stock, 10);
    assert_eq!(product.version, 0);
    assert_eq!(product.status, ProductStatus::Active);

    let movements = fx
        .engine
        .list_stock_movements(MovementListFilter {
            product_id: Some(product.id),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].direction, Direction::Entry);
    assert_eq!(movements[0].quantity, 10);
    assert_eq!(movements[0].reason, "Initial stock");

    let transactions = fx
        .engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].kind, TransactionKind::Expense);
    assert_eq!(transactions[0].amount_minor, 10_000);
    assert_eq!(transactions[0].stock_movement_id, Some(movements[0].id));
}

#[tokio::test]
async fn create_product_without_cost_books_no_money() {
    let fx = engine_with_db().await;
    seed_product(&fx, "Sticker", 3, 100, 0).await;

    let transactions = fx
        .engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn financial_exit_writes_one_linked_income() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Screen protector", 5, 1500, 400).await;

    let updated = applied_product(
        fx.engine
            .adjust_stock(&fx.admin, exit(product.id, 3, true))
            .await
            .unwrap(),
    );
    assert_eq!(updated.stock, 2);
    assert_eq!(updated.version, product.version + 1);
    assert!(updated.is_low_stock());

    let movements = fx
        .engine
        .list_stock_movements(MovementListFilter {
            product_id: Some(product.id),
            limit: None,
        })
        .await
        .unwrap();
    let exits: Vec<_> = movements
        .iter()
        .filter(|movement| movement.direction == Direction::Exit)
        .collect();
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].quantity, 3);
    assert_eq!(exits[0].actor_id, fx.admin.actor_id());

    let incomes = fx
        .engine
        .list_transactions(TransactionListFilter {
            kind: Some(TransactionKind::Income),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(incomes.len(), 1);
    assert_eq!(incomes[0].amount_minor, 4500);
    assert_eq!(incomes[0].cost_amount_minor, 1200);
    assert_eq!(incomes[0].stock_movement_id, Some(exits[0].id));
}

#[tokio::test]
async fn financial_entry_writes_one_linked_expense() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Battery", 0, 8000, 3000).await;

    let adjustment = StockAdjustment {
        direction: Direction::Entry,
        unit_cost_minor: Some(2800),
        ..exit(product.id, 4, true)
    };
    let updated = applied_product(fx.engine.adjust_stock(&fx.admin, adjustment).await.unwrap());
    assert_eq!(updated.stock, 4);
    assert_eq!(updated.status, ProductStatus::Active);

    let expenses = fx
        .engine
        .list_transactions(TransactionListFilter {
            kind: Some(TransactionKind::Expense),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(expenses.len(), 1);
    assert_eq!(expenses[0].amount_minor, 11_200);
    assert!(expenses[0].stock_movement_id.is_some());
}

#[tokio::test]
async fn non_financial_adjustment_books_no_money() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Case", 4, 2000, 0).await;

    let updated = applied_product(
        fx.engine
            .adjust_stock(&fx.admin, exit(product.id, 4, false))
            .await
            .unwrap(),
    );
    assert_eq!(updated.stock, 0);
    assert_eq!(updated.status, ProductStatus::OutOfStock);

    let transactions = fx
        .engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn overdrawn_exit_is_rejected_before_any_write() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Charger", 5, 3000, 0).await;

    let err = fx
        .engine
        .adjust_stock(&fx.admin, exit(product.id, 6, true))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::InsufficientStock {
            product: "Charger".to_string(),
            available: 5,
            requested: 6,
        })
    );

    let after = fx.engine.product(product.id).await.unwrap();
    assert_eq!(after.stock, 5);
    assert_eq!(after.version, product.version);
    let movements = fx
        .engine
        .list_stock_movements(MovementListFilter {
            product_id: Some(product.id),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(movements.len(), 1, "only the initial entry");
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Cable", 5, 1000, 0).await;

    let err = fx
        .engine
        .adjust_stock(&fx.admin, exit(product.id, 0, false))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::Validation(ValidationError::InvalidQuantity(0)));
}

#[tokio::test]
async fn oversized_entry_is_rejected_before_any_write() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Adapter", 5, 1000, 0).await;

    let entry = StockAdjustment {
        direction: Direction::Entry,
        ..exit(product.id, i64::MAX, false)
    };
    let err = fx.engine.adjust_stock(&fx.admin, entry).await.unwrap_err();
    assert_eq!(err, EngineError::Validation(ValidationError::TooLarge("stock")));

    let after = fx.engine.product(product.id).await.unwrap();
    assert_eq!(after.stock, 5);
    assert_eq!(after.version, product.version);
}

#[tokio::test]
async fn sale_total_that_does_not_fit_is_rejected() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Tablet", 3, i64::MAX / 2, 0).await;

    let err = fx
        .engine
        .adjust_stock(&fx.admin, exit(product.id, 3, true))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::TooLarge("sale amount"))
    );
    let transactions = fx
        .engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap();
    assert!(transactions.is_empty());
}

#[tokio::test]
async fn concurrent_exits_never_drive_stock_negative() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Earbuds", 5, 9000, 0).await;

    let (first, second) = tokio::join!(
        fx.engine.adjust_stock(&fx.admin, exit(product.id, 3, true)),
        fx.engine.adjust_stock(&fx.admin, exit(product.id, 3, true)),
    );
    let results = [first, second];
    let succeeded = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(succeeded, 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(EngineError::Validation(ValidationError::InsufficientStock { .. }))
    )));

    let after = fx.engine.product(product.id).await.unwrap();
    assert_eq!(after.stock, 2);
    let incomes = fx
        .engine
        .list_transactions(TransactionListFilter {
            kind: Some(TransactionKind::Income),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(incomes.len(), 1);
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Adapter", 5, 1200, 0).await;
    fx.engine
        .adjust_stock(&fx.admin, exit(product.id, 1, false))
        .await
        .unwrap();

    let stale = StockAdjustment {
        expected_version: Some(product.version),
        ..exit(product.id, 1, false)
    };
    let err = fx.engine.adjust_stock(&fx.admin, stale).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
    assert_eq!(fx.engine.product(product.id).await.unwrap().stock, 4);
}

#[tokio::test]
async fn quick_sell_sells_one_unit() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Pop socket", 2, 700, 200).await;

    let updated = applied_product(
        fx.engine
            .quick_sell(&fx.admin, product.id, None)
            .await
            .unwrap(),
    );
    assert_eq!(updated.stock, 1);

    let movements = fx
        .engine
        .list_stock_movements(MovementListFilter {
            product_id: Some(product.id),
            limit: None,
        })
        .await
        .unwrap();
    assert!(movements
        .iter()
        .any(|movement| movement.reason == "Quick sale" && movement.quantity == 1));
}

#[tokio::test]
async fn update_product_writes_a_movement_for_stock_edits() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Holder", 5, 1000, 0).await;

    let changes = ProductChanges {
        name: Some("  Car holder ".to_string()),
        stock: Some(8),
        expected_version: Some(product.version),
        ..Default::default()
    };
    let updated = applied_product(
        fx.engine
            .submit(
                &fx.admin,
                Mutation::UpdateProduct {
                    product_id: product.id,
                    changes,
                },
            )
            .await
            .unwrap(),
    );
    assert_eq!(updated.name, "Car holder");
    assert_eq!(updated.stock, 8);

    let movements = fx
        .engine
        .list_stock_movements(MovementListFilter {
            product_id: Some(product.id),
            limit: None,
        })
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    assert!(movements
        .iter()
        .any(|movement| movement.reason == "Product edit" && movement.quantity == 3));
    assert!(fx
        .engine
        .list_transactions(TransactionListFilter::default())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deleted_products_disappear_from_reads() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Old stock", 1, 100, 0).await;

    let outcome = fx
        .engine
        .submit(
            &fx.admin,
            Mutation::DeleteProduct {
                product_id: product.id,
                expected_version: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MutationOutcome::Applied(Applied::ProductDeleted(product.id))
    );
    assert!(fx.engine.list_products().await.unwrap().is_empty());

    let err = fx
        .engine
        .adjust_stock(&fx.admin, exit(product.id, 1, false))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn employee_adjustment_is_proposed_not_applied() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Glass", 5, 1500, 0).await;

    let outcome = fx
        .engine
        .adjust_stock(&fx.employee, exit(product.id, 3, true))
        .await
        .unwrap();
    assert!(matches!(outcome, MutationOutcome::Proposed(_)));
    assert_eq!(fx.engine.product(product.id).await.unwrap().stock, 5);
}

#[tokio::test]
async fn events_are_published_after_commit() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Speaker", 3, 5000, 0).await;
    let mut rx = fx.engine.broadcaster().subscribe();

    fx.engine
        .adjust_stock(&fx.admin, exit(product.id, 1, true))
        .await
        .unwrap();
    let events = drain(&mut rx);
    assert_eq!(
        events,
        vec![
            ChangeEvent::new(EntityKind::Products, ChangeAction::Adjust),
            ChangeEvent::new(EntityKind::StockMovements, ChangeAction::Create),
            ChangeEvent::new(EntityKind::Transactions, ChangeAction::Create),
        ]
    );

    fx.engine
        .adjust_stock(&fx.admin, exit(product.id, 10, true))
        .await
        .unwrap_err();
    assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
}

#[tokio::test]
async fn refetch_after_commit_observes_the_write() {
    let fx = engine_with_db().await;
    let product = seed_product(&fx, "Tripod", 6, 4000, 0).await;

    fx.engine
        .adjust_stock(&fx.admin, exit(product.id, 2, false))
        .await
        .unwrap();
    let listed = fx.engine.list_products().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].stock, 4);
    assert_eq!(listed[0].version, product.version + 1);
}
