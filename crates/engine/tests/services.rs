use sea_orm::{Database, DatabaseConnection};
use uuid::Uuid;

use engine::{
    ActorContext, Applied, CATEGORY_REPAIR_SERVICE, Engine, EngineError, Mutation,
    MutationOutcome, PartRequest, Product, ProductDraft, Role, ServiceChanges, ServiceDraft,
    ServiceOrder, ServiceStatus, TransactionKind, TransactionListFilter, TransactionStatus,
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

async fn seed_part(fx: &Fixture, name: &str, stock: i64) -> Product {
    let draft = ProductDraft {
        name: name.to_string(),
        price_minor: Some(5000),
        cost_price_minor: 0,
        stock,
        ..Default::default()
    };
    match fx
        .engine
        .submit(&fx.admin, Mutation::CreateProduct(draft))
        .await
        .unwrap()
    {
        MutationOutcome::Applied(Applied::Product(product)) => product,
        other => panic!("expected an applied product, got {other:?}"),
    }
}

fn applied_service(outcome: MutationOutcome) -> ServiceOrder {
    match outcome {
        MutationOutcome::Applied(Applied::Service(service)) => service,
        other => panic!("expected an applied service, got {other:?}"),
    }
}

fn screen_repair(parts: Vec<PartRequest>) -> ServiceDraft {
    ServiceDraft {
        client_name: "Dana".to_string(),
        client_phone: Some("555-0101".to_string()),
        device_model: "Phone X".to_string(),
        description: Some("Cracked screen".to_string()),
        price_minor: 20_000,
        status: None,
        parts,
    }
}

async fn service_incomes(fx: &Fixture) -> Vec<engine::Transaction> {
    fx.engine
        .list_transactions(TransactionListFilter {
            kind: Some(TransactionKind::Income),
            ..Default::default()
        })
        .await
        .unwrap()
        .into_iter()
        .filter(|transaction| transaction.category == CATEGORY_REPAIR_SERVICE)
        .collect()
}

#[tokio::test]
async fn create_service_consumes_parts_and_books_pending_income() {
    let fx = engine_with_db().await;
    let screen = seed_part(&fx, "Screen", 3).await;

    let service = applied_service(
        fx.engine
            .submit(
                &fx.admin,
                Mutation::CreateService(screen_repair(vec![
                    PartRequest {
                        product_id: screen.id,
                        quantity: 1,
                    },
                    PartRequest {
                        product_id: screen.id,
                        quantity: 1,
                    },
                ])),
            )
            .await
            .unwrap(),
    );
    assert_eq!(service.status, ServiceStatus::Pending);
    assert_eq!(service.parts.len(), 1);
    assert_eq!(service.parts[0].quantity, 2);
    assert_eq!(fx.engine.product(screen.id).await.unwrap().stock, 1);

    let incomes = service_incomes(&fx).await;
    assert_eq!(incomes.len(), 1);
    assert_eq!(incomes[0].status, TransactionStatus::Pending);
    assert_eq!(incomes[0].amount_minor, 20_000);
    assert_eq!(incomes[0].service_order_id, Some(service.id));
    assert_eq!(incomes[0].client_name.as_deref(), Some("Dana"));

    let listed = fx.engine.list_services().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].parts.len(), 1);
}

#[tokio::test]
async fn service_parts_beyond_stock_are_rejected() {
    let fx = engine_with_db().await;
    let screen = seed_part(&fx, "Screen", 1).await;

    let err = fx
        .engine
        .submit(
            &fx.admin,
            Mutation::CreateService(screen_repair(vec![PartRequest {
                product_id: screen.id,
                quantity: 2,
            }])),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Validation(ValidationError::InsufficientStock { .. })
    ));
    assert_eq!(fx.engine.product(screen.id).await.unwrap().stock, 1);
    assert!(fx.engine.list_services().await.unwrap().is_empty());
}

#[tokio::test]
async fn delivery_settles_the_linked_income() {
    let fx = engine_with_db().await;
    let service = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(screen_repair(Vec::new())))
            .await
            .unwrap(),
    );
    assert_eq!(fx.engine.cash_balance().await.unwrap(), 0);

    let delivered = applied_service(
        fx.engine
            .submit(
                &fx.admin,
                Mutation::UpdateServiceStatus {
                    service_id: service.id,
                    status: ServiceStatus::Delivered,
                },
            )
            .await
            .unwrap(),
    );
    assert_eq!(delivered.status, ServiceStatus::Delivered);
    assert!(delivered.delivered_at.is_some());

    let incomes = service_incomes(&fx).await;
    assert_eq!(incomes[0].status, TransactionStatus::Paid);
    assert_eq!(fx.engine.cash_balance().await.unwrap(), 20_000);

    let err = fx
        .engine
        .submit(
            &fx.admin,
            Mutation::UpdateServiceStatus {
                service_id: service.id,
                status: ServiceStatus::InProgress,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Validation(ValidationError::InvalidTransition {
            from: ServiceStatus::Delivered,
            to: ServiceStatus::InProgress,
        })
    );
}

#[tokio::test]
async fn created_as_delivered_is_paid_at_once() {
    let fx = engine_with_db().await;
    let draft = ServiceDraft {
        status: Some(ServiceStatus::Delivered),
        ..screen_repair(Vec::new())
    };
    let service = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(draft))
            .await
            .unwrap(),
    );
    assert!(service.delivered_at.is_some());
    assert_eq!(service_incomes(&fx).await[0].status, TransactionStatus::Paid);
}

#[tokio::test]
async fn update_service_keeps_pending_income_in_step() {
    let fx = engine_with_db().await;
    let service = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(screen_repair(Vec::new())))
            .await
            .unwrap(),
    );

    let changes = ServiceChanges {
        client_name: Some("Dana Silva".to_string()),
        price_minor: Some(25_000),
        ..Default::default()
    };
    fx.engine
        .submit(
            &fx.admin,
            Mutation::UpdateService {
                service_id: service.id,
                changes,
            },
        )
        .await
        .unwrap();

    let incomes = service_incomes(&fx).await;
    assert_eq!(incomes.len(), 1);
    assert_eq!(incomes[0].amount_minor, 25_000);
    assert_eq!(incomes[0].client_name.as_deref(), Some("Dana Silva"));
}

#[tokio::test]
async fn free_service_gets_income_once_priced() {
    let fx = engine_with_db().await;
    let draft = ServiceDraft {
        price_minor: 0,
        ..screen_repair(Vec::new())
    };
    let service = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(draft))
            .await
            .unwrap(),
    );
    assert!(service_incomes(&fx).await.is_empty());

    fx.engine
        .submit(
            &fx.admin,
            Mutation::UpdateService {
                service_id: service.id,
                changes: ServiceChanges {
                    price_minor: Some(4_000),
                    ..Default::default()
                },
            },
        )
        .await
        .unwrap();
    let incomes = service_incomes(&fx).await;
    assert_eq!(incomes.len(), 1);
    assert_eq!(incomes[0].amount_minor, 4_000);
}

#[tokio::test]
async fn repricing_to_free_drops_the_pending_income() {
    let fx = engine_with_db().await;
    let service = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(screen_repair(Vec::new())))
            .await
            .unwrap(),
    );
    assert_eq!(service_incomes(&fx).await.len(), 1);

    let free = |price_minor| Mutation::UpdateService {
        service_id: service.id,
        changes: ServiceChanges {
            price_minor: Some(price_minor),
            ..Default::default()
        },
    };
    let updated = applied_service(fx.engine.submit(&fx.admin, free(0)).await.unwrap());
    assert_eq!(updated.price_minor, 0);
    assert!(service_incomes(&fx).await.is_empty());

    // Priced again later, it bills once more.
    fx.engine.submit(&fx.admin, free(1_500)).await.unwrap();
    let incomes = service_incomes(&fx).await;
    assert_eq!(incomes.len(), 1);
    assert_eq!(incomes[0].amount_minor, 1_500);
    assert_eq!(incomes[0].status, TransactionStatus::Pending);
}

#[tokio::test]
async fn deleting_a_service_drops_only_unpaid_income() {
    let fx = engine_with_db().await;
    let open = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(screen_repair(Vec::new())))
            .await
            .unwrap(),
    );
    let draft = ServiceDraft {
        status: Some(ServiceStatus::Delivered),
        ..screen_repair(Vec::new())
    };
    let done = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(draft))
            .await
            .unwrap(),
    );

    for service_id in [open.id, done.id] {
        let outcome = fx
            .engine
            .submit(&fx.admin, Mutation::DeleteService { service_id })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            MutationOutcome::Applied(Applied::ServiceDeleted(service_id))
        );
    }

    assert!(fx.engine.list_services().await.unwrap().is_empty());
    let incomes = service_incomes(&fx).await;
    assert_eq!(incomes.len(), 1);
    assert_eq!(incomes[0].status, TransactionStatus::Paid);
    assert_eq!(incomes[0].service_order_id, None);
}

#[tokio::test]
async fn employee_service_changes_go_through_approval() {
    let fx = engine_with_db().await;
    let service = applied_service(
        fx.engine
            .submit(&fx.admin, Mutation::CreateService(screen_repair(Vec::new())))
            .await
            .unwrap(),
    );

    let outcome = fx
        .engine
        .submit(
            &fx.employee,
            Mutation::UpdateServiceStatus {
                service_id: service.id,
                status: ServiceStatus::Completed,
            },
        )
        .await
        .unwrap();
    let MutationOutcome::Proposed(request) = outcome else {
        panic!("expected a proposal");
    };
    assert_eq!(request.target_id, Some(service.id));
    assert_eq!(
        fx.engine.service(service.id).await.unwrap().status,
        ServiceStatus::Pending
    );
}
