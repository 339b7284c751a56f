//! End-to-end tests for the order pipeline.
//!
//! Drives submission, cancellation and queries through the HTTP router and
//! execution through a running worker pool.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tower::ServiceExt;

use order_service::application::dto::SubmitOrderDto;
use order_service::application::ports::{
    BrokerMessage, ExecutionFailure, ExecutionReport, OrderBroker, OrderExecutor,
};
use order_service::application::services::WorkerPool;
use order_service::application::use_cases::{
    CancelOrderUseCase, ProcessOrderUseCase, ProcessOutcome, ProcessingSettings, SubmissionSettings,
    SubmitOrderUseCase,
};
use order_service::config::load_config_from_string;
use order_service::domain::order_lifecycle::{
    CancelReason, CreateOrderCommand, Order, OrderRepository, OrderSide, OrderStateMachine, OrderStatus,
    OrderType,
};
use order_service::domain::shared::{OrderId, Price, Quantity, Symbol, UserId};
use order_service::error::ErrorCode;
use order_service::infrastructure::broker::InMemoryOrderBroker;
use order_service::infrastructure::broker::sqlite::{SqliteBrokerSettings, SqliteOrderBroker};
use order_service::infrastructure::config::{Container, OrderBrokerBackend};
use order_service::infrastructure::execution::SimulatedExecutor;
use order_service::infrastructure::idempotency::InMemoryIdempotencyStore;
use order_service::infrastructure::marketdata::StaticMarketData;
use order_service::infrastructure::persistence::{InMemoryOrderRepository, SqliteOrderRepository};

// =============================================================================
// Helpers
// =============================================================================

const BASE_CONFIG: &str = r"
worker:
  concurrency: 2
market_data:
  backend: static
  prices:
    AAPL: 150.00
auth:
  tokens:
    token-u1: u1
    token-u2: u2
";

async fn container(extra: &str) -> Container {
    let config = load_config_from_string(&format!("{BASE_CONFIG}{extra}")).unwrap();
    Container::from_config(config).await.unwrap()
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response: Response<Body> = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn limit_buy(price: &str) -> Value {
    json!({
        "symbol": "aapl",
        "side": "BUY",
        "type": "LIMIT",
        "quantity": "10",
        "price": price,
    })
}

async fn history_total(app: &Router, token: &str) -> u64 {
    let (status, body) = send(app, request("GET", "/orders/history", token, None)).await;
    assert_eq!(status, StatusCode::OK);
    body["total"].as_u64().unwrap()
}

/// Poll the status endpoint until the order reaches `expected`.
async fn wait_for_status(app: &Router, order_id: &str, expected: &str) -> Value {
    let uri = format!("/orders/{order_id}");
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (status, body) = send(app, request("GET", &uri, "token-u1", None)).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == expected {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap()
}

fn published(broker: &OrderBrokerBackend) -> u64 {
    match broker {
        OrderBrokerBackend::Memory(broker) => broker.published_count(),
        OrderBrokerBackend::Sqlite(_) => panic!("expected the in-memory broker"),
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn accepted_limit_order_is_executed_by_workers() {
    let container = container("").await;
    let app = container.router();
    let workers = container.start_workers();

    let (status, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "PENDING");
    let order_id = body["order_id"].as_str().unwrap().to_string();

    let details = wait_for_status(&app, &order_id, "EXECUTED").await;
    assert_eq!(details["symbol"], "AAPL");
    assert_eq!(details["execution_price"], "150.50");
    assert_eq!(details["can_cancel"], false);

    workers.shutdown().await;
}

#[tokio::test]
async fn identical_submission_replays_original_order() {
    let container = container("").await;
    let app = container.router();

    let (first_status, first) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    let (second_status, second) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;

    assert_eq!(first_status, StatusCode::ACCEPTED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["order_id"], second["order_id"]);
    assert_eq!(published(&container.broker()), 1);
    assert_eq!(history_total(&app, "token-u1").await, 1);
}

#[tokio::test]
async fn same_order_from_another_user_is_not_a_replay() {
    let container = container("").await;
    let app = container.router();

    let (_, first) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    let (status, second) = send(&app, request("POST", "/orders", "token-u2", Some(limit_buy("150.50")))).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_ne!(first["order_id"], second["order_id"]);
    assert_eq!(published(&container.broker()), 2);
}

#[tokio::test]
async fn closed_market_rejects_and_records_failure() {
    let container = container("").await;
    let app = container.router();
    if let order_service::infrastructure::config::MarketDataProvider::Static(md) =
        &*container.market_data()
    {
        md.set_market_open(false);
    }

    let (status, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MARKET_CLOSED");
    assert_eq!(history_total(&app, "token-u1").await, 0);
    assert_eq!(published(&container.broker()), 0);

    // The failed record answers the retry until it expires.
    let (status, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "PRIOR_FAILURE");
    assert_eq!(body["error"]["details"]["prior_code"], "MARKET_CLOSED");
}

#[tokio::test]
async fn cancel_before_processing_wins() {
    let container = container("").await;
    let app = container.router();

    let (_, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    let order_id = body["order_id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(
        &app,
        request(
            "PUT",
            &format!("/orders/{order_id}/cancel"),
            "token-u1",
            Some(json!({ "reason": "USER_REQUESTED" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let process = container.process_order_use_case();
    let delivery = container.broker().receive().await.unwrap().unwrap();
    let outcome = process.handle(&delivery).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Skipped(OrderStatus::Cancelled));

    let details = wait_for_status(&app, &order_id, "CANCELLED").await;
    assert!(details["executed_at"].is_null());

    // A second cancel is refused.
    let (status, body) = send(
        &app,
        request("PUT", &format!("/orders/{order_id}/cancel"), "token-u1", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "CANNOT_CANCEL");
}

#[tokio::test]
async fn foreign_orders_are_invisible() {
    let container = container("").await;
    let app = container.router();

    let (_, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
    let order_id = body["order_id"].as_str().unwrap().to_string();

    for uri in [format!("/orders/{order_id}"), format!("/orders/{order_id}/status")] {
        let (status, body) = send(&app, request("GET", &uri, "token-u2", None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }
    let (status, _) = send(
        &app,
        request("PUT", &format!("/orders/{order_id}/cancel"), "token-u2", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn limit_price_outside_band_is_rejected() {
    let container = container("").await;
    let app = container.router();

    let (status, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("200.00")))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "PRICE_OUT_OF_RANGE");
    assert_eq!(history_total(&app, "token-u1").await, 0);
}

// =============================================================================
// Retry and dead-letter
// =============================================================================

/// Executor that times out on every call.
#[derive(Default)]
struct AlwaysTimingOut {
    calls: AtomicU32,
}

#[async_trait]
impl OrderExecutor for AlwaysTimingOut {
    async fn execute(&self, _order: &Order) -> Result<ExecutionReport, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ExecutionFailure::MarketDataTimeout(
            "price service did not answer".to_string(),
        ))
    }
}

#[tokio::test]
async fn retryable_failures_end_in_dead_letter_queue() {
    let orders = Arc::new(InMemoryOrderRepository::new());
    let broker = Arc::new(InMemoryOrderBroker::new());
    let executor = Arc::new(AlwaysTimingOut::default());

    let submit = SubmitOrderUseCase::new(
        Arc::clone(&orders),
        Arc::new(InMemoryIdempotencyStore::new()),
        Arc::new(StaticMarketData::new().with_price("AAPL", dec!(150.00))),
        Arc::clone(&broker),
        SubmissionSettings::default(),
    );
    let accepted = submit
        .execute(SubmitOrderDto {
            user_id: UserId::new("u1"),
            symbol: "AAPL".to_string(),
            side: "BUY".to_string(),
            order_type: "LIMIT".to_string(),
            quantity: dec!(10),
            price: Some(dec!(150.50)),
        })
        .await
        .unwrap();

    let process = Arc::new(ProcessOrderUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&broker),
        Arc::clone(&executor),
        ProcessingSettings {
            max_redeliveries: 5,
            processing_timeout: Duration::from_secs(1),
        },
    ));
    let workers = WorkerPool::start(process, 1);

    tokio::time::timeout(Duration::from_secs(5), async {
        while broker.dead_letters().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    workers.shutdown().await;

    assert_eq!(executor.calls.load(Ordering::SeqCst), 6);

    let dead = broker.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].message.order_id, accepted.order_id);
    assert_eq!(dead[0].redelivery_count, 5);
    assert!(dead[0].reason.starts_with("MARKET_DATA_TIMEOUT"));

    let order = orders.find_by_id(&accepted.order_id).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Failed);
    assert!(order.failure_reason().unwrap().contains("MARKET_DATA_TIMEOUT"));
    assert_eq!(broker.ready_len(), 0);
    assert_eq!(broker.in_flight_len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancels_race_workers_to_one_terminal_outcome() {
    const ORDERS: i64 = 60;

    let orders = Arc::new(InMemoryOrderRepository::new());
    let broker = Arc::new(InMemoryOrderBroker::new());
    let submit = SubmitOrderUseCase::new(
        Arc::clone(&orders),
        Arc::new(InMemoryIdempotencyStore::new()),
        Arc::new(StaticMarketData::new().with_price("AAPL", dec!(150.00))),
        Arc::clone(&broker),
        SubmissionSettings::default(),
    );
    let process = Arc::new(ProcessOrderUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&broker),
        Arc::new(SimulatedExecutor::with_latency(Duration::from_millis(2))),
        ProcessingSettings::default(),
    ));
    let cancel = Arc::new(CancelOrderUseCase::new(Arc::clone(&orders)));
    let user_id = UserId::new("u1");
    let workers = WorkerPool::start(process, 4);

    let mut ids = Vec::new();
    for n in 1..=ORDERS {
        // Distinct quantities keep every fingerprint unique.
        let accepted = submit
            .execute(SubmitOrderDto {
                user_id: user_id.clone(),
                symbol: "AAPL".to_string(),
                side: "BUY".to_string(),
                order_type: "LIMIT".to_string(),
                quantity: rust_decimal::Decimal::from(n),
                price: Some(dec!(150.50)),
            })
            .await
            .unwrap();
        ids.push(accepted.order_id);
    }

    let cancels: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let cancel = Arc::clone(&cancel);
            let id = id.clone();
            let user_id = user_id.clone();
            let delay = Duration::from_millis(u64::try_from(i % 7).unwrap());
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                cancel
                    .execute(&id, &user_id, CancelReason::UserRequested)
                    .await
                    .map(|_| ())
                    .map_err(|e| e.code())
            })
        })
        .collect();
    let mut cancel_results = Vec::new();
    for handle in cancels {
        cancel_results.push(handle.await.unwrap());
    }

    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let mut settled = broker.ready_len() == 0 && broker.in_flight_len() == 0;
            for id in &ids {
                let order = orders.find_by_id(id).await.unwrap().unwrap();
                settled &= order.status().is_terminal();
            }
            if settled {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    workers.shutdown().await;

    for (id, cancelled) in ids.iter().zip(&cancel_results) {
        let order = orders.find_by_id(id).await.unwrap().unwrap();
        match order.status() {
            OrderStatus::Executed => {
                assert_eq!(*cancelled, Err(ErrorCode::CannotCancel), "{id}");
                assert!(order.execution_price().is_some(), "{id}");
                assert!(order.executed_at().is_some(), "{id}");
                assert!(order.cancel_reason().is_none(), "{id}");
            }
            OrderStatus::Cancelled => {
                assert_eq!(*cancelled, Ok(()), "{id}");
                assert_eq!(order.cancel_reason(), Some(&CancelReason::UserRequested), "{id}");
                assert!(order.execution_price().is_none(), "{id}");
                assert!(order.executed_at().is_none(), "{id}");
            }
            other => panic!("order {id} ended {other:?}"),
        }
    }
    assert!(broker.dead_letters().is_empty());
}

// =============================================================================
// Durability
// =============================================================================

#[tokio::test]
async fn sqlite_backends_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("orders.db").display());
    let durable = format!(
        "persistence:\n  backend: sqlite\n  database_url: \"{url}\"\nbroker:\n  backend: sqlite\n  database_url: \"{url}\"\n  poll_interval_ms: 10\n"
    );

    let order_id = {
        let container = container(&durable).await;
        let app = container.router();
        let (status, body) = send(&app, request("POST", "/orders", "token-u1", Some(limit_buy("150.50")))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        container.broker().close();
        body["order_id"].as_str().unwrap().to_string()
    };

    let container = container(&durable).await;
    let app = container.router();
    let stored = container
        .orders()
        .find_by_id(&OrderId::new(order_id.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status(), OrderStatus::Pending);

    let workers = container.start_workers();
    let details = wait_for_status(&app, &order_id, "EXECUTED").await;
    assert_eq!(details["execution_price"], "150.50");
    workers.shutdown().await;
}

fn broker_settings(url: &str) -> SqliteBrokerSettings {
    SqliteBrokerSettings {
        database_url: url.to_string(),
        main_queue: "orders.process".to_string(),
        dead_letter_queue: "orders.process.dead".to_string(),
        poll_interval: Duration::from_millis(10),
        max_connections: 1,
    }
}

#[tokio::test]
async fn order_claimed_before_crash_is_executed_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("orders.db").display());
    let orders = Arc::new(SqliteOrderRepository::connect(&url, 1).await.unwrap());

    let order = Order::new(CreateOrderCommand {
        user_id: UserId::new("u1"),
        symbol: Symbol::new("AAPL"),
        side: OrderSide::Buy,
        order_type: OrderType::Limit,
        quantity: Quantity::from_i64(10),
        price: Some(Price::new(dec!(150.50))),
    })
    .unwrap();
    let order_id = order.order_id().clone();
    orders.save(&order).await.unwrap();

    {
        // Lease the message and claim the order, then die without settling.
        let broker = SqliteOrderBroker::connect(broker_settings(&url)).await.unwrap();
        broker
            .publish(&BrokerMessage::for_order(order_id.clone()))
            .await
            .unwrap();
        let _leased = broker.receive().await.unwrap().unwrap();
        let claim =
            OrderStateMachine::transition(OrderStatus::Pending, OrderStatus::Processing).unwrap();
        assert!(orders.update_status(&order_id, &claim).await.unwrap().is_applied());
    }

    let broker = Arc::new(SqliteOrderBroker::connect(broker_settings(&url)).await.unwrap());
    let process = ProcessOrderUseCase::new(
        Arc::clone(&orders),
        Arc::clone(&broker),
        Arc::new(SimulatedExecutor::new()),
        ProcessingSettings::default(),
    );

    let redelivered = broker.receive().await.unwrap().unwrap();
    assert_eq!(redelivered.redelivery_count, 1);
    let outcome = process.handle(&redelivered).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Requeued(ErrorCode::ProcessingTimeout));
    assert_eq!(
        orders.find_by_id(&order_id).await.unwrap().unwrap().status(),
        OrderStatus::Pending
    );

    let retry = broker.receive().await.unwrap().unwrap();
    assert_eq!(process.handle(&retry).await.unwrap(), ProcessOutcome::Executed);

    let executed = orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(executed.status(), OrderStatus::Executed);
    assert_eq!(executed.execution_price(), Some(Price::new(dec!(150.50))));
    assert_eq!(broker.ready_len().await.unwrap(), 0);
    assert!(broker.dead_letters().await.unwrap().is_empty());
}
