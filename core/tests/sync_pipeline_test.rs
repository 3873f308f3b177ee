//! Upload ingestion and download distribution against real SQLite databases
//!
//! Covers local change capture, per-record isolation of uploads, the order
//! merge and at-most-once delivery per store type.

mod helpers;

use chrono::{Duration, Utc};
use ds_core::infra::{
	db::entities::{self, refresh_token},
	sync::{state, CommitMode, FieldMap, NodeIdentity, SyncAction, SyncError, UnitOfWork},
};
use helpers::{change, customer_change, new_customer, store, TestNode, STORE_TYPE};
use pretty_assertions::assert_eq;
use sea_orm::EntityTrait;
use serde_json::json;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[tokio::test]
async fn test_local_writes_append_one_entry_per_mutation() {
	let central = TestNode::new("central").await.unwrap();
	let original = new_customer("Ada Brandt");
	let renamed = entities::customer::Model {
		full_name: "Ada Brandt-Kruse".into(),
		..original.clone()
	};

	let mut unit = UnitOfWork::new();
	unit.insert(&original).unwrap();
	central.tm.commit(unit, CommitMode::capture()).await.unwrap();

	let mut unit = UnitOfWork::new();
	unit.update(&original, &renamed).unwrap();
	central.tm.commit(unit, CommitMode::capture()).await.unwrap();

	let mut unit = UnitOfWork::new();
	unit.delete(&renamed).unwrap();
	let report = central.tm.commit(unit, CommitMode::capture()).await.unwrap();
	assert_eq!(report.logged, 1);

	let ledger = central.ledger().await.unwrap();
	let actions: Vec<SyncAction> = ledger.iter().map(|e| e.action).collect();
	assert_eq!(
		actions,
		vec![SyncAction::Insert, SyncAction::Update, SyncAction::Delete]
	);

	for entry in &ledger {
		assert_eq!(entry.table_name, "customers");
		assert_eq!(entry.record_id, original.id.to_string());
		assert_eq!(entry.source_server, "central");
		assert_eq!(entry.store_type, None);
		assert!(!entry.synced);
	}

	let updated = ledger[1].snapshot().unwrap().unwrap();
	assert_eq!(
		updated.get("fullName").and_then(|v| v.as_str()),
		Some("Ada Brandt-Kruse")
	);
	assert_eq!(ledger[2].payload, None);
	assert_eq!(central.customer(original.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_unchanged_update_is_not_logged() {
	let central = TestNode::new("central").await.unwrap();
	let customer = new_customer("Jonas Wirth");

	let mut unit = UnitOfWork::new();
	unit.insert(&customer).unwrap();
	central.tm.commit(unit, CommitMode::capture()).await.unwrap();

	let mut unit = UnitOfWork::new();
	unit.update(&customer, &customer).unwrap();
	let report = central.tm.commit(unit, CommitMode::capture()).await.unwrap();

	assert!(report.applied.is_empty());
	assert_eq!(report.logged, 0);
	assert_eq!(central.ledger().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_excluded_tables_are_written_but_not_logged() {
	let central = TestNode::new("central").await.unwrap();
	let token = refresh_token::Model {
		token_id: "rt-1".into(),
		user_id: "u-1".into(),
		token_hash: "c2VjcmV0".into(),
		expires_at: Utc::now() + Duration::days(30),
		revoked: false,
	};

	let mut unit = UnitOfWork::new();
	unit.insert(&token).unwrap();
	let report = central.tm.commit(unit, CommitMode::capture()).await.unwrap();

	assert_eq!(report.applied.len(), 1);
	assert_eq!(report.logged, 0);
	assert!(central.ledger().await.unwrap().is_empty());
	assert!(entities::RefreshToken::find_by_id("rt-1".to_string())
		.one(central.db.conn())
		.await
		.unwrap()
		.is_some());
}

#[tokio::test]
async fn test_replay_mode_does_not_log() {
	let central = TestNode::new("central").await.unwrap();
	let customer = new_customer("Mira Hahn");

	let mut unit = UnitOfWork::new();
	unit.insert(&customer).unwrap();
	let report = central.tm.commit(unit, CommitMode::replay()).await.unwrap();

	assert_eq!(report.applied.len(), 1);
	assert!(central.ledger().await.unwrap().is_empty());
	assert!(central.customer(customer.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_upload_is_delivered_once_per_store_type() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let customer = new_customer("Lena Vogt");

	let response = central
		.sync
		.process_upload(
			&store("S1"),
			vec![customer_change(SyncAction::Insert, &customer)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(response.processed_count, 1);
	assert_eq!(response.ignored_count, 0);
	let stored = central.customer(customer.id).await.unwrap().unwrap();
	assert_eq!(stored.full_name, customer.full_name);
	assert_eq!(stored.phone, customer.phone);

	let ledger = central.ledger().await.unwrap();
	assert_eq!(ledger.len(), 1);
	assert_eq!(ledger[0].source_server, "S1");
	assert_eq!(ledger[0].store_type, None);
	assert_eq!(ledger[0].action, SyncAction::Insert);

	// the uploader never gets its own change back
	let echo = central.sync.get_updates(&store("S1"), None, &token).await.unwrap();
	assert!(echo.changes.is_empty());

	let first = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
	assert_eq!(first.store_id, "S2");
	assert_eq!(first.changes.len(), 1);
	let delivered = &first.changes[0];
	assert_eq!(delivered.table_name.as_deref(), Some("customers"));
	assert_eq!(delivered.action.as_deref(), Some("INSERT"));
	assert_eq!(delivered.record_id, Some(customer.id.to_string()));
	let payload = delivered.snapshot().unwrap().unwrap();
	assert_eq!(
		payload.get("fullName").and_then(|v| v.as_str()),
		Some("Lena Vogt")
	);

	let state_after_first = state::get_state(central.db.conn(), "S2", STORE_TYPE)
		.await
		.unwrap()
		.unwrap();

	let second = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
	assert!(second.changes.is_empty());
	assert!(second.orders.is_empty());

	let state_after_second = state::get_state(central.db.conn(), "S2", STORE_TYPE)
		.await
		.unwrap()
		.unwrap();
	assert!(state_after_second.last_download_time >= state_after_first.last_download_time);
	assert_eq!(state_after_second.last_cursor, state_after_first.last_cursor);
	assert!(central.ledger().await.unwrap().iter().all(|e| e.synced));

	let uploader = state::get_state(central.db.conn(), "S1", STORE_TYPE)
		.await
		.unwrap()
		.unwrap();
	assert!(uploader.last_upload_time.is_some());
}

#[tokio::test]
async fn test_download_pages_are_ordered() {
	let central = TestNode::with_page_size("central", 2).await.unwrap();
	let token = CancellationToken::new();

	let customers: Vec<_> = (0..5)
		.map(|i| new_customer(&format!("Customer {i}")))
		.collect();
	let changes = customers
		.iter()
		.map(|c| customer_change(SyncAction::Insert, c))
		.collect();
	central
		.sync
		.process_upload(&store("S1"), changes, &token)
		.await
		.unwrap();

	let mut delivered = Vec::new();
	let mut page_sizes = Vec::new();
	loop {
		let page = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
		page_sizes.push(page.changes.len());
		if page.changes.is_empty() {
			break;
		}
		delivered.extend(page.changes);
	}

	assert_eq!(page_sizes, vec![2, 2, 1, 0]);
	assert!(delivered
		.windows(2)
		.all(|pair| pair[0].updated_at <= pair[1].updated_at));

	let ids: HashSet<_> = delivered.iter().filter_map(|c| c.record_id.clone()).collect();
	let expected: HashSet<_> = customers.iter().map(|c| c.id.to_string()).collect();
	assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_insert_then_delete_leaves_no_record() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let customer = new_customer("Theo Krug");

	let response = central
		.sync
		.process_upload(
			&store("S1"),
			vec![
				customer_change(SyncAction::Insert, &customer),
				customer_change(SyncAction::Delete, &customer),
			],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(response.processed_count, 2);
	assert_eq!(central.customer(customer.id).await.unwrap(), None);

	let download = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
	let actions: Vec<_> = download
		.changes
		.iter()
		.filter_map(|c| c.action.clone())
		.collect();
	assert_eq!(actions, vec!["INSERT", "DELETE"]);
	assert_eq!(download.changes[1].payload, None);
}

#[tokio::test]
async fn test_bad_records_are_ignored_individually() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let first = new_customer("Valid One");
	let second = new_customer("Valid Two");

	let mut missing_id = change("customers", "INSERT", "x", Some(json!({ "fullName": "n/a" })));
	missing_id.record_id = None;

	let changes = vec![
		customer_change(SyncAction::Insert, &first),
		change("widgets", "INSERT", "1", Some(json!({ "id": 1 }))),
		change("customers", "MERGE", &Uuid::new_v4().to_string(), None),
		missing_id,
		change(
			"refresh_tokens",
			"INSERT",
			"rt-9",
			Some(json!({ "tokenId": "rt-9" })),
		),
		change("customers", "INSERT", &Uuid::new_v4().to_string(), None),
		change("customers", "DELETE", "not-a-guid", None),
		// partial payload for a record that does not exist yet
		change(
			"customers",
			"UPDATE",
			&Uuid::new_v4().to_string(),
			Some(json!({ "fullName": "Nobody" })),
		),
		customer_change(SyncAction::Insert, &second),
	];

	let response = central
		.sync
		.process_upload(&store("S1"), changes, &token)
		.await
		.unwrap();

	assert_eq!(response.processed_count, 2);
	assert_eq!(response.ignored_count, 7);
	assert!(central.customer(first.id).await.unwrap().is_some());
	assert!(central.customer(second.id).await.unwrap().is_some());
	assert!(entities::RefreshToken::find_by_id("rt-9".to_string())
		.one(central.db.conn())
		.await
		.unwrap()
		.is_none());

	let ledger = central.ledger().await.unwrap();
	assert_eq!(ledger.len(), 2);
	assert!(ledger.iter().all(|e| e.table_name == "customers"));
}

#[tokio::test]
async fn test_partial_update_keeps_unsent_fields() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let customer = new_customer("Karl Stein");

	central
		.sync
		.process_upload(
			&store("S1"),
			vec![customer_change(SyncAction::Insert, &customer)],
			&token,
		)
		.await
		.unwrap();

	let response = central
		.sync
		.process_upload(
			&store("S1"),
			vec![change(
				"Customers",
				"update",
				&customer.id.to_string(),
				Some(json!({ "fullName": "Karl Steiner" }).to_string().into()),
			)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(response.processed_count, 1);

	let stored = central.customer(customer.id).await.unwrap().unwrap();
	assert_eq!(stored.full_name, "Karl Steiner");
	assert_eq!(stored.phone, customer.phone);

	let ledger = central.ledger().await.unwrap();
	assert_eq!(ledger.last().map(|e| e.action), Some(SyncAction::Update));
	assert_eq!(ledger.last().map(|e| e.table_name.as_str()), Some("customers"));
}

#[tokio::test]
async fn test_composite_key_upsert_fills_key_fields() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();

	let response = central
		.sync
		.process_upload(
			&store("S1"),
			vec![change(
				"dent_price_rules",
				"UPSERT",
				"large|hood",
				Some(json!({
					"priceCents": 9000,
					"active": true,
					"updatedAt": "2025-03-01T10:00:00Z"
				})),
			)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(response.processed_count, 1);

	let rules = entities::DentPriceRule::find()
		.all(central.db.conn())
		.await
		.unwrap();
	assert_eq!(rules.len(), 1);
	assert_eq!(rules[0].dent_size, entities::DentSize::Large);
	assert_eq!(rules[0].panel, "hood");
	assert_eq!(rules[0].price_cents, 9000);

	let ledger = central.ledger().await.unwrap();
	assert_eq!(ledger[0].record_id, "LARGE|hood");
	assert_eq!(ledger[0].action, SyncAction::Update);
}

#[tokio::test]
async fn test_order_upload_merges_and_reaches_other_stores() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();

	let opened = central
		.sync
		.process_upload(
			&store("S1"),
			vec![change(
				"orders",
				"INSERT",
				"O-1",
				Some(json!({ "orderUid": "O-1", "status": "210", "technician": null })),
			)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(opened.processed_count, 1);

	let assigned = central
		.sync
		.process_upload(
			&store("S1"),
			vec![change(
				"orders",
				"UPDATE",
				"O-1",
				Some(json!({ "technician": "Kai", "status": null })),
			)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(assigned.processed_count, 1);

	let order = entities::Order::find_by_id("O-1".to_string())
		.one(central.db.conn())
		.await
		.unwrap()
		.unwrap();
	assert_eq!(order.status.as_deref(), Some("210"));
	assert_eq!(order.technician.as_deref(), Some("Kai"));
	assert_eq!(order.store_id.as_deref(), Some("S1"));

	let download = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
	assert_eq!(download.changes.len(), 2);
	assert!(download
		.changes
		.iter()
		.all(|c| c.table_name.as_deref() == Some("orders") && c.record_id.as_deref() == Some("O-1")));

	assert_eq!(download.orders.len(), 2);
	let latest = &download.orders[1];
	assert_eq!(latest.order_uid, "O-1");
	assert_eq!(latest.status.as_deref(), Some("210"));
	assert_eq!(latest.technician.as_deref(), Some("Kai"));
	assert_eq!(latest.action, "UPDATE");

	let echo = central.sync.get_updates(&store("S1"), None, &token).await.unwrap();
	assert!(echo.changes.is_empty());
}

#[tokio::test]
async fn test_future_last_sync_time_returns_nothing() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let customer = new_customer("Future Check");

	central
		.sync
		.process_upload(
			&store("S1"),
			vec![customer_change(SyncAction::Insert, &customer)],
			&token,
		)
		.await
		.unwrap();

	let future = Utc::now() + Duration::hours(1);
	let download = central
		.sync
		.get_updates(&store("S2"), Some(future), &token)
		.await
		.unwrap();
	assert!(download.changes.is_empty());

	// nothing was marked delivered
	let download = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
	assert_eq!(download.changes.len(), 1);
}

#[tokio::test]
async fn test_missing_identity_is_rejected() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();

	let upload = central
		.sync
		.process_upload(&store(""), vec![], &token)
		.await;
	assert!(matches!(upload, Err(SyncError::Validation(_))));

	let anonymous = NodeIdentity::new("S1", "");
	let download = central.sync.get_updates(&anonymous, None, &token).await;
	assert!(matches!(download, Err(SyncError::Validation(_))));

	assert!(state::list_states(central.db.conn()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_upload_rolls_back() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	token.cancel();
	let customer = new_customer("Never Stored");

	let result = central
		.sync
		.process_upload(
			&store("S1"),
			vec![customer_change(SyncAction::Insert, &customer)],
			&token,
		)
		.await;

	assert!(matches!(result, Err(SyncError::Cancelled)));
	assert_eq!(central.customer(customer.id).await.unwrap(), None);
	assert!(central.ledger().await.unwrap().is_empty());
	assert_eq!(
		state::get_state(central.db.conn(), "S1", STORE_TYPE)
			.await
			.unwrap(),
		None
	);
}

#[tokio::test]
async fn test_live_record_is_sent_when_payload_missing() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let customer = new_customer("Re Read");

	let mut unit = UnitOfWork::new();
	unit.insert(&customer).unwrap();
	central.tm.commit(unit, CommitMode::capture()).await.unwrap();

	// simulate an entry written without a payload
	use sea_orm::{sea_query::Expr, ColumnTrait, QueryFilter};
	use ds_core::infra::sync::sync_log_entity;
	sync_log_entity::Entity::update_many()
		.col_expr(sync_log_entity::Column::Payload, Expr::value(Option::<String>::None))
		.filter(sync_log_entity::Column::RecordId.eq(customer.id.to_string()))
		.exec(central.db.conn())
		.await
		.unwrap();

	let download = central.sync.get_updates(&store("S2"), None, &token).await.unwrap();
	let payload: FieldMap = download.changes[0].snapshot().unwrap().unwrap();
	assert_eq!(payload.get("fullName").and_then(|v| v.as_str()), Some("Re Read"));
}

#[tokio::test]
async fn test_changes_to_absent_records_are_not_logged() {
	let central = TestNode::new("central").await.unwrap();
	let ghost = new_customer("Never Stored");

	let mut unit = UnitOfWork::new();
	unit.delete(&ghost).unwrap();
	let report = central.tm.commit(unit, CommitMode::capture()).await.unwrap();
	assert!(report.applied.is_empty());
	assert_eq!(report.logged, 0);

	let renamed = entities::customer::Model {
		full_name: "Still Not Stored".into(),
		..ghost.clone()
	};
	let mut unit = UnitOfWork::new();
	unit.update(&ghost, &renamed).unwrap();
	let result = central.tm.commit(unit, CommitMode::capture()).await;
	assert!(matches!(result, Err(SyncError::RecordNotFound { .. })));

	assert!(central.ledger().await.unwrap().is_empty());
	assert_eq!(central.customer(ghost.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_uploaded_order_reaches_other_store_types() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let uploader = NodeIdentity::new("S1", "store").with_role(Some(entities::ServerRole::Store));

	let response = central
		.sync
		.process_upload(
			&uploader,
			vec![change(
				"orders",
				"INSERT",
				"O-1",
				Some(json!({ "orderUid": "O-1", "status": "210" })),
			)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(response.processed_count, 1);
	assert_eq!(response.ignored_count, 0);

	let office = NodeIdentity::new("HQ", "headquarters");
	let download = central.sync.get_updates(&office, None, &token).await.unwrap();
	assert_eq!(download.server_id.as_deref(), Some("central"));
	assert_eq!(download.changes.len(), 1);
	assert_eq!(download.orders.len(), 1);
	assert_eq!(download.orders[0].order_uid, "O-1");
	assert_eq!(download.orders[0].status.as_deref(), Some("210"));

	let echo = central.sync.get_updates(&uploader, None, &token).await.unwrap();
	assert!(echo.changes.is_empty());
}

#[tokio::test]
async fn test_delete_of_absent_record_is_processed() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();
	let record_id = Uuid::new_v4().to_string();

	let response = central
		.sync
		.process_upload(
			&store("S1"),
			vec![change("customers", "DELETE", &record_id, None)],
			&token,
		)
		.await
		.unwrap();
	assert_eq!(response.processed_count, 1);
	assert_eq!(response.ignored_count, 0);

	let ledger = central.ledger().await.unwrap();
	assert_eq!(ledger.len(), 1);
	assert_eq!(ledger[0].action, SyncAction::Delete);
	assert_eq!(ledger[0].record_id, record_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_downloads_all_succeed() {
	let central = TestNode::new("central").await.unwrap();
	let token = CancellationToken::new();

	let customers: Vec<_> = (0..50)
		.map(|i| new_customer(&format!("Concurrent {i}")))
		.collect();
	let changes = customers
		.iter()
		.map(|c| customer_change(SyncAction::Insert, c))
		.collect();
	central
		.sync
		.process_upload(&store("S1"), changes, &token)
		.await
		.unwrap();

	let handles: Vec<_> = (2..6)
		.map(|i| {
			let sync = central.sync.clone();
			let token = token.clone();
			tokio::spawn(async move { sync.get_updates(&store(&format!("S{i}")), None, &token).await })
		})
		.collect();

	let mut delivered = Vec::new();
	for handle in handles {
		let download = handle.await.unwrap().unwrap();
		delivered.extend(download.changes.into_iter().filter_map(|c| c.record_id));
	}

	assert_eq!(delivered.len(), 50);
	let unique: HashSet<_> = delivered.iter().cloned().collect();
	assert_eq!(unique.len(), 50);
	assert_eq!(state::list_states(central.db.conn()).await.unwrap().len(), 5);
}
