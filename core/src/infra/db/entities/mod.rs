//! Shop entities
//!
//! Business tables replicated between nodes, plus the sync state table.

pub mod car;
pub mod customer;
pub mod dent_price_rule;
pub mod device_registration;
pub mod order;
pub mod quotation;
pub mod quotation_item;
pub mod refresh_token;
pub mod store_sync_state;

pub use car::Entity as Car;
pub use customer::Entity as Customer;
pub use dent_price_rule::{DentSize, Entity as DentPriceRule};
pub use device_registration::Entity as DeviceRegistration;
pub use order::Entity as Order;
pub use quotation::Entity as Quotation;
pub use quotation_item::Entity as QuotationItem;
pub use refresh_token::Entity as RefreshToken;
pub use store_sync_state::{Entity as StoreSyncState, ServerRole};

use crate::infra::sync::EntityRegistry;

/// Registry of every table known to the sync engine
///
/// Sensitive tables are registered too so that capture can resolve them. They
/// are kept out of the ledger by the configured deny-list.
pub fn registry() -> EntityRegistry {
	let mut registry = EntityRegistry::new();
	registry
		.register::<Customer>()
		.register::<Car>()
		.register::<Quotation>()
		.register::<QuotationItem>()
		.register::<DentPriceRule>()
		.register::<Order>()
		.register::<RefreshToken>()
		.register::<DeviceRegistration>();
	registry
}
