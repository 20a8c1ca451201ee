//! Number lifecycle orchestration.
//!
//! [`NumberHandler`] composes billing, the carrier adapters, storage and
//! event publishing. It holds no mutable state of its own; every
//! operation runs to completion against the shared collaborators.

mod events;
mod renew;

pub use events::{Customer, Flow};

use crate::billing::BalanceChecker;
use crate::error::{NumberError, NumberResult};
use crate::notify::{EventType, NumberEvent, Notifier};
use crate::providers::{AvailableNumber, ProviderRegistry};
use crate::virtual_number::{is_virtual_number, validate_virtual_number, VirtualNumberAllocator};
use billing_client::ReferenceType;
use chrono::Utc;
use number_store::{
    format_time, Number, NumberDb, NumberFilter, NumberPatch, NumberStatus, NumberType,
    ProviderName,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Tunables for the handler.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Country passed to the balance check when renewing.
    pub reference_country: String,
    /// Live virtual numbers allowed per customer. 0 disables the limit.
    pub max_virtual_per_customer: u64,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            reference_country: "us".into(),
            max_virtual_per_customer: 10,
        }
    }
}

/// An already provisioned number imported by an administrator.
#[derive(Debug, Clone, Default)]
pub struct RegisterNumber {
    pub customer_id: Uuid,
    pub number: String,
    pub call_flow_id: Uuid,
    pub message_flow_id: Uuid,
    pub name: String,
    pub detail: String,
    pub provider_name: ProviderName,
    pub provider_reference_id: String,
    pub status: NumberStatus,
    pub t38_enabled: bool,
    pub emergency_enabled: bool,
}

pub struct NumberHandler {
    db: NumberDb,
    registry: ProviderRegistry,
    billing: Arc<dyn BalanceChecker>,
    notifier: Arc<dyn Notifier>,
    allocator: VirtualNumberAllocator,
    settings: HandlerSettings,
}

impl NumberHandler {
    pub fn new(
        db: NumberDb,
        registry: ProviderRegistry,
        billing: Arc<dyn BalanceChecker>,
        notifier: Arc<dyn Notifier>,
        settings: HandlerSettings,
    ) -> Self {
        let allocator = VirtualNumberAllocator::new(db.clone());
        Self {
            db,
            registry,
            billing,
            notifier,
            allocator,
            settings,
        }
    }

    pub fn settings(&self) -> &HandlerSettings {
        &self.settings
    }

    /// Purchase a number (or claim a virtual one) for a customer.
    #[instrument(skip(self, name, detail))]
    pub async fn create(
        &self,
        customer_id: Uuid,
        number: &str,
        call_flow_id: Uuid,
        message_flow_id: Uuid,
        name: &str,
        detail: &str,
    ) -> NumberResult<Number> {
        let mut record = Number::new(Uuid::new_v4(), customer_id, number);
        record.call_flow_id = call_flow_id;
        record.message_flow_id = message_flow_id;
        record.name = name.to_string();
        record.detail = detail.to_string();

        if is_virtual_number(number) {
            return self.create_virtual(record).await;
        }

        let valid = self
            .billing
            .is_valid_balance(customer_id, ReferenceType::Number, "", 1)
            .await?;
        if !valid {
            info!("Customer {} has insufficient balance for {}", customer_id, number);
            return Err(NumberError::InsufficientBalance(customer_id));
        }

        self.ensure_not_taken(number).await?;

        let adapter = self.registry.default_provider()?;
        let purchased = adapter.purchase(number).await?;

        record.provider_name = adapter.name();
        record.provider_reference_id = purchased.id;
        record.status = purchased.status;
        record.t38_enabled = purchased.t38_enabled;
        record.emergency_enabled = purchased.emergency_enabled;

        if let Err(e) = self.db.create(&record).await {
            error!(
                "Purchased {} from {} but could not store it: {}",
                number, record.provider_name, e
            );
            return Err(e.into());
        }
        let created = self.get(&record.id).await?;
        self.publish(NumberEvent::webhook(EventType::Created, &created)).await;

        let tags = vec![
            format!("CustomerID_{}", created.customer_id),
            format!("NumberID_{}", created.id),
        ];
        if let Err(e) = adapter.update_tags(&created, &tags).await {
            warn!("Could not tag {} at {}: {}", created.number, created.provider_name, e);
        }

        info!("Created number {} ({}) for {}", created.number, created.id, customer_id);
        Ok(created)
    }

    async fn create_virtual(&self, mut record: Number) -> NumberResult<Number> {
        validate_virtual_number(&record.number, false)?;

        let limit = self.settings.max_virtual_per_customer;
        if limit > 0 {
            let count = self.db.count_virtual_by_customer(&record.customer_id).await?;
            if count >= limit {
                return Err(NumberError::Validation(format!(
                    "customer {} already holds {} virtual numbers (limit {})",
                    record.customer_id, count, limit
                )));
            }
        }

        self.ensure_not_taken(&record.number).await?;

        record.number_type = NumberType::Virtual;
        record.provider_name = ProviderName::None;
        self.db.create(&record).await?;

        let created = self.get(&record.id).await?;
        self.publish(NumberEvent::webhook(EventType::Created, &created)).await;

        info!("Created virtual number {} ({})", created.number, created.id);
        Ok(created)
    }

    /// Import a number provisioned outside this service. No billing check
    /// and no carrier call is made.
    #[instrument(skip(self, request), fields(number = %request.number))]
    pub async fn register(&self, request: RegisterNumber) -> NumberResult<Number> {
        if request.number.is_empty() {
            return Err(NumberError::Validation("number is required".into()));
        }

        let number_type = if is_virtual_number(&request.number) {
            validate_virtual_number(&request.number, true)?;
            NumberType::Virtual
        } else {
            NumberType::Normal
        };

        self.ensure_not_taken(&request.number).await?;

        let mut record = Number::new(Uuid::new_v4(), request.customer_id, request.number);
        record.number_type = number_type;
        record.call_flow_id = request.call_flow_id;
        record.message_flow_id = request.message_flow_id;
        record.name = request.name;
        record.detail = request.detail;
        record.provider_name = request.provider_name;
        record.provider_reference_id = request.provider_reference_id;
        record.status = request.status;
        record.t38_enabled = request.t38_enabled;
        record.emergency_enabled = request.emergency_enabled;

        self.db.create(&record).await?;
        let created = self.get(&record.id).await?;
        self.publish(NumberEvent::webhook(EventType::Created, &created)).await;

        info!("Registered number {} ({})", created.number, created.id);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &Uuid) -> NumberResult<Number> {
        self.db
            .get(id)
            .await
            .map_err(|e| NumberError::from_store(*id, e))
    }

    /// One page of numbers, newest first. `page_token` is the `tm_create`
    /// of the last item of the previous page; `None` starts from now.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page_size: u64,
        page_token: Option<&str>,
        filter: &NumberFilter,
    ) -> NumberResult<Vec<Number>> {
        let size = if page_size == 0 { DEFAULT_PAGE_SIZE } else { page_size };
        let token = match page_token {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => format_time(&Utc::now()),
        };

        Ok(self.db.list(size, &token, filter).await?)
    }

    pub async fn update_info(
        &self,
        id: &Uuid,
        call_flow_id: Uuid,
        message_flow_id: Uuid,
        name: &str,
        detail: &str,
    ) -> NumberResult<Number> {
        self.update(id, &NumberPatch::info(call_flow_id, message_flow_id, name, detail))
            .await
    }

    pub async fn update_flow_id(
        &self,
        id: &Uuid,
        call_flow_id: Uuid,
        message_flow_id: Uuid,
    ) -> NumberResult<Number> {
        self.update(id, &NumberPatch::flow_ids(call_flow_id, message_flow_id))
            .await
    }

    /// Apply a partial update and publish the result.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &Uuid, patch: &NumberPatch) -> NumberResult<Number> {
        self.db
            .update(id, patch)
            .await
            .map_err(|e| NumberError::from_store(*id, e))?;

        let updated = self.get(id).await?;
        self.publish(NumberEvent::webhook(EventType::Updated, &updated)).await;

        debug!("Updated number {} ({:?})", id, patch.fields());
        Ok(updated)
    }

    /// Release a number at its carrier and soft delete it. Deleting an
    /// already deleted number returns it unchanged.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &Uuid) -> NumberResult<Number> {
        let number = self.get(id).await?;
        if number.is_deleted() {
            info!("Number {} is already deleted", id);
            return Ok(number);
        }

        if number.provider_name != ProviderName::None {
            let adapter = self.registry.get(number.provider_name)?;
            adapter.release(&number).await?;
        }

        self.db
            .delete(id)
            .await
            .map_err(|e| NumberError::from_store(*id, e))?;

        let deleted = self.get(id).await?;
        self.publish(NumberEvent::webhook(EventType::Deleted, &deleted)).await;

        info!("Deleted number {} ({})", deleted.number, id);
        Ok(deleted)
    }

    /// Numbers the default carrier offers in a country.
    #[instrument(skip(self))]
    pub async fn get_available_numbers(
        &self,
        country_code: &str,
        limit: u32,
    ) -> NumberResult<Vec<AvailableNumber>> {
        let adapter = self.registry.default_provider()?;
        Ok(adapter.get_available_numbers(country_code, limit).await?)
    }

    pub async fn get_available_virtual_numbers(&self, limit: u32) -> NumberResult<Vec<AvailableNumber>> {
        self.allocator.available(limit).await
    }

    async fn ensure_not_taken(&self, number: &str) -> NumberResult<()> {
        if let Some(existing) = self.db.get_by_number(number).await? {
            warn!("Number {} is already held by {}", number, existing.id);
            return Err(NumberError::AlreadyExists(number.to_string()));
        }
        Ok(())
    }

    /// Publish an event. The mutation is already committed, so failures
    /// are only logged.
    async fn publish(&self, event: NumberEvent) {
        if let Err(e) = self.notifier.publish(&event).await {
            error!(
                "Could not publish {} for {}: {}",
                event.event_type, event.data.id, e
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::billing::MockBalanceChecker;
    use crate::notify::MockNotifier;
    use crate::providers::{MockProviderAdapter, ProviderAdapter, ProviderNumber};
    use number_store::{connect, MemoryCache};
    use std::time::Duration;

    pub async fn memory_db() -> NumberDb {
        let pool = connect("sqlite::memory:", 1).await.unwrap();
        let db = NumberDb::new(pool, Arc::new(MemoryCache::new(Duration::from_secs(60))));
        db.migrate().await.unwrap();
        db
    }

    pub fn purchased(id: &str) -> ProviderNumber {
        ProviderNumber {
            id: id.to_string(),
            status: NumberStatus::Active,
            t38_enabled: true,
            emergency_enabled: false,
        }
    }

    pub fn named_adapter(name: ProviderName) -> MockProviderAdapter {
        let mut adapter = MockProviderAdapter::new();
        adapter.expect_name().return_const(name);
        adapter
    }

    pub fn quiet_notifier() -> MockNotifier {
        let mut notifier = MockNotifier::new();
        notifier.expect_publish().returning(|_| Ok(()));
        notifier
    }

    pub fn balance(valid: bool) -> MockBalanceChecker {
        let mut billing = MockBalanceChecker::new();
        billing
            .expect_is_valid_balance()
            .returning(move |_, _, _, _| Ok(valid));
        billing
    }

    pub fn build(
        db: NumberDb,
        adapters: Vec<MockProviderAdapter>,
        billing: MockBalanceChecker,
        notifier: MockNotifier,
    ) -> NumberHandler {
        let mut registry = ProviderRegistry::new(ProviderName::Telnyx);
        for adapter in adapters {
            registry.register(Arc::new(adapter) as Arc<dyn ProviderAdapter>);
        }
        NumberHandler::new(
            db,
            registry,
            Arc::new(billing),
            Arc::new(notifier),
            HandlerSettings::default(),
        )
    }

    /// Store an active telnyx number directly.
    pub async fn seed(db: &NumberDb, customer_id: Uuid, number: &str) -> Number {
        let mut record = Number::new(Uuid::new_v4(), customer_id, number);
        record.provider_name = ProviderName::Telnyx;
        record.provider_reference_id = format!("ref-{}", number);
        db.create(&record).await.unwrap();
        db.get(&record.id).await.unwrap()
    }
}
