//! Batch renewal of numbers whose renewal is due.

use super::{NumberHandler, DEFAULT_PAGE_SIZE};
use crate::error::{NumberError, NumberResult};
use crate::notify::{EventType, NumberEvent};
use billing_client::ReferenceType;
use chrono::{DateTime, Duration, Utc};
use number_store::{Number, NumberFilter, NumberPatch};
use tracing::{debug, error, info, instrument, warn};

impl NumberHandler {
    /// Renew every live number whose `tm_renew` is older than a cutoff.
    ///
    /// Exactly one selector must be given: `days` or `hours` (non-zero,
    /// counted back from now) or an absolute `tm_renew` cutoff. Customers
    /// who can no longer pay lose the number. Only renewed numbers are
    /// returned.
    #[instrument(skip(self))]
    pub async fn renew_numbers(
        &self,
        days: u32,
        hours: u32,
        tm_renew: Option<DateTime<Utc>>,
    ) -> NumberResult<Vec<Number>> {
        let selected = [days != 0, hours != 0, tm_renew.is_some()]
            .iter()
            .filter(|s| **s)
            .count();
        if selected != 1 {
            return Err(NumberError::Validation(format!(
                "exactly one of days, hours or tm_renew must be set (got {})",
                selected
            )));
        }

        let cutoff = match tm_renew {
            Some(cutoff) => cutoff,
            None if days != 0 => Utc::now() - Duration::days(i64::from(days)),
            None => Utc::now() - Duration::hours(i64::from(hours)),
        };

        self.renew_by_cutoff(cutoff).await
    }

    async fn renew_by_cutoff(&self, cutoff: DateTime<Utc>) -> NumberResult<Vec<Number>> {
        // Renewed rows get tm_renew >= started, so they never match again.
        let started = Utc::now();
        let cutoff = cutoff.min(started);
        let filter = NumberFilter::active();
        let mut renewed = Vec::new();

        loop {
            let page = self
                .db
                .get_by_tm_renew(&cutoff, DEFAULT_PAGE_SIZE, &filter)
                .await?;
            if page.is_empty() {
                break;
            }

            let mut progressed = 0usize;
            for number in &page {
                let valid = match self
                    .billing
                    .is_valid_balance(
                        number.customer_id,
                        ReferenceType::Number,
                        &self.settings.reference_country,
                        1,
                    )
                    .await
                {
                    Ok(valid) => valid,
                    Err(e) => {
                        error!("Balance check failed for {}: {}", number.id, e);
                        continue;
                    }
                };

                if !valid {
                    info!(
                        "Customer {} can't pay for {}, releasing it",
                        number.customer_id, number.number
                    );
                    match self.delete(&number.id).await {
                        Ok(_) => progressed += 1,
                        Err(e) => error!("Could not delete unpaid number {}: {}", number.id, e),
                    }
                    continue;
                }

                match self.renew_number(number).await {
                    Ok(number) => {
                        progressed += 1;
                        renewed.push(number);
                    }
                    Err(e) => error!("Could not renew {}: {}", number.id, e),
                }
            }

            // Nothing left this page, so re-reading it would return the same rows.
            if progressed == 0 {
                warn!("No progress on a page of {} due numbers, stopping", page.len());
                break;
            }
        }

        info!("Renewed {} numbers (cutoff {})", renewed.len(), cutoff);
        Ok(renewed)
    }

    async fn renew_number(&self, number: &Number) -> NumberResult<Number> {
        self.db
            .update(&number.id, &NumberPatch::renew(Utc::now()))
            .await
            .map_err(|e| NumberError::from_store(number.id, e))?;

        let renewed = self.get(&number.id).await?;
        self.publish(NumberEvent::platform(EventType::Renewed, &renewed)).await;

        debug!("Renewed {} until next cycle", renewed.number);
        Ok(renewed)
    }
}
