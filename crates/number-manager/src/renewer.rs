//! Periodic number renewal.
//!
//! Runs [`NumberHandler::renew_numbers`] on a fixed interval so numbers
//! whose renewal falls due get charged or released without an external
//! scheduler.

use crate::config::RenewalConfig;
use crate::handler::NumberHandler;
use number_store::Number;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Background task renewing due numbers.
pub struct Renewer {
    handler: Arc<NumberHandler>,
    config: RenewalConfig,
}

impl Renewer {
    pub fn new(handler: Arc<NumberHandler>, config: RenewalConfig) -> Self {
        Self { handler, config }
    }

    /// Run a single renewal cycle. Errors are logged and yield no numbers.
    pub async fn renew_once(&self) -> Vec<Number> {
        match self.handler.renew_numbers(self.config.days, 0, None).await {
            Ok(renewed) => renewed,
            Err(e) => {
                error!("Renewal cycle failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Run the renewer until the task is dropped.
    pub async fn run(&self) {
        info!(
            "Starting number renewer, interval: {:?}, days: {}",
            self.config.interval, self.config.days
        );

        loop {
            tokio::time::sleep(self.config.interval).await;

            debug!("Running renewal cycle...");
            let renewed = self.renew_once().await;

            if renewed.is_empty() {
                debug!("No numbers renewed this cycle");
            } else {
                info!("Renewal cycle complete: {} numbers renewed", renewed.len());
            }
        }
    }
}

/// Spawn the renewer as a background task.
pub fn spawn_renewer(
    handler: Arc<NumberHandler>,
    config: RenewalConfig,
) -> tokio::task::JoinHandle<()> {
    let renewer = Renewer::new(handler, config);

    tokio::spawn(async move {
        renewer.run().await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::*;
    use crate::notify::{EventType, MockNotifier};
    use chrono::{Duration as ChronoDuration, Utc};
    use number_store::NumberPatch;
    use std::time::Duration;
    use uuid::Uuid;

    fn renewal(days: u32) -> RenewalConfig {
        RenewalConfig {
            enabled: true,
            interval: Duration::from_secs(60),
            days,
        }
    }

    #[tokio::test]
    async fn test_renew_once() {
        let db = memory_db().await;
        let number = seed(&db, Uuid::new_v4(), "+14700000001").await;
        db.update(
            &number.id,
            &NumberPatch::renew(Utc::now() - ChronoDuration::days(31)),
        )
        .await
        .unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_publish()
            .withf(|e| e.event_type == EventType::Renewed)
            .times(1)
            .returning(|_| Ok(()));

        let handler = Arc::new(build(db, vec![], balance(true), notifier));
        let renewer = Renewer::new(handler, renewal(30));

        let renewed = renewer.renew_once().await;
        assert_eq!(renewed.len(), 1);
        assert_eq!(renewed[0].id, number.id);

        // already renewed
        assert!(renewer.renew_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_renew_once_logs_errors() {
        let db = memory_db().await;
        let handler = Arc::new(build(db, vec![], balance(true), quiet_notifier()));

        // zero days selects nothing, which the handler rejects
        let renewer = Renewer::new(handler, renewal(0));
        assert!(renewer.renew_once().await.is_empty());
    }

    #[tokio::test]
    async fn test_spawned_renewer_runs_on_interval() {
        let db = memory_db().await;
        let number = seed(&db, Uuid::new_v4(), "+14700000001").await;
        db.update(
            &number.id,
            &NumberPatch::renew(Utc::now() - ChronoDuration::days(31)),
        )
        .await
        .unwrap();

        let handler = Arc::new(build(db.clone(), vec![], balance(true), quiet_notifier()));
        let mut config = renewal(30);
        config.interval = Duration::from_millis(20);
        let task = spawn_renewer(handler, config);

        let renewed_since = Utc::now() - ChronoDuration::days(1);
        let mut renewed = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if db.get(&number.id).await.unwrap().tm_renew.unwrap() > renewed_since {
                renewed = true;
                break;
            }
        }

        task.abort();
        assert!(renewed);
    }
}
