use crate::shared::usecase::UseCase;
use chrono::Duration;
use chrono_tz::Tz;
use jubilee_domain::{notify_utc_for_year, EventType, GreeterMessage, SendingStatus, ID};
use jubilee_infra::{ClaimOutcome, Context};
use tracing::{info, warn};

/// How long a `sending` claim may stand before a later delivery attempt
/// treats the holder as dead and recovers the event. The health monitor's
/// timeout is intentionally longer.
const STUCK_TIMEOUT_SENDER_SECS: i64 = 5 * 60;

/// Delivers one greeter message: claim the event for the year, POST the
/// webhook, mark the record completed. At most one receiver-visible side
/// effect per (event, year), enforced by the conditional claim plus the
/// idempotency key.
#[derive(Debug)]
pub struct DeliverGreetingUseCase {
    pub message: GreeterMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum UseCaseErrors {
    /// Retriable: the transport should redeliver this message.
    #[error("storage failure: {0}")]
    Storage(String),
    /// Retriable; repeated failures dead-letter the message.
    #[error("webhook delivery failed: {0}")]
    Delivery(String),
}

/// How a single queue delivery was resolved. Every variant except
/// `Delivered` finishes the message without a webhook call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { response_code: u16 },
    DuplicateDropped,
    MissingEventDropped,
    InFlightElsewhereDropped,
    LostRaceDropped,
    MalformedDropped,
}

#[async_trait::async_trait]
impl UseCase for DeliverGreetingUseCase {
    type Response = DeliveryOutcome;
    type Errors = UseCaseErrors;

    const NAME: &'static str = "DeliverGreeting";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        let message = &self.message;
        let now = ctx.sys.now();
        let year_now = message.year_now;
        let user_id = ID::new(message.id.clone());
        let event_type = message.event_type;

        let timezone = match message.timezone.parse::<Tz>() {
            Ok(timezone) => timezone,
            Err(_) => {
                warn!(user_id = %user_id, timezone = %message.timezone, "Greeter message carries an invalid timezone, dropping");
                return Ok(DeliveryOutcome::MalformedDropped);
            }
        };

        let Some(event) = ctx.repos.events.find(&user_id, event_type).await else {
            info!(user_id = %user_id, event_type = %event_type, "Greeter message for missing event, dropping");
            return Ok(DeliveryOutcome::MissingEventDropped);
        };

        // Both conditions, not just the year: a phase-3 failure leaves the
        // year advanced with a non-completed status, and that must stay
        // recoverable.
        if event.last_sent_year >= year_now && event.sending_status == SendingStatus::Completed {
            info!(user_id = %user_id, event_type = %event_type, "Already completed for {}, dropping duplicate", year_now);
            return Ok(DeliveryOutcome::DuplicateDropped);
        }

        if event.sending_status == SendingStatus::Sending {
            if let Some(attempted_at) = event.sending_attempted_at {
                if now - attempted_at < Duration::seconds(STUCK_TIMEOUT_SENDER_SECS) {
                    info!(user_id = %user_id, event_type = %event_type, "Another worker is sending, dropping");
                    return Ok(DeliveryOutcome::InFlightElsewhereDropped);
                }
                warn!(user_id = %user_id, event_type = %event_type, "Recovering event stuck in sending state");
                ctx.repos
                    .events
                    .mark_failed(
                        &user_id,
                        event_type,
                        "Stuck in sending state - likely webhook timeout or crash",
                        now,
                    )
                    .await
                    .map_err(|e| UseCaseErrors::Storage(e.to_string()))?;
            }
        }

        // Phase 1 - claim the event for this year and advance its next
        // occurrence in the same conditional write.
        let next_notify = notify_utc_for_year(
            message.event_date,
            timezone,
            message.notify_local_time,
            year_now + 1,
        );
        let claim = ctx
            .repos
            .events
            .claim_for_year(
                &user_id,
                event_type,
                event.last_sent_year,
                year_now,
                next_notify,
                now,
            )
            .await
            .map_err(|e| UseCaseErrors::Storage(e.to_string()))?;
        if claim == ClaimOutcome::LostRace {
            info!(user_id = %user_id, event_type = %event_type, "Lost the claim race, dropping");
            return Ok(DeliveryOutcome::LostRaceDropped);
        }

        // Phase 2 - deliver.
        let greeting = format!(
            "Hey {} {}, it's your {}!",
            message.first_name, message.last_name, event_type
        );
        let response_code = match ctx
            .webhook
            .deliver(&greeting, &message.idempotency_key())
            .await
        {
            Ok(200) => 200,
            Ok(code) => {
                let reason = format!("Webhook responded with status {}", code);
                mark_failed_best_effort(ctx, &user_id, event_type, &reason).await;
                return Err(UseCaseErrors::Delivery(reason));
            }
            Err(e) => {
                let reason = format!("Webhook request failed: {}", e);
                mark_failed_best_effort(ctx, &user_id, event_type, &reason).await;
                return Err(UseCaseErrors::Delivery(reason));
            }
        };

        // Phase 3 - complete. The webhook already fired: a failure here is
        // logged, never raised, and the health monitor reconciles the
        // record.
        if let Err(e) = ctx
            .repos
            .events
            .mark_completed(&user_id, event_type, response_code, now)
            .await
        {
            warn!(user_id = %user_id, event_type = %event_type, "Failed to mark event completed after delivery: {:?}", e);
        }

        info!(user_id = %user_id, event_type = %event_type, year = year_now, "Greeting delivered");
        Ok(DeliveryOutcome::Delivered { response_code })
    }
}

async fn mark_failed_best_effort(ctx: &Context, user_id: &ID, event_type: EventType, reason: &str) {
    if let Err(e) = ctx
        .repos
        .events
        .mark_failed(user_id, event_type, reason, ctx.sys.now())
        .await
    {
        warn!(user_id = %user_id, event_type = %event_type, "Failed to mark event failed: {:?}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::usecase::execute;
    use chrono::{DateTime, Utc};
    use jubilee_domain::{parse_instant, EventRecord, User};
    use jubilee_infra::webhook::InMemoryWebhookClient;
    use jubilee_infra::ISys;
    use std::sync::Arc;

    struct StaticTimeSys(DateTime<Utc>);
    impl ISys for StaticTimeSys {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    struct TestContext {
        ctx: Context,
        webhook: Arc<InMemoryWebhookClient>,
        now: DateTime<Utc>,
    }

    async fn setup() -> TestContext {
        let now = parse_instant("2026-06-15T09:00:00.000Z").unwrap();
        let webhook = Arc::new(InMemoryWebhookClient::new());
        let ctx =
            Context::create_inmemory_with(Arc::new(StaticTimeSys(now)), webhook.clone());

        let user = User::new(ID::new("ada"), "Ada", "Lovelace", chrono_tz::UTC, now);
        ctx.repos.users.insert(&user).await.unwrap();
        let event = EventRecord::new(
            ID::new("ada"),
            EventType::Birthday,
            "1990-06-15".parse().unwrap(),
            "09:00".parse().unwrap(),
            now,
        );
        ctx.repos.events.insert(&event).await.unwrap();

        TestContext { ctx, webhook, now }
    }

    fn message(_test: &TestContext) -> GreeterMessage {
        GreeterMessage {
            id: "ada".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            timezone: "UTC".to_string(),
            pk: "USER#ada".to_string(),
            sk: "EVENT#birthday".to_string(),
            event_type: EventType::Birthday,
            event_date: "1990-06-15".parse().unwrap(),
            notify_local_time: "09:00".parse().unwrap(),
            last_sent_year: 0,
            year_now: 2026,
        }
    }

    #[tokio::test]
    async fn happy_path_claims_delivers_and_completes() {
        let test = setup().await;
        let outcome = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { response_code: 200 });

        let deliveries = test.webhook.deliveries();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].message, "Hey Ada Lovelace, it's your birthday!");
        assert_eq!(deliveries[0].idempotency_key, "ada-birthday-2026");

        let event = test
            .ctx
            .repos
            .events
            .find(&ID::new("ada"), EventType::Birthday)
            .await
            .unwrap();
        assert_eq!(event.sending_status, SendingStatus::Completed);
        assert_eq!(event.last_sent_year, 2026);
        assert_eq!(event.webhook_response_code, Some(200));
        assert_eq!(
            event.notify_utc,
            parse_instant("2027-06-15T09:00:00.000Z").unwrap()
        );
    }

    #[tokio::test]
    async fn second_run_on_the_same_message_drops_as_duplicate() {
        let test = setup().await;
        let first = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert!(matches!(first, DeliveryOutcome::Delivered { .. }));

        let second = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert_eq!(second, DeliveryOutcome::DuplicateDropped);
        assert_eq!(test.webhook.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn missing_event_drops_the_message() {
        let test = setup().await;
        test.ctx
            .repos
            .events
            .delete(&ID::new("ada"), EventType::Birthday)
            .await
            .unwrap();

        let outcome = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert_eq!(outcome, DeliveryOutcome::MissingEventDropped);
        assert!(test.webhook.deliveries().is_empty());
    }

    #[tokio::test]
    async fn fresh_claim_by_another_worker_drops_the_message() {
        let test = setup().await;
        let mut event = test
            .ctx
            .repos
            .events
            .find(&ID::new("ada"), EventType::Birthday)
            .await
            .unwrap();
        event.sending_status = SendingStatus::Sending;
        event.sending_attempted_at = Some(test.now - Duration::minutes(2));
        test.ctx.repos.events.save(&event).await.unwrap();

        let outcome = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert_eq!(outcome, DeliveryOutcome::InFlightElsewhereDropped);
        assert!(test.webhook.deliveries().is_empty());
    }

    #[tokio::test]
    async fn stale_claim_is_recovered_and_delivered() {
        let test = setup().await;
        let mut event = test
            .ctx
            .repos
            .events
            .find(&ID::new("ada"), EventType::Birthday)
            .await
            .unwrap();
        // A worker died after phase 1: year advanced, stuck in sending.
        event.sending_status = SendingStatus::Sending;
        event.sending_attempted_at = Some(test.now - Duration::minutes(6));
        event.last_sent_year = 2026;
        event.notify_utc = parse_instant("2027-06-15T09:00:00.000Z").unwrap();
        test.ctx.repos.events.save(&event).await.unwrap();

        let outcome = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { response_code: 200 });
        assert_eq!(test.webhook.deliveries().len(), 1);

        let event = test
            .ctx
            .repos
            .events
            .find(&ID::new("ada"), EventType::Birthday)
            .await
            .unwrap();
        assert_eq!(event.sending_status, SendingStatus::Completed);
        assert_eq!(event.last_sent_year, 2026);
    }

    #[tokio::test]
    async fn webhook_failure_marks_failed_and_raises_retriable() {
        let test = setup().await;
        test.webhook.script_response(503);

        let res = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await;
        assert!(matches!(res, Err(UseCaseErrors::Delivery(_))));
        assert!(test.webhook.deliveries().is_empty());

        let event = test
            .ctx
            .repos
            .events
            .find(&ID::new("ada"), EventType::Birthday)
            .await
            .unwrap();
        assert_eq!(event.sending_status, SendingStatus::Failed);
        // The claim already advanced the year and the next occurrence.
        assert_eq!(event.last_sent_year, 2026);
        assert_eq!(
            event.notify_utc,
            parse_instant("2027-06-15T09:00:00.000Z").unwrap()
        );
        assert!(event
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("status 503"));
    }

    #[tokio::test]
    async fn failed_event_is_reclaimed_on_redelivery() {
        let test = setup().await;
        test.webhook.script_response(503);
        let _ = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await;

        // Webhook recovered; the redelivered message goes through.
        let outcome = execute(
            DeliverGreetingUseCase {
                message: message(&test),
            },
            &test.ctx,
        )
        .await
        .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered { response_code: 200 });
        assert_eq!(test.webhook.deliveries().len(), 1);
    }

    #[tokio::test]
    async fn invalid_timezone_in_message_drops() {
        let test = setup().await;
        let mut bad = message(&test);
        bad.timezone = "Mars/Olympus".to_string();

        let outcome = execute(DeliverGreetingUseCase { message: bad }, &test.ctx)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::MalformedDropped);
        assert!(test.webhook.deliveries().is_empty());
    }
}
