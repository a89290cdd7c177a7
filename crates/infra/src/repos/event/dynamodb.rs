use super::{ClaimOutcome, EventPage, IEventRepo};
use crate::repos::shared::dynamo_repo::{
    decode_cursor, encode_cursor, instant_attr, number_attr, opt_instant_attr, opt_number_attr,
    opt_string_attr, string_attr,
};
use crate::repos::shared::repo::DeleteResult;
use anyhow::anyhow;
use aws_sdk_dynamodb::types::{
    AttributeValue, DeleteRequest, PutRequest, ReturnValue, WriteRequest,
};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use jubilee_domain::{format_instant, parse_event_date, EventRecord, EventType, SendingStatus, ID};
use std::collections::HashMap;
use tracing::error;

/// Secondary index over `(GSI1PK="EVENT", notify_utc)`: the global
/// time-ordered view of all events.
const GSI1_NAME: &str = "GSI1";
const GSI1_PK_VALUE: &str = "EVENT";

/// DynamoDB caps batch writes at 25 items per request.
const BATCH_WRITE_LIMIT: usize = 25;

pub struct DynamoEventRepo {
    client: Client,
    table: String,
}

impl DynamoEventRepo {
    pub fn new(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

    fn key(user_id: &ID, event_type: EventType) -> HashMap<String, AttributeValue> {
        let mut key = HashMap::new();
        key.insert(
            "PK".to_string(),
            AttributeValue::S(format!("USER#{}", user_id)),
        );
        key.insert(
            "SK".to_string(),
            AttributeValue::S(format!("EVENT#{}", event_type)),
        );
        key
    }

    // Undefined optional attributes are omitted from the item, never
    // written as null.
    fn to_item(event: &EventRecord) -> HashMap<String, AttributeValue> {
        let mut item = Self::key(&event.user_id, event.event_type);
        item.insert(
            "GSI1PK".to_string(),
            AttributeValue::S(GSI1_PK_VALUE.to_string()),
        );
        item.insert(
            "date".to_string(),
            AttributeValue::S(event.date.format("%Y-%m-%d").to_string()),
        );
        item.insert(
            "notify_local_time".to_string(),
            AttributeValue::S(event.notify_local_time.to_string()),
        );
        item.insert(
            "notify_utc".to_string(),
            AttributeValue::S(format_instant(&event.notify_utc)),
        );
        item.insert(
            "last_sent_year".to_string(),
            AttributeValue::N(event.last_sent_year.to_string()),
        );
        item.insert(
            "sending_status".to_string(),
            AttributeValue::S(event.sending_status.to_string()),
        );
        if let Some(attempted_at) = &event.sending_attempted_at {
            item.insert(
                "sending_attempted_at".to_string(),
                AttributeValue::S(format_instant(attempted_at)),
            );
        }
        if let Some(completed_at) = &event.sending_completed_at {
            item.insert(
                "sending_completed_at".to_string(),
                AttributeValue::S(format_instant(completed_at)),
            );
        }
        if let Some(failed_at) = &event.marked_failed_at {
            item.insert(
                "marked_failed_at".to_string(),
                AttributeValue::S(format_instant(failed_at)),
            );
        }
        if let Some(reason) = &event.failure_reason {
            item.insert(
                "failure_reason".to_string(),
                AttributeValue::S(reason.clone()),
            );
        }
        if let Some(code) = event.webhook_response_code {
            item.insert(
                "webhook_response_code".to_string(),
                AttributeValue::N(code.to_string()),
            );
        }
        if let Some(delivered_at) = &event.webhook_delivered_at {
            item.insert(
                "webhook_delivered_at".to_string(),
                AttributeValue::S(format_instant(delivered_at)),
            );
        }
        if let Some(label) = &event.label {
            item.insert("label".to_string(), AttributeValue::S(label.clone()));
        }
        item
    }

    fn from_item(item: &HashMap<String, AttributeValue>) -> anyhow::Result<EventRecord> {
        let pk = string_attr(item, "PK")?;
        let user_id = pk
            .strip_prefix("USER#")
            .ok_or_else(|| anyhow!("malformed event partition key: {}", pk))?;
        let sk = string_attr(item, "SK")?;
        let event_type = sk
            .strip_prefix("EVENT#")
            .ok_or_else(|| anyhow!("malformed event sort key: {}", sk))?
            .parse::<EventType>()?;

        let sending_status = match opt_string_attr(item, "sending_status") {
            Some(raw) => raw.parse::<SendingStatus>()?,
            None => SendingStatus::Pending,
        };

        Ok(EventRecord {
            user_id: ID::new(user_id),
            event_type,
            date: parse_event_date(&string_attr(item, "date")?)?,
            notify_local_time: string_attr(item, "notify_local_time")?.parse()?,
            notify_utc: instant_attr(item, "notify_utc")?,
            last_sent_year: opt_number_attr(item, "last_sent_year").unwrap_or(0) as i32,
            sending_status,
            sending_attempted_at: opt_instant_attr(item, "sending_attempted_at"),
            sending_completed_at: opt_instant_attr(item, "sending_completed_at"),
            marked_failed_at: opt_instant_attr(item, "marked_failed_at"),
            failure_reason: opt_string_attr(item, "failure_reason"),
            webhook_response_code: opt_number_attr(item, "webhook_response_code")
                .map(|code| code as u16),
            webhook_delivered_at: opt_instant_attr(item, "webhook_delivered_at"),
            label: opt_string_attr(item, "label"),
        })
    }

    async fn write_batch(&self, requests: Vec<WriteRequest>) -> anyhow::Result<()> {
        for chunk in requests.chunks(BATCH_WRITE_LIMIT) {
            self.client
                .batch_write_item()
                .request_items(&self.table, chunk.to_vec())
                .send()
                .await
                .map_err(|e| anyhow!("event batch write failed: {:?}", e))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IEventRepo for DynamoEventRepo {
    async fn insert(&self, event: &EventRecord) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(Self::to_item(event)))
            .send()
            .await
            .map_err(|e| anyhow!("event insert failed: {:?}", e))?;
        Ok(())
    }

    async fn save(&self, event: &EventRecord) -> anyhow::Result<()> {
        self.insert(event).await
    }

    async fn find(&self, user_id: &ID, event_type: EventType) -> Option<EventRecord> {
        let res = self
            .client
            .get_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(user_id, event_type)))
            .send()
            .await;
        match res {
            Ok(output) => output.item().and_then(|item| match Self::from_item(item) {
                Ok(event) => Some(event),
                Err(e) => {
                    error!(user_id = %user_id, "Malformed event item: {:?}", e);
                    None
                }
            }),
            Err(e) => {
                error!(user_id = %user_id, "Event lookup failed: {:?}", e);
                None
            }
        }
    }

    async fn query_due(
        &self,
        now: DateTime<Utc>,
        current_year: i32,
        cursor: Option<String>,
        limit: usize,
    ) -> anyhow::Result<EventPage> {
        let mut query = self
            .client
            .query()
            .table_name(&self.table)
            .index_name(GSI1_NAME)
            .key_condition_expression("GSI1PK = :gpk AND notify_utc <= :now")
            .filter_expression("attribute_not_exists(last_sent_year) OR last_sent_year < :year")
            .expression_attribute_values(":gpk", AttributeValue::S(GSI1_PK_VALUE.to_string()))
            .expression_attribute_values(":now", AttributeValue::S(format_instant(&now)))
            .expression_attribute_values(":year", AttributeValue::N(current_year.to_string()))
            .limit(limit as i32);
        if let Some(cursor) = cursor {
            query = query.set_exclusive_start_key(Some(decode_cursor(&cursor)?));
        }

        let resp = query
            .send()
            .await
            .map_err(|e| anyhow!("due events query failed: {:?}", e))?;

        let mut records = Vec::with_capacity(resp.items().len());
        for item in resp.items() {
            records.push(Self::from_item(item)?);
        }
        let next_cursor = match resp.last_evaluated_key() {
            Some(key) if !key.is_empty() => Some(encode_cursor(key)?),
            _ => None,
        };
        Ok(EventPage {
            records,
            next_cursor,
        })
    }

    async fn query_by_notify_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<EventRecord>> {
        let mut records = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let resp = self
                .client
                .query()
                .table_name(&self.table)
                .index_name(GSI1_NAME)
                .key_condition_expression("GSI1PK = :gpk AND notify_utc BETWEEN :from AND :to")
                .expression_attribute_values(":gpk", AttributeValue::S(GSI1_PK_VALUE.to_string()))
                .expression_attribute_values(":from", AttributeValue::S(format_instant(&from)))
                .expression_attribute_values(":to", AttributeValue::S(format_instant(&to)))
                .set_exclusive_start_key(start_key.clone())
                .send()
                .await
                .map_err(|e| anyhow!("notify range query failed: {:?}", e))?;
            for item in resp.items() {
                records.push(Self::from_item(item)?);
            }
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(records)
    }

    async fn query_by_sending_status(
        &self,
        status: SendingStatus,
    ) -> anyhow::Result<Vec<EventRecord>> {
        let mut records = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let resp = self
                .client
                .scan()
                .table_name(&self.table)
                .filter_expression("sending_status = :status")
                .expression_attribute_values(":status", AttributeValue::S(status.to_string()))
                .set_exclusive_start_key(start_key.clone())
                .send()
                .await
                .map_err(|e| anyhow!("sending status scan failed: {:?}", e))?;
            for item in resp.items() {
                records.push(Self::from_item(item)?);
            }
            match resp.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }
        Ok(records)
    }

    async fn claim_for_year(
        &self,
        user_id: &ID,
        event_type: EventType,
        expected_last_sent_year: i32,
        current_year: i32,
        new_notify_utc: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ClaimOutcome> {
        let res = self
            .client
            .update_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(user_id, event_type)))
            .update_expression(
                "SET sending_status = :sending, sending_attempted_at = :attempted_at, \
                 last_sent_year = :year, notify_utc = :notify_utc",
            )
            .condition_expression(
                "last_sent_year = :expected AND (attribute_not_exists(sending_status) \
                 OR NOT sending_status IN (:sending, :completed))",
            )
            .expression_attribute_values(
                ":sending",
                AttributeValue::S(SendingStatus::Sending.to_string()),
            )
            .expression_attribute_values(
                ":completed",
                AttributeValue::S(SendingStatus::Completed.to_string()),
            )
            .expression_attribute_values(":attempted_at", AttributeValue::S(format_instant(&now)))
            .expression_attribute_values(":year", AttributeValue::N(current_year.to_string()))
            .expression_attribute_values(
                ":notify_utc",
                AttributeValue::S(format_instant(&new_notify_utc)),
            )
            .expression_attribute_values(
                ":expected",
                AttributeValue::N(expected_last_sent_year.to_string()),
            )
            .send()
            .await;

        match res {
            Ok(_) => Ok(ClaimOutcome::Claimed),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Ok(ClaimOutcome::LostRace)
                } else {
                    Err(anyhow!("event claim failed: {:?}", service_err))
                }
            }
        }
    }

    async fn mark_completed(
        &self,
        user_id: &ID,
        event_type: EventType,
        response_code: u16,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let res = self
            .client
            .update_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(user_id, event_type)))
            .update_expression(
                "SET sending_status = :completed, webhook_response_code = :code, \
                 webhook_delivered_at = :now, sending_completed_at = :now \
                 REMOVE failure_reason, marked_failed_at",
            )
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(
                ":completed",
                AttributeValue::S(SendingStatus::Completed.to_string()),
            )
            .expression_attribute_values(":code", AttributeValue::N(response_code.to_string()))
            .expression_attribute_values(":now", AttributeValue::S(format_instant(&now)))
            .send()
            .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_err = e.into_service_error();
                // A deleted event has nothing left to mark.
                if service_err.is_conditional_check_failed_exception() {
                    Ok(())
                } else {
                    Err(anyhow!("mark completed failed: {:?}", service_err))
                }
            }
        }
    }

    async fn mark_failed(
        &self,
        user_id: &ID,
        event_type: EventType,
        reason: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        let res = self
            .client
            .update_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(user_id, event_type)))
            .update_expression(
                "SET sending_status = :failed, marked_failed_at = :now, failure_reason = :reason",
            )
            .condition_expression("attribute_exists(PK)")
            .expression_attribute_values(
                ":failed",
                AttributeValue::S(SendingStatus::Failed.to_string()),
            )
            .expression_attribute_values(":now", AttributeValue::S(format_instant(&now)))
            .expression_attribute_values(":reason", AttributeValue::S(reason.to_string()))
            .send()
            .await;

        match res {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_conditional_check_failed_exception() {
                    Ok(())
                } else {
                    Err(anyhow!("mark failed failed: {:?}", service_err))
                }
            }
        }
    }

    async fn bulk_insert(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        let mut requests = Vec::with_capacity(events.len());
        for event in events {
            let put = PutRequest::builder()
                .set_item(Some(Self::to_item(event)))
                .build()
                .map_err(|e| anyhow!("event batch item invalid: {:?}", e))?;
            requests.push(WriteRequest::builder().put_request(put).build());
        }
        self.write_batch(requests).await
    }

    async fn bulk_delete(&self, keys: &[(ID, EventType)]) -> anyhow::Result<DeleteResult> {
        let mut requests = Vec::with_capacity(keys.len());
        for (user_id, event_type) in keys {
            let delete = DeleteRequest::builder()
                .set_key(Some(Self::key(user_id, *event_type)))
                .build()
                .map_err(|e| anyhow!("event delete key invalid: {:?}", e))?;
            requests.push(WriteRequest::builder().delete_request(delete).build());
        }
        self.write_batch(requests).await?;
        Ok(DeleteResult {
            deleted_count: keys.len() as i64,
        })
    }

    async fn delete(&self, user_id: &ID, event_type: EventType) -> Option<EventRecord> {
        let res = self
            .client
            .delete_item()
            .table_name(&self.table)
            .set_key(Some(Self::key(user_id, event_type)))
            .return_values(ReturnValue::AllOld)
            .send()
            .await;
        match res {
            Ok(output) => output
                .attributes()
                .and_then(|item| Self::from_item(item).ok()),
            Err(e) => {
                error!(user_id = %user_id, "Event delete failed: {:?}", e);
                None
            }
        }
    }
}
