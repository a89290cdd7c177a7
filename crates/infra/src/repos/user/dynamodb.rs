use super::IUserRepo;
use crate::repos::shared::dynamo_repo::{instant_attr, string_attr};
use anyhow::anyhow;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use jubilee_domain::{format_instant, parse_timezone, User, ID};
use std::collections::HashMap;
use tracing::error;

const METADATA_SK: &str = "METADATA";

pub struct DynamoUserRepo {
    client: Client,
    table: String,
}

impl DynamoUserRepo {
    pub fn new(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

    fn pk(user_id: &ID) -> AttributeValue {
        AttributeValue::S(format!("USER#{}", user_id))
    }

    fn to_item(user: &User) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), Self::pk(&user.id));
        item.insert("SK".to_string(), AttributeValue::S(METADATA_SK.to_string()));
        item.insert(
            "first_name".to_string(),
            AttributeValue::S(user.first_name.clone()),
        );
        item.insert(
            "last_name".to_string(),
            AttributeValue::S(user.last_name.clone()),
        );
        item.insert(
            "timezone".to_string(),
            AttributeValue::S(user.timezone.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(format_instant(&user.created_at)),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(format_instant(&user.updated_at)),
        );
        item
    }

    fn from_item(item: &HashMap<String, AttributeValue>) -> anyhow::Result<User> {
        let pk = string_attr(item, "PK")?;
        let user_id = pk
            .strip_prefix("USER#")
            .ok_or_else(|| anyhow!("malformed user partition key: {}", pk))?;
        Ok(User {
            id: ID::new(user_id),
            first_name: string_attr(item, "first_name")?,
            last_name: string_attr(item, "last_name")?,
            timezone: parse_timezone(&string_attr(item, "timezone")?)?,
            created_at: instant_attr(item, "created_at")?,
            updated_at: instant_attr(item, "updated_at")?,
        })
    }
}

#[async_trait::async_trait]
impl IUserRepo for DynamoUserRepo {
    async fn insert(&self, user: &User) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(Self::to_item(user)))
            .send()
            .await
            .map_err(|e| anyhow!("user insert failed: {:?}", e))?;
        Ok(())
    }

    async fn save(&self, user: &User) -> anyhow::Result<()> {
        self.insert(user).await
    }

    async fn find(&self, user_id: &ID) -> Option<User> {
        let res = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("PK", Self::pk(user_id))
            .key("SK", AttributeValue::S(METADATA_SK.to_string()))
            .send()
            .await;
        match res {
            Ok(output) => output.item().and_then(|item| match Self::from_item(item) {
                Ok(user) => Some(user),
                Err(e) => {
                    error!(user_id = %user_id, "Malformed user item: {:?}", e);
                    None
                }
            }),
            Err(e) => {
                error!(user_id = %user_id, "User lookup failed: {:?}", e);
                None
            }
        }
    }

    async fn delete(&self, user_id: &ID) -> Option<User> {
        let res = self
            .client
            .delete_item()
            .table_name(&self.table)
            .key("PK", Self::pk(user_id))
            .key("SK", AttributeValue::S(METADATA_SK.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await;
        match res {
            Ok(output) => output
                .attributes()
                .and_then(|item| Self::from_item(item).ok()),
            Err(e) => {
                error!(user_id = %user_id, "User delete failed: {:?}", e);
                None
            }
        }
    }
}
