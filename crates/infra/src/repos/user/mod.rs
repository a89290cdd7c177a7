mod dynamodb;
mod inmemory;

pub use dynamodb::DynamoUserRepo;
pub use inmemory::InMemoryUserRepo;
use jubilee_domain::{User, ID};

#[async_trait::async_trait]
pub trait IUserRepo: Send + Sync {
    async fn insert(&self, user: &User) -> anyhow::Result<()>;
    async fn save(&self, user: &User) -> anyhow::Result<()>;
    async fn find(&self, user_id: &ID) -> Option<User>;
    async fn delete(&self, user_id: &ID) -> Option<User>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ada() -> User {
        User::new(
            ID::new("ada"),
            "Ada",
            "Lovelace",
            chrono_tz::UTC,
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn create_and_delete() {
        let repo = InMemoryUserRepo::new();
        let user = ada();

        assert!(repo.insert(&user).await.is_ok());
        let found = repo.find(&user.id).await.expect("To find user");
        assert_eq!(found.full_name(), "Ada Lovelace");

        assert!(repo.delete(&user.id).await.is_some());
        assert!(repo.find(&user.id).await.is_none());
    }

    #[tokio::test]
    async fn update() {
        let repo = InMemoryUserRepo::new();
        let mut user = ada();
        assert!(repo.insert(&user).await.is_ok());

        user.timezone = chrono_tz::Europe::Oslo;
        assert!(repo.save(&user).await.is_ok());

        let found = repo.find(&user.id).await.expect("To find user");
        assert_eq!(found.timezone, chrono_tz::Europe::Oslo);
    }
}
