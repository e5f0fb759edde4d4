//! Customer records.
//!
//! A new user is created for every reservation or on-the-spot sale; records are not
//! deduplicated and never deleted.

use crate::{
    entities::{User, user},
    errors::Result,
};
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, prelude::*};

/// Searches shorter than this return nothing.
pub const MIN_SEARCH_LEN: usize = 2;
/// Maximum number of users returned by a search.
pub const SEARCH_LIMIT: u64 = 5;

/// Inserts a customer record. Runs on whatever connection or transaction it is given.
pub async fn create_user<C>(db: &C, name: &str, phone: &str) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    user::ActiveModel {
        telegram_id: Set(None),
        name: Set(name.to_string()),
        phone: Set(phone.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Finds a user by id.
pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Finds up to [`SEARCH_LIMIT`] users whose name or phone contains `query`.
pub async fn search_users(db: &DatabaseConnection, query: &str) -> Result<Vec<user::Model>> {
    let query = query.trim();
    if query.chars().count() < MIN_SEARCH_LEN {
        return Ok(Vec::new());
    }

    User::find()
        .filter(
            Condition::any()
                .add(user::Column::Name.contains(query))
                .add(user::Column::Phone.contains(query)),
        )
        .order_by_asc(user::Column::Id)
        .limit(SEARCH_LIMIT)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_search_users_by_name_or_phone() -> Result<()> {
        let db = setup_test_db().await?;
        create_user(&db, "Ana Perez", "555-1000").await?;
        create_user(&db, "Luis Gomez", "555-2000").await?;
        create_user(&db, "Maria", "777-3000").await?;

        let by_name = search_users(&db, "Luis").await?;
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Luis Gomez");

        let by_phone = search_users(&db, "555").await?;
        assert_eq!(by_phone.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_search_users_short_query_returns_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        create_user(&db, "Ana", "5").await?;

        assert!(search_users(&db, "A").await?.is_empty());
        assert!(search_users(&db, " ").await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_search_users_is_limited() -> Result<()> {
        let db = setup_test_db().await?;
        for i in 0..8 {
            create_user(&db, &format!("Customer {i}"), "555").await?;
        }

        let found = search_users(&db, "Customer").await?;
        assert_eq!(found.len(), 5);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_user_by_id() -> Result<()> {
        let db = setup_test_db().await?;
        let user = create_user(&db, "Ana", "555-1").await?;
        assert_eq!(get_user_by_id(&db, user.id).await?, Some(user));
        assert_eq!(get_user_by_id(&db, 999).await?, None);
        Ok(())
    }
}
