use async_trait::async_trait;
use std::sync::Arc;

use crate::cqrs::{Query, QueryHandler};
use crate::event_sourcing::core::{EsError, EsResult};
use super::read_model::{UserDirectory, UserView};

// ============================================================================
// User Queries - served from the user directory read model
// ============================================================================

pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone)]
pub struct GetUser {
    pub user_id: String,
}

impl Query for GetUser {
    const NAME: &'static str = "user.get";
    type Output = Option<UserView>;

    fn validate(&self) -> EsResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(EsError::validation("user_id is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FindUserByEmail {
    pub email: String,
}

impl Query for FindUserByEmail {
    const NAME: &'static str = "user.find_by_email";
    type Output = Option<UserView>;

    fn validate(&self) -> EsResult<()> {
        if !self.email.contains('@') {
            return Err(EsError::validation("email must contain @"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ListActiveUsers {
    pub limit: usize,
}

impl Query for ListActiveUsers {
    const NAME: &'static str = "user.list_active";
    type Output = Vec<UserView>;

    fn validate(&self) -> EsResult<()> {
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(EsError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct UserQueryHandler {
    directory: Arc<UserDirectory>,
}

impl UserQueryHandler {
    pub fn new(directory: Arc<UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl QueryHandler<GetUser> for UserQueryHandler {
    async fn handle(&self, query: GetUser) -> EsResult<Option<UserView>> {
        Ok(self.directory.get(&query.user_id).await)
    }
}

#[async_trait]
impl QueryHandler<FindUserByEmail> for UserQueryHandler {
    async fn handle(&self, query: FindUserByEmail) -> EsResult<Option<UserView>> {
        Ok(self.directory.find_by_email(&query.email).await)
    }
}

#[async_trait]
impl QueryHandler<ListActiveUsers> for UserQueryHandler {
    async fn handle(&self, query: ListActiveUsers) -> EsResult<Vec<UserView>> {
        Ok(self.directory.list_active(query.limit).await)
    }
}
