//! Browser push subscriptions.

use crate::model::user::{WebPushKeys, WebPushSubscription};
use crate::model::Entity;
use crate::query::traced;
use crate::repo::{decode_all, insert, RepoResult};
use crate::store::{DocumentStore, Filter};

pub struct WebPushRepository<'a> {
    store: &'a DocumentStore<'a>,
}

impl<'a> WebPushRepository<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self { store }
    }

    pub fn store(&self, endpoint: &str, keys: &WebPushKeys, user_id: &str) -> RepoResult<WebPushSubscription> {
        traced("store_subscription", (endpoint, user_id), || {
            insert(
                self.store,
                &WebPushSubscription {
                    id: String::new(),
                    endpoint: endpoint.to_string(),
                    keys: keys.clone(),
                    user_id: user_id.to_string(),
                },
            )
        })
    }

    pub fn for_user(&self, user_id: &str) -> RepoResult<Vec<WebPushSubscription>> {
        traced("get_subscriptions", (user_id,), || {
            decode_all(
                self.store
                    .find_all(WebPushSubscription::COLLECTION, &Filter::eq("userId", user_id))?,
            )
        })
    }

    /// Drops every subscription registered for `endpoint`.
    pub fn remove(&self, endpoint: &str) -> RepoResult<usize> {
        traced("remove_subscription", (endpoint,), || {
            Ok(self
                .store
                .delete_many(WebPushSubscription::COLLECTION, &Filter::eq("endpoint", endpoint))?)
        })
    }
}
