//! Batch removal of seen notification deliveries.

use crate::model::Page;
use crate::repo::notification_repo::UsersNotificationsRepository;
use crate::service::ServiceResult;
use crate::store::DocumentStore;
use log::info;

pub const DEFAULT_CLEANUP_BATCH: u64 = 500;

pub struct CleanupService<'a> {
    deliveries: UsersNotificationsRepository<'a>,
}

impl<'a> CleanupService<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self {
            deliveries: UsersNotificationsRepository::new(store),
        }
    }

    /// Deletes seen delivery records in batches of `batch_size` until none
    /// remain; returns how many were removed.
    pub fn purge_seen_notifications(&self, batch_size: u64) -> ServiceResult<usize> {
        let batch_size = batch_size.max(1);
        let mut removed = 0;
        loop {
            let batch = self.deliveries.seen(Page::first(batch_size))?;
            if batch.is_empty() {
                break;
            }
            let ids: Vec<String> = batch.into_iter().map(|record| record.id).collect();
            let deleted = self.deliveries.delete_many(&ids)?;
            if deleted == 0 {
                break;
            }
            removed += deleted;
        }
        info!("event=seen_notifications_purged module=service removed={removed}");
        Ok(removed)
    }
}
