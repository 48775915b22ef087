//! Core metrics snapshots.
//!
//! A snapshot records active users and active communities for the daily,
//! weekly and monthly windows next to live record totals.

use crate::model::community::Community;
use crate::model::direct_message::DirectMessageThread;
use crate::model::metrics::CoreMetrics;
use crate::model::thread::Thread;
use crate::model::user::User;
use crate::model::{Entity, Timeframe};
use crate::repo::metrics_repo::MetricsRepository;
use crate::service::ServiceResult;
use crate::store::DocumentStore;
use log::info;

pub struct MetricsService<'a> {
    metrics: MetricsRepository<'a>,
}

impl<'a> MetricsService<'a> {
    pub fn new(store: &'a DocumentStore<'a>) -> Self {
        Self {
            metrics: MetricsRepository::new(store),
        }
    }

    /// Computes the current snapshot and stores it.
    pub fn record_snapshot(&self) -> ServiceResult<CoreMetrics> {
        let active_communities = |timeframe| {
            self.metrics
                .active_communities_in_timeframe(timeframe)
                .map(|active| active.count)
        };
        let snapshot = CoreMetrics {
            dau: self.metrics.active_users_in_timeframe(Timeframe::Daily)?,
            wau: self.metrics.active_users_in_timeframe(Timeframe::Weekly)?,
            mau: self.metrics.active_users_in_timeframe(Timeframe::Monthly)?,
            dac: active_communities(Timeframe::Daily)?,
            wac: active_communities(Timeframe::Weekly)?,
            mac: active_communities(Timeframe::Monthly)?,
            users: self.metrics.record_count(User::COLLECTION)?,
            communities: self.metrics.record_count(Community::COLLECTION)?,
            threads: self.metrics.record_count(Thread::COLLECTION)?,
            dm_threads: self.metrics.record_count(DirectMessageThread::COLLECTION)?,
            ..CoreMetrics::default()
        };
        let stored = self.metrics.save(&snapshot)?;
        info!(
            "event=core_metrics_saved module=service dau={} wau={} mau={} users={}",
            stored.dau, stored.wau, stored.mau, stored.users
        );
        Ok(stored)
    }

    /// The newest snapshot and the one before it, if stored.
    pub fn latest_pair(&self) -> ServiceResult<(Option<CoreMetrics>, Option<CoreMetrics>)> {
        let mut last_two = self.metrics.last_two()?.into_iter();
        Ok((last_two.next(), last_two.next()))
    }
}
