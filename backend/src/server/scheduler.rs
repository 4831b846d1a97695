use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sea_orm::DatabaseConnection;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{error, info, warn};

use crate::db::services::TaskService;
use crate::pipeline::{ArticleGenerator, GeneratorError, RunTrigger};

/// Runs every idle task on a fixed interval.
///
/// Overlap is guarded by an in-process flag only, so two server processes sharing a
/// database would both run the same tasks.
pub struct TaskScheduler {
    db: DatabaseConnection,
    generator: Arc<ArticleGenerator>,
    in_progress: AtomicBool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub tasks: usize,
    pub articles: usize,
    pub failed: usize,
}

impl TaskScheduler {
    pub fn new(db: DatabaseConnection, generator: Arc<ArticleGenerator>) -> Self {
        Self {
            db,
            generator,
            in_progress: AtomicBool::new(false),
        }
    }

    pub async fn start_periodic(self: Arc<Self>, period_seconds: u64) {
        info!(period_seconds, "Task scheduler started.");
        let mut ticker = interval(Duration::from_secs(period_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            // A tick that fires while the previous one holds the flag is a no-op.
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.tick().await;
            });
        }
    }

    /// One pass over the idle tasks. Returns `None` when the previous pass was still
    /// running and this one was skipped.
    pub async fn tick(&self) -> Option<TickReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous scheduler tick is still running. Skipping this tick.");
            return None;
        }

        let report = self.run_idle_tasks().await;
        self.in_progress.store(false, Ordering::Release);
        Some(report)
    }

    async fn run_idle_tasks(&self) -> TickReport {
        let mut report = TickReport::default();
        let tasks = match TaskService::list_idle(&self.db).await {
            Ok(tasks) => tasks,
            Err(e) => {
                error!(error = %e, "Failed to load idle tasks.");
                return report;
            }
        };

        for task in tasks {
            report.tasks += 1;
            match self.generator.run_task(task.id, RunTrigger::Scheduler).await {
                Ok(summary) => report.articles += summary.articles.len(),
                Err(GeneratorError::Task(e)) => {
                    // Another trigger got to it first.
                    warn!(task_id = task.id, error = %e, "Task not started by scheduler.");
                }
                Err(_) => report.failed += 1,
            }
        }
        info!(
            tasks = report.tasks,
            articles = report.articles,
            failed = report.failed,
            "Scheduler tick finished."
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::TaskInput;
    use crate::db::test_connection;
    use crate::db::types::{FeedConfig, FeedItemMapping};
    use crate::pipeline::rewrite_client::{
        ArticleRewriter, RewriteError, RewriteRequest, RewriteResponse,
    };
    use crate::pipeline::{FeedFetcher, Pricing};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ArticleRewriter for Unreachable {
        async fn rewrite(&self, _request: RewriteRequest) -> Result<RewriteResponse, RewriteError> {
            Err(RewriteError::QuotaExceeded)
        }
    }

    fn scheduler(db: &DatabaseConnection) -> TaskScheduler {
        let generator = ArticleGenerator::new(
            db.clone(),
            Arc::new(Unreachable),
            FeedFetcher::new(),
            Pricing {
                input_per_million: 0.15,
                output_per_million: 0.60,
            },
        );
        TaskScheduler::new(db.clone(), Arc::new(generator))
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let db = test_connection().await;
        let scheduler = scheduler(&db);

        scheduler.in_progress.store(true, Ordering::SeqCst);
        assert_eq!(scheduler.tick().await, None);

        scheduler.in_progress.store(false, Ordering::SeqCst);
        assert_eq!(scheduler.tick().await, Some(TickReport::default()));
        assert!(!scheduler.in_progress.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_tick_counts_failed_runs() {
        let db = test_connection().await;
        let scheduler = scheduler(&db);
        TaskService::create(
            &db,
            TaskInput {
                // Nothing listens on port 9 locally, so the fetch fails fast.
                feed_url: "http://127.0.0.1:9/rss".to_string(),
                item_mapping: FeedItemMapping::default(),
                feed_config: FeedConfig {
                    languages: vec!["en".to_string()],
                    ..FeedConfig::default()
                },
            },
        )
        .await
        .unwrap();

        let report = scheduler.tick().await.unwrap();
        assert_eq!(report, TickReport { tasks: 1, articles: 0, failed: 1 });
        assert_eq!(TaskService::list_idle(&db).await.unwrap().len(), 1);
    }
}
