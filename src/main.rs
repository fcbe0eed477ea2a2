// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use jobrs::config::settings::Settings;
use jobrs::domain::repositories::dead_letter_repository::DeadLetterRepository;
use jobrs::domain::repositories::job_repository::JobRepository;
use jobrs::domain::services::llm_service::LLMService;
use jobrs::domain::services::mailer::MailSender;
use jobrs::infrastructure::database::connection;
use jobrs::infrastructure::observability::metrics::init_metrics;
use jobrs::infrastructure::repositories::dead_letter_repo_impl::DeadLetterRepositoryImpl;
use jobrs::infrastructure::repositories::job_repo_impl::JobRepositoryImpl;
use jobrs::infrastructure::services::channel_broadcaster::ChannelBroadcaster;
use jobrs::infrastructure::services::mail_sender_impl::{HttpMailSender, LogMailSender};
use jobrs::queue::dead_letter::DeadLetterQueue;
use jobrs::queue::rate_limiter::JobRateLimiter;
use jobrs::workers::dead_letter_cleanup_worker::DeadLetterCleanupWorker;
use jobrs::workers::handlers::HandlerRegistry;
use jobrs::workers::manager::WorkerManager;
use jobrs::workers::processor::Processor;
use jobrs::workers::reaper::ZombieReaper;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use url::Url;

use jobrs::utils::telemetry;
use migration::{Migrator, MigratorTrait};

/// 主函数
///
/// 应用程序入口点，负责初始化所有组件并启动作业处理
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize logging
    telemetry::init_telemetry();
    info!("Starting jobrs...");

    // 2. Load configuration
    let settings = Settings::new()?;

    if settings.metrics.enabled {
        init_metrics(&settings.metrics);
    }

    // 3. Database and migrations
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Repositories and queue components
    let job_repository: Arc<dyn JobRepository> = Arc::new(
        JobRepositoryImpl::new(db.clone())
            .with_default_max_attempts(settings.dead_letter.max_attempts),
    );
    let dead_letter_repository: Arc<dyn DeadLetterRepository> =
        Arc::new(DeadLetterRepositoryImpl::new(db.clone()));
    let dead_letter = Arc::new(DeadLetterQueue::new(
        dead_letter_repository,
        settings.dead_letter_config(),
    ));
    let rate_limiter = Arc::new(JobRateLimiter::new(
        settings.rate_limits.profiles(),
        settings.rate_limits.fallback,
    ));

    // 5. Handlers
    let mailer: Arc<dyn MailSender> = match HttpMailSender::from_settings(&settings.mailer) {
        Some(sender) => Arc::new(sender),
        None => {
            info!("No mail API key configured, emails will only be logged");
            Arc::new(LogMailSender)
        }
    };
    let llm = Arc::new(LLMService::from_settings(&settings.llm));
    let base_url = Url::parse(&settings.app.base_url)?;
    let registry = Arc::new(HandlerRegistry::with_builtin_handlers(mailer, llm, base_url));
    info!(job_types = ?registry.job_types(), "Job handlers registered");

    let broadcaster = Arc::new(ChannelBroadcaster::default());

    // 6. Recover jobs left in processing by a previous run
    let shutdown = CancellationToken::new();
    let reaper = ZombieReaper::new(job_repository.clone(), settings.zombie_timeout());
    if let Err(e) = reaper.rescue_zombies().await {
        error!(error = %e, "Startup zombie rescue failed");
    }

    // 7. Start workers
    let processor = Processor::new(
        job_repository,
        registry,
        rate_limiter,
        dead_letter.clone(),
        broadcaster,
        settings.processor_config(),
    )
    .with_shutdown(shutdown.clone());

    let mut manager = WorkerManager::new(shutdown.clone());
    manager.spawn(Arc::new(processor));
    manager.spawn(Arc::new(DeadLetterCleanupWorker::new(
        dead_letter,
        settings.cleanup_interval(),
        shutdown.clone(),
    )));
    if let Some(interval) = settings.reaper_interval() {
        manager.spawn(Arc::new(reaper.with_schedule(interval, shutdown.clone())));
    }

    manager.wait_for_shutdown(settings.shutdown_timeout()).await;
    Ok(())
}
