use log::{error, info};
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::modules::freeloader::core::BanManager;
use crate::modules::freeloader::engine::Freeloader;

static TASK_MUTEX: Lazy<Mutex<i32>> = Lazy::new(|| Mutex::new(0));

#[derive(EnumIter, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Task {
    TempbanExpiry,
}

impl Task {
    /// Whether or not the task is enabled
    pub fn enabled(&self) -> bool {
        match self {
            Task::TempbanExpiry => true,
        }
    }

    /// How often the task should run
    pub fn duration(&self) -> Duration {
        match self {
            Task::TempbanExpiry => Duration::from_secs(60),
        }
    }

    /// Description of the task
    pub fn description(&self) -> &'static str {
        match self {
            Task::TempbanExpiry => "Unbanning expired temp bans",
        }
    }

    /// Function to run the task
    pub async fn run(
        &self,
        freeloader: &Freeloader,
        ban_manager: &dyn BanManager,
    ) -> Result<(), crate::Error> {
        match self {
            Task::TempbanExpiry => {
                crate::tasks::tempban_expiry::sweep(freeloader, ban_manager, chrono::Utc::now())
                    .await
            }
        }
    }
}

/// Function to start all tasks
pub async fn start_all_tasks(freeloader: Arc<Freeloader>, ban_manager: Arc<dyn BanManager>) {
    // Start tasks
    let mut set = JoinSet::new();

    for task in Task::iter() {
        if !task.enabled() {
            continue;
        }

        set.spawn(taskcat(freeloader.clone(), ban_manager.clone(), task));
    }

    if let Some(res) = set.join_next().await {
        if let Err(e) = res {
            error!("Error while running task: {}", e);
        }

        info!("Task finished when it shouldn't have");
        std::process::abort();
    }

    info!("All tasks finished when they shouldn't have");
    std::process::abort();
}

/// Function that manages a task
async fn taskcat(freeloader: Arc<Freeloader>, ban_manager: Arc<dyn BanManager>, task: Task) {
    let duration = task.duration();
    let description = task.description();

    // Ensure multiple tx's are not created at the same time
    tokio::time::sleep(duration).await;

    let mut interval = tokio::time::interval(duration);

    // Space cycles off completion: a slow sweep delays the next one by
    // its own duration plus the interval.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let guard = TASK_MUTEX.lock().await;

        info!(
            "TASK: {} ({}s interval) [{}]",
            task.to_string(),
            duration.as_secs(),
            description
        );

        if let Err(e) = task.run(&freeloader, ban_manager.as_ref()).await {
            error!("TASK {} ERROR'd: {:?}", task.to_string(), e);
        }

        drop(guard);
    }
}
