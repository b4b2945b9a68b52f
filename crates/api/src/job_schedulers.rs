use crate::{
    notification::process_notification_jobs::ProcessNotificationJobsUseCase,
    shared::usecase::execute,
};
use actix_web::rt::time::{interval_at, Instant};
use booking_notifier_infra::NotifierContext;
use std::time::Duration;
use tracing::info;

/// Runs the notification worker on a fixed interval. There is a single
/// worker per process and a run never overlaps with the previous one.
pub fn start_notification_worker(ctx: NotifierContext) {
    let period = Duration::from_secs(ctx.config.notification_worker_interval_secs);
    info!("Starting notification worker with an interval of {:?}", period);

    actix_web::rt::spawn(async move {
        // First run happens one period after startup
        let mut interval = interval_at(Instant::now() + period, period);
        loop {
            interval.tick().await;

            let usecase = ProcessNotificationJobsUseCase::default();
            // Errors are logged by the usecase executor, the next tick retries
            let _ = execute(usecase, &ctx).await;
        }
    });
}
