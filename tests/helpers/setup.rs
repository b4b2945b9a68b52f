use booking_notifier_api::Application;
use booking_notifier_infra::{InMemoryMailTransport, MockSys, NotifierContext};
use std::sync::Arc;

pub struct TestApp {
    pub ctx: NotifierContext,
    pub sys: Arc<MockSys>,
    pub mailer: Arc<InMemoryMailTransport>,
    pub address: String,
}

// Launch the application as a background task
pub async fn spawn_app() -> TestApp {
    let sys = Arc::new(MockSys::new(1_700_000_000_000));
    let mailer = Arc::new(InMemoryMailTransport::new());
    let mut ctx = NotifierContext {
        sys: sys.clone(),
        mailer: mailer.clone(),
        ..NotifierContext::create_inmemory()
    };
    ctx.config.port = 0; // Random port
    // Runs are triggered by the tests themselves
    ctx.config.notification_worker_interval_secs = 60 * 60;

    let application = Application::new(ctx.clone())
        .await
        .expect("Failed to build application.");

    let address = format!("http://localhost:{}/api/v1", application.port());
    let _ = actix_web::rt::spawn(async move {
        application
            .start()
            .await
            .expect("Expected application to start");
    });

    TestApp {
        ctx,
        sys,
        mailer,
        address,
    }
}
