use std::future::Future;
use std::io;
use futures::channel::mpsc::{channel, Receiver};
use futures::StreamExt;
use log::{info, warn};
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;

use crate::config::types::Config;
use crate::dashboard::Dashboard;
use crate::device::connection::{connect_device_task, SessionOptions};
use crate::device::types::DeviceEvent;
use crate::error::AppRunError;

// Applies and logs events until the session ends or `shutdown` resolves. A `shutdown` that fails
// is logged and no longer listened to.
async fn follow_session<S>(
    mut dashboard: Dashboard,
    mut receiver: Receiver<DeviceEvent>,
    shutdown: S,
    cancel: &CancellationToken,
) -> Dashboard
where
    S: Future<Output = io::Result<()>>,
{
    tokio::pin!(shutdown);
    let mut listening = true;

    loop {
        tokio::select! {
            result = &mut shutdown, if listening => match result {
                Ok(()) => {
                    info!("Stopping");
                    cancel.cancel();
                    break;
                },
                Err(err) => {
                    warn!("Failed to listen for ctrl-c: {}", err);
                    listening = false;
                },
            },
            event = receiver.next() => match event {
                Some(event) => {
                    dashboard.apply(event);
                    info!(
                        "{} | steps: {} ({})",
                        dashboard.status_label(),
                        dashboard.steps(),
                        dashboard.percent_label(),
                    );
                },
                // the session has ended for good
                None => break,
            },
        }
    }

    dashboard
}

/// Runs the device session without a window, logging every change of the dashboard.
pub fn run_headless(config: Config) -> Result<(), AppRunError> {
    let runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async move {
        let cancel = CancellationToken::new();
        let (sender, receiver) = channel(64);
        let options = SessionOptions::from(&config);
        let session = tokio::spawn(connect_device_task(options, cancel.clone(), vec![sender]));

        let dashboard = Dashboard::new(config.step_goal);
        follow_session(dashboard, receiver, tokio::signal::ctrl_c(), &cancel).await;

        if let Err(err) = session.await {
            warn!("Device session task failed: {}", err);
        }
    });

    Ok(())
}
