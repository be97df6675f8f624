//! Dashboard lifecycle: mount, run, tear down

use crate::config::DashboardConfig;
use crate::error::{MonitorError, Result};
use crate::fetcher::{HttpSnapshotFetcher, SnapshotFetcher};
use crate::model::StatusModel;
use crate::push::{PushChannel, PushSubscription};
use crate::reconciler::{DashboardSink, PullKind, PullTrigger, Reconciler, Update};
use crate::render::DashboardView;
use crate::scheduler::{FetchDispatcher, Scheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum Control {
    Snapshot(oneshot::Sender<StatusModel>),
    Shutdown,
}

/// Entry points for mounting a dashboard
pub struct Dashboard;

impl Dashboard {
    /// Mount a dashboard against the HTTP endpoints and push channel in
    /// `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn mount(config: &DashboardConfig, sink: Box<dyn DashboardSink>) -> Result<DashboardHandle> {
        config.validate()?;

        let fetcher = Arc::new(HttpSnapshotFetcher::new(config)?);
        let push = PushChannel::from_config(config);

        Ok(Self::mount_with(fetcher, push, config.refresh_interval, sink))
    }

    /// Mount a dashboard with explicitly constructed collaborators
    pub fn mount_with(
        fetcher: Arc<dyn SnapshotFetcher>,
        push: Option<PushChannel>,
        refresh_interval: Duration,
        sink: Box<dyn DashboardSink>,
    ) -> DashboardHandle {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let dispatcher: Arc<dyn PullTrigger> = Arc::new(FetchDispatcher::new(fetcher, updates_tx.clone()));
        let reconciler = Reconciler::new(dispatcher.clone(), sink, push.is_some());
        let task = tokio::spawn(run(reconciler, updates_rx, control_rx));

        let subscription = push.map(|channel| channel.subscribe(updates_tx.clone()));

        let mut scheduler = Scheduler::new(refresh_interval, dispatcher);
        scheduler.start();

        tracing::info!("Dashboard mounted");
        DashboardHandle {
            scheduler,
            subscription,
            updates: updates_tx,
            control: control_tx,
            task: Some(task),
        }
    }

    /// Pull both concerns once and render the result, without a timer or
    /// push channel
    pub async fn render_once(fetcher: &dyn SnapshotFetcher) -> DashboardView {
        let (observer, roster) = tokio::join!(
            fetcher.fetch_observer_status(),
            fetcher.fetch_cluster_snapshot()
        );

        let mut reconciler = Reconciler::new(Arc::new(NoPulls), Box::new(NoDisplay), false);
        reconciler.handle(Update::ObserverFetched(observer));
        reconciler.handle(Update::ClusterFetched(roster));
        reconciler.view()
    }
}

struct NoPulls;

impl PullTrigger for NoPulls {
    fn request_pull(&self, kind: PullKind) {
        tracing::debug!("Ignoring {} pull in one-shot mode", kind);
    }
}

struct NoDisplay;

impl DashboardSink for NoDisplay {
    fn render(&mut self, _view: &DashboardView) {}
}

async fn run(
    mut reconciler: Reconciler,
    mut updates: mpsc::UnboundedReceiver<Update>,
    mut control: mpsc::UnboundedReceiver<Control>,
) -> StatusModel {
    reconciler.refresh();

    loop {
        tokio::select! {
            biased;

            command = control.recv() => match command {
                Some(Control::Snapshot(reply)) => {
                    let _ = reply.send(reconciler.model().clone());
                }
                Some(Control::Shutdown) | None => break,
            },
            update = updates.recv() => match update {
                Some(update) => reconciler.handle(update),
                None => break,
            },
        }
    }

    reconciler.dispose();
    tracing::info!("Dashboard unmounted after {} renders", reconciler.render_count());
    reconciler.model().clone()
}

/// Handle to a mounted dashboard.
///
/// Dropping it tears the dashboard down as well; `shutdown` additionally
/// waits for the reconciler and returns the final model.
pub struct DashboardHandle {
    scheduler: Scheduler,
    subscription: Option<PushSubscription>,
    updates: mpsc::UnboundedSender<Update>,
    control: mpsc::UnboundedSender<Control>,
    task: Option<JoinHandle<StatusModel>>,
}

impl DashboardHandle {
    /// Consistent copy of the current model
    pub async fn snapshot(&self) -> Result<StatusModel> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.control
            .send(Control::Snapshot(reply_tx))
            .map_err(|_| MonitorError::ShutDown)?;

        reply_rx.await.map_err(|_| MonitorError::ShutDown)
    }

    /// Sender into the reconciler inbox, for feeding events from an
    /// additional push source
    pub fn updates(&self) -> mpsc::UnboundedSender<Update> {
        self.updates.clone()
    }

    pub fn is_push_active(&self) -> bool {
        self.subscription.as_ref().map_or(false, PushSubscription::is_active)
    }

    /// Cancel the timer, release the push channel and stop the reconciler.
    ///
    /// Fetches still in flight resolve into a closed inbox and are ignored.
    pub async fn shutdown(mut self) -> Result<StatusModel> {
        self.teardown();

        let task = self.task.take().ok_or(MonitorError::ShutDown)?;
        let _ = self.control.send(Control::Shutdown);
        Ok(task.await?)
    }

    fn teardown(&mut self) {
        self.scheduler.stop();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        self.teardown();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
