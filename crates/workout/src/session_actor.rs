//! Serial executor for a [`Recorder`].
//!
//! Every call on a [`SessionHandle`] becomes a command on one channel, and a
//! single task applies them in arrival order, so fixes are never reordered
//! or processed concurrently. Live metrics are published on a watch channel
//! after every command and once a second.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::admission::FilterStatistics;
use crate::coverage::ObservedVisit;
use crate::errors::{WorkoutError, WorkoutResult};
use crate::models::{ActivitySnapshot, ActivityType, RawFix, WorkoutMetrics};
use crate::recorder::{ProcessedFix, Recorder};
use crate::store::ActivityStore;

const COMMAND_BUFFER: usize = 256;
const TICK: Duration = Duration::from_secs(1);

type Reply<T> = oneshot::Sender<WorkoutResult<T>>;

enum Command {
    Start(ActivityType, Reply<()>),
    ProcessFix(RawFix, Reply<ProcessedFix>),
    Metrics(Reply<WorkoutMetrics>),
    Statistics(Reply<FilterStatistics>),
    Pause(Reply<()>),
    Resume(Reply<()>),
    Stop(Reply<ActivitySnapshot>),
    HandOff(Arc<dyn ActivityStore>, Reply<ActivitySnapshot>),
    UpsertTiles(Vec<ObservedVisit>, Reply<()>),
}

pub struct SessionActor {
    recorder: Recorder,
    commands: mpsc::Receiver<Command>,
    metrics: watch::Sender<Option<WorkoutMetrics>>,
}

impl SessionActor {
    /// Moves `recorder` onto its own task. Must be called within a tokio runtime.
    pub fn spawn(recorder: Recorder) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (metrics_tx, metrics_rx) = watch::channel(None);

        let actor = SessionActor {
            recorder,
            commands: command_rx,
            metrics: metrics_tx,
        };
        tokio::spawn(actor.run());

        SessionHandle {
            commands: command_tx,
            metrics: metrics_rx,
        }
    }

    async fn run(mut self) {
        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                _ = ticker.tick() => {}
            }
            self.publish_metrics();
        }

        debug!("session actor stopped, all handles dropped");
    }

    fn handle(&mut self, command: Command) {
        // A caller that stopped waiting for its reply is not an error.
        match command {
            Command::Start(activity_type, reply) => {
                let _ = reply.send(self.recorder.start(activity_type));
            }
            Command::ProcessFix(fix, reply) => {
                let _ = reply.send(self.recorder.process_fix(fix));
            }
            Command::Metrics(reply) => {
                let _ = reply.send(self.recorder.metrics_snapshot());
            }
            Command::Statistics(reply) => {
                let _ = reply.send(self.recorder.statistics());
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.recorder.pause());
            }
            Command::Resume(reply) => {
                let _ = reply.send(self.recorder.resume());
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.recorder.stop());
            }
            Command::HandOff(store, reply) => {
                let _ = reply.send(self.recorder.hand_off(store.as_ref()));
            }
            Command::UpsertTiles(visits, reply) => {
                let _ = reply.send(self.recorder.upsert_tiles(&visits));
            }
        }
    }

    fn publish_metrics(&self) {
        let metrics = self.recorder.metrics_snapshot().ok();
        self.metrics.send_if_modified(|current| {
            if *current == metrics {
                false
            } else {
                *current = metrics;
                true
            }
        });
    }
}

/// Cloneable front end of a [`SessionActor`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    metrics: watch::Receiver<Option<WorkoutMetrics>>,
}

impl SessionHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> WorkoutResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| WorkoutError::SessionClosed)?;
        reply_rx.await.map_err(|_| WorkoutError::SessionClosed)?
    }

    pub async fn start(&self, activity_type: ActivityType) -> WorkoutResult<()> {
        self.request(|reply| Command::Start(activity_type, reply)).await
    }

    pub async fn process_fix(&self, fix: RawFix) -> WorkoutResult<ProcessedFix> {
        self.request(|reply| Command::ProcessFix(fix, reply)).await
    }

    pub async fn metrics_snapshot(&self) -> WorkoutResult<WorkoutMetrics> {
        self.request(Command::Metrics).await
    }

    pub async fn statistics(&self) -> WorkoutResult<FilterStatistics> {
        self.request(Command::Statistics).await
    }

    pub async fn pause(&self) -> WorkoutResult<()> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> WorkoutResult<()> {
        self.request(Command::Resume).await
    }

    pub async fn stop(&self) -> WorkoutResult<ActivitySnapshot> {
        self.request(Command::Stop).await
    }

    pub async fn hand_off(&self, store: Arc<dyn ActivityStore>) -> WorkoutResult<ActivitySnapshot> {
        self.request(|reply| Command::HandOff(store, reply)).await
    }

    pub async fn upsert_tiles(&self, visits: Vec<ObservedVisit>) -> WorkoutResult<()> {
        self.request(|reply| Command::UpsertTiles(visits, reply)).await
    }

    /// Live metrics, `None` while no workout exists.
    pub fn subscribe_metrics(&self) -> watch::Receiver<Option<WorkoutMetrics>> {
        self.metrics.clone()
    }
}
