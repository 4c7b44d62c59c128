use chrono::{DateTime, Local, Utc};
use rollcall_core::enrollment::{Enrollment, EnrollmentError};
use rollcall_core::{
    AttendanceHistory, BoundingBox, CaptureState, CourseContext, CourseReport, Emission, Identity,
    IdentitySource, Outcome, PresenceRecord, ProposeError, Roster, Session, SessionSummary, Ticket,
};
use rollcall_hw::{CaptureController, CaptureError, StreamInfo};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error("detection failed: {0}")]
    Propose(#[from] ProposeError),
    #[error("registration failed: {0}")]
    Enrollment(#[from] EnrollmentError),
    #[error("unknown course: {0}")]
    UnknownCourse(String),
    #[error("detection cancelled because capture stopped")]
    Cancelled,
    #[error("engine task exited")]
    ChannelClosed,
}

/// Timing and sizing knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub detect_interval: Duration,
    pub processing_delay: Duration,
    pub recommended_samples: u32,
    pub event_buffer: usize,
}

/// Reply to a successful start.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureStarted {
    pub course: CourseContext,
    pub stream: StreamInfo,
}

/// A proposal that reached the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub identity: Identity,
    pub outcome: Outcome,
    pub overlay: BoundingBox,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of the engine for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub session_id: Uuid,
    pub state: CaptureState,
    pub course: Option<CourseContext>,
    pub present: usize,
    pub last_recognized: Option<Identity>,
    pub stream: Option<StreamInfo>,
    pub roster_size: usize,
    pub archived_sessions: usize,
}

/// Notifications broadcast to subscribers as the session changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    CaptureStarted { course: CourseContext, stream: StreamInfo },
    CaptureStopped,
    Proposed { overlay: BoundingBox },
    Accepted { identity: Identity },
    Duplicate { identity: Identity },
    Reset,
    Closed { summary: SessionSummary },
}

/// Messages sent from handles to the engine task.
enum EngineRequest {
    Start {
        course: String,
        section_id: String,
        reply: oneshot::Sender<Result<CaptureStarted, EngineError>>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Detect {
        reply: oneshot::Sender<Result<Detection, EngineError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Close {
        reply: oneshot::Sender<Option<SessionSummary>>,
    },
    Present {
        reply: oneshot::Sender<Vec<PresenceRecord>>,
    },
    Status {
        reply: oneshot::Sender<Status>,
    },
    Roster {
        reply: oneshot::Sender<Vec<Identity>>,
    },
    Register {
        enrollment: Enrollment,
        reply: oneshot::Sender<Result<Identity, EngineError>>,
    },
    Report {
        course: String,
        reply: oneshot::Sender<Result<CourseReport, EngineError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Messages sent from the engine's own timer tasks.
enum TimerEvent {
    /// Periodic detection trigger for the given capture epoch.
    Tick(u64),
    /// Processing delay for a proposal expired.
    Emit(Ticket),
}

/// Clone-safe handle to the engine task.
///
/// The engine exits, releasing the camera, when the last handle is dropped
/// or [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    events: broadcast::Sender<SessionEvent>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Select a course and start capturing.
    pub async fn start(&self, course: &str, section_id: &str) -> Result<CaptureStarted, EngineError> {
        self.request(|reply| EngineRequest::Start {
            course: course.to_string(),
            section_id: section_id.to_string(),
            reply,
        })
        .await?
    }

    /// Stop capturing. Returns whether capture was active.
    pub async fn stop(&self) -> Result<bool, EngineError> {
        self.request(|reply| EngineRequest::Stop { reply }).await
    }

    /// Trigger a detection now and wait for its outcome.
    pub async fn detect(&self) -> Result<Detection, EngineError> {
        self.request(|reply| EngineRequest::Detect { reply }).await?
    }

    pub async fn reset(&self) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::Reset { reply }).await
    }

    /// Stop, archive the session for the dashboard and start a fresh one.
    pub async fn close(&self) -> Result<Option<SessionSummary>, EngineError> {
        self.request(|reply| EngineRequest::Close { reply }).await
    }

    pub async fn present(&self) -> Result<Vec<PresenceRecord>, EngineError> {
        self.request(|reply| EngineRequest::Present { reply }).await
    }

    pub async fn status(&self) -> Result<Status, EngineError> {
        self.request(|reply| EngineRequest::Status { reply }).await
    }

    pub async fn roster(&self) -> Result<Vec<Identity>, EngineError> {
        self.request(|reply| EngineRequest::Roster { reply }).await
    }

    pub async fn register(&self, enrollment: Enrollment) -> Result<Identity, EngineError> {
        self.request(|reply| EngineRequest::Register { enrollment, reply })
            .await?
    }

    pub async fn report(&self, course: &str) -> Result<CourseReport, EngineError> {
        self.request(|reply| EngineRequest::Report {
            course: course.to_string(),
            reply,
        })
        .await?
    }

    /// Stop capture and end the engine task.
    pub async fn shutdown(&self) {
        if self
            .request(|reply| EngineRequest::Shutdown { reply })
            .await
            .is_err()
        {
            tracing::debug!("engine already gone at shutdown");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

struct InFlight {
    ticket: Ticket,
    overlay: BoundingBox,
    task: JoinHandle<()>,
    waiter: Option<oneshot::Sender<Result<Detection, EngineError>>>,
}

struct Engine {
    config: EngineConfig,
    session: Session,
    controller: CaptureController,
    roster: Roster,
    source: Box<dyn IdentitySource + Send>,
    history: AttendanceHistory,
    events: broadcast::Sender<SessionEvent>,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    epoch: u64,
    ticker: Option<JoinHandle<()>>,
    in_flight: Option<InFlight>,
}

/// Spawn the engine on the current tokio runtime.
///
/// The engine owns the session, the capture controller, the roster and the
/// identity source; everything else reaches them through the returned handle.
pub fn spawn_engine(
    config: EngineConfig,
    controller: CaptureController,
    roster: Roster,
    source: Box<dyn IdentitySource + Send>,
) -> EngineHandle {
    let (tx, rx) = mpsc::channel::<EngineRequest>(16);
    let (timer_tx, timer_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(config.event_buffer.max(1));

    tracing::info!(
        students = roster.len(),
        interval_ms = config.detect_interval.as_millis() as u64,
        delay_ms = config.processing_delay.as_millis() as u64,
        "engine configured"
    );

    let engine = Engine {
        config,
        session: Session::new(),
        controller,
        roster,
        source,
        history: AttendanceHistory::new(),
        events: events.clone(),
        timer_tx,
        epoch: 0,
        ticker: None,
        in_flight: None,
    };
    tokio::spawn(engine.run(rx, timer_rx));

    EngineHandle { tx, events }
}

impl Engine {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<EngineRequest>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerEvent>,
    ) {
        tracing::info!(session = %self.session.id(), "engine task started");
        loop {
            tokio::select! {
                req = rx.recv() => match req {
                    Some(EngineRequest::Shutdown { reply }) => {
                        self.stop_capture();
                        let _ = reply.send(());
                        break;
                    }
                    Some(req) => self.handle(req),
                    None => break,
                },
                Some(event) = timer_rx.recv() => self.on_timer(event),
            }
        }
        // Last handle gone or shutdown requested: the camera is always released.
        self.stop_capture();
        tracing::info!("engine task exiting");
    }

    fn handle(&mut self, req: EngineRequest) {
        match req {
            EngineRequest::Start {
                course,
                section_id,
                reply,
            } => {
                let _ = reply.send(self.start_capture(&course, &section_id));
            }
            EngineRequest::Stop { reply } => {
                let _ = reply.send(self.stop_capture());
            }
            EngineRequest::Detect { reply } => self.trigger(Some(reply)),
            EngineRequest::Reset { reply } => {
                self.session.reset();
                tracing::info!(session = %self.session.id(), "attendance list reset");
                self.emit(SessionEvent::Reset);
                let _ = reply.send(());
            }
            EngineRequest::Close { reply } => {
                let _ = reply.send(self.close_session());
            }
            EngineRequest::Present { reply } => {
                let _ = reply.send(self.session.records().to_vec());
            }
            EngineRequest::Status { reply } => {
                let _ = reply.send(self.status());
            }
            EngineRequest::Roster { reply } => {
                let _ = reply.send(self.roster.students().to_vec());
            }
            EngineRequest::Register { enrollment, reply } => {
                let result = enrollment
                    .register(&mut self.roster, self.config.recommended_samples)
                    .map_err(EngineError::from);
                let _ = reply.send(result);
            }
            EngineRequest::Report { course, reply } => {
                let _ = reply.send(self.report(&course));
            }
            // Handled in the run loop.
            EngineRequest::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    fn on_timer(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Tick(epoch) => {
                if epoch == self.epoch && self.session.is_capturing() {
                    self.trigger(None);
                }
            }
            TimerEvent::Emit(ticket) => self.deliver(ticket),
        }
    }

    fn start_capture(&mut self, course: &str, section_id: &str) -> Result<CaptureStarted, EngineError> {
        let (ctx, stream) = self.controller.start(course, section_id)?;
        self.session.begin_capture(ctx.clone());
        self.epoch += 1;
        self.spawn_ticker();

        self.emit(SessionEvent::CaptureStarted {
            course: ctx.clone(),
            stream: stream.clone(),
        });
        Ok(CaptureStarted { course: ctx, stream })
    }

    /// Cancel timers, answer any waiting manual detection, release the camera.
    fn stop_capture(&mut self) -> bool {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
            if let Some(waiter) = in_flight.waiter {
                let _ = waiter.send(Err(EngineError::Cancelled));
            }
        }

        let released = self.controller.stop();
        let was_capturing = self.session.end_capture();
        let stopped = released || was_capturing;
        if stopped {
            self.emit(SessionEvent::CaptureStopped);
        }
        stopped
    }

    fn spawn_ticker(&mut self) {
        if let Some(old) = self.ticker.take() {
            old.abort();
        }
        let tx = self.timer_tx.clone();
        let epoch = self.epoch;
        let period = self.config.detect_interval.max(Duration::from_millis(1));

        self.ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(TimerEvent::Tick(epoch)).is_err() {
                    break;
                }
            }
        }));
    }

    /// Draw a candidate and schedule its emission after the processing delay.
    fn trigger(&mut self, waiter: Option<oneshot::Sender<Result<Detection, EngineError>>>) {
        let frame = self
            .controller
            .stream_info()
            .map(|s| (s.width, s.height))
            .unwrap_or((0, 0));

        let proposal = match self
            .session
            .propose(self.source.as_mut(), &self.roster, frame)
        {
            Ok(p) => p,
            Err(e) => {
                match waiter {
                    Some(waiter) => {
                        let _ = waiter.send(Err(e.into()));
                    }
                    None => tracing::debug!(error = %e, "automatic detection skipped"),
                }
                return;
            }
        };

        tracing::debug!(id = %proposal.identity.id, manual = waiter.is_some(), "detection proposed");

        let tx = self.timer_tx.clone();
        let delay = self.config.processing_delay;
        let ticket = proposal.ticket;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerEvent::Emit(ticket));
        });

        self.emit(SessionEvent::Proposed {
            overlay: proposal.overlay.clone(),
        });
        self.in_flight = Some(InFlight {
            ticket,
            overlay: proposal.overlay,
            task,
            waiter,
        });
    }

    fn deliver(&mut self, ticket: Ticket) {
        let in_flight = if self
            .in_flight
            .as_ref()
            .is_some_and(|f| f.ticket == ticket)
        {
            self.in_flight.take()
        } else {
            None
        };

        let timestamp = Utc::now();
        let Emission::Recorded { identity, outcome } = self.session.complete(ticket, timestamp) else {
            return;
        };

        match outcome {
            Outcome::Accepted => {
                tracing::info!(id = %identity.id, name = %identity.name, "attendance marked");
                self.emit(SessionEvent::Accepted {
                    identity: identity.clone(),
                });
            }
            Outcome::DuplicateRejected => {
                tracing::info!(id = %identity.id, name = %identity.name, "already marked present");
                self.emit(SessionEvent::Duplicate {
                    identity: identity.clone(),
                });
            }
        }

        if let Some(InFlight {
            overlay,
            waiter: Some(waiter),
            ..
        }) = in_flight
        {
            let _ = waiter.send(Ok(Detection {
                identity,
                outcome,
                overlay,
                timestamp,
            }));
        }
    }

    fn close_session(&mut self) -> Option<SessionSummary> {
        self.stop_capture();
        let date = Local::now().date_naive();
        let summary = self.session.close(self.roster.len(), date)?;
        self.history.archive(summary.clone());
        self.emit(SessionEvent::Closed {
            summary: summary.clone(),
        });
        Some(summary)
    }

    fn report(&self, course: &str) -> Result<CourseReport, EngineError> {
        let course = course.trim();
        let title = self
            .controller
            .catalog()
            .get(course)
            .map(|c| c.title.clone())
            .ok_or_else(|| EngineError::UnknownCourse(course.to_string()))?;
        Ok(self.history.report(course, Some(title), &self.roster))
    }

    fn status(&self) -> Status {
        Status {
            session_id: self.session.id(),
            state: self.session.state(),
            course: self.session.course().cloned(),
            present: self.session.present_count(),
            last_recognized: self.session.last_recognized().cloned(),
            stream: self.controller.stream_info().cloned(),
            roster_size: self.roster.len(),
            archived_sessions: self.history.len(),
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
