//! The application runtime.
//!
//! [`Runtime`] owns the state, the three services and the event bus, all
//! handed in once at construction. It executes the actions returned by
//! [`handle_event`] and multiplexes two inputs on a single task:
//!
//! ```text
//!   EventBus (user commands, tracker detections) ──┐
//!                                                  ├─▶ dispatch ─▶ handle_event ─▶ actions
//!   FuturesUnordered<acquisition jobs> ────────────┘                                  │
//!          ▲                                                                           │
//!          └─────────────────────── begin_capture / begin_fetch / … ◀─────────────────┘
//! ```
//!
//! There is no parallelism: services are only touched between awaits of the
//! loop, so none of them needs a lock.

use super::bus::{BusMessage, EventBus, EventSender, EventSource};
use super::handler::{handle_event, Event};
use super::{Action, AppState};
use crate::acquisition::{AcquisitionJob, Completion, ImageAcquisition, JobOutcome};
use crate::domain::{Permission, PermissionOutcome, PermissionSet, Result};
use crate::localization::MarkerLocalizer;
use crate::registration::RegistrationController;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use std::collections::VecDeque;
use std::sync::Arc;

/// Platform permission prompt.
#[async_trait]
pub trait PermissionProvider: Send + Sync {
    async fn request(&self, permission: Permission) -> PermissionOutcome;
}

/// The services driven by the state machine.
#[derive(Debug)]
pub struct Services {
    pub acquisition: ImageAcquisition,
    pub localization: MarkerLocalizer,
    pub registration: RegistrationController,
}

/// Owns everything and runs the event loop.
///
/// A runtime is single-use: once shut down, every listener registration is
/// gone and [`startup`](Self::startup) and [`run`](Self::run) return without
/// doing anything.
pub struct Runtime {
    state: AppState,
    services: Services,
    permissions: Arc<dyn PermissionProvider>,
    bus: EventBus,
    jobs: FuturesUnordered<BoxFuture<'static, JobOutcome>>,
    running: bool,
    closed: bool,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("state", &self.state)
            .field("services", &self.services)
            .field("jobs", &self.jobs.len())
            .field("running", &self.running)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    #[must_use]
    pub fn new(services: Services, permissions: Arc<dyn PermissionProvider>) -> Self {
        Self {
            state: AppState::new(),
            services,
            permissions,
            bus: EventBus::new(),
            jobs: FuturesUnordered::new(),
            running: false,
            closed: false,
        }
    }

    /// Registers an event source. Each source may register once.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` for a second registration of the same source.
    pub fn register(&mut self, source: EventSource) -> Result<EventSender> {
        self.bus.register(source)
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Whether [`shutdown`](Self::shutdown) has completed.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Requests permissions, reduces the answers and enters the initial mode.
    ///
    /// Permission prompts are awaited one after another and only reduced once
    /// all have answered. Does nothing on a runtime that was shut down.
    pub async fn startup(&mut self) {
        if self.closed {
            tracing::warn!("runtime was shut down and cannot be restarted");
            return;
        }
        if self.running {
            return;
        }
        self.running = true;
        tracing::info!("requesting permissions");

        let mut answers = Vec::with_capacity(Permission::ALL.len());
        for permission in Permission::ALL {
            let outcome = self.permissions.request(permission).await;
            match outcome {
                PermissionOutcome::Granted => tracing::info!(permission = %permission, "granted"),
                PermissionOutcome::Denied => {
                    tracing::warn!(permission = %permission, "denied, please check your settings");
                }
                PermissionOutcome::DeniedPermanently => {
                    tracing::warn!(permission = %permission, "denied and cannot be requested again");
                }
            }
            answers.push((permission, outcome));
        }
        let permissions = PermissionSet::collect(answers);
        let resolved = Event::PermissionsResolved {
            ready: permissions.is_ready(),
            plane_detection: permissions.plane_detection_enabled(),
        };
        self.services.acquisition.set_permissions(permissions);

        self.dispatch(resolved).await;
        let actions = self.state.enter_initial();
        self.execute_all(actions).await;
    }

    /// Runs until shutdown.
    pub async fn run(&mut self) {
        self.startup().await;
        while self.running {
            tokio::select! {
                Some(message) = self.bus.recv() => self.on_message(message).await,
                Some(outcome) = self.jobs.next(), if !self.jobs.is_empty() => {
                    self.on_job(outcome).await;
                }
                else => break,
            }
        }
        tracing::info!("runtime stopped");
    }

    /// Handles one bus message.
    pub async fn on_message(&mut self, message: BusMessage) {
        match message {
            BusMessage::Command(event) => self.dispatch(event).await,
            BusMessage::Detection(detection) => {
                if let Some(localized) = self.services.localization.on_marker_event(&detection) {
                    self.dispatch(Event::MarkerLocalized(localized.marker)).await;
                }
            }
        }
    }

    /// Processes an event and every follow-up event it causes, in order.
    pub async fn dispatch(&mut self, event: Event) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            if !self.running {
                tracing::debug!(event = event.name(), "runtime stopped, event dropped");
                return;
            }
            match handle_event(&mut self.state, &event) {
                Ok((controls_changed, actions)) => {
                    if controls_changed {
                        tracing::debug!(mode = %self.state.mode(), controls = %self.state.controls.summary(), "controls updated");
                    }
                    for action in actions {
                        queue.extend(self.execute_action(action).await);
                    }
                }
                Err(e) => tracing::error!(event = event.name(), error = %e, "event handling failed"),
            }
        }
    }

    async fn execute_all(&mut self, actions: Vec<Action>) {
        let mut follow_ups = VecDeque::new();
        for action in actions {
            follow_ups.extend(self.execute_action(action).await);
        }
        while let Some(event) = follow_ups.pop_front() {
            self.dispatch(event).await;
        }
    }

    /// Executes one action, returning follow-up events.
    #[allow(clippy::too_many_lines)]
    async fn execute_action(&mut self, action: Action) -> Vec<Event> {
        tracing::debug!(action = ?action, "executing action");
        match action {
            Action::StartAcquisition => self.services.acquisition.start(),
            Action::StopAcquisition => self.services.acquisition.stop(),
            Action::ReleaseImage => self.services.acquisition.release(),
            Action::CancelReadiness => self.services.acquisition.cancel_readiness(),
            Action::Capture => match self.services.acquisition.begin_capture() {
                Ok(job) => self.spawn_job(job),
                Err(e) => return vec![failed(&e)],
            },
            Action::LoadFromDisk { file } => {
                return vec![match self.services.acquisition.load_file(file.as_deref()) {
                    Ok(info) => Event::ImageAcquired(info),
                    Err(e) => failed(&e),
                }];
            }
            Action::Fetch { name } => match self.services.acquisition.begin_fetch(&name) {
                Ok(job) => self.spawn_job(job),
                Err(e) => return vec![failed(&e)],
            },
            Action::SendImage => match self.services.acquisition.begin_send() {
                Ok(job) => self.spawn_job(job),
                Err(e) => tracing::warn!(error = %e, "cannot send image to server"),
            },
            Action::FetchGallery { path_type } => {
                let job = self.services.acquisition.begin_gallery(&path_type);
                self.spawn_job(job);
            }
            Action::ConfirmImage => {
                return vec![match self.services.acquisition.confirm_use() {
                    Ok(info) => Event::ImageConfirmed(info),
                    Err(e) => failed(&e),
                }];
            }

            Action::StartLocalization => {
                if let Err(e) = self.services.localization.start().await {
                    tracing::error!(error = %e, "marker localization failed to start");
                }
            }
            Action::StopLocalization => {
                if let Err(e) = self.services.localization.stop().await {
                    tracing::warn!(error = %e, "tracker did not stop cleanly");
                }
            }
            Action::ClearMarkers => self.services.localization.clear(),

            Action::Relocalize => self.services.registration.relocalize(),
            Action::PlaceCanvas { pose } => {
                if let Err(e) = self.services.registration.place(&pose) {
                    tracing::warn!(error = %e, "canvas placement rejected");
                }
            }
            Action::EnableAdjustment => self.services.registration.enable_manual_adjustment(),
            Action::DisableAdjustment => self.services.registration.disable_manual_adjustment(),
            Action::Adjust {
                translation,
                rotation,
            } => match self.services.registration.apply_adjustment(translation, rotation) {
                Ok(placement) => tracing::trace!(position = ?placement.position, "canvas adjusted"),
                Err(e) => tracing::debug!(error = %e, "adjustment rejected"),
            },
            Action::ResetRegistration => self.services.registration.reset(),

            Action::Shutdown => self.shutdown().await,
        }
        vec![]
    }

    fn spawn_job(&mut self, job: AcquisitionJob) {
        tracing::debug!(kind = job.kind(), pending = self.jobs.len(), "job started");
        self.jobs.push(job.run().boxed());
    }

    /// Folds a finished job back into the acquisition service.
    pub async fn on_job(&mut self, outcome: JobOutcome) {
        let follow_up = match self.services.acquisition.complete(outcome) {
            Ok(Completion::Acquired(info)) => Some(Event::ImageAcquired(info)),
            Ok(Completion::Discarded) => None,
            Ok(Completion::Sent) => {
                tracing::info!("image sent to server");
                None
            }
            Ok(Completion::Gallery(listing)) => {
                tracing::info!(listing = %listing, "gallery listing");
                None
            }
            Err(e) => Some(failed(&e)),
        };
        if let Some(event) = follow_up {
            self.dispatch(event).await;
        }
    }

    /// Awaits every outstanding job and folds its outcome in.
    pub async fn settle(&mut self) {
        while let Some(outcome) = self.jobs.next().await {
            self.on_job(outcome).await;
        }
    }

    /// Processes every message already queued on the bus.
    pub async fn drain_bus(&mut self) {
        while let Some(message) = self.bus.try_recv() {
            self.on_message(message).await;
        }
    }

    /// Stops services and tears down every listener registration.
    pub async fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        tracing::info!("shutting down");
        self.running = false;
        self.closed = true;
        if let Err(e) = self.services.localization.stop().await {
            tracing::warn!(error = %e, "tracker did not stop cleanly");
        }
        self.services.acquisition.shutdown().await;
        self.bus.close_all();
        self.jobs.clear();
    }
}

fn failed(error: &crate::domain::ArCanvasError) -> Event {
    if error.is_retryable() {
        tracing::info!(error = %error, "acquisition can be retried");
    }
    Event::AcquisitionFailed {
        reason: error.to_string(),
    }
}
