//! The single-consumer executor loop.
//!
//! Exactly one queue item is in flight at any time: the control surface
//! accepts one logical operator, and interleaved input injection would
//! corrupt the VM's observed state. One failing command never halts the
//! loop.

use crate::outcome::{ExecutionOutcome, OutcomeStatus};
use admission_queue::{QueueConsumer, QueueItem};
use command_grammar::CommandKind;
use crowdvm_core::{ControlSurface, SurfaceError, SurfaceResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use user_store::UserStore;

/// Delay between a graceful power-off and the restart, giving the guest
/// time to actually halt.
const GRACEFUL_RESTART_DELAY: Duration = Duration::from_secs(12);

/// Extra time budget for power transitions on top of the per-call one.
const POWER_BUDGET: Duration = Duration::from_secs(90);

/// Settings the executor needs from the daemon configuration.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Per-item base time budget (the surface additionally bounds each
    /// underlying call).
    pub surface_timeout: Duration,
    /// Points credited per successful command.
    pub points_per_command: u64,
    /// Grace period to drain remaining items at shutdown.
    pub shutdown_grace: Duration,
}

/// The executor. Owns the outcome sender; dropping the executor (task
/// exit) closes the outcome stream, which ends the relay loop.
pub struct Executor {
    surface: Arc<dyn ControlSurface>,
    users: Arc<UserStore>,
    outcomes: mpsc::UnboundedSender<ExecutionOutcome>,
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(
        surface: Arc<dyn ControlSurface>,
        users: Arc<UserStore>,
        outcomes: mpsc::UnboundedSender<ExecutionOutcome>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            surface,
            users,
            outcomes,
            settings,
        }
    }

    /// Spawn the consumer loop. It exits when the queue closes, or —
    /// after the shutdown signal — once remaining items are drained or
    /// the grace period runs out.
    pub fn spawn(
        self,
        queue: QueueConsumer,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(queue, shutdown))
    }

    async fn run(self, mut queue: QueueConsumer, mut shutdown: watch::Receiver<bool>) {
        info!("executor loop started");
        loop {
            tokio::select! {
                item = queue.dequeue() => match item {
                    Some(item) => self.process(item).await,
                    None => break,
                },
                _ = shutdown.changed() => {
                    self.drain(&mut queue).await;
                    break;
                }
            }
        }
        info!("executor loop stopped");
    }

    /// Drain what is already admitted, bounded by the grace period.
    async fn drain(&self, queue: &mut QueueConsumer) {
        let deadline = Instant::now() + self.settings.shutdown_grace;
        let mut drained = 0usize;
        while let Some(item) = queue.try_dequeue() {
            if tokio::time::timeout_at(deadline, self.process(item)).await.is_err() {
                warn!(drained, "shutdown grace expired with commands still queued");
                return;
            }
            drained += 1;
        }
        info!(drained, "queue drained for shutdown");
    }

    async fn process(&self, item: QueueItem) {
        let command = item.command;
        let kind = command.kind.clone();
        debug!(
            command = command.name,
            user_id = %command.issuer.user_id,
            queued_for = ?item.enqueued_at.elapsed(),
            "executing command"
        );

        let budget = self.time_budget(&kind);
        let result = match tokio::time::timeout(budget, self.invoke(&kind)).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::Timeout(budget)),
        };

        let (status, message) = match result {
            Ok(()) => (OutcomeStatus::Succeeded, ack_message(&kind)),
            Err(SurfaceError::NotRunning) if !kind.is_power() => {
                self.recover_and_retry(&kind).await
            }
            Err(err) => {
                error!(command = command.name, error = %err, "command failed");
                (
                    OutcomeStatus::FailedFatal,
                    format!("❌ !{} failed: {err}", command.name),
                )
            }
        };

        if status == OutcomeStatus::Succeeded {
            self.users.record_success(
                &command.issuer.user_id,
                &command.issuer.display_name,
                self.settings.points_per_command,
            );
        }

        let _ = self.outcomes.send(ExecutionOutcome {
            command,
            status,
            message,
        });
    }

    /// The VM was down for a non-power command: start it and retry the
    /// operation exactly once.
    async fn recover_and_retry(&self, kind: &CommandKind) -> (OutcomeStatus, String) {
        warn!("VM not running, attempting automatic start");

        if let Err(err) = self.surface.start().await {
            error!(error = %err, "automatic VM start failed");
            return (
                OutcomeStatus::FailedRecoverable,
                format!("❌ VM is down and could not be started: {err}"),
            );
        }

        let budget = self.time_budget(kind);
        let retry = match tokio::time::timeout(budget, self.invoke(kind)).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::Timeout(budget)),
        };

        match retry {
            Ok(()) => {
                info!("command retry after VM start succeeded");
                (
                    OutcomeStatus::Succeeded,
                    format!("{} (VM was down; started it first)", ack_message(kind)),
                )
            }
            Err(err) => {
                error!(error = %err, "command retry after VM start failed");
                (
                    OutcomeStatus::FailedRecoverable,
                    format!("❌ Started the VM, but the retry failed: {err}"),
                )
            }
        }
    }

    /// Map a command to its control surface operation.
    async fn invoke(&self, kind: &CommandKind) -> SurfaceResult<()> {
        match kind {
            CommandKind::MouseMove { dx, dy } => self.surface.mouse_move(*dx, *dy).await,
            CommandKind::MouseAbs { x, y } => self.surface.mouse_abs(*x, *y).await,
            CommandKind::Click { button } => self.surface.click(*button).await,
            CommandKind::Drag { dx, dy, button } => self.surface.drag(*dx, *dy, *button).await,
            CommandKind::Scroll { amount } => self.surface.scroll(*amount).await,
            CommandKind::TypeText { text } => self.surface.type_text(text).await,
            CommandKind::SendText { text } => {
                self.surface.type_text(text).await?;
                self.surface
                    .key_press("enter", Duration::from_millis(100))
                    .await
            }
            CommandKind::KeyPress { name, hold } => self.surface.key_press(name, *hold).await,
            CommandKind::KeyCombo { names } => self.surface.key_combo(names).await,
            CommandKind::KeyDown { name } => self.surface.key_down(name).await,
            CommandKind::KeyUp { name } => self.surface.key_up(name).await,
            CommandKind::Wait { duration } => self.surface.wait(*duration).await,
            CommandKind::PowerCycle { force: false } => {
                self.surface.power_off().await?;
                self.surface.wait(GRACEFUL_RESTART_DELAY).await?;
                self.surface.start().await
            }
            // A hard reset is power-off plus restart in one transition.
            CommandKind::PowerCycle { force: true } => self.surface.force_reset().await,
            CommandKind::StartVm => self.surface.start().await,
            CommandKind::Reset => self.surface.force_reset().await,
            CommandKind::Revert => self.surface.revert_to_baseline().await,
            other => {
                // Queries and moderation are answered by the dispatcher
                // and never admitted; seeing one here is a wiring bug,
                // but it must not kill the loop.
                warn!(?other, "non-actuator command reached the executor");
                Ok(())
            }
        }
    }

    /// Whole-item time budget: the per-call bound plus whatever the
    /// command legitimately spends sleeping.
    fn time_budget(&self, kind: &CommandKind) -> Duration {
        let base = self.settings.surface_timeout;
        match kind {
            CommandKind::Wait { duration } => base + *duration,
            CommandKind::TypeText { text } | CommandKind::SendText { text } => {
                // Scancode fallback types character by character.
                base + Duration::from_millis(30 * text.chars().count() as u64)
            }
            CommandKind::Drag { .. } | CommandKind::KeyCombo { .. } => {
                base + Duration::from_secs(1)
            }
            CommandKind::KeyPress { hold, .. } => base + *hold,
            CommandKind::PowerCycle { .. }
            | CommandKind::StartVm
            | CommandKind::Reset
            | CommandKind::Revert => base + POWER_BUDGET,
            _ => base,
        }
    }
}

/// Issuer-facing acknowledgement for a succeeded command.
fn ack_message(kind: &CommandKind) -> String {
    match kind {
        CommandKind::MouseMove { dx, dy } => format!("🖱️ moved ({dx},{dy})"),
        CommandKind::MouseAbs { x, y } => format!("🖱️ moved to ({x},{y})"),
        CommandKind::Click { button } => format!("🖱️ {button} click"),
        CommandKind::Drag { dx, dy, .. } => format!("🖱️ dragged ({dx},{dy})"),
        CommandKind::Scroll { amount } => format!("🖱️ scrolled {amount}"),
        CommandKind::TypeText { text } => format!("⌨️ typed: {}", clip(text)),
        CommandKind::SendText { text } => format!("⌨️ sent: {}", clip(text)),
        CommandKind::KeyPress { name, .. } => format!("⌨️ key: {name}"),
        CommandKind::KeyCombo { names } => format!("⌨️ combo: {}", names.join("+")),
        CommandKind::KeyDown { name } => format!("⌨️ holding: {name}"),
        CommandKind::KeyUp { name } => format!("⌨️ released: {name}"),
        CommandKind::Wait { duration } => format!("⏱️ waited {:.1}s", duration.as_secs_f64()),
        CommandKind::PowerCycle { force: false } => "🔌 VM shut down and restarted".to_string(),
        CommandKind::PowerCycle { force: true } => "🔌 VM hard-reset".to_string(),
        CommandKind::StartVm => "✅ VM started".to_string(),
        CommandKind::Reset => "🔄 VM reset".to_string(),
        CommandKind::Revert => "⏮️ baseline snapshot restored".to_string(),
        _ => String::new(),
    }
}

/// First 30 characters, for echoing typed text back to chat.
fn clip(text: &str) -> String {
    let mut out: String = text.chars().take(30).collect();
    if text.chars().count() > 30 {
        out.push('…');
    }
    out
}
