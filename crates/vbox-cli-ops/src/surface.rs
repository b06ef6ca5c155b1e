//! `ControlSurface` implementation over VBoxManage.

use crate::keymap::{ascii_scancode, scancodes_for, shifted_base};
use crate::runner::VboxCommandRunner;
use async_trait::async_trait;
use crowdvm_core::{ControlSurface, MouseButton, SurfaceError, SurfaceResult, VmConfig};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Guest pointer coordinate ceiling (VirtualBox absolute device range).
const POINTER_MAX: i32 = 32767;

/// Hold between button press and release events.
const CLICK_HOLD: Duration = Duration::from_millis(50);

/// Pause between scancode-typed characters.
const TYPE_CHAR_DELAY: Duration = Duration::from_millis(20);

/// Pause between keys of a combo.
const COMBO_KEY_DELAY: Duration = Duration::from_millis(50);

/// Maximum intermediate steps for a drag gesture.
const MAX_DRAG_STEPS: i32 = 16;

/// VM start is slow; it gets its own budget.
const START_TIMEOUT: Duration = Duration::from_secs(30);

/// Snapshot restore budget.
const RESTORE_TIMEOUT: Duration = Duration::from_secs(60);

/// Settle time after a start before accepting the VM as up.
const START_SETTLE: Duration = Duration::from_secs(2);

/// Settle time after a hard power-off before restoring a snapshot.
const POWEROFF_SETTLE: Duration = Duration::from_secs(3);

fn button_code(button: MouseButton) -> &'static str {
    match button {
        MouseButton::Left => "1",
        MouseButton::Right => "2",
        MouseButton::Middle => "4",
    }
}

/// Parse `VMState="..."` out of `showvminfo --machinereadable` output.
fn parse_vm_state(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("VMState="))
        .map(|value| value.trim().trim_matches('"'))
}

#[derive(Debug, Default)]
struct Pointer {
    x: i32,
    y: i32,
}

/// The VirtualBox control surface.
pub struct VboxSurface {
    vm_name: String,
    snapshot_name: String,
    runner: VboxCommandRunner,
    /// Host-tracked pointer position; VBoxManage only accepts absolute
    /// moves, so relative motion is accumulated here.
    pointer: Mutex<Pointer>,
}

impl VboxSurface {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            vm_name: config.vm_name.clone(),
            snapshot_name: config.snapshot_name.clone(),
            runner: VboxCommandRunner::new(
                config.vboxmanage_path.clone(),
                Duration::from_secs(config.surface_timeout_secs),
            ),
            pointer: Mutex::new(Pointer::default()),
        }
    }

    async fn state(&self) -> SurfaceResult<String> {
        let output = self
            .runner
            .run(&["showvminfo", &self.vm_name, "--machinereadable"])
            .await?;
        Ok(parse_vm_state(&output.stdout).unwrap_or("unknown").to_string())
    }

    async fn controlvm(&self, args: &[&str]) -> SurfaceResult<()> {
        let mut full = vec!["controlvm", self.vm_name.as_str()];
        full.extend_from_slice(args);
        self.runner.run(&full).await?;
        Ok(())
    }

    async fn put_mouse_event(
        &self,
        dx: i32,
        dy: i32,
        wheel: i32,
        buttons: &str,
    ) -> SurfaceResult<()> {
        let dx = dx.to_string();
        let dy = dy.to_string();
        let wheel = wheel.to_string();
        self.controlvm(&["putmouseevent", &dx, &dy, &wheel, "0", buttons])
            .await
    }

    async fn put_scancodes(&self, codes: &str) -> SurfaceResult<()> {
        let mut args = vec!["controlvm", self.vm_name.as_str(), "keyboardputscancode"];
        args.extend(codes.split_whitespace());
        self.runner.run(&args).await?;
        Ok(())
    }

    /// Character-by-character scancode typing, used when
    /// `keyboardputstring` is unavailable or fails.
    async fn type_scancodes(&self, text: &str) -> SurfaceResult<()> {
        for c in text.chars() {
            let sequence = if let Some(base) = shifted_base(c) {
                let Some(code) = ascii_scancode(base) else {
                    continue;
                };
                format!("2a {code:02x} {:02x} aa", code | 0x80)
            } else if let Some(code) = ascii_scancode(c.to_ascii_lowercase()) {
                format!("{code:02x} {:02x}", code | 0x80)
            } else {
                // Untypeable on a US layout; skip rather than fail the
                // whole string.
                continue;
            };
            self.put_scancodes(&sequence).await?;
            tokio::time::sleep(TYPE_CHAR_DELAY).await;
        }
        Ok(())
    }
}

#[async_trait]
impl ControlSurface for VboxSurface {
    async fn mouse_move(&self, dx: i32, dy: i32) -> SurfaceResult<()> {
        let mut pointer = self.pointer.lock().await;
        pointer.x = (pointer.x + dx).clamp(0, POINTER_MAX);
        pointer.y = (pointer.y + dy).clamp(0, POINTER_MAX);
        let x = pointer.x.to_string();
        let y = pointer.y.to_string();
        self.controlvm(&["mousemove", &x, &y]).await
    }

    async fn mouse_abs(&self, x: i32, y: i32) -> SurfaceResult<()> {
        let mut pointer = self.pointer.lock().await;
        pointer.x = x.clamp(0, POINTER_MAX);
        pointer.y = y.clamp(0, POINTER_MAX);
        let x = pointer.x.to_string();
        let y = pointer.y.to_string();
        self.controlvm(&["mousemove", &x, &y]).await
    }

    async fn click(&self, button: MouseButton) -> SurfaceResult<()> {
        self.put_mouse_event(0, 0, 0, button_code(button)).await?;
        tokio::time::sleep(CLICK_HOLD).await;
        self.put_mouse_event(0, 0, 0, "0").await
    }

    async fn drag(&self, dx: i32, dy: i32, button: MouseButton) -> SurfaceResult<()> {
        let code = button_code(button);
        self.put_mouse_event(0, 0, 0, code).await?;
        tokio::time::sleep(CLICK_HOLD).await;

        let steps = dx.abs().max(dy.abs()).clamp(1, MAX_DRAG_STEPS);
        let (step_x, step_y) = (dx / steps, dy / steps);
        for _ in 0..steps {
            self.put_mouse_event(step_x, step_y, 0, code).await?;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Whatever integer division dropped, in one final move.
        let (rem_x, rem_y) = (dx - step_x * steps, dy - step_y * steps);
        if rem_x != 0 || rem_y != 0 {
            self.put_mouse_event(rem_x, rem_y, 0, code).await?;
        }

        self.put_mouse_event(0, 0, 0, "0").await
    }

    async fn scroll(&self, amount: i32) -> SurfaceResult<()> {
        self.put_mouse_event(0, 0, amount, "0").await
    }

    async fn type_text(&self, text: &str) -> SurfaceResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        match self
            .controlvm(&["keyboardputstring", text])
            .await
        {
            Ok(()) => Ok(()),
            Err(SurfaceError::Command(reason)) => {
                warn!(%reason, "keyboardputstring failed, falling back to scancodes");
                self.type_scancodes(text).await
            }
            Err(other) => Err(other),
        }
    }

    async fn key_press(&self, name: &str, hold: Duration) -> SurfaceResult<()> {
        let (press, release) =
            scancodes_for(name).ok_or_else(|| SurfaceError::UnknownKey(name.to_string()))?;
        self.put_scancodes(press).await?;
        tokio::time::sleep(hold).await;
        self.put_scancodes(release).await
    }

    async fn key_combo(&self, names: &[String]) -> SurfaceResult<()> {
        for name in names {
            self.key_down(name).await?;
            tokio::time::sleep(COMBO_KEY_DELAY).await;
        }
        tokio::time::sleep(CLICK_HOLD).await;
        for name in names.iter().rev() {
            self.key_up(name).await?;
            tokio::time::sleep(COMBO_KEY_DELAY).await;
        }
        Ok(())
    }

    async fn key_down(&self, name: &str) -> SurfaceResult<()> {
        let (press, _) =
            scancodes_for(name).ok_or_else(|| SurfaceError::UnknownKey(name.to_string()))?;
        self.put_scancodes(press).await
    }

    async fn key_up(&self, name: &str) -> SurfaceResult<()> {
        let (_, release) =
            scancodes_for(name).ok_or_else(|| SurfaceError::UnknownKey(name.to_string()))?;
        self.put_scancodes(release).await
    }

    async fn wait(&self, duration: Duration) -> SurfaceResult<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn query_running(&self) -> SurfaceResult<bool> {
        Ok(self.state().await? == "running")
    }

    async fn start(&self) -> SurfaceResult<()> {
        if self.state().await? == "running" {
            debug!(vm = %self.vm_name, "start requested but VM already running");
            return Ok(());
        }
        self.runner
            .run_with_timeout(
                &["startvm", &self.vm_name, "--type", "headless"],
                START_TIMEOUT,
            )
            .await?;
        info!(vm = %self.vm_name, "VM started (headless)");
        tokio::time::sleep(START_SETTLE).await;
        Ok(())
    }

    async fn power_off(&self) -> SurfaceResult<()> {
        self.controlvm(&["acpipowerbutton"]).await?;
        info!(vm = %self.vm_name, "ACPI power button sent");
        Ok(())
    }

    async fn force_reset(&self) -> SurfaceResult<()> {
        self.controlvm(&["reset"]).await?;
        info!(vm = %self.vm_name, "hard reset sent");
        Ok(())
    }

    async fn revert_to_baseline(&self) -> SurfaceResult<()> {
        if self.state().await? == "running" {
            self.controlvm(&["poweroff"]).await?;
            tokio::time::sleep(POWEROFF_SETTLE).await;
        }

        info!(vm = %self.vm_name, snapshot = %self.snapshot_name, "restoring baseline snapshot");
        self.runner
            .run_with_timeout(
                &["snapshot", &self.vm_name, "restore", &self.snapshot_name],
                RESTORE_TIMEOUT,
            )
            .await?;

        self.start().await
    }
}
