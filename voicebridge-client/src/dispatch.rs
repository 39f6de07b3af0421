//! Event dispatch: decide what an incoming voice event does locally
//!
//! The dispatcher owns the client-side mode and the safety rules. Injection
//! failures are logged and absorbed here; a broken clipboard tool or an
//! unbound command name must never take down the connection.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::inject::InputBackend;
use voicebridge_protocol::{AgentAction, ClientMode};

/// Routes incoming voice events to the input backend according to mode
pub struct Dispatcher {
    backend: Arc<dyn InputBackend>,
    mode: RwLock<ClientMode>,
    max_text_len: usize,
    actions: HashMap<String, String>,
}

impl Dispatcher {
    pub fn new(
        backend: Arc<dyn InputBackend>,
        mode: ClientMode,
        max_text_len: usize,
        actions: HashMap<String, String>,
    ) -> Self {
        Self {
            backend,
            mode: RwLock::new(mode),
            max_text_len,
            actions,
        }
    }

    pub async fn mode(&self) -> ClientMode {
        *self.mode.read().await
    }

    pub async fn set_mode(&self, mode: ClientMode) {
        let mut current = self.mode.write().await;
        if *current != mode {
            info!("🔀 Mode changed: {} → {}", current, mode);
            *current = mode;
        }
    }

    /// Handle one voice_result frame. Never fails: every injection error is
    /// logged and swallowed so the session loop keeps reading.
    pub async fn handle_voice_result(&self, text: &str, agent_response: Option<&AgentAction>) {
        let mode = self.mode().await;

        if matches!(mode, ClientMode::Type | ClientMode::Both) {
            self.type_text_guarded(text);
        }

        if matches!(mode, ClientMode::Command | ClientMode::Both) {
            if let Some(action) = agent_response {
                self.execute_action(action);
            }
        }
    }

    fn type_text_guarded(&self, text: &str) {
        if text.is_empty() {
            debug!("Skipping empty transcription");
            return;
        }
        let char_count = text.chars().count();
        if char_count > self.max_text_len {
            warn!(
                "Skipping oversized transcription ({} chars, limit {})",
                char_count, self.max_text_len
            );
            return;
        }

        match self.backend.type_text(text) {
            Ok(()) => debug!("⌨️ Typed {} chars", text.len()),
            Err(e) => warn!("Text injection failed: {}", e),
        }
    }

    fn execute_action(&self, action: &AgentAction) {
        match action {
            AgentAction::Type { content } => {
                self.type_text_guarded(content);
            }
            AgentAction::Click { x, y, button } => {
                let button = button.unwrap_or_default();
                match self.backend.click(*x, *y, button) {
                    Ok(()) => debug!("🖱️ Clicked at ({}, {})", x, y),
                    Err(e) => warn!("Click failed: {}", e),
                }
            }
            AgentAction::Move { x, y } => match self.backend.move_pointer(*x, *y) {
                Ok(()) => debug!("🖱️ Moved pointer to ({}, {})", x, y),
                Err(e) => warn!("Pointer move failed: {}", e),
            },
            AgentAction::Key { key } => match self.backend.press_key(key) {
                Ok(()) => debug!("⌨️ Pressed {}", key),
                Err(e) => warn!("Key press failed: {}", e),
            },
            AgentAction::Execute { command } => match self.actions.get(command) {
                Some(command_line) => match self.backend.run_command(command_line) {
                    Ok(()) => info!("▶️ Ran action '{}'", command),
                    Err(e) => warn!("Action '{}' failed: {}", command, e),
                },
                None => {
                    warn!("Ignoring unbound action '{}'", command);
                }
            },
            AgentAction::Unknown => {
                warn!("Ignoring unrecognized agent action");
            }
        }
    }
}
