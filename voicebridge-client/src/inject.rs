//! Cross-platform input injection for Linux (X11/Wayland)
//!
//! Shells out to the native injection tools: `xdotool` on X11, `wtype` and
//! `ydotool` on Wayland. The backend sits behind [`InputBackend`] so
//! dispatch logic can be tested against a recording fake.

use std::process::Command;

use crate::error::{ClientError, Result};
use voicebridge_protocol::MouseButton;

/// Display server type
#[derive(Debug, Clone)]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

/// Local input operations the dispatcher can perform
pub trait InputBackend: Send + Sync {
    /// Inject text as literal keystrokes into the focused application
    fn type_text(&self, text: &str) -> Result<()>;

    /// Synthesize a pointer click at absolute screen coordinates
    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()>;

    /// Move the pointer to absolute screen coordinates without clicking
    fn move_pointer(&self, x: i32, y: i32) -> Result<()>;

    /// Press a named key or combination (e.g. "Return", "ctrl+s")
    fn press_key(&self, combo: &str) -> Result<()>;

    /// Run a resolved local command line
    fn run_command(&self, command_line: &str) -> Result<()>;
}

/// Injector that works across X11 and Wayland
pub struct DesktopInjector {
    display_server: DisplayServer,
    typing_delay_ms: u64,
}

impl DesktopInjector {
    /// Create a new injector with display-server auto-detection
    pub fn new(typing_delay_ms: u64) -> Result<Self> {
        let display_server = Self::detect_display_server();

        // Verify required tools are installed
        match &display_server {
            DisplayServer::X11 => {
                require_tool("xdotool", "sudo apt install xdotool")?;
            }
            DisplayServer::Wayland => {
                require_tool("wtype", "sudo apt install wtype")?;
            }
            DisplayServer::Unknown => {
                tracing::warn!("could not detect display server, will try both backends");
            }
        }

        Ok(Self {
            display_server,
            typing_delay_ms,
        })
    }

    /// Detect the current display server
    fn detect_display_server() -> DisplayServer {
        // Check for Wayland
        if std::env::var("WAYLAND_DISPLAY").is_ok() {
            return DisplayServer::Wayland;
        }

        // Check for X11
        if std::env::var("DISPLAY").is_ok() {
            // Double-check it's not XWayland
            if std::env::var("XDG_SESSION_TYPE")
                .map(|t| t == "x11")
                .unwrap_or(false)
            {
                return DisplayServer::X11;
            }
        }

        match std::env::var("XDG_SESSION_TYPE").as_deref() {
            Ok("wayland") => DisplayServer::Wayland,
            Ok("x11") => DisplayServer::X11,
            _ => DisplayServer::Unknown,
        }
    }

    pub fn display_server(&self) -> &DisplayServer {
        &self.display_server
    }

    fn type_x11(&self, text: &str) -> Result<()> {
        run_tool(
            "type",
            Command::new("xdotool")
                .arg("type")
                .arg("--clearmodifiers")
                .arg("--delay")
                .arg(self.typing_delay_ms.to_string())
                .arg("--")
                .arg(text),
        )
    }

    fn type_wayland(&self, text: &str) -> Result<()> {
        run_tool(
            "type",
            Command::new("wtype")
                .arg("-d")
                .arg(self.typing_delay_ms.to_string())
                .arg("--")
                .arg(text),
        )
    }

    fn move_x11(&self, x: i32, y: i32) -> Result<()> {
        run_tool(
            "move",
            Command::new("xdotool")
                .arg("mousemove")
                .arg(x.to_string())
                .arg(y.to_string()),
        )
    }

    fn move_wayland(&self, x: i32, y: i32) -> Result<()> {
        run_tool(
            "move",
            Command::new("ydotool")
                .arg("mousemove")
                .arg("-a")
                .arg("-x")
                .arg(x.to_string())
                .arg("-y")
                .arg(y.to_string()),
        )
    }

    fn click_x11(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        let button_num = match button {
            MouseButton::Left => "1",
            MouseButton::Middle => "2",
            MouseButton::Right => "3",
        };
        run_tool(
            "click",
            Command::new("xdotool")
                .arg("mousemove")
                .arg(x.to_string())
                .arg(y.to_string())
                .arg("click")
                .arg(button_num),
        )
    }

    fn click_wayland(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        // ydotool button codes: 0xC0 left, 0xC1 right, 0xC2 middle
        let button_code = match button {
            MouseButton::Left => "0xC0",
            MouseButton::Right => "0xC1",
            MouseButton::Middle => "0xC2",
        };
        run_tool(
            "click",
            Command::new("ydotool")
                .arg("mousemove")
                .arg("-a")
                .arg("-x")
                .arg(x.to_string())
                .arg("-y")
                .arg(y.to_string()),
        )?;
        run_tool("click", Command::new("ydotool").arg("click").arg(button_code))
    }

    fn key_x11(&self, combo: &str) -> Result<()> {
        run_tool(
            "key",
            Command::new("xdotool")
                .arg("key")
                .arg("--clearmodifiers")
                .arg(combo),
        )
    }

    fn key_wayland(&self, combo: &str) -> Result<()> {
        // wtype has no combo syntax; hold modifiers around the final key
        let parts: Vec<&str> = combo.split('+').collect();
        let (modifiers, key) = match parts.split_last() {
            Some((key, modifiers)) => (modifiers, *key),
            None => {
                return Err(ClientError::ActionFailed {
                    action: "key".to_string(),
                    reason: "empty key combo".to_string(),
                })
            }
        };

        let mut cmd = Command::new("wtype");
        for modifier in modifiers {
            cmd.arg("-M").arg(normalize_modifier(modifier));
        }
        cmd.arg("-k").arg(key);
        for modifier in modifiers.iter().rev() {
            cmd.arg("-m").arg(normalize_modifier(modifier));
        }
        run_tool("key", &mut cmd)
    }
}

impl InputBackend for DesktopInjector {
    fn type_text(&self, text: &str) -> Result<()> {
        match self.display_server {
            DisplayServer::X11 => self.type_x11(text),
            DisplayServer::Wayland => self.type_wayland(text),
            DisplayServer::Unknown => {
                // Try both as fallback
                if self.type_wayland(text).is_ok() {
                    return Ok(());
                }
                self.type_x11(text)
            }
        }
    }

    fn click(&self, x: i32, y: i32, button: MouseButton) -> Result<()> {
        match self.display_server {
            DisplayServer::X11 => self.click_x11(x, y, button),
            DisplayServer::Wayland => self.click_wayland(x, y, button),
            DisplayServer::Unknown => {
                if self.click_wayland(x, y, button).is_ok() {
                    return Ok(());
                }
                self.click_x11(x, y, button)
            }
        }
    }

    fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        match self.display_server {
            DisplayServer::X11 => self.move_x11(x, y),
            DisplayServer::Wayland => self.move_wayland(x, y),
            DisplayServer::Unknown => {
                if self.move_wayland(x, y).is_ok() {
                    return Ok(());
                }
                self.move_x11(x, y)
            }
        }
    }

    fn press_key(&self, combo: &str) -> Result<()> {
        match self.display_server {
            DisplayServer::X11 => self.key_x11(combo),
            DisplayServer::Wayland => self.key_wayland(combo),
            DisplayServer::Unknown => {
                if self.key_wayland(combo).is_ok() {
                    return Ok(());
                }
                self.key_x11(combo)
            }
        }
    }

    fn run_command(&self, command_line: &str) -> Result<()> {
        run_tool(
            "execute",
            Command::new("sh").arg("-c").arg(command_line),
        )
    }
}

fn normalize_modifier(modifier: &str) -> &str {
    match modifier.to_lowercase().as_str() {
        "ctrl" | "control" => "ctrl",
        "alt" => "alt",
        "shift" => "shift",
        "super" | "meta" | "logo" => "logo",
        _ => modifier,
    }
}

fn require_tool(tool: &str, install_hint: &str) -> Result<()> {
    let found = Command::new("which")
        .arg(tool)
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false);
    if !found {
        return Err(ClientError::BackendUnavailable(format!(
            "{} not found. Install with: {}",
            tool, install_hint
        )));
    }
    Ok(())
}

fn run_tool(action: &str, cmd: &mut Command) -> Result<()> {
    let output = cmd.output().map_err(|e| ClientError::ActionFailed {
        action: action.to_string(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(ClientError::ActionFailed {
            action: action.to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}
