//! End-to-end tests against a scripted in-process bridge server

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use voicebridge_client::{BridgeClient, ClientConfig, Dispatcher, InputBackend};
use voicebridge_protocol::{
    unix_time, AgentAction, ClientFrame, ClientMode, MouseButton, ServerFrame, VoiceEvent,
};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Type(String),
    Click(i32, i32),
    Move(i32, i32),
    Key(String),
    Run(String),
}

struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
}

impl RecordingBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn wait_for_calls(&self, count: usize) -> Vec<Call> {
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        loop {
            let calls = self.calls();
            if calls.len() >= count {
                return calls;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("timed out waiting for {} calls, have {:?}", count, calls);
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl InputBackend for RecordingBackend {
    fn type_text(&self, text: &str) -> voicebridge_client::Result<()> {
        self.calls.lock().unwrap().push(Call::Type(text.to_string()));
        Ok(())
    }
    fn click(&self, x: i32, y: i32, _button: MouseButton) -> voicebridge_client::Result<()> {
        self.calls.lock().unwrap().push(Call::Click(x, y));
        Ok(())
    }
    fn move_pointer(&self, x: i32, y: i32) -> voicebridge_client::Result<()> {
        self.calls.lock().unwrap().push(Call::Move(x, y));
        Ok(())
    }
    fn press_key(&self, combo: &str) -> voicebridge_client::Result<()> {
        self.calls.lock().unwrap().push(Call::Key(combo.to_string()));
        Ok(())
    }
    fn run_command(&self, command_line: &str) -> voicebridge_client::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Run(command_line.to_string()));
        Ok(())
    }
}

/// Bind a scripted server and return its client URL plus the listener.
async fn scripted_server() -> (String, TcpListener) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/bridge", listener.local_addr().unwrap());
    (url, listener)
}

fn test_config(url: String, mode: ClientMode) -> ClientConfig {
    ClientConfig {
        server_url: url,
        mode,
        auto_reconnect: true,
        reconnect_delay_secs: 1,
        max_reconnect_delay_secs: 1,
        // Keep heartbeats out of short-lived test sessions
        ping_interval_secs: 3600,
        ..ClientConfig::default()
    }
}

fn client_with_backend(
    config: ClientConfig,
    backend: Arc<RecordingBackend>,
    actions: HashMap<String, String>,
) -> Arc<BridgeClient> {
    let dispatcher = Arc::new(Dispatcher::new(
        backend,
        config.mode,
        config.max_text_len,
        actions,
    ));
    Arc::new(BridgeClient::new(config, dispatcher))
}

fn connected_frame(mode: ClientMode) -> String {
    ServerFrame::Connected {
        client_id: "test-client".to_string(),
        mode,
        server_time: unix_time(),
    }
    .to_json()
    .unwrap()
}

#[tokio::test]
async fn test_voice_result_is_typed_in_type_mode() {
    let (url, listener) = scripted_server().await;
    let backend = RecordingBackend::new();
    let client = client_with_backend(
        test_config(url, ClientMode::Type),
        backend.clone(),
        HashMap::new(),
    );

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(connected_frame(ClientMode::Type).into()))
            .await
            .unwrap();
        let frame = ServerFrame::from(VoiceEvent::new("hello from the bridge", None));
        ws.send(Message::Text(frame.to_json().unwrap().into()))
            .await
            .unwrap();
        // Hold the connection open until the client shuts down
        while let Some(Ok(_)) = ws.next().await {}
    });

    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    let calls = backend.wait_for_calls(1).await;
    assert_eq!(calls, vec![Call::Type("hello from the bridge".to_string())]);

    client.stop();
    tokio::time::timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
    server.abort();
}

#[tokio::test]
async fn test_agent_actions_are_applied_in_command_mode() {
    let (url, listener) = scripted_server().await;
    let backend = RecordingBackend::new();
    let mut actions = HashMap::new();
    actions.insert("screenshot".to_string(), "grim /tmp/shot.png".to_string());
    let client = client_with_backend(
        test_config(url, ClientMode::Command),
        backend.clone(),
        actions,
    );

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(connected_frame(ClientMode::Command).into()))
            .await
            .unwrap();
        for action in [
            AgentAction::Click {
                x: 50,
                y: 60,
                button: None,
            },
            AgentAction::Key {
                key: "ctrl+s".to_string(),
            },
            AgentAction::Execute {
                command: "screenshot".to_string(),
            },
        ] {
            let frame = ServerFrame::from(VoiceEvent::new("do it", Some(action)));
            ws.send(Message::Text(frame.to_json().unwrap().into()))
                .await
                .unwrap();
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    let calls = backend.wait_for_calls(3).await;
    assert_eq!(
        calls,
        vec![
            Call::Click(50, 60),
            Call::Key("ctrl+s".to_string()),
            Call::Run("grim /tmp/shot.png".to_string()),
        ]
    );

    client.stop();
    tokio::time::timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
    server.abort();
}

#[tokio::test]
async fn test_client_reconnects_after_server_drop() {
    let (url, listener) = scripted_server().await;
    let backend = RecordingBackend::new();
    let client = client_with_backend(
        test_config(url, ClientMode::Type),
        backend.clone(),
        HashMap::new(),
    );

    let server = tokio::spawn(async move {
        // First session: greet and hang up
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(connected_frame(ClientMode::Type).into()))
            .await
            .unwrap();
        drop(ws);

        // Second session proves the client dialed again
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(connected_frame(ClientMode::Type).into()))
            .await
            .unwrap();
        let frame = ServerFrame::from(VoiceEvent::new("after reconnect", None));
        ws.send(Message::Text(frame.to_json().unwrap().into()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };

    let calls = backend.wait_for_calls(1).await;
    assert_eq!(calls, vec![Call::Type("after reconnect".to_string())]);

    client.stop();
    tokio::time::timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
    server.abort();
}

#[tokio::test]
async fn test_mode_change_request_reaches_server_and_ack_applies() {
    let (url, listener) = scripted_server().await;
    let backend = RecordingBackend::new();
    let client = client_with_backend(
        test_config(url, ClientMode::Type),
        backend.clone(),
        HashMap::new(),
    );

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(connected_frame(ClientMode::Type).into()))
            .await
            .unwrap();

        // Expect the mode_change request, then ack it
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let frame: ClientFrame = serde_json::from_str(text.as_str()).unwrap();
                    if let ClientFrame::ModeChange { mode } = frame {
                        assert_eq!(mode, "command");
                        let ack = ServerFrame::ModeChanged {
                            new_mode: ClientMode::Command,
                            timestamp: unix_time(),
                        };
                        ws.send(Message::Text(ack.to_json().unwrap().into()))
                            .await
                            .unwrap();
                        break;
                    }
                }
                Some(Ok(_)) => continue,
                _ => panic!("client hung up before mode_change"),
            }
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let runner = {
        let client = client.clone();
        tokio::spawn(async move { client.run().await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;

    client.change_mode(ClientMode::Command).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // A plain transcription no longer types anything in command mode
    assert!(backend.calls().is_empty());

    client.stop();
    tokio::time::timeout(TIMEOUT, runner).await.unwrap().unwrap().unwrap();
    server.abort();
}
