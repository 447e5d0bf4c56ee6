//! Test doubles: an in-memory REST backend and a local push server.

use crate::api::{PcvApi, ScrapeTarget};
use crate::error::ApiError;
use crate::types::{ActiveGrant, Code, EditorSnapshot, GrantKey, Keyed, ResourceKind, Uid, VipPackage};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub fn package(name: &str, priority: i64) -> VipPackage {
    VipPackage {
        name: name.to_string(),
        display_name: String::new(),
        group: "vip".to_string(),
        priority,
        duration: 0,
        created_at: 0,
    }
}

pub fn grant(player: &str, package: &str, duration: i64) -> ActiveGrant {
    ActiveGrant {
        player_unique_id: format!("uuid-{player}"),
        player_name: player.to_string(),
        package_name: package.to_string(),
        duration,
    }
}

/// A REST call observed by [`MockApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status,
    Snapshot,
    Fetch(ResourceKind),
    Scrape(ScrapeTarget),
    SavePackage(String),
    SaveGrant(GrantKey),
    SaveCode(String),
    Delete(ResourceKind, String),
}

#[derive(Debug, Default)]
struct Backend {
    session_live: bool,
    packages: Vec<VipPackage>,
    grants: Vec<ActiveGrant>,
    codes: Vec<Code>,
    next_code: u32,
    fail_next: Option<(u16, String)>,
    calls: Vec<Call>,
}

fn upsert<T: Keyed>(items: &mut Vec<T>, item: T) {
    let key = item.key();
    match items.iter_mut().find(|existing| existing.key() == key) {
        Some(existing) => *existing = item,
        None => items.push(item),
    }
}

/// Backend that applies accepted mutations to its own copy of the data, so a
/// later re-fetch returns the new state.
#[derive(Debug)]
pub struct MockApi {
    backend: Mutex<Backend>,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            backend: Mutex::new(Backend {
                session_live: true,
                ..Backend::default()
            }),
        }
    }

    pub fn with_data(packages: Vec<VipPackage>, grants: Vec<ActiveGrant>) -> Self {
        let api = Self::new();
        {
            let mut backend = api.backend.lock().unwrap();
            backend.packages = packages;
            backend.grants = grants;
        }
        api
    }

    pub fn end_session(&self) {
        self.backend.lock().unwrap().session_live = false;
    }

    pub fn set_codes(&self, codes: Vec<Code>) {
        self.backend.lock().unwrap().codes = codes;
    }

    /// The next call answers with `status`.
    pub fn fail_next(&self, status: u16, message: &str) {
        self.backend.lock().unwrap().fail_next = Some((status, message.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.backend.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) -> Result<std::sync::MutexGuard<'_, Backend>, ApiError> {
        let mut backend = self.backend.lock().unwrap();
        backend.calls.push(call);
        match backend.fail_next.take() {
            Some((status, message)) => Err(ApiError::Status { status, message }),
            None => Ok(backend),
        }
    }
}

impl Default for MockApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PcvApi for MockApi {
    async fn session_status(&self, _uid: &Uid) -> Result<(), ApiError> {
        let backend = self.record(Call::Status)?;
        if backend.session_live {
            Ok(())
        } else {
            Err(ApiError::Status { status: 404, message: "session not found".into() })
        }
    }

    async fn fetch_snapshot(&self, _uid: &Uid) -> Result<EditorSnapshot, ApiError> {
        let backend = self.record(Call::Snapshot)?;
        Ok(EditorSnapshot {
            vip_packages: backend.packages.clone(),
            active_packages: backend.grants.clone(),
        })
    }

    async fn fetch_packages(&self, _uid: &Uid) -> Result<Vec<VipPackage>, ApiError> {
        Ok(self.record(Call::Fetch(ResourceKind::Packages))?.packages.clone())
    }

    async fn fetch_grants(&self, _uid: &Uid) -> Result<Vec<ActiveGrant>, ApiError> {
        Ok(self.record(Call::Fetch(ResourceKind::Grants))?.grants.clone())
    }

    async fn fetch_codes(&self, _uid: &Uid) -> Result<Vec<Code>, ApiError> {
        Ok(self.record(Call::Fetch(ResourceKind::Codes))?.codes.clone())
    }

    async fn request_scrape(&self, _uid: &Uid, target: ScrapeTarget) -> Result<(), ApiError> {
        self.record(Call::Scrape(target)).map(drop)
    }

    async fn save_package(&self, _uid: &Uid, package: &VipPackage) -> Result<(), ApiError> {
        let mut backend = self.record(Call::SavePackage(package.name.clone()))?;
        upsert(&mut backend.packages, package.clone());
        Ok(())
    }

    async fn save_grant(&self, _uid: &Uid, grant: &ActiveGrant) -> Result<(), ApiError> {
        let mut backend = self.record(Call::SaveGrant(grant.key()))?;
        upsert(&mut backend.grants, grant.clone());
        Ok(())
    }

    async fn save_code(&self, _uid: &Uid, code: &Code) -> Result<(), ApiError> {
        let mut backend = self.record(Call::SaveCode(code.code.clone()))?;
        let mut code = code.clone();
        if code.is_placeholder() {
            backend.next_code += 1;
            code.code = format!("GEN-{}", backend.next_code);
        }
        upsert(&mut backend.codes, code);
        Ok(())
    }

    async fn delete(&self, _uid: &Uid, kind: ResourceKind, key: &str) -> Result<(), ApiError> {
        let mut backend = self.record(Call::Delete(kind, key.to_string()))?;
        match kind {
            ResourceKind::Packages => backend.packages.retain(|p| p.name != key),
            ResourceKind::Grants => backend.grants.retain(|g| g.key().to_path_key() != key),
            ResourceKind::Codes => backend.codes.retain(|c| c.code != key),
        }
        Ok(())
    }
}

enum ServerCommand {
    Send(String),
    Close,
}

/// WebSocket server on localhost that forwards scripted frames to whichever
/// client is connected.
pub struct PushServer {
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<ServerCommand>,
}

impl PushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (commands, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut socket) = accept_async(stream).await else {
                    continue;
                };
                loop {
                    tokio::select! {
                        command = rx.recv() => match command {
                            Some(ServerCommand::Send(text)) => {
                                if socket.send(Message::text(text)).await.is_err() {
                                    break;
                                }
                            }
                            Some(ServerCommand::Close) | None => {
                                let _ = socket.close(None).await;
                                break;
                            }
                        },
                        incoming = socket.next() => match incoming {
                            Some(Ok(_)) => {}
                            _ => break,
                        },
                    }
                }
            }
        });

        Self { addr, commands }
    }

    /// Socket URL template for [`crate::config::SyncConfig::websocket_url`].
    pub fn url_template(&self) -> String {
        format!("ws://{}/v1/pcv/ws/{{uid}}", self.addr)
    }

    pub fn push(&self, event_type: &str) {
        let _ = self
            .commands
            .send(ServerCommand::Send(format!(r#"{{"type":"{event_type}"}}"#)));
    }

    pub fn push_raw(&self, frame: &str) {
        let _ = self.commands.send(ServerCommand::Send(frame.to_string()));
    }

    /// Closes the current connection with a close frame.
    pub fn close(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }
}
