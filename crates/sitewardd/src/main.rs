//! sitewardd - the siteward background service
//!
//! This is the main entry point for the sitewardd service.
//! It wires together all the components:
//! - Configuration loading (policy table)
//! - Store initialization and state load (the readiness gate)
//! - Core engine
//! - Alarm facility on tokio timers
//! - IPC server

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use siteward_api::{
    Command, ErrorCode, ErrorInfo, Event, EventPayload, Response, ResponsePayload,
};
use siteward_config::{default_policy, load_config};
use siteward_core::{AlarmClock, AlarmKind, CoreEvent, WardEngine};
use siteward_ipc::{IpcServer, ServerMessage};
use siteward_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use siteward_util::{ClientId, ClientLimiter, WardError, default_config_path};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// sitewardd - time-based website access policy service
#[derive(Parser, Debug)]
#[command(name = "sitewardd")]
#[command(about = "Time-based website access policy service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/sitewardd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set SITEWARD_SOCKET env var)
    #[arg(short, long, env = "SITEWARD_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set SITEWARD_DATA_DIR env var)
    #[arg(short, long, env = "SITEWARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Alarm facility on tokio timers.
///
/// Scheduling the same kind again replaces the previous timer, which makes
/// overwritten session grants supersede their old expiry callbacks.
struct TokioAlarmClock {
    tx: mpsc::UnboundedSender<AlarmKind>,
    tasks: StdMutex<HashMap<AlarmKind, tokio::task::JoinHandle<()>>>,
}

impl TokioAlarmClock {
    fn new(tx: mpsc::UnboundedSender<AlarmKind>) -> Self {
        Self {
            tx,
            tasks: StdMutex::new(HashMap::new()),
        }
    }
}

impl AlarmClock for TokioAlarmClock {
    fn schedule(&self, alarm: AlarmKind, fire_at: DateTime<Local>) {
        let delay = siteward_util::remaining_until(fire_at, siteward_util::now());
        let tx = self.tx.clone();
        let alarm_for_task = alarm.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(alarm_for_task);
        });

        let mut tasks = self.tasks.lock().unwrap();
        if let Some(old) = tasks.insert(alarm, handle) {
            old.abort();
        }
    }

    fn cancel(&self, alarm: &AlarmKind) {
        if let Some(handle) = self.tasks.lock().unwrap().remove(alarm) {
            handle.abort();
        }
    }
}

/// Main service state
struct Service {
    engine: WardEngine,
    ipc: Arc<IpcServer>,
    store: Arc<dyn Store>,
    alarm_rx: mpsc::UnboundedReceiver<AlarmKind>,
    limiter: ClientLimiter,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // Load the policy table; the embedded defaults apply when no config
        // file has been written yet
        let policy = if args.config.exists() {
            load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?
        } else {
            warn!(
                config_path = %args.config.display(),
                "No config file, using embedded default policy"
            );
            default_policy().context("Embedded default policy failed to parse")?
        };

        info!(
            config_path = %args.config.display(),
            group_count = policy.groups.len(),
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.service.socket_path.clone());
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join("sitewardd.db");
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Store initialized");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let (alarm_tx, alarm_rx) = mpsc::unbounded_channel();
        let alarms = Arc::new(TokioAlarmClock::new(alarm_tx));

        // The readiness gate: load, migrate, and sweep state before any
        // request can be served. A corrupt state document aborts startup
        // without overwriting it.
        let now = siteward_util::now();
        let engine = WardEngine::bootstrap(policy, store.clone(), alarms, now)
            .context("Failed to load persisted state")?;

        // Only now does the socket start accepting; requests arriving during
        // bring-up queue behind the accept loop instead of re-running it
        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        info!(socket_path = %socket_path.display(), "IPC server started");

        // 30 requests per second per client
        let limiter = ClientLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            engine,
            ipc: Arc::new(ipc),
            store,
            alarm_rx,
            limiter,
        })
    }

    async fn run(self) -> Result<()> {
        let Service {
            engine,
            ipc,
            store,
            mut alarm_rx,
            limiter,
        } = self;

        let mut ipc_messages = ipc
            .take_message_receiver()
            .await
            .expect("Message receiver should be available");

        let engine = Arc::new(Mutex::new(engine));
        let limiter = Arc::new(Mutex::new(limiter));

        // Spawn IPC accept task
        let ipc_accept = ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        // The tick is the lazy-reconciliation safety net behind the alarms
        let mut tick_timer = tokio::time::interval(Duration::from_secs(1));

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                _ = tick_timer.tick() => {
                    let now = siteward_util::now();
                    let mut eng = engine.lock().await;
                    eng.tick(now);
                    Self::broadcast_events(&ipc, eng.take_events());
                }

                Some(alarm) = alarm_rx.recv() => {
                    let now = siteward_util::now();
                    debug!(alarm = ?alarm, "Alarm fired");
                    let mut eng = engine.lock().await;
                    eng.handle_alarm(alarm, now);
                    Self::broadcast_events(&ipc, eng.take_events());
                }

                Some(msg) = ipc_messages.recv() => {
                    Self::handle_ipc_message(&engine, &ipc, &limiter, msg).await;
                }
            }
        }

        // Graceful shutdown: flush pending usage and save
        info!("Shutting down sitewardd");
        {
            let mut eng = engine.lock().await;
            eng.flush(siteward_util::now());
        }

        ipc.broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn broadcast_events(ipc: &Arc<IpcServer>, events: Vec<CoreEvent>) {
        for event in events {
            ipc.broadcast_event(Event::new(to_event_payload(event)));
        }
    }

    async fn handle_ipc_message(
        engine: &Arc<Mutex<WardEngine>>,
        ipc: &Arc<IpcServer>,
        limiter: &Arc<Mutex<ClientLimiter>>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                {
                    let mut limiter = limiter.lock().await;
                    if !limiter.check(&client_id, siteward_util::now()) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = ipc.send_response(&client_id, response).await;
                        return;
                    }
                }

                let response =
                    Self::handle_command(engine, &client_id, request.request_id, request.command)
                        .await;

                let _ = ipc.send_response(&client_id, response).await;

                let events = {
                    let mut eng = engine.lock().await;
                    eng.take_events()
                };
                Self::broadcast_events(ipc, events);
            }

            ServerMessage::ClientConnected { client_id, info } => {
                debug!(client_id = %client_id, uid = ?info.uid, "Client connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let mut limiter = limiter.lock().await;
                limiter.remove_client(&client_id);
            }
        }
    }

    async fn handle_command(
        engine: &Arc<Mutex<WardEngine>>,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        let now = siteward_util::now();

        match command {
            Command::CheckAccess { host } => {
                let decision = engine.lock().await.check_access(&host, now);
                Response::success(request_id, ResponsePayload::Decision(decision))
            }

            Command::StartSession {
                host,
                kind,
                duration_secs,
            } => {
                let result = engine.lock().await.start_session(
                    &host,
                    kind,
                    duration_secs.map(Duration::from_secs),
                    now,
                );
                match result {
                    Ok(grant) => {
                        Response::success(request_id, ResponsePayload::SessionStarted(grant))
                    }
                    Err(e) => Response::error(request_id, error_info(e)),
                }
            }

            Command::RecordUsage { host, seconds } => {
                match engine.lock().await.record_usage(&host, seconds, now) {
                    Ok(()) => Response::success(request_id, ResponsePayload::UsageRecorded),
                    Err(e) => Response::error(request_id, error_info(e)),
                }
            }

            Command::RecordTempAccess { host } => {
                match engine.lock().await.record_temp_access(&host, now) {
                    Ok(count_today) => Response::success(
                        request_id,
                        ResponsePayload::TempAccessRecorded { count_today },
                    ),
                    Err(e) => Response::error(request_id, error_info(e)),
                }
            }

            Command::GetUsage { day } => match engine.lock().await.usage_for(day) {
                Ok((day, usage)) => {
                    Response::success(request_id, ResponsePayload::Usage { day, usage })
                }
                Err(e) => Response::error(request_id, error_info(e)),
            },

            Command::GetSiteInfo { host } => {
                let info = engine.lock().await.site_info(&host, now);
                Response::success(request_id, ResponsePayload::SiteInfo(info))
            }

            Command::GetHealth => {
                let health = engine.lock().await.health();
                Response::success(request_id, ResponsePayload::Health(health))
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

fn to_event_payload(event: CoreEvent) -> EventPayload {
    match event {
        CoreEvent::SessionStarted {
            key,
            kind,
            expires_at,
            hosts,
        } => EventPayload::SessionStarted {
            key,
            kind,
            expires_at,
            hosts,
        },
        CoreEvent::SessionExpired { key, kind, hosts } => {
            EventPayload::SessionExpired { key, kind, hosts }
        }
        CoreEvent::RolloverCompleted { day } => EventPayload::RolloverCompleted { day },
        CoreEvent::StoreDegraded { failures } => EventPayload::StoreDegraded { failures },
        CoreEvent::StoreRecovered => EventPayload::StoreRecovered,
    }
}

fn error_info(e: WardError) -> ErrorInfo {
    let code = match &e {
        WardError::UnrestrictedHost(_) => ErrorCode::UnrestrictedHost,
        WardError::ValidationError(_) | WardError::ConfigError(_) => ErrorCode::InvalidRequest,
        WardError::StoreError(_) => ErrorCode::StoreUnavailable,
        WardError::RateLimited => ErrorCode::RateLimited,
        WardError::NotReady => ErrorCode::NotReady,
        WardError::IpcError(_) | WardError::Internal(_) => ErrorCode::InternalError,
    };
    ErrorInfo::new(code, e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "sitewardd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
