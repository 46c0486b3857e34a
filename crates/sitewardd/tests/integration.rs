//! Integration tests for sitewardd
//!
//! These exercise the engine against a real SQLite store, and the IPC
//! protocol over a real Unix socket.

use chrono::{DateTime, Local, TimeZone};
use siteward_api::{
    Command, Decision, DenyReason, Event, EventPayload, Response, ResponsePayload, ResponseResult,
    SessionKind,
};
use siteward_config::{Policy, default_policy, parse_config};
use siteward_core::{NullAlarmClock, RecordingAlarmClock, WardEngine};
use siteward_ipc::{IpcClient, IpcServer, ServerMessage};
use siteward_store::{PersistedState, SessionRecord, SqliteStore, Store};
use siteward_util::{DayKey, SessionKey};
use std::sync::Arc;
use std::time::Duration;

// Monday 2026-03-02
fn monday(h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
}

fn test_policy() -> Policy {
    default_policy().unwrap()
}

fn make_engine(now: DateTime<Local>) -> WardEngine {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    WardEngine::bootstrap(test_policy(), store, Arc::new(NullAlarmClock), now).unwrap()
}

#[test]
fn unmatched_hosts_are_allowed_unconditionally() {
    let mut engine = make_engine(monday(10, 0));

    for host in ["example.org", "localhost", "a.b.c.d.example.net"] {
        let decision = engine.check_access(host, monday(10, 0));
        assert_eq!(decision, Decision::unconditional(), "host {}", host);
    }
}

#[test]
fn domain_matching_resolves_subdomains_not_lookalikes() {
    let mut engine = make_engine(monday(10, 0));

    assert!(matches!(
        engine.check_access("reddit.com", monday(10, 0)),
        Decision::Denied {
            reason: DenyReason::AlwaysBlocked { .. },
            ..
        }
    ));
    assert!(matches!(
        engine.check_access("www.reddit.com", monday(10, 0)),
        Decision::Denied { .. }
    ));
    assert_eq!(
        engine.check_access("evilreddit.com", monday(10, 0)),
        Decision::unconditional()
    );
}

#[test]
fn start_session_twice_keeps_one_entry_with_later_expiry() {
    let mut engine = make_engine(monday(10, 0));

    let first = engine
        .start_session(
            "reddit.com",
            SessionKind::Grace,
            Some(Duration::from_secs(300)),
            monday(10, 0),
        )
        .unwrap();
    let second = engine
        .start_session(
            "reddit.com",
            SessionKind::Grace,
            Some(Duration::from_secs(300)),
            monday(10, 3),
        )
        .unwrap();

    assert_eq!(first.key, second.key);
    assert_eq!(second.expires_at, monday(10, 8));

    // The later expiry governs
    assert!(engine.is_active(&second.key, monday(10, 7)));
    assert!(!engine.is_active(&second.key, monday(10, 8)));
}

#[test]
fn quota_policy_grants_three_then_denies_with_reset_time() {
    let mut engine = make_engine(monday(9, 0));
    let host = "news.ycombinator.com";

    // Visits at 9:00, 9:15, 9:30; each visit session (10 min) has lapsed
    // before the next check
    for i in 0..3 {
        match engine.check_access(host, monday(9, i * 15)) {
            Decision::Allowed { remaining, .. } => {
                assert_eq!(remaining, Some(Duration::from_secs(600)))
            }
            other => panic!("Visit {} should auto-grant, got {:?}", i + 1, other),
        }
    }

    // Fourth within the 3h window: denied until the 9:00 visit frees
    match engine.check_access(host, monday(10, 0)) {
        Decision::Denied {
            reason: DenyReason::VisitQuotaExhausted { retry_at, .. },
            ..
        } => assert_eq!(retry_at, monday(12, 0)),
        other => panic!("Fourth visit should be denied, got {:?}", other),
    }
}

#[test]
fn work_hours_allowance_runs_down_and_denies() {
    let mut engine = make_engine(monday(9, 0));

    // First access during work hours anchors the allowance
    match engine.check_access("youtube.com", monday(10, 0)) {
        Decision::Allowed {
            allowance_remaining,
            ..
        } => assert_eq!(allowance_remaining, Some(Duration::from_secs(3600))),
        other => panic!("Expected first-access allow, got {:?}", other),
    }

    // 30 minutes later: about half left
    match engine.check_access("youtube.com", monday(10, 30)) {
        Decision::Allowed {
            allowance_remaining,
            ..
        } => assert_eq!(allowance_remaining, Some(Duration::from_secs(1800))),
        other => panic!("Expected allow, got {:?}", other),
    }

    // 90 minutes later: exhausted
    assert!(matches!(
        engine.check_access("youtube.com", monday(11, 30)),
        Decision::Denied {
            reason: DenyReason::AllowanceExhausted { .. },
            ..
        }
    ));
}

#[test]
fn usage_reports_accumulate_into_one_view() {
    let mut engine = make_engine(monday(10, 0));

    for offset in [0, 20, 40] {
        engine
            .record_usage(
                "reddit.com",
                5,
                monday(10, 0) + chrono::Duration::seconds(offset),
            )
            .unwrap();
    }

    let (_, usage) = engine.usage_for(None).unwrap();
    let record = &usage["reddit.com"];
    assert_eq!(record.time_ms, 15_000);
    assert_eq!(record.views, 1);
}

#[test]
fn day_rollover_archives_and_resets() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let mut engine = WardEngine::bootstrap(
        test_policy(),
        store.clone(),
        Arc::new(NullAlarmClock),
        monday(10, 0),
    )
    .unwrap();
    let day_d = DayKey::for_datetime(monday(10, 0));

    engine.check_access("youtube.com", monday(10, 0));
    engine.record_usage("youtube.com", 60, monday(10, 0)).unwrap();

    // Midnight passes
    let day_d1 = Local.with_ymd_and_hms(2026, 3, 3, 0, 0, 30).unwrap();
    engine.tick(day_d1);

    // Day D usage is archived, queryable, and unchanged
    let (_, archived) = engine.usage_for(Some(day_d)).unwrap();
    assert_eq!(archived["youtube.com"].time_ms, 60_000);

    // Day D+1 counters start empty: a fresh first access gets the full
    // allowance again
    let tuesday = Local.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap();
    match engine.check_access("youtube.com", tuesday) {
        Decision::Allowed {
            allowance_remaining,
            ..
        } => assert_eq!(allowance_remaining, Some(Duration::from_secs(3600))),
        other => panic!("Expected fresh allowance, got {:?}", other),
    }
}

#[test]
fn crash_recovery_drops_expired_sessions_on_load() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let now = monday(10, 0);

    let mut state = PersistedState::empty(now);
    state.sessions.insert(
        SessionKey::for_host("reddit.com"),
        SessionRecord {
            kind: SessionKind::Grace,
            started_at: monday(9, 0),
            expires_at: monday(9, 5),
        },
    );
    store.save_state(&state).unwrap();

    let engine =
        WardEngine::bootstrap(test_policy(), store.clone(), Arc::new(NullAlarmClock), now).unwrap();
    assert!(!engine.is_active(&SessionKey::for_host("reddit.com"), now));

    // The sweep was persisted, not just hidden
    let reloaded = store.load_state().unwrap().unwrap();
    assert!(reloaded.state.sessions.is_empty());
}

#[test]
fn restart_mid_day_preserves_counters() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());

    {
        let mut engine = WardEngine::bootstrap(
            test_policy(),
            store.clone(),
            Arc::new(NullAlarmClock),
            monday(10, 0),
        )
        .unwrap();
        engine.check_access("youtube.com", monday(10, 0));
        engine
            .start_session("youtube.com", SessionKind::Lunch, None, monday(12, 10))
            .unwrap();
    }

    let mut engine = WardEngine::bootstrap(
        test_policy(),
        store,
        Arc::new(NullAlarmClock),
        monday(12, 15),
    )
    .unwrap();

    // Allowance anchor survived the restart
    match engine.check_access("youtube.com", monday(13, 40)) {
        Decision::Denied {
            reason: DenyReason::AllowanceExhausted { .. },
            ..
        } => {}
        other => panic!("Expected exhausted allowance after restart, got {:?}", other),
    }
}

#[test]
fn lunch_sessions_cap_per_day() {
    let policy = parse_config(
        r#"
        config_version = 1

        [[groups]]
        id = "streaming"
        domains = ["youtube.com"]

        [groups.rule]
        type = "work_hours"
        days = "weekdays"
        start = "09:00"
        end = "17:30"
        allowance_seconds = 60

        [groups.rule.lunch]
        start = "12:00"
        end = "13:30"
        session_seconds = 600
        max_per_day = 1
        "#,
    )
    .unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let mut engine =
        WardEngine::bootstrap(policy, store, Arc::new(NullAlarmClock), monday(9, 0)).unwrap();

    // Burn the one-minute allowance
    engine.check_access("youtube.com", monday(9, 0));
    assert!(matches!(
        engine.check_access("youtube.com", monday(9, 5)),
        Decision::Denied { .. }
    ));

    // Inside the lunch window the denial offers a lunch session
    match engine.check_access("youtube.com", monday(12, 30)) {
        Decision::Denied { lunch_available, .. } => assert!(lunch_available),
        other => panic!("Expected denial offering lunch, got {:?}", other),
    }

    engine
        .start_session("youtube.com", SessionKind::Lunch, None, monday(12, 30))
        .unwrap();

    // The grant allows access while live
    assert!(matches!(
        engine.check_access("youtube.com", monday(12, 35)),
        Decision::Allowed { .. }
    ));

    // After it lapses, the cap is consumed: no further lunch today
    match engine.check_access("youtube.com", monday(12, 50)) {
        Decision::Denied { lunch_available, .. } => assert!(!lunch_available),
        other => panic!("Expected denial without lunch, got {:?}", other),
    }
}

#[test]
fn bootstrap_schedules_rollover_and_session_alarms() {
    let store: Arc<dyn Store> = Arc::new(SqliteStore::in_memory().unwrap());
    let now = monday(10, 0);

    let mut state = PersistedState::empty(now);
    state.sessions.insert(
        SessionKey::for_host("reddit.com"),
        SessionRecord {
            kind: SessionKind::Grace,
            started_at: monday(9, 58),
            expires_at: monday(10, 3),
        },
    );
    store.save_state(&state).unwrap();

    let alarms = Arc::new(RecordingAlarmClock::new());
    let _engine = WardEngine::bootstrap(test_policy(), store, alarms.clone(), now).unwrap();

    let scheduled = alarms.scheduled();
    assert!(scheduled.iter().any(|(kind, at)| {
        matches!(kind, siteward_core::AlarmKind::SessionExpiry(_)) && *at == monday(10, 3)
    }));
    assert!(
        scheduled
            .iter()
            .any(|(kind, _)| matches!(kind, siteward_core::AlarmKind::Rollover))
    );
}

// --- IPC round-trip over a real socket ---

async fn spawn_test_daemon(
    socket_path: &std::path::Path,
) -> (Arc<IpcServer>, Arc<tokio::sync::Mutex<WardEngine>>) {
    let engine = Arc::new(tokio::sync::Mutex::new(make_engine(siteward_util::now())));

    let mut server = IpcServer::new(socket_path);
    server.start().await.unwrap();
    let server = Arc::new(server);

    let mut rx = server.take_message_receiver().await.unwrap();

    let accept = server.clone();
    tokio::spawn(async move {
        let _ = accept.run().await;
    });

    let dispatch_server = server.clone();
    let dispatch_engine = engine.clone();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let ServerMessage::Request { client_id, request } = msg {
                let now = siteward_util::now();
                let response = match request.command {
                    Command::CheckAccess { host } => {
                        let decision = dispatch_engine.lock().await.check_access(&host, now);
                        Response::success(
                            request.request_id,
                            ResponsePayload::Decision(decision),
                        )
                    }
                    Command::GetHealth => {
                        let health = dispatch_engine.lock().await.health();
                        Response::success(request.request_id, ResponsePayload::Health(health))
                    }
                    Command::SubscribeEvents => Response::success(
                        request.request_id,
                        ResponsePayload::Subscribed {
                            client_id: client_id.clone(),
                        },
                    ),
                    Command::Ping => {
                        Response::success(request.request_id, ResponsePayload::Pong)
                    }
                    _ => Response::success(request.request_id, ResponsePayload::Pong),
                };
                let _ = dispatch_server.send_response(&client_id, response).await;
            }
        }
    });

    (server, engine)
}

#[tokio::test]
async fn check_access_round_trips_over_the_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("sitewardd.sock");
    let (_server, _engine) = spawn_test_daemon(&socket_path).await;

    let mut client = IpcClient::connect(&socket_path).await.unwrap();

    // Unrestricted host
    let response = client
        .send(Command::CheckAccess {
            host: "example.org".into(),
        })
        .await
        .unwrap();
    match response.result {
        ResponseResult::Ok(ResponsePayload::Decision(decision)) => {
            assert_eq!(decision, Decision::unconditional())
        }
        other => panic!("Expected decision payload, got {:?}", other),
    }

    // Blocked host
    let response = client
        .send(Command::CheckAccess {
            host: "reddit.com".into(),
        })
        .await
        .unwrap();
    match response.result {
        ResponseResult::Ok(ResponsePayload::Decision(Decision::Denied { .. })) => {}
        other => panic!("Expected denial, got {:?}", other),
    }

    // Health reflects a ready, healthy store
    let response = client.send(Command::GetHealth).await.unwrap();
    match response.result {
        ResponseResult::Ok(ResponsePayload::Health(health)) => {
            assert!(health.ready);
            assert!(health.store_ok);
            assert!(!health.store_degraded);
        }
        other => panic!("Expected health payload, got {:?}", other),
    }
}

#[tokio::test]
async fn subscribed_clients_receive_expiry_broadcasts() {
    let dir = tempfile::tempdir().unwrap();
    let socket_path = dir.path().join("sitewardd.sock");
    let (server, _engine) = spawn_test_daemon(&socket_path).await;

    let client = IpcClient::connect(&socket_path).await.unwrap();
    let mut events = client.subscribe().await.unwrap();

    server.broadcast_event(Event::new(EventPayload::SessionExpired {
        key: SessionKey::for_host("reddit.com"),
        kind: SessionKind::Grace,
        hosts: vec!["reddit.com".into()],
    }));

    let event = tokio::time::timeout(std::time::Duration::from_secs(2), events.next())
        .await
        .expect("event should arrive")
        .unwrap();

    match event.payload {
        EventPayload::SessionExpired { hosts, .. } => {
            assert_eq!(hosts, vec!["reddit.com".to_string()])
        }
        other => panic!("Expected expiry event, got {:?}", other),
    }
}
