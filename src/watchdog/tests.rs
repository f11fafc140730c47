//! Property-based tests for Watchdog module
//!
//! These tests verify the correctness properties of the watchdog system.

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;
    use std::time::{Duration, Instant};

    use crate::inspector::protocol::{CallFrame, Location};
    use crate::inspector::call_frames_to_stack_frames;
    use crate::watchdog::monitor::{HealthMonitor, HealthState, MonitorConfig};

    const TICK_MS: u64 = 10;

    const CONFIG: MonitorConfig = MonitorConfig {
        poll_interval_ms: 50,
        warning_threshold_ms: 100,
        hung_threshold_ms: 200,
    };

    /// Replay heartbeat gaps on a 10ms tick grid and collect the transitions.
    /// Each heartbeat lands on a tick and is received before that tick runs.
    fn replay_gaps(gaps: &[u64]) -> Vec<(u64, HealthState)> {
        let start = Instant::now();
        let mut log = Vec::new();
        {
            let mut monitor = HealthMonitor::new(CONFIG, start, |elapsed, state| {
                log.push((elapsed, state))
            });
            let mut now = 0;
            for gap in gaps {
                let next = now + gap;
                while now < next {
                    now += TICK_MS;
                    if now == next {
                        monitor.receive_heartbeat(start + Duration::from_millis(now));
                    }
                    monitor.tick(start + Duration::from_millis(now));
                }
            }
            // Settle after the last heartbeat
            monitor.tick(start + Duration::from_millis(now + TICK_MS));
        }
        log
    }

    /// **Property 1: One Hung Per Long Gap**
    /// *For any* sequence of heartbeat gaps, each gap whose last observed
    /// elapsed sample exceeds `poll + hung` fires exactly one Hung transition.
    mod property_1_one_hung_per_gap {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn long_gaps_fire_hung_once(gaps in prop::collection::vec(1u64..=100, 1..30)) {
                let gaps: Vec<u64> = gaps.into_iter().map(|g| g * TICK_MS).collect();
                let log = replay_gaps(&gaps);

                // The last tick before a heartbeat sees `gap - TICK_MS`
                let expected = gaps
                    .iter()
                    .filter(|gap| **gap - TICK_MS > CONFIG.hung_limit())
                    .count();
                let hung = log.iter().filter(|(_, s)| *s == HealthState::Hung).count();

                prop_assert_eq!(hung, expected);
            }
        }
    }

    /// **Property 2: Hung Is Latched Until Recovery**
    /// *For any* heartbeat pattern, two Hung transitions are always separated
    /// by an Idle transition.
    mod property_2_hung_latched {
        use super::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn no_consecutive_hung(beats in prop::collection::vec(prop::bool::weighted(0.05), 1..1500)) {
                let start = Instant::now();
                let mut log = Vec::new();
                {
                    let mut monitor = HealthMonitor::new(CONFIG, start, |_, state| log.push(state));
                    for (i, beat) in beats.iter().enumerate() {
                        let now = start + Duration::from_millis((i as u64 + 1) * TICK_MS);
                        if *beat {
                            monitor.receive_heartbeat(now);
                        }
                        monitor.tick(now);
                    }
                }

                let mut last_hung = false;
                for state in log {
                    match state {
                        HealthState::Hung => {
                            prop_assert!(!last_hung, "Hung fired twice without recovery");
                            last_hung = true;
                        }
                        HealthState::Idle => last_hung = false,
                        HealthState::Warning => {}
                    }
                }
            }

            /// Recovery never reports less than the threshold it escalated past
            #[test]
            fn recovery_after_hung_reports_peak(gap in 27u64..200) {
                let log = replay_gaps(&[gap * TICK_MS]);
                let idle: Vec<_> = log.iter().filter(|(_, s)| *s == HealthState::Idle).collect();
                prop_assert_eq!(idle.len(), 1);
                prop_assert_eq!(idle[0].0, gap * TICK_MS - TICK_MS);
            }
        }
    }

    /// **Property 3: Outermost Frame First**
    /// *For any* raw call stack, normalized frames come out in reverse order
    /// with 1-based positions.
    mod property_3_frame_order {
        use super::*;

        fn call_frame(name: &str, line: u32, column: u32) -> CallFrame {
            CallFrame {
                function_name: name.to_string(),
                location: Location {
                    script_id: "1".to_string(),
                    line_number: line,
                    column_number: column,
                },
            }
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(100))]

            #[test]
            fn frames_are_reversed(
                raw in prop::collection::vec(("[a-z]{1,8}", 0u32..10_000, 0u32..500), 0..20)
            ) {
                let call_frames: Vec<CallFrame> = raw
                    .iter()
                    .map(|(name, line, column)| call_frame(name, *line, *column))
                    .collect();
                let frames = call_frames_to_stack_frames(&call_frames, |_| Some("src/app.js".to_string()));

                prop_assert_eq!(frames.len(), raw.len());
                for (frame, (name, line, column)) in frames.iter().zip(raw.iter().rev()) {
                    prop_assert_eq!(&frame.function, name);
                    prop_assert_eq!(frame.lineno, if *line == 0 { None } else { Some(line + 1) });
                    prop_assert_eq!(frame.colno, if *column == 0 { None } else { Some(column + 1) });
                    prop_assert!(frame.in_app);
                }
            }

            #[test]
            fn absolute_paths_never_in_app(path in "/[a-z/]{0,30}\\.js") {
                prop_assert!(!crate::inspector::is_in_app(Some(&path)));
            }
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    use crate::core::config::AnrOptions;
    use crate::inspector::protocol::{Command, DEBUGGER_PAUSE, DEBUGGER_RESUME};
    use crate::telemetry::AnrReport;
    use crate::watchdog::thread::channel;
    use crate::watchdog::{HeartbeatMessage, HeartbeatSender, InspectorCapture, Sentinel};

    const PAUSED: &str = r#"{"method":"Debugger.paused","params":{"callFrames":[
        {"functionName":"spin","location":{"scriptId":"7","lineNumber":41,"columnNumber":2}},
        {"functionName":"","location":{"scriptId":"7","lineNumber":9,"columnNumber":0}}
    ]}}"#;
    const SCRIPT_PARSED: &str =
        r#"{"method":"Debugger.scriptParsed","params":{"scriptId":"7","url":"src/busy.js"}}"#;

    async fn fake_debugger(listener: TcpListener, resumed: Arc<Mutex<bool>>) {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::text(SCRIPT_PARSED)).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            if !message.is_text() {
                continue;
            }
            let command: Command = serde_json::from_str(message.to_text().unwrap()).unwrap();
            if command.method == DEBUGGER_PAUSE {
                ws.send(Message::text(PAUSED)).await.unwrap();
            }
            if command.method == DEBUGGER_RESUME {
                *resumed.lock().unwrap() = true;
            }
        }
    }

    #[tokio::test]
    async fn test_hang_captured_through_debugger() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let resumed = Arc::new(Mutex::new(false));
        tokio::spawn(fake_debugger(listener, Arc::clone(&resumed)));

        let reports = Arc::new(Mutex::new(Vec::<AnrReport>::new()));
        let sink = Arc::clone(&reports);
        let options = AnrOptions::new()
            .with_poll_interval(20)
            .with_warning_threshold(40)
            .with_hung_threshold(100)
            .with_capture_stack_trace(true);

        let (mut sender, receiver) = channel();
        let sentinel = Sentinel::new(options, Box::new(InspectorCapture::new()), move |report: AnrReport| {
            sink.lock().unwrap().push(report)
        });
        let task = tokio::spawn(sentinel.run(receiver));

        let message = HeartbeatMessage::new(Some(url));
        for _ in 0..10 {
            sender.send(&message).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        // Stall long enough to pass the hung limit, then wait for the capture
        for _ in 0..250 {
            if !reports.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        sender.send(&message).await.unwrap();
        drop(sender);
        task.await.unwrap();

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].hung);
        assert!(reports[0].blocked_ms > 120);
        assert!(*resumed.lock().unwrap());

        let frames = reports[0].frames.as_ref().expect("stack was captured");
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].function, "?");
        assert_eq!(frames[0].lineno, Some(10));
        assert_eq!(frames[0].colno, None);
        assert_eq!(frames[1].function, "spin");
        assert_eq!(frames[1].lineno, Some(42));
        assert_eq!(frames[1].filename.as_deref(), Some("src/busy.js"));
        assert!(frames[1].in_app);
    }
}
