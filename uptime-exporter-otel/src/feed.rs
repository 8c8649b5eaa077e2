//! Line-delimited JSON feed of monitor events.
//!
//! Each line is one event, tagged by `"event"`:
//!
//! ```text
//! {"event":"register","monitor":{"id":1,"name":"api","type":"http"},"tags":[{"name":"env","value":"prod"}]}
//! {"event":"heartbeat","monitor_id":1,"heartbeat":{"status":1,"ping":42},"tls":{"valid":true,"certInfo":{"daysRemaining":30}}}
//! {"event":"remove","monitor_id":1}
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};
use uptime_common::monitor::{Heartbeat, MonitoredEntity, Tag, TlsInfo};

use crate::gauges::SharedGauges;
use crate::recorder::MonitorRecorder;

/// A single event from the monitor loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A monitor started being monitored.
    Register {
        monitor: MonitoredEntity,
        #[serde(default)]
        tags: Vec<Tag>,
    },
    /// A heartbeat and/or TLS result for a registered monitor.
    Heartbeat {
        monitor_id: i64,
        #[serde(default)]
        heartbeat: Option<Heartbeat>,
        #[serde(default)]
        tls: Option<TlsInfo>,
    },
    /// A monitor stopped being monitored.
    Remove { monitor_id: i64 },
}

/// Statistics for the feed.
#[derive(Debug, Clone, Default)]
pub struct FeedStats {
    pub events_received: u64,
    pub lines_rejected: u64,
    pub unknown_monitors: u64,
    pub monitors_registered: u64,
    pub monitors_removed: u64,
}

/// Drives one recorder per registered monitor from a stream of events.
pub struct HeartbeatFeed {
    gauges: SharedGauges,
    recorders: HashMap<i64, MonitorRecorder>,
    stats: FeedStats,
}

impl HeartbeatFeed {
    /// Create a new feed recording through the given gauges.
    pub fn new(gauges: SharedGauges) -> Self {
        Self {
            gauges,
            recorders: HashMap::new(),
            stats: FeedStats::default(),
        }
    }

    /// Number of monitors currently registered.
    pub fn monitor_count(&self) -> usize {
        self.recorders.len()
    }

    /// Recorder for a registered monitor.
    pub fn recorder(&self, monitor_id: i64) -> Option<&MonitorRecorder> {
        self.recorders.get(&monitor_id)
    }

    /// Get current statistics.
    pub fn stats(&self) -> &FeedStats {
        &self.stats
    }

    /// Apply a decoded event.
    pub fn apply(&mut self, event: FeedEvent) {
        self.stats.events_received += 1;

        match event {
            FeedEvent::Register { monitor, tags } => {
                let recorder = MonitorRecorder::new(&monitor, &tags, self.gauges.clone());
                if let Some(previous) = self.recorders.insert(monitor.id, recorder) {
                    debug!(monitor_id = monitor.id, "Replacing existing recorder");
                    previous.remove();
                }
                self.stats.monitors_registered += 1;
                info!(monitor_id = monitor.id, name = %monitor.name, "Monitor registered");
            }
            FeedEvent::Heartbeat {
                monitor_id,
                heartbeat,
                tls,
            } => match self.recorders.get(&monitor_id) {
                Some(recorder) => {
                    trace!(monitor_id, "Received heartbeat");
                    recorder.update(heartbeat.as_ref(), tls.as_ref());
                }
                None => {
                    self.stats.unknown_monitors += 1;
                    debug!(monitor_id, "Heartbeat for unregistered monitor");
                }
            },
            FeedEvent::Remove { monitor_id } => match self.recorders.remove(&monitor_id) {
                Some(recorder) => {
                    recorder.remove();
                    self.stats.monitors_removed += 1;
                    info!(monitor_id, "Monitor removed");
                }
                None => {
                    self.stats.unknown_monitors += 1;
                    debug!(monitor_id, "Remove for unregistered monitor");
                }
            },
        }
    }

    /// Decode and apply one line. Blank lines are ignored.
    pub fn handle_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<FeedEvent>(line) {
            Ok(event) => self.apply(event),
            Err(e) => {
                self.stats.lines_rejected += 1;
                warn!(error = %e, line_len = line.len(), "Failed to decode feed event");
            }
        }
    }

    /// Read events until end of input or the shutdown signal.
    pub async fn run<R>(
        mut self,
        reader: R,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<FeedStats>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Feed started, waiting for events...");
        let mut lines = reader.lines();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received, stopping feed");
                        break;
                    }
                }

                line = lines.next_line() => {
                    match line? {
                        Some(line) => self.handle_line(&line),
                        None => {
                            info!("End of input reached");
                            break;
                        }
                    }
                }
            }
        }

        for (_, recorder) in self.recorders.drain() {
            recorder.remove();
        }

        info!("Feed stopped");
        Ok(self.stats)
    }
}
