//! EventRelay: the one-way diagnostic channel from a sandbox to the host
//!
//! The sandbox side only ever holds a [`RelaySender`]. Raw envelope text goes
//! through a bounded channel to the relay task, which validates it, drops
//! anything addressed to a superseded generation, and appends the rest to the
//! shared [`DiagnosticLog`]. Delivery is at-most-once: a full channel drops the
//! envelope instead of blocking the sandbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const RELAY_CAPACITY: usize = 256;

/// Console channel a diagnostic came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Log,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for DiagnosticLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Log => write!(f, "log"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for DiagnosticLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log" => Ok(Self::Log),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown diagnostic level: {}", s)),
        }
    }
}

/// A validated `{kind:"diagnostic", level, message}` envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub level: DiagnosticLevel,
    pub message: String,
}

impl Envelope {
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    /// Parse raw envelope text, `None` if it is not a well-formed diagnostic
    pub fn parse(raw: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(raw).ok()?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get("kind")?.as_str()? != "diagnostic" {
            return None;
        }
        let level = obj.get("level")?.as_str()?.parse().ok()?;
        let message = obj.get("message")?.as_str()?.to_string();
        Some(Self { level, message })
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "kind": "diagnostic",
            "level": self.level,
            "message": self.message,
        })
    }
}

/// One accepted diagnostic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub generation: u64,
    pub level: DiagnosticLevel,
    pub message: String,
}

/// Ordered, append-only host log
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    entries: Arc<RwLock<Vec<DiagnosticEntry>>>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    async fn append(&self, generation: u64, envelope: Envelope) -> DiagnosticEntry {
        let entry = DiagnosticEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            generation,
            level: envelope.level,
            message: envelope.message,
        };
        self.entries.write().await.push(entry.clone());
        entry
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<DiagnosticEntry> {
        self.entries.read().await.clone()
    }

    /// Entries appended after the first `offset`
    pub async fn since(&self, offset: usize) -> Vec<DiagnosticEntry> {
        let entries = self.entries.read().await;
        entries.get(offset..).map(<[_]>::to_vec).unwrap_or_default()
    }
}

/// Raw envelope text tagged with the generation of the context that sent it
#[derive(Debug, Clone)]
pub struct Delivery {
    pub generation: u64,
    pub raw: String,
}

/// Sandbox-side handle onto the relay channel
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::Sender<Delivery>,
}

impl RelaySender {
    /// Hand an envelope to the relay
    ///
    /// Returns `false` when it was dropped (channel full or relay closed).
    pub fn deliver(&self, generation: u64, raw: impl Into<String>) -> bool {
        match self.tx.try_send(Delivery {
            generation,
            raw: raw.into(),
        }) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(generation, "Relay channel full, dropping diagnostic");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(generation, "Relay closed, dropping diagnostic");
                false
            }
        }
    }
}

/// The host-side relay task
pub struct EventRelay {
    tx: mpsc::Sender<Delivery>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl EventRelay {
    /// Spawn the relay task
    ///
    /// `generation` carries the id of the live execution context; deliveries
    /// from any other generation are discarded.
    pub fn spawn(log: DiagnosticLog, generation: watch::Receiver<u64>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Delivery>(RELAY_CAPACITY);
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    delivery = rx.recv() => match delivery {
                        Some(delivery) => accept(&log, &generation, delivery).await,
                        None => break,
                    },
                    _ = token.cancelled() => {
                        rx.close();
                        while let Some(delivery) = rx.recv().await {
                            accept(&log, &generation, delivery).await;
                        }
                        break;
                    }
                }
            }
            debug!("Event relay stopped");
        });

        Self {
            tx,
            shutdown,
            handle,
        }
    }

    pub fn sender(&self) -> RelaySender {
        RelaySender {
            tx: self.tx.clone(),
        }
    }

    /// Stop accepting envelopes, drain what is queued, and join the task
    pub async fn close(self) {
        self.shutdown.cancel();
        drop(self.tx);
        if let Err(e) = self.handle.await {
            error!("Event relay task failed: {}", e);
        }
    }
}

async fn accept(log: &DiagnosticLog, generation: &watch::Receiver<u64>, delivery: Delivery) {
    let live = *generation.borrow();
    if delivery.generation != live {
        debug!(
            from = delivery.generation,
            live, "Dropping diagnostic from replaced context"
        );
        return;
    }

    let Some(envelope) = Envelope::parse(&delivery.raw) else {
        debug!("Discarding malformed relay envelope");
        return;
    };

    let entry = log.append(delivery.generation, envelope).await;
    match entry.level {
        DiagnosticLevel::Error => error!(target: "sandbox", "{}", entry.message),
        DiagnosticLevel::Warn => warn!(target: "sandbox", "{}", entry.message),
        DiagnosticLevel::Info | DiagnosticLevel::Log => {
            info!(target: "sandbox", level = %entry.level, "{}", entry.message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_envelope() {
        let env = Envelope::parse(r#"{"kind":"diagnostic","level":"warn","message":"careful"}"#)
            .unwrap();
        assert_eq!(env, Envelope::new(DiagnosticLevel::Warn, "careful"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for raw in [
            "not json",
            "[]",
            r#"{"kind":"other","level":"log","message":"x"}"#,
            r#"{"kind":"diagnostic","level":"debug","message":"x"}"#,
            r#"{"kind":"diagnostic","level":"log","message":42}"#,
            r#"{"kind":"diagnostic","message":"x"}"#,
        ] {
            assert!(Envelope::parse(raw).is_none(), "accepted {}", raw);
        }
    }

    #[test]
    fn test_envelope_value_shape() {
        let value = Envelope::new(DiagnosticLevel::Info, "hi").to_value();
        assert_eq!(value["kind"], "diagnostic");
        assert_eq!(value["level"], "info");
        assert_eq!(Envelope::from_value(&value).unwrap().message, "hi");
    }

    #[tokio::test]
    async fn test_relay_preserves_order_and_drops_stale() {
        let log = DiagnosticLog::new();
        let (gen_tx, gen_rx) = watch::channel(2u64);
        let relay = EventRelay::spawn(log.clone(), gen_rx);
        let sender = relay.sender();

        let msg = |m: &str| Envelope::new(DiagnosticLevel::Log, m).to_value().to_string();
        assert!(sender.deliver(2, msg("first")));
        assert!(sender.deliver(1, msg("stale")));
        assert!(sender.deliver(2, "garbage"));
        assert!(sender.deliver(2, msg("second")));

        relay.close().await;
        drop(gen_tx);

        let entries = log.snapshot().await;
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert_ne!(entries[0].id, entries[1].id);
        assert!(entries[0].timestamp <= entries[1].timestamp);
        assert_eq!(log.since(1).await.len(), 1);
        assert!(log.since(10).await.is_empty());
    }

    #[tokio::test]
    async fn test_deliver_after_close_is_dropped() {
        let (_gen_tx, gen_rx) = watch::channel(0u64);
        let relay = EventRelay::spawn(DiagnosticLog::new(), gen_rx);
        let sender = relay.sender();
        relay.close().await;
        assert!(!sender.deliver(0, "{}"));
    }
}
