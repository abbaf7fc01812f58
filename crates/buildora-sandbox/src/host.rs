//! SandboxHost: owns the relay and drives one replaceable execution context

use async_trait::async_trait;
use buildora_compose::{Composer, RelayTransport, MISSING_ENTRY_DOCUMENT, STOPPED_DOCUMENT};
use buildora_core::{ProjectGraph, Result};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::relay::{DiagnosticLog, EventRelay, RelaySender};

/// An isolated place to run a composed document
///
/// Implementations receive a disconnected copy of the document and may only
/// talk back through the [`RelaySender`] they are handed.
#[async_trait]
pub trait ExecutionContext: Send + Sync {
    /// Replace whatever is running with `document`
    async fn load(&self, generation: u64, document: String, relay: RelaySender) -> Result<()>;

    /// Tear the context down for good
    async fn unload(&self) -> Result<()>;

    /// How a document loaded as `generation` should reach the relay
    fn transport(&self, generation: u64) -> RelayTransport;
}

/// Renders project snapshots into an [`ExecutionContext`]
///
/// Every render is a full context replacement under a fresh generation id, so
/// diagnostics still in flight from the previous document are dropped.
pub struct SandboxHost<C: ExecutionContext> {
    context: C,
    relay: EventRelay,
    log: DiagnosticLog,
    generation: watch::Sender<u64>,
    running: bool,
    reload_counter: u64,
    entry: Option<String>,
    document: String,
}

impl<C: ExecutionContext> SandboxHost<C> {
    /// Must be called inside a tokio runtime; spawns the relay task
    pub fn new(context: C) -> Self {
        let log = DiagnosticLog::new();
        let (generation, rx) = watch::channel(0);
        let relay = EventRelay::spawn(log.clone(), rx);
        Self {
            context,
            relay,
            log,
            generation,
            running: true,
            reload_counter: 0,
            entry: None,
            document: String::new(),
        }
    }

    /// Compose this entry instead of the `index*` convention
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn reload_counter(&self) -> u64 {
        self.reload_counter
    }

    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }

    /// The document most recently handed to the context
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Compose `graph` and load it into a fresh context generation
    ///
    /// While stopped the static placeholder is loaded instead; the graph is
    /// never touched either way.
    pub async fn render(&mut self, graph: &ProjectGraph) -> Result<u64> {
        let generation = self.generation() + 1;
        let document = if self.running {
            let composer = Composer::new().with_transport(self.context.transport(generation));
            match &self.entry {
                Some(name) => composer.compose(graph, name),
                None => match graph.entry() {
                    Some(entry) => composer.compose(graph, &entry.name),
                    None => MISSING_ENTRY_DOCUMENT.to_string(),
                },
            }
        } else {
            STOPPED_DOCUMENT.to_string()
        };

        self.context
            .load(generation, document.clone(), self.relay.sender())
            .await?;
        self.generation.send_replace(generation);
        self.document = document;

        debug!(
            generation,
            running = self.running,
            reload = self.reload_counter,
            "Sandbox rendered"
        );
        Ok(generation)
    }

    /// Force recomposition and full context replacement
    pub async fn reload(&mut self, graph: &ProjectGraph) -> Result<u64> {
        self.reload_counter += 1;
        info!(reload = self.reload_counter, "Reloading sandbox");
        self.render(graph).await
    }

    /// Flip between running and stopped, then re-render
    pub async fn set_running(&mut self, running: bool, graph: &ProjectGraph) -> Result<u64> {
        if self.running != running {
            info!(running, "Sandbox run state changed");
        }
        self.running = running;
        self.render(graph).await
    }

    /// Unload the context and drain the relay
    pub async fn shutdown(self) -> Result<DiagnosticLog> {
        self.context.unload().await?;
        self.relay.close().await;
        Ok(self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{DiagnosticLevel, Envelope};
    use buildora_core::{BuildoraError, FileNode, ProjectKind};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingContext {
        loads: Arc<Mutex<Vec<(u64, String)>>>,
        unloaded: Arc<AtomicBool>,
        refuse: Arc<AtomicBool>,
    }

    #[async_trait]
    impl ExecutionContext for RecordingContext {
        async fn load(&self, generation: u64, document: String, _relay: RelaySender) -> Result<()> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(BuildoraError::Other("context unavailable".to_string()));
            }
            self.loads.lock().unwrap().push((generation, document));
            Ok(())
        }

        async fn unload(&self) -> Result<()> {
            self.unloaded.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn transport(&self, _generation: u64) -> RelayTransport {
            RelayTransport::PostMessage
        }
    }

    fn graph() -> ProjectGraph {
        ProjectGraph::new(ProjectKind::Static)
            .with_files(vec![FileNode::file("index.html", "<head></head><p>v1</p>")])
    }

    #[tokio::test]
    async fn test_render_increments_generation() {
        let mut host = SandboxHost::new(RecordingContext::default());
        assert_eq!(host.render(&graph()).await.unwrap(), 1);
        assert_eq!(host.reload(&graph()).await.unwrap(), 2);
        assert_eq!(host.reload_counter(), 1);

        let loads = host.context().loads.lock().unwrap().clone();
        assert_eq!(loads.len(), 2);
        assert!(loads[0].1.contains("<p>v1</p>"));
        assert_eq!(loads[0].1, loads[1].1);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_live_generation() {
        let ctx = RecordingContext::default();
        let mut host = SandboxHost::new(ctx.clone());
        assert_eq!(host.render(&graph()).await.unwrap(), 1);

        ctx.refuse.store(true, Ordering::SeqCst);
        assert!(host.reload(&graph()).await.is_err());
        assert_eq!(host.generation(), 1);
        assert!(host.document().contains("<p>v1</p>"));

        let raw = Envelope::new(DiagnosticLevel::Warn, "still live")
            .to_value()
            .to_string();
        assert!(host.relay.sender().deliver(1, raw));
        let log = host.shutdown().await.unwrap();
        let entries = log.snapshot().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "still live");
    }

    #[tokio::test]
    async fn test_stopped_serves_placeholder_and_keeps_graph() {
        let g = graph();
        let mut host = SandboxHost::new(RecordingContext::default());
        host.set_running(false, &g).await.unwrap();
        assert_eq!(host.document(), STOPPED_DOCUMENT);
        assert_eq!(g.len(), 1);

        host.set_running(true, &g).await.unwrap();
        assert!(host.document().contains("<p>v1</p>"));
    }

    #[tokio::test]
    async fn test_missing_entry_renders_placeholder() {
        let mut host = SandboxHost::new(RecordingContext::default()).with_entry("nope.html");
        host.render(&graph()).await.unwrap();
        assert_eq!(host.document(), MISSING_ENTRY_DOCUMENT);
    }

    #[tokio::test]
    async fn test_shutdown_unloads_context() {
        let ctx = RecordingContext::default();
        let mut host = SandboxHost::new(ctx.clone());
        host.render(&graph()).await.unwrap();
        let log = host.shutdown().await.unwrap();
        assert!(ctx.unloaded.load(Ordering::SeqCst));
        assert!(log.is_empty().await);
    }
}
