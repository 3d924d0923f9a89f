use std::sync::{Arc, OnceLock};

use prometheus::{Counter, CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};

/// Shared metrics registry for the coordinator reconciliation loop.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    specs_generated: CounterVec,
    ingest_tasks: CounterVec,
    specs_expired: CounterVec,
    orphans_reset: Counter,
    node_bytes: GaugeVec,
    specs_online: GaugeVec,
}

impl MetricsRegistry {
    /// Construct an empty registry with all families registered.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// Record specs emitted by a refresh pass for one table.
    pub fn inc_specs_generated(&self, table: &str, count: u64) {
        self.inner
            .specs_generated
            .with_label_values(&[table])
            .inc_by(count as f64);
    }

    /// Record one ingestion task send and its terminal state.
    pub fn inc_ingest_task(&self, node: &str, state: &str) {
        self.inner
            .ingest_tasks
            .with_label_values(&[node, state])
            .inc();
    }

    /// Record spec ids expired off a node.
    pub fn inc_specs_expired(&self, node: &str, count: u64) {
        self.inner
            .specs_expired
            .with_label_values(&[node])
            .inc_by(count as f64);
    }

    /// Record specs reset because their node lost them.
    pub fn inc_orphans_reset(&self, count: u64) {
        self.inner.orphans_reset.inc_by(count as f64);
    }

    /// Publish observed memory footprint for a node.
    pub fn set_node_bytes(&self, node: &str, bytes: u64) {
        self.inner
            .node_bytes
            .with_label_values(&[node])
            .set(bytes as f64);
    }

    /// Publish the current desired-spec count for a table.
    pub fn set_specs_online(&self, table: &str, count: u64) {
        self.inner
            .specs_online
            .with_label_values(&[table])
            .set(count as f64);
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        let families = self.inner.registry.gather();
        if encoder.encode(&families, &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();
        let specs_generated = CounterVec::new(
            Opts::new("ember_specs_generated_total", "Specs emitted by refresh"),
            &["table"],
        )
        .expect("valid metric definition");
        let ingest_tasks = CounterVec::new(
            Opts::new("ember_ingest_tasks_total", "Ingestion tasks sent to nodes"),
            &["node", "state"],
        )
        .expect("valid metric definition");
        let specs_expired = CounterVec::new(
            Opts::new("ember_specs_expired_total", "Spec ids expired off nodes"),
            &["node"],
        )
        .expect("valid metric definition");
        let orphans_reset = Counter::new("ember_orphans_reset_total", "Specs reset after loss")
            .expect("valid metric definition");
        let node_bytes = GaugeVec::new(
            Opts::new("ember_node_bytes", "Observed node memory footprint"),
            &["node"],
        )
        .expect("valid metric definition");
        let specs_online = GaugeVec::new(
            Opts::new("ember_specs_online", "Desired specs per table"),
            &["table"],
        )
        .expect("valid metric definition");

        registry
            .register(Box::new(specs_generated.clone()))
            .expect("register metric");
        registry
            .register(Box::new(ingest_tasks.clone()))
            .expect("register metric");
        registry
            .register(Box::new(specs_expired.clone()))
            .expect("register metric");
        registry
            .register(Box::new(orphans_reset.clone()))
            .expect("register metric");
        registry
            .register(Box::new(node_bytes.clone()))
            .expect("register metric");
        registry
            .register(Box::new(specs_online.clone()))
            .expect("register metric");

        Self {
            registry,
            specs_generated,
            ingest_tasks,
            specs_expired,
            orphans_reset,
            node_bytes,
            specs_online,
        }
    }
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

/// Process-wide metrics handle.
pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}
