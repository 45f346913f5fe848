//! Prometheus metrics for the keyper subsystems.
//!
//! All metrics follow the naming convention: `shutter_<subsystem>_<metric>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g. `decryption_keys_generated_total`)
//! - **Gauge**: Value that can go up or down (e.g. `outbound_queue_depth`)

use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

/// Handle to every keyper metric.
///
/// Cloning is cheap; all clones update the same underlying collectors.
#[derive(Clone, Debug)]
pub struct KeyperMetrics {
    // =========================================================================
    // CHAIN HEIGHTS
    // =========================================================================
    /// Latest L1 block number observed by the orchestrator
    pub l1_block_number: IntGauge,

    /// Latest BFT height folded into the reducer
    pub shuttermint_height: IntGauge,

    /// Next L1 block the chain observer will scan
    pub chain_observer_next_block: IntGauge,

    // =========================================================================
    // DKG
    // =========================================================================
    /// Current DKG phase per eon (0 = off .. 4 = finalized)
    pub dkg_phase: IntGaugeVec,

    /// DKG outcome per eon (1 = success, 0 = failure)
    pub eon_dkg_success: IntGaugeVec,

    // =========================================================================
    // OUTBOUND CONSENSUS MESSAGES
    // =========================================================================
    /// Rows waiting in the outbound queue
    pub outbound_queue_depth: IntGauge,

    /// Messages accepted by the BFT chain, by description
    pub outbound_messages_sent: IntCounterVec,

    /// Sends the BFT chain refused for good, by description
    pub outbound_messages_rejected: IntCounterVec,

    /// 1 while a rejected message sits at the head of the queue
    pub outbound_queue_blocked: IntGauge,

    // =========================================================================
    // EPOCH KEY GENERATION
    // =========================================================================
    /// Decryption triggers received (gossip and HTTP)
    pub decryption_triggers_received: IntCounter,

    /// Own decryption key shares sent
    pub decryption_keyshares_sent: IntCounter,

    /// Peer decryption key shares received
    pub decryption_keyshares_received: IntCounter,

    /// Decryption keys aggregated locally
    pub decryption_keys_generated: IntCounter,

    /// Decryption keys received from peers
    pub decryption_keys_received: IntCounter,

    /// Eon public keys published on gossip
    pub eon_public_keys_published: IntCounter,
}

impl KeyperMetrics {
    /// Create all collectors and register them on `registry`.
    pub fn new(registry: &Registry) -> Result<Self, TelemetryError> {
        let metrics = Self {
            l1_block_number: IntGauge::new(
                "shutter_keyper_l1_block_number",
                "Latest L1 block number observed",
            )?,
            shuttermint_height: IntGauge::new(
                "shutter_keyper_shuttermint_height",
                "Latest BFT chain height processed",
            )?,
            chain_observer_next_block: IntGauge::new(
                "shutter_chainobserver_next_block",
                "Next L1 block the chain observer will scan",
            )?,
            dkg_phase: IntGaugeVec::new(
                Opts::new("shutter_dkg_phase", "Current DKG phase per eon"),
                &["eon"],
            )?,
            eon_dkg_success: IntGaugeVec::new(
                Opts::new("shutter_dkg_success", "DKG outcome per eon (1 = success)"),
                &["eon"],
            )?,
            outbound_queue_depth: IntGauge::new(
                "shutter_keyper_outbound_queue_depth",
                "Consensus messages waiting to be sent",
            )?,
            outbound_messages_sent: IntCounterVec::new(
                Opts::new(
                    "shutter_keyper_outbound_messages_sent_total",
                    "Consensus messages accepted by the chain",
                ),
                &["description"],
            )?,
            outbound_messages_rejected: IntCounterVec::new(
                Opts::new(
                    "shutter_keyper_outbound_messages_rejected_total",
                    "Consensus messages rejected by the chain with a non-retriable error",
                ),
                &["description"],
            )?,
            outbound_queue_blocked: IntGauge::new(
                "shutter_keyper_outbound_queue_blocked",
                "1 while a rejected message blocks the outbound queue",
            )?,
            decryption_triggers_received: IntCounter::new(
                "shutter_epochkg_decryption_triggers_received_total",
                "Number of received decryption triggers",
            )?,
            decryption_keyshares_sent: IntCounter::new(
                "shutter_epochkg_decryption_keyshares_sent_total",
                "Number of sent decryption key shares",
            )?,
            decryption_keyshares_received: IntCounter::new(
                "shutter_epochkg_decryption_keyshares_received_total",
                "Number of received decryption key shares",
            )?,
            decryption_keys_generated: IntCounter::new(
                "shutter_epochkg_decryption_keys_generated_total",
                "Number of generated decryption keys",
            )?,
            decryption_keys_received: IntCounter::new(
                "shutter_epochkg_decryption_keys_received_total",
                "Number of received decryption keys",
            )?,
            eon_public_keys_published: IntCounter::new(
                "shutter_keyper_eon_public_keys_published_total",
                "Number of eon public keys broadcast",
            )?,
        };

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.l1_block_number.clone()),
            Box::new(metrics.shuttermint_height.clone()),
            Box::new(metrics.chain_observer_next_block.clone()),
            Box::new(metrics.dkg_phase.clone()),
            Box::new(metrics.eon_dkg_success.clone()),
            Box::new(metrics.outbound_queue_depth.clone()),
            Box::new(metrics.outbound_messages_sent.clone()),
            Box::new(metrics.outbound_messages_rejected.clone()),
            Box::new(metrics.outbound_queue_blocked.clone()),
            Box::new(metrics.decryption_triggers_received.clone()),
            Box::new(metrics.decryption_keyshares_sent.clone()),
            Box::new(metrics.decryption_keyshares_received.clone()),
            Box::new(metrics.decryption_keys_generated.clone()),
            Box::new(metrics.decryption_keys_received.clone()),
            Box::new(metrics.eon_public_keys_published.clone()),
        ];
        for collector in collectors {
            registry.register(collector)?;
        }

        Ok(metrics)
    }

    /// Collectors attached to a private registry. Intended for tests and for
    /// components constructed without a metrics endpoint.
    pub fn detached() -> Result<Self, TelemetryError> {
        Self::new(&Registry::new())
    }

    /// Record the phase of `eon`.
    pub fn set_dkg_phase(&self, eon: u64, phase: i64) {
        self.dkg_phase.with_label_values(&[&eon.to_string()]).set(phase);
    }

    /// Record the outcome of the DKG for `eon`.
    pub fn set_dkg_success(&self, eon: u64, success: bool) {
        self.eon_dkg_success
            .with_label_values(&[&eon.to_string()])
            .set(i64::from(success));
    }
}

/// Encode all metrics on `registry` as Prometheus text format.
pub fn encode_metrics(registry: &Registry) -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}
