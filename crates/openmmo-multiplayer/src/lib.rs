//! Client-side multiplayer state: movement prediction, reconciliation
//! against the server, and the replicated entity table.

pub mod prediction;
pub mod reconciliation;
pub mod replication;

pub use prediction::{IntentHistory, MovementPredictor, PredictorConfig, SentIntent};
pub use reconciliation::{ReconcileConfig, ReconcileOutcome};
pub use replication::{EntityReplicationStore, ReplicatedEntity, ReplicationEvent};
