//! Metric descriptors, snapshots and their text exposition.

mod descriptor;
mod exposition;
mod snapshot;

pub use descriptor::{DEFAULT_NAMESPACE, DescriptorTable, MetricDescriptor, MetricId, MetricKind};
pub use exposition::{CONTENT_TYPE, render};
pub use snapshot::{MetricRecord, Snapshot, SnapshotBuilder, degraded};
