pub mod config;
pub mod digest;
pub mod errors;
pub mod extract;
pub mod filters;
pub mod metrics;
pub mod progress;
pub mod results;
pub mod scan;
pub mod shutdown;

pub use config::{OutputFormat, ScanConfig};
pub use digest::Digest;
pub use errors::{ExtractError, ScanError, ScanResult};
pub use extract::{MachOExtractor, RegionExtractor, RegionKind, Regions};
pub use filters::SAMPLE_FILE_SIZE;
pub use metrics::{ScanMetrics, ScanStats};
pub use progress::ScanProgress;
pub use results::{Aggregator, FrequencyTable, ScanReport, TableEntry};
pub use scan::{scan, scan_path, Scanner};
pub use shutdown::{CancellationToken, RunState, ShutdownCoordinator};
