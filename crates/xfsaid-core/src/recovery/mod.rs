//! File rebuilding, tree scanning and whole-filesystem rescue

pub mod file;
pub mod rescue;
pub mod scan;

pub use file::{extents_cover, reconstruct, BlockMapSummary, Dumped, FileHandle};
pub use rescue::{
    destination, FileOutcome, RescueEvent, RescueOrchestrator, RescueReport, RescueStatus,
    RescueTarget,
};
pub use scan::{DirectoryScanner, Objects, View, ROOT_PATH};
