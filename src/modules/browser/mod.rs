pub mod scripts;
pub mod snapshot;
pub mod stabilizer;

pub use snapshot::{capture_snapshot, load_snapshot_file};
pub use stabilizer::{StabilizeOptions, stabilize_page};
