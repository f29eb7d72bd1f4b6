pub mod diff;
pub mod engine;
pub mod export;
pub mod io;
pub mod output;
pub mod record;
pub mod report;
pub mod scope;
pub mod select;
pub mod stats;
pub mod store;

pub mod prelude {
    pub use crate::diff::{ChangeEntry, diff};
    pub use crate::engine::{Report, TrackConfig, Tracker};
    pub use crate::output::{AddressInfo, OutputRecord, TimeRange};
    pub use crate::scope::scoped_output;
    pub use crate::select::{Selection, WindowPolicy, select};
    pub use crate::store::{DirStore, MemoryStore, SnapshotStore};
}
