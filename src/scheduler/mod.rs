pub mod heap;
pub mod hub;
pub mod job;
pub mod spoke;
pub mod status;

pub use hub::{Hub, HubStatus};
pub use job::{Job, TemporalState};
pub use spoke::{Spoke, SpokeBound};
