mod sqlite;
mod state;
mod store;
mod types;

pub use sqlite::SqliteMissionStore;
pub use state::{MissionState, allowed_next_states, is_terminal, validate_transition};
pub use store::MissionStore;
pub use types::{Mission, MissionEvent, NewMission};
