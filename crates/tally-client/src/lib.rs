//! Client side of the scoreboard: REST calls, the realtime feed, the local
//! snapshot those feed into, and the per-device identity preference.

pub mod api;
pub mod error;
pub mod prefs;
pub mod realtime;
pub mod state;
pub mod validation;

pub use api::TallyClient;
pub use error::ClientError;
pub use prefs::DevicePreference;
pub use state::LocalState;
