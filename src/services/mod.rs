//! Services - business logic
//!
//! - `router` - geofence event router (task invocation -> notification)
//! - `session` - foreground initialization flow and view state

pub mod router;
pub mod session;

// Re-export commonly used types
pub use router::{create_router, GeofenceRouter};
pub use session::{Session, SessionOutcome, SessionPorts, ViewState};
