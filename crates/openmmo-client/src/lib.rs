//! The OpenMMO client core: every component wired into one [`ClientContext`]
//! and driven by a fixed-timestep [`TickLoop`].

pub mod context;
pub mod settings;
pub mod tick_loop;

pub use context::{ClientContext, ClientError, LOOK_RADIANS_PER_UNIT};
pub use tick_loop::{FIXED_DT, MAX_FRAME_TIME, TickLoop};
