//! Wall-clock anchored work/break timer.

mod clock;
pub mod driver;
pub mod engine;
pub mod persistence;

pub use clock::{Clock, ManualClock, SystemClock};
pub use driver::{Command, Driver, TICK_PERIOD};
pub use engine::{CycleState, TickResult, TimerMode};
pub use persistence::{timer_state_key, PersistedTimerState, TimerPersistence, KEY_PREFIX};
