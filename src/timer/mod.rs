pub mod controller;
pub mod state;

pub use controller::{
    EndedSession, SessionController, SessionEvent, SessionOptions, SessionSnapshot,
};
pub use state::{SessionClock, SessionStatus, TimerState};
