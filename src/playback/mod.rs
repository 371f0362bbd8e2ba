//! Модуль воспроизведения по предложениям
//!
//! Контроллер, его внешние зависимости (медиаплеер и планировщик)
//! и планировщик на основе Tokio.

pub mod ports;
pub mod controller;
pub mod scheduler;

pub use ports::{BoundaryKind, MediaPlayer, Scheduler, TimerHandle};
pub use controller::{PendingBoundary, PlaybackController, PlaybackMode, PlaybackState, SessionSummary};
pub use scheduler::{TimerFired, TokioScheduler};
