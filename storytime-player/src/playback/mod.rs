//! Transport control, wake lock and playlist

pub mod backend;
pub mod controller;
pub mod decode_worker;
pub mod playlist;
pub mod session;
pub mod wake_lock;

pub use backend::{AudioBackend, BackendEvent, VoiceId};
pub use controller::PlaybackController;
pub use decode_worker::{DecodeOutcome, DecodeWorker};
pub use playlist::{Playlist, PlaylistEntry};
pub use session::DecodeTicket;
pub use wake_lock::WakeLockManager;
