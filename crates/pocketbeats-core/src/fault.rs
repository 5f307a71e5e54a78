//! Playback fault taxonomy.
//!
//! Faults are recoverable. They are logged with the locator of the track
//! involved, and the session controller decides which of them reach the user.

use thiserror::Error;


/// Recoverable playback faults.
#[derive( Debug, Clone, PartialEq, Eq, Error )]
pub enum PlaybackFault {
    /// The source could not be opened or prepared. The session skips ahead.
    #[error( "Could not open {locator}" )]
    SourceOpen { locator: String },

    /// Decoding failed mid-playback. The session stops and waits.
    #[error( "Playback of {locator} failed (code {code}, extra {extra})" )]
    Decoder { locator: String, code: i32, extra: i32 },

    /// The platform refused audio focus. Playback goes on regardless.
    #[error( "Audio focus request denied" )]
    FocusDenied,

    /// A transport command arrived with nothing queued.
    #[error( "Queue is empty" )]
    EmptyQueue,

    /// Every entry in the queue failed to open.
    #[error( "No playable tracks in queue" )]
    NothingPlayable,
}
