//! Decoder/output abstraction
//!
//! The playback engine drives an `AudioBackend` through a small imperative
//! interface. Preparation, completion and errors are reported asynchronously
//! through a `BackendNotifier`, tagged with the `SourceToken` of the source
//! they belong to.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;


/// Unspecified failure.
pub const ERROR_UNKNOWN: i32 = 1;

/// File or stream I/O failure.
pub const ERROR_IO: i32 = -1004;

/// The stream is not valid for its container or codec.
pub const ERROR_MALFORMED: i32 = -1007;

/// Container or codec not supported.
pub const ERROR_UNSUPPORTED: i32 = -1010;


/// Errors returned synchronously by a backend.
#[derive( Debug, Error )]
pub enum BackendError {
    #[error( "Failed to open {locator}: {reason}" )]
    SourceOpen { locator: String, reason: String },

    #[error( "No source set" )]
    NoSource,

    #[error( "Source not prepared" )]
    NotPrepared,

    #[error( "Audio output error: {0}" )]
    Output( String ),

    #[error( "Backend already released" )]
    Released,
}


/// Identifies one `load` of a source.
///
/// Notifications carrying an older token belong to a source that has since
/// been reset and must be ignored.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash, Default )]
pub struct SourceToken( u64 );


impl SourceToken {
    /// Returns the token minted after this one.
    pub fn next( self ) -> Self {
        Self( self.0.wrapping_add( 1 ) )
    }


    pub fn value( &self ) -> u64 {
        self.0
    }
}


impl fmt::Display for SourceToken {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "#{}", self.0 )
    }
}


/// Asynchronous notifications from a backend.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum BackendEvent {
    Prepared { token: SourceToken },
    Completed { token: SourceToken },
    Error { token: SourceToken, code: i32, extra: i32 },
}


impl BackendEvent {
    /// Gets the token of the source this event belongs to.
    pub fn token( &self ) -> SourceToken {
        match *self {
            BackendEvent::Prepared { token }
            | BackendEvent::Completed { token }
            | BackendEvent::Error { token, .. } => token,
        }
    }
}


/// Clonable handle a backend uses to report events.
#[derive( Clone )]
pub struct BackendNotifier {
    sink: Arc<dyn Fn( BackendEvent ) + Send + Sync>,
}


impl BackendNotifier {
    /// Creates a notifier that hands every event to `sink`.
    pub fn new( sink: impl Fn( BackendEvent ) + Send + Sync + 'static ) -> Self {
        Self { sink: Arc::new( sink ) }
    }


    pub fn notify( &self, event: BackendEvent ) {
        ( self.sink )( event );
    }
}


impl fmt::Debug for BackendNotifier {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "BackendNotifier" ).finish_non_exhaustive()
    }
}


/// Decoder and output device driven by the playback engine.
///
/// The backend is acquired once per session and reset between tracks.
/// `release` frees it for good and must tolerate being called twice.
pub trait AudioBackend {
    /// Drops the current source and returns to the idle state.
    fn reset( &mut self );

    /// Sets the source to play. Fails if the locator cannot be opened.
    fn set_source( &mut self, locator: &str ) -> Result<(), BackendError>;

    /// Starts preparing the source. Completion is reported as
    /// `BackendEvent::Prepared` or `BackendEvent::Error` with `token`.
    fn prepare_async( &mut self, token: SourceToken ) -> Result<(), BackendError>;

    /// Starts or resumes output of a prepared source.
    fn start( &mut self ) -> Result<(), BackendError>;

    fn pause( &mut self ) -> Result<(), BackendError>;

    /// Seeks within a prepared source. Clamping is up to the backend.
    fn seek_to( &mut self, position: Duration ) -> Result<(), BackendError>;

    fn position( &self ) -> Duration;

    fn duration( &self ) -> Duration;

    fn is_playing( &self ) -> bool;

    /// Sets the output gain (1.0 = unity).
    fn set_gain( &mut self, gain: f32 );

    fn release( &mut self );
}


impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn reset( &mut self ) {
        ( **self ).reset()
    }

    fn set_source( &mut self, locator: &str ) -> Result<(), BackendError> {
        ( **self ).set_source( locator )
    }

    fn prepare_async( &mut self, token: SourceToken ) -> Result<(), BackendError> {
        ( **self ).prepare_async( token )
    }

    fn start( &mut self ) -> Result<(), BackendError> {
        ( **self ).start()
    }

    fn pause( &mut self ) -> Result<(), BackendError> {
        ( **self ).pause()
    }

    fn seek_to( &mut self, position: Duration ) -> Result<(), BackendError> {
        ( **self ).seek_to( position )
    }

    fn position( &self ) -> Duration {
        ( **self ).position()
    }

    fn duration( &self ) -> Duration {
        ( **self ).duration()
    }

    fn is_playing( &self ) -> bool {
        ( **self ).is_playing()
    }

    fn set_gain( &mut self, gain: f32 ) {
        ( **self ).set_gain( gain )
    }

    fn release( &mut self ) {
        ( **self ).release()
    }
}
