//! Playback engine
//!
//! Drives one `AudioBackend` through Idle → Preparing → Playing ⇄ Paused and
//! back. Each `load` mints a fresh `SourceToken`; backend events tagged with
//! any other token are stale and dropped here, so the session never acts on
//! a track the user has already moved away from.

use std::time::Duration;

use thiserror::Error;

use crate::backend::{ AudioBackend, BackendError, BackendEvent, SourceToken, ERROR_UNKNOWN };
use crate::track::Track;


/// Engine lifecycle state.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum PlaybackState {
    #[default]
    Idle,
    Preparing,
    Playing,
    Paused,
    /// Backend released. Terminal.
    Stopped,
}


impl PlaybackState {
    /// Prepared means a source is loaded and can be started, paused or sought.
    pub fn is_prepared( &self ) -> bool {
        matches!( self, PlaybackState::Playing | PlaybackState::Paused )
    }


    pub fn label( &self ) -> &'static str {
        match self {
            PlaybackState::Idle => "Idle",
            PlaybackState::Preparing => "Loading",
            PlaybackState::Playing => "Playing",
            PlaybackState::Paused => "Paused",
            PlaybackState::Stopped => "Stopped",
        }
    }
}


/// Errors from engine operations.
#[derive( Debug, Error )]
pub enum EngineError {
    #[error( "Failed to load {locator}: {source}" )]
    Load {
        locator: String,
        #[source]
        source: BackendError,
    },

    #[error( "Engine has been released" )]
    Stopped,

    #[error( "Backend error: {0}" )]
    Backend( #[from] BackendError ),
}


/// What an accepted backend event means for the session.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum EngineSignal {
    /// The source is prepared and output has started.
    Started,

    /// The source played to its end.
    Completed,

    /// The source failed before it ever played.
    SourceFailed { code: i32, extra: i32 },

    /// The source failed while playing or paused.
    Faulted { code: i32, extra: i32 },
}


/// Playback state machine over an `AudioBackend`.
pub struct PlaybackEngine<B: AudioBackend> {
    backend: B,
    state: PlaybackState,
    token: SourceToken,
    locator: Option<String>,
}


impl<B: AudioBackend> PlaybackEngine<B> {
    pub fn new( backend: B ) -> Self {
        Self {
            backend,
            state: PlaybackState::Idle,
            token: SourceToken::default(),
            locator: None,
        }
    }


    /// Resets the backend and starts preparing `track`.
    ///
    /// @param track - Track to load
    /// @returns The token the backend will report preparation with
    pub fn load( &mut self, track: &Track ) -> Result<SourceToken, EngineError> {
        if self.state == PlaybackState::Stopped {
            return Err( EngineError::Stopped );
        }

        self.backend.reset();
        self.token = self.token.next();
        self.locator = Some( track.locator().to_string() );

        let token = self.token;
        let result = self.backend
            .set_source( track.locator() )
            .and_then( |_| self.backend.prepare_async( token ) );

        if let Err( source ) = result {
            self.backend.reset();
            self.state = PlaybackState::Idle;
            return Err( EngineError::Load {
                locator: track.locator().to_string(),
                source,
            });
        }

        self.state = PlaybackState::Preparing;
        Ok( token )
    }


    /// Applies a backend event. Returns None for stale or irrelevant events.
    pub fn handle_event( &mut self, event: BackendEvent ) -> Option<EngineSignal> {
        if self.state == PlaybackState::Stopped || event.token() != self.token {
            tracing::debug!( "Dropping stale backend event {:?} (current {})", event, self.token );
            return None;
        }

        match event {
            BackendEvent::Prepared { .. } => {
                if self.state != PlaybackState::Preparing {
                    return None;
                }
                if let Err( e ) = self.backend.start() {
                    tracing::warn!( "Failed to start {:?}: {}", self.locator, e );
                    self.backend.reset();
                    self.state = PlaybackState::Idle;
                    return Some( EngineSignal::SourceFailed { code: ERROR_UNKNOWN, extra: 0 } );
                }
                self.state = PlaybackState::Playing;
                Some( EngineSignal::Started )
            }
            BackendEvent::Completed { .. } => {
                if !self.state.is_prepared() {
                    return None;
                }
                self.state = PlaybackState::Idle;
                Some( EngineSignal::Completed )
            }
            BackendEvent::Error { code, extra, .. } => {
                let previous = self.state;
                self.backend.reset();
                self.state = PlaybackState::Idle;
                match previous {
                    PlaybackState::Preparing => Some( EngineSignal::SourceFailed { code, extra } ),
                    PlaybackState::Playing | PlaybackState::Paused => {
                        Some( EngineSignal::Faulted { code, extra } )
                    }
                    _ => None,
                }
            }
        }
    }


    /// Flips between Playing and Paused.
    ///
    /// @returns The new playing flag, or None when nothing is prepared
    pub fn toggle_play_pause( &mut self ) -> Result<Option<bool>, EngineError> {
        match self.state {
            PlaybackState::Playing => self.pause().map( |_| Some( false ) ),
            PlaybackState::Paused => self.resume().map( |_| Some( true ) ),
            _ => Ok( None ),
        }
    }


    /// Pauses if playing. Returns whether the state changed.
    pub fn pause( &mut self ) -> Result<bool, EngineError> {
        if self.state != PlaybackState::Playing {
            return Ok( false );
        }
        self.backend.pause()?;
        self.state = PlaybackState::Paused;
        Ok( true )
    }


    /// Resumes if paused. Returns whether the state changed.
    pub fn resume( &mut self ) -> Result<bool, EngineError> {
        if self.state != PlaybackState::Paused {
            return Ok( false );
        }
        self.backend.start()?;
        self.state = PlaybackState::Playing;
        Ok( true )
    }


    /// Seeks within the prepared source. Ignored otherwise.
    pub fn seek_to( &mut self, position: Duration ) -> Result<bool, EngineError> {
        if !self.state.is_prepared() {
            return Ok( false );
        }
        self.backend.seek_to( position )?;
        Ok( true )
    }


    /// Gets the playback position, zero unless prepared.
    pub fn position( &self ) -> Duration {
        if self.state.is_prepared() {
            self.backend.position()
        } else {
            Duration::ZERO
        }
    }


    /// Gets the source duration, zero unless prepared.
    pub fn duration( &self ) -> Duration {
        if self.state.is_prepared() {
            self.backend.duration()
        } else {
            Duration::ZERO
        }
    }


    pub fn set_gain( &mut self, gain: f32 ) {
        if self.state != PlaybackState::Stopped {
            self.backend.set_gain( gain );
        }
    }


    /// Drops the current source and returns to Idle.
    pub fn stop( &mut self ) {
        if self.state == PlaybackState::Stopped {
            return;
        }
        self.backend.reset();
        self.state = PlaybackState::Idle;
    }


    /// Releases the backend for good. Returns false if already released.
    pub fn release( &mut self ) -> bool {
        if self.state == PlaybackState::Stopped {
            return false;
        }
        self.backend.release();
        self.state = PlaybackState::Stopped;
        self.locator = None;
        true
    }


    pub fn state( &self ) -> PlaybackState {
        self.state
    }


    pub fn is_playing( &self ) -> bool {
        self.state == PlaybackState::Playing
    }


    pub fn is_prepared( &self ) -> bool {
        self.state.is_prepared()
    }


    /// Gets the token of the most recent load.
    pub fn token( &self ) -> SourceToken {
        self.token
    }


    /// Gets the locator of the most recent load.
    pub fn locator( &self ) -> Option<&str> {
        self.locator.as_deref()
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::mock::{ tracks, Call, MockBackend };


    fn prepared_engine() -> ( PlaybackEngine<MockBackend>, MockBackend ) {
        let probe = MockBackend::new();
        let mut engine = PlaybackEngine::new( probe.clone() );
        let token = engine.load( &tracks( 1 )[ 0 ] ).unwrap();
        assert_eq!( engine.handle_event( BackendEvent::Prepared { token } ), Some( EngineSignal::Started ) );
        ( engine, probe )
    }


    #[test]
    fn test_load_mints_fresh_tokens() {
        let probe = MockBackend::new();
        let mut engine = PlaybackEngine::new( probe.clone() );
        let list = tracks( 2 );

        let first = engine.load( &list[ 0 ] ).unwrap();
        let second = engine.load( &list[ 1 ] ).unwrap();

        assert_eq!( first.value(), 1 );
        assert_ne!( first, second );
        assert_eq!( engine.state(), PlaybackState::Preparing );
        assert_eq!( probe.loaded(), vec![ "/music/0.mp3", "/music/1.mp3" ] );
        assert_eq!( probe.calls()[ 0 ], Call::Reset );
    }


    #[test]
    fn test_stale_events_are_dropped() {
        let probe = MockBackend::new();
        let mut engine = PlaybackEngine::new( probe.clone() );
        let list = tracks( 2 );

        let stale = engine.load( &list[ 0 ] ).unwrap();
        engine.load( &list[ 1 ] ).unwrap();

        assert_eq!( engine.handle_event( BackendEvent::Prepared { token: stale } ), None );
        assert_eq!( engine.handle_event( BackendEvent::Completed { token: stale } ), None );
        assert_eq!( engine.state(), PlaybackState::Preparing );
        assert!( !probe.calls().contains( &Call::Start ) );
    }


    #[test]
    fn test_error_classification_depends_on_state() {
        let probe = MockBackend::new();
        let mut engine = PlaybackEngine::new( probe );
        let token = engine.load( &tracks( 1 )[ 0 ] ).unwrap();
        assert_eq!(
            engine.handle_event( BackendEvent::Error { token, code: -1004, extra: 0 } ),
            Some( EngineSignal::SourceFailed { code: -1004, extra: 0 } )
        );
        assert_eq!( engine.state(), PlaybackState::Idle );

        let ( mut engine, _ ) = prepared_engine();
        let token = engine.token();
        assert_eq!(
            engine.handle_event( BackendEvent::Error { token, code: -1007, extra: 3 } ),
            Some( EngineSignal::Faulted { code: -1007, extra: 3 } )
        );
        assert_eq!( engine.state(), PlaybackState::Idle );
    }


    #[test]
    fn test_synchronous_open_failure_returns_to_idle() {
        let probe = MockBackend::new();
        probe.fail_open( "/music/0.mp3" );
        let mut engine = PlaybackEngine::new( probe );

        let err = engine.load( &tracks( 1 )[ 0 ] ).unwrap_err();
        assert!( matches!( err, EngineError::Load { .. } ) );
        assert_eq!( engine.state(), PlaybackState::Idle );
    }


    #[test]
    fn test_toggle_requires_prepared_source() {
        let mut engine = PlaybackEngine::new( MockBackend::new() );
        assert_eq!( engine.toggle_play_pause().unwrap(), None );

        let ( mut engine, probe ) = prepared_engine();
        assert_eq!( engine.toggle_play_pause().unwrap(), Some( false ) );
        assert_eq!( engine.state(), PlaybackState::Paused );
        assert_eq!( engine.toggle_play_pause().unwrap(), Some( true ) );
        assert!( probe.state().playing );
    }


    #[test]
    fn test_position_is_zero_unless_prepared() {
        let probe = MockBackend::new();
        probe.set_position( Duration::from_secs( 9 ) );
        let mut engine = PlaybackEngine::new( probe.clone() );
        assert_eq!( engine.position(), Duration::ZERO );
        assert!( !engine.seek_to( Duration::from_secs( 1 ) ).unwrap() );

        engine.load( &tracks( 1 )[ 0 ] ).unwrap();
        assert_eq!( engine.position(), Duration::ZERO );
    }


    #[test]
    fn test_completion_only_when_prepared() {
        let ( mut engine, _ ) = prepared_engine();
        let token = engine.token();
        assert_eq!( engine.handle_event( BackendEvent::Completed { token } ), Some( EngineSignal::Completed ) );
        assert_eq!( engine.handle_event( BackendEvent::Completed { token } ), None );
    }


    #[test]
    fn test_release_is_idempotent() {
        let ( mut engine, probe ) = prepared_engine();
        assert!( engine.release() );
        assert!( !engine.release() );
        assert_eq!( probe.release_count(), 1 );
        assert_eq!( engine.state(), PlaybackState::Stopped );
        assert!( matches!( engine.load( &tracks( 1 )[ 0 ] ), Err( EngineError::Stopped ) ) );
    }
}
