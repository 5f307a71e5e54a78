//! Test doubles for the backend, focus and notification seams.

use std::collections::HashSet;
use std::sync::{ Arc, Mutex, MutexGuard };
use std::time::Duration;

use crate::backend::{ AudioBackend, BackendError, BackendEvent, BackendNotifier, SourceToken };
use crate::focus::{ FocusGain, FocusProvider, StreamType };
use crate::surface::{ NowPlaying, NowPlayingSurface };
use crate::track::Track;


#[derive( Debug, Clone, PartialEq )]
pub enum Call {
    Reset,
    SetSource( String ),
    Prepare( SourceToken ),
    Start,
    Pause,
    Seek( Duration ),
    Gain( f32 ),
    Release,
}


#[derive( Debug, Default )]
pub struct MockState {
    pub calls: Vec<Call>,
    pub position: Duration,
    pub duration: Duration,
    pub playing: bool,
    pub token: Option<SourceToken>,
    pub unopenable: HashSet<String>,
    pub unpreparable: HashSet<String>,
    source: Option<String>,
}


/// Backend that records every call.
///
/// Clones share state, so a test can keep one to inspect what the engine did
/// with the other. With a notifier attached, `prepare_async` reports its
/// result immediately.
#[derive( Clone, Default )]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    notifier: Option<BackendNotifier>,
}


impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }


    pub fn with_notifier( mut self, notifier: BackendNotifier ) -> Self {
        self.notifier = Some( notifier );
        self
    }


    pub fn state( &self ) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }


    /// Makes `set_source` fail for `locator`.
    pub fn fail_open( &self, locator: &str ) {
        self.state().unopenable.insert( locator.to_string() );
    }


    /// Makes preparation of `locator` end in an error event.
    pub fn fail_prepare( &self, locator: &str ) {
        self.state().unpreparable.insert( locator.to_string() );
    }


    pub fn set_position( &self, position: Duration ) {
        self.state().position = position;
    }


    pub fn calls( &self ) -> Vec<Call> {
        self.state().calls.clone()
    }


    pub fn clear_calls( &self ) {
        self.state().calls.clear();
    }


    /// Token handed to the most recent `prepare_async`.
    pub fn last_token( &self ) -> SourceToken {
        self.state().token.unwrap_or_default()
    }


    /// Locators passed to `set_source`, in order.
    pub fn loaded( &self ) -> Vec<String> {
        self.state()
            .calls
            .iter()
            .filter_map( |call| match call {
                Call::SetSource( locator ) => Some( locator.clone() ),
                _ => None,
            })
            .collect()
    }


    pub fn release_count( &self ) -> usize {
        self.state().calls.iter().filter( |call| **call == Call::Release ).count()
    }


    pub fn last_gain( &self ) -> Option<f32> {
        self.state().calls.iter().rev().find_map( |call| match call {
            Call::Gain( gain ) => Some( *gain ),
            _ => None,
        })
    }
}


impl AudioBackend for MockBackend {
    fn reset( &mut self ) {
        let mut state = self.state();
        state.calls.push( Call::Reset );
        state.playing = false;
        state.position = Duration::ZERO;
        state.source = None;
    }

    fn set_source( &mut self, locator: &str ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push( Call::SetSource( locator.to_string() ) );
        if state.unopenable.contains( locator ) {
            return Err( BackendError::SourceOpen {
                locator: locator.to_string(),
                reason: "unopenable".into(),
            });
        }
        state.source = Some( locator.to_string() );
        Ok(())
    }

    fn prepare_async( &mut self, token: SourceToken ) -> Result<(), BackendError> {
        let failed = {
            let mut state = self.state();
            state.calls.push( Call::Prepare( token ) );
            state.token = Some( token );
            let Some( source ) = state.source.as_ref() else {
                return Err( BackendError::NoSource );
            };
            state.unpreparable.contains( source )
        };

        if let Some( notifier ) = &self.notifier {
            if failed {
                notifier.notify( BackendEvent::Error { token, code: -1010, extra: 0 } );
            } else {
                notifier.notify( BackendEvent::Prepared { token } );
            }
        }
        Ok(())
    }

    fn start( &mut self ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push( Call::Start );
        state.playing = true;
        Ok(())
    }

    fn pause( &mut self ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push( Call::Pause );
        state.playing = false;
        Ok(())
    }

    fn seek_to( &mut self, position: Duration ) -> Result<(), BackendError> {
        let mut state = self.state();
        state.calls.push( Call::Seek( position ) );
        state.position = position;
        Ok(())
    }

    fn position( &self ) -> Duration {
        self.state().position
    }

    fn duration( &self ) -> Duration {
        self.state().duration
    }

    fn is_playing( &self ) -> bool {
        self.state().playing
    }

    fn set_gain( &mut self, gain: f32 ) {
        self.state().calls.push( Call::Gain( gain ) );
    }

    fn release( &mut self ) {
        let mut state = self.state();
        state.calls.push( Call::Release );
        state.playing = false;
    }
}


#[derive( Debug, Default )]
pub struct FocusLog {
    pub requests: usize,
    pub abandons: usize,
}


/// Focus provider that counts requests and grants or denies all of them.
#[derive( Clone )]
pub struct RecordingFocus {
    log: Arc<Mutex<FocusLog>>,
    grant: bool,
}


impl RecordingFocus {
    pub fn granting() -> Self {
        Self { log: Arc::default(), grant: true }
    }


    pub fn denying() -> Self {
        Self { log: Arc::default(), grant: false }
    }


    pub fn requests( &self ) -> usize {
        self.log.lock().unwrap().requests
    }


    pub fn abandons( &self ) -> usize {
        self.log.lock().unwrap().abandons
    }
}


impl FocusProvider for RecordingFocus {
    fn request_focus( &mut self, _stream: StreamType, _gain: FocusGain ) -> bool {
        self.log.lock().unwrap().requests += 1;
        self.grant
    }

    fn abandon_focus( &mut self ) {
        self.log.lock().unwrap().abandons += 1;
    }
}


/// Surface that keeps every update. `None` entries are clears.
#[derive( Clone, Default )]
pub struct RecordingSurface {
    log: Arc<Mutex<Vec<Option<NowPlaying>>>>,
}


impl RecordingSurface {
    pub fn history( &self ) -> Vec<Option<NowPlaying>> {
        self.log.lock().unwrap().clone()
    }


    pub fn last( &self ) -> Option<Option<NowPlaying>> {
        self.log.lock().unwrap().last().cloned()
    }
}


impl NowPlayingSurface for RecordingSurface {
    fn show( &mut self, now_playing: &NowPlaying ) {
        self.log.lock().unwrap().push( Some( now_playing.clone() ) );
    }

    fn clear( &mut self ) {
        self.log.lock().unwrap().push( None );
    }
}


/// Builds `count` tracks with locators `/music/0.mp3`, `/music/1.mp3`, ...
pub fn tracks( count: usize ) -> Vec<Track> {
    ( 0..count )
        .map( |i| {
            Track::new( i as i64, format!( "/music/{}.mp3", i ) )
                .with_title( Some( format!( "Song {}", i ) ) )
                .with_artist( Some( "Artist".into() ) )
        })
        .collect()
}
