//! Session controller
//!
//! Owns the queue, the engine, focus and the now-playing surface, and turns
//! transport commands and backend events into state changes plus a list of
//! observer notices. It runs synchronously on whichever thread owns it; the
//! session actor feeds it messages one at a time and drains its notices
//! after each.

use std::time::Duration;

use crate::backend::{ AudioBackend, BackendEvent };
use crate::config::SessionConfig;
use crate::engine::{ EngineSignal, PlaybackEngine, PlaybackState };
use crate::fault::PlaybackFault;
use crate::focus::{ FocusArbitrator, FocusKind, FocusProvider };
use crate::observer::PlaybackNotice;
use crate::queue::{ Direction, QueueManager, RepeatMode };
use crate::session::{ SessionCommand, SessionSnapshot };
use crate::surface::{ NowPlaying, NowPlayingSurface };
use crate::track::Track;


pub type BoxedFocus = Box<dyn FocusProvider + Send>;
pub type BoxedSurface = Box<dyn NowPlayingSurface + Send>;


/// The playback session's state machine.
pub struct SessionController<B: AudioBackend> {
    config: SessionConfig,
    queue: QueueManager,
    engine: PlaybackEngine<B>,
    focus: FocusArbitrator<BoxedFocus>,
    surface: BoxedSurface,
    notices: Vec<PlaybackNotice>,
    /// Last play state reported to observers
    announced_playing: bool,
    /// Consecutive open failures in the current skip chain
    failed_in_row: usize,
    released: bool,
}


impl<B: AudioBackend> SessionController<B> {
    pub fn new( config: SessionConfig, backend: B, focus: BoxedFocus, surface: BoxedSurface ) -> Self {
        Self::with_queue( config, QueueManager::new(), backend, focus, surface )
    }


    /// Creates a controller around a given queue, e.g. a seeded one.
    pub fn with_queue(
        config: SessionConfig,
        queue: QueueManager,
        backend: B,
        focus: BoxedFocus,
        surface: BoxedSurface,
    ) -> Self {
        let focus = FocusArbitrator::new( focus, config.duck_gain );
        Self {
            config,
            queue,
            engine: PlaybackEngine::new( backend ),
            focus,
            surface,
            notices: Vec::new(),
            announced_playing: false,
            failed_in_row: 0,
            released: false,
        }
    }


    /// Applies one transport command.
    pub fn apply( &mut self, command: SessionCommand ) {
        match command {
            SessionCommand::SetSongList( tracks ) => self.set_song_list( tracks ),
            SessionCommand::PlayAt( index ) => self.play_track_at_index( index ),
            SessionCommand::Next => self.play_next(),
            SessionCommand::Prev => self.play_prev(),
            SessionCommand::TogglePlayPause => self.toggle_play_pause(),
            SessionCommand::SeekTo( position ) => self.seek_to( position ),
            SessionCommand::ToggleShuffle => self.toggle_shuffle(),
            SessionCommand::SetShuffle( on ) => self.set_shuffle( on ),
            SessionCommand::CycleRepeat => {
                self.cycle_repeat();
            }
            SessionCommand::SetRepeat( mode ) => self.set_repeat( mode ),
        }
    }


    /// Replaces the source list. Playback of the current audio is not
    /// interrupted.
    pub fn set_song_list( &mut self, tracks: Vec<Track> ) {
        if self.released {
            return;
        }
        tracing::info!( "Song list set: {} tracks", tracks.len() );
        self.queue.set_source_list( tracks );
    }


    /// Plays the track at `index` of the source list.
    ///
    /// Without shuffle an out-of-range index falls back to the first track.
    /// With shuffle an out-of-range index keeps the current position.
    pub fn play_track_at_index( &mut self, index: usize ) {
        if !self.ready_for_transport() {
            return;
        }

        if self.queue.select_by_original_index( index ).is_none() && !self.queue.shuffle() {
            tracing::debug!( "Index {} out of range, playing from the top", index );
            self.queue.select_by_original_index( 0 );
        }

        self.failed_in_row = 0;
        self.play_current();
    }


    /// Moves to the next queue entry. At the end with repeat off, playback
    /// ends.
    pub fn play_next( &mut self ) {
        if !self.ready_for_transport() {
            return;
        }

        self.failed_in_row = 0;
        if self.queue.advance( Direction::Next ).is_some() {
            self.play_current();
        } else {
            self.end_playback();
        }
    }


    /// Restarts the current track once past the restart threshold, otherwise
    /// moves to the previous entry.
    pub fn play_prev( &mut self ) {
        if !self.ready_for_transport() {
            return;
        }

        if self.engine.is_prepared() && self.engine.position() > self.config.restart_threshold {
            if let Err( e ) = self.engine.seek_to( Duration::ZERO ) {
                tracing::warn!( "Failed to restart track: {}", e );
                return;
            }
            if let Some( track ) = self.queue.current().cloned() {
                self.notices.push( PlaybackNotice::SongChanged( track ) );
            }
            return;
        }

        self.failed_in_row = 0;
        self.queue.advance( Direction::Prev );
        self.play_current();
    }


    /// Pauses or resumes. Does nothing unless a track is prepared.
    pub fn toggle_play_pause( &mut self ) {
        if self.released {
            return;
        }

        match self.engine.toggle_play_pause() {
            Ok( Some( playing ) ) => {
                self.focus.clear_interruption();
                self.show_now_playing( playing );
                self.announce_playing( playing );
            }
            Ok( None ) => tracing::debug!( "Nothing prepared to toggle" ),
            Err( e ) => tracing::warn!( "Toggle failed: {}", e ),
        }
    }


    /// Seeks within the current track. Ignored unless prepared.
    pub fn seek_to( &mut self, position: Duration ) {
        if self.released {
            return;
        }
        if let Err( e ) = self.engine.seek_to( position ) {
            tracing::warn!( "Seek to {:?} failed: {}", position, e );
        }
    }


    pub fn toggle_shuffle( &mut self ) {
        if self.released {
            return;
        }
        self.queue.toggle_shuffle();
        tracing::info!( "Shuffle {}", if self.queue.shuffle() { "on" } else { "off" } );
    }


    pub fn set_shuffle( &mut self, on: bool ) {
        if self.released {
            return;
        }
        self.queue.set_shuffle( on );
    }


    pub fn cycle_repeat( &mut self ) -> RepeatMode {
        if self.released {
            return self.queue.repeat();
        }
        let mode = self.queue.cycle_repeat();
        tracing::info!( "Repeat {}", mode.label() );
        mode
    }


    pub fn set_repeat( &mut self, mode: RepeatMode ) {
        if self.released {
            return;
        }
        self.queue.set_repeat( mode );
    }


    /// Applies a platform focus change.
    pub fn focus_changed( &mut self, kind: FocusKind ) {
        if self.released {
            return;
        }

        let action = self.focus.on_focus_change( kind, self.engine.is_playing() );

        if action.pause {
            match self.engine.pause() {
                Ok( true ) => {
                    self.show_now_playing( false );
                    self.announce_playing( false );
                }
                Ok( false ) => {}
                Err( e ) => tracing::warn!( "Pause on focus loss failed: {}", e ),
            }
        }

        if let Some( gain ) = action.gain {
            self.engine.set_gain( gain );
        }

        if action.resume {
            match self.engine.resume() {
                Ok( true ) => {
                    self.show_now_playing( true );
                    self.announce_playing( true );
                }
                Ok( false ) => {}
                Err( e ) => tracing::warn!( "Resume on focus gain failed: {}", e ),
            }
        }
    }


    /// Applies a backend notification. Stale notifications are dropped.
    pub fn handle_backend_event( &mut self, event: BackendEvent ) {
        if self.released {
            return;
        }

        let Some( signal ) = self.engine.handle_event( event ) else {
            return;
        };

        match signal {
            EngineSignal::Started => self.on_started(),
            EngineSignal::Completed => self.on_completed(),
            EngineSignal::SourceFailed { code, extra } => {
                tracing::debug!( "Source failed with code {} extra {}", code, extra );
                self.log_source_failure();
                if self.skip_after_failure() {
                    self.play_current();
                }
            }
            EngineSignal::Faulted { code, extra } => self.on_fault( code, extra ),
        }
    }


    /// Releases the backend, abandons focus and clears the notification.
    /// Safe to call repeatedly.
    pub fn shutdown( &mut self ) {
        if self.released {
            return;
        }
        self.released = true;

        tracing::info!( "Shutting down playback session" );
        self.engine.release();
        self.focus.abandon();
        self.surface.clear();
    }


    /// Takes the notices produced since the last call.
    pub fn take_notices( &mut self ) -> Vec<PlaybackNotice> {
        std::mem::take( &mut self.notices )
    }


    pub fn snapshot( &self ) -> SessionSnapshot {
        SessionSnapshot {
            track: self.queue.current().cloned(),
            state: self.engine.state(),
            playing: self.engine.is_playing(),
            shuffle: self.queue.shuffle(),
            repeat: self.queue.repeat(),
            position: self.engine.position(),
            duration: self.engine.duration(),
            queue_len: self.queue.len(),
            current_index: self.queue.current_index(),
        }
    }


    pub fn current_track( &self ) -> Option<&Track> {
        self.queue.current()
    }


    pub fn is_playing( &self ) -> bool {
        self.engine.is_playing()
    }


    pub fn is_shuffle_on( &self ) -> bool {
        self.queue.shuffle()
    }


    pub fn repeat_mode( &self ) -> RepeatMode {
        self.queue.repeat()
    }


    pub fn position( &self ) -> Duration {
        self.engine.position()
    }


    pub fn duration( &self ) -> Duration {
        self.engine.duration()
    }


    pub fn state( &self ) -> PlaybackState {
        self.engine.state()
    }


    pub fn queue( &self ) -> &QueueManager {
        &self.queue
    }


    fn ready_for_transport( &self ) -> bool {
        if self.released {
            return false;
        }
        if self.queue.is_empty() {
            tracing::debug!( "{}", PlaybackFault::EmptyQueue );
            return false;
        }
        true
    }


    /// Loads the current queue entry, skipping forward past entries that
    /// fail to open synchronously.
    fn play_current( &mut self ) {
        loop {
            let Some( track ) = self.queue.current().cloned() else {
                return;
            };

            match self.engine.load( &track ) {
                Ok( token ) => {
                    tracing::info!( "Loading {:?} ({}) {}", track.title(), track.locator(), token );
                    return;
                }
                Err( e ) => {
                    tracing::warn!( "{}: {}", PlaybackFault::SourceOpen { locator: track.locator().into() }, e );
                    if !self.skip_after_failure() {
                        return;
                    }
                }
            }
        }
    }


    fn log_source_failure( &self ) {
        let locator = self.engine.locator().unwrap_or_default().to_string();
        tracing::warn!( "{}", PlaybackFault::SourceOpen { locator } );
    }


    /// Counts a failed open and moves to the next entry.
    ///
    /// @returns Whether there is another entry worth trying
    fn skip_after_failure( &mut self ) -> bool {
        self.failed_in_row += 1;

        if self.failed_in_row >= self.queue.len() {
            self.nothing_playable();
            return false;
        }

        if self.queue.advance( Direction::Next ).is_none() {
            self.end_playback();
            return false;
        }

        true
    }


    fn on_started( &mut self ) {
        self.failed_in_row = 0;
        self.focus.ensure_requested();

        let Some( track ) = self.queue.current().cloned() else {
            return;
        };

        tracing::info!( "Playing {:?} by {:?}", track.title(), track.artist() );
        self.show_now_playing( true );
        self.notices.push( PlaybackNotice::SongChanged( track ) );
        self.notices.push( PlaybackNotice::PlayStateChanged( true ) );
        self.announced_playing = true;
    }


    fn on_completed( &mut self ) {
        if self.queue.repeat() == RepeatMode::One {
            self.play_current();
            return;
        }

        if self.queue.advance( Direction::Next ).is_some() {
            self.play_current();
        } else {
            tracing::info!( "Reached end of queue" );
            self.end_playback();
        }
    }


    fn on_fault( &mut self, code: i32, extra: i32 ) {
        let fault = PlaybackFault::Decoder {
            locator: self.engine.locator().unwrap_or_default().to_string(),
            code,
            extra,
        };
        tracing::error!( "{}", fault );

        self.surface.clear();
        if self.announced_playing {
            self.announce_playing( false );
        }
        self.notices.push( PlaybackNotice::Error( fault.to_string() ) );
    }


    /// Stops the engine and clears the notification. Observers hear about it
    /// only if they last heard that something was playing.
    fn end_playback( &mut self ) {
        self.engine.stop();
        self.surface.clear();
        if self.announced_playing {
            self.announce_playing( false );
        }
    }


    fn nothing_playable( &mut self ) {
        tracing::warn!( "{}", PlaybackFault::NothingPlayable );
        self.failed_in_row = 0;
        self.end_playback();
        self.notices.push( PlaybackNotice::NothingPlayable );
        self.notices.push( PlaybackNotice::Error( PlaybackFault::NothingPlayable.to_string() ) );
    }


    fn show_now_playing( &mut self, playing: bool ) {
        let Some( track ) = self.queue.current() else {
            return;
        };
        let now_playing = NowPlaying {
            title: track.title().to_string(),
            artist: track.artist().to_string(),
            playing,
        };
        self.surface.show( &now_playing );
    }


    fn announce_playing( &mut self, playing: bool ) {
        self.announced_playing = playing;
        self.notices.push( PlaybackNotice::PlayStateChanged( playing ) );
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::backend::SourceToken;
    use crate::mock::{ tracks, Call, MockBackend, RecordingFocus, RecordingSurface };


    struct Harness {
        controller: SessionController<MockBackend>,
        backend: MockBackend,
        focus: RecordingFocus,
        surface: RecordingSurface,
    }


    impl Harness {
        fn new( count: usize ) -> Self {
            let backend = MockBackend::new();
            let focus = RecordingFocus::granting();
            let surface = RecordingSurface::default();
            let mut controller = SessionController::with_queue(
                SessionConfig::default(),
                QueueManager::with_seed( 7 ),
                backend.clone(),
                Box::new( focus.clone() ),
                Box::new( surface.clone() ),
            );
            controller.set_song_list( tracks( count ) );
            Self { controller, backend, focus, surface }
        }


        fn token( &self ) -> SourceToken {
            self.backend.last_token()
        }


        fn prepare( &mut self ) {
            let token = self.token();
            self.controller.handle_backend_event( BackendEvent::Prepared { token } );
        }


        fn fail_prepare( &mut self ) {
            let token = self.token();
            self.controller.handle_backend_event( BackendEvent::Error { token, code: -1004, extra: 0 } );
        }


        fn complete( &mut self ) {
            let token = self.token();
            self.controller.handle_backend_event( BackendEvent::Completed { token } );
        }


        fn playing_title( &self ) -> Option<String> {
            self.controller.current_track().map( |t| t.title().to_string() )
        }
    }


    #[test]
    fn test_play_emits_song_then_play_state() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 1 );
        assert!( h.controller.take_notices().is_empty() );

        h.prepare();
        let notices = h.controller.take_notices();
        assert_eq!( notices.len(), 2 );
        assert!( matches!( &notices[ 0 ], PlaybackNotice::SongChanged( t ) if t.title() == "Song 1" ) );
        assert_eq!( notices[ 1 ], PlaybackNotice::PlayStateChanged( true ) );
        assert!( h.controller.is_playing() );
        assert_eq!( h.focus.requests(), 1 );

        let shown = h.surface.last().flatten().unwrap();
        assert_eq!( shown.title, "Song 1" );
        assert!( shown.playing );
    }


    #[test]
    fn test_completion_advances_and_end_stops() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 0 );
        h.prepare();

        h.complete();
        h.prepare();
        assert_eq!( h.playing_title().as_deref(), Some( "Song 1" ) );
        h.complete();
        h.prepare();
        h.controller.take_notices();

        h.complete();
        assert_eq!( h.controller.state(), PlaybackState::Idle );
        assert_eq!( h.controller.take_notices(), vec![ PlaybackNotice::PlayStateChanged( false ) ] );
        assert_eq!( h.surface.last(), Some( None ) );
        assert_eq!( h.playing_title().as_deref(), Some( "Song 2" ) );
    }


    #[test]
    fn test_repeat_all_wraps_and_repeat_one_replays() {
        let mut h = Harness::new( 2 );
        h.controller.set_repeat( RepeatMode::All );
        h.controller.play_track_at_index( 1 );
        h.prepare();
        h.complete();
        h.prepare();
        assert_eq!( h.playing_title().as_deref(), Some( "Song 0" ) );

        h.controller.set_repeat( RepeatMode::One );
        h.backend.clear_calls();
        h.complete();
        assert_eq!( h.backend.loaded(), vec![ "/music/0.mp3" ] );
    }


    #[test]
    fn test_failed_track_is_skipped() {
        let mut h = Harness::new( 3 );
        h.backend.fail_prepare( "/music/1.mp3" );
        h.controller.play_track_at_index( 0 );
        h.prepare();
        h.complete();

        // B fails to prepare; C plays
        h.fail_prepare();
        h.prepare();

        assert_eq!( h.playing_title().as_deref(), Some( "Song 2" ) );
        assert!( h.controller.is_playing() );
        assert_eq!( h.backend.loaded(), vec![ "/music/0.mp3", "/music/1.mp3", "/music/2.mp3" ] );
    }


    #[test]
    fn test_next_plays_through_then_stays_stopped() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 0 );
        h.prepare();
        h.controller.play_next();
        h.prepare();
        h.controller.play_next();
        h.prepare();
        assert_eq!( h.backend.loaded(), vec![ "/music/0.mp3", "/music/1.mp3", "/music/2.mp3" ] );

        h.controller.play_next();
        assert!( !h.controller.is_playing() );
        h.controller.play_next();
        assert!( !h.controller.is_playing() );
        assert_eq!( h.backend.loaded().len(), 3 );
    }


    #[test]
    fn test_manual_next_skips_unopenable_track() {
        let mut h = Harness::new( 3 );
        h.backend.fail_open( "/music/1.mp3" );
        h.controller.play_track_at_index( 0 );
        h.prepare();

        h.controller.play_next();
        h.prepare();

        assert_eq!( h.backend.loaded(), vec![ "/music/0.mp3", "/music/1.mp3", "/music/2.mp3" ] );
        assert_eq!( h.playing_title().as_deref(), Some( "Song 2" ) );
        assert!( h.controller.is_playing() );
    }


    #[test]
    fn test_synchronous_open_failures_are_skipped() {
        let mut h = Harness::new( 3 );
        h.backend.fail_open( "/music/0.mp3" );
        h.backend.fail_open( "/music/1.mp3" );
        h.controller.play_track_at_index( 0 );

        assert_eq!( h.playing_title().as_deref(), Some( "Song 2" ) );
        assert_eq!( h.controller.state(), PlaybackState::Preparing );
    }


    #[test]
    fn test_all_failures_end_in_nothing_playable() {
        let mut h = Harness::new( 3 );
        h.controller.set_repeat( RepeatMode::All );
        for i in 0..3 {
            h.backend.fail_open( &format!( "/music/{}.mp3", i ) );
        }
        h.controller.play_track_at_index( 0 );

        assert_eq!( h.controller.state(), PlaybackState::Idle );
        assert_eq!( h.backend.loaded().len(), 3 );
        let notices = h.controller.take_notices();
        assert!( notices.contains( &PlaybackNotice::NothingPlayable ) );
        assert!( notices.iter().any( |n| matches!( n, PlaybackNotice::Error( _ ) ) ) );
    }


    #[test]
    fn test_failure_at_end_of_queue_stops() {
        let mut h = Harness::new( 2 );
        h.backend.fail_prepare( "/music/1.mp3" );
        h.controller.play_track_at_index( 1 );
        h.fail_prepare();

        assert_eq!( h.controller.state(), PlaybackState::Idle );
        assert_eq!( h.backend.loaded().len(), 1 );
    }


    #[test]
    fn test_decoder_fault_stops_without_advancing() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 0 );
        h.prepare();
        h.controller.take_notices();

        let token = h.token();
        h.controller.handle_backend_event( BackendEvent::Error { token, code: -1007, extra: 0 } );

        assert_eq!( h.controller.state(), PlaybackState::Idle );
        assert_eq!( h.playing_title().as_deref(), Some( "Song 0" ) );
        assert_eq!( h.backend.loaded().len(), 1 );
        let notices = h.controller.take_notices();
        assert_eq!( notices[ 0 ], PlaybackNotice::PlayStateChanged( false ) );
        assert!( matches!( &notices[ 1 ], PlaybackNotice::Error( _ ) ) );
        assert_eq!( h.surface.last(), Some( None ) );
    }


    #[test]
    fn test_stale_prepared_is_ignored() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 0 );
        let stale = h.token();
        h.controller.play_next();

        h.controller.handle_backend_event( BackendEvent::Prepared { token: stale } );
        assert!( !h.controller.is_playing() );
        assert!( h.controller.take_notices().is_empty() );

        h.prepare();
        assert_eq!( h.playing_title().as_deref(), Some( "Song 1" ) );
    }


    #[test]
    fn test_prev_restarts_after_threshold() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 1 );
        h.prepare();
        h.controller.take_notices();
        h.backend.set_position( Duration::from_millis( 5000 ) );
        h.backend.clear_calls();

        h.controller.play_prev();

        assert_eq!( h.backend.calls(), vec![ Call::Seek( Duration::ZERO ) ] );
        assert_eq!( h.playing_title().as_deref(), Some( "Song 1" ) );
        let notices = h.controller.take_notices();
        assert!( matches!( &notices[ .. ], [ PlaybackNotice::SongChanged( t ) ] if t.title() == "Song 1" ) );
    }


    #[test]
    fn test_prev_goes_back_before_threshold() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 1 );
        h.prepare();
        h.backend.set_position( Duration::from_millis( 1000 ) );

        h.controller.play_prev();
        assert_eq!( h.playing_title().as_deref(), Some( "Song 0" ) );

        // No wrap without repeat
        h.prepare();
        h.controller.play_prev();
        assert_eq!( h.playing_title().as_deref(), Some( "Song 0" ) );
    }


    #[test]
    fn test_next_at_end_without_repeat_ends_playback() {
        let mut h = Harness::new( 2 );
        h.controller.play_track_at_index( 1 );
        h.prepare();
        h.controller.take_notices();

        h.controller.play_next();
        assert_eq!( h.controller.state(), PlaybackState::Idle );
        assert_eq!( h.controller.current_track().map( |t| t.id() ), Some( 1 ) );
        assert_eq!( h.controller.take_notices(), vec![ PlaybackNotice::PlayStateChanged( false ) ] );

        h.controller.play_next();
        assert!( h.controller.take_notices().is_empty() );
    }


    #[test]
    fn test_toggle_is_noop_until_prepared() {
        let mut h = Harness::new( 2 );
        h.controller.toggle_play_pause();
        h.controller.play_track_at_index( 0 );
        h.controller.toggle_play_pause();
        assert!( h.controller.take_notices().is_empty() );

        h.prepare();
        h.controller.take_notices();
        h.controller.toggle_play_pause();
        assert_eq!( h.controller.take_notices(), vec![ PlaybackNotice::PlayStateChanged( false ) ] );
        let shown = h.surface.last().flatten().unwrap();
        assert!( !shown.playing );

        h.controller.toggle_play_pause();
        assert!( h.controller.is_playing() );
    }


    #[test]
    fn test_out_of_range_index_policies() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 42 );
        assert_eq!( h.playing_title().as_deref(), Some( "Song 0" ) );

        let mut h = Harness::new( 3 );
        h.controller.set_shuffle( true );
        let before = h.controller.queue().current_index();
        h.controller.play_track_at_index( 42 );
        assert_eq!( h.controller.queue().current_index(), before );
    }


    #[test]
    fn test_empty_queue_is_noop() {
        let mut h = Harness::new( 0 );
        h.controller.play_track_at_index( 0 );
        h.controller.play_next();
        h.controller.play_prev();
        h.controller.toggle_play_pause();

        assert_eq!( h.controller.state(), PlaybackState::Idle );
        assert!( h.backend.calls().is_empty() );
        assert!( h.controller.take_notices().is_empty() );
    }


    #[test]
    fn test_shuffle_toggle_keeps_current_track() {
        let mut h = Harness::new( 10 );
        h.controller.play_track_at_index( 4 );
        h.prepare();
        h.backend.clear_calls();

        h.controller.toggle_shuffle();
        assert_eq!( h.controller.queue().current_index(), Some( 0 ) );
        assert_eq!( h.playing_title().as_deref(), Some( "Song 4" ) );

        h.controller.toggle_shuffle();
        assert_eq!( h.controller.queue().current_index(), Some( 4 ) );
        assert!( h.backend.calls().is_empty() );
    }


    #[test]
    fn test_focus_loss_pauses_and_gain_resumes() {
        let mut h = Harness::new( 2 );
        h.controller.play_track_at_index( 0 );
        h.prepare();
        h.controller.take_notices();

        h.controller.focus_changed( FocusKind::LossTransient );
        assert_eq!( h.controller.state(), PlaybackState::Paused );
        assert_eq!( h.controller.take_notices(), vec![ PlaybackNotice::PlayStateChanged( false ) ] );

        h.controller.focus_changed( FocusKind::Gain );
        assert!( h.controller.is_playing() );
        assert_eq!( h.controller.take_notices(), vec![ PlaybackNotice::PlayStateChanged( true ) ] );
    }


    #[test]
    fn test_ducking_adjusts_gain_only() {
        let mut h = Harness::new( 2 );
        h.controller.play_track_at_index( 0 );
        h.prepare();

        h.controller.focus_changed( FocusKind::LossTransientCanDuck );
        assert_eq!( h.backend.last_gain(), Some( 0.3 ) );
        assert!( h.controller.is_playing() );

        h.controller.focus_changed( FocusKind::Gain );
        assert_eq!( h.backend.last_gain(), Some( 1.0 ) );
    }


    #[test]
    fn test_shutdown_is_idempotent() {
        let mut h = Harness::new( 2 );
        h.controller.play_track_at_index( 0 );
        h.prepare();

        h.controller.shutdown();
        h.controller.shutdown();
        h.controller.play_next();

        assert_eq!( h.backend.release_count(), 1 );
        assert_eq!( h.focus.abandons(), 1 );
        assert_eq!( h.controller.state(), PlaybackState::Stopped );
        assert_eq!( h.surface.last(), Some( None ) );
    }


    #[test]
    fn test_snapshot_reflects_state() {
        let mut h = Harness::new( 3 );
        h.controller.play_track_at_index( 2 );
        h.prepare();
        h.backend.set_position( Duration::from_secs( 12 ) );

        let snapshot = h.controller.snapshot();
        assert_eq!( snapshot.track.map( |t| t.id() ), Some( 2 ) );
        assert!( snapshot.playing );
        assert_eq!( snapshot.position, Duration::from_secs( 12 ) );
        assert_eq!( snapshot.queue_len, 3 );
        assert_eq!( snapshot.current_index, Some( 2 ) );
    }
}
