//! Playback session actor
//!
//! The session controller lives on its own thread, inside a current-thread
//! tokio runtime. Commands from the UI, backend events and focus changes all
//! arrive on one channel and are applied strictly in order. After every
//! message, and on a periodic tick, the actor publishes a `SessionSnapshot`
//! that readers on any thread can look at without blocking playback.

use std::sync::mpsc as std_mpsc;
use std::sync::{ Mutex, PoisonError };
use std::thread::{ self, JoinHandle };
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{ mpsc, watch };
use tokio::time::MissedTickBehavior;

use crate::backend::{ AudioBackend, BackendError, BackendEvent, BackendNotifier };
use crate::config::SessionConfig;
use crate::controller::{ BoxedFocus, BoxedSurface, SessionController };
use crate::engine::PlaybackState;
use crate::focus::FocusKind;
use crate::observer::{ Dispatcher, PlaybackObserver };
use crate::queue::{ QueueManager, RepeatMode };
use crate::track::Track;


/// Errors from session setup and messaging.
#[derive( Debug, Error )]
pub enum SessionError {
    #[error( "Failed to start session thread: {0}" )]
    Spawn( #[from] std::io::Error ),

    #[error( "Failed to build session runtime: {0}" )]
    Runtime( String ),

    #[error( "Failed to acquire audio backend: {0}" )]
    Backend( #[from] BackendError ),

    #[error( "Session is closed" )]
    Closed,
}


/// Transport commands accepted by a session.
#[derive( Debug, Clone, PartialEq )]
pub enum SessionCommand {
    SetSongList( Vec<Track> ),
    PlayAt( usize ),
    Next,
    Prev,
    TogglePlayPause,
    SeekTo( Duration ),
    ToggleShuffle,
    SetShuffle( bool ),
    CycleRepeat,
    SetRepeat( RepeatMode ),
}


/// Point-in-time view of the session.
#[derive( Debug, Clone, Default, PartialEq )]
pub struct SessionSnapshot {
    pub track: Option<Track>,
    pub state: PlaybackState,
    pub playing: bool,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub position: Duration,
    pub duration: Duration,
    pub queue_len: usize,
    pub current_index: Option<usize>,
}


enum SessionMessage {
    Command( SessionCommand ),
    Backend( BackendEvent ),
    Focus( FocusKind ),
    SetObserver( Option<Box<dyn PlaybackObserver>> ),
    Shutdown,
}


/// Builder-style entry point for starting a session.
pub struct Session {
    config: SessionConfig,
    queue: QueueManager,
    focus: BoxedFocus,
    surface: BoxedSurface,
}


impl Session {
    pub fn new( config: SessionConfig, focus: BoxedFocus, surface: BoxedSurface ) -> Self {
        Self {
            config,
            queue: QueueManager::new(),
            focus,
            surface,
        }
    }


    /// Uses `queue` instead of a fresh entropy-seeded one.
    pub fn with_queue( mut self, queue: QueueManager ) -> Self {
        self.queue = queue;
        self
    }


    /// Starts the session thread.
    ///
    /// The backend is built on the session thread by `make_backend`, so it
    /// need not be `Send`. Its construction error, if any, is returned here.
    ///
    /// @param make_backend - Builds the backend around the session's notifier
    /// @returns A handle owning the session
    pub fn spawn<B, F>( self, make_backend: F ) -> Result<SessionHandle, SessionError>
    where
        B: AudioBackend + 'static,
        F: FnOnce( BackendNotifier ) -> Result<B, BackendError> + Send + 'static,
    {
        let ( tx, rx ) = mpsc::unbounded_channel();
        let ( snapshot_tx, snapshot_rx ) = watch::channel( SessionSnapshot::default() );
        let ( ready_tx, ready_rx ) = std_mpsc::sync_channel::<Result<(), SessionError>>( 1 );

        let event_tx = tx.clone();
        let Session { config, queue, focus, surface } = self;

        let thread = thread::Builder::new()
            .name( "pocketbeats-session".into() )
            .spawn( move || {
                let runtime = match tokio::runtime::Builder::new_current_thread().enable_time().build() {
                    Ok( runtime ) => runtime,
                    Err( e ) => {
                        let _ = ready_tx.send( Err( SessionError::Runtime( e.to_string() ) ) );
                        return;
                    }
                };

                let notifier = BackendNotifier::new( move |event| {
                    let _ = event_tx.send( SessionMessage::Backend( event ) );
                });

                let backend = match make_backend( notifier ) {
                    Ok( backend ) => backend,
                    Err( e ) => {
                        let _ = ready_tx.send( Err( SessionError::Backend( e ) ) );
                        return;
                    }
                };

                let dispatcher = match Dispatcher::spawn() {
                    Ok( dispatcher ) => dispatcher,
                    Err( e ) => {
                        let _ = ready_tx.send( Err( SessionError::Spawn( e ) ) );
                        return;
                    }
                };

                let refresh = config.snapshot_interval;
                let controller = SessionController::with_queue( config, queue, backend, focus, surface );
                let _ = ready_tx.send( Ok(()) );

                runtime.block_on( run( controller, rx, snapshot_tx, dispatcher, refresh ) );
            })?;

        match ready_rx.recv() {
            Ok( Ok(()) ) => {
                tracing::info!( "Playback session started" );
                Ok( SessionHandle {
                    tx,
                    snapshot: snapshot_rx,
                    thread: Mutex::new( Some( thread ) ),
                })
            }
            Ok( Err( e ) ) => {
                let _ = thread.join();
                Err( e )
            }
            Err( _ ) => {
                let _ = thread.join();
                Err( SessionError::Closed )
            }
        }
    }
}


async fn run<B: AudioBackend>(
    mut controller: SessionController<B>,
    mut rx: mpsc::UnboundedReceiver<SessionMessage>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    mut dispatcher: Dispatcher,
    refresh: Duration,
) {
    let mut ticker = tokio::time::interval( refresh.max( Duration::from_millis( 10 ) ) );
    ticker.set_missed_tick_behavior( MissedTickBehavior::Skip );

    loop {
        tokio::select! {
            message = rx.recv() => {
                let Some( message ) = message else {
                    break;
                };
                match message {
                    SessionMessage::Command( command ) => controller.apply( command ),
                    SessionMessage::Backend( event ) => controller.handle_backend_event( event ),
                    SessionMessage::Focus( kind ) => controller.focus_changed( kind ),
                    SessionMessage::SetObserver( observer ) => dispatcher.register( observer ),
                    SessionMessage::Shutdown => break,
                }
            }
            _ = ticker.tick() => {}
        }

        for notice in controller.take_notices() {
            dispatcher.dispatch( notice );
        }
        snapshot_tx.send_replace( controller.snapshot() );
    }

    controller.shutdown();
    for notice in controller.take_notices() {
        dispatcher.dispatch( notice );
    }
    snapshot_tx.send_replace( controller.snapshot() );
    dispatcher.shutdown();

    tracing::info!( "Playback session stopped" );
}


/// Owning handle to a running session.
///
/// Dropping the handle shuts the session down.
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionMessage>,
    snapshot: watch::Receiver<SessionSnapshot>,
    thread: Mutex<Option<JoinHandle<()>>>,
}


impl SessionHandle {
    fn send( &self, message: SessionMessage ) -> Result<(), SessionError> {
        self.tx.send( message ).map_err( |_| SessionError::Closed )
    }


    pub fn command( &self, command: SessionCommand ) -> Result<(), SessionError> {
        self.send( SessionMessage::Command( command ) )
    }


    pub fn set_song_list( &self, tracks: Vec<Track> ) -> Result<(), SessionError> {
        self.command( SessionCommand::SetSongList( tracks ) )
    }


    pub fn play_track_at_index( &self, index: usize ) -> Result<(), SessionError> {
        self.command( SessionCommand::PlayAt( index ) )
    }


    pub fn play_next( &self ) -> Result<(), SessionError> {
        self.command( SessionCommand::Next )
    }


    pub fn play_prev( &self ) -> Result<(), SessionError> {
        self.command( SessionCommand::Prev )
    }


    pub fn toggle_play_pause( &self ) -> Result<(), SessionError> {
        self.command( SessionCommand::TogglePlayPause )
    }


    pub fn seek_to( &self, position: Duration ) -> Result<(), SessionError> {
        self.command( SessionCommand::SeekTo( position ) )
    }


    pub fn toggle_shuffle( &self ) -> Result<(), SessionError> {
        self.command( SessionCommand::ToggleShuffle )
    }


    pub fn set_shuffle( &self, on: bool ) -> Result<(), SessionError> {
        self.command( SessionCommand::SetShuffle( on ) )
    }


    pub fn cycle_repeat( &self ) -> Result<(), SessionError> {
        self.command( SessionCommand::CycleRepeat )
    }


    pub fn set_repeat( &self, mode: RepeatMode ) -> Result<(), SessionError> {
        self.command( SessionCommand::SetRepeat( mode ) )
    }


    /// Forwards a platform focus change.
    pub fn focus_changed( &self, kind: FocusKind ) -> Result<(), SessionError> {
        self.send( SessionMessage::Focus( kind ) )
    }


    /// Registers the observer, replacing and dropping any previous one.
    /// `None` unregisters.
    pub fn set_observer( &self, observer: Option<Box<dyn PlaybackObserver>> ) -> Result<(), SessionError> {
        self.send( SessionMessage::SetObserver( observer ) )
    }


    /// Gets the latest published snapshot.
    pub fn snapshot( &self ) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }


    pub fn current_track( &self ) -> Option<Track> {
        self.snapshot.borrow().track.clone()
    }


    pub fn is_playing( &self ) -> bool {
        self.snapshot.borrow().playing
    }


    pub fn is_shuffle_on( &self ) -> bool {
        self.snapshot.borrow().shuffle
    }


    pub fn repeat_mode( &self ) -> RepeatMode {
        self.snapshot.borrow().repeat
    }


    pub fn position( &self ) -> Duration {
        self.snapshot.borrow().position
    }


    pub fn duration( &self ) -> Duration {
        self.snapshot.borrow().duration
    }


    /// Stops the session and waits for its thread. Safe to call repeatedly.
    pub fn shutdown( &self ) {
        let thread = self.thread.lock().unwrap_or_else( PoisonError::into_inner ).take();
        let Some( thread ) = thread else {
            return;
        };

        let _ = self.send( SessionMessage::Shutdown );
        if thread.join().is_err() {
            tracing::error!( "Session thread panicked" );
        }
    }
}


impl Drop for SessionHandle {
    fn drop( &mut self ) {
        self.shutdown();
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::mock::{ tracks, MockBackend, RecordingFocus, RecordingSurface };
    use crate::observer::{ ChannelObserver, PlaybackNotice };


    fn spawn_session( backend: MockBackend, focus: RecordingFocus ) -> SessionHandle {
        Session::new( SessionConfig::default(), Box::new( focus ), Box::new( RecordingSurface::default() ) )
            .with_queue( QueueManager::with_seed( 3 ) )
            .spawn( move |notifier| Ok( backend.with_notifier( notifier ) ) )
            .unwrap()
    }


    fn wait_until( handle: &SessionHandle, condition: impl Fn( &SessionSnapshot ) -> bool ) -> SessionSnapshot {
        let deadline = Instant::now() + Duration::from_secs( 5 );
        loop {
            let snapshot = handle.snapshot();
            if condition( &snapshot ) {
                return snapshot;
            }
            assert!( Instant::now() < deadline, "timed out waiting, last snapshot {:?}", snapshot );
            thread::sleep( Duration::from_millis( 5 ) );
        }
    }


    #[test]
    fn test_session_plays_and_notifies_observer() {
        let backend = MockBackend::new();
        let handle = spawn_session( backend.clone(), RecordingFocus::granting() );
        let ( observer, notices ) = ChannelObserver::new();

        handle.set_observer( Some( Box::new( observer ) ) ).unwrap();
        handle.set_song_list( tracks( 3 ) ).unwrap();
        handle.play_track_at_index( 1 ).unwrap();

        let snapshot = wait_until( &handle, |s| s.playing );
        assert_eq!( snapshot.track.map( |t| t.id() ), Some( 1 ) );

        let first = notices.recv_timeout( Duration::from_secs( 5 ) ).unwrap();
        assert!( matches!( first, PlaybackNotice::SongChanged( t ) if t.id() == 1 ) );
        let second = notices.recv_timeout( Duration::from_secs( 5 ) ).unwrap();
        assert_eq!( second, PlaybackNotice::PlayStateChanged( true ) );
    }


    #[test]
    fn test_session_skips_unplayable_track() {
        let backend = MockBackend::new();
        backend.fail_prepare( "/music/0.mp3" );
        let handle = spawn_session( backend.clone(), RecordingFocus::granting() );

        handle.set_song_list( tracks( 3 ) ).unwrap();
        handle.play_track_at_index( 0 ).unwrap();

        let snapshot = wait_until( &handle, |s| s.playing );
        assert_eq!( snapshot.track.map( |t| t.id() ), Some( 1 ) );
    }


    #[test]
    fn test_nothing_playable_reaches_observer() {
        let backend = MockBackend::new();
        for i in 0..2 {
            backend.fail_prepare( &format!( "/music/{}.mp3", i ) );
        }
        let handle = spawn_session( backend, RecordingFocus::granting() );
        let ( observer, notices ) = ChannelObserver::new();
        handle.set_observer( Some( Box::new( observer ) ) ).unwrap();

        handle.set_song_list( tracks( 2 ) ).unwrap();
        handle.play_track_at_index( 0 ).unwrap();

        let notice = notices.recv_timeout( Duration::from_secs( 5 ) ).unwrap();
        assert_eq!( notice, PlaybackNotice::NothingPlayable );
        assert!( !handle.is_playing() );
    }


    #[test]
    fn test_shutdown_releases_once() {
        let backend = MockBackend::new();
        let focus = RecordingFocus::granting();
        let handle = spawn_session( backend.clone(), focus.clone() );

        handle.set_song_list( tracks( 1 ) ).unwrap();
        handle.play_track_at_index( 0 ).unwrap();
        wait_until( &handle, |s| s.playing );

        handle.shutdown();
        handle.shutdown();

        assert_eq!( backend.release_count(), 1 );
        assert_eq!( focus.abandons(), 1 );
        assert!( matches!( handle.play_next(), Err( SessionError::Closed ) ) );
    }


    #[test]
    fn test_dropping_handle_shuts_down() {
        let backend = MockBackend::new();
        let focus = RecordingFocus::granting();
        let handle = spawn_session( backend.clone(), focus.clone() );

        handle.set_song_list( tracks( 2 ) ).unwrap();
        handle.play_track_at_index( 0 ).unwrap();
        wait_until( &handle, |s| s.playing );

        drop( handle );

        assert_eq!( backend.release_count(), 1 );
        assert_eq!( focus.abandons(), 1 );
    }


    #[test]
    fn test_backend_failure_is_returned_from_spawn() {
        let result = Session::new(
            SessionConfig::default(),
            Box::new( RecordingFocus::granting() ),
            Box::new( RecordingSurface::default() ),
        )
        .spawn( |_| Err::<MockBackend, _>( BackendError::Output( "no device".into() ) ) );

        assert!( matches!( result, Err( SessionError::Backend( _ ) ) ) );
    }
}
