//! Playback observers
//!
//! Notices produced by the session are delivered on a dedicated dispatcher
//! thread, one at a time and in production order, to at most one registered
//! observer. Registration travels the same channel as notices, so a notice
//! goes to whichever observer was registered when it was produced.

use std::sync::mpsc::{ self, Receiver, Sender };
use std::thread::{ self, JoinHandle };

use crate::track::Track;


/// Receives session notifications.
///
/// Callbacks run on the dispatcher thread, never on the session thread.
pub trait PlaybackObserver: Send {
    fn on_song_changed( &mut self, track: &Track );

    fn on_play_state_changed( &mut self, playing: bool );

    /// A user-facing error message, e.g. a track that failed to play.
    fn on_error( &mut self, _message: &str ) {}

    /// Every entry in the queue failed to open.
    fn on_nothing_playable( &mut self ) {}
}


/// One notification produced by the session.
#[derive( Debug, Clone, PartialEq )]
pub enum PlaybackNotice {
    SongChanged( Track ),
    PlayStateChanged( bool ),
    Error( String ),
    NothingPlayable,
}


impl PlaybackNotice {
    /// Invokes the matching observer callback.
    pub fn deliver( &self, observer: &mut dyn PlaybackObserver ) {
        match self {
            PlaybackNotice::SongChanged( track ) => observer.on_song_changed( track ),
            PlaybackNotice::PlayStateChanged( playing ) => observer.on_play_state_changed( *playing ),
            PlaybackNotice::Error( message ) => observer.on_error( message ),
            PlaybackNotice::NothingPlayable => observer.on_nothing_playable(),
        }
    }
}


/// Observer that forwards every notice into a channel.
///
/// Lets a UI loop that owns no thread of its own drain notices with
/// `try_recv` between frames.
pub struct ChannelObserver {
    tx: Sender<PlaybackNotice>,
}


impl ChannelObserver {
    pub fn new() -> ( Self, Receiver<PlaybackNotice> ) {
        let ( tx, rx ) = mpsc::channel();
        ( Self { tx }, rx )
    }


    fn forward( &self, notice: PlaybackNotice ) {
        // Receiver gone means the UI is shutting down
        let _ = self.tx.send( notice );
    }
}


impl PlaybackObserver for ChannelObserver {
    fn on_song_changed( &mut self, track: &Track ) {
        self.forward( PlaybackNotice::SongChanged( track.clone() ) );
    }

    fn on_play_state_changed( &mut self, playing: bool ) {
        self.forward( PlaybackNotice::PlayStateChanged( playing ) );
    }

    fn on_error( &mut self, message: &str ) {
        self.forward( PlaybackNotice::Error( message.to_string() ) );
    }

    fn on_nothing_playable( &mut self ) {
        self.forward( PlaybackNotice::NothingPlayable );
    }
}


enum DispatchMessage {
    Register( Option<Box<dyn PlaybackObserver>> ),
    Notice( PlaybackNotice ),
    Shutdown,
}


/// Owns the dispatcher thread and the single observer slot.
pub( crate ) struct Dispatcher {
    tx: Sender<DispatchMessage>,
    thread: Option<JoinHandle<()>>,
}


impl Dispatcher {
    pub( crate ) fn spawn() -> std::io::Result<Self> {
        let ( tx, rx ) = mpsc::channel::<DispatchMessage>();

        let thread = thread::Builder::new()
            .name( "pocketbeats-observer".into() )
            .spawn( move || {
                let mut slot: Option<Box<dyn PlaybackObserver>> = None;

                while let Ok( message ) = rx.recv() {
                    match message {
                        DispatchMessage::Register( observer ) => slot = observer,
                        DispatchMessage::Notice( notice ) => match slot.as_deref_mut() {
                            Some( observer ) => notice.deliver( observer ),
                            None => tracing::debug!( "No observer for {:?}", notice ),
                        },
                        DispatchMessage::Shutdown => break,
                    }
                }
            })?;

        Ok( Self { tx, thread: Some( thread ) } )
    }


    /// Replaces the observer. The previous one is dropped.
    pub( crate ) fn register( &self, observer: Option<Box<dyn PlaybackObserver>> ) {
        let _ = self.tx.send( DispatchMessage::Register( observer ) );
    }


    pub( crate ) fn dispatch( &self, notice: PlaybackNotice ) {
        let _ = self.tx.send( DispatchMessage::Notice( notice ) );
    }


    /// Delivers everything already queued, then stops the thread.
    pub( crate ) fn shutdown( &mut self ) {
        let Some( thread ) = self.thread.take() else {
            return;
        };
        let _ = self.tx.send( DispatchMessage::Shutdown );
        if thread.join().is_err() {
            tracing::error!( "Observer thread panicked" );
        }
    }
}


impl Drop for Dispatcher {
    fn drop( &mut self ) {
        self.shutdown();
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::sync::{ Arc, Mutex };


    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }


    impl PlaybackObserver for Recorder {
        fn on_song_changed( &mut self, track: &Track ) {
            self.seen.lock().unwrap().push( format!( "{}:song:{}", self.name, track.title() ) );
        }

        fn on_play_state_changed( &mut self, playing: bool ) {
            self.seen.lock().unwrap().push( format!( "{}:playing:{}", self.name, playing ) );
        }
    }


    #[test]
    fn test_notices_follow_registration_order() {
        let seen = Arc::new( Mutex::new( Vec::new() ) );
        let mut dispatcher = Dispatcher::spawn().unwrap();

        dispatcher.dispatch( PlaybackNotice::PlayStateChanged( true ) );
        dispatcher.register( Some( Box::new( Recorder { name: "a", seen: Arc::clone( &seen ) } ) ) );
        dispatcher.dispatch( PlaybackNotice::SongChanged(
            Track::new( 1, "/a.mp3" ).with_title( Some( "One".into() ) ),
        ));
        dispatcher.register( Some( Box::new( Recorder { name: "b", seen: Arc::clone( &seen ) } ) ) );
        dispatcher.dispatch( PlaybackNotice::PlayStateChanged( false ) );
        dispatcher.register( None );
        dispatcher.dispatch( PlaybackNotice::PlayStateChanged( true ) );
        dispatcher.shutdown();

        assert_eq!( *seen.lock().unwrap(), vec![ "a:song:One", "b:playing:false" ] );
    }


    #[test]
    fn test_channel_observer_forwards_defaults() {
        let ( mut observer, rx ) = ChannelObserver::new();
        PlaybackNotice::Error( "boom".into() ).deliver( &mut observer );
        PlaybackNotice::NothingPlayable.deliver( &mut observer );

        assert_eq!( rx.try_recv().unwrap(), PlaybackNotice::Error( "boom".into() ) );
        assert_eq!( rx.try_recv().unwrap(), PlaybackNotice::NothingPlayable );
    }
}
