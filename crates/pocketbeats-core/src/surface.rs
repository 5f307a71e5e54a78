//! Now-playing notification surface.

use std::sync::{ Arc, Mutex, PoisonError };


/// Content of the now-playing notification.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    /// Selects the playing or paused icon
    pub playing: bool,
}


/// Persistent notification showing the current track.
pub trait NowPlayingSurface {
    /// Shows or replaces the notification.
    fn show( &mut self, now_playing: &NowPlaying );

    /// Removes the notification.
    fn clear( &mut self );
}


impl<S: NowPlayingSurface + ?Sized> NowPlayingSurface for Box<S> {
    fn show( &mut self, now_playing: &NowPlaying ) {
        ( **self ).show( now_playing )
    }

    fn clear( &mut self ) {
        ( **self ).clear()
    }
}


/// Surface backed by a shared slot a UI thread can read while rendering.
#[derive( Debug, Clone, Default )]
pub struct SharedSurface {
    slot: Arc<Mutex<Option<NowPlaying>>>,
}


impl SharedSurface {
    pub fn new() -> Self {
        Self::default()
    }


    /// Gets what the notification currently shows, if anything.
    pub fn current( &self ) -> Option<NowPlaying> {
        self.slot.lock().unwrap_or_else( PoisonError::into_inner ).clone()
    }
}


impl NowPlayingSurface for SharedSurface {
    fn show( &mut self, now_playing: &NowPlaying ) {
        *self.slot.lock().unwrap_or_else( PoisonError::into_inner ) = Some( now_playing.clone() );
    }

    fn clear( &mut self ) {
        *self.slot.lock().unwrap_or_else( PoisonError::into_inner ) = None;
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_shared_surface_is_visible_through_clones() {
        let reader = SharedSurface::new();
        let mut writer = reader.clone();

        writer.show( &NowPlaying { title: "A".into(), artist: "B".into(), playing: true } );
        assert_eq!( reader.current().map( |n| n.title ), Some( "A".to_string() ) );

        writer.clear();
        assert_eq!( reader.current(), None );
    }
}
