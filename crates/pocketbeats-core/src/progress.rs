//! Seek bar state
//!
//! Polls the session snapshot at a fixed interval for the visible position.
//! While the user drags, polling stops affecting what is shown and the drag
//! target is shown instead; releasing yields the single position to seek to.

use std::time::{ Duration, Instant };

use crate::session::SessionSnapshot;


/// Visible progress of the current track.
#[derive( Debug, Clone )]
pub struct SeekBar {
    interval: Duration,
    last_poll: Option<Instant>,
    position: Duration,
    duration: Duration,
    drag: Option<Duration>,
}


impl SeekBar {
    pub fn new( interval: Duration ) -> Self {
        Self {
            interval,
            last_poll: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            drag: None,
        }
    }


    /// Refreshes position and duration from `snapshot` if the poll interval
    /// has elapsed and no drag is in progress.
    ///
    /// @returns Whether the visible values were refreshed
    pub fn poll( &mut self, now: Instant, snapshot: &SessionSnapshot ) -> bool {
        if self.drag.is_some() {
            return false;
        }
        if let Some( last ) = self.last_poll {
            if now.saturating_duration_since( last ) < self.interval {
                return false;
            }
        }

        self.last_poll = Some( now );
        self.position = snapshot.position;
        self.duration = snapshot.duration;
        true
    }


    /// Starts a drag at the current visible position.
    pub fn begin_drag( &mut self ) {
        if self.drag.is_none() {
            self.drag = Some( self.position );
        }
    }


    /// Moves the drag target, clamped to the duration. Ignored unless
    /// dragging.
    pub fn drag_to( &mut self, position: Duration ) {
        if self.drag.is_some() {
            self.drag = Some( position.min( self.duration ) );
        }
    }


    /// Moves the drag target by `delta`, starting a drag if needed.
    pub fn nudge( &mut self, delta: Duration, forward: bool ) {
        self.begin_drag();
        let current = self.drag.unwrap_or( self.position );
        let target = if forward {
            current.saturating_add( delta )
        } else {
            current.saturating_sub( delta )
        };
        self.drag_to( target );
    }


    /// Ends the drag.
    ///
    /// @returns The position to seek to, or None if no drag was in progress
    pub fn release( &mut self ) -> Option<Duration> {
        let target = self.drag.take()?;
        self.position = target;
        Some( target )
    }


    /// Ends the drag without seeking.
    pub fn cancel_drag( &mut self ) {
        self.drag = None;
    }


    pub fn is_dragging( &self ) -> bool {
        self.drag.is_some()
    }


    /// Gets the position to display: the drag target while dragging.
    pub fn position( &self ) -> Duration {
        self.drag.unwrap_or( self.position )
    }


    pub fn duration( &self ) -> Duration {
        self.duration
    }


    /// Gets the displayed progress in `0.0..=1.0`.
    pub fn ratio( &self ) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        ( self.position().as_secs_f64() / self.duration.as_secs_f64() ).clamp( 0.0, 1.0 )
    }
}


impl Default for SeekBar {
    fn default() -> Self {
        Self::new( Duration::from_millis( 500 ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn snapshot( position_secs: u64, duration_secs: u64 ) -> SessionSnapshot {
        SessionSnapshot {
            position: Duration::from_secs( position_secs ),
            duration: Duration::from_secs( duration_secs ),
            ..SessionSnapshot::default()
        }
    }


    #[test]
    fn test_poll_respects_interval() {
        let mut bar = SeekBar::default();
        let start = Instant::now();

        assert!( bar.poll( start, &snapshot( 1, 100 ) ) );
        assert!( !bar.poll( start + Duration::from_millis( 200 ), &snapshot( 2, 100 ) ) );
        assert_eq!( bar.position(), Duration::from_secs( 1 ) );

        assert!( bar.poll( start + Duration::from_millis( 500 ), &snapshot( 3, 100 ) ) );
        assert_eq!( bar.position(), Duration::from_secs( 3 ) );
    }


    #[test]
    fn test_drag_suspends_poll_and_releases_once() {
        let mut bar = SeekBar::default();
        let start = Instant::now();
        bar.poll( start, &snapshot( 10, 100 ) );

        bar.begin_drag();
        bar.drag_to( Duration::from_secs( 40 ) );
        assert!( !bar.poll( start + Duration::from_secs( 1 ), &snapshot( 11, 100 ) ) );
        assert_eq!( bar.position(), Duration::from_secs( 40 ) );

        assert_eq!( bar.release(), Some( Duration::from_secs( 40 ) ) );
        assert_eq!( bar.release(), None );
        assert!( !bar.is_dragging() );
    }


    #[test]
    fn test_nudge_clamps_to_duration() {
        let mut bar = SeekBar::default();
        bar.poll( Instant::now(), &snapshot( 98, 100 ) );

        bar.nudge( Duration::from_secs( 5 ), true );
        assert_eq!( bar.position(), Duration::from_secs( 100 ) );

        bar.cancel_drag();
        bar.nudge( Duration::from_secs( 500 ), false );
        assert_eq!( bar.position(), Duration::ZERO );
    }


    #[test]
    fn test_cancel_restores_polled_position() {
        let mut bar = SeekBar::default();
        bar.poll( Instant::now(), &snapshot( 20, 100 ) );
        bar.nudge( Duration::from_secs( 5 ), true );
        bar.cancel_drag();
        assert_eq!( bar.position(), Duration::from_secs( 20 ) );
        assert!( ( bar.ratio() - 0.2 ).abs() < 1e-9 );
    }
}
