//! Audio focus arbitration
//!
//! Focus is requested once per session, the first time a track starts
//! playing, and abandoned once at teardown. Focus changes from the platform
//! are turned into `FocusAction`s the session applies to its engine.

use crate::fault::PlaybackFault;


/// Platform audio stream the session plays on.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum StreamType {
    Music,
}


/// Kind of focus requested.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum FocusGain {
    /// Long-lived focus for media playback
    Gain,
}


/// Focus change reported by the platform.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum FocusKind {
    /// Focus is gone for an unknown time.
    Loss,

    /// Focus is gone briefly, e.g. for a call.
    LossTransient,

    /// Another stream plays briefly; we may keep playing quietly.
    LossTransientCanDuck,

    /// Focus is back.
    Gain,
}


/// Platform focus service.
pub trait FocusProvider {
    /// Returns whether the request was granted.
    fn request_focus( &mut self, stream: StreamType, gain: FocusGain ) -> bool;

    fn abandon_focus( &mut self );
}


impl<F: FocusProvider + ?Sized> FocusProvider for Box<F> {
    fn request_focus( &mut self, stream: StreamType, gain: FocusGain ) -> bool {
        ( **self ).request_focus( stream, gain )
    }

    fn abandon_focus( &mut self ) {
        ( **self ).abandon_focus()
    }
}


/// Provider for platforms without focus arbitration. Always grants.
#[derive( Debug, Clone, Copy, Default )]
pub struct GrantedFocus;


impl FocusProvider for GrantedFocus {
    fn request_focus( &mut self, stream: StreamType, gain: FocusGain ) -> bool {
        tracing::debug!( "Focus {:?} for {:?} granted", gain, stream );
        true
    }

    fn abandon_focus( &mut self ) {}
}


/// What the session should do in response to a focus change.
#[derive( Debug, Clone, Copy, PartialEq, Default )]
pub struct FocusAction {
    pub pause: bool,
    pub resume: bool,
    /// New output gain, if it changes
    pub gain: Option<f32>,
}


/// Tracks focus ownership and decides how playback reacts to changes.
pub struct FocusArbitrator<F: FocusProvider> {
    provider: F,
    duck_gain: f32,
    requested: bool,
    abandoned: bool,
    /// Paused by a focus loss rather than by the user
    interrupted: bool,
    ducked: bool,
}


impl<F: FocusProvider> FocusArbitrator<F> {
    pub fn new( provider: F, duck_gain: f32 ) -> Self {
        Self {
            provider,
            duck_gain,
            requested: false,
            abandoned: false,
            interrupted: false,
            ducked: false,
        }
    }


    /// Requests focus unless it was requested before.
    ///
    /// A denied request is logged and playback goes on.
    pub fn ensure_requested( &mut self ) {
        if self.requested || self.abandoned {
            return;
        }
        self.requested = true;

        if self.provider.request_focus( StreamType::Music, FocusGain::Gain ) {
            tracing::debug!( "Audio focus granted" );
        } else {
            tracing::warn!( "{}", PlaybackFault::FocusDenied );
        }
    }


    /// Decides how to react to a focus change.
    ///
    /// @param kind - The change reported by the platform
    /// @param playing - Whether the engine is currently playing
    pub fn on_focus_change( &mut self, kind: FocusKind, playing: bool ) -> FocusAction {
        let mut action = FocusAction::default();
        if self.abandoned {
            return action;
        }

        tracing::debug!( "Focus change {:?} (playing: {})", kind, playing );

        match kind {
            FocusKind::Loss | FocusKind::LossTransient => {
                if playing {
                    self.interrupted = true;
                    action.pause = true;
                }
                if self.ducked {
                    self.ducked = false;
                    action.gain = Some( 1.0 );
                }
            }
            FocusKind::LossTransientCanDuck => {
                if playing && !self.ducked {
                    self.ducked = true;
                    action.gain = Some( self.duck_gain );
                }
            }
            FocusKind::Gain => {
                if self.ducked {
                    self.ducked = false;
                    action.gain = Some( 1.0 );
                }
                if self.interrupted {
                    self.interrupted = false;
                    action.resume = true;
                }
            }
        }

        action
    }


    /// Forgets a pending focus-driven resume, e.g. after the user paused.
    pub fn clear_interruption( &mut self ) {
        self.interrupted = false;
    }


    /// Abandons focus if it was ever requested. Safe to call repeatedly.
    pub fn abandon( &mut self ) {
        if self.abandoned {
            return;
        }
        self.abandoned = true;
        if self.requested {
            self.provider.abandon_focus();
        }
    }


    pub fn is_ducked( &self ) -> bool {
        self.ducked
    }


    pub fn was_requested( &self ) -> bool {
        self.requested
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use crate::mock::RecordingFocus;


    #[test]
    fn test_focus_requested_once() {
        let focus = RecordingFocus::granting();
        let mut arbitrator = FocusArbitrator::new( focus.clone(), 0.3 );

        arbitrator.ensure_requested();
        arbitrator.ensure_requested();
        assert_eq!( focus.requests(), 1 );
    }


    #[test]
    fn test_transient_loss_pauses_then_gain_resumes() {
        let mut arbitrator = FocusArbitrator::new( GrantedFocus, 0.3 );

        let loss = arbitrator.on_focus_change( FocusKind::LossTransient, true );
        assert!( loss.pause );

        let gain = arbitrator.on_focus_change( FocusKind::Gain, false );
        assert!( gain.resume );
        assert_eq!( gain.gain, None );
    }


    #[test]
    fn test_loss_while_paused_does_not_resume_later() {
        let mut arbitrator = FocusArbitrator::new( GrantedFocus, 0.3 );

        assert_eq!( arbitrator.on_focus_change( FocusKind::Loss, false ), FocusAction::default() );
        assert!( !arbitrator.on_focus_change( FocusKind::Gain, false ).resume );
    }


    #[test]
    fn test_duck_and_restore() {
        let mut arbitrator = FocusArbitrator::new( GrantedFocus, 0.3 );

        let duck = arbitrator.on_focus_change( FocusKind::LossTransientCanDuck, true );
        assert_eq!( duck.gain, Some( 0.3 ) );
        assert!( !duck.pause );
        assert!( arbitrator.is_ducked() );

        let restore = arbitrator.on_focus_change( FocusKind::Gain, true );
        assert_eq!( restore.gain, Some( 1.0 ) );
        assert!( !restore.resume );
    }


    #[test]
    fn test_loss_while_ducked_pauses_at_full_gain() {
        let mut arbitrator = FocusArbitrator::new( GrantedFocus, 0.3 );

        let duck = arbitrator.on_focus_change( FocusKind::LossTransientCanDuck, true );
        assert_eq!( duck.gain, Some( 0.3 ) );

        let loss = arbitrator.on_focus_change( FocusKind::Loss, true );
        assert!( loss.pause );
        assert_eq!( loss.gain, Some( 1.0 ) );
        assert!( !arbitrator.is_ducked() );

        let gain = arbitrator.on_focus_change( FocusKind::Gain, false );
        assert!( gain.resume );
        assert_eq!( gain.gain, None );
    }


    #[test]
    fn test_abandon_is_idempotent_and_requires_request() {
        let focus = RecordingFocus::granting();
        let mut arbitrator = FocusArbitrator::new( focus.clone(), 0.3 );
        arbitrator.abandon();
        assert_eq!( focus.abandons(), 0 );

        let mut arbitrator = FocusArbitrator::new( focus.clone(), 0.3 );
        arbitrator.ensure_requested();
        arbitrator.abandon();
        arbitrator.abandon();
        assert_eq!( focus.abandons(), 1 );
    }


    #[test]
    fn test_denied_focus_is_tolerated() {
        let focus = RecordingFocus::denying();
        let mut arbitrator = FocusArbitrator::new( focus.clone(), 0.3 );
        arbitrator.ensure_requested();
        assert!( arbitrator.was_requested() );
        assert!( arbitrator.on_focus_change( FocusKind::LossTransient, true ).pause );
    }
}
