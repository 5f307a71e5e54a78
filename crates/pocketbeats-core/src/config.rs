//! Session tunables.

use std::time::Duration;


/// Tunables for a playback session.
#[derive( Debug, Clone, PartialEq )]
pub struct SessionConfig {
    /// `play_prev` restarts the current track instead of going back once
    /// playback has passed this point
    pub restart_threshold: Duration,

    /// Output gain while another stream holds ducking focus
    pub duck_gain: f32,

    /// How often the session republishes its position snapshot
    pub snapshot_interval: Duration,

    /// How often a progress display should poll the snapshot
    pub poll_interval: Duration,
}


impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            restart_threshold: Duration::from_millis( 3000 ),
            duck_gain: 0.3,
            snapshot_interval: Duration::from_millis( 100 ),
            poll_interval: Duration::from_millis( 500 ),
        }
    }
}
