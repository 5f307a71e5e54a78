//! Play queue management
//!
//! Keeps the caller's source list, the play queue derived from it (shuffled
//! or not), the current position, and the repeat policy.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::track::Track;


/// Repeat mode for the play queue.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}


impl RepeatMode {
    /// Returns the mode that follows this one: Off -> All -> One -> Off.
    pub fn next( self ) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }


    /// Returns a short display label.
    pub fn label( &self ) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::All => "all",
            RepeatMode::One => "one",
        }
    }
}


/// Direction of a manual skip.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub enum Direction {
    Next,
    Prev,
}


/// Owns the source list, the play queue and the current position.
///
/// When shuffle is off the play queue equals the source list. When shuffle is
/// on it is a permutation of the source list with the current track pinned at
/// index 0 as of the last rebuild.
#[derive( Debug )]
pub struct QueueManager {
    source: Vec<Track>,
    queue: Vec<Track>,
    current: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: StdRng,
}


impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}


impl QueueManager {
    /// Creates an empty queue manager seeded from system entropy.
    pub fn new() -> Self {
        Self::with_rng( StdRng::from_entropy() )
    }


    /// Creates an empty queue manager with a fixed shuffle seed.
    pub fn with_seed( seed: u64 ) -> Self {
        Self::with_rng( StdRng::seed_from_u64( seed ) )
    }


    fn with_rng( rng: StdRng ) -> Self {
        Self {
            source: Vec::new(),
            queue: Vec::new(),
            current: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            rng,
        }
    }


    /// Replaces the source list and rebuilds the play queue.
    ///
    /// Shuffle and repeat settings are kept. If the current track is still
    /// part of the new list it stays current.
    pub fn set_source_list( &mut self, tracks: Vec<Track> ) {
        self.source = tracks;
        self.rebuild();
    }


    /// Rebuilds the play queue from the source list.
    pub fn rebuild( &mut self ) {
        let previous = self.current().map( Track::id );

        self.queue = self.source.clone();
        if self.queue.is_empty() {
            self.current = None;
            return;
        }

        if self.shuffle {
            self.queue.shuffle( &mut self.rng );
            if let Some( pos ) = previous.and_then( |id| self.position_of( id ) ) {
                let pinned = self.queue.remove( pos );
                self.queue.insert( 0, pinned );
            }
            self.current = Some( 0 );
        } else {
            self.current = Some( previous.and_then( |id| self.position_of( id ) ).unwrap_or( 0 ) );
        }
    }


    /// Makes the track at `index` of the source list current.
    ///
    /// Does nothing if the queue is empty or the index is out of range.
    ///
    /// @returns The newly current track
    pub fn select_by_original_index( &mut self, index: usize ) -> Option<&Track> {
        if self.queue.is_empty() {
            return None;
        }
        let id = self.source.get( index )?.id();
        let pos = self.position_of( id )?;
        self.current = Some( pos );
        self.current()
    }


    /// Moves to the next or previous entry.
    ///
    /// `Next` stops at the end of the queue unless repeat is `All`. `Prev`
    /// wraps to the last entry only with repeat `All`; otherwise it stays on
    /// the first entry.
    ///
    /// @returns The new current track, or None at the end of the queue
    pub fn advance( &mut self, direction: Direction ) -> Option<&Track> {
        if self.queue.is_empty() {
            return None;
        }

        let last = self.queue.len() - 1;
        let current = self.current.unwrap_or( 0 );

        let target = match direction {
            Direction::Next => {
                if current < last {
                    current + 1
                } else if self.repeat == RepeatMode::All {
                    0
                } else {
                    return None;
                }
            }
            Direction::Prev => {
                if current > 0 {
                    current - 1
                } else if self.repeat == RepeatMode::All {
                    last
                } else {
                    0
                }
            }
        };

        self.current = Some( target );
        self.current()
    }


    /// Flips shuffle and rebuilds the queue around the current track.
    pub fn toggle_shuffle( &mut self ) {
        self.shuffle = !self.shuffle;
        self.rebuild();
    }


    /// Sets shuffle mode, rebuilding only if it changed.
    pub fn set_shuffle( &mut self, shuffle: bool ) {
        if shuffle != self.shuffle {
            self.toggle_shuffle();
        }
    }


    /// Advances the repeat mode: Off -> All -> One -> Off.
    pub fn cycle_repeat( &mut self ) -> RepeatMode {
        self.repeat = self.repeat.next();
        self.repeat
    }


    /// Sets repeat mode.
    pub fn set_repeat( &mut self, repeat: RepeatMode ) {
        self.repeat = repeat;
    }


    /// Gets the current track.
    pub fn current( &self ) -> Option<&Track> {
        self.current.and_then( |i| self.queue.get( i ) )
    }


    /// Gets the current position in the play queue.
    pub fn current_index( &self ) -> Option<usize> {
        self.current
    }


    /// Gets the play queue in playback order.
    pub fn play_queue( &self ) -> &[Track] {
        &self.queue
    }


    /// Gets the source list in caller order.
    pub fn source_list( &self ) -> &[Track] {
        &self.source
    }


    pub fn shuffle( &self ) -> bool {
        self.shuffle
    }


    pub fn repeat( &self ) -> RepeatMode {
        self.repeat
    }


    pub fn len( &self ) -> usize {
        self.queue.len()
    }


    pub fn is_empty( &self ) -> bool {
        self.queue.is_empty()
    }


    fn position_of( &self, id: i64 ) -> Option<usize> {
        self.queue.iter().position( |t| t.id() == id )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use proptest::prelude::*;


    fn tracks( ids: &[i64] ) -> Vec<Track> {
        ids.iter()
            .map( |id| Track::new( *id, format!( "/music/{}.mp3", id ) ) )
            .collect()
    }


    fn ids( list: &[Track] ) -> Vec<i64> {
        list.iter().map( Track::id ).collect()
    }


    #[test]
    fn test_unshuffled_queue_matches_source() {
        let mut queue = QueueManager::with_seed( 1 );
        queue.set_source_list( tracks( &[ 3, 1, 2 ] ) );

        assert_eq!( ids( queue.play_queue() ), vec![ 3, 1, 2 ] );
        assert_eq!( queue.current_index(), Some( 0 ) );
    }


    #[test]
    fn test_empty_source_has_no_current() {
        let mut queue = QueueManager::with_seed( 1 );
        queue.set_source_list( Vec::new() );

        assert_eq!( queue.current_index(), None );
        assert!( queue.advance( Direction::Next ).is_none() );
        assert!( queue.advance( Direction::Prev ).is_none() );
        assert!( queue.select_by_original_index( 0 ).is_none() );
    }


    #[test]
    fn test_replace_keeps_current_track() {
        let mut queue = QueueManager::with_seed( 1 );
        queue.set_source_list( tracks( &[ 1, 2, 3 ] ) );
        queue.select_by_original_index( 1 );

        queue.set_source_list( tracks( &[ 0, 1, 2, 3 ] ) );
        assert_eq!( queue.current().map( Track::id ), Some( 2 ) );
        assert_eq!( queue.current_index(), Some( 2 ) );

        queue.set_source_list( tracks( &[ 5, 6 ] ) );
        assert_eq!( queue.current_index(), Some( 0 ) );
    }


    #[test]
    fn test_shuffle_pins_current_track() {
        let mut queue = QueueManager::with_seed( 42 );
        queue.set_source_list( tracks( &[ 1, 2, 3, 4, 5, 6 ] ) );
        queue.select_by_original_index( 1 );

        queue.toggle_shuffle();
        assert_eq!( queue.current_index(), Some( 0 ) );
        assert_eq!( queue.play_queue()[ 0 ].id(), 2 );

        // Replacing with the same tracks keeps the pinned track first
        queue.set_source_list( tracks( &[ 1, 2, 3, 4, 5, 6 ] ) );
        assert_eq!( queue.play_queue()[ 0 ].id(), 2 );
        assert_eq!( queue.current_index(), Some( 0 ) );
    }


    #[test]
    fn test_select_by_original_index_while_shuffled() {
        let mut queue = QueueManager::with_seed( 9 );
        queue.set_source_list( tracks( &[ 10, 20, 30, 40 ] ) );
        queue.toggle_shuffle();

        let picked = queue.select_by_original_index( 2 ).map( Track::id );
        assert_eq!( picked, Some( 30 ) );
        let pos = queue.current_index().unwrap();
        assert_eq!( queue.play_queue()[ pos ].id(), 30 );

        // Out of range leaves the position alone
        assert!( queue.select_by_original_index( 99 ).is_none() );
        assert_eq!( queue.current_index(), Some( pos ) );
    }


    #[test]
    fn test_next_at_end_without_repeat() {
        let mut queue = QueueManager::with_seed( 1 );
        queue.set_source_list( tracks( &[ 1, 2 ] ) );
        queue.select_by_original_index( 1 );

        assert!( queue.advance( Direction::Next ).is_none() );
        assert_eq!( queue.current_index(), Some( 1 ) );
    }


    #[test]
    fn test_prev_at_start() {
        let mut queue = QueueManager::with_seed( 1 );
        queue.set_source_list( tracks( &[ 1, 2, 3 ] ) );

        assert_eq!( queue.advance( Direction::Prev ).map( Track::id ), Some( 1 ) );
        assert_eq!( queue.current_index(), Some( 0 ) );

        queue.set_repeat( RepeatMode::All );
        assert_eq!( queue.advance( Direction::Prev ).map( Track::id ), Some( 3 ) );
    }


    #[test]
    fn test_repeat_one_does_not_change_manual_next() {
        let mut queue = QueueManager::with_seed( 1 );
        queue.set_source_list( tracks( &[ 1, 2 ] ) );
        queue.set_repeat( RepeatMode::One );

        assert_eq!( queue.advance( Direction::Next ).map( Track::id ), Some( 2 ) );
        assert!( queue.advance( Direction::Next ).is_none() );
    }


    #[test]
    fn test_cycle_repeat() {
        let mut queue = QueueManager::with_seed( 1 );
        assert_eq!( queue.cycle_repeat(), RepeatMode::All );
        assert_eq!( queue.cycle_repeat(), RepeatMode::One );
        assert_eq!( queue.cycle_repeat(), RepeatMode::Off );
    }


    proptest! {
        #[test]
        fn prop_shuffle_round_trip_restores_order(
            len in 1usize..40,
            pick in 0usize..40,
            seed in any::<u64>(),
        ) {
            let source: Vec<i64> = ( 0..len as i64 ).collect();
            let mut queue = QueueManager::with_seed( seed );
            queue.set_source_list( tracks( &source ) );
            queue.select_by_original_index( pick % len );
            let playing = queue.current().map( Track::id );

            queue.toggle_shuffle();
            prop_assert_eq!( queue.current().map( Track::id ), playing );
            queue.toggle_shuffle();

            prop_assert_eq!( ids( queue.play_queue() ), source );
            prop_assert_eq!( queue.current().map( Track::id ), playing );
        }


        #[test]
        fn prop_shuffled_queue_is_permutation( len in 0usize..40, seed in any::<u64>() ) {
            let source: Vec<i64> = ( 0..len as i64 ).collect();
            let mut queue = QueueManager::with_seed( seed );
            queue.set_source_list( tracks( &source ) );
            queue.toggle_shuffle();

            let mut shuffled = ids( queue.play_queue() );
            shuffled.sort_unstable();
            prop_assert_eq!( shuffled, source );
        }


        #[test]
        fn prop_repeat_all_cycles_in_len_steps(
            len in 1usize..40,
            shuffle in any::<bool>(),
            seed in any::<u64>(),
        ) {
            let source: Vec<i64> = ( 0..len as i64 ).collect();
            let mut queue = QueueManager::with_seed( seed );
            queue.set_source_list( tracks( &source ) );
            queue.set_shuffle( shuffle );
            queue.set_repeat( RepeatMode::All );

            let first = queue.current().map( Track::id );
            let mut seen = std::collections::HashSet::new();
            for _ in 0..len {
                let id = queue.advance( Direction::Next ).map( Track::id );
                prop_assert!( id.is_some() );
                seen.insert( id );
            }

            prop_assert_eq!( seen.len(), len );
            prop_assert_eq!( queue.current().map( Track::id ), first );
        }
    }
}
