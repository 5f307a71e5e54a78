//! Song catalog
//!
//! Sorting, filtering and artist/album grouping over the scanned tracks.

use std::collections::BTreeMap;

use pocketbeats_core::{ SortKey, Track };


/// One artist or album with its tracks.
#[derive( Debug, Clone, PartialEq )]
pub struct Group {
    pub name: String,
    pub tracks: Vec<Track>,
}


/// The scanned library, sorted and optionally filtered.
#[derive( Debug, Default )]
pub struct Catalog {
    tracks: Vec<Track>,
    sort: SortKey,
    filter: String,
}


impl Catalog {
    pub fn new( tracks: Vec<Track>, sort: SortKey ) -> Self {
        let mut catalog = Self { tracks, sort, filter: String::new() };
        catalog.sort_tracks();
        catalog
    }


    /// Replaces the tracks, e.g. after a rescan.
    pub fn replace( &mut self, tracks: Vec<Track> ) {
        self.tracks = tracks;
        self.sort_tracks();
    }


    pub fn set_sort( &mut self, sort: SortKey ) {
        self.sort = sort;
        self.sort_tracks();
    }


    pub fn sort( &self ) -> SortKey {
        self.sort
    }


    pub fn set_filter( &mut self, filter: impl Into<String> ) {
        self.filter = filter.into();
    }


    pub fn clear_filter( &mut self ) {
        self.filter.clear();
    }


    pub fn filter( &self ) -> &str {
        &self.filter
    }


    /// Gets every track, sorted, ignoring the filter.
    pub fn all( &self ) -> &[Track] {
        &self.tracks
    }


    /// Gets the sorted tracks that match the filter.
    pub fn songs( &self ) -> Vec<Track> {
        self.tracks.iter().filter( |t| self.matches( t ) ).cloned().collect()
    }


    /// Groups matching tracks by artist, in name order.
    pub fn artists( &self ) -> Vec<Group> {
        self.group_by( |t| t.artist() )
    }


    /// Groups matching tracks by album, in name order.
    pub fn albums( &self ) -> Vec<Group> {
        self.group_by( |t| t.album() )
    }


    /// Looks up a track by locator.
    pub fn by_locator( &self, locator: &str ) -> Option<&Track> {
        self.tracks.iter().find( |t| t.locator() == locator )
    }


    fn matches( &self, track: &Track ) -> bool {
        if self.filter.is_empty() {
            return true;
        }
        let needle = self.filter.to_lowercase();
        [ track.title(), track.artist(), track.album() ]
            .iter()
            .any( |field| field.to_lowercase().contains( &needle ) )
    }


    fn group_by( &self, key: impl Fn( &Track ) -> &str ) -> Vec<Group> {
        let mut groups: BTreeMap<String, Group> = BTreeMap::new();

        for track in self.tracks.iter().filter( |t| self.matches( t ) ) {
            let name = key( track );
            groups
                .entry( name.to_lowercase() )
                .or_insert_with( || Group { name: name.to_string(), tracks: Vec::new() } )
                .tracks
                .push( track.clone() );
        }

        groups.into_values().collect()
    }


    fn sort_tracks( &mut self ) {
        let sort = self.sort;
        self.tracks.sort_by_cached_key( |t| {
            let primary = match sort {
                SortKey::Title => t.title(),
                SortKey::Artist => t.artist(),
                SortKey::Album => t.album(),
            };
            ( primary.to_lowercase(), t.title().to_lowercase(), t.id() )
        });
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    fn track( id: i64, title: &str, artist: &str, album: &str ) -> Track {
        Track::new( id, format!( "/m/{}.mp3", id ) )
            .with_title( Some( title.into() ) )
            .with_artist( Some( artist.into() ) )
            .with_album( Some( album.into() ) )
    }


    fn sample() -> Catalog {
        Catalog::new(
            vec![
                track( 0, "zebra", "Beta", "Two" ),
                track( 1, "Apple", "alpha", "One" ),
                track( 2, "mango", "Beta", "One" ),
            ],
            SortKey::Title,
        )
    }


    fn ids( tracks: &[Track] ) -> Vec<i64> {
        tracks.iter().map( Track::id ).collect()
    }


    #[test]
    fn test_sort_is_case_insensitive() {
        let mut catalog = sample();
        assert_eq!( ids( catalog.all() ), vec![ 1, 2, 0 ] );

        catalog.set_sort( SortKey::Artist );
        assert_eq!( ids( catalog.all() ), vec![ 1, 2, 0 ] );

        catalog.set_sort( SortKey::Album );
        assert_eq!( ids( catalog.all() ), vec![ 1, 2, 0 ] );
    }


    #[test]
    fn test_filter_matches_any_field() {
        let mut catalog = sample();
        catalog.set_filter( "BETA" );
        assert_eq!( ids( &catalog.songs() ), vec![ 2, 0 ] );

        catalog.set_filter( "one" );
        assert_eq!( ids( &catalog.songs() ), vec![ 1, 2 ] );

        catalog.clear_filter();
        assert_eq!( catalog.songs().len(), 3 );
    }


    #[test]
    fn test_grouping() {
        let catalog = sample();

        let artists = catalog.artists();
        let names: Vec<&str> = artists.iter().map( |g| g.name.as_str() ).collect();
        assert_eq!( names, vec![ "alpha", "Beta" ] );
        assert_eq!( ids( &artists[ 1 ].tracks ), vec![ 2, 0 ] );

        let albums = catalog.albums();
        assert_eq!( albums.len(), 2 );
        assert_eq!( albums[ 0 ].tracks.len(), 2 );
    }
}
