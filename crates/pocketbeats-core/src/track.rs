//! Track descriptors
//!
//! A `Track` describes one playable item. Display fields are never empty:
//! missing values are replaced by placeholders when the track is built, and
//! later corrections that carry a blank value are ignored.

use std::time::Duration;


/// Placeholder title for tracks without one.
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Placeholder artist for tracks without one.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Placeholder album for tracks without one.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";


/// One playable audio item.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Track {
    id: i64,
    title: String,
    artist: String,
    album: String,
    album_ref: i64,
    locator: String,
    duration: Duration,
}


fn or_placeholder( value: Option<String>, placeholder: &str ) -> String {
    match value {
        Some( v ) if !v.trim().is_empty() => v,
        _ => placeholder.to_string(),
    }
}


impl Track {
    /// Creates a track with placeholder metadata.
    ///
    /// @param id - Identity of the track; two tracks with the same id are the same track
    /// @param locator - Filesystem path or URI of the audio source
    pub fn new( id: i64, locator: impl Into<String> ) -> Self {
        Self {
            id,
            title: UNKNOWN_TITLE.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            album: UNKNOWN_ALBUM.to_string(),
            album_ref: 0,
            locator: locator.into(),
            duration: Duration::ZERO,
        }
    }


    /// Sets the title, keeping the placeholder when `title` is missing or blank.
    pub fn with_title( mut self, title: Option<String> ) -> Self {
        self.title = or_placeholder( title, UNKNOWN_TITLE );
        self
    }


    /// Sets the artist, keeping the placeholder when `artist` is missing or blank.
    pub fn with_artist( mut self, artist: Option<String> ) -> Self {
        self.artist = or_placeholder( artist, UNKNOWN_ARTIST );
        self
    }


    /// Sets the album, keeping the placeholder when `album` is missing or blank.
    pub fn with_album( mut self, album: Option<String> ) -> Self {
        self.album = or_placeholder( album, UNKNOWN_ALBUM );
        self
    }


    /// Sets the album reference (used by collaborators to look up artwork).
    pub fn with_album_ref( mut self, album_ref: i64 ) -> Self {
        self.album_ref = album_ref;
        self
    }


    /// Sets the duration.
    pub fn with_duration( mut self, duration: Duration ) -> Self {
        self.duration = duration;
        self
    }


    pub fn id( &self ) -> i64 {
        self.id
    }


    pub fn title( &self ) -> &str {
        &self.title
    }


    pub fn artist( &self ) -> &str {
        &self.artist
    }


    pub fn album( &self ) -> &str {
        &self.album
    }


    pub fn album_ref( &self ) -> i64 {
        self.album_ref
    }


    pub fn locator( &self ) -> &str {
        &self.locator
    }


    pub fn duration( &self ) -> Duration {
        self.duration
    }


    /// Overwrites the title. Blank values are rejected.
    ///
    /// @returns true if the title was changed
    pub fn set_title( &mut self, title: &str ) -> bool {
        replace_if_present( &mut self.title, title )
    }


    /// Overwrites the artist. Blank values are rejected.
    pub fn set_artist( &mut self, artist: &str ) -> bool {
        replace_if_present( &mut self.artist, artist )
    }


    /// Overwrites the album. Blank values are rejected.
    pub fn set_album( &mut self, album: &str ) -> bool {
        replace_if_present( &mut self.album, album )
    }


    /// Overwrites the duration. Zero is rejected.
    pub fn set_duration( &mut self, duration: Duration ) -> bool {
        if duration.is_zero() {
            return false;
        }
        self.duration = duration;
        true
    }
}


fn replace_if_present( field: &mut String, value: &str ) -> bool {
    if value.trim().is_empty() {
        return false;
    }
    *field = value.to_string();
    true
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_missing_metadata_gets_placeholders() {
        let track = Track::new( 7, "/music/a.mp3" )
            .with_title( None )
            .with_artist( Some( "   ".into() ) )
            .with_album( Some( String::new() ) );

        assert_eq!( track.title(), UNKNOWN_TITLE );
        assert_eq!( track.artist(), UNKNOWN_ARTIST );
        assert_eq!( track.album(), UNKNOWN_ALBUM );
        assert_eq!( track.locator(), "/music/a.mp3" );
    }


    #[test]
    fn test_corrective_update_overwrites_placeholder() {
        let mut track = Track::new( 1, "/music/a.mp3" );
        assert!( track.set_title( "Blue Monday" ) );
        assert!( track.set_duration( Duration::from_millis( 448_000 ) ) );

        assert_eq!( track.title(), "Blue Monday" );
        assert_eq!( track.duration(), Duration::from_millis( 448_000 ) );
    }


    #[test]
    fn test_blank_update_is_ignored() {
        let mut track = Track::new( 1, "/music/a.mp3" ).with_artist( Some( "New Order".into() ) );

        assert!( !track.set_artist( "" ) );
        assert!( !track.set_album( "  " ) );
        assert!( !track.set_duration( Duration::ZERO ) );

        assert_eq!( track.artist(), "New Order" );
        assert_eq!( track.album(), UNKNOWN_ALBUM );
    }
}
