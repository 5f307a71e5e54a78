//! Library scanning
//!
//! Walks the configured roots for audio files and probes each one for tags,
//! producing the track list the catalog and the session work from.

use std::collections::HashSet;
use std::path::{ Path, PathBuf };

use walkdir::WalkDir;

use pocketbeats_core::decoder::{ self, AudioMetadata };
use pocketbeats_core::Track;


/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "wma", "aiff", "alac",
];


/// Library scanner for discovering audio files.
pub struct LibraryScanner {
    roots: Vec<PathBuf>,
}


impl LibraryScanner {
    pub fn new( roots: impl IntoIterator<Item = PathBuf> ) -> Self {
        let mut scanner = Self { roots: Vec::new() };
        for root in roots {
            scanner.add_root( root );
        }
        scanner
    }


    /// Adds a root directory to scan, ignoring duplicates.
    pub fn add_root( &mut self, path: PathBuf ) {
        if !self.roots.contains( &path ) {
            self.roots.push( path );
        }
    }


    /// Scans all roots and probes every audio file found.
    ///
    /// Missing roots and unreadable entries are logged and skipped. Files
    /// that cannot be probed still become tracks, named after their file stem.
    pub fn scan( &self ) -> Vec<Track> {
        let mut paths = Vec::new();

        for root in &self.roots {
            tracing::info!( "Scanning: {:?}", root );
            scan_root( root, &mut paths );
        }

        let mut seen = HashSet::new();
        paths.retain( |p| seen.insert( p.clone() ) );

        let tracks: Vec<Track> = paths
            .iter()
            .enumerate()
            .map( |( id, path )| {
                let meta = decoder::probe( path ).unwrap_or_else( |e| {
                    tracing::debug!( "Probe failed for {:?}: {}", path, e );
                    AudioMetadata::default()
                });
                build_track( id as i64, path, meta )
            })
            .collect();

        tracing::info!( "Found {} tracks", tracks.len() );
        tracks
    }
}


/// Collects audio files under `root` in file-name order.
///
/// Directory symlinks are not followed, so a link back to an ancestor
/// cannot make the walk revisit the tree.
fn scan_root( root: &Path, paths: &mut Vec<PathBuf> ) {
    let walker = WalkDir::new( root )
        .follow_links( false )
        .sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok( entry ) => entry,
            Err( e ) => {
                tracing::warn!( "Skipping {:?}: {}", e.path().unwrap_or( root ), e );
                continue;
            }
        };

        let path = entry.path();
        if path.is_file() && is_audio_file( path ) {
            paths.push( path.to_path_buf() );
        }
    }
}


/// Builds a track from probed tags, falling back to the file stem for the
/// title.
pub fn build_track( id: i64, path: &Path, meta: AudioMetadata ) -> Track {
    let title = meta.title.or_else( || {
        path.file_stem().map( |s| s.to_string_lossy().into_owned() )
    });
    let album_ref = meta.album.as_deref().map( album_ref ).unwrap_or( 0 );

    let mut track = Track::new( id, path.to_string_lossy().into_owned() )
        .with_title( title )
        .with_artist( meta.artist )
        .with_album( meta.album )
        .with_album_ref( album_ref );
    if let Some( duration ) = meta.duration {
        track = track.with_duration( duration );
    }
    track
}


/// Stable reference for an album name: 64-bit FNV-1a over its lowercase form.
pub fn album_ref( album: &str ) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in album.trim().to_lowercase().bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul( 0x0000_0100_0000_01b3 );
    }
    hash as i64
}


/// Checks if a file has a supported audio extension.
fn is_audio_file( path: &Path ) -> bool {
    path.extension()
        .and_then( |e| e.to_str() )
        .map( |e| SUPPORTED_EXTENSIONS.contains( &e.to_lowercase().as_str() ) )
        .unwrap_or( false )
}


#[cfg( test )]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use pocketbeats_core::track::{ UNKNOWN_ARTIST, UNKNOWN_ALBUM };


    #[test]
    fn test_scan_finds_audio_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir( dir.path().join( "sub" ) ).unwrap();
        fs::write( dir.path().join( "b.mp3" ), b"" ).unwrap();
        fs::write( dir.path().join( "sub" ).join( "a.FLAC" ), b"" ).unwrap();
        fs::write( dir.path().join( "cover.jpg" ), b"" ).unwrap();

        let root = dir.path().to_path_buf();
        let tracks = LibraryScanner::new( [ root.clone(), root ] ).scan();

        let titles: Vec<&str> = tracks.iter().map( |t| t.title() ).collect();
        assert_eq!( titles, vec![ "b", "a" ] );
        assert_eq!( tracks[ 0 ].id(), 0 );
        assert_eq!( tracks[ 1 ].id(), 1 );
        assert_eq!( tracks[ 0 ].artist(), UNKNOWN_ARTIST );
        assert_eq!( tracks[ 0 ].album(), UNKNOWN_ALBUM );
    }


    #[test]
    fn test_missing_root_is_skipped() {
        let tracks = LibraryScanner::new( [ PathBuf::from( "/no/such/root" ) ] ).scan();
        assert!( tracks.is_empty() );
    }


    #[cfg( unix )]
    #[test]
    fn test_symlink_loop_is_not_followed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write( dir.path().join( "a.mp3" ), b"" ).unwrap();
        std::os::unix::fs::symlink( dir.path(), dir.path().join( "loop" ) ).unwrap();
        std::os::unix::fs::symlink( dir.path(), dir.path().join( "loop2" ) ).unwrap();

        let tracks = LibraryScanner::new( [ dir.path().to_path_buf() ] ).scan();
        assert_eq!( tracks.len(), 1 );
        assert_eq!( tracks[ 0 ].title(), "a" );
    }


    #[cfg( unix )]
    #[test]
    fn test_unreadable_directory_does_not_stop_scan() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join( "a_locked" );
        fs::create_dir( &locked ).unwrap();
        fs::write( locked.join( "hidden.mp3" ), b"" ).unwrap();
        fs::write( dir.path().join( "z.mp3" ), b"" ).unwrap();
        fs::set_permissions( &locked, fs::Permissions::from_mode( 0o000 ) ).unwrap();

        let tracks = LibraryScanner::new( [ dir.path().to_path_buf() ] ).scan();
        fs::set_permissions( &locked, fs::Permissions::from_mode( 0o755 ) ).unwrap();

        // Root ignores permissions, so only the later sibling is asserted
        assert!( tracks.iter().any( |t| t.title() == "z" ) );
    }


    #[cfg( unix )]
    #[test]
    fn test_symlinked_file_is_scanned() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        fs::write( elsewhere.path().join( "real.ogg" ), b"" ).unwrap();
        std::os::unix::fs::symlink( elsewhere.path().join( "real.ogg" ), dir.path().join( "link.ogg" ) ).unwrap();

        let tracks = LibraryScanner::new( [ dir.path().to_path_buf() ] ).scan();
        assert_eq!( tracks.len(), 1 );
        assert_eq!( tracks[ 0 ].title(), "link" );
    }


    #[test]
    fn test_build_track_uses_tags() {
        let meta = AudioMetadata {
            title: Some( "Song".into() ),
            artist: Some( "Band".into() ),
            album: Some( "Record".into() ),
            duration: Some( Duration::from_secs( 200 ) ),
        };
        let track = build_track( 4, Path::new( "/m/x.ogg" ), meta );

        assert_eq!( track.title(), "Song" );
        assert_eq!( track.artist(), "Band" );
        assert_eq!( track.album_ref(), album_ref( "record" ) );
        assert_eq!( track.duration(), Duration::from_secs( 200 ) );
        assert_eq!( track.locator(), "/m/x.ogg" );
    }


    #[test]
    fn test_album_ref_is_stable() {
        assert_eq!( album_ref( "Abbey Road" ), album_ref( " abbey road " ) );
        assert_ne!( album_ref( "Abbey Road" ), album_ref( "Let It Be" ) );
    }
}
