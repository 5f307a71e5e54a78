//! Playlist store
//!
//! One M3U file per playlist in a single directory. The store only deals in
//! locators; turning them back into tracks is the catalog's job.

use std::fs::{ self, File, OpenOptions };
use std::io::{ BufRead, BufReader, Write };
use std::path::PathBuf;

use thiserror::Error;

use pocketbeats_core::Track;

use crate::catalog::Catalog;


/// Errors that can occur with playlist operations.
#[derive( Debug, Error )]
pub enum PlaylistError {
    #[error( "IO error: {0}" )]
    Io( #[from] std::io::Error ),

    #[error( "Invalid playlist name: {0:?}" )]
    InvalidName( String ),

    #[error( "Playlist not found: {0}" )]
    NotFound( String ),

    #[error( "Playlist already exists: {0}" )]
    Exists( String ),
}


/// Directory of M3U playlists.
#[derive( Debug, Clone )]
pub struct PlaylistStore {
    dir: PathBuf,
}


impl PlaylistStore {
    pub fn new( dir: PathBuf ) -> Self {
        Self { dir }
    }


    /// Gets the default playlist directory under the user data dir.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_local_dir().map( |d| d.join( "pocketbeats" ).join( "playlists" ) )
    }


    /// Lists playlist names, sorted.
    pub fn names( &self ) -> Result<Vec<String>, PlaylistError> {
        let entries = match fs::read_dir( &self.dir ) {
            Ok( entries ) => entries,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => return Ok( Vec::new() ),
            Err( e ) => return Err( e.into() ),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map( |e| e.path() )
            .filter( |p| p.extension().and_then( |e| e.to_str() ) == Some( "m3u" ) )
            .filter_map( |p| p.file_stem().map( |s| s.to_string_lossy().into_owned() ) )
            .collect();
        names.sort_by_key( |n| n.to_lowercase() );
        Ok( names )
    }


    /// Creates an empty playlist.
    pub fn create( &self, name: &str ) -> Result<(), PlaylistError> {
        let path = self.path_for( name )?;
        if path.exists() {
            return Err( PlaylistError::Exists( name.to_string() ) );
        }

        fs::create_dir_all( &self.dir )?;
        let mut file = File::create( &path )?;
        writeln!( file, "#EXTM3U" )?;
        tracing::info!( "Created playlist {:?}", name );
        Ok(())
    }


    /// Loads the locators of a playlist, in order.
    pub fn load( &self, name: &str ) -> Result<Vec<String>, PlaylistError> {
        let path = self.path_for( name )?;
        let file = match File::open( &path ) {
            Ok( file ) => file,
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err( PlaylistError::NotFound( name.to_string() ) );
            }
            Err( e ) => return Err( e.into() ),
        };

        let mut locators = Vec::new();
        for line in BufReader::new( file ).lines() {
            let line = line?;
            let trimmed = line.trim();

            // Skip empty lines and comments
            if trimmed.is_empty() || trimmed.starts_with( '#' ) {
                continue;
            }
            locators.push( trimmed.to_string() );
        }

        Ok( locators )
    }


    /// Appends a locator, creating the playlist if needed.
    pub fn append( &self, name: &str, locator: &str ) -> Result<(), PlaylistError> {
        let path = self.path_for( name )?;
        if !path.exists() {
            self.create( name )?;
        }

        let mut file = OpenOptions::new().append( true ).open( &path )?;
        writeln!( file, "{}", locator )?;
        Ok(())
    }


    pub fn delete( &self, name: &str ) -> Result<(), PlaylistError> {
        let path = self.path_for( name )?;
        match fs::remove_file( &path ) {
            Ok(()) => {
                tracing::info!( "Deleted playlist {:?}", name );
                Ok(())
            }
            Err( e ) if e.kind() == std::io::ErrorKind::NotFound => {
                Err( PlaylistError::NotFound( name.to_string() ) )
            }
            Err( e ) => Err( e.into() ),
        }
    }


    /// Renames a playlist, keeping its entries.
    pub fn rename( &self, from: &str, to: &str ) -> Result<(), PlaylistError> {
        let source = self.path_for( from )?;
        let target = self.path_for( to )?;
        if !source.exists() {
            return Err( PlaylistError::NotFound( from.to_string() ) );
        }
        if target.exists() {
            return Err( PlaylistError::Exists( to.to_string() ) );
        }

        fs::rename( &source, &target )?;
        tracing::info!( "Renamed playlist {:?} to {:?}", from, to );
        Ok(())
    }


    /// Removes every entry with `locator` from a playlist.
    ///
    /// @returns How many entries were removed
    pub fn remove( &self, name: &str, locator: &str ) -> Result<usize, PlaylistError> {
        let mut locators = self.load( name )?;
        let before = locators.len();
        locators.retain( |l| l != locator );
        let removed = before - locators.len();

        if removed > 0 {
            let mut file = File::create( self.path_for( name )? )?;
            writeln!( file, "#EXTM3U" )?;
            for l in &locators {
                writeln!( file, "{}", l )?;
            }
        }
        Ok( removed )
    }


    /// Loads a playlist and resolves its locators against the catalog.
    /// Locators that no longer resolve are skipped.
    pub fn resolve( &self, name: &str, catalog: &Catalog ) -> Result<Vec<Track>, PlaylistError> {
        let locators = self.load( name )?;
        let tracks: Vec<Track> = locators
            .iter()
            .filter_map( |l| catalog.by_locator( l ).cloned() )
            .collect();

        if tracks.len() < locators.len() {
            tracing::debug!( "Playlist {:?}: {} of {} entries unresolved", name, locators.len() - tracks.len(), locators.len() );
        }
        Ok( tracks )
    }


    fn path_for( &self, name: &str ) -> Result<PathBuf, PlaylistError> {
        let name = name.trim();
        if name.is_empty() || name.contains( [ '/', '\\' ] ) || name.starts_with( '.' ) {
            return Err( PlaylistError::InvalidName( name.to_string() ) );
        }
        Ok( self.dir.join( format!( "{}.m3u", name ) ) )
    }
}


#[cfg( test )]
mod tests {
    use super::*;
    use pocketbeats_core::SortKey;


    fn store() -> ( tempfile::TempDir, PlaylistStore ) {
        let dir = tempfile::tempdir().unwrap();
        let store = PlaylistStore::new( dir.path().join( "playlists" ) );
        ( dir, store )
    }


    #[test]
    fn test_create_append_load() {
        let ( _dir, store ) = store();
        store.create( "Road Trip" ).unwrap();
        store.append( "Road Trip", "/m/a.mp3" ).unwrap();
        store.append( "Road Trip", "/m/b.mp3" ).unwrap();

        assert_eq!( store.load( "Road Trip" ).unwrap(), vec![ "/m/a.mp3", "/m/b.mp3" ] );
        assert_eq!( store.names().unwrap(), vec![ "Road Trip" ] );
    }


    #[test]
    fn test_create_twice_fails() {
        let ( _dir, store ) = store();
        store.create( "x" ).unwrap();
        assert!( matches!( store.create( "x" ), Err( PlaylistError::Exists( _ ) ) ) );
    }


    #[test]
    fn test_append_creates_missing_playlist() {
        let ( _dir, store ) = store();
        store.append( "new", "/m/a.mp3" ).unwrap();
        assert_eq!( store.load( "new" ).unwrap(), vec![ "/m/a.mp3" ] );
    }


    #[test]
    fn test_delete_and_missing() {
        let ( _dir, store ) = store();
        assert!( store.names().unwrap().is_empty() );
        store.create( "gone" ).unwrap();
        store.delete( "gone" ).unwrap();

        assert!( matches!( store.delete( "gone" ), Err( PlaylistError::NotFound( _ ) ) ) );
        assert!( matches!( store.load( "gone" ), Err( PlaylistError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_rename_keeps_entries() {
        let ( _dir, store ) = store();
        store.append( "old", "/m/a.mp3" ).unwrap();
        store.create( "taken" ).unwrap();

        assert!( matches!( store.rename( "old", "taken" ), Err( PlaylistError::Exists( _ ) ) ) );
        assert!( matches!( store.rename( "missing", "x" ), Err( PlaylistError::NotFound( _ ) ) ) );

        store.rename( "old", "Long Drive" ).unwrap();
        assert_eq!( store.load( "Long Drive" ).unwrap(), vec![ "/m/a.mp3" ] );
        assert_eq!( store.names().unwrap(), vec![ "Long Drive", "taken" ] );
    }


    #[test]
    fn test_remove_drops_every_matching_entry() {
        let ( _dir, store ) = store();
        for l in [ "/m/a.mp3", "/m/b.mp3", "/m/a.mp3" ] {
            store.append( "mix", l ).unwrap();
        }

        assert_eq!( store.remove( "mix", "/m/a.mp3" ).unwrap(), 2 );
        assert_eq!( store.load( "mix" ).unwrap(), vec![ "/m/b.mp3" ] );
        assert_eq!( store.remove( "mix", "/m/zzz.mp3" ).unwrap(), 0 );
        assert!( matches!( store.remove( "nope", "/m/b.mp3" ), Err( PlaylistError::NotFound( _ ) ) ) );
    }


    #[test]
    fn test_invalid_names_rejected() {
        let ( _dir, store ) = store();
        for name in [ "", "  ", "../evil", "a/b", ".hidden" ] {
            assert!( matches!( store.create( name ), Err( PlaylistError::InvalidName( _ ) ) ) );
        }
    }


    #[test]
    fn test_resolve_skips_unknown_locators() {
        let ( _dir, store ) = store();
        store.append( "mix", "/m/1.mp3" ).unwrap();
        store.append( "mix", "/m/gone.mp3" ).unwrap();
        store.append( "mix", "/m/0.mp3" ).unwrap();

        let catalog = Catalog::new(
            vec![ Track::new( 0, "/m/0.mp3" ), Track::new( 1, "/m/1.mp3" ) ],
            SortKey::Title,
        );
        let ids: Vec<i64> = store.resolve( "mix", &catalog ).unwrap().iter().map( Track::id ).collect();
        assert_eq!( ids, vec![ 1, 0 ] );
    }
}
