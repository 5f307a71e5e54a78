//! Application settings management
//!
//! Persists library roots, sort order, playback modes and session tunables
//! as JSON under the user config directory.

use std::fs;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use serde::{ Deserialize, Serialize };

use pocketbeats_core::{ RepeatMode, SessionConfig, SortKey };


/// Application settings.
#[derive( Debug, Clone, PartialEq, Serialize, Deserialize )]
#[serde( default )]
pub struct Settings {
    /// Folders scanned for music
    pub roots: Vec<PathBuf>,

    /// Song list sort order: "title", "artist" or "album"
    pub sort: String,

    pub shuffle: bool,

    /// Repeat mode: "off", "all" or "one"
    pub repeat: String,

    pub restart_threshold_ms: u64,

    pub duck_gain: f32,

    pub poll_interval_ms: u64,
}


impl Default for Settings {
    fn default() -> Self {
        let config = SessionConfig::default();
        Self {
            roots: dirs::audio_dir().into_iter().collect(),
            sort: SortKey::Title.label().to_string(),
            shuffle: false,
            repeat: RepeatMode::Off.label().to_string(),
            restart_threshold_ms: config.restart_threshold.as_millis() as u64,
            duck_gain: config.duck_gain,
            poll_interval_ms: config.poll_interval.as_millis() as u64,
        }
    }
}


impl Settings {
    /// Returns the path to the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map( |p| p.join( "pocketbeats" ).join( "settings.json" ) )
    }


    /// Loads settings from disk, or returns defaults if not found.
    pub fn load() -> Self {
        match Self::settings_path() {
            Some( path ) => Self::load_from( &path ),
            None => Self::default(),
        }
    }


    /// Loads settings from `path`. Unreadable or malformed files give defaults.
    pub fn load_from( path: &Path ) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string( path ) {
            Ok( contents ) => serde_json::from_str( &contents ).unwrap_or_else( |e| {
                tracing::warn!( "Malformed settings {:?}: {}", path, e );
                Self::default()
            }),
            Err( e ) => {
                tracing::warn!( "Failed to read settings: {}", e );
                Self::default()
            }
        }
    }


    /// Saves settings to disk.
    pub fn save( &self ) {
        if let Some( path ) = Self::settings_path() {
            self.save_to( &path );
        }
    }


    /// Saves settings to `path`, creating its directory if needed.
    pub fn save_to( &self, path: &Path ) {
        if let Some( parent ) = path.parent() {
            if !parent.exists() {
                if let Err( e ) = fs::create_dir_all( parent ) {
                    tracing::warn!( "Failed to create settings directory: {}", e );
                    return;
                }
            }
        }

        match serde_json::to_string_pretty( self ) {
            Ok( json ) => {
                if let Err( e ) = fs::write( path, json ) {
                    tracing::warn!( "Failed to save settings: {}", e );
                }
            }
            Err( e ) => {
                tracing::warn!( "Failed to serialize settings: {}", e );
            }
        }
    }


    pub fn sort_key( &self ) -> SortKey {
        self.sort.parse().unwrap_or_default()
    }


    pub fn repeat_mode( &self ) -> RepeatMode {
        self.repeat.parse().unwrap_or_default()
    }


    pub fn set_sort_key( &mut self, key: SortKey ) {
        self.sort = key.label().to_string();
    }


    pub fn set_repeat_mode( &mut self, mode: RepeatMode ) {
        self.repeat = mode.label().to_string();
    }


    /// Builds the session tunables these settings describe.
    pub fn session_config( &self ) -> SessionConfig {
        SessionConfig {
            restart_threshold: Duration::from_millis( self.restart_threshold_ms ),
            duck_gain: self.duck_gain.clamp( 0.0, 1.0 ),
            poll_interval: Duration::from_millis( self.poll_interval_ms.max( 50 ) ),
            ..SessionConfig::default()
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "nested" ).join( "settings.json" );

        let mut settings = Settings::default();
        settings.roots = vec![ PathBuf::from( "/music" ) ];
        settings.set_sort_key( SortKey::Album );
        settings.set_repeat_mode( RepeatMode::One );
        settings.save_to( &path );

        let loaded = Settings::load_from( &path );
        assert_eq!( loaded, settings );
        assert_eq!( loaded.sort_key(), SortKey::Album );
        assert_eq!( loaded.repeat_mode(), RepeatMode::One );
    }


    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, r#"{ "shuffle": true, "duck_gain": 4.0 }"# ).unwrap();

        let loaded = Settings::load_from( &path );
        assert!( loaded.shuffle );
        assert_eq!( loaded.restart_threshold_ms, 3000 );
        assert_eq!( loaded.session_config().duck_gain, 1.0 );
    }


    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join( "settings.json" );
        fs::write( &path, "not json" ).unwrap();

        assert_eq!( Settings::load_from( &path ), Settings::default() );
    }
}
