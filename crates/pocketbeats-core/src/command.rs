//! Slash command parsing.
//!
//! Commands typed after `/` in the terminal UI are parsed here. Execution
//! is up to the front-end, which maps each command onto the session handle,
//! the catalog or the playlist store.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::queue::RepeatMode;


/// Errors that can occur during command parsing.
#[derive( Debug, Error )]
pub enum CommandError {
    #[error( "Unknown command: {0}" )]
    Unknown( String ),

    #[error( "Invalid argument: {0}" )]
    InvalidArgument( String ),

    #[error( "Missing argument: {0}" )]
    MissingArgument( String ),
}


/// Field the song list is sorted by.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum SortKey {
    #[default]
    Title,
    Artist,
    Album,
}


impl SortKey {
    pub fn label( &self ) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Artist => "artist",
            SortKey::Album => "album",
        }
    }
}


impl FromStr for SortKey {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "title" | "t" => Ok( SortKey::Title ),
            "artist" | "ar" => Ok( SortKey::Artist ),
            "album" | "al" => Ok( SortKey::Album ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid sort key: '{}'. Use 'title', 'artist', or 'album'", s )
            )),
        }
    }
}


impl FromStr for RepeatMode {
    type Err = CommandError;


    fn from_str( s: &str ) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Ok( RepeatMode::Off ),
            "one" | "1" => Ok( RepeatMode::One ),
            "all" | "2" => Ok( RepeatMode::All ),
            _ => Err( CommandError::InvalidArgument(
                format!( "Invalid repeat mode: '{}'. Use 'off', 'one', or 'all'", s )
            )),
        }
    }
}


/// Parsed slash command.
#[derive( Debug, Clone, PartialEq )]
pub enum Command {
    // Playback commands
    /// Play entry `n` (1-based) of the visible list, or the selection
    Play { index: Option<usize> },
    Pause,
    Next,
    Prev,
    Seek { position: Duration },
    Shuffle,
    /// Set the repeat mode, or cycle it when no mode is given
    Repeat { mode: Option<RepeatMode> },

    // Library commands
    Search { term: String },
    Clear,
    Sort { key: SortKey },
    Rescan,

    // Playlist commands
    Playlist { name: String },
    New { name: String },
    Add { name: String },
    Delete { name: String },
    /// Rename the open or selected playlist
    Rename { name: String },
    /// Remove the selected song from the open playlist
    Remove,

    // UI commands
    Help,
    Quit,
}


impl Command {
    /// Parses a command string (without the leading `/`).
    ///
    /// @param input - The command string to parse
    ///
    /// @returns The parsed command or an error
    pub fn parse( input: &str ) -> Result<Self, CommandError> {
        let input = input.trim();
        let mut parts = input.splitn( 2, ' ' );
        let cmd = parts.next().unwrap_or( "" ).to_lowercase();
        let args = parts.next().map( |s| s.trim() ).filter( |s| !s.is_empty() );

        match cmd.as_str() {
            // Playback commands
            "play" | "p" => {
                let index = args
                    .map( |s| match s.parse::<usize>() {
                        Ok( n ) if n > 0 => Ok( n ),
                        _ => Err( CommandError::InvalidArgument(
                            format!( "Invalid track number: {}", s )
                        )),
                    })
                    .transpose()?;
                Ok( Command::Play { index } )
            }
            "pause" | "pa" => Ok( Command::Pause ),
            "next" | "n" => Ok( Command::Next ),
            "prev" | "previous" | "pr" => Ok( Command::Prev ),
            "seek" | "sk" => {
                let time_str = args
                    .ok_or_else( || CommandError::MissingArgument( "time position".into() ) )?;
                let position = parse_time( time_str )?;
                Ok( Command::Seek { position } )
            }
            "shuffle" | "sh" => Ok( Command::Shuffle ),
            "repeat" | "rep" => {
                let mode = args.map( |s| s.parse() ).transpose()?;
                Ok( Command::Repeat { mode } )
            }

            // Library commands
            "search" | "find" | "?" => {
                let term = args
                    .ok_or_else( || CommandError::MissingArgument( "search term".into() ) )?;
                Ok( Command::Search { term: term.to_string() } )
            }
            "clear" | "cl" => Ok( Command::Clear ),
            "sort" => {
                let key = args
                    .ok_or_else( || CommandError::MissingArgument( "sort key".into() ) )?
                    .parse()?;
                Ok( Command::Sort { key } )
            }
            "rescan" => Ok( Command::Rescan ),

            // Playlist commands
            "playlist" | "pl" => Ok( Command::Playlist { name: playlist_name( args )? } ),
            "new" => Ok( Command::New { name: playlist_name( args )? } ),
            "add" | "a" => Ok( Command::Add { name: playlist_name( args )? } ),
            "delete" | "del" => Ok( Command::Delete { name: playlist_name( args )? } ),
            "rename" | "mv" => Ok( Command::Rename { name: playlist_name( args )? } ),
            "remove" | "rm" => Ok( Command::Remove ),

            // UI commands
            "help" | "h" => Ok( Command::Help ),
            "quit" | "q" | "exit" => Ok( Command::Quit ),

            "" => Err( CommandError::Unknown( "empty command".into() ) ),
            other => Err( CommandError::Unknown( other.to_string() ) ),
        }
    }


    /// Returns a brief description of the command for help text.
    pub fn description( &self ) -> &'static str {
        match self {
            Command::Play { .. } => "Play track",
            Command::Pause => "Toggle pause",
            Command::Next => "Next track",
            Command::Prev => "Previous track",
            Command::Seek { .. } => "Seek to position",
            Command::Shuffle => "Toggle shuffle",
            Command::Repeat { .. } => "Set repeat mode",
            Command::Search { .. } => "Filter songs",
            Command::Clear => "Clear filter",
            Command::Sort { .. } => "Sort songs",
            Command::Rescan => "Rescan library",
            Command::Playlist { .. } => "Open playlist",
            Command::New { .. } => "Create playlist",
            Command::Add { .. } => "Add current track to playlist",
            Command::Delete { .. } => "Delete playlist",
            Command::Rename { .. } => "Rename playlist",
            Command::Remove => "Remove song from playlist",
            Command::Help => "Show help",
            Command::Quit => "Quit application",
        }
    }
}


fn playlist_name( args: Option<&str> ) -> Result<String, CommandError> {
    args
        .map( str::to_string )
        .ok_or_else( || CommandError::MissingArgument( "playlist name".into() ) )
}


/// Parses a time string like "1:30" or "90" into a Duration.
///
/// @param s - Time string in format "MM:SS", "M:SS", or just seconds
///
/// @returns Duration or error
pub fn parse_time( s: &str ) -> Result<Duration, CommandError> {
    let s = s.trim();

    if let Some(( min, sec )) = s.split_once( ':' ) {
        let minutes: u64 = min.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid minutes: {}", min ) ) )?;
        let seconds: u64 = sec.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) )?;
        if seconds >= 60 {
            return Err( CommandError::InvalidArgument( format!( "Invalid seconds: {}", sec ) ) );
        }
        Ok( Duration::from_secs( minutes * 60 + seconds ) )
    } else {
        let seconds: u64 = s.parse()
            .map_err( |_| CommandError::InvalidArgument( format!( "Invalid time: {}", s ) ) )?;
        Ok( Duration::from_secs( seconds ) )
    }
}


/// Returns help text listing all available commands.
pub fn help_text() -> &'static str {
    r#"Playback Commands:
  /play [n]         Play entry n of the list    [Enter]
  /pause            Toggle pause                [Space]
  /next             Next track                  [n]
  /prev             Previous track              [p]
  /seek <time>      Seek to position (1:30)     [Left/Right]
  /shuffle          Toggle shuffle              [s]
  /repeat [mode]    Set repeat (off/all/one)    [r]

Library Commands:
  /search <term>    Filter songs                [f]
  /clear            Clear filter
  /sort <key>       Sort by title/artist/album
  /rescan           Rescan library roots

Playlist Commands:
  /playlist <name>  Open playlist
  /new <name>       Create playlist
  /add <name>       Add current track           [a]
  /delete <name>    Delete playlist
  /rename <name>    Rename open playlist
  /remove           Remove selected song        [x]

Other Commands:
  /help             Show this help
  /quit             Exit pocketbeats            [q]"#
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_parse_play_with_index() {
        assert_eq!( Command::parse( "play 3" ).unwrap(), Command::Play { index: Some( 3 ) } );
        assert_eq!( Command::parse( "p" ).unwrap(), Command::Play { index: None } );
    }


    #[test]
    fn test_parse_play_rejects_zero() {
        let result = Command::parse( "play 0" );
        assert!( matches!( result, Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_seek() {
        let cmd = Command::parse( "seek 1:30" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 90 ) } );
    }


    #[test]
    fn test_parse_seek_seconds() {
        let cmd = Command::parse( "seek 45" ).unwrap();
        assert_eq!( cmd, Command::Seek { position: Duration::from_secs( 45 ) } );
    }


    #[test]
    fn test_parse_seek_rejects_bad_seconds() {
        assert!( Command::parse( "seek 1:75" ).is_err() );
        assert!( Command::parse( "seek soon" ).is_err() );
    }


    #[test]
    fn test_parse_repeat_with_mode() {
        let cmd = Command::parse( "repeat all" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: Some( RepeatMode::All ) } );
    }


    #[test]
    fn test_parse_repeat_toggle() {
        let cmd = Command::parse( "repeat" ).unwrap();
        assert_eq!( cmd, Command::Repeat { mode: None } );
    }


    #[test]
    fn test_parse_sort() {
        assert_eq!( Command::parse( "sort Artist" ).unwrap(), Command::Sort { key: SortKey::Artist } );
        assert!( matches!( Command::parse( "sort year" ), Err( CommandError::InvalidArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_playlist_names_keep_spaces() {
        let cmd = Command::parse( "new Road Trip" ).unwrap();
        assert_eq!( cmd, Command::New { name: "Road Trip".into() } );
    }


    #[test]
    fn test_parse_playlist_edits() {
        assert_eq!( Command::parse( "rename Long Drive" ).unwrap(), Command::Rename { name: "Long Drive".into() } );
        assert_eq!( Command::parse( "rm" ).unwrap(), Command::Remove );
        assert!( matches!( Command::parse( "rename" ), Err( CommandError::MissingArgument( _ ) ) ) );
    }


    #[test]
    fn test_parse_unknown() {
        let result = Command::parse( "foobar" );
        assert!( matches!( result, Err( CommandError::Unknown( _ ) ) ) );
    }


    #[test]
    fn test_parse_missing_arg() {
        let result = Command::parse( "add" );
        assert!( matches!( result, Err( CommandError::MissingArgument( _ ) ) ) );
    }
}
