//! Command-line argument parsing for PocketBeats.

use std::path::PathBuf;

use clap::Parser;


/// PocketBeats - A terminal music player for your local library.
#[derive( Parser, Debug )]
#[command( name = "pocketbeats" )]
#[command( version, about, long_about = None )]
pub struct Args {
    /// Library folder to scan. May be repeated; overrides the saved roots.
    #[arg( short, long = "root" )]
    pub roots: Vec<PathBuf>,

    /// Open this playlist on startup.
    #[arg( short, long )]
    pub playlist: Option<String>,

    /// Log at debug level.
    #[arg( short, long )]
    pub verbose: bool,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_roots_repeat() {
        let args = Args::parse_from( [ "pocketbeats", "--root", "/a", "-r", "/b", "--verbose" ] );
        assert_eq!( args.roots, vec![ PathBuf::from( "/a" ), PathBuf::from( "/b" ) ] );
        assert!( args.verbose );
        assert_eq!( args.playlist, None );
    }
}
