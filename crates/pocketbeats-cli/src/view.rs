//! Tab and sub-view management for the TUI.


/// Top-level tabs.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum Tab {
    #[default]
    Songs,
    Artists,
    Albums,
    Playlists,
    Help,
}


impl Tab {
    pub const ALL: [Tab; 5] = [ Tab::Songs, Tab::Artists, Tab::Albums, Tab::Playlists, Tab::Help ];


    /// Returns the next tab in order, wrapping.
    pub fn next( self ) -> Self {
        let i = self.index();
        Self::ALL[ ( i + 1 ) % Self::ALL.len() ]
    }


    /// Returns the previous tab in order, wrapping.
    pub fn prev( self ) -> Self {
        let i = self.index();
        Self::ALL[ ( i + Self::ALL.len() - 1 ) % Self::ALL.len() ]
    }


    pub fn index( self ) -> usize {
        Self::ALL.iter().position( |t| *t == self ).unwrap_or( 0 )
    }


    pub fn title( &self ) -> &'static str {
        match self {
            Tab::Songs => "Songs",
            Tab::Artists => "Artists",
            Tab::Albums => "Albums",
            Tab::Playlists => "Playlists",
            Tab::Help => "Help",
        }
    }
}


/// Songs of one artist, album or playlist, opened from a group tab.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct SubView {
    pub title: String,
    /// Set when the sub-view shows a playlist, so it can be refreshed
    pub playlist: Option<String>,
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_tab_cycle() {
        assert_eq!( Tab::Songs.next(), Tab::Artists );
        assert_eq!( Tab::Help.next(), Tab::Songs );
        assert_eq!( Tab::Songs.prev(), Tab::Help );
        for tab in Tab::ALL {
            assert_eq!( tab.next().prev(), tab );
        }
    }
}
