//! PocketBeats CLI - Terminal music player

mod catalog;
mod cli;
mod input;
mod library;
mod playlists;
mod settings;
mod view;

use std::fs::{ self, OpenOptions };
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::{ Duration, Instant };

use anyhow::{ anyhow, Context, Result };
use clap::Parser;
use crossterm::{
    event::{ self, Event, KeyCode, KeyEventKind, KeyModifiers },
    terminal::{ disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen },
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{ Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap },
};

use catalog::{ Catalog, Group };
use cli::Args;
use input::{ InputBuffer, InputMode };
use library::LibraryScanner;
use playlists::PlaylistStore;
use settings::Settings;
use view::{ SubView, Tab };

use pocketbeats_core::{
    command, BackendError, ChannelObserver, Command, GrantedFocus, NativeBackend, PlaybackNotice,
    PlaybackState, RepeatMode, SeekBar, Session, SessionHandle, SessionSnapshot, SharedSurface, Track,
};


/// How far one Left/Right press moves the seek bar.
const SEEK_STEP: Duration = Duration::from_secs( 5 );


/// What the main list currently shows.
enum Listing {
    Songs( Vec<Track> ),
    Groups( Vec<Group> ),
    Playlists( Vec<String> ),
    Help,
}


/// Application state.
struct App {
    session: SessionHandle,
    surface: SharedSurface,
    notices: mpsc::Receiver<PlaybackNotice>,
    snapshot: SessionSnapshot,
    should_quit: bool,

    catalog: Catalog,
    playlists: PlaylistStore,
    settings: Settings,
    roots: Vec<PathBuf>,

    // View state
    tab: Tab,
    sub_view: Option<( SubView, Vec<Track> )>,
    list_state: ListState,
    help_scroll: u16,
    seek_bar: SeekBar,

    // Input state
    input_mode: InputMode,
    input_buffer: InputBuffer,

    // Status message (shown in status bar)
    status_message: Option<String>,
    status_clear_at: Option<Instant>,
}


impl App {
    /// Creates a new App instance.
    fn new( args: &Args ) -> Result<Self> {
        let settings = Settings::load();
        let roots = if args.roots.is_empty() { settings.roots.clone() } else { args.roots.clone() };

        let catalog = Catalog::new( LibraryScanner::new( roots.clone() ).scan(), settings.sort_key() );

        let playlist_dir = PlaylistStore::default_dir()
            .ok_or_else( || anyhow!( "No data directory for playlists" ) )?;
        let playlists = PlaylistStore::new( playlist_dir );

        let surface = SharedSurface::new();
        let config = settings.session_config();
        let session = Session::new( config.clone(), Box::new( GrantedFocus ), Box::new( surface.clone() ) )
            .spawn( |notifier| NativeBackend::new( notifier ).map_err( BackendError::from ) )
            .context( "Failed to start playback" )?;

        let ( observer, notices ) = ChannelObserver::new();
        session.set_observer( Some( Box::new( observer ) ) )?;
        session.set_shuffle( settings.shuffle )?;
        session.set_repeat( settings.repeat_mode() )?;

        let mut list_state = ListState::default();
        list_state.select( Some( 0 ) );

        let mut app = Self {
            session,
            surface,
            notices,
            snapshot: SessionSnapshot::default(),
            should_quit: false,
            catalog,
            playlists,
            settings,
            roots,
            tab: Tab::Songs,
            sub_view: None,
            list_state,
            help_scroll: 0,
            seek_bar: SeekBar::new( config.poll_interval ),
            input_mode: InputMode::Normal,
            input_buffer: InputBuffer::new(),
            status_message: None,
            status_clear_at: None,
        };

        if let Some( name ) = &args.playlist {
            if let Err( e ) = app.open_playlist( name ) {
                app.set_status( format!( "Error: {}", e ) );
            }
        }

        tracing::info!( "Library ready: {} tracks from {:?}", app.catalog.all().len(), app.roots );
        Ok( app )
    }


    /// Sets a status message that auto-clears after a delay.
    fn set_status( &mut self, msg: impl Into<String> ) {
        self.status_message = Some( msg.into() );
        self.status_clear_at = Some( Instant::now() + Duration::from_secs( 3 ) );
    }


    /// Clears expired messages, drains session notices and polls progress.
    fn tick( &mut self ) {
        if let Some( clear_at ) = self.status_clear_at {
            if Instant::now() >= clear_at {
                self.status_message = None;
                self.status_clear_at = None;
            }
        }

        while let Ok( notice ) = self.notices.try_recv() {
            match notice {
                PlaybackNotice::SongChanged( track ) => {
                    self.set_status( format!( "Now playing: {} by {}", track.title(), track.artist() ) );
                }
                PlaybackNotice::PlayStateChanged( _ ) => {}
                PlaybackNotice::Error( message ) => self.set_status( message ),
                PlaybackNotice::NothingPlayable => {
                    self.set_status( "Nothing in this list could be played" );
                }
            }
        }

        self.snapshot = self.session.snapshot();
        self.seek_bar.poll( Instant::now(), &self.snapshot );
    }


    /// Gets what the main list shows for the current tab.
    fn listing( &self ) -> Listing {
        if let Some(( _, tracks )) = &self.sub_view {
            return Listing::Songs( tracks.clone() );
        }

        match self.tab {
            Tab::Songs => Listing::Songs( self.catalog.songs() ),
            Tab::Artists => Listing::Groups( self.catalog.artists() ),
            Tab::Albums => Listing::Groups( self.catalog.albums() ),
            Tab::Playlists => Listing::Playlists( self.playlists.names().unwrap_or_default() ),
            Tab::Help => Listing::Help,
        }
    }


    fn listing_len( &self ) -> usize {
        match self.listing() {
            Listing::Songs( tracks ) => tracks.len(),
            Listing::Groups( groups ) => groups.len(),
            Listing::Playlists( names ) => names.len(),
            Listing::Help => 0,
        }
    }


    fn selected( &self ) -> usize {
        self.list_state.selected().unwrap_or( 0 )
    }


    fn select( &mut self, index: usize ) {
        let len = self.listing_len();
        self.list_state.select( Some( index.min( len.saturating_sub( 1 ) ) ) );
    }


    fn switch_tab( &mut self, tab: Tab ) {
        self.tab = tab;
        self.sub_view = None;
        self.help_scroll = 0;
        self.list_state = ListState::default();
        self.list_state.select( Some( 0 ) );
    }


    fn handle_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        match self.input_mode {
            InputMode::Normal => self.handle_normal_key( code, modifiers ),
            InputMode::Command => self.handle_command_key( code ),
            InputMode::Filter => self.handle_filter_key( code ),
        }
    }


    fn handle_normal_key( &mut self, code: KeyCode, modifiers: KeyModifiers ) {
        if modifiers.contains( KeyModifiers::CONTROL ) && code == KeyCode::Char( 'c' ) {
            self.should_quit = true;
            return;
        }

        // Seek bar drag
        match code {
            KeyCode::Left => {
                self.seek_bar.nudge( SEEK_STEP, false );
                return;
            }
            KeyCode::Right => {
                self.seek_bar.nudge( SEEK_STEP, true );
                return;
            }
            KeyCode::Enter if self.seek_bar.is_dragging() => {
                if let Some( target ) = self.seek_bar.release() {
                    self.send( |s| s.seek_to( target ) );
                }
                return;
            }
            KeyCode::Esc if self.seek_bar.is_dragging() => {
                self.seek_bar.cancel_drag();
                return;
            }
            _ => {}
        }

        match code {
            KeyCode::Char( 'q' ) => self.should_quit = true,
            KeyCode::Char( '/' ) => {
                self.input_mode = InputMode::Command;
                self.input_buffer.clear();
            }
            KeyCode::Char( 'f' ) => {
                self.input_mode = InputMode::Filter;
                let filter = self.catalog.filter().to_string();
                self.input_buffer.set( &filter );
                if self.tab != Tab::Songs || self.sub_view.is_some() {
                    self.switch_tab( Tab::Songs );
                }
            }
            KeyCode::Char( 'a' ) => {
                self.input_mode = InputMode::Command;
                self.input_buffer.set( "add " );
            }
            KeyCode::Char( 'x' ) => {
                if let Err( e ) = self.run_command( Command::Remove ) {
                    self.set_status( format!( "Error: {}", e ) );
                }
            }
            KeyCode::Tab => self.switch_tab( self.tab.next() ),
            KeyCode::BackTab => self.switch_tab( self.tab.prev() ),
            KeyCode::Char( ' ' ) => {
                if self.snapshot.state.is_prepared() {
                    self.send( SessionHandle::toggle_play_pause );
                } else {
                    self.activate();
                }
            }
            KeyCode::Char( 'n' ) => self.send( SessionHandle::play_next ),
            KeyCode::Char( 'p' ) => self.send( SessionHandle::play_prev ),
            KeyCode::Char( 's' ) => self.send( SessionHandle::toggle_shuffle ),
            KeyCode::Char( 'r' ) => self.send( SessionHandle::cycle_repeat ),
            KeyCode::Enter => self.activate(),
            KeyCode::Esc => {
                if self.sub_view.is_some() {
                    self.sub_view = None;
                    self.select( 0 );
                } else if !self.catalog.filter().is_empty() {
                    self.catalog.clear_filter();
                    self.select( 0 );
                }
            }
            KeyCode::Up | KeyCode::Char( 'k' ) => {
                if self.tab == Tab::Help {
                    self.help_scroll = self.help_scroll.saturating_sub( 1 );
                } else {
                    self.select( self.selected().saturating_sub( 1 ) );
                }
            }
            KeyCode::Down | KeyCode::Char( 'j' ) => {
                if self.tab == Tab::Help {
                    self.help_scroll = self.help_scroll.saturating_add( 1 );
                } else {
                    self.select( self.selected() + 1 );
                }
            }
            KeyCode::PageUp => self.select( self.selected().saturating_sub( 10 ) ),
            KeyCode::PageDown => self.select( self.selected() + 10 ),
            KeyCode::Home => self.select( 0 ),
            KeyCode::End => self.select( usize::MAX ),
            _ => {}
        }
    }


    fn handle_command_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                let input = self.input_buffer.take();
                self.input_mode = InputMode::Normal;
                self.execute_command( &input );
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Backspace => {
                if self.input_buffer.is_empty() {
                    self.input_mode = InputMode::Normal;
                } else {
                    self.input_buffer.backspace();
                }
            }
            KeyCode::Delete => self.input_buffer.delete(),
            KeyCode::Left => self.input_buffer.move_left(),
            KeyCode::Right => self.input_buffer.move_right(),
            KeyCode::Home => self.input_buffer.move_home(),
            KeyCode::End => self.input_buffer.move_end(),
            KeyCode::Char( c ) => self.input_buffer.insert( c ),
            _ => {}
        }
    }


    fn handle_filter_key( &mut self, code: KeyCode ) {
        match code {
            KeyCode::Enter => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input_buffer.clear();
                self.catalog.clear_filter();
            }
            KeyCode::Backspace => {
                self.input_buffer.backspace();
                self.catalog.set_filter( self.input_buffer.content() );
            }
            KeyCode::Char( c ) => {
                self.input_buffer.insert( c );
                self.catalog.set_filter( self.input_buffer.content() );
            }
            _ => {}
        }
        self.select( self.selected() );
    }


    /// Plays the selected song, or opens the selected group or playlist.
    fn activate( &mut self ) {
        let index = self.selected();
        match self.listing() {
            Listing::Songs( tracks ) => self.play_list( tracks, index ),
            Listing::Groups( mut groups ) => {
                if index < groups.len() {
                    let group = groups.swap_remove( index );
                    self.open_sub_view( SubView { title: group.name, playlist: None }, group.tracks );
                }
            }
            Listing::Playlists( names ) => {
                if let Some( name ) = names.get( index ) {
                    let name = name.clone();
                    if let Err( e ) = self.open_playlist( &name ) {
                        self.set_status( format!( "Error: {}", e ) );
                    }
                }
            }
            Listing::Help => {}
        }
    }


    /// Hands the visible list to the session and plays entry `index`.
    fn play_list( &mut self, tracks: Vec<Track>, index: usize ) {
        if tracks.is_empty() {
            self.set_status( "No songs here" );
            return;
        }
        self.send( |s| s.set_song_list( tracks ) );
        self.send( |s| s.play_track_at_index( index ) );
    }


    fn open_sub_view( &mut self, view: SubView, tracks: Vec<Track> ) {
        self.sub_view = Some(( view, tracks ));
        self.list_state = ListState::default();
        self.list_state.select( Some( 0 ) );
    }


    fn open_playlist( &mut self, name: &str ) -> Result<()> {
        let tracks = self.playlists.resolve( name, &self.catalog )?;
        self.tab = Tab::Playlists;
        self.open_sub_view(
            SubView { title: name.to_string(), playlist: Some( name.to_string() ) },
            tracks,
        );
        Ok(())
    }


    /// Sends a request to the session, reporting a closed session.
    fn send<F>( &mut self, request: F )
    where
        F: FnOnce( &SessionHandle ) -> Result<(), pocketbeats_core::SessionError>,
    {
        if let Err( e ) = request( &self.session ) {
            tracing::error!( "Session request failed: {}", e );
            self.set_status( format!( "Error: {}", e ) );
        }
    }


    fn execute_command( &mut self, input: &str ) {
        match Command::parse( input ) {
            Ok( cmd ) => {
                if let Err( e ) = self.run_command( cmd ) {
                    self.set_status( format!( "Error: {}", e ) );
                }
            }
            Err( e ) => {
                self.set_status( format!( "{}", e ) );
            }
        }
    }


    fn run_command( &mut self, cmd: Command ) -> Result<()> {
        match cmd {
            Command::Play { index: Some( n ) } => {
                let Listing::Songs( tracks ) = self.listing() else {
                    return Err( anyhow!( "Not a song list" ) );
                };
                if n > tracks.len() {
                    return Err( anyhow!( "Only {} songs here", tracks.len() ) );
                }
                self.select( n - 1 );
                self.play_list( tracks, n - 1 );
            }
            Command::Play { index: None } => self.activate(),
            Command::Pause => self.session.toggle_play_pause()?,
            Command::Next => self.session.play_next()?,
            Command::Prev => self.session.play_prev()?,
            Command::Seek { position } => self.session.seek_to( position )?,
            Command::Shuffle => self.session.toggle_shuffle()?,
            Command::Repeat { mode: Some( mode ) } => {
                self.session.set_repeat( mode )?;
                self.set_status( format!( "Repeat {}", mode.label() ) );
            }
            Command::Repeat { mode: None } => self.session.cycle_repeat()?,
            Command::Search { term } => {
                self.switch_tab( Tab::Songs );
                self.catalog.set_filter( term );
            }
            Command::Clear => {
                self.catalog.clear_filter();
                self.select( 0 );
            }
            Command::Sort { key } => {
                self.catalog.set_sort( key );
                self.settings.set_sort_key( key );
                self.set_status( format!( "Sorted by {}", key.label() ) );
            }
            Command::Rescan => {
                let tracks = LibraryScanner::new( self.roots.clone() ).scan();
                let count = tracks.len();
                self.catalog.replace( tracks );
                self.sub_view = None;
                self.select( 0 );
                self.set_status( format!( "Found {} tracks", count ) );
            }
            Command::Playlist { name } => self.open_playlist( &name )?,
            Command::New { name } => {
                self.playlists.create( &name )?;
                self.set_status( format!( "Created playlist {}", name ) );
            }
            Command::Add { name } => {
                let track = self.snapshot.track.clone()
                    .ok_or_else( || anyhow!( "Nothing is playing" ) )?;
                self.playlists.append( &name, track.locator() )?;
                self.refresh_playlist_view( &name )?;
                self.set_status( format!( "Added {} to {}", track.title(), name ) );
            }
            Command::Delete { name } => {
                self.playlists.delete( &name )?;
                if self.sub_view.as_ref().and_then( |( v, _ )| v.playlist.as_deref() ) == Some( name.as_str() ) {
                    self.sub_view = None;
                }
                self.select( 0 );
                self.set_status( format!( "Deleted playlist {}", name ) );
            }
            Command::Rename { name } => {
                let from = self.target_playlist()
                    .ok_or_else( || anyhow!( "Open or select a playlist first" ) )?;
                self.playlists.rename( &from, &name )?;
                if let Some(( view, _ )) = self.sub_view.as_mut() {
                    if view.playlist.as_deref() == Some( from.as_str() ) {
                        view.title = name.clone();
                        view.playlist = Some( name.clone() );
                    }
                }
                self.set_status( format!( "Renamed {} to {}", from, name ) );
            }
            Command::Remove => {
                let name = self.sub_view.as_ref()
                    .and_then( |( v, _ )| v.playlist.clone() )
                    .ok_or_else( || anyhow!( "Open a playlist first" ) )?;
                let track = self.sub_view.as_ref()
                    .and_then( |( _, tracks )| tracks.get( self.selected() ).cloned() )
                    .ok_or_else( || anyhow!( "No song selected" ) )?;
                self.playlists.remove( &name, track.locator() )?;
                self.refresh_playlist_view( &name )?;
                self.select( self.selected() );
                self.set_status( format!( "Removed {} from {}", track.title(), name ) );
            }
            Command::Help => self.switch_tab( Tab::Help ),
            Command::Quit => self.should_quit = true,
        }
        Ok(())
    }


    /// Gets the playlist shown in the sub-view, or selected on the Playlists tab.
    fn target_playlist( &self ) -> Option<String> {
        if let Some(( view, _ )) = &self.sub_view {
            return view.playlist.clone();
        }
        match self.listing() {
            Listing::Playlists( names ) => names.get( self.selected() ).cloned(),
            _ => None,
        }
    }


    fn refresh_playlist_view( &mut self, name: &str ) -> Result<()> {
        let showing = self.sub_view.as_ref().and_then( |( v, _ )| v.playlist.as_deref() ) == Some( name );
        if showing {
            let tracks = self.playlists.resolve( name, &self.catalog )?;
            if let Some(( _, shown )) = self.sub_view.as_mut() {
                *shown = tracks;
            }
        }
        Ok(())
    }


    /// Persists settings and stops the session.
    fn shutdown( &mut self ) {
        let snapshot = self.session.snapshot();
        self.settings.shuffle = snapshot.shuffle;
        self.settings.set_repeat_mode( snapshot.repeat );
        self.settings.save();
        self.session.shutdown();
    }
}


/// Sends logs to a file in the data directory; the terminal belongs to the UI.
fn init_logging( verbose: bool ) {
    let Some( dir ) = dirs::data_local_dir().map( |d| d.join( "pocketbeats" ) ) else {
        return;
    };
    if fs::create_dir_all( &dir ).is_err() {
        return;
    }
    let Ok( file ) = OpenOptions::new().create( true ).append( true ).open( dir.join( "pocketbeats.log" ) ) else {
        return;
    };

    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level( level )
        .with_ansi( false )
        .with_writer( Mutex::new( file ) )
        .init();
}


fn main() -> Result<()> {
    let args = Args::parse();
    init_logging( args.verbose );
    tracing::info!( "Starting pocketbeats v{}", env!( "CARGO_PKG_VERSION" ) );

    // Scan and start the session before taking over the terminal
    let mut app = App::new( &args )?;

    enable_raw_mode()?;
    io::stdout().execute( EnterAlternateScreen )?;

    let mut terminal = Terminal::new( CrosstermBackend::new( io::stdout() ) )?;

    let result = run( &mut terminal, &mut app );
    app.shutdown();

    disable_raw_mode()?;
    io::stdout().execute( LeaveAlternateScreen )?;

    result
}


fn run( terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App ) -> Result<()> {
    while !app.should_quit {
        app.tick();

        terminal.draw( |frame| draw_ui( frame, app ) )?;

        if event::poll( Duration::from_millis( 100 ) )? {
            if let Event::Key( key ) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key( key.code, key.modifiers );
                }
            }
        }
    }
    Ok(())
}


/// Draws the main UI.
fn draw_ui( frame: &mut Frame, app: &mut App ) {
    let chunks = Layout::default()
        .direction( Direction::Vertical )
        .constraints([
            Constraint::Length( 2 ),  // Tabs
            Constraint::Min( 0 ),     // Main content
            Constraint::Length( 5 ),  // Now playing
            Constraint::Length( 1 ),  // Status bar
        ])
        .split( frame.area() );

    let titles: Vec<&str> = Tab::ALL.iter().map( Tab::title ).collect();
    let tabs = Tabs::new( titles )
        .select( app.tab.index() )
        .style( Style::default().fg( Color::Gray ) )
        .highlight_style( Style::default().fg( Color::Cyan ).bold() )
        .block( Block::default().borders( Borders::BOTTOM ) );
    frame.render_widget( tabs, chunks[ 0 ] );

    match app.listing() {
        Listing::Help => draw_help( frame, app, chunks[ 1 ] ),
        listing => draw_list( frame, app, listing, chunks[ 1 ] ),
    }

    draw_now_playing( frame, app, chunks[ 2 ] );
    draw_status_bar( frame, app, chunks[ 3 ] );
}


fn draw_list( frame: &mut Frame, app: &mut App, listing: Listing, area: Rect ) {
    let playing_id = app.snapshot.track.as_ref().map( Track::id );

    let ( title, items ): ( String, Vec<ListItem> ) = match listing {
        Listing::Songs( tracks ) => {
            let title = match &app.sub_view {
                Some(( view, _ )) => format!( " {} ({}) [Esc]Back ", view.title, tracks.len() ),
                None if !app.catalog.filter().is_empty() => {
                    format!( " Songs ({}) filter: {} ", tracks.len(), app.catalog.filter() )
                }
                None => format!( " Songs ({}) by {} ", tracks.len(), app.catalog.sort().label() ),
            };
            let items = tracks
                .iter()
                .map( |t| {
                    let playing = Some( t.id() ) == playing_id;
                    let prefix = if playing { "♪ " } else { "  " };
                    let style = if playing {
                        Style::default().fg( Color::Green )
                    } else {
                        Style::default()
                    };
                    ListItem::new( format!( "{}{} - {}", prefix, t.title(), t.artist() ) ).style( style )
                })
                .collect();
            ( title, items )
        }
        Listing::Groups( groups ) => {
            let title = format!( " {} ({}) ", app.tab.title(), groups.len() );
            let items = groups
                .iter()
                .map( |g| ListItem::new( format!( "  {} ({})", g.name, g.tracks.len() ) ) )
                .collect();
            ( title, items )
        }
        Listing::Playlists( names ) => {
            let title = format!( " Playlists ({}) ", names.len() );
            let items = names.iter().map( |n| ListItem::new( format!( "  {}", n ) ) ).collect();
            ( title, items )
        }
        Listing::Help => ( String::new(), Vec::new() ),
    };

    let list = List::new( items )
        .block( Block::default().title( title ).borders( Borders::ALL ) )
        .highlight_style( Style::default().bg( Color::DarkGray ) )
        .highlight_symbol( ">> " );

    frame.render_stateful_widget( list, area, &mut app.list_state );
}


fn draw_help( frame: &mut Frame, app: &mut App, area: Rect ) {
    let help_text = command::help_text();
    let line_count = help_text.lines().count() as u16;
    let visible_height = area.height.saturating_sub( 2 );

    let max_scroll = line_count.saturating_sub( visible_height );
    if app.help_scroll > max_scroll {
        app.help_scroll = max_scroll;
    }

    let help = Paragraph::new( help_text )
        .block( Block::default().title( " Help " ).borders( Borders::ALL ) )
        .wrap( Wrap { trim: false } )
        .scroll(( app.help_scroll, 0 ));

    frame.render_widget( help, area );
}


/// Formats time as M:SS.
fn format_time( d: Duration ) -> String {
    let secs = d.as_secs();
    format!( "{}:{:02}", secs / 60, secs % 60 )
}


fn draw_now_playing( frame: &mut Frame, app: &App, area: Rect ) {
    let snapshot = &app.snapshot;

    let ( title, artist, icon ) = match app.surface.current() {
        Some( now ) => {
            let icon = if now.playing { "▶" } else { "⏸" };
            ( now.title, now.artist, icon )
        }
        None if snapshot.state == PlaybackState::Preparing => {
            let title = snapshot.track.as_ref().map( |t| t.title().to_string() ).unwrap_or_default();
            ( title, "Loading...".to_string(), "…" )
        }
        None => ( "Nothing playing".to_string(), String::new(), "■" ),
    };

    let progress_width = 30;
    let filled = ( app.seek_bar.ratio() * progress_width as f64 ).round() as usize;
    let bar = format!(
        "[{}{}]",
        "█".repeat( filled ),
        "░".repeat( progress_width - filled.min( progress_width ) )
    );

    let modes = format!(
        "{} {}",
        if snapshot.shuffle { "[S]" } else { "" },
        match snapshot.repeat {
            RepeatMode::Off => "",
            RepeatMode::One => "[R1]",
            RepeatMode::All => "[R]",
        }
    );

    let bar_style = if app.seek_bar.is_dragging() {
        Style::default().fg( Color::Yellow )
    } else {
        Style::default()
    };

    let mut lines = vec![
        Line::from( Span::styled( format!( " {} {} ", icon, title ), Style::default().bold() ) ),
    ];
    if !artist.is_empty() {
        lines.push( Line::from( Span::styled( format!( "   {} ", artist ), Style::default().fg( Color::Gray ) ) ) );
    }
    lines.push( Line::from( Span::styled(
        format!(
            " {} {} / {}  {} ",
            bar,
            format_time( app.seek_bar.position() ),
            format_time( app.seek_bar.duration() ),
            modes
        ),
        bar_style,
    )));

    let now_playing = Paragraph::new( lines )
        .block( Block::default().title( " Now Playing " ).borders( Borders::ALL ) );

    frame.render_widget( now_playing, area );
}


fn draw_status_bar( frame: &mut Frame, app: &App, area: Rect ) {
    let ( text, style ) = match app.input_mode {
        InputMode::Command | InputMode::Filter => (
            format!( "{}{}", app.input_mode.prompt(), app.input_buffer.content() ),
            Style::default().fg( Color::Yellow ),
        ),
        InputMode::Normal => {
            if let Some( ref msg ) = app.status_message {
                ( msg.clone(), Style::default().fg( Color::Green ) )
            } else if app.seek_bar.is_dragging() {
                ( " [←/→]Move [Enter]Seek [Esc]Cancel ".to_string(), Style::default().fg( Color::Yellow ) )
            } else {
                (
                    " [/]Cmd [Tab]Tabs [Enter]Play [Space]Pause [n/p]Skip [s]Shuffle [r]Repeat [f]Filter [q]Quit ".to_string(),
                    Style::default().fg( Color::DarkGray ),
                )
            }
        }
    };

    let status = Paragraph::new( text ).style( style );
    frame.render_widget( status, area );

    if app.input_mode != InputMode::Normal {
        let cursor_x = area.x
            + app.input_mode.prompt().chars().count() as u16
            + app.input_buffer.cursor_char_pos() as u16;
        frame.set_cursor_position(( cursor_x, area.y ));
    }
}
