//! Text entry for the status line.
//!
//! The status line doubles as the slash-command prompt and the live filter
//! prompt; `InputMode` says which one is active.


/// What keystrokes currently go to.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default )]
pub enum InputMode {
    /// Keyboard shortcuts active.
    #[default]
    Normal,

    /// Typing a slash command.
    Command,

    /// Typing a filter; the song list narrows as you type.
    Filter,
}


impl InputMode {
    /// Prompt shown before the buffer.
    pub fn prompt( &self ) -> &'static str {
        match self {
            InputMode::Normal => "",
            InputMode::Command => "/",
            InputMode::Filter => "Filter: ",
        }
    }
}


/// Single-line edit buffer with a cursor.
#[derive( Debug, Default )]
pub struct InputBuffer {
    content: String,
    /// Byte offset, always on a char boundary
    cursor: usize,
}


impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }


    /// Replaces the content and puts the cursor at the end.
    pub fn set( &mut self, content: &str ) {
        self.content = content.to_string();
        self.cursor = self.content.len();
    }


    pub fn insert( &mut self, c: char ) {
        self.content.insert( self.cursor, c );
        self.cursor += c.len_utf8();
    }


    /// Deletes the character before the cursor.
    pub fn backspace( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.content.remove( prev );
            self.cursor = prev;
        }
    }


    /// Deletes the character under the cursor.
    pub fn delete( &mut self ) {
        if self.cursor < self.content.len() {
            self.content.remove( self.cursor );
        }
    }


    pub fn move_left( &mut self ) {
        if let Some( prev ) = self.prev_boundary() {
            self.cursor = prev;
        }
    }


    pub fn move_right( &mut self ) {
        if let Some( c ) = self.content[ self.cursor.. ].chars().next() {
            self.cursor += c.len_utf8();
        }
    }


    pub fn move_home( &mut self ) {
        self.cursor = 0;
    }


    pub fn move_end( &mut self ) {
        self.cursor = self.content.len();
    }


    pub fn clear( &mut self ) {
        self.content.clear();
        self.cursor = 0;
    }


    /// Takes the content, leaving the buffer empty.
    pub fn take( &mut self ) -> String {
        self.cursor = 0;
        std::mem::take( &mut self.content )
    }


    pub fn content( &self ) -> &str {
        &self.content
    }


    /// Gets the cursor position in characters, for display.
    pub fn cursor_char_pos( &self ) -> usize {
        self.content[ ..self.cursor ].chars().count()
    }


    pub fn is_empty( &self ) -> bool {
        self.content.is_empty()
    }


    fn prev_boundary( &self ) -> Option<usize> {
        self.content[ ..self.cursor ].char_indices().last().map( |( i, _ )| i )
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_edit_multibyte() {
        let mut buf = InputBuffer::new();
        for c in "héllo".chars() {
            buf.insert( c );
        }
        buf.move_left();
        buf.move_left();
        buf.move_left();
        buf.backspace();
        assert_eq!( buf.content(), "hllo" );
        assert_eq!( buf.cursor_char_pos(), 1 );

        buf.move_right();
        buf.delete();
        assert_eq!( buf.content(), "hlo" );
    }


    #[test]
    fn test_take_empties() {
        let mut buf = InputBuffer::new();
        buf.set( "seek 1:30" );
        assert_eq!( buf.take(), "seek 1:30" );
        assert!( buf.is_empty() );
        assert_eq!( buf.cursor_char_pos(), 0 );
    }
}
