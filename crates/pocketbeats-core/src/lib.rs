//! PocketBeats Core - Playback session engine
//!
//! This crate provides the playback queue, the engine that drives a
//! decoder/output backend, audio focus handling and the session actor that
//! serializes all of it behind a handle, plus a native symphonia/cpal
//! backend for desktops.

pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod engine;
pub mod fault;
pub mod focus;
pub mod native;
pub mod observer;
pub mod output;
pub mod progress;
pub mod queue;
pub mod session;
pub mod surface;
pub mod track;

#[cfg( test )]
mod mock;

pub use backend::{ AudioBackend, BackendError, BackendEvent, BackendNotifier, SourceToken };
pub use command::{ Command, CommandError, SortKey };
pub use config::SessionConfig;
pub use decoder::AudioMetadata;
pub use engine::{ EngineError, PlaybackState };
pub use fault::PlaybackFault;
pub use focus::{ FocusKind, FocusProvider, GrantedFocus };
pub use native::NativeBackend;
pub use observer::{ ChannelObserver, PlaybackNotice, PlaybackObserver };
pub use progress::SeekBar;
pub use queue::{ QueueManager, RepeatMode };
pub use session::{ Session, SessionError, SessionHandle, SessionSnapshot };
pub use surface::{ NowPlaying, NowPlayingSurface, SharedSurface };
pub use track::Track;
