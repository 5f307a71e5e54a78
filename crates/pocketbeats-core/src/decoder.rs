//! Audio decoding via Symphonia
//!
//! Opens a track locator, probes its container and tags, and decodes packets
//! into interleaved f32 samples.

use std::fs::File;
use std::path::{ Path, PathBuf };
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{ Decoder as SymphoniaDecoder, DecoderOptions, CODEC_TYPE_NULL };
use symphonia::core::formats::{ FormatOptions, FormatReader, SeekMode, SeekTo };
use symphonia::core::io::{ MediaSourceStream, MediaSourceStreamOptions };
use symphonia::core::meta::{ MetadataOptions, StandardTagKey, Tag };
use symphonia::core::probe::{ Hint, ProbedMetadata };
use symphonia::core::units::Time;
use thiserror::Error;

use crate::backend::{ ERROR_IO, ERROR_MALFORMED, ERROR_UNKNOWN, ERROR_UNSUPPORTED };


/// Tags read from an audio file.
#[derive( Debug, Clone, Default )]
pub struct AudioMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
}


/// Errors that can occur during decoding.
#[derive( Debug, Error )]
pub enum DecoderError {
    #[error( "Failed to open file: {0}" )]
    FileOpen( #[from] std::io::Error ),

    #[error( "Unsupported format" )]
    UnsupportedFormat,

    #[error( "No audio tracks found" )]
    NoAudioTrack,

    #[error( "Decoder creation failed: {0}" )]
    DecoderCreation( String ),

    #[error( "Decode error: {0}" )]
    Decode( String ),

    #[error( "Seek error: {0}" )]
    Seek( String ),
}


impl DecoderError {
    /// Maps the error onto a backend error code.
    pub fn code( &self ) -> i32 {
        match self {
            DecoderError::FileOpen( _ ) => ERROR_IO,
            DecoderError::UnsupportedFormat
            | DecoderError::NoAudioTrack
            | DecoderError::DecoderCreation( _ ) => ERROR_UNSUPPORTED,
            DecoderError::Decode( _ ) => ERROR_MALFORMED,
            DecoderError::Seek( _ ) => ERROR_UNKNOWN,
        }
    }
}


/// Resolves a track locator to a filesystem path.
///
/// Accepts plain paths and `file://` URIs.
pub fn locator_path( locator: &str ) -> PathBuf {
    match locator.strip_prefix( "file://" ) {
        Some( rest ) => PathBuf::from( rest ),
        None => PathBuf::from( locator ),
    }
}


/// Audio decoder wrapper around Symphonia.
pub struct Decoder {
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn SymphoniaDecoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    sample_buf: Option<SampleBuffer<f32>>,
    duration: Option<Duration>,
    probe_metadata: ProbedMetadata,
}


impl Decoder {
    /// Opens an audio file for decoding.
    pub fn open( path: &Path ) -> Result<Self, DecoderError> {
        let file = File::open( path )?;
        let mss = MediaSourceStream::new(
            Box::new( file ),
            MediaSourceStreamOptions { buffer_len: 64 * 1024 },
        );

        let mut hint = Hint::new();
        if let Some( ext ) = path.extension().and_then( |e| e.to_str() ) {
            hint.with_extension( ext );
        }

        let probed = symphonia::default::get_probe()
            .format( &hint, mss, &FormatOptions::default(), &MetadataOptions::default() )
            .map_err( |_| DecoderError::UnsupportedFormat )?;

        let probe_metadata = probed.metadata;
        let format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find( |t| t.codec_params.codec != CODEC_TYPE_NULL )
            .ok_or( DecoderError::NoAudioTrack )?;

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params.sample_rate.unwrap_or( 44100 );
        let channels = codec_params.channels.map( |c| c.count() ).unwrap_or( 2 );
        let duration = codec_params.n_frames
            .map( |frames| Duration::from_secs_f64( frames as f64 / sample_rate as f64 ) );

        tracing::debug!(
            "Opened {:?}: {} Hz, {} channels, duration {:?}",
            path,
            sample_rate,
            channels,
            duration
        );

        let decoder = symphonia::default::get_codecs()
            .make( codec_params, &DecoderOptions::default() )
            .map_err( |e| DecoderError::DecoderCreation( e.to_string() ) )?;

        Ok( Self {
            format_reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
            duration,
            probe_metadata,
        })
    }


    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    pub fn channels( &self ) -> usize {
        self.channels
    }


    /// Returns the duration, if the container reports one.
    pub fn duration( &self ) -> Option<Duration> {
        self.duration
    }


    /// Extracts tags from the probe result and the container.
    ///
    /// The first value found for each field wins.
    pub fn metadata( &mut self ) -> AudioMetadata {
        let mut meta = AudioMetadata {
            duration: self.duration,
            ..AudioMetadata::default()
        };

        if let Some( metadata_log ) = self.probe_metadata.get() {
            if let Some( revision ) = metadata_log.current() {
                collect_tags( &mut meta, revision.tags() );
            }
        }

        if let Some( revision ) = self.format_reader.metadata().current() {
            collect_tags( &mut meta, revision.tags() );
        }

        meta
    }


    /// Decodes the next packet and returns interleaved f32 samples.
    ///
    /// Returns None when EOF is reached.
    pub fn decode_next( &mut self ) -> Result<Option<Vec<f32>>, DecoderError> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok( packet ) => packet,
                Err( symphonia::core::errors::Error::IoError( ref e ) )
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok( None );
                }
                Err( e ) => return Err( DecoderError::Decode( e.to_string() ) ),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode( &packet ) {
                Ok( decoded ) => decoded,
                // Corrupt packets are skipped
                Err( symphonia::core::errors::Error::DecodeError( _ ) ) => continue,
                Err( e ) => return Err( DecoderError::Decode( e.to_string() ) ),
            };

            let spec = *decoded.spec();
            let frames = decoded.frames();

            if self.sample_buf.as_ref().map_or( true, |buf| buf.capacity() < frames ) {
                self.sample_buf = Some( SampleBuffer::new( frames as u64, spec ) );
            }
            let Some( sample_buf ) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref( decoded );

            return Ok( Some( sample_buf.samples().to_vec() ) );
        }
    }


    /// Seeks to a position.
    pub fn seek( &mut self, position: Duration ) -> Result<(), DecoderError> {
        let seek_to = SeekTo::Time {
            time: Time::from( position.as_secs_f64() ),
            track_id: Some( self.track_id ),
        };

        self.format_reader
            .seek( SeekMode::Accurate, seek_to )
            .map_err( |e| DecoderError::Seek( e.to_string() ) )?;

        self.decoder.reset();
        Ok(())
    }
}


/// Opens a file just long enough to read its tags and duration.
pub fn probe( path: &Path ) -> Result<AudioMetadata, DecoderError> {
    let mut decoder = Decoder::open( path )?;
    Ok( decoder.metadata() )
}


fn collect_tags( meta: &mut AudioMetadata, tags: &[Tag] ) {
    for tag in tags {
        let slot = match tag.std_key {
            Some( StandardTagKey::TrackTitle ) => &mut meta.title,
            Some( StandardTagKey::Artist ) => &mut meta.artist,
            Some( StandardTagKey::Album ) => &mut meta.album,
            _ => continue,
        };
        if slot.is_none() {
            *slot = Some( tag.value.to_string() );
        }
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_locator_path_accepts_file_uri() {
        assert_eq!( locator_path( "file:///music/a.flac" ), PathBuf::from( "/music/a.flac" ) );
        assert_eq!( locator_path( "/music/b.mp3" ), PathBuf::from( "/music/b.mp3" ) );
    }


    #[test]
    fn test_open_missing_file_is_io_error() {
        let err = Decoder::open( Path::new( "/definitely/not/here.mp3" ) ).err().unwrap();
        assert!( matches!( err, DecoderError::FileOpen( _ ) ) );
        assert_eq!( err.code(), ERROR_IO );
    }
}
