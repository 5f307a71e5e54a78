//! Audio output via cpal
//!
//! One output stream is opened per session. Decoded samples are pushed into a
//! shared `SampleBuffer` that the device callback drains.

use std::collections::VecDeque;
use std::sync::atomic::{ AtomicBool, AtomicU16, AtomicU32, AtomicUsize, Ordering };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };

use cpal::traits::{ DeviceTrait, HostTrait, StreamTrait };
use thiserror::Error;


/// Errors that can occur with audio output.
#[derive( Debug, Error )]
pub enum OutputError {
    #[error( "No output device available" )]
    NoDevice,

    #[error( "Failed to get default stream config: {0}" )]
    StreamConfig( String ),

    #[error( "Failed to build output stream: {0}" )]
    BuildStream( String ),

    #[error( "Failed to play stream: {0}" )]
    PlayStream( String ),
}


/// Shared sample buffer between the decode thread and the audio callback.
///
/// Samples are interleaved in the source's channel layout; `pop` converts to
/// the device layout and applies gain.
pub struct SampleBuffer {
    buffer: Mutex<VecDeque<f32>>,
    capacity: AtomicUsize,
    paused: AtomicBool,
    /// Gain stored as f32 bits
    gain: AtomicU32,
    source_channels: AtomicU16,
    output_channels: u16,
    output_rate: u32,
}


impl SampleBuffer {
    /// Creates an empty, paused buffer for a device with the given layout.
    pub fn new( output_rate: u32, output_channels: u16 ) -> Self {
        Self {
            buffer: Mutex::new( VecDeque::new() ),
            capacity: AtomicUsize::new( half_second( output_rate, output_channels ) ),
            paused: AtomicBool::new( true ),
            gain: AtomicU32::new( 1.0_f32.to_bits() ),
            source_channels: AtomicU16::new( output_channels ),
            output_channels,
            output_rate,
        }
    }


    fn lock( &self ) -> MutexGuard<'_, VecDeque<f32>> {
        self.buffer.lock().unwrap_or_else( PoisonError::into_inner )
    }


    /// Clears the buffer and switches to a new source channel count.
    pub fn configure( &self, source_channels: u16 ) {
        let source_channels = source_channels.max( 1 );
        let mut buf = self.lock();
        buf.clear();
        self.source_channels.store( source_channels, Ordering::Relaxed );
        self.capacity.store( half_second( self.output_rate, source_channels ), Ordering::Relaxed );
    }


    /// Pushes samples. Returns the number actually accepted.
    pub fn push( &self, samples: &[f32] ) -> usize {
        let mut buf = self.lock();
        let capacity = self.capacity.load( Ordering::Relaxed );
        let to_push = samples.len().min( capacity.saturating_sub( buf.len() ) );
        buf.extend( samples[ ..to_push ].iter().copied() );
        to_push
    }


    /// Fills `output` in device layout. Returns the number of samples written;
    /// the rest of `output` is silence.
    pub fn pop( &self, output: &mut [f32] ) -> usize {
        if self.paused.load( Ordering::Relaxed ) {
            output.fill( 0.0 );
            return 0;
        }

        let gain = f32::from_bits( self.gain.load( Ordering::Relaxed ) );
        let src_ch = self.source_channels.load( Ordering::Relaxed ) as usize;
        let out_ch = self.output_channels as usize;
        let mut buf = self.lock();

        let frames = ( output.len() / out_ch ).min( buf.len() / src_ch );
        let mut frame = Vec::with_capacity( src_ch );

        for f in 0..frames {
            frame.clear();
            frame.extend( buf.drain( ..src_ch ) );

            let out = &mut output[ f * out_ch..( f + 1 ) * out_ch ];
            if src_ch == 2 && out_ch == 1 {
                out[ 0 ] = ( frame[ 0 ] + frame[ 1 ] ) * 0.5;
            } else {
                // Extra device channels repeat the last source channel
                for ( ch, sample ) in out.iter_mut().enumerate() {
                    *sample = frame[ ch.min( src_ch - 1 ) ];
                }
            }
        }

        let written = frames * out_ch;
        output[ written.. ].fill( 0.0 );

        if gain != 1.0 {
            for sample in output[ ..written ].iter_mut() {
                *sample *= gain;
            }
        }

        written
    }


    pub fn len( &self ) -> usize {
        self.lock().len()
    }


    pub fn is_empty( &self ) -> bool {
        self.lock().is_empty()
    }


    pub fn clear( &self ) {
        self.lock().clear();
    }


    pub fn set_paused( &self, paused: bool ) {
        self.paused.store( paused, Ordering::Relaxed );
    }


    pub fn is_paused( &self ) -> bool {
        self.paused.load( Ordering::Relaxed )
    }


    /// Sets the output gain (0.0 = mute, 1.0 = unity).
    pub fn set_gain( &self, gain: f32 ) {
        self.gain.store( gain.max( 0.0 ).to_bits(), Ordering::Relaxed );
    }


    pub fn gain( &self ) -> f32 {
        f32::from_bits( self.gain.load( Ordering::Relaxed ) )
    }


    /// Gets the device sample rate every source is resampled to.
    pub fn output_rate( &self ) -> u32 {
        self.output_rate
    }
}


fn half_second( rate: u32, channels: u16 ) -> usize {
    ( rate as usize ) * ( channels.max( 1 ) as usize ) / 2
}


/// Audio output stream on the default device.
///
/// Not Send: cpal streams stay on the thread that created them.
pub struct AudioOutput {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
}


impl AudioOutput {
    /// Opens the default output device with its default config.
    ///
    /// Returns the output and the buffer the decode thread should fill.
    pub fn open_default() -> Result<( Self, Arc<SampleBuffer> ), OutputError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or( OutputError::NoDevice )?;

        tracing::info!( "Using output device: {:?}", device.name() );

        let config = device
            .default_output_config()
            .map_err( |e| OutputError::StreamConfig( e.to_string() ) )?
            .config();

        tracing::info!(
            "Audio output config: {} Hz, {} channels",
            config.sample_rate.0,
            config.channels
        );

        let sample_buffer = Arc::new( SampleBuffer::new( config.sample_rate.0, config.channels ) );
        let callback_buffer = Arc::clone( &sample_buffer );

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_buffer.pop( data );
                },
                |err| {
                    tracing::error!( "Audio output error: {}", err );
                },
                None,
            )
            .map_err( |e| OutputError::BuildStream( e.to_string() ) )?;

        stream.play().map_err( |e| OutputError::PlayStream( e.to_string() ) )?;

        Ok((
            Self {
                stream,
                sample_rate: config.sample_rate.0,
                channels: config.channels,
            },
            sample_buffer,
        ))
    }


    /// Suspends the device stream.
    pub fn pause( &self ) -> Result<(), OutputError> {
        self.stream
            .pause()
            .map_err( |e| OutputError::PlayStream( e.to_string() ) )
    }


    pub fn sample_rate( &self ) -> u32 {
        self.sample_rate
    }


    pub fn channels( &self ) -> u16 {
        self.channels
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_paused_buffer_outputs_silence() {
        let buffer = SampleBuffer::new( 48000, 2 );
        buffer.push( &[ 0.5; 8 ] );

        let mut out = [ 1.0; 4 ];
        assert_eq!( buffer.pop( &mut out ), 0 );
        assert_eq!( out, [ 0.0; 4 ] );
        assert_eq!( buffer.len(), 8 );
    }


    #[test]
    fn test_mono_source_fills_both_channels() {
        let buffer = SampleBuffer::new( 48000, 2 );
        buffer.configure( 1 );
        buffer.set_paused( false );
        buffer.push( &[ 0.1, 0.2 ] );

        let mut out = [ 9.0; 6 ];
        assert_eq!( buffer.pop( &mut out ), 4 );
        assert_eq!( out, [ 0.1, 0.1, 0.2, 0.2, 0.0, 0.0 ] );
    }


    #[test]
    fn test_gain_scales_output() {
        let buffer = SampleBuffer::new( 48000, 1 );
        buffer.set_paused( false );
        buffer.set_gain( 0.5 );
        buffer.push( &[ 0.8, -0.4 ] );

        let mut out = [ 0.0; 2 ];
        buffer.pop( &mut out );
        assert_eq!( out, [ 0.4, -0.2 ] );
    }


    #[test]
    fn test_push_respects_capacity() {
        let buffer = SampleBuffer::new( 4, 1 );
        assert_eq!( buffer.push( &[ 0.0; 10 ] ), 2 );
        assert_eq!( buffer.push( &[ 0.0; 10 ] ), 0 );

        buffer.configure( 2 );
        assert!( buffer.is_empty() );
        assert_eq!( buffer.push( &[ 0.0; 10 ] ), 4 );
    }
}
