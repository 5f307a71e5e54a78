//! Native decoder/output backend
//!
//! Symphonia decodes on a worker thread, rubato resamples to the device rate,
//! and a single cpal stream opened at construction plays everything. The
//! stream is kept for the whole session; `reset` only tears down the decode
//! thread and clears the shared buffer.

use std::path::PathBuf;
use std::sync::atomic::{ AtomicBool, AtomicU32, AtomicU64, Ordering };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use std::thread;
use std::time::Duration;

use rubato::{ FastFixedOut, PolynomialDegree, Resampler };

use crate::backend::{ AudioBackend, BackendError, BackendEvent, BackendNotifier, SourceToken };
use crate::decoder::{ locator_path, Decoder };
use crate::output::{ AudioOutput, OutputError, SampleBuffer };


/// Converts planar samples back to interleaved format.
/// [[L0, L1, ...], [R0, R1, ...]] → [L0, R0, L1, R1, ...]
fn interleave( channels: &[Vec<f32>] ) -> Vec<f32> {
    if channels.is_empty() || channels[ 0 ].is_empty() {
        return Vec::new();
    }
    let frames = channels[ 0 ].len();
    let mut out = Vec::with_capacity( frames * channels.len() );
    for f in 0..frames {
        for ch in channels {
            out.push( ch[ f ] );
        }
    }
    out
}


/// Sample rate conversion state for one source.
struct Resampling {
    resampler: FastFixedOut<f32>,
    /// Planar samples waiting for a full input chunk
    pending: Vec<Vec<f32>>,
}


impl Resampling {
    fn new( from: u32, to: u32, channels: usize ) -> Result<Self, BackendError> {
        tracing::info!( "Resampling: {} Hz → {} Hz", from, to );

        let resampler = FastFixedOut::<f32>::new(
            to as f64 / from as f64,
            2.0,
            PolynomialDegree::Cubic,
            1024,
            channels,
        ).map_err( |e| BackendError::Output( format!( "Failed to create resampler: {}", e ) ) )?;

        Ok( Self {
            resampler,
            pending: ( 0..channels ).map( |_| Vec::new() ).collect(),
        })
    }


    fn process( &mut self, samples: &[f32] ) -> Vec<f32> {
        let channels = self.pending.len();
        for frame in samples.chunks( channels ) {
            for ( ch, sample ) in frame.iter().enumerate() {
                self.pending[ ch ].push( *sample );
            }
        }

        let mut out = Vec::new();
        while self.pending[ 0 ].len() >= self.resampler.input_frames_next() {
            let needed = self.resampler.input_frames_next();
            let chunk: Vec<Vec<f32>> = self.pending
                .iter_mut()
                .map( |ch| ch.drain( ..needed ).collect() )
                .collect();

            match self.resampler.process( &chunk, None ) {
                Ok( resampled ) => out.extend( interleave( &resampled ) ),
                Err( e ) => {
                    tracing::error!( "Resample error: {}", e );
                    break;
                }
            }
        }
        out
    }


    fn flush( &mut self ) -> Vec<f32> {
        if self.pending[ 0 ].is_empty() {
            return Vec::new();
        }
        match self.resampler.process_partial( Some( &self.pending ), None ) {
            Ok( resampled ) => {
                self.pending.iter_mut().for_each( Vec::clear );
                interleave( &resampled )
            }
            Err( e ) => {
                tracing::error!( "Final resample error: {}", e );
                Vec::new()
            }
        }
    }
}


/// State shared between the backend and its worker threads.
#[derive( Default )]
struct Shared {
    /// Decoder built by the prepare worker, taken by `start`
    prepared: Mutex<Option<Decoder>>,
    /// Bumped on every reset so late workers can tell they are stale
    epoch: AtomicU64,
    frames_played: AtomicU64,
    source_rate: AtomicU32,
    duration_ms: AtomicU64,
    pending_seek: Mutex<Option<Duration>>,
    finished: AtomicBool,
}


impl Shared {
    fn prepared( &self ) -> MutexGuard<'_, Option<Decoder>> {
        self.prepared.lock().unwrap_or_else( PoisonError::into_inner )
    }


    fn pending_seek( &self ) -> MutexGuard<'_, Option<Duration>> {
        self.pending_seek.lock().unwrap_or_else( PoisonError::into_inner )
    }


    fn set_position( &self, position: Duration ) {
        let rate = self.source_rate.load( Ordering::Relaxed ) as f64;
        self.frames_played.store( ( position.as_secs_f64() * rate ) as u64, Ordering::Relaxed );
    }
}


/// Running decode thread.
struct DecodeHandle {
    stop_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}


impl DecodeHandle {
    fn stop( mut self ) {
        self.stop_flag.store( true, Ordering::Relaxed );
        if let Some( thread ) = self.thread.take() {
            let _ = thread.join();
        }
    }
}


impl From<OutputError> for BackendError {
    fn from( e: OutputError ) -> Self {
        BackendError::Output( e.to_string() )
    }
}


/// Desktop backend built on symphonia, rubato and cpal.
pub struct NativeBackend {
    notifier: BackendNotifier,
    output: Option<AudioOutput>,
    buffer: Arc<SampleBuffer>,
    shared: Arc<Shared>,
    source: Option<PathBuf>,
    token: SourceToken,
    playback: Option<DecodeHandle>,
}


impl NativeBackend {
    /// Opens the default output device. The stream lives until `release`.
    pub fn new( notifier: BackendNotifier ) -> Result<Self, OutputError> {
        let ( output, buffer ) = AudioOutput::open_default()?;

        Ok( Self {
            notifier,
            output: Some( output ),
            buffer,
            shared: Arc::new( Shared::default() ),
            source: None,
            token: SourceToken::default(),
            playback: None,
        })
    }


    fn ensure_live( &self ) -> Result<(), BackendError> {
        if self.output.is_none() {
            return Err( BackendError::Released );
        }
        Ok(())
    }


    fn spawn_decode_loop( &mut self, decoder: Decoder ) -> Result<(), BackendError> {
        let resampler = if decoder.sample_rate() != self.buffer.output_rate() {
            Some( Resampling::new( decoder.sample_rate(), self.buffer.output_rate(), decoder.channels() )? )
        } else {
            None
        };

        self.buffer.configure( decoder.channels() as u16 );

        let stop_flag = Arc::new( AtomicBool::new( false ) );
        let ctx = DecodeContext {
            buffer: Arc::clone( &self.buffer ),
            shared: Arc::clone( &self.shared ),
            stop_flag: Arc::clone( &stop_flag ),
            notifier: self.notifier.clone(),
            token: self.token,
        };

        let thread = thread::Builder::new()
            .name( "pocketbeats-decode".into() )
            .spawn( move || ctx.run( decoder, resampler ) )
            .map_err( |e| BackendError::Output( e.to_string() ) )?;

        self.playback = Some( DecodeHandle { stop_flag, thread: Some( thread ) } );
        Ok(())
    }
}


impl AudioBackend for NativeBackend {
    fn reset( &mut self ) {
        if let Some( handle ) = self.playback.take() {
            handle.stop();
        }
        self.shared.epoch.fetch_add( 1, Ordering::SeqCst );
        *self.shared.prepared() = None;
        *self.shared.pending_seek() = None;
        self.shared.frames_played.store( 0, Ordering::Relaxed );
        self.shared.duration_ms.store( 0, Ordering::Relaxed );
        self.shared.finished.store( false, Ordering::Relaxed );
        self.buffer.set_paused( true );
        self.buffer.clear();
        self.source = None;
    }


    fn set_source( &mut self, locator: &str ) -> Result<(), BackendError> {
        self.ensure_live()?;
        let path = locator_path( locator );

        // Fail fast on unreadable files; format problems surface during prepare
        std::fs::File::open( &path ).map_err( |e| BackendError::SourceOpen {
            locator: locator.to_string(),
            reason: e.to_string(),
        })?;

        self.source = Some( path );
        Ok(())
    }


    fn prepare_async( &mut self, token: SourceToken ) -> Result<(), BackendError> {
        self.ensure_live()?;
        let path = self.source.clone().ok_or( BackendError::NoSource )?;
        self.token = token;

        let shared = Arc::clone( &self.shared );
        let notifier = self.notifier.clone();
        let epoch = shared.epoch.load( Ordering::SeqCst );

        thread::Builder::new()
            .name( "pocketbeats-prepare".into() )
            .spawn( move || {
                let result = Decoder::open( &path );

                let mut slot = shared.prepared();
                if shared.epoch.load( Ordering::SeqCst ) != epoch {
                    tracing::debug!( "Discarding stale prepare of {:?}", path );
                    return;
                }

                match result {
                    Ok( decoder ) => {
                        shared.source_rate.store( decoder.sample_rate(), Ordering::Relaxed );
                        let duration = decoder.duration().unwrap_or_default();
                        shared.duration_ms.store( duration.as_millis() as u64, Ordering::Relaxed );
                        *slot = Some( decoder );
                        drop( slot );
                        notifier.notify( BackendEvent::Prepared { token } );
                    }
                    Err( e ) => {
                        drop( slot );
                        tracing::warn!( "Failed to prepare {:?}: {}", path, e );
                        notifier.notify( BackendEvent::Error { token, code: e.code(), extra: 0 } );
                    }
                }
            })
            .map_err( |e| BackendError::Output( e.to_string() ) )?;

        Ok(())
    }


    fn start( &mut self ) -> Result<(), BackendError> {
        self.ensure_live()?;

        if self.playback.is_none() {
            let decoder = self.shared.prepared().take().ok_or( BackendError::NotPrepared )?;
            self.spawn_decode_loop( decoder )?;
        }

        self.buffer.set_paused( false );
        Ok(())
    }


    fn pause( &mut self ) -> Result<(), BackendError> {
        self.ensure_live()?;
        self.buffer.set_paused( true );
        Ok(())
    }


    fn seek_to( &mut self, position: Duration ) -> Result<(), BackendError> {
        self.ensure_live()?;

        if self.playback.is_some() {
            *self.shared.pending_seek() = Some( position );
            self.shared.set_position( position );
            return Ok(());
        }

        let mut slot = self.shared.prepared();
        let decoder = slot.as_mut().ok_or( BackendError::NotPrepared )?;
        decoder.seek( position ).map_err( |e| BackendError::Output( e.to_string() ) )?;
        drop( slot );
        self.shared.set_position( position );
        Ok(())
    }


    fn position( &self ) -> Duration {
        let rate = self.shared.source_rate.load( Ordering::Relaxed );
        if rate == 0 {
            return Duration::ZERO;
        }
        let frames = self.shared.frames_played.load( Ordering::Relaxed );
        Duration::from_secs_f64( frames as f64 / rate as f64 )
    }


    fn duration( &self ) -> Duration {
        Duration::from_millis( self.shared.duration_ms.load( Ordering::Relaxed ) )
    }


    fn is_playing( &self ) -> bool {
        self.playback.is_some()
            && !self.buffer.is_paused()
            && !self.shared.finished.load( Ordering::Relaxed )
    }


    fn set_gain( &mut self, gain: f32 ) {
        self.buffer.set_gain( gain );
    }


    fn release( &mut self ) {
        let Some( output ) = self.output.take() else {
            return;
        };
        self.reset();
        if let Err( e ) = output.pause() {
            tracing::warn!( "Failed to pause output on release: {}", e );
        }
        tracing::info!( "Audio output released" );
    }
}


impl Drop for NativeBackend {
    fn drop( &mut self ) {
        self.release();
    }
}


/// Everything the decode thread needs.
struct DecodeContext {
    buffer: Arc<SampleBuffer>,
    shared: Arc<Shared>,
    stop_flag: Arc<AtomicBool>,
    notifier: BackendNotifier,
    token: SourceToken,
}


impl DecodeContext {
    fn stopped( &self ) -> bool {
        self.stop_flag.load( Ordering::Relaxed )
    }


    /// Pushes all samples, waiting for room. Gives up if stopped.
    fn push_all( &self, samples: &[f32] ) {
        let mut offset = 0;
        while offset < samples.len() && !self.stopped() {
            let pushed = self.buffer.push( &samples[ offset.. ] );
            offset += pushed;
            if pushed == 0 {
                thread::sleep( Duration::from_millis( 5 ) );
            }
        }
    }


    fn run( self, mut decoder: Decoder, mut resampler: Option<Resampling> ) {
        let channels = decoder.channels();
        // Keep about 50ms decoded ahead
        let target_buffer = ( self.buffer.output_rate() as usize * channels ) / 20;

        loop {
            if self.stopped() {
                tracing::debug!( "Decode loop: stop signal received" );
                break;
            }

            if let Some( position ) = self.shared.pending_seek().take() {
                if let Err( e ) = decoder.seek( position ) {
                    tracing::warn!( "Seek to {:?} failed: {}", position, e );
                }
                self.buffer.clear();
            }

            if self.buffer.is_paused() || self.buffer.len() > target_buffer {
                thread::sleep( Duration::from_millis( 5 ) );
                continue;
            }

            match decoder.decode_next() {
                Ok( Some( samples ) ) => {
                    let frames = ( samples.len() / channels ) as u64;
                    self.shared.frames_played.fetch_add( frames, Ordering::Relaxed );

                    let out = match resampler {
                        Some( ref mut r ) => r.process( &samples ),
                        None => samples,
                    };
                    self.push_all( &out );
                }
                Ok( None ) => {
                    if let Some( ref mut r ) = resampler {
                        let tail = r.flush();
                        self.push_all( &tail );
                    }

                    tracing::info!( "Decode loop: reached end of stream" );
                    while !self.buffer.is_empty() && !self.stopped() {
                        thread::sleep( Duration::from_millis( 10 ) );
                    }
                    if !self.stopped() {
                        self.shared.finished.store( true, Ordering::Relaxed );
                        self.notifier.notify( BackendEvent::Completed { token: self.token } );
                    }
                    break;
                }
                Err( e ) => {
                    tracing::error!( "Decode error: {}", e );
                    if !self.stopped() {
                        self.notifier.notify( BackendEvent::Error {
                            token: self.token,
                            code: e.code(),
                            extra: 0,
                        });
                    }
                    break;
                }
            }
        }

        tracing::debug!( "Decode loop: exiting" );
    }
}


#[cfg( test )]
mod tests {
    use super::*;


    #[test]
    fn test_interleave_planar() {
        let planar = vec![ vec![ 1.0, 2.0 ], vec![ 3.0, 4.0 ] ];
        assert_eq!( interleave( &planar ), vec![ 1.0, 3.0, 2.0, 4.0 ] );
        assert!( interleave( &[] ).is_empty() );
    }
}
