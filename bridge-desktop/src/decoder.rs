//! # Symphonia Decoder
//!
//! Decodes a complete in-memory file into one interleaved `f32` buffer.
//! Decoding is CPU-bound, so it runs on the blocking pool.

use async_trait::async_trait;
use bridge_traits::{
    audio::{AudioBuffer, AudioDecoder},
    error::{BridgeError, Result},
};
use bytes::Bytes;
use core_async::task::spawn_blocking;
use std::io::Cursor;
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, instrument, warn};

/// Corrupt packets tolerated in a row before the decode is abandoned.
const MAX_CONSECUTIVE_ERRORS: usize = 10;

/// [`AudioDecoder`] backed by symphonia's default codec registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioDecoder for SymphoniaDecoder {
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn decode(&self, data: Bytes, hint: Option<String>) -> Result<AudioBuffer> {
        spawn_blocking(move || decode_all(data, hint.as_deref()))
            .await
            .map_err(|e| BridgeError::Decode(format!("Decode task failed: {}", e)))?
    }
}

fn decode_all(data: Bytes, extension: Option<&str>) -> Result<AudioBuffer> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let stream = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());
    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BridgeError::Decode(format!("Unrecognized format: {}", e)))?;

    let mut reader = probed.format;
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BridgeError::Decode("No decodable audio track".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| BridgeError::Decode(format!("Unsupported codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut scratch: Option<Scratch> = None;
    let mut consecutive_errors = 0;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                return Err(BridgeError::Decode(
                    "Track list changed mid-stream".to_string(),
                ));
            }
            Err(e) => return Err(BridgeError::Decode(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                consecutive_errors = 0;

                let spec = *decoded.spec();
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;

                let buffer = scratch_for(&mut scratch, spec, decoded.capacity());
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(message)) => {
                consecutive_errors += 1;
                if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(BridgeError::Decode(format!(
                        "Decoder failure after {} bad packets: {}",
                        MAX_CONSECUTIVE_ERRORS, message
                    )));
                }
                warn!(consecutive_errors, error = message, "Skipping corrupt packet");
            }
            Err(e) => return Err(BridgeError::Decode(format!("Failed to decode packet: {}", e))),
        }
    }

    if samples.is_empty() || sample_rate == 0 || channels == 0 {
        return Err(BridgeError::Decode("Stream contained no audio".to_string()));
    }

    let buffer = AudioBuffer::new(samples, sample_rate, channels);
    debug!(
        frames = buffer.frames(),
        sample_rate,
        channels,
        "Decoded audio buffer"
    );
    Ok(buffer)
}

/// Interleaving space reused across packets.
struct Scratch {
    spec: SignalSpec,
    frames: usize,
    buffer: SampleBuffer<f32>,
}

/// Reuse the scratch buffer while it matches the packet's signal layout and
/// holds at least `frames` frames; reallocate otherwise.
fn scratch_for(
    scratch: &mut Option<Scratch>,
    spec: SignalSpec,
    frames: usize,
) -> &mut SampleBuffer<f32> {
    let fits = matches!(scratch, Some(current) if current.spec == spec && current.frames >= frames);
    if !fits {
        *scratch = None;
    }

    &mut scratch
        .get_or_insert_with(|| Scratch {
            spec,
            frames,
            buffer: SampleBuffer::new(frames as u64, spec),
        })
        .buffer
}
