//! Resilient decoding of concatenated LZMA / XZ frames.
//!
//! The published index is one or more back-to-back compressed frames, and it
//! has been seen shipping with a damaged or partial tail. Frames are decoded
//! front to back, each from the bytes the previous one left unconsumed.
//!
//! - A failure before any frame decoded means the buffer is not a compressed
//!   stream at all: [`DecodeError::Invalid`], no retry.
//! - A failure after at least one frame means a bad tail: the buffer is
//!   shortened one byte at a time until a length decodes cleanly end to end.
//!   The result is the maximal clean prefix.
//!
//! The shrink loop never goes below the end of the last frame that decoded at
//! full length, since that prefix is already known to be clean. Frames before
//! that point decode identically at every shorter length, so each retry only
//! re-decodes the tail after it.

use xz2::stream::{Action, Status, Stream};

const OUTPUT_CHUNK: usize = 64 * 1024;

/// Caps the dictionary a damaged header can make the decoder allocate.
const DECODER_MEMLIMIT: u64 = 256 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("buffer is not a valid compressed stream: {0}")]
    Invalid(#[source] FrameError),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("failed to initialize decoder: {0}")]
    Init(#[source] xz2::stream::Error),

    #[error("corrupt frame at offset {offset}: {source}")]
    Corrupt {
        offset: usize,
        #[source]
        source: xz2::stream::Error,
    },

    #[error("frame at offset {offset} ends before its end-of-stream marker")]
    Truncated { offset: usize },
}

/// Decode every frame in `input`, recovering the maximal clean prefix when
/// the tail is damaged.
pub fn decompress(input: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let full = decode_frames(input, 0);
    let Some(failure) = full.failure else {
        return Ok(full.output);
    };
    if full.frames == 0 {
        return Err(DecodeError::Invalid(failure));
    }

    tracing::warn!(
        len = input.len(),
        clean_end = full.clean_end,
        error = %failure,
        "compressed buffer has a damaged tail, searching for the longest clean prefix"
    );

    let floor = full.clean_end;
    let mut len = input.len() - 1;
    while len > floor {
        let tail = decode_frames(&input[..len], floor);
        if tail.failure.is_none() {
            tracing::info!(len, dropped = input.len() - len, "recovered clean prefix");
            let mut output = full.output;
            output.extend_from_slice(&tail.output);
            return Ok(output);
        }
        len -= 1;
    }

    tracing::info!(
        len = floor,
        dropped = input.len() - floor,
        "recovered clean prefix"
    );
    Ok(full.output)
}

struct Attempt {
    output: Vec<u8>,
    frames: usize,
    /// Offset just past the last frame that decoded completely.
    clean_end: usize,
    failure: Option<FrameError>,
}

/// Decode `input[start..]` frame by frame, stopping at the first failure.
fn decode_frames(input: &[u8], start: usize) -> Attempt {
    let mut output = Vec::new();
    let mut offset = start;
    let mut frames = 0;

    while offset < input.len() {
        match decode_frame(&input[offset..], offset) {
            Ok((bytes, consumed)) => {
                output.extend_from_slice(&bytes);
                offset += consumed;
                frames += 1;
            }
            Err(failure) => {
                return Attempt {
                    output,
                    frames,
                    clean_end: offset,
                    failure: Some(failure),
                }
            }
        }
    }

    Attempt {
        output,
        frames,
        clean_end: offset,
        failure: None,
    }
}

/// Decode exactly one frame from the front of `input`.
///
/// Returns the decoded bytes and how many input bytes the frame occupied.
fn decode_frame(input: &[u8], offset: usize) -> Result<(Vec<u8>, usize), FrameError> {
    let mut stream = Stream::new_auto_decoder(DECODER_MEMLIMIT, 0).map_err(FrameError::Init)?;
    let mut output = Vec::with_capacity(OUTPUT_CHUNK);

    loop {
        if output.capacity() - output.len() < OUTPUT_CHUNK / 2 {
            output.reserve(OUTPUT_CHUNK);
        }
        let consumed = stream.total_in() as usize;
        let produced = stream.total_out();

        let status = stream
            .process_vec(&input[consumed..], &mut output, Action::Run)
            .map_err(|source| FrameError::Corrupt {
                offset: offset + consumed,
                source,
            })?;

        let frame_len = stream.total_in() as usize;
        if matches!(status, Status::StreamEnd) {
            if frame_len == 0 {
                return Err(FrameError::Truncated { offset });
            }
            return Ok((output, frame_len));
        }
        if frame_len == consumed && stream.total_out() == produced {
            return Err(FrameError::Truncated { offset });
        }
    }
}
