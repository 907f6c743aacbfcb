//! The five media transforms.
//!
//! Flag sets mirror what the rest of the system depends on: segment
//! concatenation by demuxer list with stream copy, JPEG frame extraction
//! at a fixed rate, 16 kHz mono PCM audio extraction, remuxing that
//! preserves the full video duration, and fMP4 fragmentation with
//! `frag_keyframe+empty_moov+default_base_moof`.

use bytes::Bytes;
use tracing::{debug, error};

use crate::error::{ClipError, Result};
use crate::media::run_ffmpeg;
use crate::scratch::ScratchScope;

/// Concatenate MP4 chunks into a single MP4 with stream copy.
///
/// Zero chunks yield empty bytes and one chunk passes through untouched.
/// If ffmpeg fails, the first chunk is returned and the error logged;
/// callers decide whether that degraded output is acceptable.
pub async fn concatenate(chunks: &[Bytes]) -> Result<Bytes> {
    if chunks.is_empty() {
        return Ok(Bytes::new());
    }
    if chunks.len() == 1 {
        return Ok(chunks[0].clone());
    }

    let scratch = ScratchScope::new("concat")?;

    let mut list = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let name = format!("chunk_{:03}.mp4", i);
        tokio::fs::write(scratch.file(&name), chunk).await?;
        list.push_str(&format!("file '{}'\n", name));
    }
    tokio::fs::write(scratch.file("concat_list.txt"), list).await?;

    let result = run_ffmpeg(
        "concatenate",
        scratch.path(),
        [
            "-f",
            "concat",
            "-safe",
            "0",
            "-i",
            "concat_list.txt",
            "-c:v",
            "copy",
            "-c:a",
            "copy",
            "output.mp4",
        ],
    )
    .await;

    match result {
        Ok(()) => {
            let data = tokio::fs::read(scratch.file("output.mp4")).await?;
            Ok(Bytes::from(data))
        }
        Err(err) => {
            error!(error = %err, chunks = chunks.len(), "concatenation failed, returning first chunk");
            Ok(chunks[0].clone())
        }
    }
}

/// Extract frames from an MP4 as JPEGs at the given frame rate, in order.
pub async fn extract_frames(video: &Bytes, fps: f64) -> Result<Vec<Bytes>> {
    let scratch = ScratchScope::new("extract_frames")?;
    tokio::fs::write(scratch.file("input.mp4"), video).await?;

    let filter = format!("fps={}", fps);
    run_ffmpeg(
        "extract_frames",
        scratch.path(),
        [
            "-i",
            "input.mp4",
            "-vf",
            filter.as_str(),
            "-q:v",
            "2",
            "frame_%04d.jpg",
        ],
    )
    .await?;

    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(scratch.path()).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("frame_") && name.ends_with(".jpg") {
            names.push(name);
        }
    }
    names.sort();

    let mut frames = Vec::with_capacity(names.len());
    for name in names {
        frames.push(Bytes::from(tokio::fs::read(scratch.file(&name)).await?));
    }
    debug!(count = frames.len(), fps, "extracted frames");
    Ok(frames)
}

/// Decode the audio track to 16-bit mono PCM at 16 kHz.
///
/// A source without an audio stream yields empty bytes, not an error.
pub async fn extract_audio(video: &Bytes) -> Result<Bytes> {
    let scratch = ScratchScope::new("extract_audio")?;
    tokio::fs::write(scratch.file("input.mp4"), video).await?;

    let result = run_ffmpeg(
        "extract_audio",
        scratch.path(),
        [
            "-i",
            "input.mp4",
            "-vn",
            "-acodec",
            "pcm_s16le",
            "-ar",
            "16000",
            "-ac",
            "1",
            "audio.pcm",
        ],
    )
    .await;

    if let Err(err) = result {
        debug!(error = %err, "no audio in chunk or extraction failed");
        return Ok(Bytes::new());
    }

    match tokio::fs::read(scratch.file("audio.pcm")).await {
        Ok(data) => Ok(Bytes::from(data)),
        Err(_) => Ok(Bytes::new()),
    }
}

/// Remux a video stream with raw PCM audio into an MP4.
///
/// The video stream is bit-copied and the PCM encoded as AAC. The output
/// keeps the video track's full duration; when the audio is shorter it
/// simply ends early. The output must never be truncated to the shorter
/// stream.
pub async fn remux_audio_video(video: &Bytes, pcm: &Bytes, sample_rate: u32) -> Result<Bytes> {
    let scratch = ScratchScope::new("remux")?;
    tokio::fs::write(scratch.file("video.mp4"), video).await?;
    tokio::fs::write(scratch.file("audio.pcm"), pcm).await?;

    let rate = sample_rate.to_string();
    run_ffmpeg(
        "remux_audio_video",
        scratch.path(),
        [
            "-i",
            "video.mp4",
            "-f",
            "s16le",
            "-ar",
            rate.as_str(),
            "-ac",
            "1",
            "-i",
            "audio.pcm",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-map",
            "0:v:0",
            "-map",
            "1:a:0",
            "output.mp4",
        ],
    )
    .await?;

    let data = tokio::fs::read(scratch.file("output.mp4")).await?;
    Ok(Bytes::from(data))
}

/// Remux an MP4 into a fragmented MP4 suitable for incremental playback.
pub async fn fragment_mp4(video: &Bytes) -> Result<Bytes> {
    let scratch = ScratchScope::new("fragment")?;
    tokio::fs::write(scratch.file("input.mp4"), video).await?;

    run_ffmpeg(
        "fragment_mp4",
        scratch.path(),
        [
            "-i",
            "input.mp4",
            "-c",
            "copy",
            "-movflags",
            "frag_keyframe+empty_moov+default_base_moof",
            "-f",
            "mp4",
            "output.mp4",
        ],
    )
    .await?;

    let data = tokio::fs::read(scratch.file("output.mp4")).await?;
    Ok(Bytes::from(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_concatenate_empty() {
        let result = concatenate(&[]).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_concatenate_single_chunk_passthrough() {
        let chunk = Bytes::from_static(b"single_chunk");
        let result = concatenate(std::slice::from_ref(&chunk)).await.unwrap();
        assert_eq!(result, chunk);
    }

    #[tokio::test]
    async fn test_concatenate_invalid_input_falls_back_to_first() {
        // Not real MP4 data: ffmpeg fails, and the documented fallback is
        // to return the first chunk. When ffmpeg is missing entirely the
        // spawn error takes the same path.
        let chunks = [Bytes::from_static(b"first"), Bytes::from_static(b"second")];
        let result = concatenate(&chunks).await.unwrap();
        assert_eq!(result, chunks[0]);
    }

    #[tokio::test]
    async fn test_extract_audio_from_garbage_is_empty() {
        let result = extract_audio(&Bytes::from_static(b"not an mp4")).await.unwrap();
        assert!(result.is_empty());
    }
}
