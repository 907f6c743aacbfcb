//! Media toolkit round-trip laws over real ffmpeg output.

use bytes::Bytes;

use crate::media::{concatenate, extract_audio, extract_frames, fragment_mp4, remux_audio_video};
use crate::tests::fixtures::{
    contains_box, make_chunk, make_silent_chunk, probe_duration, require_ffmpeg, silent_pcm,
};

#[tokio::test]
async fn test_concatenate_three_chunks_durations_add_up() {
    require_ffmpeg!();
    let chunk = make_chunk(2);
    let chunks = vec![chunk.clone(), chunk.clone(), chunk];

    let combined = concatenate(&chunks).await.unwrap();
    assert!(!combined.is_empty());

    let duration = probe_duration(&combined);
    assert!(
        (duration - 6.0).abs() < 0.5,
        "expected ~6s, got {duration:.2}s"
    );
}

#[tokio::test]
async fn test_fragment_of_concatenation_is_valid_fmp4() {
    require_ffmpeg!();
    let chunk = make_chunk(2);
    let combined = concatenate(&[chunk.clone(), chunk]).await.unwrap();

    let fragmented = fragment_mp4(&combined).await.unwrap();
    // Fragmented output carries movie fragments; a non-fragmented MP4 has
    // none.
    assert!(contains_box(&fragmented, b"moof"), "no moof box in output");
    assert!(!contains_box(&combined, b"moof"), "plain concat should not be fragmented");

    let duration = probe_duration(&fragmented);
    assert!(
        (duration - 4.0).abs() < 0.5,
        "fragmenting changed duration: {duration:.2}s"
    );
}

#[tokio::test]
async fn test_extract_frames_at_one_fps() {
    require_ffmpeg!();
    let chunk = make_chunk(3);
    let frames = extract_frames(&chunk, 1.0).await.unwrap();

    assert!(
        (2..=4).contains(&frames.len()),
        "expected ~3 frames, got {}",
        frames.len()
    );
    for frame in &frames {
        assert_eq!(&frame[..2], &[0xFF, 0xD8], "frame is not a JPEG");
    }
}

#[tokio::test]
async fn test_extract_audio_yields_pcm() {
    require_ffmpeg!();
    let chunk = make_chunk(2);
    let pcm = extract_audio(&chunk).await.unwrap();
    // 2 seconds at 16 kHz mono 16-bit is 64000 bytes; codec padding makes
    // the exact size fuzzy.
    assert!(pcm.len() > 32_000, "suspiciously little audio: {}", pcm.len());
}

#[tokio::test]
async fn test_extract_audio_without_audio_stream_is_empty() {
    require_ffmpeg!();
    let chunk = make_silent_chunk(2);
    let pcm = extract_audio(&chunk).await.unwrap();
    assert!(pcm.is_empty());
}

#[tokio::test]
async fn test_remux_preserves_video_duration_when_audio_is_shorter() {
    // An 8-second video remuxed with 3 seconds of commentary must keep its
    // full 8 seconds; the audio simply ends early.
    require_ffmpeg!();
    let video = make_silent_chunk(8);
    let pcm = silent_pcm(3, 24_000);

    let remuxed = remux_audio_video(&video, &pcm, 24_000).await.unwrap();
    let duration = probe_duration(&remuxed);
    assert!(
        duration >= 7.5,
        "video truncated to {duration:.2}s; remux must not stop at the shorter stream"
    );
}

#[tokio::test]
async fn test_remux_replaces_audio_track() {
    require_ffmpeg!();
    let video = make_chunk(2);
    let pcm = silent_pcm(2, 24_000);

    let remuxed = remux_audio_video(&video, &pcm, 24_000).await.unwrap();
    let extracted = extract_audio(&remuxed).await.unwrap();
    assert!(!extracted.is_empty(), "remuxed output lost its audio track");

    // The original had a 440 Hz tone; the replacement is silence, so the
    // decoded samples should be (near) zero.
    let loud = extracted
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]).unsigned_abs())
        .filter(|&v| v > 512)
        .count();
    let ratio = loud as f64 / (extracted.len() / 2).max(1) as f64;
    assert!(ratio < 0.01, "audio does not look replaced (loud ratio {ratio:.3})");
}

#[tokio::test]
async fn test_concatenate_single_passthrough_law_on_real_media() {
    require_ffmpeg!();
    let chunk = make_chunk(2);
    let out = concatenate(std::slice::from_ref(&chunk)).await.unwrap();
    assert_eq!(out, chunk);
}

#[tokio::test]
async fn test_toolkit_leaves_no_scratch_behind() {
    require_ffmpeg!();
    let chunk = make_chunk(2);
    let before = count_scratch_dirs();
    let _ = concatenate(&[chunk.clone(), chunk.clone()]).await.unwrap();
    let _ = extract_frames(&chunk, 1.0).await.unwrap();
    let _ = fragment_mp4(&chunk).await.unwrap();
    let after = count_scratch_dirs();
    assert!(
        after <= before,
        "toolkit leaked scratch directories ({before} -> {after})"
    );
}

/// Count temp-root entries carrying this crate's scratch prefixes.
fn count_scratch_dirs() -> usize {
    let prefixes = ["concat_", "extract_frames_", "extract_audio_", "remux_", "fragment_"];
    std::fs::read_dir(std::env::temp_dir())
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    let name = e.file_name().to_string_lossy().into_owned();
                    prefixes.iter().any(|p| name.starts_with(p))
                })
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn test_concatenate_empty_is_empty_bytes() {
    let out = concatenate(&[]).await.unwrap();
    assert_eq!(out, Bytes::new());
}
