//! yt-dlp invocation builder.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::ingest::IngestOptions;

/// Assemble a yt-dlp command that writes one continuous media stream to
/// standard output, with its cache confined to `cache_dir` and partial-file
/// suffixing disabled.
pub(crate) fn download_command(
    opts: &IngestOptions,
    format_selector: &str,
    cache_dir: &Path,
) -> Command {
    let mut cmd = Command::new("yt-dlp");
    cmd.arg("-f")
        .arg(format_selector)
        .arg("-o")
        .arg("-")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("--no-part")
        .arg("--cache-dir")
        .arg(cache_dir);

    if opts.live {
        if opts.live_from_start {
            cmd.arg("--live-from-start");
        } else {
            cmd.arg("--no-live-from-start");
        }
        cmd.arg("--hls-use-mpegts");
    }

    if let Some(cookies) = &opts.cookies_file {
        cmd.arg("--cookies").arg(cookies);
    }

    cmd.args(&opts.extra_args);
    cmd.arg(&opts.url);

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// The per-call yt-dlp cache directory inside an ingest scratch scope.
pub(crate) fn cache_dir(scratch: &Path) -> PathBuf {
    scratch.join("ytdlp-cache")
}

/// Live-safe format policy: selectors that pin an MP4-only container
/// produce VOD-only or video-only selections on live inputs, so on live
/// paths they are replaced with a best-video + best-audio equivalent.
pub(crate) fn live_safe_format(selector: &str) -> String {
    if selector.contains("[ext=mp4]") {
        "bestvideo+bestaudio/best".to_string()
    } else {
        selector.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(live: bool) -> IngestOptions {
        IngestOptions {
            url: "https://example.com/watch?v=abc".to_string(),
            chunk_duration_secs: 4,
            format_selector: "best[ext=mp4]/best".to_string(),
            live,
            live_from_start: false,
            cookies_file: None,
            extra_args: vec![],
        }
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_vod_command_flags() {
        let opts = options(false);
        let cmd = download_command(&opts, &opts.format_selector, Path::new("/tmp/cache"));
        let args = args_of(&cmd);
        assert!(args.contains(&"--no-part".to_string()));
        assert!(args.contains(&"--quiet".to_string()));
        assert!(args.contains(&"--cache-dir".to_string()));
        assert!(!args.contains(&"--hls-use-mpegts".to_string()));
        assert_eq!(args.last().map(String::as_str), Some(opts.url.as_str()));
    }

    #[test]
    fn test_live_command_defaults_to_live_edge() {
        let opts = options(true);
        let cmd = download_command(&opts, "best", Path::new("/tmp/cache"));
        let args = args_of(&cmd);
        assert!(args.contains(&"--no-live-from-start".to_string()));
        assert!(args.contains(&"--hls-use-mpegts".to_string()));
    }

    #[test]
    fn test_live_command_from_start_when_requested() {
        let mut opts = options(true);
        opts.live_from_start = true;
        let cmd = download_command(&opts, "best", Path::new("/tmp/cache"));
        let args = args_of(&cmd);
        assert!(args.contains(&"--live-from-start".to_string()));
    }

    #[test]
    fn test_cookies_flag_present_when_configured() {
        let mut opts = options(false);
        opts.cookies_file = Some(PathBuf::from("/home/u/cookies.txt"));
        let cmd = download_command(&opts, "best", Path::new("/tmp/cache"));
        let args = args_of(&cmd);
        assert!(args.contains(&"--cookies".to_string()));
    }

    #[test]
    fn test_live_safe_format_overrides_mp4_pins() {
        assert_eq!(live_safe_format("best[ext=mp4]/best"), "bestvideo+bestaudio/best");
        assert_eq!(live_safe_format("worst[ext=mp4]"), "bestvideo+bestaudio/best");
        assert_eq!(live_safe_format("best"), "best");
        assert_eq!(live_safe_format("bestvideo+bestaudio"), "bestvideo+bestaudio");
    }
}
