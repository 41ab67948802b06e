//! Downloader command-line construction.

use std::path::Path;

use crate::config::Settings;
use crate::domain::{DownloadType, Job};

/// Output template; the downloader substitutes id and extension.
const OUTPUT_TEMPLATE: &str = "%(id)s.%(ext)s";

/// Resources resolved for one job before its arguments are built.
#[derive(Debug, Clone, Copy)]
pub struct ArgsContext<'a> {
    pub settings: &'a Settings,
    /// Directory the downloader writes into.
    pub media_dir: &'a Path,
    /// Transcoder binary, when one is available.
    pub transcoder: Option<&'a Path>,
    /// Browser to borrow cookies from, already resolved.
    pub cookie_browser: Option<&'a str>,
}

/// Build the downloader argument vector for `job`. The URL is always last.
pub fn build_args(job: &Job, ctx: &ArgsContext<'_>) -> Vec<String> {
    let mut args: Vec<String> = ["--newline", "--no-colors", "--progress", "-o"]
        .into_iter()
        .map(String::from)
        .collect();
    args.push(
        ctx.media_dir
            .join(OUTPUT_TEMPLATE)
            .to_string_lossy()
            .into_owned(),
    );

    match job.download_type {
        DownloadType::Video => push_video_args(&mut args, job, ctx),
        DownloadType::Audio => push_audio_args(&mut args, job, ctx),
    }

    push_all(
        &mut args,
        &[
            "--write-info-json",
            "--write-thumbnail",
            "--write-description",
            "--no-mtime",
        ],
    );
    if let Some(transcoder) = ctx.transcoder {
        push_all(
            &mut args,
            &[
                "--convert-thumbnails",
                "jpg",
                "--embed-metadata",
                "--embed-chapters",
                "--ffmpeg-location",
            ],
        );
        args.push(transcoder.to_string_lossy().into_owned());
    }

    match &job.playlist_items {
        Some(items) => {
            args.push("--playlist-items".to_string());
            args.push(items.clone());
        }
        None => args.push("--no-playlist".to_string()),
    }
    if job.live_from_start {
        args.push("--live-from-start".to_string());
    }
    if ctx.settings.remove_sponsors && ctx.transcoder.is_some() {
        push_all(&mut args, &["--sponsorblock-remove", "all"]);
    }
    if ctx.settings.concurrent_fragments > 1 {
        args.push("-N".to_string());
        args.push(ctx.settings.concurrent_fragments.to_string());
    }
    if let Some(browser) = ctx.cookie_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.to_string());
    }
    if let Some(limit) = &ctx.settings.speed_limit {
        args.push("-r".to_string());
        args.push(limit.clone());
    }

    args.push(job.video_info.url.clone());
    args
}

fn push_video_args(args: &mut Vec<String>, job: &Job, ctx: &ArgsContext<'_>) {
    let height = job.quality.max_height();
    let format = match (ctx.transcoder.is_some(), height) {
        (true, Some(h)) => format!("bv*[height<={h}]+ba/b[height<={h}]"),
        (true, None) => "bv*+ba/b".to_string(),
        // Without a transcoder nothing can be merged; take a pre-muxed stream.
        (false, Some(h)) => format!("b[height<={h}]/b"),
        (false, None) => "b".to_string(),
    };
    args.push("-f".to_string());
    args.push(format);
    if ctx.transcoder.is_some() {
        push_all(args, &["--merge-output-format", "mp4"]);
    }

    if job.download_subs {
        push_all(args, &["--write-subs", "--sub-langs"]);
        args.push(format!("{},-live_chat", ctx.settings.subtitle_langs.trim()));
        if ctx.settings.download_auto_subs {
            args.push("--write-auto-subs".to_string());
        }
        if ctx.transcoder.is_some() {
            push_all(args, &["--convert-subs", "srt"]);
        }
    }
}

fn push_audio_args(args: &mut Vec<String>, job: &Job, ctx: &ArgsContext<'_>) {
    if ctx.transcoder.is_none() {
        // Raw best audio, no extraction.
        push_all(args, &["-f", "ba/b"]);
        return;
    }

    push_all(args, &["-x", "--audio-format"]);
    args.push(job.audio_format.clone());
    args.push("--audio-quality".to_string());
    args.push(job.encoder_audio_quality().to_string());
    if ctx.settings.embed_thumbnail {
        args.push("--embed-thumbnail".to_string());
    }
}

fn push_all(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}
