//! FFmpeg-based encoder implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::EncoderConfig;
use super::error::EncoderError;
use super::traits::Encoder;
use super::types::{
    EncodeOutput, EncodeProgress, EncodeRequest, FrameRequest, MediaInfo, SegmentOutput,
    SegmentRequest,
};

/// FFmpeg-based encoder implementation.
pub struct FfmpegEncoder {
    config: EncoderConfig,
}

/// Progress reporting context for a running encode.
struct ProgressContext {
    tx: mpsc::Sender<EncodeProgress>,
    job_id: String,
    quality: String,
    duration_secs: Option<f64>,
}

impl FfmpegEncoder {
    /// Creates a new FFmpeg encoder with the given configuration.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Creates an encoder with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EncoderConfig::default())
    }

    /// Builds ffmpeg arguments for producing one rendition.
    ///
    /// H.264 main profile with capped bitrate: `-maxrate` at 1.5x the target
    /// and a 2x buffer keep segment sizes predictable for adaptive delivery.
    fn build_encode_args(&self, request: &EncodeRequest) -> Vec<String> {
        let target = &request.target;
        vec![
            "-y".to_string(),
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-level".to_string(),
            "4.0".to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", target.height),
            "-b:v".to_string(),
            format!("{}k", target.video_bitrate_kbps),
            "-maxrate".to_string(),
            format!("{}k", target.video_bitrate_kbps * 3 / 2),
            "-bufsize".to_string(),
            format!("{}k", target.video_bitrate_kbps * 2),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", target.audio_bitrate_kbps),
            "-ar".to_string(),
            "44100".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            request.output_path.to_string_lossy().to_string(),
        ]
    }

    /// Builds ffmpeg arguments for segmenting a rendition into HLS chunks.
    ///
    /// Stream copy only; the rendition is already at its target codec and
    /// bitrate.
    fn build_segment_args(&self, request: &SegmentRequest) -> Vec<String> {
        let segment_pattern = request.output_dir.join("segment_%03d.ts");
        let playlist = request.output_dir.join("playlist.m3u8");
        vec![
            "-y".to_string(),
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-c".to_string(),
            "copy".to_string(),
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            request.segment_secs.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_list_size".to_string(),
            "0".to_string(),
            "-hls_segment_filename".to_string(),
            segment_pattern.to_string_lossy().to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
            playlist.to_string_lossy().to_string(),
        ]
    }

    /// Builds ffmpeg arguments for extracting one still frame.
    ///
    /// `-ss` before `-i` seeks on the demuxer, which is fast and accurate
    /// enough for thumbnails.
    fn build_frame_args(&self, request: &FrameRequest) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", request.offset_secs),
            "-i".to_string(),
            request.input_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-vf".to_string(),
            "scale=640:-2".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            request.output_path.to_string_lossy().to_string(),
        ]
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, EncoderError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            codec_name: Option<String>,
            bit_rate: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EncoderError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");

        let video_stream = match video_stream {
            Some(stream) => stream,
            None => return Err(EncoderError::unusable_input("no video stream")),
        };
        if duration_secs <= 0.0 {
            return Err(EncoderError::unusable_input("zero or unknown duration"));
        }

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            video_codec: video_stream.codec_name.clone(),
            width: video_stream.width,
            height: video_stream.height,
            fps: video_stream.r_frame_rate.as_ref().and_then(|r| {
                // Frame rates come as fractions like "24000/1001" or "30/1"
                let parts: Vec<&str> = r.split('/').collect();
                if parts.len() == 2 {
                    let num = parts[0].parse::<f32>().ok()?;
                    let den = parts[1].parse::<f32>().ok()?;
                    if den > 0.0 {
                        Some(num / den)
                    } else {
                        None
                    }
                } else {
                    r.parse::<f32>().ok()
                }
            }),
            audio_codec: audio_stream.and_then(|s| s.codec_name.clone()),
            audio_bitrate_kbps: audio_stream
                .and_then(|s| s.bit_rate.as_ref())
                .and_then(|b| b.parse::<u32>().ok())
                .map(|b| b / 1000),
        })
    }

    /// Runs an ffmpeg invocation with timeout and optional progress parsing.
    async fn run_ffmpeg(
        &self,
        args: &[String],
        progress: Option<ProgressContext>,
    ) -> Result<(), EncoderError> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping a cancelled encode must not leave ffmpeg running
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        let stderr = child.stderr.take().expect("stderr should be captured");
        let mut reader = BufReader::new(stderr).lines();

        let mut current_time = 0.0;
        let mut current_speed = None;
        let time_regex = Regex::new(r"out_time_ms=(\d+)").ok();
        let speed_regex = Regex::new(r"speed=(\d+\.?\d*)x").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut last_progress_send = Instant::now();
            let progress_interval = Duration::from_millis(500);
            let mut error_output = String::new();

            while let Ok(Some(line)) = reader.next_line().await {
                if line.contains("Error") || line.contains("error") {
                    error_output.push_str(&line);
                    error_output.push('\n');
                }

                if let Some(ref re) = time_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(ms_str) = caps.get(1) {
                            if let Ok(ms) = ms_str.as_str().parse::<f64>() {
                                // out_time_ms is in microseconds despite the name
                                current_time = ms / 1_000_000.0;
                            }
                        }
                    }
                }

                if let Some(ref re) = speed_regex {
                    if let Some(caps) = re.captures(&line) {
                        if let Some(speed_str) = caps.get(1) {
                            current_speed = Some(format!("{}x", speed_str.as_str()));
                        }
                    }
                }

                if let Some(ref ctx) = progress {
                    if last_progress_send.elapsed() >= progress_interval {
                        let percent = match ctx.duration_secs {
                            Some(dur) if dur > 0.0 => {
                                (current_time / dur * 100.0).min(100.0) as f32
                            }
                            _ => 0.0,
                        };

                        // Non-blocking send; a full channel drops the update
                        let _ = ctx.tx.try_send(EncodeProgress {
                            job_id: ctx.job_id.clone(),
                            quality: ctx.quality.clone(),
                            percent,
                            time_secs: current_time,
                            speed: current_speed.clone(),
                        });
                        last_progress_send = Instant::now();
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, error_output))
        })
        .await;

        match result {
            Ok(Ok((status, error_output))) => {
                if !status.success() {
                    return Err(EncoderError::encode_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        if error_output.is_empty() {
                            None
                        } else {
                            Some(error_output)
                        },
                    ));
                }
                Ok(())
            }
            Ok(Err(e)) => Err(EncoderError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = child.kill().await;
                Err(EncoderError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    async fn run_encode(
        &self,
        request: &EncodeRequest,
        progress_tx: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<EncodeOutput, EncoderError> {
        let start = Instant::now();

        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                EncoderError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        // Input duration drives the progress percentage
        let duration_secs = self
            .probe(&request.input_path)
            .await
            .ok()
            .map(|i| i.duration_secs);

        let args = self.build_encode_args(request);
        debug!(job_id = %request.job_id, quality = %request.target.quality, "starting encode");

        let progress = progress_tx.map(|tx| ProgressContext {
            tx,
            job_id: request.job_id.clone(),
            quality: request.target.quality.clone(),
            duration_secs,
        });
        self.run_ffmpeg(&args, progress).await?;

        let output_meta = tokio::fs::metadata(&request.output_path)
            .await
            .map_err(|_| EncoderError::encode_failed("Output file not created", None))?;

        Ok(EncodeOutput {
            output_path: request.output_path.clone(),
            size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, EncoderError> {
        if !path.exists() {
            return Err(EncoderError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        if !output.status.success() {
            // ffprobe rejecting the file means the upload itself is unusable
            return Err(EncoderError::unusable_input(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn encode(&self, request: EncodeRequest) -> Result<EncodeOutput, EncoderError> {
        self.run_encode(&request, None).await
    }

    async fn encode_with_progress(
        &self,
        request: EncodeRequest,
        progress_tx: mpsc::Sender<EncodeProgress>,
    ) -> Result<EncodeOutput, EncoderError> {
        self.run_encode(&request, Some(progress_tx)).await
    }

    async fn segment(&self, request: SegmentRequest) -> Result<SegmentOutput, EncoderError> {
        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|_| EncoderError::OutputDirectoryFailed {
                path: request.output_dir.clone(),
            })?;

        let args = self.build_segment_args(&request);
        debug!(job_id = %request.job_id, "segmenting rendition");
        self.run_ffmpeg(&args, None).await?;

        // Collect what the muxer wrote
        let playlist_path = request.output_dir.join("playlist.m3u8");
        if tokio::fs::metadata(&playlist_path).await.is_err() {
            return Err(EncoderError::encode_failed(
                "Segmenter produced no playlist",
                None,
            ));
        }

        let mut segment_paths = Vec::new();
        let mut entries = tokio::fs::read_dir(&request.output_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("segment_") && name.ends_with(".ts") {
                segment_paths.push(entry.path());
            }
        }
        segment_paths.sort();

        if segment_paths.is_empty() {
            return Err(EncoderError::encode_failed(
                "Segmenter produced no segments",
                None,
            ));
        }

        Ok(SegmentOutput {
            playlist_path,
            segment_paths,
        })
    }

    async fn extract_frame(&self, request: FrameRequest) -> Result<(), EncoderError> {
        if let Some(parent) = request.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                EncoderError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        let args = self.build_frame_args(&request);
        self.run_ffmpeg(&args, None).await?;

        if tokio::fs::metadata(&request.output_path).await.is_err() {
            return Err(EncoderError::encode_failed("Frame not extracted", None));
        }
        Ok(())
    }

    async fn validate(&self) -> Result<(), EncoderError> {
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EncoderError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EncoderError::Io(e));
        }

        Ok(())
    }
}
