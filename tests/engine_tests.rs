//! Extraction engine tests driven by scripted tool doubles

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use framex_cli::{
    ExecutableLocator, ExtractionOutcome, ExtractionPhase, ExtractionRequest, ExtractionRunner,
    FramexError, FramexResult, Platform, ProgressObserver, ProgressSnapshot, ToolProcess,
    ToolSpawner, VideoProbe,
};

// Test doubles

/// Shared record of everything the doubles were asked to do
#[derive(Default)]
struct ToolLog {
    locate_calls: Mutex<usize>,
    spawned: Mutex<Vec<Vec<String>>>,
    kill_calls: Mutex<usize>,
    wait_calls: Mutex<usize>,
}

impl ToolLog {
    fn locate_calls(&self) -> usize {
        *self.locate_calls.lock().unwrap()
    }

    fn spawned(&self) -> Vec<Vec<String>> {
        self.spawned.lock().unwrap().clone()
    }

    fn kill_calls(&self) -> usize {
        *self.kill_calls.lock().unwrap()
    }

    fn wait_calls(&self) -> usize {
        *self.wait_calls.lock().unwrap()
    }
}

/// Locator double returning a fixed executable path
struct StubLocator {
    log: Arc<ToolLog>,
}

impl ExecutableLocator for StubLocator {
    fn locate(&self, _platform: &Platform) -> FramexResult<PathBuf> {
        *self.log.locate_calls.lock().unwrap() += 1;
        Ok(PathBuf::from("/tools/ffmpeg"))
    }
}

/// Process double playing back scripted diagnostic lines
struct ScriptedProcess {
    lines: std::vec::IntoIter<String>,
    log: Arc<ToolLog>,
}

impl ToolProcess for ScriptedProcess {
    fn next_line(&mut self) -> FramexResult<Option<String>> {
        Ok(self.lines.next())
    }

    fn kill(&mut self) -> FramexResult<()> {
        *self.log.kill_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn wait(&mut self) -> FramexResult<()> {
        *self.log.wait_calls.lock().unwrap() += 1;
        Ok(())
    }
}

/// Spawner double handing out one scripted process per spawn, in order
struct ScriptedSpawner {
    scripts: Mutex<std::vec::IntoIter<Vec<String>>>,
    log: Arc<ToolLog>,
}

impl ScriptedSpawner {
    fn new(scripts: Vec<Vec<String>>, log: Arc<ToolLog>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter()),
            log,
        }
    }
}

impl ToolSpawner for ScriptedSpawner {
    type Process = ScriptedProcess;

    fn spawn(&self, executable: &Path, args: &[String]) -> FramexResult<ScriptedProcess> {
        let mut invocation = vec![executable.display().to_string()];
        invocation.extend(args.iter().cloned());
        self.log.spawned.lock().unwrap().push(invocation);

        let script = self.scripts.lock().unwrap().next().unwrap_or_default();
        Ok(ScriptedProcess {
            lines: script.into_iter(),
            log: self.log.clone(),
        })
    }
}

/// Observer double recording every snapshot it is handed
#[derive(Default)]
struct RecordingObserver {
    snapshots: Mutex<Vec<ProgressSnapshot>>,
}

impl ProgressObserver for RecordingObserver {
    fn progress_changed(&self, snapshot: &ProgressSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

impl RecordingObserver {
    fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

// Test utilities

fn script_lines(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

/// Diagnostic output of a probe invocation for a 25 fps anamorphic video
fn probe_script() -> Vec<String> {
    script_lines(&[
        "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':",
        "  Duration: 00:01:00.00, start: 0.000000, bitrate: 1205 kb/s",
        "    Stream #0:0(und): Video: h264 (High), yuv420p, \
         720x480 [SAR 32:27 DAR 16:9], 1000 kb/s, 25 fps, 25 tbr, 90k tbn",
        "    Stream #0:1(und): Audio: aac (LC), 48000 Hz, stereo, fltp, 127 kb/s",
    ])
}

/// Diagnostic output of an extraction invocation
fn extraction_script() -> Vec<String> {
    script_lines(&[
        "Input #0, mov,mp4,m4a,3gp,3g2,mj2, from 'clip.mp4':",
        "  Duration: 00:01:00.00, start: 0.000000, bitrate: 1205 kb/s",
        "Output #0, image2, to 'clip.mp4_%07d.jpg':",
        "frame= 120 fps= 29.97 q=-1 size= 1024kB time=00:00:04.00 bitrate=2097.2kbits/s",
        "frame= 360 fps= 29.97 q=-1 size= 3072kB time=00:00:12.00 bitrate=2097.2kbits/s",
    ])
}

fn runner_with(
    scripts: Vec<Vec<String>>,
) -> (ExtractionRunner<StubLocator, ScriptedSpawner>, Arc<ToolLog>) {
    let log = Arc::new(ToolLog::default());
    let locator = StubLocator { log: log.clone() };
    let spawner = ScriptedSpawner::new(scripts, log.clone());
    (ExtractionRunner::new(locator, spawner), log)
}

/// Create an input video file and an output directory under one temp root
fn request_in(dir: &TempDir, frame_rate_override: Option<f64>) -> ExtractionRequest {
    let video_path = dir.path().join("clip.mp4");
    fs::write(&video_path, b"fake video data").unwrap();
    ExtractionRequest {
        video_path,
        output_directory: dir.path().join("frames"),
        frame_rate_override,
    }
}

// Full-run tests

#[test]
fn completed_run_reports_progress_and_finishes() {
    let dir = TempDir::new().unwrap();
    let (runner, log) = runner_with(vec![probe_script(), extraction_script()]);
    let observer = Arc::new(RecordingObserver::default());
    runner.tracker().subscribe(observer.clone());

    let outcome = runner.run(request_in(&dir, None)).unwrap();
    assert_eq!(outcome, ExtractionOutcome::Completed);

    let snapshots = observer.snapshots();
    let messages: Vec<&str> = snapshots.iter().map(|s| s.message.as_str()).collect();
    assert!(messages.contains(&"Starting process"));
    assert!(messages.contains(&"Getting video information"));
    assert!(messages.contains(&"Extracting frames"));

    // The first progress line: 4s elapsed of a 60s video at 29.97 fps
    let progress = snapshots
        .iter()
        .find(|s| s.message.contains("frames/second"))
        .expect("a per-line progress snapshot");
    assert!((progress.fraction().unwrap() - 4_000.0 / 60_000.0).abs() < 1e-9);
    assert!(progress.message.contains("30"));

    let last = snapshots.last().unwrap();
    assert_eq!(last.phase, ExtractionPhase::Completed);
    assert_eq!(last.message, "Finished");
    assert_eq!(last.fraction(), Some(1.0));

    // Probe child and extraction child were both waited on
    assert_eq!(log.wait_calls(), 2);
    assert_eq!(log.kill_calls(), 0);
}

#[test]
fn extraction_arguments_follow_the_planned_output() {
    let dir = TempDir::new().unwrap();
    let (runner, log) = runner_with(vec![probe_script(), extraction_script()]);

    runner.run(request_in(&dir, None)).unwrap();

    let spawned = log.spawned();
    assert_eq!(spawned.len(), 2);

    // Probe invocation carries only the input flag
    assert_eq!(spawned[0][1], "-i");
    assert!(spawned[0][2].ends_with("clip.mp4"));
    assert_eq!(spawned[0].len(), 3);

    // Extraction invocation: rate, corrected size, image sequence output
    let extraction = &spawned[1];
    let rate_index = extraction.iter().position(|a| a == "-r").unwrap();
    assert_eq!(extraction[rate_index + 1], "25");
    let size_index = extraction.iter().position(|a| a == "-s").unwrap();
    assert_eq!(extraction[size_index + 1], "853x480");
    let format_index = extraction.iter().position(|a| a == "-f").unwrap();
    assert_eq!(extraction[format_index + 1], "image2");
    assert!(extraction.last().unwrap().ends_with("clip.mp4_%07d.jpg"));
}

#[test]
fn frame_rate_artifact_round_trips_the_probed_rate() {
    let dir = TempDir::new().unwrap();
    let (runner, log) = runner_with(vec![probe_script(), extraction_script()]);

    let request = request_in(&dir, None);
    runner.run(request.clone()).unwrap();

    let written = fs::read_to_string(request.output_directory.join("frame_rate.txt")).unwrap();
    assert_eq!(written.trim_end(), "25");

    let extraction = &log.spawned()[1];
    let rate_index = extraction.iter().position(|a| a == "-r").unwrap();
    assert_eq!(extraction[rate_index + 1], written.trim_end());
}

#[test]
fn frame_rate_artifact_round_trips_an_override() {
    let dir = TempDir::new().unwrap();
    let (runner, log) = runner_with(vec![probe_script(), extraction_script()]);

    let request = request_in(&dir, Some(29.97));
    runner.run(request.clone()).unwrap();

    let written = fs::read_to_string(request.output_directory.join("frame_rate.txt")).unwrap();
    assert_eq!(written.trim_end(), "29.97");

    let extraction = &log.spawned()[1];
    let rate_index = extraction.iter().position(|a| a == "-r").unwrap();
    assert_eq!(extraction[rate_index + 1], "29.97");
}

#[test]
fn validation_failure_never_launches_a_subprocess() {
    let dir = TempDir::new().unwrap();
    let (runner, log) = runner_with(vec![probe_script(), extraction_script()]);

    let request = ExtractionRequest {
        video_path: dir.path().join("missing.mp4"),
        output_directory: dir.path().join("frames"),
        frame_rate_override: None,
    };
    let error = runner.run(request).unwrap_err();

    assert!(matches!(error, FramexError::Validation { .. }));
    assert_eq!(log.locate_calls(), 0);
    assert!(log.spawned().is_empty());
    assert_eq!(runner.tracker().snapshot().phase, ExtractionPhase::Failed);
}

#[test]
fn zero_length_video_still_finishes_with_a_full_fraction() {
    let dir = TempDir::new().unwrap();
    let empty_output = script_lines(&[
        "  Duration: 00:00:00.00, start: 0.000000, bitrate: 1205 kb/s",
        "Output #0, image2, to 'clip.mp4_%07d.jpg':",
    ]);
    let (runner, _log) = runner_with(vec![probe_script(), empty_output]);

    let outcome = runner.run(request_in(&dir, None)).unwrap();
    assert_eq!(outcome, ExtractionOutcome::Completed);

    let last = runner.tracker().snapshot();
    assert_eq!(last.phase, ExtractionPhase::Completed);
    assert_eq!(last.fraction(), Some(1.0));
}

// Cancellation is only polled between line reads; there is no timeout on
// the child pipe, so a subprocess that stalls without output also stalls
// cancellation. The scripted doubles never block, which leaves that
// latency unexercised here.
#[test]
fn cancel_before_any_progress_line_still_ends_cancelled() {
    let dir = TempDir::new().unwrap();
    let (runner, log) = runner_with(vec![probe_script(), extraction_script()]);

    // Requested from the observer's context before the run even starts;
    // the flag is only polled inside the extraction line loop
    runner.tracker().request_cancel();

    let outcome = runner.run(request_in(&dir, None)).unwrap();
    assert_eq!(outcome, ExtractionOutcome::Cancelled);

    let snapshot = runner.tracker().snapshot();
    assert_eq!(snapshot.phase, ExtractionPhase::Cancelled);
    assert_eq!(snapshot.message, "Cancelled");
    assert!(snapshot.is_indeterminate());

    // The extraction child was terminated, not waited to completion
    assert_eq!(log.kill_calls(), 1);
}

#[test]
fn malformed_progress_field_fails_the_whole_run() {
    let dir = TempDir::new().unwrap();
    let broken = script_lines(&[
        "  Duration: 00:01:00.00, start: 0.000000, bitrate: 1205 kb/s",
        "frame= 1 fps= 1.2.3 q=-1 size= 10kB time=00:00:01.00",
    ]);
    let (runner, log) = runner_with(vec![probe_script(), broken]);

    let error = runner.run(request_in(&dir, None)).unwrap_err();
    assert!(matches!(error, FramexError::Format { .. }));

    // The failed run must not leave the child running
    assert_eq!(log.kill_calls(), 1);
    assert_eq!(runner.tracker().snapshot().phase, ExtractionPhase::Failed);
}

// Probe tests

fn probe_with(script: Vec<String>) -> FramexResult<framex_cli::VideoInfo> {
    let log = Arc::new(ToolLog::default());
    let spawner = ScriptedSpawner::new(vec![script], log);
    VideoProbe::probe(&spawner, Path::new("/tools/ffmpeg"), Path::new("clip.mp4"))
}

#[test]
fn probe_recovers_rate_resolution_and_aspect() {
    let info = probe_with(probe_script()).unwrap();
    assert_eq!(info.frame_rate, 25.0);
    assert_eq!(info.resolution.horizontal, 720);
    assert_eq!(info.resolution.vertical, 480);
    assert_eq!(info.aspect_ratio.numerator, 16);
    assert_eq!(info.aspect_ratio.denominator, 9);
}

#[test]
fn probe_fails_without_a_frame_rate() {
    let script = script_lines(&["    Stream #0:0: Video: h264, 720x480 [SAR 32:27 DAR 16:9]"]);
    assert!(matches!(probe_with(script), Err(FramexError::Probe { .. })));
}

#[test]
fn probe_fails_without_an_aspect_ratio() {
    let script = script_lines(&["    Stream #0:0: Video: h264, 1000 kb/s, 25 fps, 25 tbr"]);
    assert!(matches!(probe_with(script), Err(FramexError::Probe { .. })));
}

#[test]
fn probe_fails_on_an_empty_stream() {
    assert!(matches!(
        probe_with(Vec::new()),
        Err(FramexError::Probe { .. })
    ));
}
