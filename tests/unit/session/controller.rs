use super::*;
use crate::capture::source::SharedFrameBuffer;
use crate::encode::hw::HardwareEncodePipeline;
use crate::encode::software::SoftwareEncodeCascade;
use crate::test_support::fake_hw::{FakeDriver, backend};
use crate::test_support::jpeg_fixture;

struct Rig {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    source: Arc<SharedFrameBuffer>,
    ctl: SessionController,
}

fn rig() -> Rig {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().to_path_buf();
    let config = SessionConfig {
        output_dir: Some(root.join("videos")),
        temp_dir_base: Some(root.join("frames")),
        recovery_dir: Some(root.join("usb/timelapse")),
        ..SessionConfig::default()
    };
    let (backend, _log) = backend(FakeDriver::default());
    let orchestrator = EncodeOrchestrator::new(
        Some(Arc::new(HardwareEncodePipeline::new(backend))),
        Arc::new(SoftwareEncodeCascade::new(Vec::new())),
    );
    let source = Arc::new(SharedFrameBuffer::new());
    let ctl = SessionController::new(config, source.clone(), orchestrator);
    Rig {
        _tmp: tmp,
        root,
        source,
        ctl,
    }
}

fn capture_n(rig: &mut Rig, n: u32) {
    for i in 0..n {
        rig.source.publish(&jpeg_fixture(16, 8, i as u8));
        rig.ctl.capture_frame().unwrap();
    }
}

#[test]
fn gcode_names_drop_directory_and_suffix() {
    assert_eq!(gcode_base_name("/data/benchy.gcode"), Some("benchy"));
    assert_eq!(gcode_base_name("cube.gcode"), Some("cube"));
    assert_eq!(gcode_base_name("a/b/part.gcode.bak"), Some("part"));
    assert_eq!(gcode_base_name("plain"), Some("plain"));
    assert_eq!(gcode_base_name("/dir/.gcode"), None);
    assert_eq!(gcode_base_name("/dir/"), None);
}

#[test]
fn capture_requires_a_session() {
    let mut rig = rig();
    assert!(matches!(
        rig.ctl.capture_frame().unwrap_err(),
        LapseError::NotActive
    ));
    assert!(matches!(rig.ctl.finalize().unwrap_err(), LapseError::NotActive));
}

#[test]
fn start_rejects_unsafe_names() {
    let mut rig = rig();
    for bad in ["", "a/b", "x;rm", "..", "$(id)"] {
        assert!(rig.ctl.start(bad, None).is_err(), "{bad}");
    }
    assert!(rig.ctl.start("ok", Some(Path::new("/tmp/../etc"))).is_err());
    assert!(!rig.ctl.is_active());
}

#[test]
fn record_and_finalize() {
    let mut rig = rig();
    rig.ctl.start("cube", None).unwrap();
    assert!(rig.ctl.custom_mode());
    let dir = rig.ctl.frame_dir();
    assert!(dir.is_dir());

    capture_n(&mut rig, 3);
    assert!(matches!(
        rig.ctl.capture_frame().unwrap_err(),
        LapseError::DuplicateFrame(_)
    ));
    assert_eq!(rig.ctl.frame_count(), 3);
    let status = rig.ctl.status();
    assert_eq!((status.frame_width, status.frame_height), (Some(16), Some(8)));

    let report = rig.ctl.finalize().unwrap();
    assert!(report.succeeded(), "{}", report.detail);
    assert!(!rig.ctl.is_active());
    assert_eq!(rig.ctl.frame_count(), 0);
    assert!(!dir.exists());
    assert_eq!(rig.ctl.encode_status(), EncodeStatus::Success);
    assert_eq!(rig.ctl.encode_detail(), report.detail);
    assert!(rig.root.join("videos/cube_01.mp4").is_file());
    assert!(rig.root.join("videos/cube_01_3.jpg").is_file());
}

#[test]
fn finalize_without_frames_fails() {
    let mut rig = rig();
    rig.ctl.start("empty", None).unwrap();
    let report = rig.ctl.finalize().unwrap();
    assert_eq!(report.status, EncodeStatus::Failed);
    assert!(!rig.ctl.frame_dir().exists());
    assert_eq!(rig.ctl.encode_status(), EncodeStatus::Failed);
}

#[test]
fn cancel_discards_frames() {
    let mut rig = rig();
    rig.ctl.start("cube", None).unwrap();
    capture_n(&mut rig, 5);

    rig.ctl.cancel();
    assert!(!rig.ctl.is_active());
    assert_eq!(rig.ctl.frame_count(), 0);
    assert!(!rig.ctl.frame_dir().exists());
}

#[test]
fn restart_cancels_previous_session() {
    let mut rig = rig();
    rig.ctl.start("first", None).unwrap();
    capture_n(&mut rig, 2);

    rig.ctl.start("second", None).unwrap();
    assert_eq!(rig.ctl.frame_count(), 0);
    assert_eq!(rig.ctl.status().base_name.as_deref(), Some("second"));
    assert!(!rig.ctl.frame_dir().join("frame_0000.jpg").exists());
}

#[test]
fn rpc_start_is_ignored_in_custom_mode() {
    let mut rig = rig();
    rig.ctl.set_custom_mode(true);
    rig.ctl.start_from_rpc("/gcodes/benchy.gcode").unwrap();
    assert!(!rig.ctl.is_active());

    rig.ctl.set_custom_mode(false);
    rig.ctl.start_from_rpc("/gcodes/benchy.gcode").unwrap();
    assert_eq!(rig.ctl.status().base_name.as_deref(), Some("benchy"));
    assert!(!rig.ctl.custom_mode());
}

#[test]
fn config_edits_wait_for_next_session() {
    let mut rig = rig();
    rig.ctl.start("cube", None).unwrap();
    capture_n(&mut rig, 1);
    rig.ctl.config_mut().output_dir = Some(rig.root.join("elsewhere"));

    let report = rig.ctl.finalize().unwrap();
    let video = report.outputs.unwrap().video;
    assert!(video.starts_with(rig.root.join("videos")));
}

#[test]
fn failed_start_leaves_mode_and_config_untouched() {
    let mut rig = rig();
    let not_a_dir = rig.root.join("not_a_dir");
    std::fs::write(&not_a_dir, b"file").unwrap();

    assert!(rig.ctl.start("job", Some(&not_a_dir)).is_err());
    assert!(!rig.ctl.is_active());
    assert!(!rig.ctl.custom_mode());
    assert_eq!(rig.ctl.config().output_dir, Some(rig.root.join("videos")));
    assert!(!rig.ctl.frame_dir().exists());

    rig.ctl.start_from_rpc("/x/benchy.gcode").unwrap();
    assert!(rig.ctl.is_active());
    assert_eq!(rig.ctl.status().base_name.as_deref(), Some("benchy"));
}

#[test]
fn start_with_directory_persists_it() {
    let mut rig = rig();
    let dir = rig.root.join("custom");
    rig.ctl.start("job", Some(&dir)).unwrap();
    assert!(dir.is_dir());
    assert_eq!(rig.ctl.config().output_dir, Some(dir));
    assert!(rig.ctl.custom_mode());
}

#[test]
fn finalize_skips_a_name_taken_while_recording() {
    let mut rig = rig();
    rig.ctl.start("cube", None).unwrap();
    assert_eq!(rig.ctl.status().sequence, Some(1));
    capture_n(&mut rig, 2);

    let taken = rig.root.join("videos/cube_01.mp4");
    std::fs::write(&taken, b"sibling").unwrap();

    let report = rig.ctl.finalize().unwrap();
    assert!(report.succeeded(), "{}", report.detail);
    assert_eq!(
        report.outputs.unwrap().video,
        rig.root.join("videos/cube_02.mp4")
    );
    assert_eq!(std::fs::read(&taken).unwrap(), b"sibling");
}
