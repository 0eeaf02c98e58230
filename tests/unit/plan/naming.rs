use super::*;

fn touch(dir: &Path, name: &str) {
    std::fs::write(dir.join(name), b"").unwrap();
}

#[test]
fn next_sequence_skips_gaps() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "job_01.mp4");
    touch(tmp.path(), "job_03.mp4");
    assert_eq!(next_sequence("job", tmp.path()), 4);
}

#[test]
fn next_sequence_counts_thumbnails_and_ignores_other_names() {
    let tmp = tempfile::tempdir().unwrap();
    touch(tmp.path(), "job_02_120.jpg");
    touch(tmp.path(), "other_09.mp4");
    touch(tmp.path(), "job.mp4");
    assert_eq!(next_sequence("job", tmp.path()), 3);
}

#[test]
fn next_sequence_starts_at_one() {
    let tmp = tempfile::tempdir().unwrap();
    assert_eq!(next_sequence("job", tmp.path()), 1);
    assert_eq!(next_sequence("job", &tmp.path().join("missing")), 1);
}

#[test]
fn output_paths_format() {
    let p = output_paths(Path::new("/out"), "Benchy", 3, 240);
    assert_eq!(p.video, PathBuf::from("/out/Benchy_03.mp4"));
    assert_eq!(p.thumbnail, PathBuf::from("/out/Benchy_03_240.jpg"));

    let p = output_paths(Path::new("/out"), "Benchy", 123, 1);
    assert_eq!(p.video, PathBuf::from("/out/Benchy_123.mp4"));
}

#[test]
fn rerun_never_reuses_a_name() {
    let tmp = tempfile::tempdir().unwrap();
    let seq = next_sequence("job", tmp.path());
    let first = output_paths(tmp.path(), "job", seq, 10);
    touch(tmp.path(), first.video.file_name().unwrap().to_str().unwrap());

    let seq2 = next_sequence("job", tmp.path());
    let second = output_paths(tmp.path(), "job", seq2, 10);
    assert_ne!(first.video, second.video);
}

#[test]
fn recovered_name_avoids_collisions() {
    let tmp = tempfile::tempdir().unwrap();
    let a = recovered_name(tmp.path(), "20261019_101500");
    assert_eq!(a.stem(), "recovered_20261019_101500");
    touch(tmp.path(), "recovered_20261019_101500.mp4");

    let b = recovered_name(tmp.path(), "20261019_101500");
    assert_eq!(b.stem(), "recovered_20261019_101500_2");
    let paths = b.paths(tmp.path(), 7);
    assert!(paths.thumbnail.ends_with("recovered_20261019_101500_2_7.jpg"));
}

#[test]
fn recovered_paths_use_stamp_and_frame_count() {
    let tmp = tempfile::tempdir().unwrap();
    let paths = recovered_paths(tmp.path(), "20261019_080000", 42);
    assert_eq!(paths.video, tmp.path().join("recovered_20261019_080000.mp4"));
    assert_eq!(
        paths.thumbnail,
        tmp.path().join("recovered_20261019_080000_42.jpg")
    );
}

#[test]
fn frame_dir_round_trips_pid() {
    let base = Path::new("/tmp/timelapse_frames");
    let dir = frame_dir(base, 4321);
    assert_eq!(dir, Path::new("/tmp/timelapse_frames_4321"));
    assert_eq!(frame_dir_pid(base, &dir), Some(4321));
}

#[test]
fn frame_dir_pid_rejects_lookalikes() {
    let base = Path::new("/tmp/timelapse_frames");
    for other in [
        "/tmp/timelapse_frames",
        "/tmp/timelapse_frames_",
        "/tmp/timelapse_frames_12a",
        "/tmp/timelapse_frames_old_12",
        "/var/timelapse_frames_12",
        "/tmp/other_12",
    ] {
        assert_eq!(frame_dir_pid(base, Path::new(other)), None, "{other}");
    }
}
