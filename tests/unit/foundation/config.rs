use super::*;

#[test]
fn defaults_match_firmware() {
    let cfg = SessionConfig::default();
    assert_eq!(cfg.output_fps, 30);
    assert_eq!(cfg.crf, 23);
    assert_eq!(cfg.target_length, 10);
    assert_eq!(cfg.variable_fps_min, 5);
    assert_eq!(cfg.variable_fps_max, 60);
    assert!(!cfg.variable_fps);
    assert_eq!(cfg.output_dir(), PathBuf::from(DEFAULT_OUTPUT_DIR));
    assert_eq!(cfg.temp_dir_base(), PathBuf::from(DEFAULT_TEMP_DIR_BASE));
}

#[test]
fn json_keys_and_clamping() {
    let json = r#"{
        "timelapse_output_fps": 500,
        "timelapse_crf": 99,
        "timelapse_variable_fps": true,
        "timelapse_target_length": 0,
        "timelapse_duplicate_last_frame": 5,
        "timelapse_flip_x": true,
        "timelapse_output_dir": "/data/videos"
    }"#;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    std::fs::write(&path, json).unwrap();

    let cfg = SessionConfig::load(&path).unwrap();
    assert_eq!(cfg.output_fps, 120);
    assert_eq!(cfg.crf, 51);
    assert!(cfg.variable_fps);
    assert_eq!(cfg.target_length, 1);
    assert_eq!(cfg.duplicate_last_frame, 5);
    assert_eq!(cfg.flip(), Flip { horizontal: true, vertical: false });
    assert_eq!(cfg.output_dir(), PathBuf::from("/data/videos"));
    // unspecified keys keep their defaults
    assert_eq!(cfg.variable_fps_max, 60);
}

#[test]
fn save_then_load_preserves_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cfg.json");
    let mut cfg = SessionConfig::default();
    cfg.set_crf(30).unwrap();
    cfg.set_flip(false, true);
    cfg.save(&path).unwrap();

    let back = SessionConfig::load(&path).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = SessionConfig::load_or_default(&dir.path().join("nope.json")).unwrap();
    assert_eq!(cfg, SessionConfig::default());
}

#[test]
fn setters_reject_out_of_range() {
    let mut cfg = SessionConfig::default();
    assert!(cfg.set_fps(0).is_err());
    assert!(cfg.set_fps(121).is_err());
    assert!(cfg.set_crf(52).is_err());
    assert!(cfg.set_duplicate_last(61).is_err());
    assert!(cfg.set_variable_fps(30, 10, 10).is_err());
    assert_eq!(cfg, SessionConfig::default());

    cfg.set_variable_fps(0, 0, 0).unwrap();
    assert!(cfg.variable_fps);
    assert_eq!(cfg.variable_fps_min, DEFAULT_VARIABLE_FPS_MIN);
    assert_eq!(cfg.target_length, DEFAULT_TARGET_LENGTH);
}

#[test]
fn resolved_replaces_zero_values() {
    let cfg = SessionConfig {
        output_fps: 0,
        crf: 0,
        target_length: 0,
        ..SessionConfig::default()
    };
    let r = cfg.resolved();
    assert_eq!(r.output_fps, DEFAULT_OUTPUT_FPS);
    assert_eq!(r.crf, DEFAULT_CRF);
    assert_eq!(r.target_length, DEFAULT_TARGET_LENGTH);
    assert!(r.output_dir.is_some());
    assert!(r.temp_dir_base.is_some());
}

#[test]
fn flip_filters() {
    assert_eq!(Flip::default().filter(), None);
    let both = Flip {
        horizontal: true,
        vertical: true,
    };
    assert_eq!(both.filter(), Some("hflip,vflip"));
}

#[test]
fn base_name_validation() {
    assert!(validate_base_name("Benchy_PLA_0.2mm").is_ok());
    assert!(validate_base_name("").is_err());
    assert!(validate_base_name("..").is_err());
    assert!(validate_base_name("a/b").is_err());
    assert!(validate_base_name("a;rm -rf").is_err());
    assert!(validate_base_name("it's").is_err());
    assert!(validate_base_name("$(reboot)").is_err());
}

#[test]
fn dir_validation() {
    assert!(validate_dir(Path::new("/useremain/app/gk/Time-lapse-Video/")).is_ok());
    assert!(validate_dir(Path::new("/tmp/../etc")).is_err());
    assert!(validate_dir(Path::new("/tmp/`id`")).is_err());
    assert!(validate_dir(Path::new("")).is_err());
}
