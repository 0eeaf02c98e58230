//! Fixtures shared by the in-crate unit tests.

use std::path::Path;

/// Encode a small gradient as a baseline JPEG.
pub(crate) fn jpeg_fixture(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x as u8).wrapping_mul(8) ^ seed,
            (y as u8).wrapping_mul(8),
            seed,
        ])
    });
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 85)
        .encode_image(&img)
        .unwrap();
    buf
}

/// Write `count` staged frames named the way the stager names them.
pub(crate) fn stage_frames(dir: &Path, count: u32, width: u32, height: u32) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        let bytes = jpeg_fixture(width, height, i as u8);
        std::fs::write(dir.join(format!("frame_{i:04}.jpg")), bytes).unwrap();
    }
}

/// A stand-in transcoder: writes a fixed payload to its last argument and exits with `code`.
#[cfg(unix)]
pub(crate) fn fake_transcoder(dir: &Path, name: &str, code: i32) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt as _;

    let path = dir.join(name);
    let script = format!(
        "#!/bin/sh\nfor last; do :; done\nif [ {code} -eq 0 ]; then printf 'fake-mp4' > \"$last\"; fi\necho \"$@\" >> \"$0.args\"\nexit {code}\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// In-memory hardware driver and muxer that record what happens to them.
pub(crate) mod fake_hw {
    use crate::encode::hw::{
        AccessUnit, BlockHandle, ChannelConfig, DecoderFactory, EncoderChannel, EncoderDriver,
        FramePool, HardwareBackend, ImageJpegDecoder, Mp4Muxer, MuxerFactory, PoolConfig,
        RawFrame, TrackConfig,
    };
    use crate::foundation::error::{LapseError, LapseResult};
    use std::fs::File;
    use std::io::Write as _;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

    #[derive(Default)]
    pub(crate) struct FakeDriver {
        pub(crate) fail_channel: bool,
        pub(crate) fail_submit: bool,
        /// Submits fail with `ResourceExhaustion` after this many succeed.
        pub(crate) exhaust_after: Option<usize>,
        pub(crate) log: EventLog,
    }

    impl EncoderDriver for FakeDriver {
        fn create_pool(&self, cfg: &PoolConfig) -> LapseResult<Box<dyn FramePool>> {
            self.log.lock().unwrap().push(format!("pool {}", cfg.block_count));
            Ok(Box::new(FakePool {
                block: vec![0u8; cfg.block_len],
                log: Arc::clone(&self.log),
            }))
        }

        fn open_channel(&self, cfg: &ChannelConfig) -> LapseResult<Box<dyn EncoderChannel>> {
            if self.fail_channel {
                return Err(LapseError::exhausted("no free channel"));
            }
            self.log.lock().unwrap().push(format!("channel gop={}", cfg.gop));
            Ok(Box::new(FakeChannel {
                fail_submit: self.fail_submit,
                exhaust_after: self.exhaust_after,
                submitted: 0,
                pending: 0,
                log: Arc::clone(&self.log),
            }))
        }
    }

    struct FakePool {
        block: Vec<u8>,
        log: EventLog,
    }

    impl FramePool for FakePool {
        fn handle(&self) -> BlockHandle {
            BlockHandle(7)
        }

        fn block_mut(&mut self) -> &mut [u8] {
            &mut self.block
        }

        fn flush(&mut self) -> LapseResult<()> {
            Ok(())
        }
    }

    impl Drop for FakePool {
        fn drop(&mut self) {
            self.log.lock().unwrap().push("pool released".into());
        }
    }

    struct FakeChannel {
        fail_submit: bool,
        exhaust_after: Option<usize>,
        submitted: usize,
        pending: usize,
        log: EventLog,
    }

    impl EncoderChannel for FakeChannel {
        fn submit(&mut self, _frame: RawFrame, _timeout: Duration) -> LapseResult<()> {
            if self.fail_submit {
                return Err(LapseError::encoder("submit timed out"));
            }
            if self.exhaust_after.is_some_and(|n| self.submitted >= n) {
                return Err(LapseError::exhausted("input queue full"));
            }
            self.submitted += 1;
            self.pending += 1;
            Ok(())
        }

        fn retrieve(&mut self, _timeout: Duration) -> LapseResult<Vec<AccessUnit>> {
            let units = (0..self.pending)
                .map(|_| AccessUnit {
                    data: vec![0, 0, 0, 1, 0x65],
                    keyframe: true,
                })
                .collect();
            self.pending = 0;
            Ok(units)
        }
    }

    impl Drop for FakeChannel {
        fn drop(&mut self) {
            self.log.lock().unwrap().push("channel closed".into());
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeMuxerFactory {
        pub(crate) log: EventLog,
    }

    impl MuxerFactory for FakeMuxerFactory {
        fn open(&self, file: File, track: &TrackConfig) -> LapseResult<Box<dyn Mp4Muxer>> {
            self.log
                .lock()
                .unwrap()
                .push(format!("muxer {}x{}", track.width, track.height));
            Ok(Box::new(FakeMuxer {
                file,
                last_pts: None,
                log: Arc::clone(&self.log),
            }))
        }
    }

    struct FakeMuxer {
        file: File,
        last_pts: Option<u64>,
        log: EventLog,
    }

    impl Mp4Muxer for FakeMuxer {
        fn write_access_unit(&mut self, data: &[u8], pts: u64, duration: u32) -> LapseResult<()> {
            if let Some(prev) = self.last_pts {
                assert_eq!(pts, prev + u64::from(duration));
            }
            self.last_pts = Some(pts);
            self.file
                .write_all(data)
                .map_err(|e| LapseError::muxer(e.to_string()))
        }

        fn close(self: Box<Self>) -> LapseResult<()> {
            self.log.lock().unwrap().push("muxer closed".into());
            Ok(())
        }
    }

    /// Backend wired to the fakes, sharing one event log.
    pub(crate) fn backend(driver: FakeDriver) -> (HardwareBackend, EventLog) {
        let log = Arc::clone(&driver.log);
        let backend = HardwareBackend {
            driver: Arc::new(driver),
            muxer: Arc::new(FakeMuxerFactory {
                log: Arc::clone(&log),
            }),
            decoder: Arc::new(ImageJpegDecoder) as Arc<dyn DecoderFactory>,
        };
        (backend, log)
    }
}
