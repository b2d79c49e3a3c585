#[cfg(test)]
mod integration_tests {
    use crate::ports::MockDeliveryPort;
    use crate::{
        CaptureError, CapturePort, CaptureService, CaptureSettings, CaptureTarget, Config,
        CssRect, DeliveryPort, ElementHandle, OutputFormat, OverlayElement, ReflectionPort,
        Result, Scroller, TileFormat, TileStatus, VisibilityChange,
    };
    use async_trait::async_trait;
    use image::{ImageOutputFormat, Rgba, RgbaImage};
    use std::collections::{BTreeMap, HashSet};
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    const WIDTH: u32 = 24;
    const HIDDEN: &str = "hidden !important";
    const CHROME: [u8; 4] = [128, 128, 128, 255];
    const BELOW_CONTENT: [u8; 4] = [255, 255, 255, 255];

    /// Every content row has its own color.
    fn row_color(row: u32) -> [u8; 4] {
        [(row % 251) as u8, (row / 251) as u8, 90, 255]
    }

    /// 100-row bands, for checks that survive resampling.
    fn band_color(row: u32) -> [u8; 4] {
        match (row / 100) % 3 {
            0 => [255, 0, 0, 255],
            1 => [0, 255, 0, 255],
            _ => [0, 0, 255, 255],
        }
    }

    #[derive(Default)]
    struct PageState {
        scroll: u32,
        overlays: BTreeMap<u64, Option<String>>,
        events: Vec<String>,
        capture_times: Vec<Instant>,
        formats: Vec<TileFormat>,
        overlays_hidden_at_capture: Vec<bool>,
    }

    /// In-memory page: scroll position decides what the next capture shows.
    struct FakePage {
        target: CaptureTarget,
        paint: fn(u32) -> [u8; 4],
        state: Mutex<PageState>,
        failing_scrolls: HashSet<u32>,
        failing_captures: HashSet<u32>,
        blank_captures: HashSet<u32>,
        fail_resolve: bool,
    }

    impl FakePage {
        fn new(total_height: u32, viewport_height: u32, dpr: f64) -> Self {
            Self {
                target: CaptureTarget {
                    scroller: Scroller::Window,
                    crop_rect: CssRect::new(0.0, 0.0, WIDTH as f64, viewport_height as f64),
                    total_width: WIDTH,
                    total_height,
                    viewport_width: WIDTH,
                    viewport_height,
                    device_pixel_ratio: dpr,
                },
                paint: row_color,
                state: Mutex::new(PageState::default()),
                failing_scrolls: HashSet::new(),
                failing_captures: HashSet::new(),
                blank_captures: HashSet::new(),
                fail_resolve: false,
            }
        }

        /// Scroll an inner container placed at `(x, y)` inside the window.
        fn in_container(mut self, x: u32, y: u32) -> Self {
            self.target.scroller = Scroller::Element(0);
            self.target.crop_rect.x = x as f64;
            self.target.crop_rect.y = y as f64;
            self
        }

        fn with_overlays(self, overlays: &[(u64, Option<&str>)]) -> Self {
            {
                let mut state = self.state.lock().unwrap();
                for (handle, value) in overlays {
                    state.overlays.insert(*handle, value.map(str::to_string));
                }
            }
            self
        }

        fn events(&self) -> Vec<String> {
            self.state.lock().unwrap().events.clone()
        }

        fn overlays(&self) -> BTreeMap<u64, Option<String>> {
            self.state.lock().unwrap().overlays.clone()
        }

        fn render(&self, scroll: u32) -> Vec<u8> {
            let t = &self.target;
            let dpr = t.device_pixel_ratio;
            let crop_x = t.crop_rect.x as u32;
            let crop_y = t.crop_rect.y as u32;
            let window_w = ((crop_x + t.viewport_width) as f64 * dpr) as u32;
            let window_h = ((crop_y + t.viewport_height) as f64 * dpr) as u32;

            let img = RgbaImage::from_fn(window_w, window_h, |dx, dy| {
                let css_x = (dx as f64 / dpr) as u32;
                let css_y = (dy as f64 / dpr) as u32;
                if css_x < crop_x || css_y < crop_y {
                    return Rgba(CHROME);
                }
                let row = scroll + (css_y - crop_y);
                if row < t.total_height {
                    Rgba((self.paint)(row))
                } else {
                    Rgba(BELOW_CONTENT)
                }
            });

            let mut bytes = Vec::new();
            img.write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
                .unwrap();
            bytes
        }
    }

    #[async_trait]
    impl ReflectionPort for FakePage {
        async fn resolve_scroll_target(&self) -> Result<CaptureTarget> {
            self.state.lock().unwrap().events.push("resolve".into());
            if self.fail_resolve {
                return Err(CaptureError::ResolveFailed("probe script threw".into()));
            }
            Ok(self.target.clone())
        }

        async fn scroll_to(&self, scroller: Scroller, offset: u32) -> Result<()> {
            assert_eq!(scroller, self.target.scroller);
            let mut state = self.state.lock().unwrap();
            state.events.push(format!("scroll {offset}"));
            if self.failing_scrolls.contains(&offset) {
                return Err(CaptureError::ScrollFailed {
                    offset,
                    reason: "container detached".into(),
                });
            }
            let max_scroll = self
                .target
                .total_height
                .saturating_sub(self.target.viewport_height);
            state.scroll = offset.min(max_scroll);
            Ok(())
        }

        async fn overlay_elements(&self) -> Result<Vec<OverlayElement>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .overlays
                .iter()
                .map(|(handle, value)| OverlayElement {
                    handle: ElementHandle(*handle),
                    inline_visibility: value.clone(),
                })
                .collect())
        }

        async fn set_visibility(
            &self,
            element: ElementHandle,
            change: VisibilityChange,
        ) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            match change {
                VisibilityChange::Hide => {
                    state.events.push(format!("hide {}", element.0));
                    state.overlays.insert(element.0, Some(HIDDEN.to_string()));
                }
                VisibilityChange::Restore(value) => {
                    state.events.push(format!("restore {}", element.0));
                    state.overlays.insert(element.0, value);
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CapturePort for FakePage {
        async fn capture_visible(&self, format: TileFormat) -> Result<Vec<u8>> {
            let scroll = {
                let mut state = self.state.lock().unwrap();
                let all_hidden = state
                    .overlays
                    .values()
                    .all(|v| v.as_deref() == Some(HIDDEN));
                let current_scroll = state.scroll;
                state.events.push(format!("capture {}", current_scroll));
                state.capture_times.push(Instant::now());
                state.formats.push(format);
                state.overlays_hidden_at_capture.push(all_hidden);
                state.scroll
            };

            if self.failing_captures.contains(&scroll) {
                return Err(CaptureError::CaptureFailed("quota exceeded".into()));
            }
            if self.blank_captures.contains(&scroll) {
                return Ok(Vec::new());
            }
            Ok(self.render(scroll))
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        delivered: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingDelivery {
        fn single(&self) -> (String, Vec<u8>) {
            let delivered = self.delivered.lock().unwrap();
            assert_eq!(delivered.len(), 1, "expected exactly one delivery");
            delivered[0].clone()
        }

        fn image(&self) -> RgbaImage {
            let (_, bytes) = self.single();
            image::load_from_memory(&bytes).unwrap().to_rgba8()
        }
    }

    #[async_trait]
    impl DeliveryPort for RecordingDelivery {
        async fn deliver(&self, bytes: Vec<u8>, filename: &str) -> Result<()> {
            self.delivered
                .lock()
                .unwrap()
                .push((filename.to_string(), bytes));
            Ok(())
        }
    }

    fn config(format: OutputFormat) -> Config {
        Config {
            settings: CaptureSettings {
                output_format: format,
                output_quality: 0.9,
            },
            ..Default::default()
        }
    }

    fn service(
        page: &Arc<FakePage>,
        delivery: Arc<dyn DeliveryPort>,
        config: Config,
    ) -> CaptureService {
        CaptureService::new(page.clone(), page.clone(), delivery, config)
    }

    fn assert_rows_match(img: &RgbaImage, rows: std::ops::Range<u32>, paint: fn(u32) -> [u8; 4]) {
        for y in rows {
            for x in [0, img.width() / 2, img.width() - 1] {
                assert_eq!(img.get_pixel(x, y).0, paint(y), "pixel ({x}, {y})");
            }
        }
    }

    fn assert_rows_transparent(img: &RgbaImage, rows: std::ops::Range<u32>) {
        for y in rows {
            assert_eq!(img.get_pixel(0, y).0[3], 0, "row {y} should be blank");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_page_is_one_cropped_tile() {
        let page = Arc::new(FakePage::new(500, 800, 1.0));
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Short page").await.unwrap();

        assert_eq!(report.tiles.len(), 1);
        assert_eq!(report.tiles[0].offset, 0);
        assert_eq!(report.tiles[0].content_height, 500);
        assert_eq!(report.tiles[0].status, TileStatus::Cropped);
        assert_eq!(report.filename, "Short page.png");

        let img = delivery.image();
        assert_eq!(img.dimensions(), (WIDTH, 500));
        assert_rows_match(&img, 0..500, row_color);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tiles_cover_content_exactly() {
        let page = Arc::new(FakePage::new(2000, 800, 1.0));
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Tall").await.unwrap();

        let offsets: Vec<u32> = report.tiles.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 800, 1200]);
        assert!(report.tiles.iter().all(|t| t.status == TileStatus::Drawn));
        assert_eq!(report.gap_count(), 0);
        assert!(report.window_scroller);

        let img = delivery.image();
        assert_eq!(img.dimensions(), (WIDTH, 2000));
        assert_rows_match(&img, 0..2000, row_color);

        let scrolls: Vec<String> = page
            .events()
            .into_iter()
            .filter(|e| e.starts_with("scroll"))
            .collect();
        assert_eq!(scrolls, vec!["scroll 0", "scroll 800", "scroll 1200"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_container_is_cropped_out_of_the_window() {
        let page = Arc::new(FakePage::new(2000, 800, 1.0).in_container(10, 20));
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Docs").await.unwrap();

        assert!(!report.window_scroller);
        let img = delivery.image();
        assert_eq!(img.dimensions(), (WIDTH, 2000));
        assert_rows_match(&img, 0..2000, row_color);
        assert!(img.pixels().all(|p| p.0 != CHROME));
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_density_tiles_land_in_css_pixels() {
        let mut fake = FakePage::new(1000, 400, 2.0);
        fake.paint = band_color;
        let page = Arc::new(fake);
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Retina").await.unwrap();

        assert_eq!(report.device_pixel_ratio, 2.0);
        assert_eq!((report.width, report.height), (WIDTH, 1000));

        let img = delivery.image();
        assert_eq!(img.dimensions(), (WIDTH, 1000));
        for band_center in (50..1000).step_by(100) {
            let got = img.get_pixel(WIDTH / 2, band_center).0;
            let want = band_color(band_center);
            assert!(
                got.iter().zip(want).all(|(a, b)| a.abs_diff(b) <= 1),
                "row {band_center}: {got:?} != {want:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlays_hidden_during_capture_and_restored_after() {
        let page = Arc::new(
            FakePage::new(2000, 800, 1.0).with_overlays(&[(1, Some("visible")), (2, None)]),
        );
        let before = page.overlays();
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Header page").await.unwrap();

        assert_eq!(report.overlays_hidden, 2);
        assert_eq!(report.overlays_restored, 2);
        assert_eq!(page.overlays(), before);

        let state = page.state.lock().unwrap();
        assert_eq!(state.overlays_hidden_at_capture, vec![true, true, true]);
        let restores = state
            .events
            .iter()
            .filter(|e| e.starts_with("restore"))
            .count();
        assert_eq!(restores, 2);

        // Restores happen after the last capture.
        let last_capture = state
            .events
            .iter()
            .rposition(|e| e.starts_with("capture"))
            .unwrap();
        let first_restore = state
            .events
            .iter()
            .position(|e| e.starts_with("restore"))
            .unwrap();
        assert!(first_restore > last_capture);
    }

    #[tokio::test(start_paused = true)]
    async fn test_captures_are_spaced_across_sessions() {
        let page = Arc::new(FakePage::new(2000, 800, 1.0));
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));
        let start = Instant::now();

        service.capture("one").await.unwrap();
        service.capture("two").await.unwrap();

        let times = page.state.lock().unwrap().capture_times.clone();
        assert_eq!(times.len(), 6);
        assert!(times[0] - start < Duration::from_millis(1100));
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_millis(1100),
                "captures only {:?} apart",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_capture_leaves_blank_strip() {
        let mut fake = FakePage::new(2000, 800, 1.0);
        fake.failing_captures.insert(800);
        let page = Arc::new(fake);
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Flaky").await.unwrap();

        let statuses: Vec<TileStatus> = report.tiles.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TileStatus::Drawn, TileStatus::Gap, TileStatus::Drawn]
        );
        assert_eq!(report.gap_count(), 1);

        let img = delivery.image();
        assert_rows_match(&img, 0..800, row_color);
        assert_rows_transparent(&img, 800..1200);
        assert_rows_match(&img, 1200..2000, row_color);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_scroll_skips_capture() {
        let mut fake = FakePage::new(2000, 800, 1.0);
        fake.failing_scrolls.insert(800);
        let page = Arc::new(fake);
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Detached").await.unwrap();

        assert_eq!(report.tiles[1].status, TileStatus::Gap);
        assert_eq!(page.state.lock().unwrap().capture_times.len(), 2);
        assert_rows_transparent(&delivery.image(), 800..1200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_capture_is_a_gap() {
        let mut fake = FakePage::new(500, 800, 1.0);
        fake.blank_captures.insert(0);
        let page = Arc::new(fake);
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let report = service.capture("Blank").await.unwrap();

        assert_eq!(report.tiles[0].status, TileStatus::Gap);
        let img = delivery.image();
        assert_eq!(img.dimensions(), (WIDTH, 500));
        assert_rows_transparent(&img, 0..500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_jpeg_output_requests_jpeg_tiles() {
        let page = Arc::new(FakePage::new(2000, 800, 1.0));
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Jpeg));

        let report = service.capture("Photo: album").await.unwrap();

        let formats = page.state.lock().unwrap().formats.clone();
        assert!(formats
            .iter()
            .all(|f| *f == TileFormat::Jpeg { quality: 90 }));

        let (filename, bytes) = delivery.single();
        assert_eq!(filename, "Photo_ album.jpg");
        assert_eq!(report.encoded_size, bytes.len());
        assert_eq!(
            image::guess_format(&bytes).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_encode_failure_skips_delivery_but_restores_overlays() {
        // Taller than WebP can store.
        let mut fake = FakePage::new(20_000, 10_000, 1.0).with_overlays(&[(7, None)]);
        fake.failing_captures.extend([0, 10_000]);
        let page = Arc::new(fake);

        let mut delivery = MockDeliveryPort::new();
        delivery.expect_deliver().times(0);
        let service = service(&page, Arc::new(delivery), config(OutputFormat::Webp));

        let err = service.capture("Endless").await.unwrap_err();

        assert!(matches!(err, CaptureError::EncodeFailed(_)));
        assert_eq!(page.overlays().get(&7), Some(&None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_failure_touches_nothing() {
        let mut fake = FakePage::new(2000, 800, 1.0).with_overlays(&[(1, None)]);
        fake.fail_resolve = true;
        let page = Arc::new(fake);
        let delivery = Arc::new(RecordingDelivery::default());
        let service = service(&page, delivery.clone(), config(OutputFormat::Png));

        let err = service.capture("Broken").await.unwrap_err();

        assert!(matches!(err, CaptureError::ResolveFailed(_)));
        assert_eq!(page.events(), vec!["resolve"]);
        assert!(delivery.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sessions_run_one_after_another() {
        let page = Arc::new(
            FakePage::new(2000, 800, 1.0).with_overlays(&[(1, Some("visible")), (2, None)]),
        );
        let delivery = Arc::new(RecordingDelivery::default());
        let service = Arc::new(service(&page, delivery.clone(), config(OutputFormat::Png)));

        let (a, b) = tokio::join!(service.capture("first"), service.capture("second"));
        a.unwrap();
        b.unwrap();
        assert!(!service.is_busy());

        let events = page.events();
        let resolves: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| *e == "resolve")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(resolves.len(), 2);

        let (first, second) = events.split_at(resolves[1]);
        let count = |events: &[String], prefix: &str| {
            events.iter().filter(|e| e.starts_with(prefix)).count()
        };
        assert_eq!(count(first, "capture"), 3);
        assert_eq!(count(first, "restore"), 2);
        assert_eq!(count(second, "hide"), 2);
        assert_eq!(count(second, "restore"), 2);
        assert_eq!(delivery.delivered.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_chrome_args_follow_viewport() {
        let mut config = Config::default();
        config.viewport.width = 1280;
        config.viewport.device_scale_factor = 2.0;

        let args = crate::get_chrome_args(&config);

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--hide-scrollbars".to_string()));
        assert!(args.contains(&"--window-size=1280,1080".to_string()));
        assert!(args.contains(&"--force-device-scale-factor=2".to_string()));
    }
}
