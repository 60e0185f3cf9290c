//! File backend output read back with an independent decoder

use framewire::{
    open_backend, Backend, BackendConfig, Color, FileConfig, Framebuffer, ImageFileFormat,
    WindowOptions,
};

fn test_frame() -> Framebuffer {
    let mut frame = Framebuffer::new(5, 3);
    frame.fill(Color::WHITE);
    frame.set_pixel(0, 0, Color::RED);
    frame.set_pixel(4, 2, Color::BLUE);
    frame.set_pixel(2, 1, Color::rgb(10, 20, 30));
    frame
}

fn render(format: ImageFileFormat) -> image::RgbImage {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let mut config = FileConfig::new(dir.path());
    config.format = format;
    let mut backend = open_backend(&BackendConfig::File(config), &WindowOptions::default()).unwrap();
    backend.present(&test_frame()).unwrap();
    backend.close().unwrap();

    let path = dir.path().join(format!("frame_00000.{}", format.extension()));
    image::open(&path).unwrap().to_rgb8()
}

fn assert_matches_frame(img: &image::RgbImage) {
    assert_eq!(img.dimensions(), (5, 3));
    assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
    assert_eq!(img.get_pixel(4, 2).0, [0, 0, 255]);
    assert_eq!(img.get_pixel(2, 1).0, [10, 20, 30]);
    assert_eq!(img.get_pixel(1, 1).0, [255, 255, 255]);
}

#[test]
fn test_bmp_decodes_top_down() {
    assert_matches_frame(&render(ImageFileFormat::Bmp));
}

#[test]
fn test_ascii_ppm_decodes() {
    assert_matches_frame(&render(ImageFileFormat::Ppm));
}

#[test]
fn test_binary_ppm_decodes() {
    assert_matches_frame(&render(ImageFileFormat::PpmBinary));
}

#[test]
fn test_max_frames_stops_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = FileConfig::new(dir.path());
    config.max_frames = Some(3);
    let mut backend = open_backend(&BackendConfig::File(config), &WindowOptions::default()).unwrap();

    let frame = Framebuffer::new(2, 2);
    let mut presented = 0;
    while !backend.should_close() {
        backend.present(&frame).unwrap();
        assert!(backend.poll_events().unwrap().is_empty());
        presented += 1;
    }
    assert_eq!(presented, 3);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
}
