use std::io::Cursor;

use super::*;
use crate::layers::selector::CyclingSelector;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "layerstack_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_png(path: &Path, w: u32, h: u32, rgba: [u8; 4]) {
    let mut raw = Vec::new();
    for _ in 0..w * h {
        raw.extend_from_slice(&rgba);
    }
    let img = image::RgbaImage::from_raw(w, h, raw).unwrap();
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(path, &buf).unwrap();
}

#[test]
fn scan_keeps_files_sorted_and_skips_directories() {
    let dir = temp_dir("scan_sorted");
    write_png(&dir.join("b.png"), 1, 1, [0, 0, 0, 255]);
    write_png(&dir.join("a.png"), 1, 1, [0, 0, 0, 255]);
    std::fs::create_dir_all(dir.join("nested")).unwrap();

    let src = LayerSource::scan(&dir).unwrap();
    let names: Vec<_> = src
        .entries()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
    assert_eq!(src.len(), 2);
    assert_eq!(src.dir(), dir.as_path());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn scan_of_directory_with_only_subdirs_is_empty_source() {
    let dir = temp_dir("scan_empty");
    std::fs::create_dir_all(dir.join("only_a_dir")).unwrap();

    let err = LayerSource::scan(&dir).unwrap_err();
    assert!(matches!(err, LayerstackError::EmptySource(_)), "{err}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn scan_of_missing_directory_is_source_access_error() {
    let dir = temp_dir("scan_missing").join("does_not_exist");
    let err = LayerSource::scan(&dir).unwrap_err();
    assert!(matches!(err, LayerstackError::SourceAccess { .. }), "{err}");
}

#[test]
fn read_layer_decodes_and_premultiplies() {
    let dir = temp_dir("read_layer");
    write_png(&dir.join("half.png"), 2, 1, [100, 50, 200, 128]);

    let src = LayerSource::scan(&dir).unwrap();
    let layer = src.read_layer(0).unwrap();
    assert_eq!(layer.name, "half.png");
    assert_eq!((layer.pixels.width(), layer.pixels.height()), (2, 1));
    assert_eq!(
        layer.pixels.pixel(1, 0),
        Some([
            ((100u16 * 128 + 127) / 255) as u8,
            ((50u16 * 128 + 127) / 255) as u8,
            ((200u16 * 128 + 127) / 255) as u8,
            128
        ])
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn read_layer_of_garbage_file_is_decode_error() {
    let dir = temp_dir("read_garbage");
    std::fs::write(dir.join("notes.txt"), b"not an image").unwrap();

    let src = LayerSource::scan(&dir).unwrap();
    let err = src.read_layer(0).unwrap_err();
    assert!(matches!(err, LayerstackError::Decode { .. }), "{err}");

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn read_random_uses_selector_pick() {
    let dir = temp_dir("read_random");
    write_png(&dir.join("a.png"), 1, 1, [255, 0, 0, 255]);
    write_png(&dir.join("b.png"), 1, 1, [0, 255, 0, 255]);

    let src = LayerSource::scan(&dir).unwrap();
    let mut selector = CyclingSelector::new(vec![1, 0]);
    assert_eq!(src.read_random(&mut selector).unwrap().name, "b.png");
    assert_eq!(src.read_random(&mut selector).unwrap().name, "a.png");

    std::fs::remove_dir_all(&dir).ok();
}
