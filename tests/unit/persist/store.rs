use super::*;
use crate::render::raster::PremulImage;

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

#[test]
fn png_dir_store_names_files_by_index() {
    let store = PngDirStore::new("out");
    assert_eq!(store.path_for(7), Path::new("out").join("7.png"));
}

#[test]
fn png_dir_store_writes_straight_alpha_png() {
    let dir = temp_dir("png_store");
    let store = PngDirStore::new(&dir);
    // Premultiplied half-transparent red.
    let img = PremulImage::from_premul(1, 1, vec![128, 0, 0, 128]).unwrap();
    store.persist(3, &img).unwrap();

    let back = image::open(dir.join("3.png")).unwrap().to_rgba8();
    assert_eq!(back.dimensions(), (1, 1));
    assert_eq!(back.get_pixel(0, 0).0, [255, 0, 0, 128]);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn png_dir_store_reports_missing_directory_as_persistence_error() {
    let dir = temp_dir("png_store_missing").join("gone");
    let store = PngDirStore::new(&dir);
    let err = store
        .persist(1, &PremulImage::transparent(1, 1))
        .unwrap_err();
    assert!(matches!(err, LayerstackError::Persistence(_)), "{err}");
}

#[test]
fn in_memory_store_returns_sorted_indices() {
    let store = InMemoryStore::new();
    store.persist(5, &PremulImage::transparent(1, 1)).unwrap();
    store.persist(2, &PremulImage::transparent(1, 1)).unwrap();
    assert_eq!(store.indices(), vec![2, 5]);
}
