use super::*;

fn source_stub() -> LayerSource {
    let dir = std::env::temp_dir().join(format!(
        "layerstack_selector_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("x"), b"x").unwrap();
    LayerSource::scan(&dir).unwrap()
}

#[test]
fn random_selector_stays_in_range_and_covers_all_candidates() {
    let src = source_stub();
    let mut sel = RandomSelector::new();
    let mut seen = [0usize; 4];
    for _ in 0..2000 {
        let i = sel.choose(&src, 4);
        assert!(i < 4);
        seen[i] += 1;
    }
    // 2000 uniform draws over 4 buckets: each bucket lands far above 300.
    assert!(seen.iter().all(|&n| n > 300), "{seen:?}");
    std::fs::remove_dir_all(src.dir()).ok();
}

#[test]
fn random_selector_rapid_draws_are_not_constant() {
    let src = source_stub();
    let mut sel = RandomSelector::new();
    let first = sel.choose(&src, 1000);
    let differs = (0..64).any(|_| sel.choose(&src, 1000) != first);
    assert!(differs);
    std::fs::remove_dir_all(src.dir()).ok();
}

#[test]
fn cycling_selector_replays_and_wraps() {
    let src = source_stub();
    let mut sel = CyclingSelector::new(vec![0, 1, 2]);
    let picks: Vec<_> = (0..6).map(|_| sel.choose(&src, 2)).collect();
    assert_eq!(picks, vec![0, 1, 0, 0, 1, 0]);
    std::fs::remove_dir_all(src.dir()).ok();
}

#[test]
fn empty_script_always_picks_first() {
    let src = source_stub();
    let mut sel = CyclingSelector::new(Vec::new());
    assert_eq!(sel.choose(&src, 5), 0);
    std::fs::remove_dir_all(src.dir()).ok();
}
