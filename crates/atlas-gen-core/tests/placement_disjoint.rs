use atlas_gen_core::prelude::*;
use rand::{Rng, SeedableRng};

fn disjoint(frames: &[Frame]) -> bool {
    for i in 0..frames.len() {
        for j in (i + 1)..frames.len() {
            if frames[i].frame.intersects(&frames[j].frame) {
                return false;
            }
        }
    }
    true
}

fn random_sizes(seed: u64, count: usize, min: u32, max: u32) -> Vec<(String, u32, u32)> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| {
            let w = rng.gen_range(min..=max);
            let h = rng.gen_range(min..=max);
            (format!("img_{:03}", i), w, h)
        })
        .collect()
}

#[test]
fn placements_are_disjoint_and_inside_the_page() {
    let cfg = AtlasConfig::builder().with_dimensions(256, 256).build();
    let items = random_sizes(42, 150, 4, 96);
    let layout = pack_layout(items.clone(), cfg).expect("pack");

    let bounds = Rect::new(0, 0, 256, 256);
    let mut placed = 0;
    for page in &layout.pages {
        assert_eq!((page.width, page.height), (256, 256));
        assert!(!page.frames.is_empty(), "page {} is empty", page.id);
        assert!(disjoint(&page.frames), "overlap on page {}", page.id);
        for f in &page.frames {
            assert!(bounds.contains(&f.frame), "{:?} outside page", f);
        }
        placed += page.frames.len();
    }
    assert_eq!(placed, items.len());
}

#[test]
fn every_image_keeps_its_size() {
    let cfg = AtlasConfig::builder().with_dimensions(200, 120).build();
    let items = random_sizes(7, 60, 1, 120);
    let layout = pack_layout(items.clone(), cfg).expect("pack");
    for (key, w, h) in &items {
        let frame = layout
            .pages
            .iter()
            .flat_map(|p| p.frames.iter())
            .find(|f| &f.key == key)
            .expect("every key is placed");
        assert_eq!((frame.frame.w, frame.frame.h), (*w, *h), "size of {}", key);
    }
}

#[test]
fn placement_is_deterministic_and_independent_of_input_order() {
    let cfg = AtlasConfig::builder().with_dimensions(128, 128).build();
    let items = random_sizes(1234, 80, 3, 50);
    let mut shuffled = items.clone();
    shuffled.reverse();
    shuffled.rotate_left(17);

    let a = pack_layout(items.clone(), cfg.clone()).expect("a");
    let b = pack_layout(items, cfg.clone()).expect("b");
    let c = pack_layout(shuffled, cfg).expect("c");

    assert_eq!(a.pages.len(), b.pages.len());
    assert_eq!(a.pages.len(), c.pages.len());
    for ((pa, pb), pc) in a.pages.iter().zip(&b.pages).zip(&c.pages) {
        assert_eq!(pa.frames, pb.frames);
        assert_eq!(pa.frames, pc.frames);
        assert_eq!(to_manifest_text(pa), to_manifest_text(pc));
    }
}

#[test]
fn earlier_atlases_are_tried_first() {
    // a big image fills most of atlas 1, a second big one opens atlas 2,
    // small images then go back to the leftover space of atlas 1
    let cfg = AtlasConfig::builder().with_dimensions(100, 100).build();
    let items = vec![
        ("big_a", 100, 90),
        ("big_b", 100, 90),
        ("small", 10, 10),
    ];
    let layout = pack_layout(items, cfg).expect("pack");
    assert_eq!(layout.pages.len(), 2);
    let first: Vec<&str> = layout.pages[0].frames.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(first, vec!["big_a", "small"]);
    let small = &layout.pages[0].frames[1];
    assert_eq!(small.frame, Rect::new(0, 90, 10, 10));
}
