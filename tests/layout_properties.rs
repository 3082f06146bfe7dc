use proptest::prelude::*;
use spacefiler::treemap::{LayoutRect, Rect, SquarifiedTreemap, TreemapItem};

fn items(sizes: &[u64]) -> Vec<TreemapItem> {
    sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| TreemapItem { size, index })
        .collect()
}

fn close(a: f64, b: f64, scale: f64) -> bool {
    (a - b).abs() <= 1e-6 * scale.max(1.0)
}

fn layout(sizes: &[u64], bounds: Rect) -> Vec<LayoutRect> {
    SquarifiedTreemap::layout(&items(sizes), bounds)
}

proptest! {
    #[test]
    fn tiles_bounds_without_overlap(
        sizes in prop::collection::vec(0u64..10_000, 1..40),
        x in 0.0f64..100.0,
        y in 0.0f64..100.0,
        w in 1.0f64..800.0,
        h in 1.0f64..800.0,
    ) {
        let bounds = Rect::new(x, y, w, h);
        let rects = layout(&sizes, bounds);
        let area = bounds.area();

        prop_assert_eq!(rects.len(), sizes.len());
        let covered: f64 = rects.iter().map(|r| r.rect.area()).sum();
        prop_assert!(close(covered, area, area), "covered {} of {}", covered, area);

        for r in &rects {
            prop_assert!(r.rect.x >= x - 1e-9 && r.rect.y >= y - 1e-9);
            prop_assert!(close(r.rect.right().min(bounds.right()), r.rect.right(), area));
            prop_assert!(close(r.rect.bottom().min(bounds.bottom()), r.rect.bottom(), area));
        }

        for (i, a) in rects.iter().enumerate() {
            for b in &rects[i + 1..] {
                prop_assert!(a.rect.overlap_area(&b.rect) <= 1e-6 * area);
            }
        }
    }

    #[test]
    fn areas_are_proportional_to_sizes(
        sizes in prop::collection::vec(1u64..10_000, 1..30),
        w in 1.0f64..500.0,
        h in 1.0f64..500.0,
    ) {
        let bounds = Rect::new(0.0, 0.0, w, h);
        let total: u64 = sizes.iter().sum();
        for r in layout(&sizes, bounds) {
            let expected = sizes[r.index] as f64 / total as f64 * bounds.area();
            prop_assert!(close(r.rect.area(), expected, bounds.area()));
        }
    }

    #[test]
    fn layout_is_deterministic(
        sizes in prop::collection::vec(0u64..1_000, 0..30),
        w in 0.0f64..300.0,
        h in 0.0f64..300.0,
    ) {
        let bounds = Rect::new(0.0, 0.0, w, h);
        prop_assert_eq!(layout(&sizes, bounds), layout(&sizes, bounds));
    }

    #[test]
    fn every_index_placed_once(sizes in prop::collection::vec(0u64..100, 0..30)) {
        let mut seen: Vec<usize> = layout(&sizes, Rect::new(0.0, 0.0, 64.0, 48.0))
            .into_iter()
            .map(|r| r.index)
            .collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..sizes.len()).collect::<Vec<_>>());
    }
}

