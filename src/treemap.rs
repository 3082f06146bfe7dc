/// Rectangle structure for treemap layout
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width: width.max(0.0),
            height: height.max(0.0),
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn short_side(&self) -> f64 {
        self.width.min(self.height)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Half-open containment: leading edges are inside, trailing edges are not,
    /// so a point on an edge shared by two tiles belongs to exactly one of them.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Area of the intersection with `other` (0 when disjoint).
    pub fn overlap_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }
}

/// Item to be laid out in the treemap
#[derive(Debug, Clone)]
pub struct TreemapItem {
    pub size: u64,
    pub index: usize,
}

/// Result of the treemap layout calculation
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutRect {
    pub rect: Rect,
    pub index: usize,
}

/// Squarified Treemap Algorithm (Bruls, Huizing, van Wijk)
pub struct SquarifiedTreemap;

impl SquarifiedTreemap {
    /// Calculate the squarified treemap layout.
    ///
    /// The result is in placement order (largest first, ties in input order)
    /// and tiles `container` exactly.
    pub fn layout(items: &[TreemapItem], container: Rect) -> Vec<LayoutRect> {
        if items.is_empty() {
            return vec![];
        }

        // Stable: equal sizes keep scan order
        let mut sorted: Vec<&TreemapItem> = items.iter().collect();
        sorted.sort_by(|a, b| b.size.cmp(&a.size));

        let total_size: u64 = sorted.iter().map(|item| item.size).sum();

        // All-zero input degrades to equal shares
        let weights: Vec<(usize, f64)> = if total_size == 0 {
            sorted.iter().map(|item| (item.index, 1.0)).collect()
        } else {
            sorted.iter().map(|item| (item.index, item.size as f64)).collect()
        };

        if container.area() <= 0.0 {
            return Self::slice(&weights, container);
        }

        let (nonzero, zero): (Vec<_>, Vec<_>) = weights.into_iter().partition(|(_, w)| *w > 0.0);

        // Normalize sizes to fit container area
        let weight_total: f64 = nonzero.iter().map(|(_, w)| w).sum();
        let scale = container.area() / weight_total;
        let normalized: Vec<(usize, f64)> = nonzero.iter().map(|&(i, w)| (i, w * scale)).collect();

        let mut result = Vec::with_capacity(items.len());
        let last_row_origin = Self::squarify(&normalized, &mut result, container);

        for (index, _) in zero {
            result.push(LayoutRect {
                rect: Rect::new(last_row_origin.0, last_row_origin.1, 0.0, 0.0),
                index,
            });
        }

        result
    }

    /// Greedy row building. Returns the origin of the final row, which is
    /// where zero-size items are parked.
    fn squarify(items: &[(usize, f64)], result: &mut Vec<LayoutRect>, container: Rect) -> (f64, f64) {
        let mut remaining = container;
        let mut row_start = 0;
        let mut row_end = 0;

        while row_end < items.len() {
            if row_end == row_start {
                row_end += 1;
                continue;
            }

            let current_worst = Self::worst_aspect_ratio(&items[row_start..row_end], remaining);
            let test_worst = Self::worst_aspect_ratio(&items[row_start..=row_end], remaining);

            if test_worst <= current_worst {
                row_end += 1;
            } else {
                let row = &items[row_start..row_end];
                remaining = Self::layout_row(row, result, remaining, false);
                row_start = row_end;
            }
        }

        let origin = (remaining.x, remaining.y);
        if row_start < items.len() {
            Self::layout_row(&items[row_start..], result, remaining, true);
        }
        origin
    }

    fn worst_aspect_ratio(row: &[(usize, f64)], container: Rect) -> f64 {
        if row.is_empty() {
            return f64::INFINITY;
        }

        let total: f64 = row.iter().map(|(_, size)| size).sum();
        let w = container.short_side();
        let max_size = row.iter().map(|(_, size)| *size).fold(0.0f64, f64::max);
        let min_size = row.iter().map(|(_, size)| *size).fold(f64::INFINITY, f64::min);

        let aspect1 = (w * w * max_size) / (total * total);
        let aspect2 = (total * total) / (w * w * min_size);

        aspect1.max(aspect2)
    }

    /// Lay a row out as a strip along the shorter side of `container` and
    /// return what is left. Wide containers get a column on the left, tall
    /// ones a row on top. The final row takes the full remaining breadth.
    fn layout_row(row: &[(usize, f64)], result: &mut Vec<LayoutRect>, container: Rect, is_last: bool) -> Rect {
        let total: f64 = row.iter().map(|(_, size)| size).sum();

        let vertical_strip = container.width >= container.height;
        let (length, breadth) = if vertical_strip {
            (container.height, container.width)
        } else {
            (container.width, container.height)
        };

        let row_breadth = if is_last {
            breadth
        } else if length > 0.0 {
            (total / length).min(breadth)
        } else {
            0.0
        };

        let mut offset = 0.0f64;

        for (pos, &(index, size)) in row.iter().enumerate() {
            let item_length = if pos + 1 == row.len() {
                length - offset
            } else if total > 0.0 {
                size / total * length
            } else {
                0.0
            };

            let rect = if vertical_strip {
                Rect::new(container.x, container.y + offset, row_breadth, item_length)
            } else {
                Rect::new(container.x + offset, container.y, item_length, row_breadth)
            };

            result.push(LayoutRect { rect, index });
            offset += item_length;
        }

        Self::get_remaining_rect(&container, row_breadth, vertical_strip)
    }

    fn get_remaining_rect(container: &Rect, row_breadth: f64, vertical_strip: bool) -> Rect {
        if vertical_strip {
            Rect::new(
                container.x + row_breadth,
                container.y,
                container.width - row_breadth,
                container.height,
            )
        } else {
            Rect::new(
                container.x,
                container.y + row_breadth,
                container.width,
                container.height - row_breadth,
            )
        }
    }

    /// Degenerate bounds: proportional slices along the longer side, so every
    /// rectangle has zero area but finite coordinates.
    fn slice(weights: &[(usize, f64)], container: Rect) -> Vec<LayoutRect> {
        let total: f64 = weights.iter().map(|(_, w)| w).sum();
        let along_x = container.width >= container.height;
        let length = if along_x { container.width } else { container.height };
        let mut offset = 0.0;

        weights
            .iter()
            .map(|&(index, w)| {
                let item_length = if total > 0.0 { w / total * length } else { 0.0 };
                let rect = if along_x {
                    Rect::new(container.x + offset, container.y, item_length, container.height)
                } else {
                    Rect::new(container.x, container.y + offset, container.width, item_length)
                };
                offset += item_length;
                LayoutRect { rect, index }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn items(sizes: &[u64]) -> Vec<TreemapItem> {
        sizes
            .iter()
            .enumerate()
            .map(|(index, &size)| TreemapItem { size, index })
            .collect()
    }

    fn rect_of(layout: &[LayoutRect], index: usize) -> Rect {
        layout.iter().find(|r| r.index == index).unwrap().rect
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_treemap_basic() {
        let container = Rect::new(0.0, 0.0, 800.0, 600.0);
        let layout = SquarifiedTreemap::layout(&items(&[100, 200, 300]), container);

        assert_eq!(layout.len(), 3);
        // Verify total area is approximately preserved (allowing for floating point errors)
        let total_area: f64 = layout.iter().map(|r| r.rect.area()).sum();
        let ratio = total_area / container.area();
        assert!(ratio > 0.9999 && ratio < 1.0001, "Total area ratio {} should be close to 1.0", ratio);
    }

    #[test]
    fn test_empty_input() {
        assert!(SquarifiedTreemap::layout(&[], Rect::new(0.0, 0.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_single_item_fills_bounds() {
        let container = Rect::new(3.0, 7.0, 120.0, 45.0);
        let layout = SquarifiedTreemap::layout(&items(&[58]), container);
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].rect, container);
    }

    #[test]
    fn test_strip_then_stack() {
        // A directory of 300 next to two 100-byte files in a 20x20 viewport
        let layout = SquarifiedTreemap::layout(&items(&[300, 100, 100]), Rect::new(0.0, 0.0, 20.0, 20.0));

        let a = rect_of(&layout, 0);
        let b = rect_of(&layout, 1);
        let c = rect_of(&layout, 2);

        assert!(approx(a.x, 0.0) && approx(a.y, 0.0));
        assert!(approx(a.width, 12.0) && approx(a.height, 20.0));
        assert!(approx(b.x, 12.0) && approx(b.y, 0.0));
        assert!(approx(b.width, 8.0) && approx(b.height, 10.0));
        assert!(approx(c.x, 12.0) && approx(c.y, 10.0));
        assert!(approx(c.width, 8.0) && approx(c.height, 10.0));
    }

    #[test]
    fn test_sizes_matching_area_give_exact_strips() {
        let layout = SquarifiedTreemap::layout(&items(&[300, 50, 50]), Rect::new(0.0, 0.0, 20.0, 20.0));

        assert_eq!(rect_of(&layout, 0), Rect::new(0.0, 0.0, 15.0, 20.0));
        assert_eq!(rect_of(&layout, 1), Rect::new(15.0, 0.0, 5.0, 10.0));
        assert_eq!(rect_of(&layout, 2), Rect::new(15.0, 10.0, 5.0, 10.0));
    }

    #[test]
    fn test_placement_order_is_descending_and_stable() {
        let layout = SquarifiedTreemap::layout(&items(&[10, 40, 10, 40]), Rect::new(0.0, 0.0, 50.0, 30.0));
        let order: Vec<usize> = layout.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_zero_size_items_do_not_skew_split() {
        let container = Rect::new(0.0, 0.0, 40.0, 10.0);
        let with_zero = SquarifiedTreemap::layout(&items(&[30, 0, 10]), container);
        let without_zero = SquarifiedTreemap::layout(&items(&[30, 10]), container);

        assert!(approx(rect_of(&with_zero, 0).area(), 300.0));
        assert!(approx(rect_of(&with_zero, 2).area(), 100.0));
        assert_eq!(rect_of(&with_zero, 0), rect_of(&without_zero, 0));
        assert_eq!(rect_of(&with_zero, 1).area(), 0.0);
    }

    #[test]
    fn test_all_zero_sizes_share_equally() {
        let container = Rect::new(0.0, 0.0, 30.0, 30.0);
        let layout = SquarifiedTreemap::layout(&items(&[0, 0, 0]), container);
        for entry in &layout {
            assert!(approx(entry.rect.area(), 300.0), "area {}", entry.rect.area());
        }
    }

    #[test]
    fn test_degenerate_bounds_have_finite_coordinates() {
        for container in [Rect::new(5.0, 5.0, 0.0, 100.0), Rect::new(1.0, 2.0, 80.0, 0.0), Rect::new(0.0, 0.0, 0.0, 0.0)] {
            let layout = SquarifiedTreemap::layout(&items(&[5, 3, 0, 9]), container);
            assert_eq!(layout.len(), 4);
            for entry in &layout {
                let r = entry.rect;
                assert!(r.x.is_finite() && r.y.is_finite() && r.width.is_finite() && r.height.is_finite());
                assert!(r.area().abs() < EPS);
            }
        }
    }

    #[test]
    fn test_half_open_containment() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(r.contains(0.0, 0.0));
        assert!(r.contains(9.99, 5.0));
        assert!(!r.contains(10.0, 5.0));
        assert!(!Rect::new(0.0, 0.0, 0.0, 0.0).contains(0.0, 0.0));
    }
}
