use indextree::NodeId;

use crate::tree::{FileTree, NodeKind};

pub fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if size >= TB {
        format!("{:.2} TB", size as f64 / TB as f64)
    } else if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} B", size)
    }
}

/// Short label for a node: `(file, 1.00 KB)` or `(folder, 3 items, 2.50 MB)`.
pub fn describe(tree: &FileTree, node: NodeId) -> String {
    let Some(n) = tree.get(node) else {
        return String::new();
    };
    match n.kind {
        NodeKind::File => format!("(file, {})", format_size(n.size)),
        NodeKind::Directory => {
            let items = tree.children(node).count();
            let noun = if items == 1 { "item" } else { "items" };
            format!("(folder, {} {}, {})", items, noun, format_size(n.size))
        }
    }
}

/// Fill colour of a treemap tile. Directories are grey, lighter the deeper
/// they sit. Files get a colour derived from their name, kept off the grey
/// scale so they never look like directories.
pub fn tile_rgb(kind: NodeKind, depth: usize, name: &str) -> (u8, u8, u8) {
    match kind {
        NodeKind::Directory => {
            let shade = (40 + 30 * depth).min(200) as u8;
            (shade, shade, shade)
        }
        NodeKind::File => {
            // FNV-1a
            let hash = name.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            });
            let mut rgb = [(hash >> 16) as u8, (hash >> 24) as u8, (hash >> 32) as u8];
            let avg = rgb.iter().map(|&c| c as i32).sum::<i32>() / 3;
            if rgb.iter().all(|&c| (c as i32 - avg).abs() < 20) {
                let pushed = if avg >= 128 { avg - 60 } else { avg + 60 };
                rgb[2] = pushed.clamp(0, 255) as u8;
            }
            (rgb[0], rgb[1], rgb[2])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Snapshot;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024 / 2), "2.50 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024 * 1024), "3.00 TB");
    }

    #[test]
    fn test_describe() {
        let tree = FileTree::from_snapshot(
            "/r",
            Snapshot::dir(
                "r",
                vec![
                    Snapshot::file("a", 1024),
                    Snapshot::file("b", 1024),
                    Snapshot::dir("empty", vec![]),
                ],
            ),
        );
        let root = tree.get_root();
        assert_eq!(describe(&tree, root), "(folder, 3 items, 2.00 KB)");
        let a = tree.node_at(&["a"]).unwrap();
        assert_eq!(describe(&tree, a), "(file, 1.00 KB)");
        let empty = tree.node_at(&["empty"]).unwrap();
        assert_eq!(describe(&tree, empty), "(folder, 0 items, 0 B)");
    }

    #[test]
    fn test_tile_rgb() {
        assert_eq!(tile_rgb(NodeKind::Directory, 0, "x"), (40, 40, 40));
        assert_eq!(tile_rgb(NodeKind::Directory, 10, "x"), (200, 200, 200));
        assert_eq!(tile_rgb(NodeKind::File, 3, "a.txt"), tile_rgb(NodeKind::File, 0, "a.txt"));

        let names = ["a", "b.rs", "notes.md", "IMG_0001.jpg", "Cargo.toml"]
            .into_iter()
            .map(String::from)
            .chain((0..20_000).map(|i| format!("file_{}.bin", i)));
        for name in names {
            let (r, g, b) = tile_rgb(NodeKind::File, 0, &name);
            let avg = (r as i32 + g as i32 + b as i32) / 3;
            let grey = [r, g, b].iter().all(|&c| (c as i32 - avg).abs() < 20);
            assert!(!grey, "{} -> {:?}", name, (r, g, b));
        }
    }
}
