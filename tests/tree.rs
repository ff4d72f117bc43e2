use proptest::prelude::*;
use tiny_rope::tree::*;
use tiny_rope::{RopeError, TreeConfig};

/// Walk the tree and check every cached sum against its content
fn check_sums(node: &Node) -> Sums {
    match node {
        Node::Leaf { bytes, sums } => {
            assert!(!bytes.is_empty(), "empty leaf left in tree");
            let lines = bytes.iter().filter(|&&b| b == b'\n').count();
            assert_eq!(*sums, Sums { bytes: bytes.len(), lines });
            *sums
        }
        Node::Internal { left, right, sums } => {
            let computed = check_sums(left) + check_sums(right);
            assert_eq!(*sums, computed);
            computed
        }
    }
}

fn check_tree(tree: &Tree) {
    if let Some(root) = tree.root() {
        check_sums(root);
    }
}

fn small(max_leaf_size: usize) -> TreeConfig {
    TreeConfig::with_max_leaf_size(max_leaf_size)
}

#[test]
fn test_round_trip_text() {
    let text = b"Hello\nWorld\n!";
    let tree = Tree::from_text(text);
    assert_eq!(tree.to_text(), text);
    assert_eq!(tree.len(), 13);
    assert_eq!(tree.line_count(), 2);
}

#[test]
fn test_get_line_example() {
    let tree = Tree::from_text(b"a\nbb\nccc");
    assert_eq!(tree.get_line(0).unwrap(), b"a");
    assert_eq!(tree.get_line(1).unwrap(), b"bb");
    assert_eq!(tree.get_line(2).unwrap(), b"ccc");
    assert_eq!(tree.get_line(3), None);
}

#[test]
fn test_offset_for_line() {
    let tree = Tree::from_text(b"Line 1\nLine 2\nLine 3\n");
    assert_eq!(tree.get_offset_for_line(0), Some(0));
    assert_eq!(tree.get_offset_for_line(1), Some(7));
    assert_eq!(tree.get_offset_for_line(2), Some(14));
    assert_eq!(tree.get_offset_for_line(3), Some(21));
    assert_eq!(tree.get_offset_for_line(4), None);
}

#[test]
fn test_text_range() {
    let tree = Tree::from_text(b"0123456789");
    assert_eq!(tree.get_text_range(3, 4).unwrap(), b"3456");
    assert_eq!(tree.get_text_range(0, 10).unwrap(), b"0123456789");
    assert_eq!(tree.get_text_range(8, 3), None);
    assert_eq!(tree.get_text_range(0, 0), None);
}

#[test]
fn test_insert_and_erase() {
    let mut tree = Tree::from_text(b"Hello World");
    tree.insert(5, b",").unwrap();
    assert_eq!(tree.to_text(), b"Hello, World");
    tree.insert(12, b"!\n").unwrap();
    assert_eq!(tree.to_text(), b"Hello, World!\n");
    assert_eq!(tree.line_count(), 1);

    tree.erase(0, 7).unwrap();
    assert_eq!(tree.to_text(), b"World!\n");
    tree.erase(0, 7).unwrap();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
}

#[test]
fn test_insert_into_empty_tree() {
    let mut tree = Tree::new();
    tree.insert(0, b"abc").unwrap();
    assert_eq!(tree.to_text(), b"abc");
    assert!(tree.root().unwrap().is_leaf());
}

#[test]
fn test_out_of_bounds_edits_fail() {
    let mut tree = Tree::from_text(b"abc");
    assert!(matches!(
        tree.insert(4, b"x"),
        Err(RopeError::OutOfBounds { pos: 4, len: 1, total: 3 })
    ));
    assert!(matches!(tree.erase(2, 2), Err(RopeError::OutOfBounds { .. })));
    assert!(matches!(tree.erase(usize::MAX, 2), Err(RopeError::OutOfBounds { .. })));
    assert_eq!(tree.to_text(), b"abc");

    let mut empty = Tree::new();
    assert!(empty.insert(1, b"x").is_err());
    assert!(empty.erase(0, 1).is_err());
    assert!(empty.erase(0, 0).is_ok());
}

#[test]
fn test_erase_across_many_leaves_collapses() {
    let text: Vec<u8> = (0..200u8).map(|i| b'a' + i % 26).collect();
    let mut tree = Tree::from_text_with_config(&text, small(8));
    let before = tree.leaf_count();
    tree.erase(4, 190).unwrap();

    let mut expected = text.clone();
    expected.drain(4..194);
    assert_eq!(tree.to_text(), expected);
    assert!(tree.leaf_count() < before);
    assert!(tree.leaf_count() <= 2);
    check_tree(&tree);
}

#[test]
fn test_many_small_inserts_keep_leaves_bounded() {
    let mut tree = Tree::with_config(small(16));
    let mut model = Vec::new();
    for i in 0..500usize {
        let pos = (i * 7) % (model.len() + 1);
        let data = if i % 5 == 0 { &b"\n"[..] } else { &b"xy"[..] };
        tree.insert(pos, data).unwrap();
        model.splice(pos..pos, data.iter().copied());
    }
    assert_eq!(tree.to_text(), model);
    assert!(tree.chunks().all(|chunk| chunk.len() <= 16));
    check_tree(&tree);
}

#[test]
fn test_search_examples() {
    let tree = Tree::from_text(b"abcabcabc");
    assert_eq!(tree.find_substring(b"cabc"), Some(2));
    assert_eq!(tree.find_substring(b"zzz"), None);

    let tree = Tree::from_text_with_config(b"first\nsecond needle\nthird", small(4));
    assert_eq!(tree.find_substring(b"needle"), Some(13));
    assert_eq!(tree.find_substring_line(b"needle"), Some(1));
    assert_eq!(tree.find_all(b"ir"), vec![1, 22]);
}

#[test]
fn test_large_text_round_trip() {
    let line = b"the quick brown fox jumps over the lazy dog\n";
    let text = line.repeat(2500);
    let tree = Tree::from_text(&text);
    assert_eq!(tree.to_text(), text);
    assert_eq!(tree.line_count(), 2500);
    assert_eq!(tree.get_line(1234).unwrap(), &line[..line.len() - 1]);
    assert_eq!(tree.get_offset_for_line(100), Some(100 * line.len()));
    check_tree(&tree);
}

#[test]
fn test_deep_chain_drops_without_overflow() {
    // Left-leaning chain far deeper than any built tree
    let mut node = Node::leaf(b"x".to_vec());
    for _ in 0..100_000 {
        node = Node::internal(node, Node::leaf(b"y".to_vec()));
    }
    let mut tree = Tree::new();
    tree.set_root(Some(node));
    assert_eq!(tree.len(), 100_001);
    assert_eq!(tree.leaf_count(), 100_001);
    assert_eq!(tree.depth(), 100_001);
    assert_eq!(tree.get_text_range(99_999, 2).unwrap(), b"yy");
    drop(tree);
}

#[test]
fn test_deep_chain_edits_without_overflow() {
    let mut node = Node::leaf(b"x".to_vec());
    for _ in 0..100_000 {
        node = Node::internal(node, Node::leaf(b"y".to_vec()));
    }
    let mut tree = Tree::new();
    tree.set_root(Some(node));

    // Both edits land at the bottom of the left spine
    tree.insert(0, b"z").unwrap();
    assert_eq!(tree.len(), 100_002);
    assert_eq!(tree.get_text_range(0, 3).unwrap(), b"zxy");

    tree.erase(0, 2).unwrap();
    assert_eq!(tree.len(), 100_000);
    assert_eq!(tree.get_text_range(0, 2).unwrap(), b"yy");

    // A range spanning the whole spine
    tree.erase(1, 99_998).unwrap();
    assert_eq!(tree.to_text(), b"yy");
}

#[test]
fn test_embedded_zero_bytes_round_trip() {
    let text = b"a\0b\n\0\0c".repeat(3000);
    let mut tree = Tree::from_text_with_config(&text, small(7));
    assert_eq!(tree.to_text(), text);
    assert_eq!(tree.line_count(), 3000);
    assert_eq!(tree.get_line(1).unwrap(), b"\0\0ca\0b");
    assert_eq!(tree.find_substring(b"\0\0c"), Some(4));

    tree.insert(1, b"\0\0").unwrap();
    assert_eq!(tree.get_text_range(0, 5).unwrap(), b"a\0\0\0b");
}

#[test]
fn test_take_root_detaches() {
    let mut tree = Tree::from_text(b"abc");
    let root = tree.take_root().unwrap();
    assert!(tree.is_empty());
    assert_eq!(root.byte_count(), 3);
}

#[derive(Debug, Clone)]
enum Edit {
    Insert(usize, Vec<u8>),
    Erase(usize, usize),
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<usize>(), prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'\n', 0u8]), 1..12))
            .prop_map(|(pos, data)| Edit::Insert(pos, data)),
        (any::<usize>(), 0usize..20).prop_map(|(pos, len)| Edit::Erase(pos, len)),
    ]
}

proptest! {
    #[test]
    fn prop_edits_match_vec_model(
        initial in prop::collection::vec(prop::sample::select(vec![b'x', b'\n', 0u8]), 0..64),
        edits in prop::collection::vec(edit_strategy(), 0..40),
        max_leaf_size in 1usize..8,
    ) {
        let mut tree = Tree::from_text_with_config(&initial, small(max_leaf_size));
        let mut model = initial.clone();

        for edit in edits {
            match edit {
                Edit::Insert(pos, data) => {
                    let pos = pos % (model.len() + 1);
                    tree.insert(pos, &data).unwrap();
                    model.splice(pos..pos, data);
                }
                Edit::Erase(pos, len) => {
                    let pos = pos % (model.len() + 1);
                    let len = len.min(model.len() - pos);
                    tree.erase(pos, len).unwrap();
                    model.drain(pos..pos + len);
                }
            }
            prop_assert_eq!(&tree.to_text(), &model);
        }

        prop_assert_eq!(tree.to_text(), model.clone());
        let newlines = model.iter().filter(|&&b| b == b'\n').count();
        prop_assert_eq!(tree.line_count(), newlines);
        prop_assert!(tree.chunks().all(|chunk| chunk.len() <= max_leaf_size));
        check_tree(&tree);

        let expected_lines: Vec<&[u8]> = model.split(|&b| b == b'\n').collect();
        if model.is_empty() {
            prop_assert_eq!(tree.get_line(0), None);
        } else {
            for (i, line) in expected_lines.iter().enumerate() {
                prop_assert_eq!(tree.get_line(i).unwrap(), line.to_vec());
            }
        }
    }

    #[test]
    fn prop_find_matches_naive_search(
        text in prop::collection::vec(prop::sample::select(vec![b'a', b'b']), 0..80),
        pattern in prop::collection::vec(prop::sample::select(vec![b'a', b'b']), 1..5),
    ) {
        let tree = Tree::from_text_with_config(&text, small(3));
        let naive = text.windows(pattern.len()).position(|w| w == pattern.as_slice());
        prop_assert_eq!(tree.find_substring(&pattern), naive);
    }
}
