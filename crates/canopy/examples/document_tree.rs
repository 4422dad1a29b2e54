//! Document tree example.
//!
//! Builds a small styled document where many glyphs share a handful of
//! styles, walks it in every order and prints the metrics.

use anyhow::Result;
use canopy::prelude::*;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let canopy = Canopy::builder()
        .retention(RetentionPolicy::EvictUnreferenced)
        .build();

    // Three requests, two distinct styles
    let bold = canopy.intern(&RawState::tag("bold"))?;
    let italic = canopy.intern(&RawState::tag("italic"))?;
    let bold_again = canopy.intern(&RawState::tag("bold"))?;
    println!("interned 3 requests into {} states", canopy.stats().states);
    println!("bold handles identical: {}", bold.ptr_eq(&bold_again));

    // Root -> [Leaf(bold), C -> [Leaf(italic)]]
    let tree = canopy.new_tree();
    let root = tree.create_container(Extrinsic::new().with("name", "root"))?;
    tree.set_root(root)?;
    tree.insert_leaf(root, bold, Extrinsic::new().with("x", 0), None)?;
    let c = tree.insert_container(root, Extrinsic::new().with("name", "C"), None)?;
    tree.insert_leaf(c, italic, Extrinsic::new().with("x", 1), None)?;

    let snapshot = tree.snapshot();
    for order in [Order::PreOrder, Order::PostOrder, Order::LevelOrder] {
        let labels: Vec<String> = snapshot
            .traverse(order)
            .filter_map(|id| snapshot.node(id).ok().map(label))
            .collect();
        println!("{order:?}: {}", labels.join(", "));
    }
    drop(snapshot);

    // A paragraph of glyphs cycling through the two styles
    let paragraph = tree.insert_container(root, Extrinsic::new().with("name", "P"), None)?;
    for x in 0..100 {
        let tag = if x % 3 == 0 { "italic" } else { "bold" };
        let style = canopy.intern(&RawState::tag(tag))?;
        tree.insert_leaf(paragraph, style, Extrinsic::new().with("x", x), None)?;
    }

    let metrics = canopy.metrics(&tree);
    println!("\nmetrics: {}", serde_json::to_string_pretty(&metrics)?);

    // Removing the paragraph leaves the shared styles alone; both remain in use
    let removed = tree.remove_subtree(paragraph)?;
    println!("removed {removed} nodes, {} states remain", canopy.stats().states);

    // Removing everything releases them
    tree.remove_subtree(root)?;
    println!("empty tree depth: {}", canopy.metrics(&tree).depth);
    println!("states after clearing: {}", canopy.stats().states);

    Ok(())
}

fn label(node: &Node) -> String {
    match node.kind() {
        NodeKind::Leaf { state } => format!("Leaf({})", state.get("tag").unwrap_or("?")),
        NodeKind::Container { .. } => node
            .extrinsic()
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("container")
            .to_string(),
    }
}
