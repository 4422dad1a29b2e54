//! Export/import round trip example.
//!
//! Exports a tree to JSON, reloads it into a fresh canopy and checks that
//! structure and deduplication survived.

use anyhow::{ensure, Result};
use canopy::prelude::*;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let source = Canopy::new();
    let tree = source.new_tree();
    let root = tree.create_container(Extrinsic::new())?;
    tree.set_root(root)?;

    let styles = [
        RawState::new().field("font", "serif").field("size", "12"),
        RawState::new().field("font", "mono").field("size", "10"),
    ];
    for chapter in 0..3 {
        let section = tree.insert_container(root, Extrinsic::new().with("chapter", chapter), None)?;
        for x in 0..10 {
            let style = source.intern(&styles[x % styles.len()])?;
            tree.insert_leaf(section, style, Extrinsic::new().with("x", x), None)?;
        }
    }

    let doc = source.export(&tree)?;
    let json = doc.to_json()?;
    println!(
        "exported {} nodes with {} states ({} bytes of JSON)",
        tree.len(),
        doc.states.len(),
        json.len()
    );

    let target = Canopy::new();
    let copy = target.import(&json.parse()?)?;

    let before = source.metrics(&tree);
    let after = target.metrics(&copy);
    println!("before: {before:?}");
    println!("after:  {after:?}");

    ensure!(before == after, "metrics changed across the round trip");
    ensure!(
        target.export(&copy)?.shape() == doc.shape(),
        "structure changed across the round trip"
    );
    ensure!(
        target.stats().constructions == styles.len() as u64,
        "import constructed duplicate states"
    );

    println!("round trip preserved structure and deduplication");
    Ok(())
}
