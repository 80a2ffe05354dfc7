use anyhow::Result;

use alchemist_engine::transform;

/// Execute the `transforms` command: list registered transform names.
pub fn execute() -> Result<()> {
    for t in transform::registered() {
        println!("  {:14} {}", t.id(), t.description());
    }
    Ok(())
}
