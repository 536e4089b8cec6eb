//! Idle Economy Example
//!
//! Demonstrates reckon with a small idle game.
//! Gold and wood accumulate every step, an upgrade condition spends gold and
//! raises the production level once, and a goal condition reports when the
//! economy is big enough.

use reckon_core::{ConditionCallback, Number, ValueRegistry};
use reckon_script::Loader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ECONOMY: &str = r#"
(
    config: Some((default_dt: 1.0)),
    values: [
        (id: "level", value: Some(1.0), description: "Production level"),
        (id: "upgrade_cost", expression: Some("(level * 2) ^ 2 / 2")),
        (id: "total", expression: Some("gold + wood")),
    ],
    resources: [
        (id: "gold", delta: "level * 2", amount: 5.0),
        (id: "wood", delta: "1", flat: "min(level, 3)"),
    ],
    conditions: [
        (id: "first_upgrade", expression: Some("gold >= 8")),
        (id: "goal", all: ["gold >= 40", "wood >= 15"]),
    ],
)
"#;

fn spend_on_upgrade(registry: &mut ValueRegistry) -> reckon_core::Result<()> {
    let gold = registry.get("gold")?;
    let cost = registry.get("upgrade_cost")?;
    let level = registry.get("level")?;
    registry.set("gold", gold - cost)?;
    registry.set("level", level + Number::ONE)
}

fn upgrade() -> ConditionCallback {
    Box::new(|registry: &mut ValueRegistry| match spend_on_upgrade(registry) {
        Ok(()) => info!("Upgraded production"),
        Err(e) => warn!("Upgrade failed: {}", e),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    println!("=== Reckon Idle Economy Example ===\n");

    let mut loader = Loader::new();
    loader.load_str(ECONOMY)?;
    let defs = loader.finish();

    let mut registry = defs.build_registry_with(|def| match def.id.as_str() {
        "first_upgrade" => Some(upgrade()),
        "goal" => Some(Box::new(|registry: &mut ValueRegistry| {
            info!("Goal reached at tick {}", registry.clock().tick);
        }) as ConditionCallback),
        _ => None,
    })?;

    println!("Dependencies:");
    for line in registry.dependency_lines() {
        println!("  {}", line);
    }
    println!();

    for _ in 0..20 {
        registry.step()?;
        // Conditions are only checked when read
        registry.get("first_upgrade")?;
        registry.get("goal")?;

        let tick = registry.clock().tick;
        if tick % 5 == 0 {
            println!(
                "Tick {:>2}: gold {:>6} wood {:>6} level {} total {}",
                tick,
                registry.get("gold")?,
                registry.get("wood")?,
                registry.get("level")?,
                registry.get("total")?,
            );
        }
    }

    let stats = registry.stats();
    println!(
        "\n{} evaluations, {} invalidations, {} conditions fired over {} ticks",
        stats.evaluations, stats.invalidations, stats.conditions_fired, stats.ticks
    );

    Ok(())
}
