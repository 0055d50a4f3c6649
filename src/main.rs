use std::path::PathBuf;
use std::process;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use body_graph::body::{BodySystem, PrototypeRegistry, SlotRef};
use body_graph::persistence::save_bodies;
use body_graph::{BodyConfig, EntityId, Result};

#[derive(Parser, Debug)]
#[command(name = "body_graph")]
#[command(about = "Build creature bodies from templates and take them apart")]
struct Args {
    /// Body template to spawn the creature with
    #[arg(short, long, default_value = "humanoid")]
    template: String,

    /// Extra prototypes and templates to load (JSON)
    #[arg(long)]
    prototypes: Option<PathBuf>,

    /// Body system configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of random parts to sever from the body
    #[arg(long, default_value = "0")]
    sever: usize,

    /// Random seed for severing (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Gib the creature after severing
    #[arg(long)]
    gib: bool,

    /// Release organs too when gibbing
    #[arg(long)]
    include_organs: bool,

    /// Save the resulting body graph to a JSON file
    #[arg(long)]
    save: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = Args::parse();

    let level = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::fmt().with_max_level(level).with_target(false).init();

    if let Err(err) = run(&args) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => BodyConfig::from_json(path)?,
        None => BodyConfig::default(),
    };

    let mut registry = PrototypeRegistry::builtin();
    if let Some(path) = &args.prototypes {
        registry.load_json_file(path)?;
    }
    if config.validate_templates {
        let issues = registry.report_issues();
        if issues > 0 {
            println!("{} template issue(s) found, see log", issues);
        }
    }
    println!("Templates: {}", registry.template_ids().join(", "));

    let mut system = BodySystem::new(config);
    let creature = system.spawn_creature(&registry, "creature", Some(args.template.as_str()))?;
    if system.body(creature).is_none() {
        println!("Creature {} has no body", creature);
    }

    println!("\nBody of {} ({}):", system.name_of(creature), args.template);
    print_body(&system, creature);

    if args.sever > 0 {
        let seed = args.seed.unwrap_or_else(rand::random);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        info!(seed, count = args.sever, "severing parts");

        println!("\nSevering {} part(s) with seed {}:", args.sever, seed);
        for _ in 0..args.sever {
            let Some(root) = system.root_part(creature) else { break };
            let Some(target) = system.pick_target_part(root, &mut rng) else { break };
            let Some(slot) = system.part(target).and_then(|p| p.parent_slot.clone()) else { break };
            let freed = system.detach_part(&slot)?;
            let carried = system.children(freed).count();
            println!("  {} severed at '{}' (+{} attached)", system.name_of(freed), slot.id, carried);
        }
        println!("\nRemaining body:");
        print_body(&system, creature);
    }

    if args.gib {
        let result = system.gib(creature, args.include_organs)?;
        println!(
            "\nGibbed {} part(s) and {} organ(s), sound: {}",
            result.parts.len(),
            result.organs.len(),
            result.sound.as_deref().unwrap_or("none"),
        );
        for id in result.all() {
            println!("  {} {}", id, system.name_of(id));
        }
    }

    if let Some(path) = &args.save {
        save_bodies(&system, path)?;
        println!("\nSaved body graph to {}", path.display());
    }

    Ok(())
}

/// Print the slot tree of a creature's body with organs under each part.
fn print_body(system: &BodySystem, creature: EntityId) {
    match system.body(creature).and_then(|b| b.root.as_ref()) {
        Some(root) => print_slot(system, &root.slot_ref(), 1),
        None => println!("  (no body)"),
    }
}

fn print_slot(system: &BodySystem, slot: &SlotRef, depth: usize) {
    let indent = "  ".repeat(depth);
    let Some(part_slot) = system.slot(slot) else { return };
    let Some(part_id) = part_slot.child else {
        println!("{}[{}] (empty {})", indent, slot.id, part_slot.category.display_name());
        return;
    };

    let Some(part) = system.part(part_id) else { return };
    println!(
        "{}[{}] {} ({}, {})",
        indent,
        slot.id,
        system.name_of(part_id),
        part.category.display_name(),
        part.size.display_name(),
    );
    for organ_slot in &part.organs {
        match organ_slot.organ {
            Some(organ) => println!("{}  * {}", indent, system.name_of(organ)),
            None => println!("{}  * (empty {})", indent, organ_slot.kind.display_name()),
        }
    }
    for child in &part.slots {
        print_slot(system, &child.slot_ref(), depth + 1);
    }
}
