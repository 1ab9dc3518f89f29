//! Legends Demo
//!
//! Seeds a small world with villages, a bandit warband and a wandering hero,
//! then steps it forward and prints the chronicle of what happened.

use chronicle_core::{Grid, SimRng, Terrain, ValueMap, World};
use chronicle_engine::HistoryEngine;
use chronicle_path::{CostGrid, Heuristic, PathOptions, Pathfinder};
use chronicle_script::{DefFactory, DefinitionStore, Loader, ThingFactory};
use std::sync::Arc;

const THINGS: &str = r#"
(
    things: [
        (
            name: "settlement",
            kind: Site,
            default_attributes: [("Population", "rand(60, 140)"), ("Wealth", "rand(5, 20)")],
        ),
        (
            name: "village",
            kind: Site,
            extends: "settlement",
            max_events: "2",
        ),
        (
            name: "ruin",
            kind: Site,
            default_attributes: [("Population", "0")],
        ),
        (
            name: "bandits",
            kind: Unit,
            land_speed: "2",
            water_speed: "1",
            default_attributes: [("Strength", "rand(8, 16)")],
        ),
        (
            name: "hero",
            kind: NotablePerson,
            land_speed: "3",
            water_speed: "1",
            default_attributes: [("Renown", "0")],
        ),
    ]
)
"#;

const EVENTS: &str = r#"
(
    events: [
        (
            name: "bandit_raid",
            subject: (kind: Site, definitions: ["settlement"],
                      condition: "Subject->Population > 30"),
            chance: "55",
            description: "Bandits raided a settlement of {Subject->Population} souls",
            objects: {
                "Raiders": (kind: Unit, distance: 4, definitions: ["bandits"]),
            },
            results: [
                (
                    chance: "70",
                    effects: [
                        (title: "Raided", description: "Homes burned and stores plundered",
                         attribute: "Population", magnitude: "-rand(5, 20)", duration: "6"),
                        (title: "Plunder", attribute: "Strength", magnitude: "2",
                         applied_to: ["Raiders"]),
                    ],
                ),
                (
                    default: true,
                    effects: [
                        (title: "Repelled", description: "The walls held",
                         attribute: "Wealth", magnitude: "-1", duration: "3"),
                    ],
                ),
            ],
        ),
        (
            name: "village_collapse",
            subject: (kind: Site, definitions: ["settlement"],
                      condition: "Subject->Population < 25"),
            chance: "80",
            description: "A dwindling settlement was abandoned to the crows",
            results: [
                (
                    default: true,
                    destroys: ["Subject"],
                    spawns: [(definition: "ruin",
                              position: RelativeToSubject(dx: "0", dy: "0"))],
                ),
            ],
        ),
        (
            name: "hero_sets_out",
            subject: (kind: NotablePerson, condition: "Subject->Renown < 10"),
            chance: "60",
            description: "The hero set out toward a troubled settlement",
            objects: {
                "Destination": (kind: Site, distance: 12, definitions: ["settlement"]),
            },
            results: [
                (
                    default: true,
                    effects: [(title: "Resolve", attribute: "Renown", magnitude: "1")],
                    moves: [(target: Role("Destination"))],
                ),
            ],
        ),
        (
            name: "bandits_prowl",
            subject: (kind: Unit, definitions: ["bandits"]),
            chance: "40",
            triggered_while_moving: true,
            description: "The warband prowled for fresh prey",
            results: [
                (
                    default: true,
                    moves: [(target: Coords(x: "rand(0, 11)", y: "rand(0, 7)"))],
                ),
            ],
        ),
    ]
)
"#;

fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("legends=info,chronicle_engine=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("=== Chronicle Legends Demo ===\n");

    let mut loader = Loader::new();
    loader.load_things_str(THINGS).expect("things parse");
    loader.load_events_str(EVENTS).expect("events parse");
    let store = DefinitionStore::compile(&loader.finish()).expect("definitions compile");

    // a 12x8 world with a river running north-south at x=6
    let mut grid = Grid::new(12, 8);
    let plains = Arc::new(Terrain::land("plains", 1.0));
    let river = Arc::new(Terrain::water("river", 2.0));
    for x in 0..12 {
        for y in 0..8 {
            let terrain = if x == 6 { river.clone() } else { plains.clone() };
            grid.set_terrain(x, y, terrain);
        }
    }

    let factory = DefFactory::new(&store);
    let globals = ValueMap::new();
    let mut rng = SimRng::new(42);
    for (definition, x, y) in [
        ("village", 2, 2),
        ("village", 9, 5),
        ("village", 4, 6),
        ("bandits", 5, 3),
        ("hero", 0, 0),
    ] {
        let thing = factory
            .create(&mut rng, 0, &globals, x, y, definition)
            .expect("seed thing");
        println!(
            "  seeded {} {} at ({}, {})",
            thing.definition, thing.id, thing.x, thing.y
        );
        grid.place(thing);
    }

    // a road survey across the river, courtesy of the pathfinder
    let costs = CostGrid::from_world_grid(&grid);
    let mut finder = Pathfinder::new();
    let options = PathOptions {
        heuristic: Heuristic::Manhattan,
        water_cost_ratio: 3.0,
        tie_break: true,
        ..PathOptions::default()
    };
    match finder.find_path(&costs, (2, 2), (9, 5), &options) {
        Some(path) => println!("\n  road survey (2,2) -> (9,5): {} squares\n", path.len()),
        None => println!("\n  road survey found no crossing\n"),
    }

    let engine = HistoryEngine::new(&store, &factory);
    let mut world = World::new(42, grid);

    for _ in 0..12 {
        world = engine.step(&world);
        println!("-- step {} --", world.step);
        if world.occurred.is_empty() {
            println!("   (a quiet step)");
        }
        for event in &world.occurred {
            println!("   [{}] {}", event.event, event.description);
        }
    }

    println!("\n=== survivors at step {} ===", world.step);
    for thing in world.grid.things() {
        println!(
            "  {} {} at ({}, {}): {}",
            thing.definition,
            thing.id,
            thing.x,
            thing.y,
            thing
                .attributes
                .keys()
                .map(|attr| format!(
                    "{}={}",
                    attr,
                    thing.effective_attribute(attr, world.step)
                ))
                .collect::<Vec<_>>()
                .join(", "),
        );
    }
}
