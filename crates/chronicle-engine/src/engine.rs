//! The history generation engine
//!
//! One call to [`HistoryEngine::step`] advances the world by one step:
//! every entity is visited in grid-scan order, matching events are
//! discovered and applied against staged copies, movement executes, and the
//! survivors are committed into a brand-new world snapshot. A single
//! entity's or event's failure is logged and contained; it never aborts the
//! rest of the step.

use crate::staging::StagingArea;
use chronicle_core::{
    AttributeEffect, EvalScope, MoveState, OccurredEvent, SimRng, Stage, Thing, ThingId,
    ThingKind, Value, ValueMap, World,
};
use chronicle_path::{resolve_movement, CostGrid, MoverProfile};
use chronicle_script::{
    CompiledEventDef, CompiledMoveTarget, CompiledResultDef, CompiledSpawnPosition,
    DefinitionStore, Result as ScriptResult, ThingFactory,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Role name that always refers to the event's subject
const SUBJECT_ROLE: &str = "Subject";

/// Resolved object roles: role name to staged identity, `None` for
/// unresolved optional roles
type ResolvedRoles = IndexMap<String, Option<ThingId>>;

/// Snapshots of the subject and roles taken for expression evaluation
type RoleSnapshots = Vec<(String, Option<Thing>)>;

/// The step function over a compiled definition store and a thing factory
pub struct HistoryEngine<'a> {
    store: &'a DefinitionStore,
    factory: &'a dyn ThingFactory,
}

impl<'a> HistoryEngine<'a> {
    /// Create an engine over its collaborators
    pub fn new(store: &'a DefinitionStore, factory: &'a dyn ThingFactory) -> Self {
        Self { store, factory }
    }

    /// Advance the world by one step, producing the next snapshot
    ///
    /// The input world is never mutated; rerunning the same input yields a
    /// bit-identical output.
    pub fn step(&self, world: &World) -> World {
        let next_step = world.step + 1;
        let globals = step_globals(world, next_step);
        let mut staging = StagingArea::new();
        let mut occurred = Vec::new();

        // grid-scan order drives RNG derivation order and must stay stable
        let subject_ids: Vec<ThingId> = world.grid.things().map(|t| t.id).collect();
        for id in subject_ids {
            if staging.is_destroyed(id) {
                continue;
            }
            let mut rng = SimRng::for_thing(world.seed, world.step, id, Stage::Events);
            self.run_entity(world, &mut staging, &mut occurred, &globals, id, next_step, &mut rng);
        }

        self.run_movement(world, &mut staging, &globals, next_step);

        let mut next_grid = world.grid.clone_without_things();
        for thing in staging.into_surviving() {
            next_grid.place(thing);
        }

        debug!(step = next_step, events = occurred.len(), "step complete");
        World {
            seed: world.seed,
            step: next_step,
            grid: next_grid,
            occurred,
        }
    }

    /// Discover and apply events for one entity
    #[allow(clippy::too_many_arguments)]
    fn run_entity(
        &self,
        world: &World,
        staging: &mut StagingArea,
        occurred: &mut Vec<OccurredEvent>,
        globals: &ValueMap,
        id: ThingId,
        next_step: u64,
        rng: &mut SimRng,
    ) {
        if staging.get_or_stage(world, id, next_step).is_none() {
            return;
        }
        let (subject_kind, subject_def) = {
            let thing = match staging.alive(id) {
                Some(t) => t,
                None => return,
            };
            (thing.kind, thing.definition.clone())
        };

        let max_events = self.eval_max_events(staging, globals, id, &subject_def, next_step, rng);
        // one shared threshold per entity per step keeps frequency fair
        // across many competing event definitions
        let min_chance = rng.next_chance();

        let mut events: Vec<Arc<CompiledEventDef>> =
            self.store.events_for_subject(subject_kind).to_vec();
        rng.shuffle(&mut events);

        let mut taken = 0i64;
        for event in events {
            if taken >= max_events {
                break;
            }
            if staging.is_destroyed(id) {
                break;
            }

            let subject = match staging.alive(id) {
                Some(t) => t.clone(),
                None => break,
            };
            if !subject.movement.is_idle() && !event.triggered_while_moving {
                continue;
            }
            if !self
                .store
                .definition_matches(subject_def.as_str(), &event.subject_definitions)
            {
                continue;
            }

            {
                let mut scope =
                    EvalScope::new(&mut *rng, next_step, globals).bind(SUBJECT_ROLE, &subject);
                match event.eval_subject_condition(&mut scope) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        warn!(error = %e, "subject condition failed; skipping event");
                        continue;
                    }
                }
            }

            let roles = match self.resolve_objects(
                world, staging, globals, &event, id, &subject, next_step, rng,
            ) {
                Some(roles) => roles,
                None => continue,
            };

            let chance = {
                let snapshots = role_snapshots(staging, &roles);
                let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
                match event.eval_chance(&mut scope) {
                    Ok(chance) => chance,
                    Err(e) => {
                        warn!(error = %e, "chance evaluation failed; skipping event");
                        continue;
                    }
                }
            };
            if chance < min_chance {
                continue;
            }

            taken += 1;
            if let Some(record) =
                self.apply_event(world, staging, globals, &event, id, &roles, next_step, rng)
            {
                occurred.push(record);
            }
        }
    }

    fn eval_max_events(
        &self,
        staging: &StagingArea,
        globals: &ValueMap,
        id: ThingId,
        subject_def: &chronicle_core::DefName,
        next_step: u64,
        rng: &mut SimRng,
    ) -> i64 {
        let def = match self.store.thing_def(subject_def.as_str()) {
            Some(def) => def,
            None => return 1,
        };
        let subject = match staging.thing(id) {
            Some(t) => t.clone(),
            None => return 1,
        };
        let mut scope = EvalScope::new(&mut *rng, next_step, globals).bind(SUBJECT_ROLE, &subject);
        match def.eval_max_events(&mut scope) {
            Ok(n) => n.max(0),
            Err(e) => {
                warn!(error = %e, "max_events evaluation failed; defaulting to 1");
                1
            }
        }
    }

    /// Resolve an event's object roles around the subject
    ///
    /// Returns `None` when a required role cannot be satisfied, discarding
    /// the occurrence.
    #[allow(clippy::too_many_arguments)]
    fn resolve_objects(
        &self,
        world: &World,
        staging: &mut StagingArea,
        globals: &ValueMap,
        event: &CompiledEventDef,
        subject_id: ThingId,
        subject: &Thing,
        next_step: u64,
        rng: &mut SimRng,
    ) -> Option<ResolvedRoles> {
        let mut resolved = ResolvedRoles::new();
        let mut resolved_snapshots: Vec<(String, Thing)> = Vec::new();

        for (role, object) in &event.objects {
            let mut squares = world
                .grid
                .squares_within(subject.x, subject.y, object.distance);
            rng.shuffle(&mut squares);

            let mut found = None;
            'search: for (sx, sy) in squares {
                let candidate_ids: Vec<ThingId> =
                    world.grid.square(sx, sy).things.iter().map(|t| t.id).collect();
                for cid in candidate_ids {
                    if cid == subject_id || staging.is_destroyed(cid) {
                        continue;
                    }
                    if staging.get_or_stage(world, cid, next_step).is_none() {
                        continue;
                    }
                    let candidate = match staging.alive(cid) {
                        Some(c) => c,
                        None => continue,
                    };
                    if candidate.kind != object.kind {
                        continue;
                    }
                    if !self
                        .store
                        .definition_matches(candidate.definition.as_str(), &object.definitions)
                    {
                        continue;
                    }

                    let candidate = candidate.clone();
                    let mut scope =
                        EvalScope::new(&mut *rng, next_step, globals).bind(SUBJECT_ROLE, subject);
                    for (name, snapshot) in &resolved_snapshots {
                        scope = scope.bind(name.clone(), snapshot);
                    }
                    scope = scope.bind(role.clone(), &candidate);
                    match object.eval_condition(&mut scope) {
                        Ok(true) => {
                            found = Some(cid);
                            drop(scope);
                            resolved_snapshots.push((role.clone(), candidate));
                            break 'search;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(error = %e, "object condition failed; candidate skipped");
                        }
                    }
                }
            }

            match found {
                Some(cid) => {
                    resolved.insert(role.clone(), Some(cid));
                }
                None if object.optional => {
                    resolved.insert(role.clone(), None);
                }
                None => {
                    warn!(
                        event = %event.name,
                        subject = %subject_id,
                        role = %role,
                        "required object role unresolved; occurrence dropped"
                    );
                    return None;
                }
            }
        }
        Some(resolved)
    }

    /// Pick and apply one result of an occurring event
    #[allow(clippy::too_many_arguments)]
    fn apply_event(
        &self,
        world: &World,
        staging: &mut StagingArea,
        globals: &ValueMap,
        event: &CompiledEventDef,
        subject_id: ThingId,
        roles: &ResolvedRoles,
        next_step: u64,
        rng: &mut SimRng,
    ) -> Option<OccurredEvent> {
        let subject = staging.alive(subject_id)?.clone();

        // fresh threshold per occurrence, results considered in shuffled order
        let threshold = rng.next_chance();
        let mut order: Vec<usize> = (0..event.results.len()).collect();
        rng.shuffle(&mut order);

        let mut chosen = None;
        for index in order {
            let snapshots = role_snapshots(staging, roles);
            let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
            match event.results[index].eval_chance(&mut scope) {
                Ok(chance) if chance >= threshold => {
                    chosen = Some(index);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "result chance failed; result skipped");
                }
            }
        }
        let chosen = chosen.or_else(|| event.results.iter().position(|r| r.default));
        let index = match chosen {
            Some(index) => index,
            None => {
                // never throws: an occurrence with no applicable result is
                // logged and dropped
                warn!(
                    event = %event.name,
                    subject = %subject_id,
                    "no result passed and none is default; occurrence discarded"
                );
                return None;
            }
        };

        if let Err(e) = self.apply_result(
            world,
            staging,
            globals,
            &event.results[index],
            subject_id,
            roles,
            next_step,
            rng,
        ) {
            warn!(error = %e, event = %event.name, "result application aborted");
        }

        // description reflects the post-application state
        let description = {
            let subject = staging.thing(subject_id).cloned().unwrap_or(subject);
            let snapshots = role_snapshots(staging, roles);
            let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
            match event.eval_description(&mut scope) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "description evaluation failed");
                    String::new()
                }
            }
        };

        let objects: IndexMap<String, ThingId> = roles
            .iter()
            .filter_map(|(role, id)| id.map(|id| (role.clone(), id)))
            .collect();
        Some(OccurredEvent {
            event: event.name.clone(),
            subject: subject_id,
            objects,
            result: index,
            description,
        })
    }

    /// Apply one chosen result's effects, spawns, destroys and moves
    ///
    /// An evaluation failure aborts the remainder of this event's
    /// application only.
    #[allow(clippy::too_many_arguments)]
    fn apply_result(
        &self,
        world: &World,
        staging: &mut StagingArea,
        globals: &ValueMap,
        result: &CompiledResultDef,
        subject_id: ThingId,
        roles: &ResolvedRoles,
        next_step: u64,
        rng: &mut SimRng,
    ) -> ScriptResult<()> {
        let subject = match staging.alive(subject_id) {
            Some(t) => t.clone(),
            None => return Ok(()),
        };

        for effect in &result.effects {
            let (title, description, attribute, magnitude, duration) = {
                let snapshots = role_snapshots(staging, roles);
                let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
                (
                    effect.title.eval_string(&mut scope)?,
                    effect.description.eval_string(&mut scope)?,
                    effect.attribute.eval_string(&mut scope)?,
                    effect.magnitude.eval_int(&mut scope)?,
                    effect.duration.eval_int(&mut scope)?,
                )
            };
            for role in &effect.applied_to {
                let target = resolve_role(subject_id, roles, role);
                match target.and_then(|id| staging.get_mut_alive(id)) {
                    Some(staged) => staged.thing.add_effect(AttributeEffect {
                        title: title.clone(),
                        description: description.clone(),
                        attribute: attribute.clone(),
                        magnitude,
                        took_effect: next_step,
                        duration,
                        applied_by: Some(subject_id),
                    }),
                    None => {
                        warn!(role = %role, "effect target unresolved; effect skipped for role")
                    }
                }
            }
        }

        for spawn in &result.spawns {
            let (definition, x, y) = {
                let snapshots = role_snapshots(staging, roles);
                let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
                let definition = spawn.definition.eval_string(&mut scope)?;
                let (x, y) = match &spawn.position {
                    CompiledSpawnPosition::Absolute { x, y } => {
                        (x.eval_int(&mut scope)?, y.eval_int(&mut scope)?)
                    }
                    CompiledSpawnPosition::RelativeToSubject { dx, dy } => (
                        subject.x as i64 + dx.eval_int(&mut scope)?,
                        subject.y as i64 + dy.eval_int(&mut scope)?,
                    ),
                };
                (definition, x, y)
            };
            let (cx, cy) = world.grid.clamp(x, y);
            let mut thing = self
                .factory
                .create(&mut *rng, next_step, globals, cx, cy, &definition)?;
            for (attribute, expr) in &spawn.attribute_overrides {
                let value = {
                    let snapshots = role_snapshots(staging, roles);
                    let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
                    expr.eval_int(&mut scope)?
                };
                thing.set_attribute(attribute.clone(), value);
            }
            debug!(definition = %definition, id = %thing.id, x = cx, y = cy, "spawned");
            staging.stage_created(thing);
        }

        for role in &result.destroys {
            match resolve_role(subject_id, roles, role) {
                Some(id) => {
                    staging.destroy(id);
                    debug!(target = %id, role = %role, "destroyed");
                }
                None => warn!(role = %role, "destroy target unresolved; skipped"),
            }
        }

        for target in &result.moves {
            let movement = match target {
                CompiledMoveTarget::Coords { x, y } => {
                    let (x, y) = {
                        let snapshots = role_snapshots(staging, roles);
                        let mut scope = build_scope(rng, next_step, globals, &subject, &snapshots);
                        (x.eval_int(&mut scope)?, y.eval_int(&mut scope)?)
                    };
                    let (cx, cy) = world.grid.clamp(x, y);
                    Some(MoveState::ToCoords { x: cx, y: cy })
                }
                CompiledMoveTarget::Role(role) => match resolve_role(subject_id, roles, role) {
                    Some(id) if id != subject_id => Some(MoveState::ToThing(id)),
                    _ => {
                        warn!(role = %role, "move target unresolved; directive skipped");
                        None
                    }
                },
            };
            if let Some(movement) = movement {
                match staging.get_mut_alive(subject_id) {
                    Some(staged) => {
                        staged.thing.movement = movement;
                        staged.thing.inside = None;
                    }
                    None => warn!(subject = %subject_id, "mover destroyed; directive skipped"),
                }
            }
        }

        Ok(())
    }

    /// Execute movement for every surviving mover, once, after all events
    fn run_movement(
        &self,
        world: &World,
        staging: &mut StagingArea,
        globals: &ValueMap,
        next_step: u64,
    ) {
        let costs = CostGrid::from_world_grid(&world.grid);
        for id in staging.ids() {
            let (movement, kind) = match staging.alive(id) {
                Some(t) => (t.movement, t.kind),
                None => continue,
            };
            if !kind.is_moving() || movement.is_idle() {
                continue;
            }
            let mut rng = SimRng::for_thing(world.seed, world.step, id, Stage::Movement);

            let (destination, target) = match movement {
                MoveState::Idle => continue,
                MoveState::ToCoords { x, y } => ((x, y), None),
                MoveState::ToThing(target_id) => {
                    match staging
                        .alive(target_id)
                        .map(|t| (t.position(), t.kind))
                        .or_else(|| world.find_thing(target_id).map(|t| (t.position(), t.kind)))
                    {
                        Some((position, target_kind)) if !staging.is_destroyed(target_id) => {
                            (position, Some((target_id, target_kind)))
                        }
                        _ => {
                            // target gone: invalid move state, directive dropped
                            warn!(mover = %id, target = %target_id, "move target missing; directive cleared");
                            if let Some(staged) = staging.get_mut_alive(id) {
                                staged.thing.movement = MoveState::Idle;
                            }
                            continue;
                        }
                    }
                }
            };

            let profile = self.mover_profile(staging, globals, id, next_step, &mut rng);
            let outcome = match staging.get_mut_alive(id) {
                Some(staged) => resolve_movement(&mut staged.thing, destination, &profile, &costs),
                None => continue,
            };
            if outcome.arrived {
                if let Some((target_id, target_kind)) = target {
                    if target_kind == ThingKind::Site && kind.can_enter_sites() {
                        if let Some(staged) = staging.get_mut_alive(id) {
                            staged.thing.inside = Some(target_id);
                            debug!(mover = %id, site = %target_id, "entered site");
                        }
                    }
                }
            }
        }
    }

    fn mover_profile(
        &self,
        staging: &StagingArea,
        globals: &ValueMap,
        id: ThingId,
        next_step: u64,
        rng: &mut SimRng,
    ) -> MoverProfile {
        let fallback = MoverProfile {
            land_speed: 1.0,
            water_speed: 1.0,
            can_fly: false,
        };
        let thing = match staging.thing(id) {
            Some(t) => t.clone(),
            None => return fallback,
        };
        let def = match self.store.thing_def(thing.definition.as_str()) {
            Some(def) => def,
            None => return fallback,
        };
        let mut scope = EvalScope::new(&mut *rng, next_step, globals).bind(SUBJECT_ROLE, &thing);
        let land_speed = def.eval_land_speed(&mut scope).unwrap_or_else(|e| {
            warn!(error = %e, "land_speed evaluation failed; defaulting to 1");
            1.0
        });
        let water_speed = match def.eval_water_speed(&mut scope) {
            Ok(Some(speed)) => speed,
            Ok(None) => land_speed,
            Err(e) => {
                warn!(error = %e, "water_speed evaluation failed; defaulting to land speed");
                land_speed
            }
        };
        let can_fly = def.eval_can_fly(&mut scope).unwrap_or_else(|e| {
            warn!(error = %e, "can_fly evaluation failed; defaulting to false");
            false
        });
        MoverProfile {
            land_speed,
            water_speed,
            can_fly,
        }
    }
}

/// Globals injected once per step, visible to every expression
fn step_globals(world: &World, next_step: u64) -> ValueMap {
    let mut globals = ValueMap::new();
    globals.insert("StepCount".to_string(), Value::Int(next_step as i64));
    globals.insert("WorldSeed".to_string(), Value::Int(world.seed as i64));
    globals.insert("WorldWidth".to_string(), Value::Int(world.grid.width() as i64));
    globals.insert(
        "WorldHeight".to_string(),
        Value::Int(world.grid.height() as i64),
    );
    globals
}

/// Resolve a role name to a staged identity; "Subject" is always the subject
fn resolve_role(subject_id: ThingId, roles: &ResolvedRoles, role: &str) -> Option<ThingId> {
    if role == SUBJECT_ROLE {
        Some(subject_id)
    } else {
        roles.get(role).copied().flatten()
    }
}

fn role_snapshots(staging: &StagingArea, roles: &ResolvedRoles) -> RoleSnapshots {
    roles
        .iter()
        .map(|(role, id)| (role.clone(), id.and_then(|id| staging.thing(id)).cloned()))
        .collect()
}

fn build_scope<'s>(
    rng: &'s mut SimRng,
    step: u64,
    globals: &'s ValueMap,
    subject: &'s Thing,
    snapshots: &'s RoleSnapshots,
) -> EvalScope<'s> {
    let mut scope = EvalScope::new(rng, step, globals).bind(SUBJECT_ROLE, subject);
    for (role, snapshot) in snapshots {
        scope = scope.bind_optional(role.clone(), snapshot.as_ref());
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::{Grid, Terrain};
    use chronicle_script::{DefFactory, Loader};

    fn compile_store(things: &str, events: &str) -> DefinitionStore {
        let mut loader = Loader::new();
        loader.load_things_str(things).unwrap();
        if !events.is_empty() {
            loader.load_events_str(events).unwrap();
        }
        DefinitionStore::compile(&loader.finish()).unwrap()
    }

    fn place_new(grid: &mut Grid, id: u64, kind: ThingKind, def: &str, x: u32, y: u32) -> ThingId {
        let thing = Thing::new(ThingId::new(id), kind, def, x, y);
        grid.place(thing);
        ThingId::new(id)
    }

    #[test]
    fn test_example_scenario_population_drops_to_95() {
        // seed 42, one entity, MaxEvents 1, chance "100", one default result
        // with magnitude -5 on Population starting at 100
        let store = compile_store(
            r#"(things: [
                (name: "village", kind: Site,
                 default_attributes: [("Population", "100")],
                 max_events: "1"),
            ])"#,
            r#"(events: [
                (name: "plague", subject: (kind: Site), chance: "100",
                 results: [(default: true, effects: [(
                     title: "Plague",
                     attribute: "Population",
                     magnitude: "-5",
                 )])]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let globals = ValueMap::new();
        let mut rng = SimRng::new(1);
        let village = factory.create(&mut rng, 0, &globals, 2, 2, "village").unwrap();
        let village_id = village.id;

        let mut grid = Grid::new(5, 5);
        grid.place(village);
        let world = World::new(42, grid);

        let engine = HistoryEngine::new(&store, &factory);
        let next = engine.step(&world);

        assert_eq!(next.step, 1);
        assert_eq!(next.occurred.len(), 1);
        assert_eq!(next.occurred[0].event.as_str(), "plague");
        let village = next.find_thing(village_id).unwrap();
        assert_eq!(village.effective_attribute("Population", next.step), 95);
        // base value untouched, the change lives in an effect
        assert_eq!(village.base_attribute("Population"), 100);
        // the prior snapshot is untouched
        assert_eq!(
            world.find_thing(village_id).unwrap().effective_attribute("Population", 0),
            100
        );
    }

    #[test]
    fn test_step_is_deterministic() {
        let store = compile_store(
            r#"(things: [
                (name: "village", kind: Site,
                 default_attributes: [("Population", "rand(80, 120)")]),
                (name: "bandits", kind: Unit, land_speed: "2",
                 default_attributes: [("Strength", "rand(5, 15)")]),
            ])"#,
            r#"(events: [
                (name: "raid",
                 subject: (kind: Site, condition: "Subject->Population > 0"),
                 chance: "60",
                 description: "Raiders struck; population now {Subject->Population}",
                 objects: {"Raiders": (kind: Unit, distance: 4)},
                 results: [(default: true, effects: [(
                     title: "Raided",
                     attribute: "Population",
                     magnitude: "-rand(1, 10)",
                     duration: "3",
                 )])]),
                (name: "wander", subject: (kind: Unit), chance: "50",
                 results: [(default: true, moves: [(target: Coords(x: "rand(0, 7)", y: "rand(0, 7)"))])]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let globals = ValueMap::new();
        let mut rng = SimRng::new(9);

        let mut grid = Grid::new(8, 8);
        let river = std::sync::Arc::new(Terrain::water("river", 2.0));
        for y in 0..8 {
            grid.set_terrain(4, y, river.clone());
        }
        grid.place(factory.create(&mut rng, 0, &globals, 1, 1, "village").unwrap());
        grid.place(factory.create(&mut rng, 0, &globals, 6, 6, "village").unwrap());
        grid.place(factory.create(&mut rng, 0, &globals, 2, 3, "bandits").unwrap());
        let world = World::new(1234, grid);

        let engine = HistoryEngine::new(&store, &factory);
        let mut a = engine.step(&world);
        let mut b = engine.step(&world);
        for _ in 0..5 {
            a = engine.step(&a);
            b = engine.step(&b);
        }
        // bit-identical output across two independent runs
        assert_eq!(ron::to_string(&a).unwrap(), ron::to_string(&b).unwrap());
    }

    #[test]
    fn test_false_subject_condition_never_occurs() {
        let store = compile_store(
            r#"(things: [(name: "village", kind: Site)])"#,
            r#"(events: [
                (name: "impossible", subject: (kind: Site, condition: "false"),
                 chance: "100",
                 results: [(default: true)]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        for seed in 0..20 {
            let mut grid = Grid::new(3, 3);
            place_new(&mut grid, 1, ThingKind::Site, "village", 1, 1);
            let mut world = World::new(seed, grid);
            for _ in 0..3 {
                world = engine.step(&world);
                assert!(world.occurred.is_empty(), "seed {} fired an impossible event", seed);
            }
        }
    }

    #[test]
    fn test_max_events_caps_occurrences() {
        let store = compile_store(
            r#"(things: [(name: "village", kind: Site, max_events: "1")])"#,
            r#"(events: [
                (name: "a", subject: (kind: Site), chance: "100", results: [(default: true)]),
                (name: "b", subject: (kind: Site), chance: "100", results: [(default: true)]),
                (name: "c", subject: (kind: Site), chance: "100", results: [(default: true)]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(3, 3);
        place_new(&mut grid, 1, ThingKind::Site, "village", 0, 0);
        let world = World::new(5, grid);

        let next = engine.step(&world);
        assert_eq!(next.occurred.len(), 1);
    }

    #[test]
    fn test_required_role_unresolved_drops_event() {
        let store = compile_store(
            r#"(things: [(name: "village", kind: Site)])"#,
            r#"(events: [
                (name: "raid", subject: (kind: Site), chance: "100",
                 objects: {"Raiders": (kind: Unit, distance: 2)},
                 results: [(default: true)]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        // no unit anywhere: the required Raiders role cannot resolve
        let mut grid = Grid::new(5, 5);
        place_new(&mut grid, 1, ThingKind::Site, "village", 2, 2);
        let next = engine.step(&World::new(3, grid));
        assert!(next.occurred.is_empty());
    }

    #[test]
    fn test_object_role_outside_radius_is_not_found() {
        let store = compile_store(
            r#"(things: [(name: "village", kind: Site), (name: "bandits", kind: Unit)])"#,
            r#"(events: [
                (name: "raid", subject: (kind: Site), chance: "100",
                 objects: {"Raiders": (kind: Unit, distance: 2)},
                 results: [(default: true)]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(10, 10);
        place_new(&mut grid, 1, ThingKind::Site, "village", 0, 0);
        place_new(&mut grid, 2, ThingKind::Unit, "bandits", 9, 9);
        let next = engine.step(&World::new(3, grid));
        assert!(next.occurred.is_empty());

        // within the radius the same event fires
        let mut grid = Grid::new(10, 10);
        place_new(&mut grid, 1, ThingKind::Site, "village", 0, 0);
        place_new(&mut grid, 2, ThingKind::Unit, "bandits", 1, 1);
        let next = engine.step(&World::new(3, grid));
        assert_eq!(next.occurred.len(), 1);
        assert_eq!(next.occurred[0].objects["Raiders"], ThingId::new(2));
    }

    #[test]
    fn test_spawn_and_destroy_in_one_result() {
        let store = compile_store(
            r#"(things: [
                (name: "village", kind: Site),
                (name: "ruin", kind: Site, default_attributes: [("Haunted", "1")]),
            ])"#,
            r#"(events: [
                (name: "collapse", subject: (kind: Site, definitions: ["village"]),
                 chance: "100",
                 results: [(default: true,
                     destroys: ["Subject"],
                     spawns: [(definition: "ruin",
                               position: RelativeToSubject(dx: "0", dy: "0"))],
                 )]),
            ])"#,
        );
        let factory = DefFactory::starting_at(&store, 100);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(4, 4);
        let village_id = place_new(&mut grid, 1, ThingKind::Site, "village", 2, 1);
        let next = engine.step(&World::new(11, grid));

        // both side effects completed
        assert_eq!(next.occurred.len(), 1);
        assert!(next.find_thing(village_id).is_none(), "village must be gone");
        let ruin = next
            .grid
            .things()
            .find(|t| t.definition.as_str() == "ruin")
            .expect("ruin must be spawned");
        assert_eq!(ruin.position(), (2, 1));
        assert_eq!(ruin.base_attribute("Haunted"), 1);
        // the spawned thing matched no further events this step, and the
        // destroyed village is referenced nowhere in the next grid
        assert_eq!(next.grid.thing_count(), 1);
    }

    #[test]
    fn test_default_result_fallback() {
        // the only non-default result can never pass (chance 0 < any
        // threshold), so the default one must be applied
        let store = compile_store(
            r#"(things: [(name: "village", kind: Site, default_attributes: [("Mood", "10")])])"#,
            r#"(events: [
                (name: "festival", subject: (kind: Site), chance: "100",
                 results: [
                     (chance: "0", effects: [(title: "Wild", attribute: "Mood", magnitude: "100")]),
                     (default: true, effects: [(title: "Quiet", attribute: "Mood", magnitude: "1")]),
                 ]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(3, 3);
        let id = place_new(&mut grid, 1, ThingKind::Site, "village", 1, 1);
        let next = engine.step(&World::new(17, grid));

        assert_eq!(next.occurred.len(), 1);
        assert_eq!(next.occurred[0].result, 1);
        // hand-placed thing has base Mood 0; the quiet result adds 1
        assert_eq!(next.find_thing(id).unwrap().effective_attribute("Mood", 1), 1);
    }

    #[test]
    fn test_no_result_and_no_default_discards_quietly() {
        let store = compile_store(
            r#"(things: [(name: "village", kind: Site)])"#,
            r#"(events: [
                (name: "dud", subject: (kind: Site), chance: "100",
                 results: [(chance: "0")]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(3, 3);
        place_new(&mut grid, 1, ThingKind::Site, "village", 1, 1);
        // must not panic, must not record
        let next = engine.step(&World::new(23, grid));
        assert!(next.occurred.is_empty());
        assert_eq!(next.grid.thing_count(), 1);
    }

    #[test]
    fn test_move_directive_and_site_entry() {
        let store = compile_store(
            r#"(things: [
                (name: "village", kind: Site),
                (name: "traveler", kind: NotablePerson, land_speed: "2"),
            ])"#,
            r#"(events: [
                (name: "visit", subject: (kind: NotablePerson),
                 chance: "100",
                 objects: {"Destination": (kind: Site, distance: 10)},
                 results: [(default: true, moves: [(target: Role("Destination"))])]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(10, 1);
        let site_id = place_new(&mut grid, 1, ThingKind::Site, "village", 5, 0);
        let person_id = place_new(&mut grid, 2, ThingKind::NotablePerson, "traveler", 0, 0);
        let mut world = World::new(77, grid);

        // step 1: event sets the directive and movement advances 2 squares
        world = engine.step(&world);
        let person = world.find_thing(person_id).unwrap();
        assert_eq!(person.movement, MoveState::ToThing(site_id));
        assert_eq!(person.position(), (2, 0));
        assert_eq!(person.inside, None);

        // two more steps reach the site (the visit event cannot re-fire
        // mid-movement) and enter it
        world = engine.step(&world);
        world = engine.step(&world);
        let person = world.find_thing(person_id).unwrap();
        assert_eq!(person.position(), (5, 0));
        assert!(person.movement.is_idle());
        assert_eq!(person.inside, Some(site_id));
    }

    #[test]
    fn test_in_motion_gate() {
        // an event that does not allow mid-movement triggering is skipped
        // while the subject still has a destination
        let store = compile_store(
            r#"(things: [(name: "traveler", kind: NotablePerson, land_speed: "1")])"#,
            r#"(events: [
                (name: "meditate", subject: (kind: NotablePerson), chance: "100",
                 results: [(default: true)]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(10, 1);
        let mut traveler = Thing::new(ThingId::new(1), ThingKind::NotablePerson, "traveler", 0, 0);
        traveler.movement = MoveState::ToCoords { x: 9, y: 0 };
        grid.place(traveler);
        let next = engine.step(&World::new(1, grid));

        assert!(next.occurred.is_empty());
        // movement still executed
        assert_eq!(next.find_thing(ThingId::new(1)).unwrap().position(), (1, 0));
    }

    #[test]
    fn test_effect_applied_to_object_role() {
        let store = compile_store(
            r#"(things: [
                (name: "village", kind: Site, default_attributes: [("Population", "100")]),
                (name: "bandits", kind: Unit, default_attributes: [("Strength", "10")]),
            ])"#,
            r#"(events: [
                (name: "raid", subject: (kind: Site), chance: "100",
                 objects: {"Raiders": (kind: Unit, distance: 3)},
                 results: [(default: true, effects: [
                     (title: "Losses", attribute: "Population", magnitude: "-10",
                      applied_to: ["Subject"]),
                     (title: "Loot", attribute: "Strength", magnitude: "5",
                      applied_to: ["Raiders"]),
                 ])]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let globals = ValueMap::new();
        let mut rng = SimRng::new(4);
        let mut grid = Grid::new(5, 5);
        let village = factory.create(&mut rng, 0, &globals, 2, 2, "village").unwrap();
        let bandits = factory.create(&mut rng, 0, &globals, 3, 2, "bandits").unwrap();
        let (village_id, bandit_id) = (village.id, bandits.id);
        grid.place(village);
        grid.place(bandits);
        let next = engine.step(&World::new(31, grid));

        assert_eq!(next.occurred.len(), 1);
        let village = next.find_thing(village_id).unwrap();
        assert_eq!(village.effective_attribute("Population", 1), 90);
        let bandits = next.find_thing(bandit_id).unwrap();
        assert_eq!(bandits.effective_attribute("Strength", 1), 15);
        // applied_by records the subject
        assert_eq!(bandits.effects[0].applied_by, Some(village_id));
    }

    #[test]
    fn test_subject_definition_filter_respects_inheritance() {
        let store = compile_store(
            r#"(things: [
                (name: "settlement", kind: Site),
                (name: "village", kind: Site, extends: "settlement"),
                (name: "camp", kind: Site),
            ])"#,
            r#"(events: [
                (name: "growth", subject: (kind: Site, definitions: ["settlement"]),
                 chance: "100",
                 results: [(default: true, effects: [(title: "Growth", attribute: "Size", magnitude: "1")])]),
            ])"#,
        );
        let factory = DefFactory::new(&store);
        let engine = HistoryEngine::new(&store, &factory);

        let mut grid = Grid::new(4, 4);
        let village_id = place_new(&mut grid, 1, ThingKind::Site, "village", 0, 0);
        let camp_id = place_new(&mut grid, 2, ThingKind::Site, "camp", 3, 3);
        let next = engine.step(&World::new(2, grid));

        // village inherits settlement and qualifies; camp does not
        assert_eq!(next.occurred.len(), 1);
        assert_eq!(next.occurred[0].subject, village_id);
        assert_eq!(next.find_thing(camp_id).unwrap().effects.len(), 0);
    }
}
