//! The compiled definition layer
//!
//! Turns raw definition schemas into ready-to-call evaluators. Every
//! expression-bearing field is compiled eagerly through the process-wide
//! cache; a malformed expression is fatal here, at load time, and carries
//! the owning definition's name and field path. Runtime evaluation failures
//! are wrapped the same way.

use crate::error::{Error, Result};
use crate::schema::{
    EffectDef, EventDef, MoveTarget, ObjectDef, ResultDef, SpawnDef, SpawnPosition, ThingDef,
};
use chronicle_core::{compile_cached, CompiledExpr, DefName, EvalScope, ExprMode, ThingKind};
use indexmap::IndexMap;
use std::sync::Arc;

/// A compiled expression field that knows which definition it belongs to
///
/// Evaluation errors come back as `definition.field: cause`, attributable
/// without any stack trace into the expression engine.
#[derive(Debug, Clone)]
pub struct CompiledField {
    expr: Arc<CompiledExpr>,
    definition: String,
    field: String,
}

impl CompiledField {
    fn new(
        definition: &str,
        field: impl Into<String>,
        source: &str,
        declared: &[&str],
        mode: ExprMode,
    ) -> Result<Self> {
        let field = field.into();
        let expr = compile_cached(source, declared, mode)
            .map_err(|e| Error::compile(definition, &field, e))?;
        Ok(Self {
            expr,
            definition: definition.to_string(),
            field,
        })
    }

    /// The original source text
    pub fn source(&self) -> &str {
        self.expr.source()
    }

    /// Evaluate to an integer
    pub fn eval_int(&self, scope: &mut EvalScope) -> Result<i64> {
        self.expr
            .evaluate_int(scope)
            .map_err(|e| Error::eval(&self.definition, &self.field, e))
    }

    /// Evaluate to a float
    pub fn eval_float(&self, scope: &mut EvalScope) -> Result<f64> {
        self.expr
            .evaluate_float(scope)
            .map_err(|e| Error::eval(&self.definition, &self.field, e))
    }

    /// Evaluate to a boolean by truthiness
    pub fn eval_bool(&self, scope: &mut EvalScope) -> Result<bool> {
        self.expr
            .evaluate_bool(scope)
            .map_err(|e| Error::eval(&self.definition, &self.field, e))
    }

    /// Evaluate and render to a string
    pub fn eval_string(&self, scope: &mut EvalScope) -> Result<String> {
        self.expr
            .evaluate_string(scope)
            .map_err(|e| Error::eval(&self.definition, &self.field, e))
    }
}

/// A thing definition with its expression fields compiled
#[derive(Debug)]
pub struct CompiledThingDef {
    pub name: DefName,
    pub kind: ThingKind,
    pub extends: Option<String>,
    /// Attribute defaults declared on this definition only; the factory
    /// walks the inheritance chain base-first
    pub attributes: Vec<(String, CompiledField)>,
    max_events: CompiledField,
    land_speed: Option<CompiledField>,
    water_speed: Option<CompiledField>,
    can_fly: Option<CompiledField>,
}

const SUBJECT_ONLY: &[&str] = &["Subject"];

impl CompiledThingDef {
    pub(crate) fn compile(raw: &ThingDef) -> Result<Self> {
        let name = raw.name.as_str();
        let mut attributes = Vec::with_capacity(raw.default_attributes.len());
        for (attr, source) in &raw.default_attributes {
            attributes.push((
                attr.clone(),
                CompiledField::new(
                    name,
                    format!("default_attributes.{}", attr),
                    source,
                    SUBJECT_ONLY,
                    ExprMode::Simple,
                )?,
            ));
        }
        Ok(Self {
            name: DefName::new(&raw.name),
            kind: raw.kind,
            extends: raw.extends.clone(),
            attributes,
            max_events: CompiledField::new(
                name,
                "max_events",
                raw.max_events.as_deref().unwrap_or("1"),
                SUBJECT_ONLY,
                ExprMode::Simple,
            )?,
            land_speed: raw
                .land_speed
                .as_deref()
                .map(|s| CompiledField::new(name, "land_speed", s, SUBJECT_ONLY, ExprMode::Simple))
                .transpose()?,
            water_speed: raw
                .water_speed
                .as_deref()
                .map(|s| CompiledField::new(name, "water_speed", s, SUBJECT_ONLY, ExprMode::Simple))
                .transpose()?,
            can_fly: raw
                .can_fly
                .as_deref()
                .map(|s| CompiledField::new(name, "can_fly", s, SUBJECT_ONLY, ExprMode::Simple))
                .transpose()?,
        })
    }

    /// Maximum events this thing may take per step
    pub fn eval_max_events(&self, scope: &mut EvalScope) -> Result<i64> {
        self.max_events.eval_int(scope)
    }

    /// Land movement budget per step; definitions without one get 1.0
    pub fn eval_land_speed(&self, scope: &mut EvalScope) -> Result<f64> {
        match &self.land_speed {
            Some(field) => field.eval_float(scope),
            None => Ok(1.0),
        }
    }

    /// Water movement budget per step, when declared
    pub fn eval_water_speed(&self, scope: &mut EvalScope) -> Result<Option<f64>> {
        match &self.water_speed {
            Some(field) => field.eval_float(scope).map(Some),
            None => Ok(None),
        }
    }

    /// Whether things of this definition fly; defaults to false
    pub fn eval_can_fly(&self, scope: &mut EvalScope) -> Result<bool> {
        match &self.can_fly {
            Some(field) => field.eval_bool(scope),
            None => Ok(false),
        }
    }
}

/// An event definition with every expression field compiled
#[derive(Debug)]
pub struct CompiledEventDef {
    pub name: DefName,
    pub subject_kind: ThingKind,
    pub subject_definitions: Vec<String>,
    pub triggered_while_moving: bool,
    subject_condition: CompiledField,
    chance: CompiledField,
    description: CompiledField,
    pub objects: IndexMap<String, CompiledObjectDef>,
    pub results: Vec<CompiledResultDef>,
}

/// A compiled object role
#[derive(Debug)]
pub struct CompiledObjectDef {
    pub kind: ThingKind,
    pub definitions: Vec<String>,
    pub distance: u32,
    pub optional: bool,
    condition: CompiledField,
}

/// A compiled result
#[derive(Debug)]
pub struct CompiledResultDef {
    chance: CompiledField,
    pub default: bool,
    pub effects: Vec<CompiledEffectDef>,
    pub spawns: Vec<CompiledSpawnDef>,
    pub destroys: Vec<String>,
    pub moves: Vec<CompiledMoveTarget>,
}

/// A compiled effect sub-definition
#[derive(Debug)]
pub struct CompiledEffectDef {
    pub title: CompiledField,
    pub description: CompiledField,
    pub attribute: CompiledField,
    pub magnitude: CompiledField,
    pub duration: CompiledField,
    pub applied_to: Vec<String>,
}

/// A compiled spawn sub-definition
#[derive(Debug)]
pub struct CompiledSpawnDef {
    pub definition: CompiledField,
    pub position: CompiledSpawnPosition,
    pub attribute_overrides: Vec<(String, CompiledField)>,
}

/// Compiled spawn placement
#[derive(Debug)]
pub enum CompiledSpawnPosition {
    Absolute { x: CompiledField, y: CompiledField },
    RelativeToSubject { dx: CompiledField, dy: CompiledField },
}

/// Compiled movement directive target
#[derive(Debug)]
pub enum CompiledMoveTarget {
    Coords { x: CompiledField, y: CompiledField },
    Role(String),
}

impl CompiledEventDef {
    pub(crate) fn compile(raw: &EventDef) -> Result<Self> {
        let name = raw.name.as_str();
        // the declared signature: Subject plus every object role
        let declared_names: Vec<&str> = std::iter::once("Subject")
            .chain(raw.objects.keys().map(String::as_str))
            .collect();
        let declared = declared_names.as_slice();

        let mut objects = IndexMap::with_capacity(raw.objects.len());
        for (role, object) in &raw.objects {
            objects.insert(role.clone(), compile_object(name, role, object, declared)?);
        }

        let mut results = Vec::with_capacity(raw.results.len());
        for (index, result) in raw.results.iter().enumerate() {
            results.push(compile_result(name, index, result, declared)?);
        }

        Ok(Self {
            name: DefName::new(&raw.name),
            subject_kind: raw.subject.kind,
            subject_definitions: raw.subject.definitions.clone(),
            triggered_while_moving: raw.triggered_while_moving,
            subject_condition: CompiledField::new(
                name,
                "subject.condition",
                &raw.subject.condition,
                declared,
                ExprMode::Simple,
            )?,
            chance: CompiledField::new(name, "chance", &raw.chance, declared, ExprMode::Simple)?,
            description: CompiledField::new(
                name,
                "description",
                &raw.description,
                declared,
                ExprMode::FormattedText,
            )?,
            objects,
            results,
        })
    }

    /// Whether the subject's match condition holds
    pub fn eval_subject_condition(&self, scope: &mut EvalScope) -> Result<bool> {
        self.subject_condition.eval_bool(scope)
    }

    /// The event's chance, an integer compared against the shared threshold
    pub fn eval_chance(&self, scope: &mut EvalScope) -> Result<i64> {
        self.chance.eval_int(scope)
    }

    /// Render the audit-trail description
    pub fn eval_description(&self, scope: &mut EvalScope) -> Result<String> {
        self.description.eval_string(scope)
    }
}

impl CompiledObjectDef {
    /// Whether a candidate thing satisfies this role
    pub fn eval_condition(&self, scope: &mut EvalScope) -> Result<bool> {
        self.condition.eval_bool(scope)
    }
}

impl CompiledResultDef {
    /// The result's chance against a fresh threshold
    pub fn eval_chance(&self, scope: &mut EvalScope) -> Result<i64> {
        self.chance.eval_int(scope)
    }
}

fn compile_object(
    event: &str,
    role: &str,
    raw: &ObjectDef,
    declared: &[&str],
) -> Result<CompiledObjectDef> {
    Ok(CompiledObjectDef {
        kind: raw.kind,
        definitions: raw.definitions.clone(),
        distance: raw.distance,
        optional: raw.optional,
        condition: CompiledField::new(
            event,
            format!("objects.{}.condition", role),
            &raw.condition,
            declared,
            ExprMode::Simple,
        )?,
    })
}

fn compile_result(
    event: &str,
    index: usize,
    raw: &ResultDef,
    declared: &[&str],
) -> Result<CompiledResultDef> {
    let prefix = format!("results[{}]", index);

    let mut effects = Vec::with_capacity(raw.effects.len());
    for (i, effect) in raw.effects.iter().enumerate() {
        effects.push(compile_effect(
            event,
            &format!("{}.effects[{}]", prefix, i),
            effect,
            declared,
        )?);
    }

    let mut spawns = Vec::with_capacity(raw.spawns.len());
    for (i, spawn) in raw.spawns.iter().enumerate() {
        spawns.push(compile_spawn(
            event,
            &format!("{}.spawns[{}]", prefix, i),
            spawn,
            declared,
        )?);
    }

    let mut moves = Vec::with_capacity(raw.moves.len());
    for (i, mv) in raw.moves.iter().enumerate() {
        let field = format!("{}.moves[{}]", prefix, i);
        moves.push(match &mv.target {
            MoveTarget::Coords { x, y } => CompiledMoveTarget::Coords {
                x: CompiledField::new(
                    event,
                    format!("{}.x", field),
                    x,
                    declared,
                    ExprMode::Simple,
                )?,
                y: CompiledField::new(
                    event,
                    format!("{}.y", field),
                    y,
                    declared,
                    ExprMode::Simple,
                )?,
            },
            MoveTarget::Role(role) => CompiledMoveTarget::Role(role.clone()),
        });
    }

    Ok(CompiledResultDef {
        chance: CompiledField::new(
            event,
            format!("{}.chance", prefix),
            &raw.chance,
            declared,
            ExprMode::Simple,
        )?,
        default: raw.default,
        effects,
        spawns,
        destroys: raw.destroys.clone(),
        moves,
    })
}

fn compile_effect(
    event: &str,
    prefix: &str,
    raw: &EffectDef,
    declared: &[&str],
) -> Result<CompiledEffectDef> {
    Ok(CompiledEffectDef {
        title: CompiledField::new(
            event,
            format!("{}.title", prefix),
            &raw.title,
            declared,
            ExprMode::FormattedText,
        )?,
        description: CompiledField::new(
            event,
            format!("{}.description", prefix),
            &raw.description,
            declared,
            ExprMode::FormattedText,
        )?,
        attribute: CompiledField::new(
            event,
            format!("{}.attribute", prefix),
            &raw.attribute,
            declared,
            ExprMode::FormattedText,
        )?,
        magnitude: CompiledField::new(
            event,
            format!("{}.magnitude", prefix),
            &raw.magnitude,
            declared,
            ExprMode::Simple,
        )?,
        duration: CompiledField::new(
            event,
            format!("{}.duration", prefix),
            &raw.duration,
            declared,
            ExprMode::Simple,
        )?,
        applied_to: raw.applied_to.clone(),
    })
}

fn compile_spawn(
    event: &str,
    prefix: &str,
    raw: &SpawnDef,
    declared: &[&str],
) -> Result<CompiledSpawnDef> {
    let position = match &raw.position {
        SpawnPosition::Absolute { x, y } => CompiledSpawnPosition::Absolute {
            x: CompiledField::new(
                event,
                format!("{}.position.x", prefix),
                x,
                declared,
                ExprMode::Simple,
            )?,
            y: CompiledField::new(
                event,
                format!("{}.position.y", prefix),
                y,
                declared,
                ExprMode::Simple,
            )?,
        },
        SpawnPosition::RelativeToSubject { dx, dy } => CompiledSpawnPosition::RelativeToSubject {
            dx: CompiledField::new(
                event,
                format!("{}.position.dx", prefix),
                dx,
                declared,
                ExprMode::Simple,
            )?,
            dy: CompiledField::new(
                event,
                format!("{}.position.dy", prefix),
                dy,
                declared,
                ExprMode::Simple,
            )?,
        },
    };
    let mut attribute_overrides = Vec::with_capacity(raw.attribute_overrides.len());
    for (attr, source) in &raw.attribute_overrides {
        attribute_overrides.push((
            attr.clone(),
            CompiledField::new(
                event,
                format!("{}.attribute_overrides.{}", prefix, attr),
                source,
                declared,
                ExprMode::Simple,
            )?,
        ));
    }
    Ok(CompiledSpawnDef {
        definition: CompiledField::new(
            event,
            format!("{}.definition", prefix),
            &raw.definition,
            declared,
            ExprMode::FormattedText,
        )?,
        position,
        attribute_overrides,
    })
}
