//! Floor, reticle and one node per placed object.

use std::collections::BTreeMap;

use glam::Vec3;
use serde_json::{json, Value};
use tracing::{debug, trace};

use engine_core::{
    EngineAction, FrameContext, GameEvent, GamePresentation, Interaction, NodeHandle, NodeSpec,
    Scene,
};

use crate::engine::{PlacedObject, OBJECTS_CLEARED, OBJECT_PLACED, OBJECT_REMOVED};

pub const DEFAULT_FLOOR_RADIUS: f32 = 2.0;

const FLOOR_COLOR: u32 = 0x42_42_42;
const RETICLE_COLOR: u32 = 0xFF_FF_FF;
const OBJECT_SCALE: f32 = 0.1;
/// Reticle pulses per second
const PULSE_HZ: f64 = 1.5;

pub struct PlacementPresentation {
    floor_radius: f32,
    floor: Option<NodeHandle>,
    reticle: Option<NodeHandle>,
    objects: BTreeMap<u64, NodeHandle>,
    pulse: f32,
}

impl PlacementPresentation {
    pub fn new(floor_radius: f32) -> Self {
        Self {
            floor_radius,
            floor: None,
            reticle: None,
            objects: BTreeMap::new(),
            pulse: 0.0,
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Current reticle scale factor, in `[0.8, 1.2]`.
    pub fn reticle_scale(&self) -> f32 {
        1.0 + 0.2 * self.pulse
    }

    /// Floor point under `ray`, relative to the root, if it lands on the floor.
    fn floor_hit(&self, scene: &Scene, interaction: &Interaction) -> Option<Vec3> {
        let Interaction::Select { ray } = interaction else {
            return None;
        };
        let origin = scene.origin();
        let local = ray.intersect_horizontal_plane(origin.y)? - origin;
        (local.x * local.x + local.z * local.z <= self.floor_radius * self.floor_radius)
            .then_some(Vec3::new(local.x, 0.0, local.z))
    }

    fn spawn_object(&mut self, scene: &mut Scene, payload: &Value) {
        let Some(object) = parse_object(payload) else {
            debug!("objectPlaced without a readable object");
            return;
        };
        let spec = NodeSpec::new(format!("object-{}", object.id), Vec3::from_array(object.position))
            .with_scale(OBJECT_SCALE)
            .with_color(object.color);
        if let Some(node) = scene.spawn(&spec) {
            self.objects.insert(object.id, node);
        }
    }

    fn despawn_object(&mut self, scene: &mut Scene, payload: &Value) {
        let Some(object) = parse_object(payload) else {
            return;
        };
        if let Some(node) = self.objects.remove(&object.id) {
            scene.despawn(node);
        }
    }

    fn despawn_all(&mut self, scene: &mut Scene) {
        for node in std::mem::take(&mut self.objects).into_values() {
            scene.despawn(node);
        }
    }
}

impl Default for PlacementPresentation {
    fn default() -> Self {
        Self::new(DEFAULT_FLOOR_RADIUS)
    }
}

fn parse_object(payload: &Value) -> Option<PlacedObject> {
    serde_json::from_value(payload.get("object")?.clone()).ok()
}

impl GamePresentation for PlacementPresentation {
    fn create_game_objects(&mut self, scene: &mut Scene) -> anyhow::Result<()> {
        let floor = NodeSpec::new("floor", Vec3::ZERO)
            .with_scale(self.floor_radius)
            .with_color(FLOOR_COLOR);
        self.floor = scene.spawn(&floor);
        if self.floor.is_none() {
            anyhow::bail!("scene is not open");
        }
        self.reticle = scene.spawn(
            &NodeSpec::new("reticle", Vec3::ZERO)
                .with_scale(OBJECT_SCALE)
                .with_color(RETICLE_COLOR),
        );
        Ok(())
    }

    fn handle_game_interaction(
        &mut self,
        interaction: &Interaction,
        scene: &Scene,
    ) -> Vec<EngineAction> {
        match interaction {
            Interaction::Select { .. } => match self.floor_hit(scene, interaction) {
                Some(point) => vec![EngineAction::new(
                    "place",
                    json!({ "position": point.to_array() }),
                )],
                None => {
                    trace!("Select missed the floor");
                    Vec::new()
                }
            },
            Interaction::Squeeze => vec![EngineAction::new("undo", Value::Null)],
            Interaction::Command { name, data } => match name.as_str() {
                "place" | "undo" | "clear" => vec![EngineAction::new(name.clone(), data.clone())],
                _ => Vec::new(),
            },
        }
    }

    fn update_game_visualization(&mut self, event: &GameEvent, scene: &mut Scene) {
        if event.name.is(OBJECT_PLACED) {
            self.spawn_object(scene, &event.payload);
        } else if event.name.is(OBJECT_REMOVED) {
            self.despawn_object(scene, &event.payload);
        } else if event.name.is(OBJECTS_CLEARED) {
            self.despawn_all(scene);
        }
    }

    fn on_frame(&mut self, frame: &FrameContext, _scene: &mut Scene) {
        let phase = frame.time_ms / 1000.0 * PULSE_HZ * std::f64::consts::TAU;
        self.pulse = phase.sin() as f32;
    }

    fn release_game_objects(&mut self) {
        self.floor = None;
        self.reticle = None;
        self.objects.clear();
        self.pulse = 0.0;
    }
}
