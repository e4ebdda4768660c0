//! rapier2d physics world
//!
//! Thin adapter between the arena and rapier. The arena talks in `Vec2`,
//! collision category bits and opaque `u128` user data; rapier types stay
//! inside this module.
//!
//! Queries walk the live collider set in insertion order and run parry
//! shape tests against each collider's current pose (derived from its
//! parent body), so they see bodies moved since the last step and always
//! return results in the same order.

use rapier2d::parry::query::{self as shape_query, Ray};
use rapier2d::prelude::*;
use smallvec::SmallVec;

use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
}

/// Collision shape attached to a body, or used for a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeDesc {
    Box { half_extents: Vec2 },
    Circle { radius: f32 },
}

impl ShapeDesc {
    pub fn square(edge: f32) -> Self {
        ShapeDesc::Box {
            half_extents: Vec2::new(edge / 2.0, edge / 2.0),
        }
    }

    fn to_shared(self) -> SharedShape {
        match self {
            ShapeDesc::Box { half_extents } => SharedShape::cuboid(half_extents.x, half_extents.y),
            ShapeDesc::Circle { radius } => SharedShape::ball(radius),
        }
    }
}

/// Everything needed to create one body with a single shape
#[derive(Debug, Clone)]
pub struct BodyDesc {
    pub kind: BodyKind,
    pub position: Vec2,
    pub shape: ShapeDesc,
    pub category: u32,
    pub mask: u32,
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
    /// Use the larger restitution of a contact pair instead of the average
    pub max_restitution: bool,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub fixed_rotation: bool,
    /// Continuous collision detection
    pub bullet: bool,
    pub awake: bool,
    pub sensor: bool,
    pub events: bool,
    pub user_data: u128,
}

impl BodyDesc {
    pub fn new(kind: BodyKind, position: Vec2, shape: ShapeDesc, category: u32, mask: u32) -> Self {
        Self {
            kind,
            position,
            shape,
            category,
            mask,
            density: 1.0,
            friction: 0.0,
            restitution: 0.0,
            max_restitution: false,
            linear_damping: 0.0,
            angular_damping: 0.0,
            fixed_rotation: false,
            bullet: false,
            awake: true,
            sensor: false,
            events: false,
            user_data: 0,
        }
    }
}

/// Body plus its single collider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyHandle {
    pub body: RigidBodyHandle,
    pub collider: ColliderHandle,
}

/// Events produced by one `step`. Contact sides are `None` when the
/// collider was removed before the event could be read.
#[derive(Debug, Default, Clone)]
pub struct StepEvents {
    pub contact_begin: Vec<(Option<u128>, Option<u128>)>,
    pub contact_end: Vec<(Option<u128>, Option<u128>)>,
    /// (sensor, visitor)
    pub sensor_begin: Vec<(u128, u128)>,
    /// (sensor, visitor)
    pub sensor_end: Vec<(u128, u128)>,
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
}

#[inline]
fn to_vector(v: Vec2) -> Vector<Real> {
    vector![v.x, v.y]
}

#[inline]
fn from_vector(v: &Vector<Real>) -> Vec2 {
    Vec2::new(v.x, v.y)
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self {
            gravity: vector![0.0, 0.0],
            integration_params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
        }
    }

    pub fn create_body(&mut self, desc: &BodyDesc) -> BodyHandle {
        let mut body = match desc.kind {
            BodyKind::Static => RigidBodyBuilder::fixed(),
            BodyKind::Dynamic => RigidBodyBuilder::dynamic(),
        }
        .translation(to_vector(desc.position))
        .linear_damping(desc.linear_damping)
        .angular_damping(desc.angular_damping)
        .ccd_enabled(desc.bullet)
        .can_sleep(!desc.bullet)
        .sleeping(!desc.awake);
        if desc.fixed_rotation {
            body = body.lock_rotations();
        }
        let body = self.bodies.insert(body.build());

        let groups = InteractionGroups::new(
            Group::from_bits_truncate(desc.category),
            Group::from_bits_truncate(desc.mask),
        );
        let mut collider = ColliderBuilder::new(desc.shape.to_shared())
            .density(desc.density)
            .friction(desc.friction)
            .restitution(desc.restitution)
            .sensor(desc.sensor)
            .collision_groups(groups)
            .user_data(desc.user_data);
        if desc.max_restitution {
            collider = collider.restitution_combine_rule(CoefficientCombineRule::Max);
        }
        if desc.events {
            collider = collider.active_events(ActiveEvents::COLLISION_EVENTS);
        }
        let collider = self
            .colliders
            .insert_with_parent(collider.build(), body, &mut self.bodies);
        // Mass is otherwise only computed on the next step; impulses applied
        // before then must already see it.
        if let Some(rb) = self.bodies.get_mut(body) {
            rb.recompute_mass_properties_from_colliders(&self.colliders);
        }

        BodyHandle { body, collider }
    }

    /// Remove a body and its collider. Removing twice is a no-op.
    pub fn destroy_body(&mut self, handle: BodyHandle) {
        self.bodies.remove(
            handle.body,
            &mut self.island_manager,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.body)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advance the world by `dt`, split into `substeps` equal steps,
    /// collecting every collision event in the order rapier reports it.
    pub fn step(&mut self, dt: f32, substeps: usize) -> StepEvents {
        let substeps = substeps.max(1);
        self.integration_params.dt = dt / substeps as Real;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        let mut events = StepEvents::default();
        for _ in 0..substeps {
            self.pipeline.step(
                &self.gravity,
                &self.integration_params,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.bodies,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                &mut self.ccd_solver,
                None,
                &(),
                &event_handler,
            );

            while let Ok(event) = collision_recv.try_recv() {
                self.record_event(event, &mut events);
            }
        }
        events
    }

    fn record_event(&self, event: CollisionEvent, events: &mut StepEvents) {
        let (h1, h2) = (event.collider1(), event.collider2());
        let a = self.colliders.get(h1);
        let b = self.colliders.get(h2);

        if event.sensor() {
            let (Some(a), Some(b)) = (a, b) else {
                return;
            };
            let pair = if a.is_sensor() {
                (a.user_data, b.user_data)
            } else {
                (b.user_data, a.user_data)
            };
            if event.started() {
                events.sensor_begin.push(pair);
            } else {
                events.sensor_end.push(pair);
            }
            return;
        }

        let pair = (a.map(|c| c.user_data), b.map(|c| c.user_data));
        if pair.0.is_none() && pair.1.is_none() {
            return;
        }
        if event.started() {
            events.contact_begin.push(pair);
        } else {
            events.contact_end.push(pair);
        }
    }

    // ========================================================================
    // Body state
    // ========================================================================

    pub fn position(&self, handle: BodyHandle) -> Vec2 {
        self.bodies
            .get(handle.body)
            .map(|b| from_vector(b.translation()))
            .unwrap_or_default()
    }

    pub fn velocity(&self, handle: BodyHandle) -> Vec2 {
        self.bodies
            .get(handle.body)
            .map(|b| from_vector(b.linvel()))
            .unwrap_or_default()
    }

    /// Rotation in radians, in `[-pi, pi]`
    pub fn angle(&self, handle: BodyHandle) -> f32 {
        self.bodies
            .get(handle.body)
            .map(|b| b.rotation().angle())
            .unwrap_or_default()
    }

    pub fn set_position(&mut self, handle: BodyHandle, pos: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.set_translation(to_vector(pos), true);
        }
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, vel: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.set_linvel(to_vector(vel), true);
        }
    }

    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.apply_impulse(to_vector(impulse), true);
        }
    }

    /// Replace any force set earlier with `force` until the next call
    pub fn set_force(&mut self, handle: BodyHandle, force: Vec2) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.reset_forces(false);
            if !force.is_zero() {
                body.add_force(to_vector(force), true);
            }
        }
    }

    /// Freeze a dynamic body in place
    pub fn make_static(&mut self, handle: BodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle.body) {
            body.set_linvel(vector![0.0, 0.0], false);
            body.set_angvel(0.0, false);
            body.set_body_type(RigidBodyType::Fixed, true);
        }
    }

    pub fn is_static(&self, handle: BodyHandle) -> bool {
        self.bodies
            .get(handle.body)
            .map(|b| b.is_fixed())
            .unwrap_or(true)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current pose of a collider, following its parent body
    fn collider_pose(&self, collider: &Collider) -> Isometry<Real> {
        match (collider.parent(), collider.position_wrt_parent()) {
            (Some(parent), Some(rel)) => match self.bodies.get(parent) {
                Some(body) => body.position() * rel,
                None => *collider.position(),
            },
            _ => *collider.position(),
        }
    }

    fn colliders_in(&self, mask: u32) -> impl Iterator<Item = (ColliderHandle, &Collider)> + '_ {
        self.colliders
            .iter()
            .filter(move |(_, c)| c.collision_groups().memberships.bits() & mask != 0)
    }

    /// User data of every collider in `mask` intersecting `shape` at `pos`
    pub fn overlapping(&self, shape: ShapeDesc, pos: Vec2, mask: u32) -> SmallVec<[u128; 8]> {
        let query_shape = shape.to_shared();
        let query_pose = Isometry::translation(pos.x, pos.y);
        self.colliders_in(mask)
            .filter(|(_, c)| {
                shape_query::intersection_test(
                    &self.collider_pose(c),
                    c.shape(),
                    &query_pose,
                    &*query_shape,
                )
                .unwrap_or(false)
            })
            .map(|(_, c)| c.user_data)
            .collect()
    }

    /// True when any collider in `mask` intersects `shape` at `pos`
    pub fn any_overlap(&self, shape: ShapeDesc, pos: Vec2, mask: u32) -> bool {
        let query_shape = shape.to_shared();
        let query_pose = Isometry::translation(pos.x, pos.y);
        self.colliders_in(mask).any(|(_, c)| {
            shape_query::intersection_test(
                &self.collider_pose(c),
                c.shape(),
                &query_pose,
                &*query_shape,
            )
            .unwrap_or(false)
        })
    }

    /// Colliders in `mask` intersecting the collider of `handle`, excluding itself
    pub fn touching(&self, handle: BodyHandle, mask: u32) -> SmallVec<[u128; 8]> {
        let Some(own) = self.colliders.get(handle.collider) else {
            return SmallVec::new();
        };
        let own_pose = self.collider_pose(own);
        self.colliders_in(mask)
            .filter(|(h, _)| *h != handle.collider)
            .filter(|(_, c)| {
                shape_query::intersection_test(&self.collider_pose(c), c.shape(), &own_pose, own.shape())
                    .unwrap_or(false)
            })
            .map(|(_, c)| c.user_data)
            .collect()
    }

    /// Smallest surface distance from `shape` at `pos` to any collider in
    /// `mask`, or `None` when the mask matches nothing
    pub fn min_distance(&self, shape: ShapeDesc, pos: Vec2, mask: u32) -> Option<f32> {
        let query_shape = shape.to_shared();
        let query_pose = Isometry::translation(pos.x, pos.y);
        self.colliders_in(mask)
            .filter_map(|(_, c)| {
                shape_query::distance(&self.collider_pose(c), c.shape(), &query_pose, &*query_shape)
                    .ok()
            })
            .reduce(f32::min)
    }

    /// Closest collider in `mask` hit by a ray, with the hit distance
    pub fn cast_ray(&self, origin: Vec2, dir: Vec2, max_dist: f32, mask: u32) -> Option<(u128, f32)> {
        let dir = dir.normalize();
        if dir.is_zero() {
            return None;
        }
        let ray = Ray::new(point![origin.x, origin.y], to_vector(dir));
        self.colliders_in(mask)
            .filter(|(_, c)| !c.is_sensor())
            .filter_map(|(_, c)| {
                c.shape()
                    .cast_ray(&self.collider_pose(c), &ray, max_dist, true)
                    .map(|toi| (c.user_data, toi))
            })
            .fold(None, |best: Option<(u128, f32)>, hit| match best {
                Some(b) if b.1 <= hit.1 => Some(b),
                _ => Some(hit),
            })
    }

    /// Radial impulse on dynamic bodies in `mask`. Full strength within
    /// `radius`, fading linearly to zero across `falloff`. A negative
    /// `impulse_per_length` pulls bodies toward `center`.
    pub fn explode(&mut self, center: Vec2, radius: f32, falloff: f32, impulse_per_length: f32, mask: u32) {
        let reach = radius + falloff;
        let point = point![center.x, center.y];
        let mut impulses: SmallVec<[(RigidBodyHandle, Vec2); 8]> = SmallVec::new();

        for (_, collider) in self.colliders_in(mask) {
            let Some(parent) = collider.parent() else {
                continue;
            };
            let Some(body) = self.bodies.get(parent) else {
                continue;
            };
            if !body.is_dynamic() {
                continue;
            }
            let dist = collider
                .shape()
                .distance_to_point(&self.collider_pose(collider), &point, true);
            if dist > reach {
                continue;
            }
            let scale = if dist <= radius || falloff <= 0.0 {
                1.0
            } else {
                1.0 - (dist - radius) / falloff
            };
            let dir = (from_vector(body.translation()) - center).normalize();
            if dir.is_zero() {
                continue;
            }
            impulses.push((parent, dir * (impulse_per_length * scale)));
        }

        for (handle, impulse) in impulses {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.apply_impulse(to_vector(impulse), true);
            }
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}
