use bevy::prelude::*;
use rand::Rng;

use crate::scene::SceneMode;
use crate::session::{EffectPolicy, Session};

// Motion constants are expressed per reference tick (60 Hz) or per second
// and integrated with the real frame delta, so behavior is frame-rate
// independent. `scaled` converts an instance from abstract scene units
// into the units of the space it is spawned in (world units for the 3-D
// scene, pixels for the flat overlay).
pub const TICK_HZ: f32 = 60.0;

pub const FIREWORK_DAMPING: f32 = 0.95;
pub const FIREWORK_LIFE_TICKS: f32 = 60.0;
const FIREWORK_GRAVITY: f32 = 0.02;
const FIREWORK_SPEED_MAX: f32 = 2.0;
const BURST_CHANCE_PER_TICK: f64 = 0.08;

const BALLOON_RISE_MIN: f32 = 0.12;
const BALLOON_RISE_MAX: f32 = 0.30;
const SPARKLE_RISE_MIN: f32 = 0.12;
const SPARKLE_RISE_MAX: f32 = 0.72;

// Pixels per abstract scene unit on the flat overlay.
const OVERLAY_UNIT: f32 = 240.0;
// Unit scale for firework sparks, whose ranges are already per tick.
const SPARK_UNIT_FLAT: f32 = 2.0;
const SPARK_UNIT_RICH: f32 = 0.02;

// Overlay depth layers, above the card (cards sit at z 0..10).
const Z_BALLOON: f32 = 30.0;
const Z_SPARKLE: f32 = 35.0;
const Z_FIREWORK: f32 = 38.0;
const Z_CONFETTI: f32 = 40.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectKind {
    Balloon,
    Sparkle,
    Firework,
    Confetti,
    Flame,
}

/// How many instances each kind keeps alive. Spawning only happens when a
/// kind has zero live instances, so these are hard steady-state caps.
#[derive(Resource, Clone, Copy)]
pub struct EffectConfig {
    pub balloons: usize,
    pub sparkles: usize,
    pub confetti: usize,
    pub firework_burst: usize,
    pub firework_spark_cap: usize,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            balloons: 7,
            sparkles: 15,
            confetti: 90,
            firework_burst: 60,
            firework_spark_cap: 180,
        }
    }
}

/// Rectangular region an infinite-life instance lives in; leaving through
/// one edge recycles it at the opposite edge.
#[derive(Clone, Copy, Debug)]
pub struct Region {
    pub x_min: f32,
    pub x_max: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Region {
    pub fn random_x(&self, rng: &mut impl Rng) -> f32 {
        rng.random_range(self.x_min..self.x_max)
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

/// Where effects live, filled in by scene setup: `overlay` in pixels for
/// the 2-D layers, `scene` in world units for 3-D balloons, `burst` for
/// firework origins.
#[derive(Resource, Clone, Copy)]
pub struct EffectBounds {
    pub overlay: Region,
    pub scene: Region,
    pub burst: Region,
}

/// Candle-tip positions (space depends on the active scene mode).
#[derive(Resource, Default)]
pub struct FlameAnchors {
    pub points: Vec<Vec3>,
}

pub fn burst_allowed(live: usize, burst: usize, cap: usize) -> bool {
    live + burst <= cap
}

// ---------------------------------------------------------------------------
// Instance components. Every motion rule is a pure method so lifetime,
// recycle and damping behavior can be exercised without a world.
// ---------------------------------------------------------------------------

#[derive(Component, Clone, Copy, Debug)]
pub struct Balloon {
    pub rise: f32,
    pub sway_amp: f32,
    pub sway_freq: f32,
    pub phase: f32,
    pub hue: f32,
    pub unit: f32,
    pub region: Region,
}

impl Balloon {
    pub fn random(rng: &mut impl Rng, unit: f32, region: Region) -> Self {
        Self {
            rise: rng.random_range(BALLOON_RISE_MIN..BALLOON_RISE_MAX) * unit,
            sway_amp: rng.random_range(0.04..0.12) * unit,
            sway_freq: rng.random_range(0.6..1.4),
            phase: rng.random_range(0.0..std::f32::consts::TAU),
            hue: rng.random_range(0.0..360.0),
            unit,
            region,
        }
    }

    /// Advance one frame; true means the balloon drifted past the top
    /// bound and wants recycling.
    pub fn step(&self, pos: &mut Vec3, t: f32, dt: f32) -> bool {
        pos.y += self.rise * dt;
        pos.x += (t * self.sway_freq + self.phase).sin() * self.sway_amp * dt;
        pos.y > self.region.top
    }

    /// Fresh parameters, same slot: respawn at the bottom bound with new
    /// x, hue and speed. Recycling replaces, it never adds.
    pub fn recycle(&mut self, pos: &mut Vec3, rng: &mut impl Rng) {
        let next = Balloon::random(rng, self.unit, self.region);
        pos.y = self.region.bottom;
        pos.x = self.region.random_x(rng);
        *self = next;
    }

    pub fn color(&self) -> Color {
        Color::hsla(self.hue, 0.7, 0.6, 0.95)
    }
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Sparkle {
    pub rise: f32,
    pub period: f32,
    pub phase: f32,
    pub region: Region,
}

impl Sparkle {
    pub fn random(rng: &mut impl Rng, unit: f32, region: Region) -> Self {
        Self {
            rise: rng.random_range(SPARKLE_RISE_MIN..SPARKLE_RISE_MAX) * unit,
            period: rng.random_range(2.0..4.0),
            phase: rng.random_range(0.0..4.0),
            region,
        }
    }

    pub fn step(&self, pos: &mut Vec3, dt: f32) -> bool {
        pos.y += self.rise * dt;
        pos.y > self.region.top
    }

    /// Grow-then-fade loop: 0 at the cycle edges, 1.5 at the midpoint.
    pub fn pulse(&self, t: f32) -> f32 {
        let cycle = ((t + self.phase) / self.period).fract();
        let tri = if cycle < 0.5 {
            cycle * 2.0
        } else {
            2.0 - cycle * 2.0
        };
        tri * 1.5
    }
}

#[derive(Component, Clone, Copy, Debug)]
pub struct FireworkSpark {
    pub vel: Vec3,
    pub life: f32,
    pub gravity: f32,
}

impl FireworkSpark {
    /// One burst fragment: uniformly random direction (a full circle when
    /// planar, a sphere otherwise), outward speed uniform in [0, max).
    pub fn random(rng: &mut impl Rng, unit: f32, planar: bool) -> Self {
        let speed = rng.random_range(0.0..FIREWORK_SPEED_MAX) * unit;
        let dir = if planar {
            let ang = rng.random_range(0.0..std::f32::consts::TAU);
            Vec3::new(ang.cos(), ang.sin(), 0.0)
        } else {
            let ang = rng.random_range(0.0..std::f32::consts::TAU);
            let z = rng.random_range(-1.0_f32..1.0);
            let r = (1.0 - z * z).sqrt();
            Vec3::new(r * ang.cos(), r * ang.sin(), z)
        };
        Self {
            vel: dir * speed,
            life: FIREWORK_LIFE_TICKS,
            gravity: FIREWORK_GRAVITY * unit,
        }
    }

    /// Advance by `ticks` reference ticks. Velocity decays toward rest
    /// while a slight downward pull settles the fragment. Returns false
    /// once the life countdown is spent.
    pub fn step(&mut self, pos: &mut Vec3, ticks: f32) -> bool {
        *pos += self.vel * ticks;
        self.vel *= FIREWORK_DAMPING.powf(ticks);
        self.vel.y -= self.gravity * ticks;
        self.life -= ticks;
        self.life > 0.0
    }

    pub fn remaining(&self) -> f32 {
        (self.life / FIREWORK_LIFE_TICKS).max(0.0)
    }
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Confetti {
    pub vel: Vec2,
    pub spin: f32,
    pub hue: f32,
    pub region: Region,
}

impl Confetti {
    pub fn random(rng: &mut impl Rng, region: Region) -> Self {
        Self {
            vel: Vec2::new(
                rng.random_range(-30.0..30.0),
                rng.random_range(-190.0..-90.0),
            ),
            spin: rng.random_range(-6.0..6.0),
            hue: rng.random_range(0.0..360.0),
            region,
        }
    }

    pub fn step(&self, pos: &mut Vec3, dt: f32) -> bool {
        pos.x += self.vel.x * dt;
        pos.y += self.vel.y * dt;
        pos.y < self.region.bottom
    }

    pub fn recycle(&mut self, pos: &mut Vec3, rng: &mut impl Rng) {
        let next = Confetti::random(rng, self.region);
        pos.y = self.region.top;
        pos.x = self.region.random_x(rng);
        *self = next;
    }

    pub fn color(&self) -> Color {
        Color::hsla(self.hue, 0.85, 0.6, 0.9)
    }
}

#[derive(Component, Clone, Copy, Debug)]
pub struct Flame {
    pub anchor: Vec3,
    pub phase: f32,
    pub freq: f32,
    pub unit: f32,
}

impl Flame {
    pub fn random(rng: &mut impl Rng, anchor: Vec3, unit: f32) -> Self {
        Self {
            anchor,
            phase: rng.random_range(0.0..std::f32::consts::TAU),
            freq: rng.random_range(9.0..14.0),
            unit,
        }
    }

    /// Flicker: scale wobble plus a tiny vertical shiver around the
    /// candle tip.
    pub fn flicker(&self, t: f32) -> (f32, f32) {
        let s = 1.0 + (t * self.freq + self.phase).sin() * 0.25;
        let dy = (t * self.freq * 0.7 + self.phase).cos() * 0.01 * self.unit;
        (s, dy)
    }
}

// ---------------------------------------------------------------------------
// Scheduler systems
// ---------------------------------------------------------------------------

/// Activation sweep, once per frame. A kind whose gate just started
/// holding gets its configured count of freshly randomized instances; a
/// kind whose gate stopped holding is cleared immediately. Respawn only
/// ever happens from zero, so counts stay bounded.
#[allow(clippy::too_many_arguments)]
pub fn sync_effects(
    mut cmd: Commands,
    session: Res<Session>,
    policy: Res<EffectPolicy>,
    config: Res<EffectConfig>,
    bounds: Res<EffectBounds>,
    mode: Res<SceneMode>,
    anchors: Res<FlameAnchors>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut mats2d: ResMut<Assets<ColorMaterial>>,
    mut mats3d: ResMut<Assets<StandardMaterial>>,
    balloons: Query<Entity, With<Balloon>>,
    sparkles: Query<Entity, With<Sparkle>>,
    sparks: Query<Entity, With<FireworkSpark>>,
    confetti: Query<Entity, With<Confetti>>,
    flames: Query<Entity, With<Flame>>,
) {
    let mut rng = rand::rng();
    let rich = matches!(*mode, SceneMode::Rich);

    let balloons_on = policy.gate_for(EffectKind::Balloon).allows(&session);
    if balloons_on && balloons.is_empty() {
        for i in 0..config.balloons {
            if rich {
                let region = bounds.scene;
                let b = Balloon::random(&mut rng, 1.0, region);
                let ang = (i as f32 / config.balloons as f32) * std::f32::consts::TAU;
                let pos = Vec3::new(
                    ang.cos() * 2.0,
                    rng.random_range(region.bottom..region.bottom + region.height() * 0.5),
                    ang.sin() * 2.0,
                );
                cmd.spawn((
                    Mesh3d(meshes.add(Sphere::new(0.3))),
                    MeshMaterial3d(mats3d.add(StandardMaterial {
                        base_color: b.color(),
                        ..default()
                    })),
                    Transform::from_translation(pos),
                    b,
                ))
                .with_children(|p| {
                    p.spawn((
                        Mesh3d(meshes.add(Cylinder::new(0.01, 1.0))),
                        MeshMaterial3d(mats3d.add(StandardMaterial {
                            base_color: Color::srgb(0.5, 0.5, 0.5),
                            ..default()
                        })),
                        Transform::from_xyz(0.0, -0.5, 0.0),
                    ));
                });
            } else {
                let region = bounds.overlay;
                let b = Balloon::random(&mut rng, OVERLAY_UNIT, region);
                let radius = rng.random_range(12.0..22.0);
                // Staggered entry: start somewhere below the viewport.
                let pos = Vec3::new(
                    region.random_x(&mut rng),
                    rng.random_range(region.bottom - region.height()..region.bottom),
                    Z_BALLOON,
                );
                cmd.spawn((
                    Mesh2d(meshes.add(Circle::new(radius))),
                    MeshMaterial2d(mats2d.add(ColorMaterial::from(b.color()))),
                    Transform::from_translation(pos),
                    b,
                ))
                .with_children(|p| {
                    p.spawn((
                        Mesh2d(meshes.add(Rectangle::new(1.5, 42.0))),
                        MeshMaterial2d(
                            mats2d.add(ColorMaterial::from(Color::srgba(0.4, 0.4, 0.4, 0.8))),
                        ),
                        Transform::from_xyz(0.0, -radius - 21.0, -0.1),
                    ));
                });
            }
        }
    } else if !balloons_on && !balloons.is_empty() {
        despawn_all(&mut cmd, balloons.iter());
    }

    let sparkles_on = policy.gate_for(EffectKind::Sparkle).allows(&session);
    if sparkles_on && sparkles.is_empty() {
        let region = bounds.overlay;
        let mesh = meshes.add(Circle::new(5.0));
        let gold = mats2d.add(ColorMaterial::from(Color::srgba(1.0, 0.85, 0.25, 0.9)));
        for _ in 0..config.sparkles {
            let s = Sparkle::random(&mut rng, OVERLAY_UNIT, region);
            let pos = Vec3::new(
                region.random_x(&mut rng),
                rng.random_range(region.bottom..region.top),
                Z_SPARKLE,
            );
            cmd.spawn((
                Mesh2d(mesh.clone()),
                MeshMaterial2d(gold.clone()),
                Transform::from_translation(pos).with_scale(Vec3::ZERO),
                s,
            ));
        }
    } else if !sparkles_on && !sparkles.is_empty() {
        despawn_all(&mut cmd, sparkles.iter());
    }

    let confetti_on = policy.gate_for(EffectKind::Confetti).allows(&session);
    if confetti_on && confetti.is_empty() {
        let region = bounds.overlay;
        let mesh = meshes.add(Rectangle::new(6.0, 10.0));
        for _ in 0..config.confetti {
            let c = Confetti::random(&mut rng, region);
            // Seed the whole column so the rain is already falling.
            let pos = Vec3::new(
                region.random_x(&mut rng),
                rng.random_range(region.bottom..region.top + region.height()),
                Z_CONFETTI,
            );
            cmd.spawn((
                Mesh2d(mesh.clone()),
                MeshMaterial2d(mats2d.add(ColorMaterial::from(c.color()))),
                Transform::from_translation(pos),
                c,
            ));
        }
    } else if !confetti_on && !confetti.is_empty() {
        despawn_all(&mut cmd, confetti.iter());
    }

    let flames_on = policy.gate_for(EffectKind::Flame).allows(&session);
    if flames_on && flames.is_empty() && !anchors.points.is_empty() {
        if rich {
            let mesh = meshes.add(Sphere::new(0.07));
            let mat = mats3d.add(StandardMaterial {
                base_color: Color::srgb(1.0, 0.95, 0.3),
                emissive: LinearRgba::rgb(4.0, 2.2, 0.3),
                ..default()
            });
            for &anchor in &anchors.points {
                let f = Flame::random(&mut rng, anchor, 1.0);
                cmd.spawn((
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(mat.clone()),
                    Transform::from_translation(anchor),
                    f,
                ));
            }
        } else {
            let mesh = meshes.add(Circle::new(5.0));
            let mat = mats2d.add(ColorMaterial::from(Color::srgb(1.0, 0.75, 0.1)));
            for &anchor in &anchors.points {
                let f = Flame::random(&mut rng, anchor, OVERLAY_UNIT);
                cmd.spawn((
                    Mesh2d(mesh.clone()),
                    MeshMaterial2d(mat.clone()),
                    Transform::from_translation(anchor),
                    f,
                ));
            }
        }
    } else if !flames_on && !flames.is_empty() {
        despawn_all(&mut cmd, flames.iter());
    }

    // Firework sparks are born in bursts by `launch_fireworks`; the sweep
    // only clears them when their gate drops (e.g. on reset).
    if !policy.gate_for(EffectKind::Firework).allows(&session) && !sparks.is_empty() {
        despawn_all(&mut cmd, sparks.iter());
    }
}

/// Fires a burst on a randomized cadence while fireworks are active,
/// capped so repeated bursts never accumulate past the spark ceiling.
#[allow(clippy::too_many_arguments)]
pub fn launch_fireworks(
    mut cmd: Commands,
    time: Res<Time>,
    session: Res<Session>,
    policy: Res<EffectPolicy>,
    config: Res<EffectConfig>,
    bounds: Res<EffectBounds>,
    mode: Res<SceneMode>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut mats2d: ResMut<Assets<ColorMaterial>>,
    mut mats3d: ResMut<Assets<StandardMaterial>>,
    sparks: Query<(), With<FireworkSpark>>,
) {
    if !policy.gate_for(EffectKind::Firework).allows(&session) {
        return;
    }
    let live = sparks.iter().count();
    if !burst_allowed(live, config.firework_burst, config.firework_spark_cap) {
        return;
    }

    let mut rng = rand::rng();
    let ticks = time.delta_secs() * TICK_HZ;
    let chance = (BURST_CHANCE_PER_TICK * f64::from(ticks)).min(1.0);
    if live > 0 && !rng.random_bool(chance) {
        return;
    }

    let rich = matches!(*mode, SceneMode::Rich);
    let region = bounds.burst;
    let hue = rng.random_range(0.0..360.0);
    let origin = if rich {
        Vec3::new(
            region.random_x(&mut rng),
            rng.random_range(region.bottom..region.top),
            rng.random_range(-2.0..2.0),
        )
    } else {
        Vec3::new(
            region.random_x(&mut rng),
            rng.random_range(region.bottom..region.top),
            Z_FIREWORK,
        )
    };

    if rich {
        let mesh = meshes.add(Sphere::new(0.05));
        let mat = mats3d.add(StandardMaterial {
            base_color: Color::hsl(hue, 1.0, 0.6),
            emissive: LinearRgba::rgb(3.0, 1.8, 0.4),
            ..default()
        });
        for _ in 0..config.firework_burst {
            let spark = FireworkSpark::random(&mut rng, SPARK_UNIT_RICH, false);
            cmd.spawn((
                Mesh3d(mesh.clone()),
                MeshMaterial3d(mat.clone()),
                Transform::from_translation(origin),
                spark,
            ));
        }
    } else {
        let mesh = meshes.add(Circle::new(2.5));
        let mat = mats2d.add(ColorMaterial::from(Color::hsla(hue, 1.0, 0.6, 1.0)));
        for _ in 0..config.firework_burst {
            let spark = FireworkSpark::random(&mut rng, SPARK_UNIT_FLAT, true);
            cmd.spawn((
                Mesh2d(mesh.clone()),
                MeshMaterial2d(mat.clone()),
                Transform::from_translation(origin),
                spark,
            ));
        }
    }
}

pub fn tick_balloons(
    time: Res<Time>,
    mut mats2d: ResMut<Assets<ColorMaterial>>,
    mut mats3d: ResMut<Assets<StandardMaterial>>,
    mut q: Query<(
        &mut Transform,
        &mut Balloon,
        Option<&MeshMaterial2d<ColorMaterial>>,
        Option<&MeshMaterial3d<StandardMaterial>>,
    )>,
) {
    let mut rng = rand::rng();
    let t = time.elapsed_secs();
    let dt = time.delta_secs();
    for (mut tf, mut balloon, m2d, m3d) in q.iter_mut() {
        if balloon.step(&mut tf.translation, t, dt) {
            balloon.recycle(&mut tf.translation, &mut rng);
            if let Some(handle) = m2d {
                if let Some(mat) = mats2d.get_mut(&handle.0) {
                    mat.color = balloon.color();
                }
            }
            if let Some(handle) = m3d {
                if let Some(mat) = mats3d.get_mut(&handle.0) {
                    mat.base_color = balloon.color();
                }
            }
        }
    }
}

pub fn tick_sparkles(time: Res<Time>, mut q: Query<(&mut Transform, &Sparkle)>) {
    let mut rng = rand::rng();
    let t = time.elapsed_secs();
    let dt = time.delta_secs();
    for (mut tf, sparkle) in q.iter_mut() {
        if sparkle.step(&mut tf.translation, dt) {
            tf.translation.y = sparkle.region.bottom;
            tf.translation.x = sparkle.region.random_x(&mut rng);
        }
        tf.scale = Vec3::splat(sparkle.pulse(t));
    }
}

pub fn tick_fireworks(
    mut cmd: Commands,
    time: Res<Time>,
    mut q: Query<(Entity, &mut Transform, &mut FireworkSpark)>,
) {
    let ticks = time.delta_secs() * TICK_HZ;
    for (entity, mut tf, mut spark) in q.iter_mut() {
        if spark.step(&mut tf.translation, ticks) {
            tf.scale = Vec3::splat(spark.remaining());
        } else {
            cmd.entity(entity).despawn_recursive();
        }
    }
}

pub fn tick_confetti(time: Res<Time>, mut q: Query<(&mut Transform, &mut Confetti)>) {
    let mut rng = rand::rng();
    let dt = time.delta_secs();
    for (mut tf, mut confetti) in q.iter_mut() {
        if confetti.step(&mut tf.translation, dt) {
            confetti.recycle(&mut tf.translation, &mut rng);
        }
        tf.rotate_z(confetti.spin * dt);
    }
}

pub fn tick_flames(time: Res<Time>, mut q: Query<(&mut Transform, &Flame)>) {
    let t = time.elapsed_secs();
    for (mut tf, flame) in q.iter_mut() {
        let (scale, dy) = flame.flicker(t);
        tf.scale = Vec3::splat(scale);
        tf.translation = flame.anchor + Vec3::Y * dy;
    }
}

fn despawn_all(cmd: &mut Commands, entities: impl Iterator<Item = Entity>) {
    for entity in entities {
        cmd.entity(entity).despawn_recursive();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const REGION: Region = Region {
        x_min: -100.0,
        x_max: 100.0,
        bottom: -50.0,
        top: 50.0,
    };

    #[test]
    fn balloon_parameters_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let b = Balloon::random(&mut rng, 1.0, REGION);
            assert!(b.rise >= BALLOON_RISE_MIN && b.rise < BALLOON_RISE_MAX);
            assert!(b.hue >= 0.0 && b.hue < 360.0);
            assert!(b.sway_freq >= 0.6 && b.sway_freq < 1.4);
        }
    }

    #[test]
    fn balloon_recycles_instead_of_accumulating() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut flock: Vec<(Balloon, Vec3)> = (0..7)
            .map(|_| {
                let b = Balloon::random(&mut rng, 1.0, REGION);
                (b, Vec3::new(0.0, REGION.bottom, 0.0))
            })
            .collect();

        // Long enough for every balloon to wrap several times.
        for frame in 0..100_000 {
            let t = frame as f32 / TICK_HZ;
            for (balloon, pos) in flock.iter_mut() {
                if balloon.step(pos, t, 1.0 / TICK_HZ) {
                    balloon.recycle(pos, &mut rng);
                }
            }
        }

        assert_eq!(flock.len(), 7);
        for (balloon, pos) in &flock {
            // At most one frame of overshoot past the top before recycle.
            assert!(pos.y <= REGION.top + 1.0);
            assert!(pos.y >= REGION.bottom);
            assert!(balloon.rise > 0.0);
        }
    }

    #[test]
    fn balloon_recycle_lands_on_bottom_bound_with_fresh_x() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut b = Balloon::random(&mut rng, 1.0, REGION);
        let mut pos = Vec3::new(12.0, REGION.top + 5.0, 0.0);
        b.recycle(&mut pos, &mut rng);
        assert_eq!(pos.y, REGION.bottom);
        assert!(pos.x >= REGION.x_min && pos.x < REGION.x_max);
    }

    #[test]
    fn firework_spark_dies_when_life_runs_out() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut spark = FireworkSpark::random(&mut rng, 1.0, true);
        let mut pos = Vec3::ZERO;
        let mut alive_ticks = 0;
        while spark.step(&mut pos, 1.0) {
            alive_ticks += 1;
            assert!(alive_ticks <= FIREWORK_LIFE_TICKS as u32);
        }
        assert_eq!(alive_ticks, FIREWORK_LIFE_TICKS as u32 - 1);
        assert_eq!(spark.remaining(), 0.0);
    }

    #[test]
    fn firework_burst_speed_decays_monotonically() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut spark = FireworkSpark::random(&mut rng, 1.0, true);
        // Horizontal speed is untouched by gravity, so damping must
        // shrink it every tick.
        let mut pos = Vec3::ZERO;
        let mut last = spark.vel.x.abs();
        for _ in 0..30 {
            spark.step(&mut pos, 1.0);
            let now = spark.vel.x.abs();
            assert!(now <= last);
            last = now;
        }
    }

    #[test]
    fn firework_spark_speed_within_range() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..500 {
            let spark = FireworkSpark::random(&mut rng, 1.0, false);
            assert!(spark.vel.length() < FIREWORK_SPEED_MAX);
        }
    }

    #[test]
    fn burst_cap_blocks_overfill() {
        assert!(burst_allowed(0, 60, 180));
        assert!(burst_allowed(120, 60, 180));
        assert!(!burst_allowed(121, 60, 180));
        assert!(!burst_allowed(180, 60, 180));
    }

    #[test]
    fn sparkle_pulse_loops_between_zero_and_peak() {
        let mut rng = StdRng::seed_from_u64(7);
        let s = Sparkle::random(&mut rng, 1.0, REGION);
        let mut peak: f32 = 0.0;
        for i in 0..1000 {
            let v = s.pulse(i as f32 * 0.01);
            assert!((0.0..=1.5).contains(&v));
            peak = peak.max(v);
        }
        assert!(peak > 1.2, "pulse never approached its peak: {peak}");
    }

    #[test]
    fn confetti_recycles_at_top() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut c = Confetti::random(&mut rng, REGION);
        let mut pos = Vec3::new(0.0, REGION.top, 0.0);
        let mut wrapped = false;
        for _ in 0..10_000 {
            if c.step(&mut pos, 1.0 / TICK_HZ) {
                c.recycle(&mut pos, &mut rng);
                wrapped = true;
                assert_eq!(pos.y, REGION.top);
                assert!(pos.x >= REGION.x_min && pos.x < REGION.x_max);
            }
        }
        assert!(wrapped, "confetti never reached the bottom bound");
    }

    #[test]
    fn flame_flicker_stays_near_unit_scale() {
        let mut rng = StdRng::seed_from_u64(9);
        let f = Flame::random(&mut rng, Vec3::ZERO, 1.0);
        for i in 0..1000 {
            let (scale, _) = f.flicker(i as f32 * 0.016);
            assert!((0.7..=1.3).contains(&scale));
        }
    }
}
