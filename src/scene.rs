use bevy::prelude::*;
use bevy::input::mouse::MouseMotion;
use bevy::render::camera::ClearColorConfig;
use bevy::render::renderer::RenderAdapterInfo;

use crate::effects::{EffectBounds, FlameAnchors, Region};
use crate::session::Session;
use crate::{WINDOW_HEIGHT, WINDOW_WIDTH};

// Tier colors, bottom to top.
const TIER_COLORS: [Color; 3] = [
    Color::srgb(1.0, 0.714, 0.757),
    Color::srgb(1.0, 0.412, 0.706),
    Color::srgb(1.0, 0.522, 0.757),
];
const CANDLE_COLOR: Color = Color::srgb(1.0, 1.0, 0.6);

// Pixels per cake unit when the cake is drawn on the flat overlay.
const FLAT_SCALE: f32 = 90.0;
const CAKE_ORIGIN: Vec3 = Vec3::new(0.0, -170.0, 4.0);

const ORBIT_RADIUS: f32 = 6.0;
const ORBIT_HEIGHT: f32 = 3.0;
const ORBIT_AUTO_SPEED: f32 = 0.15;
const ORBIT_DRAG_SPEED: f32 = 0.005;

/// Picked once at mount; never re-probed.
#[derive(Resource, Clone, Copy, PartialEq, Eq, Debug)]
pub enum SceneMode {
    Rich,
    Flat(FlatReason),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FlatReason {
    NoAdapter,
    Forced,
}

/// Side-effect-free capability check: the rich scene mounts only when a
/// render adapter actually came up and nobody forced the flat look.
pub fn probe_scene(adapter_present: bool, force_flat: bool) -> SceneMode {
    if force_flat {
        SceneMode::Flat(FlatReason::Forced)
    } else if adapter_present {
        SceneMode::Rich
    } else {
        SceneMode::Flat(FlatReason::NoAdapter)
    }
}

pub fn decide_scene(mut cmd: Commands, adapter: Option<Res<RenderAdapterInfo>>) {
    let force_flat = std::env::var("BIRTHDAY_FLAT")
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let mode = probe_scene(adapter.is_some(), force_flat);
    match mode {
        SceneMode::Rich => info!("render adapter up, mounting the 3-D cake"),
        SceneMode::Flat(reason) => info!("flat cake it is ({reason:?})"),
    }
    cmd.insert_resource(mode);
}

/// Cake proportions, built once and handed to whichever renderer won the
/// probe. Radii and heights are in cake units; the flat path multiplies
/// by [`FLAT_SCALE`].
#[derive(Resource, Clone)]
pub struct CakeGeometry {
    pub tiers: [CakeTier; 3],
    pub candle_count: usize,
    pub candle_ring: f32,
    pub candle_radius: f32,
    pub candle_height: f32,
    pub candle_base_y: f32,
    pub flame_lift: f32,
}

#[derive(Clone, Copy)]
pub struct CakeTier {
    pub radius: f32,
    pub height: f32,
    pub y: f32,
}

impl Default for CakeGeometry {
    fn default() -> Self {
        Self {
            tiers: [
                CakeTier { radius: 1.5, height: 0.6, y: -0.5 },
                CakeTier { radius: 1.2, height: 0.5, y: 0.2 },
                CakeTier { radius: 0.9, height: 0.4, y: 0.8 },
            ],
            candle_count: 5,
            candle_ring: 0.6,
            candle_radius: 0.05,
            candle_height: 0.3,
            candle_base_y: 1.2,
            flame_lift: 0.25,
        }
    }
}

impl CakeGeometry {
    /// Candle centers on a ring around the top tier.
    pub fn candle_pos(&self, i: usize) -> Vec3 {
        let ang = (i as f32 / self.candle_count as f32) * std::f32::consts::TAU;
        Vec3::new(
            ang.cos() * self.candle_ring,
            self.candle_base_y,
            ang.sin() * self.candle_ring,
        )
    }

    pub fn flame_anchor(&self, i: usize) -> Vec3 {
        self.candle_pos(i) + Vec3::Y * self.flame_lift
    }

    /// Candle x offsets for the flat front view: an evenly spaced row as
    /// wide as the candle ring.
    pub fn flat_candle_x(&self, i: usize) -> f32 {
        let half = self.candle_ring * FLAT_SCALE;
        if self.candle_count < 2 {
            return 0.0;
        }
        -half + (i as f32 / (self.candle_count - 1) as f32) * half * 2.0
    }
}

/// The camera the card, text and overlay effects render through; screen
/// shake applies here.
#[derive(Component)]
pub struct OverlayCamera;

/// Slow turntable for the rich scene; horizontal drags nudge it.
#[derive(Component)]
pub struct OrbitRig {
    pub angle: f32,
}

/// Flat-mode candle body; melts and regrows slowly while lit.
#[derive(Component)]
pub struct Candle {
    pub phase: f32,
}

/// Everything that belongs to the cake presentation and only shows once
/// the card is open.
#[derive(Component)]
pub struct CakeVisual;

/// Rounded rectangle as a triangle fan, for cards, cake tiers and gift
/// parts.
pub fn rounded_rect_mesh(width: f32, height: f32, radius: f32) -> Mesh {
    use bevy::render::mesh::{Indices, PrimitiveTopology};

    let hw = width / 2.0;
    let hh = height / 2.0;
    let r = radius.min(hw).min(hh);
    let segments = 8;

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    positions.push([0.0, 0.0, 0.0]);
    uvs.push([0.5, 0.5]);

    let corners = [
        (hw - r, hh - r, 0.0),
        (-hw + r, hh - r, std::f32::consts::FRAC_PI_2),
        (-hw + r, -hh + r, std::f32::consts::PI),
        (hw - r, -hh + r, std::f32::consts::PI * 1.5),
    ];

    for (cx, cy, start_angle) in corners {
        for i in 0..=segments {
            let angle = start_angle + (i as f32 / segments as f32) * std::f32::consts::FRAC_PI_2;
            let x = cx + r * angle.cos();
            let y = cy + r * angle.sin();
            positions.push([x, y, 0.0]);
            uvs.push([(x / width) + 0.5, (y / height) + 0.5]);
        }
    }

    let num_outer = positions.len() as u32 - 1;
    for i in 1..=num_outer {
        let next = if i == num_outer { 1 } else { i + 1 };
        indices.extend_from_slice(&[0, i, next]);
    }

    Mesh::new(PrimitiveTopology::TriangleList, default())
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_attribute(Mesh::ATTRIBUTE_UV_0, uvs)
        .with_inserted_indices(Indices::U32(indices))
}

/// Mounts cameras, lights and the cake for whichever mode the probe
/// picked, and publishes effect bounds and candle-tip anchors.
pub fn setup_scene(
    mut cmd: Commands,
    mode: Res<SceneMode>,
    geometry: Res<CakeGeometry>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut mats2d: ResMut<Assets<ColorMaterial>>,
    mut mats3d: ResMut<Assets<StandardMaterial>>,
) {
    let overlay = Region {
        x_min: -WINDOW_WIDTH / 2.0 - 60.0,
        x_max: WINDOW_WIDTH / 2.0 + 60.0,
        bottom: -WINDOW_HEIGHT / 2.0 - 60.0,
        top: WINDOW_HEIGHT / 2.0 + 60.0,
    };

    match *mode {
        SceneMode::Rich => {
            cmd.spawn((
                Camera3d::default(),
                Projection::Perspective(PerspectiveProjection {
                    fov: 50_f32.to_radians(),
                    ..default()
                }),
                Transform::from_xyz(0.0, ORBIT_HEIGHT, ORBIT_RADIUS)
                    .looking_at(Vec3::new(0.0, 0.8, 0.0), Vec3::Y),
                OrbitRig { angle: 0.0 },
            ));
            cmd.spawn((
                Camera2d,
                Camera {
                    order: 1,
                    clear_color: ClearColorConfig::None,
                    ..default()
                },
                OverlayCamera,
            ));

            cmd.insert_resource(AmbientLight {
                color: Color::WHITE,
                brightness: 250.0,
            });
            cmd.spawn((
                DirectionalLight {
                    illuminance: 8000.0,
                    shadows_enabled: false,
                    ..default()
                },
                Transform::from_xyz(5.0, 5.0, 5.0).looking_at(Vec3::ZERO, Vec3::Y),
            ));

            for (tier, color) in geometry.tiers.iter().zip(TIER_COLORS) {
                cmd.spawn((
                    Mesh3d(meshes.add(Cylinder::new(tier.radius, tier.height))),
                    MeshMaterial3d(mats3d.add(StandardMaterial {
                        base_color: color,
                        ..default()
                    })),
                    Transform::from_xyz(0.0, tier.y, 0.0),
                    Visibility::Hidden,
                    CakeVisual,
                ));
            }

            let candle_mesh =
                meshes.add(Cylinder::new(geometry.candle_radius, geometry.candle_height));
            let candle_mat = mats3d.add(StandardMaterial {
                base_color: CANDLE_COLOR,
                ..default()
            });
            for i in 0..geometry.candle_count {
                cmd.spawn((
                    Mesh3d(candle_mesh.clone()),
                    MeshMaterial3d(candle_mat.clone()),
                    Transform::from_translation(geometry.candle_pos(i)),
                    Visibility::Hidden,
                    CakeVisual,
                ));
            }

            cmd.insert_resource(EffectBounds {
                overlay,
                scene: Region {
                    x_min: -2.5,
                    x_max: 2.5,
                    bottom: -2.0,
                    top: 5.0,
                },
                burst: Region {
                    x_min: -2.0,
                    x_max: 2.0,
                    bottom: 2.5,
                    top: 4.5,
                },
            });
            cmd.insert_resource(FlameAnchors {
                points: (0..geometry.candle_count)
                    .map(|i| geometry.flame_anchor(i))
                    .collect(),
            });
        }
        SceneMode::Flat(reason) => {
            cmd.spawn((Camera2d, OverlayCamera));

            for (i, (tier, color)) in geometry.tiers.iter().zip(TIER_COLORS).enumerate() {
                let w = tier.radius * 2.0 * FLAT_SCALE;
                let h = tier.height * FLAT_SCALE;
                cmd.spawn((
                    Mesh2d(meshes.add(rounded_rect_mesh(w, h, h * 0.4))),
                    MeshMaterial2d(mats2d.add(ColorMaterial::from(color))),
                    Transform::from_translation(
                        CAKE_ORIGIN + Vec3::new(0.0, tier.y * FLAT_SCALE, i as f32 * 0.1),
                    ),
                    Visibility::Hidden,
                    CakeVisual,
                ));
            }

            let candle_mesh = meshes.add(Rectangle::new(
                geometry.candle_radius * 2.0 * FLAT_SCALE,
                geometry.candle_height * FLAT_SCALE,
            ));
            let candle_mat = mats2d.add(ColorMaterial::from(CANDLE_COLOR));
            let candle_y = CAKE_ORIGIN.y + geometry.candle_base_y * FLAT_SCALE;
            for i in 0..geometry.candle_count {
                cmd.spawn((
                    Mesh2d(candle_mesh.clone()),
                    MeshMaterial2d(candle_mat.clone()),
                    Transform::from_xyz(geometry.flat_candle_x(i), candle_y, CAKE_ORIGIN.z + 1.0),
                    Visibility::Hidden,
                    Candle {
                        phase: i as f32 * 0.4,
                    },
                    CakeVisual,
                ));
            }

            if reason == FlatReason::NoAdapter {
                cmd.spawn((
                    Text2d::new("richer 3-D scene unavailable here — enjoy the classic cake"),
                    TextFont {
                        font_size: 14.0,
                        ..default()
                    },
                    TextColor(Color::srgba(0.35, 0.3, 0.4, 0.8)),
                    Transform::from_xyz(0.0, -WINDOW_HEIGHT / 2.0 + 18.0, 10.0),
                    Visibility::Hidden,
                    CakeVisual,
                ));
            }

            cmd.insert_resource(EffectBounds {
                overlay,
                scene: overlay,
                burst: Region {
                    x_min: -WINDOW_WIDTH / 2.0 + 60.0,
                    x_max: WINDOW_WIDTH / 2.0 - 60.0,
                    bottom: 40.0,
                    top: WINDOW_HEIGHT / 2.0 - 80.0,
                },
            });
            cmd.insert_resource(FlameAnchors {
                points: (0..geometry.candle_count)
                    .map(|i| {
                        Vec3::new(
                            geometry.flat_candle_x(i),
                            candle_y
                                + (geometry.candle_height / 2.0 + geometry.flame_lift * 0.3)
                                    * FLAT_SCALE,
                            CAKE_ORIGIN.z + 2.0,
                        )
                    })
                    .collect(),
            });
        }
    }
}

/// Slow turntable around the cake; a horizontal drag while the card is
/// open spins it by hand.
pub fn orbit_camera(
    time: Res<Time>,
    session: Res<Session>,
    mouse: Res<ButtonInput<MouseButton>>,
    mut motion: EventReader<MouseMotion>,
    mut rig: Query<(&mut Transform, &mut OrbitRig)>,
) {
    let mut drag = 0.0;
    for ev in motion.read() {
        if mouse.pressed(MouseButton::Left) {
            drag += ev.delta.x;
        }
    }
    for (mut tf, mut rig) in rig.iter_mut() {
        if session.card_open() {
            rig.angle += ORBIT_AUTO_SPEED * time.delta_secs() + drag * ORBIT_DRAG_SPEED;
        }
        let angle = rig.angle;
        *tf = Transform::from_xyz(
            angle.sin() * ORBIT_RADIUS,
            ORBIT_HEIGHT,
            angle.cos() * ORBIT_RADIUS,
        )
        .looking_at(Vec3::new(0.0, 0.8, 0.0), Vec3::Y);
    }
}

/// Candles slowly melt down and regrow, the way the styled original
/// breathes. Scale only; the wax never actually runs out.
pub fn melt_candles(time: Res<Time>, mut candles: Query<(&mut Transform, &Candle)>) {
    let t = time.elapsed_secs();
    for (mut tf, candle) in candles.iter_mut() {
        let cycle = t * std::f32::consts::TAU / 3.0 + candle.phase;
        tf.scale.y = 0.84 + 0.16 * cycle.cos();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectBounds;
    use bevy::ecs::system::RunSystemOnce;

    #[test]
    fn probe_prefers_rich_only_with_an_adapter() {
        assert_eq!(probe_scene(true, false), SceneMode::Rich);
        assert_eq!(probe_scene(false, false), SceneMode::Flat(FlatReason::NoAdapter));
        assert_eq!(probe_scene(true, true), SceneMode::Flat(FlatReason::Forced));
        assert_eq!(probe_scene(false, true), SceneMode::Flat(FlatReason::Forced));
    }

    #[test]
    fn candles_sit_on_the_ring() {
        let geo = CakeGeometry::default();
        for i in 0..geo.candle_count {
            let p = geo.candle_pos(i);
            let r = (p.x * p.x + p.z * p.z).sqrt();
            assert!((r - geo.candle_ring).abs() < 1e-4);
            assert_eq!(p.y, geo.candle_base_y);
            assert!(geo.flame_anchor(i).y > p.y);
        }
    }

    #[test]
    fn flat_candle_row_is_symmetric() {
        let geo = CakeGeometry::default();
        let first = geo.flat_candle_x(0);
        let last = geo.flat_candle_x(geo.candle_count - 1);
        assert!((first + last).abs() < 1e-3);
        assert!(first < last);
    }

    #[test]
    fn rounded_rect_mesh_is_a_closed_fan() {
        let mesh = rounded_rect_mesh(100.0, 60.0, 12.0);
        // Center vertex plus four corner arcs of nine vertices each.
        assert_eq!(mesh.count_vertices(), 1 + 4 * 9);
    }

    fn scene_world(mode: SceneMode) -> World {
        let mut world = World::new();
        world.insert_resource(Assets::<Mesh>::default());
        world.insert_resource(Assets::<ColorMaterial>::default());
        world.insert_resource(Assets::<StandardMaterial>::default());
        world.insert_resource(CakeGeometry::default());
        world.insert_resource(mode);
        world
            .run_system_once(setup_scene)
            .expect("setup_scene should run");
        world
    }

    #[test]
    fn flat_probe_never_mounts_the_3d_path() {
        let mut world = scene_world(probe_scene(false, false));
        assert_eq!(world.query::<&Mesh3d>().iter(&world).count(), 0);
        assert_eq!(world.query::<&Camera3d>().iter(&world).count(), 0);
        assert!(world.query::<&Mesh2d>().iter(&world).count() > 0);
        assert!(world.get_resource::<EffectBounds>().is_some());
        assert!(world.get_resource::<FlameAnchors>().is_some());
    }

    #[test]
    fn rich_probe_mounts_cake_and_both_cameras() {
        let mut world = scene_world(probe_scene(true, false));
        assert_eq!(world.query::<&Camera3d>().iter(&world).count(), 1);
        assert_eq!(world.query::<&Camera2d>().iter(&world).count(), 1);
        // Three tiers plus five candles.
        assert_eq!(world.query::<&Mesh3d>().iter(&world).count(), 8);
        let anchors = world.resource::<FlameAnchors>();
        assert_eq!(anchors.points.len(), 5);
    }
}
