//! BIRTHDAY WISH - an animated birthday card
//! Tap the gift, make a wish, blow the candles out.

use bevy::{
    audio::{PlaybackMode, Volume},
    input::keyboard::{Key, KeyboardInput},
    prelude::*,
    window::PrimaryWindow,
};
use rand::Rng;

mod detect;
mod effects;
mod scene;
mod session;

use detect::SwipeTracker;
use effects::{Balloon, EffectConfig};
use scene::{CakeGeometry, CakeVisual, OverlayCamera, SceneMode};
use session::{EffectPolicy, Session};

// SETTINGS
const WINDOW_WIDTH: f32 = 1280.0;
const WINDOW_HEIGHT: f32 = 720.0;

// COLORS - soft and festive
const BG_COLOR: Color = Color::srgb(0.96, 0.88, 0.95);
const CARD_COLOR: Color = Color::srgba(1.0, 1.0, 1.0, 0.88);
const GIFT_PINK: Color = Color::srgb(0.91, 0.12, 0.39);
const GIFT_LID: Color = Color::srgb(0.78, 0.08, 0.32);
const RIBBON_GOLD: Color = Color::srgb(1.0, 0.8, 0.25);
const HEADLINE_PINK: Color = Color::srgb(0.86, 0.2, 0.5);
const BODY_GRAY: Color = Color::srgb(0.35, 0.33, 0.38);
const MAGIC_PURPLE: Color = Color::srgb(0.48, 0.25, 0.72);
const BLOWN_ORANGE: Color = Color::srgb(0.92, 0.45, 0.1);

// Sizes
const CARD_W: f32 = 470.0;
const CARD_H: f32 = 590.0;
const GIFT_W: f32 = 130.0;
const GIFT_H: f32 = 110.0;
const BLOW_BTN_W: f32 = 240.0;
const BLOW_BTN_H: f32 = 54.0;
const BLOW_BTN_Y: f32 = -278.0;
const POP_REACH: f32 = 30.0;

// Components
#[derive(Component)]
struct GiftUi;

#[derive(Component)]
struct GiftBox;

#[derive(Component)]
struct GiftCaption {
    base_y: f32,
}

#[derive(Component)]
struct CardUi;

#[derive(Component)]
struct GreetingText;

#[derive(Component)]
struct NameUi;

#[derive(Component)]
struct NameDraftText;

#[derive(Component)]
struct BlowControl;

#[derive(Component)]
struct BlowButton;

#[derive(Component)]
struct BlownText;

#[derive(Component)]
struct InstructionText;

#[derive(Component)]
struct Pulse {
    speed: f32,
}

// Audio markers
#[derive(Component)]
struct BgMusic;

// Resources
#[derive(Resource, Default)]
struct Shake {
    remaining: f32,
}

#[derive(Resource)]
struct CardSounds {
    whoosh: Handle<AudioSource>,
    chime: Handle<AudioSource>,
    blow: Handle<AudioSource>,
    pop: Handle<AudioSource>,
}

// Events for audio playback
#[derive(Event)]
struct PlaySoundEvent(SoundType);

#[derive(Clone, Copy)]
enum SoundType {
    Whoosh,
    Chime,
    Blow,
    Pop,
}

fn main() {
    // Optional overrides (.env or environment); the card runs fine with
    // neither.
    let _ = dotenvy::dotenv();

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Birthday Wish".into(),
                resolution: (WINDOW_WIDTH, WINDOW_HEIGHT).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(BG_COLOR))
        .init_resource::<Session>()
        .insert_resource(EffectPolicy::from_env())
        .init_resource::<EffectConfig>()
        .init_resource::<CakeGeometry>()
        .init_resource::<Shake>()
        .init_resource::<SwipeTracker>()
        .add_event::<PlaySoundEvent>()
        .add_systems(
            Startup,
            (
                scene::decide_scene,
                scene::setup_scene,
                setup_ui,
                setup_audio,
                detect::start_mic,
            )
                .chain(),
        )
        .add_systems(
            Update,
            (
                open_gift,
                animate_gift,
                capture_name,
                update_texts,
                sync_visibility,
                blow_button,
                pop_balloons,
                celebrate_transitions,
                handle_reset,
                screen_shake,
                animate_pulse,
                handle_sound_events,
            ),
        )
        .add_systems(
            Update,
            (
                effects::sync_effects,
                effects::launch_fireworks,
                effects::tick_balloons,
                effects::tick_sparkles,
                effects::tick_fireworks,
                effects::tick_confetti,
                effects::tick_flames,
                scene::melt_candles,
                scene::orbit_camera,
                detect::mic_poll,
                detect::mic_release,
                detect::swipe_blow,
            ),
        )
        .run();
}

fn setup_audio(mut cmd: Commands, asset_server: Res<AssetServer>) {
    // Best effort: a missing file or a blocked output device just means
    // a quiet card.
    cmd.insert_resource(CardSounds {
        whoosh: asset_server.load("sounds/whoosh.ogg"),
        chime: asset_server.load("sounds/chime.ogg"),
        blow: asset_server.load("sounds/blow.ogg"),
        pop: asset_server.load("sounds/pop.ogg"),
    });
}

fn setup_ui(
    mut cmd: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut mats: ResMut<Assets<ColorMaterial>>,
) {
    // Gift box, wrapped and waiting
    cmd.spawn((
        Transform::from_xyz(0.0, 30.0, 5.0),
        Visibility::Visible,
        GiftBox,
        GiftUi,
    ))
    .with_children(|p| {
        p.spawn((
            Mesh2d(meshes.add(scene::rounded_rect_mesh(GIFT_W, GIFT_H, 14.0))),
            MeshMaterial2d(mats.add(ColorMaterial::from(GIFT_PINK))),
            Transform::from_xyz(0.0, 0.0, 0.0),
        ));
        p.spawn((
            Mesh2d(meshes.add(scene::rounded_rect_mesh(GIFT_W + 22.0, 26.0, 8.0))),
            MeshMaterial2d(mats.add(ColorMaterial::from(GIFT_LID))),
            Transform::from_xyz(0.0, GIFT_H / 2.0 + 2.0, 0.2),
        ));
        p.spawn((
            Mesh2d(meshes.add(Rectangle::new(18.0, GIFT_H))),
            MeshMaterial2d(mats.add(ColorMaterial::from(RIBBON_GOLD))),
            Transform::from_xyz(0.0, 0.0, 0.4),
        ));
        p.spawn((
            Mesh2d(meshes.add(Rectangle::new(GIFT_W, 16.0))),
            MeshMaterial2d(mats.add(ColorMaterial::from(RIBBON_GOLD))),
            Transform::from_xyz(0.0, 0.0, 0.3),
        ));
        p.spawn((
            Mesh2d(meshes.add(Circle::new(14.0))),
            MeshMaterial2d(mats.add(ColorMaterial::from(RIBBON_GOLD))),
            Transform::from_xyz(0.0, GIFT_H / 2.0 + 18.0, 0.5),
        ));
    });

    cmd.spawn((
        Text2d::new("Tap to open your gift"),
        TextFont {
            font_size: 26.0,
            ..default()
        },
        TextColor(HEADLINE_PINK),
        Transform::from_xyz(0.0, -110.0, 10.0),
        GiftCaption { base_y: -110.0 },
        GiftUi,
    ));

    // The card itself
    cmd.spawn((
        Mesh2d(meshes.add(scene::rounded_rect_mesh(CARD_W, CARD_H, 28.0))),
        MeshMaterial2d(mats.add(ColorMaterial::from(CARD_COLOR))),
        Transform::from_xyz(0.0, -15.0, 2.0),
        Visibility::Hidden,
        CardUi,
    ));

    cmd.spawn((
        Text2d::new("Happy Birthday!"),
        TextFont {
            font_size: 42.0,
            ..default()
        },
        TextColor(HEADLINE_PINK),
        Transform::from_xyz(0.0, 215.0, 10.0),
        Visibility::Hidden,
        GreetingText,
        CardUi,
    ));

    cmd.spawn((
        Text2d::new("Wishing you a day filled with love, laughter and joy"),
        TextFont {
            font_size: 19.0,
            ..default()
        },
        TextColor(BODY_GRAY),
        Transform::from_xyz(0.0, 172.0, 10.0),
        Visibility::Hidden,
        CardUi,
    ));

    cmd.spawn((
        Text2d::new("Make a wish and let the magic begin"),
        TextFont {
            font_size: 18.0,
            ..default()
        },
        TextColor(MAGIC_PURPLE),
        Transform::from_xyz(0.0, 138.0, 10.0),
        Visibility::Hidden,
        Pulse { speed: 3.0 },
        CardUi,
    ));

    // Name capture
    cmd.spawn((
        Text2d::new("Type a name for the card, Enter saves it"),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(BODY_GRAY),
        Transform::from_xyz(0.0, 102.0, 10.0),
        Visibility::Hidden,
        NameUi,
    ));

    cmd.spawn((
        Text2d::new("_"),
        TextFont {
            font_size: 24.0,
            ..default()
        },
        TextColor(HEADLINE_PINK),
        Transform::from_xyz(0.0, 70.0, 10.0),
        Visibility::Hidden,
        NameDraftText,
        NameUi,
    ));

    // Blow controls
    cmd.spawn((
        Mesh2d(meshes.add(scene::rounded_rect_mesh(BLOW_BTN_W, BLOW_BTN_H, 27.0))),
        MeshMaterial2d(mats.add(ColorMaterial::from(GIFT_PINK))),
        Transform::from_xyz(0.0, BLOW_BTN_Y, 6.0),
        Visibility::Hidden,
        BlowButton,
        BlowControl,
    ));
    cmd.spawn((
        Text2d::new("Blow the candles"),
        TextFont {
            font_size: 20.0,
            ..default()
        },
        TextColor(Color::WHITE),
        Transform::from_xyz(0.0, BLOW_BTN_Y, 10.0),
        Visibility::Hidden,
        BlowControl,
    ));

    cmd.spawn((
        Text2d::new("Candles blown - may your wishes come true"),
        TextFont {
            font_size: 22.0,
            ..default()
        },
        TextColor(BLOWN_ORANGE),
        Transform::from_xyz(0.0, BLOW_BTN_Y, 10.0),
        Visibility::Hidden,
        BlownText,
    ));

    // Instructions at bottom
    cmd.spawn((
        Text2d::new("Click the gift to begin"),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::srgba(0.3, 0.28, 0.35, 0.6)),
        Transform::from_xyz(0.0, -338.0, 10.0),
        InstructionText,
    ));
}

fn open_gift(mouse: Res<ButtonInput<MouseButton>>, mut session: ResMut<Session>) {
    if session.card_open() || !mouse.just_pressed(MouseButton::Left) {
        return;
    }
    if session.open() {
        info!("gift opened, session {}", session.id);
    }
}

fn animate_gift(
    time: Res<Time>,
    session: Res<Session>,
    mut gift: Query<&mut Transform, With<GiftBox>>,
    mut caption: Query<(&mut Transform, &GiftCaption), Without<GiftBox>>,
) {
    if session.card_open() {
        return;
    }
    let t = time.elapsed_secs();
    for mut tf in gift.iter_mut() {
        tf.rotation = Quat::from_rotation_z((t * 1.5).sin() * 0.17);
        tf.scale = Vec3::splat(1.0 + (t * 2.2).sin() * 0.04);
    }
    for (mut tf, cap) in caption.iter_mut() {
        tf.translation.y = cap.base_y - (t * 3.0).sin().abs() * 10.0;
    }
}

/// Keystrokes feed the name draft while the prompt is up. Enter saves
/// the draft, Escape saves whatever is there (possibly nothing) and
/// closes the prompt.
fn capture_name(mut events: EventReader<KeyboardInput>, mut session: ResMut<Session>) {
    if !session.capturing_name() {
        events.clear();
        return;
    }
    let mut draft = session.draft().to_string();
    let mut dirty = false;
    let mut confirm = false;
    for ev in events.read() {
        if !ev.state.is_pressed() {
            continue;
        }
        match &ev.logical_key {
            Key::Enter | Key::Escape => confirm = true,
            Key::Backspace => {
                draft.pop();
                dirty = true;
            }
            Key::Space => {
                draft.push(' ');
                dirty = true;
            }
            Key::Character(input) => {
                for ch in input.chars().filter(|c| !c.is_control()) {
                    draft.push(ch);
                }
                dirty = true;
            }
            _ => {}
        }
    }
    if dirty {
        let capped: String = draft.chars().take(24).collect();
        session.set_name(&capped);
    }
    if confirm {
        session.confirm_name();
    }
}

fn update_texts(
    session: Res<Session>,
    mut greeting: Query<&mut Text2d, With<GreetingText>>,
    mut draft: Query<&mut Text2d, (With<NameDraftText>, Without<GreetingText>)>,
    mut instruction: Query<
        &mut Text2d,
        (
            With<InstructionText>,
            Without<GreetingText>,
            Without<NameDraftText>,
        ),
    >,
) {
    if !session.is_changed() {
        return;
    }
    for mut txt in greeting.iter_mut() {
        txt.0 = session.greeting();
    }
    for mut txt in draft.iter_mut() {
        txt.0 = if session.draft().is_empty() {
            "_".to_string()
        } else {
            format!("{}_", session.draft())
        };
    }
    for mut txt in instruction.iter_mut() {
        txt.0 = if !session.card_open() {
            "Click the gift to begin".into()
        } else if session.candles_lit() {
            "Blow into the mic, swipe up, or press the button".into()
        } else {
            "Press R for another card".into()
        };
    }
}

#[allow(clippy::type_complexity)]
fn sync_visibility(
    session: Res<Session>,
    policy: Res<EffectPolicy>,
    mut gift: Query<&mut Visibility, With<GiftUi>>,
    mut card: Query<&mut Visibility, (With<CardUi>, Without<GiftUi>)>,
    mut cake: Query<&mut Visibility, (With<CakeVisual>, Without<GiftUi>, Without<CardUi>)>,
    mut name: Query<
        &mut Visibility,
        (
            With<NameUi>,
            Without<GiftUi>,
            Without<CardUi>,
            Without<CakeVisual>,
        ),
    >,
    mut blow: Query<
        &mut Visibility,
        (
            With<BlowControl>,
            Without<GiftUi>,
            Without<CardUi>,
            Without<CakeVisual>,
            Without<NameUi>,
        ),
    >,
    mut blown: Query<
        &mut Visibility,
        (
            With<BlownText>,
            Without<GiftUi>,
            Without<CardUi>,
            Without<CakeVisual>,
            Without<NameUi>,
            Without<BlowControl>,
        ),
    >,
) {
    if !session.is_changed() {
        return;
    }
    let show = |on: bool| {
        if on {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    };

    for mut v in gift.iter_mut() {
        *v = show(!session.card_open());
    }
    for mut v in card.iter_mut() {
        *v = show(session.card_open());
    }
    for mut v in cake.iter_mut() {
        *v = show(session.card_open());
    }
    for mut v in name.iter_mut() {
        *v = show(session.capturing_name());
    }
    for mut v in blow.iter_mut() {
        *v = show(policy.blow_ready(&session));
    }
    for mut v in blown.iter_mut() {
        *v = show(session.blown());
    }
}

fn blow_button(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cam: Query<(&Camera, &GlobalTransform), With<Camera2d>>,
    button: Query<&GlobalTransform, With<BlowButton>>,
    policy: Res<EffectPolicy>,
    mut session: ResMut<Session>,
) {
    if !mouse.just_pressed(MouseButton::Left) || !policy.blow_ready(&session) {
        return;
    }
    let Ok(win) = windows.get_single() else {
        return;
    };
    let Ok((camera, cam_t)) = cam.get_single() else {
        return;
    };
    let Some(cursor) = win.cursor_position() else {
        return;
    };
    let Some(world) = camera.viewport_to_world_2d(cam_t, cursor).ok() else {
        return;
    };
    let Ok(btn) = button.get_single() else {
        return;
    };

    let pos = btn.translation().truncate();
    let inside = world.x >= pos.x - BLOW_BTN_W / 2.0
        && world.x <= pos.x + BLOW_BTN_W / 2.0
        && world.y >= pos.y - BLOW_BTN_H / 2.0
        && world.y <= pos.y + BLOW_BTN_H / 2.0;
    if inside && session.blow_candles() {
        info!("candles blown out by button");
    }
}

/// Flat-mode balloons pop when clicked: a fresh one rises from the
/// bottom in the same slot.
fn pop_balloons(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cam: Query<(&Camera, &GlobalTransform), With<Camera2d>>,
    mode: Res<SceneMode>,
    mut mats: ResMut<Assets<ColorMaterial>>,
    mut balloons: Query<(&mut Transform, &mut Balloon, &MeshMaterial2d<ColorMaterial>)>,
    mut sounds: EventWriter<PlaySoundEvent>,
) {
    if !mouse.just_pressed(MouseButton::Left) || matches!(*mode, SceneMode::Rich) {
        return;
    }
    let Ok(win) = windows.get_single() else {
        return;
    };
    let Ok((camera, cam_t)) = cam.get_single() else {
        return;
    };
    let Some(cursor) = win.cursor_position() else {
        return;
    };
    let Some(world) = camera.viewport_to_world_2d(cam_t, cursor).ok() else {
        return;
    };

    let mut rng = rand::rng();
    for (mut tf, mut balloon, handle) in balloons.iter_mut() {
        if tf.translation.truncate().distance(world) <= POP_REACH {
            balloon.recycle(&mut tf.translation, &mut rng);
            if let Some(mat) = mats.get_mut(&handle.0) {
                mat.color = balloon.color();
            }
            sounds.send(PlaySoundEvent(SoundType::Pop));
            break;
        }
    }
}

/// Watches the session for stage edges and fires the one-shot side
/// effects there: music and whoosh on open, a chime when the name lands,
/// blow sound and a camera shake when the candles go out. On reset the
/// music stops; the scheduler clears the effects on its own.
fn celebrate_transitions(
    mut prev: Local<Option<(u8, bool)>>,
    session: Res<Session>,
    mut cmd: Commands,
    asset_server: Res<AssetServer>,
    mut shake: ResMut<Shake>,
    mut sounds: EventWriter<PlaySoundEvent>,
    music: Query<Entity, With<BgMusic>>,
) {
    let now = (session.ordinal(), session.name_set());
    let Some(last) = *prev else {
        *prev = Some(now);
        return;
    };
    if now == last {
        return;
    }
    *prev = Some(now);
    debug!("session stage {:?}", session.stage());

    if now.0 < last.0 {
        for entity in music.iter() {
            cmd.entity(entity).despawn();
        }
        return;
    }

    if last.0 == 0 && now.0 >= 1 {
        sounds.send(PlaySoundEvent(SoundType::Whoosh));
        // Background music is fire-and-forget; autoplay trouble or a
        // missing file just leaves the card quiet.
        cmd.spawn((
            AudioPlayer::new(asset_server.load("sounds/celebration.ogg")),
            PlaybackSettings {
                mode: PlaybackMode::Loop,
                volume: Volume::new(0.8),
                ..default()
            },
            BgMusic,
        ));
    }
    if !last.1 && now.1 {
        sounds.send(PlaySoundEvent(SoundType::Chime));
    }
    if last.0 < 3 && now.0 == 3 {
        sounds.send(PlaySoundEvent(SoundType::Blow));
        shake.remaining = 0.35;
    }
}

fn handle_reset(keyboard: Res<ButtonInput<KeyCode>>, mut session: ResMut<Session>) {
    if !keyboard.just_pressed(KeyCode::KeyR) {
        return;
    }
    // While the prompt is capturing, R is just a letter.
    if !session.card_open() || session.capturing_name() {
        return;
    }
    session.reset();
}

fn screen_shake(
    time: Res<Time>,
    mut shake: ResMut<Shake>,
    mut cam: Query<&mut Transform, With<OverlayCamera>>,
) {
    let mut rng = rand::rng();
    for mut tf in cam.iter_mut() {
        if shake.remaining > 0.0 {
            tf.translation.x = rng.random_range(-4.0..4.0);
            tf.translation.y = rng.random_range(-4.0..4.0);
        } else {
            tf.translation.x *= 0.85;
            tf.translation.y *= 0.85;
        }
    }
    shake.remaining = (shake.remaining - time.delta_secs()).max(0.0);
}

fn animate_pulse(time: Res<Time>, mut q: Query<(&mut Transform, &Pulse)>) {
    for (mut tf, pulse) in q.iter_mut() {
        let s = 1.0 + (time.elapsed_secs() * pulse.speed).sin() * 0.05;
        tf.scale = Vec3::splat(s);
    }
}

fn handle_sound_events(
    mut cmd: Commands,
    mut events: EventReader<PlaySoundEvent>,
    sounds: Option<Res<CardSounds>>,
) {
    let Some(sounds) = sounds else { return };

    for event in events.read() {
        let source = match event.0 {
            SoundType::Whoosh => sounds.whoosh.clone(),
            SoundType::Chime => sounds.chime.clone(),
            SoundType::Blow => sounds.blow.clone(),
            SoundType::Pop => sounds.pop.clone(),
        };
        cmd.spawn((
            AudioPlayer::new(source),
            PlaybackSettings {
                mode: PlaybackMode::Despawn,
                volume: Volume::new(0.5),
                ..default()
            },
        ));
    }
}
