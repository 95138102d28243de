use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::session::{EffectPolicy, Session};

/// Samples per analysis window.
pub const ANALYSIS_WINDOW: usize = 256;
/// Mean-magnitude threshold (0–255 scale) that counts as a blow.
pub const BLOW_THRESHOLD: f32 = 40.0;
/// Minimum upward drag, in pixels, that counts as a blow.
pub const SWIPE_THRESHOLD: f32 = 50.0;

/// Mean absolute amplitude of one analysis window, scaled to 0–255.
pub fn mean_magnitude(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let sum: f32 = window.iter().map(|s| s.abs()).sum();
    sum / window.len() as f32 * 255.0
}

pub fn level_fired(level: f32) -> bool {
    level > BLOW_THRESHOLD
}

/// Window coordinates grow downward, so an upward swipe ends at a
/// smaller y.
pub fn swipe_fired(start_y: f32, end_y: f32) -> bool {
    start_y - end_y > SWIPE_THRESHOLD
}

/// Latest analysis-window level, written by the capture callback on the
/// audio thread, read by [`mic_poll`] on the main schedule. The level is
/// the only thing that crosses threads; all session mutation stays on
/// the main schedule.
#[derive(Resource, Clone)]
pub struct MicLevel(Arc<AtomicU32>);

impl MicLevel {
    fn new() -> Self {
        Self(Arc::new(AtomicU32::new(0)))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn set(&self, level: f32) {
        self.0.store(level.to_bits(), Ordering::Relaxed);
    }
}

/// Owns the capture stream; dropping it releases the input device.
/// `cpal::Stream` is not `Send`, hence the non-send resource.
pub struct MicStream(#[allow(dead_code)] cpal::Stream);

/// Tries to acquire the default input device once at startup. Denied
/// permission, no device, or an unsupported format all land in the same
/// place: one warning, and the mic path stays dark while the button and
/// swipe paths keep working.
pub fn start_mic(world: &mut World) {
    let level = MicLevel::new();
    world.insert_resource(level.clone());
    match build_input_stream(&level) {
        Ok(stream) => {
            world.insert_non_send_resource(MicStream(stream));
            info!("microphone ready, blow into it to put the candles out");
        }
        Err(err) => {
            warn!("microphone unavailable ({err}); blow by button or swipe instead");
        }
    }
}

fn build_input_stream(level: &MicLevel) -> Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| "no input device".to_string())?;
    let config = device.default_input_config().map_err(|e| e.to_string())?;

    let level = level.clone();
    let mut window: Vec<f32> = Vec::with_capacity(ANALYSIS_WINDOW);
    let stream = device
        .build_input_stream(
            &config.into(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    window.push(sample);
                    if window.len() == ANALYSIS_WINDOW {
                        level.set(mean_magnitude(&window));
                        window.clear();
                    }
                }
            },
            |err| warn!("input stream error: {err}"),
            None,
        )
        .map_err(|e| e.to_string())?;
    stream.play().map_err(|e| e.to_string())?;
    Ok(stream)
}

pub fn mic_poll(level: Res<MicLevel>, policy: Res<EffectPolicy>, mut session: ResMut<Session>) {
    if !policy.blow_ready(&session) {
        return;
    }
    if level_fired(level.get()) && session.blow_candles() {
        info!("candles blown out by microphone");
    }
}

/// Lets go of the input device the moment blowing stops being relevant.
/// The stream does not come back for later sessions; button and swipe
/// remain.
pub fn mic_release(
    session: Res<Session>,
    stream: Option<NonSend<MicStream>>,
    mut cmd: Commands,
) {
    if stream.is_some() && session.blown() {
        cmd.queue(|world: &mut World| {
            world.remove_non_send_resource::<MicStream>();
        });
        info!("microphone released");
    }
}

#[derive(Resource, Default)]
pub struct SwipeTracker {
    start_y: Option<f32>,
}

pub fn swipe_blow(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut tracker: ResMut<SwipeTracker>,
    policy: Res<EffectPolicy>,
    mut session: ResMut<Session>,
) {
    let Ok(win) = windows.get_single() else {
        return;
    };
    if mouse.just_pressed(MouseButton::Left) {
        tracker.start_y = win.cursor_position().map(|p| p.y);
    }
    if mouse.just_released(MouseButton::Left) {
        let start = tracker.start_y.take();
        let end = win.cursor_position().map(|p| p.y);
        let (Some(start), Some(end)) = (start, end) else {
            return;
        };
        if !policy.blow_ready(&session) {
            return;
        }
        if swipe_fired(start, end) && session.blow_candles() {
            info!("candles blown out by swipe");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_magnitude_of_known_window() {
        let window = [0.5_f32; ANALYSIS_WINDOW];
        assert_eq!(mean_magnitude(&window), 127.5);
    }

    #[test]
    fn mean_magnitude_uses_absolute_values() {
        let window = [-0.2_f32, 0.2, -0.2, 0.2];
        let expected = 0.2 * 255.0;
        assert!((mean_magnitude(&window) - expected).abs() < 1e-4);
    }

    #[test]
    fn mean_magnitude_of_empty_window_is_zero() {
        assert_eq!(mean_magnitude(&[]), 0.0);
    }

    #[test]
    fn threshold_separates_breath_from_silence() {
        // A firm breath pushes mean magnitude well past the threshold,
        // room noise stays under it.
        assert!(level_fired(mean_magnitude(&[0.4_f32; ANALYSIS_WINDOW])));
        assert!(!level_fired(mean_magnitude(&[0.05_f32; ANALYSIS_WINDOW])));
    }

    #[test]
    fn swipe_needs_a_real_upward_drag() {
        assert!(swipe_fired(300.0, 200.0));
        assert!(!swipe_fired(300.0, 260.0));
        // Downward drags never fire.
        assert!(!swipe_fired(200.0, 300.0));
    }

    #[test]
    fn manual_path_works_without_any_detector() {
        // Capture denied: the level never moves, so the mic path stays
        // silent — but a plain button press still lands the transition.
        let mut session = Session::default();
        session.open();
        let level = MicLevel::new();
        assert!(!level_fired(level.get()));
        assert!(session.blow_candles());
        assert!(session.blown());
    }
}
