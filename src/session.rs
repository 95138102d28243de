use bevy::prelude::*;

use crate::effects::EffectKind;

/// Linear progression of one card session. Strictly monotonic: nothing
/// ever moves a session backwards except a full [`Session::reset`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub enum Stage {
    #[default]
    Unopened,
    Opened,
    CandlesBlown,
}

/// Current session: stage plus the guest-name axis. Name capture is
/// layered under the stage rather than being a stage of its own, so
/// "card open, name saved" and "card open, still typing" share the same
/// candle/effect gating.
#[derive(Resource)]
pub struct Session {
    pub id: String,
    stage: Stage,
    draft: String,
    confirmed: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stage: Stage::Unopened,
            draft: String::new(),
            confirmed: None,
        }
    }
}

impl Session {
    /// Unwrap the gift. Only valid once; anything else is a no-op.
    pub fn open(&mut self) -> bool {
        if self.stage != Stage::Unopened {
            return false;
        }
        self.stage = Stage::Opened;
        true
    }

    /// Replace the working name draft. Ignored once the name is saved.
    pub fn set_name(&mut self, text: &str) {
        if self.confirmed.is_none() {
            self.draft = text.to_string();
        }
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    /// Save the draft as the guest name. An empty draft saves an empty
    /// name; the greeting simply stays unadorned.
    pub fn confirm_name(&mut self) -> bool {
        if self.stage == Stage::Unopened || self.confirmed.is_some() {
            return false;
        }
        self.confirmed = Some(self.draft.clone());
        true
    }

    /// Blow the candles out. Idempotent, and a no-op before the card is
    /// open — invalid calls never fail, they just do nothing.
    pub fn blow_candles(&mut self) -> bool {
        if !self.candles_lit() {
            return false;
        }
        self.stage = Stage::CandlesBlown;
        true
    }

    /// Back to the wrapped gift. Clears the name and gets a fresh id;
    /// the effect scheduler despawns every live instance on the same
    /// frame because all gates stop holding.
    pub fn reset(&mut self) {
        *self = Self::default();
        info!("new session {}", self.id);
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn card_open(&self) -> bool {
        self.stage >= Stage::Opened
    }

    pub fn name_set(&self) -> bool {
        self.confirmed.is_some()
    }

    /// Candles light themselves the moment the card opens and stay lit
    /// until blown; there is no separate lighting step.
    pub fn candles_lit(&self) -> bool {
        self.stage == Stage::Opened
    }

    pub fn blown(&self) -> bool {
        self.stage == Stage::CandlesBlown
    }

    /// Keystrokes belong to the name prompt while it is capturing, so
    /// shortcut keys (reset) stay inert during typing.
    pub fn capturing_name(&self) -> bool {
        self.card_open() && self.confirmed.is_none()
    }

    /// Total order over the session's progress, for the monotonicity
    /// guarantee: unopened < opened <= named < blown.
    pub fn ordinal(&self) -> u8 {
        match (self.stage, self.confirmed.is_some()) {
            (Stage::Unopened, _) => 0,
            (Stage::Opened, false) => 1,
            (Stage::Opened, true) => 2,
            (Stage::CandlesBlown, _) => 3,
        }
    }

    pub fn greeting(&self) -> String {
        match self.confirmed.as_deref() {
            Some(name) if !name.is_empty() => format!("Happy Birthday, {name}!"),
            _ => "Happy Birthday!".to_string(),
        }
    }
}

/// Which session condition lets an effect kind spawn and animate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Gate {
    CardOpen,
    CandlesLit,
    CandlesBlown,
}

impl Gate {
    pub fn allows(self, session: &Session) -> bool {
        match self {
            Gate::CardOpen => session.card_open(),
            Gate::CandlesLit => session.candles_lit(),
            Gate::CandlesBlown => session.blown(),
        }
    }
}

/// The source variants disagree on when balloons and fireworks appear
/// and on whether a name is mandatory, so the ordering is policy, not
/// hardcoded. Defaults follow the majority variant; env keys override.
#[derive(Resource, Clone, Copy, Debug)]
pub struct EffectPolicy {
    pub balloons: Gate,
    pub sparkles: Gate,
    pub fireworks: Gate,
    pub confetti: Gate,
    pub require_name: bool,
}

impl Default for EffectPolicy {
    fn default() -> Self {
        Self {
            balloons: Gate::CardOpen,
            sparkles: Gate::CardOpen,
            fireworks: Gate::CandlesBlown,
            confetti: Gate::CardOpen,
            require_name: false,
        }
    }
}

impl EffectPolicy {
    /// Reads `BIRTHDAY_BALLOONS` / `BIRTHDAY_FIREWORKS` (`open` or
    /// `blown`) and `BIRTHDAY_REQUIRE_NAME`. Unset or unparsable keys
    /// keep their defaults; the widget needs no configuration to run.
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        policy.balloons = gate_from_env("BIRTHDAY_BALLOONS", policy.balloons);
        policy.fireworks = gate_from_env("BIRTHDAY_FIREWORKS", policy.fireworks);
        if let Ok(v) = std::env::var("BIRTHDAY_REQUIRE_NAME") {
            policy.require_name = matches!(v.as_str(), "1" | "true" | "yes");
        }
        policy
    }

    pub fn gate_for(&self, kind: EffectKind) -> Gate {
        match kind {
            EffectKind::Balloon => self.balloons,
            EffectKind::Sparkle => self.sparkles,
            EffectKind::Firework => self.fireworks,
            EffectKind::Confetti => self.confetti,
            EffectKind::Flame => Gate::CandlesLit,
        }
    }

    /// Whether the blow controls (button, mic, swipe) may fire yet.
    pub fn blow_ready(&self, session: &Session) -> bool {
        session.candles_lit() && (!self.require_name || session.name_set())
    }
}

fn gate_from_env(key: &str, default: Gate) -> Gate {
    match std::env::var(key).as_deref() {
        Ok("open") => Gate::CardOpen,
        Ok("blown") => Gate::CandlesBlown,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn open_then_name_then_blow() {
        let mut s = Session::default();
        assert!(s.open());
        s.set_name("Ada");
        assert!(s.confirm_name());
        assert!(s.blow_candles());
        assert_eq!(s.stage(), Stage::CandlesBlown);
        assert!(s.greeting().contains("Ada"));
    }

    #[test]
    fn blow_before_open_is_a_noop() {
        let mut s = Session::default();
        assert!(!s.blow_candles());
        assert_eq!(s.stage(), Stage::Unopened);
    }

    #[test]
    fn blow_is_idempotent() {
        let mut s = Session::default();
        s.open();
        assert!(s.blow_candles());
        assert!(!s.blow_candles());
        assert_eq!(s.stage(), Stage::CandlesBlown);
    }

    #[test]
    fn empty_draft_confirms_to_empty_name() {
        let mut s = Session::default();
        s.open();
        assert!(s.confirm_name());
        assert!(s.name_set());
        assert_eq!(s.greeting(), "Happy Birthday!");
    }

    #[test]
    fn name_is_immutable_once_saved() {
        let mut s = Session::default();
        s.open();
        s.set_name("Ada");
        s.confirm_name();
        s.set_name("Grace");
        assert!(!s.confirm_name());
        assert_eq!(s.greeting(), "Happy Birthday, Ada!");
    }

    #[test]
    fn candles_lit_only_between_open_and_blow() {
        let mut s = Session::default();
        assert!(!s.candles_lit());
        s.open();
        assert!(s.candles_lit());
        s.blow_candles();
        assert!(!s.candles_lit());
    }

    #[test]
    fn ordinal_never_decreases_under_random_call_sequences() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let mut s = Session::default();
            let mut last = s.ordinal();
            for _ in 0..50 {
                match rng.random_range(0..4) {
                    0 => {
                        s.open();
                    }
                    1 => s.set_name("x"),
                    2 => {
                        s.confirm_name();
                    }
                    _ => {
                        s.blow_candles();
                    }
                }
                let now = s.ordinal();
                assert!(now >= last, "ordinal went backwards: {last} -> {now}");
                last = now;
            }
        }
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = Session::default();
        let first_id = s.id.clone();
        s.open();
        s.set_name("Ada");
        s.confirm_name();
        s.blow_candles();
        s.reset();
        assert_eq!(s.stage(), Stage::Unopened);
        assert!(!s.name_set());
        assert!(s.draft().is_empty());
        assert_ne!(s.id, first_id);
    }

    #[test]
    fn policy_blow_ready_respects_required_name() {
        let mut s = Session::default();
        s.open();
        let relaxed = EffectPolicy::default();
        assert!(relaxed.blow_ready(&s));
        let strict = EffectPolicy {
            require_name: true,
            ..EffectPolicy::default()
        };
        assert!(!strict.blow_ready(&s));
        s.confirm_name();
        assert!(strict.blow_ready(&s));
    }

    #[test]
    fn gates_track_session() {
        let mut s = Session::default();
        assert!(!Gate::CardOpen.allows(&s));
        s.open();
        assert!(Gate::CardOpen.allows(&s));
        assert!(Gate::CandlesLit.allows(&s));
        assert!(!Gate::CandlesBlown.allows(&s));
        s.blow_candles();
        assert!(Gate::CardOpen.allows(&s));
        assert!(!Gate::CandlesLit.allows(&s));
        assert!(Gate::CandlesBlown.allows(&s));
    }
}
