//! Lip-sync track
//!
//! Ordered sequence of timestamped viseme events queried by playback
//! position. Windows may overlap; lookup returns the first event in sequence
//! order whose window contains the time.
//!
//! The synthetic generator does not analyse audio. It lays out
//! [`SYNTHETIC_EVENT_COUNT`] overlapping windows with random shapes, and the
//! downstream animation timing depends on exactly that layout.
//! [`LipSyncTrack::replace`] is the entry point for real alignment data.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;
use tracing::debug;

use super::types::{
    FaceError, FaceResult, SYNTHETIC_END_STEP, SYNTHETIC_EVENT_COUNT, SYNTHETIC_START_STEP,
    SYNTHETIC_WEIGHT,
};

/// Mouth shape code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisemeId {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    X,
}

impl VisemeId {
    /// Every code, in table order
    pub const ALL: [VisemeId; 9] = [
        VisemeId::A,
        VisemeId::B,
        VisemeId::C,
        VisemeId::D,
        VisemeId::E,
        VisemeId::F,
        VisemeId::G,
        VisemeId::H,
        VisemeId::X,
    ];

    /// Codes the synthetic generator picks from
    pub const SPEAKING: [VisemeId; 8] = [
        VisemeId::A,
        VisemeId::B,
        VisemeId::C,
        VisemeId::D,
        VisemeId::E,
        VisemeId::F,
        VisemeId::G,
        VisemeId::H,
    ];

    /// Morph target the code drives
    pub fn morph_target(self) -> &'static str {
        match self {
            VisemeId::A => "viseme_PP",
            VisemeId::B => "viseme_kk",
            VisemeId::C => "viseme_I",
            VisemeId::D => "viseme_aa",
            VisemeId::E => "viseme_O",
            VisemeId::F => "viseme_U",
            VisemeId::G => "viseme_FF",
            VisemeId::H => "viseme_TH",
            VisemeId::X => "viseme_PP",
        }
    }

    pub fn code(self) -> char {
        match self {
            VisemeId::A => 'A',
            VisemeId::B => 'B',
            VisemeId::C => 'C',
            VisemeId::D => 'D',
            VisemeId::E => 'E',
            VisemeId::F => 'F',
            VisemeId::G => 'G',
            VisemeId::H => 'H',
            VisemeId::X => 'X',
        }
    }

    pub fn from_code(code: &str) -> FaceResult<Self> {
        VisemeId::ALL
            .into_iter()
            .find(|v| code.len() == 1 && code.starts_with(v.code()))
            .ok_or_else(|| FaceError::InvalidViseme(code.to_string()))
    }
}

impl fmt::Display for VisemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Distinct morph targets driven by any viseme code
pub fn viseme_targets() -> Vec<&'static str> {
    let mut targets: Vec<&'static str> = Vec::with_capacity(VisemeId::ALL.len());
    for viseme in VisemeId::ALL {
        let target = viseme.morph_target();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

/// One timed mouth shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisemeEvent {
    /// Window start, seconds
    pub start: f32,
    /// Window end, seconds (inclusive)
    pub end: f32,
    pub viseme: VisemeId,
    /// Authored weight in [0, 1]; the blender caps what it writes
    pub weight: f32,
}

impl VisemeEvent {
    pub fn new(start: f32, end: f32, viseme: VisemeId, weight: f32) -> Self {
        Self {
            start,
            end,
            viseme,
            weight,
        }
    }

    /// Whether `time` falls inside the closed window
    pub fn contains(&self, time: f32) -> bool {
        self.start <= time && time <= self.end
    }
}

/// Generate the placeholder track used for every loaded audio source
pub fn synthetic_events<R: Rng + ?Sized>(rng: &mut R) -> Vec<VisemeEvent> {
    (0..SYNTHETIC_EVENT_COUNT)
        .map(|i| {
            let viseme = VisemeId::SPEAKING[rng.gen_range(0..VisemeId::SPEAKING.len())];
            let weight = rng.gen_range(SYNTHETIC_WEIGHT);
            VisemeEvent::new(
                i as f32 * SYNTHETIC_START_STEP,
                (i + 1) as f32 * SYNTHETIC_END_STEP,
                viseme,
                weight,
            )
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct MouthCueFile {
    #[serde(rename = "mouthCues")]
    mouth_cues: Vec<MouthCue>,
}

#[derive(Debug, Deserialize)]
struct MouthCue {
    start: f32,
    end: f32,
    value: String,
    #[serde(default = "default_cue_weight")]
    weight: f32,
}

fn default_cue_weight() -> f32 {
    1.0
}

/// Parse a `{"mouthCues": [{"start", "end", "value"}]}` alignment document
pub fn parse_mouth_cues(json: &str) -> FaceResult<Vec<VisemeEvent>> {
    let file: MouthCueFile =
        serde_json::from_str(json).map_err(|e| FaceError::InvalidCues(e.to_string()))?;

    file.mouth_cues
        .into_iter()
        .map(|cue| {
            if !(cue.start.is_finite() && cue.end.is_finite()) || cue.end < cue.start {
                return Err(FaceError::InvalidCues(format!(
                    "bad window {}..{}",
                    cue.start, cue.end
                )));
            }
            Ok(VisemeEvent::new(
                cue.start,
                cue.end,
                VisemeId::from_code(&cue.value)?,
                cue.weight.clamp(0.0, 1.0),
            ))
        })
        .collect()
}

/// The active viseme sequence
///
/// The sequence sits behind an `Arc<[VisemeEvent]>` that is swapped in one
/// assignment, so any reader holding a [`snapshot`](Self::snapshot) sees
/// either the old track or the new one, never a mix.
#[derive(Debug, Clone)]
pub struct LipSyncTrack {
    events: Arc<[VisemeEvent]>,
    source: Option<String>,
    generation: u64,
}

impl LipSyncTrack {
    pub fn new() -> Self {
        Self {
            events: Arc::from(Vec::new()),
            source: None,
            generation: 0,
        }
    }

    /// Build the track for a newly loaded audio source
    pub fn load<R: Rng + ?Sized>(&mut self, source: &str, rng: &mut R) -> &[VisemeEvent] {
        let events = synthetic_events(rng);
        self.install(events, Some(source.to_string()));
        debug!(source, events = self.events.len(), "lip-sync track loaded");
        &self.events
    }

    /// Install an externally aligned sequence, sorted by start time
    pub fn replace(&mut self, mut events: Vec<VisemeEvent>) {
        events.sort_by(|a, b| a.start.total_cmp(&b.start));
        self.install(events, None);
    }

    /// First event (in sequence order) whose window contains `time`
    pub fn lookup(&self, time: f32) -> Option<&VisemeEvent> {
        self.events.iter().find(|e| e.contains(time))
    }

    pub fn clear(&mut self) {
        self.install(Vec::new(), None);
    }

    pub fn events(&self) -> &[VisemeEvent] {
        &self.events
    }

    /// Shared handle to the current sequence
    pub fn snapshot(&self) -> Arc<[VisemeEvent]> {
        Arc::clone(&self.events)
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Incremented on every replacement
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// End of the last window, seconds
    pub fn coverage_end(&self) -> f32 {
        self.events.iter().map(|e| e.end).fold(0.0, f32::max)
    }

    fn install(&mut self, events: Vec<VisemeEvent>, source: Option<String>) {
        self.events = Arc::from(events);
        self.source = source;
        self.generation += 1;
    }
}

impl Default for LipSyncTrack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_viseme_target_map() {
        assert_eq!(VisemeId::A.morph_target(), "viseme_PP");
        assert_eq!(VisemeId::D.morph_target(), "viseme_aa");
        assert_eq!(VisemeId::X.morph_target(), "viseme_PP");
        assert_eq!(viseme_targets().len(), 8);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(VisemeId::from_code("C"), Ok(VisemeId::C));
        assert_eq!(VisemeId::from_code("X"), Ok(VisemeId::X));
        assert!(VisemeId::from_code("Q").is_err());
        assert!(VisemeId::from_code("AB").is_err());
        assert!(VisemeId::from_code("").is_err());
    }

    #[test]
    fn test_synthetic_layout() {
        let mut rng = StdRng::seed_from_u64(0);
        let events = synthetic_events(&mut rng);

        assert_eq!(events.len(), 200);
        for (i, event) in events.iter().enumerate() {
            assert!((event.start - i as f32 * 0.15).abs() < 1e-4);
            assert!((event.end - (i + 1) as f32 * 0.25).abs() < 1e-4);
            assert!(event.viseme != VisemeId::X);
            assert!((0.4..0.6).contains(&event.weight));
        }
    }

    #[test]
    fn test_lookup_first_match_with_overlap() {
        let mut track = LipSyncTrack::new();
        track.replace(vec![
            VisemeEvent::new(0.0, 1.0, VisemeId::A, 0.3),
            VisemeEvent::new(0.5, 2.0, VisemeId::B, 0.4),
        ]);

        assert_eq!(track.lookup(0.7).unwrap().viseme, VisemeId::A);
        assert_eq!(track.lookup(1.0).unwrap().viseme, VisemeId::A);
        assert_eq!(track.lookup(1.5).unwrap().viseme, VisemeId::B);
        assert!(track.lookup(2.5).is_none());
        assert!(track.lookup(-0.1).is_none());
    }

    #[test]
    fn test_replace_sorts_by_start() {
        let mut track = LipSyncTrack::new();
        track.replace(vec![
            VisemeEvent::new(1.0, 2.0, VisemeId::C, 0.5),
            VisemeEvent::new(0.0, 1.5, VisemeId::D, 0.5),
        ]);
        assert_eq!(track.events()[0].viseme, VisemeId::D);
        assert_eq!(track.lookup(1.2).unwrap().viseme, VisemeId::D);
    }

    #[test]
    fn test_load_replaces_wholesale() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut track = LipSyncTrack::new();
        track.load("a.mp3", &mut rng);
        let old = track.snapshot();
        let old_generation = track.generation();

        track.load("b.mp3", &mut rng);
        assert_eq!(track.source(), Some("b.mp3"));
        assert_eq!(track.generation(), old_generation + 1);
        assert!(!Arc::ptr_eq(&old, &track.snapshot()));
        // A reader holding the old snapshot still sees a complete sequence
        assert_eq!(old.len(), 200);
    }

    #[test]
    fn test_parse_mouth_cues() {
        let json = r#"{"metadata": {}, "mouthCues": [
            {"start": 0.0, "end": 0.2, "value": "X"},
            {"start": 0.2, "end": 0.35, "value": "D", "weight": 0.7}
        ]}"#;
        let events = parse_mouth_cues(json).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].viseme, VisemeId::X);
        assert_eq!(events[0].weight, 1.0);
        assert_eq!(events[1].weight, 0.7);
    }

    #[test]
    fn test_parse_mouth_cues_rejects_bad_input() {
        assert!(matches!(
            parse_mouth_cues("not json"),
            Err(FaceError::InvalidCues(_))
        ));
        assert!(matches!(
            parse_mouth_cues(r#"{"mouthCues": [{"start": 1.0, "end": 0.5, "value": "A"}]}"#),
            Err(FaceError::InvalidCues(_))
        ));
        assert_eq!(
            parse_mouth_cues(r#"{"mouthCues": [{"start": 0.0, "end": 0.5, "value": "Z"}]}"#),
            Err(FaceError::InvalidViseme("Z".into()))
        );
    }
}
