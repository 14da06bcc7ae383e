use serde::{Deserialize, Serialize};

use crate::{
    floating_type_mod::FT,
    input::{InputAdapter, PointerId},
    vec2f, V2,
};

/// Straight pointer drag from `from` to `to`, pressed at `start_frame` and released at `end_frame`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedStroke {
    pub pointer: PointerId,
    pub start_frame: usize,
    pub end_frame: usize,
    pub from: [FT; 2],
    pub to: [FT; 2],
}

impl ScriptedStroke {
    fn position_at(&self, frame: usize) -> V2 {
        let from = vec2f(self.from[0], self.from[1]);
        let to = vec2f(self.to[0], self.to[1]);
        let length = self.end_frame.saturating_sub(self.start_frame);
        if length == 0 {
            return to;
        }
        let t = (frame.saturating_sub(self.start_frame) as FT / length as FT).min(1.);
        from + (to - from) * t
    }
}

/// Scripted input for headless runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub frames: usize,
    pub strokes: Vec<ScriptedStroke>,
}

impl SceneConfig {
    /// Emits the raw pointer events of `frame` into `input`.
    pub fn feed(&self, frame: usize, input: &mut InputAdapter) {
        for stroke in &self.strokes {
            if frame == stroke.start_frame {
                input.pointer_down(stroke.pointer, stroke.position_at(frame));
            } else if frame > stroke.start_frame && frame <= stroke.end_frame {
                input.pointer_move(stroke.pointer, stroke.position_at(frame));
            }
            if frame == stroke.end_frame {
                input.pointer_up(stroke.pointer);
            }
        }
    }

    /// Frame after which nothing happens anymore.
    pub fn last_frame(&self) -> usize {
        self.strokes
            .iter()
            .map(|s| s.end_frame)
            .max()
            .unwrap_or(0)
            .max(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::{SceneConfig, ScriptedStroke};
    use crate::{input::InputAdapter, vec2f};

    fn scene() -> SceneConfig {
        SceneConfig {
            frames: 10,
            strokes: vec![ScriptedStroke {
                pointer: 4,
                start_frame: 2,
                end_frame: 6,
                from: [0.1, 0.5],
                to: [0.9, 0.5],
            }],
        }
    }

    #[test]
    fn stroke_replays_as_pointer_events() {
        let scene = scene();
        let mut input = InputAdapter::new(0.15, None, 0);

        let mut frames = Vec::new();
        for frame in 0..8 {
            scene.feed(frame, &mut input);
            frames.push(input.frame_pointers());
        }

        assert!(frames[0].is_empty() && frames[1].is_empty());
        assert!(frames[2][0].is_down);
        assert!((frames[2][0].position - vec2f(0.1, 0.5)).norm() < 1e-6);
        assert!((frames[3][0].delta - vec2f(0.2, 0.)).norm() < 1e-5);
        // the release frame still carries the last movement
        assert!(!frames[6][0].is_down);
        assert!((frames[6][0].position - vec2f(0.9, 0.5)).norm() < 1e-5);
        assert!(frames[7].is_empty());
    }

    #[test]
    fn scene_yaml() {
        let yaml = "frames: 30\nstrokes:\n  - pointer: 1\n    start_frame: 0\n    end_frame: 40\n    from: [0.2, 0.2]\n    to: [0.8, 0.8]\n";
        let scene: SceneConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scene.strokes.len(), 1);
        assert_eq!(scene.last_frame(), 40);
        assert_eq!(SceneConfig::default().last_frame(), 0);
    }
}
