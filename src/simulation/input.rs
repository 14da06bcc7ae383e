use std::collections::BTreeMap;

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{floating_type_mod::FT, vec2f, vec3f, V2, V3};

pub type PointerId = u64;

/// Per-device pointer state as seen by one simulation frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerState {
    pub id: PointerId,
    /// Normalized position in `[0,1]²`, `y` pointing up.
    pub position: V2,
    /// Displacement since the previous frame.
    pub delta: V2,
    pub is_down: bool,
    pub color: V3,
}

/// Maps window coordinates (origin top-left, `y` down) into the unit square with `y` up.
pub fn normalize_screen_position(x: FT, y: FT, width: FT, height: FT) -> V2 {
    let u = if width > 0. { x / width } else { 0. };
    let v = if height > 0. { 1. - y / height } else { 0. };
    vec2f(u.clamp(0., 1.), v.clamp(0., 1.))
}

fn hsv_to_rgb(h: FT, s: FT, v: FT) -> V3 {
    let h6 = (h.rem_euclid(1.)) * 6.;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1. - s);
    let q = v * (1. - f * s);
    let t = v * (1. - (1. - f) * s);
    match sector as i32 {
        0 => vec3f(v, t, p),
        1 => vec3f(q, v, p),
        2 => vec3f(p, v, t),
        3 => vec3f(p, q, v),
        4 => vec3f(t, p, v),
        _ => vec3f(v, p, q),
    }
}

/// Owns the pointer table between frames.
///
/// Raw events are fed in with `pointer_down`/`pointer_move`/`pointer_up`,
/// then `frame_pointers` hands the simulation one ordered snapshot and starts
/// the next frame.
#[derive(Debug, Clone)]
pub struct InputAdapter {
    pointers: BTreeMap<PointerId, PointerState>,
    rng: StdRng,
    color_intensity: FT,
    recolor_interval: Option<u32>,
    ticks: u32,
}

impl InputAdapter {
    pub fn new(color_intensity: FT, recolor_interval: Option<u32>, seed: u64) -> InputAdapter {
        InputAdapter {
            pointers: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            color_intensity,
            recolor_interval,
            ticks: 0,
        }
    }

    fn random_color(&mut self) -> V3 {
        hsv_to_rgb(self.rng.gen_range(0.0..1.0), 1., 1.) * self.color_intensity
    }

    pub fn pointer_down(&mut self, id: PointerId, position: V2) {
        let position = clamp_unit(position);
        let color = self.random_color();
        let pointer = self.pointers.entry(id).or_insert(PointerState {
            id,
            position,
            delta: V2::zeros(),
            is_down: false,
            color,
        });
        if pointer.is_down {
            pointer.delta += position - pointer.position;
        } else {
            // a new contact starts without displacement
            pointer.color = color;
            pointer.delta = V2::zeros();
        }
        pointer.position = position;
        pointer.is_down = true;
    }

    /// Moves of pointers that are not pressed are ignored.
    pub fn pointer_move(&mut self, id: PointerId, position: V2) {
        if let Some(pointer) = self.pointers.get_mut(&id) {
            if pointer.is_down {
                let position = clamp_unit(position);
                pointer.delta += position - pointer.position;
                pointer.position = position;
            }
        }
    }

    pub fn pointer_up(&mut self, id: PointerId) {
        if let Some(pointer) = self.pointers.get_mut(&id) {
            pointer.is_down = false;
        }
    }

    /// Advances the frame clock; every `recolor_interval` ticks all pressed pointers get a new color.
    pub fn tick(&mut self) {
        self.ticks += 1;
        let interval = match self.recolor_interval {
            Some(interval) if interval > 0 => interval,
            _ => return,
        };
        if self.ticks % interval == 0 {
            let ids: Vec<PointerId> = self.pointers.values().filter(|p| p.is_down).map(|p| p.id).collect();
            for id in ids {
                let color = self.random_color();
                if let Some(pointer) = self.pointers.get_mut(&id) {
                    pointer.color = color;
                }
            }
        }
    }

    /// Snapshot ordered by pointer id. Deltas restart from zero afterwards
    /// and released pointers are forgotten.
    pub fn frame_pointers(&mut self) -> Vec<PointerState> {
        let snapshot: Vec<PointerState> = self.pointers.values().cloned().collect();
        self.pointers.retain(|_, p| p.is_down);
        for pointer in self.pointers.values_mut() {
            pointer.delta = V2::zeros();
        }
        snapshot
    }

    pub fn pressed_count(&self) -> usize {
        self.pointers.values().filter(|p| p.is_down).count()
    }

    pub fn clear(&mut self) {
        self.pointers.clear();
    }
}

fn clamp_unit(p: V2) -> V2 {
    vec2f(p.x.clamp(0., 1.), p.y.clamp(0., 1.))
}
