//! Decorative particle network.
//!
//! A fixed set of drifting nodes that bounce off the viewport walls; every
//! pair closer than `max_distance` is joined by a link whose opacity fades
//! linearly with distance. Coordinates are abstract viewport units with the
//! origin at the top-left corner.

use rand::Rng;

pub const DEFAULT_NODE_COUNT: usize = 80;
pub const DEFAULT_MAX_DISTANCE: f64 = 150.0;
/// Span of each velocity component; components fall in `±MAX_SPEED / 2`.
pub const DEFAULT_MAX_SPEED: f64 = 0.5;
/// Opacity of a link between two coincident nodes.
pub const LINK_OPACITY_SCALE: f64 = 0.3;

pub const NODE_COLOR: Rgb = Rgb(0x00, 0xf0, 0xff);
pub const LINK_END_COLOR: Rgb = Rgb(0xff, 0x00, 0xe6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Linear interpolation, `t` in `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb(mix(self.0, other.0), mix(self.1, other.1), mix(self.2, other.2))
    }

    /// Blend toward `background` as if drawn with the given opacity.
    pub fn over(self, background: Rgb, opacity: f64) -> Rgb {
        background.lerp(self, opacity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleSettings {
    pub count: usize,
    pub max_distance: f64,
    pub max_speed: f64,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            count: DEFAULT_NODE_COUNT,
            max_distance: DEFAULT_MAX_DISTANCE,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleNode {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
}

/// A connection between nodes `from` and `to` (indices into `nodes()`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub from: usize,
    pub to: usize,
    pub opacity: f64,
}

/// Opacity of a link spanning `distance`; zero at or beyond `max_distance`.
pub fn link_opacity(distance: f64, max_distance: f64) -> f64 {
    if max_distance <= 0.0 || distance >= max_distance {
        return 0.0;
    }
    (1.0 - distance / max_distance) * LINK_OPACITY_SCALE
}

#[derive(Debug, Clone)]
pub struct ParticleField {
    nodes: Vec<ParticleNode>,
    width: f64,
    height: f64,
    max_distance: f64,
}

impl ParticleField {
    pub fn new(width: f64, height: f64, settings: ParticleSettings, rng: &mut impl Rng) -> Self {
        let half_speed = settings.max_speed / 2.0;
        let nodes = (0..settings.count)
            .map(|_| ParticleNode {
                x: rng.gen::<f64>() * width,
                y: rng.gen::<f64>() * height,
                vx: (rng.gen::<f64>() * 2.0 - 1.0) * half_speed,
                vy: (rng.gen::<f64>() * 2.0 - 1.0) * half_speed,
                radius: rng.gen_range(1.0..3.0),
            })
            .collect();

        Self {
            nodes,
            width,
            height,
            max_distance: settings.max_distance,
        }
    }

    pub fn from_nodes(width: f64, height: f64, max_distance: f64, nodes: Vec<ParticleNode>) -> Self {
        Self {
            nodes,
            width,
            height,
            max_distance,
        }
    }

    pub fn nodes(&self) -> &[ParticleNode] {
        &self.nodes
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Change the viewport. Nodes keep their positions; any left outside are
    /// pulled back by their next wall bounce.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Advance one frame.
    pub fn step(&mut self) {
        let (width, height) = (self.width, self.height);
        for node in &mut self.nodes {
            node.x += node.vx;
            node.y += node.vy;
            bounce(&mut node.x, &mut node.vx, width);
            bounce(&mut node.y, &mut node.vy, height);
        }
    }

    /// Every pair of nodes close enough to be linked.
    pub fn links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        for (i, a) in self.nodes.iter().enumerate() {
            for (j, b) in self.nodes.iter().enumerate().skip(i + 1) {
                let distance = (a.x - b.x).hypot(a.y - b.y);
                if distance < self.max_distance {
                    links.push(Link {
                        from: i,
                        to: j,
                        opacity: link_opacity(distance, self.max_distance),
                    });
                }
            }
        }
        links
    }
}

/// Reflect off the walls at `0` and `limit`, keeping the position on the
/// wall it crossed.
fn bounce(pos: &mut f64, velocity: &mut f64, limit: f64) {
    if *pos < 0.0 {
        *pos = 0.0;
        *velocity = velocity.abs();
    } else if *pos > limit {
        *pos = limit.max(0.0);
        *velocity = -velocity.abs();
    }
}
