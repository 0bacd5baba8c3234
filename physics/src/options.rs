use serde::{Deserialize, Serialize};

/// Tolerance used by every sign and length comparison in the narrow phase.
pub const EPSILON: f32 = 1.0e-5;

/// Bodies closer than this are considered to be touching.
pub const WELD_DISTANCE: f32 = 1.0e-3;

pub const COLLISION_RESOLUTION_MAX: u32 = 50;

pub const GJK_MAX_ITERATIONS: u32 = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// Bisect the time of impact with full GJK queries.
    Exact,
    /// Bound the worst case approach along the separating normal and advance conservatively.
    Conservative,
    /// Exact for pairs that translate only, conservative as soon as either body turns.
    Auto,
}

impl Default for ResolutionStrategy {
    fn default() -> Self {
        ResolutionStrategy::Exact
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverOptions {
    pub gjk_max_iterations: u32,
    pub collision_resolution_max: u32,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            gjk_max_iterations: GJK_MAX_ITERATIONS,
            collision_resolution_max: COLLISION_RESOLUTION_MAX,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneOptions {
    pub strategy: ResolutionStrategy,
    /// Upper bound on the number of advances a single frame may be split into.
    pub max_sub_steps: u32,
    pub resolver: ResolverOptions,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            strategy: ResolutionStrategy::default(),
            max_sub_steps: 32,
            resolver: ResolverOptions::default(),
        }
    }
}
