pub mod body;
pub mod bounds;
pub mod broadphase;
pub mod contact;
pub mod error;
pub mod forces;
pub mod gjk;
mod hull;
pub mod inertia;
pub mod integrator;
pub mod intersect;
mod math;
pub mod options;
pub mod pair_set;
mod polygon;
pub mod scene;
pub mod scene_shapes;
pub mod simplex;
pub mod vertex_group;

pub use body::{Body, BodyArena, BodyHandle};
pub use error::{CollisionError, Result};
pub use intersect::{CollisionOutcome, CollisionResolver, Resolution};
pub use options::{ResolutionStrategy, ResolverOptions, SceneOptions};
pub use scene::{PhysicsScene, StepReport};
pub use vertex_group::VertexGroup;
