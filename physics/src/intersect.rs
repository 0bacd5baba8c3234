use crate::{
    body::Body,
    error::{CollisionError, Result},
    gjk::Gjk,
    math::lerp_rotate,
    options::{ResolutionStrategy, ResolverOptions, EPSILON, WELD_DISTANCE},
    simplex::{ContactManifold, Simplex, SupportIndex},
    vertex_group::Plane,
};
use glam::{Quat, Vec3};
use std::f32::consts::FRAC_PI_2;

const HIT_ZONE_MIN: f32 = 0.25 * WELD_DISTANCE;
const HIT_ZONE_TARGET: f32 = 0.5 * WELD_DISTANCE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CollisionOutcome {
    /// The pair stays apart until the end of the interval.
    NoCollision,
    /// The pair comes within the weld distance at the reported time.
    Collision,
    /// The pair is touching and moving along each other without closing.
    SlidingCollision,
    /// The pair may touch at the reported time and must be tested again from there.
    PossibleCollision,
}

impl CollisionOutcome {
    pub fn is_uncertain(&self) -> bool {
        matches!(self, CollisionOutcome::PossibleCollision)
    }

    pub fn is_contact(&self) -> bool {
        matches!(
            self,
            CollisionOutcome::Collision | CollisionOutcome::SlidingCollision
        )
    }
}

/// Result of a single distance query between two bodies.
#[derive(Clone, Debug)]
pub struct Proximity {
    pub hit: bool,
    /// Shortest vector from b to a, zero on a hit.
    pub separation: Vec3,
    pub simplex_a: Simplex,
    pub simplex_b: Simplex,
}

impl Proximity {
    pub fn distance(&self) -> f32 {
        self.separation.length()
    }
}

#[derive(Clone, Debug)]
pub struct Resolution {
    pub outcome: CollisionOutcome,
    pub time: f32,
    pub simplex_a: Simplex,
    pub simplex_b: Simplex,
}

impl Resolution {
    fn new(outcome: CollisionOutcome, time: f32, proximity: Proximity) -> Self {
        log::debug!("{:?} at {}", outcome, time);
        Self {
            outcome,
            time,
            simplex_a: proximity.simplex_a,
            simplex_b: proximity.simplex_b,
        }
    }

    /// Contact normal pointing from b to a.
    pub fn normal_of_impact(&self) -> Result<Vec3> {
        self.simplex_a.normal_of_impact(&self.simplex_b)
    }

    pub fn center_of_impact(&self) -> Result<ContactManifold> {
        let normal = self.normal_of_impact()?;
        self.simplex_a.center_of_impact(&self.simplex_b, normal)
    }
}

#[derive(Copy, Clone, Debug)]
struct TrialState {
    t: f32,
    d: f32,
}

/// Narrow phase time of impact queries between pairs of bodies following their frame motion.
#[derive(Copy, Clone, Debug, Default)]
pub struct CollisionResolver {
    options: ResolverOptions,
}

impl CollisionResolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    fn no_convergence(stage: &'static str, iterations: u32) -> CollisionError {
        log::debug!("{} gave up after {} iterations", stage, iterations);
        CollisionError::NoConvergence { stage, iterations }
    }

    // Later of the two committed times, the interval must not end before it.
    fn start_time(a: &Body, b: &Body, t_max: f32) -> Result<f32> {
        let min_t = a.cur_t().max(b.cur_t());
        if t_max.is_nan() || t_max < min_t {
            return Err(CollisionError::invariant(format!(
                "interval ends at {} before the committed time {}",
                t_max, min_t
            )));
        }
        Ok(min_t)
    }

    fn self_pair(body: &Body, t_max: f32) -> Resolution {
        let simplex = Simplex::new(body.vertex_group().clone(), body.orientation(), body.position());
        Resolution {
            outcome: CollisionOutcome::NoCollision,
            time: t_max,
            simplex_a: simplex.clone(),
            simplex_b: simplex,
        }
    }

    /// Minimum distance between `a` and `b` while both move from `t0` to `t1`, with the bodies
    /// held at their orientations at `t0`.
    pub fn has_collided(&self, a: &Body, b: &Body, t0: f32, t1: f32) -> Result<Proximity> {
        self.has_collided_oriented(a, b, a.orientation_at(t0), b.orientation_at(t0), t0, t1)
    }

    pub fn has_collided_oriented(
        &self,
        a: &Body,
        b: &Body,
        orientation_a: Quat,
        orientation_b: Quat,
        t0: f32,
        t1: f32,
    ) -> Result<Proximity> {
        let mut simplex_a = Simplex::new(a.vertex_group().clone(), orientation_a, a.position_at(t1));
        let mut simplex_b = Simplex::new(b.vertex_group().clone(), orientation_b, b.position_at(t1));

        if std::ptr::eq(a, b) {
            return Ok(Proximity {
                hit: false,
                separation: Vec3::ZERO,
                simplex_a,
                simplex_b,
            });
        }

        simplex_a.add(SupportIndex::new(0))?;
        simplex_b.add(SupportIndex::new(0))?;

        let rel_disp = a.position() - b.position();
        let rel0 = a.displacement_at(t0) - b.displacement_at(t0);
        let rel1 = a.displacement_at(t1) - b.displacement_at(t1);
        let diff = rel1 - rel0;
        let (fixed_disp, float_disp) = if diff.length_squared() > EPSILON {
            (rel0 + rel_disp, diff)
        } else {
            (rel1 + rel_disp, Vec3::ZERO)
        };

        let outcome = Gjk::new(&mut simplex_a, &mut simplex_b, self.options.gjk_max_iterations)
            .find_minimum_distance(fixed_disp, float_disp)?;
        log::trace!("proximity over [{}, {}] {:?}", t0, t1, outcome);

        Ok(Proximity {
            hit: outcome.is_hit(),
            separation: outcome.separation(),
            simplex_a,
            simplex_b,
        })
    }

    /// Pick a strategy for the pair and run it.
    pub fn resolve(
        &self,
        a: &Body,
        b: &Body,
        t_max: f32,
        strategy: ResolutionStrategy,
        sliding: bool,
    ) -> Result<Resolution> {
        let strategy = match strategy {
            ResolutionStrategy::Auto if a.is_rotating() || b.is_rotating() => {
                ResolutionStrategy::Conservative
            }
            ResolutionStrategy::Auto => ResolutionStrategy::Exact,
            strategy => strategy,
        };

        match strategy {
            ResolutionStrategy::Exact => self.exactly_resolve_collisions(a, b, t_max),
            _ => self.conservatively_resolve_collisions(a, b, t_max, sliding),
        }
    }

    /// Time of impact by searching swept GJK queries. Rotation over the interval is ignored.
    ///
    /// The search starts at the later of the two committed times and requires the bodies to be
    /// apart there.
    pub fn exactly_resolve_collisions(&self, a: &Body, b: &Body, t_max: f32) -> Result<Resolution> {
        if std::ptr::eq(a, b) {
            return Ok(Self::self_pair(a, t_max));
        }

        let min_t = Self::start_time(a, b, t_max)?;
        let start = self.has_collided(a, b, min_t, min_t)?;
        let d_t0 = start.distance();
        if start.hit || d_t0 <= EPSILON {
            return Err(CollisionError::invariant(format!(
                "bodies are {} apart at the start of the interval {}",
                d_t0, min_t
            )));
        }

        let swept = self.has_collided(a, b, min_t, t_max)?;
        let d_t1 = swept.distance();
        log::trace!("exact over [{}, {}] from {} to {}", min_t, t_max, d_t0, d_t1);
        if !swept.hit && d_t1 > WELD_DISTANCE {
            return Ok(Resolution::new(CollisionOutcome::NoCollision, t_max, swept));
        }

        if d_t0 - d_t1 < EPSILON {
            // never gets closer than the start, see whether it ends up further away
            let end = self.has_collided(a, b, t_max, t_max)?;
            let outcome = if !end.hit && end.distance() > d_t0 + EPSILON {
                CollisionOutcome::NoCollision
            } else {
                CollisionOutcome::SlidingCollision
            };
            return Ok(Resolution::new(outcome, t_max, start));
        }

        if d_t0 < WELD_DISTANCE {
            let noc = start.simplex_a.normal_of_impact(&start.simplex_b)?;
            let relative_velocity = a.frame_linear_velocity() - b.frame_linear_velocity();
            if noc.dot(relative_velocity) > 0.0 {
                let time = self.sliding_time(a, b, &start, min_t, t_max, d_t1)?;
                return Ok(Resolution::new(CollisionOutcome::SlidingCollision, time, start));
            }
            return Ok(Resolution::new(CollisionOutcome::Collision, min_t, start));
        }

        let mut p0 = TrialState { t: min_t, d: d_t0 };
        let mut p1 = TrialState { t: t_max, d: d_t1 };
        let mut adjusted = 0.5 * (p0.t + p1.t);
        for iteration in 0..self.options.collision_resolution_max {
            let trial = self.has_collided(a, b, min_t, adjusted)?;
            let d = trial.distance();
            log::trace!("exact iteration {} at {} distance {}", iteration, adjusted, d);

            if !trial.hit && d > HIT_ZONE_MIN && d < WELD_DISTANCE && d_t0 - d > EPSILON {
                return Ok(Resolution::new(CollisionOutcome::Collision, adjusted, trial));
            }

            if trial.hit {
                p1 = TrialState { t: adjusted, d: 0.0 };
                adjusted = 0.5 * (p0.t + p1.t);
            } else {
                if d > HIT_ZONE_MIN {
                    p0 = TrialState { t: adjusted, d };
                } else {
                    p1 = TrialState { t: adjusted, d };
                }
                let slope = p0.d - p1.d;
                adjusted = if slope > EPSILON {
                    (adjusted + (p1.t - p0.t) / slope * (d - HIT_ZONE_TARGET)).min(t_max)
                } else {
                    0.5 * (p0.t + p1.t)
                };
            }

            if adjusted <= min_t + EPSILON {
                break;
            }
        }

        Err(Self::no_convergence(
            "exact time of impact",
            self.options.collision_resolution_max,
        ))
    }

    // Bisect for the time a touching pair stops sliding along each other.
    fn sliding_time(
        &self,
        a: &Body,
        b: &Body,
        start: &Proximity,
        min_t: f32,
        t_max: f32,
        d_t1: f32,
    ) -> Result<f32> {
        let d_t0 = start.distance();
        let (mut t_lo, mut t_hi) = (min_t, t_max);
        let mut t_mid = min_t;
        let mut d_t1 = d_t1;
        let mut iterations = 0;
        while (d_t0 - d_t1).abs() > EPSILON {
            if iterations == self.options.collision_resolution_max {
                return Err(Self::no_convergence("sliding contact", iterations));
            }
            iterations += 1;

            t_mid = 0.5 * (t_lo + t_hi);
            let mid = self.has_collided(a, b, t_mid, t_mid)?;
            let d_mid = mid.distance();
            log::trace!("sliding bisection at {} distance {}", t_mid, d_mid);
            if !mid.hit && d_mid > d_t0 && mid.separation.dot(start.separation) > 0.0 {
                t_lo = t_mid;
            } else {
                t_hi = t_mid;
                d_t1 = d_mid;
            }
        }
        Ok(t_mid)
    }

    /// Time of impact by conservative advancement.
    ///
    /// The approach of the pair along the separating normal is bounded from above by the
    /// relative translation plus both bodies' rotational sweep. The result is at best a possible
    /// collision which has to be tested again from the reported time.
    pub fn conservatively_resolve_collisions(
        &self,
        a: &Body,
        b: &Body,
        t_max: f32,
        sliding: bool,
    ) -> Result<Resolution> {
        if std::ptr::eq(a, b) {
            return Ok(Self::self_pair(a, t_max));
        }

        let min_t = Self::start_time(a, b, t_max)?;
        let start = self.has_collided_oriented(
            a,
            b,
            a.orientation_at(min_t),
            b.orientation_at(min_t),
            min_t,
            min_t,
        )?;
        let d_t0 = start.distance();
        if start.hit || d_t0 < HIT_ZONE_MIN - EPSILON {
            return Err(CollisionError::invariant(format!(
                "bodies are {} apart at the start of the interval {}",
                d_t0, min_t
            )));
        }

        let noc = start.separation / d_t0;
        if d_t0 < WELD_DISTANCE {
            // feature normal, the separation direction is noisy this close
            let noc = start
                .simplex_a
                .normal_of_impact(&start.simplex_b)
                .unwrap_or(noc);
            return self.close_contact_collision_detection(
                a, b, &start, t_max, noc, min_t, d_t0, sliding,
            );
        }

        // bound on the approach since min_t, the bodies may have been committed to earlier times
        let approach = |t: f32| {
            let before = (b.displacement_at(min_t) - a.displacement_at(min_t)).dot(noc);
            a.project_maximum_movement_onto(b, noc, t) - before
        };

        let mut adjusted = t_max;
        let mut d_t1 = d_t0 - approach(t_max);
        if d_t1 > WELD_DISTANCE {
            return Ok(Resolution::new(CollisionOutcome::NoCollision, t_max, start));
        }

        let mut p0 = TrialState { t: min_t, d: d_t0 };
        let mut p1 = TrialState { t: t_max, d: d_t1 };
        let mut iterations = 0;
        while !(HIT_ZONE_MIN..=WELD_DISTANCE).contains(&d_t1) {
            if iterations == self.options.collision_resolution_max {
                return Err(Self::no_convergence("conservative advancement", iterations));
            }
            iterations += 1;

            if d_t1 < HIT_ZONE_MIN {
                p1 = TrialState { t: adjusted, d: d_t1 };
            } else {
                p0 = TrialState { t: adjusted, d: d_t1 };
            }
            let closing_speed = (p0.d - p1.d) / (p1.t - p0.t);
            adjusted = if closing_speed.is_finite() && closing_speed > 0.0 {
                (adjusted + (d_t1 - HIT_ZONE_TARGET) / closing_speed).clamp(p0.t, p1.t)
            } else {
                0.5 * (p0.t + p1.t)
            };
            d_t1 = d_t0 - approach(adjusted);
            log::trace!(
                "conservative iteration {} at {} bound {}",
                iterations,
                adjusted,
                d_t1
            );
        }

        Ok(Resolution::new(CollisionOutcome::PossibleCollision, adjusted, start))
    }

    /// Time of impact for a pair already within the weld distance at `min_t`.
    ///
    /// The body contributing the larger feature is treated as a plane and the other body's
    /// vertices are swept against a copy of that plane pushed halfway into the gap.
    #[allow(clippy::too_many_arguments)]
    pub fn close_contact_collision_detection(
        &self,
        a: &Body,
        b: &Body,
        proximity: &Proximity,
        t_max: f32,
        noc: Vec3,
        min_t: f32,
        d_t0: f32,
        sliding: bool,
    ) -> Result<Resolution> {
        let a_unique = proximity.simplex_a.unique_points().len();
        let b_unique = proximity.simplex_b.unique_points().len();
        let a_is_plane = a_unique > b_unique;
        let (plane_body, other, plane_simplex, normal) = if a_is_plane {
            (a, b, &proximity.simplex_a, -noc)
        } else {
            (b, a, &proximity.simplex_b, noc)
        };

        if !sliding {
            let manifold = proximity
                .simplex_a
                .center_of_impact(&proximity.simplex_b, noc)?;
            let plane_speed = plane_body.frame_velocity_at_point(manifold.centre, min_t);
            let other_speed = other.frame_velocity_at_point(manifold.centre, min_t);
            if normal.dot(plane_speed - other_speed) > 0.0 {
                log::trace!("closing at {}", manifold.centre);
                return Ok(Resolution::new(
                    CollisionOutcome::Collision,
                    min_t,
                    proximity.clone(),
                ));
            }
        }

        // keep the linearised relative rotation under a quarter turn
        let spin = a.frame_angular_velocity().length() + b.frame_angular_velocity().length();
        let mut t_end = t_max;
        let mut halved = false;
        while spin * (t_end - min_t) > FRAC_PI_2 {
            t_end = min_t + 0.5 * (t_end - min_t);
            halved = true;
        }

        // sweep the other body through the plane body's frame, where the plane stays put
        let relative = |t: f32| {
            let inv = plane_body.orientation_at(t).conjugate();
            let x = inv * (other.position_at(t) - plane_body.position_at(t));
            (x, (inv * other.orientation_at(t)).normalize())
        };
        let (x0, q0) = relative(min_t);
        let (x1, q1) = relative(t_end);
        let q1 = if q0.dot(q1) < 0.0 { -q1 } else { q1 };

        let plane_x0 = plane_body.position_at(min_t);
        let plane_q0 = plane_body.orientation_at(min_t);
        let inv_q0 = plane_q0.conjugate();
        let surface = inv_q0 * (plane_simplex.world_vertex(0) - plane_x0);
        let local_normal = inv_q0 * normal;
        let target = Plane::new(surface + local_normal * (0.5 * d_t0), local_normal);
        let frac = other
            .vertex_group()
            .find_intersection_time(&target, x0, x1, q0, q1);
        log::trace!("close contact over [{}, {}] crosses at {}", min_t, t_end, frac);

        if frac <= 1.0 {
            let time = min_t + frac * (t_end - min_t);
            if spin >= EPSILON {
                return Ok(Resolution::new(
                    CollisionOutcome::PossibleCollision,
                    time,
                    proximity.clone(),
                ));
            }
            let at_time = self.has_collided(a, b, time, time)?;
            let proximity = if at_time.hit {
                proximity.clone()
            } else {
                at_time
            };
            return Ok(Resolution::new(CollisionOutcome::Collision, time, proximity));
        }

        if halved {
            return Ok(Resolution::new(
                CollisionOutcome::PossibleCollision,
                t_end,
                proximity.clone(),
            ));
        }

        let surface = Plane::new(surface, local_normal);
        let deepest = other
            .vertex_group()
            .verts()
            .iter()
            .map(|v| surface.distance_to(lerp_rotate(*v, q0, q1, 1.0) + x1))
            .fold(f32::INFINITY, f32::min);
        let outcome = if deepest > d_t0 + EPSILON {
            CollisionOutcome::NoCollision
        } else {
            CollisionOutcome::SlidingCollision
        };
        Ok(Resolution::new(outcome, t_max, proximity.clone()))
    }
}
