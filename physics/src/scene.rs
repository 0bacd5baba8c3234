use crate::{
    body::{Body, BodyArena, BodyHandle},
    broadphase::BroadPhase,
    contact::{Contact, ContactArena},
    error::{CollisionError, Result},
    intersect::{CollisionOutcome, CollisionResolver, Resolution},
    options::{SceneOptions, EPSILON},
    pair_set::Pair,
};
use rayon::prelude::*;

/// A pair whose narrow phase query failed. It is skipped for the rest of the advance.
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredPair {
    pub handle_a: BodyHandle,
    pub handle_b: BodyHandle,
    pub error: CollisionError,
}

#[derive(Clone, Debug, Default)]
pub struct StepReport {
    /// Time within the frame every body was committed to.
    pub time: f32,
    pub contacts: Vec<Contact>,
    pub deferred: Vec<DeferredPair>,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct FrameSummary {
    pub sub_steps: u32,
    pub contacts: usize,
    pub deferred: usize,
    /// The frame ran out of sub steps and was finished without collision checks.
    pub capped: bool,
}

pub struct PhysicsScene {
    bodies: BodyArena,
    broadphase: BroadPhase<BodyHandle>,
    resolver: CollisionResolver,
    options: SceneOptions,
    contacts: ContactArena,
    time: f32,
    frame_end: f32,
    step_num: u64,
}

impl PhysicsScene {
    pub fn new(options: SceneOptions) -> Self {
        Self {
            bodies: BodyArena::new(),
            broadphase: BroadPhase::default(),
            resolver: CollisionResolver::new(options.resolver),
            options,
            contacts: ContactArena::new(),
            time: 0.0,
            frame_end: 0.0,
            step_num: 0,
        }
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    pub fn add_body(&mut self, body: Body) -> BodyHandle {
        let bounds = body.swept_bounds(self.frame_end.max(body.cur_t()));
        let handle = self.bodies.add(body);
        self.broadphase.add_object(handle, &bounds);
        log::debug!("added body {:?}", handle);
        handle
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<Body> {
        let body = self.bodies.remove(handle)?;
        self.broadphase.remove_object(handle);
        log::debug!("removed body {:?}", handle);
        Some(body)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    pub fn bodies(&self) -> &BodyArena {
        &self.bodies
    }

    pub fn iter_body_handles(&self) -> impl Iterator<Item = BodyHandle> + '_ {
        self.bodies.handles()
    }

    /// Contacts found by the most recent advance, earliest first.
    pub fn contacts(&self) -> &ContactArena {
        &self.contacts
    }

    pub fn number_of_possible_collisions(&self) -> usize {
        self.broadphase.number_of_possible_collisions()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn step_num(&self) -> u64 {
        self.step_num
    }

    fn refresh_bounds(&mut self) {
        let frame_end = self.frame_end;
        for (handle, body) in self.bodies.iter() {
            self.broadphase
                .update_object(handle, &body.swept_bounds(frame_end));
        }
    }

    /// Start a frame of length `dt`, planning every body's frame motion.
    pub fn begin_frame(&mut self, dt: f32) {
        self.step_num += 1;
        self.time = 0.0;
        self.frame_end = dt;
        self.contacts.clear();
        for (_, body) in self.bodies.iter_mut() {
            body.begin_time_step(dt);
        }
        self.refresh_bounds();
    }

    // pairs worth a narrow phase query
    fn candidate_pairs(&self) -> Vec<Pair<BodyHandle>> {
        self.broadphase
            .possible_collisions()
            .iter()
            .filter(|pair| match (self.bodies.get(pair.a), self.bodies.get(pair.b)) {
                (Some(a), Some(b)) => !(a.is_static() && b.is_static()),
                _ => false,
            })
            .collect()
    }

    /// Advance every body to the first collision before `t_end`, or to `t_end`.
    ///
    /// Pairs are resolved in parallel against a shared read only view of the bodies, then all
    /// bodies are committed to the earliest collision or possible collision time.
    pub fn advance(&mut self, t_end: f32) -> StepReport {
        let t_end = t_end.min(self.frame_end);
        let pairs = self.candidate_pairs();
        log::trace!(
            "advancing from {} to {} with {} candidate pairs",
            self.time,
            t_end,
            pairs.len()
        );

        let bodies = &self.bodies;
        let resolver = &self.resolver;
        let strategy = self.options.strategy;
        let results: Vec<(Pair<BodyHandle>, Result<Resolution>)> = pairs
            .par_iter()
            .filter_map(|pair| {
                let a = bodies.get(pair.a)?;
                let b = bodies.get(pair.b)?;
                Some((*pair, resolver.resolve(a, b, t_end, strategy, false)))
            })
            .collect();

        let mut stop = t_end;
        let mut deferred = Vec::new();
        let mut resolved = Vec::new();
        for (pair, result) in results {
            match result {
                Ok(resolution) => {
                    if matches!(
                        resolution.outcome,
                        CollisionOutcome::Collision | CollisionOutcome::PossibleCollision
                    ) {
                        stop = stop.min(resolution.time);
                    }
                    if resolution.outcome.is_contact() {
                        resolved.push((pair, resolution));
                    }
                }
                Err(error) => {
                    log::warn!("deferring pair {:?} {:?}: {}", pair.a, pair.b, error);
                    deferred.push(DeferredPair {
                        handle_a: pair.a,
                        handle_b: pair.b,
                        error,
                    });
                }
            }
        }
        let stop = stop.max(self.time);

        for (_, body) in self.bodies.iter_mut() {
            body.commit_movement(stop);
        }
        self.time = stop;
        self.refresh_bounds();

        self.contacts.clear();
        for (pair, resolution) in resolved {
            let sliding = resolution.outcome == CollisionOutcome::SlidingCollision;
            if !sliding && resolution.time > stop + EPSILON {
                continue;
            }
            match contact_from(pair, &resolution, stop) {
                Ok(contact) => self.contacts.push(contact),
                Err(error) => {
                    log::warn!("no contact for pair {:?} {:?}: {}", pair.a, pair.b, error);
                    deferred.push(DeferredPair {
                        handle_a: pair.a,
                        handle_b: pair.b,
                        error,
                    });
                }
            }
        }
        self.contacts.sort();

        log::debug!(
            "advanced to {} with {} contacts and {} deferred pairs",
            stop,
            self.contacts.len(),
            deferred.len()
        );
        StepReport {
            time: stop,
            contacts: self.contacts.as_slice().to_vec(),
            deferred,
        }
    }

    /// Run a whole frame of length `dt`.
    ///
    /// `on_contact` sees every contact as it happens and may change the velocities of the two
    /// bodies, the rest of the frame follows the new motion.
    pub fn step<F>(&mut self, dt: f32, mut on_contact: F) -> FrameSummary
    where
        F: FnMut(&Contact, &mut Body, &mut Body),
    {
        self.begin_frame(dt);

        let mut summary = FrameSummary::default();
        while self.time < self.frame_end {
            if summary.sub_steps == self.options.max_sub_steps {
                log::warn!(
                    "frame {} capped after {} sub steps at {}",
                    self.step_num,
                    summary.sub_steps,
                    self.time
                );
                for (_, body) in self.bodies.iter_mut() {
                    body.commit_movement(self.frame_end);
                }
                self.time = self.frame_end;
                self.refresh_bounds();
                summary.capped = true;
                break;
            }
            summary.sub_steps += 1;

            let report = self.advance(self.frame_end);
            summary.contacts += report.contacts.len();
            summary.deferred += report.deferred.len();

            for contact in &report.contacts {
                if let Some((a, b)) = self.bodies.get_pair_mut(contact.handle_a, contact.handle_b) {
                    on_contact(contact, a, b);
                }
            }
            if !report.contacts.is_empty() {
                self.refresh_bounds();
            }
        }
        summary
    }
}

fn contact_from(pair: Pair<BodyHandle>, resolution: &Resolution, stop: f32) -> Result<Contact> {
    let normal = resolution.normal_of_impact()?;
    let manifold = resolution
        .simplex_a
        .center_of_impact(&resolution.simplex_b, normal)?;
    Ok(Contact {
        handle_a: pair.a,
        handle_b: pair.b,
        normal,
        point: manifold.centre,
        time_of_impact: resolution.time.min(stop),
        kind: resolution.outcome,
    })
}

impl Default for PhysicsScene {
    fn default() -> Self {
        Self::new(SceneOptions::default())
    }
}
