//! Boid flocking on the continuous plane.
//!
//! Each activation a boid steers toward the neighbors it can see (cohesion),
//! away from those that are too close (separation) and along their mean
//! heading (alignment), then advances by `speed` along its unit velocity.

use crate::cluster;
use crate::{AgentId, ContinuousSpace, Point, RandomActivation, Result, SimulationError};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, UnitCircle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlockConfig {
    pub population: usize,
    pub width: f64,
    pub height: f64,
    pub torus: bool,
    /// Distance travelled per activation.
    pub speed: f64,
    /// Radius within which other boids are seen.
    pub vision: f64,
    /// Boids closer than this push each other apart.
    pub separation: f64,
    pub cohere: f64,
    pub separate: f64,
    #[serde(rename = "match")]
    pub match_: f64,
    pub rng_seed: Option<u64>,
}

impl Default for FlockConfig {
    fn default() -> Self {
        FlockConfig {
            population: 100,
            width: 200.0,
            height: 200.0,
            torus: true,
            speed: 3.0,
            vision: 10.0,
            separation: 2.0,
            cohere: 0.03,
            separate: 0.015,
            match_: 0.05,
            rng_seed: None,
        }
    }
}

impl FlockConfig {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("speed", self.speed),
            ("separation", self.separation),
            ("cohere", self.cohere),
            ("separate", self.separate),
            ("match", self.match_),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(SimulationError::InvalidConfiguration(format!(
                    "{} must be finite and non-negative, got {}",
                    name, value
                )));
            }
        }
        if !(self.vision.is_finite() && self.vision > 0.0) {
            return Err(SimulationError::InvalidConfiguration(format!(
                "vision must be positive, got {}",
                self.vision
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boid {
    pub id: AgentId,
    pub position: Point,
    /// Unit heading.
    pub velocity: Point,
}

pub struct FlockModel {
    config: FlockConfig,
    boids: Vec<Boid>,
    space: ContinuousSpace,
    scheduler: RandomActivation,
    rng: SmallRng,
    pub stepnumber: usize,
}

impl std::fmt::Debug for FlockModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlockModel")
            .field("config", &self.config)
            .field("stepnumber", &self.stepnumber)
            .field("boid_count", &self.boids.len())
            .finish()
    }
}

impl FlockModel {
    pub fn new(config: FlockConfig) -> Result<FlockModel> {
        config.validate()?;
        let mut rng = match config.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::seed_from_u64(rand::random()),
        };
        let mut space = ContinuousSpace::new(config.width, config.height, config.torus, config.vision)?;

        let mut boids = Vec::with_capacity(config.population);
        for id in 0..config.population {
            let position = Point::new(
                rng.gen_range(0.0..config.width),
                rng.gen_range(0.0..config.height),
            );
            let [vx, vy]: [f64; 2] = UnitCircle.sample(&mut rng);
            space.place_agent(id, position)?;
            boids.push(Boid {
                id,
                position,
                velocity: Point::new(vx, vy),
            });
        }
        info!(
            population = config.population,
            width = config.width,
            height = config.height,
            "constructed flock"
        );
        Ok(FlockModel {
            scheduler: RandomActivation::new(0..boids.len()),
            config,
            boids,
            space,
            rng,
            stepnumber: 0,
        })
    }

    pub fn step(&mut self) -> Result<()> {
        let FlockModel {
            config,
            boids,
            space,
            scheduler,
            rng,
            ..
        } = self;
        scheduler.step(rng, |id, _| steer(config, boids, space, id))?;
        self.stepnumber += 1;
        debug!(step = self.stepnumber, "flock step complete");
        Ok(())
    }

    pub fn run(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            self.step()?;
        }
        Ok(())
    }

    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    /// Id, position and heading of every boid, ordered by id.
    pub fn snapshot(&self) -> Vec<Boid> {
        self.boids.clone()
    }

    pub fn space(&self) -> &ContinuousSpace {
        &self.space
    }

    pub fn positions(&self) -> Vec<Point> {
        self.boids.iter().map(|b| b.position).collect()
    }

    /// Swarm label per boid, distances measured the way the space measures them.
    pub fn swarm_labels(&self, radius: f64) -> Vec<usize> {
        let positions = self.positions();
        cluster::detect_with(positions.len(), radius, |a, b| {
            self.space.distance(positions[a], positions[b])
        })
    }
}

fn steer(
    config: &FlockConfig,
    boids: &mut [Boid],
    space: &mut ContinuousSpace,
    id: AgentId,
) -> Result<()> {
    let me = *boids.get(id).ok_or(SimulationError::UnknownAgent(id))?;
    let neighbors = space.neighbors_within(me.position, config.vision, Some(id));

    let mut velocity = me.velocity;
    if !neighbors.is_empty() {
        let mut cohesion = Point::default();
        let mut separation = Point::default();
        let mut alignment = Point::default();
        for other in neighbors.iter() {
            let them = boids[*other];
            let heading = space.heading(me.position, them.position);
            cohesion = cohesion + heading;
            if heading.length() < config.separation {
                separation = separation - heading;
            }
            alignment = alignment + them.velocity;
        }
        let steer = cohesion.scale(config.cohere)
            + separation.scale(config.separate)
            + alignment.scale(config.match_);
        velocity = (velocity + steer.scale(1.0 / neighbors.len() as f64)).normalize();
    }

    let target = me.position + velocity.scale(config.speed);
    match space.move_agent(id, target) {
        Ok(()) => {}
        // bounded plane: turn around instead of leaving it
        Err(SimulationError::OutOfBounds { .. }) => velocity = velocity.scale(-1.0),
        Err(e) => return Err(e),
    }
    let boid = &mut boids[id];
    boid.velocity = velocity;
    boid.position = space.position_of(id).unwrap_or(me.position);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(population: usize, torus: bool) -> FlockConfig {
        FlockConfig {
            population,
            width: 50.0,
            height: 50.0,
            torus,
            rng_seed: Some(1234),
            ..FlockConfig::default()
        }
    }

    #[test]
    fn velocities_stay_unit_and_boids_inside() {
        for torus in [true, false] {
            let mut flock = FlockModel::new(seeded(60, torus)).unwrap();
            flock.run(40).unwrap();
            for b in flock.boids() {
                assert!((b.velocity.length() - 1.0).abs() < 1e-9);
                assert!(b.position.x >= 0.0 && b.position.x < 50.0);
                assert!(b.position.y >= 0.0 && b.position.y < 50.0);
                assert_eq!(flock.space().position_of(b.id), Some(b.position));
            }
            assert_eq!(flock.space().occupancy(), 60);
        }
    }

    #[test]
    fn seeded_flocks_are_identical() {
        let mut a = FlockModel::new(seeded(30, true)).unwrap();
        let mut b = FlockModel::new(seeded(30, true)).unwrap();
        a.run(15).unwrap();
        b.run(15).unwrap();
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.swarm_labels(5.0), b.swarm_labels(5.0));
    }

    #[test]
    fn lone_boid_flies_straight() {
        let mut flock = FlockModel::new(seeded(1, true)).unwrap();
        let v = flock.boids()[0].velocity;
        flock.run(5).unwrap();
        assert_eq!(flock.boids()[0].velocity, v);
    }

    #[test]
    fn swarm_labels_cover_all_boids() {
        let flock = FlockModel::new(seeded(80, true)).unwrap();
        let labels = flock.swarm_labels(8.0);
        assert_eq!(labels.len(), 80);
        assert_eq!(labels[0], 0);
        let count = cluster::cluster_count(&labels);
        assert!(count >= 1 && count <= 80);
    }

    #[test]
    fn vision_that_does_not_divide_the_plane_still_sees_across_the_edge() {
        let config = FlockConfig {
            vision: 15.0,
            ..seeded(70, true)
        };
        let mut flock = FlockModel::new(config).unwrap();
        for _ in 0..5 {
            flock.step().unwrap();
            let space = flock.space();
            for b in flock.boids() {
                let expected: Vec<AgentId> = flock
                    .boids()
                    .iter()
                    .filter(|o| o.id != b.id && space.distance(b.position, o.position) < 15.0)
                    .map(|o| o.id)
                    .collect();
                assert_eq!(space.neighbors_within(b.position, 15.0, Some(b.id)), expected);
            }
        }
    }

    #[test]
    fn bad_vision_is_rejected() {
        let config = FlockConfig {
            vision: 0.0,
            ..FlockConfig::default()
        };
        assert!(matches!(
            FlockModel::new(config),
            Err(SimulationError::InvalidConfiguration(_))
        ));
    }
}
