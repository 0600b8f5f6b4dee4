//! Delivery integrator.
//!
//! A run starts at the release point and is advanced one fixed timestep per
//! call with explicit Euler: gravity plus a lateral swing term whose size
//! grows with the square of the ball's speed. Termination is checked before
//! each step, so the last stored sample is the one that tripped the check
//! (and may sit slightly below the ground threshold).

use std::sync::Arc;

use bowling_shared::params::SimulationParameters;
use bowling_shared::protocol::{pos_wire, TrajectoryMsg};
use bowling_shared::vec3::{add, length_sq, scale, vec3, Vec3};

pub use bowling_shared::protocol::TerminationReason;

pub const BALL_RADIUS: f64 = 0.11;
/// Release height above the pitch (m)
pub const LAUNCH_HEIGHT: f64 = 2.1;
pub const GRAVITY: f64 = 9.81;
/// Scale applied to swing * sin(seam) * |v|²
pub const SWING_SCALE: f64 = 0.00004;
pub const KMH_PER_MS: f64 = 3.6;
/// Nominal 60 Hz frame
pub const DEFAULT_DT: f64 = 0.016;
pub const DEFAULT_MAX_STEPS: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    pub dt: f64,
    /// Runaway guard. Reaching it finalizes the run like a normal stop.
    pub max_steps: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallState {
    pub position: Vec3,
    /// m/s
    pub velocity: Vec3,
}

impl BallState {
    /// Release state: at (line, LAUNCH_HEIGHT, 0) travelling straight down
    /// the pitch toward -z.
    pub fn launch(params: &SimulationParameters) -> Self {
        Self {
            position: vec3(params.line, LAUNCH_HEIGHT, 0.0),
            velocity: vec3(0.0, 0.0, -params.speed / KMH_PER_MS),
        }
    }
}

/// Lateral swing acceleration for the current velocity. Only x is ever
/// non-zero.
pub fn swing_acceleration(params: &SimulationParameters, velocity: Vec3) -> Vec3 {
    let seam = params.seam_angle.to_radians().sin();
    vec3(params.swing * seam * length_sq(velocity) * SWING_SCALE, 0.0, 0.0)
}

/// Stop condition evaluated before integrating.
pub fn termination(ball: &BallState, params: &SimulationParameters) -> Option<TerminationReason> {
    if ball.position.y <= BALL_RADIUS {
        Some(TerminationReason::Landed)
    } else if ball.position.z <= -params.length {
        Some(TerminationReason::ReachedLength)
    } else {
        None
    }
}

/// One explicit Euler step: velocity first, then position from the new
/// velocity.
pub fn integrate(ball: BallState, params: &SimulationParameters, dt: f64) -> BallState {
    let gravity = vec3(0.0, -GRAVITY, 0.0);
    let swing = swing_acceleration(params, ball.velocity);

    let mut velocity = add(ball.velocity, scale(gravity, dt));
    velocity = add(velocity, scale(swing, dt));
    let position = add(ball.position, scale(velocity, dt));

    BallState { position, velocity }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Terminated(TerminationReason),
}

/// Frozen result of a finished run, handed to renderers once.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub run_id: u32,
    pub params: SimulationParameters,
    pub points: Arc<[Vec3]>,
    pub final_position: Vec3,
    pub final_velocity: Vec3,
    pub steps: u32,
    pub reason: TerminationReason,
}

impl Delivery {
    pub fn to_wire(&self) -> TrajectoryMsg {
        TrajectoryMsg {
            run_id: self.run_id,
            points: self.points.iter().map(|p| pos_wire(*p)).collect(),
            final_pos: pos_wire(self.final_position),
            steps: self.steps,
            reason: self.reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Integrated one step; `step` is 1-based.
    Advanced { step: u32, position: Vec3 },
    /// The stop condition tripped on this call.
    Finished(Delivery),
    /// Already terminated; nothing changed.
    Done,
    /// The caller's run id is no longer the live run.
    Stale,
}

/// A single delivery from release to stop.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    run_id: u32,
    params: SimulationParameters,
    config: SimulatorConfig,
    ball: BallState,
    trajectory: Vec<Vec3>,
    steps: u32,
    phase: Phase,
    delivery: Option<Delivery>,
}

impl SimulationRun {
    /// Fresh run at the release point with an empty trajectory. Parameters
    /// are not validated; out-of-range values just extrapolate.
    pub fn new(run_id: u32, params: SimulationParameters, config: SimulatorConfig) -> Self {
        Self {
            run_id,
            params,
            config,
            ball: BallState::launch(&params),
            trajectory: Vec::new(),
            steps: 0,
            phase: Phase::Running,
            delivery: None,
        }
    }

    pub fn run_id(&self) -> u32 {
        self.run_id
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn ball(&self) -> &BallState {
        &self.ball
    }

    pub fn trajectory(&self) -> &[Vec3] {
        &self.trajectory
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Set once the run has terminated.
    pub fn delivery(&self) -> Option<&Delivery> {
        self.delivery.as_ref()
    }

    /// Advance by one timestep, or finalize if the stop condition holds.
    pub fn step(&mut self) -> StepOutcome {
        if self.phase != Phase::Running {
            return StepOutcome::Done;
        }

        let reason = termination(&self.ball, &self.params).or_else(|| {
            (self.steps >= self.config.max_steps).then_some(TerminationReason::StepLimit)
        });
        if let Some(reason) = reason {
            return StepOutcome::Finished(self.finalize(reason));
        }

        self.ball = integrate(self.ball, &self.params, self.config.dt);
        self.trajectory.push(self.ball.position);
        self.steps += 1;

        StepOutcome::Advanced {
            step: self.steps,
            position: self.ball.position,
        }
    }

    fn finalize(&mut self, reason: TerminationReason) -> Delivery {
        self.phase = Phase::Terminated(reason);
        let delivery = Delivery {
            run_id: self.run_id,
            params: self.params,
            points: Arc::from(self.trajectory.as_slice()),
            final_position: self.ball.position,
            final_velocity: self.ball.velocity,
            steps: self.steps,
            reason,
        };

        if reason == TerminationReason::StepLimit {
            tracing::warn!(
                "Run {} hit the step ceiling ({}) without landing",
                self.run_id,
                self.steps
            );
        } else {
            tracing::debug!(
                "Run {} finished after {} steps ({:?}) at {:?}",
                self.run_id,
                self.steps,
                reason,
                self.ball.position
            );
        }

        self.delivery = Some(delivery.clone());
        delivery
    }
}

/// By-value transition for hosts that hold runs as plain state.
pub fn advance(mut run: SimulationRun) -> (SimulationRun, StepOutcome) {
    let outcome = run.step();
    (run, outcome)
}

/// Run a whole delivery without a host loop.
pub fn simulate(params: SimulationParameters, config: SimulatorConfig) -> Delivery {
    let mut run = SimulationRun::new(0, params, config);
    loop {
        if let StepOutcome::Finished(delivery) = run.step() {
            return delivery;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn params(
        speed: f64,
        swing: f64,
        seam_angle: f64,
        line: f64,
        length: f64,
    ) -> SimulationParameters {
        SimulationParameters {
            speed,
            swing,
            seam_angle,
            line,
            length,
        }
    }

    fn new_run() -> SimulationRun {
        SimulationRun::new(1, SimulationParameters::default(), SimulatorConfig::default())
    }

    fn run_to_end(run: &mut SimulationRun) -> Delivery {
        loop {
            if let StepOutcome::Finished(d) = run.step() {
                return d;
            }
        }
    }

    #[test]
    fn new_run_starts_at_release_point() {
        let p = params(130.0, 0.5, 15.0, 0.3, 18.0);
        let run = SimulationRun::new(1, p, SimulatorConfig::default());
        assert_eq!(run.ball().position, vec3(0.3, LAUNCH_HEIGHT, 0.0));
        assert_eq!(run.ball().velocity.x, 0.0);
        assert_eq!(run.ball().velocity.y, 0.0);
        assert!(run.ball().velocity.z < 0.0);
        assert!(run.trajectory().is_empty());
        assert_eq!(run.phase(), Phase::Running);
        assert!(run.delivery().is_none());
    }

    #[test]
    fn speed_144_kmh_is_40_ms() {
        let ball = BallState::launch(&params(144.0, 0.0, 0.0, 0.0, 18.0));
        assert_eq!(ball.velocity.z, -40.0);
    }

    #[test]
    fn swing_acceleration_matches_formula() {
        let p = params(144.0, 1.0, 30.0, 0.0, 18.0);
        let a = swing_acceleration(&p, vec3(0.0, 0.0, -40.0));
        // 1 * sin(30°) * 1600 * 0.00004
        assert!((a.x - 0.032).abs() < 1e-12);
        assert_eq!(a.y, 0.0);
        assert_eq!(a.z, 0.0);
    }

    #[test]
    fn first_step_is_explicit_euler() {
        let p = params(144.0, 1.0, 30.0, 0.0, 18.0);
        let dt = DEFAULT_DT;
        let next = integrate(BallState::launch(&p), &p, dt);

        let vx = 0.032 * dt;
        let vy = -GRAVITY * dt;
        assert!((next.velocity.x - vx).abs() < 1e-12);
        assert!((next.velocity.y - vy).abs() < 1e-12);
        assert_eq!(next.velocity.z, -40.0);
        assert!((next.position.x - vx * dt).abs() < 1e-12);
        assert!((next.position.y - (LAUNCH_HEIGHT + vy * dt)).abs() < 1e-12);
        assert!((next.position.z - (-40.0 * dt)).abs() < 1e-12);
    }

    #[test]
    fn no_swing_keeps_ball_on_line() {
        let p = params(130.0, 0.0, 15.0, 0.0, 18.0);
        let delivery = simulate(p, SimulatorConfig::default());

        assert!(delivery.points.iter().all(|pt| pt.x == 0.0));
        // A 130 km/h full delivery passes 18 m before dropping to the ground.
        assert_eq!(delivery.reason, TerminationReason::ReachedLength);
        assert_eq!(delivery.steps, 32);
        assert!(delivery.final_position.y > BALL_RADIUS);
        assert!(delivery.final_position.z <= -18.0);
    }

    #[test]
    fn positive_swing_drifts_toward_positive_x() {
        let delivery = simulate(
            params(130.0, 1.0, 30.0, 0.0, 18.0),
            SimulatorConfig::default(),
        );
        assert!(delivery.final_position.x > 0.0);
    }

    #[test]
    fn negative_swing_drifts_toward_negative_x() {
        let delivery = simulate(
            params(130.0, -1.0, 30.0, 0.0, 18.0),
            SimulatorConfig::default(),
        );
        assert!(delivery.final_position.x < 0.0);
    }

    #[test]
    fn slow_ball_lands_short_and_may_finish_below_threshold() {
        let delivery = simulate(params(80.0, 0.5, 15.0, 0.0, 22.0), SimulatorConfig::default());
        assert_eq!(delivery.reason, TerminationReason::Landed);
        assert_eq!(delivery.steps, 40);
        assert!(delivery.final_position.y <= BALL_RADIUS);
        assert!(delivery.final_position.z > -22.0);
    }

    #[test]
    fn last_sample_is_the_one_that_tripped_termination() {
        let p = params(80.0, 0.5, 15.0, 0.0, 22.0);
        let delivery = simulate(p, SimulatorConfig::default());
        let (last, earlier) = delivery.points.split_last().unwrap();
        assert_eq!(*last, delivery.final_position);
        for pt in earlier {
            let ball = BallState {
                position: *pt,
                velocity: Vec3::ZERO,
            };
            assert!(termination(&ball, &p).is_none());
        }
    }

    #[test]
    fn steps_after_termination_are_noops() {
        let mut run = new_run();
        let delivery = run_to_end(&mut run);
        let ball = *run.ball();
        let len = run.trajectory().len();

        for _ in 0..5 {
            assert_eq!(run.step(), StepOutcome::Done);
        }
        assert_eq!(*run.ball(), ball);
        assert_eq!(run.trajectory().len(), len);
        assert_eq!(run.phase(), Phase::Terminated(delivery.reason));
        assert_eq!(run.delivery(), Some(&delivery));
    }

    #[test]
    fn runs_are_deterministic() {
        let p = params(147.5, -0.37, 22.0, 0.41, 19.5);
        let a = simulate(p, SimulatorConfig::default());
        let b = simulate(p, SimulatorConfig::default());
        assert_eq!(a.points, b.points);
        assert_eq!(a.final_velocity, b.final_velocity);
    }

    #[test]
    fn height_strictly_decreases_every_step() {
        let delivery = simulate(params(80.0, 1.0, 30.0, 0.0, 22.0), SimulatorConfig::default());
        let mut prev = LAUNCH_HEIGHT;
        for pt in delivery.points.iter() {
            assert!(pt.y < prev, "y went from {} to {}", prev, pt.y);
            prev = pt.y;
        }
    }

    #[test]
    fn step_ceiling_forces_finalize() {
        let config = SimulatorConfig {
            dt: DEFAULT_DT,
            max_steps: 5,
        };
        let delivery = simulate(SimulationParameters::default(), config);
        assert_eq!(delivery.reason, TerminationReason::StepLimit);
        assert_eq!(delivery.steps, 5);
        assert_eq!(delivery.points.len(), 5);
    }

    #[test]
    fn out_of_range_parameters_extrapolate() {
        // Zero speed drops straight down; negative speed travels toward +z.
        let still = simulate(params(0.0, 5.0, 90.0, 3.0, 18.0), SimulatorConfig::default());
        assert_eq!(still.reason, TerminationReason::Landed);
        assert_eq!(still.final_position.z, 0.0);

        let backwards = simulate(
            params(-100.0, 0.0, 0.0, 0.0, 18.0),
            SimulatorConfig::default(),
        );
        assert_eq!(backwards.reason, TerminationReason::Landed);
        assert!(backwards.final_position.z > 0.0);
    }

    #[test]
    fn advance_by_value_matches_in_place_step() {
        let p = SimulationParameters::default();
        let mut in_place = SimulationRun::new(2, p, SimulatorConfig::default());
        let mut by_value = SimulationRun::new(2, p, SimulatorConfig::default());

        for _ in 0..10 {
            let a = in_place.step();
            let (next, b) = advance(by_value);
            by_value = next;
            assert_eq!(a, b);
        }
        assert_eq!(in_place.trajectory(), by_value.trajectory());
    }

    #[test]
    fn stored_samples_are_copies() {
        let mut run = new_run();
        run.step();
        let first = run.trajectory()[0];
        run.step();
        assert_eq!(run.trajectory()[0], first);
        assert_ne!(run.trajectory()[1], first);
    }

    #[test]
    fn delivery_wire_form_keeps_order_and_reason() {
        let delivery = simulate(SimulationParameters::default(), SimulatorConfig::default());
        let wire = delivery.to_wire();
        assert_eq!(wire.points.len(), delivery.points.len());
        assert_eq!(wire.steps, delivery.steps);
        assert_eq!(wire.reason, delivery.reason);
        assert!(wire.points[0][2] > wire.points[wire.points.len() - 1][2]);
    }

    #[test]
    fn random_panel_settings_respect_stop_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(2024);
        let config = SimulatorConfig::default();

        for _ in 0..500 {
            let p = params(
                rng.gen_range(80.0..=160.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(0.0..=30.0),
                rng.gen_range(-1.0..=1.0),
                rng.gen_range(10.0..=22.0),
            );
            let delivery = simulate(p, config);
            assert_ne!(delivery.reason, TerminationReason::StepLimit);

            // z speed is constant, so the overshoot is at most one step of it.
            let step_dz = p.speed / KMH_PER_MS * config.dt;
            assert!(
                delivery.final_position.z >= -p.length - step_dz - 1e-9,
                "overshoot too large for {:?}: z = {}",
                p,
                delivery.final_position.z
            );

            let sign = p.swing * p.seam_angle.to_radians().sin();
            let drift = delivery.final_position.x - p.line;
            if sign > 0.0 {
                assert!(drift > 0.0);
            } else if sign < 0.0 {
                assert!(drift < 0.0);
            }
        }
    }
}
