use bowling_shared::params::SimulationParameters;

use crate::simulator::{Delivery, Phase, SimulationRun, SimulatorConfig, StepOutcome};

/// Owner of the one live delivery.
///
/// Every bowl bumps the run id. A step request carrying an older id is
/// rejected, so a continuation scheduled for a superseded run can never
/// touch the new trajectory.
pub struct BowlingSession {
    config: SimulatorConfig,
    run: Option<SimulationRun>,
    next_run_id: u32,
    last_delivery: Option<Delivery>,
}

impl BowlingSession {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            config,
            run: None,
            next_run_id: 1,
            last_delivery: None,
        }
    }

    /// Start a new run, discarding the previous one and its delivery.
    /// Returns the new run id.
    pub fn bowl(&mut self, params: SimulationParameters) -> u32 {
        let run_id = self.next_run_id;
        self.next_run_id = self.next_run_id.wrapping_add(1);

        if let Some(old) = &self.run {
            if old.phase() == Phase::Running {
                tracing::debug!("Run {} superseded after {} steps", old.run_id(), old.steps());
            }
        }

        self.run = Some(SimulationRun::new(run_id, params, self.config));
        self.last_delivery = None;
        tracing::info!(
            "Run {} bowled: {:.1} km/h, swing {:.2}, seam {:.1}°, line {:.2}, length {:.1}",
            run_id,
            params.speed,
            params.swing,
            params.seam_angle,
            params.line,
            params.length
        );
        run_id
    }

    /// Advance the live run if `run_id` still names it.
    pub fn step(&mut self, run_id: u32) -> StepOutcome {
        let Some(run) = self.run.as_mut().filter(|r| r.run_id() == run_id) else {
            return StepOutcome::Stale;
        };

        let outcome = run.step();
        if let StepOutcome::Finished(delivery) = &outcome {
            self.last_delivery = Some(delivery.clone());
        }
        outcome
    }

    pub fn phase(&self) -> Phase {
        self.run.as_ref().map_or(Phase::Idle, |r| r.phase())
    }

    /// Id of the live run while it is still integrating.
    pub fn running_run_id(&self) -> Option<u32> {
        self.run
            .as_ref()
            .filter(|r| r.phase() == Phase::Running)
            .map(|r| r.run_id())
    }

    pub fn run(&self) -> Option<&SimulationRun> {
        self.run.as_ref()
    }

    pub fn last_delivery(&self) -> Option<&Delivery> {
        self.last_delivery.as_ref()
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }
}
