use crate::config::ServerConfig;
use crate::session::BowlingSession;
use crate::simulator::{BallState, StepOutcome, BALL_RADIUS};
use bowling_shared::params::SimulationParameters;
use bowling_shared::protocol::{
    pos_wire, BallPositionMsg, RunStartedMsg, ServerMsg, WelcomeMsg, PROTOCOL_VERSION,
};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Commands from client connections to the bowling loop
pub enum BowlCommand {
    Join {
        response: oneshot::Sender<WelcomeMsg>,
    },
    Bowl {
        params: SimulationParameters,
        /// Receives the new run id
        response: Option<oneshot::Sender<u32>>,
    },
}

/// Run the bowling loop. Owns the session; advances the live run one step
/// per tick and broadcasts what renderers need to draw.
pub async fn run_bowl_loop(
    mut cmd_rx: mpsc::Receiver<BowlCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    server_config: ServerConfig,
) {
    let mut session = BowlingSession::new(server_config.simulator());

    if server_config.bowl_on_start {
        start_run(&mut session, &broadcast_tx, SimulationParameters::default());
    }

    let tick_duration = Duration::from_secs_f64(1.0 / server_config.tick_rate_hz as f64);
    let mut tick_interval = tokio::time::interval(tick_duration);
    tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = tick_interval.tick() => {
                tick(&mut session, &broadcast_tx);
            }

            Some(cmd) = cmd_rx.recv() => {
                match cmd {
                    BowlCommand::Join { response } => {
                        let _ = response.send(welcome(&session));
                    }
                    BowlCommand::Bowl { params, response } => {
                        let run_id = start_run(&mut session, &broadcast_tx, params);
                        if let Some(response) = response {
                            let _ = response.send(run_id);
                        }
                    }
                }
            }

            else => break,
        }
    }

    tracing::info!("Bowling loop ended");
}

fn start_run(
    session: &mut BowlingSession,
    broadcast_tx: &broadcast::Sender<ServerMsg>,
    params: SimulationParameters,
) -> u32 {
    let run_id = session.bowl(params);
    let launch = BallState::launch(&params).position;
    let _ = broadcast_tx.send(ServerMsg::RunStarted(RunStartedMsg {
        run_id,
        params,
        launch: pos_wire(launch),
    }));
    run_id
}

/// One scheduled step of the live run, if any.
fn tick(session: &mut BowlingSession, broadcast_tx: &broadcast::Sender<ServerMsg>) {
    let Some(run_id) = session.running_run_id() else {
        return;
    };

    match session.step(run_id) {
        StepOutcome::Advanced { step, position } => {
            let _ = broadcast_tx.send(ServerMsg::BallPosition(BallPositionMsg {
                run_id,
                step,
                pos: pos_wire(position),
            }));
        }
        StepOutcome::Finished(delivery) => {
            let _ = broadcast_tx.send(ServerMsg::Trajectory(delivery.to_wire()));
        }
        StepOutcome::Done | StepOutcome::Stale => {}
    }
}

fn welcome(session: &BowlingSession) -> WelcomeMsg {
    WelcomeMsg {
        protocol_version: PROTOCOL_VERSION,
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        defaults: SimulationParameters::default(),
        dt: session.config().dt,
        ball_radius: BALL_RADIUS,
        last_delivery: session.last_delivery().map(|d| d.to_wire()),
    }
}
