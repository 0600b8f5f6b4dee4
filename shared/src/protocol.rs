use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::params::SimulationParameters;
use crate::vec3::Vec3;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Why a delivery stopped integrating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// Ball centre reached ball-radius height
    Landed,
    /// Ball travelled the configured length along the pitch
    ReachedLength,
    /// Step ceiling hit before either of the above
    StepLimit,
}

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "run_started")]
    RunStarted(RunStartedMsg),
    #[serde(rename = "ball_position")]
    BallPosition(BallPositionMsg),
    #[serde(rename = "trajectory")]
    Trajectory(TrajectoryMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    /// Initial values for the input panel
    pub defaults: SimulationParameters,
    /// Integration timestep (s)
    pub dt: f64,
    pub ball_radius: f64,
    /// Most recent finished delivery, so a late joiner can draw it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_delivery: Option<TrajectoryMsg>,
}

/// A new run replaced the previous one. Renderers drop the old line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct RunStartedMsg {
    pub run_id: u32,
    pub params: SimulationParameters,
    pub launch: [f64; 3],
}

/// Live ball position after one integration step.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct BallPositionMsg {
    pub run_id: u32,
    pub step: u32,
    pub pos: [f64; 3],
}

/// Finished delivery: the polyline to draw, in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryMsg {
    pub run_id: u32,
    pub points: Vec<[f64; 3]>,
    pub final_pos: [f64; 3],
    pub steps: u32,
    pub reason: TerminationReason,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "bowl")]
    Bowl { params: SimulationParameters },
}

// === Conversion helpers ===

/// Round to 4 decimal places (0.1 mm, plenty for drawing; keeps JSON small)
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

/// Wire form of a position, rounded for display.
pub fn pos_wire(v: Vec3) -> [f64; 3] {
    [round4(v.x), round4(v.y), round4(v.z)]
}
