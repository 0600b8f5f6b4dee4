/// Bowling parameters as set on the input panel.
///
/// A snapshot of these is copied into each run at bowl time, so later edits
/// never affect a delivery already in flight.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
#[ts(export, export_to = "../../web/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    /// Release speed (km/h)
    pub speed: f64,
    /// Swing coefficient, negative swings toward -x
    pub swing: f64,
    /// Seam angle relative to the direction of travel (degrees)
    pub seam_angle: f64,
    /// Lateral offset at release (m)
    pub line: f64,
    /// Distance along the pitch at which the delivery stops (m)
    pub length: f64,
}

/// Inclusive panel range for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
}

impl ParamRange {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }
}

pub const SPEED_RANGE: ParamRange = ParamRange::new(80.0, 160.0);
pub const SWING_RANGE: ParamRange = ParamRange::new(-1.0, 1.0);
pub const SEAM_ANGLE_RANGE: ParamRange = ParamRange::new(0.0, 30.0);
pub const LINE_RANGE: ParamRange = ParamRange::new(-1.0, 1.0);
pub const LENGTH_RANGE: ParamRange = ParamRange::new(10.0, 22.0);

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            speed: 130.0,
            swing: 0.5,
            seam_angle: 15.0,
            line: 0.0,
            length: 18.0,
        }
    }
}

impl SimulationParameters {
    fn fields(&self) -> [(&'static str, f64, ParamRange); 5] {
        [
            ("speed", self.speed, SPEED_RANGE),
            ("swing", self.swing, SWING_RANGE),
            ("seam_angle", self.seam_angle, SEAM_ANGLE_RANGE),
            ("line", self.line, LINE_RANGE),
            ("length", self.length, LENGTH_RANGE),
        ]
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value, range) in self.fields() {
            if !value.is_finite() {
                return Err(format!("{} must be finite", name));
            }
            if !range.contains(value) {
                return Err(format!(
                    "{} must be in [{}, {}], got {}",
                    name, range.min, range.max, value
                ));
            }
        }
        Ok(())
    }

    /// Clamp every field into its panel range. Non-finite values fall back
    /// to the field's default.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        let clamp = |v: f64, fallback: f64, r: ParamRange| {
            if v.is_finite() {
                v.clamp(r.min, r.max)
            } else {
                fallback
            }
        };
        Self {
            speed: clamp(self.speed, defaults.speed, SPEED_RANGE),
            swing: clamp(self.swing, defaults.swing, SWING_RANGE),
            seam_angle: clamp(self.seam_angle, defaults.seam_angle, SEAM_ANGLE_RANGE),
            line: clamp(self.line, defaults.line, LINE_RANGE),
            length: clamp(self.length, defaults.length, LENGTH_RANGE),
        }
    }
}
