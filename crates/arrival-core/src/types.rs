use serde::{Deserialize, Serialize};
use std::fmt;

/// Geofence radius used when none has been configured.
pub const DEFAULT_RADIUS_METERS: u32 = 200;

/// A WGS84 latitude/longitude pair in decimal degrees.
///
/// `(0, 0)` doubles as the "unset" sentinel for the configured destination.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True for the `(0, 0)` sentinel.
    pub fn is_unset(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// True when both components are finite and within their valid ranges.
    pub fn in_range(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Snapshot of the workflow configuration, immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Opaque bot token, `<digits>:<token>`.
    pub endpoint_credential: String,
    /// Numeric chat id or `@handle`.
    pub target_channel: String,
    pub message_body: String,
    pub destination: Coordinate,
    #[serde(default = "default_radius")]
    pub radius_meters: u32,
    #[serde(default)]
    pub active: bool,
}

fn default_radius() -> u32 {
    DEFAULT_RADIUS_METERS
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            endpoint_credential: String::new(),
            target_channel: String::new(),
            message_body: String::new(),
            destination: Coordinate::default(),
            radius_meters: DEFAULT_RADIUS_METERS,
            active: false,
        }
    }
}

impl WorkflowConfig {
    /// Copy with surrounding whitespace removed from the text fields.
    pub fn trimmed(&self) -> Self {
        Self {
            endpoint_credential: self.endpoint_credential.trim().to_string(),
            target_channel: self.target_channel.trim().to_string(),
            message_body: self.message_body.trim().to_string(),
            ..self.clone()
        }
    }

    /// Copy with the `active` flag replaced.
    pub fn with_active(&self, active: bool) -> Self {
        Self {
            active,
            ..self.clone()
        }
    }

    /// Check every rule an armable configuration must satisfy.
    pub fn validate(&self) -> Result<(), crate::error::ValidationError> {
        crate::validate::validate_config(self)
    }
}

/// Persisted lifecycle status of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Inactive,
    Tracking,
    MessageSent,
    Error,
}

impl WorkflowStatus {
    pub const ALL: [WorkflowStatus; 4] = [
        WorkflowStatus::Inactive,
        WorkflowStatus::Tracking,
        WorkflowStatus::MessageSent,
        WorkflowStatus::Error,
    ];
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Inactive => "inactive",
            WorkflowStatus::Tracking => "tracking",
            WorkflowStatus::MessageSent => "message_sent",
            WorkflowStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(WorkflowStatus::Inactive),
            "tracking" => Ok(WorkflowStatus::Tracking),
            "message_sent" => Ok(WorkflowStatus::MessageSent),
            "error" => Ok(WorkflowStatus::Error),
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

/// One position fix delivered by the positioning subsystem. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub observed_at_millis: i64,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, observed_at_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            observed_at_millis,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Result of a single dispatch attempt, used to pick the next status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent_successfully: bool,
    pub error_detail: String,
}

impl DispatchOutcome {
    pub fn success() -> Self {
        Self {
            sent_successfully: true,
            error_detail: String::new(),
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            sent_successfully: false,
            error_detail: detail.into(),
        }
    }

    /// Status the workflow moves to after this outcome.
    pub fn status(&self) -> WorkflowStatus {
        if self.sent_successfully {
            WorkflowStatus::MessageSent
        } else {
            WorkflowStatus::Error
        }
    }
}

impl<E: fmt::Display> From<Result<(), E>> for DispatchOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => DispatchOutcome::success(),
            Err(e) => DispatchOutcome::failure(e.to_string()),
        }
    }
}

/// Parameters passed to the positioning subsystem when subscribing.
///
/// All three are hints for sources that poll or batch platform fixes. A
/// push source such as `ChannelSource` forwards whatever it is given and
/// only records the request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Desired interval between fixes.
    pub min_interval_millis: u64,
    /// Minimum displacement before a new fix is delivered.
    pub min_distance_meters: f32,
    /// Upper bound on how long fixes may be batched.
    pub max_update_delay_millis: u64,
}

impl Default for UpdateRequest {
    fn default() -> Self {
        Self {
            min_interval_millis: 10_000,
            min_distance_meters: 5.0,
            max_update_delay_millis: 15_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_inactive_with_default_radius() {
        let cfg = WorkflowConfig::default();
        assert!(!cfg.active);
        assert_eq!(cfg.radius_meters, 200);
        assert!(cfg.destination.is_unset());
        assert!(cfg.endpoint_credential.is_empty());
    }

    #[test]
    fn status_display_and_parse_agree() {
        for status in WorkflowStatus::ALL {
            let parsed: WorkflowStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("MESSAGE_SENT".parse::<WorkflowStatus>().is_err());
    }

    #[test]
    fn trimmed_strips_text_fields_only() {
        let cfg = WorkflowConfig {
            endpoint_credential: " 123:abc ".to_string(),
            target_channel: "\t@x\n".to_string(),
            message_body: "  hi there  ".to_string(),
            destination: Coordinate::new(1.0, 2.0),
            radius_meters: 50,
            active: true,
        };
        let t = cfg.trimmed();
        assert_eq!(t.endpoint_credential, "123:abc");
        assert_eq!(t.target_channel, "@x");
        assert_eq!(t.message_body, "hi there");
        assert_eq!(t.radius_meters, 50);
        assert!(t.active);
    }

    #[test]
    fn outcome_maps_to_status() {
        assert_eq!(DispatchOutcome::success().status(), WorkflowStatus::MessageSent);
        let failed: DispatchOutcome = Err::<(), _>("boom").into();
        assert!(!failed.sent_successfully);
        assert_eq!(failed.error_detail, "boom");
        assert_eq!(failed.status(), WorkflowStatus::Error);
    }

    #[test]
    fn sample_deserialises_without_timestamp() {
        let s: PositionSample =
            serde_json::from_str(r#"{"latitude": 37.5, "longitude": -122.25}"#).unwrap();
        assert_eq!(s.observed_at_millis, 0);
        assert_eq!(s.coordinate(), Coordinate::new(37.5, -122.25));
    }
}
