use std::fmt::Display;

use crate::utils::{clock::Clock, percentage::Percentage};

use super::state::Mood;

/// Coarse CPU load classification driving the base mood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuLevel {
    Low,
    Medium,
    High,
}

impl CpuLevel {
    pub fn from_usage(usage: Percentage) -> Self {
        if *usage > 70. {
            CpuLevel::High
        } else if *usage > 30. {
            CpuLevel::Medium
        } else {
            CpuLevel::Low
        }
    }

    pub fn base_mood(self) -> Mood {
        match self {
            CpuLevel::Low => Mood::Idle,
            CpuLevel::Medium => Mood::Happy,
            CpuLevel::High => Mood::Surprised,
        }
    }
}

impl Display for CpuLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuLevel::Low => write!(f, "low"),
            CpuLevel::Medium => write!(f, "medium"),
            CpuLevel::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    /// 6:00 - 9:59
    Morning,
    /// 10:00 - 17:59
    Afternoon,
    /// 18:00 - 23:59
    Evening,
    /// 0:00 - 5:59
    Night,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..10 => TimeOfDay::Morning,
            10..18 => TimeOfDay::Afternoon,
            18..24 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn current(clock: &dyn Clock) -> Self {
        use chrono::Timelike;
        Self::from_hour(clock.time().hour())
    }

    pub fn is_night(self) -> bool {
        self == TimeOfDay::Night
    }
}
