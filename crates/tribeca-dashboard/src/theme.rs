/*
[INPUT]:  Server wall-clock hour, user theme toggles
[OUTPUT]: Day/night theme decision
[POS]:    View state - theme selection for the main window
[UPDATE]: When the day/night window or override rules change
*/

use std::fmt;

use serde::{Deserialize, Serialize};

const DAY_START_HOUR: u32 = 9;
const NIGHT_START_HOUR: u32 = 21;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    /// Dark outside 09:00-21:00.
    pub fn for_hour(hour: u32) -> Self {
        if !(DAY_START_HOUR..NIGHT_START_HOUR).contains(&hour) {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current theme plus the user's explicit choice, if any.
///
/// Once the user has toggled, the hour no longer matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThemeState {
    current: Theme,
    user: Option<Theme>,
}

impl ThemeState {
    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn user_override(&self) -> Option<Theme> {
        self.user
    }

    /// Re-evaluate against `hour`. Returns `true` when the theme changed.
    pub fn apply_hour(&mut self, hour: u32) -> bool {
        let next = self.user.unwrap_or_else(|| Theme::for_hour(hour));
        let changed = next != self.current;
        self.current = next;
        changed
    }

    /// Flip the theme and pin it as the user's choice.
    pub fn toggle(&mut self) -> Theme {
        let next = self.user.unwrap_or(self.current).toggled();
        self.user = Some(next);
        self.current = next;
        next
    }
}
