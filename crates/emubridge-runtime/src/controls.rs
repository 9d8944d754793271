//! Controller snapshot polled by the emulator via `GET controls`.

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::value::render_bool;

pub const AXIS_MIN: i32 = -128;
pub const AXIS_MAX: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    Button(bool),
    /// Signed analog axis, clamped to `AXIS_MIN..=AXIS_MAX`.
    Axis(i32),
}

impl ControlValue {
    #[must_use]
    pub fn clamped(self) -> Self {
        match self {
            Self::Axis(value) => Self::Axis(value.clamp(AXIS_MIN, AXIS_MAX)),
            button => button,
        }
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Button(pressed) => f.write_str(render_bool(*pressed)),
            Self::Axis(value) => write!(f, "{value}"),
        }
    }
}

/// One entry of an action map: the controls an action sets.
pub type ControlAssignment = IndexMap<SmolStr, ControlValue>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlProfile {
    #[default]
    N64,
    Nes,
    Empty,
}

const N64_BUTTONS: &[&str] = &[
    "P1 A",
    "P1 A Down",
    "P1 A Left",
    "P1 A Right",
    "P1 A Up",
    "P1 B",
    "P1 C Down",
    "P1 C Left",
    "P1 C Right",
    "P1 C Up",
    "P1 DPad D",
    "P1 DPad L",
    "P1 DPad R",
    "P1 DPad U",
    "P1 L",
    "P1 R",
    "P1 Start",
];

const NES_BUTTONS: &[&str] = &[
    "P1 A",
    "P1 B",
    "P1 Down",
    "P1 Left",
    "P1 Right",
    "P1 Select",
    "P1 Start",
    "P1 Up",
    "Power",
    "Reset",
];

impl ControlProfile {
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "n64" => Some(Self::N64),
            "nes" => Some(Self::Nes),
            "none" | "empty" => Some(Self::Empty),
            _ => None,
        }
    }

    #[must_use]
    pub fn controls(self) -> Controls {
        let mut controls = Controls::new();
        match self {
            Self::N64 => {
                for name in N64_BUTTONS {
                    controls.set(name, ControlValue::Button(false));
                }
                controls.set("P1 X Axis", ControlValue::Axis(0));
                controls.set("P1 Y Axis", ControlValue::Axis(0));
                controls.set("P1 Z", ControlValue::Button(false));
                controls.set("Power", ControlValue::Button(false));
                controls.set("Reset", ControlValue::Button(false));
            }
            Self::Nes => {
                for name in NES_BUTTONS {
                    controls.set(name, ControlValue::Button(false));
                }
            }
            Self::Empty => {}
        }
        controls
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Controls {
    values: IndexMap<SmolStr, ControlValue>,
}

impl Controls {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<ControlValue> {
        self.values.get(name).copied()
    }

    pub fn set(&mut self, name: &str, value: ControlValue) {
        self.values.insert(SmolStr::new(name), value.clamped());
    }

    /// Merges an action-map entry; controls it does not mention keep their values.
    pub fn apply(&mut self, assignment: &ControlAssignment) {
        for (name, value) in assignment {
            self.set(name, *value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ControlValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `name:value` pairs joined by commas, in insertion order.
    #[must_use]
    pub fn render(&self) -> String {
        self.values
            .iter()
            .map(|(name, value)| format!("{name}:{value}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    #[test]
    fn nes_profile_renders_in_order() {
        let controls = ControlProfile::Nes.controls();
        expect![[r#"P1 A:False,P1 B:False,P1 Down:False,P1 Left:False,P1 Right:False,P1 Select:False,P1 Start:False,P1 Up:False,Power:False,Reset:False"#]]
            .assert_eq(&controls.render());
    }

    #[test]
    fn n64_profile_has_axes() {
        let controls = ControlProfile::N64.controls();
        assert_eq!(controls.len(), 22);
        assert_eq!(controls.get("P1 X Axis"), Some(ControlValue::Axis(0)));
        assert_eq!(controls.get("P1 Z"), Some(ControlValue::Button(false)));
    }

    #[test]
    fn apply_merges_and_clamps() {
        let mut controls = ControlProfile::N64.controls();
        let mut assignment = ControlAssignment::new();
        assignment.insert("P1 A".into(), ControlValue::Button(true));
        assignment.insert("P1 X Axis".into(), ControlValue::Axis(300));
        controls.apply(&assignment);
        assert_eq!(controls.get("P1 A"), Some(ControlValue::Button(true)));
        assert_eq!(controls.get("P1 X Axis"), Some(ControlValue::Axis(AXIS_MAX)));
        assert_eq!(controls.get("P1 B"), Some(ControlValue::Button(false)));
    }

    #[test]
    fn profile_names() {
        assert_eq!(ControlProfile::parse("N64"), Some(ControlProfile::N64));
        assert_eq!(ControlProfile::parse("nes"), Some(ControlProfile::Nes));
        assert_eq!(ControlProfile::parse("none"), Some(ControlProfile::Empty));
        assert_eq!(ControlProfile::parse("snes"), None);
    }
}
