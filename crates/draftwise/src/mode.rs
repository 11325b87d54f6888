//! Switch between AI-driven and manual editing.
//!
//! The two paths never interleave: entering manual mode requires that no
//! operation is in flight, and while manual the store refuses chat turns.
//! The only ways back to AI-driven are committing or discarding the draft.

use crate::error::{Result, SessionError};
use crate::store::Activity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EditMode {
    #[default]
    AiDriven,
    Manual,
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditMode::AiDriven => write!(f, "ai-driven"),
            EditMode::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EditModeController {
    mode: EditMode,
}

impl EditModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_manual(&self) -> bool {
        self.mode == EditMode::Manual
    }

    /// `ai-driven → manual`, allowed only while `activity` is idle.
    pub fn enter_manual(&mut self, activity: Activity) -> Result<()> {
        if self.is_manual() {
            return Err(SessionError::ManualEditActive);
        }
        if activity != Activity::Idle {
            return Err(SessionError::Busy(activity));
        }
        self.mode = EditMode::Manual;
        Ok(())
    }

    /// `manual → ai-driven`. Returns whether the mode changed.
    pub fn exit_manual(&mut self) -> bool {
        let was_manual = self.is_manual();
        self.mode = EditMode::AiDriven;
        was_manual
    }

    /// Fail unless currently manual.
    pub fn require_manual(&self) -> Result<()> {
        if self.is_manual() {
            Ok(())
        } else {
            Err(SessionError::NotEditing)
        }
    }

    /// Fail if currently manual.
    pub fn require_ai_driven(&self) -> Result<()> {
        if self.is_manual() {
            Err(SessionError::ManualEditActive)
        } else {
            Ok(())
        }
    }
}
