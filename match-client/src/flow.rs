//! The multi-step interaction state machine. It collects a player's intent
//! (action kind, optional named sub-choice, optional target) across UI steps
//! until a dispatchable selection exists. The flow never touches the network;
//! the caller maps the finished [`Selection`] onto a `ClientAction`.
//!
//! Each interaction is described up front by an [`InteractionPlan`] variant,
//! so the set of steps is fixed by the variant shape: a plan without a choice
//! step cannot be asked for a choice, and an interaction with no steps at all
//! never constructs a flow in the first place.

use protocol::{BOARD_SLOTS, Side};
use thiserror::Error;

/// A target side as the player sees it. Converted to an absolute [`Side`]
/// only when the payload is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelativeSide {
    Own,
    Enemy,
}

impl RelativeSide {
    /// Resolves against the viewer's fixed side.
    pub fn absolute(self, viewer: Side) -> Side {
        match self {
            RelativeSide::Own => viewer,
            RelativeSide::Enemy => viewer.opposite(),
        }
    }
}

/// Which side(s) a target may be picked from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetSides {
    OwnOnly,
    EnemyOnly,
    Either,
}

/// Per-side-per-slot availability. Defaults to everything available.
#[derive(Clone, Copy, Debug)]
pub struct SlotMask {
    pub own: [bool; BOARD_SLOTS],
    pub enemy: [bool; BOARD_SLOTS],
}

impl Default for SlotMask {
    fn default() -> Self {
        SlotMask {
            own: [true; BOARD_SLOTS],
            enemy: [true; BOARD_SLOTS],
        }
    }
}

/// Constraints on the target step.
#[derive(Clone, Debug)]
pub struct TargetRule {
    pub sides: TargetSides,
    pub mask: SlotMask,
}

impl TargetRule {
    pub fn new(sides: TargetSides) -> Self {
        TargetRule {
            sides,
            mask: SlotMask::default(),
        }
    }

    fn validate(&self, side: RelativeSide, slot: u8) -> Result<(), FlowError> {
        match (self.sides, side) {
            (TargetSides::OwnOnly, RelativeSide::Enemy)
            | (TargetSides::EnemyOnly, RelativeSide::Own) => {
                return Err(FlowError::SideNotAllowed);
            }
            _ => {}
        }
        let index = slot as usize;
        if index >= BOARD_SLOTS {
            return Err(FlowError::SlotOutOfRange);
        }
        let available = match side {
            RelativeSide::Own => self.mask.own[index],
            RelativeSide::Enemy => self.mask.enemy[index],
        };
        if !available {
            return Err(FlowError::SlotUnavailable);
        }
        Ok(())
    }
}

/// A named sub-variant of an action (e.g. a spell's BUFF/DEBUFF branch).
#[derive(Clone, Debug)]
pub struct ChoiceOption {
    pub key: String,
    pub label: String,
}

/// One entry of an action menu, with its own follow-up steps.
#[derive(Clone, Debug)]
pub struct ActionOption {
    pub key: String,
    pub label: String,
    pub choices: Vec<ChoiceOption>,
    pub target: Option<TargetRule>,
}

/// The full description of one interaction. The variant fixes which steps
/// exist; steps that are not part of the variant are skipped structurally.
#[derive(Clone, Debug)]
pub enum InteractionPlan {
    /// More than one action is possible from the same trigger (e.g. clicking
    /// an own unit offers attack vs. ability). Starts at the action step.
    ActionMenu { options: Vec<ActionOption> },
    /// The action kind is already fixed; the player still picks a sub-variant
    /// and possibly a target.
    Choice {
        action_key: String,
        choices: Vec<ChoiceOption>,
        target: Option<TargetRule>,
    },
    /// The legacy single-step "pick a slot" interaction: only the target step.
    SlotPick {
        action_key: String,
        target: TargetRule,
    },
}

/// Where the flow currently waits for input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    PickAction,
    PickChoice,
    PickTarget,
    Done,
}

/// What the flow hands back when it completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub action_key: String,
    pub choice_key: Option<String>,
    pub side: Option<RelativeSide>,
    pub slot: Option<u8>,
}

/// The outcome of one step: either the flow waits for more input or it is done.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Pending(Stage),
    Done(Selection),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FlowError {
    #[error("the flow is not waiting for an action pick")]
    NotAwaitingAction,
    #[error("the flow is not waiting for a choice pick")]
    NotAwaitingChoice,
    #[error("the flow is not waiting for a target pick")]
    NotAwaitingTarget,
    #[error("unknown action key")]
    UnknownActionKey,
    #[error("unknown choice key")]
    UnknownChoiceKey,
    #[error("that side cannot be targeted")]
    SideNotAllowed,
    #[error("target slot out of range")]
    SlotOutOfRange,
    #[error("that slot is not available")]
    SlotUnavailable,
}

/// The stepper. Feed it picks until [`Step::Done`] comes back.
#[derive(Debug)]
pub struct InteractionFlow {
    stage: Stage,
    menu: Vec<ActionOption>,
    action_key: Option<String>,
    choice_key: Option<String>,
    side: Option<RelativeSide>,
    slot: Option<u8>,
    pending_choices: Vec<ChoiceOption>,
    pending_target: Option<TargetRule>,
}

impl InteractionFlow {
    /// Builds the flow and settles on its first real stage. A plan whose steps
    /// are all absent completes immediately; probe with [`InteractionFlow::stage`]
    /// and collect via [`InteractionFlow::selection`].
    pub fn new(plan: InteractionPlan) -> InteractionFlow {
        let mut flow = match plan {
            InteractionPlan::ActionMenu { options } => InteractionFlow {
                stage: Stage::PickAction,
                menu: options,
                action_key: None,
                choice_key: None,
                side: None,
                slot: None,
                pending_choices: Vec::new(),
                pending_target: None,
            },
            InteractionPlan::Choice {
                action_key,
                choices,
                target,
            } => InteractionFlow {
                stage: Stage::PickChoice,
                menu: Vec::new(),
                action_key: Some(action_key),
                choice_key: None,
                side: None,
                slot: None,
                pending_choices: choices,
                pending_target: target,
            },
            InteractionPlan::SlotPick { action_key, target } => InteractionFlow {
                stage: Stage::PickTarget,
                menu: Vec::new(),
                action_key: Some(action_key),
                choice_key: None,
                side: None,
                slot: None,
                pending_choices: Vec::new(),
                pending_target: Some(target),
            },
        };
        if flow.stage != Stage::PickAction {
            flow.stage = flow.next_stage();
        }
        flow
    }

    /// Where the flow currently waits.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The menu entries, for rendering the action step.
    pub fn menu(&self) -> &[ActionOption] {
        &self.menu
    }

    /// The choice entries of the current step, for rendering.
    pub fn choices(&self) -> &[ChoiceOption] {
        &self.pending_choices
    }

    /// The finished selection, once the flow reached [`Stage::Done`].
    pub fn selection(&self) -> Option<Selection> {
        if self.stage != Stage::Done {
            return None;
        }
        Some(Selection {
            action_key: self.action_key.clone().unwrap_or_default(),
            choice_key: self.choice_key.clone(),
            side: self.side,
            slot: self.slot,
        })
    }

    /// Picks the action kind. Only legal while the flow waits at the action step.
    pub fn pick_action(&mut self, key: &str) -> Result<Step, FlowError> {
        if self.stage != Stage::PickAction {
            return Err(FlowError::NotAwaitingAction);
        }
        let option = self
            .menu
            .iter()
            .find(|option| option.key == key)
            .ok_or(FlowError::UnknownActionKey)?;
        self.action_key = Some(option.key.clone());
        self.pending_choices = option.choices.clone();
        self.pending_target = option.target.clone();
        self.stage = self.next_stage();
        Ok(self.step_result())
    }

    /// Picks the named sub-variant.
    pub fn pick_choice(&mut self, key: &str) -> Result<Step, FlowError> {
        if self.stage != Stage::PickChoice {
            return Err(FlowError::NotAwaitingChoice);
        }
        if !self.pending_choices.iter().any(|choice| choice.key == key) {
            return Err(FlowError::UnknownChoiceKey);
        }
        self.choice_key = Some(key.to_string());
        self.pending_choices.clear();
        self.stage = self.next_stage();
        Ok(self.step_result())
    }

    /// Picks the target side and slot, validated against the rule's side
    /// constraint and availability mask.
    pub fn pick_target(&mut self, side: RelativeSide, slot: u8) -> Result<Step, FlowError> {
        if self.stage != Stage::PickTarget {
            return Err(FlowError::NotAwaitingTarget);
        }
        let rule = self
            .pending_target
            .as_ref()
            .expect("target stage implies a target rule");
        rule.validate(side, slot)?;
        self.pending_target = None;
        self.side = Some(side);
        self.slot = Some(slot);
        self.stage = Stage::Done;
        Ok(self.step_result())
    }

    /// The next stage given what is still pending. Skipping falls out of the
    /// pending fields being empty.
    fn next_stage(&self) -> Stage {
        if !self.pending_choices.is_empty() {
            Stage::PickChoice
        } else if self.pending_target.is_some() {
            Stage::PickTarget
        } else {
            Stage::Done
        }
    }

    fn step_result(&self) -> Step {
        match self.stage {
            Stage::Done => Step::Done(
                self.selection()
                    .expect("a finished flow always has a selection"),
            ),
            pending => Step::Pending(pending),
        }
    }
}
