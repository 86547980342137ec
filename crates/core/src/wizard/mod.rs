//! CCTV quote wizard.
//!
//! A linear step machine: each step is asked only when its predicate holds
//! for the answers collected so far. Locations fan out into a per-location
//! quantity sub-flow, followed by a scripted calculating step. Once every step
//! is passed the answers become a [`CctvQuoteRequest`](crate::domain::cctv_quote::CctvQuoteRequest)
//! handed to a [`QuoteSubmitter`].

pub mod calculating;
pub mod engine;
pub mod states;
pub mod steps;

pub use calculating::{CalculationScript, QuoteCalculation, ScriptedMessage};
pub use engine::{
    QuoteSubmitter, SubmitError, WizardEngine, WizardError, WizardSettings, DEFAULT_UNIT_PRICE,
};
pub use states::{Answer, AnswerSet, QuantitySelection, StepOutcome, StepPrompt, WizardState};
pub use steps::{ChoiceOption, InputKind, StepDefinition, StepField, STEPS};
