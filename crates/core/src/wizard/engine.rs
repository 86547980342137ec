use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::cctv_quote::{CctvQuoteRequest, QuoteReceipt};
use crate::errors::DomainError;
use crate::wizard::calculating::{CalculationScript, QuoteCalculation, QuoteLine};
use crate::wizard::states::{
    Answer, AnswerSet, QuantitySelection, StepOutcome, StepPrompt, WizardState,
};
use crate::wizard::steps::{
    countable_locations, label_for, options_for, parse_quantity, InputKind,
    StepDefinition, StepField, CONSENT_REQUIRED, INSTALLATION_LOCATIONS, LOCATION_OTHER, QUANTITIES,
    STEPS,
};

pub const DEFAULT_UNIT_PRICE: i64 = 8_500;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WizardSettings {
    /// Monthly rental per camera, in won.
    pub unit_price: i64,
}

impl Default for WizardSettings {
    fn default() -> Self {
        Self { unit_price: DEFAULT_UNIT_PRICE }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("`{value}` is not an option for {field}")]
    UnknownOption { field: StepField, value: String },
    #[error("{field} expects {expected:?} input")]
    WrongInput { field: StepField, expected: InputKind },
    #[error("{0} needs at least one selection")]
    EmptySelection(StepField),
    #[error("privacy policy consent is required")]
    ConsentRequired,
    #[error("at least one location other than `other` is required")]
    NoCountableLocation,
    #[error("{0} must not be empty")]
    EmptyText(StepField),
    #[error("`{0}` is not a valid phone number")]
    InvalidPhone(String),
    #[error("the wizard is not waiting for an answer")]
    NotAwaitingAnswer,
    #[error("the wizard is not calculating a quote")]
    NotCalculating,
    #[error("the wizard has not reached the end of its steps")]
    NotReady,
    #[error("answer set is missing {0}")]
    Incomplete(&'static str),
    #[error("answer set is invalid: {0}")]
    InvalidAnswers(String),
    #[error("quote request was already submitted")]
    AlreadySubmitted,
    #[error("quote submission failed: {0}")]
    Submission(String),
}

impl WizardError {
    /// Text shown to the customer in the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::ConsentRequired => {
                "Please agree to the privacy policy (required) to continue.".to_owned()
            }
            Self::EmptySelection(_) => "Please choose at least one option.".to_owned(),
            Self::NoCountableLocation => {
                "Please choose at least one listed location in addition to Other.".to_owned()
            }
            Self::EmptyText(_) => "Please enter a value to continue.".to_owned(),
            Self::InvalidPhone(_) => "Please enter a phone number such as 010-1234-5678.".to_owned(),
            Self::UnknownOption { .. } | Self::WrongInput { .. } => {
                "Please pick one of the options shown.".to_owned()
            }
            Self::Submission(_) => {
                "We could not send your request. Please try again in a moment.".to_owned()
            }
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("quote request rejected: {0}")]
    Rejected(String),
    #[error("quote intake unavailable: {0}")]
    Unavailable(String),
}

/// Hands a completed answer set to the intake endpoint or store.
#[async_trait]
pub trait QuoteSubmitter: Send + Sync {
    async fn submit(&self, request: &CctvQuoteRequest) -> Result<QuoteReceipt, SubmitError>;
}

#[derive(Clone, Debug)]
pub struct WizardEngine {
    settings: WizardSettings,
    state: WizardState,
    cursor: usize,
    answers: AnswerSet,
    pending: Vec<String>,
    quantities: Option<QuantitySelection>,
    calculation: Option<QuoteCalculation>,
}

impl Default for WizardEngine {
    fn default() -> Self {
        Self::new(WizardSettings::default())
    }
}

impl WizardEngine {
    pub fn new(settings: WizardSettings) -> Self {
        Self {
            settings,
            state: WizardState::Asking(STEPS[0].field),
            cursor: 0,
            answers: AnswerSet::default(),
            pending: Vec::new(),
            quantities: None,
            calculation: None,
        }
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn quantity_selection(&self) -> Option<&QuantitySelection> {
        self.quantities.as_ref()
    }

    pub fn calculation(&self) -> Option<&QuoteCalculation> {
        self.calculation.as_ref()
    }

    pub fn current_step(&self) -> Option<&'static StepDefinition> {
        match self.state {
            WizardState::Asking(_) | WizardState::Calculating => STEPS.get(self.cursor),
            WizardState::ReadyToSubmit | WizardState::Submitted(_) => None,
        }
    }

    /// Percentage of the step table passed so far.
    pub fn progress(&self) -> u8 {
        match self.state {
            WizardState::ReadyToSubmit | WizardState::Submitted(_) => 100,
            _ => {
                let percent = (self.cursor * 100 + STEPS.len() / 2) / STEPS.len();
                percent.min(100) as u8
            }
        }
    }

    pub fn prompt(&self) -> Option<StepPrompt> {
        let definition = self.current_step()?;
        let question = match (definition.input, self.current_location()) {
            (InputKind::Quantity, Some(location)) => format!(
                "How many cameras do you need at {}?",
                label_for(INSTALLATION_LOCATIONS, location).unwrap_or(location)
            ),
            _ => definition.question.to_owned(),
        };

        Some(StepPrompt {
            field: definition.field,
            question,
            input: definition.input,
            options: options_for(definition, &self.answers),
            placeholder: definition.placeholder,
            selected: self.pending.clone(),
            progress: self.progress(),
        })
    }

    /// The progress script for the calculating step.
    pub fn calculation_script<R: Rng>(&self, rng: &mut R) -> Option<CalculationScript> {
        matches!(self.state, WizardState::Calculating).then(|| CalculationScript::generate(rng))
    }

    /// Answers a single-choice step, or the current location of the quantity
    /// sub-flow.
    pub fn select(&mut self, value: &str) -> Result<StepOutcome, WizardError> {
        let definition = self.awaiting()?;
        match definition.input {
            InputKind::SingleChoice => {
                let label = self.option_label(definition, value)?;
                self.answers.insert(definition.field, Answer::Text(value.to_owned()));
                Ok(self.advance(definition.field, label.to_owned()))
            }
            InputKind::Quantity => self.select_quantity(value),
            expected => Err(WizardError::WrongInput { field: definition.field, expected }),
        }
    }

    /// Toggles an option of a multi-choice step and returns the selection.
    pub fn toggle(&mut self, value: &str) -> Result<&[String], WizardError> {
        let definition = self.awaiting()?;
        if definition.input != InputKind::MultiChoice {
            return Err(WizardError::WrongInput { field: definition.field, expected: definition.input });
        }
        self.option_label(definition, value)?;

        match self.pending.iter().position(|selected| selected == value) {
            Some(index) => {
                self.pending.remove(index);
            }
            None => self.pending.push(value.to_owned()),
        }
        Ok(&self.pending)
    }

    pub fn confirm_selection(&mut self) -> Result<StepOutcome, WizardError> {
        let definition = self.awaiting()?;
        if definition.input != InputKind::MultiChoice {
            return Err(WizardError::WrongInput { field: definition.field, expected: definition.input });
        }

        match definition.field {
            StepField::AgreeTerms if !self.pending.iter().any(|value| value == CONSENT_REQUIRED) => {
                return Err(WizardError::ConsentRequired);
            }
            field if self.pending.is_empty() => return Err(WizardError::EmptySelection(field)),
            StepField::InstallationLocations
                if self.pending.iter().all(|value| value == LOCATION_OTHER) =>
            {
                return Err(WizardError::NoCountableLocation);
            }
            _ => {}
        }

        let selected = std::mem::take(&mut self.pending);
        let echo = selected
            .iter()
            .map(|value| label_for(definition.options, value).unwrap_or(value.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        self.answers.insert(definition.field, Answer::List(selected));
        Ok(self.advance(definition.field, echo))
    }

    pub fn enter_text(&mut self, value: &str) -> Result<StepOutcome, WizardError> {
        let definition = self.awaiting()?;
        let value = value.trim();
        match definition.input {
            InputKind::Text | InputKind::Tel if value.is_empty() => {
                Err(WizardError::EmptyText(definition.field))
            }
            InputKind::Tel if !is_plausible_phone(value) => {
                Err(WizardError::InvalidPhone(value.to_owned()))
            }
            InputKind::Text | InputKind::Tel => {
                self.answers.insert(definition.field, Answer::Text(value.to_owned()));
                Ok(self.advance(definition.field, value.to_owned()))
            }
            expected => Err(WizardError::WrongInput { field: definition.field, expected }),
        }
    }

    /// Records the calculated price and moves past the calculating step. The
    /// outcome's echo carries the quote summary.
    pub fn finish_calculation(&mut self) -> Result<StepOutcome, WizardError> {
        if self.state != WizardState::Calculating {
            return Err(WizardError::NotCalculating);
        }
        let Some(calculation) = self.calculation.as_ref() else {
            return Err(WizardError::NotCalculating);
        };

        let summary = calculation.summary();
        self.answers.insert(StepField::QuoteCalculation, Answer::Price(calculation.monthly_price));
        Ok(self.advance(StepField::QuoteCalculation, summary))
    }

    /// The flat request for the intake API. Only available once every step
    /// has been passed.
    pub fn submission(&self, now: DateTime<Utc>) -> Result<CctvQuoteRequest, WizardError> {
        if self.state != WizardState::ReadyToSubmit {
            return Err(match self.state {
                WizardState::Submitted(_) => WizardError::AlreadySubmitted,
                _ => WizardError::NotReady,
            });
        }

        let text = |field| self.answers.text(field).map(str::to_owned);
        let list = |field| self.answers.list(field).map(<[String]>::to_vec);
        let quantities = self.answers.quantities().cloned();
        let request = CctvQuoteRequest {
            installation_place: text(StepField::InstallationPlace),
            business_type: text(StepField::BusinessType),
            business_type_other: text(StepField::BusinessTypeOther),
            business_size: text(StepField::BusinessSize),
            installation_locations: list(StepField::InstallationLocations),
            installation_location_other: text(StepField::InstallationLocationOther),
            total_cameras: quantities.as_ref().map(|quantities| quantities.values().sum()),
            installation_quantities: quantities,
            calculated_price: self.answers.price(),
            final_quote_method: text(StepField::FinalQuoteMethod),
            contact_method: text(StepField::ContactMethod),
            business_name: text(StepField::BusinessName),
            contact_name: text(StepField::ContactName),
            phone: text(StepField::Phone),
            business_location: text(StepField::BusinessLocation),
            agree_terms: list(StepField::AgreeTerms),
            submitted_at: Some(now),
        };

        match request.validate() {
            Ok(_) => Ok(request),
            Err(DomainError::MissingField(field)) => Err(WizardError::Incomplete(field)),
            Err(error) => Err(WizardError::InvalidAnswers(error.to_string())),
        }
    }

    /// Submits once. A failed submission leaves the wizard ready to retry.
    pub async fn submit(
        &mut self,
        submitter: &dyn QuoteSubmitter,
        now: DateTime<Utc>,
    ) -> Result<QuoteReceipt, WizardError> {
        let request = self.submission(now)?;
        match submitter.submit(&request).await {
            Ok(receipt) => {
                self.state = WizardState::Submitted(receipt.clone());
                Ok(receipt)
            }
            Err(error) => Err(WizardError::Submission(error.to_string())),
        }
    }

    pub async fn submit_with_audit<S>(
        &mut self,
        submitter: &dyn QuoteSubmitter,
        now: DateTime<Utc>,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<QuoteReceipt, WizardError>
    where
        S: AuditSink,
    {
        let result = self.submit(submitter, now).await;
        match &result {
            Ok(receipt) => sink.emit(
                audit
                    .event("wizard.submitted", AuditCategory::Wizard, AuditOutcome::Success)
                    .with_metadata("quote_request_id", receipt.id.to_string())
                    .with_metadata("total_cameras", receipt.total_cameras.to_string())
                    .with_metadata("monthly_price", receipt.monthly_price.to_string()),
            ),
            Err(error) => sink.emit(
                audit
                    .event("wizard.submission_failed", AuditCategory::Wizard, AuditOutcome::Failed)
                    .with_metadata("error", error.to_string()),
            ),
        }
        result
    }

    fn awaiting(&self) -> Result<&'static StepDefinition, WizardError> {
        match self.state {
            WizardState::Asking(_) => STEPS.get(self.cursor).ok_or(WizardError::NotAwaitingAnswer),
            _ => Err(WizardError::NotAwaitingAnswer),
        }
    }

    fn option_label(
        &self,
        definition: &StepDefinition,
        value: &str,
    ) -> Result<&'static str, WizardError> {
        options_for(definition, &self.answers)
            .into_iter()
            .find(|option| option.value == value)
            .map(|option| option.label)
            .ok_or_else(|| WizardError::UnknownOption {
                field: definition.field,
                value: value.to_owned(),
            })
    }

    fn current_location(&self) -> Option<&str> {
        self.quantities.as_ref().and_then(QuantitySelection::current_location)
    }

    fn select_quantity(&mut self, value: &str) -> Result<StepOutcome, WizardError> {
        let field = StepField::InstallationQuantities;
        let unknown = || WizardError::UnknownOption { field, value: value.to_owned() };
        let count = parse_quantity(value).ok_or_else(unknown)?;
        let count_label = label_for(QUANTITIES, value.trim()).ok_or_else(unknown)?;

        let selection = self.quantities.as_mut().ok_or(WizardError::NotAwaitingAnswer)?;
        let location = selection.current_location().ok_or(WizardError::NotAwaitingAnswer)?.to_owned();
        selection.selected.insert(location.clone(), count);
        selection.current_location_index += 1;

        let echo = format!(
            "{}: {count_label}",
            label_for(INSTALLATION_LOCATIONS, &location).unwrap_or(location.as_str())
        );
        if !selection.is_complete() {
            return Ok(StepOutcome { answered: field, echo, next: self.state.clone() });
        }

        let selected = selection.selected.clone();
        self.answers.insert(field, Answer::Quantities(selected));
        Ok(self.advance(field, echo))
    }

    /// Moves the cursor to the next step whose predicate holds.
    fn advance(&mut self, answered: StepField, echo: String) -> StepOutcome {
        self.pending.clear();
        let next = STEPS
            .iter()
            .enumerate()
            .skip(self.cursor + 1)
            .find(|(_, definition)| definition.applies(&self.answers));

        self.state = match next {
            Some((index, definition)) => {
                self.cursor = index;
                self.enter(definition)
            }
            None => {
                self.cursor = STEPS.len();
                WizardState::ReadyToSubmit
            }
        };

        StepOutcome { answered, echo, next: self.state.clone() }
    }

    fn enter(&mut self, definition: &StepDefinition) -> WizardState {
        match definition.input {
            InputKind::Quantity => {
                self.quantities = Some(QuantitySelection::new(countable_locations(&self.answers)));
                WizardState::Asking(definition.field)
            }
            InputKind::Calculation => {
                let lines = self
                    .quantities
                    .as_ref()
                    .map(|selection| {
                        selection
                            .locations
                            .iter()
                            .filter_map(|location| {
                                let cameras = *selection.selected.get(location)?;
                                let label = label_for(INSTALLATION_LOCATIONS, location)
                                    .unwrap_or(location.as_str())
                                    .to_owned();
                                Some(QuoteLine { location: location.clone(), label, cameras })
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                self.calculation = Some(QuoteCalculation::new(lines, self.settings.unit_price));
                WizardState::Calculating
            }
            _ => WizardState::Asking(definition.field),
        }
    }
}

fn is_plausible_phone(value: &str) -> bool {
    let allowed = value.chars().all(|ch| ch.is_ascii_digit() || "-+() ".contains(ch));
    let digits = value.chars().filter(char::is_ascii_digit).count();
    allowed && (8..=15).contains(&digits)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{
        QuoteSubmitter, SubmitError, WizardEngine, WizardError, WizardSettings, DEFAULT_UNIT_PRICE,
    };
    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::cctv_quote::{CctvQuoteRequest, QuoteReceipt, QuoteRequestId};
    use crate::wizard::states::WizardState;
    use crate::wizard::steps::{InputKind, StepField};

    struct ScriptedSubmitter {
        failures_left: Mutex<u32>,
        received: Mutex<Vec<CctvQuoteRequest>>,
    }

    impl ScriptedSubmitter {
        fn failing_first(failures: u32) -> Self {
            Self { failures_left: Mutex::new(failures), received: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl QuoteSubmitter for ScriptedSubmitter {
        async fn submit(&self, request: &CctvQuoteRequest) -> Result<QuoteReceipt, SubmitError> {
            self.received.lock().expect("lock").push(request.clone());
            let mut failures = self.failures_left.lock().expect("lock");
            if *failures > 0 {
                *failures -= 1;
                return Err(SubmitError::Unavailable("connection reset".to_owned()));
            }
            Ok(QuoteReceipt {
                id: QuoteRequestId("q-1".to_owned()),
                submitted_at: request.submitted_at.unwrap_or_else(Utc::now),
                total_cameras: request.total_cameras.unwrap_or_default(),
                monthly_price: request.calculated_price.unwrap_or_default(),
            })
        }
    }

    /// Drives a house with a counter and an entrance up to the contact steps.
    fn through_quote(engine: &mut WizardEngine) {
        engine.select("house").expect("place");
        engine.select("10_20").expect("size");
        engine.toggle("counter").expect("counter");
        engine.toggle("entrance").expect("entrance");
        engine.confirm_selection().expect("locations");
        engine.select("2").expect("counter quantity");
        engine.select("1").expect("entrance quantity");
        engine.finish_calculation().expect("calculation");
    }

    fn through_contact(engine: &mut WizardEngine) {
        through_quote(engine);
        engine.select("direct").expect("final method");
        engine.select("phone").expect("contact method");
        engine.enter_text("Seoul Smile Dental").expect("business name");
        engine.enter_text("Park Minseo").expect("contact name");
        engine.enter_text("010-2345-6789").expect("phone");
        engine.select("seoul").expect("region");
    }

    fn completed() -> WizardEngine {
        let mut engine = WizardEngine::default();
        through_contact(&mut engine);
        engine.toggle("privacy_required").expect("consent");
        engine.confirm_selection().expect("agree terms");
        engine
    }

    #[test]
    fn non_store_place_skips_business_type() {
        let mut engine = WizardEngine::default();
        let outcome = engine.select("house").expect("place");

        assert_eq!(outcome.echo, "🏠 House");
        assert_eq!(outcome.next, WizardState::Asking(StepField::BusinessSize));
        assert!(!engine.answers().contains(StepField::BusinessType));
    }

    #[test]
    fn store_asks_business_type_and_free_text_for_other() {
        let mut engine = WizardEngine::default();
        engine.select("store").expect("place");
        assert_eq!(engine.state(), &WizardState::Asking(StepField::BusinessType));

        engine.select("other").expect("business type");
        assert_eq!(engine.state(), &WizardState::Asking(StepField::BusinessTypeOther));
        assert_eq!(engine.prompt().map(|prompt| prompt.input), Some(InputKind::Text));

        assert_eq!(engine.enter_text("  "), Err(WizardError::EmptyText(StepField::BusinessTypeOther)));
        engine.enter_text("Laundromat").expect("other type");
        assert_eq!(engine.state(), &WizardState::Asking(StepField::BusinessSize));
    }

    #[test]
    fn quantities_are_asked_per_location_and_priced_per_camera() {
        let mut engine = WizardEngine::default();
        engine.select("house").expect("place");
        engine.select("10_20").expect("size");
        engine.toggle("counter").expect("counter");
        engine.toggle("entrance").expect("entrance");
        engine.confirm_selection().expect("locations");

        let prompt = engine.prompt().expect("quantity prompt");
        assert_eq!(prompt.input, InputKind::Quantity);
        assert!(prompt.question.contains("Counter"));

        let first = engine.select("2").expect("counter quantity");
        assert_eq!(first.next, WizardState::Asking(StepField::InstallationQuantities));
        assert!(engine.prompt().expect("second location").question.contains("Entrance"));

        let last = engine.select("1").expect("entrance quantity");
        assert_eq!(last.next, WizardState::Calculating);
        let calculation = engine.calculation().expect("calculation");
        assert_eq!(calculation.total_cameras, 3);
        assert_eq!(calculation.monthly_price, 3 * DEFAULT_UNIT_PRICE);
        assert!(engine.calculation_script(&mut rand::thread_rng()).is_some());

        engine.finish_calculation().expect("finish");
        assert_eq!(engine.answers().price(), Some(3 * DEFAULT_UNIT_PRICE));
        assert_eq!(engine.state(), &WizardState::Asking(StepField::FinalQuoteMethod));
    }

    #[test]
    fn unit_price_comes_from_settings() {
        let mut engine = WizardEngine::new(WizardSettings { unit_price: 10_000 });
        through_quote(&mut engine);
        assert_eq!(engine.answers().price(), Some(30_000));
    }

    #[test]
    fn outdoor_location_offers_site_survey_first() {
        let mut engine = WizardEngine::default();
        engine.select("house").expect("place");
        engine.select("under_10").expect("size");
        engine.toggle("outdoor").expect("outdoor");
        engine.confirm_selection().expect("locations");
        engine.select("4+").expect("outdoor quantity");
        engine.finish_calculation().expect("calculation");

        let prompt = engine.prompt().expect("final method prompt");
        assert_eq!(prompt.options[0].value, "site_survey");
        assert_eq!(engine.answers().quantities().map(|q| q["outdoor"]), Some(4));
    }

    #[test]
    fn other_location_alone_is_rejected_and_other_is_asked_as_text() {
        let mut engine = WizardEngine::default();
        engine.select("house").expect("place");
        engine.select("under_10").expect("size");

        assert_eq!(engine.confirm_selection(), Err(WizardError::EmptySelection(StepField::InstallationLocations)));
        engine.toggle("other").expect("other");
        assert_eq!(engine.confirm_selection(), Err(WizardError::NoCountableLocation));

        engine.toggle("hall").expect("hall");
        engine.confirm_selection().expect("locations");
        assert_eq!(engine.state(), &WizardState::Asking(StepField::InstallationLocationOther));
        engine.enter_text("Back office").expect("other location");
        assert_eq!(engine.state(), &WizardState::Asking(StepField::InstallationQuantities));
    }

    #[test]
    fn toggling_twice_deselects() {
        let mut engine = WizardEngine::default();
        engine.select("house").expect("place");
        engine.select("under_10").expect("size");

        assert_eq!(engine.toggle("kitchen").expect("select"), ["kitchen".to_owned()]);
        assert!(engine.toggle("kitchen").expect("deselect").is_empty());
        assert!(matches!(engine.toggle("garden"), Err(WizardError::UnknownOption { .. })));
    }

    #[test]
    fn consent_requires_the_required_option() {
        let mut engine = WizardEngine::default();
        through_contact(&mut engine);
        assert_eq!(engine.state(), &WizardState::Asking(StepField::AgreeTerms));

        let error = engine.confirm_selection().expect_err("no consent");
        assert_eq!(error, WizardError::ConsentRequired);
        assert_eq!(error.user_message(), "Please agree to the privacy policy (required) to continue.");

        engine.toggle("marketing_optional").expect("marketing");
        assert_eq!(engine.confirm_selection(), Err(WizardError::ConsentRequired));

        engine.toggle("marketing_optional").expect("unselect marketing");
        engine.toggle("privacy_required").expect("privacy");
        let outcome = engine.confirm_selection().expect("consent given");
        assert_eq!(outcome.next, WizardState::ReadyToSubmit);
        assert_eq!(engine.progress(), 100);
    }

    #[test]
    fn wrong_input_kinds_and_invalid_answers_are_rejected() {
        let mut engine = WizardEngine::default();
        assert!(matches!(engine.enter_text("store"), Err(WizardError::WrongInput { .. })));
        assert!(matches!(engine.select("castle"), Err(WizardError::UnknownOption { .. })));
        assert_eq!(engine.finish_calculation(), Err(WizardError::NotCalculating));
        assert_eq!(engine.submission(Utc::now()), Err(WizardError::NotReady));

        let mut engine = WizardEngine::default();
        through_quote(&mut engine);
        engine.select("direct").expect("final method");
        engine.select("sms").expect("contact method");
        engine.enter_text("Hanok Cafe").expect("business name");
        engine.enter_text("Lee Dohyun").expect("contact name");
        assert!(matches!(engine.enter_text("call me"), Err(WizardError::InvalidPhone(_))));
    }

    #[test]
    fn progress_grows_with_the_cursor() {
        let mut engine = WizardEngine::default();
        assert_eq!(engine.progress(), 0);
        engine.select("house").expect("place");
        let after_place = engine.progress();
        assert!(after_place > 0 && after_place < 100);
        assert_eq!(engine.prompt().map(|prompt| prompt.progress), Some(after_place));
    }

    #[test]
    fn submission_is_flat_camel_case_request() {
        let engine = completed();
        let request = engine.submission(Utc::now()).expect("submission");

        assert_eq!(request.installation_place.as_deref(), Some("house"));
        assert_eq!(request.business_type, None);
        assert_eq!(request.total_cameras, Some(3));
        assert_eq!(request.calculated_price, Some(25_500));
        assert_eq!(request.agree_terms, Some(vec!["privacy_required".to_owned()]));
        assert!(request.validate().is_ok());
    }

    #[tokio::test]
    async fn failed_submission_can_be_retried() {
        let mut engine = completed();
        let submitter = ScriptedSubmitter::failing_first(1);

        let error = engine.submit(&submitter, Utc::now()).await.expect_err("first attempt fails");
        assert!(matches!(error, WizardError::Submission(_)));
        assert_eq!(engine.state(), &WizardState::ReadyToSubmit);

        let receipt = engine.submit(&submitter, Utc::now()).await.expect("retry succeeds");
        assert_eq!(receipt.total_cameras, 3);
        assert!(matches!(engine.state(), WizardState::Submitted(_)));
        assert_eq!(submitter.received.lock().expect("lock").len(), 2);

        assert_eq!(
            engine.submit(&submitter, Utc::now()).await,
            Err(WizardError::AlreadySubmitted)
        );
    }

    #[tokio::test]
    async fn submission_outcome_is_audited() {
        let mut engine = completed();
        let submitter = ScriptedSubmitter::failing_first(0);
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(None, "cli-1", "quote-wizard");

        engine.submit_with_audit(&submitter, Utc::now(), &sink, &audit).await.expect("submit");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "wizard.submitted");
        assert_eq!(events[0].metadata.get("total_cameras").map(String::as_str), Some("3"));
    }
}
