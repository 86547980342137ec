use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::cctv_quote::QuoteReceipt;
use crate::wizard::steps::{ChoiceOption, InputKind, StepField};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Text(String),
    List(Vec<String>),
    Quantities(BTreeMap<String, u32>),
    Price(i64),
}

/// Answers keyed by step field. Only steps that were actually asked appear.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet(BTreeMap<StepField, Answer>);

impl AnswerSet {
    pub fn insert(&mut self, field: StepField, answer: Answer) {
        self.0.insert(field, answer);
    }

    pub fn contains(&self, field: StepField) -> bool {
        self.0.contains_key(&field)
    }

    pub fn get(&self, field: StepField) -> Option<&Answer> {
        self.0.get(&field)
    }

    pub fn text(&self, field: StepField) -> Option<&str> {
        match self.0.get(&field) {
            Some(Answer::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn list(&self, field: StepField) -> Option<&[String]> {
        match self.0.get(&field) {
            Some(Answer::List(items)) => Some(items),
            _ => None,
        }
    }

    pub fn quantities(&self) -> Option<&BTreeMap<String, u32>> {
        match self.0.get(&StepField::InstallationQuantities) {
            Some(Answer::Quantities(quantities)) => Some(quantities),
            _ => None,
        }
    }

    pub fn price(&self) -> Option<i64> {
        match self.0.get(&StepField::QuoteCalculation) {
            Some(Answer::Price(price)) => Some(*price),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cursor of the per-location quantity sub-flow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantitySelection {
    pub current_location_index: usize,
    pub locations: Vec<String>,
    pub selected: BTreeMap<String, u32>,
}

impl QuantitySelection {
    pub fn new(locations: Vec<String>) -> Self {
        Self { current_location_index: 0, locations, selected: BTreeMap::new() }
    }

    pub fn current_location(&self) -> Option<&str> {
        self.locations.get(self.current_location_index).map(String::as_str)
    }

    pub fn is_complete(&self) -> bool {
        self.current_location_index >= self.locations.len()
    }

    pub fn total(&self) -> u32 {
        self.selected.values().sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WizardState {
    Asking(StepField),
    Calculating,
    ReadyToSubmit,
    Submitted(QuoteReceipt),
}

/// What the driver shows for the current step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepPrompt {
    pub field: StepField,
    pub question: String,
    pub input: InputKind,
    pub options: Vec<ChoiceOption>,
    pub placeholder: Option<&'static str>,
    /// Options toggled so far on a multi-choice step.
    pub selected: Vec<String>,
    pub progress: u8,
}

/// Result of an accepted answer: the customer's echoed reply and where the
/// wizard moved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub answered: StepField,
    pub echo: String,
    pub next: WizardState,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{Answer, AnswerSet, QuantitySelection};
    use crate::wizard::steps::StepField;

    #[test]
    fn typed_accessors_ignore_mismatched_answers() {
        let mut answers = AnswerSet::default();
        answers.insert(StepField::InstallationPlace, Answer::Text("store".to_owned()));
        answers.insert(StepField::QuoteCalculation, Answer::Price(25_500));

        assert_eq!(answers.text(StepField::InstallationPlace), Some("store"));
        assert_eq!(answers.list(StepField::InstallationPlace), None);
        assert_eq!(answers.price(), Some(25_500));
        assert_eq!(answers.quantities(), None);
        assert_eq!(answers.len(), 2);
    }

    #[test]
    fn quantity_selection_walks_locations_in_order() {
        let mut selection =
            QuantitySelection::new(vec!["counter".to_owned(), "entrance".to_owned()]);
        assert_eq!(selection.current_location(), Some("counter"));

        selection.selected.insert("counter".to_owned(), 2);
        selection.current_location_index += 1;
        selection.selected.insert("entrance".to_owned(), 1);
        selection.current_location_index += 1;

        assert!(selection.is_complete());
        assert_eq!(selection.current_location(), None);
        assert_eq!(selection.total(), 3);
        assert_eq!(
            selection.selected,
            BTreeMap::from([("counter".to_owned(), 2), ("entrance".to_owned(), 1)])
        );
    }
}
