//! Step table of the CCTV quote wizard.
//!
//! Steps are asked in table order. A step carries its own predicate; when it
//! does not hold for the answers collected so far the step is skipped. Option values are stable
//! identifiers sent to the intake API; labels are what the customer sees.

use serde::{Deserialize, Serialize};

use crate::wizard::states::AnswerSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StepField {
    InstallationPlace,
    BusinessType,
    BusinessTypeOther,
    BusinessSize,
    InstallationLocations,
    InstallationLocationOther,
    InstallationQuantities,
    QuoteCalculation,
    FinalQuoteMethod,
    ContactMethod,
    BusinessName,
    ContactName,
    Phone,
    BusinessLocation,
    AgreeTerms,
}

impl StepField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InstallationPlace => "installationPlace",
            Self::BusinessType => "businessType",
            Self::BusinessTypeOther => "businessTypeOther",
            Self::BusinessSize => "businessSize",
            Self::InstallationLocations => "installationLocations",
            Self::InstallationLocationOther => "installationLocationOther",
            Self::InstallationQuantities => "installationQuantities",
            Self::QuoteCalculation => "quoteCalculation",
            Self::FinalQuoteMethod => "finalQuoteMethod",
            Self::ContactMethod => "contactMethod",
            Self::BusinessName => "businessName",
            Self::ContactName => "contactName",
            Self::Phone => "phone",
            Self::BusinessLocation => "businessLocation",
            Self::AgreeTerms => "agreeTerms",
        }
    }
}

impl std::fmt::Display for StepField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    SingleChoice,
    MultiChoice,
    Text,
    Tel,
    /// One quantity per selected location.
    Quantity,
    /// Scripted, non-interactive price calculation.
    Calculation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub value: &'static str,
    pub label: &'static str,
}

const fn choice(value: &'static str, label: &'static str) -> ChoiceOption {
    ChoiceOption { value, label }
}

pub const PLACE_STORE: &str = "store";
pub const BUSINESS_TYPE_OTHER: &str = "other";
pub const LOCATION_OTHER: &str = "other";
pub const LOCATION_OUTDOOR: &str = "outdoor";
pub const CONSENT_REQUIRED: &str = "privacy_required";
const LARGE_BUSINESS_SIZES: [&str; 2] = ["20_50", "over_50"];

pub const INSTALLATION_PLACES: &[ChoiceOption] = &[
    choice("store", "🏪 Store"),
    choice("house", "🏠 House"),
    choice("officetel", "🏢 Officetel"),
    choice("school", "🎓 School"),
    choice("hospital", "🏥 Hospital"),
];

pub const BUSINESS_TYPES: &[ChoiceOption] = &[
    choice("convenience_store", "🛒 Convenience store"),
    choice("restaurant", "🍕 Restaurant"),
    choice("unmanned_store", "🤖 Unmanned store"),
    choice("cafe", "☕ Cafe"),
    choice("other", "📝 Other (type it in)"),
];

pub const BUSINESS_SIZES: &[ChoiceOption] = &[
    choice("under_10", "📐 Up to 10 pyeong"),
    choice("10_20", "📏 10 to 20 pyeong"),
    choice("20_50", "📋 20 to 50 pyeong"),
    choice("over_50", "🏭 Over 50 pyeong"),
];

pub const INSTALLATION_LOCATIONS: &[ChoiceOption] = &[
    choice("counter", "💰 Counter / checkout"),
    choice("entrance", "🚪 Entrance"),
    choice("outdoor", "🌳 Outdoor / parking"),
    choice("hall", "🍽️ Hall / seating"),
    choice("kitchen", "🍳 Kitchen / workshop"),
    choice("storage", "📦 Storage room"),
    choice("restroom", "🚻 Restroom entrance"),
    choice("other", "📱 Other location"),
];

pub const QUANTITIES: &[ChoiceOption] = &[
    choice("1", "1 camera"),
    choice("2", "2 cameras"),
    choice("3", "3 cameras"),
    choice("4+", "4 or more"),
];

const DIRECT_SIGN_UP: ChoiceOption = choice("direct", "💻 Direct sign-up - join online right away");
const SITE_SURVEY: ChoiceOption =
    choice("site_survey", "🏠 On-site survey quote - an expert visits (free for now!)");

pub const CONTACT_METHODS: &[ChoiceOption] =
    &[choice("phone", "📞 Phone call"), choice("sms", "💬 Text message")];

pub const REGIONS: &[ChoiceOption] = &[
    choice("seoul", "Seoul"),
    choice("busan", "Busan"),
    choice("daegu", "Daegu"),
    choice("incheon", "Incheon"),
    choice("gwangju", "Gwangju"),
    choice("daejeon", "Daejeon"),
    choice("ulsan", "Ulsan"),
    choice("sejong", "Sejong"),
    choice("gyeonggi", "Gyeonggi-do"),
    choice("gangwon", "Gangwon-do"),
    choice("chungbuk", "Chungcheongbuk-do"),
    choice("chungnam", "Chungcheongnam-do"),
    choice("jeonbuk", "Jeonbuk-do"),
    choice("jeonnam", "Jeollanam-do"),
    choice("gyeongbuk", "Gyeongsangbuk-do"),
    choice("gyeongnam", "Gyeongsangnam-do"),
    choice("jeju", "Jeju-do"),
];

pub const AGREE_TERMS: &[ChoiceOption] = &[
    choice("privacy_required", "✅ Agree to the privacy policy (required)"),
    choice("marketing_optional", "📧 Receive marketing messages (optional)"),
];

#[derive(Clone, Copy, Debug)]
pub struct StepDefinition {
    pub field: StepField,
    pub question: &'static str,
    pub input: InputKind,
    pub options: &'static [ChoiceOption],
    pub placeholder: Option<&'static str>,
    /// `None` means the step is always asked.
    pub condition: Option<fn(&AnswerSet) -> bool>,
}

impl StepDefinition {
    const fn when(mut self, condition: fn(&AnswerSet) -> bool) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Whether the step is asked given the answers so far.
    pub fn applies(&self, answers: &AnswerSet) -> bool {
        self.condition.map_or(true, |condition| condition(answers))
    }
}

const fn step(
    field: StepField,
    question: &'static str,
    input: InputKind,
    options: &'static [ChoiceOption],
) -> StepDefinition {
    StepDefinition { field, question, input, options, placeholder: None, condition: None }
}

const fn text_step(
    field: StepField,
    question: &'static str,
    input: InputKind,
    placeholder: &'static str,
) -> StepDefinition {
    StepDefinition {
        field,
        question,
        input,
        options: &[],
        placeholder: Some(placeholder),
        condition: None,
    }
}

pub static STEPS: [StepDefinition; 15] = [
    step(
        StepField::InstallationPlace,
        "Welcome to the CareOn free CCTV quote! 🎥 Where will the cameras be installed?",
        InputKind::SingleChoice,
        INSTALLATION_PLACES,
    ),
    step(
        StepField::BusinessType,
        "What kind of store is it?",
        InputKind::SingleChoice,
        BUSINESS_TYPES,
    )
    .when(place_is_store),
    text_step(
        StepField::BusinessTypeOther,
        "Please type in your business type.",
        InputKind::Text,
        "e.g. bookstore, hair salon, laundromat",
    )
    .when(business_type_is_other),
    step(
        StepField::BusinessSize,
        "How large is the site? (floor area in pyeong)",
        InputKind::SingleChoice,
        BUSINESS_SIZES,
    ),
    step(
        StepField::InstallationLocations,
        "Select every spot that needs a camera. (multiple choice)",
        InputKind::MultiChoice,
        INSTALLATION_LOCATIONS,
    ),
    text_step(
        StepField::InstallationLocationOther,
        "Please type in the other installation spot.",
        InputKind::Text,
        "e.g. hallway, stairs, office",
    )
    .when(other_location_selected),
    step(
        StepField::InstallationQuantities,
        "How many cameras do you need at each spot?",
        InputKind::Quantity,
        QUANTITIES,
    )
    .when(has_countable_locations),
    step(
        StepField::QuoteCalculation,
        "We'll work out the lowest price for your selection.",
        InputKind::Calculation,
        &[],
    )
    .when(quantities_answered),
    step(
        StepField::FinalQuoteMethod,
        "How would you like to proceed?",
        InputKind::SingleChoice,
        &[DIRECT_SIGN_UP, SITE_SURVEY],
    )
    .when(price_calculated),
    step(
        StepField::ContactMethod,
        "How should we contact you?",
        InputKind::SingleChoice,
        CONTACT_METHODS,
    ),
    text_step(
        StepField::BusinessName,
        "What is the name of your business?",
        InputKind::Text,
        "e.g. CareOn Mart",
    ),
    text_step(
        StepField::ContactName,
        "Who should we ask for?",
        InputKind::Text,
        "Hong Gildong",
    ),
    text_step(StepField::Phone, "What number can we reach you on?", InputKind::Tel, "010-1234-5678"),
    step(
        StepField::BusinessLocation,
        "Which region is the business in?",
        InputKind::SingleChoice,
        REGIONS,
    ),
    step(
        StepField::AgreeTerms,
        "Please agree to the privacy policy and, optionally, marketing messages.",
        InputKind::MultiChoice,
        AGREE_TERMS,
    ),
];

fn place_is_store(answers: &AnswerSet) -> bool {
    answers.text(StepField::InstallationPlace) == Some(PLACE_STORE)
}

fn business_type_is_other(answers: &AnswerSet) -> bool {
    answers.text(StepField::BusinessType) == Some(BUSINESS_TYPE_OTHER)
}

fn other_location_selected(answers: &AnswerSet) -> bool {
    answers
        .list(StepField::InstallationLocations)
        .is_some_and(|locations| locations.iter().any(|location| location == LOCATION_OTHER))
}

fn has_countable_locations(answers: &AnswerSet) -> bool {
    !countable_locations(answers).is_empty()
}

fn quantities_answered(answers: &AnswerSet) -> bool {
    answers.quantities().is_some()
}

fn price_calculated(answers: &AnswerSet) -> bool {
    answers.price().is_some()
}

pub fn step_for(field: StepField) -> Option<&'static StepDefinition> {
    STEPS.iter().find(|definition| definition.field == field)
}

/// Options offered for the step, which may depend on earlier answers.
pub fn options_for(definition: &StepDefinition, answers: &AnswerSet) -> Vec<ChoiceOption> {
    if definition.field != StepField::FinalQuoteMethod {
        return definition.options.to_vec();
    }

    let large = answers
        .text(StepField::BusinessSize)
        .is_some_and(|size| LARGE_BUSINESS_SIZES.contains(&size));
    let outdoor = answers
        .list(StepField::InstallationLocations)
        .is_some_and(|locations| locations.iter().any(|location| location == LOCATION_OUTDOOR));

    if large || outdoor {
        vec![SITE_SURVEY, DIRECT_SIGN_UP]
    } else {
        vec![DIRECT_SIGN_UP, SITE_SURVEY]
    }
}

/// Selected locations that take a camera count, in selection order.
pub fn countable_locations(answers: &AnswerSet) -> Vec<String> {
    answers
        .list(StepField::InstallationLocations)
        .map(|locations| {
            locations.iter().filter(|location| *location != LOCATION_OTHER).cloned().collect()
        })
        .unwrap_or_default()
}

pub fn label_for(options: &[ChoiceOption], value: &str) -> Option<&'static str> {
    options.iter().find(|option| option.value == value).map(|option| option.label)
}

/// `"4+"` counts as four cameras.
pub fn parse_quantity(value: &str) -> Option<u32> {
    match value.trim() {
        "4+" => Some(4),
        other => other.parse().ok().filter(|count| (1..=3).contains(count)),
    }
}
