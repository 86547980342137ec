//! The scripted "calculating your quote" step.
//!
//! No work happens here; the engine computes the price up front and the
//! driver plays the script, sleeping between messages.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

pub const CALCULATION_INTRO: &str = "We'll put together the lowest price for your selection.";

pub const CALCULATION_MESSAGES: [&str; 5] = [
    "📍 Analysing installation spots...",
    "🔍 Picking the best camera models...",
    "💰 Calculating the lowest price...",
    "📊 Reviewing installation and extra costs...",
    "✨ Your custom quote is ready!",
];

const MESSAGE_DELAY_MIN_MS: u64 = 1_000;
const MESSAGE_DELAY_JITTER_MS: u64 = 500;
const SETTLE_DELAY: Duration = Duration::from_millis(1_000);
const ADVANCE_DELAY: Duration = Duration::from_millis(2_000);

const INCLUDED_SERVICES: [&str; 4] = [
    "Professional installation and setup",
    "24-hour monitoring",
    "Regular inspection and after-sales service",
    "Free replacement service",
];

const BENEFITS: [&str; 2] = ["50% off the first month", "Free installation (worth 300,000 won)"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ScriptedMessage {
    pub delay: Duration,
    pub text: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalculationScript {
    pub intro: &'static str,
    /// Progress messages, each shown after its delay.
    pub messages: Vec<ScriptedMessage>,
    /// Pause after the last message before the quote summary replaces them.
    pub settle: Duration,
    /// Pause after the summary before the wizard moves on.
    pub advance_after: Duration,
}

impl CalculationScript {
    /// Delays are 1.0 to 1.5 seconds per message.
    pub fn generate<R: Rng>(rng: &mut R) -> Self {
        let messages = CALCULATION_MESSAGES
            .into_iter()
            .map(|text| ScriptedMessage {
                delay: Duration::from_millis(
                    MESSAGE_DELAY_MIN_MS + rng.gen_range(0..=MESSAGE_DELAY_JITTER_MS),
                ),
                text,
            })
            .collect();
        Self { intro: CALCULATION_INTRO, messages, settle: SETTLE_DELAY, advance_after: ADVANCE_DELAY }
    }

    /// Same script without pauses, for tests and non-interactive drivers.
    pub fn instant() -> Self {
        Self {
            intro: CALCULATION_INTRO,
            messages: CALCULATION_MESSAGES
                .into_iter()
                .map(|text| ScriptedMessage { delay: Duration::ZERO, text })
                .collect(),
            settle: Duration::ZERO,
            advance_after: Duration::ZERO,
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.messages.iter().map(|message| message.delay).sum::<Duration>()
            + self.settle
            + self.advance_after
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteLine {
    pub location: String,
    pub label: String,
    pub cameras: u32,
}

/// Monthly rental quote: cameras times the per-camera rate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuoteCalculation {
    pub lines: Vec<QuoteLine>,
    pub total_cameras: u32,
    pub unit_price: i64,
    pub monthly_price: i64,
}

impl QuoteCalculation {
    pub fn new(lines: Vec<QuoteLine>, unit_price: i64) -> Self {
        let total_cameras: u32 = lines.iter().map(|line| line.cameras).sum();
        Self { lines, total_cameras, unit_price, monthly_price: i64::from(total_cameras) * unit_price }
    }

    pub fn summary(&self) -> String {
        let mut summary = String::from("🎉 Your custom quote is ready!\n\n📋 Installation details\n");
        for line in &self.lines {
            summary.push_str(&format!("{}: {} camera(s)\n", line.label, line.cameras));
        }
        summary.push_str(&format!(
            "\n💰 Estimate\n• Cameras: {}\n• Rental per camera: {} won/month\n• Monthly rental: {} won\n",
            self.total_cameras,
            format_won(self.unit_price),
            format_won(self.monthly_price)
        ));
        summary.push_str("\n✨ Included\n");
        for service in INCLUDED_SERVICES {
            summary.push_str(&format!("• {service}\n"));
        }
        summary.push_str("\n⚡ Benefits\n");
        for benefit in BENEFITS {
            summary.push_str(&format!("• {benefit}\n"));
        }
        summary
    }
}

/// `25500` as `25,500`.
pub fn format_won(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        grouped.insert(0, '-');
    }
    grouped
}
